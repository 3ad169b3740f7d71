//! Procedural level layout
//!
//! Enemy tunnels and rocks are placed with the same scheme: enumerate every
//! tile that satisfies the static bounds, shuffle, then walk the list in
//! passes with progressively looser spacing until the target is met. Every
//! accepted placement is written to the grid at once so later candidates see
//! it. Placement never fails outright; the last pass accepts poor spacing.

use rand::Rng;
use rand::seq::SliceRandom;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::enemy::EnemyType;
use super::grid::Grid;
use crate::consts::SKY_ROWS;
use crate::tuning::Tuning;

/// Length of a carved enemy tunnel in tiles
pub const TUNNEL_LENGTH: i32 = 3;
/// Half-width of the column band around the start that stays free of placements
pub const CENTER_BAND: i32 = 1;
/// Respawn fallback must be at least this far from the start
pub const FALLBACK_MIN_DISTANCE: i32 = 3;
/// Last-resort spawn tile
pub const DEFAULT_SPAWN: (i32, i32) = (1, SKY_ROWS as i32 + 1);

/// Spacing requirements for one enemy tunnel pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TunnelPass {
    /// Minimum Chebyshev distance between any two tunnel tiles
    pub tunnel_spacing: i32,
    /// Minimum Chebyshev distance from the tunnel centre to the player start
    pub player_distance: i32,
}

pub const TUNNEL_PASSES: [TunnelPass; 4] = [
    TunnelPass { tunnel_spacing: 4, player_distance: 5 },
    TunnelPass { tunnel_spacing: 3, player_distance: 4 },
    TunnelPass { tunnel_spacing: 2, player_distance: 3 },
    TunnelPass { tunnel_spacing: 1, player_distance: 2 },
];

/// Spacing requirements for one rock pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RockPass {
    pub rock_spacing: i32,
    pub enemy_spacing: i32,
    /// Minimum distance to the nearest open tile (0 disables the check)
    pub tunnel_spacing: i32,
    pub require_dirt_below: bool,
}

pub const ROCK_PASSES: [RockPass; 4] = [
    RockPass { rock_spacing: 3, enemy_spacing: 3, tunnel_spacing: 2, require_dirt_below: true },
    RockPass { rock_spacing: 2, enemy_spacing: 2, tunnel_spacing: 1, require_dirt_below: true },
    RockPass { rock_spacing: 2, enemy_spacing: 1, tunnel_spacing: 1, require_dirt_below: true },
    RockPass { rock_spacing: 1, enemy_spacing: 1, tunnel_spacing: 0, require_dirt_below: true },
];

/// Only runs when the quality passes fell short of the hard minimum
pub const ROCK_FALLBACK_PASS: RockPass = RockPass {
    rock_spacing: 1,
    enemy_spacing: 0,
    tunnel_spacing: 0,
    require_dirt_below: false,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnemySpawn {
    pub kind: EnemyType,
    pub col: i32,
    pub row: i32,
}

/// Everything a fresh level needs besides the grid itself
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelLayout {
    pub player_start: (i32, i32),
    pub enemies: Vec<EnemySpawn>,
    pub rocks: Vec<(i32, i32)>,
}

#[inline]
fn chebyshev(a: (i32, i32), b: (i32, i32)) -> i32 {
    (a.0 - b.0).abs().max((a.1 - b.1).abs())
}

pub struct LevelGenerator<'a> {
    rng: Pcg32,
    tuning: &'a Tuning,
}

impl<'a> LevelGenerator<'a> {
    pub fn new(rng: Pcg32, tuning: &'a Tuning) -> Self {
        Self { rng, tuning }
    }

    /// Reset the grid and lay out a full level
    pub fn generate(&mut self, grid: &mut Grid, level: u32) -> LevelLayout {
        grid.reset();
        let player_start = carve_player_tunnel(grid);

        let enemy_count = self.enemy_count(level);
        let fygars = fygar_count(self.tuning, level, enemy_count);
        let spawns = self.place_enemy_tunnels(grid, player_start, enemy_count as usize);

        let mut kinds: Vec<EnemyType> = (0..enemy_count)
            .map(|i| if i < fygars { EnemyType::Fygar } else { EnemyType::Pooka })
            .collect();
        kinds.shuffle(&mut self.rng);

        let enemies: Vec<EnemySpawn> = spawns
            .iter()
            .zip(kinds)
            .map(|(&(col, row), kind)| EnemySpawn { kind, col, row })
            .collect();

        let rock_target = self.tuning.rock_count(level) as usize;
        let rocks = self.place_rocks(
            grid,
            rock_target,
            self.tuning.min_rocks as usize,
            &spawns,
            None,
        );

        log::info!(
            "Level {level}: {} enemies ({fygars} fygar), {} rocks",
            enemies.len(),
            rocks.len()
        );

        LevelLayout {
            player_start,
            enemies,
            rocks,
        }
    }

    /// Base count plus a coin flip, capped
    pub fn enemy_count(&mut self, level: u32) -> u32 {
        let bump = self.rng.random_range(0..=1u32);
        (self.tuning.base_enemy_count(level) + bump).min(self.tuning.max_enemies)
    }

    /// Carve `count` short tunnels and return one spawn tile per enemy
    pub fn place_enemy_tunnels(
        &mut self,
        grid: &mut Grid,
        start: (i32, i32),
        count: usize,
    ) -> Vec<(i32, i32)> {
        let mut candidates: Vec<(i32, i32)> = tunnel_candidates(grid, start);
        candidates.shuffle(&mut self.rng);

        let mut tunnels: Vec<Vec<(i32, i32)>> = Vec::with_capacity(count);
        let mut spawns = Vec::with_capacity(count);

        for (pass_index, pass) in TUNNEL_PASSES.iter().enumerate() {
            if spawns.len() >= count {
                break;
            }
            for &center in &candidates {
                if spawns.len() >= count {
                    break;
                }
                if chebyshev(center, start) < pass.player_distance {
                    continue;
                }
                let horizontal_first = self.rng.random_bool(0.5);
                let orientations = if horizontal_first { [true, false] } else { [false, true] };
                let accepted = orientations.into_iter().find_map(|horizontal| {
                    let tiles = tunnel_tiles(center, horizontal);
                    tunnel_fits(grid, &tiles, &tunnels, start, pass.tunnel_spacing).then_some(tiles)
                });
                if let Some(tiles) = accepted {
                    for &(col, row) in &tiles {
                        grid.dig(col, row);
                    }
                    tunnels.push(tiles);
                    spawns.push(center);
                }
            }
            log::debug!("Tunnel pass {pass_index}: {} of {count} placed", spawns.len());
        }

        while spawns.len() < count {
            let spawn = fallback_spawn(grid, start, &spawns);
            log::warn!("Enemy tunnel placement short, falling back to {spawn:?}");
            spawns.push(spawn);
        }
        spawns
    }

    /// Place up to `target` rocks (at least `minimum` where possible).
    /// `avoid` keeps rocks a given distance from a tile (the player).
    pub fn place_rocks(
        &mut self,
        grid: &mut Grid,
        target: usize,
        minimum: usize,
        enemies: &[(i32, i32)],
        avoid: Option<((i32, i32), i32)>,
    ) -> Vec<(i32, i32)> {
        let start = player_start(grid);
        let mut candidates = rock_candidates(grid, start);
        candidates.shuffle(&mut self.rng);

        let mut rocks: Vec<(i32, i32)> = Vec::with_capacity(target);
        for (pass_index, pass) in ROCK_PASSES.iter().enumerate() {
            if rocks.len() >= target {
                break;
            }
            rock_pass(grid, &candidates, pass, target, enemies, avoid, &mut rocks);
            log::debug!("Rock pass {pass_index}: {} of {target} placed", rocks.len());
        }

        if rocks.len() < minimum {
            log::debug!("Rock placement below minimum, running fallback pass");
            rock_pass(grid, &candidates, &ROCK_FALLBACK_PASS, minimum, enemies, avoid, &mut rocks);
        }
        if rocks.len() < minimum {
            log::warn!("Only {} of {minimum} rocks could be placed", rocks.len());
        }
        rocks
    }

    /// One replacement rock for a board that ran out, kept clear of the player
    pub fn respawn_rock(
        &mut self,
        grid: &mut Grid,
        enemies: &[(i32, i32)],
        player: (i32, i32),
    ) -> Option<(i32, i32)> {
        self.place_rocks(grid, 1, 1, enemies, Some((player, FALLBACK_MIN_DISTANCE)))
            .into_iter()
            .next()
    }
}

fn rock_pass(
    grid: &mut Grid,
    candidates: &[(i32, i32)],
    pass: &RockPass,
    target: usize,
    enemies: &[(i32, i32)],
    avoid: Option<((i32, i32), i32)>,
    rocks: &mut Vec<(i32, i32)>,
) {
    for &(col, row) in candidates {
        if rocks.len() >= target {
            return;
        }
        if !grid.is_dirt(col, row) {
            continue;
        }
        if pass.require_dirt_below && !grid.is_dirt(col, row + 1) {
            continue;
        }
        if let Some((tile, distance)) = avoid {
            if chebyshev((col, row), tile) < distance {
                continue;
            }
        }
        if rocks.iter().any(|&r| chebyshev(r, (col, row)) < pass.rock_spacing) {
            continue;
        }
        if enemies.iter().any(|&e| chebyshev(e, (col, row)) < pass.enemy_spacing) {
            continue;
        }
        if pass.tunnel_spacing > 0
            && nearest_open_distance(grid, (col, row), pass.tunnel_spacing) < pass.tunnel_spacing
        {
            continue;
        }
        if grid.place_rock(col, row) {
            rocks.push((col, row));
        }
    }
}

/// Start tile at the centre of the grid
pub fn player_start(grid: &Grid) -> (i32, i32) {
    (grid.width() as i32 / 2, grid.height() as i32 / 2)
}

/// Clear the fixed cross around the start tile
pub fn carve_player_tunnel(grid: &mut Grid) -> (i32, i32) {
    let (col, row) = player_start(grid);
    grid.clear_horizontal(row, col - 1, col + 1);
    grid.clear_vertical(col, row - 1, row + 1);
    (col, row)
}

/// Fygars for a level, never more than half the enemies
pub fn fygar_count(tuning: &Tuning, level: u32, enemy_count: u32) -> u32 {
    let wanted = (enemy_count as f32 * tuning.fygar_ratio(level)).round() as u32;
    wanted.min(enemy_count / 2)
}

/// Inside the static placement bounds: off the edges, below the sky, outside the centre band
fn in_placement_bounds(grid: &Grid, start: (i32, i32), (col, row): (i32, i32), bottom_margin: i32) -> bool {
    col >= 1
        && col <= grid.width() as i32 - 2
        && row > SKY_ROWS as i32
        && row <= grid.height() as i32 - 1 - bottom_margin
        && (col - start.0).abs() > CENTER_BAND
}

fn tunnel_candidates(grid: &Grid, start: (i32, i32)) -> Vec<(i32, i32)> {
    all_tiles(grid)
        .filter(|&t| in_placement_bounds(grid, start, t, 1) && grid.is_dirt(t.0, t.1))
        .collect()
}

fn rock_candidates(grid: &Grid, start: (i32, i32)) -> Vec<(i32, i32)> {
    all_tiles(grid)
        .filter(|&t| in_placement_bounds(grid, start, t, 2) && grid.is_dirt(t.0, t.1))
        .collect()
}

fn all_tiles(grid: &Grid) -> impl Iterator<Item = (i32, i32)> + use<> {
    let (w, h) = (grid.width() as i32, grid.height() as i32);
    (0..h).flat_map(move |row| (0..w).map(move |col| (col, row)))
}

fn tunnel_tiles(center: (i32, i32), horizontal: bool) -> Vec<(i32, i32)> {
    let half = TUNNEL_LENGTH / 2;
    (-half..=half)
        .map(|d| {
            if horizontal {
                (center.0 + d, center.1)
            } else {
                (center.0, center.1 + d)
            }
        })
        .collect()
}

fn tunnel_fits(
    grid: &Grid,
    tiles: &[(i32, i32)],
    tunnels: &[Vec<(i32, i32)>],
    start: (i32, i32),
    spacing: i32,
) -> bool {
    tiles
        .iter()
        .all(|&t| in_placement_bounds(grid, start, t, 1) && grid.is_dirt(t.0, t.1))
        && tunnels
            .iter()
            .flatten()
            .all(|&other| tiles.iter().all(|&t| chebyshev(t, other) >= spacing))
}

/// Chebyshev distance to the nearest open tile, searching up to `limit`
fn nearest_open_distance(grid: &Grid, (col, row): (i32, i32), limit: i32) -> i32 {
    for radius in 0..limit {
        for dr in -radius..=radius {
            for dc in -radius..=radius {
                if dc.abs().max(dr.abs()) != radius {
                    continue;
                }
                if grid.in_bounds(col + dc, row + dr) && grid.is_empty(col + dc, row + dr) {
                    return radius;
                }
            }
        }
    }
    limit
}

/// Linear scan for an open tile away from the start, else the hardcoded default
fn fallback_spawn(grid: &mut Grid, start: (i32, i32), taken: &[(i32, i32)]) -> (i32, i32) {
    if let Some(tile) = grid.find_empty(|col, row| {
        chebyshev((col, row), start) >= FALLBACK_MIN_DISTANCE && !taken.contains(&(col, row))
    }) {
        return tile;
    }
    let (col, row) = DEFAULT_SPAWN;
    grid.remove_rock(col, row);
    grid.dig(col, row);
    DEFAULT_SPAWN
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;

    fn generator(tuning: &Tuning, seed: u64) -> LevelGenerator<'_> {
        LevelGenerator::new(Pcg32::seed_from_u64(seed), tuning)
    }

    #[test]
    fn test_player_cross_carved() {
        let mut grid = Grid::default();
        let (col, row) = carve_player_tunnel(&mut grid);
        assert_eq!((col, row), (7, 9));
        for (c, r) in [(6, 9), (7, 9), (8, 9), (7, 8), (7, 10)] {
            assert!(grid.is_empty(c, r));
        }
        assert!(grid.is_dirt(6, 8));
    }

    #[test]
    fn test_generate_is_deterministic() {
        let tuning = Tuning::default();
        let mut a = Grid::default();
        let mut b = Grid::default();
        let la = generator(&tuning, 7).generate(&mut a, 3);
        let lb = generator(&tuning, 7).generate(&mut b, 3);
        assert_eq!(la, lb);
        assert_eq!(a.tiles(), b.tiles());
    }

    #[test]
    fn test_enemy_spawns_are_open_and_away_from_start() {
        let tuning = Tuning::default();
        let mut grid = Grid::default();
        let layout = generator(&tuning, 11).generate(&mut grid, 1);
        assert!(layout.enemies.len() >= 3);
        for spawn in &layout.enemies {
            assert!(grid.is_empty(spawn.col, spawn.row));
            assert!(chebyshev((spawn.col, spawn.row), layout.player_start) >= 2);
        }
    }

    #[test]
    fn test_fygar_share_capped() {
        let tuning = Tuning::default();
        assert_eq!(fygar_count(&tuning, 1, 3), 1);
        for count in 2..=8 {
            assert!(fygar_count(&tuning, 99, count) <= count / 2);
        }
        assert_eq!(fygar_count(&tuning, 99, 8), 4);
    }

    #[test]
    fn test_enemy_count_grows_and_caps() {
        let tuning = Tuning::default();
        let mut generator = generator(&tuning, 3);
        let low = generator.enemy_count(1);
        assert!((3..=4).contains(&low));
        for _ in 0..20 {
            assert!(generator.enemy_count(200) <= tuning.max_enemies);
        }
        assert!(generator.enemy_count(9) >= 7);
    }

    #[test]
    fn test_tunnels_do_not_overlap() {
        let tuning = Tuning::default();
        let mut grid = Grid::default();
        let start = carve_player_tunnel(&mut grid);
        let before = grid.count(crate::sim::grid::Tile::Empty);
        let spawns = generator(&tuning, 5).place_enemy_tunnels(&mut grid, start, 4);
        assert_eq!(spawns.len(), 4);
        let after = grid.count(crate::sim::grid::Tile::Empty);
        assert_eq!(after - before, 4 * TUNNEL_LENGTH as usize);
    }

    #[test]
    fn test_crowded_map_falls_back() {
        let tuning = Tuning::default();
        // A map with no dirt left for tunnels
        let mut grid = Grid::default();
        for row in SKY_ROWS as i32..grid.height() as i32 {
            grid.clear_horizontal(row, 0, grid.width() as i32 - 1);
        }
        let start = player_start(&grid);
        let spawns = generator(&tuning, 1).place_enemy_tunnels(&mut grid, start, 2);
        assert_eq!(spawns.len(), 2);
        assert_ne!(spawns[0], spawns[1]);
        for &(col, row) in &spawns {
            assert!(grid.is_empty(col, row));
        }
    }

    #[test]
    fn test_default_spawn_when_nothing_open() {
        let mut grid = Grid::default();
        let spawn = fallback_spawn(&mut grid, (7, 9), &[]);
        assert_eq!(spawn, DEFAULT_SPAWN);
        assert!(grid.is_empty(DEFAULT_SPAWN.0, DEFAULT_SPAWN.1));
    }

    #[test]
    fn test_rock_minimum_under_adversarial_map() {
        let tuning = Tuning::default();
        // Alternate open rows leave no tile with dirt below and no spacing
        let mut grid = Grid::default();
        for row in (SKY_ROWS as i32 + 2..grid.height() as i32).step_by(2) {
            grid.clear_horizontal(row, 0, grid.width() as i32 - 1);
        }
        let rocks = generator(&tuning, 9).place_rocks(&mut grid, 5, 3, &[], None);
        assert!(rocks.len() >= 3);
    }

    #[test]
    fn test_respawn_rock_avoids_player() {
        let tuning = Tuning::default();
        let mut grid = Grid::default();
        carve_player_tunnel(&mut grid);
        let player = (4, 6);
        let rock = generator(&tuning, 2).respawn_rock(&mut grid, &[], player);
        let rock = rock.expect("a solid map always has room");
        assert!(chebyshev(rock, player) >= FALLBACK_MIN_DISTANCE);
        assert!(grid.is_rock(rock.0, rock.1));
    }

    proptest! {
        #[test]
        fn prop_rock_count_bounds(seed in any::<u64>(), level in prop::sample::select(vec![1u32, 5, 10, 30])) {
            let tuning = Tuning::default();
            let mut grid = Grid::default();
            let layout = generator(&tuning, seed).generate(&mut grid, level);
            prop_assert!(layout.rocks.len() >= 3);
            prop_assert!(layout.rocks.len() <= 6);
            let mut tiles = layout.rocks.clone();
            tiles.sort();
            tiles.dedup();
            prop_assert_eq!(tiles.len(), layout.rocks.len());
            for &(col, row) in &layout.rocks {
                prop_assert!(grid.is_rock(col, row));
            }
        }
    }
}
