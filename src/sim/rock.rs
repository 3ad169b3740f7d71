//! Rock physics: shake, wait for the player to clear, fall, crumble
//!
//! A resting rock is a `Tile::Rock` in the grid. It leaves the grid the moment
//! it starts falling and only returns if it lands on another rock without
//! having crushed anything.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::collision::{Aabb, horizontal_overlap};
use super::grid::{Grid, Tile, grid_to_pixel, pixel_to_grid};
use crate::consts::*;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RockState {
    Idle,
    /// Wobbling. `awaiting_clearance` is set once the shake time ran out with
    /// the player still underneath.
    Shaking { timer: f32, awaiting_clearance: bool },
    /// Player got clear; short pause before the drop
    FallDelay { timer: f32 },
    Falling,
    Crumbling { timer: f32 },
    /// Ready for removal from the rock list
    Destroyed,
}

/// What happened during a rock update
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RockUpdate {
    pub started_falling: bool,
    pub landed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rock {
    pub id: u32,
    /// Top-left pixel
    pub pos: Vec2,
    pub col: i32,
    pub row: i32,
    pub state: RockState,
    pub player_was_beneath: bool,
    /// Player's row when the shake began
    pub player_row: i32,
    /// Enemies pinned during the current fall
    pub crushed: Vec<u32>,
    pub carrying_player: bool,
}

impl Rock {
    /// Rock resting in a grid cell. The caller places the tile.
    pub fn new(id: u32, col: i32, row: i32) -> Self {
        Self {
            id,
            pos: grid_to_pixel(col, row),
            col,
            row,
            state: RockState::Idle,
            player_was_beneath: false,
            player_row: 0,
            crushed: Vec::new(),
            carrying_player: false,
        }
    }

    pub fn hitbox(&self) -> Aabb {
        Aabb::tile(self.pos)
    }

    pub fn is_shaking(&self) -> bool {
        matches!(
            self.state,
            RockState::Shaking { .. } | RockState::FallDelay { .. }
        )
    }

    pub fn is_falling(&self) -> bool {
        self.state == RockState::Falling
    }

    pub fn is_crumbling(&self) -> bool {
        matches!(self.state, RockState::Crumbling { .. })
    }

    pub fn is_destroyed(&self) -> bool {
        self.state == RockState::Destroyed
    }

    /// Still falling or crumbling with something pinned underneath
    pub fn is_mid_crush(&self) -> bool {
        (self.is_falling() || self.is_crumbling())
            && (!self.crushed.is_empty() || self.carrying_player)
    }

    /// Nothing below holds the rock up
    pub fn is_unsupported(&self, grid: &Grid) -> bool {
        let below = self.row + 1;
        (below as usize) < grid.height() && grid.tile_at(self.col, below) == Tile::Empty
    }

    /// Player standing right under the rock with enough horizontal overlap
    pub fn is_player_beneath(&self, player_pos: Vec2) -> bool {
        let dy = player_pos.y - self.pos.y;
        dy > 0.0
            && dy <= TILE_SIZE * 1.5
            && horizontal_overlap(self.pos.x, player_pos.x) >= ROCK_BENEATH_OVERLAP
    }

    /// Any part of the player still under the rock's column
    fn is_player_under(&self, player_pos: Vec2) -> bool {
        player_pos.y > self.pos.y && horizontal_overlap(self.pos.x, player_pos.x) > 0.0
    }

    /// Clear once the player no longer overlaps horizontally or has changed row
    fn is_player_clear(&self, player_pos: Option<Vec2>) -> bool {
        let Some(p) = player_pos else {
            return true;
        };
        let (_, row) = pixel_to_grid(p + Vec2::splat(TILE_SIZE / 2.0));
        horizontal_overlap(self.pos.x, p.x) <= 0.0 || row != self.player_row
    }

    fn start_falling(&mut self, grid: &mut Grid, out: &mut RockUpdate) {
        log::debug!("Rock {} falling from row {}", self.id, self.row);
        grid.remove_rock(self.col, self.row);
        self.state = RockState::Falling;
        out.started_falling = true;
    }

    /// Advance one tick. `player_pos` is `None` when the player cannot
    /// trigger rocks (dead or pinned).
    pub fn update(&mut self, grid: &mut Grid, player_pos: Option<Vec2>, dt: f32) -> RockUpdate {
        let mut out = RockUpdate::default();

        match self.state {
            RockState::Idle => {
                if self.is_unsupported(grid) {
                    match player_pos.filter(|&p| self.is_player_beneath(p)) {
                        Some(p) => {
                            self.player_was_beneath = true;
                            self.player_row = pixel_to_grid(p + Vec2::splat(TILE_SIZE / 2.0)).1;
                            self.state = RockState::Shaking {
                                timer: 0.0,
                                awaiting_clearance: false,
                            };
                        }
                        None => self.start_falling(grid, &mut out),
                    }
                }
            }
            RockState::Shaking {
                timer,
                awaiting_clearance,
            } => {
                let timer = timer + dt;
                if awaiting_clearance {
                    if self.is_player_clear(player_pos) {
                        self.state = RockState::FallDelay { timer: 0.0 };
                    } else {
                        self.state = RockState::Shaking {
                            timer,
                            awaiting_clearance,
                        };
                    }
                } else if timer >= ROCK_SHAKE_DURATION {
                    if player_pos.is_some_and(|p| self.is_player_under(p)) {
                        self.state = RockState::Shaking {
                            timer,
                            awaiting_clearance: true,
                        };
                    } else if self.player_was_beneath {
                        self.state = RockState::FallDelay { timer: 0.0 };
                    } else {
                        self.start_falling(grid, &mut out);
                    }
                } else {
                    self.state = RockState::Shaking {
                        timer,
                        awaiting_clearance,
                    };
                }
            }
            RockState::FallDelay { timer } => {
                if timer + dt >= ROCK_FALL_DELAY {
                    self.start_falling(grid, &mut out);
                } else {
                    self.state = RockState::FallDelay { timer: timer + dt };
                }
            }
            RockState::Falling => {
                self.pos.y += ROCK_FALL_SPEED * dt;
                let row = (self.pos.y / TILE_SIZE).floor() as i32;
                let below = grid.tile_at(self.col, row + 1);
                if below != Tile::Empty {
                    self.pos.y = row as f32 * TILE_SIZE;
                    self.row = row;
                    self.land(grid, below);
                    out.landed = true;
                }
            }
            RockState::Crumbling { timer } => {
                self.state = if timer + dt >= ROCK_CRUMBLE_DURATION {
                    RockState::Destroyed
                } else {
                    RockState::Crumbling { timer: timer + dt }
                };
            }
            RockState::Destroyed => {}
        }

        out
    }

    fn land(&mut self, grid: &mut Grid, below: Tile) {
        if below == Tile::Rock && self.crushed.is_empty() && !self.carrying_player {
            log::debug!("Rock {} came to rest on a rock at row {}", self.id, self.row);
            grid.place_rock(self.col, self.row);
            self.state = RockState::Idle;
            self.player_was_beneath = false;
        } else {
            log::debug!(
                "Rock {} landed at row {} ({} crushed)",
                self.id,
                self.row,
                self.crushed.len()
            );
            self.state = RockState::Crumbling { timer: 0.0 };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 1.0 / 60.0;

    /// Rock at (5, 6) with the tile below dug out
    fn rock_over_hole() -> (Grid, Rock) {
        let mut grid = Grid::default();
        grid.place_rock(5, 6);
        grid.clear_vertical(5, 7, 9);
        (grid, Rock::new(1, 5, 6))
    }

    #[test]
    fn test_supported_rock_stays_idle() {
        let mut grid = Grid::default();
        grid.place_rock(5, 6);
        let mut rock = Rock::new(1, 5, 6);
        for _ in 0..60 {
            rock.update(&mut grid, Some(grid_to_pixel(5, 7)), DT);
        }
        assert_eq!(rock.state, RockState::Idle);
        assert!(grid.is_rock(5, 6));
    }

    #[test]
    fn test_falls_immediately_without_player() {
        let (mut grid, mut rock) = rock_over_hole();
        let out = rock.update(&mut grid, Some(grid_to_pixel(10, 12)), DT);
        assert!(out.started_falling);
        assert!(rock.is_falling());
        // Lifted out of the tile map straight away
        assert!(grid.is_empty(5, 6));
    }

    #[test]
    fn test_shakes_until_player_clears() {
        let (mut grid, mut rock) = rock_over_hole();
        let under = grid_to_pixel(5, 7);
        rock.update(&mut grid, Some(under), DT);
        assert!(rock.is_shaking());

        // Far longer than the shake time
        for _ in 0..600 {
            rock.update(&mut grid, Some(under), DT);
            assert!(rock.is_shaking());
            assert!(!rock.is_falling());
        }
        assert!(grid.is_rock(5, 6));

        // Still overlapping by a sliver: keep waiting
        let sliver = under + Vec2::new(TILE_SIZE - 2.0, 0.0);
        rock.update(&mut grid, Some(sliver), DT);
        assert!(matches!(rock.state, RockState::Shaking { .. }));

        let clear = grid_to_pixel(6, 7);
        rock.update(&mut grid, Some(clear), DT);
        assert!(matches!(rock.state, RockState::FallDelay { .. }));

        let mut fell = false;
        for _ in 0..30 {
            if rock.update(&mut grid, Some(clear), DT).started_falling {
                fell = true;
                break;
            }
        }
        assert!(fell);
    }

    #[test]
    fn test_row_change_also_clears() {
        let (mut grid, mut rock) = rock_over_hole();
        let under = grid_to_pixel(5, 7);
        for _ in 0..60 {
            rock.update(&mut grid, Some(under), DT);
        }
        assert!(matches!(
            rock.state,
            RockState::Shaking {
                awaiting_clearance: true,
                ..
            }
        ));
        rock.update(&mut grid, Some(grid_to_pixel(5, 8)), DT);
        assert!(matches!(rock.state, RockState::FallDelay { .. }));
    }

    #[test]
    fn test_player_leaving_during_shake_uses_fall_delay() {
        let (mut grid, mut rock) = rock_over_hole();
        rock.update(&mut grid, Some(grid_to_pixel(5, 7)), DT);
        let away = grid_to_pixel(9, 12);
        let mut saw_delay = false;
        for _ in 0..60 {
            rock.update(&mut grid, Some(away), DT);
            if matches!(rock.state, RockState::FallDelay { .. }) {
                saw_delay = true;
            }
        }
        assert!(saw_delay);
        assert!(rock.is_falling() || rock.is_crumbling());
    }

    #[test]
    fn test_lands_on_dirt_and_crumbles() {
        let (mut grid, mut rock) = rock_over_hole();
        let mut landed = false;
        for _ in 0..120 {
            if rock.update(&mut grid, None, DT).landed {
                landed = true;
                break;
            }
        }
        assert!(landed);
        assert_eq!(rock.row, 9);
        assert_eq!(rock.pos, grid_to_pixel(5, 9));
        assert!(rock.is_crumbling());
        for _ in 0..60 {
            rock.update(&mut grid, None, DT);
        }
        assert!(rock.is_destroyed());
        // Never put back into the map
        assert!(!grid.is_rock(5, 9));
    }

    #[test]
    fn test_lands_on_rock_and_rests() {
        let (mut grid, mut rock) = rock_over_hole();
        grid.place_rock(5, 10);
        grid.dig(5, 9);
        for _ in 0..120 {
            if rock.update(&mut grid, None, DT).landed {
                break;
            }
        }
        assert_eq!(rock.state, RockState::Idle);
        assert_eq!(rock.row, 9);
        assert!(grid.is_rock(5, 9));
    }

    #[test]
    fn test_crush_forces_crumble_on_rock() {
        let (mut grid, mut rock) = rock_over_hole();
        grid.place_rock(5, 10);
        rock.update(&mut grid, None, DT);
        rock.crushed.push(42);
        assert!(rock.is_mid_crush());
        for _ in 0..120 {
            if rock.update(&mut grid, None, DT).landed {
                break;
            }
        }
        assert!(rock.is_crumbling());
    }

    #[test]
    fn test_floor_counts_as_support() {
        let mut grid = Grid::default();
        let bottom = GRID_HEIGHT as i32 - 1;
        grid.place_rock(3, bottom);
        let mut rock = Rock::new(1, 3, bottom);
        assert!(!rock.is_unsupported(&grid));
        rock.update(&mut grid, None, DT);
        assert_eq!(rock.state, RockState::Idle);
    }
}
