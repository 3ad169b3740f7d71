//! The digger: movement, digging, the pump and death
//!
//! Movement is tile-locked on the perpendicular axis: a turn requested while
//! between rows keeps the player travelling along the current axis until the
//! next tile boundary, then turns.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::grid::{Grid, Tile, distance_to_boundary, pixel_to_grid};
use crate::consts::*;
use crate::{Direction, axis_offset};

/// Player sub-state
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PlayerState {
    Normal,
    /// Pump line out (movement blocked)
    Pumping,
    /// Death animation running
    Dying { timer: f32, smooshed: bool },
    /// Pinned under a falling rock, position slaved to it
    Smooshed { rock_id: u32 },
}

/// Pump line state. Only meaningful while the player is `Pumping`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pump {
    pub length: f32,
    pub direction: Direction,
    /// Locked enemy id (re-validated by the collision pass every tick)
    pub target: Option<u32>,
    /// Extension stopped by dirt or rock ahead
    pub blocked: bool,
    /// Time spent at full length or blocked
    pub hold_timer: f32,
    pub should_auto_retract: bool,
    /// Attack released; retracting at the fast rate
    pub released: bool,
}

impl Pump {
    fn new(direction: Direction) -> Self {
        Self {
            length: 0.0,
            direction,
            target: None,
            blocked: false,
            hold_timer: 0.0,
            should_auto_retract: false,
            released: false,
        }
    }

    pub fn is_retracting(&self) -> bool {
        self.released || self.should_auto_retract
    }

    /// Drop the lock (target popped or vanished) and pull the line back in
    pub fn release_target(&mut self) {
        self.target = None;
        self.should_auto_retract = true;
    }
}

/// What happened during a player update
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlayerUpdate {
    /// Tiles converted from dirt to empty this tick
    pub tiles_dug: u32,
    /// The death animation finished this tick
    pub death_finished: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    /// Top-left of the tile-sized hitbox
    pub pos: Vec2,
    pub facing: Direction,
    /// Last horizontal facing, for sprite mirroring
    pub sprite_facing: Direction,
    pub moving: bool,
    pub digging: bool,
    pub state: PlayerState,
    pub invincible_timer: f32,
    pub pump: Pump,
    /// Attack must be released before another pump can start
    pub needs_release: bool,
    pub speed: f32,
}

impl Player {
    pub fn new(pos: Vec2, speed: f32) -> Self {
        Self {
            pos,
            facing: Direction::Right,
            sprite_facing: Direction::Right,
            moving: false,
            digging: false,
            state: PlayerState::Normal,
            invincible_timer: 0.0,
            pump: Pump::new(Direction::Right),
            needs_release: false,
            speed,
        }
    }

    /// Fresh player after losing a life
    pub fn respawned(pos: Vec2, speed: f32) -> Self {
        let mut player = Self::new(pos, speed);
        player.invincible_timer = INVINCIBILITY_DURATION;
        // A held attack button from before the death must not fire instantly
        player.needs_release = true;
        player
    }

    #[inline]
    pub fn center(&self) -> Vec2 {
        self.pos + Vec2::splat(TILE_SIZE / 2.0)
    }

    pub fn is_alive(&self) -> bool {
        matches!(self.state, PlayerState::Normal | PlayerState::Pumping)
    }

    pub fn is_invincible(&self) -> bool {
        self.invincible_timer > 0.0
    }

    pub fn is_pumping(&self) -> bool {
        self.state == PlayerState::Pumping
    }

    pub fn is_smooshed(&self) -> bool {
        matches!(
            self.state,
            PlayerState::Smooshed { .. } | PlayerState::Dying { smooshed: true, .. }
        )
    }

    pub fn is_dying(&self) -> bool {
        matches!(self.state, PlayerState::Dying { .. })
    }

    /// Far end of the pump line
    pub fn pump_endpoint(&self) -> Vec2 {
        self.center() + self.pump.direction.vector() * self.pump.length
    }

    /// Enemy or fire contact. Does nothing if already dead or pinned.
    pub fn kill(&mut self) {
        if !self.is_alive() {
            return;
        }
        log::debug!("Player killed at {:?}", self.pos);
        self.state = PlayerState::Dying {
            timer: 0.0,
            smooshed: false,
        };
        self.reset_pump();
    }

    /// Pinned by a falling rock. Ignores invincibility.
    pub fn smoosh(&mut self, rock_id: u32) {
        if matches!(self.state, PlayerState::Smooshed { .. } | PlayerState::Dying { .. }) {
            return;
        }
        log::debug!("Player crushed by rock {rock_id}");
        self.state = PlayerState::Smooshed { rock_id };
        self.reset_pump();
    }

    /// The carrying rock is gone; play the flattened death
    pub fn finish_smoosh(&mut self) {
        if let PlayerState::Smooshed { .. } = self.state {
            self.state = PlayerState::Dying {
                timer: 0.0,
                smooshed: true,
            };
        }
    }

    fn reset_pump(&mut self) {
        self.pump = Pump::new(self.facing);
        self.moving = false;
        self.digging = false;
    }

    /// Advance one tick
    pub fn update(
        &mut self,
        direction: Option<Direction>,
        attack: bool,
        grid: &mut Grid,
        dt: f32,
    ) -> PlayerUpdate {
        let mut out = PlayerUpdate::default();

        if self.invincible_timer > 0.0 {
            self.invincible_timer = (self.invincible_timer - dt).max(0.0);
        }
        if !attack {
            self.needs_release = false;
        }

        match self.state {
            PlayerState::Dying { ref mut timer, .. } => {
                let before = *timer;
                *timer += dt;
                out.death_finished = before < DEATH_DURATION && *timer >= DEATH_DURATION;
            }
            PlayerState::Smooshed { .. } => {}
            PlayerState::Normal => {
                if attack && !self.needs_release {
                    self.state = PlayerState::Pumping;
                    self.pump = Pump::new(self.facing);
                    self.moving = false;
                    self.digging = false;
                } else {
                    out.tiles_dug = self.walk(direction, grid, dt);
                }
            }
            PlayerState::Pumping => self.update_pump(attack, grid, dt),
        }

        out
    }

    /// Move and dig. Returns the number of tiles dug.
    fn walk(&mut self, direction: Option<Direction>, grid: &mut Grid, dt: f32) -> u32 {
        self.moving = false;
        self.digging = false;
        let Some(want) = direction else {
            return 0;
        };

        if !self.step(want, grid, dt) {
            return 0;
        }
        self.moving = true;

        let (col, row) = pixel_to_grid(self.center());
        if grid.dig(col, row) {
            self.digging = true;
            1
        } else {
            0
        }
    }

    /// One movement step toward `want`. Returns true if the player moved.
    fn step(&mut self, want: Direction, grid: &Grid, dt: f32) -> bool {
        let step = self.speed * dt;
        if step <= 0.0 {
            return false;
        }

        // Perpendicular misalignment that must be resolved before turning
        let off = if want.is_horizontal() {
            axis_offset(self.pos.y)
        } else {
            axis_offset(self.pos.x)
        };

        let (dir, dist) = if off.abs() >= ALIGN_EPSILON {
            let along = if self.facing.is_horizontal() != want.is_horizontal() {
                self.facing
            } else if want.is_horizontal() {
                if off > 0.0 { Direction::Up } else { Direction::Down }
            } else if off > 0.0 {
                Direction::Left
            } else {
                Direction::Right
            };
            (along, step.min(distance_to_boundary(self.pos, along)))
        } else {
            // Remove float drift on the cross axis
            if want.is_horizontal() {
                self.pos.y -= off;
            } else {
                self.pos.x -= off;
            }
            (want, step)
        };

        let bounds = grid.pixel_size() - Vec2::splat(TILE_SIZE);
        let min_y = (SKY_ROWS.saturating_sub(1)) as f32 * TILE_SIZE;
        let mut next = self.pos + dir.vector() * dist;
        next.x = next.x.clamp(0.0, bounds.x);
        next.y = next.y.clamp(min_y, bounds.y);

        if next == self.pos || !grid.is_position_valid(next) {
            return false;
        }

        self.pos = next;
        if dir != self.facing {
            self.facing = dir;
        }
        if dir.is_horizontal() {
            self.sprite_facing = dir;
        }
        true
    }

    fn update_pump(&mut self, attack: bool, grid: &Grid, dt: f32) {
        let origin = self.center();
        let pump = &mut self.pump;

        if !attack && !pump.released {
            pump.released = true;
            pump.target = None;
        }

        if pump.released {
            pump.length -= PUMP_RELEASE_RETRACT_SPEED * dt;
        } else if pump.should_auto_retract {
            pump.length -= PUMP_RETRACT_SPEED * dt;
        } else if pump.target.is_some() {
            // Locked on: hold the line while the target inflates
        } else if pump.blocked || pump.length >= PUMP_MAX_LENGTH {
            pump.hold_timer += dt;
            if pump.hold_timer >= PUMP_GRACE_DELAY {
                pump.should_auto_retract = true;
            }
        } else {
            let next = (pump.length + PUMP_EXTEND_SPEED * dt).min(PUMP_MAX_LENGTH);
            let probe = origin + pump.direction.vector() * next;
            let (col, row) = pixel_to_grid(probe);
            match grid.tile_at(col, row) {
                Tile::Dirt | Tile::Rock => pump.blocked = true,
                Tile::Empty => pump.length = next,
            }
        }

        if pump.is_retracting() && pump.length <= 0.0 {
            self.reset_pump();
            self.state = PlayerState::Normal;
            self.needs_release = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::grid::{corner_cells, grid_to_pixel};
    use proptest::prelude::*;

    const DT: f32 = 1.0 / 60.0;

    fn tunnel_grid(row: i32, cols: std::ops::RangeInclusive<i32>) -> Grid {
        let mut grid = Grid::default();
        grid.clear_horizontal(row, *cols.start(), *cols.end());
        grid
    }

    #[test]
    fn test_walk_digs_and_reports_once() {
        let mut grid = tunnel_grid(8, 5..=5);
        let mut player = Player::new(grid_to_pixel(5, 8), PLAYER_SPEED);
        let mut dug = 0;
        for _ in 0..60 {
            dug += player.update(Some(Direction::Right), false, &mut grid, DT).tiles_dug;
        }
        // One second at two tiles per second
        assert!(dug >= 1 && dug <= 2, "dug {dug}");
        assert!(grid.is_empty(6, 8));
        // Walking back over dug tiles scores nothing
        let mut again = 0;
        for _ in 0..30 {
            again += player.update(Some(Direction::Left), false, &mut grid, DT).tiles_dug;
        }
        assert_eq!(again, 0);
    }

    #[test]
    fn test_turn_waits_for_boundary() {
        let mut grid = tunnel_grid(8, 4..=8);
        let mut player = Player::new(grid_to_pixel(5, 8), PLAYER_SPEED);
        player.update(Some(Direction::Down), false, &mut grid, DT);
        assert!(player.pos.y > grid_to_pixel(5, 8).y);
        // Asking for Right mid-tile keeps going down to the next row
        for _ in 0..40 {
            player.update(Some(Direction::Right), false, &mut grid, DT);
        }
        assert_eq!(player.pos.y, grid_to_pixel(5, 9).y);
        assert!(player.pos.x > grid_to_pixel(5, 9).x);
    }

    #[test]
    fn test_rock_blocks_movement() {
        let mut grid = tunnel_grid(8, 4..=6);
        grid.place_rock(6, 8);
        let mut player = Player::new(grid_to_pixel(5, 8), PLAYER_SPEED);
        for _ in 0..60 {
            player.update(Some(Direction::Right), false, &mut grid, DT);
        }
        assert_eq!(player.pos, grid_to_pixel(5, 8));
        assert!(grid.is_rock(6, 8));
    }

    #[test]
    fn test_pump_blocked_auto_retracts() {
        // Tunnel long enough for the full pump, dirt beyond it
        let mut grid = tunnel_grid(8, 2..=5);
        let mut player = Player::new(grid_to_pixel(2, 8), PLAYER_SPEED);

        let mut ticks = 0;
        while !player.pump.should_auto_retract && ticks < 600 {
            player.update(None, true, &mut grid, DT);
            ticks += 1;
        }
        assert!(player.pump.should_auto_retract);
        assert!(player.pump.target.is_none());

        let mut last = player.pump.length;
        assert!(last > 0.0);
        while player.is_pumping() {
            player.update(None, true, &mut grid, DT);
            if player.is_pumping() {
                assert!(player.pump.length < last);
                last = player.pump.length;
            }
        }
        assert_eq!(player.state, PlayerState::Normal);
        assert_eq!(player.pump.length, 0.0);
    }

    #[test]
    fn test_pump_stops_at_dirt() {
        let mut grid = tunnel_grid(8, 2..=3);
        let mut player = Player::new(grid_to_pixel(2, 8), PLAYER_SPEED);
        for _ in 0..30 {
            player.update(None, true, &mut grid, DT);
        }
        assert!(player.pump.blocked || player.pump.should_auto_retract || !player.is_pumping());
        // Never reaches into the dirt at column 4
        let (col, _) = pixel_to_grid(player.pump_endpoint());
        assert!(col <= 3);
    }

    #[test]
    fn test_pump_requires_release() {
        let mut grid = tunnel_grid(8, 2..=2);
        let mut player = Player::new(grid_to_pixel(2, 8), PLAYER_SPEED);
        // Blocked immediately; hold until fully retracted
        for _ in 0..120 {
            player.update(None, true, &mut grid, DT);
        }
        assert_eq!(player.state, PlayerState::Normal);
        player.update(None, true, &mut grid, DT);
        assert_eq!(player.state, PlayerState::Normal);
        player.update(None, false, &mut grid, DT);
        player.update(None, true, &mut grid, DT);
        assert_eq!(player.state, PlayerState::Pumping);
    }

    #[test]
    fn test_release_retracts_fast() {
        let mut grid = tunnel_grid(8, 2..=6);
        let mut player = Player::new(grid_to_pixel(2, 8), PLAYER_SPEED);
        for _ in 0..20 {
            player.update(None, true, &mut grid, DT);
        }
        let len = player.pump.length;
        assert!(len > 0.0);
        player.update(None, false, &mut grid, DT);
        assert!((len - player.pump.length - PUMP_RELEASE_RETRACT_SPEED * DT).abs() < 1e-3 || !player.is_pumping());
    }

    #[test]
    fn test_movement_blocked_while_pumping() {
        let mut grid = tunnel_grid(8, 2..=6);
        let mut player = Player::new(grid_to_pixel(2, 8), PLAYER_SPEED);
        player.update(None, true, &mut grid, DT);
        let pos = player.pos;
        player.update(Some(Direction::Right), true, &mut grid, DT);
        assert_eq!(player.pos, pos);
    }

    #[test]
    fn test_death_finishes_once() {
        let mut grid = Grid::default();
        let mut player = Player::new(grid_to_pixel(5, 8), PLAYER_SPEED);
        player.kill();
        let mut finished = 0;
        for _ in 0..200 {
            if player.update(Some(Direction::Left), false, &mut grid, DT).death_finished {
                finished += 1;
            }
        }
        assert_eq!(finished, 1);
        assert_eq!(player.pos, grid_to_pixel(5, 8));
    }

    #[test]
    fn test_smoosh_ignores_invincibility() {
        let mut player = Player::respawned(grid_to_pixel(5, 8), PLAYER_SPEED);
        assert!(player.is_invincible());
        player.smoosh(7);
        assert_eq!(player.state, PlayerState::Smooshed { rock_id: 7 });
        player.finish_smoosh();
        assert!(player.is_smooshed());
        assert!(player.is_dying());
    }

    proptest! {
        #[test]
        fn prop_player_never_enters_rock(
            rocks in proptest::collection::vec((0i32..GRID_WIDTH as i32, 2i32..GRID_HEIGHT as i32), 0..20),
            moves in proptest::collection::vec((0usize..4, 1usize..40), 1..20),
        ) {
            let mut grid = Grid::default();
            let start = (7, 9);
            for &(col, row) in &rocks {
                if (col, row) != start {
                    grid.place_rock(col, row);
                }
            }
            let mut player = Player::new(grid_to_pixel(start.0, start.1), PLAYER_SPEED);
            for &(dir, ticks) in &moves {
                for _ in 0..ticks {
                    player.update(Some(Direction::ALL[dir]), false, &mut grid, DT);
                    for (col, row) in corner_cells(player.pos) {
                        prop_assert!(!grid.is_rock(col, row));
                    }
                }
            }
        }
    }
}
