//! Dig Rush - A tunnel digging arcade game
//!
//! Core modules:
//! - `sim`: Deterministic simulation (grid, entities, collisions, level generation)
//! - `game`: Host wrapper (lifecycle, time source, callbacks, high score persistence)
//! - `highscores`: Leaderboard and persistence stores
//! - `tuning`: Data-driven game balance

pub mod game;
pub mod highscores;
pub mod sim;
pub mod tuning;

pub use game::Game;
pub use highscores::{HighScoreStore, HighScores, JsonFileStore, MemoryStore};
pub use tuning::Tuning;

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Game configuration constants
pub mod consts {
    /// Tile edge length in pixels
    pub const TILE_SIZE: f32 = 32.0;
    /// Grid dimensions in tiles
    pub const GRID_WIDTH: usize = 14;
    pub const GRID_HEIGHT: usize = 18;
    /// Topmost rows that are always empty sky
    pub const SKY_ROWS: usize = 2;
    /// Inset for the corner probes of a tile-sized hitbox
    pub const CORNER_INSET: f32 = 1.0;
    /// Tolerance when deciding whether a coordinate sits on a tile boundary
    pub const ALIGN_EPSILON: f32 = 0.01;

    /// Largest frame delta fed to the simulation (guards against tab suspension)
    pub const MAX_FRAME_DT: f32 = 0.1;

    /// Player
    pub const PLAYER_SPEED: f32 = 64.0;
    pub const STARTING_LIVES: u8 = 3;
    pub const MAX_LIVES: u8 = 9;
    pub const DEATH_DURATION: f32 = 1.5;
    pub const RESPAWN_DELAY: f32 = 1.0;
    pub const INVINCIBILITY_DURATION: f32 = 2.0;

    /// Pump
    pub const PUMP_MAX_LENGTH: f32 = TILE_SIZE * 3.0;
    pub const PUMP_EXTEND_SPEED: f32 = 192.0;
    pub const PUMP_RETRACT_SPEED: f32 = 192.0;
    pub const PUMP_RELEASE_RETRACT_SPEED: f32 = 384.0;
    pub const PUMP_GRACE_DELAY: f32 = 0.25;
    pub const PUMP_HIT_THRESHOLD: f32 = TILE_SIZE * 0.6;

    /// Enemies
    pub const ENEMY_SPAWN_HOLD: f32 = 1.0;
    pub const INFLATE_RATE: f32 = 1.0;
    pub const DEFLATE_RATE: f32 = 0.5;
    pub const POP_DURATION: f32 = 0.3;
    pub const MIN_GHOST_TIME: f32 = 1.0;
    pub const ESCAPE_DELAY: f32 = 8.0;

    /// Fygar fire breath
    pub const FIRE_BAND: f32 = TILE_SIZE * 0.5;
    pub const FIRE_RANGE: f32 = TILE_SIZE * 3.0;
    pub const FIRE_LENGTH: f32 = TILE_SIZE * 2.0;
    pub const FIRE_CHARGE_TIME: f32 = 0.5;
    pub const FIRE_ACTIVE_TIME: f32 = 0.6;
    pub const FIRE_COOLDOWN: f32 = 2.5;

    /// Rocks
    pub const ROCK_SHAKE_DURATION: f32 = 0.6;
    pub const ROCK_FALL_DELAY: f32 = 0.3;
    pub const ROCK_FALL_SPEED: f32 = 160.0;
    pub const ROCK_CRUMBLE_DURATION: f32 = 0.5;
    pub const ROCK_RESPAWN_DELAY: f32 = 10.0;
    /// Horizontal overlap needed before a rock notices the player beneath it
    pub const ROCK_BENEATH_OVERLAP: f32 = TILE_SIZE * 0.5;

    /// Phase timers
    pub const INTRO_DURATION: f32 = 2.0;
    pub const LEVEL_COMPLETE_DELAY: f32 = 2.0;

    /// Bonus items and floating scores
    pub const BONUS_ROCK_MILESTONE: u32 = 2;
    pub const BONUS_TTL: f32 = 10.0;
    pub const FLOATING_SCORE_TTL: f32 = 1.0;
    pub const FLOATING_SCORE_RISE: f32 = 24.0;

    /// Scoring
    pub const DIG_SCORE: u64 = 10;
    pub const EXTRA_LIFE_FIRST: u64 = 10_000;
    pub const EXTRA_LIFE_INTERVAL: u64 = 40_000;
}

/// One of the four cardinal movement directions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    /// Unit vector in screen space (y grows downward)
    #[inline]
    pub fn vector(self) -> Vec2 {
        match self {
            Direction::Up => Vec2::new(0.0, -1.0),
            Direction::Down => Vec2::new(0.0, 1.0),
            Direction::Left => Vec2::new(-1.0, 0.0),
            Direction::Right => Vec2::new(1.0, 0.0),
        }
    }

    /// Tile offset for this direction
    #[inline]
    pub fn offset(self) -> (i32, i32) {
        match self {
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }

    #[inline]
    pub fn opposite(self) -> Self {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }

    #[inline]
    pub fn is_horizontal(self) -> bool {
        matches!(self, Direction::Left | Direction::Right)
    }
}

/// Signed distance from `v` to the nearest tile boundary on one axis
#[inline]
pub fn axis_offset(v: f32) -> f32 {
    v - (v / consts::TILE_SIZE).round() * consts::TILE_SIZE
}

/// Whether a coordinate lies on a tile boundary
#[inline]
pub fn is_aligned(v: f32) -> bool {
    axis_offset(v).abs() < consts::ALIGN_EPSILON
}

/// Move `current` toward `target` by at most `max_delta`
#[inline]
pub fn approach(current: f32, target: f32, max_delta: f32) -> f32 {
    let delta = (target - current).clamp(-max_delta, max_delta);
    current + delta
}
