//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Time only advances through the `dt` handed to `tick`
//! - Seeded RNG only
//! - Stable iteration order (by entity ID)
//! - No rendering or platform dependencies

pub mod collision;
pub mod enemy;
pub mod grid;
pub mod level;
pub mod player;
pub mod rock;
pub mod state;
pub mod tick;

pub use collision::{Aabb, line_of_sight, point_segment_distance, tiles_overlap};
pub use enemy::{Enemy, EnemyKind, EnemyState, EnemyType, FireBreath, FireState};
pub use grid::{Grid, Tile, grid_to_pixel, pixel_to_grid};
pub use level::{EnemySpawn, LevelGenerator, LevelLayout};
pub use player::{Player, PlayerState, Pump};
pub use rock::{Rock, RockState};
pub use state::{
    BonusItem, EnemyView, FloatingScore, GameEvent, GamePhase, GameState, PlayerView, RockView,
    Session, Snapshot,
};
pub use tick::{TickInput, acquire_pump_target, tick};
