//! Data-driven game balance
//!
//! Every knob that changes with the level number lives here so a JSON file can
//! rebalance the game without touching the simulation. Missing fields fall
//! back to the defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::consts::PLAYER_SPEED;
use crate::highscores::StoreError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    /// Player walk/dig speed (pixels/s)
    pub player_speed: f32,

    // === Enemy movement ===
    /// Enemy roaming speed on level 1 (pixels/s)
    pub enemy_base_speed: f32,
    /// Added per level after the first
    pub enemy_speed_per_level: f32,
    pub enemy_max_speed: f32,
    /// Multiplier applied while ghosting through dirt
    pub ghost_speed_factor: f32,
    /// Seconds of roaming before an enemy may ghost (level 1)
    pub ghost_interval_base: f32,
    pub ghost_interval_step: f32,
    pub ghost_interval_min: f32,

    // === Level population ===
    pub base_enemies: u32,
    pub max_enemies: u32,
    pub fygar_ratio_base: f32,
    pub fygar_ratio_step: f32,
    pub fygar_ratio_max: f32,
    pub base_rocks: u32,
    pub max_rocks: u32,
    /// Floor the rock placement must always reach
    pub min_rocks: u32,
    /// Levels needed for one more rock
    pub levels_per_rock: u32,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            player_speed: PLAYER_SPEED,

            enemy_base_speed: 40.0,
            enemy_speed_per_level: 2.5,
            enemy_max_speed: 80.0,
            ghost_speed_factor: 0.6,
            ghost_interval_base: 6.0,
            ghost_interval_step: 0.25,
            ghost_interval_min: 2.0,

            base_enemies: 3,
            max_enemies: 8,
            fygar_ratio_base: 0.2,
            fygar_ratio_step: 0.05,
            fygar_ratio_max: 0.5,
            base_rocks: 3,
            max_rocks: 6,
            min_rocks: 3,
            levels_per_rock: 4,
        }
    }
}

impl Tuning {
    pub fn from_json(json: &str) -> Result<Self, StoreError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load from a JSON file on disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let json = std::fs::read_to_string(path.as_ref())?;
        let tuning = Self::from_json(&json)?;
        log::info!("Loaded tuning from {}", path.as_ref().display());
        Ok(tuning)
    }

    /// Roaming speed for a level (1-based)
    pub fn enemy_speed(&self, level: u32) -> f32 {
        let steps = level.saturating_sub(1) as f32;
        (self.enemy_base_speed + steps * self.enemy_speed_per_level).min(self.enemy_max_speed)
    }

    pub fn ghost_speed(&self, level: u32) -> f32 {
        self.enemy_speed(level) * self.ghost_speed_factor
    }

    pub fn ghost_interval(&self, level: u32) -> f32 {
        let steps = level.saturating_sub(1) as f32;
        (self.ghost_interval_base - steps * self.ghost_interval_step).max(self.ghost_interval_min)
    }

    /// Enemy count before the random bump
    pub fn base_enemy_count(&self, level: u32) -> u32 {
        (self.base_enemies + level.saturating_sub(1) / 2).min(self.max_enemies)
    }

    /// Share of the enemies that are Fygars
    pub fn fygar_ratio(&self, level: u32) -> f32 {
        let steps = level.saturating_sub(1) as f32;
        (self.fygar_ratio_base + steps * self.fygar_ratio_step).min(self.fygar_ratio_max)
    }

    pub fn rock_count(&self, level: u32) -> u32 {
        let per = self.levels_per_rock.max(1);
        (self.base_rocks + level.saturating_sub(1) / per)
            .min(self.max_rocks)
            .max(self.min_rocks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enemy_speed_capped() {
        let t = Tuning::default();
        assert_eq!(t.enemy_speed(1), 40.0);
        assert!(t.enemy_speed(5) > t.enemy_speed(1));
        assert_eq!(t.enemy_speed(200), t.enemy_max_speed);
        assert!(t.ghost_speed(1) < t.enemy_speed(1));
    }

    #[test]
    fn test_fygar_ratio_caps_at_half() {
        let t = Tuning::default();
        assert!((t.fygar_ratio(1) - 0.2).abs() < 1e-6);
        assert_eq!(t.fygar_ratio(50), 0.5);
    }

    #[test]
    fn test_rock_count_bounds() {
        let t = Tuning::default();
        assert_eq!(t.rock_count(1), 3);
        assert_eq!(t.rock_count(5), 4);
        assert_eq!(t.rock_count(10), 5);
        assert_eq!(t.rock_count(30), 6);
    }

    #[test]
    fn test_ghost_interval_floor() {
        let t = Tuning::default();
        assert_eq!(t.ghost_interval(1), 6.0);
        assert_eq!(t.ghost_interval(100), t.ghost_interval_min);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let t = Tuning::from_json(r#"{ "max_rocks": 4 }"#).unwrap();
        assert_eq!(t.max_rocks, 4);
        assert_eq!(t.base_enemies, Tuning::default().base_enemies);
    }

    #[test]
    fn test_bad_json_is_an_error() {
        assert!(Tuning::from_json("{ not json").is_err());
    }
}
