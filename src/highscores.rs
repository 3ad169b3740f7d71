//! High score leaderboard and persistence
//!
//! The simulation only needs `load_high_score`/`save_high_score`; stores swallow
//! their own I/O failures and log them so a broken disk never stops a game.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Maximum number of high scores to keep
pub const MAX_HIGH_SCORES: usize = 10;

/// Failure reading or writing a JSON file
#[derive(Debug)]
pub enum StoreError {
    Io(std::io::Error),
    Parse(serde_json::Error),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Io(e) => write!(f, "io error: {e}"),
            StoreError::Parse(e) => write!(f, "parse error: {e}"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Io(e) => Some(e),
            StoreError::Parse(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Io(e)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Parse(e)
    }
}

/// A single high score entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighScoreEntry {
    pub score: u64,
    /// Level reached
    pub level: u32,
}

/// High score leaderboard, sorted descending
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HighScores {
    pub entries: Vec<HighScoreEntry>,
}

impl HighScores {
    /// Best score on the board, 0 when empty
    pub fn best(&self) -> u64 {
        self.entries.first().map_or(0, |e| e.score)
    }

    /// Insert a finished run in rank order. False when it did not make the board.
    pub fn record(&mut self, score: u64, level: u32) -> bool {
        if score == 0 {
            return false;
        }
        let at = self
            .entries
            .iter()
            .position(|e| score > e.score)
            .unwrap_or(self.entries.len());
        if at >= MAX_HIGH_SCORES {
            return false;
        }
        self.entries.insert(at, HighScoreEntry { score, level });
        self.entries.truncate(MAX_HIGH_SCORES);
        true
    }
}

/// Persistence collaborator used by the host
pub trait HighScoreStore {
    /// Best score on record, 0 when nothing was saved
    fn load_high_score(&mut self) -> u64;
    /// Record a finished run
    fn save_high_score(&mut self, score: u64, level: u32);
}

/// In-memory store (tests, attract mode)
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    pub scores: HighScores,
}

impl HighScoreStore for MemoryStore {
    fn load_high_score(&mut self) -> u64 {
        self.scores.best()
    }

    fn save_high_score(&mut self, score: u64, level: u32) {
        self.scores.record(score, level);
    }
}

/// Leaderboard persisted as a JSON file
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Read the leaderboard; a missing file is an empty board
    pub fn read(&self) -> Result<HighScores, StoreError> {
        match std::fs::read_to_string(&self.path) {
            Ok(json) => Ok(serde_json::from_str(&json)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HighScores::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn write(&self, scores: &HighScores) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(scores)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

impl HighScoreStore for JsonFileStore {
    fn load_high_score(&mut self) -> u64 {
        match self.read() {
            Ok(scores) => {
                log::info!("Loaded {} high scores", scores.entries.len());
                scores.best()
            }
            Err(e) => {
                log::warn!("Could not load high scores from {}: {e}", self.path.display());
                0
            }
        }
    }

    fn save_high_score(&mut self, score: u64, level: u32) {
        let mut scores = self.read().unwrap_or_else(|e| {
            log::warn!("Discarding unreadable high scores: {e}");
            HighScores::default()
        });
        if !scores.record(score, level) {
            return;
        }
        match self.write(&scores) {
            Ok(()) => log::info!("High scores saved ({} entries)", scores.entries.len()),
            Err(e) => log::warn!("Could not save high scores to {}: {e}", self.path.display()),
        }
    }
}
