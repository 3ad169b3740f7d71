//! Game state and core simulation types
//!
//! Everything a tick reads or writes lives in `GameState`, so two states built
//! from the same seed and fed the same inputs stay identical.

use glam::Vec2;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::enemy::{Enemy, EnemyState, EnemyType, FireState};
use super::grid::{Grid, Tile, grid_to_pixel};
use super::level::{LevelGenerator, LevelLayout, player_start};
use super::player::Player;
use super::rock::Rock;
use crate::Direction;
use crate::consts::*;
use crate::tuning::Tuning;

/// Points added for the n-th enemy one rock crushes
pub const CRUSH_SCORES: [u64; 8] = [1000, 1500, 1500, 2000, 2000, 2000, 2000, 3000];

/// Bonus prize values by spawn sequence (last entry repeats)
pub const BONUS_VALUES: [u64; 14] = [
    400, 600, 800, 1000, 1000, 2000, 2000, 3000, 3000, 4000, 5000, 6000, 7000, 8000,
];

/// Current phase of the game
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum GamePhase {
    /// Waiting for a start input
    Menu,
    /// Level banner before play begins
    Intro { timer: f32 },
    Playing,
    Paused,
    /// Player death animation running (or a rock still carrying the player)
    Dying,
    /// Delay between a lost life and the player reappearing
    Respawning { timer: f32 },
    /// All enemies gone; next level after a short delay
    LevelComplete { timer: f32 },
    GameOver,
}

/// RNG state wrapper for serialization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RngState {
    pub seed: u64,
    pub stream: u64,
}

impl RngState {
    pub fn new(seed: u64) -> Self {
        Self { seed, stream: 0 }
    }

    /// Generator for one use; every call gets its own stream
    pub fn next_rng(&mut self) -> Pcg32 {
        let rng = Pcg32::new(self.seed, self.stream);
        self.stream = self.stream.wrapping_add(1);
        rng
    }
}

/// Counters that span ticks but belong to a run or a level
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Rocks that started falling this level
    pub rocks_dropped: u32,
    /// Whether this level's bonus has appeared
    pub bonus_spawned: bool,
    /// Bonuses spawned this run (selects the prize)
    pub bonus_sequence: u32,
    /// Score at which the next extra life is awarded
    pub next_extra_life: u64,
    /// Time the board has had no rocks
    pub rock_respawn_timer: f32,
    /// Time a single enemy has been left alive
    pub survivor_timer: f32,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            rocks_dropped: 0,
            bonus_spawned: false,
            bonus_sequence: 0,
            next_extra_life: EXTRA_LIFE_FIRST,
            rock_respawn_timer: 0.0,
            survivor_timer: 0.0,
        }
    }
}

impl Session {
    /// Clear the per-level counters; run-wide ones survive
    pub fn begin_level(&mut self) {
        self.rocks_dropped = 0;
        self.bonus_spawned = false;
        self.rock_respawn_timer = 0.0;
        self.survivor_timer = 0.0;
    }
}

/// A prize that sits at the player start until collected or expired
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BonusItem {
    pub id: u32,
    pub pos: Vec2,
    /// Spawn sequence index this prize was drawn from
    pub index: u32,
    pub value: u64,
    pub ttl: f32,
}

/// Points popping up where they were earned
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FloatingScore {
    pub pos: Vec2,
    pub value: u64,
    pub ttl: f32,
}

/// Notifications for the host, drained once per update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameEvent {
    ScoreChanged { score: u64 },
    ExtraLife { lives: u8 },
    LevelStarted { level: u32 },
    LifeLost { lives: u8 },
    LevelComplete { level: u32 },
    GameOver { score: u64, level: u32 },
}

/// Complete game state (deterministic, serializable)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameState {
    pub rng_state: RngState,
    pub tuning: Tuning,
    /// Current level (1-based)
    pub level: u32,
    pub lives: u8,
    pub score: u64,
    /// Simulation tick counter
    pub time_ticks: u64,
    pub phase: GamePhase,
    pub grid: Grid,
    pub player: Player,
    /// Sorted by id
    pub enemies: Vec<Enemy>,
    /// Sorted by id
    pub rocks: Vec<Rock>,
    pub bonuses: Vec<BonusItem>,
    pub floating_scores: Vec<FloatingScore>,
    pub session: Session,
    /// Layout the current level was built from (spawn tiles for respawn)
    pub layout: LevelLayout,
    #[serde(skip)]
    pub events: Vec<GameEvent>,
    next_id: u32,
}

impl GameState {
    pub fn new(seed: u64) -> Self {
        Self::with_tuning(seed, Tuning::default())
    }

    /// New state waiting in the menu
    pub fn with_tuning(seed: u64, tuning: Tuning) -> Self {
        let grid = Grid::default();
        let start = player_start(&grid);
        let player = Player::new(grid_to_pixel(start.0, start.1), tuning.player_speed);
        Self {
            rng_state: RngState::new(seed),
            tuning,
            level: 1,
            lives: STARTING_LIVES,
            score: 0,
            time_ticks: 0,
            phase: GamePhase::Menu,
            grid,
            player,
            enemies: Vec::new(),
            rocks: Vec::new(),
            bonuses: Vec::new(),
            floating_scores: Vec::new(),
            session: Session::default(),
            layout: LevelLayout {
                player_start: start,
                enemies: Vec::new(),
                rocks: Vec::new(),
            },
            events: Vec::new(),
            next_id: 1,
        }
    }

    /// Allocate a new entity ID
    pub fn next_entity_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Reset score and lives and start level 1 with its intro
    pub fn new_run(&mut self) {
        log::info!("New run (seed {})", self.rng_state.seed);
        self.score = 0;
        self.lives = STARTING_LIVES;
        self.level = 1;
        self.session = Session::default();
        self.start_level();
        self.phase = GamePhase::Intro { timer: 0.0 };
    }

    /// Generate the current level and populate every entity list
    pub fn start_level(&mut self) {
        self.session.begin_level();
        let rng = self.rng_state.next_rng();
        let layout = LevelGenerator::new(rng, &self.tuning).generate(&mut self.grid, self.level);

        let (col, row) = layout.player_start;
        self.player = Player::new(grid_to_pixel(col, row), self.tuning.player_speed);

        self.enemies.clear();
        for spawn in &layout.enemies {
            let id = self.next_entity_id();
            self.enemies
                .push(Enemy::new(id, spawn.kind, spawn.col, spawn.row, &self.grid));
        }
        self.rocks.clear();
        for &(col, row) in &layout.rocks {
            let id = self.next_entity_id();
            self.rocks.push(Rock::new(id, col, row));
        }
        self.bonuses.clear();
        self.floating_scores.clear();
        self.layout = layout;
        self.events.push(GameEvent::LevelStarted { level: self.level });
    }

    /// Start tile of the current level in pixels
    pub fn player_start_pos(&self) -> Vec2 {
        let (col, row) = self.layout.player_start;
        grid_to_pixel(col, row)
    }

    /// Put the player back at the start and send enemies home
    pub fn respawn_player(&mut self) {
        self.player = Player::respawned(self.player_start_pos(), self.tuning.player_speed);
        for enemy in &mut self.enemies {
            enemy.reset_to_spawn(&self.grid);
        }
        self.session.survivor_timer = 0.0;
    }

    /// Add points, with a floating indicator at `at` when given
    pub fn add_score(&mut self, points: u64, at: Option<Vec2>) {
        if points == 0 {
            return;
        }
        self.score += points;
        if let Some(pos) = at {
            self.floating_scores.push(FloatingScore {
                pos,
                value: points,
                ttl: FLOATING_SCORE_TTL,
            });
        }
        self.events.push(GameEvent::ScoreChanged { score: self.score });

        while self.score >= self.session.next_extra_life {
            self.session.next_extra_life += EXTRA_LIFE_INTERVAL;
            if self.lives < MAX_LIVES {
                self.lives += 1;
                log::info!("Extra life at {} ({} lives)", self.score, self.lives);
                self.events.push(GameEvent::ExtraLife { lives: self.lives });
            }
        }
    }

    /// Drop this level's bonus prize at the player start
    pub fn spawn_bonus(&mut self) {
        let index = self.session.bonus_sequence;
        let value = BONUS_VALUES[(index as usize).min(BONUS_VALUES.len() - 1)];
        let id = self.next_entity_id();
        self.bonuses.push(BonusItem {
            id,
            pos: self.player_start_pos(),
            index,
            value,
            ttl: BONUS_TTL,
        });
        self.session.bonus_sequence += 1;
        self.session.bonus_spawned = true;
        log::debug!("Bonus {index} ({value} points) spawned");
    }

    /// Take the pending host notifications
    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    /// Read-only view for renderers
    pub fn snapshot(&self) -> Snapshot {
        let player = &self.player;
        Snapshot {
            phase: self.phase,
            grid_width: self.grid.width(),
            grid_height: self.grid.height(),
            tiles: self.grid.tiles().to_vec(),
            player: PlayerView {
                pos: player.pos,
                facing: player.facing,
                sprite_facing: player.sprite_facing,
                moving: player.moving,
                digging: player.digging,
                pumping: player.is_pumping(),
                pump_endpoint: player.is_pumping().then(|| player.pump_endpoint()),
                dying: player.is_dying(),
                smooshed: player.is_smooshed(),
                invincible: player.is_invincible(),
            },
            enemies: self
                .enemies
                .iter()
                .map(|e| EnemyView {
                    id: e.id,
                    kind: e.enemy_type(),
                    pos: e.pos,
                    direction: e.direction,
                    ghosting: e.is_ghosting(),
                    inflation: e.inflation(),
                    smooshed: e.is_smooshed(),
                    escaping: e.state == EnemyState::Escaping,
                    fire: e.fire().map(|f| f.state),
                })
                .collect(),
            rocks: self
                .rocks
                .iter()
                .map(|r| RockView {
                    id: r.id,
                    pos: r.pos,
                    shaking: r.is_shaking(),
                    falling: r.is_falling(),
                    crumbling: r.is_crumbling(),
                })
                .collect(),
            bonuses: self.bonuses.clone(),
            floating_scores: self.floating_scores.clone(),
            score: self.score,
            lives: self.lives,
            level: self.level,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerView {
    pub pos: Vec2,
    pub facing: Direction,
    pub sprite_facing: Direction,
    pub moving: bool,
    pub digging: bool,
    pub pumping: bool,
    pub pump_endpoint: Option<Vec2>,
    pub dying: bool,
    pub smooshed: bool,
    pub invincible: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnemyView {
    pub id: u32,
    pub kind: EnemyType,
    pub pos: Vec2,
    pub direction: Direction,
    pub ghosting: bool,
    /// 0 = normal size, 1 = about to pop
    pub inflation: f32,
    pub smooshed: bool,
    /// Running for the exit
    pub escaping: bool,
    /// Fygar only
    pub fire: Option<FireState>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RockView {
    pub id: u32,
    pub pos: Vec2,
    pub shaking: bool,
    pub falling: bool,
    pub crumbling: bool,
}

/// Everything a renderer needs for one frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub phase: GamePhase,
    pub grid_width: usize,
    pub grid_height: usize,
    /// Row-major
    pub tiles: Vec<Tile>,
    pub player: PlayerView,
    pub enemies: Vec<EnemyView>,
    pub rocks: Vec<RockView>,
    pub bonuses: Vec<BonusItem>,
    pub floating_scores: Vec<FloatingScore>,
    pub score: u64,
    pub lives: u8,
    pub level: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_state_waits_in_menu() {
        let state = GameState::new(1);
        assert_eq!(state.phase, GamePhase::Menu);
        assert!(state.enemies.is_empty());
        assert_eq!(state.lives, STARTING_LIVES);
    }

    #[test]
    fn test_new_run_populates_level() {
        let mut state = GameState::new(42);
        state.new_run();
        assert_eq!(state.phase, GamePhase::Intro { timer: 0.0 });
        assert!(state.enemies.len() >= 3);
        assert!(state.rocks.len() >= 3);
        for rock in &state.rocks {
            assert!(state.grid.is_rock(rock.col, rock.row));
        }
        assert!(state.drain_events().contains(&GameEvent::LevelStarted { level: 1 }));
    }

    #[test]
    fn test_rng_streams_differ() {
        use rand::Rng;
        let mut rng_state = RngState::new(7);
        let a: u64 = rng_state.next_rng().random();
        let b: u64 = rng_state.next_rng().random();
        assert_ne!(a, b);
        assert_eq!(rng_state.stream, 2);
    }

    #[test]
    fn test_extra_life_thresholds() {
        let mut state = GameState::new(1);
        state.add_score(9_990, None);
        assert_eq!(state.lives, STARTING_LIVES);
        state.add_score(10, None);
        assert_eq!(state.lives, STARTING_LIVES + 1);
        assert_eq!(state.session.next_extra_life, 50_000);
        state.add_score(40_000, None);
        assert_eq!(state.lives, STARTING_LIVES + 2);
    }

    #[test]
    fn test_lives_capped() {
        let mut state = GameState::new(1);
        state.lives = MAX_LIVES;
        state.add_score(10_000, None);
        assert_eq!(state.lives, MAX_LIVES);
    }

    #[test]
    fn test_score_spawns_floating_indicator() {
        let mut state = GameState::new(1);
        state.add_score(DIG_SCORE, None);
        assert!(state.floating_scores.is_empty());
        state.add_score(200, Some(Vec2::new(64.0, 96.0)));
        assert_eq!(state.floating_scores.len(), 1);
        assert_eq!(state.floating_scores[0].value, 200);
        let events = state.drain_events();
        assert_eq!(events.last(), Some(&GameEvent::ScoreChanged { score: 210 }));
    }

    #[test]
    fn test_bonus_values_saturate() {
        let mut state = GameState::new(1);
        state.session.bonus_sequence = 40;
        state.spawn_bonus();
        assert_eq!(state.bonuses[0].value, 8000);
        assert!(state.session.bonus_spawned);
        assert_eq!(state.bonuses[0].pos, state.player_start_pos());
    }

    #[test]
    fn test_snapshot_serializes() {
        let mut state = GameState::new(3);
        state.new_run();
        let snapshot = state.snapshot();
        assert_eq!(snapshot.tiles.len(), GRID_WIDTH * GRID_HEIGHT);
        assert_eq!(snapshot.enemies.len(), state.enemies.len());
        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.contains("\"level\":1"));
    }
}
