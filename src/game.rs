//! Host-facing wrapper around the simulation
//!
//! `Game` owns a `GameState`, turns a millisecond clock into tick deltas,
//! forwards simulation events to registered callbacks and records finished
//! runs in a `HighScoreStore`.

use crate::highscores::HighScoreStore;
use crate::sim::{GameEvent, GamePhase, GameState, Snapshot, TickInput, tick};
use crate::tuning::Tuning;

type ScoreCallback = Box<dyn FnMut(u64)>;
type LevelCallback = Box<dyn FnMut(u32)>;

pub struct Game<S: HighScoreStore> {
    state: GameState,
    store: S,
    high_score: u64,
    running: bool,
    /// Timestamp of the previous update, `None` until the first one
    last_time_ms: Option<f64>,
    on_score_change: Vec<ScoreCallback>,
    on_level_complete: Vec<LevelCallback>,
    on_game_over: Vec<ScoreCallback>,
}

impl<S: HighScoreStore> Game<S> {
    pub fn new(seed: u64, store: S) -> Self {
        Self::with_tuning(seed, Tuning::default(), store)
    }

    pub fn with_tuning(seed: u64, tuning: Tuning, mut store: S) -> Self {
        let high_score = store.load_high_score();
        Self {
            state: GameState::with_tuning(seed, tuning),
            store,
            high_score,
            running: false,
            last_time_ms: None,
            on_score_change: Vec::new(),
            on_level_complete: Vec::new(),
            on_game_over: Vec::new(),
        }
    }

    /// Begin ticking from the menu
    pub fn start(&mut self) {
        log::info!("Game started (high score {})", self.high_score);
        self.running = true;
        self.last_time_ms = None;
        self.state.phase = GamePhase::Menu;
    }

    /// Halt ticking. In-flight timers are dropped with the next `start`.
    pub fn stop(&mut self) {
        log::info!("Game stopped");
        self.running = false;
        self.last_time_ms = None;
    }

    pub fn pause(&mut self) {
        if self.state.phase == GamePhase::Playing {
            self.state.phase = GamePhase::Paused;
        }
    }

    pub fn resume(&mut self) {
        if self.state.phase == GamePhase::Paused {
            self.state.phase = GamePhase::Playing;
            // Time spent paused is not simulated
            self.last_time_ms = None;
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Advance to `now_ms` (monotonic milliseconds) with this frame's input
    pub fn update(&mut self, now_ms: f64, input: &TickInput) {
        if !self.running {
            return;
        }
        let dt = match self.last_time_ms {
            Some(prev) => ((now_ms - prev) / 1000.0).max(0.0) as f32,
            None => 0.0,
        };
        self.last_time_ms = Some(now_ms);

        tick(&mut self.state, input, dt);
        self.dispatch_events();
    }

    fn dispatch_events(&mut self) {
        for event in self.state.drain_events() {
            match event {
                GameEvent::ScoreChanged { score } => {
                    self.high_score = self.high_score.max(score);
                    for callback in &mut self.on_score_change {
                        callback(score);
                    }
                }
                GameEvent::LevelComplete { level } => {
                    for callback in &mut self.on_level_complete {
                        callback(level);
                    }
                }
                GameEvent::GameOver { score, level } => {
                    self.store.save_high_score(score, level);
                    log::info!("Run saved: {score} on level {level}");
                    for callback in &mut self.on_game_over {
                        callback(score);
                    }
                }
                GameEvent::ExtraLife { .. }
                | GameEvent::LevelStarted { .. }
                | GameEvent::LifeLost { .. } => {}
            }
        }
    }

    /// Called with the new total whenever the score changes
    pub fn on_score_change(&mut self, callback: impl FnMut(u64) + 'static) {
        self.on_score_change.push(Box::new(callback));
    }

    /// Called with the finished level number
    pub fn on_level_complete(&mut self, callback: impl FnMut(u32) + 'static) {
        self.on_level_complete.push(Box::new(callback));
    }

    /// Called with the final score
    pub fn on_game_over(&mut self, callback: impl FnMut(u64) + 'static) {
        self.on_game_over.push(Box::new(callback));
    }

    pub fn snapshot(&self) -> Snapshot {
        self.state.snapshot()
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    /// Best of the stored record and the current run
    pub fn high_score(&self) -> u64 {
        self.high_score
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::highscores::MemoryStore;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn started_game(seed: u64) -> Game<MemoryStore> {
        let mut game = Game::new(seed, MemoryStore::default());
        game.start();
        game
    }

    fn press_start() -> TickInput {
        TickInput {
            start: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_stopped_game_does_not_tick() {
        let mut game = Game::new(1, MemoryStore::default());
        game.update(0.0, &press_start());
        assert_eq!(game.state().time_ticks, 0);

        game.start();
        game.update(0.0, &press_start());
        assert_eq!(game.state().time_ticks, 1);

        game.stop();
        game.update(16.0, &TickInput::default());
        assert_eq!(game.state().time_ticks, 1);
    }

    #[test]
    fn test_clock_drives_delta() {
        let mut game = started_game(2);
        game.update(1000.0, &press_start());
        game.update(1250.0, &TickInput::default());
        match game.state().phase {
            GamePhase::Intro { timer } => assert!((timer - 0.1).abs() < 1e-6),
            other => panic!("unexpected phase {other:?}"),
        }
        game.update(1300.0, &TickInput::default());
        match game.state().phase {
            GamePhase::Intro { timer } => assert!((timer - 0.15).abs() < 1e-5),
            other => panic!("unexpected phase {other:?}"),
        }
    }

    #[test]
    fn test_pause_and_resume() {
        let mut game = started_game(3);
        game.state.new_run();
        game.state.phase = GamePhase::Playing;
        game.pause();
        assert_eq!(game.state().phase, GamePhase::Paused);
        game.resume();
        assert_eq!(game.state().phase, GamePhase::Playing);
    }

    #[test]
    fn test_callbacks_fire() {
        let mut game = started_game(4);
        let scores = Rc::new(RefCell::new(Vec::new()));
        let levels = Rc::new(RefCell::new(Vec::new()));
        {
            let scores = scores.clone();
            game.on_score_change(move |s| scores.borrow_mut().push(s));
        }
        {
            let levels = levels.clone();
            game.on_level_complete(move |l| levels.borrow_mut().push(l));
        }

        game.state.new_run();
        game.state.phase = GamePhase::Playing;
        game.state.enemies.clear();
        game.state.add_score(500, None);
        game.update(0.0, &TickInput::default());

        assert_eq!(*scores.borrow(), vec![500]);
        assert_eq!(*levels.borrow(), vec![1]);
        assert_eq!(game.high_score(), 500);
    }

    #[test]
    fn test_game_over_saves_score() {
        let mut game = started_game(5);
        let finals = Rc::new(RefCell::new(Vec::new()));
        {
            let finals = finals.clone();
            game.on_game_over(move |s| finals.borrow_mut().push(s));
        }

        game.state.new_run();
        game.state.phase = GamePhase::Playing;
        game.state.rocks.clear();
        game.state.lives = 1;
        game.state.score = 1234;
        game.state.player.kill();

        let mut now = 0.0;
        for _ in 0..200 {
            game.update(now, &TickInput::default());
            now += 1000.0 / 60.0;
        }
        assert_eq!(game.state().phase, GamePhase::GameOver);
        assert_eq!(*finals.borrow(), vec![1234]);
        assert_eq!(game.store().scores.best(), 1234);
    }

    #[test]
    fn test_high_score_loaded_from_store() {
        let mut store = MemoryStore::default();
        store.save_high_score(9000, 4);
        let game = Game::new(6, store);
        assert_eq!(game.high_score(), 9000);
    }
}
