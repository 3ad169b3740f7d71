//! Dig Rush headless runner
//!
//! Plays the simulation in attract mode with no renderer attached and reports
//! how the run went. Useful for soak tests and tuning experiments.

#[cfg(not(target_arch = "wasm32"))]
mod native {
    use std::path::PathBuf;
    use std::process::ExitCode;

    use clap::Parser;

    use dig_rush::sim::{GamePhase, TickInput};
    use dig_rush::{Game, HighScoreStore, JsonFileStore, MemoryStore, Tuning};

    /// Simulated frame rate of the fake clock
    const FRAME_MS: f64 = 1000.0 / 60.0;

    /// Play attract mode headless and report the outcome
    #[derive(Debug, Parser)]
    #[command(version, about, long_about = None)]
    struct Args {
        /// Seed for level generation
        #[arg(long, default_value_t = 1)]
        seed: u64,
        /// Number of simulated frames
        #[arg(long, default_value_t = 60 * 120)]
        ticks: u64,
        /// Tuning overrides as JSON
        #[arg(long, value_name = "FILE")]
        tuning: Option<PathBuf>,
        /// Persist high scores to this JSON file
        #[arg(long, value_name = "FILE")]
        scores: Option<PathBuf>,
        /// Dump the final snapshot as JSON
        #[arg(long)]
        json: bool,
    }

    fn run<S: HighScoreStore>(mut game: Game<S>, args: &Args) {
        game.on_level_complete(|level| log::info!("Cleared level {level}"));
        game.on_game_over(|score| log::info!("Game over with {score}"));
        game.start();

        let input = TickInput {
            idle_mode: true,
            ..Default::default()
        };
        let mut runs = 0u32;
        let mut was_over = false;
        for frame in 0..args.ticks {
            game.update(frame as f64 * FRAME_MS, &input);
            let over = game.state().phase == GamePhase::GameOver;
            if over && !was_over {
                runs += 1;
            }
            was_over = over;
        }

        let state = game.state();
        println!(
            "seed {} after {} ticks: level {}, score {}, lives {}, finished runs {}, high score {}",
            args.seed,
            args.ticks,
            state.level,
            state.score,
            state.lives,
            runs,
            game.high_score()
        );
        if args.json {
            match serde_json::to_string_pretty(&game.snapshot()) {
                Ok(json) => println!("{json}"),
                Err(e) => log::error!("Could not encode snapshot: {e}"),
            }
        }
    }

    pub fn main() -> ExitCode {
        env_logger::init();

        let args = Args::parse();

        let tuning = match &args.tuning {
            Some(path) => match Tuning::load(path) {
                Ok(tuning) => tuning,
                Err(e) => {
                    eprintln!("failed to load tuning from {}: {e}", path.display());
                    return ExitCode::FAILURE;
                }
            },
            None => Tuning::default(),
        };

        log::info!("Dig Rush (headless) seed {}", args.seed);
        match &args.scores {
            Some(path) => run(Game::with_tuning(args.seed, tuning, JsonFileStore::new(path.clone())), &args),
            None => run(Game::with_tuning(args.seed, tuning, MemoryStore::default()), &args),
        }
        ExitCode::SUCCESS
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use clap::CommandFactory;

        #[test]
        fn test_cli_definition() {
            Args::command().debug_assert();
        }

        #[test]
        fn test_cli_defaults() {
            let args = Args::try_parse_from(["dig-rush"]).unwrap();
            assert_eq!(args.seed, 1);
            assert_eq!(args.ticks, 7200);
            assert!(args.tuning.is_none());
            assert!(!args.json);
        }

        #[test]
        fn test_cli_flags() {
            let args = Args::try_parse_from([
                "dig-rush", "--seed", "42", "--ticks", "600", "--scores", "s.json", "--json",
            ])
            .unwrap();
            assert_eq!(args.seed, 42);
            assert_eq!(args.ticks, 600);
            assert_eq!(args.scores, Some(PathBuf::from("s.json")));
            assert!(args.json);
            assert!(Args::try_parse_from(["dig-rush", "--seed", "x"]).is_err());
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn main() -> std::process::ExitCode {
    native::main()
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // The library is driven by the host page on the web; there is no binary entry
}
