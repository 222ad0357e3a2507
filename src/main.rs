use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use tracing_subscriber::EnvFilter;

use std::fs::File;
use std::io::{stdin, stdout, BufRead, BufReader, Write};
use std::path::PathBuf;
use std::time::Duration;

use connect4_engine::api::{self, MoveRequest};
use connect4_engine::*;

mod terminal;

/// Connect 4 AI move engine
#[derive(Parser)]
#[command(name = "connect4")]
#[command(about = "Pick Connect 4 moves with negamax or Monte-Carlo tree search")]
struct Cli {
    /// Path to a TOML engine config
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Overrides the engine of the config (mcts or negamax)
    #[arg(short, long, global = true)]
    engine: Option<EngineKind>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer move requests, one JSON object per line, from stdin or a file
    Move {
        /// Read requests from this file instead of stdin
        #[arg(short, long)]
        input: Option<PathBuf>,
    },
    /// Play an interactive game in the terminal
    Play,
    /// Play negamax against MCTS and report the results
    Arena {
        /// Number of games, each engine plays first in half of them
        #[arg(short, long, default_value = "10")]
        games: usize,

        /// Time budget per move in milliseconds
        #[arg(short, long, default_value = "200")]
        time_ms: u64,

        /// Base seed, game `i` uses `seed + i`
        #[arg(long, default_value = "42")]
        seed: u64,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = EngineConfig::load(cli.config.as_deref())?;
    if let Some(engine) = cli.engine {
        config.engine = engine;
    }

    match cli.command {
        Commands::Move { input } => answer_requests(config, input),
        Commands::Play => play(config),
        Commands::Arena {
            games,
            time_ms,
            seed,
        } => arena(config, games, Duration::from_millis(time_ms), seed),
    }
}

/// Answers each request line with a response line, sharing one session
fn answer_requests(config: EngineConfig, input: Option<PathBuf>) -> Result<()> {
    let reader: Box<dyn BufRead> = match input {
        Some(path) => Box::new(BufReader::new(
            File::open(&path).with_context(|| format!("failed to open {}", path.display()))?,
        )),
        None => Box::new(BufReader::new(stdin())),
    };

    let mut selector = MoveSelector::new(config);
    let mut stdout = stdout();

    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let request: MoveRequest =
            serde_json::from_str(&line).with_context(|| format!("invalid move request: {}", line))?;

        let output = match api::respond(&mut selector, &request) {
            Ok(response) => serde_json::to_string(&response)?,
            Err(err) => serde_json::json!({ "error": err.to_string() }).to_string(),
        };
        writeln!(stdout, "{}", output)?;
        stdout.flush()?;
    }
    Ok(())
}

fn ask_yes_no(question: &str) -> Result<bool> {
    loop {
        let mut buffer = String::new();
        print!("{}", question);
        stdout().flush()?;
        stdin().read_line(&mut buffer)?;
        match buffer.to_lowercase().chars().next() {
            Some('y') => return Ok(true),
            Some('n') => return Ok(false),
            _ => println!("Unknown answer given"),
        }
    }
}

fn play(config: EngineConfig) -> Result<()> {
    println!("Welcome to Connect 4\n");

    let ai_players = (
        ask_yes_no("Is player 1 AI controlled? y/n: ")?,
        ask_yes_no("Is player 2 AI controlled? y/n: ")?,
    );
    let mut selectors = (
        MoveSelector::new(config.clone()),
        MoveSelector::new(config),
    );
    let mut position = Position::new();

    // game loop
    loop {
        terminal::display(&position)?;

        match position.result() {
            None => {
                let side = position.side_to_move();
                let ai_controlled = match side {
                    Side::One => ai_players.0,
                    Side::Two => ai_players.1,
                };

                let next_move = if ai_controlled {
                    println!("AI is thinking...");
                    stdout().flush()?;

                    // slow down play if both players are AI
                    if ai_players == (true, true) {
                        std::thread::sleep(Duration::from_secs(1));
                    }

                    let selector = match side {
                        Side::One => &mut selectors.0,
                        Side::Two => &mut selectors.1,
                    };
                    let decision = selector.choose(&position, &position.legal_moves())?;
                    match (decision.score, decision.depth) {
                        (Some(score), Some(depth)) => {
                            println!("Score {} at depth {}", score, depth)
                        }
                        (Some(score), None) => println!("Expected result {:.3}", score),
                        _ => {}
                    }
                    println!("Best move: {}", decision.column + 1);
                    decision.column

                // human player
                } else {
                    print!("Move input > ");
                    stdout().flush()?;
                    let mut input_str = String::new();
                    stdin().read_line(&mut input_str)?;

                    match input_str.trim().parse::<usize>() {
                        Ok(column @ 1..=WIDTH) => column - 1,
                        Ok(column) => {
                            println!(
                                "Invalid move, column {} out of range. Columns must be between 1 and {}",
                                column, WIDTH
                            );
                            continue;
                        }
                        Err(_) => {
                            println!("Invalid number: {}", input_str.trim());
                            continue;
                        }
                    }
                };

                match position.play(next_move) {
                    Ok(next) => position = next,
                    Err(_) => {
                        println!("Invalid move, column {} full", next_move + 1);
                        // try the move again
                        continue;
                    }
                }
            }

            // end states
            Some(GameResult::Win(side)) => {
                println!("{} wins!", side);
                break;
            }
            Some(GameResult::Draw) => {
                println!("Draw!");
                break;
            }
        }
    }
    Ok(())
}

/// Plays one game between two engines, returning the side negamax played and the result
fn arena_game(
    config: &EngineConfig,
    game: usize,
    time_budget: Duration,
    seed: u64,
) -> Result<(Side, GameResult)> {
    let negamax_side = if game % 2 == 0 { Side::One } else { Side::Two };
    let player = |engine: EngineKind| {
        MoveSelector::new(EngineConfig {
            engine,
            seed: Some(seed.wrapping_add(game as u64)),
            negamax: config.negamax.clone(),
            mcts: config.mcts.clone(),
            ..EngineConfig::with_fixed_budget(engine, time_budget)
        })
    };
    let (mut one, mut two) = match negamax_side {
        Side::One => (player(EngineKind::Negamax), player(EngineKind::Mcts)),
        Side::Two => (player(EngineKind::Mcts), player(EngineKind::Negamax)),
    };
    let mut position = Position::new();
    loop {
        if let Some(result) = position.result() {
            return Ok((negamax_side, result));
        }
        let selector = match position.side_to_move() {
            Side::One => &mut one,
            Side::Two => &mut two,
        };
        let decision = selector.choose(&position, &position.legal_moves())?;
        position = position.play(decision.column)?;
    }
}

fn arena(config: EngineConfig, games: usize, time_budget: Duration, seed: u64) -> Result<()> {
    let bar = ProgressBar::new(games as u64);
    bar.set_style(ProgressStyle::with_template(
        "{bar:40.cyan/blue} {pos}/{len} games, eta {eta}",
    )?);

    // every game owns its selectors, nothing is shared between threads
    let results: Vec<Result<(Side, GameResult)>> = (0..games)
        .into_par_iter()
        .map(|game| {
            let result = arena_game(&config, game, time_budget, seed);
            bar.inc(1);
            result
        })
        .collect();
    bar.finish();

    let (mut negamax_wins, mut mcts_wins, mut draws) = (0, 0, 0);
    for result in results {
        match result? {
            (_, GameResult::Draw) => draws += 1,
            (negamax_side, GameResult::Win(winner)) if winner == negamax_side => negamax_wins += 1,
            (_, GameResult::Win(_)) => mcts_wins += 1,
        }
    }

    println!(
        "{} games: negamax {} wins, mcts {} wins, {} draws",
        games, negamax_wins, mcts_wins, draws
    );
    Ok(())
}
