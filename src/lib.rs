//! Song Bracket
//!
//! Single-elimination tournament engine for picking a favourite song:
//! - `registry` validates and orders the songs entered
//! - `bracket` builds the rounds, auto-advances BYEs and tracks votes
//! - `commands` is the controller a UI drives, one mutex around the bracket
//!
//! # Usage
//!
//! ```bash
//! song-bracket music/*.mp3
//! ```

pub mod types;
pub mod error;
pub mod config;
pub mod registry;
pub mod bracket;
pub mod commands;

use types::*;
use config::*;

use std::{
    env,
    fs,
    io::{self, BufRead, Write},
    path::PathBuf,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

pub use bracket::{Bracket, Match, Round};
pub use error::{BracketError, Result};
pub use registry::{extension_validator, CompetitorRegistry};

fn print_usage() {
    println!("Song Bracket");
    println!();
    println!("Usage:");
    println!("  song-bracket <song> <song> [song...]");
    println!();
    println!("Each match prints two songs; answer 1 or 2 to vote, q to quit.");
    println!();
    println!("Environment:");
    println!("  SONG_BRACKET_CONFIG       config file (default {CONFIG_FILE_NAME})");
    println!("  SONG_BRACKET_EXTENSIONS   accepted extensions, comma separated");
    println!("  SONG_BRACKET_LOGS_DIR     log directory");
    println!("  SONG_BRACKET_RESULTS_LOG  append winners to {RESULTS_LOG_FILE_NAME} (1/0)");
    println!("  RUST_LOG                  log filter (default info)");
}

enum Prompt {
    Vote(VoteSlot),
    Quit,
    Retry,
}

fn parse_prompt(line: &str) -> Prompt {
    match line.trim().to_ascii_lowercase().as_str() {
        "1" | "a" => Prompt::Vote(VoteSlot::A),
        "2" | "b" => Prompt::Vote(VoteSlot::B),
        "q" | "quit" => Prompt::Quit,
        _ => Prompt::Retry,
    }
}

fn print_bracket(state: &BracketState) {
    for round in &state.rounds {
        if !round.generated {
            continue;
        }
        println!("── {} ──", round.label);
        for m in &round.matches {
            let winner = m.winner_name.as_deref().unwrap_or("-");
            println!("  {} vs {}  →  {}", m.slot_a.name, m.slot_b.name, winner);
        }
    }
}

fn vote_loop(state: &SharedTournament) -> std::result::Result<(), String> {
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    let mut shown_round = None;

    while let Some(up) = commands::tournament_current_match(state)? {
        if shown_round != Some(up.round_index) {
            print_bracket(&commands::tournament_state(state)?);
            shown_round = Some(up.round_index);
        }
        println!();
        println!("{} ({})", up.round_label, up.match_id);
        println!("  1) {}", up.competitor_a.name);
        println!("  2) {}", up.competitor_b.name);
        print!("Vote [1/2/q]: ");
        io::stdout().flush().map_err(|e| e.to_string())?;

        let Some(line) = lines.next() else {
            return Err("Input closed before the tournament finished.".to_string());
        };
        let line = line.map_err(|e| e.to_string())?;
        match parse_prompt(&line) {
            Prompt::Vote(pick) => {
                if let Err(e) = commands::tournament_vote(pick, state) {
                    println!("{e}");
                }
            }
            Prompt::Quit => return Err("Tournament abandoned.".to_string()),
            Prompt::Retry => println!("Answer 1 or 2."),
        }
    }

    println!();
    print_bracket(&commands::tournament_state(state)?);
    let champion = commands::tournament_champion(state)?;
    println!();
    println!("The winner is: {}", champion.name);
    Ok(())
}

// ── Entry point ────────────────────────────────────────────────────────

pub fn run() {
    load_env_file();
    let config = load_config_inner().unwrap_or_else(|e| {
        eprintln!("{e}; using default settings");
        AppConfig::default()
    });

    // Initialize tracing with file output
    let logs_dir = logs_dir(&config);
    fs::create_dir_all(&logs_dir).ok();
    let file_appender = tracing_appender::rolling::daily(&logs_dir, LOG_FILE_NAME);
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(non_blocking)
        .with_ansi(false)
        .init();
    info!("Song Bracket starting");
    log_config_warnings(&config);

    let args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() || args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return;
    }

    let state = TournamentState::shared(config);
    for raw in &args {
        match commands::tournament_register_path(&PathBuf::from(raw), &state) {
            Ok(entry) => println!("Added: {}", entry.name),
            Err(e) => eprintln!("Skipped {raw}: {e}"),
        }
    }

    if let Err(e) = commands::tournament_start(&state) {
        error!("Could not start tournament: {e}");
        eprintln!("{e}");
        return;
    }
    if let Err(e) = vote_loop(&state) {
        error!("{e}");
        eprintln!("{e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_prompt() {
        assert!(matches!(parse_prompt(" 1 "), Prompt::Vote(VoteSlot::A)));
        assert!(matches!(parse_prompt("B"), Prompt::Vote(VoteSlot::B)));
        assert!(matches!(parse_prompt("quit"), Prompt::Quit));
        assert!(matches!(parse_prompt("3"), Prompt::Retry));
        assert!(matches!(parse_prompt(""), Prompt::Retry));
    }
}
