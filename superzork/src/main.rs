//! SuperZork: AI-powered text adventure for the terminal.
//!
//! Loads a YAML story file, connects to a local Ollama server, and runs an
//! interactive narration loop:
//!
//! ```bash
//! superzork --story stories/zork_adventure.yaml
//! ```

mod repl;

use crossterm::style::Stylize;
use std::path::PathBuf;
use std::process::ExitCode;
use superzork_core::{GameSession, Scenario};

#[tokio::main]
async fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return ExitCode::SUCCESS;
    }

    if args.iter().any(|a| a == "--list" || a == "-l") {
        return list_stories();
    }

    let Some(story_path) = story_arg(&args) else {
        eprintln!("{}", "Error: no story file given.".red());
        eprintln!("Usage: superzork --story <FILE>   (--list shows available stories)");
        return ExitCode::FAILURE;
    };

    let scenario = match Scenario::load(&story_path).await {
        Ok(scenario) => scenario,
        Err(e) => {
            eprintln!(
                "{}",
                format!("Error in story file {}: {e}", story_path.display()).red()
            );
            return ExitCode::FAILURE;
        }
    };

    for warning in scenario.lint() {
        eprintln!("{}", format!("Warning: {warning}").yellow());
    }

    let session = GameSession::new(scenario);
    match repl::run(session).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", format!("Fatal error: {e}").red());
            ExitCode::FAILURE
        }
    }
}

/// Find the value following `-s`/`--story`.
fn story_arg(args: &[String]) -> Option<PathBuf> {
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "-s" || arg == "--story" {
            return iter.next().map(PathBuf::from);
        }
    }
    None
}

/// List story files shipped in the stories directory.
fn list_stories() -> ExitCode {
    let entries = match std::fs::read_dir("stories") {
        Ok(entries) => entries,
        Err(_) => {
            eprintln!("No stories directory found.");
            return ExitCode::FAILURE;
        }
    };

    let mut stories: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "yaml"))
        .collect();
    stories.sort();

    if stories.is_empty() {
        eprintln!("No story files found in the stories directory.");
        return ExitCode::FAILURE;
    }

    println!("\nAvailable Adventures:");
    println!("{}", "=".repeat(50));
    for (i, story) in stories.iter().enumerate() {
        let name = story
            .file_stem()
            .map(|stem| stem.to_string_lossy().replace('_', " "))
            .unwrap_or_default();
        println!("{}. {name}", i + 1);
        println!("   File: {}", story.display());
    }

    ExitCode::SUCCESS
}

fn print_help() {
    println!("SuperZork - AI-powered text adventure");
    println!();
    println!("USAGE:");
    println!("  superzork --story <FILE>");
    println!();
    println!("OPTIONS:");
    println!("  -s, --story <FILE>  YAML story configuration to play");
    println!("  -l, --list          List story files in the stories directory");
    println!("  -h, --help          Show this help message");
    println!();
    println!("EXAMPLES:");
    println!("  superzork --story stories/zork_adventure.yaml");
    println!("  superzork --list");
}
