//! Interactive adventure loop: command dispatch and streamed narration.
//!
//! Four commands are matched before anything reaches the model - `quit`,
//! `undo`, `debug`, `help`. Everything else becomes a player turn. All
//! engine errors surface here as colored messages; none of them end the
//! session.

use crossterm::style::Stylize;
use futures::StreamExt;
use std::io::{self, BufRead, Write};
use superzork_core::{ChatStream, GameSession, SessionError, StreamEvent, TurnRole};

const BANNER_WIDTH: usize = 60;
const DEBUG_TEXT_WIDTH: usize = 100;

/// Run the adventure until the player quits or input ends.
pub async fn run(mut session: GameSession) -> io::Result<()> {
    print_welcome(&session);

    println!("{}", "\nSetting the scene...\n".yellow());
    let opening = session.opening_instruction().to_string();
    let mut can_retry = drive_turn(&mut session, Some(&opening)).await;

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        print!("\n{} ", ">".green().bold());
        io::stdout().flush()?;

        let Some(line) = lines.next() else {
            println!("\n{}", "Input ended. Farewell, adventurer!".yellow());
            break;
        };
        let input = line?.trim().to_string();

        if input.is_empty() {
            // An empty line after a failed call retries the pending turn
            if can_retry && session.awaiting_reply() {
                can_retry = drive_turn(&mut session, None).await;
            }
            continue;
        }

        match input.to_lowercase().as_str() {
            "quit" => {
                print_farewell();
                break;
            }
            "undo" => handle_undo(&mut session, &mut lines)?,
            "debug" => print_debug(&session),
            "help" => print_help(),
            _ => {
                can_retry = drive_turn(&mut session, Some(&input)).await;
            }
        }
    }

    Ok(())
}

/// What happened to one streamed narration.
enum StreamOutcome {
    Finished(String),
    Failed(SessionError),
    Cancelled,
}

/// Play one turn (or retry the pending one) and stream the narration.
///
/// Returns true when a recoverable failure left the player turn pending,
/// so an empty line can retry it.
async fn drive_turn(session: &mut GameSession, input: Option<&str>) -> bool {
    let opened = match input {
        Some(text) => session.play(text).await,
        None => session.retry().await,
    };

    let stream = match opened {
        Ok(stream) => stream,
        Err(e) => return report_error(&e),
    };

    match consume_stream(stream).await {
        StreamOutcome::Finished(narration) => {
            if !narration.is_empty() {
                session.commit_reply(&narration);
            }
            println!();
            false
        }
        StreamOutcome::Failed(e) => report_error(&e),
        StreamOutcome::Cancelled => {
            println!("\n{}", "-- narration interrupted --".yellow());
            println!(
                "{}",
                "Press Enter to ask again, or type a different action.".yellow()
            );
            true
        }
    }
}

/// Print deltas as they arrive. Ctrl-C stops reading further chunks; the
/// partial narration is discarded, never committed.
async fn consume_stream(mut stream: ChatStream) -> StreamOutcome {
    let mut narration = String::new();

    loop {
        tokio::select! {
            event = stream.next() => match event {
                Some(Ok(StreamEvent::Delta { content })) => {
                    print!("{}", content.as_str().blue());
                    let _ = io::stdout().flush();
                    narration.push_str(&content);
                }
                Some(Ok(StreamEvent::Done { .. })) | None => {
                    return StreamOutcome::Finished(narration);
                }
                Some(Err(e)) => return StreamOutcome::Failed(SessionError::Client(e)),
            },
            _ = tokio::signal::ctrl_c() => return StreamOutcome::Cancelled,
        }
    }
}

/// Report a turn failure. Returns true when the turn is still pending and
/// worth retrying.
fn report_error(error: &SessionError) -> bool {
    match error {
        SessionError::Client(e) if e.is_recoverable() => {
            println!(
                "\n{}",
                format!("The connection to the realm faltered: {e}").red()
            );
            println!(
                "{}",
                "Check that Ollama is running, then press Enter to retry.".yellow()
            );
            true
        }
        _ => {
            println!("\n{}", error.to_string().red());
            false
        }
    }
}

/// Remove the last narration and offer to rewrite it.
fn handle_undo(
    session: &mut GameSession,
    lines: &mut impl Iterator<Item = io::Result<String>>,
) -> io::Result<()> {
    match session.undo() {
        Ok(_) => {
            println!("\n{}", "--- Story Modification Mode ---".magenta());
            println!(
                "{}",
                "How would you like what just happened to read instead?".yellow()
            );
            print!("{} ", "(story update)>".magenta());
            io::stdout().flush()?;

            let replacement = match lines.next() {
                Some(line) => line?.trim().to_string(),
                None => String::new(),
            };

            if replacement.is_empty() {
                println!("{}", "Last narration removed.".yellow());
            } else {
                session.replace_reply(&replacement);
                println!("{}", format!("Story updated: {replacement}").blue());
            }
        }
        Err(e) => println!("{}", e.to_string().red()),
    }

    Ok(())
}

/// Numbered role/text history, preamble first, text flattened and truncated.
fn print_debug(session: &GameSession) {
    println!("\n{}", "--- Debug: Conversation History ---".magenta());

    for (i, (role, text)) in session.debug_entries().iter().enumerate() {
        let line = format!(
            "{}. [{}]: {}",
            i + 1,
            role.label(),
            truncate(text, DEBUG_TEXT_WIDTH)
        );
        let styled = match role {
            TurnRole::Player => line.green(),
            TurnRole::Narrator => line.blue(),
            TurnRole::System => line.cyan(),
        };
        println!("{styled}");
    }

    println!(
        "{}",
        format!(
            "Prompt size: ~{} of {} tokens",
            session.prompt_tokens(),
            session.scenario().num_tokens
        )
        .magenta()
    );
    println!("{}", "--- End Debug ---".magenta());
}

fn truncate(text: &str, max_chars: usize) -> String {
    let mut flattened = text.replace('\n', " ");
    if let Some((idx, _)) = flattened.char_indices().nth(max_chars) {
        flattened.truncate(idx);
        flattened.push_str("...");
    }
    flattened
}

fn print_welcome(session: &GameSession) {
    let rule = "=".repeat(BANNER_WIDTH);
    println!("{}", rule.as_str().cyan().bold());
    println!(
        "{}",
        "    SUPERZORK: THE GREAT UNDERGROUND EMPIRE AWAKENS"
            .cyan()
            .bold()
    );
    println!("{}", rule.as_str().cyan().bold());
    println!(
        "{}",
        "Welcome to SuperZork! An AI-powered text adventure.".yellow()
    );
    println!(
        "{}",
        "Type your actions naturally. The narrator responds dynamically.".yellow()
    );
    println!(
        "{}",
        "Commands: 'quit' to exit, 'undo' to modify the story, 'debug' for history, 'help' for help"
            .magenta()
    );
    println!(
        "{}",
        format!(
            "Model: {} via {}",
            session.scenario().model,
            session.scenario().ollama_url
        )
        .dark_grey()
    );
    println!("{}", rule.as_str().cyan());
}

fn print_farewell() {
    let rule = "=".repeat(50);
    println!("\n{}", rule.as_str().cyan());
    println!("{}", "Thanks for playing SuperZork!".yellow());
    println!(
        "{}",
        "The Great Underground Empire awaits your return...".cyan()
    );
    println!("{}", rule.as_str().cyan());
}

fn print_help() {
    println!("\n{}", "--- SuperZork Help ---".cyan());
    println!("{}", "Available Commands:".yellow());
    println!("  quit  - Exit the game");
    println!("  undo  - Rewrite the last narration");
    println!("  debug - Show conversation history and prompt size");
    println!("  help  - Show this help message");
    println!();
    println!("{}", "Gameplay Tips:".yellow());
    println!("  Type actions naturally: 'go north', 'examine door', 'take lamp'");
    println!("  Be creative - the narrator responds to unexpected actions");
    println!("  Classic adventure commands work: look, inventory, use");
    println!("  Pay attention to descriptions for clues and hidden details");
    println!("{}", "--- End Help ---".cyan());
}
