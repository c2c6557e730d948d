//! AI text adventure engine with token-budgeted context management.
//!
//! This crate provides:
//! - YAML scenario loading and validation
//! - A linear conversation transcript with one-level undo
//! - FIFO token-budget eviction of old history at prompt-build time
//! - Streamed narration through a local Ollama server
//!
//! # Quick Start
//!
//! ```ignore
//! use futures::StreamExt;
//! use superzork_core::{GameSession, Scenario, StreamEvent};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let scenario = Scenario::load("stories/zork_adventure.yaml").await?;
//!     let mut session = GameSession::new(scenario);
//!
//!     let mut stream = session.play("I light the lantern").await?;
//!     let mut narration = String::new();
//!     while let Some(event) = stream.next().await {
//!         if let StreamEvent::Delta { content } = event? {
//!             print!("{content}");
//!             narration.push_str(&content);
//!         }
//!     }
//!     session.commit_reply(&narration);
//!     Ok(())
//! }
//! ```

pub mod context;
pub mod narrator;
pub mod scenario;
pub mod session;
pub mod testing;
pub mod tokens;
pub mod transcript;

// Primary public API
pub use context::{ContextError, ContextWindow};
pub use scenario::{Scenario, ScenarioError};
pub use session::{GameSession, SessionError};
pub use tokens::{TokenEstimator, WordEstimator};
pub use transcript::{Transcript, TranscriptError, Turn, TurnRole};

// Client types the front-end needs to drive a reply stream
pub use ollama::{ChatStream, StreamEvent};
