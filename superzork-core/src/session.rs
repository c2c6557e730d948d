//! GameSession - the primary public API for running an adventure.
//!
//! A session owns one scenario, one transcript, and one inference client,
//! and lives from startup until the player quits. The turn cycle is split
//! into explicit steps so that failures commit nothing they shouldn't:
//!
//! 1. [`GameSession::begin_turn`] accounts for the player's input, evicting
//!    old history to fit the token budget, then appends the player turn.
//! 2. [`GameSession::stream_reply`] opens the streaming inference call.
//! 3. [`GameSession::commit_reply`] records the narration - only once the
//!    stream finished cleanly. A failed or cancelled call leaves the
//!    transcript with the player turn and no narration, ready for
//!    [`GameSession::retry`].

use crate::context::{ContextError, ContextWindow};
use crate::narrator::{self, Preamble, OPENING_INSTRUCTION};
use crate::scenario::{Scenario, ScenarioError};
use crate::tokens::{TokenEstimator, WordEstimator};
use crate::transcript::{Transcript, TranscriptError, Turn, TurnRole};
use ollama::{ChatRequest, ChatStream, Ollama};
use thiserror::Error;

/// Errors from session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("configuration error: {0}")]
    Scenario(#[from] ScenarioError),

    #[error("{0}")]
    Context(#[from] ContextError),

    #[error("{0}")]
    Transcript(#[from] TranscriptError),

    #[error("inference error: {0}")]
    Client(#[from] ollama::Error),
}

impl SessionError {
    /// Whether reporting this error and carrying on is reasonable.
    pub fn is_recoverable(&self) -> bool {
        match self {
            SessionError::Scenario(_) => false,
            SessionError::Context(_) | SessionError::Transcript(_) => true,
            SessionError::Client(e) => e.is_recoverable(),
        }
    }
}

/// A running adventure.
pub struct GameSession {
    scenario: Scenario,
    client: Ollama,
    estimator: Box<dyn TokenEstimator>,
    preamble: Preamble,
    window: ContextWindow,
    transcript: Transcript,
}

impl GameSession {
    /// Create a session with the default word-count token estimator.
    pub fn new(scenario: Scenario) -> Self {
        Self::with_estimator(scenario, Box::new(WordEstimator))
    }

    /// Load a story file and start a session from it.
    pub async fn from_story_file(
        path: impl AsRef<std::path::Path>,
    ) -> Result<Self, SessionError> {
        let scenario = Scenario::load(path).await?;
        Ok(Self::new(scenario))
    }

    /// Create a session with a custom token estimator.
    pub fn with_estimator(scenario: Scenario, estimator: Box<dyn TokenEstimator>) -> Self {
        let client = Ollama::new(&scenario.ollama_url);
        let preamble = Preamble::build(&scenario, estimator.as_ref());
        let window = ContextWindow::new(scenario.num_tokens as usize);

        Self {
            scenario,
            client,
            estimator,
            preamble,
            window,
            transcript: Transcript::new(),
        }
    }

    pub fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    pub fn preamble(&self) -> &Preamble {
        &self.preamble
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// The instruction that opens a fresh adventure, to be played as the
    /// first turn.
    pub fn opening_instruction(&self) -> &'static str {
        OPENING_INSTRUCTION
    }

    /// Approximate size of the prompt as it stands: preamble plus history.
    pub fn prompt_tokens(&self) -> usize {
        self.preamble.tokens() + self.transcript.total_tokens()
    }

    /// Account for a new player turn: evict history as needed, then append.
    ///
    /// Returns how many old turns were evicted. On
    /// [`ContextError::OversizedInput`] the input is rejected and the
    /// transcript is unchanged.
    pub fn begin_turn(&mut self, input: &str) -> Result<usize, SessionError> {
        let tokens = self.estimator.estimate(input);
        let turn = Turn::player(input, tokens);

        let evicted = self
            .window
            .reserve(&mut self.transcript, self.preamble.tokens(), &turn)?;
        self.transcript.push(turn);

        Ok(evicted)
    }

    /// Build the chat request for the current transcript.
    pub fn chat_request(&self) -> ChatRequest {
        ChatRequest::new(
            &self.scenario.model,
            narrator::build_messages(&self.preamble, &self.transcript),
        )
        .with_num_ctx(self.scenario.num_tokens)
        .with_temperature(self.scenario.temperature)
    }

    /// Open a streaming inference call for the current transcript.
    pub async fn stream_reply(&self) -> Result<ChatStream, SessionError> {
        Ok(self.client.chat_stream(self.chat_request()).await?)
    }

    /// Account for the player turn and open the reply stream in one step.
    pub async fn play(&mut self, input: &str) -> Result<ChatStream, SessionError> {
        self.begin_turn(input)?;
        self.stream_reply().await
    }

    /// Re-open a stream without appending anything. After a connection
    /// failure or timeout the triggering player turn is still in the
    /// transcript, so a retry reuses it as-is.
    pub async fn retry(&self) -> Result<ChatStream, SessionError> {
        self.stream_reply().await
    }

    /// Whether the transcript ends with a player turn still waiting on
    /// narration - true after a failed or cancelled call.
    pub fn awaiting_reply(&self) -> bool {
        matches!(
            self.transcript.last().map(|t| t.role),
            Some(TurnRole::Player)
        )
    }

    /// Record a completed narration.
    pub fn commit_reply(&mut self, text: &str) {
        let tokens = self.estimator.estimate(text);
        self.transcript.push(Turn::narrator(text, tokens));
    }

    /// Remove the most recent narration so the player can rewrite what
    /// just happened.
    pub fn undo(&mut self) -> Result<Turn, SessionError> {
        Ok(self.transcript.undo()?)
    }

    /// Append replacement narration after an undo.
    pub fn replace_reply(&mut self, text: &str) {
        self.commit_reply(text);
    }

    /// Full prompt history for inspection: the preamble as a system entry,
    /// followed by every turn in order.
    pub fn debug_entries(&self) -> Vec<(TurnRole, &str)> {
        let mut entries = Vec::with_capacity(self.transcript.len() + 1);
        entries.push((TurnRole::System, self.preamble.text()));
        entries.extend(self.transcript.debug_entries());
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario(num_tokens: u32) -> Scenario {
        Scenario {
            model: "phi4-mini".to_string(),
            ollama_url: "http://localhost:11434".to_string(),
            num_tokens,
            temperature: 0.7,
            story_card: "A forgotten vault beneath the city.".to_string(),
            player_card: "A locksmith with a guilty conscience.".to_string(),
            companion_cards: Vec::new(),
            system_prompt: None,
        }
    }

    #[test]
    fn test_begin_and_commit_round_trip() {
        let mut session = GameSession::new(scenario(4096));

        session.begin_turn("pick the lock").unwrap();
        assert!(session.awaiting_reply());

        session.commit_reply("The tumblers click into place.");
        assert!(!session.awaiting_reply());
        assert_eq!(session.transcript().len(), 2);
    }

    #[test]
    fn test_chat_request_carries_scenario_settings() {
        let mut session = GameSession::new(scenario(2048));
        session.begin_turn("listen at the door").unwrap();

        let request = session.chat_request();
        assert_eq!(request.model, "phi4-mini");
        assert_eq!(request.num_ctx, Some(2048));
        assert_eq!(request.temperature, Some(0.7));
        // System preamble plus the one player turn
        assert_eq!(request.messages.len(), 2);
    }

    #[test]
    fn test_oversized_input_leaves_transcript_unchanged() {
        let mut session = GameSession::new(scenario(400));
        session.begin_turn("a short action").unwrap();
        session.commit_reply("Noted.");
        let before = session.transcript().len();

        // 400 words can never fit a 400-token budget alongside the preamble
        let tirade = "word ".repeat(400);
        let result = session.begin_turn(&tirade);

        assert!(matches!(
            result,
            Err(SessionError::Context(ContextError::OversizedInput { .. }))
        ));
        assert_eq!(session.transcript().len(), before);
    }

    #[test]
    fn test_undo_then_replace() {
        let mut session = GameSession::new(scenario(4096));
        session.begin_turn("open the vault").unwrap();
        session.commit_reply("The vault swings open onto darkness.");

        let removed = session.undo().unwrap();
        assert!(removed.text.contains("swings open"));

        session.replace_reply("The vault door refuses to budge.");
        let entries = session.transcript().debug_entries();
        assert_eq!(entries.last().unwrap().1, "The vault door refuses to budge.");
    }

    #[test]
    fn test_debug_entries_lead_with_preamble() {
        let mut session = GameSession::new(scenario(4096));
        session.begin_turn("look").unwrap();

        let entries = session.debug_entries();
        assert_eq!(entries[0].0, TurnRole::System);
        assert!(entries[0].1.contains("forgotten vault"));
        assert_eq!(entries[1].0, TurnRole::Player);
    }

    #[tokio::test]
    async fn test_from_story_file_wraps_scenario_errors() {
        let result = GameSession::from_story_file("no/such/story.yaml").await;
        assert!(matches!(result, Err(SessionError::Scenario(_))));
    }

    #[test]
    fn test_prompt_tokens_tracks_history() {
        let mut session = GameSession::new(scenario(4096));
        let base = session.prompt_tokens();

        session.begin_turn("one two three").unwrap();
        assert_eq!(session.prompt_tokens(), base + 3);
    }
}
