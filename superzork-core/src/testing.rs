//! Testing utilities for the adventure engine.
//!
//! This module provides tools for integration testing:
//! - `MockNarrator` for deterministic sessions without a live model
//! - `TestHarness` for scripted adventures
//! - Assertion helpers for verifying budget invariants

use crate::scenario::Scenario;
use crate::session::{GameSession, SessionError};
use crate::tokens::TokenEstimator;

/// A scripted reply from the mock narrator.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Narration, returned as if the stream completed cleanly.
    Narration(String),
    /// A transport failure surfaced instead of narration.
    Failure(MockFailure),
}

/// The transport failures a script can simulate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    Timeout,
    ConnectionRefused,
}

impl MockFailure {
    fn into_error(self) -> ollama::Error {
        match self {
            MockFailure::Timeout => ollama::Error::Timeout,
            MockFailure::ConnectionRefused => {
                ollama::Error::Connection("connection refused".to_string())
            }
        }
    }
}

impl MockReply {
    /// Create a narration reply.
    pub fn narration(text: impl Into<String>) -> Self {
        MockReply::Narration(text.into())
    }
}

/// A narrator that returns scripted replies in order.
///
/// Use this for deterministic tests without a running Ollama server.
pub struct MockNarrator {
    replies: Vec<MockReply>,
    next: usize,
}

impl MockNarrator {
    pub fn new(replies: Vec<MockReply>) -> Self {
        Self { replies, next: 0 }
    }

    /// Add a reply to the queue.
    pub fn queue(&mut self, reply: MockReply) {
        self.replies.push(reply);
    }

    /// Take the next scripted reply, or a default once exhausted.
    pub fn next_reply(&mut self) -> MockReply {
        if self.next < self.replies.len() {
            let reply = self.replies[self.next].clone();
            self.next += 1;
            reply
        } else {
            MockReply::narration("The narrator has no more scripted replies.")
        }
    }
}

/// Test harness for running scripted adventures.
///
/// Drives a real [`GameSession`] - real eviction, real transcript state -
/// with the mock narrator standing in for the inference call.
pub struct TestHarness {
    pub session: GameSession,
    pub narrator: MockNarrator,
}

impl TestHarness {
    /// Create a harness with the sample scenario.
    pub fn new() -> Self {
        Self::with_scenario(sample_scenario(4096))
    }

    /// Create a harness with a custom scenario.
    pub fn with_scenario(scenario: Scenario) -> Self {
        Self {
            session: GameSession::new(scenario),
            narrator: MockNarrator::new(Vec::new()),
        }
    }

    /// Create a harness with a custom scenario and estimator.
    pub fn with_estimator(scenario: Scenario, estimator: Box<dyn TokenEstimator>) -> Self {
        Self {
            session: GameSession::with_estimator(scenario, estimator),
            narrator: MockNarrator::new(Vec::new()),
        }
    }

    /// Queue a narration reply.
    pub fn expect_narration(&mut self, text: impl Into<String>) -> &mut Self {
        self.narrator.queue(MockReply::narration(text));
        self
    }

    /// Queue a transport failure.
    pub fn expect_failure(&mut self, failure: MockFailure) -> &mut Self {
        self.narrator.queue(MockReply::Failure(failure));
        self
    }

    /// Drive one full turn: account for the input, then either commit the
    /// scripted narration or surface the scripted failure. A failure
    /// leaves the player turn in the transcript with no narration,
    /// exactly as a live transport failure would.
    pub fn input(&mut self, text: &str) -> Result<String, SessionError> {
        self.session.begin_turn(text)?;

        match self.narrator.next_reply() {
            MockReply::Narration(narration) => {
                self.session.commit_reply(&narration);
                Ok(narration)
            }
            MockReply::Failure(failure) => Err(SessionError::Client(failure.into_error())),
        }
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// A small, valid scenario for tests.
pub fn sample_scenario(num_tokens: u32) -> Scenario {
    Scenario {
        model: "phi4-mini".to_string(),
        ollama_url: "http://localhost:11434".to_string(),
        num_tokens,
        temperature: 0.7,
        story_card: "The Great Underground Empire stirs again.".to_string(),
        player_card: "A treasure hunter with a brass lantern.".to_string(),
        companion_cards: Vec::new(),
        system_prompt: None,
    }
}

// ============================================================================
// Assertion Helpers
// ============================================================================

/// Assert that the session's prompt currently fits its token budget.
#[track_caller]
pub fn assert_budget_holds(harness: &TestHarness) {
    let used = harness.session.prompt_tokens();
    let budget = harness.session.scenario().num_tokens as usize;
    assert!(
        used <= budget,
        "Expected prompt to fit budget: {used} tokens used, budget {budget}"
    );
}

/// Assert the transcript holds exactly `expected` turns.
#[track_caller]
pub fn assert_turn_count(harness: &TestHarness, expected: usize) {
    let actual = harness.session.transcript().len();
    assert_eq!(actual, expected, "Expected {expected} turns, got {actual}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_narrator_basic() {
        let mut harness = TestHarness::new();
        harness.expect_narration("You stand at the mouth of a cave.");

        let narration = harness.input("I look around").unwrap();

        assert_eq!(narration, "You stand at the mouth of a cave.");
        assert_turn_count(&harness, 2);
    }

    #[test]
    fn test_mock_narrator_failure_commits_nothing() {
        let mut harness = TestHarness::new();
        harness.expect_failure(MockFailure::ConnectionRefused);

        let result = harness.input("I descend the stairs");

        assert!(matches!(
            result,
            Err(SessionError::Client(ollama::Error::Connection(_)))
        ));
        assert!(harness.session.awaiting_reply());
        assert_turn_count(&harness, 1);
    }

    #[test]
    fn test_mock_narrator_default_after_exhaustion() {
        let mut harness = TestHarness::new();
        harness.expect_narration("Reply 1");

        assert_eq!(harness.input("first").unwrap(), "Reply 1");
        assert!(harness
            .input("second")
            .unwrap()
            .contains("no more scripted"));
    }
}
