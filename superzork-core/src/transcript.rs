//! Conversation transcript for a running adventure.
//!
//! The transcript is the ordered history of player and narrator turns.
//! It is append-only except for two operations: budget eviction removes
//! turns from the oldest end, and `undo` removes the most recent narration
//! so the player can substitute a different outcome.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from transcript operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TranscriptError {
    #[error("nothing to undo")]
    NothingToUndo,
}

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnRole {
    System,
    Player,
    Narrator,
}

impl TurnRole {
    /// Uppercase label for display.
    pub fn label(&self) -> &'static str {
        match self {
            TurnRole::System => "SYSTEM",
            TurnRole::Player => "PLAYER",
            TurnRole::Narrator => "NARRATOR",
        }
    }
}

/// One unit of conversation history.
///
/// The token count is the estimate computed when the turn was created and
/// never changes afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: TurnRole,
    pub text: String,
    pub tokens: usize,
}

impl Turn {
    pub fn new(role: TurnRole, text: impl Into<String>, tokens: usize) -> Self {
        Self {
            role,
            text: text.into(),
            tokens,
        }
    }

    /// Create a player turn.
    pub fn player(text: impl Into<String>, tokens: usize) -> Self {
        Self::new(TurnRole::Player, text, tokens)
    }

    /// Create a narrator turn.
    pub fn narrator(text: impl Into<String>, tokens: usize) -> Self {
        Self::new(TurnRole::Narrator, text, tokens)
    }
}

/// The ordered history of turns for the current session.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    turns: Vec<Turn>,
    last_undone: Option<Turn>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a turn. No budget check happens here: the context window is
    /// enforced at prompt-build time, so history may exceed the budget
    /// between turns.
    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// Permanently remove and return the oldest turn.
    pub fn evict_oldest(&mut self) -> Option<Turn> {
        if self.turns.is_empty() {
            None
        } else {
            Some(self.turns.remove(0))
        }
    }

    /// Remove the most recent narration so the player can rewrite it.
    ///
    /// Applies only when the transcript currently ends with a narrator
    /// turn; otherwise there is nothing to undo and the transcript is left
    /// unchanged. The removed turn is stashed, which keeps undo at exactly
    /// one level deep.
    pub fn undo(&mut self) -> Result<Turn, TranscriptError> {
        let ends_with_narration = self
            .turns
            .last()
            .is_some_and(|t| t.role == TurnRole::Narrator);
        if !ends_with_narration {
            return Err(TranscriptError::NothingToUndo);
        }

        let removed = self.turns.pop().ok_or(TranscriptError::NothingToUndo)?;
        self.last_undone = Some(removed.clone());
        Ok(removed)
    }

    /// The most recently undone narration, if any.
    pub fn last_undone(&self) -> Option<&Turn> {
        self.last_undone.as_ref()
    }

    /// Ordered role/text view for inspection. Pure read.
    pub fn debug_entries(&self) -> Vec<(TurnRole, &str)> {
        self.turns
            .iter()
            .map(|t| (t.role, t.text.as_str()))
            .collect()
    }

    /// Sum of the stored token estimates.
    pub fn total_tokens(&self) -> usize {
        self.turns.iter().map(|t| t.tokens).sum()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_preserves_order() {
        let mut transcript = Transcript::new();
        transcript.push(Turn::player("go north", 2));
        transcript.push(Turn::narrator("You enter a dark cave.", 5));

        let entries = transcript.debug_entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], (TurnRole::Player, "go north"));
        assert_eq!(entries[1], (TurnRole::Narrator, "You enter a dark cave."));
    }

    #[test]
    fn test_evict_oldest_is_fifo() {
        let mut transcript = Transcript::new();
        transcript.push(Turn::player("first", 1));
        transcript.push(Turn::narrator("second", 1));
        transcript.push(Turn::player("third", 1));

        assert_eq!(transcript.evict_oldest().map(|t| t.text).as_deref(), Some("first"));
        assert_eq!(transcript.evict_oldest().map(|t| t.text).as_deref(), Some("second"));
        assert_eq!(transcript.len(), 1);
    }

    #[test]
    fn test_evict_empty() {
        let mut transcript = Transcript::new();
        assert!(transcript.evict_oldest().is_none());
    }

    #[test]
    fn test_undo_removes_last_narration() {
        let mut transcript = Transcript::new();
        transcript.push(Turn::player("open the door", 3));
        transcript.push(Turn::narrator("The door creaks open.", 4));

        let removed = transcript.undo().unwrap();
        assert_eq!(removed.text, "The door creaks open.");
        assert_eq!(transcript.len(), 1);
        assert_eq!(transcript.last_undone().map(|t| t.text.as_str()), Some("The door creaks open."));
    }

    #[test]
    fn test_undo_twice_fails_and_leaves_transcript_unchanged() {
        let mut transcript = Transcript::new();
        transcript.push(Turn::player("look", 1));
        transcript.push(Turn::narrator("A vast hall.", 3));

        transcript.undo().unwrap();
        let before = transcript.debug_entries().len();

        assert_eq!(transcript.undo(), Err(TranscriptError::NothingToUndo));
        assert_eq!(transcript.debug_entries().len(), before);
    }

    #[test]
    fn test_undo_with_no_narration() {
        let mut transcript = Transcript::new();
        assert_eq!(transcript.undo(), Err(TranscriptError::NothingToUndo));

        transcript.push(Turn::player("hello?", 1));
        assert_eq!(transcript.undo(), Err(TranscriptError::NothingToUndo));
        assert_eq!(transcript.len(), 1);
    }

    #[test]
    fn test_total_tokens() {
        let mut transcript = Transcript::new();
        assert_eq!(transcript.total_tokens(), 0);

        transcript.push(Turn::player("a b c", 3));
        transcript.push(Turn::narrator("d e", 2));
        assert_eq!(transcript.total_tokens(), 5);

        transcript.evict_oldest();
        assert_eq!(transcript.total_tokens(), 2);
    }
}
