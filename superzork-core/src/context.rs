//! Token-budget eviction for the prompt context window.
//!
//! Before each inference call the prompt must satisfy
//! `preamble + history + incoming turn <= budget`. The preamble never
//! moves and the incoming turn never moves, so the only lever is history:
//! turns are evicted from the oldest end, one at a time, until the bound
//! holds. Eviction is destructive; evicted turns are gone.

use crate::transcript::{Transcript, Turn};
use thiserror::Error;

/// Errors from fitting a prompt into the context window.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ContextError {
    /// The incoming turn alone exceeds what the budget leaves after the
    /// preamble. Evicting history cannot help, so the turn is rejected
    /// rather than silently truncated.
    #[error("input is ~{needed} tokens but only {available} fit after the story preamble - try a shorter action")]
    OversizedInput { needed: usize, available: usize },
}

/// The token budget for one inference call.
#[derive(Debug, Clone, Copy)]
pub struct ContextWindow {
    budget: usize,
}

impl ContextWindow {
    pub fn new(budget: usize) -> Self {
        Self { budget }
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    /// Make room for `incoming`, evicting the oldest turns as needed.
    ///
    /// On success the transcript satisfies
    /// `preamble_tokens + transcript.total_tokens() + incoming.tokens <= budget`
    /// and the number of evicted turns is returned. On `OversizedInput`
    /// the transcript is left untouched.
    pub fn reserve(
        &self,
        transcript: &mut Transcript,
        preamble_tokens: usize,
        incoming: &Turn,
    ) -> Result<usize, ContextError> {
        let fixed = preamble_tokens + incoming.tokens;
        if fixed > self.budget {
            return Err(ContextError::OversizedInput {
                needed: incoming.tokens,
                available: self.budget.saturating_sub(preamble_tokens),
            });
        }

        let mut evicted = 0;
        while fixed + transcript.total_tokens() > self.budget {
            if transcript.evict_oldest().is_none() {
                break;
            }
            evicted += 1;
        }

        Ok(evicted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::{Transcript, Turn, TurnRole};

    fn history(token_counts: &[usize]) -> Transcript {
        let mut transcript = Transcript::new();
        for (i, &tokens) in token_counts.iter().enumerate() {
            let role = if i % 2 == 0 {
                TurnRole::Player
            } else {
                TurnRole::Narrator
            };
            transcript.push(Turn::new(role, format!("turn {i}"), tokens));
        }
        transcript
    }

    #[test]
    fn test_no_eviction_when_prompt_fits() {
        let window = ContextWindow::new(100);
        let mut transcript = history(&[10, 10, 10]);

        let evicted = window
            .reserve(&mut transcript, 40, &Turn::player("next", 10))
            .unwrap();

        assert_eq!(evicted, 0);
        assert_eq!(transcript.len(), 3);
    }

    #[test]
    fn test_evicts_oldest_first() {
        let window = ContextWindow::new(50);
        let mut transcript = history(&[10, 10, 10, 10]);

        // 20 + 10 fixed leaves 20 for history: two of four turns must go
        let evicted = window
            .reserve(&mut transcript, 20, &Turn::player("next", 10))
            .unwrap();

        assert_eq!(evicted, 2);
        let remaining = transcript.debug_entries();
        assert_eq!(remaining[0].1, "turn 2");
        assert_eq!(remaining[1].1, "turn 3");
    }

    #[test]
    fn test_budget_bound_holds_after_reserve() {
        let window = ContextWindow::new(50);
        // The uneven counts force eviction to overshoot past the exact bound
        let mut transcript = history(&[9, 7, 12, 8, 6]);
        let incoming = Turn::player("climb the rope", 11);

        window.reserve(&mut transcript, 13, &incoming).unwrap();

        assert!(13 + transcript.total_tokens() + incoming.tokens <= 50);
    }

    #[test]
    fn test_tight_budget_forces_full_eviction() {
        // Budget 50, preamble 40, three 5-token turns, new 8-token turn:
        // 40 + 15 + 8 = 63 > 50, and only 2 tokens of history can stay, so
        // every 5-token turn must be evicted.
        let window = ContextWindow::new(50);
        let mut transcript = history(&[5, 5, 5]);
        let incoming = Turn::player("new action here", 8);

        let evicted = window.reserve(&mut transcript, 40, &incoming).unwrap();

        assert_eq!(evicted, 3);
        assert!(transcript.is_empty());
        assert!(40 + transcript.total_tokens() + incoming.tokens <= 50);
    }

    #[test]
    fn test_oversized_input_rejected_without_eviction() {
        let window = ContextWindow::new(50);
        let mut transcript = history(&[5, 5]);

        let result = window.reserve(&mut transcript, 40, &Turn::player("a very long tirade", 20));

        assert_eq!(
            result,
            Err(ContextError::OversizedInput {
                needed: 20,
                available: 10,
            })
        );
        // Rejection must not disturb existing history
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript.total_tokens(), 10);
    }

    #[test]
    fn test_preamble_alone_over_budget() {
        let window = ContextWindow::new(30);
        let mut transcript = Transcript::new();

        let result = window.reserve(&mut transcript, 40, &Turn::player("hi", 1));

        assert_eq!(
            result,
            Err(ContextError::OversizedInput {
                needed: 1,
                available: 0,
            })
        );
    }

    #[test]
    fn test_exact_fit_is_allowed() {
        let window = ContextWindow::new(50);
        let mut transcript = history(&[5, 5]);

        let evicted = window
            .reserve(&mut transcript, 32, &Turn::player("exact", 8))
            .unwrap();

        assert_eq!(evicted, 0);
        assert_eq!(32 + transcript.total_tokens() + 8, 50);
    }
}
