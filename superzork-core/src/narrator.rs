//! Narrator prompt assembly.
//!
//! The preamble is the fixed block sent at the head of every prompt: the
//! narrator instructions plus the scenario's story, player, and companion
//! cards. It is part of the system message, so the context window can
//! never evict it; only ordinary turns compete for the remaining budget.

use crate::scenario::Scenario;
use crate::tokens::TokenEstimator;
use crate::transcript::{Transcript, TurnRole};
use ollama::Message;

/// Built-in narrator instructions, embedded at compile time. A scenario
/// may override them with its `system_prompt` field.
const BASE_PROMPT: &str = include_str!("prompts/narrator_base.txt");

/// The instruction that opens a fresh adventure. Sent as the first player
/// turn; unlike the preamble it is ordinary history and may eventually be
/// evicted once the story outgrows the budget.
pub const OPENING_INSTRUCTION: &str = "Begin the adventure with an atmospheric description of my current situation and surroundings, and end ready for my first action.";

/// The fixed system text for one session, with its token estimate.
#[derive(Debug, Clone)]
pub struct Preamble {
    text: String,
    tokens: usize,
}

impl Preamble {
    /// Assemble the preamble from a scenario's cards.
    ///
    /// The same scenario and estimator always produce the same text and
    /// the same token count.
    pub fn build(scenario: &Scenario, estimator: &dyn TokenEstimator) -> Self {
        let base = scenario
            .system_prompt
            .as_deref()
            .unwrap_or(BASE_PROMPT)
            .trim();

        let mut text = String::from(base);

        text.push_str("\n\n## Story Setting\n");
        text.push_str(scenario.story_card.trim());

        text.push_str("\n\n## Player Character\n");
        text.push_str(scenario.player_card.trim());

        if !scenario.companion_cards.is_empty() {
            text.push_str("\n\n## Companions\n");
            for card in &scenario.companion_cards {
                text.push_str("- ");
                text.push_str(card.trim());
                text.push('\n');
            }
        }

        let tokens = estimator.estimate(&text);
        Self { text, tokens }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn tokens(&self) -> usize {
        self.tokens
    }
}

/// Map the preamble and transcript into the wire message sequence:
/// one system message, then every turn oldest-first.
pub fn build_messages(preamble: &Preamble, transcript: &Transcript) -> Vec<Message> {
    let mut messages = Vec::with_capacity(transcript.len() + 1);
    messages.push(Message::system(preamble.text()));

    for turn in transcript.turns() {
        messages.push(match turn.role {
            TurnRole::Player => Message::user(&turn.text),
            TurnRole::Narrator => Message::assistant(&turn.text),
            TurnRole::System => Message::system(&turn.text),
        });
    }

    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokens::WordEstimator;
    use crate::transcript::Turn;
    use ollama::Role;

    fn scenario() -> Scenario {
        Scenario {
            model: "phi4-mini".to_string(),
            ollama_url: "http://localhost:11434".to_string(),
            num_tokens: 4096,
            temperature: 0.7,
            story_card: "A ruined lighthouse on a storm-wracked coast.".to_string(),
            player_card: "A shipwrecked cartographer.".to_string(),
            companion_cards: vec!["A one-eyed gull who caws at danger.".to_string()],
            system_prompt: None,
        }
    }

    #[test]
    fn test_preamble_contains_all_cards() {
        let preamble = Preamble::build(&scenario(), &WordEstimator);

        assert!(preamble.text().contains("## Story Setting"));
        assert!(preamble.text().contains("ruined lighthouse"));
        assert!(preamble.text().contains("## Player Character"));
        assert!(preamble.text().contains("cartographer"));
        assert!(preamble.text().contains("## Companions"));
        assert!(preamble.text().contains("one-eyed gull"));
    }

    #[test]
    fn test_preamble_omits_companion_section_when_alone() {
        let mut scenario = scenario();
        scenario.companion_cards.clear();

        let preamble = Preamble::build(&scenario, &WordEstimator);
        assert!(!preamble.text().contains("## Companions"));
    }

    #[test]
    fn test_preamble_tokens_are_deterministic() {
        let scenario = scenario();
        let first = Preamble::build(&scenario, &WordEstimator);
        let second = Preamble::build(&scenario, &WordEstimator);

        assert_eq!(first.text(), second.text());
        assert_eq!(first.tokens(), second.tokens());
        assert!(first.tokens() > 0);
    }

    #[test]
    fn test_system_prompt_override_replaces_base() {
        let mut scenario = scenario();
        scenario.system_prompt = Some("Narrate everything in haiku.".to_string());

        let preamble = Preamble::build(&scenario, &WordEstimator);
        assert!(preamble.text().starts_with("Narrate everything in haiku."));
        assert!(!preamble.text().contains("interactive text adventure"));
        // Cards still ride along under an override
        assert!(preamble.text().contains("ruined lighthouse"));
    }

    #[test]
    fn test_build_messages_roles() {
        let preamble = Preamble::build(&scenario(), &WordEstimator);
        let mut transcript = Transcript::new();
        transcript.push(Turn::player("look around", 2));
        transcript.push(Turn::narrator("Waves crash below.", 3));

        let messages = build_messages(&preamble, &transcript);

        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[1].role, Role::User);
        assert_eq!(messages[1].content, "look around");
        assert_eq!(messages[2].role, Role::Assistant);
    }
}
