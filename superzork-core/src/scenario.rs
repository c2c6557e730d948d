//! Story scenario configuration.
//!
//! A scenario is a YAML document describing one adventure: which model to
//! run, where Ollama listens, the token budget, and the story/player/
//! companion cards that seed the narration. It is parsed and validated
//! once at startup and never mutated afterwards.

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;
use tokio::fs;

/// Recommended bounds, checked by [`Scenario::lint`]. Values outside them
/// are unusual but not fatal.
const NUM_TOKENS_RECOMMENDED: std::ops::RangeInclusive<u32> = 512..=32_768;
const TEMPERATURE_RECOMMENDED: std::ops::RangeInclusive<f32> = 0.0..=2.0;

/// Errors from loading or validating a story file. All of these are fatal
/// at startup and name the offending field where one exists.
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("could not read story file: {0}")]
    Io(#[from] std::io::Error),

    #[error("story file is not valid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("required field is empty: {field}")]
    EmptyField { field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

/// An adventure's immutable configuration.
#[derive(Debug, Clone)]
pub struct Scenario {
    /// Ollama model name, e.g. `phi4-mini`.
    pub model: String,

    /// Base URL of the Ollama server.
    pub ollama_url: String,

    /// Token budget for one inference call: preamble + history + input.
    /// Also sent to Ollama as the context window size.
    pub num_tokens: u32,

    /// Sampling temperature.
    pub temperature: f32,

    /// The setting the adventure takes place in.
    pub story_card: String,

    /// Who the player is.
    pub player_card: String,

    /// Companions travelling with the player, in introduction order.
    pub companion_cards: Vec<String>,

    /// Replacement for the built-in narrator instructions.
    pub system_prompt: Option<String>,
}

/// The YAML document as written, before validation.
#[derive(Debug, Deserialize)]
struct RawScenario {
    model: Option<String>,
    ollama_url: Option<String>,
    num_tokens: Option<i64>,
    temperature: Option<f32>,
    story_card: Option<String>,
    player_card: Option<String>,
    #[serde(default)]
    companion_cards: Vec<String>,
    system_prompt: Option<String>,
}

impl Scenario {
    /// Load and validate a story file.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ScenarioError> {
        let content = fs::read_to_string(path).await?;
        Self::from_yaml(&content)
    }

    /// Parse and validate a story document.
    pub fn from_yaml(content: &str) -> Result<Self, ScenarioError> {
        let raw: RawScenario = serde_yaml::from_str(content)?;
        Self::validate(raw)
    }

    fn validate(raw: RawScenario) -> Result<Self, ScenarioError> {
        let model = require_text("model", raw.model)?;
        let ollama_url = require_text("ollama_url", raw.ollama_url)?;
        if !ollama_url.starts_with("http://") && !ollama_url.starts_with("https://") {
            return Err(ScenarioError::InvalidField {
                field: "ollama_url",
                reason: format!("must be an http(s) URL, got `{ollama_url}`"),
            });
        }

        let num_tokens = raw
            .num_tokens
            .ok_or(ScenarioError::MissingField { field: "num_tokens" })?;
        let num_tokens = u32::try_from(num_tokens)
            .ok()
            .filter(|&n| n > 0)
            .ok_or_else(|| ScenarioError::InvalidField {
                field: "num_tokens",
                reason: format!("must be a positive integer, got {num_tokens}"),
            })?;

        let temperature = raw
            .temperature
            .ok_or(ScenarioError::MissingField { field: "temperature" })?;
        if !temperature.is_finite() || temperature < 0.0 {
            return Err(ScenarioError::InvalidField {
                field: "temperature",
                reason: format!("must be a non-negative number, got {temperature}"),
            });
        }

        let story_card = require_text("story_card", raw.story_card)?;
        let player_card = require_text("player_card", raw.player_card)?;

        Ok(Self {
            model,
            ollama_url,
            num_tokens,
            temperature,
            story_card,
            player_card,
            companion_cards: raw.companion_cards,
            system_prompt: raw.system_prompt,
        })
    }

    /// Non-fatal advisories about unusual values. The front-end prints
    /// these before play begins.
    pub fn lint(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if !NUM_TOKENS_RECOMMENDED.contains(&self.num_tokens) {
            warnings.push(format!(
                "num_tokens ({}) is outside the recommended range {}-{}",
                self.num_tokens,
                NUM_TOKENS_RECOMMENDED.start(),
                NUM_TOKENS_RECOMMENDED.end()
            ));
        }

        if !TEMPERATURE_RECOMMENDED.contains(&self.temperature) {
            warnings.push(format!(
                "temperature ({}) is outside the recommended range {:.1}-{:.1}",
                self.temperature,
                TEMPERATURE_RECOMMENDED.start(),
                TEMPERATURE_RECOMMENDED.end()
            ));
        }

        warnings
    }
}

fn require_text(
    field: &'static str,
    value: Option<String>,
) -> Result<String, ScenarioError> {
    let value = value.ok_or(ScenarioError::MissingField { field })?;
    if value.trim().is_empty() {
        return Err(ScenarioError::EmptyField { field });
    }
    Ok(value)
}
