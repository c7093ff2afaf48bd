//! Configuration for the relay loop.

use crate::ThinkingConfig;
use crate::api::retry::RetryConfig;
use tracing::warn;

/// Configuration for a [`Relay`](crate::relay::runner::Relay) run.
///
/// # Example
///
/// ```
/// use parley_rs::relay::config::RelayConfig;
///
/// let config = RelayConfig::new("claude-3-7-sonnet-20250219")
///     .with_system_prompt("You are a weather assistant.")
///     .with_max_rounds(5)
///     .with_max_tokens(4000);
/// assert_eq!(config.max_rounds, 5);
/// ```
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Model identifier.
    pub model: String,
    /// System prompt, sent as the top-level `system` request field.
    pub system_prompt: Option<String>,
    /// Maximum request/response rounds before the run stops unfinished.
    pub max_rounds: u32,
    /// Token cap per model reply.
    pub max_tokens: u32,
    /// Sampling temperature. `None` uses the API default.
    pub temperature: Option<f32>,
    /// Extended-thinking configuration. `None` disables thinking.
    pub thinking: Option<ThinkingConfig>,
    /// Beta features requested via the `anthropic-beta` header.
    pub betas: Vec<String>,
    /// Retry behavior for transient transport failures.
    pub retry: RetryConfig,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            model: crate::DEFAULT_MODEL.to_string(),
            system_prompt: None,
            max_rounds: 10,
            max_tokens: 1024,
            temperature: None,
            thinking: None,
            betas: Vec::new(),
            retry: RetryConfig::default(),
        }
    }
}

impl RelayConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_max_rounds(mut self, max_rounds: u32) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Enable extended thinking with the given token budget.
    pub fn with_thinking(mut self, budget_tokens: u32) -> Self {
        self.thinking = Some(ThinkingConfig::enabled(budget_tokens));
        self
    }

    /// Request beta features via the `anthropic-beta` header, e.g.
    /// [`EXTENDED_OUTPUT_BETA`](crate::EXTENDED_OUTPUT_BETA).
    pub fn with_betas(mut self, betas: Vec<String>) -> Self {
        self.betas = betas;
        self
    }

    /// Enable bounded retry of transient transport failures.
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retry = RetryConfig::with_retries(retries);
        self
    }

    /// The token cap actually sent. The API rejects thinking-enabled
    /// requests whose `max_tokens` does not exceed the budget, so a
    /// too-small cap is raised to budget + 1000 with a warning.
    pub fn effective_max_tokens(&self) -> u32 {
        match &self.thinking {
            Some(thinking) if self.max_tokens <= thinking.budget_tokens => {
                let raised = thinking.budget_tokens + 1000;
                warn!(
                    "max_tokens {} does not exceed thinking budget {}, raising to {raised}",
                    self.max_tokens, thinking.budget_tokens,
                );
                raised
            }
            _ => self.max_tokens,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = RelayConfig::default();
        assert_eq!(config.max_rounds, 10);
        assert_eq!(config.max_tokens, 1024);
        assert!(config.system_prompt.is_none());
        assert!(config.thinking.is_none());
        assert_eq!(config.retry.max_retries, 0);
    }

    #[test]
    fn builder_chain() {
        let config = RelayConfig::new("claude-3-7-sonnet-20250219")
            .with_system_prompt("be brief")
            .with_max_rounds(3)
            .with_max_tokens(2000)
            .with_temperature(0.2)
            .with_thinking(2048)
            .with_retries(2);

        assert_eq!(config.model, "claude-3-7-sonnet-20250219");
        assert_eq!(config.system_prompt.as_deref(), Some("be brief"));
        assert_eq!(config.max_rounds, 3);
        assert_eq!(config.max_tokens, 2000);
        assert_eq!(config.temperature, Some(0.2));
        assert_eq!(config.thinking.as_ref().unwrap().budget_tokens, 2048);
        assert_eq!(config.retry.max_retries, 2);
    }

    #[test]
    fn thinking_raises_small_max_tokens() {
        let tight = RelayConfig::default().with_thinking(8000);
        assert_eq!(tight.max_tokens, 1024);
        assert_eq!(tight.effective_max_tokens(), 9000);

        let roomy = RelayConfig::default()
            .with_max_tokens(16_000)
            .with_thinking(8000);
        assert_eq!(roomy.effective_max_tokens(), 16_000);

        let no_thinking = RelayConfig::default().with_max_tokens(512);
        assert_eq!(no_thinking.effective_max_tokens(), 512);
    }
}
