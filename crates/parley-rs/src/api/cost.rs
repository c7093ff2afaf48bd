//! Correlation IDs and cost tracking for relay runs.
//!
//! Assigns a unique `trace_id` to each relay run and a `span_id` to each
//! round within it. Tracks cumulative token usage and estimated cost.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

/// Generate a unique trace ID for a relay run.
pub fn generate_trace_id() -> String {
    let ts = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    // Use a counter to handle sub-nanosecond calls.
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let count = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("tr-{ts:x}-{count:04x}")
}

/// Generate a span ID for a round within a run.
pub fn generate_span_id(trace_id: &str, round: u32) -> String {
    format!("{trace_id}:r{round}")
}

/// Rough token count for text without usage data from the API.
/// Whitespace word count, which undercounts but is stable.
pub fn approximate_tokens(text: &str) -> u32 {
    text.split_whitespace().count() as u32
}

/// Per-model pricing for cost estimation (USD per 1M tokens).
#[derive(Debug, Clone)]
pub struct ModelPricing {
    /// Price per 1M input tokens.
    pub input_per_million: f64,
    /// Price per 1M output tokens.
    pub output_per_million: f64,
}

impl ModelPricing {
    /// Estimate cost for given token counts.
    pub fn estimate_cost(&self, input_tokens: u32, output_tokens: u32) -> f64 {
        (input_tokens as f64 / 1_000_000.0) * self.input_per_million
            + (output_tokens as f64 / 1_000_000.0) * self.output_per_million
    }
}

impl Default for ModelPricing {
    fn default() -> Self {
        // Sonnet-tier numbers as the mid-range estimate.
        Self {
            input_per_million: 3.0,
            output_per_million: 15.0,
        }
    }
}

/// Lookup approximate pricing for a model by name.
///
/// Cost tracking is for detecting runaway loops, not billing, so these
/// don't need to track every price revision.
pub fn pricing_for_model(model: &str) -> ModelPricing {
    let name = model.to_lowercase();

    if name.contains("opus") {
        ModelPricing {
            input_per_million: 15.0,
            output_per_million: 75.0,
        }
    } else if name.contains("sonnet") {
        ModelPricing {
            input_per_million: 3.0,
            output_per_million: 15.0,
        }
    } else if name.contains("haiku") {
        ModelPricing {
            input_per_million: 0.25,
            output_per_million: 1.25,
        }
    } else {
        ModelPricing::default()
    }
}

/// Cumulative cost tracker for a relay run.
#[derive(Debug, Default)]
pub struct CostTracker {
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub estimated_cost_usd: f64,
}

impl CostTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record token usage for a round.
    pub fn record(&mut self, input_tokens: u32, output_tokens: u32, pricing: &ModelPricing) {
        self.total_input_tokens += input_tokens as u64;
        self.total_output_tokens += output_tokens as u64;
        self.estimated_cost_usd += pricing.estimate_cost(input_tokens, output_tokens);
    }

    /// Total tokens consumed.
    pub fn total_tokens(&self) -> u64 {
        self.total_input_tokens + self.total_output_tokens
    }

    /// Format as a short summary string.
    pub fn summary(&self) -> String {
        format!(
            "tokens: {} input + {} output = {} total, est. cost: ${:.4}",
            self.total_input_tokens,
            self.total_output_tokens,
            self.total_tokens(),
            self.estimated_cost_usd,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_id_unique() {
        let id1 = generate_trace_id();
        let id2 = generate_trace_id();
        assert_ne!(id1, id2);
        assert!(id1.starts_with("tr-"));
    }

    #[test]
    fn span_id_includes_round() {
        let trace = "tr-abc123-0000";
        let span = generate_span_id(trace, 3);
        assert!(span.contains("r3"));
        assert!(span.starts_with(trace));
    }

    #[test]
    fn approximate_tokens_counts_words() {
        assert_eq!(approximate_tokens("one two three"), 3);
        assert_eq!(approximate_tokens(""), 0);
        assert_eq!(approximate_tokens("  spaced   out  "), 2);
    }

    #[test]
    fn cost_estimation() {
        let pricing = ModelPricing {
            input_per_million: 3.0,
            output_per_million: 15.0,
        };
        let cost = pricing.estimate_cost(1_000_000, 100_000);
        assert!((cost - 4.5).abs() < 0.01); // 3.0 + 1.5
    }

    #[test]
    fn cost_tracker_accumulates() {
        let mut tracker = CostTracker::new();
        let pricing = ModelPricing::default();
        tracker.record(1000, 500, &pricing);
        tracker.record(2000, 1000, &pricing);
        assert_eq!(tracker.total_input_tokens, 3000);
        assert_eq!(tracker.total_output_tokens, 1500);
        assert!(tracker.estimated_cost_usd > 0.0);
    }

    #[test]
    fn pricing_lookup_known_models() {
        let opus = pricing_for_model("claude-opus-4");
        assert!(opus.input_per_million > 10.0);

        let haiku = pricing_for_model("claude-3-5-haiku-latest");
        assert!(haiku.input_per_million < 1.0);

        let unknown = pricing_for_model("some-unknown-model");
        assert!(unknown.input_per_million > 0.0);
    }

    #[test]
    fn cost_summary_format() {
        let mut tracker = CostTracker::new();
        tracker.record(1000, 500, &ModelPricing::default());
        let summary = tracker.summary();
        assert!(summary.contains("tokens:"));
        assert!(summary.contains("cost:"));
    }
}
