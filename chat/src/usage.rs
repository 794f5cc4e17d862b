//! Accumulated usage of a chat session.

use notegraph_gateway::UsageReport;
use serde::{Deserialize, Serialize};

/// Running totals of cost and tokens. Only ever grows until reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageStats {
    /// Total cost in USD.
    pub cost_usd: f64,

    /// Total prompt tokens.
    pub input_tokens: u64,

    /// Total generated tokens.
    pub output_tokens: u64,
}

impl UsageStats {
    /// Add one completion's usage.
    pub fn record(&mut self, report: &UsageReport) {
        self.cost_usd += report.cost_usd.max(0.0);
        self.input_tokens += report.input_tokens;
        self.output_tokens += report.output_tokens;
    }

    /// Total tokens in both directions.
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}
