//! Static per-model price table.

use crate::provider::TokenUsage;

/// USD price per thousand tokens.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelPrice {
    pub input_per_1k: f64,
    pub output_per_1k: f64,
}

const PRICES: &[(&str, ModelPrice)] = &[
    (
        "gpt-4o-mini",
        ModelPrice {
            input_per_1k: 0.000_15,
            output_per_1k: 0.000_6,
        },
    ),
    (
        "gpt-4o",
        ModelPrice {
            input_per_1k: 0.002_5,
            output_per_1k: 0.01,
        },
    ),
    (
        "gpt-4-turbo",
        ModelPrice {
            input_per_1k: 0.01,
            output_per_1k: 0.03,
        },
    ),
    (
        "gpt-4",
        ModelPrice {
            input_per_1k: 0.03,
            output_per_1k: 0.06,
        },
    ),
    (
        "gpt-3.5-turbo",
        ModelPrice {
            input_per_1k: 0.000_5,
            output_per_1k: 0.001_5,
        },
    ),
];

/// Look up the price of a model.
///
/// Dated snapshots such as `gpt-4o-mini-2024-07-18` resolve to the longest
/// matching base name.
pub fn price_for(model: &str) -> Option<ModelPrice> {
    PRICES
        .iter()
        .filter(|(name, _)| model == *name || model.starts_with(&format!("{name}-")))
        .max_by_key(|(name, _)| name.len())
        .map(|(_, price)| *price)
}

/// Cost of a completion in USD. Unknown models are free.
pub fn completion_cost(model: &str, usage: TokenUsage) -> f64 {
    let Some(price) = price_for(model) else {
        return 0.0;
    };

    (usage.input_tokens as f64 / 1000.0) * price.input_per_1k
        + (usage.output_tokens as f64 / 1000.0) * price.output_per_1k
}
