//! Static per-request cost table used to estimate cache savings.

use std::collections::HashMap;

/// Fallback cost for models not in the table, in USD per request.
pub const DEFAULT_COST_PER_REQUEST: f64 = 0.002;

/// Average cost of one request per model, in USD.
#[derive(Debug, Clone, PartialEq)]
pub struct CostTable {
    default_cost: f64,
    costs: HashMap<String, f64>,
}

impl Default for CostTable {
    fn default() -> Self {
        Self::new(DEFAULT_COST_PER_REQUEST)
    }
}

impl CostTable {
    /// Built-in table with the given fallback cost.
    #[must_use]
    pub fn new(default_cost: f64) -> Self {
        let costs = [
            ("gpt-4o", 0.0125),
            ("gpt-4o-mini", 0.000_75),
            ("claude-3-5-sonnet-latest", 0.018),
            ("claude-3-5-haiku-latest", 0.004_8),
            ("gemini-1.5-pro", 0.006_25),
            ("gemini-1.5-flash", 0.000_375),
            ("llama-3.1-8b-instant", 0.000_13),
            ("llama-3.1-70b-versatile", 0.001_4),
        ]
        .into_iter()
        .map(|(model, cost)| (model.to_string(), cost))
        .collect();

        Self { default_cost, costs }
    }

    /// Overrides or adds per-model costs.
    #[must_use]
    pub fn with_overrides<'a>(mut self, overrides: impl IntoIterator<Item = (&'a String, &'a f64)>) -> Self {
        for (model, cost) in overrides {
            self.costs.insert(model.clone(), *cost);
        }
        self
    }

    /// Cost of one request to `model`.
    pub fn cost_for(&self, model: &str) -> f64 {
        self.costs.get(model).copied().unwrap_or(self.default_cost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unlisted_model_uses_default() {
        let table = CostTable::default();
        assert!((table.cost_for("some-new-model") - 0.002).abs() < f64::EPSILON);
        assert!((table.cost_for("gpt-4o") - 0.0125).abs() < f64::EPSILON);
    }

    #[test]
    fn test_overrides_win() {
        let overrides: HashMap<String, f64> = [("llama3".to_string(), 0.0), ("gpt-4o".to_string(), 0.02)].into();
        let table = CostTable::new(0.001).with_overrides(&overrides);
        assert!(table.cost_for("llama3").abs() < f64::EPSILON);
        assert!((table.cost_for("gpt-4o") - 0.02).abs() < f64::EPSILON);
        assert!((table.cost_for("unknown") - 0.001).abs() < f64::EPSILON);
    }
}
