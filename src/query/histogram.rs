//! Weighted histogram kept in the log domain.

use crate::filter::weights::log_sum;
use crate::types::Value;
use std::collections::HashMap;

/// Accumulates log-weights per value.
#[derive(Clone, Debug)]
pub struct Histogram {
    log_weights: HashMap<Value, f64>,
    log_total: f64,
}

impl Default for Histogram {
    fn default() -> Self {
        Self {
            log_weights: HashMap::new(),
            log_total: f64::NEG_INFINITY,
        }
    }
}

impl Histogram {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `e^log_weight` to the mass of `value`.
    pub fn increase_weight(&mut self, value: Value, log_weight: f64) {
        let entry = self
            .log_weights
            .entry(value)
            .or_insert(f64::NEG_INFINITY);
        *entry = log_sum(*entry, log_weight);
        self.log_total = log_sum(self.log_total, log_weight);
    }

    pub fn clear(&mut self) {
        self.log_weights.clear();
        self.log_total = f64::NEG_INFINITY;
    }

    pub fn is_empty(&self) -> bool {
        self.log_weights.is_empty()
    }

    /// Log of the total mass recorded.
    pub fn log_total(&self) -> f64 {
        self.log_total
    }

    /// Normalized probability of `value`; zero when nothing was recorded.
    pub fn probability(&self, value: &Value) -> f64 {
        match self.log_weights.get(value) {
            Some(w) if self.log_total > f64::NEG_INFINITY => (w - self.log_total).exp(),
            _ => 0.0,
        }
    }

    /// Values with their normalized probabilities, most probable first.
    pub fn entries(&self) -> Vec<(Value, f64)> {
        let mut entries: Vec<(Value, f64)> = self
            .log_weights
            .keys()
            .map(|v| (v.clone(), self.probability(v)))
            .collect();
        entries.sort_by(|a, b| {
            b.1.total_cmp(&a.1)
                .then_with(|| a.0.to_string().cmp(&b.0.to_string()))
        });
        entries
    }
}
