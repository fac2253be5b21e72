//! Queries answered by the particle population.
//!
//! A query folds every particle's `(world, log_weight)` into running
//! statistics; the filter resets and reports its queries once per timestep.

mod histogram;
mod writer;

pub use histogram::Histogram;
pub use writer::{ChannelWriter, JsonLinesWriter, LogWriter, MemoryWriter, ResultWriter};

use crate::types::{Timestep, Value, Variable};
use crate::world::PartialWorld;
use serde::{Deserialize, Serialize};

/// Running statistics over weighted worlds.
pub trait Query: Send {
    /// Display name used in results.
    fn name(&self) -> String;

    /// Timestep this query belongs to, or `None` for atemporal queries.
    fn timestep(&self) -> Option<Timestep>;

    /// Fold one weighted world into the statistics.
    fn update_stats(&mut self, world: &PartialWorld, log_weight: f64);

    fn reset(&mut self);

    fn result(&self) -> QueryResult;
}

/// One value of a reported distribution.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub value: Value,
    pub probability: f64,
}

/// Snapshot of a query's current estimate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    pub query: String,
    pub timestep: Option<Timestep>,
    pub distribution: Vec<Outcome>,
}

impl QueryResult {
    /// Probability reported for `value`, zero if absent.
    pub fn probability(&self, value: &Value) -> f64 {
        self.distribution
            .iter()
            .find(|o| &o.value == value)
            .map_or(0.0, |o| o.probability)
    }
}

/// All results written for one timestep.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResultBatch {
    pub timestep: Option<Timestep>,
    pub results: Vec<QueryResult>,
}

/// Posterior distribution of a single variable.
#[derive(Clone, Debug)]
pub struct VariableQuery {
    variable: Variable,
    histogram: Histogram,
}

impl VariableQuery {
    pub fn new(variable: Variable) -> Self {
        Self {
            variable,
            histogram: Histogram::new(),
        }
    }

    pub fn variable(&self) -> &Variable {
        &self.variable
    }

    pub fn histogram(&self) -> &Histogram {
        &self.histogram
    }
}

impl Query for VariableQuery {
    fn name(&self) -> String {
        self.variable.to_string()
    }

    fn timestep(&self) -> Option<Timestep> {
        self.variable.timestep
    }

    fn update_stats(&mut self, world: &PartialWorld, log_weight: f64) {
        if let Some(value) = world.get(&self.variable) {
            self.histogram.increase_weight(value, log_weight);
        }
    }

    fn reset(&mut self) {
        self.histogram.clear();
    }

    fn result(&self) -> QueryResult {
        QueryResult {
            query: self.name(),
            timestep: self.timestep(),
            distribution: self
                .histogram
                .entries()
                .into_iter()
                .map(|(value, probability)| Outcome { value, probability })
                .collect(),
        }
    }
}
