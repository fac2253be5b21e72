//! Sampler interface and registry.

use crate::error::{Result, SmcError};
use crate::types::Evidence;
use crate::world::PartialWorld;
use rand::RngCore;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A world extended to cover new evidence, with the evidence's log-weight.
#[derive(Clone, Debug)]
pub struct Sample {
    pub world: PartialWorld,
    pub log_weight: f64,
}

/// Extends worlds so they cover new evidence.
///
/// Implementations instantiate whatever variables the evidence depends on
/// and return the log-likelihood of the evidence under the extended world.
/// A log-weight of `-inf` means the evidence is impossible in that world.
pub trait Sampler: Send + Sync {
    fn name(&self) -> &str;

    fn extend(
        &self,
        base: PartialWorld,
        evidence: &Evidence,
        rng: &mut dyn RngCore,
    ) -> Result<Sample>;
}

/// Samplers available by name.
#[derive(Clone, Default)]
pub struct SamplerRegistry {
    samplers: HashMap<String, Arc<dyn Sampler>>,
}

impl SamplerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a sampler under its own name, replacing any previous one.
    pub fn register(&mut self, sampler: Arc<dyn Sampler>) -> &mut Self {
        self.samplers.insert(sampler.name().to_string(), sampler);
        self
    }

    /// Register a sampler under an alias.
    pub fn register_as(&mut self, name: impl Into<String>, sampler: Arc<dyn Sampler>) -> &mut Self {
        self.samplers.insert(name.into(), sampler);
        self
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn Sampler>> {
        self.samplers
            .get(name)
            .cloned()
            .ok_or_else(|| SmcError::SamplerNotFound(name.to_string()))
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.samplers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for SamplerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SamplerRegistry")
            .field("samplers", &self.names())
            .finish()
    }
}
