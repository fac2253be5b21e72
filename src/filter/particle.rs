//! A single weighted hypothesis.

use super::sampler::{Sample, Sampler};
use crate::error::Result;
use crate::query::Query;
use crate::types::{Evidence, Timestep};
use crate::world::{Consolidation, PartialWorld};
use rand::RngCore;
use std::fmt;
use std::sync::Arc;

/// A world and its log-weight, advanced by a sampler.
pub struct Particle {
    world: PartialWorld,
    log_weight: f64,
    sampler: Arc<dyn Sampler>,
}

impl Particle {
    /// A particle of log-weight 0 over `world`.
    pub fn new(world: PartialWorld, sampler: Arc<dyn Sampler>) -> Self {
        Self {
            world,
            log_weight: 0.0,
            sampler,
        }
    }

    pub fn world(&self) -> &PartialWorld {
        &self.world
    }

    pub fn log_weight(&self) -> f64 {
        self.log_weight
    }

    /// True if the evidence taken last is impossible in this world.
    pub fn is_dead(&self) -> bool {
        self.log_weight == f64::NEG_INFINITY
    }

    /// Extend the world to cover `evidence`; the particle's log-weight
    /// becomes the evidence's log-weight under the extended world.
    ///
    /// The sampler extends a fork, so a failed extension leaves the particle
    /// unchanged.
    pub fn take(&mut self, evidence: &Evidence, rng: &mut dyn RngCore) -> Result<()> {
        let base = self.world.fork();
        let Sample { world, log_weight } = self.sampler.extend(base, evidence, rng)?;
        self.world = world;
        self.log_weight = log_weight;
        Ok(())
    }

    /// Fold this particle into `queries` unless its weight is at or below
    /// `negligible_log_weight`.
    pub fn answer(&self, queries: &mut [Box<dyn Query>], negligible_log_weight: f64) {
        if self.log_weight <= negligible_log_weight {
            return;
        }
        for query in queries.iter_mut() {
            query.update_stats(&self.world, self.log_weight);
        }
    }

    /// An independent fork sharing this particle's underlying collections.
    pub fn copy(&self) -> Self {
        Self {
            world: self.world.fork(),
            log_weight: self.log_weight,
            sampler: Arc::clone(&self.sampler),
        }
    }

    pub fn remove_prior_time_slice(&mut self, boundary: Timestep) -> Result<usize> {
        self.world.remove_prior_time_slice(boundary)
    }

    pub fn consolidate(&mut self) -> Consolidation {
        self.world.consolidate()
    }

    pub(crate) fn set_world(&mut self, world: PartialWorld) {
        self.world = world;
    }

    pub(crate) fn reset_weight(&mut self) {
        self.log_weight = 0.0;
    }
}

impl fmt::Debug for Particle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Particle")
            .field("log_weight", &self.log_weight)
            .field("sampler", &self.sampler.name())
            .field("variables", &self.world.len())
            .finish()
    }
}
