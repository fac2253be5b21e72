//! Filter configuration.

use crate::error::{Result, SmcError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

/// Default population size.
pub const DEFAULT_NUM_PARTICLES: usize = 1000;

/// Default sampler selector.
pub const DEFAULT_SAMPLER: &str = "lw";

/// Default log-weight below which a particle does not contribute to queries.
pub const DEFAULT_NEGLIGIBLE_LOG_WEIGHT: f64 = -50.0;

/// Configuration for a particle filter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterConfig {
    /// Number of particles.
    /// Default: 1000
    pub num_particles: usize,

    /// Name of the sampler used to extend particles.
    /// Default: "lw"
    pub sampler: String,

    /// Particles at or below this log-weight are skipped when answering queries.
    /// Default: -50.0
    pub negligible_log_weight: f64,

    /// MCMC transitions per particle after each resampling (resample-move only).
    /// Default: 10
    pub move_iterations: usize,

    /// RNG seed (None = seed from entropy).
    pub seed: Option<u64>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            num_particles: DEFAULT_NUM_PARTICLES,
            sampler: DEFAULT_SAMPLER.to_string(),
            negligible_log_weight: DEFAULT_NEGLIGIBLE_LOG_WEIGHT,
            move_iterations: 10,
            seed: None,
        }
    }
}

impl FilterConfig {
    pub fn with_particles(mut self, num_particles: usize) -> Self {
        self.num_particles = num_particles;
        self
    }

    pub fn with_sampler(mut self, sampler: impl Into<String>) -> Self {
        self.sampler = sampler.into();
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_move_iterations(mut self, iterations: usize) -> Self {
        self.move_iterations = iterations;
        self
    }

    pub fn with_negligible_log_weight(mut self, floor: f64) -> Self {
        self.negligible_log_weight = floor;
        self
    }

    /// Reject settings no filter can run with.
    pub fn validate(&self) -> Result<()> {
        if self.num_particles == 0 {
            return Err(SmcError::InvalidConfig(
                "number of particles must be positive".to_string(),
            ));
        }
        if !self.negligible_log_weight.is_finite() {
            return Err(SmcError::InvalidConfig(format!(
                "negligible log weight must be finite, got {}",
                self.negligible_log_weight
            )));
        }
        if self.sampler.is_empty() {
            return Err(SmcError::InvalidConfig("sampler name is empty".to_string()));
        }
        Ok(())
    }

    /// Read a configuration from a JSON object; absent fields take defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: FilterConfig = serde_json::from_str(json)
            .map_err(|e| SmcError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read a configuration from string properties.
    ///
    /// The population size may be given as `numParticles` or `numSamples`;
    /// giving both with different values is an error. Other keys:
    /// `samplerClass` (or `sampler`), `negligibleLogWeight`, `numMoves`
    /// (or `moveIterations`) and `seed`.
    pub fn from_properties(properties: &HashMap<String, String>) -> Result<Self> {
        let mut config = FilterConfig::default();

        let particles = properties.get("numParticles");
        let samples = properties.get("numSamples");
        if let (Some(p), Some(s)) = (particles, samples) {
            if p != s {
                return Err(SmcError::InvalidConfig(format!(
                    "both numParticles ({}) and numSamples ({}) given with distinct values",
                    p, s
                )));
            }
        }
        if let Some(count) = particles.or(samples) {
            config.num_particles = parse_property("number of particles", count)?;
        }

        if let Some(name) = properties
            .get("samplerClass")
            .or_else(|| properties.get("sampler"))
        {
            config.sampler = name.clone();
        }
        if let Some(floor) = properties.get("negligibleLogWeight") {
            config.negligible_log_weight = parse_property("negligible log weight", floor)?;
        }
        if let Some(moves) = properties
            .get("numMoves")
            .or_else(|| properties.get("moveIterations"))
        {
            config.move_iterations = parse_property("number of moves", moves)?;
        }
        if let Some(seed) = properties.get("seed") {
            config.seed = Some(parse_property("seed", seed)?);
        }

        config.validate()?;
        Ok(config)
    }
}

fn parse_property<T: FromStr>(what: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| SmcError::InvalidConfig(format!("Invalid {}: {}", what, raw)))
}
