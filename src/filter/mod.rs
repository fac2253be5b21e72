//! Particle filtering.
//!
//! A [`ParticleFilter`] owns a fixed-size population of [`Particle`]s, each a
//! delta-backed world plus a log-weight. Evidence is taken in batches;
//! between batches the population is resampled systematically and, for the
//! resample-move variant, diversified by an MCMC [`MoveKernel`].

mod config;
mod particle;
mod particle_filter;
mod resample_move;
mod sampler;
mod timeline;
pub mod weights;

pub use config::{
    FilterConfig, DEFAULT_NEGLIGIBLE_LOG_WEIGHT, DEFAULT_NUM_PARTICLES, DEFAULT_SAMPLER,
};
pub use particle::Particle;
pub use particle_filter::ParticleFilter;
pub use resample_move::{MetropolisHastings, MoveKernel, Mover, Proposal, Target};
pub use sampler::{Sample, Sampler, SamplerRegistry};
pub use timeline::Timeline;
