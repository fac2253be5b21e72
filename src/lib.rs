//! # Delta SMC
//!
//! Sequential Monte Carlo inference over worlds stored as deltas against
//! shared collections.
//!
//! ## Core Concepts
//!
//! - **Delta collections**: set, map, multimap and ordered-set views that
//!   record only their changes against a shared underlying collection
//! - **Partial worlds**: variable assignments built from delta collections,
//!   forked in time proportional to what changed
//! - **Particles**: a world plus a log-weight, extended by a pluggable sampler
//! - **Particle filter**: systematic resampling, log-domain weights and an
//!   optional resample-move step
//!
//! ## Example
//!
//! ```ignore
//! use delta_smc::{Evidence, FilterConfig, ParticleFilter, Variable, VariableQuery};
//!
//! let config = FilterConfig::default().with_particles(5000).with_seed(7);
//! let mut filter = ParticleFilter::new(config, Arc::new(MySampler))?;
//!
//! filter.set_evidence(
//!     Evidence::new()
//!         .observe(Variable::temporal("umbrella", 0), true)
//!         .observe(Variable::temporal("umbrella", 1), true),
//! );
//! filter.set_queries(vec![Box::new(VariableQuery::new(Variable::temporal("rain", 1)))]);
//! filter.answer_queries()?;
//!
//! println!("log p(evidence) = {}", filter.data_log_likelihood());
//! ```

pub mod delta;
pub mod error;
pub mod filter;
pub mod query;
pub mod types;
pub mod world;

// Re-exports
pub use delta::{
    shared, Block, Delta, HashMapDiff, HashMultiMapDiff, HashSetDiff, IndexedCursor, IndexedSet,
    IndexedSetDiff, MapCursor, MultiMap, SetCursor, Shared,
};
pub use error::{Result, SmcError};
pub use filter::{
    FilterConfig, MetropolisHastings, MoveKernel, Mover, Particle, ParticleFilter, Proposal,
    Sample, Sampler, SamplerRegistry, Target, Timeline,
};
pub use query::{
    ChannelWriter, Histogram, JsonLinesWriter, LogWriter, MemoryWriter, Outcome, Query,
    QueryResult, ResultBatch, ResultWriter, VariableQuery,
};
pub use types::*;
pub use world::{Consolidation, PartialWorld};
