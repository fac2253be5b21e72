//! MCMC move step for resample-move filtering.
//!
//! After resampling, many particles are copies of a few ancestors. Running a
//! target-invariant Markov chain on each copy re-diversifies them without
//! changing the distribution they represent, so weights reset to 0.

use crate::error::Result;
use crate::types::Evidence;
use crate::world::PartialWorld;
use rand::{Rng, RngCore};
use tracing::debug;

/// A Markov transition that leaves the posterior given all evidence observed
/// so far invariant.
pub trait MoveKernel: Send {
    /// Record evidence the filter has taken.
    fn observe(&mut self, _evidence: &Evidence) {}

    /// Forget all recorded evidence.
    fn reset(&mut self) {}

    /// Apply one transition to `world`.
    fn transition(&mut self, world: PartialWorld, rng: &mut dyn RngCore) -> Result<PartialWorld>;
}

/// Unnormalized log posterior density of a world.
pub trait Target: Send {
    fn log_density(&self, world: &PartialWorld, evidence: &Evidence) -> f64;
}

/// Local proposals for Metropolis-Hastings.
pub trait Proposal: Send {
    /// Propose a new world from `current`, returning it together with
    /// `ln q(current | proposed) - ln q(proposed | current)`.
    fn propose(&self, current: &PartialWorld, rng: &mut dyn RngCore)
        -> Result<(PartialWorld, f64)>;
}

/// Metropolis-Hastings kernel over the evidence observed so far.
pub struct MetropolisHastings<T, P> {
    target: T,
    proposal: P,
    history: Evidence,
    proposed: u64,
    accepted: u64,
}

impl<T: Target, P: Proposal> MetropolisHastings<T, P> {
    pub fn new(target: T, proposal: P) -> Self {
        Self {
            target,
            proposal,
            history: Evidence::new(),
            proposed: 0,
            accepted: 0,
        }
    }

    /// All evidence recorded since the last reset.
    pub fn history(&self) -> &Evidence {
        &self.history
    }

    /// Fraction of proposals accepted so far.
    pub fn acceptance_rate(&self) -> f64 {
        if self.proposed == 0 {
            0.0
        } else {
            self.accepted as f64 / self.proposed as f64
        }
    }
}

impl<T: Target, P: Proposal> MoveKernel for MetropolisHastings<T, P> {
    fn observe(&mut self, evidence: &Evidence) {
        self.history.extend(evidence);
    }

    fn reset(&mut self) {
        self.history = Evidence::new();
        self.proposed = 0;
        self.accepted = 0;
    }

    fn transition(&mut self, world: PartialWorld, rng: &mut dyn RngCore) -> Result<PartialWorld> {
        let (candidate, log_q_ratio) = self.proposal.propose(&world, rng)?;
        let current = self.target.log_density(&world, &self.history);
        let proposed = self.target.log_density(&candidate, &self.history);
        self.proposed += 1;

        let log_alpha = if current == f64::NEG_INFINITY {
            // any reachable world beats an impossible one
            if proposed > f64::NEG_INFINITY {
                0.0
            } else {
                f64::NEG_INFINITY
            }
        } else {
            proposed - current + log_q_ratio
        };

        if log_alpha >= 0.0 || rng.gen::<f64>().ln() < log_alpha {
            self.accepted += 1;
            Ok(candidate)
        } else {
            Ok(world)
        }
    }
}

/// The move step configured on a filter.
pub struct Mover {
    kernel: Box<dyn MoveKernel>,
    iterations: usize,
}

impl Mover {
    pub fn new(kernel: Box<dyn MoveKernel>, iterations: usize) -> Self {
        Self { kernel, iterations }
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub(crate) fn observe(&mut self, evidence: &Evidence) {
        self.kernel.observe(evidence);
    }

    pub(crate) fn reset(&mut self) {
        self.kernel.reset();
    }

    /// Run the configured number of transitions from `world`.
    pub(crate) fn run(&mut self, mut world: PartialWorld, rng: &mut dyn RngCore) -> Result<PartialWorld> {
        for _ in 0..self.iterations {
            world = self.kernel.transition(world, rng)?;
        }
        Ok(world)
    }

    pub(crate) fn log_progress(&self, particles: usize) {
        debug!(particles, iterations = self.iterations, "Moved particles");
    }
}
