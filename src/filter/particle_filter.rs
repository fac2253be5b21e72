//! The particle filter.

use super::config::FilterConfig;
use super::particle::Particle;
use super::resample_move::{MoveKernel, Mover};
use super::sampler::{Sampler, SamplerRegistry};
use super::timeline::Timeline;
use super::weights::{effective_sample_size, log_sum_exp, systematic_selection};
use crate::error::{Result, SmcError};
use crate::query::{LogWriter, Query, QueryResult, ResultWriter};
use crate::types::{Evidence, Timestep};
use crate::world::{Consolidation, PartialWorld};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::mem;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Sequential Monte Carlo over a fixed-size particle population.
///
/// The filter is empty until [`reset`](Self::reset). Each non-empty
/// [`take`](Self::take) extends every particle and leaves the population
/// awaiting resampling, which happens lazily at the start of the next take.
pub struct ParticleFilter {
    /// Filter settings.
    config: FilterConfig,

    /// Extends particles over new evidence.
    sampler: Arc<dyn Sampler>,

    /// World every particle starts from.
    prior: PartialWorld,

    /// Current population; empty before the first reset.
    particles: Vec<Particle>,

    /// Whether the weights from the last take still need resampling.
    needs_resample: bool,

    /// Running estimate of the log marginal likelihood of the evidence.
    data_log_likelihood: f64,

    rng: StdRng,

    /// Evidence and queries for [`answer_queries`](Self::answer_queries).
    evidence: Evidence,
    queries: Vec<Box<dyn Query>>,

    /// Receives per-timestep results.
    writer: Box<dyn ResultWriter>,

    /// MCMC step run after each resampling (resample-move only).
    mover: Option<Mover>,
}

impl ParticleFilter {
    /// Create a filter using `sampler` to extend particles.
    pub fn new(config: FilterConfig, sampler: Arc<dyn Sampler>) -> Result<Self> {
        config.validate()?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        info!(
            num_particles = config.num_particles,
            sampler = sampler.name(),
            "Constructed particle filter"
        );
        Ok(Self {
            config,
            sampler,
            prior: PartialWorld::new(),
            particles: Vec::new(),
            needs_resample: false,
            data_log_likelihood: 0.0,
            rng,
            evidence: Evidence::new(),
            queries: Vec::new(),
            writer: Box::new(LogWriter),
            mover: None,
        })
    }

    /// Create a filter with the sampler named by `config.sampler`.
    pub fn from_registry(config: FilterConfig, registry: &SamplerRegistry) -> Result<Self> {
        let sampler = registry.get(&config.sampler)?;
        Self::new(config, sampler)
    }

    /// Create a resample-move filter running `config.move_iterations`
    /// transitions of `kernel` on every particle after each resampling.
    pub fn resample_move(
        config: FilterConfig,
        sampler: Arc<dyn Sampler>,
        kernel: impl MoveKernel + 'static,
    ) -> Result<Self> {
        let iterations = config.move_iterations;
        let mut filter = Self::new(config, sampler)?;
        filter.mover = Some(Mover::new(Box::new(kernel), iterations));
        Ok(filter)
    }

    pub fn with_writer(mut self, writer: impl ResultWriter + 'static) -> Self {
        self.writer = Box::new(writer);
        self
    }

    pub fn with_prior(mut self, prior: PartialWorld) -> Self {
        self.prior = prior;
        self
    }

    pub fn set_evidence(&mut self, evidence: Evidence) {
        self.evidence = evidence;
    }

    pub fn set_queries(&mut self, queries: Vec<Box<dyn Query>>) {
        self.queries = queries;
    }

    pub fn queries(&self) -> &[Box<dyn Query>] {
        &self.queries
    }

    /// Current results of every query set with [`set_queries`](Self::set_queries).
    pub fn query_results(&self) -> Vec<QueryResult> {
        self.queries.iter().map(|q| q.result()).collect()
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn is_populated(&self) -> bool {
        !self.particles.is_empty()
    }

    pub fn needs_resample(&self) -> bool {
        self.needs_resample
    }

    pub fn is_resample_move(&self) -> bool {
        self.mover.is_some()
    }

    /// Log marginal likelihood of all evidence taken since the last reset.
    pub fn data_log_likelihood(&self) -> f64 {
        self.data_log_likelihood
    }

    pub fn log_weights(&self) -> Vec<f64> {
        self.particles.iter().map(Particle::log_weight).collect()
    }

    pub fn effective_sample_size(&self) -> f64 {
        effective_sample_size(&self.log_weights())
    }

    /// Start over with a fresh population drawn from the prior.
    pub fn reset(&mut self) {
        self.particles = (0..self.config.num_particles)
            .map(|_| Particle::new(self.prior.fork(), Arc::clone(&self.sampler)))
            .collect();
        self.needs_resample = false;
        self.data_log_likelihood = 0.0;
        for query in &mut self.queries {
            query.reset();
        }
        if let Some(mover) = &mut self.mover {
            mover.reset();
        }
        info!(
            num_particles = self.config.num_particles,
            sampler = self.sampler.name(),
            "Reset particle population"
        );
    }

    /// Extend every particle over `evidence`.
    ///
    /// Empty evidence is ignored. If the previous take has not been resampled
    /// yet, the population is resampled (and moved, for resample-move) first.
    pub fn take(&mut self, evidence: &Evidence) -> Result<()> {
        if evidence.is_empty() {
            return Ok(());
        }
        if self.particles.is_empty() {
            return Err(SmcError::InvalidOperation(
                "filter has no particles; reset it before taking evidence".to_string(),
            ));
        }

        if self.needs_resample {
            self.resample()?;
            self.move_particles()?;
        }

        for particle in &mut self.particles {
            particle.take(evidence, &mut self.rng)?;
        }

        let log_weights = self.log_weights();
        let log_sum = log_sum_exp(&log_weights);
        if log_sum == f64::NEG_INFINITY {
            return Err(SmcError::AllParticlesDead);
        }
        self.data_log_likelihood += log_sum - (log_weights.len() as f64).ln();
        self.needs_resample = true;
        if let Some(mover) = &mut self.mover {
            mover.observe(evidence);
        }

        let ess = effective_sample_size(&log_weights);
        debug!(
            observations = evidence.len(),
            log_sum,
            ess,
            data_log_likelihood = self.data_log_likelihood,
            "Took evidence"
        );
        if log_weights.len() > 1 && ess < 1.0 + 1e-9 {
            warn!(
                particles = log_weights.len(),
                "Effective sample size collapsed to a single particle"
            );
        }
        Ok(())
    }

    /// Draw a new population by systematic resampling on the current weights.
    ///
    /// A particle selected more than once is reused for its first selection
    /// and copied for the rest. Survivors start over at log-weight 0.
    pub fn resample(&mut self) -> Result<()> {
        let log_weights = self.log_weights();
        let n = self.config.num_particles;
        let selection = systematic_selection(&log_weights, n, &mut self.rng)?;

        let mut previous: Vec<Option<Particle>> =
            mem::take(&mut self.particles).into_iter().map(Some).collect();
        let mut first_slot: Vec<Option<usize>> = vec![None; previous.len()];
        let mut next: Vec<Particle> = Vec::with_capacity(n);
        for &ancestor in &selection {
            let particle = match first_slot[ancestor] {
                Some(slot) => next[slot].copy(),
                None => {
                    let Some(particle) = previous[ancestor].take() else {
                        continue;
                    };
                    first_slot[ancestor] = Some(next.len());
                    particle
                }
            };
            next.push(particle);
        }
        drop(previous);

        let survivors = first_slot.iter().filter(|s| s.is_some()).count();
        let mut committed = 0;
        let mut rebased = 0;
        for particle in &mut next {
            particle.reset_weight();
            match particle.consolidate() {
                Consolidation::Committed => committed += 1,
                Consolidation::Rebased => rebased += 1,
                Consolidation::Kept | Consolidation::Unchanged => {}
            }
        }
        self.particles = next;
        self.needs_resample = false;

        debug!(survivors, committed, rebased, "Resampled particles");
        Ok(())
    }

    /// Run the move step on every particle; does nothing without a mover.
    ///
    /// Each chain runs on a fork of the particle's world, so a failing kernel
    /// leaves that particle as it was.
    pub fn move_particles(&mut self) -> Result<()> {
        let Some(mover) = self.mover.as_mut() else {
            return Ok(());
        };
        for particle in &mut self.particles {
            let moved = mover.run(particle.world().fork(), &mut self.rng)?;
            particle.set_world(moved);
            particle.reset_weight();
        }
        mover.log_progress(self.particles.len());
        Ok(())
    }

    /// Fold every particle into `queries`.
    pub fn answer(&self, queries: &mut [Box<dyn Query>]) {
        for particle in &self.particles {
            particle.answer(queries, self.config.negligible_log_weight);
        }
    }

    /// Forget every variable before `boundary` in every particle.
    pub fn remove_prior_time_slice(&mut self, boundary: Timestep) -> Result<()> {
        for particle in &mut self.particles {
            particle.remove_prior_time_slice(boundary)?;
        }
        Ok(())
    }

    /// Run inference over the configured evidence and queries.
    ///
    /// Resets the population, takes atemporal evidence, then walks the
    /// timesteps in order: take that step's evidence, answer its queries,
    /// write their results, and trim history before it. Atemporal queries
    /// are answered and written last. History is kept for resample-move,
    /// whose moves may revisit earlier variables.
    pub fn answer_queries(&mut self) -> Result<()> {
        self.reset();
        let queries = mem::take(&mut self.queries);
        let mut timeline = Timeline::split(&self.evidence, queries);
        let outcome = self.run_timeline(&mut timeline);
        self.queries = timeline.into_queries();
        outcome?;

        info!(
            data_log_likelihood = self.data_log_likelihood,
            "Log likelihood of data"
        );
        Ok(())
    }

    fn run_timeline(&mut self, timeline: &mut Timeline) -> Result<()> {
        self.take(timeline.atemporal_evidence())?;

        for t in timeline.timesteps() {
            if let Some(evidence) = timeline.evidence_at(t) {
                self.take(evidence)?;
            }
            let queries = timeline.queries_at(t);
            if !queries.is_empty() {
                self.report(Some(t), queries)?;
            }
            if self.mover.is_none() {
                self.remove_prior_time_slice(t)?;
            }
        }

        let queries = timeline.atemporal_queries();
        if !queries.is_empty() {
            self.report(None, queries)?;
        }
        Ok(())
    }

    fn report(&mut self, timestep: Option<Timestep>, queries: &mut [Box<dyn Query>]) -> Result<()> {
        self.answer(queries);
        let results: Vec<QueryResult> = queries.iter().map(|q| q.result()).collect();
        self.writer.write_all_results(timestep, &results)
    }
}

impl std::fmt::Debug for ParticleFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParticleFilter")
            .field("config", &self.config)
            .field("sampler", &self.sampler.name())
            .field("particles", &self.particles.len())
            .field("needs_resample", &self.needs_resample)
            .field("data_log_likelihood", &self.data_log_likelihood)
            .field("resample_move", &self.mover.is_some())
            .finish()
    }
}
