//! Two-state hidden Markov model used across filter tests.
//!
//! States: 0 = dry, 1 = rain. Observation: whether an umbrella was seen.

#![allow(dead_code)]

use delta_smc::{
    Evidence, MetropolisHastings, PartialWorld, Proposal, Result, Sample, Sampler, SmcError,
    Target, Timestep, Value, Variable,
};
use rand::{Rng, RngCore};

pub const INIT: [f64; 2] = [0.6, 0.4];
pub const TRANSITION: [[f64; 2]; 2] = [[0.7, 0.3], [0.2, 0.8]];
/// P(umbrella | state)
pub const UMBRELLA: [f64; 2] = [0.1, 0.8];

pub fn state(t: u64) -> Variable {
    Variable::temporal("state", t)
}

pub fn umbrella(t: u64) -> Variable {
    Variable::temporal("umbrella", t)
}

/// One observation per timestep.
pub fn observations(seen: &[bool]) -> Evidence {
    seen.iter()
        .enumerate()
        .map(|(t, &u)| (umbrella(t as u64), u))
        .fold(Evidence::new(), |e, (v, u)| e.observe(v, u))
}

pub fn emission_log_prob(state: usize, seen: bool) -> f64 {
    let p = UMBRELLA[state];
    if seen {
        p.ln()
    } else {
        (1.0 - p).ln()
    }
}

fn draw(probs: &[f64; 2], rng: &mut dyn RngCore) -> usize {
    if rng.gen::<f64>() < probs[0] {
        0
    } else {
        1
    }
}

fn state_of(world: &PartialWorld, t: u64) -> Option<usize> {
    match world.get(&state(t)) {
        Some(Value::Int(s)) => Some(s as usize),
        _ => None,
    }
}

/// Instantiate `state@t`, sampling forward from the latest earlier state.
fn ensure_state(world: &mut PartialWorld, t: u64, rng: &mut dyn RngCore) -> Result<usize> {
    if let Some(s) = state_of(world, t) {
        return Ok(s);
    }
    let known = (0..t).rev().find_map(|k| state_of(world, k).map(|s| (k, s)));
    let (mut k, mut s) = match known {
        Some(found) => found,
        None => {
            let s0 = draw(&INIT, rng);
            world.set(state(0), Value::Int(s0 as i64))?;
            (0, s0)
        }
    };
    while k < t {
        k += 1;
        s = draw(&TRANSITION[s], rng);
        world.set(state(k), Value::Int(s as i64))?;
    }
    Ok(s)
}

/// Bootstrap sampler: states from the prior, weights from the emissions.
pub struct HmmSampler;

impl Sampler for HmmSampler {
    fn name(&self) -> &str {
        "hmm"
    }

    fn extend(
        &self,
        mut base: PartialWorld,
        evidence: &Evidence,
        rng: &mut dyn RngCore,
    ) -> Result<Sample> {
        let mut log_weight = 0.0;
        for obs in evidence.iter() {
            let Some(Timestep(t)) = obs.variable.timestep else {
                continue;
            };
            let Value::Bool(seen) = obs.value else {
                return Err(SmcError::Sampler(format!(
                    "umbrella observation must be boolean, got {}",
                    obs.value
                )));
            };
            let s = ensure_state(&mut base, t, rng)?;
            log_weight += emission_log_prob(s, seen);
        }
        Ok(Sample {
            world: base,
            log_weight,
        })
    }
}

/// Joint log density of the instantiated states and the observations.
pub struct HmmTarget;

impl Target for HmmTarget {
    fn log_density(&self, world: &PartialWorld, evidence: &Evidence) -> f64 {
        let mut total = 0.0;
        let mut t = 0;
        let mut previous: Option<usize> = None;
        while let Some(s) = state_of(world, t) {
            total += match previous {
                None => INIT[s].ln(),
                Some(p) => TRANSITION[p][s].ln(),
            };
            previous = Some(s);
            t += 1;
        }
        for obs in evidence.iter() {
            if let (Some(Timestep(k)), Value::Bool(seen)) = (obs.variable.timestep, &obs.value) {
                match state_of(world, k) {
                    Some(s) => total += emission_log_prob(s, *seen),
                    None => return f64::NEG_INFINITY,
                }
            }
        }
        total
    }
}

/// Flip one uniformly chosen state.
pub struct FlipOneState;

impl Proposal for FlipOneState {
    fn propose(&self, current: &PartialWorld, rng: &mut dyn RngCore) -> Result<(PartialWorld, f64)> {
        let states: Vec<Variable> = current
            .variables()
            .into_iter()
            .filter(|v| v.name == "state")
            .collect();
        let mut next = current.fork();
        if states.is_empty() {
            return Ok((next, 0.0));
        }
        let pick = &states[rng.gen_range(0..states.len())];
        if let Some(Value::Int(s)) = current.get(pick) {
            next.set(pick.clone(), Value::Int(1 - s))?;
        }
        Ok((next, 0.0))
    }
}

pub fn hmm_kernel() -> MetropolisHastings<HmmTarget, FlipOneState> {
    MetropolisHastings::new(HmmTarget, FlipOneState)
}

/// Exact `ln p(o_0..o_T)` and filtered `p(s_T | o_0..o_T)` by enumerating
/// every state path.
pub fn brute_force(seen: &[bool]) -> (f64, [f64; 2]) {
    let steps = seen.len();
    let mut joint = 0.0;
    let mut last = [0.0; 2];
    for path in 0..(1usize << steps) {
        let mut p = 1.0;
        let mut previous: Option<usize> = None;
        for (t, &u) in seen.iter().enumerate() {
            let s = (path >> t) & 1;
            p *= match previous {
                None => INIT[s],
                Some(q) => TRANSITION[q][s],
            };
            p *= if u { UMBRELLA[s] } else { 1.0 - UMBRELLA[s] };
            previous = Some(s);
        }
        joint += p;
        last[(path >> (steps - 1)) & 1] += p;
    }
    (joint.ln(), [last[0] / joint, last[1] / joint])
}

/// Exact log marginal likelihood by the forward algorithm.
pub fn forward_log_likelihood(seen: &[bool]) -> f64 {
    let mut alpha = [0.0; 2];
    let mut log_scale = 0.0;
    for (t, &u) in seen.iter().enumerate() {
        let mut next = [0.0; 2];
        for s in 0..2 {
            let prior = if t == 0 {
                INIT[s]
            } else {
                alpha[0] * TRANSITION[0][s] + alpha[1] * TRANSITION[1][s]
            };
            next[s] = prior * if u { UMBRELLA[s] } else { 1.0 - UMBRELLA[s] };
        }
        let norm = next[0] + next[1];
        log_scale += norm.ln();
        alpha = [next[0] / norm, next[1] / norm];
    }
    log_scale
}

/// Route filter logs to the test harness; safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

pub fn total_variation(a: &[f64; 2], b: &[f64; 2]) -> f64 {
    0.5 * ((a[0] - b[0]).abs() + (a[1] - b[1]).abs())
}
