//! Evidence and queries split by timestep.

use crate::query::Query;
use crate::types::{Evidence, Timestep};
use std::collections::{BTreeMap, BTreeSet};

/// Evidence and queries grouped by the timestep they refer to.
///
/// Atemporal evidence is taken before any timestep; atemporal queries are
/// answered after the last one.
#[derive(Default)]
pub struct Timeline {
    atemporal_evidence: Evidence,
    evidence: BTreeMap<Timestep, Evidence>,
    atemporal_queries: Vec<Box<dyn Query>>,
    queries: BTreeMap<Timestep, Vec<Box<dyn Query>>>,
}

impl Timeline {
    /// Split `evidence` by the timestep of each observed variable and take
    /// ownership of `queries`, grouped by their timestep.
    pub fn split(evidence: &Evidence, queries: Vec<Box<dyn Query>>) -> Self {
        let mut timeline = Timeline::default();
        for obs in evidence.iter() {
            let slot = match obs.variable.timestep {
                Some(t) => timeline.evidence.entry(t).or_default(),
                None => &mut timeline.atemporal_evidence,
            };
            slot.push(obs.variable.clone(), obs.value.clone());
        }
        for query in queries {
            match query.timestep() {
                Some(t) => timeline.queries.entry(t).or_default().push(query),
                None => timeline.atemporal_queries.push(query),
            }
        }
        timeline
    }

    /// Every timestep with evidence or queries, in order.
    pub fn timesteps(&self) -> Vec<Timestep> {
        let steps: BTreeSet<Timestep> = self
            .evidence
            .keys()
            .chain(self.queries.keys())
            .copied()
            .collect();
        steps.into_iter().collect()
    }

    pub fn atemporal_evidence(&self) -> &Evidence {
        &self.atemporal_evidence
    }

    /// Evidence observed at `t`; `None` if there is none.
    pub fn evidence_at(&self, t: Timestep) -> Option<&Evidence> {
        self.evidence.get(&t)
    }

    pub fn queries_at(&mut self, t: Timestep) -> &mut [Box<dyn Query>] {
        self.queries
            .get_mut(&t)
            .map(Vec::as_mut_slice)
            .unwrap_or_default()
    }

    pub fn atemporal_queries(&mut self) -> &mut [Box<dyn Query>] {
        &mut self.atemporal_queries
    }

    /// Give the queries back, temporal ones in timestep order first.
    pub fn into_queries(self) -> Vec<Box<dyn Query>> {
        let mut queries: Vec<Box<dyn Query>> = self.queries.into_values().flatten().collect();
        queries.extend(self.atemporal_queries);
        queries
    }
}
