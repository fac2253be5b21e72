//! Partial worlds.
//!
//! A world is an assignment of values to the variables a particle has
//! instantiated so far. Each part of it is a delta collection, so forking a
//! world copies only what changed since its parts were last consolidated.

use crate::delta::{Delta, HashMapDiff, HashMultiMapDiff, IndexedSetDiff};
use crate::error::Result;
use crate::types::{Timestep, Value, Variable};
use std::collections::HashSet;
use tracing::trace;

/// Outcome of [`PartialWorld::consolidate`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Consolidation {
    /// No local changes.
    Unchanged,
    /// Changes were folded into the exclusively owned underlying collections.
    Committed,
    /// The world was copied into fresh underlying collections.
    Rebased,
    /// Underlying collections are shared and the delta is still small.
    Kept,
}

/// Variable assignment held by a particle.
#[derive(Clone, Debug)]
pub struct PartialWorld {
    /// Variable to value.
    values: HashMapDiff<Variable, Value>,

    /// Instantiated variables, oldest timestep first.
    order: IndexedSetDiff<Variable>,

    /// Value to the variables currently holding it.
    preimage: HashMultiMapDiff<Value, Variable>,
}

impl Default for PartialWorld {
    fn default() -> Self {
        Self {
            values: HashMapDiff::empty(),
            order: IndexedSetDiff::empty(),
            preimage: HashMultiMapDiff::empty(),
        }
    }
}

impl PartialWorld {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a world from explicit assignments.
    pub fn from_assignments(
        assignments: impl IntoIterator<Item = (Variable, Value)>,
    ) -> Result<Self> {
        let mut world = Self::new();
        for (variable, value) in assignments {
            world.set(variable, value)?;
        }
        Ok(world)
    }

    pub fn get(&self, variable: &Variable) -> Option<Value> {
        self.values.get(variable)
    }

    pub fn contains(&self, variable: &Variable) -> bool {
        self.values.contains_key(variable)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Assign `value` to `variable`, returning the previous value.
    pub fn set(&mut self, variable: Variable, value: Value) -> Result<Option<Value>> {
        let old = self.values.insert(variable.clone(), value.clone());
        match &old {
            Some(previous) if *previous != value => {
                self.preimage.remove(previous, &variable);
            }
            Some(_) => {}
            None => {
                self.order.insert(variable.clone())?;
            }
        }
        self.preimage.add(value, variable);
        Ok(old)
    }

    /// Uninstantiate `variable`, returning its value.
    pub fn remove(&mut self, variable: &Variable) -> Result<Option<Value>> {
        let old = self.values.remove(variable);
        if let Some(previous) = &old {
            self.order.remove(variable)?;
            self.preimage.remove(previous, variable);
        }
        Ok(old)
    }

    /// Instantiated variables, oldest timestep first.
    pub fn variables(&self) -> Vec<Variable> {
        self.order.iter().collect()
    }

    /// The `index`-th instantiated variable in temporal order.
    pub fn variable_at(&self, index: usize) -> Result<Variable> {
        self.order.get(index)
    }

    /// Variables currently assigned `value`.
    pub fn variables_with_value(&self, value: &Value) -> HashSet<Variable> {
        self.preimage.get(value)
    }

    /// Assignments in temporal order.
    pub fn assignments(&self) -> Vec<(Variable, Value)> {
        self.order
            .iter()
            .filter_map(|v| self.values.get(&v).map(|value| (v, value)))
            .collect()
    }

    /// An independent copy sharing this world's underlying collections.
    pub fn fork(&self) -> Self {
        self.clone()
    }

    /// Forget every variable of a timestep strictly before `boundary`.
    /// Returns how many were removed.
    pub fn remove_prior_time_slice(&mut self, boundary: Timestep) -> Result<usize> {
        let mut removed = 0;
        while let Some(oldest) = self.order.first() {
            if !oldest.is_before(boundary) {
                break;
            }
            self.remove(&oldest)?;
            removed += 1;
        }
        Ok(removed)
    }

    /// Fold local changes into the underlying collections when that is safe.
    ///
    /// Commits when nothing else shares the underlying collections. Shared
    /// underlying collections are left alone until the delta outgrows them,
    /// at which point the world moves onto a private copy.
    pub fn consolidate(&mut self) -> Consolidation {
        let outcome = if !self.has_changes() {
            Consolidation::Unchanged
        } else if self.is_exclusive() {
            self.commit();
            Consolidation::Committed
        } else if self.delta_len() > self.underlying_len() {
            self.rebase();
            Consolidation::Rebased
        } else {
            Consolidation::Kept
        };
        trace!(?outcome, variables = self.len(), "Consolidated world");
        outcome
    }

    /// A copy of this world with its own private underlying collections.
    pub fn materialize(&self) -> Self {
        let mut world = self.clone();
        world.rebase();
        world
    }
}

impl Delta for PartialWorld {
    fn commit(&mut self) {
        self.values.commit();
        self.order.commit();
        self.preimage.commit();
    }

    fn clear_changes(&mut self) {
        self.values.clear_changes();
        self.order.clear_changes();
        self.preimage.clear_changes();
    }

    fn delta_len(&self) -> usize {
        self.values.delta_len() + self.order.delta_len() + self.preimage.delta_len()
    }

    fn underlying_len(&self) -> usize {
        self.values.underlying_len()
    }

    fn is_exclusive(&self) -> bool {
        self.values.is_exclusive() && self.order.is_exclusive() && self.preimage.is_exclusive()
    }

    fn rebase(&mut self) {
        self.values.rebase();
        self.order.rebase();
        self.preimage.rebase();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(t: u64) -> Variable {
        Variable::temporal("state", t)
    }

    #[test]
    fn test_set_get_and_preimage() {
        let mut world = PartialWorld::new();
        world.set(state(0), Value::Int(1)).unwrap();
        world.set(state(1), Value::Int(1)).unwrap();
        world.set(state(2), Value::Int(0)).unwrap();

        assert_eq!(world.get(&state(1)), Some(Value::Int(1)));
        assert_eq!(world.variables_with_value(&Value::Int(1)).len(), 2);

        let old = world.set(state(1), Value::Int(0)).unwrap();
        assert_eq!(old, Some(Value::Int(1)));
        let ones = world.variables_with_value(&Value::Int(1));
        assert_eq!(ones, [state(0)].into_iter().collect());
        assert_eq!(world.len(), 3);
    }

    #[test]
    fn test_variables_in_temporal_order() {
        let mut world = PartialWorld::new();
        world.set(Variable::atemporal("bias"), Value::Real(0.5)).unwrap();
        world.set(state(3), Value::Bool(true)).unwrap();
        world.set(state(1), Value::Bool(false)).unwrap();

        let names: Vec<String> = world.variables().iter().map(|v| v.to_string()).collect();
        assert_eq!(names, vec!["state@1", "state@3", "bias"]);
        assert_eq!(world.variable_at(1).unwrap(), state(3));
    }

    #[test]
    fn test_fork_is_independent() {
        let mut world = PartialWorld::new();
        world.set(state(0), Value::Int(0)).unwrap();
        world.commit();

        let mut fork = world.fork();
        fork.set(state(0), Value::Int(1)).unwrap();
        fork.set(state(1), Value::Int(1)).unwrap();

        assert_eq!(world.get(&state(0)), Some(Value::Int(0)));
        assert!(!world.contains(&state(1)));
        assert_eq!(fork.len(), 2);
    }

    #[test]
    fn test_remove_prior_time_slice() {
        let mut world = PartialWorld::new();
        for t in 0..5 {
            world.set(state(t), Value::Int(t as i64)).unwrap();
        }
        world.set(Variable::atemporal("bias"), Value::Int(9)).unwrap();

        let removed = world.remove_prior_time_slice(Timestep(3)).unwrap();
        assert_eq!(removed, 3);
        assert_eq!(world.len(), 3);
        assert!(world.contains(&state(3)));
        assert!(world.contains(&Variable::atemporal("bias")));
        assert!(world.variables_with_value(&Value::Int(0)).is_empty());
    }

    #[test]
    fn test_consolidate_commits_when_exclusive() {
        let mut world = PartialWorld::new();
        world.set(state(0), Value::Int(0)).unwrap();
        assert_eq!(world.consolidate(), Consolidation::Committed);
        assert_eq!(world.delta_len(), 0);
        assert_eq!(world.underlying_len(), 1);
        assert_eq!(world.consolidate(), Consolidation::Unchanged);
    }

    #[test]
    fn test_consolidate_keeps_or_rebases_shared_worlds() {
        let mut base = PartialWorld::new();
        for t in 0..10 {
            base.set(state(t), Value::Int(0)).unwrap();
        }
        base.commit();

        let mut small = base.fork();
        small.set(state(10), Value::Int(1)).unwrap();
        assert_eq!(small.consolidate(), Consolidation::Kept);

        let mut large = base.fork();
        for t in 10..40 {
            large.set(state(t), Value::Int(1)).unwrap();
        }
        assert_eq!(large.consolidate(), Consolidation::Rebased);
        assert!(large.is_exclusive());
        assert_eq!(large.len(), 40);
        assert_eq!(base.len(), 10);
    }

    #[test]
    fn test_materialize_detaches() {
        let mut world = PartialWorld::new();
        world.set(state(0), Value::Int(0)).unwrap();
        let copy = world.materialize();
        assert!(copy.is_exclusive());
        assert_eq!(copy.assignments(), world.assignments());
    }
}
