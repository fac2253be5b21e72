//! Core types shared by worlds, samplers and queries.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Ordered time token for temporal variables.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct Timestep(pub u64);

impl fmt::Debug for Timestep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

impl fmt::Display for Timestep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

impl Timestep {
    pub fn next(self) -> Self {
        Timestep(self.0 + 1)
    }

    pub fn prev(self) -> Option<Self> {
        if self.0 > 0 {
            Some(Timestep(self.0 - 1))
        } else {
            None
        }
    }
}

/// A random variable of the model, optionally indexed by a timestep.
///
/// Variables are ordered by timestep first, with atemporal variables sorted
/// after every temporal one, then by name. This puts the oldest temporal
/// variables at the front of an ordered world, where history trimming works.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    pub timestep: Option<Timestep>,
}

impl Variable {
    /// An atemporal variable.
    pub fn atemporal(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            timestep: None,
        }
    }

    /// A variable living at timestep `t`.
    pub fn temporal(name: impl Into<String>, t: u64) -> Self {
        Self {
            name: name.into(),
            timestep: Some(Timestep(t)),
        }
    }

    /// True if this variable belongs to a timestep strictly before `boundary`.
    pub fn is_before(&self, boundary: Timestep) -> bool {
        matches!(self.timestep, Some(t) if t < boundary)
    }
}

impl Ord for Variable {
    fn cmp(&self, other: &Self) -> Ordering {
        let by_time = match (self.timestep, other.timestep) {
            (Some(a), Some(b)) => a.cmp(&b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        by_time.then_with(|| self.name.cmp(&other.name))
    }
}

impl PartialOrd for Variable {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Debug for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.timestep {
            Some(t) => write!(f, "{}{}", self.name, t),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Value assigned to a variable.
///
/// Reals compare and hash by bit pattern so values can key histograms and
/// preimage indices.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Real(f64),
    Text(String),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Real(a), Value::Real(b)) => a.to_bits() == b.to_bits(),
            (Value::Text(a), Value::Text(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Bool(b) => b.hash(state),
            Value::Int(i) => i.hash(state),
            Value::Real(r) => r.to_bits().hash(state),
            Value::Text(s) => s.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Real(r) => write!(f, "{}", r),
            Value::Text(s) => write!(f, "{:?}", s),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(r: f64) -> Self {
        Value::Real(r)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

/// A single observed variable assignment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub variable: Variable,
    pub value: Value,
}

/// A batch of observations handed to the filter.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evidence {
    observations: Vec<Observation>,
}

impl Evidence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an observation.
    pub fn observe(mut self, variable: Variable, value: impl Into<Value>) -> Self {
        self.push(variable, value);
        self
    }

    pub fn push(&mut self, variable: Variable, value: impl Into<Value>) {
        self.observations.push(Observation {
            variable,
            value: value.into(),
        });
    }

    /// Append every observation of `other`.
    pub fn extend(&mut self, other: &Evidence) {
        self.observations.extend(other.observations.iter().cloned());
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Observation> {
        self.observations.iter()
    }

    /// Observed value of a variable, if any.
    pub fn value_of(&self, variable: &Variable) -> Option<&Value> {
        self.observations
            .iter()
            .find(|o| &o.variable == variable)
            .map(|o| &o.value)
    }
}

impl FromIterator<Observation> for Evidence {
    fn from_iter<I: IntoIterator<Item = Observation>>(iter: I) -> Self {
        Self {
            observations: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_timestep_navigation() {
        let t = Timestep(5);
        assert_eq!(t.next(), Timestep(6));
        assert_eq!(t.prev(), Some(Timestep(4)));
        assert_eq!(Timestep(0).prev(), None);
    }

    #[test]
    fn test_variable_order_puts_atemporal_last() {
        let mut vars = vec![
            Variable::atemporal("bias"),
            Variable::temporal("state", 2),
            Variable::temporal("obs", 0),
            Variable::temporal("state", 0),
        ];
        vars.sort();
        let names: Vec<String> = vars.iter().map(|v| v.to_string()).collect();
        assert_eq!(names, vec!["obs@0", "state@0", "state@2", "bias"]);
    }

    #[test]
    fn test_is_before() {
        let v = Variable::temporal("x", 3);
        assert!(v.is_before(Timestep(4)));
        assert!(!v.is_before(Timestep(3)));
        assert!(!Variable::atemporal("x").is_before(Timestep(100)));
    }

    #[test]
    fn test_real_values_hash_by_bits() {
        let mut set = HashSet::new();
        set.insert(Value::Real(0.5));
        set.insert(Value::Real(0.5));
        set.insert(Value::Int(1));
        assert_eq!(set.len(), 2);
        assert_ne!(Value::Int(1), Value::Real(1.0));
    }

    #[test]
    fn test_value_json_is_untagged() {
        let json = serde_json::to_string(&vec![
            Value::Bool(true),
            Value::Int(3),
            Value::Text("a".into()),
        ])
        .unwrap();
        assert_eq!(json, r#"[true,3,"a"]"#);
    }

    #[test]
    fn test_evidence_lookup() {
        let evidence = Evidence::new()
            .observe(Variable::temporal("obs", 0), true)
            .observe(Variable::temporal("obs", 1), false);
        assert_eq!(evidence.len(), 2);
        assert_eq!(
            evidence.value_of(&Variable::temporal("obs", 1)),
            Some(&Value::Bool(false))
        );
        assert!(evidence.value_of(&Variable::temporal("obs", 2)).is_none());
    }
}
