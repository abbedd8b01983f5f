//! Normalized rule conditions
//!
//! A production's left-hand side is an ordered list of [`Condition`]s:
//!
//! ```text
//! Pattern   (?x ^on ?y)            positive match against one WME
//! Negation  -(?y ^color red)       no WME matches given the current bindings
//! Ncc       -{ c1 c2 ... }         no combination of the sub-conditions matches
//! Filter    test(?x, ?y)           predicate over bound variables
//! Bind      ?z <- f(?x)            computes a new binding
//! ```
//!
//! Order matters: a condition may only test variables bound by conditions
//! before it.

use crate::error::{ReteError, ReteResult};
use crate::types::{Bindings, Wme};
use reticle_types::{Field, Term, Value, Var};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Predicate evaluated by a filter node
pub type PredicateFn = Arc<dyn Fn(&Bindings) -> anyhow::Result<bool> + Send + Sync>;

/// Function evaluated by a bind node
pub type BindFn = Arc<dyn Fn(&Bindings) -> anyhow::Result<Value> + Send + Sync>;

/// A (identifier, attribute, value) triple of terms
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pattern {
    pub identifier: Term,
    pub attribute: Term,
    pub value: Term,
}

impl Pattern {
    pub fn new(identifier: impl Into<Term>, attribute: impl Into<Term>, value: impl Into<Term>) -> Self {
        Self { identifier: identifier.into(), attribute: attribute.into(), value: value.into() }
    }

    /// The term in one field
    pub fn get(&self, field: Field) -> &Term {
        match field {
            Field::Identifier => &self.identifier,
            Field::Attribute => &self.attribute,
            Field::Value => &self.value,
        }
    }

    /// Variable fields in triple order
    pub fn vars(&self) -> Vec<(Field, &Var)> {
        Field::ALL.iter().filter_map(|&field| self.get(field).as_var().map(|var| (field, var))).collect()
    }

    /// The first field holding `var`, if any
    pub fn contain(&self, var: &Var) -> Option<Field> {
        Field::ALL.iter().copied().find(|&field| self.get(field).as_var() == Some(var))
    }

    /// Constant test: every constant field must equal the WME's field.
    /// Variable fields always match.
    pub fn test(&self, wme: &Wme) -> bool {
        Field::ALL.iter().all(|&field| match self.get(field) {
            Term::Const(expected) => wme.get(field) == expected,
            Term::Var(_) => true,
        })
    }

    /// Bindings contributed by `wme`, or `None` when they conflict with
    /// `existing` or with themselves (a variable repeated across fields).
    pub fn make_binding(&self, wme: &Wme, existing: &Bindings) -> Option<Bindings> {
        let mut binding = Bindings::new();
        for (field, var) in self.vars() {
            let value = wme.get(field);
            if existing.get(var).is_some_and(|bound| bound != value) {
                return None;
            }
            if binding.get(var).is_some_and(|bound| bound != value) {
                return None;
            }
            binding.insert(var.clone(), value.clone());
        }
        Some(binding)
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({} ^{} {})", self.identifier, self.attribute, self.value)
    }
}

/// Equality test between a field of the incoming WME and a field of a WME
/// matched by an earlier condition of the same production
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JoinTest {
    pub wme_field: Field,
    /// Slot of the earlier condition in the token's WME list
    pub condition_index: usize,
    pub earlier_field: Field,
}

impl fmt::Display for JoinTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "wme.{} = cond{}.{}", self.wme_field, self.condition_index, self.earlier_field)
    }
}

/// Project `binding` onto the named parameters
pub fn select_bindings(binding: &Bindings, params: &[Var]) -> ReteResult<Bindings> {
    params
        .iter()
        .map(|var| match binding.get(var) {
            Some(value) => Ok((var.clone(), value.clone())),
            None => Err(ReteError::unbound_variable(
                var.name(),
                format!("{var} is not bound by the conditions before it"),
            )),
        })
        .collect()
}

/// Boolean test over bound variables
#[derive(Clone)]
pub struct Filter {
    pub params: Vec<Var>,
    pub predicate: PredicateFn,
}

impl Filter {
    pub fn new<P, V, F>(params: P, predicate: F) -> Self
    where
        P: IntoIterator<Item = V>,
        V: Into<Var>,
        F: Fn(&Bindings) -> anyhow::Result<bool> + Send + Sync + 'static,
    {
        Self { params: params.into_iter().map(Into::into).collect(), predicate: Arc::new(predicate) }
    }

    /// Run the predicate against the selected parameters of `binding`
    pub fn evaluate(&self, binding: &Bindings) -> ReteResult<bool> {
        let args = select_bindings(binding, &self.params)?;
        (self.predicate)(&args).map_err(|e| ReteError::procedure("filter predicate failed", &e))
    }
}

impl PartialEq for Filter {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.predicate), Arc::as_ptr(&other.predicate))
            && self.params == other.params
    }
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Filter").field("params", &self.params).finish_non_exhaustive()
    }
}

/// Computes a value from bound variables and binds it to `target`
#[derive(Clone)]
pub struct Bind {
    pub params: Vec<Var>,
    pub target: Var,
    pub function: BindFn,
}

impl Bind {
    pub fn new<P, V, F>(params: P, target: impl Into<Var>, function: F) -> Self
    where
        P: IntoIterator<Item = V>,
        V: Into<Var>,
        F: Fn(&Bindings) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        Self {
            params: params.into_iter().map(Into::into).collect(),
            target: target.into(),
            function: Arc::new(function),
        }
    }

    pub fn evaluate(&self, binding: &Bindings) -> ReteResult<Value> {
        let args = select_bindings(binding, &self.params)?;
        (self.function)(&args)
            .map_err(|e| ReteError::procedure(format!("bind function for {} failed", self.target), &e))
    }
}

impl PartialEq for Bind {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.function), Arc::as_ptr(&other.function))
            && self.params == other.params
            && self.target == other.target
    }
}

impl fmt::Debug for Bind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bind")
            .field("params", &self.params)
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

/// One element of a production's left-hand side
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Pattern(Pattern),
    Negation(Pattern),
    Ncc(Vec<Condition>),
    Filter(Filter),
    Bind(Bind),
}

impl Condition {
    pub fn pattern(identifier: impl Into<Term>, attribute: impl Into<Term>, value: impl Into<Term>) -> Self {
        Self::Pattern(Pattern::new(identifier, attribute, value))
    }

    pub fn negation(identifier: impl Into<Term>, attribute: impl Into<Term>, value: impl Into<Term>) -> Self {
        Self::Negation(Pattern::new(identifier, attribute, value))
    }

    pub fn ncc(conditions: impl IntoIterator<Item = Condition>) -> Self {
        Self::Ncc(conditions.into_iter().collect())
    }

    pub fn filter<P, V, F>(params: P, predicate: F) -> Self
    where
        P: IntoIterator<Item = V>,
        V: Into<Var>,
        F: Fn(&Bindings) -> anyhow::Result<bool> + Send + Sync + 'static,
    {
        Self::Filter(Filter::new(params, predicate))
    }

    pub fn bind<P, V, F>(params: P, target: impl Into<Var>, function: F) -> Self
    where
        P: IntoIterator<Item = V>,
        V: Into<Var>,
        F: Fn(&Bindings) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        Self::Bind(Bind::new(params, target, function))
    }

    /// Whether this condition occupies a slot in a match's WME list.
    /// Filters and binds do not.
    pub fn fills_slot(&self) -> bool {
        matches!(self, Self::Pattern(_) | Self::Negation(_) | Self::Ncc(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Pattern(_) => "pattern",
            Self::Negation(_) => "negation",
            Self::Ncc(_) => "ncc",
            Self::Filter(_) => "filter",
            Self::Bind(_) => "bind",
        }
    }
}

impl From<Pattern> for Condition {
    fn from(pattern: Pattern) -> Self {
        Self::Pattern(pattern)
    }
}

/// Number of slots a condition list occupies
pub fn number_of_conditions(conditions: &[Condition]) -> usize {
    conditions.iter().filter(|c| c.fills_slot()).count()
}
