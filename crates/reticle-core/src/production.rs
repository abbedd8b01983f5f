//! Productions and their activations
//!
//! A [`Production`] pairs a condition list with an optional action. Once the
//! production is added to a network, every complete match of its conditions is
//! an [`Activation`].

use crate::conditions::{Condition, Pattern};
use crate::error::{ReteError, ReteResult};
use crate::rete_network::ReteNetwork;
use crate::types::{Bindings, ProductionId, TokenId, Wme};
use reticle_types::{Term, Value, Var};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Action run when an activation fires. It may assert or retract facts.
pub type ActionFn = Arc<dyn Fn(&mut ReteNetwork, &Bindings) -> anyhow::Result<()> + Send + Sync>;

/// A rule: ordered conditions plus the action to run on each match
#[derive(Clone)]
pub struct Production {
    pub id: ProductionId,
    pub name: String,
    pub conditions: Vec<Condition>,
    pub action: Option<ActionFn>,
}

impl Production {
    /// Production without an action
    pub fn new(id: ProductionId, name: impl Into<String>, conditions: Vec<Condition>) -> Self {
        Self { id, name: name.into(), conditions, action: None }
    }

    pub fn builder(id: ProductionId, name: impl Into<String>) -> ProductionBuilder {
        ProductionBuilder { production: Self::new(id, name, Vec::new()) }
    }

    /// Reject condition lists the network cannot compile
    pub fn validate(&self) -> ReteResult<()> {
        validate_conditions(&self.conditions).map_err(|message| {
            ReteError::invalid_production(self.id, &self.name, message)
        })
    }
}

fn validate_conditions(conditions: &[Condition]) -> Result<(), String> {
    for condition in conditions {
        if let Condition::Ncc(inner) = condition {
            if inner.is_empty() {
                return Err("negated conjunction has no conditions".to_string());
            }
            validate_conditions(inner)?;
        }
    }
    Ok(())
}

impl fmt::Debug for Production {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Production")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("conditions", &self.conditions)
            .field("has_action", &self.action.is_some())
            .finish()
    }
}

/// Fluent construction of a [`Production`]
#[derive(Debug)]
pub struct ProductionBuilder {
    production: Production,
}

impl ProductionBuilder {
    /// Positive pattern
    pub fn when(self, identifier: impl Into<Term>, attribute: impl Into<Term>, value: impl Into<Term>) -> Self {
        self.condition(Condition::Pattern(Pattern::new(identifier, attribute, value)))
    }

    /// Negated pattern
    pub fn unless(self, identifier: impl Into<Term>, attribute: impl Into<Term>, value: impl Into<Term>) -> Self {
        self.condition(Condition::Negation(Pattern::new(identifier, attribute, value)))
    }

    /// Negated conjunction
    pub fn none_of(self, conditions: impl IntoIterator<Item = Condition>) -> Self {
        self.condition(Condition::ncc(conditions))
    }

    pub fn filter<P, V, F>(self, params: P, predicate: F) -> Self
    where
        P: IntoIterator<Item = V>,
        V: Into<Var>,
        F: Fn(&Bindings) -> anyhow::Result<bool> + Send + Sync + 'static,
    {
        self.condition(Condition::filter(params, predicate))
    }

    pub fn bind<P, V, F>(self, params: P, target: impl Into<Var>, function: F) -> Self
    where
        P: IntoIterator<Item = V>,
        V: Into<Var>,
        F: Fn(&Bindings) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.condition(Condition::bind(params, target, function))
    }

    pub fn condition(mut self, condition: Condition) -> Self {
        self.production.conditions.push(condition);
        self
    }

    pub fn then<F>(mut self, action: F) -> Self
    where
        F: Fn(&mut ReteNetwork, &Bindings) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.production.action = Some(Arc::new(action));
        self
    }

    pub fn build(self) -> Production {
        self.production
    }
}

/// Copyable handle naming one activation, used to fire it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActivationId {
    pub production: ProductionId,
    pub token: TokenId,
}

/// A current match of a production, borrowed from the network
#[derive(Clone)]
pub struct Activation<'a> {
    pub(crate) network: &'a ReteNetwork,
    pub(crate) production: &'a Production,
    pub(crate) token: TokenId,
}

impl<'a> Activation<'a> {
    pub fn id(&self) -> ActivationId {
        ActivationId { production: self.production.id, token: self.token }
    }

    pub fn production(&self) -> &'a Production {
        self.production
    }

    pub fn token(&self) -> TokenId {
        self.token
    }

    /// Supporting WMEs in condition order; negations and negated
    /// conjunctions contribute `None`
    pub fn wmes(&self) -> Vec<Option<&'a Wme>> {
        let network = self.network;
        network
            .token_wmes(self.token)
            .unwrap_or_default()
            .into_iter()
            .map(|slot| slot.and_then(|id| network.wme(id)))
            .collect()
    }

    /// Final variable bindings of the match
    pub fn binding(&self) -> &'a Bindings {
        static EMPTY: Bindings = Bindings::new();
        self.network.token(self.token).map_or(&EMPTY, |token| &token.binding)
    }

    /// Owned, serializable copy of this match
    pub fn to_record(&self) -> MatchRecord {
        MatchRecord {
            production: self.production.id,
            production_name: self.production.name.clone(),
            wmes: self.wmes().into_iter().map(|wme| wme.cloned()).collect(),
            bindings: self.binding().clone(),
        }
    }
}

impl fmt::Debug for Activation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Activation")
            .field("production", &self.production.id)
            .field("token", &self.token)
            .field("binding", self.binding())
            .finish()
    }
}

/// (production, supporting WMEs, bindings) triple detached from the network
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub production: ProductionId,
    pub production_name: String,
    pub wmes: Vec<Option<Wme>>,
    pub bindings: Bindings,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_emits_conditions_in_order() {
        let production = Production::builder(1, "stack")
            .when(Term::var("x"), "on", Term::var("y"))
            .unless(Term::var("y"), "color", "red")
            .none_of([Condition::pattern(Term::var("y"), "on", "table")])
            .filter(["x"], |_| Ok(true))
            .bind(["x"], "z", |b| Ok(b["x"].clone()))
            .build();

        let kinds: Vec<_> = production.conditions.iter().map(Condition::kind).collect();
        assert_eq!(kinds, vec!["pattern", "negation", "ncc", "filter", "bind"]);
        assert!(production.action.is_none());
        assert!(production.validate().is_ok());
    }

    #[test]
    fn test_empty_ncc_is_invalid() {
        let production = Production::builder(2, "broken")
            .when(Term::var("x"), "on", Term::var("y"))
            .none_of([Condition::ncc(Vec::new())])
            .build();
        let error = production.validate().unwrap_err();
        assert_eq!(error.category(), "invalid_production");
    }
}
