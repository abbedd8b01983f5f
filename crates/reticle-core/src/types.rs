//! Core data types: arena identifiers, working memory elements and bindings

use crate::error::{ReteError, ReteResult};
use reticle_types::{Field, Term, Value, Var};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

macro_rules! arena_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

arena_id!(
    /// Identifier of a beta network node
    NodeId,
    "n"
);
arena_id!(
    /// Identifier of a token
    TokenId,
    "t"
);
arena_id!(
    /// Identifier of a working memory element while it is asserted
    WmeId,
    "w"
);
arena_id!(
    /// Identifier of an alpha memory
    AlphaMemoryId,
    "a"
);

/// Caller-chosen production identifier
pub type ProductionId = u64;

/// Variable bindings accumulated along a match
pub type Bindings = BTreeMap<Var, Value>;

/// A working memory element: one fully constant (identifier, attribute, value) fact
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Wme {
    pub identifier: Value,
    pub attribute: Value,
    pub value: Value,
}

impl Wme {
    /// Create a fact from constant values
    pub fn new(identifier: impl Into<Value>, attribute: impl Into<Value>, value: impl Into<Value>) -> Self {
        Self { identifier: identifier.into(), attribute: attribute.into(), value: value.into() }
    }

    /// Create a fact from terms, rejecting variable placeholders
    pub fn from_terms(
        identifier: impl Into<Term>,
        attribute: impl Into<Term>,
        value: impl Into<Term>,
    ) -> ReteResult<Self> {
        Ok(Self {
            identifier: constant(Field::Identifier, identifier.into())?,
            attribute: constant(Field::Attribute, attribute.into())?,
            value: constant(Field::Value, value.into())?,
        })
    }

    /// The value held in one field
    pub fn get(&self, field: Field) -> &Value {
        match field {
            Field::Identifier => &self.identifier,
            Field::Attribute => &self.attribute,
            Field::Value => &self.value,
        }
    }
}

fn constant(field: Field, term: Term) -> ReteResult<Value> {
    match term {
        Term::Const(value) => Ok(value),
        Term::Var(var) => Err(ReteError::invalid_fact(field.name(), var.name())),
    }
}

impl fmt::Display for Wme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({} ^{} {})", self.identifier, self.attribute, self.value)
    }
}

/// A negative node token blocked by a WME
///
/// Stored on both the blocked token and the blocking WME so either side can
/// find the other on retraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NegativeJoinResult {
    pub owner: TokenId,
    pub wme: WmeId,
}

/// An asserted WME together with its back-references into the network
#[derive(Debug, Clone)]
pub struct WmeRecord {
    pub id: WmeId,
    pub wme: Wme,
    /// Alpha memories holding this WME
    pub alpha_memories: Vec<AlphaMemoryId>,
    /// Tokens whose own element is this WME
    pub tokens: Vec<TokenId>,
    pub negative_join_results: Vec<NegativeJoinResult>,
}

impl WmeRecord {
    pub(crate) fn new(id: WmeId, wme: Wme) -> Self {
        Self {
            id,
            wme,
            alpha_memories: Vec::new(),
            tokens: Vec::new(),
            negative_join_results: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wme_display() {
        assert_eq!(Wme::new("B1", "on", "B2").to_string(), "(B1 ^on B2)");
        assert_eq!(Wme::new("B1", "size", 3).to_string(), "(B1 ^size 3)");
    }

    #[test]
    fn test_from_terms_rejects_variables() {
        let error = Wme::from_terms("B1", Term::var("a"), "B2").unwrap_err();
        match error {
            ReteError::InvalidFact { field, variable, .. } => {
                assert_eq!(field.as_deref(), Some("attribute"));
                assert_eq!(variable.as_deref(), Some("a"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(Wme::from_terms("B1", "on", "B2").unwrap(), Wme::new("B1", "on", "B2"));
    }

    #[test]
    fn test_field_access() {
        let wme = Wme::new("B1", "on", "B2");
        assert_eq!(wme.get(Field::Identifier), &Value::from("B1"));
        assert_eq!(wme.get(Field::Attribute), &Value::from("on"));
        assert_eq!(wme.get(Field::Value), &Value::from("B2"));
    }

    #[test]
    fn test_id_display() {
        assert_eq!(NodeId(4).to_string(), "n4");
        assert_eq!(TokenId(2).to_string(), "t2");
        assert_eq!(WmeId(9).to_string(), "w9");
        assert_eq!(AlphaMemoryId(1).to_string(), "a1");
    }
}
