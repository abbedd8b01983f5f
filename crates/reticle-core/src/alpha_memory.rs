//! Alpha Memory Implementation for the Rete Network
//!
//! An alpha memory holds every WME passing one constant test. Memories are
//! indexed by a canonical key in which each field is either an exact value or
//! a wildcard, so a new WME finds every memory it belongs to with at most
//! eight hash lookups.
//!
//! ## Alpha Memory Architecture
//!
//! ```text
//! add_wme(B1 ^on B2)
//!        │
//!        ├─ (B1, on, B2)   (B1, on, *)   (B1, *, B2)   (B1, *, *)
//!        └─ (*,  on, B2)   (*,  on, *)   (*,  *, B2)   (*,  *, *)
//!                              │
//!                     alpha memory found → right-activate successors
//! ```

use crate::conditions::Pattern;
use crate::error::{ReteError, ReteResult};
use crate::rete_network::ReteNetwork;
use crate::types::{AlphaMemoryId, NodeId, Wme, WmeId};
use reticle_types::{Field, Term, Value};
use serde::Serialize;
use std::fmt;
use tracing::{debug, instrument};

/// One field of an alpha memory key.
///
/// `Wildcard` is its own variant, so no stored value can ever be mistaken for it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum KeyField {
    Exact(Value),
    Wildcard,
}

impl KeyField {
    fn from_term(term: &Term) -> Self {
        match term {
            Term::Const(value) => Self::Exact(value.clone()),
            Term::Var(_) => Self::Wildcard,
        }
    }
}

impl fmt::Display for KeyField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(value) => write!(f, "{value}"),
            Self::Wildcard => f.write_str("*"),
        }
    }
}

/// Canonical (identifier, attribute, value) key of an alpha memory
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct AlphaKey {
    pub identifier: KeyField,
    pub attribute: KeyField,
    pub value: KeyField,
}

impl AlphaKey {
    pub fn from_pattern(pattern: &Pattern) -> Self {
        Self {
            identifier: KeyField::from_term(&pattern.identifier),
            attribute: KeyField::from_term(&pattern.attribute),
            value: KeyField::from_term(&pattern.value),
        }
    }

    /// The eight keys a WME can be stored under, exact before wildcard in
    /// each field
    pub fn candidates(wme: &Wme) -> impl Iterator<Item = AlphaKey> + '_ {
        let options = move |field: Field| [KeyField::Exact(wme.get(field).clone()), KeyField::Wildcard];
        options(Field::Identifier).into_iter().flat_map(move |identifier| {
            options(Field::Attribute).into_iter().flat_map(move |attribute| {
                let identifier = identifier.clone();
                options(Field::Value).into_iter().map(move |value| AlphaKey {
                    identifier: identifier.clone(),
                    attribute: attribute.clone(),
                    value,
                })
            })
        })
    }
}

impl fmt::Display for AlphaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({} ^{} {})", self.identifier, self.attribute, self.value)
    }
}

/// WMEs passing one constant test, and the join/negative nodes fed by them
#[derive(Debug, Clone)]
pub struct AlphaMemory {
    pub id: AlphaMemoryId,
    pub key: AlphaKey,
    pub items: Vec<WmeId>,
    /// Newest first, so descendants are right-activated before their ancestors
    pub successors: Vec<NodeId>,
}

impl AlphaMemory {
    fn new(id: AlphaMemoryId, key: AlphaKey) -> Self {
        Self { id, key, items: Vec::new(), successors: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl ReteNetwork {
    /// Return the alpha memory for `pattern`'s constant test, creating and
    /// seeding it from working memory on first use
    #[instrument(skip(self, pattern), fields(pattern = %pattern))]
    pub fn build_or_share_alpha_memory(&mut self, pattern: &Pattern) -> ReteResult<AlphaMemoryId> {
        let key = AlphaKey::from_pattern(pattern);
        if let Some(&id) = self.alpha_index.get(&key) {
            debug!(alpha_memory = %id, "Sharing alpha memory");
            return Ok(id);
        }

        let id = self.next_alpha_memory_id();
        self.alpha_memories.insert(id, AlphaMemory::new(id, key.clone()));
        self.alpha_index.insert(key, id);

        let seeds: Vec<WmeId> =
            self.wmes.values().filter(|record| pattern.test(&record.wme)).map(|record| record.id).collect();
        for wme in seeds {
            self.alpha_memory_activation(id, wme)?;
        }

        debug!(alpha_memory = %id, items = self.alpha_ref(id)?.len(), "Created alpha memory");
        Ok(id)
    }

    /// The alpha memory for `pattern`'s constant test, if one exists
    pub fn alpha_memory_for(&self, pattern: &Pattern) -> Option<AlphaMemoryId> {
        self.alpha_index.get(&AlphaKey::from_pattern(pattern)).copied()
    }

    /// Store `wme` and right-activate every successor
    pub(crate) fn alpha_memory_activation(&mut self, id: AlphaMemoryId, wme: WmeId) -> ReteResult<()> {
        let successors = {
            let memory = self.alpha_mut(id)?;
            memory.items.push(wme);
            memory.successors.clone()
        };
        self.wme_record_mut(wme)?.alpha_memories.push(id);

        for node in successors {
            self.right_activation(node, wme)?;
        }
        Ok(())
    }

    /// Register `node` as a successor, ahead of existing ones
    pub(crate) fn add_alpha_successor(&mut self, id: AlphaMemoryId, node: NodeId) -> ReteResult<()> {
        self.alpha_mut(id)?.successors.insert(0, node);
        Ok(())
    }

    /// Unregister `node`; the memory is dropped once nothing reads it
    pub(crate) fn remove_alpha_successor(&mut self, id: AlphaMemoryId, node: NodeId) -> ReteResult<()> {
        let unused = {
            let memory = self.alpha_mut(id)?;
            memory.successors.retain(|n| *n != node);
            memory.successors.is_empty()
        };
        if unused {
            self.delete_alpha_memory(id);
        }
        Ok(())
    }

    fn delete_alpha_memory(&mut self, id: AlphaMemoryId) {
        let Some(memory) = self.alpha_memories.remove(&id) else {
            return;
        };
        self.alpha_index.remove(&memory.key);
        for wme in &memory.items {
            if let Some(record) = self.wmes.get_mut(wme) {
                record.alpha_memories.retain(|a| *a != id);
            }
        }
        debug!(alpha_memory = %id, key = %memory.key, "Deleted unused alpha memory");
    }

    pub(crate) fn alpha_ref(&self, id: AlphaMemoryId) -> ReteResult<&AlphaMemory> {
        self.alpha_memories
            .get(&id)
            .ok_or_else(|| ReteError::network(format!("alpha memory {id} does not exist")))
    }

    pub(crate) fn alpha_mut(&mut self, id: AlphaMemoryId) -> ReteResult<&mut AlphaMemory> {
        self.alpha_memories
            .get_mut(&id)
            .ok_or_else(|| ReteError::network(format!("alpha memory {id} does not exist")))
    }
}
