//! Tokens: partial matches chained through the beta network
//!
//! ```text
//!   root token ── t1 (B1 ^on B2) ── t2 (B2 ^left-of B3) ── t3 None
//!                                                    (negation matched by absence)
//! ```
//!
//! Each token links to its parent and children so a retraction can remove a
//! whole subtree of matches in one walk. Tokens live in the network's token
//! arena and are addressed by [`TokenId`].

use crate::beta_network::BetaNodeKind;
use crate::error::{ReteError, ReteResult};
use crate::rete_network::ReteNetwork;
use crate::types::{Bindings, NegativeJoinResult, NodeId, TokenId, WmeId};
use tracing::trace;

/// A link in a match chain
#[derive(Debug, Clone)]
pub struct Token {
    pub id: TokenId,
    /// `None` only for the network's root token
    pub parent: Option<TokenId>,
    pub wme: Option<WmeId>,
    /// Whether this link stands for a condition slot. Links created directly
    /// under the root carry no condition.
    pub fills_slot: bool,
    /// Node whose memory holds this token
    pub node: NodeId,
    /// Bindings accumulated from the root down to this token
    pub binding: Bindings,
    pub children: Vec<TokenId>,
    /// Blocking WMEs, for tokens held by a negative node
    pub join_results: Vec<NegativeJoinResult>,
    /// Completed sub-matches, for tokens held by an NCC node
    pub ncc_results: Vec<TokenId>,
    /// Owning NCC token, for result tokens built by an NCC partner
    pub owner: Option<TokenId>,
}

impl Token {
    pub(crate) fn root(id: TokenId, node: NodeId) -> Self {
        Self {
            id,
            parent: None,
            wme: None,
            fills_slot: false,
            node,
            binding: Bindings::new(),
            children: Vec::new(),
            join_results: Vec::new(),
            ncc_results: Vec::new(),
            owner: None,
        }
    }
}

/// What a node hands to a child on left activation beside the parent token:
/// a WME not yet folded into a token and the bindings that came with it.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Pending {
    pub wme: Option<WmeId>,
    pub binding: Bindings,
    pub fills_slot: bool,
}

impl Pending {
    /// Nothing to fold: the parent token is passed through as is
    pub fn none() -> Self {
        Self::default()
    }

    /// A join matched `wme`
    pub fn matched(wme: WmeId, binding: Bindings) -> Self {
        Self { wme: Some(wme), binding, fills_slot: true }
    }

    /// A negation or negated conjunction matched by absence
    pub fn absent() -> Self {
        Self { wme: None, binding: Bindings::new(), fills_slot: true }
    }
}

impl ReteNetwork {
    /// Build a token under `parent` for `node`, folding in `pending`.
    /// The caller stores it in the node's memory.
    pub(crate) fn create_token(
        &mut self,
        node: NodeId,
        parent: TokenId,
        pending: Pending,
    ) -> ReteResult<TokenId> {
        let mut binding = self.token_ref(parent)?.binding.clone();
        binding.extend(pending.binding);

        let id = self.next_token_id();
        self.token_mut(parent)?.children.push(id);
        if let Some(wme) = pending.wme {
            self.wme_record_mut(wme)?.tokens.push(id);
        }
        self.tokens.insert(
            id,
            Token {
                id,
                parent: Some(parent),
                wme: pending.wme,
                fills_slot: pending.fills_slot,
                node,
                binding,
                children: Vec::new(),
                join_results: Vec::new(),
                ncc_results: Vec::new(),
                owner: None,
            },
        );
        trace!(token = %id, node = %node, parent = %parent, "Created token");
        Ok(id)
    }

    /// Remove a token, every token below it, and every reference to them
    pub(crate) fn delete_token_and_descendents(&mut self, id: TokenId) -> ReteResult<()> {
        self.delete_descendents_of_token(id)?;

        let Some(token) = self.tokens.remove(&id) else {
            return Ok(());
        };

        if let Some(node) = self.beta_nodes.get_mut(&token.node) {
            match &mut node.kind {
                BetaNodeKind::Root(memory) | BetaNodeKind::Memory(memory) => {
                    memory.items.retain(|t| *t != id)
                }
                BetaNodeKind::Negative(negative) => negative.items.retain(|t| *t != id),
                BetaNodeKind::Ncc(ncc) => ncc.items.retain(|t| *t != id),
                BetaNodeKind::NccPartner(partner) => {
                    partner.new_result_buffer.retain(|buffered| buffered.result != id)
                }
                BetaNodeKind::Production(pnode) => {
                    pnode.items.retain(|t| *t != id);
                    pnode.new_tokens.retain(|t| *t != id);
                }
                BetaNodeKind::Join(_) | BetaNodeKind::Filter(_) | BetaNodeKind::Bind(_) => {}
            }
        }

        if let Some(wme) = token.wme.and_then(|w| self.wmes.get_mut(&w)) {
            wme.tokens.retain(|t| *t != id);
        }
        if let Some(parent) = token.parent.and_then(|p| self.tokens.get_mut(&p)) {
            parent.children.retain(|t| *t != id);
        }

        for result in &token.join_results {
            if let Some(wme) = self.wmes.get_mut(&result.wme) {
                wme.negative_join_results.retain(|r| r.owner != id);
            }
        }

        for &result in &token.ncc_results {
            self.discard_ncc_result(result);
        }

        if let Some(owner) = token.owner {
            let unblocked = match self.tokens.get_mut(&owner) {
                Some(owner_token) => {
                    owner_token.ncc_results.retain(|r| *r != id);
                    owner_token.ncc_results.is_empty()
                }
                None => false,
            };
            if unblocked {
                let ncc_node = self.token_ref(owner)?.node;
                for child in self.node_ref(ncc_node)?.children.clone() {
                    self.left_activation(child, owner, Pending::absent())?;
                }
            }
        }

        trace!(token = %id, "Deleted token");
        Ok(())
    }

    /// Remove every token below `id`, keeping `id` itself
    pub(crate) fn delete_descendents_of_token(&mut self, id: TokenId) -> ReteResult<()> {
        loop {
            let child = match self.tokens.get_mut(&id) {
                Some(token) => token.children.pop(),
                None => None,
            };
            match child {
                Some(child) => self.delete_token_and_descendents(child)?,
                None => return Ok(()),
            }
        }
    }

    /// Drop an NCC result token whose owner is going away
    fn discard_ncc_result(&mut self, result: TokenId) {
        let Some(token) = self.tokens.remove(&result) else {
            return;
        };
        if let Some(parent) = token.parent.and_then(|p| self.tokens.get_mut(&p)) {
            parent.children.retain(|t| *t != result);
        }
        if let Some(wme) = token.wme.and_then(|w| self.wmes.get_mut(&w)) {
            wme.tokens.retain(|t| *t != result);
        }
    }

    /// The condition slots of a token's chain in condition order
    pub(crate) fn token_wmes(&self, id: TokenId) -> ReteResult<Vec<Option<WmeId>>> {
        let mut slots = Vec::new();
        let mut current = Some(id);
        while let Some(token_id) = current {
            let token = self.token_ref(token_id)?;
            if token.fills_slot {
                slots.push(token.wme);
            }
            current = token.parent;
        }
        slots.reverse();
        Ok(slots)
    }

    pub(crate) fn token_ref(&self, id: TokenId) -> ReteResult<&Token> {
        self.tokens.get(&id).ok_or_else(|| ReteError::network(format!("token {id} does not exist")))
    }

    pub(crate) fn token_mut(&mut self, id: TokenId) -> ReteResult<&mut Token> {
        self.tokens.get_mut(&id).ok_or_else(|| ReteError::network(format!("token {id} does not exist")))
    }
}
