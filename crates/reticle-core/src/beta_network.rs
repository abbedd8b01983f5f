//! Beta Network Implementation for the Rete Network
//!
//! The beta network is a tree of nodes rooted at a single root node that holds
//! the root token. Tokens flow down the tree through left activations; WMEs
//! enter from the side through right activations of join and negative nodes.
//!
//! ## Beta Network Architecture
//!
//! ```text
//!                     root (root token)
//!                          │
//!                     beta memory ◄──────────── alpha memory (* ^on *)
//!                          │                          │
//!                     join node  ◄────────────────────┘
//!                          │
//!                ┌─────────┴─────────┐
//!           beta memory         negative node ◄── alpha memory (* ^color red)
//!                │                   │
//!               ...               p-node (activations)
//! ```
//!
//! ## Key Components
//!
//! - **BetaMemory**: stores tokens after a positive condition
//! - **JoinNode**: joins tokens of its parent memory with WMEs of an alpha memory
//! - **NegativeNode**: passes tokens on only while no WME blocks them
//! - **NccNode / NccPartnerNode**: negated conjunction through a subnetwork
//! - **FilterNode / BindNode**: procedural tests and computed bindings
//! - **PNode**: holds the complete matches of one production

use crate::error::{ReteError, ReteResult};
use crate::filter_node::{BindNode, FilterNode};
use crate::join_node::JoinNode;
use crate::ncc_node::{NccNode, NccPartnerNode};
use crate::negative_node::NegativeNode;
use crate::rete_network::ReteNetwork;
use crate::token::Pending;
use crate::types::{AlphaMemoryId, NodeId, ProductionId, TokenId, WmeId};
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;
use tracing::{debug, trace};

/// Token store of a beta memory (and of the root)
#[derive(Debug, Clone, Default)]
pub struct BetaMemory {
    pub items: Vec<TokenId>,
}

/// Terminal node holding one production's matches
#[derive(Debug, Clone)]
pub struct PNode {
    pub production: ProductionId,
    pub items: Vec<TokenId>,
    /// Matches not fired yet, oldest first
    pub new_tokens: VecDeque<TokenId>,
}

/// Kind-specific state of a beta node
#[derive(Debug, Clone)]
pub enum BetaNodeKind {
    Root(BetaMemory),
    Memory(BetaMemory),
    Join(JoinNode),
    Negative(NegativeNode),
    Ncc(NccNode),
    NccPartner(NccPartnerNode),
    Filter(FilterNode),
    Bind(BindNode),
    Production(PNode),
}

/// Node kind tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NodeType {
    Root,
    Memory,
    Join,
    Negative,
    Ncc,
    NccPartner,
    Filter,
    Bind,
    Production,
}

impl NodeType {
    pub fn name(self) -> &'static str {
        match self {
            NodeType::Root => "root",
            NodeType::Memory => "beta_memory",
            NodeType::Join => "join",
            NodeType::Negative => "negative",
            NodeType::Ncc => "ncc",
            NodeType::NccPartner => "ncc_partner",
            NodeType::Filter => "filter",
            NodeType::Bind => "bind",
            NodeType::Production => "production",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A node of the beta tree
#[derive(Debug, Clone)]
pub struct BetaNode {
    pub id: NodeId,
    /// `None` only for the root
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub kind: BetaNodeKind,
}

impl BetaNode {
    pub fn node_type(&self) -> NodeType {
        match &self.kind {
            BetaNodeKind::Root(_) => NodeType::Root,
            BetaNodeKind::Memory(_) => NodeType::Memory,
            BetaNodeKind::Join(_) => NodeType::Join,
            BetaNodeKind::Negative(_) => NodeType::Negative,
            BetaNodeKind::Ncc(_) => NodeType::Ncc,
            BetaNodeKind::NccPartner(_) => NodeType::NccPartner,
            BetaNodeKind::Filter(_) => NodeType::Filter,
            BetaNodeKind::Bind(_) => NodeType::Bind,
            BetaNodeKind::Production(_) => NodeType::Production,
        }
    }

    /// Tokens held by this node; empty for stateless nodes
    pub fn items(&self) -> &[TokenId] {
        match &self.kind {
            BetaNodeKind::Root(memory) | BetaNodeKind::Memory(memory) => &memory.items,
            BetaNodeKind::Negative(negative) => &negative.items,
            BetaNodeKind::Ncc(ncc) => &ncc.items,
            BetaNodeKind::Production(pnode) => &pnode.items,
            BetaNodeKind::Join(_)
            | BetaNodeKind::NccPartner(_)
            | BetaNodeKind::Filter(_)
            | BetaNodeKind::Bind(_) => &[],
        }
    }

    /// The alpha memory feeding this node's right input
    pub fn alpha_memory(&self) -> Option<AlphaMemoryId> {
        match &self.kind {
            BetaNodeKind::Join(join) => Some(join.alpha_memory),
            BetaNodeKind::Negative(negative) => Some(negative.alpha_memory),
            _ => None,
        }
    }
}

impl ReteNetwork {
    /// Route a left activation to the node's kind-specific handler
    pub(crate) fn left_activation(&mut self, node: NodeId, token: TokenId, pending: Pending) -> ReteResult<()> {
        match self.node_ref(node)?.node_type() {
            NodeType::Memory => self.beta_memory_left_activation(node, token, pending),
            NodeType::Join => self.join_left_activation(node, token),
            NodeType::Negative => self.negative_left_activation(node, token, pending),
            NodeType::Ncc => self.ncc_left_activation(node, token, pending),
            NodeType::NccPartner => self.ncc_partner_left_activation(node, token, pending),
            NodeType::Filter => self.filter_left_activation(node, token, pending),
            NodeType::Bind => self.bind_left_activation(node, token, pending),
            NodeType::Production => self.pnode_left_activation(node, token, pending),
            NodeType::Root => Err(ReteError::network_at("root", "the root node has no parent to activate it")),
        }
    }

    /// Route a right activation from an alpha memory
    pub(crate) fn right_activation(&mut self, node: NodeId, wme: WmeId) -> ReteResult<()> {
        match self.node_ref(node)?.node_type() {
            NodeType::Join => self.join_right_activation(node, wme),
            NodeType::Negative => self.negative_right_activation(node, wme),
            other => Err(ReteError::network_at(other.name(), "node has no right input")),
        }
    }

    fn beta_memory_left_activation(&mut self, node: NodeId, token: TokenId, pending: Pending) -> ReteResult<()> {
        let new_token = self.create_token(node, token, pending)?;
        let children = {
            let beta = self.node_mut(node)?;
            if let BetaNodeKind::Memory(memory) = &mut beta.kind {
                memory.items.push(new_token);
            }
            beta.children.clone()
        };
        for child in children {
            self.left_activation(child, new_token, Pending::none())?;
        }
        Ok(())
    }

    fn pnode_left_activation(&mut self, node: NodeId, token: TokenId, pending: Pending) -> ReteResult<()> {
        let new_token = self.create_token(node, token, pending)?;
        let production = {
            let beta = self.node_mut(node)?;
            let BetaNodeKind::Production(pnode) = &mut beta.kind else {
                return Err(ReteError::network_at("production", "expected a p-node"));
            };
            pnode.items.push(new_token);
            pnode.new_tokens.push_back(new_token);
            pnode.production
        };
        self.activations_created += 1;
        if self.config.log_activations {
            debug!(production_id = production, token = %new_token, "New activation");
        } else {
            trace!(production_id = production, token = %new_token, "New activation");
        }
        Ok(())
    }

    /// Beta memory under `parent`, reusing an existing one
    pub(crate) fn build_or_share_beta_memory(&mut self, parent: NodeId) -> ReteResult<NodeId> {
        for &child in &self.node_ref(parent)?.children {
            if self.node_ref(child)?.node_type() == NodeType::Memory {
                trace!(node = %child, "Sharing beta memory");
                return Ok(child);
            }
        }
        let node = self.insert_node(parent, BetaNodeKind::Memory(BetaMemory::default()))?;
        self.update_new_node_with_matches_from_above(node)?;
        debug!(node = %node, parent = %parent, "Created beta memory");
        Ok(node)
    }

    /// P-nodes are never shared: each production owns its match set
    pub(crate) fn build_p_node(&mut self, parent: NodeId, production: ProductionId) -> ReteResult<NodeId> {
        let node = self.insert_node(
            parent,
            BetaNodeKind::Production(PNode { production, items: Vec::new(), new_tokens: VecDeque::new() }),
        )?;
        self.update_new_node_with_matches_from_above(node)?;
        debug!(node = %node, parent = %parent, production_id = production, "Created p-node");
        Ok(node)
    }

    /// Create a node and link it in as the last child of `parent`
    pub(crate) fn insert_node(&mut self, parent: NodeId, kind: BetaNodeKind) -> ReteResult<NodeId> {
        let id = self.next_node_id();
        self.link_node(id, parent, kind)?;
        Ok(id)
    }

    /// Link a node under a pre-allocated id
    pub(crate) fn link_node(&mut self, id: NodeId, parent: NodeId, kind: BetaNodeKind) -> ReteResult<()> {
        self.node_mut(parent)?.children.push(id);
        self.beta_nodes.insert(id, BetaNode { id, parent: Some(parent), children: Vec::new(), kind });
        Ok(())
    }

    /// Everything `node` would currently pass to a newly attached child
    pub(crate) fn emissions(&self, node: NodeId) -> ReteResult<Vec<(TokenId, Pending)>> {
        let beta = self.node_ref(node)?;
        let emitted = match &beta.kind {
            BetaNodeKind::Root(memory) | BetaNodeKind::Memory(memory) => {
                memory.items.iter().map(|&t| (t, Pending::none())).collect()
            }
            BetaNodeKind::Join(join) => {
                let parent_items = self.parent_items(beta)?;
                let mut emitted = Vec::new();
                for &wme in &self.alpha_ref(join.alpha_memory)?.items {
                    for &token in parent_items {
                        if let Some(binding) = self.perform_join_test(token, wme, &join.tests, &join.pattern)? {
                            emitted.push((token, Pending::matched(wme, binding)));
                        }
                    }
                }
                emitted
            }
            BetaNodeKind::Negative(negative) => negative
                .items
                .iter()
                .filter(|&&t| self.tokens.get(&t).is_some_and(|token| token.join_results.is_empty()))
                .map(|&t| (t, Pending::absent()))
                .collect(),
            BetaNodeKind::Ncc(ncc) => ncc
                .items
                .iter()
                .filter(|&&t| self.tokens.get(&t).is_some_and(|token| token.ncc_results.is_empty()))
                .map(|&t| (t, Pending::absent()))
                .collect(),
            BetaNodeKind::Filter(filter) => {
                let mut emitted = Vec::new();
                for (token, pending) in self.emissions(self.parent_of(beta)?)? {
                    if self.filter_passes(&filter.filter, token, &pending)? {
                        emitted.push((token, pending));
                    }
                }
                emitted
            }
            BetaNodeKind::Bind(bind) => {
                let mut emitted = Vec::new();
                for (token, pending) in self.emissions(self.parent_of(beta)?)? {
                    if let Some(extended) = self.bind_pending(&bind.bind, token, pending)? {
                        emitted.push((token, extended));
                    }
                }
                emitted
            }
            BetaNodeKind::NccPartner(_) | BetaNodeKind::Production(_) => Vec::new(),
        };
        Ok(emitted)
    }

    /// Feed a freshly built node every match that already exists above it
    pub(crate) fn update_new_node_with_matches_from_above(&mut self, node: NodeId) -> ReteResult<()> {
        let parent = self.parent_of(self.node_ref(node)?)?;
        let emitted = self.emissions(parent)?;
        trace!(node = %node, parent = %parent, count = emitted.len(), "Replaying matches into new node");
        for (token, pending) in emitted {
            self.left_activation(node, token, pending)?;
        }
        Ok(())
    }

    pub(crate) fn parent_of(&self, beta: &BetaNode) -> ReteResult<NodeId> {
        beta.parent
            .ok_or_else(|| ReteError::network_at(beta.node_type().name(), format!("node {} has no parent", beta.id)))
    }

    /// Token list of the memory above a join or negative node
    pub(crate) fn parent_items(&self, beta: &BetaNode) -> ReteResult<&[TokenId]> {
        Ok(self.node_ref(self.parent_of(beta)?)?.items())
    }

    pub(crate) fn node_ref(&self, id: NodeId) -> ReteResult<&BetaNode> {
        self.beta_nodes.get(&id).ok_or_else(|| ReteError::network(format!("node {id} does not exist")))
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> ReteResult<&mut BetaNode> {
        self.beta_nodes.get_mut(&id).ok_or_else(|| ReteError::network(format!("node {id} does not exist")))
    }
}
