//! Rete network orchestration
//!
//! [`ReteNetwork`] owns every alpha memory, beta node, token and WME in
//! arenas keyed by typed ids. It compiles productions into the shared beta
//! tree and keeps every production's match set current as facts are asserted
//! and retracted.
//!
//! ## Propagation Flow
//!
//! ```text
//! add_wme ──► alpha memories ──► right activation ──► join / negative nodes
//!                                                          │ left activation
//!                                                          ▼
//!                                      beta memories, NCC, filter, bind nodes
//!                                                          │
//!                                                          ▼
//!                                                   p-nodes (activations)
//! ```
//!
//! Every mutating call runs its whole cascade before returning.

use crate::alpha_memory::{AlphaKey, AlphaMemory};
use crate::beta_network::{BetaMemory, BetaNode, BetaNodeKind, NodeType};
use crate::conditions::{Condition, Pattern};
use crate::config::NetworkConfig;
use crate::error::{ReteError, ReteResult};
use crate::join_node::join_tests_for;
use crate::production::{Activation, ActivationId, MatchRecord, Production};
use crate::token::{Pending, Token};
use crate::types::{AlphaMemoryId, NodeId, ProductionId, TokenId, Wme, WmeId, WmeRecord};
use ahash::AHashMap;
use reticle_types::Term;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// A registered production and the p-node holding its matches
#[derive(Debug, Clone)]
pub(crate) struct ProductionEntry {
    pub production: Arc<Production>,
    pub pnode: NodeId,
}

/// Size and activity counters of a network
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkStats {
    pub productions: usize,
    pub wmes: usize,
    pub alpha_memories: usize,
    /// Beta nodes including the root
    pub beta_nodes: usize,
    /// Live tokens including the root token
    pub tokens: usize,
    pub activations: usize,
    /// Activations created but not yet fired
    pub pending_activations: usize,
    pub activations_created: u64,
    pub activations_fired: u64,
}

/// Incremental matcher for a set of productions over a working memory of
/// (identifier, attribute, value) facts
pub struct ReteNetwork {
    pub(crate) config: NetworkConfig,
    pub(crate) alpha_index: AHashMap<AlphaKey, AlphaMemoryId>,
    pub(crate) alpha_memories: BTreeMap<AlphaMemoryId, AlphaMemory>,
    pub(crate) beta_nodes: BTreeMap<NodeId, BetaNode>,
    pub(crate) tokens: AHashMap<TokenId, Token>,
    pub(crate) wmes: BTreeMap<WmeId, WmeRecord>,
    pub(crate) working_memory: AHashMap<Wme, WmeId>,
    pub(crate) productions: HashMap<ProductionId, ProductionEntry>,
    /// Registration order, used for activation ordering
    pub(crate) production_order: Vec<ProductionId>,
    pub(crate) beta_root: NodeId,
    pub(crate) root_token: TokenId,
    next_node: u64,
    next_token: u64,
    next_wme: u64,
    next_alpha_memory: u64,
    pub(crate) activations_created: u64,
    pub(crate) activations_fired: u64,
}

impl Default for ReteNetwork {
    fn default() -> Self {
        Self::new()
    }
}

impl ReteNetwork {
    /// Empty network with the default configuration
    pub fn new() -> Self {
        let beta_root = NodeId(0);
        let root_token = TokenId(0);
        let mut beta_nodes = BTreeMap::new();
        beta_nodes.insert(
            beta_root,
            BetaNode {
                id: beta_root,
                parent: None,
                children: Vec::new(),
                kind: BetaNodeKind::Root(BetaMemory { items: vec![root_token] }),
            },
        );
        let mut tokens = AHashMap::new();
        tokens.insert(root_token, Token::root(root_token, beta_root));

        Self {
            config: NetworkConfig::default(),
            alpha_index: AHashMap::new(),
            alpha_memories: BTreeMap::new(),
            beta_nodes,
            tokens,
            wmes: BTreeMap::new(),
            working_memory: AHashMap::new(),
            productions: HashMap::new(),
            production_order: Vec::new(),
            beta_root,
            root_token,
            next_node: 1,
            next_token: 1,
            next_wme: 0,
            next_alpha_memory: 0,
            activations_created: 0,
            activations_fired: 0,
        }
    }

    /// Empty network with a validated configuration
    pub fn with_config(config: NetworkConfig) -> ReteResult<Self> {
        config.validate()?;
        let mut network = Self::new();
        network.config = config;
        Ok(network)
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    // ---------------------------------------------------------------------------------------------
    // Productions
    // ---------------------------------------------------------------------------------------------

    /// Compile a production into the network, sharing existing nodes where
    /// possible. Existing facts are matched immediately. Returns the
    /// production's p-node.
    #[instrument(skip(self, production), fields(production_id = production.id, production_name = %production.name))]
    pub fn add_production(&mut self, production: Production) -> ReteResult<NodeId> {
        if self.productions.contains_key(&production.id) {
            return Err(ReteError::duplicate_production(production.id, &production.name));
        }
        production.validate()?;

        let nodes_before = self.beta_nodes.len();
        let built = self.build_production(&production);
        let pnode = match built {
            Ok(pnode) => pnode,
            Err(error) => {
                if let Err(cleanup) = self.prune_unused_nodes() {
                    warn!(error = %cleanup, "Failed to prune nodes of a rejected production");
                }
                return Err(error);
            }
        };

        let matches = self.node_ref(pnode)?.items().len();
        self.production_order.push(production.id);
        self.productions.insert(production.id, ProductionEntry { production: Arc::new(production), pnode });

        info!(
            pnode = %pnode,
            new_nodes = self.beta_nodes.len() - nodes_before,
            matches,
            "Added production"
        );
        Ok(pnode)
    }

    fn build_production(&mut self, production: &Production) -> ReteResult<NodeId> {
        let mut earlier = Vec::new();
        let bottom = self.build_or_share_network_for_conditions(self.beta_root, &production.conditions, &mut earlier)?;
        self.build_p_node(bottom, production.id)
    }

    /// Remove a production and every node no other production uses
    #[instrument(skip(self))]
    pub fn remove_production(&mut self, production_id: ProductionId) -> ReteResult<Arc<Production>> {
        let entry =
            self.productions.remove(&production_id).ok_or_else(|| ReteError::unknown_production(production_id))?;
        self.production_order.retain(|id| *id != production_id);

        let nodes_before = self.beta_nodes.len();
        self.delete_node_and_any_unused_ancestors(entry.pnode)?;
        info!(removed_nodes = nodes_before - self.beta_nodes.len(), "Removed production");
        Ok(entry.production)
    }

    /// Walk a condition list below `parent`, building or sharing a node per
    /// condition. `earlier` collects one slot entry per condition that fills
    /// a slot, for deriving join tests.
    pub(crate) fn build_or_share_network_for_conditions(
        &mut self,
        parent: NodeId,
        conditions: &[Condition],
        earlier: &mut Vec<Option<Pattern>>,
    ) -> ReteResult<NodeId> {
        let mut current = parent;
        for condition in conditions {
            match condition {
                Condition::Pattern(pattern) => {
                    current = self.build_or_share_beta_memory(current)?;
                    let tests = join_tests_for(pattern, earlier);
                    let alpha_memory = self.build_or_share_alpha_memory(pattern)?;
                    current = self.build_or_share_join_node(current, alpha_memory, tests, pattern)?;
                    earlier.push(Some(pattern.clone()));
                }
                Condition::Negation(pattern) => {
                    let tests = join_tests_for(pattern, earlier);
                    let alpha_memory = self.build_or_share_alpha_memory(pattern)?;
                    current = self.build_or_share_negative_node(current, alpha_memory, tests, pattern)?;
                    earlier.push(None);
                }
                Condition::Ncc(inner) => {
                    current = self.build_or_share_ncc_nodes(current, inner, earlier)?;
                    earlier.push(None);
                }
                Condition::Filter(filter) => {
                    current = self.build_or_share_filter_node(current, filter)?;
                }
                Condition::Bind(bind) => {
                    current = self.build_or_share_bind_node(current, bind)?;
                }
            }
        }
        Ok(current)
    }

    /// Delete `node` with its tokens, then every ancestor left without
    /// children. The root is never deleted.
    pub(crate) fn delete_node_and_any_unused_ancestors(&mut self, node: NodeId) -> ReteResult<()> {
        let (node_type, partner, alpha_memory) = {
            let beta = self.node_ref(node)?;
            let partner = match &beta.kind {
                BetaNodeKind::Ncc(ncc) => Some(ncc.partner),
                _ => None,
            };
            (beta.node_type(), partner, beta.alpha_memory())
        };
        if node_type == NodeType::Root {
            return Ok(());
        }

        if let Some(partner) = partner {
            if self.beta_nodes.contains_key(&partner) {
                self.delete_node_and_any_unused_ancestors(partner)?;
            }
        }
        if let Some(alpha_memory) = alpha_memory {
            self.remove_alpha_successor(alpha_memory, node)?;
        }
        let items = self.node_ref(node)?.items().to_vec();
        for token in items {
            self.delete_token_and_descendents(token)?;
        }
        let buffered: Vec<TokenId> = match &self.node_ref(node)?.kind {
            BetaNodeKind::NccPartner(partner) => partner.new_result_buffer.iter().map(|b| b.result).collect(),
            _ => Vec::new(),
        };
        for result in buffered {
            self.delete_token_and_descendents(result)?;
        }

        let Some(removed) = self.beta_nodes.remove(&node) else {
            return Ok(());
        };
        debug!(node = %node, node_type = %node_type, "Deleted node");

        if let Some(parent) = removed.parent {
            let unused = {
                let parent_node = self.node_mut(parent)?;
                parent_node.children.retain(|child| *child != node);
                parent_node.children.is_empty()
            };
            if unused && parent != self.beta_root {
                self.delete_node_and_any_unused_ancestors(parent)?;
            }
        }
        Ok(())
    }

    /// Delete leaf nodes that lead to no registered production
    fn prune_unused_nodes(&mut self) -> ReteResult<()> {
        loop {
            let registered: HashSet<NodeId> = self.productions.values().map(|entry| entry.pnode).collect();
            let dangling = self
                .beta_nodes
                .values()
                .find(|node| {
                    node.children.is_empty()
                        && !matches!(node.kind, BetaNodeKind::Root(_) | BetaNodeKind::NccPartner(_))
                        && !registered.contains(&node.id)
                })
                .map(|node| node.id);
            match dangling {
                Some(node) => self.delete_node_and_any_unused_ancestors(node)?,
                None => return Ok(()),
            }
        }
    }

    // ---------------------------------------------------------------------------------------------
    // Facts
    // ---------------------------------------------------------------------------------------------

    /// Assert a WME. Asserting a WME already in working memory is a no-op
    /// returning its existing id.
    #[instrument(skip(self, wme), fields(wme = %wme))]
    pub fn add_wme(&mut self, wme: Wme) -> ReteResult<WmeId> {
        if let Some(&existing) = self.working_memory.get(&wme) {
            debug!(wme_id = %existing, "WME already in working memory");
            return Ok(existing);
        }

        let id = WmeId(self.next_wme);
        self.next_wme += 1;
        self.working_memory.insert(wme.clone(), id);
        self.wmes.insert(id, WmeRecord::new(id, wme.clone()));

        let memories: Vec<AlphaMemoryId> =
            AlphaKey::candidates(&wme).filter_map(|key| self.alpha_index.get(&key).copied()).collect();
        for alpha_memory in &memories {
            self.alpha_memory_activation(*alpha_memory, id)?;
        }

        debug!(wme_id = %id, alpha_memories = memories.len(), "Asserted WME");
        Ok(id)
    }

    /// Assert a fact given as terms; variables are rejected
    pub fn add_fact(
        &mut self,
        identifier: impl Into<Term>,
        attribute: impl Into<Term>,
        value: impl Into<Term>,
    ) -> ReteResult<WmeId> {
        self.add_wme(Wme::from_terms(identifier, attribute, value)?)
    }

    /// Retract a WME, removing every match it supports and unblocking
    /// matches it was blocking
    #[instrument(skip(self, wme), fields(wme = %wme))]
    pub fn remove_wme(&mut self, wme: &Wme) -> ReteResult<()> {
        let Some(&id) = self.working_memory.get(wme) else {
            if self.config.strict_retraction {
                return Err(ReteError::fact_not_found(wme));
            }
            warn!("Ignoring retraction of a WME that is not in working memory");
            return Ok(());
        };

        let (alpha_memories, tokens) = {
            let record = self.wme_record(id)?;
            (record.alpha_memories.clone(), record.tokens.clone())
        };

        for alpha_memory in &alpha_memories {
            if let Some(memory) = self.alpha_memories.get_mut(alpha_memory) {
                memory.items.retain(|w| *w != id);
            }
        }

        for token in tokens {
            self.delete_token_and_descendents(token)?;
        }

        // Detach completely before any re-propagation
        let blocked = std::mem::take(&mut self.wme_record_mut(id)?.negative_join_results);
        let mut unblocked = Vec::new();
        for result in blocked {
            if let Some(owner) = self.tokens.get_mut(&result.owner) {
                owner.join_results.retain(|r| r.wme != id);
                if owner.join_results.is_empty() {
                    unblocked.push(result.owner);
                }
            }
        }
        self.wmes.remove(&id);
        self.working_memory.remove(wme);

        let mut first_error = None;
        for owner in unblocked {
            let node = match self.tokens.get(&owner) {
                Some(token) if token.join_results.is_empty() => token.node,
                _ => continue,
            };
            for child in self.node_ref(node)?.children.clone() {
                if let Err(error) = self.left_activation(child, owner, Pending::absent()) {
                    warn!(token = %owner, error = %error, "Re-propagating an unblocked token failed");
                    first_error.get_or_insert(error);
                }
            }
        }
        if let Some(error) = first_error {
            return Err(error);
        }

        debug!(wme_id = %id, "Retracted WME");
        Ok(())
    }

    /// Retract a fact given as terms
    pub fn remove_fact(
        &mut self,
        identifier: impl Into<Term>,
        attribute: impl Into<Term>,
        value: impl Into<Term>,
    ) -> ReteResult<()> {
        self.remove_wme(&Wme::from_terms(identifier, attribute, value)?)
    }

    // ---------------------------------------------------------------------------------------------
    // Matches and firing
    // ---------------------------------------------------------------------------------------------

    /// Every current activation, productions in registration order
    pub fn activations(&self) -> impl Iterator<Item = Activation<'_>> + '_ {
        self.production_order.iter().filter_map(move |id| self.productions.get(id)).flat_map(move |entry| {
            let items = self.beta_nodes.get(&entry.pnode).map_or(&[][..], |node| node.items());
            items.iter().map(move |&token| Activation { network: self, production: &entry.production, token })
        })
    }

    /// Every current match as an owned record
    pub fn matches(&self) -> impl Iterator<Item = MatchRecord> + '_ {
        self.activations().map(|activation| activation.to_record())
    }

    /// Current activations of one production
    pub fn activations_for(&self, production_id: ProductionId) -> ReteResult<Vec<Activation<'_>>> {
        let entry = self.productions.get(&production_id).ok_or_else(|| ReteError::unknown_production(production_id))?;
        Ok(self
            .node_ref(entry.pnode)?
            .items()
            .iter()
            .map(|&token| Activation { network: self, production: &entry.production, token })
            .collect())
    }

    /// Number of current matches of one production
    pub fn match_count(&self, production_id: ProductionId) -> ReteResult<usize> {
        let entry = self.productions.get(&production_id).ok_or_else(|| ReteError::unknown_production(production_id))?;
        Ok(self.node_ref(entry.pnode)?.items().len())
    }

    /// Take the oldest activation that has not been fired yet
    pub fn pop_new_activation(&mut self) -> Option<ActivationId> {
        for production in &self.production_order {
            let Some(entry) = self.productions.get(production) else {
                continue;
            };
            if let Some(BetaNode { kind: BetaNodeKind::Production(pnode), .. }) = self.beta_nodes.get_mut(&entry.pnode)
            {
                if let Some(token) = pnode.new_tokens.pop_front() {
                    return Some(ActivationId { production: *production, token });
                }
            }
        }
        None
    }

    /// Activations not fired yet
    pub fn new_activation_count(&self) -> usize {
        self.beta_nodes
            .values()
            .map(|node| match &node.kind {
                BetaNodeKind::Production(pnode) => pnode.new_tokens.len(),
                _ => 0,
            })
            .sum()
    }

    /// Run the production's action with the activation's bindings
    #[instrument(skip(self), fields(production_id = activation.production, token = %activation.token))]
    pub fn fire(&mut self, activation: ActivationId) -> ReteResult<()> {
        let (pnode, action) = {
            let entry = self
                .productions
                .get(&activation.production)
                .ok_or_else(|| ReteError::unknown_production(activation.production))?;
            (entry.pnode, entry.production.action.clone())
        };

        match &mut self.node_mut(pnode)?.kind {
            BetaNodeKind::Production(p) if p.items.contains(&activation.token) => {
                p.new_tokens.retain(|t| *t != activation.token);
            }
            _ => {
                return Err(ReteError::stale_activation(
                    activation.production,
                    format!("token {} no longer matches", activation.token),
                ));
            }
        }

        let binding = self.token_ref(activation.token)?.binding.clone();
        self.activations_fired += 1;
        if let Some(action) = action {
            action(self, &binding).map_err(|e| ReteError::action_failed(activation.production, &e))?;
        }
        debug!("Fired activation");
        Ok(())
    }

    /// Alternate popping and firing new activations, one at a time, until
    /// none are left or `limit` activations have fired. `None` falls back to
    /// the configured `max_run_cycles`. Returns the number fired.
    #[instrument(skip(self))]
    pub fn run(&mut self, limit: Option<usize>) -> ReteResult<usize> {
        let limit = limit.or(self.config.max_run_cycles);
        let mut fired = 0;
        while limit.map_or(true, |max| fired < max) {
            let Some(activation) = self.pop_new_activation() else {
                break;
            };
            self.fire(activation)?;
            fired += 1;
        }
        info!(fired, "Run finished");
        Ok(fired)
    }

    // ---------------------------------------------------------------------------------------------
    // Introspection
    // ---------------------------------------------------------------------------------------------

    /// WMEs currently asserted, in assertion order
    pub fn working_memory(&self) -> impl Iterator<Item = &Wme> + '_ {
        self.wmes.values().map(|record| &record.wme)
    }

    pub fn contains_wme(&self, wme: &Wme) -> bool {
        self.working_memory.contains_key(wme)
    }

    pub fn wme_id(&self, wme: &Wme) -> Option<WmeId> {
        self.working_memory.get(wme).copied()
    }

    pub fn wme(&self, id: WmeId) -> Option<&Wme> {
        self.wmes.get(&id).map(|record| &record.wme)
    }

    pub fn wme_record(&self, id: WmeId) -> ReteResult<&WmeRecord> {
        self.wmes.get(&id).ok_or_else(|| ReteError::network(format!("WME {id} is not in working memory")))
    }

    pub(crate) fn wme_record_mut(&mut self, id: WmeId) -> ReteResult<&mut WmeRecord> {
        self.wmes.get_mut(&id).ok_or_else(|| ReteError::network(format!("WME {id} is not in working memory")))
    }

    pub fn production(&self, production_id: ProductionId) -> Option<&Production> {
        self.productions.get(&production_id).map(|entry| entry.production.as_ref())
    }

    /// Registered productions in registration order
    pub fn productions(&self) -> impl Iterator<Item = &Production> + '_ {
        self.production_order
            .iter()
            .filter_map(move |id| self.productions.get(id))
            .map(|entry| entry.production.as_ref())
    }

    pub fn production_node(&self, production_id: ProductionId) -> Option<NodeId> {
        self.productions.get(&production_id).map(|entry| entry.pnode)
    }

    pub fn node(&self, id: NodeId) -> Option<&BetaNode> {
        self.beta_nodes.get(&id)
    }

    pub fn beta_root(&self) -> NodeId {
        self.beta_root
    }

    pub fn root_token(&self) -> TokenId {
        self.root_token
    }

    pub fn alpha_memory(&self, id: AlphaMemoryId) -> Option<&AlphaMemory> {
        self.alpha_memories.get(&id)
    }

    pub fn token(&self, id: TokenId) -> Option<&Token> {
        self.tokens.get(&id)
    }

    /// Beta nodes including the root
    pub fn node_count(&self) -> usize {
        self.beta_nodes.len()
    }

    pub fn stats(&self) -> NetworkStats {
        NetworkStats {
            productions: self.productions.len(),
            wmes: self.wmes.len(),
            alpha_memories: self.alpha_memories.len(),
            beta_nodes: self.beta_nodes.len(),
            tokens: self.tokens.len(),
            activations: self.activations().count(),
            pending_activations: self.new_activation_count(),
            activations_created: self.activations_created,
            activations_fired: self.activations_fired,
        }
    }

    pub(crate) fn next_node_id(&mut self) -> NodeId {
        let id = NodeId(self.next_node);
        self.next_node += 1;
        id
    }

    pub(crate) fn next_token_id(&mut self) -> TokenId {
        let id = TokenId(self.next_token);
        self.next_token += 1;
        id
    }

    pub(crate) fn next_alpha_memory_id(&mut self) -> AlphaMemoryId {
        let id = AlphaMemoryId(self.next_alpha_memory);
        self.next_alpha_memory += 1;
        id
    }
}

impl fmt::Debug for ReteNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReteNetwork")
            .field("config", &self.config)
            .field("productions", &self.production_order)
            .field("wmes", &self.wmes.len())
            .field("alpha_memories", &self.alpha_memories.len())
            .field("beta_nodes", &self.beta_nodes.len())
            .field("tokens", &self.tokens.len())
            .finish()
    }
}
