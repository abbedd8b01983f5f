//! Join nodes
//!
//! A join node sits under a beta memory and reads one alpha memory. A token
//! from the memory and a WME from the alpha memory join when every
//! [`JoinTest`] holds and the WME's variables agree with the token's bindings.

use crate::beta_network::{BetaNodeKind, NodeType};
use crate::conditions::{JoinTest, Pattern};
use crate::error::{ReteError, ReteResult};
use crate::rete_network::ReteNetwork;
use crate::token::Pending;
use crate::types::{AlphaMemoryId, Bindings, NodeId, TokenId, WmeId};
use reticle_types::Field;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct JoinNode {
    pub alpha_memory: AlphaMemoryId,
    pub tests: Vec<JoinTest>,
    pub pattern: Pattern,
}

/// Tests tying `pattern` to the conditions before it.
///
/// `earlier` holds one entry per slot: the pattern of a positive condition, or
/// `None` for a negation or negated conjunction, whose slots bind nothing.
/// Each variable is tested against the first earlier pattern binding it.
pub fn join_tests_for(pattern: &Pattern, earlier: &[Option<Pattern>]) -> Vec<JoinTest> {
    let mut tests = Vec::new();
    for (wme_field, var) in pattern.vars() {
        let found = earlier.iter().enumerate().find_map(|(index, slot)| {
            slot.as_ref().and_then(|p| p.contain(var)).map(|field: Field| (index, field))
        });
        if let Some((condition_index, earlier_field)) = found {
            tests.push(JoinTest { wme_field, condition_index, earlier_field });
        }
    }
    tests
}

impl ReteNetwork {
    /// Run the join tests for `token` against `wme`, returning the bindings
    /// the WME contributes when they pass
    pub(crate) fn perform_join_test(
        &self,
        token: TokenId,
        wme: WmeId,
        tests: &[JoinTest],
        pattern: &Pattern,
    ) -> ReteResult<Option<Bindings>> {
        let incoming = &self.wme_record(wme)?.wme;
        if !tests.is_empty() {
            let slots = self.token_wmes(token)?;
            for test in tests {
                let Some(Some(earlier)) = slots.get(test.condition_index) else {
                    return Ok(None);
                };
                let earlier = &self.wme_record(*earlier)?.wme;
                if incoming.get(test.wme_field) != earlier.get(test.earlier_field) {
                    return Ok(None);
                }
            }
        }
        Ok(pattern.make_binding(incoming, &self.token_ref(token)?.binding))
    }

    /// A new token arrived from the parent memory: join it with every WME
    /// in the alpha memory
    pub(crate) fn join_left_activation(&mut self, node: NodeId, token: TokenId) -> ReteResult<()> {
        let (matches, children) = {
            let beta = self.node_ref(node)?;
            let join = as_join(&beta.kind)?;
            let mut matches = Vec::new();
            for &wme in &self.alpha_ref(join.alpha_memory)?.items {
                if let Some(binding) = self.perform_join_test(token, wme, &join.tests, &join.pattern)? {
                    matches.push((wme, binding));
                }
            }
            (matches, beta.children.clone())
        };

        for (wme, binding) in matches {
            for &child in &children {
                if !self.tokens.contains_key(&token) {
                    return Ok(());
                }
                self.left_activation(child, token, Pending::matched(wme, binding.clone()))?;
            }
        }
        Ok(())
    }

    /// A new WME arrived in the alpha memory: join it with every token in
    /// the parent memory
    pub(crate) fn join_right_activation(&mut self, node: NodeId, wme: WmeId) -> ReteResult<()> {
        let (matches, children) = {
            let beta = self.node_ref(node)?;
            let join = as_join(&beta.kind)?;
            let mut matches = Vec::new();
            for &token in self.parent_items(beta)? {
                if let Some(binding) = self.perform_join_test(token, wme, &join.tests, &join.pattern)? {
                    matches.push((token, binding));
                }
            }
            (matches, beta.children.clone())
        };

        for (token, binding) in matches {
            for &child in &children {
                if !self.tokens.contains_key(&token) {
                    break;
                }
                self.left_activation(child, token, Pending::matched(wme, binding.clone()))?;
            }
        }
        Ok(())
    }

    /// Join node under `parent` with the same alpha memory, tests and pattern,
    /// or a new one
    pub(crate) fn build_or_share_join_node(
        &mut self,
        parent: NodeId,
        alpha_memory: AlphaMemoryId,
        tests: Vec<JoinTest>,
        pattern: &Pattern,
    ) -> ReteResult<NodeId> {
        for &child in &self.node_ref(parent)?.children {
            if let BetaNodeKind::Join(join) = &self.node_ref(child)?.kind {
                if join.alpha_memory == alpha_memory && join.tests == tests && &join.pattern == pattern {
                    debug!(node = %child, pattern = %pattern, "Sharing join node");
                    return Ok(child);
                }
            }
        }

        let node = self.insert_node(
            parent,
            BetaNodeKind::Join(JoinNode { alpha_memory, tests, pattern: pattern.clone() }),
        )?;
        self.add_alpha_successor(alpha_memory, node)?;
        debug!(node = %node, parent = %parent, alpha_memory = %alpha_memory, pattern = %pattern, "Created join node");
        Ok(node)
    }
}

fn as_join(kind: &BetaNodeKind) -> ReteResult<&JoinNode> {
    match kind {
        BetaNodeKind::Join(join) => Ok(join),
        _ => Err(ReteError::network_at(NodeType::Join.name(), "expected a join node")),
    }
}
