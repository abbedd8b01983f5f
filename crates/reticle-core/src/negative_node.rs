//! Negative nodes
//!
//! A negative node holds tokens like a beta memory and tests them against its
//! alpha memory like a join node. A token is passed on only while no WME in
//! the alpha memory matches it. Every blocking WME is recorded as a
//! [`NegativeJoinResult`] on both sides so retraction can unblock the token.

use crate::beta_network::BetaNodeKind;
use crate::conditions::{JoinTest, Pattern};
use crate::error::{ReteError, ReteResult};
use crate::rete_network::ReteNetwork;
use crate::token::Pending;
use crate::types::{AlphaMemoryId, NegativeJoinResult, NodeId, TokenId, WmeId};
use tracing::{debug, trace};

#[derive(Debug, Clone)]
pub struct NegativeNode {
    pub items: Vec<TokenId>,
    pub alpha_memory: AlphaMemoryId,
    pub tests: Vec<JoinTest>,
    pub pattern: Pattern,
}

impl ReteNetwork {
    pub(crate) fn negative_left_activation(
        &mut self,
        node: NodeId,
        token: TokenId,
        pending: Pending,
    ) -> ReteResult<()> {
        let new_token = self.create_token(node, token, pending)?;

        let (blockers, children) = {
            let beta = self.node_ref(node)?;
            let negative = as_negative(&beta.kind)?;
            let mut blockers = Vec::new();
            for &wme in &self.alpha_ref(negative.alpha_memory)?.items {
                if self.perform_join_test(new_token, wme, &negative.tests, &negative.pattern)?.is_some() {
                    blockers.push(wme);
                }
            }
            (blockers, beta.children.clone())
        };

        if let BetaNodeKind::Negative(negative) = &mut self.node_mut(node)?.kind {
            negative.items.push(new_token);
        }
        for &wme in &blockers {
            self.record_negative_join_result(new_token, wme)?;
        }

        if blockers.is_empty() {
            for child in children {
                self.left_activation(child, new_token, Pending::absent())?;
            }
        } else {
            trace!(node = %node, token = %new_token, blockers = blockers.len(), "Token blocked");
        }
        Ok(())
    }

    /// A new WME may block tokens that were passed on before
    pub(crate) fn negative_right_activation(&mut self, node: NodeId, wme: WmeId) -> ReteResult<()> {
        let blocked = {
            let beta = self.node_ref(node)?;
            let negative = as_negative(&beta.kind)?;
            let mut blocked = Vec::new();
            for &token in &negative.items {
                if self.perform_join_test(token, wme, &negative.tests, &negative.pattern)?.is_some() {
                    blocked.push(token);
                }
            }
            blocked
        };

        for token in blocked {
            if !self.tokens.contains_key(&token) {
                continue;
            }
            if self.token_ref(token)?.join_results.is_empty() {
                trace!(node = %node, token = %token, wme = %wme, "Blocking token");
                self.delete_descendents_of_token(token)?;
            }
            self.record_negative_join_result(token, wme)?;
        }
        Ok(())
    }

    fn record_negative_join_result(&mut self, owner: TokenId, wme: WmeId) -> ReteResult<()> {
        let result = NegativeJoinResult { owner, wme };
        self.token_mut(owner)?.join_results.push(result);
        self.wme_record_mut(wme)?.negative_join_results.push(result);
        Ok(())
    }

    pub(crate) fn build_or_share_negative_node(
        &mut self,
        parent: NodeId,
        alpha_memory: AlphaMemoryId,
        tests: Vec<JoinTest>,
        pattern: &Pattern,
    ) -> ReteResult<NodeId> {
        for &child in &self.node_ref(parent)?.children {
            if let BetaNodeKind::Negative(negative) = &self.node_ref(child)?.kind {
                if negative.alpha_memory == alpha_memory && negative.tests == tests && &negative.pattern == pattern
                {
                    debug!(node = %child, pattern = %pattern, "Sharing negative node");
                    return Ok(child);
                }
            }
        }

        let node = self.insert_node(
            parent,
            BetaNodeKind::Negative(NegativeNode {
                items: Vec::new(),
                alpha_memory,
                tests,
                pattern: pattern.clone(),
            }),
        )?;
        self.add_alpha_successor(alpha_memory, node)?;
        self.update_new_node_with_matches_from_above(node)?;
        debug!(
            node = %node,
            parent = %parent,
            alpha_memory = %alpha_memory,
            pattern = %pattern,
            "Created negative node"
        );
        Ok(node)
    }
}

fn as_negative(kind: &BetaNodeKind) -> ReteResult<&NegativeNode> {
    match kind {
        BetaNodeKind::Negative(negative) => Ok(negative),
        _ => Err(ReteError::network_at("negative", "expected a negative node")),
    }
}
