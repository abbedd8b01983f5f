//! Negated conjunctive conditions
//!
//! ```text
//!            parent
//!           ┌──┴───────────────┐
//!       subnetwork          NCC node ── children
//!      (c1 ... cn)             ▲
//!           │                  │ results
//!      NCC partner ────────────┘
//! ```
//!
//! The subnetwork matches the conjunction under the same parent as the NCC
//! node. Each complete sub-match reaching the partner becomes a result token
//! attached to the NCC token it extends; an NCC token is passed on only while
//! it has no results.
//!
//! The partner can see a sub-match before the NCC node has seen the token it
//! belongs to. Such results wait in the partner's buffer until the NCC node's
//! left activation claims them.

use crate::beta_network::BetaNodeKind;
use crate::conditions::{Condition, Pattern, number_of_conditions};
use crate::error::{ReteError, ReteResult};
use crate::rete_network::ReteNetwork;
use crate::token::Pending;
use crate::types::{NodeId, TokenId, WmeId};
use tracing::{debug, trace};

#[derive(Debug, Clone)]
pub struct NccNode {
    pub items: Vec<TokenId>,
    pub partner: NodeId,
}

#[derive(Debug, Clone)]
pub struct NccPartnerNode {
    pub ncc_node: NodeId,
    /// Chain links between the NCC node's parent and the partner
    pub number_of_conditions: usize,
    pub new_result_buffer: Vec<BufferedResult>,
}

/// A result whose owner has not reached the NCC node yet.
/// The owner will be the NCC token built from `owner_parent` and `owner_wme`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferedResult {
    pub result: TokenId,
    pub owner_parent: TokenId,
    pub owner_wme: Option<WmeId>,
}

impl ReteNetwork {
    pub(crate) fn ncc_left_activation(&mut self, node: NodeId, token: TokenId, pending: Pending) -> ReteResult<()> {
        let owner_wme = pending.wme;
        let new_token = self.create_token(node, token, pending)?;

        let (partner, children) = {
            let beta = self.node_mut(node)?;
            let BetaNodeKind::Ncc(ncc) = &mut beta.kind else {
                return Err(ReteError::network_at("ncc", "expected an NCC node"));
            };
            ncc.items.push(new_token);
            (ncc.partner, beta.children.clone())
        };

        let claimed = {
            let BetaNodeKind::NccPartner(partner) = &mut self.node_mut(partner)?.kind else {
                return Err(ReteError::network_at("ncc_partner", "expected an NCC partner node"));
            };
            let (claimed, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut partner.new_result_buffer)
                .into_iter()
                .partition(|buffered| buffered.owner_parent == token && buffered.owner_wme == owner_wme);
            partner.new_result_buffer = waiting;
            claimed
        };
        for buffered in &claimed {
            self.token_mut(buffered.result)?.owner = Some(new_token);
            self.token_mut(new_token)?.ncc_results.push(buffered.result);
        }

        if claimed.is_empty() {
            for child in children {
                self.left_activation(child, new_token, Pending::absent())?;
            }
        } else {
            trace!(node = %node, token = %new_token, results = claimed.len(), "NCC token blocked by buffered results");
        }
        Ok(())
    }

    pub(crate) fn ncc_partner_left_activation(
        &mut self,
        node: NodeId,
        token: TokenId,
        pending: Pending,
    ) -> ReteResult<()> {
        let (ncc_node, conditions) = match &self.node_ref(node)?.kind {
            BetaNodeKind::NccPartner(partner) => (partner.ncc_node, partner.number_of_conditions),
            _ => return Err(ReteError::network_at("ncc_partner", "expected an NCC partner node")),
        };

        let mut owner_wme = pending.wme;
        let result = self.create_token(node, token, pending)?;

        let mut owner_parent = token;
        for _ in 0..conditions {
            let link = self.token_ref(owner_parent)?;
            owner_wme = link.wme;
            owner_parent = link.parent.ok_or_else(|| {
                ReteError::network_at("ncc_partner", "sub-match is shorter than the negated conjunction")
            })?;
        }

        let owner = self
            .node_ref(ncc_node)?
            .items()
            .iter()
            .copied()
            .find(|t| self.tokens.get(t).is_some_and(|o| o.parent == Some(owner_parent) && o.wme == owner_wme));

        match owner {
            Some(owner) => {
                if self.token_ref(owner)?.ncc_results.is_empty() {
                    trace!(node = %ncc_node, token = %owner, "Blocking NCC token");
                    self.delete_descendents_of_token(owner)?;
                }
                self.token_mut(owner)?.ncc_results.push(result);
                self.token_mut(result)?.owner = Some(owner);
            }
            None => {
                let BetaNodeKind::NccPartner(partner) = &mut self.node_mut(node)?.kind else {
                    return Err(ReteError::network_at("ncc_partner", "expected an NCC partner node"));
                };
                partner.new_result_buffer.push(BufferedResult { result, owner_parent, owner_wme });
                trace!(node = %node, result = %result, "Buffered NCC result");
            }
        }
        Ok(())
    }

    /// NCC node and partner for `conditions` under `parent`, sharing an
    /// existing pair whose partner hangs off the same subnetwork
    pub(crate) fn build_or_share_ncc_nodes(
        &mut self,
        parent: NodeId,
        conditions: &[Condition],
        earlier: &[Option<Pattern>],
    ) -> ReteResult<NodeId> {
        let mut sub_earlier = earlier.to_vec();
        let bottom = self.build_or_share_network_for_conditions(parent, conditions, &mut sub_earlier)?;

        for &child in &self.node_ref(parent)?.children {
            if let BetaNodeKind::Ncc(ncc) = &self.node_ref(child)?.kind {
                if self.node_ref(ncc.partner)?.parent == Some(bottom) {
                    debug!(node = %child, "Sharing NCC node");
                    return Ok(child);
                }
            }
        }

        let ncc_id = self.next_node_id();
        let partner_id = self.next_node_id();
        self.link_node(ncc_id, parent, BetaNodeKind::Ncc(NccNode { items: Vec::new(), partner: partner_id }))?;
        self.link_node(
            partner_id,
            bottom,
            BetaNodeKind::NccPartner(NccPartnerNode {
                ncc_node: ncc_id,
                number_of_conditions: number_of_conditions(conditions),
                new_result_buffer: Vec::new(),
            }),
        )?;
        self.update_new_node_with_matches_from_above(ncc_id)?;
        self.update_new_node_with_matches_from_above(partner_id)?;
        debug!(node = %ncc_id, partner = %partner_id, parent = %parent, "Created NCC node");
        Ok(ncc_id)
    }
}
