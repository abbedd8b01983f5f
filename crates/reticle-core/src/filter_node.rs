//! Filter and bind nodes
//!
//! Both are stateless: they hold no tokens and have no right input. A filter
//! node passes a match on when its predicate holds. A bind node computes a
//! value and passes the match on with the value bound to its target variable.

use crate::beta_network::BetaNodeKind;
use crate::conditions::{Bind, Filter};
use crate::error::{ReteError, ReteResult};
use crate::rete_network::ReteNetwork;
use crate::token::Pending;
use crate::types::{Bindings, NodeId, TokenId};
use tracing::{debug, trace};

#[derive(Debug, Clone)]
pub struct FilterNode {
    pub filter: Filter,
}

#[derive(Debug, Clone)]
pub struct BindNode {
    pub bind: Bind,
}

impl ReteNetwork {
    fn merged_binding(&self, token: TokenId, pending: &Pending) -> ReteResult<Bindings> {
        let mut binding = self.token_ref(token)?.binding.clone();
        binding.extend(pending.binding.iter().map(|(var, value)| (var.clone(), value.clone())));
        Ok(binding)
    }

    pub(crate) fn filter_passes(&self, filter: &Filter, token: TokenId, pending: &Pending) -> ReteResult<bool> {
        filter.evaluate(&self.merged_binding(token, pending)?)
    }

    /// `pending` extended with the bind's value, or `None` when the target is
    /// already bound to a different value
    pub(crate) fn bind_pending(
        &self,
        bind: &Bind,
        token: TokenId,
        mut pending: Pending,
    ) -> ReteResult<Option<Pending>> {
        let binding = self.merged_binding(token, &pending)?;
        let value = bind.evaluate(&binding)?;
        match binding.get(&bind.target) {
            Some(existing) if *existing == value => Ok(Some(pending)),
            Some(existing) => {
                trace!(
                    target = %bind.target,
                    existing = %existing,
                    computed = %value,
                    "Bind conflicts with existing binding"
                );
                Ok(None)
            }
            None => {
                pending.binding.insert(bind.target.clone(), value);
                Ok(Some(pending))
            }
        }
    }

    pub(crate) fn filter_left_activation(&mut self, node: NodeId, token: TokenId, pending: Pending) -> ReteResult<()> {
        let (passes, children) = {
            let beta = self.node_ref(node)?;
            let BetaNodeKind::Filter(filter_node) = &beta.kind else {
                return Err(ReteError::network_at("filter", "expected a filter node"));
            };
            (self.filter_passes(&filter_node.filter, token, &pending)?, beta.children.clone())
        };
        if passes {
            for child in children {
                self.left_activation(child, token, pending.clone())?;
            }
        }
        Ok(())
    }

    pub(crate) fn bind_left_activation(&mut self, node: NodeId, token: TokenId, pending: Pending) -> ReteResult<()> {
        let (extended, children) = {
            let beta = self.node_ref(node)?;
            let BetaNodeKind::Bind(bind_node) = &beta.kind else {
                return Err(ReteError::network_at("bind", "expected a bind node"));
            };
            (self.bind_pending(&bind_node.bind, token, pending)?, beta.children.clone())
        };
        if let Some(extended) = extended {
            for child in children {
                self.left_activation(child, token, extended.clone())?;
            }
        }
        Ok(())
    }

    pub(crate) fn build_or_share_filter_node(&mut self, parent: NodeId, filter: &Filter) -> ReteResult<NodeId> {
        for &child in &self.node_ref(parent)?.children {
            if let BetaNodeKind::Filter(existing) = &self.node_ref(child)?.kind {
                if existing.filter == *filter {
                    debug!(node = %child, "Sharing filter node");
                    return Ok(child);
                }
            }
        }
        let node = self.insert_node(parent, BetaNodeKind::Filter(FilterNode { filter: filter.clone() }))?;
        debug!(node = %node, parent = %parent, "Created filter node");
        Ok(node)
    }

    pub(crate) fn build_or_share_bind_node(&mut self, parent: NodeId, bind: &Bind) -> ReteResult<NodeId> {
        for &child in &self.node_ref(parent)?.children {
            if let BetaNodeKind::Bind(existing) = &self.node_ref(child)?.kind {
                if existing.bind == *bind {
                    debug!(node = %child, target = %bind.target, "Sharing bind node");
                    return Ok(child);
                }
            }
        }
        let node = self.insert_node(parent, BetaNodeKind::Bind(BindNode { bind: bind.clone() }))?;
        debug!(node = %node, parent = %parent, target = %bind.target, "Created bind node");
        Ok(node)
    }
}
