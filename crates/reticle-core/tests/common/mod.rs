//! Shared fixtures for the integration tests
#![allow(dead_code)]

use reticle_core::{NodeId, ReteNetwork, Wme};
use tracing_subscriber::EnvFilter;

/// Install a test subscriber once; later calls are no-ops
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_test_writer()
        .try_init();
}

/// Nine-fact block world: B1 sits on B2 and B3, B2 and B3 sit on the table
pub fn block_world() -> Vec<Wme> {
    vec![
        Wme::new("B1", "on", "B2"),
        Wme::new("B1", "on", "B3"),
        Wme::new("B1", "color", "red"),
        Wme::new("B2", "on", "table"),
        Wme::new("B2", "left-of", "B3"),
        Wme::new("B2", "color", "blue"),
        Wme::new("B3", "left-of", "B4"),
        Wme::new("B3", "on", "table"),
        Wme::new("B3", "color", "red"),
    ]
}

/// Block world without the last fact, `(B3 ^color red)`
pub fn block_world_without_red_b3() -> Vec<Wme> {
    let mut wmes = block_world();
    wmes.pop();
    wmes
}

pub fn assert_all(network: &mut ReteNetwork, wmes: &[Wme]) {
    for wme in wmes {
        network.add_wme(wme.clone()).unwrap();
    }
}

pub fn parent(network: &ReteNetwork, node: NodeId) -> NodeId {
    network.node(node).and_then(|n| n.parent).unwrap()
}

/// Token count of the node `steps` levels above `node`
pub fn items_above(network: &ReteNetwork, node: NodeId, steps: usize) -> usize {
    let mut current = node;
    for _ in 0..steps {
        current = parent(network, current);
    }
    network.node(current).unwrap().items().len()
}

/// Supporting WMEs of every activation of one production, owned
pub fn activation_wmes(network: &ReteNetwork, production: u64) -> Vec<Vec<Option<Wme>>> {
    network
        .activations_for(production)
        .unwrap()
        .iter()
        .map(|activation| activation.wmes().into_iter().map(|wme| wme.cloned()).collect())
        .collect()
}
