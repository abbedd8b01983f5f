/// Negated Conjunction Integration Test
///
/// Validates NCC blocking and unblocking, result buffering when the
/// subnetwork sees a match before the NCC node does, and cleanup on removal.
mod common;

use common::*;
use reticle_core::*;

fn x() -> Term {
    Term::var("x")
}

fn y() -> Term {
    Term::var("y")
}

fn z() -> Term {
    Term::var("z")
}

/// (?x ^on ?y) (?y ^left-of ?z) -{(?z ^color red) (?z ^on ?w)}
fn not_red_and_stacked(id: ProductionId) -> Production {
    Production::builder(id, "neighbour not a red stacked block")
        .when(x(), "on", y())
        .when(y(), "left-of", z())
        .none_of([Condition::pattern(z(), "color", "red"), Condition::pattern(z(), "on", Term::var("w"))])
        .build()
}

#[test]
fn test_ncc_blocks_when_conjunction_completes() {
    init_tracing();
    let mut network = ReteNetwork::new();
    network.add_production(not_red_and_stacked(1)).unwrap();
    assert_all(&mut network, &block_world_without_red_b3());
    assert_eq!(network.match_count(1).unwrap(), 2);

    network.add_wme(Wme::new("B3", "color", "red")).unwrap();
    assert_eq!(network.match_count(1).unwrap(), 1);
    let activations = network.activations_for(1).unwrap();
    assert_eq!(activations[0].binding()["z"], Value::from("B4"));
    assert_eq!(activations[0].wmes().len(), 3);
    assert_eq!(activations[0].wmes()[2], None);
}

#[test]
fn test_ncc_unblocks_when_conjunction_breaks() {
    init_tracing();
    let mut network = ReteNetwork::new();
    network.add_production(not_red_and_stacked(1)).unwrap();
    assert_all(&mut network, &block_world());
    assert_eq!(network.match_count(1).unwrap(), 1);

    network.remove_wme(&Wme::new("B3", "on", "table")).unwrap();
    assert_eq!(network.match_count(1).unwrap(), 2);

    network.add_wme(Wme::new("B3", "on", "table")).unwrap();
    assert_eq!(network.match_count(1).unwrap(), 1);
}

#[test]
fn test_ncc_added_after_facts() {
    init_tracing();
    let mut network = ReteNetwork::new();
    assert_all(&mut network, &block_world());
    network.add_production(not_red_and_stacked(1)).unwrap();
    assert_eq!(network.match_count(1).unwrap(), 1);

    network.remove_wme(&Wme::new("B3", "color", "red")).unwrap();
    assert_eq!(network.match_count(1).unwrap(), 2);
}

#[test]
fn test_subnetwork_result_reaching_partner_first_is_claimed() {
    init_tracing();
    let mut network = ReteNetwork::new();
    let pnode = network.add_production(not_red_and_stacked(1)).unwrap();
    for wme in [Wme::new("B3", "color", "red"), Wme::new("B3", "on", "table"), Wme::new("B1", "on", "B2")] {
        network.add_wme(wme).unwrap();
    }
    assert_eq!(network.match_count(1).unwrap(), 0);

    // The subnetwork hangs off the join before the NCC node, so it completes
    // the conjunction before the NCC node sees the new token.
    network.add_wme(Wme::new("B2", "left-of", "B3")).unwrap();
    assert_eq!(network.match_count(1).unwrap(), 0);

    let ncc = parent(&network, pnode);
    let BetaNodeKind::Ncc(ncc_node) = &network.node(ncc).unwrap().kind else {
        panic!("expected an NCC node above the p-node");
    };
    let BetaNodeKind::NccPartner(partner) = &network.node(ncc_node.partner).unwrap().kind else {
        panic!("expected an NCC partner");
    };
    assert!(partner.new_result_buffer.is_empty());
    assert_eq!(ncc_node.items.len(), 1);
    let owner = network.token(ncc_node.items[0]).unwrap();
    assert_eq!(owner.ncc_results.len(), 1);

    network.remove_wme(&Wme::new("B3", "color", "red")).unwrap();
    assert_eq!(network.match_count(1).unwrap(), 1);
}

#[test]
fn test_ncc_of_negations() {
    init_tracing();
    let mut network = ReteNetwork::new();
    let item = Term::var("item");
    network
        .add_production(
            Production::builder(1, "black and white")
                .when(item.clone(), "cat", Term::var("cid"))
                .when(item.clone(), "shop", Term::var("sid"))
                .none_of([
                    Condition::negation(item.clone(), "cat", "100"),
                    Condition::negation(item.clone(), "cat", "101"),
                    Condition::negation(item.clone(), "cat", "102"),
                ])
                .unless(item.clone(), "shop", "1")
                .unless(item.clone(), "shop", "2")
                .unless(item, "shop", "3")
                .build(),
        )
        .unwrap();

    for wme in [
        Wme::new("item:1", "cat", "101"),
        Wme::new("item:1", "shop", "4"),
        Wme::new("item:2", "cat", "100"),
        Wme::new("item:2", "shop", "1"),
    ] {
        network.add_wme(wme).unwrap();
    }

    let activations = network.activations_for(1).unwrap();
    assert_eq!(activations.len(), 1);
    assert_eq!(activations[0].binding()["item"], Value::from("item:1"));
}

#[test]
fn test_ncc_at_root() {
    init_tracing();
    let mut network = ReteNetwork::new();
    network
        .add_production(
            Production::builder(1, "nothing red on the table")
                .none_of([Condition::pattern(x(), "color", "red"), Condition::pattern(x(), "on", "table")])
                .build(),
        )
        .unwrap();
    assert_eq!(network.match_count(1).unwrap(), 1);

    network.add_wme(Wme::new("B3", "color", "red")).unwrap();
    assert_eq!(network.match_count(1).unwrap(), 1);
    network.add_wme(Wme::new("B3", "on", "table")).unwrap();
    assert_eq!(network.match_count(1).unwrap(), 0);

    network.remove_wme(&Wme::new("B3", "color", "red")).unwrap();
    assert_eq!(network.match_count(1).unwrap(), 1);
    assert_eq!(network.activations_for(1).unwrap()[0].wmes(), vec![None]);
}

#[test]
fn test_shared_ncc_and_removal() {
    init_tracing();
    let mut network = ReteNetwork::new();
    network.add_production(not_red_and_stacked(1)).unwrap();
    let nodes_with_one = network.node_count();
    network.add_production(not_red_and_stacked(2)).unwrap();
    // only the second p-node is new
    assert_eq!(network.node_count(), nodes_with_one + 1);

    assert_all(&mut network, &block_world());
    assert_eq!(network.match_count(1).unwrap(), 1);
    assert_eq!(network.match_count(2).unwrap(), 1);

    network.remove_production(1).unwrap();
    assert_eq!(network.node_count(), nodes_with_one);
    assert_eq!(network.match_count(2).unwrap(), 1);

    network.remove_production(2).unwrap();
    assert_eq!(network.node_count(), 1);
    assert_eq!(network.stats().tokens, 1);
    assert_eq!(network.stats().alpha_memories, 0);
}
