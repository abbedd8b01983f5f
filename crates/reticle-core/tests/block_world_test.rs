/// Block World Integration Test
///
/// Classic Rete scenarios over a small block world: positive joins, negation,
/// node sharing between productions and productions added on the fly.
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

fn c0() -> Pattern {
    Pattern::new(x(), "on", y())
}

fn c1() -> Pattern {
    Pattern::new(y(), "left-of", z())
}

fn c2() -> Pattern {
    Pattern::new(z(), "color", "red")
}

fn three_blocks(id: ProductionId) -> Production {
    Production::new(id, "red block right of a stacked block", vec![c0().into(), c1().into(), c2().into()])
}

fn alpha_items(network: &ReteNetwork, pattern: &Pattern) -> Vec<Wme> {
    let id = network.alpha_memory_for(pattern).unwrap();
    network.alpha_memory(id).unwrap().items.iter().map(|w| network.wme(*w).unwrap().clone()).collect()
}

#[test]
fn test_constant_identifier_needs_both_facts() {
    init_tracing();
    let mut network = ReteNetwork::new();
    network
        .add_production(Production::builder(1, "constant").when("x", "id", "1").when("x", "kind", "8").build())
        .unwrap();

    let id_fact = Wme::new("x", "id", "1");
    let kind_fact = Wme::new("x", "kind", "8");

    network.add_wme(id_fact.clone()).unwrap();
    assert_eq!(network.match_count(1).unwrap(), 0);

    network.remove_wme(&id_fact).unwrap();
    network.add_wme(kind_fact.clone()).unwrap();
    assert_eq!(network.match_count(1).unwrap(), 0);

    network.add_wme(id_fact).unwrap();
    assert_eq!(network.match_count(1).unwrap(), 1);
}

#[test]
fn test_three_block_scenario_and_retraction() {
    init_tracing();
    let mut network = ReteNetwork::new();
    let pnode = network.add_production(three_blocks(1)).unwrap();
    let wmes = block_world();
    assert_all(&mut network, &wmes);

    assert_eq!(alpha_items(&network, &c0()), vec![wmes[0].clone(), wmes[1].clone(), wmes[3].clone(), wmes[7].clone()]);
    assert_eq!(alpha_items(&network, &c1()), vec![wmes[4].clone(), wmes[6].clone()]);
    assert_eq!(alpha_items(&network, &c2()), vec![wmes[2].clone(), wmes[8].clone()]);

    // p-node <- join(c2) <- memory(c0 c1) <- join(c1) <- memory(c0)
    assert_eq!(items_above(&network, pnode, 4), 4);
    assert_eq!(items_above(&network, pnode, 2), 2);
    assert_eq!(items_above(&network, pnode, 0), 1);

    let join_z = parent(&network, pnode);
    let am2 = network.alpha_memory_for(&c2()).unwrap();
    assert_eq!(network.alpha_memory(am2).unwrap().successors, vec![join_z]);

    assert_eq!(
        activation_wmes(&network, 1),
        vec![vec![Some(wmes[0].clone()), Some(wmes[4].clone()), Some(wmes[8].clone())]]
    );

    network.remove_wme(&wmes[0]).unwrap();

    assert_eq!(alpha_items(&network, &c0()), vec![wmes[1].clone(), wmes[3].clone(), wmes[7].clone()]);
    assert_eq!(alpha_items(&network, &c1()).len(), 2);
    assert_eq!(alpha_items(&network, &c2()).len(), 2);
    assert_eq!(items_above(&network, pnode, 4), 3);
    assert_eq!(items_above(&network, pnode, 2), 1);
    assert_eq!(network.match_count(1).unwrap(), 0);
    println!("✅ Retracting (B1 ^on B2) removed the only match");
}

#[test]
fn test_negated_slot_reports_none() {
    init_tracing();
    let mut network = ReteNetwork::new();
    network
        .add_production(
            Production::builder(1, "not red")
                .when(x(), "on", y())
                .when(y(), "left-of", z())
                .unless(z(), "color", "red")
                .build(),
        )
        .unwrap();
    assert_all(&mut network, &block_world());

    assert_eq!(
        activation_wmes(&network, 1),
        vec![vec![Some(Wme::new("B1", "on", "B3")), Some(Wme::new("B3", "left-of", "B4")), None]]
    );
}

#[test]
fn test_negation_reaches_same_result_when_added_after_facts() {
    init_tracing();
    let mut network = ReteNetwork::new();
    assert_all(&mut network, &block_world());
    network
        .add_production(
            Production::builder(1, "not red")
                .when(x(), "on", y())
                .when(y(), "left-of", z())
                .unless(z(), "color", "red")
                .build(),
        )
        .unwrap();

    let activations = network.activations_for(1).unwrap();
    assert_eq!(activations.len(), 1);
    assert_eq!(activations[0].binding()["z"], Value::from("B4"));
}

#[test]
fn test_multiple_productions_and_production_added_on_the_fly() {
    init_tracing();
    let mut network = ReteNetwork::new();
    let c3 = Condition::pattern(z(), "on", "table");
    let c4 = Condition::pattern(z(), "left-of", "B4");

    network.add_production(three_blocks(0)).unwrap();
    network
        .add_production(Production::new(1, "p1", vec![c0().into(), c1().into(), c3.clone(), c4]))
        .unwrap();

    let wmes = block_world();
    assert_all(&mut network, &wmes);
    let nodes_before = network.node_count();

    network
        .add_production(Production::new(2, "p2", vec![c0().into(), c1().into(), c3, c2().into()]))
        .unwrap();

    assert_eq!(
        activation_wmes(&network, 0),
        vec![vec![Some(wmes[0].clone()), Some(wmes[4].clone()), Some(wmes[8].clone())]]
    );
    assert_eq!(
        activation_wmes(&network, 1),
        vec![vec![Some(wmes[0].clone()), Some(wmes[4].clone()), Some(wmes[7].clone()), Some(wmes[6].clone())]]
    );
    assert_eq!(
        activation_wmes(&network, 2),
        vec![vec![Some(wmes[0].clone()), Some(wmes[4].clone()), Some(wmes[7].clone()), Some(wmes[8].clone())]]
    );

    network.remove_production(2).unwrap();
    assert!(network.match_count(2).is_err());
    assert_eq!(network.node_count(), nodes_before);
    assert_eq!(network.match_count(0).unwrap(), 1);
    assert_eq!(network.match_count(1).unwrap(), 1);
}

#[test]
fn test_identical_first_condition_is_shared() {
    init_tracing();
    let mut network = ReteNetwork::new();
    let red = network
        .add_production(Production::builder(1, "on red").when(x(), "on", y()).when(y(), "color", "red").build())
        .unwrap();
    let table = network
        .add_production(Production::builder(2, "on table").when(x(), "on", y()).when(y(), "on", "table").build())
        .unwrap();

    let first_join = |pnode| parent(&network, parent(&network, parent(&network, pnode)));
    let shared_join = first_join(red);
    assert_eq!(shared_join, first_join(table));
    assert_eq!(network.node(shared_join).unwrap().node_type(), NodeType::Join);
    assert_eq!(network.node(network.beta_root()).unwrap().children.len(), 1);

    let am0 = network.build_or_share_alpha_memory(&c0()).unwrap();
    assert_eq!(network.alpha_memory(am0).unwrap().successors, vec![shared_join]);
    assert_eq!(network.alpha_memory_for(&Pattern::new(Term::var("a"), "on", Term::var("b"))), Some(am0));
}

#[test]
fn test_variable_repeated_across_patterns_of_one_fact() {
    init_tracing();
    let mut network = ReteNetwork::new();
    network
        .add_production(
            Production::builder(1, "self red")
                .when(x(), "self", y())
                .when(x(), "color", "red")
                .when(y(), "color", "red")
                .build(),
        )
        .unwrap();
    network.add_wme(Wme::new("B1", "self", "B1")).unwrap();
    network.add_wme(Wme::new("B1", "color", "red")).unwrap();

    assert_eq!(network.match_count(1).unwrap(), 1);
    let wmes = activation_wmes(&network, 1).remove(0);
    assert_eq!(wmes[1], wmes[2]);
}

#[test]
fn test_variable_repeated_inside_one_pattern() {
    init_tracing();
    let mut network = ReteNetwork::new();
    network.add_production(Production::builder(1, "loop").when(x(), "self", x()).build()).unwrap();
    network.add_wme(Wme::new("B1", "self", "B1")).unwrap();
    network.add_wme(Wme::new("B1", "self", "B2")).unwrap();

    assert_eq!(activation_wmes(&network, 1), vec![vec![Some(Wme::new("B1", "self", "B1"))]]);
}

#[test]
fn test_matches_are_restartable_and_serializable() {
    init_tracing();
    let mut network = ReteNetwork::new();
    network.add_production(three_blocks(1)).unwrap();
    assert_all(&mut network, &block_world());

    let first: Vec<MatchRecord> = network.matches().collect();
    let second: Vec<MatchRecord> = network.matches().collect();
    assert_eq!(first, second);
    assert_eq!(first.len(), 1);

    let json = serde_json::to_value(&first[0]).unwrap();
    assert_eq!(json["production"], 1);
    let restored: MatchRecord = serde_json::from_value(json).unwrap();
    assert_eq!(restored, first[0]);
}
