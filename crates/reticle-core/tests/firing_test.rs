/// Recognize-Act Integration Test
///
/// Firing activations, actions that change working memory, cycle limits and
/// configuration loading.
mod common;

use common::*;
use reticle_core::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

fn x() -> Term {
    Term::var("x")
}

fn y() -> Term {
    Term::var("y")
}

/// (?x ^on ?y) => assert (?y ^under ?x)
fn mirror_on(id: ProductionId) -> Production {
    Production::builder(id, "mirror on")
        .when(x(), "on", y())
        .then(|network, bindings| {
            network.add_wme(Wme::new(bindings["y"].clone(), "under", bindings["x"].clone()))?;
            Ok(())
        })
        .build()
}

#[test]
fn test_run_fires_until_quiescence() {
    init_tracing();
    let mut network = ReteNetwork::new();
    network.add_production(mirror_on(1)).unwrap();
    network.add_production(Production::builder(2, "under").when(x(), "under", y()).build()).unwrap();
    network.add_wme(Wme::new("B1", "on", "B2")).unwrap();
    network.add_wme(Wme::new("B1", "on", "B3")).unwrap();

    let fired = network.run(None).unwrap();
    assert_eq!(fired, 4);
    assert!(network.contains_wme(&Wme::new("B2", "under", "B1")));
    assert!(network.contains_wme(&Wme::new("B3", "under", "B1")));
    assert_eq!(network.match_count(2).unwrap(), 2);
    assert_eq!(network.pop_new_activation(), None);

    let stats = network.stats();
    assert_eq!(stats.activations_created, 4);
    assert_eq!(stats.activations_fired, 4);
    assert_eq!(stats.pending_activations, 0);
}

#[test]
fn test_pop_order_follows_registration_then_arrival() {
    init_tracing();
    let mut network = ReteNetwork::new();
    network.add_production(Production::builder(1, "first").when(x(), "color", "red").build()).unwrap();
    network.add_production(Production::builder(2, "second").when(x(), "color", y()).build()).unwrap();
    network.add_wme(Wme::new("B1", "color", "red")).unwrap();
    network.add_wme(Wme::new("B2", "color", "red")).unwrap();

    let order: Vec<ProductionId> = std::iter::from_fn(|| network.pop_new_activation()).map(|a| a.production).collect();
    assert_eq!(order, vec![1, 1, 2, 2]);
    // popped activations are still matches
    assert_eq!(network.match_count(1).unwrap(), 2);
}

#[test]
fn test_run_limit_and_configured_cycles() {
    init_tracing();
    let counter = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&counter);
    let production = Production::builder(1, "count").when(x(), "on", y()).then(move |_, _| {
        seen.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    let config = NetworkConfig::default().with_max_run_cycles(Some(2));
    let mut network = ReteNetwork::with_config(config).unwrap();
    network.add_production(production.build()).unwrap();
    assert_all(&mut network, &block_world());

    assert_eq!(network.run(Some(1)).unwrap(), 1);
    assert_eq!(network.run(None).unwrap(), 2);
    assert_eq!(network.run(Some(10)).unwrap(), 1);
    assert_eq!(counter.load(Ordering::SeqCst), 4);
}

#[test]
fn test_actions_can_cycle_with_a_limit() {
    init_tracing();
    let mut network = ReteNetwork::new();
    let light = Term::var("light");
    network
        .add_production(
            Production::builder(1, "make green")
                .when(light.clone(), "color", "red")
                .then(|network, bindings| {
                    network.remove_wme(&Wme::new(bindings["light"].clone(), "color", "red"))?;
                    network.add_wme(Wme::new(bindings["light"].clone(), "color", "green"))?;
                    Ok(())
                })
                .build(),
        )
        .unwrap();
    network
        .add_production(
            Production::builder(2, "make red")
                .when(light, "color", "green")
                .then(|network, bindings| {
                    network.remove_wme(&Wme::new(bindings["light"].clone(), "color", "green"))?;
                    network.add_wme(Wme::new(bindings["light"].clone(), "color", "red"))?;
                    Ok(())
                })
                .build(),
        )
        .unwrap();
    network.add_fact("L1", "color", "red").unwrap();

    assert_eq!(network.run(Some(5)).unwrap(), 5);
    assert!(network.contains_wme(&Wme::new("L1", "color", "green")));
    assert!(!network.contains_wme(&Wme::new("L1", "color", "red")));
    assert_eq!(network.match_count(2).unwrap(), 1);
}

#[test]
fn test_firing_a_retracted_match_is_stale() {
    init_tracing();
    let mut network = ReteNetwork::new();
    network.add_production(mirror_on(1)).unwrap();
    network.add_wme(Wme::new("B1", "on", "B2")).unwrap();

    let activation = network.activations().next().unwrap().id();
    network.remove_wme(&Wme::new("B1", "on", "B2")).unwrap();

    let error = network.fire(activation).unwrap_err();
    assert!(matches!(error, ReteError::StaleActivation { production_id: 1, .. }));
    assert!(!network.contains_wme(&Wme::new("B2", "under", "B1")));
}

#[test]
fn test_fire_by_id_removes_from_new_queue() {
    init_tracing();
    let mut network = ReteNetwork::new();
    network.add_production(mirror_on(1)).unwrap();
    network.add_wme(Wme::new("B1", "on", "B2")).unwrap();

    let activation = network.activations_for(1).unwrap()[0].id();
    network.fire(activation).unwrap();
    assert!(network.contains_wme(&Wme::new("B2", "under", "B1")));
    assert_eq!(network.new_activation_count(), 0);

    // firing again is allowed while the match holds
    network.fire(activation).unwrap();
    assert_eq!(network.stats().activations_fired, 2);
}

#[test]
fn test_failing_action_is_reported_with_production() {
    init_tracing();
    let mut network = ReteNetwork::new();
    network
        .add_production(
            Production::builder(7, "fails").when(x(), "on", y()).then(|_, _| Err(anyhow::anyhow!("disk full"))).build(),
        )
        .unwrap();
    network.add_wme(Wme::new("B1", "on", "B2")).unwrap();

    match network.run(None).unwrap_err() {
        ReteError::Procedure { production_id, source_details, .. } => {
            assert_eq!(production_id, Some(7));
            assert_eq!(source_details.as_deref(), Some("disk full"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_config_from_yaml_drives_network() {
    init_tracing();
    let config = NetworkConfig::from_yaml_str("strict_retraction: false\nmax_run_cycles: 1\n").unwrap();
    assert!(config.log_activations == NetworkConfig::default().log_activations);

    let mut network = ReteNetwork::with_config(config).unwrap();
    network.remove_fact("B1", "on", "B2").unwrap();
    network.add_production(Production::builder(1, "on").when(x(), "on", y()).build()).unwrap();
    assert_all(&mut network, &block_world());
    assert_eq!(network.run(None).unwrap(), 1);

    assert!(NetworkConfig::from_yaml_str("max_run_cycles: 0").is_err());
}

#[test]
fn test_network_moves_between_threads() {
    init_tracing();
    let mut network = ReteNetwork::new();
    network.add_production(mirror_on(1)).unwrap();

    let handle = std::thread::spawn(move || {
        network.add_wme(Wme::new("B1", "on", "B2")).unwrap();
        network.run(None).unwrap();
        network
    });
    let network = handle.join().unwrap();
    assert!(network.contains_wme(&Wme::new("B2", "under", "B1")));
}
