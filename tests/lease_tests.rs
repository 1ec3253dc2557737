mod common;

use common::{attrs, MemoryBackend};
use leasewall::core::command::{Operation, RuleCommand};
use leasewall::core::config::EngineConfig;
use leasewall::engine::Engine;
use std::sync::Arc;
use std::time::Duration;

// These tests run on tokio's paused clock: sleeps auto-advance virtual time,
// so a "3 second" wait covering the 1s poll granularity is instantaneous
// and deterministic.

#[tokio::test(start_paused = true)]
async fn leased_rule_is_deleted_after_its_lease_elapses() {
    let backend = Arc::new(MemoryBackend::new());
    let engine = Engine::start(Arc::clone(&backend), &EngineConfig::default()).unwrap();
    let handle = engine.handle();

    let rule = attrs(&[("chain", "input"), ("ip", "10.0.0.5")]);
    handle
        .submit(RuleCommand::insert(rule.clone(), Some("1")))
        .unwrap();

    tokio::time::sleep(Duration::from_secs(3)).await;

    let applied = backend.applied();
    assert_eq!(
        applied,
        vec![
            (Operation::Insert, rule.clone()),
            (Operation::Delete, rule.clone()),
        ]
    );

    // The identity is gone from the mirror: re-inserting reaches the firewall
    handle.submit(RuleCommand::insert(rule, None)).unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(backend.apply_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn permanent_rule_outlives_the_expiry_manager_polls() {
    let backend = Arc::new(MemoryBackend::new());
    let engine = Engine::start(Arc::clone(&backend), &EngineConfig::default()).unwrap();
    let handle = engine.handle();

    let rule = attrs(&[("chain", "input"), ("ip", "10.0.0.5")]);
    handle
        .submit(RuleCommand::insert(rule.clone(), Some("0")))
        .unwrap();

    tokio::time::sleep(Duration::from_secs(60)).await;

    assert_eq!(backend.applied(), vec![(Operation::Insert, rule)]);
}

#[tokio::test(start_paused = true)]
async fn lease_expires_no_earlier_than_its_deadline() {
    let backend = Arc::new(MemoryBackend::new());
    let engine = Engine::start(Arc::clone(&backend), &EngineConfig::default()).unwrap();
    let handle = engine.handle();

    let rule = attrs(&[("chain", "input"), ("ip", "10.0.0.5")]);
    handle
        .submit(RuleCommand::insert(rule.clone(), Some("5")))
        .unwrap();

    tokio::time::sleep(Duration::from_secs(4)).await;
    assert_eq!(backend.apply_count(), 1, "lease must not fire early");

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(backend.applied().last().unwrap(), &(Operation::Delete, rule));
}

#[tokio::test(start_paused = true)]
async fn expiry_of_an_already_deleted_rule_is_a_noop() {
    let backend = Arc::new(MemoryBackend::new());
    let engine = Engine::start(Arc::clone(&backend), &EngineConfig::default()).unwrap();
    let handle = engine.handle();

    let rule = attrs(&[("chain", "input"), ("ip", "10.0.0.5")]);
    handle
        .submit(RuleCommand::insert(rule.clone(), Some("5")))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    // Explicit delete beats the lease; the later expiry-driven delete finds
    // the rule already gone and is dropped with a warning
    handle.submit(RuleCommand::delete(rule.clone())).unwrap();
    tokio::time::sleep(Duration::from_secs(10)).await;

    assert_eq!(
        backend.applied(),
        vec![(Operation::Insert, rule.clone()), (Operation::Delete, rule)]
    );
}

#[tokio::test(start_paused = true)]
async fn leases_expire_in_deadline_order() {
    let backend = Arc::new(MemoryBackend::new());
    let engine = Engine::start(Arc::clone(&backend), &EngineConfig::default()).unwrap();
    let handle = engine.handle();

    let slow = attrs(&[("chain", "input"), ("ip", "10.0.0.1")]);
    let fast = attrs(&[("chain", "input"), ("ip", "10.0.0.2")]);
    handle
        .submit(RuleCommand::insert(slow.clone(), Some("4")))
        .unwrap();
    handle
        .submit(RuleCommand::insert(fast.clone(), Some("1")))
        .unwrap();

    tokio::time::sleep(Duration::from_secs(6)).await;

    let deletes: Vec<_> = backend
        .applied()
        .into_iter()
        .filter(|(op, _)| *op == Operation::Delete)
        .collect();
    assert_eq!(
        deletes,
        vec![(Operation::Delete, fast), (Operation::Delete, slow)]
    );
}

#[tokio::test(start_paused = true)]
async fn poll_interval_bounds_expiry_resolution() {
    let backend = Arc::new(MemoryBackend::new());
    let config = EngineConfig {
        default_lease: "0".to_string(),
        poll_interval_secs: 5,
    };
    let engine = Engine::start(Arc::clone(&backend), &config).unwrap();
    let handle = engine.handle();

    let rule = attrs(&[("chain", "input"), ("ip", "10.0.0.5")]);
    handle
        .submit(RuleCommand::insert(rule.clone(), Some("1")))
        .unwrap();

    // Lease elapsed, but the manager has not woken yet
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(backend.apply_count(), 1);

    // First wake at t=5 picks it up
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(backend.applied().last().unwrap(), &(Operation::Delete, rule));
}
