//! Concurrency stress tests for last-seat and role-cap races.
//!
//! These tests verify that under heavy concurrent load the coordinator never
//! overbooks a role, never lets a user exceed the role cap, and never exposes
//! a half-applied move. The same holds for several coordinators sharing one
//! store, as server processes sharing a database do.
//!
//! Run with: `cargo test -p signup-registration --test concurrency_stress_test -- --nocapture`

#![allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect

use futures::future::join_all;
use signup_core::types::{Event, MAX_ROLES_PER_USER};
use signup_registration::{
    InMemoryRegistrationStore, RegistrationCoordinator, RegistrationError, RegistrationStore,
};
use signup_testing::{EventFixture, RecordingEventBus, actors, test_clock};
use std::sync::Arc;

fn coordinator() -> Arc<RegistrationCoordinator> {
    coordinator_over(Arc::new(InMemoryRegistrationStore::new()))
}

fn coordinator_over(store: Arc<dyn RegistrationStore>) -> Arc<RegistrationCoordinator> {
    Arc::new(RegistrationCoordinator::new(
        store,
        Arc::new(RecordingEventBus::new()),
        Arc::new(test_clock()),
    ))
}

/// Two coordinators over one store; each has its own event locks.
fn coordinator_pair() -> [Arc<RegistrationCoordinator>; 2] {
    let store: Arc<dyn RegistrationStore> = Arc::new(InMemoryRegistrationStore::new());
    [coordinator_over(Arc::clone(&store)), coordinator_over(store)]
}

async fn create_event(coordinator: &RegistrationCoordinator, roles: &[(&str, u32)]) -> Event {
    let clock = test_clock();
    let fixture = roles
        .iter()
        .fold(EventFixture::new(&clock), |fixture, (name, capacity)| {
            fixture.role(name, *capacity)
        });
    coordinator
        .create_event(&actors::admin(), fixture.draft())
        .await
        .unwrap()
}

/// Test: 100 concurrent signups from distinct users for 1 seat.
///
/// Verifies that exactly 1 succeeds and the other 99 fail with `RoleFull`.
#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_last_seat_concurrency_100_requests() {
    let coordinator = coordinator();
    let event = create_event(&coordinator, &[("Last Seat", 1)]).await;
    let role_id = event.roles[0].id;

    let handles: Vec<_> = (0..100)
        .map(|_| {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move {
                coordinator
                    .sign_up(&actors::participant(), event.id, role_id)
                    .await
            })
        })
        .collect();
    let results: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let successes = results.iter().filter(|result| result.is_ok()).count();
    let role_full = results
        .iter()
        .filter(|result| matches!(result, Err(RegistrationError::RoleFull { .. })))
        .count();
    println!("  ✓ {successes} succeeded, {role_full} rejected as full");

    assert_eq!(successes, 1, "exactly one signup must win the last seat");
    assert_eq!(role_full, 99);
    let ledger = coordinator.ledger(event.id).await.unwrap();
    assert_eq!(ledger.registered(&role_id), 1);
}

/// Test: two distinct users race for a single seat.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_two_users_one_seat() {
    let coordinator = coordinator();
    let event = create_event(&coordinator, &[("Solo", 1)]).await;
    let role_id = event.roles[0].id;

    let first_actor = actors::participant();
    let second_actor = actors::participant();
    let (first, second) = tokio::join!(
        coordinator.sign_up(&first_actor, event.id, role_id),
        coordinator.sign_up(&second_actor, event.id, role_id),
    );

    let outcomes = [first, second];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(
        outcomes
            .iter()
            .filter(|r| matches!(r, Err(RegistrationError::RoleFull { .. })))
            .count(),
        1
    );
}

/// Test: one user signs up for 8 roles at once.
///
/// All requests pass the lock-free fast path together; the cap must still
/// hold once they are serialized.
#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_role_cap_under_concurrent_signups() {
    let coordinator = coordinator();
    let roles: Vec<(String, u32)> = (0..8).map(|i| (format!("Role {i}"), 10)).collect();
    let role_refs: Vec<(&str, u32)> = roles.iter().map(|(n, c)| (n.as_str(), *c)).collect();
    let event = create_event(&coordinator, &role_refs).await;
    let volunteer = actors::participant();

    let handles: Vec<_> = event
        .roles
        .iter()
        .map(|role| {
            let coordinator = Arc::clone(&coordinator);
            let volunteer = volunteer.clone();
            let (event_id, role_id) = (event.id, role.id);
            tokio::spawn(async move { coordinator.sign_up(&volunteer, event_id, role_id).await })
        })
        .collect();
    let results: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let successes = results.iter().filter(|result| result.is_ok()).count();
    assert_eq!(successes, MAX_ROLES_PER_USER as usize);
    assert!(results
        .iter()
        .filter(|result| result.is_err())
        .all(|result| matches!(result, Err(RegistrationError::RoleCapExceeded))));

    let ledger = coordinator.ledger(event.id).await.unwrap();
    assert_eq!(ledger.roles_held(&volunteer.id), MAX_ROLES_PER_USER);
}

/// Test: registrations bounce between two roles while a reader samples the
/// ledger. Every sample must account for every registration exactly once.
#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_moves_are_never_observed_half_applied() {
    let coordinator = coordinator();
    let event = create_event(&coordinator, &[("Left", 10), ("Right", 10)]).await;
    let (left, right) = (event.roles[0].id, event.roles[1].id);

    let mut movers = Vec::new();
    for _ in 0..5 {
        let volunteer = actors::participant();
        let registration = coordinator
            .sign_up(&volunteer, event.id, left)
            .await
            .unwrap();
        movers.push((volunteer, registration.id));
    }

    let move_tasks: Vec<_> = movers
        .into_iter()
        .map(|(volunteer, registration_id)| {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move {
                for round in 0..20 {
                    let target = if round % 2 == 0 { right } else { left };
                    coordinator
                        .move_registration(&volunteer, registration_id, target)
                        .await
                        .unwrap();
                }
            })
        })
        .collect();

    let reader = {
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move {
            for _ in 0..200 {
                let ledger = coordinator.ledger(event.id).await.unwrap();
                assert_eq!(ledger.registered(&left) + ledger.registered(&right), 5);
                tokio::task::yield_now().await;
            }
        })
    };

    for task in join_all(move_tasks).await {
        task.unwrap();
    }
    reader.await.unwrap();

    let ledger = coordinator.ledger(event.id).await.unwrap();
    assert_eq!(ledger.registered(&left), 5);
    assert_eq!(ledger.registered(&right), 0);
}

/// Test: signups against different events proceed independently.
#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_independent_events_fill_in_parallel() {
    let coordinator = coordinator();
    let mut events = Vec::new();
    for _ in 0..10 {
        events.push(create_event(&coordinator, &[("Seat", 5)]).await);
    }

    let handles: Vec<_> = events
        .iter()
        .flat_map(|event| {
            let coordinator = Arc::clone(&coordinator);
            let (event_id, role_id) = (event.id, event.roles[0].id);
            (0..8).map(move |_| {
                let coordinator = Arc::clone(&coordinator);
                tokio::spawn(async move {
                    coordinator
                        .sign_up(&actors::participant(), event_id, role_id)
                        .await
                })
            })
        })
        .collect();
    join_all(handles).await;

    for event in &events {
        let ledger = coordinator.ledger(event.id).await.unwrap();
        assert_eq!(ledger.registered(&event.roles[0].id), 5);
    }
}

/// Test: 60 signups for 3 seats, split across two coordinators that share a
/// store but not their locks.
#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_coordinators_sharing_a_store_never_overbook() {
    let coordinators = coordinator_pair();
    let event = create_event(&coordinators[0], &[("Shared", 3)]).await;
    let role_id = event.roles[0].id;

    let handles: Vec<_> = (0..60)
        .map(|i| {
            let coordinator = Arc::clone(&coordinators[i % 2]);
            tokio::spawn(async move {
                coordinator
                    .sign_up(&actors::participant(), event.id, role_id)
                    .await
            })
        })
        .collect();
    let results: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    assert_eq!(results.iter().filter(|result| result.is_ok()).count(), 3);
    assert!(results
        .iter()
        .filter(|result| result.is_err())
        .all(|result| matches!(result, Err(RegistrationError::RoleFull { .. }))));
    for coordinator in &coordinators {
        let ledger = coordinator.ledger(event.id).await.unwrap();
        assert_eq!(ledger.registered(&role_id), 3);
    }
}

/// Test: one user grabs 8 roles through two coordinators at once.
#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_role_cap_holds_across_coordinators() {
    let coordinators = coordinator_pair();
    let roles: Vec<(String, u32)> = (0..8).map(|i| (format!("Role {i}"), 10)).collect();
    let role_refs: Vec<(&str, u32)> = roles.iter().map(|(n, c)| (n.as_str(), *c)).collect();
    let event = create_event(&coordinators[0], &role_refs).await;
    let volunteer = actors::participant();

    let handles: Vec<_> = event
        .roles
        .iter()
        .enumerate()
        .map(|(i, role)| {
            let coordinator = Arc::clone(&coordinators[i % 2]);
            let volunteer = volunteer.clone();
            let (event_id, role_id) = (event.id, role.id);
            tokio::spawn(async move { coordinator.sign_up(&volunteer, event_id, role_id).await })
        })
        .collect();
    let results: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    assert_eq!(
        results.iter().filter(|result| result.is_ok()).count(),
        MAX_ROLES_PER_USER as usize
    );
    assert!(results
        .iter()
        .filter(|result| result.is_err())
        .all(|result| matches!(result, Err(RegistrationError::RoleCapExceeded))));
}
