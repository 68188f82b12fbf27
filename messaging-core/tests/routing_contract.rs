/********************************************************************************
 * Copyright (c) 2024 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

mod support;

use futures::future::join_all;
use integration_test_utils::{RecordingStubFactory, TransmitBehavior};
use messaging_core::{Address, AddressKind, RouterConfig, RoutingError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use support::{fast_retry_config, make_router, request_to};

fn mqtt(topic: &str) -> Address {
    Address::mqtt("tcp://broker:1883", topic)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_first_use_creates_a_single_stub() {
    let factory = Arc::new(RecordingStubFactory::new().with_creation_delay(Duration::from_millis(20)));
    let router = make_router(fast_retry_config(), AddressKind::Mqtt, factory.clone());
    router.add_next_hop("provider", mqtt("provider"), false);

    let routes = (0..32).map(|_| {
        let router = router.clone();
        tokio::spawn(async move { router.route(request_to("provider", Duration::from_secs(5))).await })
    });
    let results = join_all(routes).await;

    for result in results {
        assert_eq!(result.expect("route task should not panic"), Ok(()));
    }
    assert_eq!(factory.creation_count(), 1);
    let stub = factory.stub(&mqtt("provider")).expect("stub was created");
    assert_eq!(stub.attempts(), 32);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn detached_routes_complete_exactly_once_for_every_outcome() {
    let cases = vec![
        (vec![TransmitBehavior::Succeed], true),
        (
            vec![TransmitBehavior::FailRecoverable {
                delay: Some(Duration::from_millis(5)),
            }],
            true,
        ),
        (vec![TransmitBehavior::FailPermanent], false),
        (vec![TransmitBehavior::FailUnclassified], false),
        (vec![TransmitBehavior::DropCompletion], false),
    ];

    for (script, expect_success) in cases {
        let factory = Arc::new(RecordingStubFactory::new().with_script(script.clone()));
        let router = make_router(fast_retry_config(), AddressKind::Mqtt, factory);
        router.add_next_hop("provider", mqtt("provider"), false);

        let calls = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = tokio::sync::oneshot::channel();
        let tx = Arc::new(Mutex::new(Some(tx)));
        {
            let calls = calls.clone();
            router.route_detached(request_to("provider", Duration::from_secs(2)), move |result| {
                calls.fetch_add(1, Ordering::SeqCst);
                if let Some(tx) = tx.lock().expect("lock").take() {
                    let _ = tx.send(result);
                }
            });
        }

        let result = tokio::time::timeout(Duration::from_secs(3), rx)
            .await
            .expect("callback should fire before the deadline")
            .expect("callback sender alive");
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(result.is_ok(), expect_success, "script {script:?}");
        assert_eq!(calls.load(Ordering::SeqCst), 1, "script {script:?}");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn no_retry_happens_after_the_deadline() {
    let always_down = vec![TransmitBehavior::FailRecoverable { delay: None }; 1_000];
    let factory = Arc::new(RecordingStubFactory::new().with_script(always_down));
    let router = make_router(fast_retry_config(), AddressKind::Mqtt, factory.clone());
    router.add_next_hop("provider", mqtt("provider"), false);

    let result = router
        .route(request_to("provider", Duration::from_millis(300)))
        .await;

    assert!(matches!(result, Err(RoutingError::Expired { .. })));
    let stub = factory.stub(&mqtt("provider")).expect("stub was created");
    let attempts_at_expiry = stub.attempts();
    assert!(attempts_at_expiry > 1, "recoverable failures are retried");

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(stub.attempts(), attempts_at_expiry);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn readdressing_uses_a_new_stub_and_keeps_the_old_one() {
    let factory = Arc::new(RecordingStubFactory::new());
    let router = make_router(fast_retry_config(), AddressKind::Mqtt, factory.clone());
    let address_a = mqtt("provider-a");
    let address_b = mqtt("provider-b");

    router.add_next_hop("P1", address_a.clone(), false);
    router
        .route(request_to("P1", Duration::from_secs(5)))
        .await
        .expect("route via address A");

    router.add_next_hop("P1", address_b.clone(), false);
    router
        .route(request_to("P1", Duration::from_secs(5)))
        .await
        .expect("route via address B");

    assert_eq!(factory.creations_for(&address_a), 1);
    assert_eq!(factory.creations_for(&address_b), 1);
    assert!(router.has_stub(&address_a));
    assert!(router.has_stub(&address_b));
    assert_eq!(factory.stub(&address_a).expect("stub A").attempts(), 1);
    assert_eq!(factory.stub(&address_b).expect("stub B").attempts(), 1);
}

#[tokio::test]
async fn missing_route_is_not_retried_by_the_router() {
    let factory = Arc::new(RecordingStubFactory::new());
    let router = make_router(fast_retry_config(), AddressKind::Mqtt, factory.clone());

    let first = router
        .route(request_to("late-provider", Duration::from_secs(5)))
        .await;
    assert_eq!(
        first,
        Err(RoutingError::NoRoute {
            participant_id: "late-provider".to_string()
        })
    );
    assert_eq!(factory.creation_count(), 0);

    router.add_next_hop("late-provider", mqtt("late-provider"), false);
    assert_eq!(
        router
            .route(request_to("late-provider", Duration::from_secs(5)))
            .await,
        Ok(())
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn retries_re_resolve_the_next_hop() {
    let factory = Arc::new(RecordingStubFactory::new().with_script(vec![
        TransmitBehavior::FailRecoverable {
            delay: Some(Duration::from_millis(100)),
        },
    ]));
    let router = make_router(fast_retry_config(), AddressKind::Mqtt, factory.clone());
    router.add_next_hop("P1", mqtt("old"), false);

    let pending = {
        let router = router.clone();
        tokio::spawn(async move { router.route(request_to("P1", Duration::from_secs(5))).await })
    };
    tokio::time::sleep(Duration::from_millis(30)).await;
    router.add_next_hop("P1", mqtt("new"), false);

    assert_eq!(pending.await.expect("route task"), Ok(()));
    assert_eq!(factory.stub(&mqtt("old")).expect("old stub").attempts(), 1);
    // Every stub starts with the scripted failure, so the new hop needs a second attempt.
    assert_eq!(factory.stub(&mqtt("new")).expect("new stub").attempts(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn routing_table_cleaner_purges_expired_entries() {
    let factory = Arc::new(RecordingStubFactory::new());
    let router = make_router(
        RouterConfig {
            routing_table_cleanup_interval_ms: 20,
            ..fast_retry_config()
        },
        AddressKind::Mqtt,
        factory,
    );

    router.add_next_hop_with(
        "short-lived",
        mqtt("short-lived"),
        messaging_core::RoutingEntryOptions {
            expiry: messaging_core::ExpiryDate::from_now(Duration::from_millis(50)),
            ..Default::default()
        },
    );
    router.add_next_hop("long-lived", mqtt("long-lived"), false);

    tokio::time::sleep(Duration::from_millis(250)).await;

    assert!(!router.resolve_next_hop("short-lived"));
    assert!(router.resolve_next_hop("long-lived"));
    router.shutdown();
}
