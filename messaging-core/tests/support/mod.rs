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

use integration_test_utils::{init_logging, RecordingStubFactory};
use messaging_core::{
    AddressKind, Message, MessageRouter, MessageType, RouterConfig, StubFactoryRegistry,
};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;

/// Router config with short retry delays and no background cleaner.
#[allow(dead_code)]
pub(crate) fn fast_retry_config() -> RouterConfig {
    RouterConfig {
        send_msg_retry_interval_ms: 10,
        max_retry_delay_ms: 50,
        routing_table_cleanup_interval_ms: 0,
        ..RouterConfig::default()
    }
}

#[allow(dead_code)]
pub(crate) fn make_router(
    config: RouterConfig,
    kind: AddressKind,
    factory: Arc<RecordingStubFactory>,
) -> MessageRouter {
    init_logging();
    let registry = Arc::new(StubFactoryRegistry::new());
    registry.register(kind, factory);
    MessageRouter::new(&config, registry, Handle::current())
}

#[allow(dead_code)]
pub(crate) fn request_to(recipient: &str, ttl: Duration) -> Message {
    Message::builder(MessageType::Request, "consumer", recipient)
        .ttl(ttl)
        .build()
}

/// Polls `condition` until it holds or `timeout` elapses.
#[allow(dead_code)]
pub(crate) async fn wait_until<F, Fut>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition().await
}
