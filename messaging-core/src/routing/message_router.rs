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

//! Outbound message router.
//!
//! A routed message walks through: resolve the recipient's address, obtain the stub
//! cached for that address (building it through the factory registry on first use),
//! hand the message to the stub and await its completion. Recoverable failures are
//! retried with the address re-resolved on each attempt, so a next hop updated in the
//! meantime is honoured. The message deadline bounds every wait.

use crate::address::Address;
use crate::config::RouterConfig;
use crate::expiry::current_time_millis;
use crate::message::Message;
use crate::messaging::stub::{TransmitCompletion, TransmitError, TransmitResult};
use crate::messaging::stub_factory::StubFactoryRegistry;
use crate::observability::{events, fields};
use crate::routing::backoff::RetryPolicy;
use crate::routing::routing_table::{RoutingEntryOptions, RoutingTable};
use crate::routing::stub_cache::StubCache;
use crate::routing::RoutingError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Level};

const COMPONENT: &str = "message_router";

/// Observer notified once per routed message when its processing finished.
pub trait MessageProcessedListener: Send + Sync {
    fn message_processed(&self, message_id: &str);
}

struct RouterInner {
    routing_table: RoutingTable,
    stub_cache: StubCache,
    factories: Arc<StubFactoryRegistry>,
    retry_policy: RetryPolicy,
    runtime: Handle,
    processed_listeners: RwLock<Vec<Arc<dyn MessageProcessedListener>>>,
    shut_down: AtomicBool,
    stop: CancellationToken,
}

impl Drop for RouterInner {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}

/// Callback of a detached route. If the task is dropped before finishing, for
/// instance when its runtime shuts down, the callback receives `Shutdown`.
struct DetachedCompletion<F>
where
    F: FnOnce(Result<(), RoutingError>),
{
    on_done: Option<F>,
}

impl<F> DetachedCompletion<F>
where
    F: FnOnce(Result<(), RoutingError>),
{
    fn new(on_done: F) -> Self {
        Self {
            on_done: Some(on_done),
        }
    }

    fn complete(mut self, result: Result<(), RoutingError>) {
        if let Some(on_done) = self.on_done.take() {
            on_done(result);
        }
    }
}

impl<F> Drop for DetachedCompletion<F>
where
    F: FnOnce(Result<(), RoutingError>),
{
    fn drop(&mut self) {
        if let Some(on_done) = self.on_done.take() {
            warn!(
                event = events::ROUTE_DETACHED_ABANDONED,
                component = COMPONENT,
                "detached route dropped before completion"
            );
            on_done(Err(RoutingError::Shutdown));
        }
    }
}

/// Shared handle to the router; clones address the same routing state.
#[derive(Clone)]
pub struct MessageRouter {
    inner: Arc<RouterInner>,
}

impl MessageRouter {
    /// Builds a router, pins the configured static routes and starts the routing-table
    /// cleaner on `runtime` when enabled.
    pub fn new(config: &RouterConfig, factories: Arc<StubFactoryRegistry>, runtime: Handle) -> Self {
        let router = Self {
            inner: Arc::new(RouterInner {
                routing_table: RoutingTable::new(),
                stub_cache: StubCache::new(),
                factories,
                retry_policy: RetryPolicy::from_config(config),
                runtime,
                processed_listeners: RwLock::new(Vec::new()),
                shut_down: AtomicBool::new(false),
                stop: CancellationToken::new(),
            }),
        };

        for route in &config.static_routes {
            router.add_next_hop_with(
                &route.participant_id,
                route.address.clone(),
                RoutingEntryOptions {
                    is_globally_visible: route.is_globally_visible,
                    is_sticky: true,
                    ..RoutingEntryOptions::default()
                },
            );
        }

        if config.routing_table_cleanup_interval_ms > 0 {
            router.start_routing_table_cleaner(Duration::from_millis(
                config.routing_table_cleanup_interval_ms,
            ));
        }

        router
    }

    fn start_routing_table_cleaner(&self, interval: Duration) {
        let weak: Weak<RouterInner> = Arc::downgrade(&self.inner);
        let stop = self.inner.stop.clone();
        self.inner.runtime.spawn(async move {
            loop {
                tokio::select! {
                    _ = stop.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {}
                }
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                inner.routing_table.purge_expired(current_time_millis());
            }
        });
    }

    /// Inserts or replaces a non-sticky next hop. Last call wins.
    pub fn add_next_hop(&self, participant_id: &str, address: Address, is_globally_visible: bool) {
        self.add_next_hop_with(
            participant_id,
            address,
            RoutingEntryOptions {
                is_globally_visible,
                ..RoutingEntryOptions::default()
            },
        );
    }

    /// Inserts a next hop with explicit stickiness and expiry.
    ///
    /// Returns `false` when a sticky entry blocked a non-sticky update.
    pub fn add_next_hop_with(
        &self,
        participant_id: &str,
        address: Address,
        options: RoutingEntryOptions,
    ) -> bool {
        self.inner.routing_table.put(participant_id, address, options)
    }

    pub fn remove_next_hop(&self, participant_id: &str) {
        self.inner.routing_table.remove(participant_id);
    }

    /// Reports whether `participant_id` currently has a next hop.
    pub fn resolve_next_hop(&self, participant_id: &str) -> bool {
        self.inner.routing_table.contains(participant_id)
    }

    pub fn lookup(&self, participant_id: &str) -> Option<Address> {
        self.inner.routing_table.lookup(participant_id)
    }

    pub fn routing_table(&self) -> &RoutingTable {
        &self.inner.routing_table
    }

    /// Explicitly evicts the stub cached for `address`.
    pub fn remove_stub(&self, address: &Address) -> bool {
        self.inner.stub_cache.remove(address)
    }

    pub fn has_stub(&self, address: &Address) -> bool {
        self.inner.stub_cache.contains(address)
    }

    pub fn add_message_processed_listener(&self, listener: Arc<dyn MessageProcessedListener>) {
        let mut listeners = match self.inner.processed_listeners.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        listeners.push(listener);
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.shut_down.load(Ordering::Acquire)
    }

    /// Delivers `message`, retrying recoverable failures until its deadline.
    pub async fn route(&self, message: Message) -> Result<(), RoutingError> {
        let message = Arc::new(message);
        let result = self.deliver(&message).await;
        self.notify_message_processed(&message.id);
        result
    }

    /// Spawns delivery on the router runtime; `on_done` is invoked exactly once.
    pub fn route_detached<F>(&self, message: Message, on_done: F)
    where
        F: FnOnce(Result<(), RoutingError>) + Send + 'static,
    {
        if self.is_shut_down() {
            self.notify_message_processed(&message.id);
            on_done(Err(RoutingError::Shutdown));
            return;
        }

        let router = self.clone();
        let on_done = DetachedCompletion::new(on_done);
        self.inner.runtime.spawn(async move {
            let result = router.route(message).await;
            on_done.complete(result);
        });
    }

    /// Stops the cleaner, rejects further routing and releases all cached stubs.
    pub fn shutdown(&self) {
        if self.inner.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        self.inner.stop.cancel();
        let released = self.inner.stub_cache.clear();
        info!(
            event = events::ROUTER_SHUTDOWN,
            component = COMPONENT,
            released_stubs = released,
            "message router shut down"
        );
    }

    fn notify_message_processed(&self, message_id: &str) {
        let listeners = match self.inner.processed_listeners.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        for listener in listeners {
            listener.message_processed(message_id);
        }
    }

    async fn deliver(&self, message: &Arc<Message>) -> Result<(), RoutingError> {
        let message_fields = tracing::enabled!(Level::DEBUG)
            .then(|| fields::FormattedMessageFields::from_message(message));
        if let Some(message_fields) = &message_fields {
            debug!(
                event = events::ROUTE_START,
                component = COMPONENT,
                msg_id = %message_fields.msg_id,
                msg_type = message_fields.msg_type,
                sender = %message_fields.sender,
                recipient = %message_fields.recipient,
                reply_to = %fields::format_address(message.reply_to.as_ref()),
                expiry = %message.expiry_date,
                "routing message"
            );
        }

        let mut retries: u32 = 0;
        loop {
            if self.is_shut_down() {
                return Err(RoutingError::Shutdown);
            }

            if message.is_expired() {
                warn!(
                    event = events::ROUTE_EXPIRED,
                    component = COMPONENT,
                    msg_id = message.id.as_str(),
                    retries,
                    "message expired before delivery"
                );
                return Err(RoutingError::Expired {
                    message_id: message.id.clone(),
                });
            }

            let Some(address) = self.inner.routing_table.lookup(&message.recipient) else {
                warn!(
                    event = events::ROUTE_NO_ROUTE,
                    component = COMPONENT,
                    msg_id = message.id.as_str(),
                    recipient = %fields::format_participant(&message.recipient),
                    "no route for recipient"
                );
                return Err(RoutingError::NoRoute {
                    participant_id: message.recipient.clone(),
                });
            };

            let factories = &self.inner.factories;
            let stub = self
                .inner
                .stub_cache
                .get_or_create(&address, |address| factories.create(address))
                .map_err(|err| {
                    warn!(
                        event = events::STUB_CREATE_FAILED,
                        component = COMPONENT,
                        msg_id = message.id.as_str(),
                        address = %address,
                        err = %err,
                        "unable to create messaging stub"
                    );
                    RoutingError::StubCreation(err)
                })?;

            debug!(
                event = events::ROUTE_TRANSMIT_ATTEMPT,
                component = COMPONENT,
                msg_id = message.id.as_str(),
                address = %address,
                retries,
                "handing message to stub"
            );

            let (completion, outcome) = TransmitCompletion::channel();
            stub.transmit(Arc::clone(message), completion);

            let result = match self.await_outcome(message, outcome).await? {
                Ok(()) => {
                    debug!(
                        event = events::ROUTE_TRANSMIT_OK,
                        component = COMPONENT,
                        msg_id = message.id.as_str(),
                        address = %address,
                        retries,
                        "message handed off"
                    );
                    return Ok(());
                }
                Err(err) => err,
            };

            warn!(
                event = events::ROUTE_TRANSMIT_FAILED,
                component = COMPONENT,
                msg_id = message.id.as_str(),
                address = %address,
                retries,
                err = %result,
                "transmit failed"
            );

            let transport_delay = match result {
                TransmitError::Recoverable { delay, .. } => delay,
                permanent => {
                    return Err(RoutingError::PermanentTransport {
                        message_id: message.id.clone(),
                        reason: permanent.reason().to_string(),
                    });
                }
            };

            if self.inner.retry_policy.is_exhausted(retries) {
                warn!(
                    event = events::ROUTE_RETRIES_EXHAUSTED,
                    component = COMPONENT,
                    msg_id = message.id.as_str(),
                    retries,
                    "giving up after retry cap"
                );
                return Err(RoutingError::RetriesExhausted {
                    message_id: message.id.clone(),
                    retries,
                });
            }

            let mut delay = self.inner.retry_policy.delay_for(retries, transport_delay);
            if let Some(remaining) = message.expiry_date.remaining() {
                delay = delay.min(remaining);
            }
            retries = retries.saturating_add(1);

            debug!(
                event = events::ROUTE_RETRY_SCHEDULED,
                component = COMPONENT,
                msg_id = message.id.as_str(),
                retries,
                delay_ms = delay.as_millis() as u64,
                "retry scheduled"
            );

            tokio::select! {
                _ = self.inner.stop.cancelled() => return Err(RoutingError::Shutdown),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Waits for the stub's completion, bounded by the message deadline.
    ///
    /// A completion dropped without being resolved counts as an unclassified failure.
    async fn await_outcome(
        &self,
        message: &Message,
        outcome: tokio::sync::oneshot::Receiver<TransmitResult>,
    ) -> Result<TransmitResult, RoutingError> {
        let received = match message.expiry_date.remaining() {
            None => outcome.await,
            Some(remaining) => match tokio::time::timeout(remaining, outcome).await {
                Ok(received) => received,
                Err(_) => {
                    warn!(
                        event = events::ROUTE_EXPIRED,
                        component = COMPONENT,
                        msg_id = message.id.as_str(),
                        "deadline passed while awaiting transmit completion"
                    );
                    return Err(RoutingError::Expired {
                        message_id: message.id.clone(),
                    });
                }
            },
        };

        Ok(received.unwrap_or_else(|_| {
            warn!(
                event = events::ROUTE_CALLBACK_DROPPED,
                component = COMPONENT,
                msg_id = message.id.as_str(),
                "stub dropped the transmit completion"
            );
            Err(TransmitError::Unclassified {
                reason: "transmit completion dropped".to_string(),
            })
        }))
    }
}
