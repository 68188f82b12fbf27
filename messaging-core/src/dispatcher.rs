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

//! Inbound entry point shared by all skeletons.

use crate::message::{Message, MessageType};
use crate::messaging::skeleton::MessageReceiver;
use crate::observability::{events, fields};
use crate::routing::message_router::MessageRouter;
use crate::subscription::subscription_manager::SubscriptionManager;
use async_trait::async_trait;
use tracing::{debug, warn};

const COMPONENT: &str = "inbound_dispatcher";

/// Routes inbound messages to local subscriptions or onward through the router.
///
/// Failures are logged and the message dropped; the inbound side never retries beyond
/// the router's own policy.
#[derive(Clone)]
pub struct InboundDispatcher {
    router: MessageRouter,
    subscriptions: SubscriptionManager,
}

impl InboundDispatcher {
    pub fn new(router: MessageRouter, subscriptions: SubscriptionManager) -> Self {
        Self {
            router,
            subscriptions,
        }
    }

    /// Registers the sender's reply-to address for request types received from global.
    ///
    /// Returns `false` when the message must be dropped.
    fn learn_reply_to(&self, message: &Message) -> bool {
        if !message.received_from_global || !message.message_type.is_request() {
            return true;
        }

        match &message.reply_to {
            Some(reply_to) => {
                debug!(
                    event = events::INBOUND_REPLY_TO_LEARNED,
                    component = COMPONENT,
                    msg_id = message.id.as_str(),
                    sender = %fields::format_participant(&message.sender),
                    address = %reply_to,
                    "learned reply-to address"
                );
                self.router.add_next_hop(&message.sender, reply_to.clone(), true);
                true
            }
            None => {
                warn!(
                    event = events::INBOUND_DROP_MISSING_REPLY_TO,
                    component = COMPONENT,
                    msg_id = message.id.as_str(),
                    msg_type = message.message_type.as_str(),
                    sender = %fields::format_participant(&message.sender),
                    "dropping global request without reply-to address"
                );
                false
            }
        }
    }

    async fn deliver_publication(&self, subscription_id: &str, payload: Vec<u8>) {
        if self.subscriptions.is_broadcast(subscription_id) {
            self.subscriptions
                .handle_broadcast_publication(subscription_id, payload)
                .await;
        } else {
            self.subscriptions
                .handle_attribute_publication(subscription_id, payload)
                .await;
        }
    }
}

#[async_trait]
impl MessageReceiver for InboundDispatcher {
    async fn on_message(&self, message: Message) {
        if message.is_expired() {
            debug!(
                event = events::INBOUND_DROP_EXPIRED,
                component = COMPONENT,
                msg_id = message.id.as_str(),
                expiry = %message.expiry_date,
                "dropping expired inbound message"
            );
            return;
        }

        if !self.learn_reply_to(&message) {
            return;
        }

        if message.message_type == MessageType::Publication {
            if let Some(subscription_id) = message.subscription_id.as_deref() {
                if self.subscriptions.has_subscription(subscription_id) {
                    let subscription_id = subscription_id.to_string();
                    self.deliver_publication(&subscription_id, message.payload)
                        .await;
                    return;
                }
            }
        }

        let message_id = message.id.clone();
        if let Err(err) = self.router.route(message).await {
            warn!(
                event = events::INBOUND_ROUTE_FAILED,
                component = COMPONENT,
                msg_id = message_id.as_str(),
                err = %err,
                "inbound message could not be routed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::InboundDispatcher;
    use crate::address::{Address, AddressKind};
    use crate::config::RouterConfig;
    use crate::message::{Message, MessageType};
    use crate::messaging::skeleton::MessageReceiver;
    use crate::messaging::stub::{MessagingStub, TransmitCompletion};
    use crate::messaging::stub_factory::{MessagingStubFactory, StubFactoryError, StubFactoryRegistry};
    use crate::routing::message_router::MessageRouter;
    use crate::subscription::listener::AttributeSubscriptionListener;
    use crate::subscription::qos::SubscriptionQos;
    use crate::subscription::subscription_manager::SubscriptionManager;
    use crate::subscription::SubscriptionError;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};
    use tokio::runtime::Handle;

    #[derive(Default)]
    struct CollectingStub {
        sent: Mutex<Vec<String>>,
    }

    impl MessagingStub for CollectingStub {
        fn transmit(&self, message: Arc<Message>, completion: TransmitCompletion) {
            self.sent.lock().expect("lock").push(message.id.clone());
            completion.succeed();
        }
    }

    struct SingleStubFactory(Arc<CollectingStub>);

    impl MessagingStubFactory for SingleStubFactory {
        fn create(&self, _address: &Address) -> Result<Arc<dyn MessagingStub>, StubFactoryError> {
            Ok(self.0.clone())
        }
    }

    #[derive(Default)]
    struct PayloadListener(Mutex<Vec<Vec<u8>>>);

    #[async_trait]
    impl AttributeSubscriptionListener for PayloadListener {
        async fn on_receive(&self, payload: Vec<u8>) {
            self.0.lock().expect("lock").push(payload);
        }

        async fn on_error(&self, _error: SubscriptionError) {}
    }

    fn dispatcher() -> (InboundDispatcher, MessageRouter, SubscriptionManager, Arc<CollectingStub>) {
        let stub = Arc::new(CollectingStub::default());
        let registry = Arc::new(StubFactoryRegistry::new());
        registry.register(AddressKind::Mqtt, Arc::new(SingleStubFactory(stub.clone())));
        let router = MessageRouter::new(
            &RouterConfig {
                routing_table_cleanup_interval_ms: 0,
                ..RouterConfig::default()
            },
            registry,
            Handle::current(),
        );
        let subscriptions = SubscriptionManager::new(Handle::current());
        (
            InboundDispatcher::new(router.clone(), subscriptions.clone()),
            router,
            subscriptions,
            stub,
        )
    }

    #[tokio::test]
    async fn global_request_teaches_reply_to_route() {
        let (dispatcher, router, _subscriptions, stub) = dispatcher();
        router.add_next_hop("provider", Address::mqtt("tcp://b", "provider"), false);

        dispatcher
            .on_message(
                Message::builder(MessageType::Request, "remote-consumer", "provider")
                    .id("req-1")
                    .reply_to(Address::mqtt("tcp://b", "remote-consumer"))
                    .received_from_global(true)
                    .build(),
            )
            .await;

        assert_eq!(
            router.lookup("remote-consumer"),
            Some(Address::mqtt("tcp://b", "remote-consumer"))
        );
        assert_eq!(*stub.sent.lock().expect("lock"), vec!["req-1".to_string()]);
    }

    #[tokio::test]
    async fn global_request_without_reply_to_is_dropped() {
        let (dispatcher, router, _subscriptions, stub) = dispatcher();
        router.add_next_hop("provider", Address::mqtt("tcp://b", "provider"), false);

        dispatcher
            .on_message(
                Message::builder(MessageType::Request, "remote-consumer", "provider")
                    .received_from_global(true)
                    .build(),
            )
            .await;

        assert!(stub.sent.lock().expect("lock").is_empty());
        assert!(!router.resolve_next_hop("remote-consumer"));
    }

    #[tokio::test]
    async fn publication_for_known_subscription_is_delivered_locally() {
        let (dispatcher, _router, subscriptions, stub) = dispatcher();
        let listener = Arc::new(PayloadListener::default());
        let id = subscriptions
            .register_attribute_subscription(
                "speed",
                "f64",
                listener.clone(),
                SubscriptionQos::default(),
            )
            .expect("registration succeeds");

        dispatcher
            .on_message(
                Message::builder(MessageType::Publication, "provider", "consumer")
                    .subscription_id(id)
                    .payload(vec![42])
                    .build(),
            )
            .await;

        assert_eq!(*listener.0.lock().expect("lock"), vec![vec![42]]);
        assert!(stub.sent.lock().expect("lock").is_empty());
    }

    #[tokio::test]
    async fn expired_inbound_message_is_dropped() {
        let (dispatcher, router, _subscriptions, stub) = dispatcher();
        router.add_next_hop("provider", Address::mqtt("tcp://b", "provider"), false);

        dispatcher
            .on_message(
                Message::builder(MessageType::OneWay, "consumer", "provider")
                    .expiry_date(crate::expiry::ExpiryDate::at_millis(1))
                    .build(),
            )
            .await;

        assert!(stub.sent.lock().expect("lock").is_empty());
    }
}
