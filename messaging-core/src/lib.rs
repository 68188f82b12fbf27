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

//! # messaging-core
//!
//! `messaging-core` is the routing and subscription engine of a pub/sub and RPC
//! messaging middleware. Transports plug in through [`MessagingStubFactory`] (outbound)
//! and [`MessagingSkeleton`] (inbound); the core decides which stub carries a message,
//! retries transient failures until the message deadline, and tracks subscriptions
//! including missed-publication detection and expiry.
//!
//! ## Routing a message
//!
//! ```
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use messaging_core::{
//!     Address, AddressKind, InProcessMessagingStubFactory, Message, MessageReceiver,
//!     MessageRouter, MessageType, MessagingConfig, SchedulerRuntime, StubFactoryRegistry,
//! };
//!
//! struct Provider;
//!
//! #[async_trait]
//! impl MessageReceiver for Provider {
//!     async fn on_message(&self, message: Message) {
//!         assert_eq!(message.payload, b"ping".to_vec());
//!     }
//! }
//!
//! let config = MessagingConfig::default();
//! let scheduler = SchedulerRuntime::spawn(
//!     &config.scheduler.thread_name,
//!     config.scheduler.worker_threads,
//! )
//! .unwrap();
//!
//! let in_process = Arc::new(InProcessMessagingStubFactory::new(scheduler.handle().clone()));
//! in_process.register_receiver("provider", Arc::new(Provider));
//!
//! let factories = Arc::new(StubFactoryRegistry::new());
//! factories.register(AddressKind::InProcess, in_process);
//!
//! let router = MessageRouter::new(&config.router, factories, scheduler.handle().clone());
//! router.add_next_hop("provider", Address::in_process("provider"), false);
//!
//! let message = Message::builder(MessageType::OneWay, "consumer", "provider")
//!     .ttl(std::time::Duration::from_secs(5))
//!     .payload(b"ping".to_vec())
//!     .build();
//! scheduler
//!     .handle()
//!     .block_on(router.route(message))
//!     .unwrap();
//!
//! router.shutdown();
//! scheduler.shutdown();
//! ```
//!
//! ## Subscriptions
//!
//! [`SubscriptionManager`] owns every subscription as one entry holding the listener,
//! the payload metadata, an atomically touched last-publication timestamp and the
//! cancellation token shared by its expiry task and missed-publication timer.
//! Unregistration, expiry, provider errors and shutdown converge on one cleanup that
//! runs at most once per subscription.
//!
//! ## Internal architecture map
//!
//! - Data model: addresses, message envelope, expiry dates
//! - Messaging: stub, stub factory and skeleton contracts plus in-process delivery
//! - Routing: routing table, stub cache, retry policy and the message router
//! - Subscription: QoS, listeners, state, missed-publication timer and manager
//! - Dispatcher: inbound entry point skeletons feed
//! - Runtime: the shared scheduled-task runtime thread
//!
//! ## Observability model
//!
//! The workspace uses `tracing` for logs/events.
//! Library code emits events and does not initialize a global subscriber.
//! Binaries and tests are responsible for one-time `tracing_subscriber`
//! initialization at process boundaries.

mod address;
pub use address::{
    Address, AddressKind, BinderAddress, ChannelAddress, InProcessAddress, MqttAddress,
    WebSocketAddress, WebSocketClientAddress, WebSocketProtocol,
};

mod config;
pub use config::{ConfigError, MessagingConfig, RouterConfig, SchedulerConfig, StaticRoute};

mod dispatcher;
pub use dispatcher::InboundDispatcher;

mod expiry;
pub use expiry::{current_time_millis, ExpiryDate};

mod message;
pub use message::{Message, MessageBuilder, MessageType};

mod messaging;
pub use messaging::in_process::{InProcessMessagingStub, InProcessMessagingStubFactory};
pub use messaging::skeleton::{
    ChannelMessagingSkeleton, InboundFrame, MessageReceiver, MessagingSkeleton, SkeletonError,
};
pub use messaging::stub::{MessagingStub, TransmitCompletion, TransmitError, TransmitResult};
pub use messaging::stub_factory::{MessagingStubFactory, StubFactoryError, StubFactoryRegistry};

#[doc(hidden)]
pub mod observability;

mod routing;
pub use routing::message_router::{MessageProcessedListener, MessageRouter};
pub use routing::routing_table::{RoutingEntry, RoutingEntryOptions, RoutingTable};
pub use routing::RoutingError;

mod runtime;
pub use runtime::SchedulerRuntime;

mod subscription;
pub use subscription::listener::{
    AttributeSubscriptionListener, BroadcastSubscriptionListener, SubscriptionListener,
};
pub use subscription::qos::SubscriptionQos;
pub use subscription::state::SubscriptionState;
pub use subscription::subscription_manager::SubscriptionManager;
pub use subscription::SubscriptionError;
