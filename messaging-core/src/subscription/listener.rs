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

//! Application-side subscription callbacks.
//!
//! Payloads are handed over still encoded; the metadata stored with the subscription
//! tells the decoder what they contain.

use crate::subscription::SubscriptionError;
use async_trait::async_trait;
use std::sync::Arc;

/// Receives publications of a subscribed attribute.
#[async_trait]
pub trait AttributeSubscriptionListener: Send + Sync {
    async fn on_receive(&self, payload: Vec<u8>);

    async fn on_error(&self, error: SubscriptionError);

    /// The provider confirmed the subscription.
    async fn on_subscribed(&self, _subscription_id: &str) {}

    /// No publication arrived within the alert interval.
    async fn on_publication_missed(&self) {}
}

/// Receives broadcast events.
#[async_trait]
pub trait BroadcastSubscriptionListener: Send + Sync {
    async fn on_receive(&self, payload: Vec<u8>);

    async fn on_error(&self, error: SubscriptionError);

    async fn on_subscribed(&self, _subscription_id: &str) {}
}

#[derive(Clone)]
pub enum SubscriptionListener {
    Attribute(Arc<dyn AttributeSubscriptionListener>),
    Broadcast(Arc<dyn BroadcastSubscriptionListener>),
}

impl SubscriptionListener {
    pub fn is_broadcast(&self) -> bool {
        matches!(self, SubscriptionListener::Broadcast(_))
    }

    pub async fn on_receive(&self, payload: Vec<u8>) {
        match self {
            SubscriptionListener::Attribute(listener) => listener.on_receive(payload).await,
            SubscriptionListener::Broadcast(listener) => listener.on_receive(payload).await,
        }
    }

    pub async fn on_error(&self, error: SubscriptionError) {
        match self {
            SubscriptionListener::Attribute(listener) => listener.on_error(error).await,
            SubscriptionListener::Broadcast(listener) => listener.on_error(error).await,
        }
    }

    pub async fn on_subscribed(&self, subscription_id: &str) {
        match self {
            SubscriptionListener::Attribute(listener) => {
                listener.on_subscribed(subscription_id).await
            }
            SubscriptionListener::Broadcast(listener) => {
                listener.on_subscribed(subscription_id).await
            }
        }
    }
}
