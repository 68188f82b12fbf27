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

use async_trait::async_trait;
use messaging_core::{
    AttributeSubscriptionListener, BroadcastSubscriptionListener, SubscriptionError,
};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::debug;

#[derive(Default)]
struct ListenerRecord {
    payloads: Vec<Vec<u8>>,
    errors: Vec<SubscriptionError>,
    subscribed: Vec<String>,
    missed: Vec<Instant>,
}

#[derive(Clone, Default)]
pub struct RecordingAttributeListener {
    record: Arc<Mutex<ListenerRecord>>,
}

impl RecordingAttributeListener {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_record<R>(&self, f: impl FnOnce(&mut ListenerRecord) -> R) -> R {
        let mut record = match self.record.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut record)
    }

    pub fn payloads(&self) -> Vec<Vec<u8>> {
        self.with_record(|record| record.payloads.clone())
    }

    pub fn errors(&self) -> Vec<SubscriptionError> {
        self.with_record(|record| record.errors.clone())
    }

    pub fn subscribed(&self) -> Vec<String> {
        self.with_record(|record| record.subscribed.clone())
    }

    pub fn missed_count(&self) -> usize {
        self.with_record(|record| record.missed.len())
    }

    /// Instants at which missed-publication callbacks fired.
    pub fn missed_at(&self) -> Vec<Instant> {
        self.with_record(|record| record.missed.clone())
    }
}

#[async_trait]
impl AttributeSubscriptionListener for RecordingAttributeListener {
    async fn on_receive(&self, payload: Vec<u8>) {
        debug!(payload_len = payload.len(), "attribute publication received");
        self.with_record(|record| record.payloads.push(payload));
    }

    async fn on_error(&self, error: SubscriptionError) {
        debug!(err = %error, "attribute subscription error");
        self.with_record(|record| record.errors.push(error));
    }

    async fn on_subscribed(&self, subscription_id: &str) {
        let subscription_id = subscription_id.to_string();
        self.with_record(|record| record.subscribed.push(subscription_id));
    }

    async fn on_publication_missed(&self) {
        self.with_record(|record| record.missed.push(Instant::now()));
    }
}

#[derive(Clone, Default)]
pub struct RecordingBroadcastListener {
    record: Arc<Mutex<ListenerRecord>>,
}

impl RecordingBroadcastListener {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_record<R>(&self, f: impl FnOnce(&mut ListenerRecord) -> R) -> R {
        let mut record = match self.record.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut record)
    }

    pub fn payloads(&self) -> Vec<Vec<u8>> {
        self.with_record(|record| record.payloads.clone())
    }

    pub fn errors(&self) -> Vec<SubscriptionError> {
        self.with_record(|record| record.errors.clone())
    }
}

#[async_trait]
impl BroadcastSubscriptionListener for RecordingBroadcastListener {
    async fn on_receive(&self, payload: Vec<u8>) {
        debug!(payload_len = payload.len(), "broadcast received");
        self.with_record(|record| record.payloads.push(payload));
    }

    async fn on_error(&self, error: SubscriptionError) {
        self.with_record(|record| record.errors.push(error));
    }
}
