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

//! Subscription registry and lifecycle owner.
//!
//! Every subscription is a single map entry owning its listener, metadata, state and
//! the cancellation token shared by its expiry task and missed-publication timer.
//! Unregistration, expiry, provider errors and shutdown all end in the same cleanup,
//! which removes the entry from the map; only the caller that removed it cancels the
//! token, so cleanup side effects happen once per subscription.

use crate::expiry::{current_time_millis, ExpiryDate};
use crate::observability::events;
use crate::subscription::listener::{
    AttributeSubscriptionListener, BroadcastSubscriptionListener, SubscriptionListener,
};
use crate::subscription::missed_publication::spawn_missed_publication_timer;
use crate::subscription::qos::SubscriptionQos;
use crate::subscription::state::SubscriptionState;
use crate::subscription::SubscriptionError;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

const COMPONENT: &str = "subscription_manager";

#[derive(Clone, Debug, Eq, PartialEq)]
enum SubscriptionMetadata {
    Attribute {
        attribute_name: String,
        type_ref: String,
    },
    Broadcast {
        broadcast_name: String,
        out_parameter_types: Vec<String>,
    },
}

impl SubscriptionMetadata {
    fn name(&self) -> &str {
        match self {
            SubscriptionMetadata::Attribute { attribute_name, .. } => attribute_name,
            SubscriptionMetadata::Broadcast { broadcast_name, .. } => broadcast_name,
        }
    }
}

struct SubscriptionEntry {
    listener: SubscriptionListener,
    metadata: SubscriptionMetadata,
    state: Arc<SubscriptionState>,
    stop: CancellationToken,
}

#[derive(Clone, Copy, Debug)]
enum CleanupReason {
    Unregistered,
    Expired,
    Replaced,
    ProviderError,
    Shutdown,
}

impl CleanupReason {
    fn as_str(&self) -> &'static str {
        match self {
            CleanupReason::Unregistered => "unregistered",
            CleanupReason::Expired => "expired",
            CleanupReason::Replaced => "replaced",
            CleanupReason::ProviderError => "provider_error",
            CleanupReason::Shutdown => "shutdown",
        }
    }
}

struct ManagerInner {
    subscriptions: DashMap<String, Arc<SubscriptionEntry>>,
    runtime: Handle,
    shut_down: AtomicBool,
}

impl ManagerInner {
    /// Removes the subscription and releases its tasks.
    ///
    /// With `only` set, the entry is removed only if it is still that exact entry, so a
    /// late expiry never removes a re-registration under the same id.
    fn cleanup(
        &self,
        subscription_id: &str,
        reason: CleanupReason,
        only: Option<&Arc<SubscriptionEntry>>,
    ) -> Option<Arc<SubscriptionEntry>> {
        let removed = match only {
            Some(expected) => self
                .subscriptions
                .remove_if(subscription_id, |_, current| Arc::ptr_eq(current, expected)),
            None => self.subscriptions.remove(subscription_id),
        };

        let Some((_, entry)) = removed else {
            debug!(
                event = events::SUBSCRIPTION_UNKNOWN,
                component = COMPONENT,
                subscription_id,
                reason = reason.as_str(),
                "subscription already cleaned up"
            );
            return None;
        };

        self.release(subscription_id, reason, &entry);
        Some(entry)
    }

    /// Stops the tasks of an entry that is no longer in the map.
    fn release(&self, subscription_id: &str, reason: CleanupReason, entry: &SubscriptionEntry) {
        entry.state.stop();
        entry.stop.cancel();

        let event = match reason {
            CleanupReason::Expired => events::SUBSCRIPTION_EXPIRED,
            _ => events::SUBSCRIPTION_UNREGISTER,
        };
        info!(
            event,
            component = COMPONENT,
            subscription_id,
            name = entry.metadata.name(),
            reason = reason.as_str(),
            "subscription removed"
        );
    }

    /// Publishes `entry` under `subscription_id`.
    ///
    /// Whatever entry the insert displaced is released, and an entry inserted after
    /// shutdown began is taken back out.
    fn install(
        &self,
        subscription_id: &str,
        entry: &Arc<SubscriptionEntry>,
    ) -> Result<(), SubscriptionError> {
        if let Some(previous) = self
            .subscriptions
            .insert(subscription_id.to_string(), entry.clone())
        {
            self.release(subscription_id, CleanupReason::Replaced, &previous);
        }

        if self.shut_down.load(Ordering::SeqCst) {
            self.cleanup(subscription_id, CleanupReason::Shutdown, Some(entry));
            return Err(SubscriptionError::Shutdown);
        }
        Ok(())
    }
}

impl Drop for ManagerInner {
    fn drop(&mut self) {
        for entry in self.subscriptions.iter() {
            entry.state.stop();
            entry.stop.cancel();
        }
    }
}

/// Shared handle to the subscription registry.
#[derive(Clone)]
pub struct SubscriptionManager {
    inner: Arc<ManagerInner>,
}

impl SubscriptionManager {
    /// Expiry tasks and missed-publication timers run on `runtime`.
    pub fn new(runtime: Handle) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                subscriptions: DashMap::new(),
                runtime,
                shut_down: AtomicBool::new(false),
            }),
        }
    }

    /// Registers an attribute subscription under a fresh id.
    pub fn register_attribute_subscription(
        &self,
        attribute_name: &str,
        type_ref: &str,
        listener: Arc<dyn AttributeSubscriptionListener>,
        qos: SubscriptionQos,
    ) -> Result<String, SubscriptionError> {
        self.register_attribute_subscription_with_id(
            &Uuid::new_v4().to_string(),
            attribute_name,
            type_ref,
            listener,
            qos,
        )
    }

    /// Registers an attribute subscription under `subscription_id`, replacing any
    /// subscription registered under that id.
    pub fn register_attribute_subscription_with_id(
        &self,
        subscription_id: &str,
        attribute_name: &str,
        type_ref: &str,
        listener: Arc<dyn AttributeSubscriptionListener>,
        qos: SubscriptionQos,
    ) -> Result<String, SubscriptionError> {
        self.register(
            subscription_id,
            SubscriptionListener::Attribute(listener),
            SubscriptionMetadata::Attribute {
                attribute_name: attribute_name.to_string(),
                type_ref: type_ref.to_string(),
            },
            qos,
        )
    }

    /// Registers a broadcast subscription under a fresh id.
    ///
    /// Broadcasts are not periodic; the alert interval of `qos` is ignored.
    pub fn register_broadcast_subscription(
        &self,
        broadcast_name: &str,
        out_parameter_types: Vec<String>,
        listener: Arc<dyn BroadcastSubscriptionListener>,
        qos: SubscriptionQos,
    ) -> Result<String, SubscriptionError> {
        self.register(
            &Uuid::new_v4().to_string(),
            SubscriptionListener::Broadcast(listener),
            SubscriptionMetadata::Broadcast {
                broadcast_name: broadcast_name.to_string(),
                out_parameter_types,
            },
            qos,
        )
    }

    fn register(
        &self,
        subscription_id: &str,
        listener: SubscriptionListener,
        metadata: SubscriptionMetadata,
        qos: SubscriptionQos,
    ) -> Result<String, SubscriptionError> {
        if self.inner.shut_down.load(Ordering::SeqCst) {
            return Err(SubscriptionError::Shutdown);
        }

        let now = current_time_millis();
        if let ExpiryDate::At(expiry_date_ms) = qos.expiry {
            if qos.expiry.is_expired_at(now) {
                warn!(
                    event = events::SUBSCRIPTION_REGISTER_REJECTED,
                    component = COMPONENT,
                    subscription_id,
                    name = metadata.name(),
                    expiry_date_ms,
                    now_ms = now,
                    "subscription expiry date already passed"
                );
                return Err(SubscriptionError::ExpiryDateInPast { expiry_date_ms });
            }
        }

        let entry = Arc::new(SubscriptionEntry {
            listener,
            metadata,
            state: Arc::new(SubscriptionState::new_at(qos.expiry, now)),
            stop: CancellationToken::new(),
        });

        self.inner.install(subscription_id, &entry)?;

        info!(
            event = events::SUBSCRIPTION_REGISTER,
            component = COMPONENT,
            subscription_id,
            name = entry.metadata.name(),
            is_broadcast = entry.listener.is_broadcast(),
            expiry = %qos.expiry,
            alert_after_interval_ms = qos.alert_after_interval_ms,
            "subscription registered"
        );

        if let SubscriptionListener::Attribute(attribute_listener) = &entry.listener {
            if qos.missed_publication_detection_enabled() {
                spawn_missed_publication_timer(
                    &self.inner.runtime,
                    subscription_id.to_string(),
                    entry.state.clone(),
                    attribute_listener.clone(),
                    qos,
                    entry.stop.clone(),
                );
            }
        }

        if let Some(remaining) = qos.expiry.remaining_at(now) {
            self.schedule_expiry(subscription_id.to_string(), &entry, remaining);
        }

        Ok(subscription_id.to_string())
    }

    fn schedule_expiry(
        &self,
        subscription_id: String,
        entry: &Arc<SubscriptionEntry>,
        remaining: std::time::Duration,
    ) {
        let manager: Weak<ManagerInner> = Arc::downgrade(&self.inner);
        let owned_entry: Weak<SubscriptionEntry> = Arc::downgrade(entry);
        let stop = entry.stop.clone();

        self.inner.runtime.spawn(async move {
            tokio::select! {
                _ = stop.cancelled() => {}
                _ = tokio::time::sleep(remaining) => {
                    let (Some(manager), Some(entry)) = (manager.upgrade(), owned_entry.upgrade()) else {
                        return;
                    };
                    manager.cleanup(&subscription_id, CleanupReason::Expired, Some(&entry));
                }
            }
        });
    }

    /// Ends the subscription. Returns `false` if it was unknown or already gone.
    pub fn unregister_subscription(&self, subscription_id: &str) -> bool {
        self.inner
            .cleanup(subscription_id, CleanupReason::Unregistered, None)
            .is_some()
    }

    /// Records a publication arrival. Returns `false` for unknown ids.
    pub fn touch_subscription_state(&self, subscription_id: &str) -> bool {
        match self.inner.subscriptions.get(subscription_id) {
            Some(entry) => {
                entry.state.touch();
                debug!(
                    event = events::SUBSCRIPTION_TOUCH,
                    component = COMPONENT,
                    subscription_id,
                    "subscription state touched"
                );
                true
            }
            None => {
                debug!(
                    event = events::SUBSCRIPTION_UNKNOWN,
                    component = COMPONENT,
                    subscription_id,
                    "touch for unknown subscription"
                );
                false
            }
        }
    }

    fn entry(&self, subscription_id: &str) -> Option<Arc<SubscriptionEntry>> {
        self.inner
            .subscriptions
            .get(subscription_id)
            .map(|entry| entry.value().clone())
    }

    fn entry_or_log(&self, subscription_id: &str) -> Option<Arc<SubscriptionEntry>> {
        let entry = self.entry(subscription_id);
        if entry.is_none() {
            error!(
                event = events::SUBSCRIPTION_UNKNOWN,
                component = COMPONENT,
                subscription_id,
                "no subscription registered for id"
            );
        }
        entry
    }

    pub fn has_subscription(&self, subscription_id: &str) -> bool {
        self.inner.subscriptions.contains_key(subscription_id)
    }

    pub fn subscription_count(&self) -> usize {
        self.inner.subscriptions.len()
    }

    pub fn get_subscription_listener(
        &self,
        subscription_id: &str,
    ) -> Option<Arc<dyn AttributeSubscriptionListener>> {
        match self.entry_or_log(subscription_id)?.listener.clone() {
            SubscriptionListener::Attribute(listener) => Some(listener),
            SubscriptionListener::Broadcast(_) => {
                error!(
                    event = events::SUBSCRIPTION_UNKNOWN,
                    component = COMPONENT,
                    subscription_id,
                    "subscription is a broadcast subscription"
                );
                None
            }
        }
    }

    pub fn get_broadcast_subscription_listener(
        &self,
        subscription_id: &str,
    ) -> Option<Arc<dyn BroadcastSubscriptionListener>> {
        match self.entry_or_log(subscription_id)?.listener.clone() {
            SubscriptionListener::Broadcast(listener) => Some(listener),
            SubscriptionListener::Attribute(_) => {
                error!(
                    event = events::SUBSCRIPTION_UNKNOWN,
                    component = COMPONENT,
                    subscription_id,
                    "subscription is an attribute subscription"
                );
                None
            }
        }
    }

    /// Type reference the attribute payload decodes to.
    pub fn get_attribute_type(&self, subscription_id: &str) -> Option<String> {
        match &self.entry(subscription_id)?.metadata {
            SubscriptionMetadata::Attribute { type_ref, .. } => Some(type_ref.clone()),
            SubscriptionMetadata::Broadcast { .. } => None,
        }
    }

    /// `false` for attribute subscriptions and unknown ids.
    pub fn is_broadcast(&self, subscription_id: &str) -> bool {
        self.entry(subscription_id)
            .map_or(false, |entry| entry.listener.is_broadcast())
    }

    pub fn get_broadcast_out_parameter_types(&self, subscription_id: &str) -> Option<Vec<String>> {
        match &self.entry(subscription_id)?.metadata {
            SubscriptionMetadata::Broadcast {
                out_parameter_types,
                ..
            } => Some(out_parameter_types.clone()),
            SubscriptionMetadata::Attribute { .. } => None,
        }
    }

    /// Delivers an attribute publication. Unknown ids are dropped.
    pub async fn handle_attribute_publication(&self, subscription_id: &str, payload: Vec<u8>) -> bool {
        let Some(listener) = self.get_subscription_listener(subscription_id) else {
            return false;
        };
        self.touch_subscription_state(subscription_id);
        debug!(
            event = events::PUBLICATION_DELIVER,
            component = COMPONENT,
            subscription_id,
            payload_len = payload.len(),
            "delivering attribute publication"
        );
        listener.on_receive(payload).await;
        true
    }

    /// Delivers an error publication; it still counts as a publication arrival.
    pub async fn handle_attribute_publication_error(&self, subscription_id: &str, reason: &str) -> bool {
        let Some(listener) = self.get_subscription_listener(subscription_id) else {
            return false;
        };
        self.touch_subscription_state(subscription_id);
        listener
            .on_error(SubscriptionError::Provider {
                reason: reason.to_string(),
            })
            .await;
        true
    }

    /// Delivers a broadcast event. Unknown ids are dropped.
    pub async fn handle_broadcast_publication(&self, subscription_id: &str, payload: Vec<u8>) -> bool {
        let Some(listener) = self.get_broadcast_subscription_listener(subscription_id) else {
            return false;
        };
        debug!(
            event = events::PUBLICATION_DELIVER,
            component = COMPONENT,
            subscription_id,
            payload_len = payload.len(),
            "delivering broadcast publication"
        );
        listener.on_receive(payload).await;
        true
    }

    /// Applies the provider's reply to a subscription request.
    ///
    /// An error reply removes the subscription before the listener hears about it.
    pub async fn handle_subscription_reply(&self, subscription_id: &str, result: Result<(), String>) {
        match result {
            Ok(()) => {
                let Some(entry) = self.entry_or_log(subscription_id) else {
                    return;
                };
                debug!(
                    event = events::SUBSCRIPTION_REPLY,
                    component = COMPONENT,
                    subscription_id,
                    "subscription confirmed"
                );
                entry.listener.on_subscribed(subscription_id).await;
            }
            Err(reason) => {
                warn!(
                    event = events::SUBSCRIPTION_REPLY,
                    component = COMPONENT,
                    subscription_id,
                    reason = reason.as_str(),
                    "subscription rejected by provider"
                );
                let Some(entry) =
                    self.inner
                        .cleanup(subscription_id, CleanupReason::ProviderError, None)
                else {
                    return;
                };
                entry
                    .listener
                    .on_error(SubscriptionError::Provider { reason })
                    .await;
            }
        }
    }

    /// Cancels every expiry task and timer and drops all subscriptions. Idempotent.
    pub fn shutdown(&self) {
        if self.inner.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        let subscription_ids: Vec<String> = self
            .inner
            .subscriptions
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        let removed = subscription_ids
            .iter()
            .filter(|subscription_id| {
                self.inner
                    .cleanup(subscription_id, CleanupReason::Shutdown, None)
                    .is_some()
            })
            .count();
        info!(
            event = events::SUBSCRIPTION_MANAGER_SHUTDOWN,
            component = COMPONENT,
            removed,
            "subscription manager shut down"
        );
    }
}
