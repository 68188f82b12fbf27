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

use messaging_core::{
    Address, Message, MessagingStub, MessagingStubFactory, StubFactoryError, TransmitCompletion,
    TransmitError,
};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;
use tracing::debug;

/// How a [`RecordingStub`] answers one transmit call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransmitBehavior {
    Succeed,
    FailRecoverable { delay: Option<Duration> },
    FailPermanent,
    FailUnclassified,
    /// Drops the completion without resolving it.
    DropCompletion,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Stub that records every transmit and answers from a script, then from a default.
pub struct RecordingStub {
    address: Address,
    script: Mutex<VecDeque<TransmitBehavior>>,
    default_behavior: TransmitBehavior,
    transmitted: Mutex<Vec<String>>,
    shutdowns: AtomicUsize,
}

impl RecordingStub {
    pub fn new(address: Address, script: Vec<TransmitBehavior>) -> Self {
        Self {
            address,
            script: Mutex::new(script.into()),
            default_behavior: TransmitBehavior::Succeed,
            transmitted: Mutex::new(Vec::new()),
            shutdowns: AtomicUsize::new(0),
        }
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn push_behavior(&self, behavior: TransmitBehavior) {
        lock(&self.script).push_back(behavior);
    }

    /// Ids of all messages handed to this stub, in call order.
    pub fn transmitted_ids(&self) -> Vec<String> {
        lock(&self.transmitted).clone()
    }

    pub fn attempts(&self) -> usize {
        lock(&self.transmitted).len()
    }

    pub fn shutdown_count(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }
}

impl MessagingStub for RecordingStub {
    fn transmit(&self, message: Arc<Message>, completion: TransmitCompletion) {
        lock(&self.transmitted).push(message.id.clone());
        let behavior = lock(&self.script)
            .pop_front()
            .unwrap_or_else(|| self.default_behavior.clone());

        debug!(
            address = %self.address,
            msg_id = message.id.as_str(),
            behavior = ?behavior,
            "recording stub transmit"
        );

        match behavior {
            TransmitBehavior::Succeed => completion.succeed(),
            TransmitBehavior::FailRecoverable { delay } => {
                completion.fail(TransmitError::Recoverable {
                    delay,
                    reason: "scripted recoverable failure".to_string(),
                })
            }
            TransmitBehavior::FailPermanent => {
                completion.fail(TransmitError::permanent("scripted permanent failure"))
            }
            TransmitBehavior::FailUnclassified => completion.fail(TransmitError::Unclassified {
                reason: "scripted unclassified failure".to_string(),
            }),
            TransmitBehavior::DropCompletion => drop(completion),
        }
    }

    fn shutdown(&self) {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
    }
}

/// Factory building one [`RecordingStub`] per call and remembering each of them.
#[derive(Default)]
pub struct RecordingStubFactory {
    script: Vec<TransmitBehavior>,
    creation_delay: Option<Duration>,
    creations: AtomicUsize,
    stubs: Mutex<HashMap<Address, Vec<Arc<RecordingStub>>>>,
}

impl RecordingStubFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stub created afterwards starts with `script`.
    pub fn with_script(mut self, script: Vec<TransmitBehavior>) -> Self {
        self.script = script;
        self
    }

    /// Slows creation down to widen race windows.
    pub fn with_creation_delay(mut self, delay: Duration) -> Self {
        self.creation_delay = Some(delay);
        self
    }

    pub fn creation_count(&self) -> usize {
        self.creations.load(Ordering::SeqCst)
    }

    pub fn creations_for(&self, address: &Address) -> usize {
        lock(&self.stubs).get(address).map_or(0, Vec::len)
    }

    /// Most recently created stub for `address`.
    pub fn stub(&self, address: &Address) -> Option<Arc<RecordingStub>> {
        lock(&self.stubs)
            .get(address)
            .and_then(|stubs| stubs.last().cloned())
    }
}

impl MessagingStubFactory for RecordingStubFactory {
    fn create(&self, address: &Address) -> Result<Arc<dyn MessagingStub>, StubFactoryError> {
        if let Some(delay) = self.creation_delay {
            thread::sleep(delay);
        }
        self.creations.fetch_add(1, Ordering::SeqCst);

        let stub = Arc::new(RecordingStub::new(address.clone(), self.script.clone()));
        lock(&self.stubs)
            .entry(address.clone())
            .or_default()
            .push(stub.clone());
        Ok(stub)
    }
}
