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

//! Local delivery for [`Address::InProcess`] destinations.

use crate::address::Address;
use crate::message::Message;
use crate::messaging::skeleton::MessageReceiver;
use crate::messaging::stub::{MessagingStub, TransmitCompletion, TransmitError};
use crate::messaging::stub_factory::{MessagingStubFactory, StubFactoryError};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::trace;

pub const DEFAULT_RECEIVER_NOT_STARTED_DELAY: Duration = Duration::from_millis(100);

const COMPONENT: &str = "in_process_stub";

type ReceiverRegistry = Arc<DashMap<String, Arc<dyn MessageReceiver>>>;

/// Creates stubs that hand messages to receivers living in this process.
pub struct InProcessMessagingStubFactory {
    receivers: ReceiverRegistry,
    runtime: Handle,
    receiver_not_started_delay: Duration,
}

impl InProcessMessagingStubFactory {
    pub fn new(runtime: Handle) -> Self {
        Self {
            receivers: Arc::new(DashMap::new()),
            runtime,
            receiver_not_started_delay: DEFAULT_RECEIVER_NOT_STARTED_DELAY,
        }
    }

    pub fn with_receiver_not_started_delay(mut self, delay: Duration) -> Self {
        self.receiver_not_started_delay = delay;
        self
    }

    /// Makes `receiver` reachable under `participant_id`, replacing any previous one.
    pub fn register_receiver(
        &self,
        participant_id: impl Into<String>,
        receiver: Arc<dyn MessageReceiver>,
    ) {
        self.receivers.insert(participant_id.into(), receiver);
    }

    pub fn unregister_receiver(&self, participant_id: &str) -> bool {
        self.receivers.remove(participant_id).is_some()
    }
}

impl MessagingStubFactory for InProcessMessagingStubFactory {
    fn create(&self, address: &Address) -> Result<Arc<dyn MessagingStub>, StubFactoryError> {
        match address {
            Address::InProcess(in_process) => Ok(Arc::new(InProcessMessagingStub {
                participant_id: in_process.participant_id.clone(),
                receivers: self.receivers.clone(),
                runtime: self.runtime.clone(),
                receiver_not_started_delay: self.receiver_not_started_delay,
            })),
            other => Err(StubFactoryError::Configuration {
                reason: format!("in-process factory cannot serve {} addresses", other.kind()),
            }),
        }
    }
}

pub struct InProcessMessagingStub {
    participant_id: String,
    receivers: ReceiverRegistry,
    runtime: Handle,
    receiver_not_started_delay: Duration,
}

impl MessagingStub for InProcessMessagingStub {
    fn transmit(&self, message: Arc<Message>, completion: TransmitCompletion) {
        let receiver = self
            .receivers
            .get(&self.participant_id)
            .map(|entry| entry.value().clone());

        let Some(receiver) = receiver else {
            trace!(
                component = COMPONENT,
                participant_id = self.participant_id.as_str(),
                "in-process receiver not started yet"
            );
            completion.fail(TransmitError::recoverable_after(
                self.receiver_not_started_delay,
                format!("receiver {} not started", self.participant_id),
            ));
            return;
        };

        self.runtime.spawn(async move {
            let message = Arc::try_unwrap(message).unwrap_or_else(|shared| (*shared).clone());
            receiver.on_message(message).await;
            completion.succeed();
        });
    }
}
