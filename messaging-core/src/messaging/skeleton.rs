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

//! Inbound side of a transport.
//!
//! A skeleton accepts traffic for one transport and forwards every fully decoded
//! message to a [`MessageReceiver`]. Protocol failures on the inbound path are logged
//! and the offending frame is dropped; retries are the sender's responsibility.

use crate::message::Message;
use crate::observability::{events, fields};
use async_trait::async_trait;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Level};

const COMPONENT: &str = "channel_skeleton";

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SkeletonError {
    AlreadyShutDown,
    Transport { reason: String },
}

impl Display for SkeletonError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SkeletonError::AlreadyShutDown => write!(f, "messaging skeleton already shut down"),
            SkeletonError::Transport { reason } => {
                write!(f, "messaging skeleton transport error: {reason}")
            }
        }
    }
}

impl Error for SkeletonError {}

/// Inbound entry point fed by skeletons.
#[async_trait]
pub trait MessageReceiver: Send + Sync {
    async fn on_message(&self, message: Message);
}

/// Lifecycle of a transport's inbound side.
#[async_trait]
pub trait MessagingSkeleton: Send + Sync {
    /// Starts accepting inbound traffic.
    async fn init(&self) -> Result<(), SkeletonError>;

    /// Stops accepting traffic. Safe before `init` and when called repeatedly.
    async fn shutdown(&self);
}

/// Decoded inbound frame; `Err` carries a protocol-level decode failure.
pub type InboundFrame = Result<Message, String>;

#[derive(Debug, Default)]
struct SkeletonLifecycle {
    started: bool,
    shut_down: bool,
}

/// Skeleton draining an mpsc channel of decoded frames.
///
/// Each message is handed to the receiver on its own task so that a slow delivery
/// never stalls the drain loop.
pub struct ChannelMessagingSkeleton {
    name: String,
    inbound: Mutex<Option<mpsc::Receiver<InboundFrame>>>,
    receiver: Arc<dyn MessageReceiver>,
    runtime: Handle,
    lifecycle: Mutex<SkeletonLifecycle>,
    stop: CancellationToken,
}

impl ChannelMessagingSkeleton {
    pub fn new(
        name: impl Into<String>,
        inbound: mpsc::Receiver<InboundFrame>,
        receiver: Arc<dyn MessageReceiver>,
        runtime: Handle,
    ) -> Self {
        Self {
            name: name.into(),
            inbound: Mutex::new(Some(inbound)),
            receiver,
            runtime,
            lifecycle: Mutex::new(SkeletonLifecycle::default()),
            stop: CancellationToken::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn lock_lifecycle(&self) -> std::sync::MutexGuard<'_, SkeletonLifecycle> {
        match self.lifecycle.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn take_inbound(&self) -> Option<mpsc::Receiver<InboundFrame>> {
        match self.inbound.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }

    async fn drain(
        name: String,
        mut inbound: mpsc::Receiver<InboundFrame>,
        receiver: Arc<dyn MessageReceiver>,
        runtime: Handle,
        stop: CancellationToken,
    ) {
        loop {
            let frame = tokio::select! {
                _ = stop.cancelled() => break,
                frame = inbound.recv() => frame,
            };

            match frame {
                Some(Ok(message)) => {
                    if tracing::enabled!(Level::DEBUG) {
                        let message_fields = fields::FormattedMessageFields::from_message(&message);
                        debug!(
                            event = events::INBOUND_RECEIVE,
                            component = COMPONENT,
                            skeleton = name.as_str(),
                            worker_thread = %fields::current_thread_name_or_default(),
                            msg_id = %message_fields.msg_id,
                            msg_type = message_fields.msg_type,
                            sender = %message_fields.sender,
                            recipient = %message_fields.recipient,
                            "received inbound message"
                        );
                    }
                    let receiver = receiver.clone();
                    runtime.spawn(async move {
                        receiver.on_message(message).await;
                    });
                }
                Some(Err(reason)) => {
                    warn!(
                        event = events::SKELETON_PROTOCOL_ERROR,
                        component = COMPONENT,
                        skeleton = name.as_str(),
                        reason = reason.as_str(),
                        "dropping undecodable inbound frame"
                    );
                }
                None => {
                    info!(
                        event = events::SKELETON_CHANNEL_CLOSED,
                        component = COMPONENT,
                        skeleton = name.as_str(),
                        reason = fields::REASON_CHANNEL_CLOSED,
                        "inbound channel closed"
                    );
                    break;
                }
            }
        }
    }
}

#[async_trait]
impl MessagingSkeleton for ChannelMessagingSkeleton {
    async fn init(&self) -> Result<(), SkeletonError> {
        {
            let mut lifecycle = self.lock_lifecycle();
            if lifecycle.shut_down {
                return Err(SkeletonError::AlreadyShutDown);
            }
            if lifecycle.started {
                return Ok(());
            }
            lifecycle.started = true;
        }

        let Some(inbound) = self.take_inbound() else {
            return Err(SkeletonError::Transport {
                reason: "inbound channel already consumed".to_string(),
            });
        };

        self.runtime.spawn(Self::drain(
            self.name.clone(),
            inbound,
            self.receiver.clone(),
            self.runtime.clone(),
            self.stop.clone(),
        ));

        info!(
            event = events::SKELETON_INIT,
            component = COMPONENT,
            skeleton = self.name.as_str(),
            "messaging skeleton accepting traffic"
        );
        Ok(())
    }

    async fn shutdown(&self) {
        {
            let mut lifecycle = self.lock_lifecycle();
            if lifecycle.shut_down {
                return;
            }
            lifecycle.shut_down = true;
        }

        self.stop.cancel();
        // Drop a channel that was never drained so senders observe the closure.
        drop(self.take_inbound());

        info!(
            event = events::SKELETON_SHUTDOWN,
            component = COMPONENT,
            skeleton = self.name.as_str(),
            "messaging skeleton stopped"
        );
    }
}
