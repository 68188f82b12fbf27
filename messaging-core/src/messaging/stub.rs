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

//! Outbound sender contract bound to one destination address.

use crate::message::Message;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

/// Classified transmit failure reported by a stub.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TransmitError {
    /// Transient condition; the message may be retried, optionally after `delay`.
    Recoverable {
        delay: Option<Duration>,
        reason: String,
    },
    /// The destination rejected the message or it cannot ever be delivered.
    Permanent { reason: String },
    /// The transport failed in a way it could not classify.
    Unclassified { reason: String },
}

impl TransmitError {
    pub fn recoverable(reason: impl Into<String>) -> Self {
        TransmitError::Recoverable {
            delay: None,
            reason: reason.into(),
        }
    }

    pub fn recoverable_after(delay: Duration, reason: impl Into<String>) -> Self {
        TransmitError::Recoverable {
            delay: Some(delay),
            reason: reason.into(),
        }
    }

    pub fn permanent(reason: impl Into<String>) -> Self {
        TransmitError::Permanent {
            reason: reason.into(),
        }
    }

    /// Only explicitly recoverable failures are retried.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, TransmitError::Recoverable { .. })
    }

    pub fn reason(&self) -> &str {
        match self {
            TransmitError::Recoverable { reason, .. }
            | TransmitError::Permanent { reason }
            | TransmitError::Unclassified { reason } => reason,
        }
    }
}

impl Display for TransmitError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            TransmitError::Recoverable {
                delay: Some(delay),
                reason,
            } => write!(
                f,
                "recoverable transmit failure (retry in {}ms): {reason}",
                delay.as_millis()
            ),
            TransmitError::Recoverable {
                delay: None,
                reason,
            } => write!(f, "recoverable transmit failure: {reason}"),
            TransmitError::Permanent { reason } => {
                write!(f, "permanent transmit failure: {reason}")
            }
            TransmitError::Unclassified { reason } => {
                write!(f, "unclassified transmit failure: {reason}")
            }
        }
    }
}

impl Error for TransmitError {}

pub type TransmitResult = Result<(), TransmitError>;

/// Single-use completion handed to [`MessagingStub::transmit`].
///
/// Consuming `self` makes double completion impossible. A completion that is dropped
/// without being resolved is observed by the router as an unclassified failure.
#[derive(Debug)]
pub struct TransmitCompletion {
    sender: oneshot::Sender<TransmitResult>,
}

impl TransmitCompletion {
    /// Creates a completion and the receiver that observes its outcome.
    pub fn channel() -> (Self, oneshot::Receiver<TransmitResult>) {
        let (sender, receiver) = oneshot::channel();
        (Self { sender }, receiver)
    }

    pub fn succeed(self) {
        self.complete(Ok(()));
    }

    pub fn fail(self, error: TransmitError) {
        self.complete(Err(error));
    }

    pub fn complete(self, result: TransmitResult) {
        // The receiving side may already have given up on this attempt.
        let _ = self.sender.send(result);
    }
}

/// Transport-specific sender for one destination address.
///
/// `transmit` must not block; the transport reports the outcome through `completion`.
pub trait MessagingStub: Send + Sync {
    fn transmit(&self, message: Arc<Message>, completion: TransmitCompletion);

    /// Releases transport resources when the stub leaves the cache.
    fn shutdown(&self) {}
}
