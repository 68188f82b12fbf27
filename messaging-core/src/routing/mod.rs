//! Outbound routing: participant-id resolution, stub selection and retry policy.

pub(crate) mod backoff;
pub mod message_router;
pub mod routing_table;
pub(crate) mod stub_cache;

use crate::messaging::stub_factory::StubFactoryError;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Final outcome of a failed routing operation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RoutingError {
    /// The recipient has no routing-table entry.
    NoRoute { participant_id: String },
    /// The message deadline passed before delivery succeeded.
    Expired { message_id: String },
    /// The transport rejected the message or failed without classification.
    PermanentTransport { message_id: String, reason: String },
    /// The configured retry cap was reached before the deadline.
    RetriesExhausted { message_id: String, retries: u32 },
    /// No stub could be built for the resolved address.
    StubCreation(StubFactoryError),
    /// The router was shut down.
    Shutdown,
}

impl Display for RoutingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            RoutingError::NoRoute { participant_id } => {
                write!(f, "no route for participant {participant_id}")
            }
            RoutingError::Expired { message_id } => {
                write!(f, "message {message_id} expired before delivery")
            }
            RoutingError::PermanentTransport { message_id, reason } => {
                write!(f, "message {message_id} could not be delivered: {reason}")
            }
            RoutingError::RetriesExhausted {
                message_id,
                retries,
            } => write!(
                f,
                "message {message_id} not delivered after {retries} retries"
            ),
            RoutingError::StubCreation(err) => write!(f, "unable to create messaging stub: {err}"),
            RoutingError::Shutdown => write!(f, "message router is shut down"),
        }
    }
}

impl Error for RoutingError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            RoutingError::StubCreation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StubFactoryError> for RoutingError {
    fn from(err: StubFactoryError) -> Self {
        RoutingError::StubCreation(err)
    }
}
