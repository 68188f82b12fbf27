//! Subscription lifecycle: registration, publication delivery, missed-publication
//! detection and expiry.

pub mod listener;
pub(crate) mod missed_publication;
pub mod qos;
pub mod state;
pub mod subscription_manager;

use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SubscriptionError {
    /// The requested expiry date has already passed; nothing was registered.
    ExpiryDateInPast { expiry_date_ms: u64 },
    /// The provider reported an error for this subscription.
    Provider { reason: String },
    /// The subscription manager was shut down.
    Shutdown,
}

impl Display for SubscriptionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SubscriptionError::ExpiryDateInPast { expiry_date_ms } => {
                write!(f, "subscription expiry date {expiry_date_ms} is in the past")
            }
            SubscriptionError::Provider { reason } => {
                write!(f, "provider reported subscription error: {reason}")
            }
            SubscriptionError::Shutdown => write!(f, "subscription manager is shut down"),
        }
    }
}

impl Error for SubscriptionError {}
