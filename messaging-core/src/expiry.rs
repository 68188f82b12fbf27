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

//! Absolute deadlines expressed in epoch milliseconds.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn current_time_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}

/// An absolute deadline, or the explicit `Never` sentinel.
///
/// `Never` is never scheduled; it is not an alias for a very large timestamp.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpiryDate {
    Never,
    At(u64),
}

impl ExpiryDate {
    /// Deadline `ttl` from now.
    pub fn from_now(ttl: Duration) -> Self {
        ExpiryDate::At(current_time_millis().saturating_add(ttl.as_millis() as u64))
    }

    pub fn at_millis(epoch_millis: u64) -> Self {
        ExpiryDate::At(epoch_millis)
    }

    pub fn is_never(&self) -> bool {
        matches!(self, ExpiryDate::Never)
    }

    /// `true` once `now_millis` reached the deadline.
    pub fn is_expired_at(&self, now_millis: u64) -> bool {
        match self {
            ExpiryDate::Never => false,
            ExpiryDate::At(deadline) => *deadline <= now_millis,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(current_time_millis())
    }

    /// Time left until the deadline, `None` for `Never`.
    pub fn remaining_at(&self, now_millis: u64) -> Option<Duration> {
        match self {
            ExpiryDate::Never => None,
            ExpiryDate::At(deadline) => {
                Some(Duration::from_millis(deadline.saturating_sub(now_millis)))
            }
        }
    }

    pub fn remaining(&self) -> Option<Duration> {
        self.remaining_at(current_time_millis())
    }

    pub fn as_millis(&self) -> Option<u64> {
        match self {
            ExpiryDate::Never => None,
            ExpiryDate::At(deadline) => Some(*deadline),
        }
    }
}

impl Display for ExpiryDate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ExpiryDate::Never => write!(f, "never"),
            ExpiryDate::At(deadline) => write!(f, "{deadline}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ExpiryDate;
    use std::time::Duration;

    #[test]
    fn never_does_not_expire() {
        assert!(!ExpiryDate::Never.is_expired_at(u64::MAX));
        assert_eq!(ExpiryDate::Never.remaining_at(0), None);
    }

    #[test]
    fn deadline_expires_when_reached() {
        let expiry = ExpiryDate::at_millis(1_000);

        assert!(!expiry.is_expired_at(999));
        assert!(expiry.is_expired_at(1_000));
        assert_eq!(expiry.remaining_at(400), Some(Duration::from_millis(600)));
        assert_eq!(expiry.remaining_at(5_000), Some(Duration::ZERO));
    }

    #[test]
    fn from_now_lies_in_the_future() {
        let expiry = ExpiryDate::from_now(Duration::from_secs(60));

        assert!(!expiry.is_expired());
        assert!(expiry.remaining().unwrap() > Duration::from_secs(50));
    }
}
