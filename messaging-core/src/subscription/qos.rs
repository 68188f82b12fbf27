//! Subscription quality-of-service parameters.

use crate::expiry::ExpiryDate;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct SubscriptionQos {
    pub expiry: ExpiryDate,
    /// 0 disables missed-publication detection.
    pub alert_after_interval_ms: u64,
    /// Expected publication period; 0 when publications are not periodic.
    pub period_ms: u64,
}

impl Default for SubscriptionQos {
    fn default() -> Self {
        Self {
            expiry: ExpiryDate::Never,
            alert_after_interval_ms: 0,
            period_ms: 0,
        }
    }
}

impl SubscriptionQos {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_expiry(mut self, expiry: ExpiryDate) -> Self {
        self.expiry = expiry;
        self
    }

    /// Expires the subscription `validity` from now.
    pub fn with_validity(self, validity: Duration) -> Self {
        self.with_expiry(ExpiryDate::from_now(validity))
    }

    pub fn with_alert_after_interval_ms(mut self, alert_after_interval_ms: u64) -> Self {
        self.alert_after_interval_ms = alert_after_interval_ms;
        self
    }

    pub fn with_period_ms(mut self, period_ms: u64) -> Self {
        self.period_ms = period_ms;
        self
    }

    pub fn missed_publication_detection_enabled(&self) -> bool {
        self.alert_after_interval_ms > 0
    }

    /// Alert interval actually used; never shorter than the publication period.
    pub fn effective_alert_after_interval_ms(&self) -> u64 {
        if self.alert_after_interval_ms == 0 {
            return 0;
        }
        self.alert_after_interval_ms.max(self.period_ms)
    }

    /// Interval at which publications are expected to arrive.
    pub fn expected_interval_ms(&self) -> u64 {
        if self.period_ms > 0 {
            self.period_ms
        } else {
            self.effective_alert_after_interval_ms()
        }
    }
}
