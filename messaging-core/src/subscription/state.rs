//! Per-subscription mutable state shared between inbound delivery and timers.

use crate::expiry::{current_time_millis, ExpiryDate};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

#[derive(Debug)]
pub struct SubscriptionState {
    last_publication_ms: AtomicU64,
    stopped: AtomicBool,
    expiry: ExpiryDate,
}

impl SubscriptionState {
    /// Fresh state; registration counts as the last publication.
    pub fn new(expiry: ExpiryDate) -> Self {
        Self::new_at(expiry, current_time_millis())
    }

    pub fn new_at(expiry: ExpiryDate, now_millis: u64) -> Self {
        Self {
            last_publication_ms: AtomicU64::new(now_millis),
            stopped: AtomicBool::new(false),
            expiry,
        }
    }

    pub fn touch(&self) {
        self.touch_at(current_time_millis());
    }

    /// Concurrent touches keep the latest timestamp.
    pub fn touch_at(&self, now_millis: u64) {
        self.last_publication_ms
            .fetch_max(now_millis, Ordering::AcqRel);
    }

    pub fn last_publication_ms(&self) -> u64 {
        self.last_publication_ms.load(Ordering::Acquire)
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    pub fn expiry(&self) -> ExpiryDate {
        self.expiry
    }

    pub fn is_active_at(&self, now_millis: u64) -> bool {
        !self.is_stopped() && !self.expiry.is_expired_at(now_millis)
    }
}
