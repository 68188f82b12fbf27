//! Self-rescheduling missed-publication timer.
//!
//! Each firing compares the time since the last publication with the alert interval
//! and picks the next check so that it lines up with the next expected publication.

use crate::expiry::current_time_millis;
use crate::observability::events;
use crate::subscription::listener::AttributeSubscriptionListener;
use crate::subscription::qos::SubscriptionQos;
use crate::subscription::state::SubscriptionState;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

const COMPONENT: &str = "missed_publication_timer";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum CheckOutcome {
    /// Subscription expired or stopped; the timer ends.
    Stop,
    InTime { next_check: Duration },
    Missed { next_check: Duration },
}

/// Evaluates one firing of the timer at `now_millis`.
pub(crate) fn evaluate(
    state: &SubscriptionState,
    alert_after_interval_ms: u64,
    expected_interval_ms: u64,
    now_millis: u64,
) -> CheckOutcome {
    if !state.is_active_at(now_millis) {
        return CheckOutcome::Stop;
    }

    let since_last_publication = now_millis.saturating_sub(state.last_publication_ms());
    if since_last_publication < alert_after_interval_ms {
        return CheckOutcome::InTime {
            next_check: Duration::from_millis(alert_after_interval_ms - since_last_publication),
        };
    }

    let expected_interval_ms = expected_interval_ms.max(1);
    let aligned = alert_after_interval_ms.saturating_sub(since_last_publication % expected_interval_ms);
    let next_check_ms = if aligned == 0 {
        expected_interval_ms
    } else {
        aligned
    };
    CheckOutcome::Missed {
        next_check: Duration::from_millis(next_check_ms),
    }
}

/// Spawns the timer for one subscription; it runs until `stop` is cancelled or the
/// subscription becomes inactive. The first check happens one alert interval after
/// registration.
pub(crate) fn spawn_missed_publication_timer(
    runtime: &Handle,
    subscription_id: String,
    state: Arc<SubscriptionState>,
    listener: Arc<dyn AttributeSubscriptionListener>,
    qos: SubscriptionQos,
    stop: CancellationToken,
) {
    let alert_after_interval_ms = qos.effective_alert_after_interval_ms();
    let expected_interval_ms = qos.expected_interval_ms();

    runtime.spawn(async move {
        let mut next_check = Duration::from_millis(alert_after_interval_ms);
        loop {
            tokio::select! {
                _ = stop.cancelled() => break,
                _ = tokio::time::sleep(next_check) => {}
            }

            match evaluate(
                &state,
                alert_after_interval_ms,
                expected_interval_ms,
                current_time_millis(),
            ) {
                CheckOutcome::Stop => break,
                CheckOutcome::InTime { next_check: next } => {
                    trace!(
                        event = events::PUBLICATION_IN_TIME,
                        component = COMPONENT,
                        subscription_id = subscription_id.as_str(),
                        next_check_ms = next.as_millis() as u64,
                        "publication arrived in time"
                    );
                    next_check = next;
                }
                CheckOutcome::Missed { next_check: next } => {
                    if stop.is_cancelled() {
                        break;
                    }
                    info!(
                        event = events::PUBLICATION_MISSED,
                        component = COMPONENT,
                        subscription_id = subscription_id.as_str(),
                        alert_after_interval_ms,
                        next_check_ms = next.as_millis() as u64,
                        "publication missed"
                    );
                    listener.on_publication_missed().await;
                    next_check = next;
                }
            }
        }

        debug!(
            event = events::MISSED_PUBLICATION_TIMER_STOP,
            component = COMPONENT,
            subscription_id = subscription_id.as_str(),
            "missed publication timer stopped"
        );
    });
}
