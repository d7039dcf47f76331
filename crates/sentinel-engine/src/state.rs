//! Mutable per-class alert state.

use chrono::{DateTime, Utc};

/// Counters and timers kept for one monitored class.
///
/// `accumulated_count` returns to 0 exactly when an escalation fires or when
/// monitoring resumes after a suspension expires.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassAlertState {
    /// Detections counted toward the escalation threshold since the last reset.
    pub accumulated_count: u32,
    /// Time of the last single (debounced) alert.
    pub last_single_alert_at: Option<DateTime<Utc>>,
    /// Quiet period set by an escalation.
    pub monitoring_suspended_until: Option<DateTime<Utc>>,
}

impl ClassAlertState {
    /// Clear an expired suspension. Returns true if monitoring resumed.
    pub fn resume_if_expired(&mut self, now: DateTime<Utc>) -> bool {
        match self.monitoring_suspended_until {
            Some(until) if now >= until => {
                self.monitoring_suspended_until = None;
                self.accumulated_count = 0;
                true
            }
            _ => false,
        }
    }

    pub fn is_suspended(&self, now: DateTime<Utc>) -> bool {
        matches!(self.monitoring_suspended_until, Some(until) if now < until)
    }

    /// Reset the counter and start a suspension window ending at `until`.
    pub fn escalate(&mut self, until: DateTime<Utc>) {
        self.accumulated_count = 0;
        self.monitoring_suspended_until = Some(until);
    }
}
