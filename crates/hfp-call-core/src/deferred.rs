//! Single-slot deferred reconciliation task
//!
//! The task is only a deadline. The manager's dispatch loop sleeps until it and
//! then runs the reconciliation on the same serialized context as events, so
//! the callback always sees a consistent session.

use std::time::Duration;

use tokio::time::Instant;

/// Why the task was armed, kept for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileReason {
    OngoingSettled,
    MultipartySettled,
}

/// Cancel-and-replace one-shot timer
#[derive(Debug, Clone, Default)]
pub struct DeferredTask {
    due: Option<(Instant, ReconcileReason)>,
}

impl DeferredTask {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm for `delay` after `now`, replacing any pending due time
    pub fn arm(&mut self, now: Instant, delay: Duration, reason: ReconcileReason) {
        self.due = Some((now + delay, reason));
    }

    pub fn cancel(&mut self) {
        self.due = None;
    }

    pub fn is_armed(&self) -> bool {
        self.due.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.due.map(|(at, _)| at)
    }

    /// Clear the slot and return the reason if the deadline has passed
    pub fn take_due(&mut self, now: Instant) -> Option<ReconcileReason> {
        match self.due {
            Some((at, reason)) if at <= now => {
                self.due = None;
                Some(reason)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rearm_replaces() {
        let start = Instant::now();
        let mut task = DeferredTask::new();

        task.arm(start, Duration::from_millis(2000), ReconcileReason::OngoingSettled);
        task.arm(
            start + Duration::from_millis(500),
            Duration::from_millis(2000),
            ReconcileReason::MultipartySettled,
        );
        assert_eq!(task.deadline(), Some(start + Duration::from_millis(2500)));

        assert_eq!(task.take_due(start + Duration::from_millis(2000)), None);
        assert!(task.is_armed());
        assert_eq!(
            task.take_due(start + Duration::from_millis(2500)),
            Some(ReconcileReason::MultipartySettled)
        );
        assert!(!task.is_armed());
        assert_eq!(task.take_due(start + Duration::from_millis(9000)), None);
    }

    #[test]
    fn test_cancel() {
        let start = Instant::now();
        let mut task = DeferredTask::new();
        task.arm(start, Duration::from_millis(10), ReconcileReason::OngoingSettled);
        task.cancel();
        assert!(task.deadline().is_none());
        assert_eq!(task.take_due(start + Duration::from_secs(1)), None);
    }
}
