//! AT command throttle
//!
//! Phones drop or reorder AT commands that arrive in quick succession, so user
//! commands and call list queries are spaced at least
//! [`AT_COMMAND_INTERVAL`](crate::config::timing::AT_COMMAND_INTERVAL) apart.
//! The two kinds keep independent timestamps.

use std::time::Duration;

use tokio::time::Instant;

use crate::config::timing::AT_COMMAND_INTERVAL;

/// Timestamp-gated limiter for outbound AT commands
#[derive(Debug, Clone)]
pub struct CommandThrottle {
    interval: Duration,
    last_at_command: Option<Instant>,
    last_call_list_query: Option<Instant>,
}

impl Default for CommandThrottle {
    fn default() -> Self {
        Self::new(AT_COMMAND_INTERVAL)
    }
}

impl CommandThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_at_command: None,
            last_call_list_query: None,
        }
    }

    /// Accept an AT command at `now` if the interval has elapsed since the last one
    pub fn try_at_command(&mut self, now: Instant) -> bool {
        Self::try_slot(&mut self.last_at_command, self.interval, now)
    }

    /// Accept a call list query; `force` bypasses the interval
    pub fn try_call_list_query(&mut self, force: bool, now: Instant) -> bool {
        if force {
            self.last_call_list_query = Some(now);
            return true;
        }
        Self::try_slot(&mut self.last_call_list_query, self.interval, now)
    }

    /// Time of the last accepted AT command
    pub fn last_at_command(&self) -> Option<Instant> {
        self.last_at_command
    }

    pub fn reset(&mut self) {
        self.last_at_command = None;
        self.last_call_list_query = None;
    }

    fn try_slot(slot: &mut Option<Instant>, interval: Duration, now: Instant) -> bool {
        if let Some(last) = *slot {
            if now.saturating_duration_since(last) < interval {
                return false;
            }
        }
        *slot = Some(now);
        true
    }
}
