//! Error types for the hands-free call manager
//!
//! Nothing in the call manager is fatal. Errors fall into a few categories, and
//! each category has its own expected reaction from the caller:
//!
//! - **Throttled** - the command throttle suppressed an outbound AT command.
//!   Not a real failure: try again later and take no other action.
//! - **Not applicable** - the command makes no sense in the current call state
//!   (e.g. accepting a call while idle). Rejected locally, the phone is never
//!   contacted.
//! - **Service failures** - the profile service acknowledged the command with a
//!   failure. Logged, never retried, session state is left unchanged.
//! - **Manager stopped** - the dispatch task is gone, usually because the
//!   profile manager was stopped.
//!
//! Inconsistent inbound events are not errors at all; the state machine absorbs
//! them through its guard clauses.

use thiserror::Error;

use crate::session::CallState;

/// Result type for hands-free call manager operations
pub type Result<T> = std::result::Result<T, HfpError>;

/// Failure reported by the profile service when it acknowledges a command
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// The phone or the local stack refused the command
    #[error("profile service rejected {command} (code {code})")]
    Rejected {
        /// Name of the rejected command
        command: &'static str,
        /// Stack-specific status code
        code: i32,
    },

    /// The service-level link is not available
    #[error("profile service unavailable")]
    Unavailable,
}

/// Errors returned by the hands-free call manager API
#[derive(Debug, Error)]
pub enum HfpError {
    /// Suppressed by the AT command throttle
    #[error("{command} throttled, try again later")]
    Throttled { command: &'static str },

    /// Command is meaningless in the current call state
    #[error("{command} not applicable in call state {state}")]
    NotApplicable {
        command: &'static str,
        state: CallState,
    },

    /// Command needs an established service-level connection
    #[error("{command} requires a connected hands-free link")]
    NotConnected { command: &'static str },

    /// Phone reports its telephony service is not ready
    #[error("phone service not ready for {command}")]
    PhoneServiceNotReady { command: &'static str },

    /// Profile service acknowledged the command with a failure
    #[error("profile service error: {0}")]
    Service(#[from] ServiceError),

    /// The manager's dispatch task is no longer running
    #[error("hands-free manager stopped")]
    ManagerStopped,

    /// Invalid configuration
    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl HfpError {
    /// Create a not-applicable error for `command` in `state`
    pub fn not_applicable(command: &'static str, state: CallState) -> Self {
        Self::NotApplicable { command, state }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// True when the command was only suppressed by the throttle
    pub fn is_throttled(&self) -> bool {
        matches!(self, Self::Throttled { .. })
    }

    /// True when repeating the same command later may succeed
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Throttled { .. } => true,
            Self::PhoneServiceNotReady { .. } => true,
            Self::NotConnected { .. } => true,
            Self::Service(ServiceError::Unavailable) => true,
            Self::Service(ServiceError::Rejected { .. }) => false,
            Self::NotApplicable { .. } => false,
            Self::ManagerStopped => false,
            Self::Configuration { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let throttled = HfpError::Throttled { command: "Dial" };
        assert!(throttled.is_throttled());
        assert!(throttled.is_recoverable());

        let not_applicable = HfpError::not_applicable("AcceptCall", CallState::None);
        assert!(!not_applicable.is_throttled());
        assert!(!not_applicable.is_recoverable());

        let rejected: HfpError = ServiceError::Rejected { command: "Dial", code: -5 }.into();
        assert!(!rejected.is_recoverable());
        assert!(HfpError::from(ServiceError::Unavailable).is_recoverable());
    }

    #[test]
    fn test_error_display() {
        let err = HfpError::not_applicable("AcceptCall", CallState::None);
        assert_eq!(err.to_string(), "AcceptCall not applicable in call state none");

        let err = HfpError::config("max_volume_level must be greater than zero");
        assert!(err.to_string().starts_with("Configuration error"));
    }
}
