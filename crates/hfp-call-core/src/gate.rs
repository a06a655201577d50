//! SCO admission gate
//!
//! Two independent vetoes decide whether the phone may open the SCO audio link:
//! the application's (e.g. "no call audio while the alarm rings") and the call
//! manager's own (e.g. "not while the phone is juggling calls"). SCO is allowed
//! only when both are open, unless test mode forces admission.
//!
//! The gate mirrors the service's SCO-accept switch: it issues exactly one
//! `PermitSco` command per edge of the derived value and nothing on repeated
//! identical updates.

use std::fmt;
use std::sync::Arc;

use tracing::{info, warn};

use crate::service::{HfpCommand, ProfileService};

/// Which veto an update targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Veto {
    App,
    Manager,
}

impl fmt::Display for Veto {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Veto::App => f.write_str("app"),
            Veto::Manager => f.write_str("manager"),
        }
    }
}

/// Two-veto SCO admission gate
pub struct AdmissionGate {
    app_allowed: bool,
    manager_allowed: bool,
    forced: bool,
    /// Last value communicated to the service
    permitted: bool,
    service: Arc<dyn ProfileService>,
}

impl AdmissionGate {
    /// Create a gate with both vetoes open.
    ///
    /// The service's switch is assumed open as well, matching its power-on state.
    pub fn new(service: Arc<dyn ProfileService>, forced: bool) -> Self {
        Self {
            app_allowed: true,
            manager_allowed: true,
            forced,
            permitted: true,
            service,
        }
    }

    pub fn app_allowed(&self) -> bool {
        self.app_allowed
    }

    pub fn manager_allowed(&self) -> bool {
        self.manager_allowed
    }

    /// Whether SCO may currently be established
    pub fn effective_allowed(&self) -> bool {
        self.forced || (self.app_allowed && self.manager_allowed)
    }

    /// Update the application veto
    pub async fn set_app_allowed(&mut self, allowed: bool) {
        self.update(Veto::App, allowed).await;
    }

    /// Update the call manager veto
    pub async fn set_manager_allowed(&mut self, allowed: bool) {
        self.update(Veto::Manager, allowed).await;
    }

    async fn update(&mut self, veto: Veto, allowed: bool) {
        let before = self.effective_allowed();
        match veto {
            Veto::App => self.app_allowed = allowed,
            Veto::Manager => self.manager_allowed = allowed,
        }
        let after = self.effective_allowed();

        info!(
            %veto,
            allowed,
            app = self.app_allowed,
            manager = self.manager_allowed,
            "allow sco {} -> {}",
            before,
            after
        );

        if after == self.permitted {
            return;
        }
        self.permitted = after;

        // Not retried: the next event re-derives the admission anyway.
        if let Err(e) = self.service.execute(HfpCommand::PermitSco(after)).await {
            warn!(error = %e, permit = after, "failed to update sco admission");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingService;

    fn permits(service: &RecordingService) -> Vec<bool> {
        service
            .commands()
            .into_iter()
            .filter_map(|c| match c {
                HfpCommand::PermitSco(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_both_vetoes_required() {
        let service = Arc::new(RecordingService::new());
        let mut gate = AdmissionGate::new(service.clone(), false);
        assert!(gate.effective_allowed());

        gate.set_manager_allowed(false).await;
        assert!(!gate.effective_allowed());

        gate.set_app_allowed(false).await;
        gate.set_manager_allowed(true).await;
        assert!(!gate.effective_allowed());

        gate.set_app_allowed(true).await;
        assert!(gate.effective_allowed());

        assert_eq!(permits(&service), vec![false, true]);
    }

    #[tokio::test]
    async fn test_repeated_updates_are_idempotent() {
        let service = Arc::new(RecordingService::new());
        let mut gate = AdmissionGate::new(service.clone(), false);

        for _ in 0..3 {
            gate.set_manager_allowed(false).await;
        }
        for _ in 0..3 {
            gate.set_manager_allowed(true).await;
        }
        assert_eq!(permits(&service), vec![false, true]);
    }

    #[tokio::test]
    async fn test_forced_mode_never_closes() {
        let service = Arc::new(RecordingService::new());
        let mut gate = AdmissionGate::new(service.clone(), true);

        gate.set_manager_allowed(false).await;
        gate.set_app_allowed(false).await;
        assert!(gate.effective_allowed());
        assert!(!gate.manager_allowed());
        assert!(permits(&service).is_empty());
    }

    #[tokio::test]
    async fn test_service_failure_is_not_retried() {
        let service = Arc::new(RecordingService::new());
        service.fail_all(true);
        let mut gate = AdmissionGate::new(service.clone(), false);

        gate.set_manager_allowed(false).await;
        gate.set_manager_allowed(false).await;
        assert_eq!(permits(&service), vec![false]);
    }
}
