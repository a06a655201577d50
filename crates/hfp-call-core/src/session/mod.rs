//! Call session state machine
//!
//! [`CallSession`] turns the stream of profile-service events into one coherent
//! call state and decides when SCO audio may be established. It is owned by the
//! manager's dispatch task and never entered concurrently, so it holds plain
//! fields and takes `&mut self` everywhere.
//!
//! # States
//!
//! ```text
//!            CallIncoming            CallOngoing
//!   None ───────────────▶ Incoming ─────────────▶ Ongoing ◀──┐
//!    ▲ │    CallOutgoing/Alerted        ▲             │      │ CallOngoing
//!    │ └────────────────▶ Outgoing ─────┘   Call3WayIn│      │
//!    │                                                ▼      │
//!    │ CallExit (from any)               ThreeWayIn / MultiParty
//!    │
//!    └── bare Sco while Siri runs ──▶ Siri
//! ```
//!
//! The Siri sub-mode ([`SiriMode`]) runs orthogonally to the call state.
//!
//! All handlers take the current time explicitly; the manager passes
//! `Instant::now()`, tests pass whatever instants the scenario needs.

mod commands;
mod machine;
mod siri;

pub use commands::AppCommand;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::HfpConfig;
use crate::deferred::DeferredTask;
use crate::events::SessionNotification;
use crate::gate::AdmissionGate;
use crate::service::{HfpCommand, HostPlatform, ProfileService};
use crate::throttle::CommandThrottle;

/// Call state of the hands-free session, exactly one at a time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CallState {
    #[default]
    None,
    Incoming,
    Outgoing,
    Ongoing,
    ThreeWayIn,
    MultiParty,
    Siri,
}

impl fmt::Display for CallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CallState::None => "none",
            CallState::Incoming => "incoming",
            CallState::Outgoing => "outgoing",
            CallState::Ongoing => "ongoing",
            CallState::ThreeWayIn => "three-way-in",
            CallState::MultiParty => "multiparty",
            CallState::Siri => "siri",
        };
        f.write_str(name)
    }
}

/// Voice-assistant overlay mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SiriMode {
    #[default]
    Init,
    Starting,
    Running,
}

/// Point-in-time view of the session, for diagnostics and tests
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub connected: bool,
    pub call_state: CallState,
    pub siri_mode: SiriMode,
    pub only_sco: bool,
    pub app_allowed: bool,
    pub manager_allowed: bool,
    pub sco_allowed: bool,
    pub has_phone_number: bool,
    pub accepted_locally: bool,
    pub simulated_outgoing: bool,
    pub ongoing_before_connected: bool,
    pub siri_sco_connected: bool,
    pub pending_incoming: bool,
    pub hprec_battery: bool,
    pub sco_connected: bool,
    pub reconciliation_armed: bool,
}

/// The hands-free call session
pub struct CallSession {
    config: HfpConfig,
    service: Arc<dyn ProfileService>,
    platform: Arc<dyn HostPlatform>,
    notifier: broadcast::Sender<SessionNotification>,
    gate: AdmissionGate,
    throttle: CommandThrottle,
    deferred: DeferredTask,

    connected: bool,
    call_state: CallState,
    siri_mode: SiriMode,
    /// SCO exists with no call behind it
    only_sco: bool,
    has_phone_number: bool,
    accepted_locally: bool,
    simulated_outgoing: bool,
    ongoing_before_connected: bool,
    siri_sco_connected: bool,
    pending_incoming: bool,
    hprec_battery: bool,
    sco_connected_at: Option<Instant>,
    outgoing_at: Option<Instant>,
    ongoing_at: Option<Instant>,
}

impl CallSession {
    /// Create a session. Call [`CallSession::start`] before feeding events.
    pub fn new(
        config: HfpConfig,
        service: Arc<dyn ProfileService>,
        platform: Arc<dyn HostPlatform>,
        notifier: broadcast::Sender<SessionNotification>,
    ) -> Self {
        let gate = AdmissionGate::new(service.clone(), config.force_sco_allowed);
        Self {
            config,
            service,
            platform,
            notifier,
            gate,
            throttle: CommandThrottle::default(),
            deferred: DeferredTask::new(),
            connected: false,
            call_state: CallState::None,
            siri_mode: SiriMode::Init,
            only_sco: false,
            has_phone_number: false,
            accepted_locally: false,
            simulated_outgoing: false,
            ongoing_before_connected: false,
            siri_sco_connected: false,
            pending_incoming: false,
            hprec_battery: false,
            sco_connected_at: None,
            outgoing_at: None,
            ongoing_at: None,
        }
    }

    /// Close the manager veto: no SCO until a call asks for it
    pub async fn start(&mut self) {
        self.gate.set_manager_allowed(false).await;
    }

    /// Cancel pending work when the profile manager stops
    pub fn shutdown(&mut self) {
        self.deferred.cancel();
    }

    pub fn call_state(&self) -> CallState {
        self.call_state
    }

    pub fn siri_mode(&self) -> SiriMode {
        self.siri_mode
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn gate(&self) -> &AdmissionGate {
        &self.gate
    }

    pub fn is_simulated_outgoing(&self) -> bool {
        self.simulated_outgoing
    }

    pub fn is_pending_incoming(&self) -> bool {
        self.pending_incoming
    }

    /// Deadline of the armed reconciliation, if any
    pub fn reconciliation_deadline(&self) -> Option<Instant> {
        self.deferred.deadline()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            connected: self.connected,
            call_state: self.call_state,
            siri_mode: self.siri_mode,
            only_sco: self.only_sco,
            app_allowed: self.gate.app_allowed(),
            manager_allowed: self.gate.manager_allowed(),
            sco_allowed: self.gate.effective_allowed(),
            has_phone_number: self.has_phone_number,
            accepted_locally: self.accepted_locally,
            simulated_outgoing: self.simulated_outgoing,
            ongoing_before_connected: self.ongoing_before_connected,
            siri_sco_connected: self.siri_sco_connected,
            pending_incoming: self.pending_incoming,
            hprec_battery: self.hprec_battery,
            sco_connected: self.sco_connected_at.is_some(),
            reconciliation_armed: self.deferred.is_armed(),
        }
    }

    /// Log the full session state at debug level
    pub fn dump_info(&self) {
        match serde_json::to_string(&self.snapshot()) {
            Ok(json) => debug!(target: "hfp_call_core::dump", "hfp info {}", json),
            Err(e) => warn!("failed to serialize session snapshot: {}", e),
        }
    }

    fn notify(&self, notification: SessionNotification) {
        debug!(tag = notification.tag(), "notify");
        // No receivers is fine, the UI may not be up yet
        let _ = self.notifier.send(notification);
    }

    /// Issue a command the session decided on by itself; failures are only logged
    async fn issue(&self, command: HfpCommand) {
        let name = command.name();
        if let Err(e) = self.service.execute(command).await {
            warn!(command = name, error = %e, "profile service command failed");
        }
    }

    async fn query_call_list(&mut self, force: bool, now: Instant) {
        if self.throttle.try_call_list_query(force, now) {
            self.issue(HfpCommand::call_list_query()).await;
        } else {
            debug!("call list query throttled");
        }
    }

    fn sco_connected(&self) -> bool {
        self.sco_connected_at.is_some()
    }

    fn reset_call_flags(&mut self) {
        self.has_phone_number = false;
        self.accepted_locally = false;
        self.simulated_outgoing = false;
        self.siri_sco_connected = false;
        self.pending_incoming = false;
    }
}
