// Event dispatch and call-state transitions

use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::{CallSession, CallState, SiriMode};
use crate::cclk::parse_cclk;
use crate::config::timing::{
    ONGOING_ADMISSION_DELAY, SIMULATED_OUTGOING_THRESHOLD, VOLUME_ECHO_WINDOW,
};
use crate::deferred::ReconcileReason;
use crate::events::{ClccInfo, HfpEvent, SessionNotification};
use crate::service::{battery_decile, BatteryReportMode, HfpCommand};
use crate::volume::{device_to_hfp, hfp_to_device};

fn within(since: Option<Instant>, now: Instant, window: std::time::Duration) -> bool {
    since.map_or(false, |at| now.saturating_duration_since(at) < window)
}

impl CallSession {
    /// Consume one profile-service event
    pub async fn handle_event(&mut self, event: HfpEvent, now: Instant) {
        info!(event = event.name(), state = %self.call_state, "hfp event");
        self.dump_info();

        match event {
            HfpEvent::Connected => self.on_connected(now).await,
            HfpEvent::Disconnected => self.on_disconnected().await,
            HfpEvent::PhoneNum(number) => {
                self.has_phone_number = true;
                self.notify(SessionNotification::RingStarted(number));
            }
            HfpEvent::PhoneNumStop => self.notify(SessionNotification::RingStopped),
            HfpEvent::CcwaPhoneNum(number) => {
                if self.sco_connected() {
                    self.notify(SessionNotification::CallWaiting(number));
                } else {
                    debug!("call waiting number ignored without sco");
                }
            }
            HfpEvent::ClccInfo(info) => self.on_clcc_info(info, now).await,
            HfpEvent::CodecInfo(codec) => {
                info!(codec_id = codec.id, sample_rate = codec.sample_rate, "sco codec");
                self.notify(SessionNotification::CodecInfo(codec));
            }
            HfpEvent::CallIncoming => self.on_call_incoming(now).await,
            HfpEvent::CallOutgoing => self.on_call_outgoing(true, now).await,
            HfpEvent::CallAlerted => self.on_call_outgoing(false, now).await,
            HfpEvent::CallOngoing => self.on_call_ongoing(now).await,
            HfpEvent::Call3WayIn => self.on_call_three_way_in().await,
            HfpEvent::CallMultiParty => self.on_call_multiparty(now).await,
            HfpEvent::CallExit => self.on_call_exit().await,
            HfpEvent::Sco => self.on_bare_sco(),
            HfpEvent::VolumeChange(level) => self.on_volume_change(level, now),
            HfpEvent::SiriStateChange(change) => self.on_siri_change(change, now).await,
            HfpEvent::ScoConnected => self.on_sco_connected(now).await,
            HfpEvent::ScoDisconnected => self.on_sco_disconnected(now).await,
            HfpEvent::ActiveDeviceChanged => self.notify(SessionNotification::ActiveDeviceChanged),
            HfpEvent::TimeUpdate(raw) => match parse_cclk(&raw) {
                Some(time) => self.notify(SessionNotification::TimeUpdate(time)),
                None => warn!(raw = %raw, "unparseable phone time"),
            },
            HfpEvent::ScoRejected => {
                if !self.gate.effective_allowed() {
                    self.query_call_list(false, now).await;
                }
            }
            HfpEvent::BatteryHprecCapable => {
                info!("phone accepts 1% battery reports");
                self.hprec_battery = true;
            }
        }
    }

    async fn on_connected(&mut self, now: Instant) {
        self.connected = true;

        let capacity = self.platform.battery_capacity();
        if self.hprec_battery {
            self.issue(HfpCommand::BatteryHprecReport(capacity)).await;
        } else {
            self.issue(HfpCommand::BatteryReport {
                mode: BatteryReportMode::Init,
                value: 0,
            })
            .await;
            self.issue(HfpCommand::BatteryReport {
                mode: BatteryReportMode::Value,
                value: battery_decile(capacity),
            })
            .await;
        }

        if self.config.volume_sync_enabled {
            let level = device_to_hfp(self.platform.voice_volume(), self.config.max_volume_level);
            self.issue(HfpCommand::VolumeControl { kind: 1, level }).await;
        }
        self.issue(HfpCommand::GetTime).await;

        if self.ongoing_before_connected {
            self.ongoing_before_connected = false;
            info!("replaying ongoing received before connect");
            self.on_call_ongoing(now).await;
        }
    }

    async fn on_disconnected(&mut self) {
        self.call_state = CallState::None;
        self.gate.set_manager_allowed(false).await;
        self.connected = false;
        self.siri_mode = SiriMode::Init;
        self.only_sco = false;
        self.reset_call_flags();
        self.ongoing_before_connected = false;
        self.hprec_battery = false;
        self.sco_connected_at = None;
        self.outgoing_at = None;
        self.ongoing_at = None;
        self.deferred.cancel();
        self.throttle.reset();
    }

    pub(super) async fn on_call_incoming(&mut self, now: Instant) {
        if self.call_state == CallState::Siri || self.siri_sco_connected {
            // Resumed once Siri has exited and its SCO is gone
            info!("incoming call interrupts siri, deferring");
            self.pending_incoming = true;
            return;
        }
        self.pending_incoming = false;

        let previous = self.call_state;
        self.call_state = CallState::Incoming;
        self.notify(SessionNotification::CallStateStart);

        self.only_sco = false;
        self.simulated_outgoing = false;
        if previous == CallState::ThreeWayIn && !self.sco_connected() {
            // Audio is not on this device while the phone juggles calls
            info!("incoming during three-way call without sco, audio stays closed");
        } else {
            self.gate.set_manager_allowed(true).await;
            self.notify(SessionNotification::Incoming);
        }

        self.query_call_list(false, now).await;
    }

    async fn on_call_outgoing(&mut self, dialed: bool, now: Instant) {
        if !self.has_phone_number {
            self.query_call_list(false, now).await;
        }
        self.call_state = CallState::Outgoing;
        self.notify(SessionNotification::CallStateStart);

        self.only_sco = false;
        self.simulated_outgoing = false;
        // Alerted arrives too close to ongoing to be a useful reference
        if dialed {
            self.outgoing_at = Some(now);
        }
        self.notify(SessionNotification::Outgoing);
    }

    pub(super) async fn on_call_ongoing(&mut self, now: Instant) {
        if !self.connected {
            info!("ongoing before service level connection, latching");
            self.ongoing_before_connected = true;
            return;
        }

        let previous = self.call_state;
        if matches!(previous, CallState::ThreeWayIn | CallState::MultiParty) {
            // Remote number may have changed
            self.query_call_list(true, now).await;
        }
        self.call_state = CallState::Ongoing;
        self.notify(SessionNotification::CallStateStart);

        if previous == CallState::Incoming && !self.accepted_locally {
            // Answered on the phone: keep audio there, reconciliation may reopen it
            self.gate.set_manager_allowed(false).await;
            if !self.gate.effective_allowed() {
                self.notify(SessionNotification::ScoReleased);
                if self.sco_connected() {
                    self.issue(HfpCommand::SwitchSoundSource).await;
                }
            }
        }

        if within(self.outgoing_at, now, SIMULATED_OUTGOING_THRESHOLD) {
            info!("outgoing turned ongoing too fast, simulated call");
            self.simulated_outgoing = true;
        }

        self.only_sco = false;
        self.accepted_locally = false;
        self.ongoing_at = Some(now);
        self.notify(SessionNotification::Ongoing {
            simulated_outgoing: self.simulated_outgoing,
        });
        self.deferred
            .arm(now, ONGOING_ADMISSION_DELAY, ReconcileReason::OngoingSettled);
    }

    async fn on_call_three_way_in(&mut self) {
        self.call_state = CallState::ThreeWayIn;
        self.only_sco = false;
        if !self.sco_connected() {
            self.gate.set_manager_allowed(false).await;
        }
    }

    async fn on_call_multiparty(&mut self, now: Instant) {
        self.call_state = CallState::MultiParty;
        self.only_sco = false;

        if !self.sco_connected() {
            self.gate.set_manager_allowed(false).await;
            self.deferred
                .arm(now, ONGOING_ADMISSION_DELAY, ReconcileReason::MultipartySettled);
        }
        // Active and held calls may have swapped
        self.query_call_list(true, now).await;

        let bits = self.service.call_state(true).await;
        debug!(?bits, "multiparty call state");
        if bits.map_or(false, |b| b.has_active_or_held()) {
            self.notify(SessionNotification::Ongoing {
                simulated_outgoing: self.simulated_outgoing,
            });
        }
    }

    async fn on_call_exit(&mut self) {
        self.call_state = CallState::None;
        self.gate.set_manager_allowed(false).await;
        self.notify(SessionNotification::Hangup);
        self.notify(SessionNotification::CallStateExit);
        self.reset_call_flags();
        self.outgoing_at = None;
        self.deferred.cancel();
    }

    // Assumes a SCO without a call event is a voice assistant. Other bare-SCO
    // users (some voice-dial implementations) are misclassified.
    fn on_bare_sco(&mut self) {
        self.only_sco = true;
        self.notify(SessionNotification::CallStateStart);

        if self.siri_mode == SiriMode::Starting {
            self.siri_mode = SiriMode::Running;
        }
        if self.siri_mode == SiriMode::Running {
            self.call_state = CallState::Siri;
            self.notify(SessionNotification::SiriMode);
        }
    }

    fn on_volume_change(&mut self, level: u8, now: Instant) {
        if within(self.sco_connected_at, now, VOLUME_ECHO_WINDOW) {
            debug!(level, "dropping volume echo after sco connect");
            return;
        }
        let level = hfp_to_device(level, self.config.max_volume_level);
        self.notify(SessionNotification::VolumeSync { level });
    }

    async fn on_clcc_info(&mut self, info: ClccInfo, now: Instant) {
        if self.simulated_outgoing {
            debug!("call list ignored for simulated outgoing");
            return;
        }
        if info.number.is_empty() {
            return;
        }

        let held_single = self
            .service
            .call_state(true)
            .await
            .map_or(false, |b| b.is_single_held());
        let state = self.call_state;
        let active = info.status == ClccInfo::STATUS_ACTIVE;

        let consistent = match state {
            CallState::Outgoing => true,
            CallState::Ongoing | CallState::ThreeWayIn => active,
            CallState::MultiParty => {
                active || (held_single && info.status == ClccInfo::STATUS_HELD)
            }
            CallState::Incoming => info.status == ClccInfo::STATUS_INCOMING,
            CallState::None | CallState::Siri => false,
        };
        if consistent {
            self.has_phone_number = true;
            self.notify(SessionNotification::ClccInfo(info));
        }

        if !active {
            return;
        }
        match state {
            CallState::MultiParty | CallState::ThreeWayIn if !self.sco_connected() => {
                debug!("phone operating three-way call, sco stays closed");
            }
            CallState::Ongoing if within(self.ongoing_at, now, ONGOING_ADMISSION_DELAY) => {
                debug!("ongoing too recent, reconciliation will admit sco");
            }
            CallState::Ongoing | CallState::MultiParty | CallState::ThreeWayIn => {
                self.gate.set_manager_allowed(true).await;
            }
            _ => {}
        }
    }

    async fn on_sco_connected(&mut self, now: Instant) {
        let state = self.call_state;
        info!(allowed = self.gate.effective_allowed(), %state, "sco connected");

        self.notify(SessionNotification::CallStateStart);
        self.sco_connected_at = Some(now);
        self.notify(SessionNotification::ScoEstablished);

        match state {
            CallState::Incoming => self.gate.set_manager_allowed(false).await,
            CallState::Siri => self.siri_sco_connected = true,
            _ => {}
        }
    }

    async fn on_sco_disconnected(&mut self, now: Instant) {
        let previous = self.call_state;
        info!(only_sco = self.only_sco, state = %previous, "sco disconnected");

        self.sco_connected_at = None;
        self.notify(SessionNotification::ScoReleased);

        if self.only_sco {
            self.only_sco = false;
            self.gate.set_manager_allowed(false).await;
            self.call_state = CallState::None;
            self.notify(SessionNotification::CallStateExit);
        }

        self.siri_mode = SiriMode::Init;
        self.siri_sco_connected = false;
        if previous == CallState::None {
            self.resume_pending_incoming(now).await;
        }
    }

    /// Run the reconciliation if its deadline has passed
    pub async fn on_deferred_due(&mut self, now: Instant) {
        let Some(reason) = self.deferred.take_due(now) else {
            return;
        };
        info!(
            ?reason,
            state = %self.call_state,
            has_number = self.has_phone_number,
            "reconciling sco admission"
        );

        match self.call_state {
            CallState::Ongoing if !self.gate.effective_allowed() => {
                if self.has_phone_number {
                    self.gate.set_manager_allowed(true).await;
                } else {
                    // Some phones never create SCO after a reconnect mid-call
                    self.query_call_list(false, now).await;
                }
            }
            CallState::MultiParty if !self.sco_connected() => {
                self.gate.set_manager_allowed(true).await;
            }
            _ => {}
        }
    }
}
