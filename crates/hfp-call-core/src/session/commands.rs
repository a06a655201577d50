// Application-issued commands
//
// Commands that make no sense in the current state are rejected before the
// phone is contacted. Throttled ones are refused with `HfpError::Throttled`.

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info};

use super::{CallSession, CallState};
use crate::error::{HfpError, Result};
use crate::service::{battery_decile, BatteryReportMode, HfpCommand};
use crate::volume::device_to_hfp;

/// Commands the application layer can issue through the manager
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppCommand {
    Dial(String),
    DialLast,
    DialMemory(u32),
    AcceptCall,
    RejectCall,
    HangupCall,
    HangupAnotherCall,
    HoldCurrentAnswerCall,
    HangupCurrentAnswerCall,
    StartSiri,
    StopSiri,
    SwitchSoundSource,
    SendAtCommand { text: String, active_call: bool },
    GetTime,
    /// Application veto on SCO admission
    AllowScoConnect(bool),
    /// Push a device-scale voice volume to the phone
    SyncVolumeToRemote(u32),
    VolumeControl { kind: u8, level: u8 },
    /// Battery report from a percentage
    BatteryReport { mode: BatteryReportMode, percent: u8 },
    BatteryHprecReport(u8),
}

impl CallSession {
    /// Run an application command at `now`
    pub async fn execute_command(&mut self, command: AppCommand, now: Instant) -> Result<()> {
        debug!(?command, state = %self.call_state, "app command");
        match command {
            AppCommand::Dial(number) => self.dial(HfpCommand::Dial(number), now).await,
            AppCommand::DialLast => self.dial(HfpCommand::DialLast, now).await,
            AppCommand::DialMemory(index) => self.dial(HfpCommand::DialMemory(index), now).await,
            AppCommand::AcceptCall => self.accept_call().await,
            AppCommand::RejectCall => self.call_control(HfpCommand::RejectCall).await,
            AppCommand::HangupCall => self.call_control(HfpCommand::HangupCall).await,
            AppCommand::HangupAnotherCall => {
                self.throttled_call_control(HfpCommand::HangupAnotherCall, now).await
            }
            AppCommand::HoldCurrentAnswerCall => {
                self.throttled_call_control(HfpCommand::HoldCurrentAnswerCall, now).await
            }
            AppCommand::HangupCurrentAnswerCall => {
                self.throttled_call_control(HfpCommand::HangupCurrentAnswerCall, now).await
            }
            AppCommand::StartSiri => self.start_siri(now).await,
            AppCommand::StopSiri => self.stop_siri(now).await,
            AppCommand::SwitchSoundSource => self.switch_sound_source(now).await,
            AppCommand::SendAtCommand { text, active_call } => {
                self.send(HfpCommand::SendAtCommand { text, active_call }).await
            }
            AppCommand::GetTime => self.send(HfpCommand::GetTime).await,
            AppCommand::AllowScoConnect(allowed) => {
                self.gate.set_app_allowed(allowed).await;
                Ok(())
            }
            AppCommand::SyncVolumeToRemote(device_vol) => {
                let level = device_to_hfp(device_vol, self.config.max_volume_level);
                self.volume_control(1, level).await
            }
            AppCommand::VolumeControl { kind, level } => self.volume_control(kind, level).await,
            AppCommand::BatteryReport { mode, percent } => {
                let value = match mode {
                    BatteryReportMode::Init => percent,
                    BatteryReportMode::Value => battery_decile(percent),
                };
                info!(?mode, value, "battery report");
                self.send(HfpCommand::BatteryReport { mode, value }).await
            }
            AppCommand::BatteryHprecReport(percent) => {
                self.send(HfpCommand::BatteryHprecReport(percent.min(100))).await
            }
        }
    }

    async fn dial(&mut self, command: HfpCommand, now: Instant) -> Result<()> {
        let name = command.name();
        if !self.connected {
            return Err(HfpError::NotConnected { command: name });
        }
        if !self.throttle.try_at_command(now) {
            return Err(HfpError::Throttled { command: name });
        }
        if !self.service.phone_service_ready() {
            return Err(HfpError::PhoneServiceNotReady { command: name });
        }
        self.gate.set_manager_allowed(true).await;
        self.send(command).await
    }

    /// Accept the ringing call on the device
    pub async fn accept_call(&mut self) -> Result<()> {
        if self.call_state == CallState::None {
            return Err(HfpError::not_applicable("AcceptCall", self.call_state));
        }
        info!("accepting call locally");
        if self.call_state == CallState::Incoming {
            self.accepted_locally = true;
        }
        self.gate.set_manager_allowed(true).await;
        self.send(HfpCommand::AcceptCall).await
    }

    async fn call_control(&mut self, command: HfpCommand) -> Result<()> {
        if self.call_state == CallState::None {
            return Err(HfpError::not_applicable(command.name(), self.call_state));
        }
        self.send(command).await
    }

    async fn throttled_call_control(&mut self, command: HfpCommand, now: Instant) -> Result<()> {
        if self.call_state == CallState::None {
            return Err(HfpError::not_applicable(command.name(), self.call_state));
        }
        if !self.throttle.try_at_command(now) {
            return Err(HfpError::Throttled { command: command.name() });
        }
        self.send(command).await
    }

    async fn switch_sound_source(&mut self, now: Instant) -> Result<()> {
        if !self.throttle.try_at_command(now) {
            return Err(HfpError::Throttled { command: "SwitchSoundSource" });
        }
        self.send(HfpCommand::SwitchSoundSource).await
    }

    async fn volume_control(&mut self, kind: u8, level: u8) -> Result<()> {
        if !self.config.volume_sync_enabled {
            debug!(level, "volume sync disabled");
            return Ok(());
        }
        self.send(HfpCommand::VolumeControl { kind, level: level.min(15) }).await
    }

    async fn send(&self, command: HfpCommand) -> Result<()> {
        self.service.execute(command).await?;
        Ok(())
    }
}
