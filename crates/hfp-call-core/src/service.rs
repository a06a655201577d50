//! Profile-service capability and host collaborators
//!
//! The call manager never talks to the radio directly. Everything it wants the
//! phone to do is expressed as an [`HfpCommand`] handed to a [`ProfileService`],
//! which is the only component that actually opens or closes SCO.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ServiceError;

/// AT command used to list the phone's current calls
pub const CALL_LIST_QUERY: &str = "AT+CLCC";

/// Battery report flavor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatteryReportMode {
    /// Enables battery reporting on the phone
    Init,
    /// Reports a decile level (0..=9)
    Value,
}

/// Commands accepted by the profile service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HfpCommand {
    Dial(String),
    DialLast,
    DialMemory(u32),
    /// Volume sync towards the phone, `level` on the 0..=15 scale
    VolumeControl { kind: u8, level: u8 },
    BatteryReport { mode: BatteryReportMode, value: u8 },
    /// 1%-precision battery report
    BatteryHprecReport(u8),
    AcceptCall,
    RejectCall,
    HangupCall,
    HangupAnotherCall,
    HoldCurrentAnswerCall,
    HangupCurrentAnswerCall,
    StartVoiceRecognition,
    StopVoiceRecognition,
    SwitchSoundSource,
    SendAtCommand { text: String, active_call: bool },
    GetTime,
    /// Toggle the service's SCO-accept switch
    PermitSco(bool),
}

impl HfpCommand {
    /// Short tag used in logs and errors
    pub fn name(&self) -> &'static str {
        match self {
            Self::Dial(_) => "Dial",
            Self::DialLast => "DialLast",
            Self::DialMemory(_) => "DialMemory",
            Self::VolumeControl { .. } => "VolumeControl",
            Self::BatteryReport { .. } => "BatteryReport",
            Self::BatteryHprecReport(_) => "BatteryHprecReport",
            Self::AcceptCall => "AcceptCall",
            Self::RejectCall => "RejectCall",
            Self::HangupCall => "HangupCall",
            Self::HangupAnotherCall => "HangupAnotherCall",
            Self::HoldCurrentAnswerCall => "HoldCurrentAnswerCall",
            Self::HangupCurrentAnswerCall => "HangupCurrentAnswerCall",
            Self::StartVoiceRecognition => "StartVoiceRecognition",
            Self::StopVoiceRecognition => "StopVoiceRecognition",
            Self::SwitchSoundSource => "SwitchSoundSource",
            Self::SendAtCommand { .. } => "SendAtCommand",
            Self::GetTime => "GetTime",
            Self::PermitSco(_) => "PermitSco",
        }
    }

    /// The "list current calls" query
    pub fn call_list_query() -> Self {
        Self::SendAtCommand {
            text: CALL_LIST_QUERY.to_string(),
            active_call: true,
        }
    }

    /// True for the "list current calls" query
    pub fn is_call_list_query(&self) -> bool {
        matches!(self, Self::SendAtCommand { text, .. } if text == CALL_LIST_QUERY)
    }
}

/// Call-state bits the service tracks for the active device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CallStateBits(pub u8);

impl CallStateBits {
    pub const INCOMING: u8 = 0x02;
    pub const HELD: u8 = 0x04;
    pub const ACTIVE: u8 = 0x10;
    /// Upper nibble: any active or held call
    pub const ACTIVE_OR_HELD_MASK: u8 = 0xF0;

    /// Some call is active or held
    pub fn has_active_or_held(self) -> bool {
        self.0 & Self::ACTIVE_OR_HELD_MASK != 0
    }

    /// A held call without an active one
    pub fn is_single_held(self) -> bool {
        self.0 & Self::HELD != 0 && self.0 & Self::ACTIVE == 0
    }
}

/// Outbound capability of the HFP/SCO profile service
///
/// Implementations must not block the caller on radio I/O; a transport that can
/// block should queue the command to its own bounded worker and return.
#[async_trait]
pub trait ProfileService: Send + Sync {
    /// Issue a command; the result is the service's acknowledgement
    async fn execute(&self, command: HfpCommand) -> Result<(), ServiceError>;

    /// Current call-state bits, `None` while the service tracks no call
    async fn call_state(&self, active_call: bool) -> Option<CallStateBits>;

    /// Whether the phone's telephony service can place calls
    fn phone_service_ready(&self) -> bool {
        true
    }
}

/// Device-side values the manager reports to the phone
pub trait HostPlatform: Send + Sync {
    /// Battery capacity in percent
    fn battery_capacity(&self) -> u8;

    /// Current voice stream volume on the device scale
    fn voice_volume(&self) -> u32;
}

/// [`HostPlatform`] returning fixed values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedPlatform {
    pub battery_capacity: u8,
    pub voice_volume: u32,
}

impl Default for FixedPlatform {
    fn default() -> Self {
        Self {
            battery_capacity: 100,
            voice_volume: 8,
        }
    }
}

impl HostPlatform for FixedPlatform {
    fn battery_capacity(&self) -> u8 {
        self.battery_capacity
    }

    fn voice_volume(&self) -> u32 {
        self.voice_volume
    }
}

/// Convert a battery percentage to the decile scale used by `BatteryReport`
pub fn battery_decile(percent: u8) -> u8 {
    (percent / 10).min(9)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_state_bits() {
        assert!(CallStateBits(0x10).has_active_or_held());
        assert!(CallStateBits(0x14).has_active_or_held());
        assert!(!CallStateBits(0x02).has_active_or_held());

        assert!(CallStateBits(0x04).is_single_held());
        assert!(!CallStateBits(0x14).is_single_held());
        assert!(!CallStateBits(0x10).is_single_held());
    }

    #[test]
    fn test_battery_decile() {
        assert_eq!(battery_decile(0), 0);
        assert_eq!(battery_decile(47), 4);
        assert_eq!(battery_decile(99), 9);
        assert_eq!(battery_decile(100), 9);
    }

    #[test]
    fn test_call_list_query() {
        let query = HfpCommand::call_list_query();
        assert!(query.is_call_list_query());
        assert_eq!(query.name(), "SendAtCommand");
        assert!(!HfpCommand::SendAtCommand { text: "AT+CIND?".into(), active_call: true }
            .is_call_list_query());
    }
}
