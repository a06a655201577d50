//! Inbound profile-service events and outbound session notifications
//!
//! The profile service reports everything that happens on the hands-free link
//! as an [`HfpEvent`]. The call session consumes these one at a time and emits
//! [`SessionNotification`]s for the application layer.
//!
//! ```text
//!  profile service ──HfpEvent──▶ CallSession ──SessionNotification──▶ application / UI
//!                                    │
//!                                    └──HfpCommand──▶ profile service
//! ```

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// One entry of a "list current calls" (CLCC) query result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClccInfo {
    /// Remote party number, may be empty
    pub number: String,
    /// 0 = outgoing, 1 = incoming
    pub dir: u8,
    /// 0 active, 1 held, 2 dialing, 3 alerting, 4 incoming, 5 waiting
    pub status: u8,
    /// 0 voice, 1 data, 2 fax
    pub mode: u8,
    /// Call is part of a conference
    pub multiparty: bool,
}

impl ClccInfo {
    /// CLCC status of an active call
    pub const STATUS_ACTIVE: u8 = 0;
    /// CLCC status of a held call
    pub const STATUS_HELD: u8 = 1;
    /// CLCC status of a ringing incoming call
    pub const STATUS_INCOMING: u8 = 4;
}

/// Negotiated SCO codec
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodecInfo {
    /// Codec identifier (1 = CVSD, 2 = mSBC)
    pub id: u8,
    /// Sample rate code as reported by the service
    pub sample_rate: u32,
}

/// Voice-assistant state change reported by the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SiriChange {
    /// Phone reports voice recognition ended
    Deactivated,
    /// Phone reports voice recognition active (AT-level notification)
    Activated,
    /// Our start-voice-recognition command was acknowledged
    Starting,
}

/// Events delivered by the HFP profile service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HfpEvent {
    Connected,
    Disconnected,
    PhoneNum(String),
    PhoneNumStop,
    CcwaPhoneNum(String),
    ClccInfo(ClccInfo),
    CodecInfo(CodecInfo),
    CallIncoming,
    CallOutgoing,
    CallAlerted,
    CallOngoing,
    Call3WayIn,
    CallMultiParty,
    CallExit,
    /// SCO created with no call-state event in front of it
    Sco,
    /// Phone-side speaker volume, 0..=15
    VolumeChange(u8),
    SiriStateChange(SiriChange),
    ScoConnected,
    ScoDisconnected,
    ActiveDeviceChanged,
    /// Raw `+CCLK` time string
    TimeUpdate(String),
    ScoRejected,
    BatteryHprecCapable,
}

impl HfpEvent {
    /// Short tag used in logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connected => "Connected",
            Self::Disconnected => "Disconnected",
            Self::PhoneNum(_) => "PhoneNum",
            Self::PhoneNumStop => "PhoneNumStop",
            Self::CcwaPhoneNum(_) => "CcwaPhoneNum",
            Self::ClccInfo(_) => "ClccInfo",
            Self::CodecInfo(_) => "CodecInfo",
            Self::CallIncoming => "CallIncoming",
            Self::CallOutgoing => "CallOutgoing",
            Self::CallAlerted => "CallAlerted",
            Self::CallOngoing => "CallOngoing",
            Self::Call3WayIn => "Call3WayIn",
            Self::CallMultiParty => "CallMultiParty",
            Self::CallExit => "CallExit",
            Self::Sco => "Sco",
            Self::VolumeChange(_) => "VolumeChange",
            Self::SiriStateChange(_) => "SiriStateChange",
            Self::ScoConnected => "ScoConnected",
            Self::ScoDisconnected => "ScoDisconnected",
            Self::ActiveDeviceChanged => "ActiveDeviceChanged",
            Self::TimeUpdate(_) => "TimeUpdate",
            Self::ScoRejected => "ScoRejected",
            Self::BatteryHprecCapable => "BatteryHprecCapable",
        }
    }
}

impl fmt::Display for HfpEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// High-level notifications for the application layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionNotification {
    /// A call (or bare audio session) is starting to need the call UI
    CallStateStart,
    /// The call UI is no longer needed
    CallStateExit,
    Incoming,
    Outgoing,
    /// Call became active. `simulated_outgoing` marks app-placed calls the UI
    /// should not present as a telephony call.
    Ongoing { simulated_outgoing: bool },
    Hangup,
    RingStarted(String),
    RingStopped,
    CallWaiting(String),
    ClccInfo(ClccInfo),
    CodecInfo(CodecInfo),
    ScoEstablished,
    ScoReleased,
    SiriMode,
    SiriStarted,
    SiriStopped,
    ActiveDeviceChanged,
    TimeUpdate(NaiveDateTime),
    /// Phone volume converted to the device scale
    VolumeSync { level: u32 },
}

impl SessionNotification {
    /// Stable tag for logs and UI routing
    pub fn tag(&self) -> &'static str {
        match self {
            Self::CallStateStart => "call-state-start",
            Self::CallStateExit => "call-state-exit",
            Self::Incoming => "incoming",
            Self::Outgoing => "outgoing",
            Self::Ongoing { .. } => "ongoing",
            Self::Hangup => "hangup",
            Self::RingStarted(_) => "ring-started",
            Self::RingStopped => "ring-stopped",
            Self::CallWaiting(_) => "call-waiting",
            Self::ClccInfo(_) => "clcc-info",
            Self::CodecInfo(_) => "codec-info",
            Self::ScoEstablished => "sco-established",
            Self::ScoReleased => "sco-released",
            Self::SiriMode => "siri-mode",
            Self::SiriStarted => "siri-started",
            Self::SiriStopped => "siri-stopped",
            Self::ActiveDeviceChanged => "active-device-changed",
            Self::TimeUpdate(_) => "time-update",
            Self::VolumeSync { .. } => "volume-sync",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_tags() {
        assert_eq!(SessionNotification::CallStateStart.tag(), "call-state-start");
        assert_eq!(
            SessionNotification::Ongoing { simulated_outgoing: true }.tag(),
            "ongoing"
        );
        assert_eq!(SessionNotification::RingStarted("123".into()).tag(), "ring-started");
    }

    #[test]
    fn test_event_names() {
        assert_eq!(HfpEvent::Call3WayIn.to_string(), "Call3WayIn");
        assert_eq!(HfpEvent::SiriStateChange(SiriChange::Starting).name(), "SiriStateChange");
    }
}
