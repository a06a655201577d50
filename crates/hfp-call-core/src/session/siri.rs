// Voice-assistant sub-mode
//
// Init -> Starting -> Running -> Init. Starting comes from our own start
// command being acknowledged, Running from the SCO that follows it or from the
// phone's AT-level activation. An incoming call that arrives while Siri owns
// the audio is parked in `pending_incoming` and replayed after both the mode
// and the Siri SCO are gone; phones disagree on which of the two ends first.

use tokio::time::Instant;
use tracing::{debug, info};

use super::{CallSession, CallState, SiriMode};
use crate::error::{HfpError, Result};
use crate::events::{SessionNotification, SiriChange};
use crate::service::HfpCommand;

impl CallSession {
    pub(super) async fn on_siri_change(&mut self, change: SiriChange, now: Instant) {
        info!(?change, mode = ?self.siri_mode, "siri state change");
        match change {
            SiriChange::Activated => {
                self.siri_mode = SiriMode::Running;
                self.call_state = CallState::Siri;
                self.notify(SessionNotification::SiriStarted);
            }
            SiriChange::Starting => {
                // Lets the voice prompt SCO through
                self.gate.set_manager_allowed(true).await;
                self.siri_mode = SiriMode::Starting;
                self.notify(SessionNotification::SiriStarted);
            }
            SiriChange::Deactivated => {
                self.siri_mode = SiriMode::Init;
                if self.call_state == CallState::Siri {
                    self.call_state = CallState::None;
                }
                self.notify(SessionNotification::SiriStopped);
                if !self.only_sco {
                    self.gate.set_manager_allowed(false).await;
                }
                self.resume_pending_incoming(now).await;
            }
        }
    }

    pub(super) async fn resume_pending_incoming(&mut self, now: Instant) {
        if self.pending_incoming
            && self.siri_mode == SiriMode::Init
            && self.call_state == CallState::None
            && !self.siri_sco_connected
        {
            info!("resuming incoming call deferred by siri");
            self.on_call_incoming(now).await;
        }
    }

    /// Ask the phone to start voice recognition
    pub async fn start_siri(&mut self, now: Instant) -> Result<()> {
        if !self.throttle.try_at_command(now) {
            return Err(HfpError::Throttled { command: "StartVoiceRecognition" });
        }
        if self.siri_mode == SiriMode::Running {
            debug!("siri already running");
            return Ok(());
        }
        self.service.execute(HfpCommand::StartVoiceRecognition).await?;
        Ok(())
    }

    /// Ask the phone to stop voice recognition
    pub async fn stop_siri(&mut self, now: Instant) -> Result<()> {
        if !self.throttle.try_at_command(now) {
            return Err(HfpError::Throttled { command: "StopVoiceRecognition" });
        }
        if self.siri_mode == SiriMode::Init {
            debug!("siri not active");
            return Ok(());
        }
        // A rejected stop leaves Siri as it is; the phone's deactivation still ends it
        self.service.execute(HfpCommand::StopVoiceRecognition).await?;
        self.notify(SessionNotification::SiriStopped);

        // With a bare SCO up, ScoDisconnected finishes the exit
        if !self.only_sco {
            self.gate.set_manager_allowed(false).await;
            self.siri_mode = SiriMode::Init;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::Harness;
    use super::*;
    use crate::config::HfpConfig;
    use crate::events::HfpEvent;

    async fn connected() -> Harness {
        let mut h = Harness::new(HfpConfig::default()).await;
        h.feed(HfpEvent::Connected, 0).await;
        h.service.clear();
        h.drain();
        h
    }

    #[tokio::test]
    async fn test_start_then_sco_enters_siri() {
        let mut h = connected().await;
        h.session.start_siri(h.at(0)).await.unwrap();
        assert_eq!(h.service.commands(), vec![HfpCommand::StartVoiceRecognition]);

        h.feed(HfpEvent::SiriStateChange(SiriChange::Starting), 100).await;
        assert_eq!(h.session.siri_mode(), SiriMode::Starting);
        assert!(h.session.gate().manager_allowed());

        h.feed(HfpEvent::Sco, 300).await;
        h.feed(HfpEvent::ScoConnected, 310).await;
        assert_eq!(h.session.siri_mode(), SiriMode::Running);
        assert_eq!(h.session.call_state(), CallState::Siri);
        assert!(h.session.snapshot().siri_sco_connected);
        assert!(h.drain().contains(&SessionNotification::SiriMode));
    }

    #[tokio::test]
    async fn test_start_siri_skipped_while_running() {
        let mut h = connected().await;
        h.feed(HfpEvent::SiriStateChange(SiriChange::Activated), 0).await;
        h.session.start_siri(h.at(0)).await.unwrap();
        assert!(h.service.commands().is_empty());

        let err = h.session.start_siri(h.at(100)).await.unwrap_err();
        assert!(err.is_throttled());
    }

    #[tokio::test]
    async fn test_stop_siri_without_bare_sco_resets_mode() {
        let mut h = connected().await;
        h.feed(HfpEvent::SiriStateChange(SiriChange::Starting), 0).await;
        h.drain();

        h.session.stop_siri(h.at(0)).await.unwrap();
        assert_eq!(h.session.siri_mode(), SiriMode::Init);
        assert!(!h.session.gate().manager_allowed());
        assert_eq!(h.drain(), vec![SessionNotification::SiriStopped]);
        assert!(h.service.commands().contains(&HfpCommand::StopVoiceRecognition));
    }

    #[tokio::test]
    async fn test_stop_siri_with_bare_sco_waits_for_release() {
        let mut h = connected().await;
        h.feed(HfpEvent::SiriStateChange(SiriChange::Starting), 0).await;
        h.feed(HfpEvent::Sco, 10).await;

        h.session.stop_siri(h.at(20)).await.unwrap();
        assert_eq!(h.session.siri_mode(), SiriMode::Running);
        assert!(h.session.gate().manager_allowed());

        h.feed(HfpEvent::ScoDisconnected, 500).await;
        assert_eq!(h.session.siri_mode(), SiriMode::Init);
        assert_eq!(h.session.call_state(), CallState::None);
        assert!(!h.session.gate().manager_allowed());
    }

    #[tokio::test]
    async fn test_rejected_stop_keeps_siri() {
        let mut h = connected().await;
        h.feed(HfpEvent::SiriStateChange(SiriChange::Starting), 0).await;
        h.drain();
        h.service.fail_all(true);

        let err = h.session.stop_siri(h.at(0)).await.unwrap_err();
        assert!(matches!(err, HfpError::Service(_)));
        assert_eq!(h.session.siri_mode(), SiriMode::Starting);
        assert!(h.session.gate().manager_allowed());
        assert!(h.drain().is_empty());

        h.feed(HfpEvent::SiriStateChange(SiriChange::Deactivated), 100).await;
        assert_eq!(h.session.siri_mode(), SiriMode::Init);
        assert!(!h.session.gate().manager_allowed());
    }

    #[tokio::test]
    async fn test_stop_siri_when_idle_is_noop() {
        let mut h = connected().await;
        h.session.stop_siri(h.at(0)).await.unwrap();
        assert!(h.service.commands().is_empty());
        assert!(h.drain().is_empty());
    }

    #[tokio::test]
    async fn test_pending_incoming_waits_for_siri_sco() {
        let mut h = connected().await;
        h.feed(HfpEvent::SiriStateChange(SiriChange::Activated), 0).await;
        h.feed(HfpEvent::ScoConnected, 10).await;
        h.feed(HfpEvent::CallIncoming, 20).await;
        assert!(h.session.is_pending_incoming());

        // Siri ends first, its SCO is still up
        h.feed(HfpEvent::SiriStateChange(SiriChange::Deactivated), 30).await;
        assert!(h.session.is_pending_incoming());
        assert!(!h.drain().contains(&SessionNotification::Incoming));

        h.feed(HfpEvent::ScoDisconnected, 40).await;
        assert!(!h.session.is_pending_incoming());
        assert_eq!(h.session.call_state(), CallState::Incoming);
        let incoming = h
            .drain()
            .into_iter()
            .filter(|n| *n == SessionNotification::Incoming)
            .count();
        assert_eq!(incoming, 1);
    }
}
