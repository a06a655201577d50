//! Profile manager task
//!
//! The [`CallSession`] lives inside one spawned task. Profile-service events,
//! application commands and the reconciliation timer are all funneled into
//! that task, so the session is only ever touched by a single writer.
//! [`HfpManager`] is the cloneable handle the rest of the host talks to.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::HfpConfig;
use crate::error::{HfpError, Result};
use crate::events::{HfpEvent, SessionNotification};
use crate::service::{BatteryReportMode, HostPlatform, ProfileService};
use crate::session::{AppCommand, CallSession, SessionSnapshot};

enum ManagerRequest {
    Event(HfpEvent),
    Command {
        command: AppCommand,
        reply: oneshot::Sender<Result<()>>,
    },
    Snapshot(oneshot::Sender<SessionSnapshot>),
    DumpInfo,
    Stop,
}

/// Handle to a running HFP profile manager
#[derive(Clone)]
pub struct HfpManager {
    requests: mpsc::Sender<ManagerRequest>,
    notifications: broadcast::Sender<SessionNotification>,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl HfpManager {
    /// Validate `config` and spawn the manager task on the current runtime
    pub fn start(
        config: HfpConfig,
        service: Arc<dyn ProfileService>,
        platform: Arc<dyn HostPlatform>,
    ) -> Result<Self> {
        config.validate()?;

        let (requests, rx) = mpsc::channel(config.command_queue_depth);
        let (notifications, _) = broadcast::channel(config.notification_capacity);
        let session = CallSession::new(config, service, platform, notifications.clone());

        info!("starting hfp profile manager");
        let task = tokio::spawn(run(session, rx));

        Ok(Self {
            requests,
            notifications,
            task: Arc::new(Mutex::new(Some(task))),
        })
    }

    /// Subscribe to session notifications
    pub fn subscribe(&self) -> broadcast::Receiver<SessionNotification> {
        self.notifications.subscribe()
    }

    /// Forward a profile-service event to the session
    pub async fn dispatch(&self, event: HfpEvent) -> Result<()> {
        self.send(ManagerRequest::Event(event)).await
    }

    /// Run an application command and wait for its outcome
    pub async fn execute(&self, command: AppCommand) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(ManagerRequest::Command { command, reply }).await?;
        rx.await.map_err(|_| HfpError::ManagerStopped)?
    }

    pub async fn dial(&self, number: impl Into<String>) -> Result<()> {
        self.execute(AppCommand::Dial(number.into())).await
    }

    pub async fn dial_last(&self) -> Result<()> {
        self.execute(AppCommand::DialLast).await
    }

    pub async fn dial_memory(&self, index: u32) -> Result<()> {
        self.execute(AppCommand::DialMemory(index)).await
    }

    pub async fn accept_call(&self) -> Result<()> {
        self.execute(AppCommand::AcceptCall).await
    }

    pub async fn reject_call(&self) -> Result<()> {
        self.execute(AppCommand::RejectCall).await
    }

    pub async fn hangup_call(&self) -> Result<()> {
        self.execute(AppCommand::HangupCall).await
    }

    pub async fn hangup_another_call(&self) -> Result<()> {
        self.execute(AppCommand::HangupAnotherCall).await
    }

    pub async fn hold_current_answer_call(&self) -> Result<()> {
        self.execute(AppCommand::HoldCurrentAnswerCall).await
    }

    pub async fn hangup_current_answer_call(&self) -> Result<()> {
        self.execute(AppCommand::HangupCurrentAnswerCall).await
    }

    pub async fn start_siri(&self) -> Result<()> {
        self.execute(AppCommand::StartSiri).await
    }

    pub async fn stop_siri(&self) -> Result<()> {
        self.execute(AppCommand::StopSiri).await
    }

    /// Move call audio between the phone and this device
    pub async fn switch_sound_source(&self) -> Result<()> {
        self.execute(AppCommand::SwitchSoundSource).await
    }

    /// Send a raw AT command; not throttled
    pub async fn send_at_command(&self, text: impl Into<String>, active_call: bool) -> Result<()> {
        self.execute(AppCommand::SendAtCommand {
            text: text.into(),
            active_call,
        })
        .await
    }

    /// Request the phone's clock; the answer arrives as a `TimeUpdate` event
    pub async fn get_time(&self) -> Result<()> {
        self.execute(AppCommand::GetTime).await
    }

    /// Set the application veto on SCO admission
    pub async fn allow_sco_connect(&self, allowed: bool) -> Result<()> {
        self.execute(AppCommand::AllowScoConnect(allowed)).await
    }

    /// Push the host's voice volume to the phone
    pub async fn sync_volume_to_remote(&self, device_volume: u32) -> Result<()> {
        self.execute(AppCommand::SyncVolumeToRemote(device_volume)).await
    }

    pub async fn volume_control(&self, kind: u8, level: u8) -> Result<()> {
        self.execute(AppCommand::VolumeControl { kind, level }).await
    }

    pub async fn battery_report(&self, mode: BatteryReportMode, percent: u8) -> Result<()> {
        self.execute(AppCommand::BatteryReport { mode, percent }).await
    }

    pub async fn battery_hprec_report(&self, percent: u8) -> Result<()> {
        self.execute(AppCommand::BatteryHprecReport(percent)).await
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.send(ManagerRequest::Snapshot(reply)).await?;
        rx.await.map_err(|_| HfpError::ManagerStopped)
    }

    /// Log the session state at debug level
    pub async fn dump_info(&self) -> Result<()> {
        self.send(ManagerRequest::DumpInfo).await
    }

    /// Stop the manager task and wait for it to finish
    pub async fn stop(&self) -> Result<()> {
        // Already gone is fine
        let _ = self.requests.send(ManagerRequest::Stop).await;
        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!("hfp manager task ended abnormally: {}", e);
            }
        }
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        !self.requests.is_closed()
    }

    async fn send(&self, request: ManagerRequest) -> Result<()> {
        self.requests
            .send(request)
            .await
            .map_err(|_| HfpError::ManagerStopped)
    }
}

async fn run(mut session: CallSession, mut rx: mpsc::Receiver<ManagerRequest>) {
    session.start().await;

    loop {
        let deadline = session.reconciliation_deadline();
        tokio::select! {
            biased;

            _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                session.on_deferred_due(Instant::now()).await;
            }

            request = rx.recv() => {
                match request {
                    Some(ManagerRequest::Event(event)) => {
                        session.handle_event(event, Instant::now()).await;
                    }
                    Some(ManagerRequest::Command { command, reply }) => {
                        let result = session.execute_command(command, Instant::now()).await;
                        if let Err(e) = &result {
                            debug!(error = %e, "app command refused");
                        }
                        let _ = reply.send(result);
                    }
                    Some(ManagerRequest::Snapshot(reply)) => {
                        let _ = reply.send(session.snapshot());
                    }
                    Some(ManagerRequest::DumpInfo) => session.dump_info(),
                    Some(ManagerRequest::Stop) | None => break,
                }
            }
        }
    }

    session.shutdown();
    info!("hfp profile manager stopped");
}
