// Shared helpers for the integration tests
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::time::Instant;

use hfp_call_core::{
    CallSession, CallStateBits, FixedPlatform, HfpCommand, HfpConfig, HfpEvent, ProfileService,
    ServiceError, SessionNotification,
};

/// Profile service double that records what the session asked for
#[derive(Default)]
pub struct MockProfileService {
    commands: Mutex<Vec<HfpCommand>>,
    call_state: Mutex<Option<CallStateBits>>,
}

impl MockProfileService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn commands(&self) -> Vec<HfpCommand> {
        self.commands.lock().clone()
    }

    pub fn clear(&self) {
        self.commands.lock().clear();
    }

    pub fn call_list_queries(&self) -> usize {
        self.commands.lock().iter().filter(|c| c.is_call_list_query()).count()
    }

    pub fn permits(&self) -> Vec<bool> {
        self.commands
            .lock()
            .iter()
            .filter_map(|c| match c {
                HfpCommand::PermitSco(allowed) => Some(*allowed),
                _ => None,
            })
            .collect()
    }

    pub fn set_call_state(&self, bits: Option<CallStateBits>) {
        *self.call_state.lock() = bits;
    }
}

#[async_trait]
impl ProfileService for MockProfileService {
    async fn execute(&self, command: HfpCommand) -> Result<(), ServiceError> {
        self.commands.lock().push(command);
        Ok(())
    }

    async fn call_state(&self, _active_call: bool) -> Option<CallStateBits> {
        *self.call_state.lock()
    }

    fn phone_service_ready(&self) -> bool {
        true
    }
}

/// A started session driven with explicit timestamps
pub struct SessionFixture {
    pub session: CallSession,
    pub service: Arc<MockProfileService>,
    pub notifications: broadcast::Receiver<SessionNotification>,
    pub origin: Instant,
}

impl SessionFixture {
    pub async fn connected() -> Self {
        let mut fixture = Self::new(HfpConfig::default()).await;
        fixture.feed(HfpEvent::Connected, 0).await;
        fixture.service.clear();
        fixture.drain();
        fixture
    }

    pub async fn new(config: HfpConfig) -> Self {
        let service = MockProfileService::new();
        let (tx, notifications) = broadcast::channel(256);
        let mut session = CallSession::new(
            config,
            service.clone(),
            Arc::new(FixedPlatform::default()),
            tx,
        );
        session.start().await;
        service.clear();
        Self {
            session,
            service,
            notifications,
            origin: Instant::now(),
        }
    }

    pub fn at(&self, millis: u64) -> Instant {
        self.origin + Duration::from_millis(millis)
    }

    pub async fn feed(&mut self, event: HfpEvent, millis: u64) {
        let now = self.at(millis);
        self.session.handle_event(event, now).await;
    }

    pub async fn tick(&mut self, millis: u64) {
        let now = self.at(millis);
        self.session.on_deferred_due(now).await;
    }

    pub fn drain(&mut self) -> Vec<SessionNotification> {
        let mut out = Vec::new();
        while let Ok(n) = self.notifications.try_recv() {
            out.push(n);
        }
        out
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("hfp_call_core=debug")
        .with_test_writer()
        .try_init();
}
