// Test doubles shared by the unit tests

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::ServiceError;
use crate::service::{CallStateBits, HfpCommand, ProfileService};

/// Profile service that records every command it receives
#[derive(Default)]
pub(crate) struct RecordingService {
    commands: Mutex<Vec<HfpCommand>>,
    call_state: Mutex<Option<CallStateBits>>,
    fail_all: AtomicBool,
    not_ready: AtomicBool,
}

impl RecordingService {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn commands(&self) -> Vec<HfpCommand> {
        self.commands.lock().clone()
    }

    pub(crate) fn clear(&self) {
        self.commands.lock().clear();
    }

    pub(crate) fn count(&self, predicate: impl Fn(&HfpCommand) -> bool) -> usize {
        self.commands.lock().iter().filter(|c| predicate(c)).count()
    }

    pub(crate) fn set_call_state(&self, bits: Option<CallStateBits>) {
        *self.call_state.lock() = bits;
    }

    pub(crate) fn fail_all(&self, fail: bool) {
        self.fail_all.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn set_ready(&self, ready: bool) {
        self.not_ready.store(!ready, Ordering::SeqCst);
    }
}

#[async_trait]
impl ProfileService for RecordingService {
    async fn execute(&self, command: HfpCommand) -> Result<(), ServiceError> {
        let name = command.name();
        self.commands.lock().push(command);
        if self.fail_all.load(Ordering::SeqCst) {
            return Err(ServiceError::Rejected { command: name, code: -1 });
        }
        Ok(())
    }

    async fn call_state(&self, _active_call: bool) -> Option<CallStateBits> {
        *self.call_state.lock()
    }

    fn phone_service_ready(&self) -> bool {
        !self.not_ready.load(Ordering::SeqCst)
    }
}
