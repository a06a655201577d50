//! # hfp-call-core
//!
//! Call-session tracking and SCO audio admission for a Bluetooth Hands-Free
//! Profile accessory (a headset or car kit talking to a phone).
//!
//! The profile service below this crate speaks the AT protocol and owns the
//! radio. It reports what happens on the link as [`HfpEvent`]s. This crate turns
//! that stream into one call state, decides when the phone may open the SCO
//! audio link, rate-limits AT traffic, tracks the voice assistant and tells the
//! application what changed through [`SessionNotification`]s.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use hfp_call_core::{FixedPlatform, HfpConfig, HfpEvent, HfpManager, ProfileService};
//!
//! # async fn example(service: Arc<dyn ProfileService>) -> hfp_call_core::Result<()> {
//! let manager = HfpManager::start(HfpConfig::default(), service, Arc::new(FixedPlatform::default()))?;
//! let mut notifications = manager.subscribe();
//!
//! manager.dispatch(HfpEvent::Connected).await?;
//! manager.dial("5550100").await?;
//!
//! while let Ok(notification) = notifications.recv().await {
//!     println!("{}", notification.tag());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Layout
//!
//! - [`session`]: the call state machine and the Siri sub-mode
//! - [`gate`]: the two-veto SCO admission gate
//! - [`throttle`]: AT command and call-list query spacing
//! - [`deferred`]: the single-slot reconciliation timer
//! - [`manager`]: the task that owns the session
//! - [`volume`], [`cclk`]: value conversions

pub mod cclk;
pub mod config;
pub mod deferred;
pub mod error;
pub mod events;
pub mod gate;
pub mod logging;
pub mod manager;
pub mod service;
pub mod session;
pub mod throttle;
pub mod volume;

#[cfg(test)]
mod testing;

pub use config::HfpConfig;
pub use error::{HfpError, Result, ServiceError};
pub use events::{ClccInfo, CodecInfo, HfpEvent, SessionNotification, SiriChange};
pub use gate::{AdmissionGate, Veto};
pub use logging::{setup_logging, LoggingConfig};
pub use manager::HfpManager;
pub use service::{
    BatteryReportMode, CallStateBits, FixedPlatform, HfpCommand, HostPlatform, ProfileService,
};
pub use session::{AppCommand, CallSession, CallState, SessionSnapshot, SiriMode};
pub use volume::{device_to_hfp, hfp_to_device};
