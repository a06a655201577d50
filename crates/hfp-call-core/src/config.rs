//! Hands-free manager configuration
//!
//! [`HfpConfig`] holds the few knobs the call manager exposes. Everything else,
//! in particular the timing heuristics, is fixed in [`timing`]: those values
//! encode observed phone behavior and are not meant to be tuned per product.
//!
//! ```rust
//! use hfp_call_core::config::HfpConfig;
//!
//! let config = HfpConfig::new()
//!     .with_max_volume_level(15)
//!     .with_force_sco_allowed(true);
//!
//! assert!(config.validate().is_ok());
//! assert_eq!(config.max_volume_level, 15);
//! ```
//!
//! Configuration can also be loaded from TOML:
//!
//! ```rust
//! use hfp_call_core::config::HfpConfig;
//!
//! let config = HfpConfig::from_toml_str("max_volume_level = 8\n").unwrap();
//! assert_eq!(config.max_volume_level, 8);
//! assert!(!config.force_sco_allowed);
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{HfpError, Result};

/// Timing heuristics working around phone-side protocol quirks
pub mod timing {
    use std::time::Duration;

    /// An outgoing call that turns ongoing faster than this was placed by an
    /// app through the phone dialer, not by the user.
    pub const SIMULATED_OUTGOING_THRESHOLD: Duration = Duration::from_millis(300);

    /// Minimum spacing between two AT commands (and non-forced call list queries).
    pub const AT_COMMAND_INTERVAL: Duration = Duration::from_millis(600);

    /// Phones echo a stale volume right after the SCO link comes up.
    pub const VOLUME_ECHO_WINDOW: Duration = Duration::from_millis(500);

    /// Delay before admission is reconciled after entering ongoing or multiparty.
    pub const ONGOING_ADMISSION_DELAY: Duration = Duration::from_millis(2000);
}

/// Configuration for the hands-free call manager
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HfpConfig {
    /// Highest level of the device's voice volume scale
    pub max_volume_level: u32,

    /// Audio-test / protocol-compliance mode: SCO is always admitted
    pub force_sco_allowed: bool,

    /// Forward volume changes to the phone
    pub volume_sync_enabled: bool,

    /// Bound of the manager's inbound request queue
    pub command_queue_depth: usize,

    /// Capacity of the notification broadcast channel
    pub notification_capacity: usize,
}

impl Default for HfpConfig {
    fn default() -> Self {
        Self {
            max_volume_level: 16,
            force_sco_allowed: false,
            volume_sync_enabled: true,
            command_queue_depth: 64,
            notification_capacity: 256,
        }
    }
}

impl HfpConfig {
    /// Create a configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the device voice volume scale maximum
    pub fn with_max_volume_level(mut self, level: u32) -> Self {
        self.max_volume_level = level;
        self
    }

    /// Force SCO admission (audio-test and compliance builds)
    pub fn with_force_sco_allowed(mut self, forced: bool) -> Self {
        self.force_sco_allowed = forced;
        self
    }

    /// Enable or disable volume synchronization towards the phone
    pub fn with_volume_sync(mut self, enabled: bool) -> Self {
        self.volume_sync_enabled = enabled;
        self
    }

    /// Set the inbound queue depth of the manager task
    pub fn with_command_queue_depth(mut self, depth: usize) -> Self {
        self.command_queue_depth = depth;
        self
    }

    /// Parse a TOML document
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source)
            .map_err(|e| HfpError::config(format!("invalid TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| HfpError::config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&source)
    }

    /// Check the configuration for values the manager cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.max_volume_level == 0 {
            return Err(HfpError::config("max_volume_level must be greater than zero"));
        }
        if self.command_queue_depth == 0 {
            return Err(HfpError::config("command_queue_depth must be greater than zero"));
        }
        if self.notification_capacity == 0 {
            return Err(HfpError::config("notification_capacity must be greater than zero"));
        }
        Ok(())
    }
}
