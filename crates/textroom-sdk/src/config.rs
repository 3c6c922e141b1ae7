//! Session configuration.

use std::time::Duration;
use textroom_core::MIN_CREDENTIAL_LEN;

/// Configuration shared by every session a controller opens.
#[derive(Clone, Debug)]
pub struct SyncConfig {
    /// Silence after the last local edit before the buffer is flushed.
    pub quiet_period: Duration,
    /// Minimum password length for locking a document.
    pub min_credential_len: usize,
    /// Capacity of each session's event channel.
    pub event_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            quiet_period: Duration::from_millis(500),
            min_credential_len: MIN_CREDENTIAL_LEN,
            event_capacity: 100,
        }
    }
}

/// Builder for sync configuration.
pub struct SyncConfigBuilder {
    config: SyncConfig,
}

impl SyncConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: SyncConfig::default(),
        }
    }

    pub fn quiet_period(mut self, period: Duration) -> Self {
        self.config.quiet_period = period;
        self
    }

    pub fn quiet_period_ms(self, ms: u64) -> Self {
        self.quiet_period(Duration::from_millis(ms))
    }

    pub fn min_credential_len(mut self, len: usize) -> Self {
        self.config.min_credential_len = len;
        self
    }

    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.config.event_capacity = capacity.max(1);
        self
    }

    pub fn build(self) -> SyncConfig {
        self.config
    }
}

impl Default for SyncConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
