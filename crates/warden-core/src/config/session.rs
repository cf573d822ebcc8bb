//! Session lifecycle configuration.

use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Expiry and retention policy for sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Session lifetime in seconds. `None` keeps sessions until they are
    /// invalidated or the process exits.
    #[serde(default)]
    pub ttl_secs: Option<u64>,

    /// Re-arm the TTL every time the session resolves successfully.
    #[serde(default)]
    pub sliding_expiry: bool,

    /// How often the background sweeper purges expired sessions.
    /// `None` disables the sweeper; expiry is still enforced at read time.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: Option<u64>,

    /// Maximum concurrent sessions per credential; the least recently used
    /// sessions beyond the cap are evicted. `None` disables the cap.
    #[serde(default = "default_max_sessions_per_credential")]
    pub max_sessions_per_credential: Option<usize>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: None,
            sliding_expiry: false,
            sweep_interval_secs: default_sweep_interval_secs(),
            max_sessions_per_credential: default_max_sessions_per_credential(),
        }
    }
}

impl SessionConfig {
    /// TTL as a chrono duration.
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl_secs
            .and_then(|secs| i64::try_from(secs).ok())
            .and_then(Duration::try_seconds)
    }

    /// Sweep interval as a std duration.
    pub fn sweep_interval(&self) -> Option<std::time::Duration> {
        self.sweep_interval_secs.map(std::time::Duration::from_secs)
    }
}

fn default_sweep_interval_secs() -> Option<u64> {
    Some(60)
}

fn default_max_sessions_per_credential() -> Option<usize> {
    Some(5)
}
