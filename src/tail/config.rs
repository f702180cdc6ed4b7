//! Tail configuration

use std::time::Duration;

/// Tailable cursor configuration
#[derive(Debug, Clone)]
pub struct TailConfig {
    /// How long a fetch waits at the tail before reporting "none yet"
    pub await_timeout: Duration,

    /// Report "none yet" fetches to the driver's handler
    pub notify_pending: bool,
}

impl Default for TailConfig {
    fn default() -> Self {
        Self {
            await_timeout: Duration::from_secs(1),
            notify_pending: false,
        }
    }
}

impl TailConfig {
    /// Set the await timeout
    pub fn await_timeout(mut self, timeout: Duration) -> Self {
        self.await_timeout = timeout;
        self
    }

    /// Report "none yet" fetches to handlers
    pub fn notify_pending(mut self, notify: bool) -> Self {
        self.notify_pending = notify;
        self
    }
}
