//! Dispatcher configuration.

use std::time::Duration;

/// Tunables of the dispatcher and its transport.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Manager address, `host:port`.
    pub address: String,
    /// Deadline covering connect, send, and reply for one call.
    pub request_timeout: Duration,
    /// Bound of the submission queue.
    pub queue_capacity: usize,
}

impl DispatchConfig {
    /// Default manager address.
    pub const DEFAULT_ADDRESS: &str = "127.0.0.1:60615";
    /// Default per-call deadline: 10 seconds.
    pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
    /// Default submission-queue bound.
    pub const DEFAULT_QUEUE_CAPACITY: usize = 32;

    /// Configuration for the given manager address, all else default.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            request_timeout: Self::DEFAULT_REQUEST_TIMEOUT,
            queue_capacity: Self::DEFAULT_QUEUE_CAPACITY,
        }
    }

    /// Overrides the per-call deadline.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Overrides the submission-queue bound.
    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_ADDRESS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_override_defaults() {
        let config = DispatchConfig::new("manager.beamline.lab:60615")
            .with_request_timeout(Duration::from_secs(30))
            .with_queue_capacity(4);
        assert_eq!(config.address, "manager.beamline.lab:60615");
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.queue_capacity, 4);

        let default = DispatchConfig::default();
        assert_eq!(default.address, DispatchConfig::DEFAULT_ADDRESS);
        assert_eq!(default.queue_capacity, 32);
    }
}
