//! Polls a server endpoint until it accepts a connection.
//!
//! There is no retry count, only a wall-clock deadline: the poller connects,
//! sleeps `poll_interval` on failure and gives up once `timeout` has elapsed
//! since the first attempt. A caller-supplied cancellation future aborts the
//! wait the same way a timeout does.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::net::TcpStream;

use crate::error::NotReadyReason;

/// Default pause between connection attempts.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);
/// Default deadline for a server to come up.
pub const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(10);
/// Default cap on a single connection attempt.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(1);

/// One raw connection attempt.
#[async_trait]
pub trait ConnectProbe: Send + Sync {
    /// Connect to `address` and close the connection again.
    async fn connect(&self, address: &str, timeout: Duration) -> std::io::Result<()>;
}

/// TCP connect probe.
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpProbe;

#[async_trait]
impl ConnectProbe for TcpProbe {
    async fn connect(&self, address: &str, timeout: Duration) -> std::io::Result<()> {
        match tokio::time::timeout(timeout, TcpStream::connect(address)).await {
            Ok(Ok(stream)) => {
                drop(stream);
                Ok(())
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                format!("connect to {} timed out", address),
            )),
        }
    }
}

/// Outcome of a successful wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Readiness {
    /// Connection attempts made, including the successful one.
    pub attempts: u32,
    pub elapsed: Duration,
}

/// Deadline-bounded connection poller.
#[derive(Clone)]
pub struct ReadinessPoller {
    probe: Arc<dyn ConnectProbe>,
    poll_interval: Duration,
    timeout: Duration,
    probe_timeout: Duration,
}

impl std::fmt::Debug for ReadinessPoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadinessPoller")
            .field("poll_interval", &self.poll_interval)
            .field("timeout", &self.timeout)
            .field("probe_timeout", &self.probe_timeout)
            .finish()
    }
}

impl Default for ReadinessPoller {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL, DEFAULT_STARTUP_TIMEOUT)
    }
}

impl ReadinessPoller {
    pub fn new(poll_interval: Duration, timeout: Duration) -> Self {
        Self {
            probe: Arc::new(TcpProbe),
            poll_interval,
            timeout,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    pub fn with_probe(mut self, probe: Arc<dyn ConnectProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn with_probe_timeout(mut self, probe_timeout: Duration) -> Self {
        self.probe_timeout = probe_timeout;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn probe_timeout(&self) -> Duration {
        self.probe_timeout
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Wait until `address` accepts a connection.
    pub async fn wait<F>(&self, address: &str, cancel: F) -> Result<Readiness, NotReadyReason>
    where
        F: Future<Output = ()>,
    {
        let start = Instant::now();
        let mut attempts = 0u32;
        tokio::pin!(cancel);

        loop {
            attempts += 1;
            let remaining = self.timeout.saturating_sub(start.elapsed());
            let attempt_timeout = self
                .probe_timeout
                .min(remaining)
                .max(Duration::from_millis(1));

            let connected = tokio::select! {
                result = self.probe.connect(address, attempt_timeout) => result,
                _ = &mut cancel => return Err(NotReadyReason::Interrupted),
            };

            match connected {
                Ok(()) => {
                    return Ok(Readiness {
                        attempts,
                        elapsed: start.elapsed(),
                    });
                }
                Err(e) => tracing::trace!("Server at {} is not online yet: {}", address, e),
            }

            if start.elapsed() >= self.timeout {
                return Err(NotReadyReason::Timeout(self.timeout));
            }

            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                _ = &mut cancel => return Err(NotReadyReason::Interrupted),
            }
        }
    }
}
