//! Provisioner configuration, read from `TLS_FIXTURES_*` environment variables.

pub(crate) mod helpers;

use std::path::PathBuf;
use std::time::Duration;

use crate::config::helpers::{optional_env, parse_bool_env, parse_optional_env};
use crate::error::ConfigError;
use crate::instance::PortPolicy;
use crate::launch::LaunchSpecBuilder;
use crate::readiness::{
    DEFAULT_POLL_INTERVAL, DEFAULT_PROBE_TIMEOUT, DEFAULT_STARTUP_TIMEOUT, ReadinessPoller,
};

/// Deployment settings for a [`Provisioner`](crate::Provisioner).
#[derive(Debug, Clone)]
pub struct ProvisionerConfig {
    /// Root holding `profiles/{role}/` and `properties.toml`.
    pub resources_dir: PathBuf,
    pub port_policy: PortPolicy,
    pub poll_interval: Duration,
    /// Deadline for a server to accept its first connection.
    pub startup_timeout: Duration,
    pub probe_timeout: Duration,
    /// Host the harness dials to reach a server.
    pub reachable_host: String,
    /// Container network mode, e.g. `host` together with the static policy.
    pub network_mode: Option<String>,
    pub image_prefix: String,
    pub parallelize: bool,
    pub insecure: bool,
    /// Whether teardown removes containers after stopping them.
    pub auto_remove: bool,
}

impl Default for ProvisionerConfig {
    fn default() -> Self {
        Self {
            resources_dir: default_resources_dir(),
            port_policy: PortPolicy::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            startup_timeout: DEFAULT_STARTUP_TIMEOUT,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            reachable_host: "127.0.0.1".to_string(),
            network_mode: None,
            image_prefix: String::new(),
            parallelize: false,
            insecure: false,
            auto_remove: true,
        }
    }
}

/// Resource tree shipped with the crate.
pub fn default_resources_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("resources")
}

impl ProvisionerConfig {
    /// Build the configuration from the environment, defaulting what is unset.
    pub fn resolve() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let port_policy = parse_optional_env("TLS_FIXTURES_PORT_POLICY", defaults.port_policy)?;
        let poll_interval_ms = parse_optional_env(
            "TLS_FIXTURES_POLL_INTERVAL_MS",
            defaults.poll_interval.as_millis() as u64,
        )?;
        if poll_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "TLS_FIXTURES_POLL_INTERVAL_MS".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }

        Ok(Self {
            resources_dir: optional_env("TLS_FIXTURES_RESOURCES")?
                .map(PathBuf::from)
                .unwrap_or(defaults.resources_dir),
            port_policy,
            poll_interval: Duration::from_millis(poll_interval_ms),
            startup_timeout: Duration::from_millis(parse_optional_env(
                "TLS_FIXTURES_STARTUP_TIMEOUT_MS",
                defaults.startup_timeout.as_millis() as u64,
            )?),
            probe_timeout: Duration::from_millis(parse_optional_env(
                "TLS_FIXTURES_PROBE_TIMEOUT_MS",
                defaults.probe_timeout.as_millis() as u64,
            )?),
            reachable_host: optional_env("TLS_FIXTURES_REACHABLE_HOST")?
                .unwrap_or(defaults.reachable_host),
            network_mode: optional_env("TLS_FIXTURES_NETWORK")?,
            image_prefix: optional_env("TLS_FIXTURES_IMAGE_PREFIX")?
                .unwrap_or(defaults.image_prefix),
            parallelize: parse_bool_env("TLS_FIXTURES_PARALLELIZE", defaults.parallelize)?,
            insecure: parse_bool_env("TLS_FIXTURES_INSECURE", defaults.insecure)?,
            auto_remove: parse_bool_env("TLS_FIXTURES_AUTO_REMOVE", defaults.auto_remove)?,
        })
    }

    pub fn with_resources_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.resources_dir = dir.into();
        self
    }

    pub fn with_port_policy(mut self, policy: PortPolicy) -> Self {
        self.port_policy = policy;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }

    /// Cap on a single readiness connection attempt.
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn with_reachable_host(mut self, host: impl Into<String>) -> Self {
        self.reachable_host = host.into();
        self
    }

    pub fn with_network_mode(mut self, mode: impl Into<String>) -> Self {
        self.network_mode = Some(mode.into());
        self
    }

    pub fn with_image_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.image_prefix = prefix.into();
        self
    }

    pub fn with_parallelize(mut self, parallelize: bool) -> Self {
        self.parallelize = parallelize;
        self
    }

    pub fn with_insecure(mut self, insecure: bool) -> Self {
        self.insecure = insecure;
        self
    }

    pub fn with_auto_remove(mut self, auto_remove: bool) -> Self {
        self.auto_remove = auto_remove;
        self
    }

    pub(crate) fn launch_spec_builder(&self) -> LaunchSpecBuilder {
        LaunchSpecBuilder {
            image_prefix: self.image_prefix.clone(),
            parallelize: self.parallelize,
            insecure: self.insecure,
            network_mode: self.network_mode.clone(),
        }
    }

    pub(crate) fn readiness_poller(&self) -> ReadinessPoller {
        ReadinessPoller::new(self.poll_interval, self.startup_timeout)
            .with_probe_timeout(self.probe_timeout)
    }

    pub fn profiles_dir(&self) -> PathBuf {
        self.resources_dir.join("profiles")
    }

    pub fn properties_file(&self) -> PathBuf {
        self.resources_dir.join("properties.toml")
    }
}
