//! Finds the port a started server is reachable on.

use std::fmt;
use std::str::FromStr;

use crate::error::{ProvisionError, Result, RuntimeError};
use crate::launch::PortExposure;
use crate::runtime::ContainerRuntime;

/// How the reachable port of a server is determined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PortPolicy {
    /// The harness shares the container's network namespace; the internal
    /// port is reachable as is.
    Static,
    /// The runtime published the internal port on an ephemeral host port,
    /// read back by inspecting the container.
    ///
    /// Docker's userland proxy accepts connections on the host port as soon
    /// as the container starts, before anything listens inside it. A
    /// successful readiness dial under this policy therefore only proves the
    /// mapping exists; use `Static` with host networking when the harness
    /// needs the server's own socket to be up.
    #[default]
    Dynamic,
}

impl fmt::Display for PortPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortPolicy::Static => f.write_str("static"),
            PortPolicy::Dynamic => f.write_str("dynamic"),
        }
    }
}

impl FromStr for PortPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "static" => Ok(PortPolicy::Static),
            "dynamic" => Ok(PortPolicy::Dynamic),
            other => Err(format!("expected 'static' or 'dynamic', got '{}'", other)),
        }
    }
}

impl PortPolicy {
    /// Resolve the reachable port for `exposure` on a started container.
    ///
    /// Only the first binding of the internal port is considered; any other
    /// published ports are ignored.
    pub async fn resolve(
        &self,
        runtime: &dyn ContainerRuntime,
        container_id: &str,
        exposure: &PortExposure,
    ) -> Result<u16> {
        if *self == PortPolicy::Static {
            return Ok(exposure.container_port);
        }

        let failed = |reason: String| ProvisionError::PortResolution {
            container: container_id.to_string(),
            reason,
        };

        let info = runtime
            .inspect_container(container_id)
            .await
            .map_err(|e| match e {
                RuntimeError::NotFound { .. } => failed("container not found".to_string()),
                other => failed(other.to_string()),
            })?;

        let ports = info
            .network_settings
            .ok_or_else(|| failed("container has no network settings".to_string()))?
            .ports
            .ok_or_else(|| failed("container has no port bindings".to_string()))?;

        let key = exposure.key();
        let host_port = ports
            .get(&key)
            .cloned()
            .flatten()
            .and_then(|bindings| bindings.into_iter().next())
            .and_then(|binding| binding.host_port)
            .ok_or_else(|| failed(format!("no host binding for {}", key)))?;

        host_port
            .parse()
            .map_err(|_| failed(format!("invalid host port '{}' for {}", host_port, key)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeRuntime;
    use crate::types::Transport;

    fn exposure() -> PortExposure {
        PortExposure {
            container_port: 4433,
            transport: Transport::Tcp,
        }
    }

    #[tokio::test]
    async fn test_static_returns_internal_port() {
        let runtime = FakeRuntime::new().with_host_port("4433/tcp", 49153);
        let port = PortPolicy::Static
            .resolve(&runtime, "missing", &exposure())
            .await
            .unwrap();
        assert_eq!(port, 4433);
        assert!(runtime.calls().is_empty());
    }

    #[tokio::test]
    async fn test_dynamic_reads_mapped_port() {
        let runtime = FakeRuntime::new().with_host_port("4433/tcp", 49153);
        let id = runtime.seed_running_container();
        let port = PortPolicy::Dynamic
            .resolve(&runtime, &id, &exposure())
            .await
            .unwrap();
        assert_eq!(port, 49153);
    }

    #[tokio::test]
    async fn test_dynamic_takes_first_binding() {
        let runtime = FakeRuntime::new()
            .with_host_ports("4433/tcp", &[40001, 40002])
            .with_host_port("8443/tcp", 40003);
        let id = runtime.seed_running_container();
        let port = PortPolicy::Dynamic
            .resolve(&runtime, &id, &exposure())
            .await
            .unwrap();
        assert_eq!(port, 40001);
    }

    #[tokio::test]
    async fn test_dynamic_unknown_container() {
        let runtime = FakeRuntime::new();
        let err = PortPolicy::Dynamic
            .resolve(&runtime, "nope", &exposure())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ProvisionError::PortResolution { ref reason, .. } if reason == "container not found"
        ));
    }

    #[tokio::test]
    async fn test_dynamic_without_binding() {
        let runtime = FakeRuntime::new().with_host_port("8443/tcp", 49200);
        let id = runtime.seed_running_container();
        let err = PortPolicy::Dynamic
            .resolve(&runtime, &id, &exposure())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no host binding for 4433/tcp"));
    }

    #[tokio::test]
    async fn test_dynamic_without_network_settings() {
        let runtime = FakeRuntime::new().without_network_settings();
        let id = runtime.seed_running_container();
        let err = PortPolicy::Dynamic
            .resolve(&runtime, &id, &exposure())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no network settings"));
    }

    #[test]
    fn test_policy_parse() {
        assert_eq!("STATIC".parse::<PortPolicy>().unwrap(), PortPolicy::Static);
        assert_eq!("dynamic".parse::<PortPolicy>().unwrap(), PortPolicy::Dynamic);
        assert!("host".parse::<PortPolicy>().is_err());
    }
}
