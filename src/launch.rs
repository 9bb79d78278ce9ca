//! Translates a resolved profile and image properties into a container launch spec.
//!
//! Building is a pure transformation: no I/O, and the only failures are
//! missing or inconsistent inputs.

use std::collections::BTreeMap;

use crate::endpoint::RequestedEndpoint;
use crate::error::{ProvisionError, Result};
use crate::profile::{ParameterProfile, TemplateInput};
use crate::properties::ImageProperties;
use crate::types::{ConnectionRole, Transport};

/// Label recording the port the caller asked for.
pub const REQUESTED_PORT_LABEL: &str = "tls-fixtures.requested-port";
/// Label recording the profile a container was launched with.
pub const PROFILE_LABEL: &str = "tls-fixtures.profile";

/// Host used in a server's command line when the caller gave no address.
const FALLBACK_SERVER_HOST: &str = "localhost";

/// Container port published to the host on an ephemeral port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortExposure {
    pub container_port: u16,
    pub transport: Transport,
}

impl PortExposure {
    pub fn key(&self) -> String {
        self.transport.port_key(self.container_port)
    }
}

/// Everything the runtime needs to create one container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub role: ConnectionRole,
    pub image: String,
    pub cmd: Vec<String>,
    pub exposed_port: Option<PortExposure>,
    pub readonly_rootfs: bool,
    pub labels: BTreeMap<String, String>,
    pub network_mode: Option<String>,
}

/// Deployment-wide inputs to launch spec building.
#[derive(Debug, Clone, Default)]
pub struct LaunchSpecBuilder {
    /// Registry or repository prefix, e.g. `ghcr.io/acme/`.
    pub image_prefix: String,
    pub parallelize: bool,
    pub insecure: bool,
    pub network_mode: Option<String>,
}

impl LaunchSpecBuilder {
    pub fn build(
        &self,
        version: &str,
        profile: &ParameterProfile,
        properties: &ImageProperties,
        request: &RequestedEndpoint,
        additional_parameters: Option<&str>,
    ) -> Result<LaunchSpec> {
        let role = properties.role;
        if version.trim().is_empty() {
            return Err(ProvisionError::InvalidArgument(
                "version must not be empty".to_string(),
            ));
        }
        if profile.role() != role || profile.kind() != properties.kind {
            return Err(ProvisionError::InvalidArgument(format!(
                "profile '{}' ({} {}) does not fit properties for {} {}",
                profile.name(),
                profile.role(),
                profile.kind(),
                role,
                properties.kind
            )));
        }

        let (host, port, exposed_port, readonly_rootfs) = match role {
            ConnectionRole::Server => {
                let internal_port = properties.internal_port.ok_or_else(|| {
                    ProvisionError::InvalidArgument(format!(
                        "server properties for {} declare no internal port",
                        properties.kind
                    ))
                })?;
                let host = request
                    .template_host(properties.use_ip)
                    .unwrap_or(FALLBACK_SERVER_HOST);
                let exposure = PortExposure {
                    container_port: internal_port,
                    transport: request.transport,
                };
                (host, internal_port, Some(exposure), true)
            }
            ConnectionRole::Client => {
                let host = request.template_host(properties.use_ip).ok_or_else(|| {
                    ProvisionError::InvalidArgument(
                        "client endpoint needs an IP or hostname to connect to".to_string(),
                    )
                })?;
                (host, request.port, None, false)
            }
        };

        let cmd = profile.to_arguments(&TemplateInput {
            host,
            port,
            properties,
            additional_parameters,
            parallelize: self.parallelize,
            insecure: self.insecure,
        });

        let mut labels: BTreeMap<String, String> = properties.labels(version).into_iter().collect();
        labels.insert(REQUESTED_PORT_LABEL.to_string(), request.port.to_string());
        labels.insert(PROFILE_LABEL.to_string(), profile.name().to_string());

        Ok(LaunchSpec {
            role,
            image: properties.image_ref(&self.image_prefix, version),
            cmd,
            exposed_port,
            readonly_rootfs,
            labels,
            network_mode: self.network_mode.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ImplementationType;
    use std::path::PathBuf;

    fn profile(role: &str) -> ParameterProfile {
        ParameterProfile::parse(
            &PathBuf::from("openssl.profile"),
            &format!(
                "name = \"openssl-{role}\"\nrole = \"{role}\"\ntype = \"openssl\"\n\
                 [[parameters]]\nkind = \"host_port\"\ncmd = \"-connect [host]:[port]\"\n\
                 [[parameters]]\nkind = \"parallelize\"\ncmd = \"-parallel\"\n\
                 [[parameters]]\nkind = \"additional_parameters\"\ncmd = \"[additional_parameters]\"\n"
            ),
        )
        .unwrap()
    }

    fn properties(role: ConnectionRole, use_ip: bool) -> ImageProperties {
        ImageProperties {
            role,
            kind: ImplementationType::OpenSsl,
            image: format!("openssl-{}", role),
            internal_port: (role == ConnectionRole::Server).then_some(4433),
            use_ip,
            cert_path: None,
            key_path: None,
        }
    }

    #[test]
    fn test_server_uses_internal_port_not_requested() {
        let builder = LaunchSpecBuilder::default();
        let request = RequestedEndpoint::server().with_port(9999);
        let spec = builder
            .build(
                "1.1.1w",
                &profile("server"),
                &properties(ConnectionRole::Server, false),
                &request,
                None,
            )
            .unwrap();

        assert_eq!(spec.cmd, vec!["-connect", "localhost:4433"]);
        assert!(spec.readonly_rootfs);
        assert_eq!(
            spec.exposed_port,
            Some(PortExposure {
                container_port: 4433,
                transport: Transport::Tcp,
            })
        );
        assert_eq!(spec.image, "openssl-server:1.1.1w");
        assert_eq!(
            spec.labels.get(REQUESTED_PORT_LABEL).map(String::as_str),
            Some("9999")
        );
        assert_eq!(
            spec.labels.get("server_version").map(String::as_str),
            Some("1.1.1w")
        );
    }

    #[test]
    fn test_client_exposes_nothing() {
        let builder = LaunchSpecBuilder {
            image_prefix: "registry.local/".to_string(),
            parallelize: true,
            ..Default::default()
        };
        let request = RequestedEndpoint::client("172.17.0.3")
            .with_hostname("server.test")
            .with_port(8443);
        let spec = builder
            .build(
                "1.1.1w",
                &profile("client"),
                &properties(ConnectionRole::Client, false),
                &request,
                Some("-tls1_2"),
            )
            .unwrap();

        assert_eq!(
            spec.cmd,
            vec!["-connect", "server.test:8443", "-parallel", "-tls1_2"]
        );
        assert_eq!(spec.exposed_port, None);
        assert!(!spec.readonly_rootfs);
        assert_eq!(spec.image, "registry.local/openssl-client:1.1.1w");
    }

    #[test]
    fn test_use_ip_overrides_hostname() {
        let request = RequestedEndpoint::client("172.17.0.3").with_hostname("server.test");
        let spec = LaunchSpecBuilder::default()
            .build(
                "1.1.1w",
                &profile("client"),
                &properties(ConnectionRole::Client, true),
                &request,
                None,
            )
            .unwrap();
        assert_eq!(spec.cmd, vec!["-connect", "172.17.0.3:4433"]);
    }

    #[test]
    fn test_client_without_address_is_invalid() {
        let mut request = RequestedEndpoint::client("unused");
        request.ip = None;
        let err = LaunchSpecBuilder::default()
            .build(
                "1.1.1w",
                &profile("client"),
                &properties(ConnectionRole::Client, false),
                &request,
                None,
            )
            .unwrap_err();
        assert!(matches!(err, ProvisionError::InvalidArgument(_)));
    }

    #[test]
    fn test_mismatched_profile_is_invalid() {
        let err = LaunchSpecBuilder::default()
            .build(
                "1.1.1w",
                &profile("client"),
                &properties(ConnectionRole::Server, false),
                &RequestedEndpoint::server(),
                None,
            )
            .unwrap_err();
        assert!(matches!(err, ProvisionError::InvalidArgument(_)));
    }

    #[test]
    fn test_udp_exposure() {
        let request = RequestedEndpoint::server().with_transport(Transport::Udp);
        let spec = LaunchSpecBuilder::default()
            .build(
                "1.1.1w",
                &profile("server"),
                &properties(ConnectionRole::Server, false),
                &request,
                None,
            )
            .unwrap();
        assert_eq!(spec.exposed_port.map(|p| p.key()).as_deref(), Some("4433/udp"));
    }
}
