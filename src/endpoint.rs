//! Caller intent and post-start truth for one endpoint.
//!
//! A [`RequestedEndpoint`] is what the caller asked for. A [`ResolvedEndpoint`]
//! is only produced after the container started and its reachable port is
//! known. The two never mutate into each other; the provisioner joins them.

use std::fmt;

use serde::Serialize;

use crate::types::Transport;

/// Port recorded on a request when the caller does not pick one.
pub const DEFAULT_PORT: u16 = 4433;

/// Target network identity requested by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestedEndpoint {
    /// IP the endpoint should target (clients) or advertise.
    pub ip: Option<String>,
    /// Hostname, preferred over the IP unless the image is addressed by IP.
    pub hostname: Option<String>,
    /// Requested port. Used for routing and labeling only, never as the
    /// container's bind port.
    pub port: u16,
    pub transport: Transport,
}

impl RequestedEndpoint {
    /// A client that connects out to `ip`.
    pub fn client(ip: impl Into<String>) -> Self {
        Self {
            ip: Some(ip.into()),
            hostname: None,
            port: DEFAULT_PORT,
            transport: Transport::Tcp,
        }
    }

    /// A server; its address is decided after start.
    pub fn server() -> Self {
        Self {
            ip: None,
            hostname: None,
            port: DEFAULT_PORT,
            transport: Transport::Tcp,
        }
    }

    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_transport(mut self, transport: Transport) -> Self {
        self.transport = transport;
        self
    }

    /// Host string substituted into the command line.
    ///
    /// The hostname wins unless `use_ip` is set or no hostname was given.
    pub fn template_host(&self, use_ip: bool) -> Option<&str> {
        match (&self.hostname, &self.ip) {
            (Some(hostname), _) if !use_ip => Some(hostname),
            (_, Some(ip)) => Some(ip),
            (Some(hostname), None) => Some(hostname),
            (None, None) => None,
        }
    }
}

/// Where a started server can actually be dialed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedEndpoint {
    host: String,
    port: u16,
    internal_port: u16,
    transport: Transport,
}

impl ResolvedEndpoint {
    pub fn new(host: impl Into<String>, port: u16, internal_port: u16, transport: Transport) -> Self {
        Self {
            host: host.into(),
            port,
            internal_port,
            transport,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Port reachable from the harness.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Port the process listens on inside the container.
    pub fn internal_port(&self) -> u16 {
        self.internal_port
    }

    pub fn transport(&self) -> Transport {
        self.transport
    }

    /// `host:port` in a form `TcpStream::connect` accepts.
    pub fn address(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl fmt::Display for ResolvedEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.address())
    }
}
