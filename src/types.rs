//! Lookup keys shared by the stores, the launch builder and discovery.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Which side of a TLS connection an endpoint plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionRole {
    Client,
    Server,
}

impl ConnectionRole {
    pub const ALL: [ConnectionRole; 2] = [ConnectionRole::Client, ConnectionRole::Server];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionRole::Client => "client",
            ConnectionRole::Server => "server",
        }
    }

    /// Image label holding the implementation type for this role.
    pub fn type_label(&self) -> &'static str {
        match self {
            ConnectionRole::Client => "client_type",
            ConnectionRole::Server => "server_type",
        }
    }

    /// Image label holding the implementation version for this role.
    pub fn version_label(&self) -> &'static str {
        match self {
            ConnectionRole::Client => "client_version",
            ConnectionRole::Server => "server_version",
        }
    }
}

impl fmt::Display for ConnectionRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConnectionRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "client" => Ok(ConnectionRole::Client),
            "server" => Ok(ConnectionRole::Server),
            other => Err(format!("unknown connection role '{}'", other)),
        }
    }
}

macro_rules! implementation_types {
    ($($variant:ident => $id:literal),+ $(,)?) => {
        /// Supported TLS implementations.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum ImplementationType {
            $(#[serde(rename = $id)] $variant,)+
        }

        impl ImplementationType {
            pub const ALL: &'static [ImplementationType] = &[$(ImplementationType::$variant),+];

            /// Lower-case identifier used in file names, labels and image names.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(ImplementationType::$variant => $id,)+
                }
            }
        }
    };
}

implementation_types! {
    BearSsl => "bearssl",
    BoringSsl => "boringssl",
    Botan => "botan",
    BouncyCastle => "bouncycastle",
    Erlang => "erlang",
    GnuTls => "gnutls",
    Golang => "golang",
    Jsse => "jsse",
    LibreSsl => "libressl",
    MatrixSsl => "matrixssl",
    MbedTls => "mbedtls",
    Nss => "nss",
    OcamlTls => "ocamltls",
    OpenSsl => "openssl",
    Rustls => "rustls",
    S2n => "s2n",
    TlsLite => "tlslite",
    WolfSsl => "wolfssl",
}

impl fmt::Display for ImplementationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImplementationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.to_ascii_lowercase();
        ImplementationType::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == wanted)
            .ok_or_else(|| format!("unknown implementation type '{}'", s))
    }
}

/// Transport protocol of the listening socket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    #[default]
    Tcp,
    Udp,
}

impl Transport {
    /// Docker port key for a container port, e.g. `4433/tcp`.
    pub fn port_key(&self, port: u16) -> String {
        match self {
            Transport::Tcp => format!("{}/tcp", port),
            Transport::Udp => format!("{}/udp", port),
        }
    }
}
