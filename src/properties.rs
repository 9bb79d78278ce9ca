//! Per-image properties keyed by (role, implementation).
//!
//! Loaded from `properties.toml`:
//!
//! ```toml
//! [[server]]
//! type = "openssl"
//! image = "openssl-server"
//! internal_port = 4433
//! cert_path = "/cert/rsa2048cert.pem"
//! key_path = "/cert/rsa2048key.pem"
//!
//! [[client]]
//! type = "openssl"
//! image = "openssl-client"
//! use_ip = true
//! ```
//!
//! Unlike profiles there is no fallback: a missing pair fails the request.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{ProvisionError, Result};
use crate::types::{ConnectionRole, ImplementationType};

/// Static metadata for one (role, implementation) image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageProperties {
    pub role: ConnectionRole,
    pub kind: ImplementationType,
    /// Repository name; the version becomes the tag.
    pub image: String,
    /// Port the server listens on inside the container.
    pub internal_port: Option<u16>,
    /// Address the endpoint by IP even when a hostname is known.
    pub use_ip: bool,
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
}

impl ImageProperties {
    /// Full image reference for a version, e.g. `ghcr.io/acme/openssl-server:1.1.1w`.
    pub fn image_ref(&self, prefix: &str, version: &str) -> String {
        format!("{}{}:{}", prefix, self.image, version)
    }

    /// Discovery labels as they appear on images built for this pair.
    pub fn labels(&self, version: &str) -> HashMap<String, String> {
        HashMap::from([
            (
                self.role.type_label().to_string(),
                self.kind.as_str().to_string(),
            ),
            (self.role.version_label().to_string(), version.to_string()),
        ])
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PropertyEntry {
    #[serde(rename = "type")]
    kind: ImplementationType,
    image: String,
    #[serde(default)]
    internal_port: Option<u16>,
    #[serde(default)]
    use_ip: bool,
    #[serde(default)]
    cert_path: Option<String>,
    #[serde(default)]
    key_path: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct PropertiesFile {
    #[serde(default)]
    server: Vec<PropertyEntry>,
    #[serde(default)]
    client: Vec<PropertyEntry>,
}

/// Read-only table of image properties.
#[derive(Debug, Default, Clone)]
pub struct PropertyStore {
    entries: HashMap<(ConnectionRole, ImplementationType), Arc<ImageProperties>>,
}

impl PropertyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the property table from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| ProvisionError::Resources {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_toml(&contents).map_err(|reason| ProvisionError::Resources {
            path: path.to_path_buf(),
            reason,
        })
    }

    /// Parse the property table from TOML text.
    pub fn from_toml(contents: &str) -> std::result::Result<Self, String> {
        let file: PropertiesFile = toml::from_str(contents).map_err(|e| e.to_string())?;

        let mut store = Self::new();
        let tagged = file
            .server
            .into_iter()
            .map(|e| (ConnectionRole::Server, e))
            .chain(file.client.into_iter().map(|e| (ConnectionRole::Client, e)));

        for (role, entry) in tagged {
            if role == ConnectionRole::Server && entry.internal_port.is_none() {
                return Err(format!("server entry for {} has no internal_port", entry.kind));
            }
            if entry.cert_path.is_some() != entry.key_path.is_some() {
                return Err(format!(
                    "{} entry for {} must set both cert_path and key_path",
                    role, entry.kind
                ));
            }
            if store.entries.contains_key(&(role, entry.kind)) {
                return Err(format!("duplicate {} entry for {}", role, entry.kind));
            }
            store.insert(ImageProperties {
                role,
                kind: entry.kind,
                image: entry.image,
                internal_port: entry.internal_port,
                use_ip: entry.use_ip,
                cert_path: entry.cert_path,
                key_path: entry.key_path,
            });
        }

        Ok(store)
    }

    /// Register properties, replacing any previous entry for the same pair.
    pub fn insert(&mut self, properties: ImageProperties) {
        self.entries
            .insert((properties.role, properties.kind), Arc::new(properties));
    }

    pub fn with(mut self, properties: ImageProperties) -> Self {
        self.insert(properties);
        self
    }

    /// Look up the properties for a pair.
    pub fn resolve(
        &self,
        role: ConnectionRole,
        kind: ImplementationType,
    ) -> Result<Arc<ImageProperties>> {
        self.entries
            .get(&(role, kind))
            .cloned()
            .ok_or(ProvisionError::PropertiesNotFound { role, kind })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[[server]]
type = "openssl"
image = "openssl-server"
internal_port = 4433
cert_path = "/cert/cert.pem"
key_path = "/cert/key.pem"

[[client]]
type = "openssl"
image = "openssl-client"
use_ip = true
"#;

    #[test]
    fn test_resolve_loaded_entries() {
        let store = PropertyStore::from_toml(SAMPLE).unwrap();
        assert_eq!(store.len(), 2);

        let server = store
            .resolve(ConnectionRole::Server, ImplementationType::OpenSsl)
            .unwrap();
        assert_eq!(server.internal_port, Some(4433));
        assert!(!server.use_ip);
        assert_eq!(server.key_path.as_deref(), Some("/cert/key.pem"));

        let client = store
            .resolve(ConnectionRole::Client, ImplementationType::OpenSsl)
            .unwrap();
        assert!(client.use_ip);
        assert_eq!(client.internal_port, None);
    }

    #[test]
    fn test_missing_pair_fails() {
        let store = PropertyStore::from_toml(SAMPLE).unwrap();
        let err = store
            .resolve(ConnectionRole::Server, ImplementationType::WolfSsl)
            .unwrap_err();
        assert!(matches!(
            err,
            ProvisionError::PropertiesNotFound {
                role: ConnectionRole::Server,
                kind: ImplementationType::WolfSsl
            }
        ));
    }

    #[test]
    fn test_server_requires_internal_port() {
        let err = PropertyStore::from_toml(
            "[[server]]\ntype = \"gnutls\"\nimage = \"gnutls-server\"\n",
        )
        .unwrap_err();
        assert!(err.contains("internal_port"));
    }

    #[test]
    fn test_certificate_without_key_rejected() {
        let err = PropertyStore::from_toml(
            "[[server]]\ntype = \"gnutls\"\nimage = \"gnutls-server\"\ninternal_port = 5556\ncert_path = \"/cert/cert.pem\"\n",
        )
        .unwrap_err();
        assert!(err.contains("key_path"));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = PropertyStore::from_toml(
            "[[client]]\ntype = \"openssl\"\nimage = \"openssl-client\"\nuse-ip = true\n",
        )
        .unwrap_err();
        assert!(err.contains("use-ip"));
    }

    #[test]
    fn test_duplicate_pair_rejected() {
        let doubled = format!("{SAMPLE}\n[[client]]\ntype = \"openssl\"\nimage = \"other\"\n");
        let err = PropertyStore::from_toml(&doubled).unwrap_err();
        assert!(err.contains("duplicate"));
    }

    #[test]
    fn test_image_ref_and_labels() {
        let store = PropertyStore::from_toml(SAMPLE).unwrap();
        let props = store
            .resolve(ConnectionRole::Server, ImplementationType::OpenSsl)
            .unwrap();
        assert_eq!(
            props.image_ref("ghcr.io/acme/", "1.1.1w"),
            "ghcr.io/acme/openssl-server:1.1.1w"
        );
        let labels = props.labels("1.1.1w");
        assert_eq!(labels.get("server_type").map(String::as_str), Some("openssl"));
        assert_eq!(labels.get("server_version").map(String::as_str), Some("1.1.1w"));
    }
}
