//! Parameter profile documents and command-line templating.

use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ProfileError;
use crate::properties::ImageProperties;
use crate::types::{ConnectionRole, ImplementationType};

/// How a parameter takes part in the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterKind {
    /// Always emitted.
    #[default]
    Plain,
    /// Target or listen address.
    HostPort,
    /// Certificate and key; dropped when the image declares none.
    Certificate,
    /// Only with the parallelize switch.
    Parallelize,
    /// Only with the insecure switch.
    Insecure,
    /// Only when the caller passed extra parameters.
    AdditionalParameters,
}

/// One fragment of the command line, with `[placeholder]` markers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    #[serde(default)]
    pub kind: ParameterKind,
    pub cmd: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ProfileDocument {
    name: String,
    role: ConnectionRole,
    #[serde(rename = "type")]
    kind: ImplementationType,
    #[serde(default)]
    description: String,
    #[serde(default)]
    versions: Vec<String>,
    #[serde(default)]
    parameters: Vec<Parameter>,
}

/// Values substituted into a profile's parameters.
#[derive(Debug, Clone, Copy)]
pub struct TemplateInput<'a> {
    pub host: &'a str,
    pub port: u16,
    pub properties: &'a ImageProperties,
    pub additional_parameters: Option<&'a str>,
    pub parallelize: bool,
    pub insecure: bool,
}

/// How to invoke one implementation, optionally scoped to a version range.
#[derive(Debug, Clone)]
pub struct ParameterProfile {
    name: String,
    role: ConnectionRole,
    kind: ImplementationType,
    description: String,
    versions: Vec<String>,
    patterns: Vec<Regex>,
    parameters: Vec<Parameter>,
}

impl ParameterProfile {
    /// Parse a TOML profile document. `path` is only used for diagnostics.
    pub fn parse(path: &Path, contents: &str) -> Result<Self, ProfileError> {
        let doc: ProfileDocument = toml::from_str(contents).map_err(|e| ProfileError::Parse {
            path: path.to_path_buf(),
            reason: e.message().to_string(),
        })?;

        // Anchor so `1\.2.*` cannot match `v1.2`.
        let patterns = doc
            .versions
            .iter()
            .map(|pattern| {
                Regex::new(&format!("^(?:{})$", pattern)).map_err(|e| ProfileError::Pattern {
                    path: path.to_path_buf(),
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            name: doc.name,
            role: doc.role,
            kind: doc.kind,
            description: doc.description,
            versions: doc.versions,
            patterns,
            parameters: doc.parameters,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> ConnectionRole {
        self.role
    }

    pub fn kind(&self) -> ImplementationType {
        self.kind
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Version patterns as written in the document.
    pub fn versions(&self) -> &[String] {
        &self.versions
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// Whether this profile can be selected for a specific version at all.
    pub fn is_version_specific(&self) -> bool {
        !self.patterns.is_empty()
    }

    /// Full-string match of `version` against any pattern.
    pub fn matches_version(&self, version: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(version))
    }

    /// Render the command line for a container.
    pub fn to_arguments(&self, input: &TemplateInput<'_>) -> Vec<String> {
        let cert = input.properties.cert_path.as_deref();
        let key = input.properties.key_path.as_deref();
        let port = input.port.to_string();

        let mut line = String::new();
        for parameter in &self.parameters {
            let included = match parameter.kind {
                ParameterKind::Plain | ParameterKind::HostPort => true,
                ParameterKind::Certificate => cert.is_some() && key.is_some(),
                ParameterKind::Parallelize => input.parallelize,
                ParameterKind::Insecure => input.insecure,
                ParameterKind::AdditionalParameters => input.additional_parameters.is_some(),
            };
            if !included {
                continue;
            }

            let rendered = parameter
                .cmd
                .replace("[host]", input.host)
                .replace("[port]", &port)
                .replace("[cert]", cert.unwrap_or_default())
                .replace("[key]", key.unwrap_or_default())
                .replace(
                    "[additional_parameters]",
                    input.additional_parameters.unwrap_or_default(),
                );
            line.push_str(&rendered);
            line.push(' ');
        }

        line.split_whitespace().map(str::to_string).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const SERVER_DOC: &str = r#"
name = "openssl-server"
role = "server"
type = "openssl"
description = "s_server"
versions = ['1\.2.*']

[[parameters]]
cmd = "s_server"

[[parameters]]
kind = "host_port"
cmd = "-accept [port]"

[[parameters]]
kind = "certificate"
cmd = "-cert [cert] -key [key]"

[[parameters]]
kind = "parallelize"
cmd = "-naccept 1000"

[[parameters]]
kind = "insecure"
cmd = "-verify_return_error"

[[parameters]]
kind = "additional_parameters"
cmd = "[additional_parameters]"
"#;

    fn props(cert: bool) -> ImageProperties {
        ImageProperties {
            role: ConnectionRole::Server,
            kind: ImplementationType::OpenSsl,
            image: "openssl-server".to_string(),
            internal_port: Some(4433),
            use_ip: false,
            cert_path: cert.then(|| "/cert/cert.pem".to_string()),
            key_path: cert.then(|| "/cert/key.pem".to_string()),
        }
    }

    fn parse(doc: &str) -> ParameterProfile {
        ParameterProfile::parse(&PathBuf::from("test.profile"), doc).unwrap()
    }

    #[test]
    fn test_version_match_is_full_string() {
        let profile = parse(SERVER_DOC);
        assert!(profile.matches_version("1.2"));
        assert!(profile.matches_version("1.2.11"));
        assert!(!profile.matches_version("v1.2"));
        assert!(!profile.matches_version("11.2"));
    }

    #[test]
    fn test_no_versions_is_not_version_specific() {
        let profile = parse("name = \"d\"\nrole = \"client\"\ntype = \"nss\"\n");
        assert!(!profile.is_version_specific());
        assert!(!profile.matches_version("3.90"));
    }

    #[test]
    fn test_invalid_pattern_is_rejected() {
        let err = ParameterProfile::parse(
            &PathBuf::from("bad.profile"),
            "name = \"b\"\nrole = \"server\"\ntype = \"nss\"\nversions = ['(']\n",
        )
        .unwrap_err();
        assert!(matches!(err, ProfileError::Pattern { .. }));
    }

    #[test]
    fn test_unknown_type_is_parse_error() {
        let err = ParameterProfile::parse(
            &PathBuf::from("x.profile"),
            "name = \"x\"\nrole = \"server\"\ntype = \"schannel\"\n",
        )
        .unwrap_err();
        assert!(matches!(err, ProfileError::Parse { .. }));
    }

    #[test]
    fn test_arguments_minimal() {
        let profile = parse(SERVER_DOC);
        let props = props(false);
        let args = profile.to_arguments(&TemplateInput {
            host: "localhost",
            port: 4433,
            properties: &props,
            additional_parameters: None,
            parallelize: false,
            insecure: false,
        });
        assert_eq!(args, vec!["s_server", "-accept", "4433"]);
    }

    #[test]
    fn test_certificate_needs_both_paths() {
        let profile = parse(SERVER_DOC);
        let mut props = props(true);
        props.key_path = None;
        let args = profile.to_arguments(&TemplateInput {
            host: "localhost",
            port: 4433,
            properties: &props,
            additional_parameters: None,
            parallelize: false,
            insecure: false,
        });
        assert_eq!(args, vec!["s_server", "-accept", "4433"]);
    }

    #[test]
    fn test_arguments_with_all_switches() {
        let profile = parse(SERVER_DOC);
        let props = props(true);
        let args = profile.to_arguments(&TemplateInput {
            host: "localhost",
            port: 4433,
            properties: &props,
            additional_parameters: Some("-tls1_3  -no_ticket"),
            parallelize: true,
            insecure: true,
        });
        assert_eq!(
            args,
            vec![
                "s_server",
                "-accept",
                "4433",
                "-cert",
                "/cert/cert.pem",
                "-key",
                "/cert/key.pem",
                "-naccept",
                "1000",
                "-verify_return_error",
                "-tls1_3",
                "-no_ticket",
            ]
        );
    }

    #[test]
    fn test_host_placeholder() {
        let profile = parse(
            "name = \"c\"\nrole = \"client\"\ntype = \"openssl\"\n[[parameters]]\nkind = \"host_port\"\ncmd = \"s_client -connect [host]:[port]\"\n",
        );
        let props = props(false);
        let args = profile.to_arguments(&TemplateInput {
            host: "10.0.0.5",
            port: 8443,
            properties: &props,
            additional_parameters: None,
            parallelize: false,
            insecure: false,
        });
        assert_eq!(args, vec!["s_client", "-connect", "10.0.0.5:8443"]);
    }
}
