//! Loads and indexes parameter profiles per role.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{ProfileError, ProvisionError, Result};
use crate::profile::document::ParameterProfile;
use crate::types::{ConnectionRole, ImplementationType};

/// File name of the default profile for an implementation.
pub fn default_profile_filename(kind: ImplementationType) -> String {
    format!("{}.profile", kind.as_str())
}

/// Read-only index of every profile that loaded successfully.
#[derive(Debug, Default, Clone)]
pub struct ProfileStore {
    /// Load order; the first eligible entry wins.
    profiles: Vec<Arc<ParameterProfile>>,
    defaults: HashMap<(ConnectionRole, ImplementationType), Arc<ParameterProfile>>,
}

impl ProfileStore {
    /// Load `{root}/{role}/*` for every role.
    ///
    /// Unreadable directories and broken documents are logged and skipped;
    /// the remaining files still load.
    pub fn load(root: &Path) -> Self {
        let mut store = Self::default();

        for role in ConnectionRole::ALL {
            let dir = root.join(role.as_str());
            let mut files: Vec<PathBuf> = match std::fs::read_dir(&dir) {
                Ok(entries) => entries
                    .flatten()
                    .map(|entry| entry.path())
                    .filter(|path| path.is_file())
                    .collect(),
                Err(e) => {
                    tracing::warn!("Problem reading {} profiles from {}: {}", role, dir.display(), e);
                    continue;
                }
            };
            files.sort();

            for path in files {
                let loaded = std::fs::read_to_string(&path)
                    .map_err(|source| ProfileError::Io {
                        path: path.clone(),
                        source,
                    })
                    .and_then(|contents| ParameterProfile::parse(&path, &contents));
                store.add(role, &path, loaded);
            }
        }

        tracing::debug!(
            "Loaded {} profiles ({} defaults) from {}",
            store.profiles.len(),
            store.defaults.len(),
            root.display()
        );
        store
    }

    /// Build a store from in-memory documents, in the given order.
    pub fn from_documents<I, S>(documents: I) -> Self
    where
        I: IntoIterator<Item = (ConnectionRole, S, S)>,
        S: AsRef<str>,
    {
        let mut store = Self::default();
        for (role, filename, contents) in documents {
            let path = PathBuf::from(role.as_str()).join(filename.as_ref());
            let loaded = ParameterProfile::parse(&path, contents.as_ref());
            store.add(role, &path, loaded);
        }
        store
    }

    fn add(
        &mut self,
        role: ConnectionRole,
        path: &Path,
        loaded: std::result::Result<ParameterProfile, ProfileError>,
    ) {
        let profile = match loaded.and_then(|profile| {
            if profile.role() == role {
                Ok(profile)
            } else {
                Err(ProfileError::RoleMismatch {
                    path: path.to_path_buf(),
                    declared: profile.role(),
                    expected: role,
                })
            }
        }) {
            Ok(profile) => Arc::new(profile),
            Err(e) => {
                tracing::warn!("Skipping profile: {}", e);
                return;
            }
        };

        tracing::debug!(
            "Loaded: {} : {} - {}",
            profile.name(),
            profile.role(),
            profile.description()
        );

        let is_default = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name == default_profile_filename(profile.kind()));
        if is_default {
            self.defaults
                .entry((role, profile.kind()))
                .or_insert_with(|| Arc::clone(&profile));
        }

        self.profiles.push(profile);
    }

    /// Select the profile for a version, falling back to the default.
    pub fn resolve(
        &self,
        kind: ImplementationType,
        version: &str,
        role: ConnectionRole,
    ) -> Result<Arc<ParameterProfile>> {
        let specific = self.profiles.iter().find(|profile| {
            profile.role() == role && profile.kind() == kind && profile.matches_version(version)
        });

        match specific {
            Some(profile) => Ok(Arc::clone(profile)),
            None => self.resolve_default(kind, role).map_err(|_| {
                ProvisionError::ProfileNotFound {
                    role,
                    kind,
                    version: version.to_string(),
                }
            }),
        }
    }

    /// The default profile registered for a pair.
    pub fn resolve_default(
        &self,
        kind: ImplementationType,
        role: ConnectionRole,
    ) -> Result<Arc<ParameterProfile>> {
        self.defaults
            .get(&(role, kind))
            .cloned()
            .ok_or_else(|| ProvisionError::ProfileNotFound {
                role,
                kind,
                version: "default".to_string(),
            })
    }

    /// Loaded profiles for a role, in load order.
    pub fn profiles(&self, role: ConnectionRole) -> impl Iterator<Item = &Arc<ParameterProfile>> {
        self.profiles.iter().filter(move |p| p.role() == role)
    }

    pub fn has_default(&self, kind: ImplementationType, role: ConnectionRole) -> bool {
        self.defaults.contains_key(&(role, kind))
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}
