//! Read-through cache over the static data directory.
//!
//! Each document (the zip mapping, each state's roster, the policy file) is
//! read from disk at most once per [`DataStore`] and kept for the life of the
//! store. Nothing is ever invalidated: restart the process to pick up edited
//! files.
//!
//! A missing or unparsable document is logged once and remembered as absent,
//! so the failure only affects lookups that need that document.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use tokio::sync::{OnceCell, RwLock};

use crate::states::StateTable;
use crate::types::{LocationInfo, Provider, ProviderData, StatePolicies, StatePolicy, ZipMapping};

pub const ZIP_MAPPINGS_FILE: &str = "zip-mappings.json";
pub const PROVIDERS_DIR: &str = "providers";
pub const POLICIES_FILE: &str = "policies/state-policies.json";

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

async fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T, LoadError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| LoadError::Io {
            path: path.display().to_string(),
            source,
        })?;
    serde_json::from_str(&content).map_err(|source| LoadError::Parse {
        path: path.display().to_string(),
        source,
    })
}

/// Shared data access for request handlers.
///
/// Construct once at start-up and share behind an `Arc`.
pub struct DataStore {
    root: PathBuf,
    states: StateTable,
    zip_mappings: OnceCell<Option<Arc<ZipMapping>>>,
    policies: OnceCell<Option<Arc<StatePolicies>>>,
    rosters: RwLock<HashMap<String, Arc<RosterCell>>>,
}

/// Populated once per state; `None` when the roster failed to load
type RosterCell = OnceCell<Option<Arc<ProviderData>>>;

impl DataStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_states(root, StateTable::default())
    }

    pub fn with_states(root: impl Into<PathBuf>, states: StateTable) -> Self {
        Self {
            root: root.into(),
            states,
            zip_mappings: OnceCell::new(),
            policies: OnceCell::new(),
            rosters: RwLock::new(HashMap::new()),
        }
    }

    pub fn states(&self) -> &StateTable {
        &self.states
    }

    /// The whole zip mapping, `None` if the file could not be loaded
    pub async fn zip_mappings(&self) -> Option<Arc<ZipMapping>> {
        self.zip_mappings
            .get_or_init(|| async {
                let path = self.root.join(ZIP_MAPPINGS_FILE);
                match load_json::<ZipMapping>(&path).await {
                    Ok(mapping) => {
                        tracing::info!(zips = mapping.len(), "loaded zip mappings");
                        Some(Arc::new(mapping))
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "zip mappings unavailable");
                        None
                    }
                }
            })
            .await
            .clone()
    }

    /// All policies keyed by state code
    pub async fn state_policies(&self) -> Option<Arc<StatePolicies>> {
        self.policies
            .get_or_init(|| async {
                let path = self.root.join(POLICIES_FILE);
                match load_json::<StatePolicies>(&path).await {
                    Ok(policies) => {
                        tracing::info!(states = policies.len(), "loaded state policies");
                        Some(Arc::new(policies))
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "state policies unavailable");
                        None
                    }
                }
            })
            .await
            .clone()
    }

    /// Roster for a supported state.
    ///
    /// Concurrent first requests for one state share a single load. The map
    /// lock is only held to find or create the state's cell, never across the
    /// file read, so a slow load does not hold up other states.
    pub async fn get_providers_for_state(&self, state_code: &str) -> Option<Arc<ProviderData>> {
        let state = self.states.get(state_code)?;
        let cell = self.roster_cell(state_code).await;

        cell.get_or_init(|| async {
            let path = self.root.join(PROVIDERS_DIR).join(&state.roster_file);
            match load_json::<ProviderData>(&path).await {
                Ok(data) => {
                    tracing::info!(state = state_code, providers = data.providers.len(), "loaded provider roster");
                    Some(Arc::new(data))
                }
                Err(e) => {
                    tracing::error!(state = state_code, error = %e, "error loading providers");
                    None
                }
            }
        })
        .await
        .clone()
    }

    /// Read-lock fast path, then write lock with a second check
    async fn roster_cell(&self, state_code: &str) -> Arc<RosterCell> {
        {
            let cache = self.rosters.read().await;
            if let Some(cell) = cache.get(state_code) {
                return Arc::clone(cell);
            }
        }

        let mut cache = self.rosters.write().await;
        Arc::clone(cache.entry(state_code.to_string()).or_default())
    }

    /// Location for an already-normalized 5-digit zip
    pub async fn lookup_zip_code(&self, zip: &str) -> Option<LocationInfo> {
        let mappings = self.zip_mappings().await?;
        mappings.get(zip).map(|entry| entry.location(zip))
    }

    /// Providers serving a zip; empty when the zip is unknown or its state's
    /// roster is unavailable.
    pub async fn get_providers_by_zip_code(&self, zip: &str) -> Vec<Provider> {
        let Some(mappings) = self.zip_mappings().await else {
            return Vec::new();
        };
        let Some(entry) = mappings.get(zip) else {
            return Vec::new();
        };
        if entry.providers.is_empty() {
            return Vec::new();
        }

        let Some(roster) = self.get_providers_for_state(&entry.state_code).await else {
            return Vec::new();
        };

        roster
            .providers
            .iter()
            .filter(|p| entry.providers.contains(&p.id))
            .cloned()
            .collect()
    }

    /// Find a provider by id, in one state or across all supported states in
    /// table order.
    pub async fn get_provider_by_id(&self, provider_id: &str, state_code: Option<&str>) -> Option<Provider> {
        if let Some(code) = state_code {
            let roster = self.get_providers_for_state(code).await?;
            return roster.find(provider_id).cloned();
        }

        for code in self.states.codes() {
            let Some(roster) = self.get_providers_for_state(code).await else {
                continue;
            };
            if let Some(provider) = roster.find(provider_id) {
                return Some(provider.clone());
            }
        }

        None
    }

    pub async fn get_state_policy(&self, state_code: &str) -> Option<StatePolicy> {
        let policies = self.state_policies().await?;
        policies.get(state_code).cloned()
    }
}
