//! Platform catalog: identity platforms and the stamp providers grouped under each.
//!
//! The catalog is read-only input to aggregation. Load from: env
//! `PASSPORT_PLATFORMS_PATH`, or `./config/platforms.json`, or `./platforms.json`.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

const CATALOG_PATH_ENV: &str = "PASSPORT_PLATFORMS_PATH";

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderSpec {
    pub title: String,
    /// Stable provider id, the key into weights and stamp scores.
    pub name: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformGroup {
    pub platform_group: String,
    #[serde(default)]
    pub providers: Vec<ProviderSpec>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformCatalogEntry {
    /// Platform id, e.g. `Brightid`.
    pub platform: String,
    /// Display name.
    pub name: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub groups: Vec<PlatformGroup>,
}

impl PlatformCatalogEntry {
    /// Provider ids across all groups, in catalog order.
    pub fn provider_ids(&self) -> impl Iterator<Item = &str> {
        self.groups
            .iter()
            .flat_map(|g| g.providers.iter().map(|p| p.name.as_str()))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlatformCatalog {
    pub platforms: Vec<PlatformCatalogEntry>,
}

impl PlatformCatalog {
    pub fn new(platforms: Vec<PlatformCatalogEntry>) -> Self {
        Self { platforms }
    }

    pub fn load_from_path(path: &Path) -> Result<Self, CatalogError> {
        let content = std::fs::read_to_string(path)?;
        let catalog: Self = serde_json::from_str(&content)?;
        debug!(path = %path.display(), platforms = catalog.platforms.len(), "catalog loaded");
        Ok(catalog)
    }

    /// Env path, then the default locations. Empty catalog when none is usable.
    pub fn load() -> Self {
        let env_path = std::env::var(CATALOG_PATH_ENV).ok();
        let candidates = env_path
            .iter()
            .map(Path::new)
            .chain([
                Path::new("./config/platforms.json"),
                Path::new("./platforms.json"),
            ]);
        for candidate in candidates {
            if !candidate.exists() {
                continue;
            }
            match Self::load_from_path(candidate) {
                Ok(catalog) => return catalog,
                Err(e) => warn!(path = %candidate.display(), error = %e, "skipping catalog"),
            }
        }
        Self::default()
    }

    pub fn entries(&self) -> &[PlatformCatalogEntry] {
        &self.platforms
    }

    pub fn is_empty(&self) -> bool {
        self.platforms.is_empty()
    }
}
