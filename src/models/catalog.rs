use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

/// Reference entry of the static miner catalog. Read-only to the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalSpec {
    pub name: String,
    #[serde(rename = "hashrateTH")]
    pub hashrate_th: f64,
    pub power_watts: u32,
}

#[derive(Debug, Clone, Default)]
pub struct CanonicalCatalog {
    pub specs: Vec<CanonicalSpec>,
}

impl CanonicalCatalog {
    pub fn new(specs: Vec<CanonicalSpec>) -> Self {
        Self { specs }
    }

    /// Loads a JSON array of specs. A missing file is not fatal: enrichment is
    /// simply skipped.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            warn!("Miner catalog {} not found, power enrichment disabled", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read miner catalog {}", path.display()))?;
        let specs: Vec<CanonicalSpec> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse miner catalog {}", path.display()))?;

        info!("Loaded {} reference miners from {}", specs.len(), path.display());
        Ok(Self { specs })
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}
