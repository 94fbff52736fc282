//! `apply-to-worlds` partition configuration.
//!
//! ```json
//! {
//!   "apply-to-worlds": {
//!     "nether_world": "nether",
//!     "end_world": "end"
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::PartitionError;

use super::tag::PartitionTag;

/// World-name to dimension mapping as read from disk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionConfig {
    /// World folder name → dimension name ("nether" or "end")
    #[serde(rename = "apply-to-worlds", default)]
    pub apply_to_worlds: BTreeMap<String, String>,
}

impl PartitionConfig {
    /// Parse a JSON document.
    pub fn from_json(json: &str) -> Result<Self, PartitionError> {
        serde_json::from_str(json).map_err(|e| PartitionError::Config(e.to_string()))
    }

    /// Read and parse a JSON file.
    pub fn load(path: &Path) -> Result<Self, PartitionError> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| PartitionError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&json)
    }

    /// Resolve every dimension name to a tag.
    ///
    /// Fails on the first unknown dimension.
    pub fn resolve(&self) -> Result<Vec<(String, PartitionTag)>, PartitionError> {
        self.apply_to_worlds
            .iter()
            .map(|(world, dimension)| {
                PartitionTag::from_config_name(dimension).map(|tag| (world.clone(), tag))
            })
            .collect()
    }
}
