use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::payload::FeedType;

/// One captured feed file to ingest.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SourceEntry {
    pub path: PathBuf,
    pub feed_type: FeedType,
}

/// Maps source ids to captured feed files.
///
/// Stored as a plain JSON object on disk:
/// ```json
/// {
///   "mbta-tu": { "path": "captures/mbta_tu.pb", "feed_type": "trip_updates" },
///   "mbta-vp": { "path": "captures/mbta_vp.pb.gz", "feed_type": "vehicle_positions" }
/// }
/// ```
#[derive(Debug, Default)]
pub struct SourceConfig {
    entries: BTreeMap<String, SourceEntry>,
}

impl SourceConfig {
    /// Loads the config from a JSON file at `path`.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading source config {path}"))?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let entries: BTreeMap<String, SourceEntry> = serde_json::from_str(content)?;
        Ok(Self { entries })
    }

    /// Iterates over all `(source, entry)` pairs, sorted by source id.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SourceEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
