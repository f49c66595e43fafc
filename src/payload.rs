//! Raw feed payloads as handed over by a fetcher.

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use serde::{Deserialize, Serialize};

/// Which GTFS-RT endpoint a payload was captured from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum FeedType {
    TripUpdates,
    VehiclePositions,
}

impl FeedType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedType::TripUpdates => "trip_updates",
            FeedType::VehiclePositions => "vehicle_positions",
        }
    }
}

impl fmt::Display for FeedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bytes of one fetch plus its metadata. Cloning shares the buffer.
#[derive(Debug, Clone)]
pub struct RawFeedPayload {
    pub fetched_at: DateTime<Utc>,
    pub feed_type: FeedType,
    pub source: String,
    pub bytes: Bytes,
}

impl RawFeedPayload {
    pub fn new(
        source: impl Into<String>,
        feed_type: FeedType,
        fetched_at: DateTime<Utc>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        RawFeedPayload {
            fetched_at,
            feed_type,
            source: source.into(),
            bytes: bytes.into(),
        }
    }

    /// Reads a captured feed from disk, gunzipping `*.gz` files.
    ///
    /// The file's modification time stands in for the fetch time.
    pub fn from_file(source: impl Into<String>, feed_type: FeedType, path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
        let fetched_at = file
            .metadata()
            .and_then(|m| m.modified())
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());

        let mut bytes = Vec::new();
        if path.extension().is_some_and(|ext| ext == "gz") {
            GzDecoder::new(file)
                .read_to_end(&mut bytes)
                .with_context(|| format!("gunzipping {}", path.display()))?;
        } else {
            let mut file = file;
            file.read_to_end(&mut bytes)?;
        }

        Ok(Self::new(source, feed_type, fetched_at, bytes))
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
