//! Payload → records pipeline used by the CLI and by embedding services.

use tracing::{debug, info, warn};

use crate::extract::{
    TripUpdateEvent, VehiclePositionEvent, extract_trip_updates, extract_vehicle_positions,
};
use crate::feed::DecodedFeed;
use crate::parser::parse_feed;
use crate::payload::RawFeedPayload;
use crate::stats::FeedStats;

/// Everything one payload produced.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedRecords {
    pub trip_updates: Vec<TripUpdateEvent>,
    pub vehicle_positions: Vec<VehiclePositionEvent>,
    pub stats: FeedStats,
}

impl FeedRecords {
    pub fn is_empty(&self) -> bool {
        self.trip_updates.is_empty() && self.vehicle_positions.is_empty()
    }
}

/// Decodes a payload and runs both extractors over it.
///
/// Returns `None` when the bytes are not a GTFS-RT feed; the caller should
/// skip this fetch cycle.
#[tracing::instrument(
    skip(payload),
    fields(source = %payload.source, feed_type = %payload.feed_type, bytes = payload.len())
)]
pub fn ingest(payload: &RawFeedPayload) -> Option<FeedRecords> {
    let feed = match parse_feed(&payload.bytes) {
        Ok(message) => DecodedFeed::from(message),
        Err(e) => {
            warn!(error = %e, "Feed decode failed, skipping");
            return None;
        }
    };
    debug!(
        entity_count = feed.entities.len(),
        version = %feed.header.gtfs_realtime_version,
        "Feed decoded"
    );

    let records = extract_all(&feed, payload);

    info!(
        trip_update_events = records.trip_updates.len(),
        vehicle_position_events = records.vehicle_positions.len(),
        missing_trip_id = records.stats.missing_trip_id,
        missing_vehicle_id = records.stats.missing_vehicle_id,
        missing_position = records.stats.missing_position,
        stop_time_yield_pct = records.stats.stop_time_yield_pct(),
        vehicle_yield_pct = records.stats.vehicle_yield_pct(),
        "Feed extracted"
    );

    Some(records)
}

fn extract_all(feed: &DecodedFeed, payload: &RawFeedPayload) -> FeedRecords {
    let fetched_at = payload.fetched_at;

    FeedRecords {
        trip_updates: extract_trip_updates(feed, fetched_at),
        vehicle_positions: extract_vehicle_positions(feed, fetched_at),
        stats: FeedStats::from_feed(feed).with_payload_info(
            &payload.source,
            payload.feed_type.as_str(),
            fetched_at,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gtfs_rt::trip_update::StopTimeUpdate;
    use crate::gtfs_rt::{FeedEntity, FeedHeader, FeedMessage, TripDescriptor, TripUpdate};
    use crate::payload::FeedType;
    use chrono::Utc;
    use prost::Message;

    fn trip_update_bytes() -> Vec<u8> {
        FeedMessage {
            header: FeedHeader {
                gtfs_realtime_version: "2.0".to_string(),
                timestamp: None,
                incrementality: None,
                feed_version: None,
            },
            entity: vec![FeedEntity {
                id: "trip_1".to_string(),
                trip_update: Some(TripUpdate {
                    trip: TripDescriptor {
                        trip_id: Some("TRIP_001".to_string()),
                        ..Default::default()
                    },
                    stop_time_update: vec![StopTimeUpdate {
                        stop_id: Some("STOP_123".to_string()),
                        stop_sequence: Some(5),
                        ..Default::default()
                    }],
                    ..Default::default()
                }),
                ..Default::default()
            }],
        }
        .encode_to_vec()
    }

    #[test]
    fn test_ingest_runs_both_extractors() {
        // feed_type is informational; a vehicle-tagged payload still yields trip updates
        let now = Utc::now();
        let payload = RawFeedPayload::new("test", FeedType::VehiclePositions, now, trip_update_bytes());

        let records = ingest(&payload).unwrap();

        assert_eq!(records.trip_updates.len(), 1);
        assert!(records.vehicle_positions.is_empty());
        assert_eq!(records.trip_updates[0].fetched_at, now);
        assert_eq!(records.stats.source.as_deref(), Some("test"));
        assert_eq!(records.stats.feed_type.as_deref(), Some("vehicle_positions"));
        assert!(!records.is_empty());
    }

    #[test]
    fn test_ingest_malformed_is_none() {
        let payload = RawFeedPayload::new(
            "test",
            FeedType::TripUpdates,
            Utc::now(),
            b"not a valid protobuf".to_vec(),
        );

        assert!(ingest(&payload).is_none());
    }

    #[test]
    fn test_ingest_empty_payload_is_empty_records() {
        let payload = RawFeedPayload::new("test", FeedType::TripUpdates, Utc::now(), Vec::new());

        let records = ingest(&payload).unwrap();

        assert!(records.is_empty());
        assert_eq!(records.stats.total_entities, 0);
    }
}
