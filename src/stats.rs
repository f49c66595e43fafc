use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::extract::trip_updates::{
    StopTimeRejection, TripRejection, validate_stop_time_update, validate_trip,
};
use crate::extract::vehicle_positions::{VehicleRejection, validate_vehicle};
use crate::feed::{DecodedFeed, EntityKind, IgnoredKind};

/// Per-feed counters describing what extraction kept and dropped.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct FeedStats {
    pub fetched_at: Option<DateTime<Utc>>,
    pub source: Option<String>,
    pub feed_type: Option<String>,
    pub gtfs_realtime_version: String,
    pub feed_timestamp: Option<DateTime<Utc>>,
    pub total_entities: usize,

    // entity types
    pub trip_updates: usize,
    pub vehicles: usize,
    pub alerts: usize,
    pub shapes: usize,
    pub stops: usize,
    pub trip_modifications: usize,
    pub empty_entities: usize,

    // trip updates
    pub stop_time_updates: usize,
    pub trip_update_events: usize,
    pub missing_trip_id: usize,
    pub missing_stop_id: usize,
    pub missing_stop_sequence: usize,

    // vehicles
    pub vehicle_position_events: usize,
    pub missing_vehicle_id: usize,
    pub missing_position: usize,
}

impl FeedStats {
    pub fn from_feed(feed: &DecodedFeed) -> Self {
        let mut s = FeedStats {
            gtfs_realtime_version: feed.header.gtfs_realtime_version.clone(),
            feed_timestamp: feed.header.timestamp,
            total_entities: feed.entities.len(),
            ..Default::default()
        };

        for e in &feed.entities {
            if e.payloads.is_empty() {
                s.empty_entities += 1;
            }

            for kind in &e.payloads {
                match kind {
                    EntityKind::TripUpdate(tu) => {
                        s.trip_updates += 1;
                        s.stop_time_updates += tu.stop_time_update.len();

                        match validate_trip(tu) {
                            Ok(_) => {
                                for stu in &tu.stop_time_update {
                                    match validate_stop_time_update(stu) {
                                        Ok(_) => s.trip_update_events += 1,
                                        Err(StopTimeRejection::MissingStopId) => {
                                            s.missing_stop_id += 1
                                        }
                                        Err(StopTimeRejection::MissingStopSequence) => {
                                            s.missing_stop_sequence += 1
                                        }
                                    }
                                }
                            }
                            Err(TripRejection::MissingTripId) => s.missing_trip_id += 1,
                        }
                    }
                    EntityKind::VehiclePosition(vp) => {
                        s.vehicles += 1;

                        match validate_vehicle(vp) {
                            Ok(_) => s.vehicle_position_events += 1,
                            Err(VehicleRejection::MissingVehicleId) => s.missing_vehicle_id += 1,
                            Err(VehicleRejection::MissingPosition) => s.missing_position += 1,
                        }
                    }
                    EntityKind::Ignored(IgnoredKind::Alert) => s.alerts += 1,
                    EntityKind::Ignored(IgnoredKind::Shape) => s.shapes += 1,
                    EntityKind::Ignored(IgnoredKind::Stop) => s.stops += 1,
                    EntityKind::Ignored(IgnoredKind::TripModifications) => s.trip_modifications += 1,
                }
            }
        }

        s
    }

    pub fn pct(part: usize, total: usize) -> f64 {
        if total == 0 {
            0.0
        } else {
            (part as f64 / total as f64) * 100.0
        }
    }

    /// Share of vehicle entities that became records.
    pub fn vehicle_yield_pct(&self) -> f64 {
        Self::pct(self.vehicle_position_events, self.vehicles)
    }

    /// Share of stop time updates that became records.
    pub fn stop_time_yield_pct(&self) -> f64 {
        Self::pct(self.trip_update_events, self.stop_time_updates)
    }

    /// Set payload metadata
    pub fn with_payload_info(mut self, source: &str, feed_type: &str, fetched_at: DateTime<Utc>) -> Self {
        self.source = Some(source.to_string());
        self.feed_type = Some(feed_type.to_string());
        self.fetched_at = Some(fetched_at);
        self
    }
}
