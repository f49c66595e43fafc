//! Flattens trip update entities into one record per stop time update.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::feed::DecodedFeed;
use crate::gtfs_rt::TripUpdate;
use crate::gtfs_rt::trip_update::{StopTimeEvent, StopTimeUpdate};

/// One row of `trip_update_events`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TripUpdateEvent {
    pub fetched_at: DateTime<Utc>,
    pub trip_id: String,
    pub route_id: Option<String>,
    pub direction_id: Option<u32>,
    pub stop_id: String,
    pub stop_sequence: u32,
    /// Seconds, negative when early.
    pub arrival_delay: Option<i32>,
    pub departure_delay: Option<i32>,
    pub arrival_time: Option<DateTime<Utc>>,
    pub departure_time: Option<DateTime<Utc>>,
}

/// Why a whole trip update entity produced no records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TripRejection {
    MissingTripId,
}

impl fmt::Display for TripRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TripRejection::MissingTripId => f.write_str("trip descriptor has no trip_id"),
        }
    }
}

/// Why a single stop time update produced no record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopTimeRejection {
    MissingStopId,
    MissingStopSequence,
}

impl fmt::Display for StopTimeRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopTimeRejection::MissingStopId => f.write_str("stop time update has no stop_id"),
            StopTimeRejection::MissingStopSequence => {
                f.write_str("stop time update has no stop_sequence")
            }
        }
    }
}

/// Trip-level fields shared by every record of one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TripFields<'a> {
    pub trip_id: &'a str,
    pub route_id: Option<&'a str>,
    pub direction_id: Option<u32>,
}

/// Stop-level fields of one accepted stop time update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopFields<'a> {
    pub stop_id: &'a str,
    pub stop_sequence: u32,
    pub arrival_delay: Option<i32>,
    pub departure_delay: Option<i32>,
    pub arrival_time: Option<DateTime<Utc>>,
    pub departure_time: Option<DateTime<Utc>>,
}

/// Entity layer: a trip update without a trip id is unusable as a whole.
pub fn validate_trip(trip_update: &TripUpdate) -> Result<TripFields<'_>, TripRejection> {
    let trip = &trip_update.trip;
    let trip_id = non_empty(trip.trip_id.as_deref()).ok_or(TripRejection::MissingTripId)?;

    Ok(TripFields {
        trip_id,
        route_id: trip.route_id.as_deref(),
        direction_id: trip.direction_id,
    })
}

/// Stop layer: rejects only this update, siblings are unaffected.
pub fn validate_stop_time_update(
    update: &StopTimeUpdate,
) -> Result<StopFields<'_>, StopTimeRejection> {
    let stop_id = non_empty(update.stop_id.as_deref()).ok_or(StopTimeRejection::MissingStopId)?;
    let stop_sequence = update
        .stop_sequence
        .ok_or(StopTimeRejection::MissingStopSequence)?;

    let arrival = update.arrival.as_ref();
    let departure = update.departure.as_ref();

    Ok(StopFields {
        stop_id,
        stop_sequence,
        arrival_delay: arrival.and_then(|e| e.delay),
        departure_delay: departure.and_then(|e| e.delay),
        arrival_time: arrival.and_then(event_time),
        departure_time: departure.and_then(event_time),
    })
}

/// Lazily yields one event per accepted stop time update, in feed order.
pub fn trip_update_events(
    feed: &DecodedFeed,
    fetched_at: DateTime<Utc>,
) -> impl Iterator<Item = TripUpdateEvent> + '_ {
    feed.trip_updates()
        .filter_map(|(_, tu)| validate_trip(tu).ok().map(|trip| (trip, tu)))
        .flat_map(move |(trip, tu)| {
            tu.stop_time_update
                .iter()
                .filter_map(|stu| validate_stop_time_update(stu).ok())
                .map(move |stop| TripUpdateEvent {
                    fetched_at,
                    trip_id: trip.trip_id.to_string(),
                    route_id: trip.route_id.map(str::to_string),
                    direction_id: trip.direction_id,
                    stop_id: stop.stop_id.to_string(),
                    stop_sequence: stop.stop_sequence,
                    arrival_delay: stop.arrival_delay,
                    departure_delay: stop.departure_delay,
                    arrival_time: stop.arrival_time,
                    departure_time: stop.departure_time,
                })
        })
}

pub fn extract_trip_updates(feed: &DecodedFeed, fetched_at: DateTime<Utc>) -> Vec<TripUpdateEvent> {
    trip_update_events(feed, fetched_at).collect()
}

fn event_time(event: &StopTimeEvent) -> Option<DateTime<Utc>> {
    event
        .time
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
}

pub(crate) fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::{EntityKind, FeedEntity};
    use crate::gtfs_rt::TripDescriptor;

    fn fetched_at() -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_768_300_000, 0).unwrap()
    }

    fn trip(trip_id: Option<&str>) -> TripDescriptor {
        TripDescriptor {
            trip_id: trip_id.map(str::to_string),
            route_id: Some("ROUTE_A".to_string()),
            direction_id: Some(1),
            ..Default::default()
        }
    }

    fn stop(stop_id: Option<&str>, stop_sequence: Option<u32>) -> StopTimeUpdate {
        StopTimeUpdate {
            stop_id: stop_id.map(str::to_string),
            stop_sequence,
            ..Default::default()
        }
    }

    fn feed_of(updates: Vec<TripUpdate>) -> DecodedFeed {
        DecodedFeed {
            entities: updates
                .into_iter()
                .enumerate()
                .map(|(i, tu)| FeedEntity::new(format!("tu{i}"), EntityKind::TripUpdate(tu)))
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_missing_trip_id_skips_entity() {
        let tu = TripUpdate {
            trip: trip(None),
            stop_time_update: vec![stop(Some("S1"), Some(1)), stop(Some("S2"), Some(2))],
            ..Default::default()
        };

        assert_eq!(validate_trip(&tu), Err(TripRejection::MissingTripId));
        assert!(extract_trip_updates(&feed_of(vec![tu]), fetched_at()).is_empty());
    }

    #[test]
    fn test_empty_trip_id_skips_entity() {
        let tu = TripUpdate {
            trip: trip(Some("")),
            stop_time_update: vec![stop(Some("S1"), Some(1))],
            ..Default::default()
        };

        assert!(extract_trip_updates(&feed_of(vec![tu]), fetched_at()).is_empty());
    }

    #[test]
    fn test_bad_stop_time_update_skips_only_itself() {
        let tu = TripUpdate {
            trip: trip(Some("T1")),
            stop_time_update: vec![
                stop(Some("S1"), Some(1)),
                stop(None, Some(2)),
                stop(Some(""), Some(3)),
                stop(Some("S4"), None),
                stop(Some("S5"), Some(5)),
            ],
            ..Default::default()
        };

        let events = extract_trip_updates(&feed_of(vec![tu]), fetched_at());

        let stops: Vec<_> = events.iter().map(|e| e.stop_id.as_str()).collect();
        assert_eq!(stops, vec!["S1", "S5"]);
    }

    #[test]
    fn test_stop_rejection_reasons() {
        assert_eq!(
            validate_stop_time_update(&stop(None, Some(1))),
            Err(StopTimeRejection::MissingStopId)
        );
        assert_eq!(
            validate_stop_time_update(&stop(Some("S"), None)),
            Err(StopTimeRejection::MissingStopSequence)
        );
    }

    #[test]
    fn test_absent_delays_are_none_not_zero() {
        let tu = TripUpdate {
            trip: TripDescriptor {
                trip_id: Some("T1".to_string()),
                ..Default::default()
            },
            stop_time_update: vec![StopTimeUpdate {
                stop_id: Some("S1".to_string()),
                stop_sequence: Some(0),
                arrival: Some(StopTimeEvent {
                    time: Some(1_768_300_120),
                    ..Default::default()
                }),
                ..Default::default()
            }],
            ..Default::default()
        };

        let events = extract_trip_updates(&feed_of(vec![tu]), fetched_at());

        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.route_id, None);
        assert_eq!(event.direction_id, None);
        assert_eq!(event.stop_sequence, 0);
        assert_eq!(event.arrival_delay, None);
        assert_eq!(event.departure_delay, None);
        assert_eq!(
            event.arrival_time,
            DateTime::<Utc>::from_timestamp(1_768_300_120, 0)
        );
        assert_eq!(event.departure_time, None);
    }

    #[test]
    fn test_negative_delay_passes_through() {
        let tu = TripUpdate {
            trip: trip(Some("T1")),
            stop_time_update: vec![StopTimeUpdate {
                stop_id: Some("S1".to_string()),
                stop_sequence: Some(1),
                departure: Some(StopTimeEvent {
                    delay: Some(-45),
                    ..Default::default()
                }),
                ..Default::default()
            }],
            ..Default::default()
        };

        let events = extract_trip_updates(&feed_of(vec![tu]), fetched_at());

        assert_eq!(events[0].departure_delay, Some(-45));
        assert_eq!(events[0].arrival_delay, None);
    }

    #[test]
    fn test_order_and_duplicates_preserved() {
        let first = TripUpdate {
            trip: trip(Some("T1")),
            stop_time_update: vec![stop(Some("S1"), Some(1)), stop(Some("S1"), Some(1))],
            ..Default::default()
        };
        let second = TripUpdate {
            trip: trip(Some("T2")),
            stop_time_update: vec![stop(Some("S9"), Some(9))],
            ..Default::default()
        };

        let events = extract_trip_updates(&feed_of(vec![first, second]), fetched_at());

        let keys: Vec<_> = events
            .iter()
            .map(|e| (e.trip_id.as_str(), e.stop_id.as_str()))
            .collect();
        assert_eq!(keys, vec![("T1", "S1"), ("T1", "S1"), ("T2", "S9")]);
        assert!(events.iter().all(|e| e.fetched_at == fetched_at()));
    }

    #[test]
    fn test_vehicle_entities_ignored() {
        let mut feed = feed_of(vec![]);
        feed.entities.push(FeedEntity::new(
            "v",
            EntityKind::VehiclePosition(Default::default()),
        ));

        assert_eq!(trip_update_events(&feed, fetched_at()).count(), 0);
    }
}
