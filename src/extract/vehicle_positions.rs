//! Flattens vehicle position entities into one record per vehicle.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::extract::trip_updates::non_empty;
use crate::feed::DecodedFeed;
use crate::gtfs_rt::{Position, VehiclePosition};

/// One row of `vehicle_positions`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VehiclePositionEvent {
    pub fetched_at: DateTime<Utc>,
    pub vehicle_id: String,
    pub trip_id: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    /// Degrees clockwise from true north.
    pub bearing: Option<f64>,
    /// Meters per second.
    pub speed: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VehicleRejection {
    MissingVehicleId,
    MissingPosition,
}

impl fmt::Display for VehicleRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VehicleRejection::MissingVehicleId => f.write_str("vehicle descriptor has no id"),
            VehicleRejection::MissingPosition => f.write_str("vehicle has no position"),
        }
    }
}

/// Accepted vehicle: its id and the position sub-message it carried.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VehicleFields<'a> {
    pub vehicle_id: &'a str,
    pub trip_id: Option<&'a str>,
    pub position: &'a Position,
}

/// Checks the vehicle id and the presence of the position sub-message.
///
/// Latitude and longitude are `required` on the wire, so an unset value is
/// indistinguishable from 0.0. Only the presence of `position` itself counts.
pub fn validate_vehicle(vehicle: &VehiclePosition) -> Result<VehicleFields<'_>, VehicleRejection> {
    let vehicle_id = non_empty(vehicle.vehicle.as_ref().and_then(|d| d.id.as_deref()))
        .ok_or(VehicleRejection::MissingVehicleId)?;
    let position = vehicle
        .position
        .as_ref()
        .ok_or(VehicleRejection::MissingPosition)?;

    Ok(VehicleFields {
        vehicle_id,
        trip_id: non_empty(vehicle.trip.as_ref().and_then(|t| t.trip_id.as_deref())),
        position,
    })
}

/// Lazily yields one event per accepted vehicle, in feed order.
pub fn vehicle_position_events(
    feed: &DecodedFeed,
    fetched_at: DateTime<Utc>,
) -> impl Iterator<Item = VehiclePositionEvent> + '_ {
    feed.vehicle_positions()
        .filter_map(|(_, vp)| validate_vehicle(vp).ok())
        .map(move |v| VehiclePositionEvent {
            fetched_at,
            vehicle_id: v.vehicle_id.to_string(),
            trip_id: v.trip_id.map(str::to_string),
            latitude: widen(v.position.latitude),
            longitude: widen(v.position.longitude),
            bearing: v.position.bearing.map(widen),
            speed: v.position.speed.map(widen),
        })
}

pub fn extract_vehicle_positions(
    feed: &DecodedFeed,
    fetched_at: DateTime<Utc>,
) -> Vec<VehiclePositionEvent> {
    vehicle_position_events(feed, fetched_at).collect()
}

/// Widens to the `f64` with the same shortest decimal form, so 40.7128f32
/// becomes 40.7128 rather than 40.71279907226562. This is the value protobuf
/// runtimes that expose `float` fields as doubles hand out.
fn widen(value: f32) -> f64 {
    format!("{value}").parse().unwrap_or(f64::from(value))
}
