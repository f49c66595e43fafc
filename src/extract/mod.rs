//! Record extraction from decoded feeds.
//!
//! Each extractor walks the same [`crate::feed::DecodedFeed`] read-only and
//! validates in two layers: the entity as a whole, then each nested record.
//! A failed check drops records; it never produces a partial one.

pub mod trip_updates;
pub mod vehicle_positions;

pub use trip_updates::{
    StopTimeRejection, TripRejection, TripUpdateEvent, extract_trip_updates, trip_update_events,
};
pub use vehicle_positions::{
    VehiclePositionEvent, VehicleRejection, extract_vehicle_positions, vehicle_position_events,
};
