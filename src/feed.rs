//! In-memory representation of a decoded GTFS-RT feed.
//!
//! The generated [`crate::gtfs_rt::FeedEntity`] carries every payload as an
//! independent optional field. [`DecodedFeed`] turns that into a closed sum
//! type so the extractors match on exactly the kinds they understand.

use chrono::{DateTime, Utc};

use crate::gtfs_rt::{FeedMessage, TripUpdate, VehiclePosition};

/// Feed header fields kept after decoding.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedHeaderInfo {
    pub gtfs_realtime_version: String,
    /// Producer-side creation time of the feed, if the header carried one.
    pub timestamp: Option<DateTime<Utc>>,
}

/// Entity payloads that are decoded but never turned into records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoredKind {
    Alert,
    Shape,
    Stop,
    TripModifications,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EntityKind {
    TripUpdate(TripUpdate),
    VehiclePosition(VehiclePosition),
    Ignored(IgnoredKind),
}

/// One feed entity and every payload it carried, in field order.
///
/// GTFS-RT expects exactly one payload per entity, but producers do emit
/// several; each one is kept so no extractor loses its record. An empty
/// list is a bare entity, e.g. a deletion marker.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedEntity {
    pub id: String,
    pub payloads: Vec<EntityKind>,
}

impl FeedEntity {
    pub fn new(id: impl Into<String>, kind: EntityKind) -> Self {
        FeedEntity {
            id: id.into(),
            payloads: vec![kind],
        }
    }
}

/// A decoded feed: header plus entities in wire order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedFeed {
    pub header: FeedHeaderInfo,
    pub entities: Vec<FeedEntity>,
}

impl DecodedFeed {
    fn payloads(&self) -> impl Iterator<Item = (&str, &EntityKind)> {
        self.entities
            .iter()
            .flat_map(|e| e.payloads.iter().map(move |p| (e.id.as_str(), p)))
    }

    pub fn trip_updates(&self) -> impl Iterator<Item = (&str, &TripUpdate)> {
        self.payloads().filter_map(|(id, kind)| match kind {
            EntityKind::TripUpdate(tu) => Some((id, tu)),
            EntityKind::VehiclePosition(_) | EntityKind::Ignored(_) => None,
        })
    }

    pub fn vehicle_positions(&self) -> impl Iterator<Item = (&str, &VehiclePosition)> {
        self.payloads().filter_map(|(id, kind)| match kind {
            EntityKind::VehiclePosition(vp) => Some((id, vp)),
            EntityKind::TripUpdate(_) | EntityKind::Ignored(_) => None,
        })
    }
}

impl From<crate::gtfs_rt::FeedEntity> for FeedEntity {
    fn from(entity: crate::gtfs_rt::FeedEntity) -> Self {
        let mut payloads = Vec::with_capacity(1);

        if let Some(tu) = entity.trip_update {
            payloads.push(EntityKind::TripUpdate(tu));
        }
        if let Some(vp) = entity.vehicle {
            payloads.push(EntityKind::VehiclePosition(vp));
        }
        if entity.alert.is_some() {
            payloads.push(EntityKind::Ignored(IgnoredKind::Alert));
        }
        if entity.shape.is_some() {
            payloads.push(EntityKind::Ignored(IgnoredKind::Shape));
        }
        if entity.stop.is_some() {
            payloads.push(EntityKind::Ignored(IgnoredKind::Stop));
        }
        if entity.trip_modifications.is_some() {
            payloads.push(EntityKind::Ignored(IgnoredKind::TripModifications));
        }

        FeedEntity {
            id: entity.id,
            payloads,
        }
    }
}

impl From<FeedMessage> for DecodedFeed {
    fn from(message: FeedMessage) -> Self {
        let timestamp = message
            .header
            .timestamp
            .and_then(|secs| i64::try_from(secs).ok())
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0));

        DecodedFeed {
            header: FeedHeaderInfo {
                gtfs_realtime_version: message.header.gtfs_realtime_version,
                timestamp,
            },
            entities: message.entity.into_iter().map(FeedEntity::from).collect(),
        }
    }
}
