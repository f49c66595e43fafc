//! Protobuf parser for GTFS Realtime feeds.

use anyhow::Result;
use prost::Message;

use crate::feed::DecodedFeed;
use crate::gtfs_rt::FeedMessage;

/// Decodes a protobuf-encoded GTFS-RT [`FeedMessage`] from raw bytes.
///
/// # Errors
///
/// Returns an error if the bytes are not valid protobuf for a `FeedMessage`.
pub fn parse_feed(bytes: &[u8]) -> Result<FeedMessage> {
    Ok(FeedMessage::decode(bytes)?)
}

/// Decodes raw bytes into a [`DecodedFeed`].
///
/// Malformed input is an expected outcome and yields `None`. An empty buffer
/// is a valid (empty) message and decodes to a feed with no entities.
pub fn decode_feed(bytes: &[u8]) -> Option<DecodedFeed> {
    parse_feed(bytes).ok().map(DecodedFeed::from)
}
