pub mod config;
pub mod extract;
pub mod feed;
pub mod ingest;
pub mod output;
pub mod parser;
pub mod payload;
pub mod stats;

pub mod gtfs_rt {
    include!(concat!(env!("OUT_DIR"), "/transit_realtime.rs"));
}
