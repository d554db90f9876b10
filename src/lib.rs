// TopicPulse: topic discovery and engagement aggregation for discussion threads
//
// This is the library root. Each module corresponds to a major subsystem
// of the topic pipeline.

pub mod config;
pub mod db;
pub mod ingest;
pub mod metrics;
pub mod output;
pub mod pipeline;
pub mod sentiment;
pub mod status;
pub mod topics;
