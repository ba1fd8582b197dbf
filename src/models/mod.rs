//! Core data models for the S3 read/write gateway.
//!
//! These entities describe what the gateway stores and moves: object heads
//! and payloads as seen through the blob store, and messages arriving from
//! the ingestion queue. They serialize naturally as JSON via `serde` where a
//! wire shape exists.

pub mod message;
pub mod object;
