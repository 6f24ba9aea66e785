//! # gocd-client
//!
//! Client for the GoCD continuous-integration server.
//!
//! This crate provides:
//! - [`GoServer`]: server access abstraction with an HTTP and a mock backend
//! - [`PipelineGraph`]: pipelines linked to their upstream and downstream pipelines
//! - Polling helpers that wait for a scheduled instance or a published artifact
//!
//! ## Key Pattern
//!
//! Pipeline configurations only mention their upstream pipelines by name.
//! The graph is built client-side after fetching every group, so the server
//! is asked once and every dependency question is answered from memory.

mod auth;
mod pipelines;
mod poll;
mod server;

pub use auth::Credentials;
pub use pipelines::{GraphEntry, PipelineGraph};
pub use poll::{
    latest_counter, schedule_and_wait, wait_for_artifact, wait_for_instance, wait_until,
    PollConfig,
};
pub use server::{GoServer, HttpServer, MockServer};
