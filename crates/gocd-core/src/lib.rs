//! # gocd-core
//!
//! Core types for the GoCD client.
//!
//! The server exposes pipelines as a flat list in which dependencies are
//! name references inside each pipeline's materials. This crate holds the
//! typed view of that data and the two routines that turn it into a graph:
//!
//! - [`build_graph`] links every pipeline to its predecessors and descendants
//! - [`graph_depth_walk`] collects everything reachable from one or more roots
//!
//! Nothing here performs network I/O; see `gocd-client` for that.

mod config;
mod error;
pub mod graph;
mod types;

pub use config::{GocdConfig, PollingConfig, ServerConfig};
pub use error::{GocdError, Result};
pub use graph::{build_graph, graph_depth_walk, try_build_graph, try_graph_depth_walk, Linked};
pub use types::*;
