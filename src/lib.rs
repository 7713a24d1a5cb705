//! Pulse - a minimal metrics telemetry pair.
//!
//! The agent periodically samples the memory statistics of its own process
//! and ships them over HTTP to the server, which keeps the latest gauges and
//! accumulated counters in memory and exposes them for inspection.
//!
//! # Architecture
//!
//! - `core`: metric types, errors and configuration
//! - `metrics`: the server store and the agent snapshot
//! - `agent`: runtime sampling, collection, reporting and the two tickers
//! - `server`: the HTTP surface over the store
//! - `cli`: flag parsing, logging and process wiring for both binaries
//!
//! # Example
//!
//! ```no_run
//! use pulse_lib::core::ServerConfig;
//! use pulse_lib::server::MetricsServer;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = MetricsServer::with_memory_storage(ServerConfig::default());
//!     server.run(CancellationToken::new()).await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod agent;
pub mod cli;
pub mod core;
pub mod metrics;
pub mod server;

// Re-export core types for convenience
pub use crate::core::{AgentConfig, PulseError, Result, ServerConfig};
