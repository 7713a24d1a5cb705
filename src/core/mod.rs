//! Core domain models for pulse.
//!
//! This module contains the metric model, the error taxonomy and the
//! configuration records shared by the agent and the server.

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use config::{
    AgentConfig, AgentConfigBuilder, ListenAddress, ServerConfig, ServerConfigBuilder,
};
pub use error::{PulseError, Result};
pub use types::{format_counter, format_gauge, MetricKind, MetricName, MetricValue};
