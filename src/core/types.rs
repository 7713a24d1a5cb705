//! Metric model shared by the agent and the server.
//!
//! The two metric kinds are a closed set: a gauge carries an `f64` that
//! replaces the stored value, a counter carries an `i64` delta that is added
//! to it. Dispatch on [`MetricKind`] happens once at the wire boundary.

use crate::core::error::{PulseError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::FpCategory;
use std::str::FromStr;

/// Kind of a metric as it appears in the `/update/<type>/...` path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    /// Latest-value metric (`f64`, replace on write)
    Gauge,
    /// Accumulating metric (`i64`, add on write)
    Counter,
}

impl MetricKind {
    /// Wire literal for this kind
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Gauge => "gauge",
            MetricKind::Counter => "counter",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricKind {
    type Err = PulseError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "gauge" => Ok(MetricKind::Gauge),
            "counter" => Ok(MetricKind::Counter),
            other => Err(PulseError::InvalidMetricKind(other.to_string())),
        }
    }
}

/// Non-empty, case-sensitive metric name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MetricName(String);

impl MetricName {
    /// Creates a new MetricName after validation
    pub fn new<S: Into<String>>(name: S) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(PulseError::EmptyMetricName);
        }
        Ok(MetricName(name))
    }

    /// Returns the string representation of the metric name
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for MetricName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A typed metric value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum MetricValue {
    /// Gauge reading
    Gauge(f64),
    /// Counter delta
    Counter(i64),
}

impl MetricValue {
    /// Parses the `<value>` path segment according to `kind`.
    ///
    /// Gauges accept any decimal float that parses as a finite `f64`
    /// (`23.5`, `25`, `-1.7976931348623157e+308`); counters accept a
    /// signed base-10 integer fitting 64 bits.
    pub fn parse(kind: MetricKind, raw: &str) -> Result<Self> {
        let invalid = || PulseError::InvalidMetricValue {
            kind: kind.as_str(),
            raw: raw.to_string(),
        };

        match kind {
            MetricKind::Gauge => {
                let value: f64 = raw.parse().map_err(|_| invalid())?;
                if !value.is_finite() {
                    return Err(invalid());
                }
                Ok(MetricValue::Gauge(value))
            },
            MetricKind::Counter => raw
                .parse::<i64>()
                .map(MetricValue::Counter)
                .map_err(|_| invalid()),
        }
    }

    /// Kind tag of this value
    pub fn kind(&self) -> MetricKind {
        match self {
            MetricValue::Gauge(_) => MetricKind::Gauge,
            MetricValue::Counter(_) => MetricKind::Counter,
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Gauge(v) => f.write_str(&format_gauge(*v)),
            MetricValue::Counter(v) => f.write_str(&format_counter(*v)),
        }
    }
}

/// Shortest decimal form that parses back to the same `f64`.
///
/// Magnitudes in `[1e-7, 1e21)` render positionally (`25`, `1.5`, `0.25`);
/// anything outside uses exponent notation with a signed exponent
/// (`-1.7976931348623157e+308`, `1e-300`).
pub fn format_gauge(value: f64) -> String {
    let magnitude = value.abs();
    if value.classify() == FpCategory::Zero || (1e-7..1e21).contains(&magnitude) {
        return value.to_string();
    }

    let formatted = format!("{value:e}");
    match formatted.split_once('e') {
        Some((mantissa, exponent)) if !exponent.starts_with('-') => {
            format!("{mantissa}e+{exponent}")
        },
        _ => formatted,
    }
}

/// Base-10 rendering of a counter total.
pub fn format_counter(value: i64) -> String {
    value.to_string()
}
