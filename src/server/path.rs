//! Framing of the `/update/<type>/<name>/<value>` and `/value/<type>/<name>`
//! paths.
//!
//! Segments are split on the raw (still percent-encoded) path and decoded one
//! by one, so an encoded `/` stays inside a metric name. Checks run in a
//! fixed order: segment count, type, name, value. The first failing check
//! decides the response code.

use crate::core::{MetricKind, MetricName, MetricValue, PulseError};
use axum::http::StatusCode;
use percent_encoding::percent_decode_str;

/// A decoded `POST /update/...` request
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateRequest {
    /// Target metric
    pub name: MetricName,
    /// Typed value (gauge reading or counter delta)
    pub value: MetricValue,
}

/// A decoded `GET /value/...` request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueRequest {
    /// Kind to look up
    pub kind: MetricKind,
    /// Metric to look up
    pub name: MetricName,
}

/// Why a metric path was rejected
#[derive(Debug)]
pub enum PathError {
    /// More segments than the endpoint takes
    UnknownPath,
    /// A segment is not valid percent-encoded UTF-8
    BadEncoding,
    /// The `<type>` segment is neither `gauge` nor `counter`
    Kind(PulseError),
    /// The `<name>` segment is missing or empty
    MissingName,
    /// The `<value>` segment is missing or does not parse for its kind
    Value(PulseError),
}

impl PathError {
    /// HTTP status for this rejection
    pub fn status(&self) -> StatusCode {
        match self {
            PathError::UnknownPath | PathError::MissingName => StatusCode::NOT_FOUND,
            PathError::BadEncoding | PathError::Kind(_) | PathError::Value(_) => {
                StatusCode::BAD_REQUEST
            },
        }
    }

    /// Short human-readable reason for the response body
    pub fn reason(&self) -> String {
        match self {
            PathError::UnknownPath => "not found".to_string(),
            PathError::BadEncoding => "malformed percent-encoding in path".to_string(),
            PathError::MissingName => "metric name is required".to_string(),
            PathError::Kind(e) | PathError::Value(e) => e.to_string(),
        }
    }
}

/// Parse the part of the path after `/update/`.
pub fn parse_update(tail: &str) -> Result<UpdateRequest, PathError> {
    let segments = decode_segments(tail, 3)?;
    let mut segments = segments.into_iter();

    let kind = parse_kind(segments.next())?;
    let name = parse_name(segments.next())?;
    let raw_value = segments.next().unwrap_or_default();
    let value = MetricValue::parse(kind, &raw_value).map_err(PathError::Value)?;

    Ok(UpdateRequest { name, value })
}

/// Parse the part of the path after `/value/`.
pub fn parse_value(tail: &str) -> Result<ValueRequest, PathError> {
    let segments = decode_segments(tail, 2)?;
    let mut segments = segments.into_iter();

    let kind = parse_kind(segments.next())?;
    let name = parse_name(segments.next())?;

    Ok(ValueRequest { kind, name })
}

fn parse_kind(segment: Option<String>) -> Result<MetricKind, PathError> {
    segment
        .unwrap_or_default()
        .parse()
        .map_err(PathError::Kind)
}

fn parse_name(segment: Option<String>) -> Result<MetricName, PathError> {
    MetricName::new(segment.unwrap_or_default()).map_err(|_| PathError::MissingName)
}

fn decode_segments(tail: &str, max: usize) -> Result<Vec<String>, PathError> {
    let raw: Vec<&str> = tail.split('/').collect();
    if raw.len() > max {
        return Err(PathError::UnknownPath);
    }

    raw.into_iter()
        .map(|segment| {
            percent_decode_str(segment)
                .decode_utf8()
                .map(|s| s.into_owned())
                .map_err(|_| PathError::BadEncoding)
        })
        .collect()
}
