//! SPDX-FileCopyrightText: © 2025 Cory Parent <goedelsoup+contrail@goedelsoup.io>
//! SPDX-License-Identifier: Apache-2.0
//!

//! Telemetry bundle structures for the contrail contract testing engine
//!
//! A bundle is the unit of work for a single contract test: ordered
//! resource/scope groupings of spans, metric points, and log records,
//! stamped with a single wall-clock time. Bundles are immutable from the
//! caller's perspective after generation; the simulator clones before
//! mutating.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::value::{AttributeValue, Attributes};

/// Span kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanKind {
    Internal,
    Server,
    Client,
    Producer,
    Consumer,
}

/// Span status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCode {
    Unset,
    Ok,
    Error,
}

impl StatusCode {
    /// Status code as the extractor's string form
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusCode::Unset => "Unset",
            StatusCode::Ok => "Ok",
            StatusCode::Error => "Error",
        }
    }
}

/// Span status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanStatus {
    /// Status code
    pub code: StatusCode,

    /// Status message
    pub message: Option<String>,
}

impl Default for SpanStatus {
    fn default() -> Self {
        Self {
            code: StatusCode::Unset,
            message: None,
        }
    }
}

/// A single span
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Span {
    /// Span name
    pub name: String,

    /// Span kind
    pub kind: SpanKind,

    /// Span start time
    pub start_time: DateTime<Utc>,

    /// Span end time
    pub end_time: DateTime<Utc>,

    /// Trace identifier (16 bytes, hex encoded)
    pub trace_id: String,

    /// Span identifier (8 bytes, hex encoded)
    pub span_id: String,

    /// Parent span identifier, if any
    pub parent_span_id: Option<String>,

    /// Span status
    pub status: SpanStatus,

    /// Span attributes
    pub attributes: Attributes,
}

impl Span {
    /// Create a new span with the given name and timestamps
    pub fn new(name: impl Into<String>, start_time: DateTime<Utc>, end_time: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            kind: SpanKind::Internal,
            start_time,
            end_time,
            trace_id: String::new(),
            span_id: String::new(),
            parent_span_id: None,
            status: SpanStatus::default(),
            attributes: Attributes::new(),
        }
    }

    /// Set the span kind
    pub fn with_kind(mut self, kind: SpanKind) -> Self {
        self.kind = kind;
        self
    }

    /// Add an attribute to the span
    pub fn with_attribute(mut self, key: impl Into<String>, value: AttributeValue) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    /// Span duration derived from its timestamps
    pub fn duration(&self) -> Duration {
        self.end_time - self.start_time
    }
}

/// Sum aggregation temporality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SumTemporality {
    Delta,
    Cumulative,
}

/// Metric point kinds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum MetricKind {
    Gauge,
    Sum {
        monotonic: bool,
        temporality: SumTemporality,
    },
    Histogram,
}

impl MetricKind {
    /// Metric kind as the extractor's string form
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Gauge => "gauge",
            MetricKind::Sum { .. } => "sum",
            MetricKind::Histogram => "histogram",
        }
    }
}

/// Histogram observation summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramValue {
    /// Observation count
    pub count: u64,

    /// Sum of all observations
    pub sum: f64,

    /// Smallest observation
    pub min: Option<f64>,

    /// Largest observation
    pub max: Option<f64>,

    /// Upper bucket bounds
    pub bucket_bounds: Vec<f64>,

    /// Per-bucket observation counts
    pub bucket_counts: Vec<u64>,
}

/// Metric point value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Int(i64),
    Double(f64),
    Histogram(HistogramValue),
}

impl MetricValue {
    /// Numeric view of the point value; histograms have none
    pub fn numeric(&self) -> Option<f64> {
        match self {
            MetricValue::Int(i) => Some(*i as f64),
            MetricValue::Double(d) => Some(*d),
            MetricValue::Histogram(_) => None,
        }
    }
}

/// A single metric data point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricPoint {
    /// Metric name
    pub name: String,

    /// Metric kind
    pub kind: MetricKind,

    /// Point value
    pub value: MetricValue,

    /// Point attributes (labels)
    pub attributes: Attributes,

    /// Point timestamp
    pub timestamp: DateTime<Utc>,
}

impl MetricPoint {
    /// Create a new gauge point
    pub fn gauge(name: impl Into<String>, value: MetricValue, timestamp: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            kind: MetricKind::Gauge,
            value,
            attributes: Attributes::new(),
            timestamp,
        }
    }

    /// Add an attribute to the point
    pub fn with_attribute(mut self, key: impl Into<String>, value: AttributeValue) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }
}

/// A single log record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Log body
    pub body: AttributeValue,

    /// Numeric severity
    pub severity_number: i32,

    /// Severity text
    pub severity_text: String,

    /// Record timestamp
    pub timestamp: DateTime<Utc>,

    /// Record attributes
    pub attributes: Attributes,

    /// Correlated trace identifier
    pub trace_id: String,

    /// Correlated span identifier
    pub span_id: String,
}

impl LogRecord {
    /// Create a new log record
    pub fn new(body: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            body: AttributeValue::Str(body.into()),
            severity_number: 0,
            severity_text: String::new(),
            timestamp,
            attributes: Attributes::new(),
            trace_id: String::new(),
            span_id: String::new(),
        }
    }

    /// Set the record severity from its text form
    pub fn with_severity(mut self, severity: impl Into<String>) -> Self {
        let severity = severity.into();
        self.severity_number = severity_number_for(&severity);
        self.severity_text = severity;
        self
    }

    /// Add an attribute to the record
    pub fn with_attribute(mut self, key: impl Into<String>, value: AttributeValue) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }
}

/// Map a severity text to its numeric level
pub fn severity_number_for(severity: &str) -> i32 {
    match severity.to_ascii_uppercase().as_str() {
        "TRACE" => 1,
        "DEBUG" => 5,
        "INFO" => 9,
        "WARN" | "WARNING" => 13,
        "ERROR" => 17,
        "FATAL" => 21,
        _ => 9,
    }
}

/// Resource/scope grouping layer for a single signal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceScope<T> {
    /// Resource attributes
    pub resource: Attributes,

    /// Instrumentation scope name
    pub scope_name: String,

    /// Items under this resource and scope
    pub items: Vec<T>,
}

impl<T> ResourceScope<T> {
    /// Create a new grouping with the given items
    pub fn new(items: Vec<T>) -> Self {
        Self {
            resource: Attributes::new(),
            scope_name: String::new(),
            items,
        }
    }

    /// Set a resource attribute
    pub fn with_resource_attribute(mut self, key: impl Into<String>, value: AttributeValue) -> Self {
        self.resource.insert(key.into(), value);
        self
    }
}

/// In-memory telemetry bundle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryBundle {
    /// Trace signal groupings
    pub traces: Vec<ResourceScope<Span>>,

    /// Metric signal groupings
    pub metrics: Vec<ResourceScope<MetricPoint>>,

    /// Log signal groupings
    pub logs: Vec<ResourceScope<LogRecord>>,

    /// Bundle wall-clock time
    pub wall_time: DateTime<Utc>,
}

impl TelemetryBundle {
    /// Create an empty bundle at the given wall-clock time
    pub fn new(wall_time: DateTime<Utc>) -> Self {
        Self {
            traces: Vec::new(),
            metrics: Vec::new(),
            logs: Vec::new(),
            wall_time,
        }
    }

    /// First span in the bundle, if any
    pub fn first_span(&self) -> Option<&Span> {
        self.traces.first().and_then(|rs| rs.items.first())
    }

    /// Resource attributes of the first trace grouping
    pub fn first_trace_resource(&self) -> Option<&Attributes> {
        self.traces.first().map(|rs| &rs.resource)
    }

    /// First metric point in the bundle, if any
    pub fn first_metric(&self) -> Option<&MetricPoint> {
        self.metrics.first().and_then(|rs| rs.items.first())
    }

    /// First log record in the bundle, if any
    pub fn first_log(&self) -> Option<&LogRecord> {
        self.logs.first().and_then(|rs| rs.items.first())
    }

    /// Total span count across all groupings
    pub fn span_count(&self) -> usize {
        self.traces.iter().map(|rs| rs.items.len()).sum()
    }

    /// Total metric point count across all groupings
    pub fn metric_count(&self) -> usize {
        self.metrics.iter().map(|rs| rs.items.len()).sum()
    }

    /// Total log record count across all groupings
    pub fn log_count(&self) -> usize {
        self.logs.iter().map(|rs| rs.items.len()).sum()
    }

    /// Check whether the bundle carries no items at all
    pub fn is_empty(&self) -> bool {
        self.span_count() == 0 && self.metric_count() == 0 && self.log_count() == 0
    }

    /// Iterate over every span in the bundle
    pub fn all_spans(&self) -> impl Iterator<Item = &Span> {
        self.traces.iter().flat_map(|rs| rs.items.iter())
    }

    /// Iterate over every metric point in the bundle
    pub fn all_metrics(&self) -> impl Iterator<Item = &MetricPoint> {
        self.metrics.iter().flat_map(|rs| rs.items.iter())
    }

    /// Iterate over every log record in the bundle
    pub fn all_logs(&self) -> impl Iterator<Item = &LogRecord> {
        self.logs.iter().flat_map(|rs| rs.items.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_time() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn test_span_duration() {
        let start = base_time();
        let end = start + Duration::milliseconds(150);
        let span = Span::new("GET /api/users", start, end);
        assert_eq!(span.duration(), Duration::milliseconds(150));
    }

    #[test]
    fn test_bundle_first_item_accessors() {
        let mut bundle = TelemetryBundle::new(base_time());
        assert!(bundle.is_empty());
        assert!(bundle.first_span().is_none());

        let span = Span::new("op", base_time(), base_time() + Duration::milliseconds(100));
        bundle.traces.push(
            ResourceScope::new(vec![span])
                .with_resource_attribute("service.name", AttributeValue::from("auth")),
        );

        assert_eq!(bundle.span_count(), 1);
        assert_eq!(bundle.first_span().unwrap().name, "op");
        assert_eq!(
            bundle.first_trace_resource().unwrap().get("service.name"),
            Some(&AttributeValue::from("auth"))
        );
    }

    #[test]
    fn test_severity_mapping() {
        assert_eq!(severity_number_for("INFO"), 9);
        assert_eq!(severity_number_for("warning"), 13);
        assert_eq!(severity_number_for("FATAL"), 21);
        assert_eq!(severity_number_for("something-else"), 9);
    }

    #[test]
    fn test_metric_kind_strings() {
        assert_eq!(MetricKind::Gauge.as_str(), "gauge");
        assert_eq!(
            MetricKind::Sum {
                monotonic: true,
                temporality: SumTemporality::Cumulative
            }
            .as_str(),
            "sum"
        );
        assert_eq!(MetricKind::Histogram.as_str(), "histogram");
    }

    #[test]
    fn test_bundle_counts_span_multiple_groupings() {
        let mut bundle = TelemetryBundle::new(base_time());
        let mk_span = |name: &str| {
            Span::new(name, base_time(), base_time() + Duration::milliseconds(10))
        };
        bundle
            .traces
            .push(ResourceScope::new(vec![mk_span("a"), mk_span("b")]));
        bundle.traces.push(ResourceScope::new(vec![mk_span("c")]));

        assert_eq!(bundle.span_count(), 3);
        let names: Vec<_> = bundle.all_spans().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }
}
