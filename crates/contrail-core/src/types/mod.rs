//! SPDX-FileCopyrightText: © 2025 Cory Parent <goedelsoup+contrail@goedelsoup.io>
//! SPDX-License-Identifier: Apache-2.0
//!

//! Telemetry data structures for the contrail contract testing engine
//!
//! This module provides the in-memory telemetry shapes the engine
//! operates on: the attribute value sum type, spans, metric points, log
//! records, the resource/scope grouping layer, and the bundle that ties
//! the three signals together with a single wall-clock timestamp.

pub mod extract;
pub mod telemetry;
pub mod value;

// Re-export commonly used types
pub use extract::extract_field;
pub use telemetry::{
    severity_number_for, HistogramValue, LogRecord, MetricKind, MetricPoint, MetricValue,
    ResourceScope, Span, SpanKind, SpanStatus, StatusCode, SumTemporality, TelemetryBundle,
};
pub use value::{AttributeValue, Attributes};
