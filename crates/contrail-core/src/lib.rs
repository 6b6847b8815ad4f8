//! SPDX-FileCopyrightText: © 2025 Cory Parent <goedelsoup+contrail@goedelsoup.io>
//! SPDX-License-Identifier: Apache-2.0
//!

//! Contrail Core
//!
//! This crate provides the core data model for the contrail contract
//! testing engine: the in-memory telemetry shapes, the contract document
//! model and loader, the pipeline selector service, and the collector
//! configuration model that the transformation simulator interprets.

pub mod config;
pub mod contract;
pub mod error;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use config::{CollectorConfig, PipelineEntry, ProcessorConfig};
pub use contract::{
    Contract, Filter, FilterOperator, Inputs, LoadOutcome, Loader, Matchers, PipelineInfo,
    PipelineSelectorService, Severity, SignalType, ValidationError, ValidationErrorKind,
    ValidationResult, ValidationRule,
};
pub use error::{ContrailError, ContrailResult};
pub use types::{
    AttributeValue, Attributes, LogRecord, MetricKind, MetricPoint, MetricValue, ResourceScope,
    Span, SpanStatus, StatusCode, TelemetryBundle,
};
pub use utils::time::{Clock, FixedClock, SystemClock};

/// Engine version information
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engine name
pub const ENGINE_NAME: &str = "contrail";
