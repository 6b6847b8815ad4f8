//! SPDX-FileCopyrightText: © 2025 Cory Parent <goedelsoup+contrail@goedelsoup.io>
//! SPDX-License-Identifier: Apache-2.0
//!

//! Contract model for the contrail contract testing engine
//!
//! A contract is a declarative document binding representative input
//! telemetry, gating filters, a target pipeline, and the expected
//! post-transformation state. This module provides the document model,
//! the loader with structural validation, and the pipeline selector
//! service that binds contracts to registered pipelines.

pub mod loader;
pub mod selector;
pub mod types;

// Re-export commonly used types
pub use loader::{LoadOutcome, Loader};
pub use selector::{PipelineInfo, PipelineSelectorService};
pub use types::{
    ConditionalRule, Contract, CountMatcher, CustomValidation, DurationMatcher, Filter,
    FilterOperator, HistogramMatcher, Inputs, LogInput, LogMatcher, Matchers, MetricInput,
    MetricMatcher, PipelineSelector, PipelineSelectors, SelectorOperator, Severity, SignalType,
    StatusCodeMatcher, TemporalRule, TimeWindow, TimestampMatcher, TraceInput, TraceMatcher,
    TransformRule, TransformType, ValidationError, ValidationErrorKind, ValidationResult,
    ValidationRule, ValueMatcher, ValueRange,
};
