//! SPDX-FileCopyrightText: © 2025 Cory Parent <goedelsoup+contrail@goedelsoup.io>
//! SPDX-License-Identifier: Apache-2.0
//!

//! Contract document types for the contrail contract testing engine
//!
//! Field names follow the snake_case document schema; unknown fields are
//! tolerated for forward compatibility. Arrays preserve document order.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::types::{AttributeValue, Attributes};

/// Telemetry signal kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalType {
    Traces,
    Metrics,
    Logs,
}

impl fmt::Display for SignalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalType::Traces => write!(f, "traces"),
            SignalType::Metrics => write!(f, "metrics"),
            SignalType::Logs => write!(f, "logs"),
        }
    }
}

/// Operators usable in filters and validation rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperator {
    Equals,
    NotEquals,
    Matches,
    NotMatches,
    Exists,
    NotExists,
    GreaterThan,
    LessThan,
    GreaterOrEqual,
    LessOrEqual,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    InRange,
    NotInRange,
    OneOf,
    NotOneOf,
}

impl FilterOperator {
    /// Operator name as written in documents
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOperator::Equals => "equals",
            FilterOperator::NotEquals => "not_equals",
            FilterOperator::Matches => "matches",
            FilterOperator::NotMatches => "not_matches",
            FilterOperator::Exists => "exists",
            FilterOperator::NotExists => "not_exists",
            FilterOperator::GreaterThan => "greater_than",
            FilterOperator::LessThan => "less_than",
            FilterOperator::GreaterOrEqual => "greater_or_equal",
            FilterOperator::LessOrEqual => "less_or_equal",
            FilterOperator::Contains => "contains",
            FilterOperator::NotContains => "not_contains",
            FilterOperator::StartsWith => "starts_with",
            FilterOperator::EndsWith => "ends_with",
            FilterOperator::InRange => "in_range",
            FilterOperator::NotInRange => "not_in_range",
            FilterOperator::OneOf => "one_of",
            FilterOperator::NotOneOf => "not_one_of",
        }
    }

    /// Whether the operator requires an operand
    ///
    /// `exists`/`not_exists` take none; the range and membership
    /// operators take theirs through `range`/`values` instead of `value`.
    pub fn requires_value(&self) -> bool {
        !matches!(
            self,
            FilterOperator::Exists
                | FilterOperator::NotExists
                | FilterOperator::InRange
                | FilterOperator::NotInRange
                | FilterOperator::OneOf
                | FilterOperator::NotOneOf
        )
    }
}

/// Operators usable in pipeline selectors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectorOperator {
    Equals,
    Matches,
    Contains,
    StartsWith,
    EndsWith,
}

impl SelectorOperator {
    /// Operator name as written in documents
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectorOperator::Equals => "equals",
            SelectorOperator::Matches => "matches",
            SelectorOperator::Contains => "contains",
            SelectorOperator::StartsWith => "starts_with",
            SelectorOperator::EndsWith => "ends_with",
        }
    }
}

/// A single pipeline matching criterion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSelector {
    /// Field path: `id | name | description | type | tags.<k> | metadata.<k>`
    pub field: String,

    /// Matching operator
    pub operator: SelectorOperator,

    /// Expected value
    pub value: AttributeValue,
}

/// A set of pipeline matching criteria; selectors combine by conjunction
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PipelineSelectors {
    /// Selectors that must all match
    #[serde(default)]
    pub selectors: Vec<PipelineSelector>,

    /// Tie-break priority; higher wins
    #[serde(default)]
    pub priority: i32,
}

/// Severity level of a validation rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    #[default]
    Error,
    Warning,
    Info,
}

/// A numeric range with configurable endpoint inclusivity
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ValueRange {
    /// Lower bound; absent means unbounded below
    #[serde(default)]
    pub min: Option<AttributeValue>,

    /// Upper bound; absent means unbounded above
    #[serde(default)]
    pub max: Option<AttributeValue>,

    /// Whether both endpoints are included
    #[serde(default)]
    pub inclusive: bool,

    /// Per-endpoint override for the lower bound
    #[serde(default)]
    pub min_inclusive: Option<bool>,

    /// Per-endpoint override for the upper bound
    #[serde(default)]
    pub max_inclusive: Option<bool>,
}

/// Conditional validation logic
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ConditionalRule {
    /// Branch condition
    #[serde(default, rename = "if")]
    pub if_rule: Option<Box<ValidationRule>>,

    /// Applied when the condition passes
    #[serde(default, rename = "then")]
    pub then_rule: Option<Box<ValidationRule>>,

    /// Applied when the condition fails
    #[serde(default, rename = "else")]
    pub else_rule: Option<Box<ValidationRule>>,

    /// All must pass; first failure short-circuits
    #[serde(default)]
    pub and: Vec<ValidationRule>,

    /// At least one must pass
    #[serde(default)]
    pub or: Vec<ValidationRule>,

    /// Must fail
    #[serde(default)]
    pub not: Option<Box<ValidationRule>>,
}

/// Expected transformation kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformType {
    Add,
    Remove,
    Modify,
    Rename,
}

/// Expected data transformation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformRule {
    /// Transformation kind
    #[serde(rename = "type")]
    pub transform_type: TransformType,

    /// Source field path
    #[serde(default)]
    pub source: Option<String>,

    /// Target field path
    #[serde(default)]
    pub target: Option<String>,

    /// Expected value after transformation
    #[serde(default)]
    pub value: Option<AttributeValue>,

    /// Transformation function name
    #[serde(default)]
    pub function: Option<String>,

    /// Function parameters
    #[serde(default)]
    pub parameters: BTreeMap<String, AttributeValue>,
}

/// Time-based validation rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporalRule {
    /// Time window duration string
    pub window_size: String,

    /// Aggregation name: sum, avg, count, min, max
    pub aggregation: String,

    /// Threshold value
    #[serde(default)]
    pub threshold: Option<AttributeValue>,

    /// Comparison operator for the threshold
    #[serde(default)]
    pub comparison: Option<FilterOperator>,

    /// Baseline reference; carried for custom validators, not evaluated
    #[serde(default)]
    pub baseline: Option<String>,

    /// Tolerance percentage; carried for custom validators
    #[serde(default)]
    pub tolerance: f64,
}

/// The recursive unit of validation logic
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ValidationRule {
    /// Field path, e.g. `span.attributes.http.method`
    #[serde(default)]
    pub field: String,

    /// Basic operator
    #[serde(default)]
    pub operator: Option<FilterOperator>,

    /// Operand for single-value operators
    #[serde(default)]
    pub value: Option<AttributeValue>,

    /// Operands for the membership operators
    #[serde(default)]
    pub values: Vec<AttributeValue>,

    /// Operand for the range operators
    #[serde(default)]
    pub range: Option<ValueRange>,

    /// Regex pattern for the match operators
    #[serde(default)]
    pub pattern: Option<String>,

    /// Conditional logic; overrides the basic operator path
    #[serde(default)]
    pub condition: Option<Box<ConditionalRule>>,

    /// Transformation expectation
    #[serde(default)]
    pub transform: Option<TransformRule>,

    /// Time-based expectation
    #[serde(default)]
    pub temporal: Option<TemporalRule>,

    /// Human-readable description
    #[serde(default)]
    pub description: Option<String>,

    /// Failure severity; only `error` flips validity
    #[serde(default)]
    pub severity: Severity,
}

/// Legacy gating predicate deciding whether a contract applies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    /// Field path
    pub field: String,

    /// Filter operator
    pub operator: FilterOperator,

    /// Expected value; optional for `exists`/`not_exists`
    #[serde(default)]
    pub value: Option<AttributeValue>,
}

/// Timing-sensitive transformation expectation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Aggregation name
    pub aggregation: String,

    /// Window duration string
    pub duration: String,

    /// Expected behavior description
    pub expected_behavior: String,
}

/// Input trace sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceInput {
    /// Span name
    pub span_name: String,

    /// Span attributes
    #[serde(default)]
    pub attributes: Attributes,

    /// Parent span name; presence produces a child span
    #[serde(default)]
    pub parent_span: Option<String>,

    /// Service name placed on the resource
    #[serde(default)]
    pub service_name: Option<String>,
}

/// Input metric sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricInput {
    /// Metric name
    pub name: String,

    /// Point value
    pub value: AttributeValue,

    /// Metric kind: counter, gauge, or histogram
    #[serde(default, rename = "type")]
    pub metric_type: Option<String>,

    /// Point labels
    #[serde(default)]
    pub labels: Attributes,
}

/// Input log sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogInput {
    /// Log body
    pub body: String,

    /// Severity text
    #[serde(default)]
    pub severity: Option<String>,

    /// Record attributes
    #[serde(default)]
    pub attributes: Attributes,
}

/// Input data samples by signal
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Inputs {
    #[serde(default)]
    pub traces: Vec<TraceInput>,

    #[serde(default)]
    pub metrics: Vec<MetricInput>,

    #[serde(default)]
    pub logs: Vec<LogInput>,
}

impl Inputs {
    /// Check whether no input section carries samples
    pub fn is_empty(&self) -> bool {
        self.traces.is_empty() && self.metrics.is_empty() && self.logs.is_empty()
    }
}

/// Count expectation
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CountMatcher {
    /// Exact expected count
    #[serde(default)]
    pub expected: Option<usize>,

    /// Minimum count
    #[serde(default)]
    pub min: Option<usize>,

    /// Maximum count
    #[serde(default)]
    pub max: Option<usize>,
}

/// Metric value expectation
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ValueMatcher {
    /// Exact expected value
    #[serde(default)]
    pub expected: Option<AttributeValue>,

    /// Expected value range
    #[serde(default)]
    pub range: Option<ValueRange>,

    /// Absolute tolerance for the exact comparison
    #[serde(default)]
    pub tolerance: f64,
}

/// Span duration expectation; all fields are duration strings
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DurationMatcher {
    #[serde(default)]
    pub min: Option<String>,

    #[serde(default)]
    pub max: Option<String>,

    #[serde(default)]
    pub expected: Option<String>,

    #[serde(default)]
    pub tolerance: Option<String>,
}

/// Status code expectation, checked against `http.status_code`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StatusCodeMatcher {
    /// Exact expected code
    #[serde(default)]
    pub expected: Option<i64>,

    /// Status class: 2xx, 3xx, 4xx, or 5xx
    #[serde(default)]
    pub class: Option<String>,

    /// Codes that must not appear
    #[serde(default)]
    pub not_allowed: Vec<i64>,
}

/// Histogram expectation
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HistogramMatcher {
    /// Expected bucket bounds
    #[serde(default)]
    pub buckets: Vec<f64>,

    /// Expected total observation count
    #[serde(default)]
    pub count: Option<u64>,

    /// Expected observation sum
    #[serde(default)]
    pub sum: Option<f64>,

    /// Expected per-bound counts, keyed by the bound's string form
    #[serde(default)]
    pub bucket_counts: BTreeMap<String, u64>,
}

/// Log timestamp expectation
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TimestampMatcher {
    /// Expected timestamp format, e.g. `rfc3339`
    #[serde(default)]
    pub format: Option<String>,

    /// Expected epoch-seconds range
    #[serde(default)]
    pub range: Option<ValueRange>,

    /// Relative expectation: within_last_minute/_hour/_day
    #[serde(default)]
    pub relative: Option<String>,
}

/// Reference to an in-process custom validator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomValidation {
    /// Registered validator name
    pub function: String,

    /// Parameters handed to the validator
    #[serde(default)]
    pub parameters: BTreeMap<String, AttributeValue>,
}

/// Expected trace transformations
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TraceMatcher {
    #[serde(default)]
    pub span_name: Option<String>,

    /// Attribute expectations; a `!`-prefixed key asserts absence
    #[serde(default)]
    pub attributes: BTreeMap<String, AttributeValue>,

    #[serde(default)]
    pub parent_span: Option<String>,

    #[serde(default)]
    pub service_name: Option<String>,

    #[serde(default)]
    pub validation_rules: Vec<ValidationRule>,

    #[serde(default)]
    pub count: Option<CountMatcher>,

    #[serde(default)]
    pub duration: Option<DurationMatcher>,

    #[serde(default)]
    pub status_code: Option<StatusCodeMatcher>,

    #[serde(default)]
    pub custom_validation: Option<CustomValidation>,
}

impl TraceMatcher {
    /// Whether the matcher constrains at least one field
    pub fn constrains_any(&self) -> bool {
        self.span_name.is_some()
            || !self.attributes.is_empty()
            || self.parent_span.is_some()
            || self.service_name.is_some()
            || !self.validation_rules.is_empty()
            || self.count.is_some()
            || self.duration.is_some()
            || self.status_code.is_some()
            || self.custom_validation.is_some()
    }
}

/// Expected metric transformations
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MetricMatcher {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default, rename = "type")]
    pub metric_type: Option<String>,

    #[serde(default)]
    pub labels: BTreeMap<String, AttributeValue>,

    #[serde(default)]
    pub validation_rules: Vec<ValidationRule>,

    #[serde(default)]
    pub value: Option<ValueMatcher>,

    #[serde(default)]
    pub count: Option<CountMatcher>,

    #[serde(default)]
    pub histogram: Option<HistogramMatcher>,

    #[serde(default)]
    pub custom_validation: Option<CustomValidation>,
}

impl MetricMatcher {
    /// Whether the matcher constrains at least one field
    pub fn constrains_any(&self) -> bool {
        self.name.is_some()
            || self.metric_type.is_some()
            || !self.labels.is_empty()
            || !self.validation_rules.is_empty()
            || self.value.is_some()
            || self.count.is_some()
            || self.histogram.is_some()
            || self.custom_validation.is_some()
    }
}

/// Expected log transformations
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LogMatcher {
    #[serde(default)]
    pub body: Option<String>,

    #[serde(default)]
    pub severity: Option<String>,

    /// Attribute expectations; a `!`-prefixed key asserts absence
    #[serde(default)]
    pub attributes: BTreeMap<String, AttributeValue>,

    #[serde(default)]
    pub validation_rules: Vec<ValidationRule>,

    #[serde(default)]
    pub count: Option<CountMatcher>,

    #[serde(default)]
    pub timestamp: Option<TimestampMatcher>,

    #[serde(default)]
    pub custom_validation: Option<CustomValidation>,
}

impl LogMatcher {
    /// Whether the matcher constrains at least one field
    pub fn constrains_any(&self) -> bool {
        self.body.is_some()
            || self.severity.is_some()
            || !self.attributes.is_empty()
            || !self.validation_rules.is_empty()
            || self.count.is_some()
            || self.timestamp.is_some()
            || self.custom_validation.is_some()
    }
}

/// Expected transformation matchers by signal
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Matchers {
    #[serde(default)]
    pub traces: Vec<TraceMatcher>,

    #[serde(default)]
    pub metrics: Vec<MetricMatcher>,

    #[serde(default)]
    pub logs: Vec<LogMatcher>,
}

impl Matchers {
    /// Check whether no matcher section carries entries
    pub fn is_empty(&self) -> bool {
        self.traces.is_empty() && self.metrics.is_empty() && self.logs.is_empty()
    }
}

/// A complete contract definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    /// Publishing team or service
    pub publisher: String,

    /// Contract version
    pub version: String,

    /// Human-readable description
    #[serde(default)]
    pub description: Option<String>,

    /// Explicit pipeline id; superseded by selectors when both are set
    #[serde(default)]
    pub pipeline: Option<String>,

    /// Pipeline matching criteria
    #[serde(default)]
    pub pipeline_selectors: Option<PipelineSelectors>,

    /// Input data samples
    #[serde(default)]
    pub inputs: Inputs,

    /// Gating filters; all must hold for the contract to apply
    #[serde(default)]
    pub filters: Vec<Filter>,

    /// Global rules over the output bundle
    #[serde(default)]
    pub validation_rules: Vec<ValidationRule>,

    /// Expected transformation matchers
    #[serde(default)]
    pub matchers: Matchers,

    /// Timing-sensitive expectations
    #[serde(default)]
    pub time_windows: Vec<TimeWindow>,

    /// Provenance; set by the loader
    #[serde(skip)]
    pub file_path: String,
}

impl Contract {
    /// Whether the contract binds its pipeline through selectors
    pub fn has_pipeline_selectors(&self) -> bool {
        self.pipeline_selectors
            .as_ref()
            .map(|s| !s.selectors.is_empty())
            .unwrap_or(false)
    }

    /// Stable reference used in results and log lines
    pub fn reference(&self) -> String {
        format!("{}/{}", self.publisher, self.version)
    }
}

/// Machine-readable validation error kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationErrorKind {
    ContractStructure,
    InputData,
    OutputValidation,
    PatternInvalid,
    RangeInvalid,
    TemporalOutOfWindow,
    UnknownValidator,
    PipelineResolution,
    Timeout,
    RunnerError,
}

impl ValidationErrorKind {
    /// Kind name as reported to callers
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationErrorKind::ContractStructure => "contract_structure",
            ValidationErrorKind::InputData => "input_data",
            ValidationErrorKind::OutputValidation => "output_validation",
            ValidationErrorKind::PatternInvalid => "pattern_invalid",
            ValidationErrorKind::RangeInvalid => "range_invalid",
            ValidationErrorKind::TemporalOutOfWindow => "temporal_out_of_window",
            ValidationErrorKind::UnknownValidator => "unknown_validator",
            ValidationErrorKind::PipelineResolution => "pipeline_resolution",
            ValidationErrorKind::Timeout => "timeout",
            ValidationErrorKind::RunnerError => "runner_error",
        }
    }
}

/// A specific validation failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationError {
    /// Machine-readable kind
    pub kind: ValidationErrorKind,

    /// One-line human-readable message
    pub message: String,

    /// Field path the failure anchors to
    #[serde(default)]
    pub field: Option<String>,

    /// Expected value
    #[serde(default)]
    pub expected: Option<AttributeValue>,

    /// Actual value
    #[serde(default)]
    pub actual: Option<AttributeValue>,

    /// Signal the failure belongs to
    #[serde(default)]
    pub signal: Option<SignalType>,

    /// Matcher index within its signal section
    #[serde(default)]
    pub index: Option<usize>,
}

impl ValidationError {
    /// Create a new validation error
    pub fn new(kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            field: None,
            expected: None,
            actual: None,
            signal: None,
            index: None,
        }
    }

    /// Anchor the error to a field path
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    /// Attach the expected value
    pub fn with_expected(mut self, expected: AttributeValue) -> Self {
        self.expected = Some(expected);
        self
    }

    /// Attach the actual value
    pub fn with_actual(mut self, actual: AttributeValue) -> Self {
        self.actual = Some(actual);
        self
    }

    /// Attach the signal
    pub fn with_signal(mut self, signal: SignalType) -> Self {
        self.signal = Some(signal);
        self
    }

    /// Attach the matcher index
    pub fn with_index(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }
}

/// The result of validating one contract
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Whether the contract held
    pub valid: bool,

    /// Error-severity failures
    pub errors: Vec<ValidationError>,

    /// Warning- and info-severity notes
    pub warnings: Vec<String>,
}

impl ValidationResult {
    /// Create a passing result
    pub fn new() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Record an error-severity failure; flips validity
    pub fn add_error(&mut self, error: ValidationError) {
        self.valid = false;
        self.errors.push(error);
    }

    /// Record a note; never flips validity
    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    /// Route a failure by the originating rule's severity
    ///
    /// Only `error` flips validity; `warning` and `info` failures are
    /// demoted to notes.
    pub fn record_failure(&mut self, severity: Severity, error: ValidationError) {
        match severity {
            Severity::Error => self.add_error(error),
            Severity::Warning => self.add_warning(format!("warning: {}", error.message)),
            Severity::Info => self.add_warning(format!("info: {}", error.message)),
        }
    }

    /// Fold another result into this one
    pub fn merge(&mut self, other: ValidationResult) {
        self.valid = self.valid && other.valid;
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::new()
    }
}
