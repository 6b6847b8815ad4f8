//! SPDX-FileCopyrightText: © 2025 Cory Parent <goedelsoup+contrail@goedelsoup.io>
//! SPDX-License-Identifier: Apache-2.0
//!

//! Contract validation against telemetry bundles
//!
//! The validator gates on the contract's filters, evaluates its global
//! rules, and then walks the signal matchers. Matchers are sugar over
//! rules, pinned to the first item of their signal; quantified checks
//! (`count`) iterate the whole bundle. Failures accumulate without
//! short-circuiting; severity decides whether a failure flips validity.

use std::sync::Arc;

use tracing::debug;

use contrail_core::contract::{
    Contract, CountMatcher, CustomValidation, Loader, LogMatcher, MetricMatcher, SignalType,
    StatusCodeMatcher, TimestampMatcher, TraceMatcher, ValidationError, ValidationErrorKind,
    ValidationResult, ValueRange,
};
use contrail_core::types::value::NUMERIC_TOLERANCE;
use contrail_core::types::{AttributeValue, Attributes, MetricValue, TelemetryBundle};
use contrail_core::utils::time::{parse_duration, Clock};

use crate::expr::RuleEngine;

/// Warning emitted when gating filters rule a contract out
pub const SKIP_WARNING: &str = "skipped: filter not satisfied";

/// Validator binding the rule engine to contract matchers
pub struct ContractValidator {
    engine: RuleEngine,
    clock: Arc<dyn Clock>,
}

impl ContractValidator {
    /// Create a validator reading wall time from the given clock
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            engine: RuleEngine::new(),
            clock,
        }
    }

    /// Mutable access to the rule engine, for validator registration
    pub fn engine_mut(&mut self) -> &mut RuleEngine {
        &mut self.engine
    }

    /// Validate output telemetry against a contract
    ///
    /// The input bundle is consulted for gating filters and input-data
    /// presence; everything else runs against the output bundle.
    pub fn validate(
        &self,
        contract: &Contract,
        input: &TelemetryBundle,
        output: &TelemetryBundle,
    ) -> ValidationResult {
        let mut result = ValidationResult::new();

        // Structural failures short-circuit the whole contract.
        let structural = Loader::new().validate_contract(contract);
        if !structural.is_empty() {
            for message in structural {
                result.add_error(ValidationError::new(
                    ValidationErrorKind::ContractStructure,
                    message,
                ));
            }
            return result;
        }

        // Filter gating: if any filter fails, nothing else is evaluated.
        if !contract.filters.is_empty()
            && !contract
                .filters
                .iter()
                .all(|filter| self.engine.evaluate_filter(filter, input))
        {
            debug!(contract = %contract.reference(), "contract gated out by filters");
            result.add_warning(SKIP_WARNING);
            return result;
        }

        self.check_input_presence(contract, input, &mut result);

        for rule in &contract.validation_rules {
            if let Err(e) = self.engine.evaluate_rule(rule, output) {
                result.record_failure(rule.severity, e);
            }
        }

        self.validate_trace_matchers(contract, output, &mut result);
        self.validate_metric_matchers(contract, output, &mut result);
        self.validate_log_matchers(contract, output, &mut result);

        result
    }

    fn check_input_presence(
        &self,
        contract: &Contract,
        input: &TelemetryBundle,
        result: &mut ValidationResult,
    ) {
        if !contract.inputs.traces.is_empty() && input.span_count() == 0 {
            result.add_error(
                ValidationError::new(
                    ValidationErrorKind::InputData,
                    "contract expects trace input but no traces provided",
                )
                .with_signal(SignalType::Traces),
            );
        }
        if !contract.inputs.metrics.is_empty() && input.metric_count() == 0 {
            result.add_error(
                ValidationError::new(
                    ValidationErrorKind::InputData,
                    "contract expects metric input but no metrics provided",
                )
                .with_signal(SignalType::Metrics),
            );
        }
        if !contract.inputs.logs.is_empty() && input.log_count() == 0 {
            result.add_error(
                ValidationError::new(
                    ValidationErrorKind::InputData,
                    "contract expects log input but no logs provided",
                )
                .with_signal(SignalType::Logs),
            );
        }
    }

    fn validate_trace_matchers(
        &self,
        contract: &Contract,
        output: &TelemetryBundle,
        result: &mut ValidationResult,
    ) {
        if contract.matchers.traces.is_empty() {
            return;
        }
        if output.span_count() == 0 {
            result.add_error(
                ValidationError::new(
                    ValidationErrorKind::OutputValidation,
                    "no spans found in output",
                )
                .with_signal(SignalType::Traces),
            );
            return;
        }

        for (index, matcher) in contract.matchers.traces.iter().enumerate() {
            self.validate_trace_matcher(matcher, index, output, result);
        }
    }

    fn validate_trace_matcher(
        &self,
        matcher: &TraceMatcher,
        index: usize,
        output: &TelemetryBundle,
        result: &mut ValidationResult,
    ) {
        let Some(span) = output.first_span() else {
            return;
        };

        if let Some(expected) = &matcher.span_name {
            if &span.name != expected {
                result.add_error(
                    ValidationError::new(
                        ValidationErrorKind::OutputValidation,
                        format!("span name mismatch: expected {expected}, got {}", span.name),
                    )
                    .with_field("span.name")
                    .with_expected(AttributeValue::from(expected.as_str()))
                    .with_actual(AttributeValue::from(span.name.as_str()))
                    .with_signal(SignalType::Traces)
                    .with_index(index),
                );
            }
        }

        if let Some(expected) = &matcher.service_name {
            let actual = output
                .first_trace_resource()
                .and_then(|resource| resource.get("service.name"))
                .cloned()
                .unwrap_or(AttributeValue::Null);
            if actual.is_null() {
                result.add_error(
                    ValidationError::new(
                        ValidationErrorKind::OutputValidation,
                        "service name not found in resource attributes",
                    )
                    .with_field("span.service.name")
                    .with_signal(SignalType::Traces)
                    .with_index(index),
                );
            } else if actual.to_string() != *expected {
                result.add_error(
                    ValidationError::new(
                        ValidationErrorKind::OutputValidation,
                        format!("service name mismatch: expected {expected}, got {actual}"),
                    )
                    .with_field("span.service.name")
                    .with_expected(AttributeValue::from(expected.as_str()))
                    .with_actual(actual)
                    .with_signal(SignalType::Traces)
                    .with_index(index),
                );
            }
        }

        if matcher.parent_span.is_some()
            && span
                .parent_span_id
                .as_deref()
                .map(|id| id.is_empty())
                .unwrap_or(true)
        {
            result.add_error(
                ValidationError::new(
                    ValidationErrorKind::OutputValidation,
                    "expected span to have a parent",
                )
                .with_field("span.parent_span_id")
                .with_signal(SignalType::Traces)
                .with_index(index),
            );
        }

        self.check_attribute_expectations(
            &matcher.attributes,
            &span.attributes,
            SignalType::Traces,
            index,
            result,
        );

        for rule in &matcher.validation_rules {
            if let Err(e) = self.engine.evaluate_rule(rule, output) {
                result.record_failure(
                    rule.severity,
                    e.with_signal(SignalType::Traces).with_index(index),
                );
            }
        }

        if let Some(count) = &matcher.count {
            self.check_count(count, output.span_count(), SignalType::Traces, index, result);
        }

        if let Some(duration) = &matcher.duration {
            self.check_duration(duration, span.duration(), index, result);
        }

        if let Some(status) = &matcher.status_code {
            self.check_status_code(status, &span.attributes, index, result);
        }

        if let Some(custom) = &matcher.custom_validation {
            let actual = AttributeValue::Map(span.attributes.clone());
            self.run_custom_validation(custom, &actual, SignalType::Traces, index, result);
        }
    }

    fn validate_metric_matchers(
        &self,
        contract: &Contract,
        output: &TelemetryBundle,
        result: &mut ValidationResult,
    ) {
        if contract.matchers.metrics.is_empty() {
            return;
        }
        if output.metric_count() == 0 {
            result.add_error(
                ValidationError::new(
                    ValidationErrorKind::OutputValidation,
                    "no metrics found in output",
                )
                .with_signal(SignalType::Metrics),
            );
            return;
        }

        for (index, matcher) in contract.matchers.metrics.iter().enumerate() {
            self.validate_metric_matcher(matcher, index, output, result);
        }
    }

    fn validate_metric_matcher(
        &self,
        matcher: &MetricMatcher,
        index: usize,
        output: &TelemetryBundle,
        result: &mut ValidationResult,
    ) {
        let Some(point) = output.first_metric() else {
            return;
        };

        if let Some(expected) = &matcher.name {
            if &point.name != expected {
                result.add_error(
                    ValidationError::new(
                        ValidationErrorKind::OutputValidation,
                        format!(
                            "metric name mismatch: expected {expected}, got {}",
                            point.name
                        ),
                    )
                    .with_field("metric.name")
                    .with_expected(AttributeValue::from(expected.as_str()))
                    .with_actual(AttributeValue::from(point.name.as_str()))
                    .with_signal(SignalType::Metrics)
                    .with_index(index),
                );
            }
        }

        if let Some(expected) = &matcher.metric_type {
            let actual = point.kind.as_str();
            if !expected.eq_ignore_ascii_case(actual) {
                result.add_error(
                    ValidationError::new(
                        ValidationErrorKind::OutputValidation,
                        format!("metric type mismatch: expected {expected}, got {actual}"),
                    )
                    .with_field("metric.type")
                    .with_expected(AttributeValue::from(expected.as_str()))
                    .with_actual(AttributeValue::from(actual))
                    .with_signal(SignalType::Metrics)
                    .with_index(index),
                );
            }
        }

        for (key, expected) in &matcher.labels {
            match point.attributes.get(key) {
                Some(actual) if actual.loose_eq(expected) => {}
                Some(actual) => {
                    result.add_error(
                        ValidationError::new(
                            ValidationErrorKind::OutputValidation,
                            format!("label {key} mismatch: expected {expected}, got {actual}"),
                        )
                        .with_field(format!("metric.labels.{key}"))
                        .with_expected(expected.clone())
                        .with_actual(actual.clone())
                        .with_signal(SignalType::Metrics)
                        .with_index(index),
                    );
                }
                None => {
                    result.add_error(
                        ValidationError::new(
                            ValidationErrorKind::OutputValidation,
                            format!("label {key} not found"),
                        )
                        .with_field(format!("metric.labels.{key}"))
                        .with_expected(expected.clone())
                        .with_signal(SignalType::Metrics)
                        .with_index(index),
                    );
                }
            }
        }

        if let Some(value_matcher) = &matcher.value {
            let actual = point.value.numeric();
            if let Some(expected) = &value_matcher.expected {
                match (actual, expected.to_numeric()) {
                    (Some(actual), Some(expected_num)) => {
                        let tolerance = if value_matcher.tolerance > 0.0 {
                            value_matcher.tolerance
                        } else {
                            NUMERIC_TOLERANCE
                        };
                        if (actual - expected_num).abs() > tolerance {
                            result.add_error(
                                ValidationError::new(
                                    ValidationErrorKind::OutputValidation,
                                    format!(
                                        "metric value mismatch: expected {expected_num}, got {actual}"
                                    ),
                                )
                                .with_field("metric.value")
                                .with_expected(expected.clone())
                                .with_actual(AttributeValue::Double(actual))
                                .with_signal(SignalType::Metrics)
                                .with_index(index),
                            );
                        }
                    }
                    _ => {
                        result.add_error(
                            ValidationError::new(
                                ValidationErrorKind::OutputValidation,
                                "metric value is not numeric",
                            )
                            .with_field("metric.value")
                            .with_signal(SignalType::Metrics)
                            .with_index(index),
                        );
                    }
                }
            }
            if let Some(range) = &value_matcher.range {
                match actual {
                    Some(actual) => match numeric_range_contains(actual, range) {
                        Ok(true) => {}
                        Ok(false) => {
                            result.add_error(
                                ValidationError::new(
                                    ValidationErrorKind::OutputValidation,
                                    format!("metric value {actual} not in expected range"),
                                )
                                .with_field("metric.value")
                                .with_actual(AttributeValue::Double(actual))
                                .with_signal(SignalType::Metrics)
                                .with_index(index),
                            );
                        }
                        Err(e) => {
                            result.add_error(
                                e.with_signal(SignalType::Metrics).with_index(index),
                            );
                        }
                    },
                    None => {
                        result.add_error(
                            ValidationError::new(
                                ValidationErrorKind::OutputValidation,
                                "metric value is not numeric",
                            )
                            .with_field("metric.value")
                            .with_signal(SignalType::Metrics)
                            .with_index(index),
                        );
                    }
                }
            }
        }

        if let Some(count) = &matcher.count {
            self.check_count(
                count,
                output.metric_count(),
                SignalType::Metrics,
                index,
                result,
            );
        }

        if let Some(histogram) = &matcher.histogram {
            self.check_histogram(histogram, &point.value, index, result);
        }

        for rule in &matcher.validation_rules {
            if let Err(e) = self.engine.evaluate_rule(rule, output) {
                result.record_failure(
                    rule.severity,
                    e.with_signal(SignalType::Metrics).with_index(index),
                );
            }
        }

        if let Some(custom) = &matcher.custom_validation {
            let actual = match &point.value {
                MetricValue::Int(i) => AttributeValue::Int(*i),
                MetricValue::Double(d) => AttributeValue::Double(*d),
                MetricValue::Histogram(_) => AttributeValue::Null,
            };
            self.run_custom_validation(custom, &actual, SignalType::Metrics, index, result);
        }
    }

    fn validate_log_matchers(
        &self,
        contract: &Contract,
        output: &TelemetryBundle,
        result: &mut ValidationResult,
    ) {
        if contract.matchers.logs.is_empty() {
            return;
        }
        if output.log_count() == 0 {
            result.add_error(
                ValidationError::new(
                    ValidationErrorKind::OutputValidation,
                    "no logs found in output",
                )
                .with_signal(SignalType::Logs),
            );
            return;
        }

        for (index, matcher) in contract.matchers.logs.iter().enumerate() {
            self.validate_log_matcher(matcher, index, output, result);
        }
    }

    fn validate_log_matcher(
        &self,
        matcher: &LogMatcher,
        index: usize,
        output: &TelemetryBundle,
        result: &mut ValidationResult,
    ) {
        let Some(record) = output.first_log() else {
            return;
        };

        if let Some(expected) = &matcher.body {
            let actual = record.body.to_string();
            if &actual != expected {
                result.add_error(
                    ValidationError::new(
                        ValidationErrorKind::OutputValidation,
                        format!("log body mismatch: expected {expected}, got {actual}"),
                    )
                    .with_field("log.body")
                    .with_expected(AttributeValue::from(expected.as_str()))
                    .with_actual(AttributeValue::from(actual))
                    .with_signal(SignalType::Logs)
                    .with_index(index),
                );
            }
        }

        if let Some(expected) = &matcher.severity {
            if &record.severity_text != expected {
                result.add_error(
                    ValidationError::new(
                        ValidationErrorKind::OutputValidation,
                        format!(
                            "log severity mismatch: expected {expected}, got {}",
                            record.severity_text
                        ),
                    )
                    .with_field("log.severity")
                    .with_expected(AttributeValue::from(expected.as_str()))
                    .with_actual(AttributeValue::from(record.severity_text.as_str()))
                    .with_signal(SignalType::Logs)
                    .with_index(index),
                );
            }
        }

        self.check_attribute_expectations(
            &matcher.attributes,
            &record.attributes,
            SignalType::Logs,
            index,
            result,
        );

        for rule in &matcher.validation_rules {
            if let Err(e) = self.engine.evaluate_rule(rule, output) {
                result.record_failure(
                    rule.severity,
                    e.with_signal(SignalType::Logs).with_index(index),
                );
            }
        }

        if let Some(count) = &matcher.count {
            self.check_count(count, output.log_count(), SignalType::Logs, index, result);
        }

        if let Some(timestamp) = &matcher.timestamp {
            self.check_timestamp(timestamp, record.timestamp, index, result);
        }

        if let Some(custom) = &matcher.custom_validation {
            self.run_custom_validation(custom, &record.body, SignalType::Logs, index, result);
        }
    }

    /// Attribute expectations shared by trace and log matchers; a `!`
    /// key prefix asserts absence.
    fn check_attribute_expectations(
        &self,
        expectations: &std::collections::BTreeMap<String, AttributeValue>,
        attributes: &Attributes,
        signal: SignalType,
        index: usize,
        result: &mut ValidationResult,
    ) {
        for (key, expected) in expectations {
            if let Some(absent_key) = key.strip_prefix('!') {
                if attributes.contains_key(absent_key) {
                    result.add_error(
                        ValidationError::new(
                            ValidationErrorKind::OutputValidation,
                            format!("attribute {absent_key} should not exist"),
                        )
                        .with_field(absent_key)
                        .with_signal(signal)
                        .with_index(index),
                    );
                }
                continue;
            }

            match attributes.get(key) {
                Some(actual) if actual.loose_eq(expected) => {}
                Some(actual) => {
                    result.add_error(
                        ValidationError::new(
                            ValidationErrorKind::OutputValidation,
                            format!("attribute {key} mismatch: expected {expected}, got {actual}"),
                        )
                        .with_field(key)
                        .with_expected(expected.clone())
                        .with_actual(actual.clone())
                        .with_signal(signal)
                        .with_index(index),
                    );
                }
                None => {
                    result.add_error(
                        ValidationError::new(
                            ValidationErrorKind::OutputValidation,
                            format!("attribute {key} not found"),
                        )
                        .with_field(key)
                        .with_expected(expected.clone())
                        .with_signal(signal)
                        .with_index(index),
                    );
                }
            }
        }
    }

    fn check_count(
        &self,
        count: &CountMatcher,
        actual: usize,
        signal: SignalType,
        index: usize,
        result: &mut ValidationResult,
    ) {
        if let Some(expected) = count.expected {
            if actual != expected {
                result.add_error(
                    ValidationError::new(
                        ValidationErrorKind::OutputValidation,
                        format!("count mismatch: expected {expected}, got {actual}"),
                    )
                    .with_expected(AttributeValue::Int(expected as i64))
                    .with_actual(AttributeValue::Int(actual as i64))
                    .with_signal(signal)
                    .with_index(index),
                );
            }
        }
        if let Some(min) = count.min {
            if actual < min {
                result.add_error(
                    ValidationError::new(
                        ValidationErrorKind::OutputValidation,
                        format!("count {actual} below minimum {min}"),
                    )
                    .with_actual(AttributeValue::Int(actual as i64))
                    .with_signal(signal)
                    .with_index(index),
                );
            }
        }
        if let Some(max) = count.max {
            if actual > max {
                result.add_error(
                    ValidationError::new(
                        ValidationErrorKind::OutputValidation,
                        format!("count {actual} above maximum {max}"),
                    )
                    .with_actual(AttributeValue::Int(actual as i64))
                    .with_signal(signal)
                    .with_index(index),
                );
            }
        }
    }

    fn check_duration(
        &self,
        matcher: &contrail_core::contract::DurationMatcher,
        actual: chrono::Duration,
        index: usize,
        result: &mut ValidationResult,
    ) {
        let parse = |input: &str| {
            parse_duration(input).map_err(|e| {
                ValidationError::new(
                    ValidationErrorKind::ContractStructure,
                    format!("invalid duration in matcher: {e}"),
                )
            })
        };

        if let Some(min) = &matcher.min {
            match parse(min) {
                Ok(min) if actual < min => {
                    result.add_error(
                        ValidationError::new(
                            ValidationErrorKind::OutputValidation,
                            format!(
                                "span duration {}ms below minimum {}ms",
                                actual.num_milliseconds(),
                                min.num_milliseconds()
                            ),
                        )
                        .with_field("span.duration")
                        .with_signal(SignalType::Traces)
                        .with_index(index),
                    );
                }
                Ok(_) => {}
                Err(e) => result.add_error(e.with_signal(SignalType::Traces).with_index(index)),
            }
        }

        if let Some(max) = &matcher.max {
            match parse(max) {
                Ok(max) if actual > max => {
                    result.add_error(
                        ValidationError::new(
                            ValidationErrorKind::OutputValidation,
                            format!(
                                "span duration {}ms above maximum {}ms",
                                actual.num_milliseconds(),
                                max.num_milliseconds()
                            ),
                        )
                        .with_field("span.duration")
                        .with_signal(SignalType::Traces)
                        .with_index(index),
                    );
                }
                Ok(_) => {}
                Err(e) => result.add_error(e.with_signal(SignalType::Traces).with_index(index)),
            }
        }

        if let Some(expected) = &matcher.expected {
            let tolerance = match &matcher.tolerance {
                Some(tolerance) => parse(tolerance),
                None => Ok(chrono::Duration::zero()),
            };
            match (parse(expected), tolerance) {
                (Ok(expected), Ok(tolerance)) => {
                    let delta = (actual - expected).abs();
                    if delta > tolerance {
                        result.add_error(
                            ValidationError::new(
                                ValidationErrorKind::OutputValidation,
                                format!(
                                    "span duration {}ms outside expected {}ms +/- {}ms",
                                    actual.num_milliseconds(),
                                    expected.num_milliseconds(),
                                    tolerance.num_milliseconds()
                                ),
                            )
                            .with_field("span.duration")
                            .with_signal(SignalType::Traces)
                            .with_index(index),
                        );
                    }
                }
                (Err(e), _) | (_, Err(e)) => {
                    result.add_error(e.with_signal(SignalType::Traces).with_index(index))
                }
            }
        }
    }

    fn check_status_code(
        &self,
        matcher: &StatusCodeMatcher,
        attributes: &Attributes,
        index: usize,
        result: &mut ValidationResult,
    ) {
        let code = attributes.get("http.status_code").and_then(|v| match v {
            AttributeValue::Int(i) => Some(*i),
            AttributeValue::Str(s) => s.parse::<i64>().ok(),
            _ => None,
        });
        let Some(code) = code else {
            result.add_error(
                ValidationError::new(
                    ValidationErrorKind::OutputValidation,
                    "http.status_code attribute not found",
                )
                .with_field("span.attributes.http.status_code")
                .with_signal(SignalType::Traces)
                .with_index(index),
            );
            return;
        };

        if let Some(expected) = matcher.expected {
            if code != expected {
                result.add_error(
                    ValidationError::new(
                        ValidationErrorKind::OutputValidation,
                        format!("status code mismatch: expected {expected}, got {code}"),
                    )
                    .with_field("span.attributes.http.status_code")
                    .with_expected(AttributeValue::Int(expected))
                    .with_actual(AttributeValue::Int(code))
                    .with_signal(SignalType::Traces)
                    .with_index(index),
                );
            }
        }

        if let Some(class) = &matcher.class {
            let actual_class = format!("{}xx", code / 100);
            if &actual_class != class {
                result.add_error(
                    ValidationError::new(
                        ValidationErrorKind::OutputValidation,
                        format!("status class mismatch: expected {class}, got {actual_class}"),
                    )
                    .with_field("span.attributes.http.status_code")
                    .with_actual(AttributeValue::Int(code))
                    .with_signal(SignalType::Traces)
                    .with_index(index),
                );
            }
        }

        if matcher.not_allowed.contains(&code) {
            result.add_error(
                ValidationError::new(
                    ValidationErrorKind::OutputValidation,
                    format!("status code {code} is not allowed"),
                )
                .with_field("span.attributes.http.status_code")
                .with_actual(AttributeValue::Int(code))
                .with_signal(SignalType::Traces)
                .with_index(index),
            );
        }
    }

    fn check_histogram(
        &self,
        matcher: &contrail_core::contract::HistogramMatcher,
        value: &MetricValue,
        index: usize,
        result: &mut ValidationResult,
    ) {
        let MetricValue::Histogram(histogram) = value else {
            result.add_error(
                ValidationError::new(
                    ValidationErrorKind::OutputValidation,
                    "metric is not a histogram",
                )
                .with_field("metric.value")
                .with_signal(SignalType::Metrics)
                .with_index(index),
            );
            return;
        };

        if !matcher.buckets.is_empty() {
            let bounds_match = matcher.buckets.len() == histogram.bucket_bounds.len()
                && matcher
                    .buckets
                    .iter()
                    .zip(&histogram.bucket_bounds)
                    .all(|(a, b)| (a - b).abs() < NUMERIC_TOLERANCE);
            if !bounds_match {
                result.add_error(
                    ValidationError::new(
                        ValidationErrorKind::OutputValidation,
                        "histogram bucket bounds mismatch",
                    )
                    .with_field("metric.value")
                    .with_signal(SignalType::Metrics)
                    .with_index(index),
                );
            }
        }

        if let Some(expected) = matcher.count {
            if histogram.count != expected {
                result.add_error(
                    ValidationError::new(
                        ValidationErrorKind::OutputValidation,
                        format!(
                            "histogram count mismatch: expected {expected}, got {}",
                            histogram.count
                        ),
                    )
                    .with_field("metric.value")
                    .with_signal(SignalType::Metrics)
                    .with_index(index),
                );
            }
        }

        if let Some(expected) = matcher.sum {
            if (histogram.sum - expected).abs() > NUMERIC_TOLERANCE {
                result.add_error(
                    ValidationError::new(
                        ValidationErrorKind::OutputValidation,
                        format!(
                            "histogram sum mismatch: expected {expected}, got {}",
                            histogram.sum
                        ),
                    )
                    .with_field("metric.value")
                    .with_signal(SignalType::Metrics)
                    .with_index(index),
                );
            }
        }

        for (bound_text, expected_count) in &matcher.bucket_counts {
            let Ok(bound) = bound_text.parse::<f64>() else {
                result.add_error(
                    ValidationError::new(
                        ValidationErrorKind::RangeInvalid,
                        format!("histogram bucket bound {bound_text} is not numeric"),
                    )
                    .with_signal(SignalType::Metrics)
                    .with_index(index),
                );
                continue;
            };
            let position = histogram
                .bucket_bounds
                .iter()
                .position(|b| (b - bound).abs() < NUMERIC_TOLERANCE);
            match position.and_then(|p| histogram.bucket_counts.get(p)) {
                Some(actual) if actual == expected_count => {}
                Some(actual) => {
                    result.add_error(
                        ValidationError::new(
                            ValidationErrorKind::OutputValidation,
                            format!(
                                "histogram bucket {bound_text} count mismatch: expected {expected_count}, got {actual}"
                            ),
                        )
                        .with_signal(SignalType::Metrics)
                        .with_index(index),
                    );
                }
                None => {
                    result.add_error(
                        ValidationError::new(
                            ValidationErrorKind::OutputValidation,
                            format!("histogram has no bucket with bound {bound_text}"),
                        )
                        .with_signal(SignalType::Metrics)
                        .with_index(index),
                    );
                }
            }
        }
    }

    fn check_timestamp(
        &self,
        matcher: &TimestampMatcher,
        actual: chrono::DateTime<chrono::Utc>,
        index: usize,
        result: &mut ValidationResult,
    ) {
        if let Some(format) = &matcher.format {
            if !matches!(format.to_ascii_lowercase().as_str(), "rfc3339" | "unix") {
                result.add_error(
                    ValidationError::new(
                        ValidationErrorKind::ContractStructure,
                        format!("unsupported timestamp format {format}"),
                    )
                    .with_signal(SignalType::Logs)
                    .with_index(index),
                );
            }
        }

        if let Some(range) = &matcher.range {
            let epoch = actual.timestamp() as f64;
            match numeric_range_contains(epoch, range) {
                Ok(true) => {}
                Ok(false) => {
                    result.add_error(
                        ValidationError::new(
                            ValidationErrorKind::OutputValidation,
                            format!("log timestamp {} outside expected range", actual.to_rfc3339()),
                        )
                        .with_field("log.timestamp")
                        .with_signal(SignalType::Logs)
                        .with_index(index),
                    );
                }
                Err(e) => result.add_error(e.with_signal(SignalType::Logs).with_index(index)),
            }
        }

        if let Some(relative) = &matcher.relative {
            let window = match relative.as_str() {
                "within_last_minute" => Some(chrono::Duration::minutes(1)),
                "within_last_hour" => Some(chrono::Duration::hours(1)),
                "within_last_day" => Some(chrono::Duration::days(1)),
                _ => None,
            };
            match window {
                Some(window) => {
                    let now = self.clock.now();
                    if actual < now - window || actual > now {
                        result.add_error(
                            ValidationError::new(
                                ValidationErrorKind::TemporalOutOfWindow,
                                format!("log timestamp {} is not {relative}", actual.to_rfc3339()),
                            )
                            .with_field("log.timestamp")
                            .with_signal(SignalType::Logs)
                            .with_index(index),
                        );
                    }
                }
                None => {
                    result.add_error(
                        ValidationError::new(
                            ValidationErrorKind::ContractStructure,
                            format!("unsupported relative timestamp expectation {relative}"),
                        )
                        .with_signal(SignalType::Logs)
                        .with_index(index),
                    );
                }
            }
        }
    }

    fn run_custom_validation(
        &self,
        custom: &CustomValidation,
        actual: &AttributeValue,
        signal: SignalType,
        index: usize,
        result: &mut ValidationResult,
    ) {
        match self
            .engine
            .run_validator(&custom.function, actual, &custom.parameters)
        {
            Ok(true) => {}
            Ok(false) => {
                result.add_error(
                    ValidationError::new(
                        ValidationErrorKind::OutputValidation,
                        format!("custom validator {} rejected the value", custom.function),
                    )
                    .with_actual(actual.clone())
                    .with_signal(signal)
                    .with_index(index),
                );
            }
            Err(e) => result.add_error(e.with_signal(signal).with_index(index)),
        }
    }
}

/// Range membership over plain numerics, honoring the inclusivity rules
fn numeric_range_contains(value: f64, range: &ValueRange) -> Result<bool, ValidationError> {
    if let Some(min) = &range.min {
        let min = min.to_numeric().ok_or_else(|| {
            ValidationError::new(
                ValidationErrorKind::RangeInvalid,
                format!("range minimum {min} is not numeric"),
            )
        })?;
        let inclusive = range.min_inclusive.unwrap_or(range.inclusive);
        if (inclusive && value < min) || (!inclusive && value <= min) {
            return Ok(false);
        }
    }
    if let Some(max) = &range.max {
        let max = max.to_numeric().ok_or_else(|| {
            ValidationError::new(
                ValidationErrorKind::RangeInvalid,
                format!("range maximum {max} is not numeric"),
            )
        })?;
        let inclusive = range.max_inclusive.unwrap_or(range.inclusive);
        if (inclusive && value > max) || (!inclusive && value >= max) {
            return Ok(false);
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, Utc};
    use contrail_core::types::{
        HistogramValue, LogRecord, MetricKind, MetricPoint, ResourceScope, Span,
    };
    use contrail_core::utils::time::FixedClock;
    use std::sync::Arc;

    fn base_time() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn validator() -> ContractValidator {
        ContractValidator::new(Arc::new(FixedClock::new(base_time())))
    }

    fn contract(doc: &str) -> Contract {
        serde_yaml::from_str(doc).unwrap()
    }

    fn span_bundle(name: &str, service: &str, attrs: &[(&str, AttributeValue)]) -> TelemetryBundle {
        let mut span = Span::new(name, base_time(), base_time() + Duration::milliseconds(100));
        for (key, value) in attrs {
            span.attributes.insert(key.to_string(), value.clone());
        }
        let mut bundle = TelemetryBundle::new(base_time());
        bundle.traces.push(
            ResourceScope::new(vec![span])
                .with_resource_attribute("service.name", AttributeValue::from(service)),
        );
        bundle
    }

    #[test]
    fn test_filter_gating_skips_everything() {
        let validator = validator();
        let contract = contract(
            r#"
publisher: p
version: "1"
pipeline: x
inputs:
  traces:
    - span_name: op
filters:
  - field: span.service.name
    operator: equals
    value: billing
matchers:
  traces:
    - span_name: never-checked
"#,
        );
        let bundle = span_bundle("op", "auth", &[]);

        let result = validator.validate(&contract, &bundle, &bundle);
        assert!(result.valid);
        assert!(result.errors.is_empty());
        assert_eq!(result.warnings, vec![SKIP_WARNING.to_string()]);
    }

    #[test]
    fn test_trace_matcher_name_and_attributes() {
        let validator = validator();
        let contract = contract(
            r#"
publisher: p
version: "1"
pipeline: x
inputs:
  traces:
    - span_name: op
matchers:
  traces:
    - span_name: op
      service_name: auth
      attributes:
        environment: production
        "!internal.debug": true
"#,
        );

        let good = span_bundle(
            "op",
            "auth",
            &[("environment", AttributeValue::from("production"))],
        );
        let result = validator.validate(&contract, &good, &good);
        assert!(result.valid, "errors: {:?}", result.errors);

        let bad = span_bundle(
            "op",
            "auth",
            &[
                ("environment", AttributeValue::from("staging")),
                ("internal.debug", AttributeValue::Bool(true)),
            ],
        );
        let result = validator.validate(&contract, &bad, &bad);
        assert!(!result.valid);
        assert_eq!(result.errors.len(), 2);
        assert!(result
            .errors
            .iter()
            .all(|e| e.kind == ValidationErrorKind::OutputValidation));
        assert!(result
            .errors
            .iter()
            .all(|e| e.signal == Some(SignalType::Traces)));
    }

    #[test]
    fn test_severity_discipline() {
        let validator = validator();
        let contract = contract(
            r#"
publisher: p
version: "1"
pipeline: x
inputs:
  traces:
    - span_name: op
validation_rules:
  - field: span.attributes.latency_budget
    operator: exists
    severity: warning
matchers:
  traces:
    - span_name: op
"#,
        );
        let bundle = span_bundle("op", "auth", &[]);

        let result = validator.validate(&contract, &bundle, &bundle);
        assert!(result.valid);
        assert!(result.errors.is_empty());
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].starts_with("warning:"));
    }

    #[test]
    fn test_count_and_duration_matchers() {
        let validator = validator();
        let contract = contract(
            r#"
publisher: p
version: "1"
pipeline: x
inputs:
  traces:
    - span_name: op
matchers:
  traces:
    - count:
        expected: 1
      duration:
        min: 50ms
        max: 200ms
"#,
        );
        let bundle = span_bundle("op", "auth", &[]);
        let result = validator.validate(&contract, &bundle, &bundle);
        assert!(result.valid, "errors: {:?}", result.errors);

        let contract_fail = contract_with_max_duration("50ms");
        let result = validator.validate(&contract_fail, &bundle, &bundle);
        assert!(!result.valid);
    }

    fn contract_with_max_duration(max: &str) -> Contract {
        serde_yaml::from_str(&format!(
            r#"
publisher: p
version: "1"
pipeline: x
inputs:
  traces:
    - span_name: op
matchers:
  traces:
    - duration:
        max: {max}
"#
        ))
        .unwrap()
    }

    #[test]
    fn test_status_code_class() {
        let validator = validator();
        let contract = contract(
            r#"
publisher: p
version: "1"
pipeline: x
inputs:
  traces:
    - span_name: op
matchers:
  traces:
    - status_code:
        class: 2xx
        not_allowed: [418]
"#,
        );

        let ok = span_bundle("op", "auth", &[("http.status_code", AttributeValue::Int(200))]);
        assert!(validator.validate(&contract, &ok, &ok).valid);

        let teapot = span_bundle("op", "auth", &[("http.status_code", AttributeValue::Int(418))]);
        let result = validator.validate(&contract, &teapot, &teapot);
        assert!(!result.valid);
        assert_eq!(result.errors.len(), 2);
    }

    #[test]
    fn test_metric_matcher_value_and_histogram() {
        let validator = validator();
        let contract = contract(
            r#"
publisher: p
version: "1"
pipeline: x
inputs:
  metrics:
    - name: latency
      value: 1.0
      type: histogram
matchers:
  metrics:
    - name: latency
      type: histogram
      histogram:
        count: 3
        sum: 6.0
        bucket_counts:
          "0.5": 1
          "1.0": 2
"#,
        );

        let mut bundle = TelemetryBundle::new(base_time());
        bundle.metrics.push(ResourceScope::new(vec![MetricPoint {
            name: "latency".to_string(),
            kind: MetricKind::Histogram,
            value: MetricValue::Histogram(HistogramValue {
                count: 3,
                sum: 6.0,
                min: Some(0.5),
                max: Some(3.0),
                bucket_bounds: vec![0.5, 1.0],
                bucket_counts: vec![1, 2],
            }),
            attributes: Attributes::new(),
            timestamp: base_time(),
        }]));

        let result = validator.validate(&contract, &bundle, &bundle);
        assert!(result.valid, "errors: {:?}", result.errors);
    }

    #[test]
    fn test_log_matcher_and_relative_timestamp() {
        let validator = validator();
        let contract = contract(
            r#"
publisher: p
version: "1"
pipeline: x
inputs:
  logs:
    - body: request handled
matchers:
  logs:
    - body: request handled
      severity: INFO
      timestamp:
        relative: within_last_hour
"#,
        );

        let mut bundle = TelemetryBundle::new(base_time());
        let record = LogRecord::new("request handled", base_time() - Duration::minutes(5))
            .with_severity("INFO");
        bundle.logs.push(ResourceScope::new(vec![record]));

        let result = validator.validate(&contract, &bundle, &bundle);
        assert!(result.valid, "errors: {:?}", result.errors);

        let mut stale = TelemetryBundle::new(base_time());
        let record = LogRecord::new("request handled", base_time() - Duration::hours(3))
            .with_severity("INFO");
        stale.logs.push(ResourceScope::new(vec![record]));

        let result = validator.validate(&contract, &stale, &stale);
        assert!(!result.valid);
        assert!(result
            .errors
            .iter()
            .any(|e| e.kind == ValidationErrorKind::TemporalOutOfWindow));
    }

    #[test]
    fn test_input_presence() {
        let validator = validator();
        let contract = contract(
            r#"
publisher: p
version: "1"
pipeline: x
inputs:
  metrics:
    - name: m
      value: 1
matchers:
  metrics:
    - name: m
"#,
        );

        let empty = TelemetryBundle::new(base_time());
        let result = validator.validate(&contract, &empty, &empty);
        assert!(!result.valid);
        assert!(result
            .errors
            .iter()
            .any(|e| e.kind == ValidationErrorKind::InputData));
    }

    #[test]
    fn test_custom_validation_unknown_name() {
        let validator = validator();
        let contract = contract(
            r#"
publisher: p
version: "1"
pipeline: x
inputs:
  traces:
    - span_name: op
matchers:
  traces:
    - custom_validation:
        function: not_registered
"#,
        );
        let bundle = span_bundle("op", "auth", &[]);

        let result = validator.validate(&contract, &bundle, &bundle);
        assert!(!result.valid);
        assert_eq!(result.errors[0].kind, ValidationErrorKind::UnknownValidator);
    }

    #[test]
    fn test_custom_validation_registered() {
        let mut validator = validator();
        validator.engine_mut().register_validator(
            "has_env",
            Arc::new(|actual, _| match actual {
                AttributeValue::Map(m) => m.contains_key("environment"),
                _ => false,
            }),
        );
        let contract = contract(
            r#"
publisher: p
version: "1"
pipeline: x
inputs:
  traces:
    - span_name: op
matchers:
  traces:
    - custom_validation:
        function: has_env
"#,
        );

        let good = span_bundle("op", "auth", &[("environment", AttributeValue::from("prod"))]);
        assert!(validator.validate(&contract, &good, &good).valid);

        let bad = span_bundle("op", "auth", &[]);
        assert!(!validator.validate(&contract, &bad, &bad).valid);
    }
}
