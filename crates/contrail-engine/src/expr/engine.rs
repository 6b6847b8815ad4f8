//! SPDX-FileCopyrightText: © 2025 Cory Parent <goedelsoup+contrail@goedelsoup.io>
//! SPDX-License-Identifier: Apache-2.0
//!

//! Rule evaluation engine
//!
//! The engine evaluates operators against `(actual, params)` where
//! `actual` is the value the field-path extractor produced and the
//! params are the operator arguments carried on the rule. Conditional,
//! transform, and temporal qualifiers override the basic operator path;
//! precedence is condition, then transform, then temporal, then basic.
//!
//! Conditional rules form a tree; evaluation is an explicit recursion
//! with a depth guard to defeat pathological inputs. Regex patterns are
//! compiled once per engine instance and cached by pattern string.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use regex::Regex;
use tracing::debug;

use contrail_core::contract::{
    ConditionalRule, Filter, FilterOperator, TemporalRule, TransformRule, TransformType,
    ValidationError, ValidationErrorKind, ValidationRule, ValueRange,
};
use contrail_core::types::{extract_field, AttributeValue, TelemetryBundle};
use contrail_core::utils::time::parse_duration;

/// Maximum conditional nesting depth
pub const MAX_RULE_DEPTH: usize = 64;

/// Custom validator signature: `(actual, params) -> bool`
pub type CustomValidatorFn =
    Arc<dyn Fn(&AttributeValue, &BTreeMap<String, AttributeValue>) -> bool + Send + Sync>;

/// Evaluator for rules, filters, and custom validators
pub struct RuleEngine {
    /// Compiled patterns keyed by pattern string
    regex_cache: Mutex<HashMap<String, Arc<Regex>>>,

    /// Registered custom validators
    custom_validators: HashMap<String, CustomValidatorFn>,
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleEngine {
    /// Create a new rule engine
    pub fn new() -> Self {
        Self {
            regex_cache: Mutex::new(HashMap::new()),
            custom_validators: HashMap::new(),
        }
    }

    /// Register a custom validator under the given name
    pub fn register_validator(&mut self, name: impl Into<String>, validator: CustomValidatorFn) {
        let name = name.into();
        debug!(name = %name, "registering custom validator");
        self.custom_validators.insert(name, validator);
    }

    /// Invoke a registered validator by name
    pub fn run_validator(
        &self,
        name: &str,
        actual: &AttributeValue,
        params: &BTreeMap<String, AttributeValue>,
    ) -> Result<bool, ValidationError> {
        let validator = self.custom_validators.get(name).ok_or_else(|| {
            ValidationError::new(
                ValidationErrorKind::UnknownValidator,
                format!("custom validator '{name}' is not registered"),
            )
        })?;
        Ok(validator(actual, params))
    }

    /// Evaluate a validation rule against a bundle
    pub fn evaluate_rule(
        &self,
        rule: &ValidationRule,
        bundle: &TelemetryBundle,
    ) -> Result<(), ValidationError> {
        self.evaluate_rule_at(rule, bundle, 0)
    }

    /// Evaluate a legacy gating filter against a bundle
    pub fn evaluate_filter(&self, filter: &Filter, bundle: &TelemetryBundle) -> bool {
        let rule = ValidationRule {
            field: filter.field.clone(),
            operator: Some(filter.operator),
            value: filter.value.clone(),
            ..Default::default()
        };
        self.evaluate_rule(&rule, bundle).is_ok()
    }

    fn evaluate_rule_at(
        &self,
        rule: &ValidationRule,
        bundle: &TelemetryBundle,
        depth: usize,
    ) -> Result<(), ValidationError> {
        if depth > MAX_RULE_DEPTH {
            return Err(ValidationError::new(
                ValidationErrorKind::ContractStructure,
                format!("conditional rule nesting exceeds depth limit of {MAX_RULE_DEPTH}"),
            ));
        }

        if let Some(condition) = &rule.condition {
            return self.evaluate_condition(condition, bundle, depth + 1);
        }

        if let Some(transform) = &rule.transform {
            return self.evaluate_transform(transform, rule, bundle);
        }

        if let Some(temporal) = &rule.temporal {
            return self.evaluate_temporal(temporal, rule, bundle);
        }

        let actual = extract_field(bundle, &rule.field);
        self.evaluate_basic(rule, &actual)
    }

    fn evaluate_condition(
        &self,
        condition: &ConditionalRule,
        bundle: &TelemetryBundle,
        depth: usize,
    ) -> Result<(), ValidationError> {
        if let Some(if_rule) = &condition.if_rule {
            // A missing branch is a no-op success. Structural failures
            // in the condition are not a "false" outcome; they abort.
            return match self.evaluate_rule_at(if_rule, bundle, depth) {
                Ok(()) => match &condition.then_rule {
                    Some(then_rule) => self.evaluate_rule_at(then_rule, bundle, depth),
                    None => Ok(()),
                },
                Err(e) if e.kind == ValidationErrorKind::ContractStructure => Err(e),
                Err(_) => match &condition.else_rule {
                    Some(else_rule) => self.evaluate_rule_at(else_rule, bundle, depth),
                    None => Ok(()),
                },
            };
        }

        if !condition.and.is_empty() {
            for (i, sub) in condition.and.iter().enumerate() {
                if let Err(e) = self.evaluate_rule_at(sub, bundle, depth) {
                    return Err(ValidationError::new(
                        e.kind,
                        format!("and condition {i} failed: {}", e.message),
                    ));
                }
            }
            return Ok(());
        }

        if !condition.or.is_empty() {
            let mut failures = Vec::new();
            for sub in &condition.or {
                match self.evaluate_rule_at(sub, bundle, depth) {
                    Ok(()) => return Ok(()),
                    Err(e) => failures.push(e.message),
                }
            }
            return Err(ValidationError::new(
                ValidationErrorKind::OutputValidation,
                format!("all or conditions failed: [{}]", failures.join("; ")),
            ));
        }

        if let Some(not_rule) = &condition.not {
            return match self.evaluate_rule_at(not_rule, bundle, depth) {
                Ok(()) => Err(ValidationError::new(
                    ValidationErrorKind::OutputValidation,
                    format!("not condition passed for field {}", not_rule.field),
                )),
                Err(e) if e.kind == ValidationErrorKind::ContractStructure => Err(e),
                Err(_) => Ok(()),
            };
        }

        Ok(())
    }

    fn evaluate_transform(
        &self,
        transform: &TransformRule,
        rule: &ValidationRule,
        bundle: &TelemetryBundle,
    ) -> Result<(), ValidationError> {
        let target_path = transform
            .target
            .as_deref()
            .filter(|t| !t.is_empty())
            .unwrap_or(&rule.field);
        let source_path = transform
            .source
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(&rule.field);

        match transform.transform_type {
            TransformType::Add => {
                let target = extract_field(bundle, target_path);
                if target.is_null() {
                    return Err(ValidationError::new(
                        ValidationErrorKind::OutputValidation,
                        format!("expected field {target_path} to be added"),
                    )
                    .with_field(target_path));
                }
                if let Some(expected) = &transform.value {
                    if !target.loose_eq(expected) {
                        return Err(ValidationError::new(
                            ValidationErrorKind::OutputValidation,
                            format!("added field {target_path}: expected {expected}, got {target}"),
                        )
                        .with_field(target_path)
                        .with_expected(expected.clone())
                        .with_actual(target));
                    }
                }
                Ok(())
            }
            TransformType::Remove => {
                let source = extract_field(bundle, source_path);
                if !source.is_null() {
                    return Err(ValidationError::new(
                        ValidationErrorKind::OutputValidation,
                        format!("expected field {source_path} to be removed"),
                    )
                    .with_field(source_path)
                    .with_actual(source));
                }
                Ok(())
            }
            TransformType::Modify => {
                let target = extract_field(bundle, target_path);
                if let Some(expected) = &transform.value {
                    if !target.loose_eq(expected) {
                        return Err(ValidationError::new(
                            ValidationErrorKind::OutputValidation,
                            format!(
                                "modified field {target_path}: expected {expected}, got {target}"
                            ),
                        )
                        .with_field(target_path)
                        .with_expected(expected.clone())
                        .with_actual(target));
                    }
                }
                Ok(())
            }
            TransformType::Rename => {
                let source = extract_field(bundle, source_path);
                if !source.is_null() {
                    return Err(ValidationError::new(
                        ValidationErrorKind::OutputValidation,
                        format!("expected source field {source_path} to be removed after rename"),
                    )
                    .with_field(source_path));
                }
                let target = extract_field(bundle, target_path);
                if target.is_null() {
                    return Err(ValidationError::new(
                        ValidationErrorKind::OutputValidation,
                        format!("expected target field {target_path} to exist after rename"),
                    )
                    .with_field(target_path));
                }
                Ok(())
            }
        }
    }

    fn evaluate_temporal(
        &self,
        temporal: &TemporalRule,
        rule: &ValidationRule,
        bundle: &TelemetryBundle,
    ) -> Result<(), ValidationError> {
        let window = parse_duration(&temporal.window_size).map_err(|e| {
            ValidationError::new(
                ValidationErrorKind::ContractStructure,
                format!("invalid window size {}: {e}", temporal.window_size),
            )
        })?;

        let now = bundle.wall_time;
        let window_start = now - window;
        let timestamp = signal_timestamp(bundle, &rule.field);

        if timestamp < window_start || timestamp > now {
            return Err(ValidationError::new(
                ValidationErrorKind::TemporalOutOfWindow,
                format!(
                    "timestamp {} is outside window [{}, {}]",
                    timestamp.to_rfc3339(),
                    window_start.to_rfc3339(),
                    now.to_rfc3339()
                ),
            )
            .with_field(&rule.field));
        }

        if let (Some(threshold), Some(comparison)) = (&temporal.threshold, temporal.comparison) {
            let actual = extract_field(bundle, &rule.field);
            let actual_num = actual.to_numeric().ok_or_else(|| {
                ValidationError::new(
                    ValidationErrorKind::OutputValidation,
                    format!("field {}: value {actual} is not numeric", rule.field),
                )
                .with_field(&rule.field)
            })?;
            let threshold_num = threshold.to_numeric().ok_or_else(|| {
                ValidationError::new(
                    ValidationErrorKind::OutputValidation,
                    format!("temporal threshold {threshold} is not numeric"),
                )
            })?;

            if !compare_numeric(actual_num, threshold_num, comparison) {
                return Err(ValidationError::new(
                    ValidationErrorKind::OutputValidation,
                    format!(
                        "temporal validation failed: {actual_num} {} {threshold_num}",
                        comparison.as_str()
                    ),
                )
                .with_field(&rule.field));
            }
        }

        Ok(())
    }

    fn evaluate_basic(
        &self,
        rule: &ValidationRule,
        actual: &AttributeValue,
    ) -> Result<(), ValidationError> {
        let Some(operator) = rule.operator else {
            return Err(ValidationError::new(
                ValidationErrorKind::ContractStructure,
                format!("rule for field {} has no operator or qualifier", rule.field),
            ));
        };

        match operator {
            FilterOperator::Equals => {
                let expected = rule.value.clone().unwrap_or_default();
                if !actual.loose_eq(&expected) {
                    return Err(self.mismatch(rule, &expected, actual, "expected"));
                }
            }
            FilterOperator::NotEquals => {
                let expected = rule.value.clone().unwrap_or_default();
                if actual.loose_eq(&expected) {
                    return Err(self.mismatch(rule, &expected, actual, "should not equal"));
                }
            }
            FilterOperator::Matches => {
                let pattern = self.pattern_for(rule);
                if !self.matches_pattern(actual, &pattern)? {
                    return Err(ValidationError::new(
                        ValidationErrorKind::OutputValidation,
                        format!(
                            "field {}: value {actual} does not match pattern {pattern}",
                            rule.field
                        ),
                    )
                    .with_field(&rule.field)
                    .with_actual(actual.clone()));
                }
            }
            FilterOperator::NotMatches => {
                let pattern = self.pattern_for(rule);
                if self.matches_pattern(actual, &pattern)? {
                    return Err(ValidationError::new(
                        ValidationErrorKind::OutputValidation,
                        format!(
                            "field {}: value {actual} should not match pattern {pattern}",
                            rule.field
                        ),
                    )
                    .with_field(&rule.field)
                    .with_actual(actual.clone()));
                }
            }
            FilterOperator::Exists => {
                if actual.is_null() {
                    return Err(ValidationError::new(
                        ValidationErrorKind::OutputValidation,
                        format!("field {}: should exist", rule.field),
                    )
                    .with_field(&rule.field));
                }
            }
            FilterOperator::NotExists => {
                if !actual.is_null() {
                    return Err(ValidationError::new(
                        ValidationErrorKind::OutputValidation,
                        format!("field {}: should not exist", rule.field),
                    )
                    .with_field(&rule.field)
                    .with_actual(actual.clone()));
                }
            }
            FilterOperator::GreaterThan
            | FilterOperator::LessThan
            | FilterOperator::GreaterOrEqual
            | FilterOperator::LessOrEqual => {
                let expected = rule.value.clone().unwrap_or_default();
                let ordering = actual.partial_compare(&expected).ok_or_else(|| {
                    ValidationError::new(
                        ValidationErrorKind::OutputValidation,
                        format!(
                            "field {}: {actual} and {expected} are not comparable",
                            rule.field
                        ),
                    )
                    .with_field(&rule.field)
                })?;

                use std::cmp::Ordering;
                let holds = match operator {
                    FilterOperator::GreaterThan => ordering == Ordering::Greater,
                    FilterOperator::LessThan => ordering == Ordering::Less,
                    FilterOperator::GreaterOrEqual => ordering != Ordering::Less,
                    FilterOperator::LessOrEqual => ordering != Ordering::Greater,
                    _ => unreachable!(),
                };
                if !holds {
                    return Err(ValidationError::new(
                        ValidationErrorKind::OutputValidation,
                        format!(
                            "field {}: {actual} should be {} {expected}",
                            rule.field,
                            operator.as_str()
                        ),
                    )
                    .with_field(&rule.field)
                    .with_expected(expected.clone())
                    .with_actual(actual.clone()));
                }
            }
            FilterOperator::Contains => {
                if !self.string_relation(actual, rule, |a, b| a.contains(b)) {
                    return Err(self.string_failure(rule, actual, "should contain"));
                }
            }
            FilterOperator::NotContains => {
                if self.string_relation(actual, rule, |a, b| a.contains(b)) {
                    return Err(self.string_failure(rule, actual, "should not contain"));
                }
            }
            FilterOperator::StartsWith => {
                if !self.string_relation(actual, rule, |a, b| a.starts_with(b)) {
                    return Err(self.string_failure(rule, actual, "should start with"));
                }
            }
            FilterOperator::EndsWith => {
                if !self.string_relation(actual, rule, |a, b| a.ends_with(b)) {
                    return Err(self.string_failure(rule, actual, "should end with"));
                }
            }
            FilterOperator::InRange => {
                let range = rule.range.as_ref().ok_or_else(|| self.missing_range(rule))?;
                if !self.in_range(actual, range, rule)? {
                    return Err(ValidationError::new(
                        ValidationErrorKind::OutputValidation,
                        format!("field {}: {actual} not in range", rule.field),
                    )
                    .with_field(&rule.field)
                    .with_actual(actual.clone()));
                }
            }
            FilterOperator::NotInRange => {
                let range = rule.range.as_ref().ok_or_else(|| self.missing_range(rule))?;
                if self.in_range(actual, range, rule)? {
                    return Err(ValidationError::new(
                        ValidationErrorKind::OutputValidation,
                        format!("field {}: {actual} should not be in range", rule.field),
                    )
                    .with_field(&rule.field)
                    .with_actual(actual.clone()));
                }
            }
            FilterOperator::OneOf => {
                if !rule.values.iter().any(|v| actual.loose_eq(v)) {
                    return Err(ValidationError::new(
                        ValidationErrorKind::OutputValidation,
                        format!(
                            "field {}: {actual} should be one of {}",
                            rule.field,
                            AttributeValue::List(rule.values.clone())
                        ),
                    )
                    .with_field(&rule.field)
                    .with_actual(actual.clone()));
                }
            }
            FilterOperator::NotOneOf => {
                if rule.values.iter().any(|v| actual.loose_eq(v)) {
                    return Err(ValidationError::new(
                        ValidationErrorKind::OutputValidation,
                        format!(
                            "field {}: {actual} should not be one of {}",
                            rule.field,
                            AttributeValue::List(rule.values.clone())
                        ),
                    )
                    .with_field(&rule.field)
                    .with_actual(actual.clone()));
                }
            }
        }

        Ok(())
    }

    fn pattern_for(&self, rule: &ValidationRule) -> String {
        match &rule.pattern {
            Some(pattern) if !pattern.is_empty() => pattern.clone(),
            _ => rule
                .value
                .as_ref()
                .map(|v| v.to_string())
                .unwrap_or_default(),
        }
    }

    /// Check a value against a pattern; null never matches
    fn matches_pattern(
        &self,
        actual: &AttributeValue,
        pattern: &str,
    ) -> Result<bool, ValidationError> {
        let regex = self.compile_pattern(pattern)?;
        if actual.is_null() {
            return Ok(false);
        }
        Ok(regex.is_match(&actual.to_string()))
    }

    fn compile_pattern(&self, pattern: &str) -> Result<Arc<Regex>, ValidationError> {
        let mut cache = self
            .regex_cache
            .lock()
            .expect("regex cache lock poisoned");
        if let Some(compiled) = cache.get(pattern) {
            return Ok(Arc::clone(compiled));
        }

        let compiled = Regex::new(pattern).map_err(|e| {
            ValidationError::new(
                ValidationErrorKind::PatternInvalid,
                format!("invalid pattern {pattern}: {e}"),
            )
        })?;
        let compiled = Arc::new(compiled);
        cache.insert(pattern.to_string(), Arc::clone(&compiled));
        Ok(compiled)
    }

    fn string_relation(
        &self,
        actual: &AttributeValue,
        rule: &ValidationRule,
        relation: impl Fn(&str, &str) -> bool,
    ) -> bool {
        if actual.is_null() {
            return false;
        }
        let operand = rule
            .value
            .as_ref()
            .map(|v| v.to_string())
            .unwrap_or_default();
        relation(&actual.to_string(), &operand)
    }

    fn in_range(
        &self,
        actual: &AttributeValue,
        range: &ValueRange,
        rule: &ValidationRule,
    ) -> Result<bool, ValidationError> {
        let value = actual.to_numeric().ok_or_else(|| {
            ValidationError::new(
                ValidationErrorKind::RangeInvalid,
                format!("field {}: {actual} is not numeric", rule.field),
            )
            .with_field(&rule.field)
            .with_actual(actual.clone())
        })?;

        if let Some(min) = &range.min {
            let min = min.to_numeric().ok_or_else(|| {
                ValidationError::new(
                    ValidationErrorKind::RangeInvalid,
                    format!("field {}: range minimum {min} is not numeric", rule.field),
                )
                .with_field(&rule.field)
            })?;
            let inclusive = range.min_inclusive.unwrap_or(range.inclusive);
            if inclusive {
                if value < min {
                    return Ok(false);
                }
            } else if value <= min {
                return Ok(false);
            }
        }

        if let Some(max) = &range.max {
            let max = max.to_numeric().ok_or_else(|| {
                ValidationError::new(
                    ValidationErrorKind::RangeInvalid,
                    format!("field {}: range maximum {max} is not numeric", rule.field),
                )
                .with_field(&rule.field)
            })?;
            let inclusive = range.max_inclusive.unwrap_or(range.inclusive);
            if inclusive {
                if value > max {
                    return Ok(false);
                }
            } else if value >= max {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn missing_range(&self, rule: &ValidationRule) -> ValidationError {
        ValidationError::new(
            ValidationErrorKind::RangeInvalid,
            format!("field {}: range not specified for range operator", rule.field),
        )
        .with_field(&rule.field)
    }

    fn mismatch(
        &self,
        rule: &ValidationRule,
        expected: &AttributeValue,
        actual: &AttributeValue,
        verb: &str,
    ) -> ValidationError {
        ValidationError::new(
            ValidationErrorKind::OutputValidation,
            format!("field {}: {verb} {expected}, got {actual}", rule.field),
        )
        .with_field(&rule.field)
        .with_expected(expected.clone())
        .with_actual(actual.clone())
    }

    fn string_failure(
        &self,
        rule: &ValidationRule,
        actual: &AttributeValue,
        verb: &str,
    ) -> ValidationError {
        let operand = rule
            .value
            .as_ref()
            .map(|v| v.to_string())
            .unwrap_or_default();
        ValidationError::new(
            ValidationErrorKind::OutputValidation,
            format!("field {}: {actual} {verb} {operand}", rule.field),
        )
        .with_field(&rule.field)
        .with_actual(actual.clone())
    }

    #[cfg(test)]
    fn cached_pattern_count(&self) -> usize {
        self.regex_cache.lock().unwrap().len()
    }
}

/// Numeric comparison used by temporal thresholds
fn compare_numeric(a: f64, b: f64, operator: FilterOperator) -> bool {
    match operator {
        FilterOperator::Equals => (a - b).abs() < contrail_core::types::value::NUMERIC_TOLERANCE,
        FilterOperator::NotEquals => (a - b).abs() >= contrail_core::types::value::NUMERIC_TOLERANCE,
        FilterOperator::GreaterThan => a > b,
        FilterOperator::LessThan => a < b,
        FilterOperator::GreaterOrEqual => a >= b,
        FilterOperator::LessOrEqual => a <= b,
        _ => false,
    }
}

/// First timestamp of the signal a field path addresses
///
/// Falls back to the bundle's wall time when the signal carries no
/// items, which makes temporal windows trivially satisfied on empty
/// signals rather than spuriously failing.
fn signal_timestamp(
    bundle: &TelemetryBundle,
    field: &str,
) -> chrono::DateTime<chrono::Utc> {
    match field.split('.').next() {
        Some("span") => bundle
            .first_span()
            .map(|s| s.start_time)
            .unwrap_or(bundle.wall_time),
        Some("metric") => bundle
            .first_metric()
            .map(|m| m.timestamp)
            .unwrap_or(bundle.wall_time),
        Some("log") => bundle
            .first_log()
            .map(|l| l.timestamp)
            .unwrap_or(bundle.wall_time),
        _ => bundle.wall_time,
    }
}
