//! SPDX-FileCopyrightText: © 2025 Cory Parent <goedelsoup+contrail@goedelsoup.io>
//! SPDX-License-Identifier: Apache-2.0
//!

//! Filter processor
//!
//! Evaluates include/exclude criteria per signal: a matching include
//! keeps an item, a matching exclude drops it. Every matched drop is
//! reported as a diagnostic; whether the drop is enacted is governed by
//! the configuration's `enforce` flag.

use std::collections::HashMap;

use regex::Regex;
use tracing::warn;

use contrail_core::config::{FilterCriteria, FilterProcessorConfig, MatchType};
use contrail_core::contract::SignalType;
use contrail_core::types::{AttributeValue, Attributes, TelemetryBundle};

use super::DroppedItem;

/// Apply the filter criteria to the bundle, returning the matched drops
pub fn apply(config: &FilterProcessorConfig, bundle: &mut TelemetryBundle) -> Vec<DroppedItem> {
    let mut matcher = CriteriaMatcher::default();
    let mut dropped = Vec::new();

    for scope in &mut bundle.traces {
        let service = scope
            .resource
            .get("service.name")
            .map(|v| v.to_string())
            .unwrap_or_default();
        let mut kept = Vec::with_capacity(scope.items.len());
        for span in scope.items.drain(..) {
            let matched = matcher.span_dropped(config, &span.name, &service, &span.attributes);
            if matched {
                dropped.push(DroppedItem {
                    signal: SignalType::Traces,
                    name: span.name.clone(),
                    enforced: config.enforce,
                });
            }
            if !matched || !config.enforce {
                kept.push(span);
            }
        }
        scope.items = kept;
    }

    for scope in &mut bundle.metrics {
        let mut kept = Vec::with_capacity(scope.items.len());
        for point in scope.items.drain(..) {
            let matched = matcher.metric_dropped(config, &point.name, &point.attributes);
            if matched {
                dropped.push(DroppedItem {
                    signal: SignalType::Metrics,
                    name: point.name.clone(),
                    enforced: config.enforce,
                });
            }
            if !matched || !config.enforce {
                kept.push(point);
            }
        }
        scope.items = kept;
    }

    for scope in &mut bundle.logs {
        let mut kept = Vec::with_capacity(scope.items.len());
        for record in scope.items.drain(..) {
            let body = record.body.to_string();
            let matched = matcher.log_dropped(config, &body, &record.attributes);
            if matched {
                dropped.push(DroppedItem {
                    signal: SignalType::Logs,
                    name: body,
                    enforced: config.enforce,
                });
            }
            if !matched || !config.enforce {
                kept.push(record);
            }
        }
        scope.items = kept;
    }

    // Groupings emptied by enforcement are pruned so first-item
    // extraction keeps addressing real data.
    if config.enforce {
        bundle.traces.retain(|scope| !scope.items.is_empty());
        bundle.metrics.retain(|scope| !scope.items.is_empty());
        bundle.logs.retain(|scope| !scope.items.is_empty());
    }

    dropped
}

/// Per-invocation matcher with a local compiled-pattern cache
#[derive(Default)]
struct CriteriaMatcher {
    patterns: HashMap<String, Option<Regex>>,
}

impl CriteriaMatcher {
    fn span_dropped(
        &mut self,
        config: &FilterProcessorConfig,
        name: &str,
        service: &str,
        attributes: &Attributes,
    ) -> bool {
        self.dropped(config, |matcher, criteria| {
            matcher.matches_names(&criteria.span_names, name, criteria.match_type)
                || matcher.matches_names(&criteria.services, service, criteria.match_type)
                || matcher.matches_attributes(criteria, attributes)
        })
    }

    fn metric_dropped(
        &mut self,
        config: &FilterProcessorConfig,
        name: &str,
        attributes: &Attributes,
    ) -> bool {
        self.dropped(config, |matcher, criteria| {
            matcher.matches_names(&criteria.metric_names, name, criteria.match_type)
                || matcher.matches_attributes(criteria, attributes)
        })
    }

    fn log_dropped(
        &mut self,
        config: &FilterProcessorConfig,
        body: &str,
        attributes: &Attributes,
    ) -> bool {
        self.dropped(config, |matcher, criteria| {
            matcher.matches_names(&criteria.log_bodies, body, criteria.match_type)
                || matcher.matches_attributes(criteria, attributes)
        })
    }

    /// An item is dropped when a non-empty include does not match it,
    /// or when the exclude matches it.
    fn dropped(
        &mut self,
        config: &FilterProcessorConfig,
        matches: impl Fn(&mut Self, &FilterCriteria) -> bool,
    ) -> bool {
        if let Some(include) = &config.include {
            if !include.is_empty() && !matches(self, include) {
                return true;
            }
        }
        if let Some(exclude) = &config.exclude {
            if !exclude.is_empty() && matches(self, exclude) {
                return true;
            }
        }
        false
    }

    fn matches_names(&mut self, candidates: &[String], value: &str, match_type: MatchType) -> bool {
        candidates
            .iter()
            .any(|candidate| self.matches_value(candidate, value, match_type))
    }

    fn matches_attributes(&mut self, criteria: &FilterCriteria, attributes: &Attributes) -> bool {
        criteria.attributes.iter().any(|expectation| {
            attributes
                .get(&expectation.key)
                .map(|actual| {
                    self.matches_value(
                        &expectation.value,
                        &attribute_text(actual),
                        criteria.match_type,
                    )
                })
                .unwrap_or(false)
        })
    }

    fn matches_value(&mut self, candidate: &str, value: &str, match_type: MatchType) -> bool {
        match match_type {
            MatchType::Exact => candidate == value,
            MatchType::Regexp => {
                let compiled = self
                    .patterns
                    .entry(candidate.to_string())
                    .or_insert_with(|| match Regex::new(candidate) {
                        Ok(re) => Some(re),
                        Err(e) => {
                            warn!(pattern = %candidate, error = %e, "invalid filter pattern");
                            None
                        }
                    });
                compiled.as_ref().map(|re| re.is_match(value)).unwrap_or(false)
            }
        }
    }
}

fn attribute_text(value: &AttributeValue) -> String {
    value.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, Utc};
    use contrail_core::config::AttributeMatch;
    use contrail_core::types::{LogRecord, MetricPoint, MetricValue, ResourceScope, Span};

    fn base_time() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn sample_bundle() -> TelemetryBundle {
        let mut bundle = TelemetryBundle::new(base_time());
        let mk_span = |name: &str, status: i64| {
            Span::new(name, base_time(), base_time() + Duration::milliseconds(100))
                .with_attribute("http.status_code", AttributeValue::Int(status))
        };
        bundle.traces.push(
            ResourceScope::new(vec![mk_span("GET /health", 200), mk_span("GET /users", 500)])
                .with_resource_attribute("service.name", AttributeValue::from("auth")),
        );
        bundle.metrics.push(ResourceScope::new(vec![
            MetricPoint::gauge("internal_debug", MetricValue::Int(1), base_time()),
            MetricPoint::gauge("requests_total", MetricValue::Int(2), base_time()),
        ]));
        bundle.logs.push(ResourceScope::new(vec![
            LogRecord::new("heartbeat", base_time()),
            LogRecord::new("payment failed", base_time()),
        ]));
        bundle
    }

    #[test]
    fn test_exclude_by_span_name_regexp() {
        let mut bundle = sample_bundle();
        let config = FilterProcessorConfig {
            include: None,
            exclude: Some(FilterCriteria {
                match_type: MatchType::Regexp,
                span_names: vec!["^GET /health$".to_string()],
                ..Default::default()
            }),
            enforce: true,
        };

        let dropped = apply(&config, &mut bundle);
        assert_eq!(dropped.len(), 1);
        assert_eq!(dropped[0].name, "GET /health");
        assert!(dropped[0].enforced);
        assert_eq!(bundle.span_count(), 1);
        assert_eq!(bundle.first_span().unwrap().name, "GET /users");
    }

    #[test]
    fn test_include_keeps_only_matches() {
        let mut bundle = sample_bundle();
        let config = FilterProcessorConfig {
            include: Some(FilterCriteria {
                match_type: MatchType::Exact,
                metric_names: vec!["requests_total".to_string()],
                ..Default::default()
            }),
            exclude: None,
            enforce: true,
        };

        let dropped = apply(&config, &mut bundle);
        // Everything that fails the include is dropped, across signals.
        assert!(dropped.iter().any(|d| d.name == "internal_debug"));
        assert_eq!(bundle.metric_count(), 1);
        assert_eq!(bundle.first_metric().unwrap().name, "requests_total");
    }

    #[test]
    fn test_diagnostic_only_mode_keeps_items() {
        let mut bundle = sample_bundle();
        let config = FilterProcessorConfig {
            include: None,
            exclude: Some(FilterCriteria {
                match_type: MatchType::Exact,
                log_bodies: vec!["heartbeat".to_string()],
                ..Default::default()
            }),
            enforce: false,
        };

        let dropped = apply(&config, &mut bundle);
        assert_eq!(dropped.len(), 1);
        assert!(!dropped[0].enforced);
        // Nothing was actually removed.
        assert_eq!(bundle.log_count(), 2);
    }

    #[test]
    fn test_exclude_by_attribute_pattern() {
        let mut bundle = sample_bundle();
        let config = FilterProcessorConfig {
            include: None,
            exclude: Some(FilterCriteria {
                match_type: MatchType::Regexp,
                attributes: vec![AttributeMatch {
                    key: "http.status_code".to_string(),
                    value: "5..".to_string(),
                }],
                ..Default::default()
            }),
            enforce: true,
        };

        apply(&config, &mut bundle);
        assert_eq!(bundle.span_count(), 1);
        assert_eq!(bundle.first_span().unwrap().name, "GET /health");
    }

    #[test]
    fn test_invalid_pattern_never_matches() {
        let mut bundle = sample_bundle();
        let config = FilterProcessorConfig {
            include: None,
            exclude: Some(FilterCriteria {
                match_type: MatchType::Regexp,
                span_names: vec!["([".to_string()],
                ..Default::default()
            }),
            enforce: true,
        };

        let dropped = apply(&config, &mut bundle);
        assert!(dropped.is_empty());
        assert_eq!(bundle.span_count(), 2);
    }
}
