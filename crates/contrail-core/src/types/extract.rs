//! SPDX-FileCopyrightText: © 2025 Cory Parent <goedelsoup+contrail@goedelsoup.io>
//! SPDX-License-Identifier: Apache-2.0
//!

//! Field-path extraction over telemetry bundles
//!
//! The extractor interprets dot-separated paths with a fixed head
//! grammar: the first segment names the signal (`span`, `metric`, or
//! `log`), the remaining segments address sub-fields. "First" always
//! means index 0 of the first resource/scope/item sequence; validations
//! that quantify over items iterate explicitly instead of going through
//! this module. Missing paths resolve to [`AttributeValue::Null`],
//! never an error.

use crate::utils::time::format_duration;

use super::telemetry::{MetricValue, TelemetryBundle};
use super::value::{AttributeValue, Attributes};

/// Extract a field value from a bundle by dot-separated path
pub fn extract_field(bundle: &TelemetryBundle, path: &str) -> AttributeValue {
    let segments: Vec<&str> = path.split('.').collect();
    let Some((head, rest)) = segments.split_first() else {
        return AttributeValue::Null;
    };

    match *head {
        "span" => extract_span_field(bundle, rest),
        "metric" => extract_metric_field(bundle, rest),
        "log" => extract_log_field(bundle, rest),
        _ => AttributeValue::Null,
    }
}

fn extract_span_field(bundle: &TelemetryBundle, segments: &[&str]) -> AttributeValue {
    let Some(span) = bundle.first_span() else {
        return AttributeValue::Null;
    };
    let Some((field, rest)) = segments.split_first() else {
        return AttributeValue::Null;
    };

    match *field {
        "name" if rest.is_empty() => AttributeValue::Str(span.name.clone()),
        // `span.service` and `span.service.name` both resolve the
        // `service.name` resource attribute.
        "service" if rest.is_empty() || rest == ["name"] => bundle
            .first_trace_resource()
            .and_then(|resource| resource.get("service.name"))
            .cloned()
            .unwrap_or(AttributeValue::Null),
        "duration" if rest.is_empty() => AttributeValue::Str(format_duration(span.duration())),
        "status" if rest.is_empty() => AttributeValue::Str(span.status.code.as_str().to_string()),
        "attributes" => lookup_attribute(&span.attributes, rest),
        _ => AttributeValue::Null,
    }
}

fn extract_metric_field(bundle: &TelemetryBundle, segments: &[&str]) -> AttributeValue {
    let Some(metric) = bundle.first_metric() else {
        return AttributeValue::Null;
    };
    let Some((field, rest)) = segments.split_first() else {
        return AttributeValue::Null;
    };

    match *field {
        "name" if rest.is_empty() => AttributeValue::Str(metric.name.clone()),
        "type" if rest.is_empty() => AttributeValue::Str(metric.kind.as_str().to_string()),
        "value" if rest.is_empty() => match &metric.value {
            MetricValue::Int(i) => AttributeValue::Int(*i),
            MetricValue::Double(d) => AttributeValue::Double(*d),
            MetricValue::Histogram(_) => AttributeValue::Null,
        },
        "labels" => lookup_attribute(&metric.attributes, rest),
        _ => AttributeValue::Null,
    }
}

fn extract_log_field(bundle: &TelemetryBundle, segments: &[&str]) -> AttributeValue {
    let Some(record) = bundle.first_log() else {
        return AttributeValue::Null;
    };
    let Some((field, rest)) = segments.split_first() else {
        return AttributeValue::Null;
    };

    match *field {
        "body" if rest.is_empty() => record.body.clone(),
        "severity" if rest.is_empty() => AttributeValue::Str(record.severity_text.clone()),
        "timestamp" if rest.is_empty() => {
            AttributeValue::Str(record.timestamp.to_rfc3339())
        }
        "attributes" => lookup_attribute(&record.attributes, rest),
        _ => AttributeValue::Null,
    }
}

/// Resolve the remaining path segments against an attribute map
///
/// Attribute keys commonly contain dots themselves (`http.method`), so
/// the joined remainder is tried as a flat key first. Failing that, the
/// segments are split at every prefix boundary looking for a nested map
/// to descend into.
fn lookup_attribute(attributes: &Attributes, segments: &[&str]) -> AttributeValue {
    if segments.is_empty() {
        return AttributeValue::Null;
    }

    let flat_key = segments.join(".");
    if let Some(value) = attributes.get(&flat_key) {
        return value.clone();
    }

    for split in 1..segments.len() {
        let key = segments[..split].join(".");
        if let Some(AttributeValue::Map(nested)) = attributes.get(&key) {
            let value = lookup_attribute(nested, &segments[split..]);
            if !value.is_null() {
                return value;
            }
        }
    }

    AttributeValue::Null
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::telemetry::{
        LogRecord, MetricKind, MetricPoint, ResourceScope, Span, StatusCode,
    };
    use chrono::{DateTime, Duration, Utc};
    use std::collections::BTreeMap;

    fn base_time() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn sample_bundle() -> TelemetryBundle {
        let mut bundle = TelemetryBundle::new(base_time());

        let span = Span::new(
            "GET /api/users",
            base_time(),
            base_time() + Duration::milliseconds(100),
        )
        .with_attribute("http.method", AttributeValue::from("GET"))
        .with_attribute("http.status_code", AttributeValue::Int(200));
        bundle.traces.push(
            ResourceScope::new(vec![span])
                .with_resource_attribute("service.name", AttributeValue::from("auth")),
        );

        let metric = MetricPoint::gauge("request_count", MetricValue::Double(42.0), base_time())
            .with_attribute("region", AttributeValue::from("us-east-1"));
        bundle.metrics.push(ResourceScope::new(vec![metric]));

        let log = LogRecord::new("request handled", base_time())
            .with_severity("INFO")
            .with_attribute("logger", AttributeValue::from("http"));
        bundle.logs.push(ResourceScope::new(vec![log]));

        bundle
    }

    #[test]
    fn test_span_paths() {
        let bundle = sample_bundle();

        assert_eq!(
            extract_field(&bundle, "span.name"),
            AttributeValue::from("GET /api/users")
        );
        assert_eq!(
            extract_field(&bundle, "span.service"),
            AttributeValue::from("auth")
        );
        assert_eq!(
            extract_field(&bundle, "span.service.name"),
            AttributeValue::from("auth")
        );
        assert_eq!(
            extract_field(&bundle, "span.status"),
            AttributeValue::from(StatusCode::Unset.as_str())
        );
        assert_eq!(
            extract_field(&bundle, "span.duration"),
            AttributeValue::from("100ms")
        );
    }

    #[test]
    fn test_span_attributes_with_dotted_keys() {
        let bundle = sample_bundle();

        assert_eq!(
            extract_field(&bundle, "span.attributes.http.method"),
            AttributeValue::from("GET")
        );
        assert_eq!(
            extract_field(&bundle, "span.attributes.http.status_code"),
            AttributeValue::Int(200)
        );
    }

    #[test]
    fn test_nested_map_attributes() {
        let mut bundle = sample_bundle();
        let mut inner = BTreeMap::new();
        inner.insert("card".to_string(), AttributeValue::from("visa"));
        bundle.traces[0].items[0]
            .attributes
            .insert("payment".to_string(), AttributeValue::Map(inner));

        assert_eq!(
            extract_field(&bundle, "span.attributes.payment.card"),
            AttributeValue::from("visa")
        );
    }

    #[test]
    fn test_metric_paths() {
        let bundle = sample_bundle();

        assert_eq!(
            extract_field(&bundle, "metric.name"),
            AttributeValue::from("request_count")
        );
        assert_eq!(
            extract_field(&bundle, "metric.type"),
            AttributeValue::from(MetricKind::Gauge.as_str())
        );
        assert_eq!(
            extract_field(&bundle, "metric.value"),
            AttributeValue::Double(42.0)
        );
        assert_eq!(
            extract_field(&bundle, "metric.labels.region"),
            AttributeValue::from("us-east-1")
        );
    }

    #[test]
    fn test_log_paths() {
        let bundle = sample_bundle();

        assert_eq!(
            extract_field(&bundle, "log.body"),
            AttributeValue::from("request handled")
        );
        assert_eq!(
            extract_field(&bundle, "log.severity"),
            AttributeValue::from("INFO")
        );
        assert_eq!(
            extract_field(&bundle, "log.attributes.logger"),
            AttributeValue::from("http")
        );
    }

    #[test]
    fn test_missing_paths_resolve_to_null() {
        let bundle = sample_bundle();

        assert!(extract_field(&bundle, "span.attributes.payment.cvv").is_null());
        assert!(extract_field(&bundle, "span.nope").is_null());
        assert!(extract_field(&bundle, "resource.name").is_null());
        assert!(extract_field(&TelemetryBundle::new(base_time()), "span.name").is_null());
    }
}
