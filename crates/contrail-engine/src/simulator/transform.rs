//! SPDX-FileCopyrightText: © 2025 Cory Parent <goedelsoup+contrail@goedelsoup.io>
//! SPDX-License-Identifier: Apache-2.0
//!

//! Transform processor
//!
//! Synthesizes span names, metric names, and log bodies by joining the
//! string forms of configured attributes, and copies attributes across
//! paired source/target lists. An item whose source attributes are all
//! absent is left unchanged.

use tracing::debug;

use contrail_core::config::{AttributeCopyConfig, NameJoinConfig, TransformProcessorConfig};
use contrail_core::types::{AttributeValue, Attributes, TelemetryBundle};

/// Default separator for span and metric name synthesis
const DEFAULT_NAME_SEPARATOR: &str = " ";

/// Default separator for log body synthesis
const DEFAULT_BODY_SEPARATOR: &str = ": ";

/// Apply the configured transforms to the bundle
pub fn apply(config: &TransformProcessorConfig, bundle: &mut TelemetryBundle) {
    if let Some(join) = config
        .traces
        .as_ref()
        .and_then(|t| t.span.as_ref())
        .and_then(|s| s.name.as_ref())
    {
        for scope in &mut bundle.traces {
            for span in &mut scope.items {
                if let Some(name) = joined_name(join, &span.attributes, DEFAULT_NAME_SEPARATOR) {
                    debug!(old = %span.name, new = %name, "span name transform");
                    span.name = name;
                }
            }
        }
    }

    if let Some(join) = config.metrics.as_ref().and_then(|m| m.name.as_ref()) {
        for scope in &mut bundle.metrics {
            for point in &mut scope.items {
                if let Some(name) = joined_name(join, &point.attributes, DEFAULT_NAME_SEPARATOR) {
                    debug!(old = %point.name, new = %name, "metric name transform");
                    point.name = name;
                }
            }
        }
    }

    if let Some(join) = config.logs.as_ref().and_then(|l| l.body.as_ref()) {
        for scope in &mut bundle.logs {
            for record in &mut scope.items {
                if let Some(body) = joined_name(join, &record.attributes, DEFAULT_BODY_SEPARATOR) {
                    record.body = AttributeValue::Str(body);
                }
            }
        }
    }

    if let Some(copy) = &config.attributes {
        for scope in &mut bundle.traces {
            for span in &mut scope.items {
                copy_attributes(copy, &mut span.attributes);
            }
        }
        for scope in &mut bundle.metrics {
            for point in &mut scope.items {
                copy_attributes(copy, &mut point.attributes);
            }
        }
        for scope in &mut bundle.logs {
            for record in &mut scope.items {
                copy_attributes(copy, &mut record.attributes);
            }
        }
    }
}

/// Join the string forms of the configured attributes
///
/// Returns `None` when no configured attribute is present, leaving the
/// original name in place.
fn joined_name(
    join: &NameJoinConfig,
    attributes: &Attributes,
    default_separator: &str,
) -> Option<String> {
    if join.from_attributes.is_empty() {
        return None;
    }

    let parts: Vec<String> = join
        .from_attributes
        .iter()
        .filter_map(|name| attributes.get(name).map(|v| v.to_string()))
        .collect();

    if parts.is_empty() {
        return None;
    }

    let separator = join.separator.as_deref().unwrap_or(default_separator);
    Some(parts.join(separator))
}

/// Copy stringified values over paired from/to lists; the shorter
/// length prevails
fn copy_attributes(copy: &AttributeCopyConfig, attributes: &mut Attributes) {
    for (from, to) in copy.from_attributes.iter().zip(&copy.to_attributes) {
        if let Some(value) = attributes.get(from) {
            let copied = AttributeValue::Str(value.to_string());
            attributes.insert(to.clone(), copied);
        }
    }
}
