//! SPDX-FileCopyrightText: © 2025 Cory Parent <goedelsoup+contrail@goedelsoup.io>
//! SPDX-License-Identifier: Apache-2.0
//!

//! Attributes processor
//!
//! Applies an ordered list of attribute actions uniformly to every
//! span's attributes, every metric data point's attributes, and every
//! log record's attributes.

use tracing::debug;

use contrail_core::config::{AttributeAction, AttributeActionKind, AttributesProcessorConfig};
use contrail_core::types::{Attributes, TelemetryBundle};

/// Apply the configured actions to every item in the bundle
pub fn apply(config: &AttributesProcessorConfig, bundle: &mut TelemetryBundle) {
    for scope in &mut bundle.traces {
        for span in &mut scope.items {
            apply_actions(&config.actions, &mut span.attributes);
        }
    }
    for scope in &mut bundle.metrics {
        for point in &mut scope.items {
            apply_actions(&config.actions, &mut point.attributes);
        }
    }
    for scope in &mut bundle.logs {
        for record in &mut scope.items {
            apply_actions(&config.actions, &mut record.attributes);
        }
    }
}

fn apply_actions(actions: &[AttributeAction], attributes: &mut Attributes) {
    for action in actions {
        match action.action {
            AttributeActionKind::Insert => {
                if !attributes.contains_key(&action.key) {
                    set_value(action, attributes);
                }
            }
            AttributeActionKind::Update => {
                if attributes.contains_key(&action.key) {
                    set_value(action, attributes);
                }
            }
            AttributeActionKind::Upsert => set_value(action, attributes),
            AttributeActionKind::Delete => {
                attributes.remove(&action.key);
            }
        }
    }
}

fn set_value(action: &AttributeAction, attributes: &mut Attributes) {
    let Some(value) = &action.value else {
        debug!(key = %action.key, "attribute action has no value, skipping");
        return;
    };
    attributes.insert(action.key.clone(), value.clone());
}
