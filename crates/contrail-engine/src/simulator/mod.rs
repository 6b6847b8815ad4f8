//! SPDX-FileCopyrightText: © 2025 Cory Parent <goedelsoup+contrail@goedelsoup.io>
//! SPDX-License-Identifier: Apache-2.0
//!

//! In-process transformation simulator
//!
//! The simulator applies a configured chain of processors to a bundle.
//! Processors are pure functions of `(config, bundle)`; they have no
//! lifecycle because the simulator runs within a single test. The input
//! bundle is deep-cloned before the first processor runs, so callers
//! never observe mutation. Chains compose left-to-right and are applied
//! exactly once; no fixed-point iteration is performed.

pub mod attributes;
pub mod filter;
pub mod transform;

use tracing::debug;

use contrail_core::config::ProcessorConfig;
use contrail_core::contract::SignalType;
use contrail_core::types::TelemetryBundle;

/// An item a filter processor matched for removal
#[derive(Debug, Clone, PartialEq)]
pub struct DroppedItem {
    /// Signal the item belonged to
    pub signal: SignalType,

    /// Span name, metric name, or log body
    pub name: String,

    /// Whether the drop was enacted or only recorded
    pub enforced: bool,
}

/// Diagnostics produced while applying a processor chain
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimulationReport {
    /// Items matched by filter criteria
    pub dropped: Vec<DroppedItem>,
}

/// Simulator applying processor chains to bundles
#[derive(Debug, Default)]
pub struct PipelineSimulator;

impl PipelineSimulator {
    /// Create a new simulator
    pub fn new() -> Self {
        Self
    }

    /// Apply a processor chain to a bundle, producing the output bundle
    /// and the drop diagnostics
    pub fn apply_chain(
        &self,
        chain: &[ProcessorConfig],
        bundle: &TelemetryBundle,
    ) -> (TelemetryBundle, SimulationReport) {
        let mut output = bundle.clone();
        let mut report = SimulationReport::default();

        for processor in chain {
            debug!(kind = processor.kind(), "applying processor");
            match processor {
                ProcessorConfig::Attributes(config) => attributes::apply(config, &mut output),
                ProcessorConfig::Transform(config) => transform::apply(config, &mut output),
                ProcessorConfig::Filter(config) => {
                    report.dropped.extend(filter::apply(config, &mut output));
                }
            }
        }

        (output, report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, Utc};
    use contrail_core::config::CollectorConfig;
    use contrail_core::types::{AttributeValue, ResourceScope, Span};

    fn base_time() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn span_bundle(attrs: &[(&str, AttributeValue)]) -> TelemetryBundle {
        let mut span = Span::new("op", base_time(), base_time() + Duration::milliseconds(100));
        for (key, value) in attrs {
            span.attributes.insert(key.to_string(), value.clone());
        }
        let mut bundle = TelemetryBundle::new(base_time());
        bundle.traces.push(ResourceScope::new(vec![span]));
        bundle
    }

    #[test]
    fn test_chain_composes_left_to_right() {
        let config = CollectorConfig::from_yaml(
            r#"
processors:
  attributes:
    actions:
      - key: http.method
        value: GET
        action: insert
      - key: http.route
        value: /api/users
        action: insert
  transform:
    traces:
      span:
        name:
          from_attributes: [http.method, http.route]
service:
  pipelines:
    traces:
      processors: [attributes, transform]
"#,
        )
        .unwrap();
        let chain = config.processor_chain("traces").unwrap();

        let input = span_bundle(&[]);
        let (output, report) = PipelineSimulator::new().apply_chain(&chain, &input);

        // The attributes processor ran before the transform.
        assert_eq!(output.first_span().unwrap().name, "GET /api/users");
        assert!(report.dropped.is_empty());

        // Input is untouched.
        assert_eq!(input.first_span().unwrap().name, "op");
    }

    #[test]
    fn test_single_application_semantics() {
        let config = CollectorConfig::from_yaml(
            r#"
processors:
  attributes:
    actions:
      - key: environment
        value: production
        action: upsert
service:
  pipelines:
    traces:
      processors: [attributes]
"#,
        )
        .unwrap();
        let chain = config.processor_chain("traces").unwrap();

        let input = span_bundle(&[]);
        let (once, _) = PipelineSimulator::new().apply_chain(&chain, &input);
        let (twice, _) = PipelineSimulator::new().apply_chain(&chain, &once);

        // Re-applying an upsert-only chain to its own output is a no-op.
        assert_eq!(once, twice);
    }
}
