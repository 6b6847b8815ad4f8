//! SPDX-FileCopyrightText: © 2025 Cory Parent <goedelsoup+contrail@goedelsoup.io>
//! SPDX-License-Identifier: Apache-2.0
//!

//! Input bundle generation from contract samples
//!
//! The generator materializes a [`TelemetryBundle`] from a contract's
//! declared inputs. Generation is deterministic under a fixed clock
//! except for trace and span identifiers, which are cryptographically
//! random by default; fixtures pin them through the seedable strategy.

use std::sync::{Arc, Mutex};

use chrono::Duration;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use tracing::debug;

use contrail_core::contract::{Contract, LogInput, MetricInput, TraceInput};
use contrail_core::types::{
    AttributeValue, HistogramValue, LogRecord, MetricKind, MetricPoint, MetricValue,
    ResourceScope, Span, SpanKind, SumTemporality, TelemetryBundle,
};
use contrail_core::utils::time::Clock;

/// Default span duration applied to generated spans
const DEFAULT_SPAN_DURATION_MS: i64 = 100;

/// Contract input generator
pub struct Generator {
    clock: Arc<dyn Clock>,
    rng: Mutex<StdRng>,
}

impl Generator {
    /// Create a generator with random identifiers
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Create a generator with a pinned identifier seed
    pub fn with_seed(clock: Arc<dyn Clock>, seed: u64) -> Self {
        Self {
            clock,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Generate a bundle from a contract's inputs
    pub fn generate(&self, contract: &Contract) -> TelemetryBundle {
        let base_time = self.clock.now();
        let mut bundle = TelemetryBundle::new(base_time);

        for input in &contract.inputs.traces {
            bundle.traces.push(self.generate_trace(input, base_time));
        }
        for input in &contract.inputs.metrics {
            bundle.metrics.push(self.generate_metric(input, base_time));
        }
        for input in &contract.inputs.logs {
            bundle.logs.push(self.generate_log(input, base_time));
        }

        debug!(
            contract = %contract.reference(),
            spans = bundle.span_count(),
            metrics = bundle.metric_count(),
            logs = bundle.log_count(),
            "generated input bundle"
        );
        bundle
    }

    fn generate_trace(
        &self,
        input: &TraceInput,
        base_time: chrono::DateTime<chrono::Utc>,
    ) -> ResourceScope<Span> {
        let mut span = Span::new(
            &input.span_name,
            base_time,
            base_time + Duration::milliseconds(DEFAULT_SPAN_DURATION_MS),
        )
        .with_kind(SpanKind::Server);

        span.trace_id = self.random_hex(16);
        span.span_id = self.random_hex(8);
        if input.parent_span.is_some() {
            span.parent_span_id = Some(self.random_hex(8));
        }
        for (key, value) in &input.attributes {
            span.attributes.insert(key.clone(), value.clone());
        }

        let mut scope = ResourceScope::new(vec![span]);
        if let Some(service) = &input.service_name {
            scope = scope
                .with_resource_attribute("service.name", AttributeValue::from(service.as_str()));
        }
        scope
    }

    fn generate_metric(
        &self,
        input: &MetricInput,
        base_time: chrono::DateTime<chrono::Utc>,
    ) -> ResourceScope<MetricPoint> {
        let metric_type = input
            .metric_type
            .as_deref()
            .unwrap_or("counter")
            .to_ascii_lowercase();

        let (kind, value) = match metric_type.as_str() {
            "gauge" => (MetricKind::Gauge, numeric_value(&input.value)),
            "histogram" => {
                let observation = input.value.to_numeric().unwrap_or(0.0);
                (
                    MetricKind::Histogram,
                    MetricValue::Histogram(HistogramValue {
                        count: 1,
                        sum: observation,
                        min: Some(observation),
                        max: Some(observation),
                        bucket_bounds: Vec::new(),
                        bucket_counts: Vec::new(),
                    }),
                )
            }
            // Counters become monotonic cumulative sums.
            _ => (
                MetricKind::Sum {
                    monotonic: true,
                    temporality: SumTemporality::Cumulative,
                },
                numeric_value(&input.value),
            ),
        };

        let mut point = MetricPoint {
            name: input.name.clone(),
            kind,
            value,
            attributes: Default::default(),
            timestamp: base_time,
        };
        for (key, value) in &input.labels {
            point.attributes.insert(key.clone(), value.clone());
        }

        ResourceScope::new(vec![point])
    }

    fn generate_log(
        &self,
        input: &LogInput,
        base_time: chrono::DateTime<chrono::Utc>,
    ) -> ResourceScope<LogRecord> {
        let mut record = LogRecord::new(&input.body, base_time);
        if let Some(severity) = &input.severity {
            record = record.with_severity(severity);
        }
        for (key, value) in &input.attributes {
            record.attributes.insert(key.clone(), value.clone());
        }
        record.trace_id = self.random_hex(16);
        record.span_id = self.random_hex(8);

        ResourceScope::new(vec![record])
    }

    fn random_hex(&self, bytes: usize) -> String {
        let mut buf = vec![0u8; bytes];
        self.rng
            .lock()
            .expect("generator rng lock poisoned")
            .fill_bytes(&mut buf);
        buf.iter().map(|b| format!("{b:02x}")).collect()
    }
}

/// Coerce a contract input value into a metric point value
///
/// Numeric strings are parsed; anything non-numeric degrades to zero,
/// mirroring the generator's permissive input handling.
fn numeric_value(value: &AttributeValue) -> MetricValue {
    match value {
        AttributeValue::Int(i) => MetricValue::Int(*i),
        AttributeValue::Double(d) => MetricValue::Double(*d),
        other => MetricValue::Double(other.to_numeric().unwrap_or(0.0)),
    }
}
