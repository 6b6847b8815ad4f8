//! SPDX-FileCopyrightText: © 2025 Cory Parent <goedelsoup+contrail@goedelsoup.io>
//! SPDX-License-Identifier: Apache-2.0
//!

//! End-to-end scenarios driving contracts through generation,
//! simulation, and validation.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use contrail_core::config::CollectorConfig;
use contrail_core::contract::{Contract, PipelineInfo, PipelineSelectorService};
use contrail_core::types::AttributeValue;
use contrail_core::utils::time::FixedClock;
use contrail_engine::{
    CancellationToken, ContractValidator, Generator, TestHarness, TestResults,
};

fn base_time() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap()
}

fn clock() -> Arc<FixedClock> {
    Arc::new(FixedClock::new(base_time()))
}

fn harness_with(config: &str, pipelines: Vec<PipelineInfo>) -> TestHarness {
    let mut selector = PipelineSelectorService::new();
    selector.register_all(pipelines);

    TestHarness::new(
        clock(),
        Arc::new(selector),
        Arc::new(CollectorConfig::from_yaml(config).unwrap()),
        Arc::new(Generator::with_seed(clock(), 1)),
        Arc::new(ContractValidator::new(clock())),
    )
}

async fn run_one(harness: &TestHarness, doc: &str) -> TestResults {
    let contract: Contract = serde_yaml::from_str(doc).unwrap();
    harness
        .run_tests(&[contract], &CancellationToken::new())
        .await
        .unwrap()
}

#[tokio::test]
async fn span_rename_via_transform_processor() {
    let harness = harness_with(
        r#"
processors:
  transform:
    traces:
      span:
        name:
          from_attributes: [http.method, http.route]
service:
  pipelines:
    traces:
      processors: [transform]
"#,
        vec![PipelineInfo::new("traces").with_type("trace")],
    );

    let results = run_one(
        &harness,
        r#"
publisher: api-team
version: "1.0.0"
pipeline: traces
inputs:
  traces:
    - span_name: original
      attributes:
        http.method: GET
        http.route: /api/users
matchers:
  traces:
    - span_name: "GET /api/users"
"#,
    )
    .await;

    assert_eq!(results.passed, 1, "results: {:?}", results.results[0].errors);
    let output = results.results[0].output.as_ref().unwrap();
    assert_eq!(output.first_span().unwrap().name, "GET /api/users");
}

#[tokio::test]
async fn attributes_insert_on_empty_input() {
    let harness = harness_with(
        r#"
processors:
  attributes:
    actions:
      - key: environment
        value: production
        action: insert
      - key: service.name
        value: waveform
        action: insert
service:
  pipelines:
    traces:
      processors: [attributes]
"#,
        vec![PipelineInfo::new("traces").with_type("trace")],
    );

    let results = run_one(
        &harness,
        r#"
publisher: platform-team
version: "2.0.0"
pipeline: traces
inputs:
  traces:
    - span_name: op
matchers:
  traces:
    - attributes:
        environment: production
        service.name: waveform
"#,
    )
    .await;

    assert_eq!(results.passed, 1, "results: {:?}", results.results[0].errors);
    let span = results.results[0]
        .output
        .as_ref()
        .unwrap()
        .first_span()
        .unwrap();
    assert_eq!(
        span.attributes.get("environment"),
        Some(&AttributeValue::from("production"))
    );
    assert_eq!(
        span.attributes.get("service.name"),
        Some(&AttributeValue::from("waveform"))
    );
}

#[tokio::test]
async fn conditional_cvv_rule_fails_on_missing_field() {
    let harness = harness_with(
        r#"
processors:
  attributes:
    actions: []
service:
  pipelines:
    traces:
      processors: [attributes]
"#,
        vec![PipelineInfo::new("traces")],
    );

    let results = run_one(
        &harness,
        r#"
publisher: payments-team
version: "1.0.0"
pipeline: traces
inputs:
  traces:
    - span_name: charge
      attributes:
        payment.method: credit_card
validation_rules:
  - field: ""
    condition:
      if:
        field: span.attributes.payment.method
        operator: equals
        value: credit_card
      then:
        field: span.attributes.payment.cvv
        operator: matches
        pattern: "^[0-9]{3,4}$"
matchers:
  traces:
    - span_name: charge
"#,
    )
    .await;

    assert_eq!(results.failed, 1);
    let errors = &results.results[0].errors;
    assert!(errors
        .iter()
        .any(|e| e.kind == contrail_core::contract::ValidationErrorKind::OutputValidation));
}

#[tokio::test]
async fn amount_in_range_passes() {
    let harness = harness_with(
        r#"
processors:
  attributes:
    actions: []
service:
  pipelines:
    traces:
      processors: [attributes]
"#,
        vec![PipelineInfo::new("traces")],
    );

    let results = run_one(
        &harness,
        r#"
publisher: payments-team
version: "1.0.0"
pipeline: traces
inputs:
  traces:
    - span_name: charge
      attributes:
        payment.amount: 299.99
validation_rules:
  - field: span.attributes.payment.amount
    operator: in_range
    range:
      min: 0.01
      max: 10000.00
      inclusive: true
matchers:
  traces:
    - span_name: charge
"#,
    )
    .await;

    assert_eq!(results.passed, 1, "results: {:?}", results.results[0].errors);
}

#[tokio::test]
async fn selectors_resolve_registered_pipeline() {
    let harness = harness_with(
        r#"
processors:
  attributes:
    actions: []
service:
  pipelines:
    trace-auth-prod:
      processors: [attributes]
"#,
        vec![
            PipelineInfo::new("trace-auth-staging")
                .with_type("trace")
                .with_tag("environment", "staging"),
            PipelineInfo::new("trace-auth-prod")
                .with_type("trace")
                .with_tag("environment", "production"),
        ],
    );

    let results = run_one(
        &harness,
        r#"
publisher: auth-team
version: "1.0.0"
pipeline_selectors:
  selectors:
    - field: type
      operator: equals
      value: trace
    - field: tags.environment
      operator: equals
      value: production
inputs:
  traces:
    - span_name: login
matchers:
  traces:
    - span_name: login
"#,
    )
    .await;

    assert_eq!(results.passed, 1, "results: {:?}", results.results[0].errors);
}

#[tokio::test]
async fn unsatisfied_filter_skips_validation() {
    let harness = harness_with(
        r#"
processors:
  attributes:
    actions: []
service:
  pipelines:
    traces:
      processors: [attributes]
"#,
        vec![PipelineInfo::new("traces")],
    );

    let results = run_one(
        &harness,
        r#"
publisher: billing-team
version: "1.0.0"
pipeline: traces
inputs:
  traces:
    - span_name: op
      service_name: auth
filters:
  - field: span.service.name
    operator: equals
    value: billing
matchers:
  traces:
    - span_name: this-would-fail
"#,
    )
    .await;

    let result = &results.results[0];
    assert!(result.valid);
    assert!(result.skipped);
    assert!(result.errors.is_empty());
    assert!(result
        .warnings
        .iter()
        .any(|w| w == "skipped: filter not satisfied"));
}

#[tokio::test]
async fn results_are_deterministic_under_fixed_clock_and_seed() {
    let config = r#"
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
"#;
    let doc = r#"
publisher: api-team
version: "1.0.0"
pipeline: traces
inputs:
  traces:
    - span_name: op
      service_name: auth
matchers:
  traces:
    - span_name: op
      attributes:
        environment: production
"#;

    let first = run_one(
        &harness_with(config, vec![PipelineInfo::new("traces")]),
        doc,
    )
    .await;
    let second = run_one(
        &harness_with(config, vec![PipelineInfo::new("traces")]),
        doc,
    )
    .await;

    assert_eq!(first, second);
}

#[tokio::test]
async fn filter_processor_drop_is_reported() {
    let harness = harness_with(
        r#"
processors:
  filter:
    exclude:
      match_type: regexp
      span_names: ["^internal.*"]
service:
  pipelines:
    traces:
      processors: [filter]
"#,
        vec![PipelineInfo::new("traces")],
    );

    let results = run_one(
        &harness,
        r#"
publisher: infra-team
version: "1.0.0"
pipeline: traces
inputs:
  traces:
    - span_name: internal.heartbeat
    - span_name: "GET /api"
matchers:
  traces:
    - span_name: "GET /api"
      count:
        expected: 1
"#,
    )
    .await;

    let result = &results.results[0];
    assert_eq!(results.passed, 1, "errors: {:?}", result.errors);
    assert!(result
        .warnings
        .iter()
        .any(|w| w.contains("internal.heartbeat") && w.contains("dropped")));
    assert_eq!(result.output.as_ref().unwrap().span_count(), 1);
}
