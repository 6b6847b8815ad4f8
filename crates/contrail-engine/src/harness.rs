//! SPDX-FileCopyrightText: © 2025 Cory Parent <goedelsoup+contrail@goedelsoup.io>
//! SPDX-License-Identifier: Apache-2.0
//!

//! Test orchestration
//!
//! The harness drives one test per contract: resolve the pipeline,
//! generate the input bundle, run it through the simulator or an
//! external runner, and validate the output. Tests across contracts run
//! on a bounded worker pool; the aggregate results preserve input
//! contract order regardless of execution order. Cancellation is
//! cooperative and checked between steps; a per-test deadline caps the
//! external runner call.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use contrail_core::config::CollectorConfig;
use contrail_core::contract::{
    Contract, PipelineSelectorService, ValidationError, ValidationErrorKind,
};
use contrail_core::error::ContrailResult;
use contrail_core::types::TelemetryBundle;
use contrail_core::utils::time::Clock;

use crate::generator::Generator;
use crate::runner::PipelineRunner;
use crate::simulator::PipelineSimulator;
use crate::validate::{ContractValidator, SKIP_WARNING};

/// Default per-test deadline
pub const DEFAULT_TEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Harness tuning knobs
#[derive(Debug, Clone)]
pub struct HarnessSettings {
    /// Worker pool width; 1 means sequential
    pub parallelism: usize,

    /// Per-test deadline for the external runner call
    pub test_timeout: Duration,
}

impl Default for HarnessSettings {
    fn default() -> Self {
        Self {
            parallelism: 1,
            test_timeout: DEFAULT_TEST_TIMEOUT,
        }
    }
}

/// Cooperative cancellation token
///
/// Checked before each contract and before the external runner call;
/// in-flight evaluations complete.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a live token
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// The result of a single contract test
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestResult {
    /// `publisher/version` reference of the contract
    pub contract_ref: String,

    /// Whether the contract held
    pub valid: bool,

    /// Whether the contract was gated out or cancelled
    pub skipped: bool,

    /// Error-severity failures
    pub errors: Vec<ValidationError>,

    /// Warnings and drop diagnostics
    pub warnings: Vec<String>,

    /// Wall time spent on this test
    pub duration: Duration,

    /// The generated input bundle
    pub input: Option<TelemetryBundle>,

    /// The post-transformation bundle
    pub output: Option<TelemetryBundle>,
}

impl TestResult {
    fn failed(contract: &Contract, error: ValidationError, duration: Duration) -> Self {
        Self {
            contract_ref: contract.reference(),
            valid: false,
            skipped: false,
            errors: vec![error],
            warnings: Vec::new(),
            duration,
            input: None,
            output: None,
        }
    }

    fn cancelled(contract: &Contract) -> Self {
        Self {
            contract_ref: contract.reference(),
            valid: true,
            skipped: true,
            errors: Vec::new(),
            warnings: vec!["skipped: cancelled".to_string()],
            duration: Duration::ZERO,
            input: None,
            output: None,
        }
    }
}

/// Aggregate results across all contracts
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestResults {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub duration: Duration,

    /// Per-contract results, in input contract order
    pub results: Vec<TestResult>,
}

/// Shared per-test context cloned into worker tasks
#[derive(Clone)]
struct TestContext {
    clock: Arc<dyn Clock>,
    selector: Arc<PipelineSelectorService>,
    collector_config: Arc<CollectorConfig>,
    generator: Arc<Generator>,
    validator: Arc<ContractValidator>,
    simulator: Arc<PipelineSimulator>,
    runner: Option<Arc<dyn PipelineRunner>>,
    settings: HarnessSettings,
}

/// Test orchestrator
pub struct TestHarness {
    context: TestContext,
}

impl TestHarness {
    /// Create a harness backed by the in-process simulator
    pub fn new(
        clock: Arc<dyn Clock>,
        selector: Arc<PipelineSelectorService>,
        collector_config: Arc<CollectorConfig>,
        generator: Arc<Generator>,
        validator: Arc<ContractValidator>,
    ) -> Self {
        Self {
            context: TestContext {
                clock,
                selector,
                collector_config,
                generator,
                validator,
                simulator: Arc::new(PipelineSimulator::new()),
                runner: None,
                settings: HarnessSettings::default(),
            },
        }
    }

    /// Attach an external pipeline runner, replacing the simulator
    pub fn with_runner(mut self, runner: Arc<dyn PipelineRunner>) -> Self {
        self.context.runner = Some(runner);
        self
    }

    /// Override the harness settings
    pub fn with_settings(mut self, settings: HarnessSettings) -> Self {
        self.context.settings = settings;
        self
    }

    /// Run every contract, preserving input order in the results
    pub async fn run_tests(
        &self,
        contracts: &[Contract],
        token: &CancellationToken,
    ) -> ContrailResult<TestResults> {
        let started = self.context.clock.now();
        info!(
            contracts = contracts.len(),
            parallelism = self.context.settings.parallelism,
            "starting test execution"
        );

        if let Some(runner) = &self.context.runner {
            runner.start().await?;
        }

        let width = self.context.settings.parallelism.max(1);
        let semaphore = Arc::new(Semaphore::new(width));
        let mut handles = Vec::with_capacity(contracts.len());

        for contract in contracts.iter().cloned() {
            let context = self.context.clone();
            let semaphore = Arc::clone(&semaphore);
            let token = token.clone();

            handles.push(tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("semaphore closed while tests are running");
                if token.is_cancelled() {
                    return TestResult::cancelled(&contract);
                }
                run_single_test(&context, &contract, &token).await
            }));
        }

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok(result) => results.push(result),
                Err(e) => {
                    // A panicking test must not take the run down with it.
                    warn!(error = %e, "test task failed");
                    results.push(TestResult {
                        contract_ref: String::new(),
                        valid: false,
                        skipped: false,
                        errors: vec![ValidationError::new(
                            ValidationErrorKind::RunnerError,
                            format!("test task failed: {e}"),
                        )],
                        warnings: Vec::new(),
                        duration: Duration::ZERO,
                        input: None,
                        output: None,
                    });
                }
            }
        }

        if let Some(runner) = &self.context.runner {
            runner.stop().await?;
        }

        let passed = results.iter().filter(|r| r.valid).count();
        let failed = results.len() - passed;
        let skipped = results.iter().filter(|r| r.skipped).count();
        let totals = TestResults {
            total: results.len(),
            passed,
            failed,
            skipped,
            duration: elapsed_since(&*self.context.clock, started),
            results,
        };

        info!(
            total = totals.total,
            passed = totals.passed,
            failed = totals.failed,
            skipped = totals.skipped,
            "test execution completed"
        );
        Ok(totals)
    }
}

async fn run_single_test(
    context: &TestContext,
    contract: &Contract,
    token: &CancellationToken,
) -> TestResult {
    let started = context.clock.now();
    debug!(contract = %contract.reference(), "running test");

    let pipeline = match context.selector.resolve(contract) {
        Ok(pipeline) => pipeline.clone(),
        Err(e) => {
            return TestResult::failed(
                contract,
                ValidationError::new(ValidationErrorKind::PipelineResolution, e.to_string()),
                elapsed_since(&*context.clock, started),
            );
        }
    };

    let input = context.generator.generate(contract);
    let mut drop_warnings = Vec::new();

    let output = if let Some(runner) = &context.runner {
        if token.is_cancelled() {
            return TestResult::cancelled(contract);
        }
        match tokio::time::timeout(context.settings.test_timeout, runner.process(input.clone()))
            .await
        {
            Ok(Ok(bundle)) => bundle,
            Ok(Err(e)) => {
                return TestResult::failed(
                    contract,
                    ValidationError::new(
                        ValidationErrorKind::RunnerError,
                        format!("pipeline runner failed: {e}"),
                    ),
                    elapsed_since(&*context.clock, started),
                );
            }
            Err(_) => {
                return TestResult::failed(
                    contract,
                    ValidationError::new(
                        ValidationErrorKind::Timeout,
                        format!(
                            "test exceeded deadline of {:?}",
                            context.settings.test_timeout
                        ),
                    ),
                    elapsed_since(&*context.clock, started),
                );
            }
        }
    } else {
        let chain = match context.collector_config.processor_chain(&pipeline.id) {
            Ok(chain) => chain,
            Err(e) => {
                return TestResult::failed(
                    contract,
                    ValidationError::new(ValidationErrorKind::PipelineResolution, e.to_string()),
                    elapsed_since(&*context.clock, started),
                );
            }
        };
        let (output, report) = context.simulator.apply_chain(&chain, &input);
        for dropped in &report.dropped {
            let note = if dropped.enforced {
                "dropped"
            } else {
                "diagnostic only"
            };
            drop_warnings.push(format!(
                "filter matched {} '{}' ({note})",
                dropped.signal, dropped.name
            ));
        }
        output
    };

    let validation = context.validator.validate(contract, &input, &output);
    let skipped = validation.warnings.iter().any(|w| w == SKIP_WARNING);

    let mut warnings = drop_warnings;
    warnings.extend(validation.warnings);

    let result = TestResult {
        contract_ref: contract.reference(),
        valid: validation.valid,
        skipped,
        errors: validation.errors,
        warnings,
        duration: elapsed_since(&*context.clock, started),
        input: Some(input),
        output: Some(output),
    };

    if result.valid {
        debug!(contract = %result.contract_ref, "test passed");
    } else {
        warn!(
            contract = %result.contract_ref,
            errors = result.errors.len(),
            "test failed"
        );
    }
    result
}

/// Elapsed wall time according to the injected clock
fn elapsed_since(clock: &dyn Clock, started: DateTime<Utc>) -> Duration {
    (clock.now() - started).to_std().unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use contrail_core::contract::PipelineInfo;
    use contrail_core::error::ContrailError;
    use contrail_core::utils::time::FixedClock;
    use mockall::mock;

    fn base_time() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn clock() -> Arc<FixedClock> {
        Arc::new(FixedClock::new(base_time()))
    }

    fn contract_doc(publisher: &str, span_name: &str) -> Contract {
        serde_yaml::from_str(&format!(
            r#"
publisher: {publisher}
version: "1"
pipeline: traces
inputs:
  traces:
    - span_name: {span_name}
matchers:
  traces:
    - span_name: {span_name}
"#
        ))
        .unwrap()
    }

    fn harness() -> TestHarness {
        let mut selector = PipelineSelectorService::new();
        selector.register(PipelineInfo::new("traces").with_type("trace"));

        let config = CollectorConfig::from_yaml(
            r#"
processors:
  attributes:
    actions: []
service:
  pipelines:
    traces:
      processors: [attributes]
"#,
        )
        .unwrap();

        TestHarness::new(
            clock(),
            Arc::new(selector),
            Arc::new(config),
            Arc::new(Generator::with_seed(clock(), 7)),
            Arc::new(ContractValidator::new(clock())),
        )
    }

    mock! {
        EchoRunner {}

        #[async_trait]
        impl PipelineRunner for EchoRunner {
            async fn start(&self) -> ContrailResult<()>;
            async fn stop(&self) -> ContrailResult<()>;
            async fn process(&self, bundle: TelemetryBundle) -> ContrailResult<TelemetryBundle>;
        }
    }

    struct SlowRunner;

    #[async_trait]
    impl PipelineRunner for SlowRunner {
        async fn start(&self) -> ContrailResult<()> {
            Ok(())
        }

        async fn stop(&self) -> ContrailResult<()> {
            Ok(())
        }

        async fn process(&self, bundle: TelemetryBundle) -> ContrailResult<TelemetryBundle> {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(bundle)
        }
    }

    #[tokio::test]
    async fn test_single_contract_passes() {
        let harness = harness();
        let contracts = vec![contract_doc("team-a", "op")];

        let results = harness
            .run_tests(&contracts, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(results.total, 1);
        assert_eq!(results.passed, 1);
        assert_eq!(results.failed, 0);
        assert!(results.results[0].valid, "errors: {:?}", results.results[0].errors);
        assert!(results.results[0].input.is_some());
        assert!(results.results[0].output.is_some());
    }

    #[tokio::test]
    async fn test_order_preserved_under_parallelism() {
        let harness = harness().with_settings(HarnessSettings {
            parallelism: 4,
            test_timeout: DEFAULT_TEST_TIMEOUT,
        });

        let contracts: Vec<Contract> = (0..12)
            .map(|i| contract_doc(&format!("team-{i}"), "op"))
            .collect();

        let results = harness
            .run_tests(&contracts, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(results.total, 12);
        for (i, result) in results.results.iter().enumerate() {
            assert_eq!(result.contract_ref, format!("team-{i}/1"));
        }
    }

    #[tokio::test]
    async fn test_pipeline_resolution_failure() {
        let harness = harness();
        let mut contract = contract_doc("team-a", "op");
        contract.pipeline = Some("does-not-exist".to_string());

        let results = harness
            .run_tests(&[contract], &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(results.failed, 1);
        assert_eq!(
            results.results[0].errors[0].kind,
            ValidationErrorKind::PipelineResolution
        );
    }

    #[tokio::test]
    async fn test_runner_timeout() {
        let harness = harness()
            .with_runner(Arc::new(SlowRunner))
            .with_settings(HarnessSettings {
                parallelism: 1,
                test_timeout: Duration::from_millis(20),
            });

        let results = harness
            .run_tests(&[contract_doc("team-a", "op")], &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(results.failed, 1);
        assert_eq!(results.results[0].errors[0].kind, ValidationErrorKind::Timeout);
    }

    #[tokio::test]
    async fn test_runner_lifecycle_and_output() {
        let mut runner = MockEchoRunner::new();
        runner.expect_start().times(1).returning(|| Ok(()));
        runner.expect_stop().times(1).returning(|| Ok(()));
        runner
            .expect_process()
            .times(1)
            .returning(|bundle| Ok(bundle));

        let harness = harness().with_runner(Arc::new(runner));
        let results = harness
            .run_tests(&[contract_doc("team-a", "op")], &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(results.passed, 1);
    }

    #[tokio::test]
    async fn test_runner_failure_surfaces_as_runner_error() {
        let mut runner = MockEchoRunner::new();
        runner.expect_start().times(1).returning(|| Ok(()));
        runner.expect_stop().times(1).returning(|| Ok(()));
        runner
            .expect_process()
            .times(1)
            .returning(|_| Err(ContrailError::runner("collector crashed")));

        let harness = harness().with_runner(Arc::new(runner));
        let results = harness
            .run_tests(&[contract_doc("team-a", "op")], &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(results.failed, 1);
        assert_eq!(
            results.results[0].errors[0].kind,
            ValidationErrorKind::RunnerError
        );
    }

    #[tokio::test]
    async fn test_cancellation_skips_pending_contracts() {
        let harness = harness();
        let token = CancellationToken::new();
        token.cancel();

        let contracts = vec![contract_doc("team-a", "op"), contract_doc("team-b", "op")];
        let results = harness.run_tests(&contracts, &token).await.unwrap();

        assert_eq!(results.total, 2);
        assert_eq!(results.skipped, 2);
        assert!(results
            .results
            .iter()
            .all(|r| r.warnings.contains(&"skipped: cancelled".to_string())));
    }

    #[tokio::test]
    async fn test_filter_gated_contract_is_skipped() {
        let harness = harness();
        let contract: Contract = serde_yaml::from_str(
            r#"
publisher: team-a
version: "1"
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
    - span_name: never-checked
"#,
        )
        .unwrap();

        let results = harness
            .run_tests(&[contract], &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(results.passed, 1);
        assert_eq!(results.skipped, 1);
        assert!(results.results[0].errors.is_empty());
    }
}
