//! SPDX-FileCopyrightText: © 2025 Cory Parent <goedelsoup+contrail@goedelsoup.io>
//! SPDX-License-Identifier: Apache-2.0
//!

//! External pipeline runner interface
//!
//! When a real transformation pipeline is available, the orchestrator
//! hands bundles to it through this trait instead of the in-process
//! simulator. The runner owns its transport; the engine only sees
//! bundles going in and coming out.

use async_trait::async_trait;

use contrail_core::error::ContrailResult;
use contrail_core::types::TelemetryBundle;

/// A real or remote pipeline the orchestrator can drive
#[async_trait]
pub trait PipelineRunner: Send + Sync {
    /// Start the runner
    async fn start(&self) -> ContrailResult<()>;

    /// Stop the runner
    async fn stop(&self) -> ContrailResult<()>;

    /// Process a bundle through the pipeline
    async fn process(&self, bundle: TelemetryBundle) -> ContrailResult<TelemetryBundle>;
}
