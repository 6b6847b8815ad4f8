//! SPDX-FileCopyrightText: © 2025 Cory Parent <goedelsoup+contrail@goedelsoup.io>
//! SPDX-License-Identifier: Apache-2.0
//!

//! Contrail Engine
//!
//! This crate provides the contract evaluation engine: the expression
//! evaluator for filters, selectors, and rules; the contract validator
//! built on top of it; the input generator; the in-process
//! transformation simulator; and the test orchestrator that composes
//! generation, processing, and validation into a deterministic verdict
//! per contract.

pub mod expr;
pub mod generator;
pub mod harness;
pub mod runner;
pub mod simulator;
pub mod validate;

// Re-export commonly used types
pub use expr::RuleEngine;
pub use generator::Generator;
pub use harness::{CancellationToken, HarnessSettings, TestHarness, TestResult, TestResults};
pub use runner::PipelineRunner;
pub use simulator::{DroppedItem, PipelineSimulator, SimulationReport};
pub use validate::ContractValidator;
