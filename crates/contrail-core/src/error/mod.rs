//! SPDX-FileCopyrightText: © 2025 Cory Parent <goedelsoup+contrail@goedelsoup.io>
//! SPDX-License-Identifier: Apache-2.0
//!

//! Error handling for the contrail contract testing engine
//!
//! This module provides structured error types used throughout the
//! engine. Validation failures discovered while checking a bundle against
//! a contract are data, not errors; they live in
//! [`crate::contract::ValidationResult`]. The types here cover the
//! operational failures: unreadable files, malformed documents, broken
//! configuration, and collaborator faults.

pub mod types;

// Re-export commonly used types
pub use types::{ContrailError, ContrailResult};
