//! SPDX-FileCopyrightText: © 2025 Cory Parent <goedelsoup+contrail@goedelsoup.io>
//! SPDX-License-Identifier: Apache-2.0
//!

//! Expression engine for filters, selectors, and validation rules

pub mod engine;

// Re-export commonly used types
pub use engine::{CustomValidatorFn, RuleEngine, MAX_RULE_DEPTH};
