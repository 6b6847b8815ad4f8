//! SPDX-FileCopyrightText: © 2025 Cory Parent <goedelsoup+contrail@goedelsoup.io>
//! SPDX-License-Identifier: Apache-2.0
//!

//! Error types for the contrail contract testing engine
//!
//! This module provides the main error type and result alias used
//! throughout the engine.

use std::error::Error as StdError;
use thiserror::Error;

/// Result type for engine operations
pub type ContrailResult<T> = Result<T, ContrailError>;

/// Main error type for the engine
#[derive(Error, Debug)]
pub enum ContrailError {
    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        source: Option<Box<dyn StdError + Send + Sync>>,
    },

    /// Contract loading and structural validation errors
    #[error("Contract error: {message}")]
    Contract {
        message: String,
        source: Option<Box<dyn StdError + Send + Sync>>,
    },

    /// Data validation errors
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        source: Option<Box<dyn StdError + Send + Sync>>,
    },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization {
        message: String,
        source: Option<Box<dyn StdError + Send + Sync>>,
    },

    /// Pipeline resolution errors
    #[error("Pipeline resolution error: {message}")]
    PipelineResolution {
        message: String,
        source: Option<Box<dyn StdError + Send + Sync>>,
    },

    /// Timeout errors
    #[error("Timeout error: {message}")]
    Timeout {
        message: String,
        source: Option<Box<dyn StdError + Send + Sync>>,
    },

    /// External pipeline runner errors
    #[error("Runner error: {message}")]
    Runner {
        message: String,
        source: Option<Box<dyn StdError + Send + Sync>>,
    },

    /// Internal errors
    #[error("Internal error: {message}")]
    Internal {
        message: String,
        source: Option<Box<dyn StdError + Send + Sync>>,
    },
}

impl ContrailError {
    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        ContrailError::Configuration {
            message: message.into(),
            source: None,
        }
    }

    /// Create a configuration error with source
    pub fn configuration_with_source(
        message: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        ContrailError::Configuration {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a contract error
    pub fn contract(message: impl Into<String>) -> Self {
        ContrailError::Contract {
            message: message.into(),
            source: None,
        }
    }

    /// Create a contract error with source
    pub fn contract_with_source(
        message: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        ContrailError::Contract {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        ContrailError::Validation {
            message: message.into(),
            source: None,
        }
    }

    /// Create a validation error with source
    pub fn validation_with_source(
        message: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        ContrailError::Validation {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        ContrailError::Serialization {
            message: message.into(),
            source: None,
        }
    }

    /// Create a serialization error with source
    pub fn serialization_with_source(
        message: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        ContrailError::Serialization {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a pipeline resolution error
    pub fn pipeline_resolution(message: impl Into<String>) -> Self {
        ContrailError::PipelineResolution {
            message: message.into(),
            source: None,
        }
    }

    /// Create a timeout error
    pub fn timeout(message: impl Into<String>) -> Self {
        ContrailError::Timeout {
            message: message.into(),
            source: None,
        }
    }

    /// Create a runner error
    pub fn runner(message: impl Into<String>) -> Self {
        ContrailError::Runner {
            message: message.into(),
            source: None,
        }
    }

    /// Create a runner error with source
    pub fn runner_with_source(
        message: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        ContrailError::Runner {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        ContrailError::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// Check if the error is transient
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ContrailError::Timeout { .. } | ContrailError::Runner { .. }
        )
    }

    /// Check if the error is permanent
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            ContrailError::Configuration { .. }
                | ContrailError::Contract { .. }
                | ContrailError::Validation { .. }
        )
    }

    /// Get the error type as a string
    pub fn error_type(&self) -> &'static str {
        match self {
            ContrailError::Configuration { .. } => "Configuration",
            ContrailError::Contract { .. } => "Contract",
            ContrailError::Validation { .. } => "Validation",
            ContrailError::Serialization { .. } => "Serialization",
            ContrailError::PipelineResolution { .. } => "PipelineResolution",
            ContrailError::Timeout { .. } => "Timeout",
            ContrailError::Runner { .. } => "Runner",
            ContrailError::Internal { .. } => "Internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let config_err = ContrailError::configuration("Invalid config");
        assert!(matches!(config_err, ContrailError::Configuration { .. }));
        assert!(config_err.is_permanent());
        assert!(!config_err.is_transient());

        let timeout_err = ContrailError::timeout("Test deadline exceeded");
        assert!(matches!(timeout_err, ContrailError::Timeout { .. }));
        assert!(timeout_err.is_transient());
    }

    #[test]
    fn test_error_with_source() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err = ContrailError::contract_with_source("failed to read contract", io_err);
        assert_eq!(err.error_type(), "Contract");
        assert!(err.to_string().contains("failed to read contract"));
    }
}
