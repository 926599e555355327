//! Error types and handling for Solar Savings
//!
//! This module defines the error types used throughout the crate,
//! providing consistent error handling and reporting.

use thiserror::Error;

/// Result type alias for Solar Savings operations
pub type Result<T> = std::result::Result<T, SavingsError>;

/// Main error type for Solar Savings
#[derive(Debug, Error)]
pub enum SavingsError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Validation errors (form input, adapter writes, config values)
    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// File I/O errors
    #[error("I/O error: {message}")]
    Io { message: String },

    /// Errors reported by the host platform (unknown entry, rejected update)
    #[error("Host error: {message}")]
    Host { message: String },

    /// Generic errors with context
    #[error("Error: {message}")]
    Generic { message: String },
}

impl SavingsError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<F: Into<String>, M: Into<String>>(field: F, message: M) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Create a new host error
    pub fn host<S: Into<String>>(message: S) -> Self {
        Self::Host {
            message: message.into(),
        }
    }

    /// Create a new generic error
    pub fn generic<S: Into<String>>(message: S) -> Self {
        Self::Generic {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for SavingsError {
    fn from(err: std::io::Error) -> Self {
        Self::io(err.to_string())
    }
}

impl From<serde_yaml::Error> for SavingsError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for SavingsError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<chrono::ParseError> for SavingsError {
    fn from(err: chrono::ParseError) -> Self {
        Self::validation("date", err.to_string())
    }
}
