//! Error types and handling for the load balancer core
//!
//! This module defines the error types used throughout the crate, providing
//! consistent error handling and reporting.

use thiserror::Error;

/// Result type alias for load balancer operations
pub type Result<T> = std::result::Result<T, LoadBalancerError>;

/// Main error type for the load balancer core
#[derive(Debug, Error)]
pub enum LoadBalancerError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// A caller passed an invalid phase mode, phase count, or overcurrent mode
    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// File I/O errors
    #[error("I/O error: {message}")]
    Io { message: String },

    /// Generic errors with context
    #[error("Error: {message}")]
    Generic { message: String },
}

impl LoadBalancerError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        LoadBalancerError::Config {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(field: S, message: S) -> Self {
        LoadBalancerError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        LoadBalancerError::Io {
            message: message.into(),
        }
    }

    /// Create a new generic error
    pub fn generic<S: Into<String>>(message: S) -> Self {
        LoadBalancerError::Generic {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for LoadBalancerError {
    fn from(err: std::io::Error) -> Self {
        LoadBalancerError::io(err.to_string())
    }
}

impl From<serde_yaml::Error> for LoadBalancerError {
    fn from(err: serde_yaml::Error) -> Self {
        LoadBalancerError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for LoadBalancerError {
    fn from(err: serde_json::Error) -> Self {
        LoadBalancerError::Serialization {
            message: err.to_string(),
        }
    }
}
