// src/error.rs

//! Unified error handling for the catalog crawler.
//!
//! Every variant is fatal to a run: the first error observed anywhere in the
//! pipeline aborts it and is surfaced to the caller unchanged.

use std::fmt;

use thiserror::Error;

/// Result type alias for crawler operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// The main catalog page did not have the expected structure
    #[error("Discovery error: {0}")]
    Discovery(String),

    /// A department request failed
    #[error("Transport error for term {term}, department {department}: {message}")]
    Transport {
        term: String,
        department: String,
        message: String,
    },

    /// A parse worker could not produce records from a response body
    #[error("Parse error for department {department}: {cause}")]
    Parse { department: String, cause: String },

    /// Persisting the snapshot failed
    #[error("Sink error: {0}")]
    Sink(String),

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Database query failed
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Database migration failed
    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

impl AppError {
    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a discovery error.
    pub fn discovery(message: impl Into<String>) -> Self {
        Self::Discovery(message.into())
    }

    /// Create a transport error carrying the term and department that failed.
    pub fn transport(
        term: impl Into<String>,
        department: impl Into<String>,
        message: impl fmt::Display,
    ) -> Self {
        Self::Transport {
            term: term.into(),
            department: department.into(),
            message: message.to_string(),
        }
    }

    /// Create a parse error for a department.
    pub fn parse(department: impl Into<String>, cause: impl fmt::Display) -> Self {
        Self::Parse {
            department: department.into(),
            cause: cause.to_string(),
        }
    }

    /// Create a sink error.
    pub fn sink(message: impl fmt::Display) -> Self {
        Self::Sink(message.to_string())
    }
}
