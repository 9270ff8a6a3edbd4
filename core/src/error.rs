//! Error types for the core crate
//!
//! This module provides a consolidated error type for the core crate.
//! Every failure path in the protection unit, the registry and the
//! marketplace flows ends up as one of these variants; nothing panics.

use std::io;
use thiserror::Error;

/// Core error type
#[derive(Error, Debug)]
pub enum CoreError {
    /// Malformed or missing required field
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Reference to a dataset or grant that does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller is not authorized for the operation
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// Authentication tag or integrity digest mismatch
    #[error("Integrity check failed: {0}")]
    Integrity(String),

    /// Unexpected failure in an underlying primitive
    #[error("Internal error: {0}")]
    Internal(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A catalog data source failed
    #[error("Data source error: {0}")]
    Source(String),

    /// The blob store or chain service failed
    #[error("External service error: {0}")]
    External(String),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Hex decoding error
    #[error("Hex decoding error: {0}")]
    HexError(#[from] hex::FromHexError),
}

/// Coarse classification of a [`CoreError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad caller input
    InvalidInput,
    /// Unknown dataset or grant
    NotFound,
    /// Authorization failure
    AccessDenied,
    /// Tamper or corruption detected
    IntegrityError,
    /// Everything else
    InternalError,
}

impl CoreError {
    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::InvalidInput(_) => ErrorKind::InvalidInput,
            CoreError::NotFound(_) => ErrorKind::NotFound,
            CoreError::AccessDenied(_) => ErrorKind::AccessDenied,
            CoreError::Integrity(_) => ErrorKind::IntegrityError,
            CoreError::Internal(_)
            | CoreError::Config(_)
            | CoreError::Source(_)
            | CoreError::External(_)
            | CoreError::IoError(_)
            | CoreError::JsonError(_)
            | CoreError::HexError(_) => ErrorKind::InternalError,
        }
    }

    /// Message suitable for showing to an end user.
    ///
    /// Decryption failures of either kind read as "access denied" so that a
    /// tampered file and a wrong wallet are indistinguishable from outside,
    /// while a missing dataset stays distinguishable from a permission failure.
    pub fn user_message(&self) -> &'static str {
        match self.kind() {
            ErrorKind::InvalidInput => "invalid request",
            ErrorKind::NotFound => "dataset does not exist",
            ErrorKind::AccessDenied | ErrorKind::IntegrityError => "access denied",
            ErrorKind::InternalError => "internal error",
        }
    }
}

/// Result type for the core crate
pub type Result<T> = std::result::Result<T, CoreError>;

/// Convert an error into an InternalError
pub fn to_internal_error<E: std::fmt::Display>(err: E) -> CoreError {
    CoreError::Internal(err.to_string())
}

/// Convert an error into a Source error
pub fn to_source_error<E: std::fmt::Display>(err: E) -> CoreError {
    CoreError::Source(err.to_string())
}

/// Convert an error into a ConfigError
pub fn to_config_error<E: std::fmt::Display>(err: E) -> CoreError {
    CoreError::Config(err.to_string())
}

/// Convert an error into an External error
pub fn to_external_error<E: std::fmt::Display>(err: E) -> CoreError {
    CoreError::External(err.to_string())
}
