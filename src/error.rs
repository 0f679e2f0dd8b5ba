//! Error types for soapschema
//!
//! Field-level validation failures, whole-document schema violations, XML
//! syntax problems, configuration mistakes and SOAP faults each get their own
//! variant so callers (most notably the dispatcher) can decide which side of
//! the wire is to blame.

use std::fmt;
use thiserror::Error;

use crate::soap::SoapError;

/// Result type alias using soapschema Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for soapschema operations
#[derive(Error, Debug)]
pub enum Error {
    /// A value was rejected by a field or type (accept, render, list mutation)
    #[error("validation error: {0}")]
    Validation(ValidationError),

    /// A document does not conform to its schema
    #[error("document invalid: {0}")]
    DocumentInvalid(ValidationError),

    /// Malformed XML or a serializer failure
    #[error("XML error: {0}")]
    Xml(String),

    /// Access to a field that the structured type does not declare
    #[error("attribute error: {0}")]
    Attribute(String),

    /// Type mismatch or unresolved type reference
    #[error("type error: {0}")]
    Type(String),

    /// Invalid schema, service or dispatcher configuration
    #[error("schema error: {0}")]
    Schema(String),

    /// SOAP fault raised by the protocol layer or a handler
    #[error("SOAP fault: {0}")]
    Soap(#[from] SoapError),

    /// A handler failed and no middleware converted the failure to a fault
    #[error("handler error: {0}")]
    Handler(String),

    /// Limit exceeded error
    #[error("limit exceeded: {0}")]
    LimitExceeded(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Shorthand for a field-level validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation(ValidationError::new(message))
    }

    /// Shorthand for a document-level validation error at `path`
    pub fn invalid(message: impl Into<String>, path: impl Into<String>) -> Self {
        Error::DocumentInvalid(ValidationError::new(message).with_path(path))
    }

    /// True for errors caused by the content of a document rather than by
    /// the program handling it.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::Validation(_)
                | Error::DocumentInvalid(_)
                | Error::Xml(_)
                | Error::Attribute(_)
                | Error::Type(_)
                | Error::LimitExceeded(_)
        )
    }
}

impl From<ValidationError> for Error {
    fn from(err: ValidationError) -> Self {
        Error::Validation(err)
    }
}

impl From<roxmltree::Error> for Error {
    fn from(err: roxmltree::Error) -> Self {
        Error::Xml(err.to_string())
    }
}

impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        Error::Xml(err.to_string())
    }
}

/// Validation error with context
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    /// Error message
    pub message: String,
    /// Path to the element or field that failed validation
    pub path: Option<String>,
    /// Name of the field whose declaration rejected the value
    pub field: Option<String>,
    /// Offending value, as text
    pub value: Option<String>,
    /// Underlying reason
    pub reason: Option<String>,
}

impl ValidationError {
    /// Create a new validation error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            path: None,
            field: None,
            value: None,
            reason: None,
        }
    }

    /// Set the path where validation failed
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Set the field name
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    /// Set the offending value
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Set the reason
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref field) = self.field {
            write!(f, "{}: ", field)?;
        }
        write!(f, "{}", self.message)?;

        if let Some(ref value) = self.value {
            write!(f, " (value: '{}')", value)?;
        }

        if let Some(ref reason) = self.reason {
            write!(f, "; reason: {}", reason)?;
        }

        if let Some(ref path) = self.path {
            write!(f, " at {}", path)?;
        }

        Ok(())
    }
}

impl std::error::Error for ValidationError {}
