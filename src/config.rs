//! Dispatcher configuration

use crate::error::{Error, Result};
use crate::limits::Limits;
use serde::Deserialize;

/// Settings of a [`SoapDispatcher`](crate::dispatch::SoapDispatcher)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Include error details in fault messages produced by middlewares
    pub debug: bool,

    /// Validate request payloads and headers against the service schemas
    pub validate_requests: bool,

    /// Validate response payloads before sending them
    pub validate_responses: bool,

    /// Limits applied while parsing inbound XML
    pub limits: Limits,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            debug: false,
            validate_requests: true,
            validate_responses: true,
            limits: Limits::default(),
        }
    }
}

impl DispatcherConfig {
    /// Default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a configuration from JSON; missing keys keep their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::Schema(format!("Invalid dispatcher configuration: {}", e)))
    }

    /// Set debug mode
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Enable or disable request validation
    pub fn with_request_validation(mut self, enabled: bool) -> Self {
        self.validate_requests = enabled;
        self
    }

    /// Enable or disable response validation
    pub fn with_response_validation(mut self, enabled: bool) -> Self {
        self.validate_responses = enabled;
        self
    }

    /// Replace the parse limits
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = DispatcherConfig::new();
        assert!(!config.debug);
        assert!(config.validate_requests);
        assert!(config.validate_responses);
        assert_eq!(config.limits, Limits::default());
    }

    #[test]
    fn test_from_json_partial() {
        let json = r#"{"debug": true, "limits": {"max_xml_depth": 8}}"#;
        let config = DispatcherConfig::from_json(json).unwrap();
        assert!(config.debug);
        assert!(config.validate_requests);
        assert_eq!(config.limits.max_xml_depth, 8);
        assert_eq!(config.limits.max_attributes, Limits::default().max_attributes);
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(matches!(DispatcherConfig::from_json("[1, 2"), Err(Error::Schema(_))));
    }

    #[test]
    fn test_builders() {
        let config = DispatcherConfig::new()
            .with_debug(true)
            .with_request_validation(false)
            .with_limits(Limits::strict());
        assert!(config.debug);
        assert!(!config.validate_requests);
        assert_eq!(config.limits, Limits::strict());
    }
}
