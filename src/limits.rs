//! Limits for inbound XML
//!
//! Every document the dispatcher or client parses goes through these checks
//! before it is turned into an element tree.

use crate::error::{Error, Result};
use serde::Deserialize;

/// Resource limits applied while parsing XML
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Maximum element nesting depth
    pub max_xml_depth: usize,

    /// Maximum XML document size in bytes
    pub max_xml_size: usize,

    /// Maximum number of attributes per element
    pub max_attributes: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_xml_depth: 256,
            max_xml_size: 10 * 1024 * 1024, // 10 MB
            max_attributes: 256,
        }
    }
}

impl Limits {
    /// Create a new Limits with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Create strict limits (more restrictive)
    pub fn strict() -> Self {
        Self {
            max_xml_depth: 64,
            max_xml_size: 1024 * 1024, // 1 MB
            max_attributes: 32,
        }
    }

    /// Create permissive limits (less restrictive, use with caution)
    pub fn permissive() -> Self {
        Self {
            max_xml_depth: 4096,
            max_xml_size: 512 * 1024 * 1024, // 512 MB
            max_attributes: 4096,
        }
    }

    /// Check if XML depth is within limits
    pub fn check_xml_depth(&self, depth: usize) -> Result<()> {
        if depth > self.max_xml_depth {
            Err(Error::LimitExceeded(format!(
                "XML depth {} exceeds maximum {}",
                depth, self.max_xml_depth
            )))
        } else {
            Ok(())
        }
    }

    /// Check if XML size is within limits
    pub fn check_xml_size(&self, size: usize) -> Result<()> {
        if size > self.max_xml_size {
            Err(Error::LimitExceeded(format!(
                "XML size {} bytes exceeds maximum {} bytes",
                size, self.max_xml_size
            )))
        } else {
            Ok(())
        }
    }

    /// Check if the attribute count of one element is within limits
    pub fn check_attributes(&self, count: usize) -> Result<()> {
        if count > self.max_attributes {
            Err(Error::LimitExceeded(format!(
                "Attribute count {} exceeds maximum {}",
                count, self.max_attributes
            )))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits() {
        let limits = Limits::default();
        assert!(limits.check_xml_depth(256).is_ok());
        assert!(limits.check_xml_depth(257).is_err());
        assert!(limits.check_xml_size(1024).is_ok());
    }

    #[test]
    fn test_strict_is_tighter_than_permissive() {
        let strict = Limits::strict();
        let permissive = Limits::permissive();
        assert!(strict.max_xml_depth < permissive.max_xml_depth);
        assert!(strict.max_xml_size < permissive.max_xml_size);
        assert!(strict.check_attributes(33).is_err());
        assert!(permissive.check_attributes(33).is_ok());
    }

    #[test]
    fn test_deserialize_partial() {
        let limits: Limits = serde_json::from_str(r#"{"max_xml_depth": 8}"#).unwrap();
        assert_eq!(limits.max_xml_depth, 8);
        assert_eq!(limits.max_xml_size, Limits::default().max_xml_size);
    }
}
