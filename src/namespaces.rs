//! XML namespace handling
//!
//! Qualified names, prefix mappings and the namespace URIs the SOAP and
//! schema layers refer to.

use crate::error::{Error, Result};
use indexmap::IndexMap;
use std::fmt;

/// XML Schema namespace
pub const XSD_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema";

/// XML Schema instance namespace (`xsi:nil`, `xsi:type`)
pub const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// XML namespace (bound to the reserved `xml` prefix)
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// SOAP 1.1 envelope namespace
pub const SOAP11_ENVELOPE_NAMESPACE: &str = "http://schemas.xmlsoap.org/soap/envelope/";

/// SOAP 1.2 envelope namespace
pub const SOAP12_ENVELOPE_NAMESPACE: &str = "http://www.w3.org/2003/05/soap-envelope";

/// WSDL 1.1 namespace
pub const WSDL_NAMESPACE: &str = "http://schemas.xmlsoap.org/wsdl/";

/// WSDL SOAP 1.1 binding namespace
pub const WSDL_SOAP11_NAMESPACE: &str = "http://schemas.xmlsoap.org/wsdl/soap/";

/// WSDL SOAP 1.2 binding namespace
pub const WSDL_SOAP12_NAMESPACE: &str = "http://schemas.xmlsoap.org/wsdl/soap12/";

/// SOAP over HTTP transport URI used in WSDL bindings
pub const SOAP_HTTP_TRANSPORT: &str = "http://schemas.xmlsoap.org/soap/http";

/// Prefix conventionally used for a well-known namespace.
///
/// The serializer prefers these so fault codes such as `soap:Client` stay
/// resolvable against the envelope.
pub fn well_known_prefix(namespace: &str) -> Option<&'static str> {
    match namespace {
        XSD_NAMESPACE => Some("xs"),
        XSI_NAMESPACE => Some("xsi"),
        XML_NAMESPACE => Some("xml"),
        SOAP11_ENVELOPE_NAMESPACE => Some("soap"),
        SOAP12_ENVELOPE_NAMESPACE => Some("soap12"),
        WSDL_NAMESPACE => Some("wsdl"),
        WSDL_SOAP11_NAMESPACE => Some("wsoap"),
        WSDL_SOAP12_NAMESPACE => Some("wsoap12"),
        _ => None,
    }
}

/// Qualified name (QName) - combination of namespace and local name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QName {
    /// Namespace URI (None for no namespace)
    pub namespace: Option<String>,
    /// Local name
    pub local_name: String,
}

impl QName {
    /// Create a new QName
    pub fn new(namespace: Option<impl Into<String>>, local_name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.map(|s| s.into()),
            local_name: local_name.into(),
        }
    }

    /// Create a QName without a namespace
    pub fn local(local_name: impl Into<String>) -> Self {
        Self {
            namespace: None,
            local_name: local_name.into(),
        }
    }

    /// Create a QName with a namespace
    pub fn namespaced(namespace: impl Into<String>, local_name: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            local_name: local_name.into(),
        }
    }

    /// Parse Clark notation (`{namespace}local`) or a bare local name
    pub fn from_clark(name: &str) -> Result<Self> {
        match name.strip_prefix('{') {
            Some(rest) => {
                let (ns, local) = rest
                    .split_once('}')
                    .ok_or_else(|| Error::Xml(format!("Unterminated namespace in '{}'", name)))?;
                Ok(Self::namespaced(ns, local))
            }
            None => Ok(Self::local(name)),
        }
    }

    /// Namespace URI, if any
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Check whether this name matches a namespace and local name
    pub fn matches(&self, namespace: Option<&str>, local_name: &str) -> bool {
        self.local_name == local_name && self.namespace.as_deref() == namespace
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{{{}}}{}", ns, self.local_name),
            None => write!(f, "{}", self.local_name),
        }
    }
}

/// Prefix to namespace mapping declared on an element
///
/// Ordered so serialized declarations come out deterministically.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NamespaceContext {
    prefixes: IndexMap<String, String>,
    default_namespace: Option<String>,
}

impl NamespaceContext {
    /// Create a new empty namespace context
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a namespace prefix mapping
    pub fn add_prefix(&mut self, prefix: impl Into<String>, namespace: impl Into<String>) {
        self.prefixes.insert(prefix.into(), namespace.into());
    }

    /// Set the default namespace
    pub fn set_default_namespace(&mut self, namespace: impl Into<String>) {
        self.default_namespace = Some(namespace.into());
    }

    /// Get the namespace for a prefix
    pub fn get_namespace(&self, prefix: &str) -> Option<&str> {
        self.prefixes.get(prefix).map(|s| s.as_str())
    }

    /// Get a prefix bound to a namespace
    pub fn get_prefix(&self, namespace: &str) -> Option<&str> {
        self.prefixes
            .iter()
            .find(|(_, ns)| ns.as_str() == namespace)
            .map(|(prefix, _)| prefix.as_str())
    }

    /// Get the default namespace
    pub fn get_default_namespace(&self) -> Option<&str> {
        self.default_namespace.as_deref()
    }

    /// Iterate over (prefix, namespace) pairs in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.prefixes.iter()
    }

    /// True when no prefix or default namespace is declared
    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty() && self.default_namespace.is_none()
    }

    /// Resolve a prefixed name to a QName
    pub fn resolve(&self, prefixed_name: &str) -> Result<QName> {
        if let Some((prefix, local)) = prefixed_name.split_once(':') {
            let namespace = self
                .get_namespace(prefix)
                .ok_or_else(|| Error::Xml(format!("Unknown prefix: {}", prefix)))?;
            Ok(QName::namespaced(namespace, local))
        } else {
            Ok(QName::new(self.default_namespace.clone(), prefixed_name))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qname_display() {
        let qname = QName::namespaced("http://example.com", "element");
        assert_eq!(qname.to_string(), "{http://example.com}element");
        assert_eq!(QName::local("element").to_string(), "element");
    }

    #[test]
    fn test_qname_from_clark() {
        let qname = QName::from_clark("{urn:test}echo").unwrap();
        assert!(qname.matches(Some("urn:test"), "echo"));

        let local = QName::from_clark("echo").unwrap();
        assert!(local.matches(None, "echo"));

        assert!(QName::from_clark("{urn:test").is_err());
    }

    #[test]
    fn test_namespace_context_order_and_lookup() {
        let mut ctx = NamespaceContext::new();
        ctx.add_prefix("tns", "urn:a");
        ctx.add_prefix("xs", XSD_NAMESPACE);

        let prefixes: Vec<_> = ctx.iter().map(|(p, _)| p.as_str()).collect();
        assert_eq!(prefixes, vec!["tns", "xs"]);
        assert_eq!(ctx.get_prefix(XSD_NAMESPACE), Some("xs"));
        assert_eq!(ctx.get_namespace("tns"), Some("urn:a"));
    }

    #[test]
    fn test_resolve_prefixed_name() {
        let mut ctx = NamespaceContext::new();
        ctx.add_prefix("soap", SOAP11_ENVELOPE_NAMESPACE);

        let qname = ctx.resolve("soap:Client").unwrap();
        assert!(qname.matches(Some(SOAP11_ENVELOPE_NAMESPACE), "Client"));
        assert!(ctx.resolve("env:Client").is_err());
    }

    #[test]
    fn test_well_known_prefix() {
        assert_eq!(well_known_prefix(SOAP11_ENVELOPE_NAMESPACE), Some("soap"));
        assert_eq!(well_known_prefix("urn:unknown"), None);
    }
}
