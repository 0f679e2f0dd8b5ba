//! SOAP envelope and fault model
//!
//! Both protocol versions describe their Envelope, Body and Fault with the
//! same structured types used for application payloads, bound to the
//! version's envelope namespace. [`EnvelopeModel`] wraps one version's types
//! and builds, serializes and parses envelopes with them.

pub mod soap11;
pub mod soap12;

use crate::documents::Element;
use crate::error::{Error, Result};
use crate::limits::Limits;
use crate::namespaces::{
    QName, SOAP11_ENVELOPE_NAMESPACE, SOAP12_ENVELOPE_NAMESPACE, WSDL_SOAP11_NAMESPACE,
    WSDL_SOAP12_NAMESPACE,
};
use crate::xsd::complex::{ComplexType, Instance};
use crate::xsd::fields::RenderContext;
use crate::xsd::schema::{ElementForm, Schema};
use crate::xsd::values::{NamedValue, Value};
use indexmap::IndexMap;
use once_cell::sync::OnceCell;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

static SOAP11_MODEL: OnceCell<EnvelopeModel> = OnceCell::new();
static SOAP12_MODEL: OnceCell<EnvelopeModel> = OnceCell::new();

// =============================================================================
// Versions and fault codes
// =============================================================================

/// SOAP protocol version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SoapVersion {
    /// SOAP 1.1
    #[default]
    Soap11,
    /// SOAP 1.2
    Soap12,
}

impl SoapVersion {
    /// Envelope namespace
    pub fn envelope_namespace(&self) -> &'static str {
        match self {
            SoapVersion::Soap11 => SOAP11_ENVELOPE_NAMESPACE,
            SoapVersion::Soap12 => SOAP12_ENVELOPE_NAMESPACE,
        }
    }

    /// WSDL binding namespace
    pub fn binding_namespace(&self) -> &'static str {
        match self {
            SoapVersion::Soap11 => WSDL_SOAP11_NAMESPACE,
            SoapVersion::Soap12 => WSDL_SOAP12_NAMESPACE,
        }
    }

    /// Prefix of the WSDL binding namespace
    pub fn binding_prefix(&self) -> &'static str {
        match self {
            SoapVersion::Soap11 => "wsoap",
            SoapVersion::Soap12 => "wsoap12",
        }
    }

    /// Canonical content type of messages
    pub fn content_type(&self) -> &'static str {
        match self {
            SoapVersion::Soap11 => soap11::CONTENT_TYPE,
            SoapVersion::Soap12 => soap12::CONTENT_TYPE,
        }
    }

    /// Prefix bound to the envelope namespace on serialized envelopes
    pub fn prefix(&self) -> &'static str {
        match self {
            SoapVersion::Soap11 => "soap",
            SoapVersion::Soap12 => "soap12",
        }
    }

    /// Version owning an envelope namespace
    pub fn from_namespace(namespace: &str) -> Option<Self> {
        match namespace {
            SOAP11_ENVELOPE_NAMESPACE => Some(SoapVersion::Soap11),
            SOAP12_ENVELOPE_NAMESPACE => Some(SoapVersion::Soap12),
            _ => None,
        }
    }

    /// Parse `1.1` / `1.2`
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "1.1" | "soap11" => Some(SoapVersion::Soap11),
            "1.2" | "soap12" => Some(SoapVersion::Soap12),
            _ => None,
        }
    }

    /// Shared envelope model of this version
    pub fn model(&self) -> Result<&'static EnvelopeModel> {
        match self {
            SoapVersion::Soap11 => SOAP11_MODEL.get_or_try_init(soap11::build_model),
            SoapVersion::Soap12 => SOAP12_MODEL.get_or_try_init(soap12::build_model),
        }
    }

    /// Dispatch action carried by the transport, if any
    pub fn determine_soap_action(&self, headers: &HttpHeaders) -> Option<String> {
        match self {
            SoapVersion::Soap11 => soap11::determine_soap_action(headers),
            SoapVersion::Soap12 => soap12::determine_soap_action(headers),
        }
    }

    /// HTTP headers for a request invoking `action`
    pub fn request_headers(&self, action: &str) -> HttpHeaders {
        match self {
            SoapVersion::Soap11 => soap11::request_headers(action),
            SoapVersion::Soap12 => soap12::request_headers(action),
        }
    }

    /// Code, message and actor of a parsed fault
    pub fn parse_fault_message(&self, fault: &Instance) -> SoapError {
        match self {
            SoapVersion::Soap11 => soap11::parse_fault_message(fault),
            SoapVersion::Soap12 => soap12::parse_fault_message(fault),
        }
    }
}

impl fmt::Display for SoapVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SoapVersion::Soap11 => write!(f, "SOAP 1.1"),
            SoapVersion::Soap12 => write!(f, "SOAP 1.2"),
        }
    }
}

/// Which side of the exchange a fault blames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultCode {
    /// The request was wrong (`Client` / `Sender`)
    Client,
    /// The service failed (`Server` / `Receiver`)
    Server,
    /// The envelope namespace is not the expected one
    VersionMismatch,
    /// A mandatory header was not understood
    MustUnderstand,
    /// Unsupported data encoding (SOAP 1.2)
    DataEncodingUnknown,
}

impl FaultCode {
    /// Code name used by SOAP 1.1
    pub fn soap11_name(&self) -> &'static str {
        match self {
            FaultCode::Client => "Client",
            FaultCode::Server => "Server",
            FaultCode::VersionMismatch => "VersionMismatch",
            FaultCode::MustUnderstand => "MustUnderstand",
            FaultCode::DataEncodingUnknown => "Client",
        }
    }

    /// Code name used by SOAP 1.2
    pub fn soap12_name(&self) -> &'static str {
        match self {
            FaultCode::Client => "Sender",
            FaultCode::Server => "Receiver",
            FaultCode::VersionMismatch => "VersionMismatch",
            FaultCode::MustUnderstand => "MustUnderstand",
            FaultCode::DataEncodingUnknown => "DataEncodingUnknown",
        }
    }

    /// Code from its local name in either version
    pub fn from_wire(name: &str) -> Option<Self> {
        match name {
            "Client" | "Sender" => Some(FaultCode::Client),
            "Server" | "Receiver" => Some(FaultCode::Server),
            "VersionMismatch" => Some(FaultCode::VersionMismatch),
            "MustUnderstand" => Some(FaultCode::MustUnderstand),
            "DataEncodingUnknown" => Some(FaultCode::DataEncodingUnknown),
            _ => None,
        }
    }
}

impl fmt::Display for FaultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaultCode::DataEncodingUnknown => f.write_str("DataEncodingUnknown"),
            other => f.write_str(other.soap11_name()),
        }
    }
}

/// A SOAP fault as an error value
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct SoapError {
    /// Fault code
    pub code: FaultCode,
    /// Human readable message
    pub message: String,
    /// URI of the node that raised the fault
    pub actor: Option<String>,
}

impl SoapError {
    /// Create a fault
    pub fn new(code: FaultCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            actor: None,
        }
    }

    /// Fault blaming the request
    pub fn client(message: impl Into<String>) -> Self {
        Self::new(FaultCode::Client, message)
    }

    /// Fault blaming the service
    pub fn server(message: impl Into<String>) -> Self {
        Self::new(FaultCode::Server, message)
    }

    /// Set the faulting actor
    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }
}

// =============================================================================
// HTTP headers
// =============================================================================

/// HTTP headers with case-insensitive names, in insertion order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpHeaders {
    entries: IndexMap<String, String>,
}

impl HttpHeaders {
    /// Empty header set
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a header, replacing any previous value
    pub fn insert(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        self.entries
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
    }

    /// Builder form of [`HttpHeaders::insert`]
    pub fn with(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    /// Header value
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Whether no header is set
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over lowercased names and values
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for HttpHeaders {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = HttpHeaders::new();
        for (name, value) in iter {
            headers.insert(name, value);
        }
        headers
    }
}

fn unquote(value: &str) -> &str {
    value.trim().trim_matches('"')
}

// =============================================================================
// Envelope model
// =============================================================================

/// Envelope, Body and Fault types of one SOAP version
#[derive(Debug)]
pub struct EnvelopeModel {
    version: SoapVersion,
    schema: Arc<Schema>,
    envelope: Arc<ComplexType>,
    body: Arc<ComplexType>,
    fault: Arc<ComplexType>,
}

impl EnvelopeModel {
    pub(crate) fn new(
        version: SoapVersion,
        schema: Arc<Schema>,
        envelope: Arc<ComplexType>,
        body: Arc<ComplexType>,
        fault: Arc<ComplexType>,
    ) -> Self {
        Self {
            version,
            schema,
            envelope,
            body,
            fault,
        }
    }

    /// Protocol version
    pub fn version(&self) -> SoapVersion {
        self.version
    }

    /// Schema binding the envelope types to the envelope namespace
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Envelope type
    pub fn envelope_type(&self) -> &Arc<ComplexType> {
        &self.envelope
    }

    /// Body type
    pub fn body_type(&self) -> &Arc<ComplexType> {
        &self.body
    }

    /// Fault type
    pub fn fault_type(&self) -> &Arc<ComplexType> {
        &self.fault
    }

    fn qname(&self, local: &str) -> QName {
        QName::namespaced(self.version.envelope_namespace(), local)
    }

    /// Envelope instance holding a payload or a fault, and an optional header
    ///
    /// The payload is a self-naming value: a [`NamedValue`], an instance of a
    /// named type or a complete XML element.
    pub fn build(
        &self,
        payload: Option<Value>,
        fault: Option<Instance>,
        header: Option<Value>,
    ) -> Result<Instance> {
        let mut body = Instance::new(&self.body);
        if let Some(payload) = payload {
            body.set("message", payload)?;
        }
        if let Some(fault) = fault {
            body.set("Fault", fault)?;
        }
        let mut envelope = Instance::new(&self.envelope);
        if let Some(header) = header {
            envelope.set("Header", header)?;
        }
        envelope.set("Body", body)?;
        Ok(envelope)
    }

    /// Render an envelope instance
    pub fn to_element(&self, envelope: &Instance) -> Result<Element> {
        let mut root = Element::new(self.qname("Envelope"));
        root.declare_namespace(self.version.prefix(), self.version.envelope_namespace());
        let ctx = RenderContext::new(
            Some(self.version.envelope_namespace()),
            ElementForm::Qualified,
        );
        envelope.render(&mut root, &ctx)?;
        Ok(root)
    }

    /// Serialize an envelope instance
    pub fn serialize(&self, envelope: &Instance) -> Result<String> {
        self.to_element(envelope)?.to_xml_string()
    }

    /// Envelope carrying `payload` under `tag`
    pub fn response(
        &self,
        tag: &QName,
        payload: impl Into<Value>,
        header: Option<Value>,
    ) -> Result<String> {
        let named = NamedValue::new(tag.namespace(), tag.local_name.clone(), payload);
        let envelope = self.build(Some(named.into()), None, header)?;
        self.serialize(&envelope)
    }

    /// Fault instance describing `err`
    pub fn fault(&self, err: &SoapError) -> Result<Instance> {
        match self.version {
            SoapVersion::Soap11 => soap11::fault_instance(self, err),
            SoapVersion::Soap12 => soap12::fault_instance(self, err),
        }
    }

    /// Envelope carrying a fault
    pub fn error_response(
        &self,
        code: FaultCode,
        message: &str,
        header: Option<Value>,
        actor: Option<&str>,
    ) -> Result<String> {
        let mut err = SoapError::new(code, message);
        if let Some(actor) = actor {
            err = err.with_actor(actor);
        }
        let fault = self.fault(&err)?;
        let envelope = self.build(None, Some(fault), header)?;
        self.serialize(&envelope)
    }

    /// Parse an inbound envelope
    ///
    /// Malformed XML, a foreign root or a missing Body fail with a client
    /// fault before any field is looked at; an envelope of the other SOAP
    /// version fails with `VersionMismatch`.
    pub fn parse_envelope(&self, xml: &[u8], limits: &Limits) -> Result<SoapEnvelope> {
        let root = Element::parse_with_limits(xml, limits)
            .map_err(|e| SoapError::client(format!("Malformed XML: {}", e)))?;
        self.from_element(root)
    }

    /// Read an already parsed envelope
    pub fn from_element(&self, root: Element) -> Result<SoapEnvelope> {
        let namespace = self.version.envelope_namespace();
        if root.local_name() == "Envelope" {
            if let Some(other) = root.namespace().and_then(SoapVersion::from_namespace) {
                if other != self.version {
                    return Err(SoapError::new(
                        FaultCode::VersionMismatch,
                        format!("Expected a {} envelope, got {}", self.version, other),
                    )
                    .into());
                }
            }
        }

        let has_body = root.qname.matches(Some(namespace), "Envelope")
            && root
                .children
                .iter()
                .any(|c| c.qname.matches(Some(namespace), "Body"));
        if !has_body {
            return Err(SoapError::client("Missing SOAP body").into());
        }

        let instance = ComplexType::parse_xmlelement(&self.envelope, &root).map_err(|e| match e {
            Error::Soap(fault) => Error::Soap(fault),
            other => Error::Soap(SoapError::client(other.to_string())),
        })?;
        Ok(SoapEnvelope {
            version: self.version,
            instance,
            root,
        })
    }
}

/// A parsed envelope
#[derive(Debug, Clone)]
pub struct SoapEnvelope {
    version: SoapVersion,
    instance: Instance,
    root: Element,
}

impl SoapEnvelope {
    /// Protocol version
    pub fn version(&self) -> SoapVersion {
        self.version
    }

    /// Envelope instance
    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    /// Envelope element as received
    pub fn root(&self) -> &Element {
        &self.root
    }

    /// `Header` element, if present and not nil
    pub fn header(&self) -> Option<&Element> {
        self.instance.get("Header").and_then(Value::as_xml)
    }

    /// Body instance
    pub fn body(&self) -> Option<&Instance> {
        self.instance.get_instance("Body")
    }

    /// Application payload of the Body
    pub fn payload(&self) -> Option<&Element> {
        self.body()?.get("message").and_then(Value::as_xml)
    }

    /// Fault of the Body
    pub fn fault(&self) -> Option<&Instance> {
        self.body()?.get_instance("Fault")
    }

    /// Fault of the Body as an error value
    pub fn fault_error(&self) -> Option<SoapError> {
        self.fault().map(|f| self.version.parse_fault_message(f))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xsd::fields::Field;
    use crate::xsd::simple::Primitive;

    #[test]
    fn test_headers_are_case_insensitive() {
        let headers: HttpHeaders = [("SOAPAction", "\"echo\"")].into_iter().collect();
        assert_eq!(headers.get("soapaction"), Some("\"echo\""));
        assert_eq!(headers.get("SOAPACTION"), Some("\"echo\""));
    }

    #[test]
    fn test_fault_code_names() {
        assert_eq!(FaultCode::Client.soap12_name(), "Sender");
        assert_eq!(FaultCode::from_wire("Receiver"), Some(FaultCode::Server));
        assert_eq!(FaultCode::from_wire("Bogus"), None);
        assert_eq!(SoapError::client("bad").to_string(), "Client: bad");
    }

    #[test]
    fn test_response_wraps_payload() {
        let ty = ComplexType::builder("EchoResponse")
            .field(Field::element("value", Primitive::String))
            .build()
            .unwrap();
        let payload = Instance::with_values(&ty, [("value", "foobar")]).unwrap();

        for version in [SoapVersion::Soap11, SoapVersion::Soap12] {
            let model = version.model().unwrap();
            let xml = model
                .response(&QName::local("echoResponse"), payload.clone(), None)
                .unwrap();
            assert!(xml.contains("<echoResponse><value>foobar</value></echoResponse>"));

            let envelope = model.parse_envelope(xml.as_bytes(), &Limits::default()).unwrap();
            assert_eq!(envelope.payload().unwrap().local_name(), "echoResponse");
            assert!(envelope.fault().is_none());
        }
    }

    #[test]
    fn test_missing_body() {
        let model = SoapVersion::Soap11.model().unwrap();
        for xml in [
            "<some>xml</some>",
            r#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/"><some>xml</some></soap:Envelope>"#,
        ] {
            let err = model.parse_envelope(xml.as_bytes(), &Limits::default()).unwrap_err();
            assert!(matches!(
                err,
                Error::Soap(f) if f.code == FaultCode::Client && f.message == "Missing SOAP body"
            ));
        }
    }

    #[test]
    fn test_version_mismatch() {
        let model = SoapVersion::Soap12.model().unwrap();
        let xml = r#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/"><soap:Body/></soap:Envelope>"#;
        let err = model.parse_envelope(xml.as_bytes(), &Limits::default()).unwrap_err();
        assert!(matches!(err, Error::Soap(f) if f.code == FaultCode::VersionMismatch));
    }

    #[test]
    fn test_malformed_xml_is_client_fault() {
        let model = SoapVersion::Soap11.model().unwrap();
        let err = model.parse_envelope(b"<soap:Envelope", &Limits::default()).unwrap_err();
        assert!(matches!(err, Error::Soap(f) if f.code == FaultCode::Client));
    }
}
