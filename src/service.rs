//! Service and method declarations
//!
//! A [`SoapService`] groups the schemas describing its messages with the
//! [`SoapMethod`]s that handle them. Methods name their input and output by
//! top-level element; the element's structured type is what handlers receive
//! and return.

use crate::documents::Element;
use crate::error::{Error, Result};
use crate::namespaces::QName;
use crate::soap::{SoapError, SoapVersion};
use crate::xsd::complex::{ComplexType, Instance};
use crate::xsd::fields::Field;
use crate::xsd::schema::Schema;
use crate::xsd::values::Value;
use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

// =============================================================================
// Handlers
// =============================================================================

/// What a handler sees besides its parsed input
#[derive(Debug)]
pub struct HandlerContext<'a> {
    /// Service being dispatched
    pub service: &'a SoapService,
    /// Selected method
    pub method: &'a SoapMethod,
    /// SOAP action carried by the transport, if any
    pub soap_action: Option<&'a str>,
    /// Raw `Header` element of the request
    pub header_element: Option<&'a Element>,
    /// Header parsed with the declared input header type
    pub soap_header: Option<Instance>,
}

/// Payload returned by a handler, with an optional output header
#[derive(Debug, Clone)]
pub struct MethodResponse {
    /// Response payload, an instance of the output element's type
    pub payload: Instance,
    /// Content of the response `Header`
    pub header: Option<Value>,
}

impl MethodResponse {
    /// Response without header
    pub fn new(payload: Instance) -> Self {
        Self { payload, header: None }
    }

    /// Attach an output header
    pub fn with_header(mut self, header: impl Into<Value>) -> Self {
        self.header = Some(header.into());
        self
    }
}

impl From<Instance> for MethodResponse {
    fn from(payload: Instance) -> Self {
        Self::new(payload)
    }
}

/// Failure reported by a handler
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HandlerError {
    /// An explicit fault, always sent to the caller
    #[error(transparent)]
    Fault(#[from] SoapError),

    /// Any other failure; only a middleware turns it into a fault
    #[error("{0}")]
    Failed(String),
}

impl HandlerError {
    /// Failure with a message
    pub fn failed(message: impl Into<String>) -> Self {
        HandlerError::Failed(message.into())
    }
}

impl From<Error> for HandlerError {
    fn from(err: Error) -> Self {
        match err {
            Error::Soap(fault) => HandlerError::Fault(fault),
            other => HandlerError::Failed(other.to_string()),
        }
    }
}

/// Result of a handler invocation
pub type HandlerResult = std::result::Result<MethodResponse, HandlerError>;

/// Shared handler function
pub type Handler = Arc<dyn Fn(&HandlerContext<'_>, Instance) -> HandlerResult + Send + Sync>;

// =============================================================================
// Methods
// =============================================================================

/// One operation of a service
#[derive(Clone)]
pub struct SoapMethod {
    operation_name: String,
    soap_action: String,
    input: String,
    output: String,
    input_header: Option<Arc<ComplexType>>,
    output_header: Option<Arc<ComplexType>>,
    handler: Handler,
}

impl SoapMethod {
    /// Method reading element `input` and answering with element `output`
    ///
    /// The SOAP action defaults to the operation name.
    pub fn new<F>(
        operation_name: impl Into<String>,
        input: impl Into<String>,
        output: impl Into<String>,
        handler: F,
    ) -> Self
    where
        F: Fn(&HandlerContext<'_>, Instance) -> HandlerResult + Send + Sync + 'static,
    {
        let operation_name = operation_name.into();
        Self {
            soap_action: operation_name.clone(),
            operation_name,
            input: input.into(),
            output: output.into(),
            input_header: None,
            output_header: None,
            handler: Arc::new(handler),
        }
    }

    /// Set the SOAP action
    pub fn with_soap_action(mut self, action: impl Into<String>) -> Self {
        self.soap_action = action.into();
        self
    }

    /// Type of the request header, overriding the service's
    pub fn with_input_header(mut self, ty: Arc<ComplexType>) -> Self {
        self.input_header = Some(ty);
        self
    }

    /// Type of the response header, overriding the service's
    pub fn with_output_header(mut self, ty: Arc<ComplexType>) -> Self {
        self.output_header = Some(ty);
        self
    }

    /// Operation name
    pub fn operation_name(&self) -> &str {
        &self.operation_name
    }

    /// SOAP action
    pub fn soap_action(&self) -> &str {
        &self.soap_action
    }

    /// Input element name
    pub fn input(&self) -> &str {
        &self.input
    }

    /// Output element name
    pub fn output(&self) -> &str {
        &self.output
    }

    /// Declared input header type
    pub fn input_header(&self) -> Option<&Arc<ComplexType>> {
        self.input_header.as_ref()
    }

    /// Declared output header type
    pub fn output_header(&self) -> Option<&Arc<ComplexType>> {
        self.output_header.as_ref()
    }

    /// Call the handler
    pub fn invoke(&self, ctx: &HandlerContext<'_>, input: Instance) -> HandlerResult {
        (self.handler)(ctx, input)
    }
}

impl fmt::Debug for SoapMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SoapMethod")
            .field("operation_name", &self.operation_name)
            .field("soap_action", &self.soap_action)
            .field("input", &self.input)
            .field("output", &self.output)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Services
// =============================================================================

/// A set of methods sharing schemas, a namespace and a SOAP version
#[derive(Debug)]
pub struct SoapService {
    name: String,
    target_namespace: String,
    location: String,
    version: SoapVersion,
    schemas: Vec<Arc<Schema>>,
    methods: IndexMap<String, SoapMethod>,
    input_header: Option<Arc<ComplexType>>,
    output_header: Option<Arc<ComplexType>>,
}

/// Builder for [`SoapService`]
#[derive(Debug, Default)]
pub struct SoapServiceBuilder {
    name: String,
    target_namespace: Option<String>,
    location: Option<String>,
    version: SoapVersion,
    schemas: Vec<Arc<Schema>>,
    methods: Vec<SoapMethod>,
    input_header: Option<Arc<ComplexType>>,
    output_header: Option<Arc<ComplexType>>,
}

impl SoapServiceBuilder {
    /// Namespace of the WSDL definitions
    pub fn target_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.target_namespace = Some(namespace.into());
        self
    }

    /// Endpoint address; `${scheme}` and `${host}` are filled in when the
    /// WSDL is served
    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// SOAP version
    pub fn version(mut self, version: SoapVersion) -> Self {
        self.version = version;
        self
    }

    /// Schema describing messages
    pub fn schema(mut self, schema: Arc<Schema>) -> Self {
        self.schemas.push(schema);
        self
    }

    /// Add a method
    pub fn method(mut self, method: SoapMethod) -> Self {
        self.methods.push(method);
        self
    }

    /// Request header type of every method without its own
    pub fn input_header(mut self, ty: Arc<ComplexType>) -> Self {
        self.input_header = Some(ty);
        self
    }

    /// Response header type of every method without its own
    pub fn output_header(mut self, ty: Arc<ComplexType>) -> Self {
        self.output_header = Some(ty);
        self
    }

    /// Check method declarations against the schemas
    pub fn build(self) -> Result<Arc<SoapService>> {
        let target_namespace = self
            .target_namespace
            .or_else(|| self.schemas.first().and_then(|s| s.target_namespace().map(str::to_string)))
            .unwrap_or_else(|| format!("urn:{}", self.name));
        let location = self
            .location
            .unwrap_or_else(|| format!("${{scheme}}://${{host}}/{}", self.name));

        let mut service = SoapService {
            name: self.name,
            target_namespace,
            location,
            version: self.version,
            schemas: self.schemas,
            methods: IndexMap::new(),
            input_header: self.input_header,
            output_header: self.output_header,
        };

        for method in self.methods {
            for element in [method.input(), method.output()] {
                service.message_type(element).map_err(|e| {
                    Error::Schema(format!("Method '{}': {}", method.operation_name(), e))
                })?;
            }
            if service
                .methods
                .values()
                .any(|m| m.soap_action() == method.soap_action())
            {
                return Err(Error::Schema(format!(
                    "Duplicate SOAP action '{}'",
                    method.soap_action()
                )));
            }
            let name = method.operation_name().to_string();
            if service.methods.insert(name.clone(), method).is_some() {
                return Err(Error::Schema(format!("Duplicate operation '{}'", name)));
            }
        }

        tracing::debug!(
            service = %service.name,
            version = %service.version,
            methods = service.methods.len(),
            "service built"
        );
        Ok(Arc::new(service))
    }
}

impl SoapService {
    /// Start building a service
    pub fn builder(name: impl Into<String>) -> SoapServiceBuilder {
        SoapServiceBuilder {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Service name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Namespace of the WSDL definitions
    pub fn target_namespace(&self) -> &str {
        &self.target_namespace
    }

    /// Endpoint address, possibly with placeholders
    pub fn location(&self) -> &str {
        &self.location
    }

    /// SOAP version
    pub fn version(&self) -> SoapVersion {
        self.version
    }

    /// Schemas describing messages
    pub fn schemas(&self) -> &[Arc<Schema>] {
        &self.schemas
    }

    /// Methods in declaration order
    pub fn methods(&self) -> impl Iterator<Item = &SoapMethod> {
        self.methods.values()
    }

    /// Method by operation name
    pub fn method(&self, operation_name: &str) -> Option<&SoapMethod> {
        self.methods.get(operation_name)
    }

    /// Method by SOAP action
    pub fn method_by_action(&self, action: &str) -> Option<&SoapMethod> {
        self.methods.values().find(|m| m.soap_action() == action)
    }

    /// Method whose input element carries `tag`
    pub fn method_by_input(&self, tag: &QName) -> Option<&SoapMethod> {
        self.methods.values().find(|m| {
            self.element_qname(m.input())
                .map(|q| {
                    q.local_name == tag.local_name
                        && (tag.namespace.is_none() || q.namespace == tag.namespace)
                })
                .unwrap_or(false)
        })
    }

    /// Request header type of `method`
    pub fn input_header_for<'a>(&'a self, method: &'a SoapMethod) -> Option<&'a Arc<ComplexType>> {
        method.input_header().or(self.input_header.as_ref())
    }

    /// Response header type of `method`
    pub fn output_header_for<'a>(&'a self, method: &'a SoapMethod) -> Option<&'a Arc<ComplexType>> {
        method.output_header().or(self.output_header.as_ref())
    }

    /// Top-level element by name, searching every schema and its imports
    pub fn find_element(&self, name: &str) -> Option<(&Schema, &Arc<Field>)> {
        self.schemas.iter().find_map(|s| s.find_element(name))
    }

    /// Top-level element by qualified name
    pub fn find_element_qname(&self, qname: &QName) -> Option<(&Schema, &Arc<Field>)> {
        self.schemas.iter().find_map(|s| s.find_element_qname(qname))
    }

    /// Qualified tag of a top-level element
    pub fn element_qname(&self, name: &str) -> Option<QName> {
        self.find_element(name)
            .map(|(schema, field)| schema.element_qname(&field.name))
    }

    /// Structured type of a message element
    pub fn message_type(&self, element: &str) -> Result<Arc<ComplexType>> {
        let (_, field) = self
            .find_element(element)
            .ok_or_else(|| Error::Schema(format!("Unknown element '{}'", element)))?;
        field.xsd_type()?.as_complex().cloned().ok_or_else(|| {
            Error::Schema(format!("Element '{}' does not have a structured type", element))
        })
    }

    /// Validate a message element against the schema declaring it
    pub fn validate_message(&self, root: &Element) -> Result<()> {
        let schema = self
            .schemas
            .iter()
            .find(|s| s.find_element_qname(&root.qname).is_some())
            .ok_or_else(|| {
                Error::invalid(
                    format!("Unknown root element '{}'", root.qname),
                    format!("/{}", root.local_name()),
                )
            })?;
        schema.assert_valid(root)
    }

    /// Schema to resolve header types against
    pub(crate) fn header_schema(&self) -> Option<&Arc<Schema>> {
        self.schemas.first()
    }
}
