//! Request dispatching
//!
//! [`SoapDispatcher`] turns an HTTP-shaped [`SoapRequest`] into a
//! [`SoapResponse`]. A POST goes through the SOAP state machine:
//!
//! 1. parse the envelope (malformed XML or a missing Body is a client fault)
//! 2. find the method by SOAP action, else by the payload's root tag
//! 3. validate and parse the header when a header type is declared
//! 4. validate and parse the payload with the method's input element
//! 5. invoke the handler through the middleware chain
//! 6. wrap the result (or the fault) in an envelope
//!
//! A GET serves the generated WSDL (`?wsdl`, `?singleWsdl`) or one of the
//! service's XSD documents (`?xsd=<key>`).

use crate::config::DispatcherConfig;
use crate::documents::Element;
use crate::error::{Error, Result};
use crate::soap::{EnvelopeModel, HttpHeaders, SoapEnvelope, SoapError};
use crate::service::{
    HandlerContext, HandlerError, HandlerResult, MethodResponse, SoapMethod, SoapService,
};
use crate::xsd::complex::{ComplexType, Instance};
use crate::xsd::export::schema_to_xsd;
use crate::xsd::validation::validate_element_against;
use crate::xsd::values::Value;
use crate::wsdl;
use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;

// =============================================================================
// Requests and responses
// =============================================================================

/// Inbound request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoapRequest {
    /// HTTP method
    pub method: String,
    /// HTTP headers
    pub headers: HttpHeaders,
    /// Query parameters in order; a bare key maps to an empty value
    pub query: IndexMap<String, String>,
    /// Raw body
    pub body: Vec<u8>,
    /// URL scheme the request arrived on
    pub scheme: String,
    /// Host the request was addressed to
    pub host: String,
}

impl SoapRequest {
    /// Request with an HTTP method and body
    pub fn new(method: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            method: method.into().to_ascii_uppercase(),
            headers: HttpHeaders::new(),
            query: IndexMap::new(),
            body: body.into(),
            scheme: "http".to_string(),
            host: "localhost".to_string(),
        }
    }

    /// POST carrying an envelope
    pub fn post(body: impl Into<Vec<u8>>) -> Self {
        Self::new("POST", body)
    }

    /// GET with a query string such as `wsdl` or `xsd=common.xsd`
    pub fn get(query: &str) -> Self {
        Self::new("GET", Vec::new()).with_query(query)
    }

    /// Add a header
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Replace the headers
    pub fn with_headers(mut self, headers: HttpHeaders) -> Self {
        self.headers = headers;
        self
    }

    /// Parse and append a query string
    pub fn with_query(mut self, query: &str) -> Self {
        let query = query.trim_start_matches('?');
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            self.query.insert(key.into_owned(), value.into_owned());
        }
        self
    }

    /// Set scheme and host
    pub fn with_origin(mut self, scheme: impl Into<String>, host: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self.host = host.into();
        self
    }
}

/// Outbound response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoapResponse {
    /// HTTP status
    pub status: u16,
    /// HTTP headers
    pub headers: HttpHeaders,
    /// Body
    pub body: Vec<u8>,
}

impl SoapResponse {
    /// Response with a status, content type and body
    pub fn new(status: u16, content_type: &str, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: HttpHeaders::new().with("Content-Type", content_type),
            body: body.into(),
        }
    }

    /// Plain-text response without SOAP content
    pub fn status_only(status: u16, message: &str) -> Self {
        Self::new(status, "text/plain", message.as_bytes().to_vec())
    }

    /// Body as text
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// `Content-Type` header
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("Content-Type")
    }
}

// =============================================================================
// Hooks and middlewares
// =============================================================================

/// Interception points of [`SoapDispatcher::dispatch`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookPoint {
    /// Before a SOAP POST is handled
    SoapRequest,
    /// After a SOAP POST was handled
    SoapResponse,
    /// Before the WSDL is served
    WsdlRequest,
    /// After the WSDL was rendered
    WsdlResponse,
    /// Before an XSD document is served
    XsdRequest,
    /// After an XSD document was rendered
    XsdResponse,
}

impl HookPoint {
    /// Hook name such as `soap-request`
    pub fn name(&self) -> &'static str {
        match self {
            HookPoint::SoapRequest => "soap-request",
            HookPoint::SoapResponse => "soap-response",
            HookPoint::WsdlRequest => "wsdl-request",
            HookPoint::WsdlResponse => "wsdl-response",
            HookPoint::XsdRequest => "xsd-request",
            HookPoint::XsdResponse => "xsd-response",
        }
    }

    /// Parse a hook name
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "soap-request" => Some(HookPoint::SoapRequest),
            "soap-response" => Some(HookPoint::SoapResponse),
            "wsdl-request" => Some(HookPoint::WsdlRequest),
            "wsdl-response" => Some(HookPoint::WsdlResponse),
            "xsd-request" => Some(HookPoint::XsdRequest),
            "xsd-response" => Some(HookPoint::XsdResponse),
            _ => None,
        }
    }

    /// Whether the hook receives the request (rather than the response)
    pub fn is_request(&self) -> bool {
        matches!(
            self,
            HookPoint::SoapRequest | HookPoint::WsdlRequest | HookPoint::XsdRequest
        )
    }
}

impl fmt::Display for HookPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Object passed through a hook
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookPayload {
    /// Request hooks receive and must return this
    Request(SoapRequest),
    /// Response hooks receive and must return this
    Response(SoapResponse),
}

/// Hook function
pub type Hook = Arc<dyn Fn(HookPoint, HookPayload) -> HookPayload + Send + Sync>;

/// Remainder of the middleware chain
pub struct Next<'a> {
    middlewares: &'a [Arc<dyn Middleware>],
    method: &'a SoapMethod,
    config: &'a DispatcherConfig,
}

impl<'a> Next<'a> {
    /// Run the rest of the chain, ending with the handler
    pub fn run(&self, ctx: &HandlerContext<'_>, input: Instance) -> HandlerResult {
        match self.middlewares.split_first() {
            Some((first, rest)) => first.handle(
                ctx,
                input,
                Next {
                    middlewares: rest,
                    method: self.method,
                    config: self.config,
                },
            ),
            None => self.method.invoke(ctx, input),
        }
    }

    /// Dispatcher configuration
    pub fn config(&self) -> &DispatcherConfig {
        self.config
    }
}

/// Wrapper around handler invocation
pub trait Middleware: Send + Sync {
    /// Handle one call; `next.run` continues the chain
    fn handle(&self, ctx: &HandlerContext<'_>, input: Instance, next: Next<'_>) -> HandlerResult;
}

/// Turns uncaught handler failures into Server faults
///
/// The failure text is only sent when the dispatcher runs in debug mode.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExceptionToSoapFault;

impl Middleware for ExceptionToSoapFault {
    fn handle(&self, ctx: &HandlerContext<'_>, input: Instance, next: Next<'_>) -> HandlerResult {
        match next.run(ctx, input) {
            Err(HandlerError::Failed(message)) => {
                tracing::warn!(
                    operation = ctx.method.operation_name(),
                    error = %message,
                    "handler failed"
                );
                let text = if next.config().debug {
                    format!("Internal Error: {}", message)
                } else {
                    "Internal Error".to_string()
                };
                Err(HandlerError::Fault(SoapError::server(text)))
            }
            other => other,
        }
    }
}

// =============================================================================
// Dispatcher
// =============================================================================

/// Routes requests of one service
pub struct SoapDispatcher {
    service: Arc<SoapService>,
    config: DispatcherConfig,
    middlewares: Vec<Arc<dyn Middleware>>,
    hooks: IndexMap<HookPoint, Hook>,
    wsdl: String,
    xsds: IndexMap<String, String>,
}

impl fmt::Debug for SoapDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SoapDispatcher")
            .field("service", &self.service.name())
            .field("config", &self.config)
            .field("middlewares", &self.middlewares.len())
            .field("hooks", &self.hooks.keys().collect::<Vec<_>>())
            .field("xsds", &self.xsds.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Outcome of the SOAP states before a response is built
enum Outcome<'a> {
    Payload(MethodResponse, &'a SoapMethod),
    Fault(SoapError),
}

impl SoapDispatcher {
    /// Dispatcher with the default configuration
    ///
    /// Renders the WSDL and XSD documents once; a schema that cannot be
    /// exported fails here.
    pub fn new(service: Arc<SoapService>) -> Result<Self> {
        Self::with_config(service, DispatcherConfig::default())
    }

    /// Dispatcher with an explicit configuration
    pub fn with_config(service: Arc<SoapService>, config: DispatcherConfig) -> Result<Self> {
        service.version().model()?;
        let wsdl = wsdl::generate_wsdl(&service)?;

        let mut xsds = IndexMap::new();
        for schema in service.schemas() {
            for reachable in schema.all_schemas() {
                let key = reachable
                    .location()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("schema{}.xsd", xsds.len()));
                if !xsds.contains_key(&key) {
                    xsds.insert(key, schema_to_xsd(reachable)?);
                }
            }
        }

        Ok(Self {
            service,
            config,
            middlewares: Vec::new(),
            hooks: IndexMap::new(),
            wsdl,
            xsds,
        })
    }

    /// Append a middleware; the first added runs outermost
    pub fn with_middleware(mut self, middleware: impl Middleware + 'static) -> Self {
        self.middlewares.push(Arc::new(middleware));
        self
    }

    /// Install a hook, replacing any previous one at the same point
    pub fn with_hook<F>(mut self, point: HookPoint, hook: F) -> Self
    where
        F: Fn(HookPoint, HookPayload) -> HookPayload + Send + Sync + 'static,
    {
        self.hooks.insert(point, Arc::new(hook));
        self
    }

    /// Service being dispatched
    pub fn service(&self) -> &Arc<SoapService> {
        &self.service
    }

    /// Active configuration
    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Keys accepted by `?xsd=`
    pub fn xsd_keys(&self) -> impl Iterator<Item = &str> {
        self.xsds.keys().map(String::as_str)
    }

    /// Handle one request
    ///
    /// Protocol failures and handler faults come back as fault responses.
    /// An `Err` means a configuration problem (such as a hook returning the
    /// wrong object) or a handler failure that no middleware converted.
    pub fn dispatch(&self, request: SoapRequest) -> Result<SoapResponse> {
        if request.method == "GET" {
            if request.query.contains_key("wsdl") || request.query.contains_key("singleWsdl") {
                let request = self.run_request_hook(HookPoint::WsdlRequest, request)?;
                let response = self.handle_wsdl_request(&request);
                return self.run_response_hook(HookPoint::WsdlResponse, response);
            }
            if request.query.contains_key("xsd") {
                let request = self.run_request_hook(HookPoint::XsdRequest, request)?;
                let response = self.handle_xsd_request(&request);
                return self.run_response_hook(HookPoint::XsdResponse, response);
            }
            return Ok(SoapResponse::status_only(404, "Not Found"));
        }
        if request.method != "POST" {
            return Ok(SoapResponse::status_only(400, "Bad Request"));
        }

        let request = self.run_request_hook(HookPoint::SoapRequest, request)?;
        let response = self.handle_soap_request(&request)?;
        self.run_response_hook(HookPoint::SoapResponse, response)
    }

    fn run_request_hook(&self, point: HookPoint, request: SoapRequest) -> Result<SoapRequest> {
        let Some(hook) = self.hooks.get(&point) else {
            return Ok(request);
        };
        tracing::debug!(hook = %point, "running hook");
        match hook(point, HookPayload::Request(request)) {
            HookPayload::Request(request) => Ok(request),
            HookPayload::Response(_) => Err(Error::Schema(format!(
                "Hook '{}' must return a request",
                point
            ))),
        }
    }

    fn run_response_hook(&self, point: HookPoint, response: SoapResponse) -> Result<SoapResponse> {
        let Some(hook) = self.hooks.get(&point) else {
            return Ok(response);
        };
        tracing::debug!(hook = %point, "running hook");
        match hook(point, HookPayload::Response(response)) {
            HookPayload::Response(response) => Ok(response),
            HookPayload::Request(_) => Err(Error::Schema(format!(
                "Hook '{}' must return a response",
                point
            ))),
        }
    }

    fn handle_wsdl_request(&self, request: &SoapRequest) -> SoapResponse {
        let wsdl = wsdl::substitute_location(&self.wsdl, &request.scheme, &request.host);
        SoapResponse::new(200, "text/xml", wsdl.into_bytes())
    }

    fn handle_xsd_request(&self, request: &SoapRequest) -> SoapResponse {
        let key = request.query.get("xsd").map(String::as_str).unwrap_or_default();
        match self.xsds.get(key) {
            Some(xsd) => SoapResponse::new(200, "text/xml", xsd.clone().into_bytes()),
            None => {
                tracing::debug!(key, "unknown xsd key");
                SoapResponse::status_only(404, "Not Found")
            }
        }
    }

    fn handle_soap_request(&self, request: &SoapRequest) -> Result<SoapResponse> {
        let version = self.service.version();
        let model = version.model()?;

        match self.process(model, request)? {
            Outcome::Payload(response, method) => {
                match self.build_payload_response(model, response, method) {
                    Ok(body) => {
                        tracing::debug!(operation = method.operation_name(), "dispatch succeeded");
                        Ok(SoapResponse::new(200, version.content_type(), body.into_bytes()))
                    }
                    Err(fault) => self.fault_response(model, &fault),
                }
            }
            Outcome::Fault(fault) => self.fault_response(model, &fault),
        }
    }

    fn fault_response(&self, model: &EnvelopeModel, fault: &SoapError) -> Result<SoapResponse> {
        tracing::debug!(code = %fault.code, message = %fault.message, "dispatch fault");
        let body = model.error_response(fault.code, &fault.message, None, fault.actor.as_deref())?;
        Ok(SoapResponse::new(
            500,
            model.version().content_type(),
            body.into_bytes(),
        ))
    }

    /// States from envelope parsing to invocation
    fn process(&self, model: &EnvelopeModel, request: &SoapRequest) -> Result<Outcome<'_>> {
        let envelope = match model.parse_envelope(&request.body, &self.config.limits) {
            Ok(envelope) => envelope,
            Err(Error::Soap(fault)) => return Ok(Outcome::Fault(fault)),
            Err(other) if other.is_client_error() => {
                return Ok(Outcome::Fault(SoapError::client(other.to_string())))
            }
            Err(other) => return Ok(Outcome::Fault(SoapError::server(other.to_string()))),
        };

        let payload = match (envelope.payload(), envelope.fault()) {
            (Some(payload), None) => payload,
            (None, _) => return Ok(Outcome::Fault(SoapError::client("Missing SOAP body"))),
            (Some(_), Some(_)) => {
                return Ok(Outcome::Fault(SoapError::client(
                    "Body must carry either a payload or a fault",
                )))
            }
        };

        let soap_action = self.service.version().determine_soap_action(&request.headers);
        let method = match self.find_method(soap_action.as_deref(), payload) {
            Ok(method) => method,
            Err(fault) => return Ok(Outcome::Fault(fault)),
        };
        tracing::debug!(
            action = soap_action.as_deref().unwrap_or_default(),
            operation = method.operation_name(),
            "method selected"
        );

        let soap_header = match self.parse_header(&envelope, method) {
            Ok(header) => header,
            Err(fault) => return Ok(Outcome::Fault(fault)),
        };

        let input = match self.parse_input(method, payload) {
            Ok(input) => input,
            Err(fault) => return Ok(Outcome::Fault(fault)),
        };

        let ctx = HandlerContext {
            service: &self.service,
            method,
            soap_action: soap_action.as_deref(),
            header_element: envelope.header(),
            soap_header,
        };
        let next = Next {
            middlewares: &self.middlewares,
            method,
            config: &self.config,
        };
        match next.run(&ctx, input) {
            Ok(response) => Ok(Outcome::Payload(response, method)),
            Err(HandlerError::Fault(fault)) => Ok(Outcome::Fault(fault)),
            Err(HandlerError::Failed(message)) => Err(Error::Handler(message)),
        }
    }

    fn find_method(
        &self,
        soap_action: Option<&str>,
        payload: &Element,
    ) -> std::result::Result<&SoapMethod, SoapError> {
        if let Some(action) = soap_action {
            return self
                .service
                .method_by_action(action)
                .ok_or_else(|| SoapError::client(format!("Invalid SOAP action '{}'", action)));
        }

        if let Some(method) = self.service.method_by_input(&payload.qname) {
            return Ok(method);
        }

        // A substitution group member routes to the method reading its head.
        let head = self
            .service
            .find_element_qname(&payload.qname)
            .and_then(|(_, field)| field.substitution_group.as_deref())
            .map(crate::names::local_part);
        head.and_then(|head| self.service.methods().find(|m| m.input() == head))
            .ok_or_else(|| SoapError::client("Missing SOAP action and invalid root tag"))
    }

    fn parse_header(
        &self,
        envelope: &SoapEnvelope,
        method: &SoapMethod,
    ) -> std::result::Result<Option<Instance>, SoapError> {
        let (Some(ty), Some(header)) = (self.service.input_header_for(method), envelope.header())
        else {
            return Ok(None);
        };
        if self.config.validate_requests {
            if let Some(schema) = self.service.header_schema() {
                validate_element_against(ty, header, schema)
                    .map_err(|e| SoapError::client(e.to_string()))?;
            }
        }
        ComplexType::parse_xmlelement(ty, header)
            .map(Some)
            .map_err(|e| SoapError::client(e.to_string()))
    }

    fn parse_input(
        &self,
        method: &SoapMethod,
        payload: &Element,
    ) -> std::result::Result<Instance, SoapError> {
        if self.config.validate_requests {
            self.service
                .validate_message(payload)
                .map_err(|e| SoapError::client(e.to_string()))?;
        }
        let ty = self
            .service
            .message_type(method.input())
            .map_err(|e| SoapError::server(e.to_string()))?;
        ComplexType::parse_xmlelement(&ty, payload).map_err(|e| SoapError::client(e.to_string()))
    }

    fn build_payload_response(
        &self,
        model: &EnvelopeModel,
        response: MethodResponse,
        method: &SoapMethod,
    ) -> std::result::Result<String, SoapError> {
        let server = |e: Error| {
            tracing::warn!(operation = method.operation_name(), error = %e, "invalid response");
            SoapError::server(format!("Invalid response: {}", e))
        };

        let output_type = self.service.message_type(method.output()).map_err(server)?;
        if !response.payload.ty().is_subtype_of(&output_type) {
            return Err(server(Error::Type(format!(
                "Expected an instance of '{}'",
                output_type.name().unwrap_or("(anonymous)")
            ))));
        }
        let tag = self
            .service
            .element_qname(method.output())
            .ok_or_else(|| SoapError::server(format!("Unknown element '{}'", method.output())))?;
        let element = response.payload.to_element(tag).map_err(server)?;

        if self.config.validate_responses {
            self.service.validate_message(&element).map_err(server)?;
            if let (Some(ty), Some(Value::Complex(header))) = (
                self.service.output_header_for(method),
                response.header.as_ref(),
            ) {
                if !header.ty().is_subtype_of(ty) {
                    return Err(server(Error::Type(
                        "Response header has the wrong type".to_string(),
                    )));
                }
            }
        }

        model
            .build(Some(Value::Xml(element)), None, response.header)
            .and_then(|envelope| model.serialize(&envelope))
            .map_err(server)
    }
}
