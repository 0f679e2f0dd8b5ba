//! Client stub
//!
//! [`SoapClient`] renders a method's input into an envelope, hands it to a
//! [`Transport`] and reads the answer back with the method's output element.
//! A fault in the response comes back as [`Error::Soap`].

use crate::dispatch::{SoapDispatcher, SoapRequest, SoapResponse};
use crate::documents::Element;
use crate::error::{Error, Result};
use crate::limits::Limits;
use crate::service::SoapService;
use crate::xsd::complex::{ComplexType, Instance};
use crate::xsd::values::Value;
use std::sync::Arc;

/// Carries a request to a service and returns its response
pub trait Transport {
    /// Send one request
    fn send(&self, request: SoapRequest) -> Result<SoapResponse>;
}

/// In-process loopback
impl Transport for SoapDispatcher {
    fn send(&self, request: SoapRequest) -> Result<SoapResponse> {
        self.dispatch(request)
    }
}

impl<F> Transport for F
where
    F: Fn(SoapRequest) -> Result<SoapResponse>,
{
    fn send(&self, request: SoapRequest) -> Result<SoapResponse> {
        self(request)
    }
}

/// Parsed answer of a call
#[derive(Debug, Clone)]
pub struct ClientResponse {
    /// Instance of the output element's type
    pub payload: Instance,
    /// Response `Header` element, if any
    pub header: Option<Element>,
}

/// Calls the methods of a service through a transport
#[derive(Debug)]
pub struct SoapClient<T> {
    service: Arc<SoapService>,
    transport: T,
    limits: Limits,
}

impl<T: Transport> SoapClient<T> {
    /// Client for `service`
    pub fn new(service: Arc<SoapService>, transport: T) -> Self {
        Self {
            service,
            transport,
            limits: Limits::default(),
        }
    }

    /// Limits applied to response documents
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Transport in use
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Build the request for `operation` without sending it
    pub fn build_request(
        &self,
        operation: &str,
        input: &Instance,
        header: Option<Value>,
    ) -> Result<SoapRequest> {
        let method = self
            .service
            .method(operation)
            .ok_or_else(|| Error::Schema(format!("Unknown operation '{}'", operation)))?;
        let tag = self
            .service
            .element_qname(method.input())
            .ok_or_else(|| Error::Schema(format!("Unknown element '{}'", method.input())))?;
        let payload = input.to_element(tag)?;

        let version = self.service.version();
        let model = version.model()?;
        let envelope = model.build(Some(Value::Xml(payload)), None, header)?;
        let body = model.serialize(&envelope)?;
        Ok(SoapRequest::post(body).with_headers(version.request_headers(method.soap_action())))
    }

    /// Call `operation` with `input` and an optional request header
    pub fn call(
        &self,
        operation: &str,
        input: &Instance,
        header: Option<Value>,
    ) -> Result<ClientResponse> {
        let request = self.build_request(operation, input, header)?;
        tracing::debug!(operation, service = self.service.name(), "calling");

        let response = self.transport.send(request)?;
        let model = self.service.version().model()?;
        let envelope = model.parse_envelope(&response.body, &self.limits)?;
        if let Some(fault) = envelope.fault_error() {
            tracing::debug!(operation, code = %fault.code, "call returned a fault");
            return Err(Error::Soap(fault));
        }

        let payload = envelope
            .payload()
            .ok_or_else(|| Error::Xml("Response carries no payload".to_string()))?;
        let output = self
            .service
            .method(operation)
            .map(|m| m.output().to_string())
            .ok_or_else(|| Error::Schema(format!("Unknown operation '{}'", operation)))?;
        let ty = self.service.message_type(&output)?;
        Ok(ClientResponse {
            payload: ComplexType::parse_xmlelement(&ty, payload)?,
            header: envelope.header().cloned(),
        })
    }
}
