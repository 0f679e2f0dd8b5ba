//! # soapschema
//!
//! SOAP 1.1 and 1.2 services built on a declarative XML Schema object model.
//!
//! Structured types are declared as [`ComplexType`]s made of [`Field`]
//! descriptors over primitive [`SimpleType`]s. A [`Schema`] binds them to a
//! target namespace, resolves named type references and validates whole
//! documents. [`SoapService`]s pair those schemas with handler methods and a
//! [`SoapDispatcher`] runs the SOAP exchange: envelope parsing, routing by
//! action or root tag, validation, invocation and fault reporting.
//!
//! ## Features
//!
//! - Primitive types with XSD facets (length, pattern, enumeration, ranges, digits)
//! - Sequence, choice and all content models, attribute and element groups
//! - Type extension and substitution groups
//! - Document validation with element paths in errors
//! - XSD and WSDL 1.1 generation
//! - SOAP 1.1 and 1.2 envelopes and faults
//! - Dispatcher hooks and middlewares, client stub over a pluggable transport
//!
//! ## Example
//!
//! ```rust,ignore
//! use soapschema::{ComplexType, Field, Instance, MethodResponse, Primitive, Schema};
//! use soapschema::{SoapDispatcher, SoapMethod, SoapRequest, SoapService};
//!
//! let request = ComplexType::builder("EchoRequest")
//!     .field(Field::element("value", Primitive::String))
//!     .build()?;
//! let schema = Schema::builder()
//!     .complex_type(request.clone())
//!     .element(Field::element("echoRequest", request.clone()))
//!     .element(Field::element("echoResponse", request))
//!     .build()?;
//! let service = SoapService::builder("Echo")
//!     .schema(schema)
//!     .method(SoapMethod::new("echo", "echoRequest", "echoResponse", |_, input| {
//!         Ok(MethodResponse::new(input))
//!     }))
//!     .build()?;
//!
//! let dispatcher = SoapDispatcher::new(service)?;
//! let response = dispatcher.dispatch(SoapRequest::post(envelope_bytes))?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Foundation
pub mod error;
pub mod limits;

// XML names and documents
pub mod names;
pub mod namespaces;
pub mod documents;

// Schema object model
pub mod xsd;

// SOAP protocol
pub mod soap;
pub mod config;
pub mod service;
pub mod dispatch;
pub mod wsdl;
pub mod client;

// Re-exports for convenience
pub use client::{ClientResponse, SoapClient, Transport};
pub use config::DispatcherConfig;
pub use dispatch::{
    ExceptionToSoapFault, HookPayload, HookPoint, Middleware, Next, SoapDispatcher, SoapRequest,
    SoapResponse,
};
pub use documents::Element;
pub use error::{Error, Result, ValidationError};
pub use limits::Limits;
pub use namespaces::QName;
pub use service::{
    HandlerContext, HandlerError, HandlerResult, MethodResponse, SoapMethod, SoapService,
};
pub use soap::{EnvelopeModel, FaultCode, HttpHeaders, SoapEnvelope, SoapError, SoapVersion};
pub use xsd::{
    ComplexType, ElementForm, Field, Instance, MaxOccurs, ModelType, NamedValue, Primitive,
    Schema, SimpleType, Value,
};

/// Version of the soapschema library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
