//! SOAP 1.2 envelope types and transport conventions

use super::{unquote, EnvelopeModel, FaultCode, HttpHeaders, SoapError, SoapVersion};
use crate::error::{Error, Result};
use crate::names::local_part;
use crate::namespaces::SOAP12_ENVELOPE_NAMESPACE;
use crate::xsd::complex::{ComplexType, Instance};
use crate::xsd::fields::{Field, XsdType};
use crate::xsd::schema::{ElementForm, Schema};
use crate::xsd::simple::{Primitive, SimpleType};
use std::sync::Arc;

/// Content type of SOAP 1.2 messages
pub const CONTENT_TYPE: &str = "application/soap+xml";

pub(crate) fn build_model() -> Result<EnvelopeModel> {
    let code = ComplexType::anonymous()
        .field(Field::element("Value", Primitive::QName))
        .field(Field::element("Subcode", XsdType::Any).optional())
        .build()?;
    let reason = ComplexType::anonymous()
        .field(Field::element(
            "Text",
            SimpleType::new(Primitive::String).with_xml_lang("en"),
        ))
        .build()?;

    let fault = ComplexType::builder("Fault")
        .field(Field::element("Code", code))
        .field(Field::element("Reason", reason))
        .field(Field::element("Node", Primitive::AnyUri).optional())
        .field(Field::element("Role", Primitive::AnyUri).optional())
        .field(Field::element("Detail", XsdType::Any).optional())
        .build()?;

    let body = ComplexType::builder("Body")
        .field(Field::class_named("message", XsdType::Any).optional())
        .field(Field::element("Fault", fault.clone()).optional())
        .build()?;

    let envelope = ComplexType::builder("Envelope")
        .field(Field::element("Header", XsdType::Any).optional().nillable())
        .field(Field::element("Body", body.clone()))
        .build()?;

    let schema = Schema::builder()
        .target_namespace(SOAP12_ENVELOPE_NAMESPACE)
        .element_form_default(ElementForm::Qualified)
        .complex_type(fault.clone())
        .complex_type(body.clone())
        .complex_type(envelope.clone())
        .element(Field::element("Envelope", envelope.clone()))
        .build()?;

    Ok(EnvelopeModel::new(SoapVersion::Soap12, schema, envelope, body, fault))
}

fn member_type(fault: &Instance, name: &str) -> Result<Arc<ComplexType>> {
    let field = fault.ty().meta().get(name).ok_or_else(|| {
        Error::Type(format!("Fault has no '{}' field", name))
    })?;
    field
        .xsd_type()?
        .as_complex()
        .cloned()
        .ok_or_else(|| Error::Type(format!("Fault field '{}' is not structured", name)))
}

pub(crate) fn fault_instance(model: &EnvelopeModel, err: &SoapError) -> Result<Instance> {
    let mut fault = Instance::new(model.fault_type());

    let mut code = Instance::new(&member_type(&fault, "Code")?);
    code.set(
        "Value",
        format!("{}:{}", SoapVersion::Soap12.prefix(), err.code.soap12_name()),
    )?;
    let mut reason = Instance::new(&member_type(&fault, "Reason")?);
    reason.set("Text", err.message.clone())?;

    fault.set("Code", code)?;
    fault.set("Reason", reason)?;
    if let Some(actor) = &err.actor {
        fault.set("Role", actor.clone())?;
    }
    Ok(fault)
}

pub(crate) fn parse_fault_message(fault: &Instance) -> SoapError {
    let code = fault
        .get_instance("Code")
        .and_then(|c| c.get_str("Value"))
        .map(local_part)
        .and_then(FaultCode::from_wire)
        .unwrap_or(FaultCode::Server);
    let message = fault
        .get_instance("Reason")
        .and_then(|r| r.get_str("Text"))
        .unwrap_or_default()
        .to_string();
    SoapError {
        code,
        message,
        actor: fault.get_str("Role").map(str::to_string),
    }
}

/// Action from the `action` parameter of the content type
pub(crate) fn determine_soap_action(headers: &HttpHeaders) -> Option<String> {
    let content_type = headers.get("Content-Type")?;
    content_type
        .split(';')
        .skip(1)
        .filter_map(|param| param.split_once('='))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("action"))
        .map(|(_, value)| unquote(value).to_string())
        .filter(|action| !action.is_empty())
}

pub(crate) fn request_headers(action: &str) -> HttpHeaders {
    HttpHeaders::new().with(
        "Content-Type",
        format!("{};charset=utf-8;action=\"{}\"", CONTENT_TYPE, action),
    )
}
