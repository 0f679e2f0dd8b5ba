//! SOAP 1.1 envelope types and transport conventions

use super::{unquote, EnvelopeModel, FaultCode, HttpHeaders, SoapError, SoapVersion};
use crate::error::Result;
use crate::names::local_part;
use crate::namespaces::SOAP11_ENVELOPE_NAMESPACE;
use crate::xsd::complex::{ComplexType, Instance};
use crate::xsd::fields::{Field, XsdType};
use crate::xsd::schema::{ElementForm, Schema};
use crate::xsd::simple::Primitive;

/// Content type of SOAP 1.1 messages
pub const CONTENT_TYPE: &str = "text/xml";

pub(crate) fn build_model() -> Result<EnvelopeModel> {
    // Fault children are unqualified in SOAP 1.1.
    let fault = ComplexType::builder("Fault")
        .field(Field::element("faultcode", Primitive::QName))
        .field(Field::element("faultstring", Primitive::String))
        .field(Field::element("faultactor", Primitive::AnyUri).optional())
        .field(Field::element("detail", XsdType::Any).optional())
        .build()?;
    fault.bind(None, ElementForm::Unqualified)?;

    let body = ComplexType::builder("Body")
        .field(Field::class_named("message", XsdType::Any).optional())
        .field(Field::element("Fault", fault.clone()).optional())
        .build()?;

    let envelope = ComplexType::builder("Envelope")
        .field(Field::element("Header", XsdType::Any).optional().nillable())
        .field(Field::element("Body", body.clone()))
        .build()?;

    let schema = Schema::builder()
        .target_namespace(SOAP11_ENVELOPE_NAMESPACE)
        .element_form_default(ElementForm::Qualified)
        .complex_type(body.clone())
        .complex_type(envelope.clone())
        .element(Field::element("Envelope", envelope.clone()))
        .build()?;

    Ok(EnvelopeModel::new(SoapVersion::Soap11, schema, envelope, body, fault))
}

pub(crate) fn fault_instance(model: &EnvelopeModel, err: &SoapError) -> Result<Instance> {
    let prefix = SoapVersion::Soap11.prefix();
    let mut fault = Instance::new(model.fault_type());
    fault.set("faultcode", format!("{}:{}", prefix, err.code.soap11_name()))?;
    fault.set("faultstring", err.message.clone())?;
    if let Some(actor) = &err.actor {
        fault.set("faultactor", actor.clone())?;
    }
    Ok(fault)
}

pub(crate) fn parse_fault_message(fault: &Instance) -> SoapError {
    let code = fault
        .get_str("faultcode")
        .map(local_part)
        .and_then(FaultCode::from_wire)
        .unwrap_or(FaultCode::Server);
    SoapError {
        code,
        message: fault.get_str("faultstring").unwrap_or_default().to_string(),
        actor: fault.get_str("faultactor").map(str::to_string),
    }
}

/// Action from the `SOAPAction` header
pub(crate) fn determine_soap_action(headers: &HttpHeaders) -> Option<String> {
    let raw = headers.get("SOAPAction").or_else(|| headers.get("Action"))?;
    let action = unquote(raw);
    (!action.is_empty()).then(|| action.to_string())
}

pub(crate) fn request_headers(action: &str) -> HttpHeaders {
    HttpHeaders::new()
        .with("Content-Type", format!("{}; charset=utf-8", CONTENT_TYPE))
        .with("SOAPAction", format!("\"{}\"", action))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limits::Limits;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_soap_action_header() {
        let headers: HttpHeaders = [("SOAPAction", "\"echo\"")].into_iter().collect();
        assert_eq!(determine_soap_action(&headers), Some("echo".to_string()));

        let headers: HttpHeaders = [("SOAPAction", "\"\"")].into_iter().collect();
        assert_eq!(determine_soap_action(&headers), None);
        assert_eq!(determine_soap_action(&HttpHeaders::new()), None);
    }

    #[test]
    fn test_request_headers() {
        let headers = request_headers("echo");
        assert_eq!(headers.get("content-type"), Some("text/xml; charset=utf-8"));
        assert_eq!(headers.get("soapaction"), Some("\"echo\""));
    }

    #[test]
    fn test_fault_rendering() {
        let model = SoapVersion::Soap11.model().unwrap();
        let xml = model
            .error_response(FaultCode::Client, "Bad input", None, Some("http://node"))
            .unwrap();
        assert!(xml.contains("<soap:Fault>"));
        assert!(xml.contains("<faultcode>soap:Client</faultcode>"));
        assert!(xml.contains("<faultstring>Bad input</faultstring>"));
        assert!(xml.contains("<faultactor>http://node</faultactor>"));

        let envelope = model.parse_envelope(xml.as_bytes(), &Limits::default()).unwrap();
        let err = envelope.fault_error().unwrap();
        assert_eq!(err.code, FaultCode::Client);
        assert_eq!(err.message, "Bad input");
        assert_eq!(err.actor.as_deref(), Some("http://node"));
    }

    #[test]
    fn test_server_fault_code() {
        let model = SoapVersion::Soap11.model().unwrap();
        let xml = model
            .error_response(FaultCode::Server, "boom", None, None)
            .unwrap();
        assert!(xml.contains("<faultcode>soap:Server</faultcode>"));
        assert!(!xml.contains("faultactor"));
    }
}
