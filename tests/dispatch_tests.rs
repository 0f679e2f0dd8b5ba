//! Dispatcher integration tests
//!
//! Each test posts a raw envelope through a `SoapDispatcher` and checks the
//! HTTP status and the envelope that comes back.

use pretty_assertions::assert_eq;
use soapschema::{
    ComplexType, DispatcherConfig, Error, ExceptionToSoapFault, Field, HandlerError, Instance,
    MethodResponse, Primitive, Schema, SoapDispatcher, SoapError, SoapMethod, SoapRequest,
    SoapService, SoapVersion,
};
use std::sync::{Arc, Mutex};

const SOAP11_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";
const SOAP12_NS: &str = "http://www.w3.org/2003/05/soap-envelope";

struct Echo {
    service: Arc<SoapService>,
    seen: Arc<Mutex<Option<String>>>,
}

fn echo_service(version: SoapVersion) -> Echo {
    let request = ComplexType::builder("EchoRequest")
        .field(Field::element("value", Primitive::String))
        .build()
        .unwrap();
    let response = ComplexType::builder("EchoResponse")
        .field(Field::element("value", Primitive::String))
        .build()
        .unwrap();
    let schema = Schema::builder()
        .complex_type(request.clone())
        .complex_type(response.clone())
        .element(Field::element("echoRequest", request))
        .element(Field::element("echoResponse", response.clone()))
        .build()
        .unwrap();

    let seen = Arc::new(Mutex::new(None));
    let recorder = seen.clone();
    let reply = response.clone();
    let echo = SoapMethod::new("echoOperation", "echoRequest", "echoResponse", move |_ctx, input| {
        let value = input.get_str("value").unwrap_or_default().to_string();
        *recorder.lock().unwrap() = Some(value.clone());
        match value.as_str() {
            "fault" => Err(HandlerError::Fault(SoapError::server("Handler refused"))),
            "crash" => Err(HandlerError::failed("database is gone")),
            "broken" => Ok(MethodResponse::new(Instance::new(&reply))),
            _ => Ok(MethodResponse::new(Instance::with_values(&reply, [("value", value)])?)),
        }
    })
    .with_soap_action("echo");

    let service = SoapService::builder("EchoService")
        .version(version)
        .schema(schema)
        .method(echo)
        .build()
        .unwrap();
    Echo { service, seen }
}

fn auth_header() -> Arc<ComplexType> {
    ComplexType::builder("AuthHeader")
        .field(Field::element("token", Primitive::String))
        .build()
        .unwrap()
}

fn envelope(ns: &str, header: &str, body: &str) -> String {
    format!(
        r#"<soap:Envelope xmlns:soap="{ns}">{header}<soap:Body>{body}</soap:Body></soap:Envelope>"#
    )
}

fn post11(body: &str) -> SoapRequest {
    SoapRequest::post(envelope(SOAP11_NS, "", body))
}

#[test]
fn test_echo_by_soap_action() {
    let echo = echo_service(SoapVersion::Soap11);
    let dispatcher = SoapDispatcher::new(echo.service.clone()).unwrap();

    let request = post11("<echoRequest><value>foobar</value></echoRequest>")
        .with_header("SOAPACTION", "echo");
    let response = dispatcher.dispatch(request).unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.content_type(), Some("text/xml"));
    assert_eq!(echo.seen.lock().unwrap().as_deref(), Some("foobar"));
    assert!(response
        .text()
        .contains("<echoResponse><value>foobar</value></echoResponse>"));
}

#[test]
fn test_invalid_soap_action() {
    let echo = echo_service(SoapVersion::Soap11);
    let dispatcher = SoapDispatcher::new(echo.service).unwrap();

    let request = post11("<echoRequest><value>foobar</value></echoRequest>")
        .with_header("SOAPACTION", "invalid");
    let response = dispatcher.dispatch(request).unwrap();

    assert_eq!(response.status, 500);
    let text = response.text();
    assert!(text.contains("<faultcode>soap:Client</faultcode>"));
    assert!(text.contains("Invalid SOAP action"));
    assert!(echo.seen.lock().unwrap().is_none());
}

#[test]
fn test_missing_body() {
    let dispatcher = SoapDispatcher::new(echo_service(SoapVersion::Soap11).service).unwrap();

    let bare = dispatcher.dispatch(SoapRequest::post("<some>xml</some>")).unwrap();
    assert_eq!(bare.status, 500);
    assert!(bare.text().contains("Missing SOAP body"));

    let wrapped = format!(r#"<soap:Envelope xmlns:soap="{SOAP11_NS}"><some>xml</some></soap:Envelope>"#);
    let response = dispatcher.dispatch(SoapRequest::post(wrapped)).unwrap();
    assert_eq!(response.status, 500);
    assert!(response.text().contains("Missing SOAP body"));

    let empty = dispatcher.dispatch(post11("")).unwrap();
    assert_eq!(empty.status, 500);
    assert!(empty.text().contains("Missing SOAP body"));
}

#[test]
fn test_malformed_xml_is_client_fault() {
    let dispatcher = SoapDispatcher::new(echo_service(SoapVersion::Soap11).service).unwrap();
    let response = dispatcher.dispatch(SoapRequest::post("<soap:Envelope")).unwrap();
    assert_eq!(response.status, 500);
    assert!(response.text().contains("<faultcode>soap:Client</faultcode>"));
}

#[test]
fn test_root_tag_routing_without_action() {
    let echo = echo_service(SoapVersion::Soap11);
    let dispatcher = SoapDispatcher::new(echo.service).unwrap();

    let ok = dispatcher
        .dispatch(post11("<echoRequest><value>hi</value></echoRequest>"))
        .unwrap();
    assert_eq!(ok.status, 200);

    let unknown = dispatcher.dispatch(post11("<other/>")).unwrap();
    assert_eq!(unknown.status, 500);
    assert!(unknown.text().contains("Missing SOAP action and invalid root tag"));
}

#[test]
fn test_invalid_payload_is_client_fault() {
    let echo = echo_service(SoapVersion::Soap11);
    let dispatcher = SoapDispatcher::new(echo.service).unwrap();

    let request = post11("<echoRequest><wrong>x</wrong></echoRequest>")
        .with_header("SOAPAction", "\"echo\"");
    let response = dispatcher.dispatch(request).unwrap();
    assert_eq!(response.status, 500);
    assert!(response.text().contains("<faultcode>soap:Client</faultcode>"));
    assert!(echo.seen.lock().unwrap().is_none());
}

#[test]
fn test_request_validation_can_be_disabled() {
    let echo = echo_service(SoapVersion::Soap11);
    let config = DispatcherConfig::new().with_request_validation(false);
    let dispatcher = SoapDispatcher::with_config(echo.service, config).unwrap();

    let request = post11("<echoRequest><value>x</value><extra/></echoRequest>");
    let response = dispatcher.dispatch(request).unwrap();
    assert_eq!(response.status, 200);
}

#[test]
fn test_handler_fault() {
    let dispatcher = SoapDispatcher::new(echo_service(SoapVersion::Soap11).service).unwrap();
    let response = dispatcher
        .dispatch(post11("<echoRequest><value>fault</value></echoRequest>"))
        .unwrap();
    assert_eq!(response.status, 500);
    let text = response.text();
    assert!(text.contains("<faultcode>soap:Server</faultcode>"));
    assert!(text.contains("<faultstring>Handler refused</faultstring>"));
}

#[test]
fn test_handler_failure_needs_middleware() {
    let service = echo_service(SoapVersion::Soap11).service;
    let crash = "<echoRequest><value>crash</value></echoRequest>";

    let plain = SoapDispatcher::new(service.clone()).unwrap();
    let err = plain.dispatch(post11(crash)).unwrap_err();
    assert!(matches!(err, Error::Handler(m) if m.contains("database is gone")));

    let wrapped = SoapDispatcher::new(service.clone())
        .unwrap()
        .with_middleware(ExceptionToSoapFault);
    let response = wrapped.dispatch(post11(crash)).unwrap();
    assert_eq!(response.status, 500);
    let text = response.text();
    assert!(text.contains("<faultstring>Internal Error</faultstring>"));
    assert!(!text.contains("database is gone"));

    let debug = SoapDispatcher::with_config(service, DispatcherConfig::new().with_debug(true))
        .unwrap()
        .with_middleware(ExceptionToSoapFault);
    let response = debug.dispatch(post11(crash)).unwrap();
    assert!(response.text().contains("database is gone"));
}

#[test]
fn test_invalid_response_is_server_fault() {
    let service = echo_service(SoapVersion::Soap11).service;
    let broken = "<echoRequest><value>broken</value></echoRequest>";

    let dispatcher = SoapDispatcher::new(service.clone()).unwrap();
    let response = dispatcher.dispatch(post11(broken)).unwrap();
    assert_eq!(response.status, 500);
    assert!(response.text().contains("<faultcode>soap:Server</faultcode>"));

    let lenient = SoapDispatcher::with_config(
        service,
        DispatcherConfig::new().with_response_validation(false),
    )
    .unwrap();
    let response = lenient.dispatch(post11(broken)).unwrap();
    assert_eq!(response.status, 200);
    assert!(response.text().contains("<echoResponse/>"));
}

#[test]
fn test_soap12_action_from_content_type() {
    let echo = echo_service(SoapVersion::Soap12);
    let dispatcher = SoapDispatcher::new(echo.service).unwrap();

    let request = SoapRequest::post(envelope(
        SOAP12_NS,
        "",
        "<echoRequest><value>twelve</value></echoRequest>",
    ))
    .with_header("Content-Type", "application/soap+xml; charset=utf-8; action=\"echo\"");
    let response = dispatcher.dispatch(request).unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.content_type(), Some("application/soap+xml"));
    assert!(response.text().contains("<echoResponse><value>twelve</value></echoResponse>"));

    let body = envelope(SOAP12_NS, "", "<echoRequest><value>x</value></echoRequest>");
    let bad = SoapRequest::post(body)
        .with_header("Content-Type", "application/soap+xml; action=\"nope\"");
    let response = dispatcher.dispatch(bad).unwrap();
    assert_eq!(response.status, 500);
    let text = response.text();
    assert!(text.contains("<soap12:Value>soap12:Sender</soap12:Value>"));
    assert!(text.contains("Invalid SOAP action"));
}

#[test]
fn test_version_mismatch() {
    let dispatcher = SoapDispatcher::new(echo_service(SoapVersion::Soap12).service).unwrap();
    let response = dispatcher
        .dispatch(post11("<echoRequest><value>x</value></echoRequest>"))
        .unwrap();
    assert_eq!(response.status, 500);
    assert!(response.text().contains("soap12:VersionMismatch"));
}

#[test]
fn test_header_in_and_out() {
    let auth = auth_header();
    let request = ComplexType::builder("WhoAmI")
        .field(Field::element("value", Primitive::String).optional())
        .build()
        .unwrap();
    let schema = Schema::builder()
        .complex_type(request.clone())
        .complex_type(auth.clone())
        .element(Field::element("whoami", request.clone()))
        .element(Field::element("whoamiResponse", request.clone()))
        .build()
        .unwrap();
    let header_type = auth.clone();
    let reply = request.clone();
    let service = SoapService::builder("Auth")
        .schema(schema)
        .input_header(auth.clone())
        .output_header(auth)
        .method(SoapMethod::new("whoami", "whoami", "whoamiResponse", move |ctx, _| {
            let token = ctx
                .soap_header
                .as_ref()
                .and_then(|h| h.get_str("token"))
                .unwrap_or("anonymous")
                .to_string();
            let mut header = Instance::new(&header_type);
            header.set("token", "renewed")?;
            let payload = Instance::with_values(&reply, [("value", token)])?;
            Ok(MethodResponse::new(payload).with_header(header))
        }))
        .build()
        .unwrap();
    let dispatcher = SoapDispatcher::new(service).unwrap();

    let request = SoapRequest::post(envelope(
        SOAP11_NS,
        "<soap:Header><token>s3cret</token></soap:Header>",
        "<whoami/>",
    ));
    let response = dispatcher.dispatch(request).unwrap();
    assert_eq!(response.status, 200);
    let text = response.text();
    assert!(text.contains("<soap:Header><token>renewed</token></soap:Header>"));
    assert!(text.contains("<whoamiResponse><value>s3cret</value></whoamiResponse>"));

    let bad_header = SoapRequest::post(envelope(
        SOAP11_NS,
        "<soap:Header><ticket>1</ticket></soap:Header>",
        "<whoami/>",
    ));
    let response = dispatcher.dispatch(bad_header).unwrap();
    assert_eq!(response.status, 500);
    assert!(response.text().contains("<faultcode>soap:Client</faultcode>"));
}

#[test]
fn test_substitution_group_routing() {
    let animal = ComplexType::builder("Animal")
        .field(Field::element("name", Primitive::String))
        .build()
        .unwrap();
    let schema = Schema::builder()
        .target_namespace("urn:zoo")
        .complex_type(animal.clone())
        .element(Field::element("animal", animal.clone()))
        .element(Field::element("dog", animal.clone()).substitution_group("animal"))
        .element(Field::element("feedResponse", animal.clone()))
        .build()
        .unwrap();
    let reply = animal.clone();
    let service = SoapService::builder("Zoo")
        .schema(schema)
        .method(SoapMethod::new("feed", "animal", "feedResponse", move |_, input| {
            let name = input.get_str("name").unwrap_or_default().to_string();
            Ok(MethodResponse::new(Instance::with_values(&reply, [("name", name)])?))
        }))
        .build()
        .unwrap();
    let dispatcher = SoapDispatcher::new(service).unwrap();

    let response = dispatcher
        .dispatch(post11(r#"<z:dog xmlns:z="urn:zoo"><name>rex</name></z:dog>"#))
        .unwrap();
    assert_eq!(response.status, 200);
    assert!(response.text().contains("<name>rex</name>"));
}

#[test]
fn test_wsdl_and_xsd_requests() {
    let dispatcher = SoapDispatcher::new(echo_service(SoapVersion::Soap11).service).unwrap();

    let wsdl = dispatcher
        .dispatch(SoapRequest::get("wsdl").with_origin("https", "example.org"))
        .unwrap();
    assert_eq!(wsdl.status, 200);
    assert_eq!(wsdl.content_type(), Some("text/xml"));
    assert!(wsdl.text().contains("location=\"https://example.org/EchoService\""));

    let single = dispatcher.dispatch(SoapRequest::get("singleWsdl")).unwrap();
    assert_eq!(single.status, 200);

    let keys: Vec<String> = dispatcher.xsd_keys().map(str::to_string).collect();
    assert_eq!(keys, vec!["schema0.xsd".to_string()]);
    let xsd = dispatcher.dispatch(SoapRequest::get("xsd=schema0.xsd")).unwrap();
    assert_eq!(xsd.status, 200);
    assert!(xsd.text().contains("<xs:element name=\"echoRequest\""));

    let missing = dispatcher.dispatch(SoapRequest::get("xsd=nope.xsd")).unwrap();
    assert_eq!(missing.status, 404);

    let other = dispatcher.dispatch(SoapRequest::get("")).unwrap();
    assert_eq!(other.status, 404);

    let put = dispatcher.dispatch(SoapRequest::new("PUT", "")).unwrap();
    assert_eq!(put.status, 400);
}
