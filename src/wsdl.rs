//! WSDL 1.1 generation
//!
//! Produces a document/literal description of a [`SoapService`]: every
//! reachable schema inlined under `wsdl:types`, one input and one output
//! message per method (plus header messages when header types are declared),
//! a port type, a SOAP 1.1 or 1.2 binding and the service port.
//!
//! The port address keeps the `${scheme}` and `${host}` placeholders of the
//! service location; [`substitute_location`] fills them in per request.

use crate::documents::Element;
use crate::error::{Error, Result};
use crate::namespaces::{QName, SOAP_HTTP_TRANSPORT, WSDL_NAMESPACE};
use crate::service::{SoapMethod, SoapService};
use crate::xsd::complex::ComplexType;
use crate::xsd::export::schema_to_element;
use crate::xsd::schema::Schema;
use indexmap::IndexMap;
use std::sync::Arc;

/// Render the WSDL of `service` as text with an XML declaration
pub fn generate_wsdl(service: &SoapService) -> Result<String> {
    let root = wsdl_element(service)?;
    let bytes = root.to_xml_bytes(true)?;
    String::from_utf8(bytes).map_err(|e| Error::Xml(e.to_string()))
}

/// Render the WSDL of `service` as an element tree
pub fn wsdl_element(service: &SoapService) -> Result<Element> {
    WsdlWriter::new(service).write()
}

/// Replace the `${scheme}` and `${host}` placeholders
pub fn substitute_location(wsdl: &str, scheme: &str, host: &str) -> String {
    wsdl.replace("${scheme}", scheme).replace("${host}", host)
}

fn wsdl(local: &str) -> Element {
    Element::new(QName::namespaced(WSDL_NAMESPACE, local))
}

fn attr(element: &mut Element, name: &str, value: impl Into<String>) {
    element.set_attribute(QName::local(name), value);
}

struct WsdlWriter<'a> {
    service: &'a SoapService,
    schemas: Vec<&'a Schema>,
    /// prefix of the definitions namespace
    tns: &'static str,
    /// schema namespace URI -> prefix declared on the root
    prefixes: IndexMap<String, String>,
}

impl<'a> WsdlWriter<'a> {
    fn new(service: &'a SoapService) -> Self {
        let mut schemas: Vec<&Schema> = Vec::new();
        for schema in service.schemas() {
            for reachable in schema.all_schemas() {
                if !schemas.iter().any(|s| std::ptr::eq(*s, reachable)) {
                    schemas.push(reachable);
                }
            }
        }

        // Inlined schemas bind `tns` to their own namespace, so the
        // definitions only take that prefix when no schema disagrees.
        let target = service.target_namespace();
        let tns = if schemas
            .iter()
            .filter_map(|s| s.target_namespace())
            .all(|ns| ns == target)
        {
            "tns"
        } else {
            "defs"
        };

        let mut prefixes = IndexMap::new();
        for ns in schemas.iter().filter_map(|s| s.target_namespace()) {
            if ns != target && !prefixes.contains_key(ns) {
                let prefix = format!("s{}", prefixes.len());
                prefixes.insert(ns.to_string(), prefix);
            }
        }

        Self {
            service,
            schemas,
            tns,
            prefixes,
        }
    }

    fn reference(&self, qname: &QName) -> String {
        match qname.namespace() {
            Some(ns) if ns == self.service.target_namespace() => {
                format!("{}:{}", self.tns, qname.local_name)
            }
            Some(ns) => match self.prefixes.get(ns) {
                Some(prefix) => format!("{}:{}", prefix, qname.local_name),
                None => qname.local_name.clone(),
            },
            None => qname.local_name.clone(),
        }
    }

    fn local(&self, name: &str) -> String {
        format!("{}:{}", self.tns, name)
    }

    fn write(self) -> Result<Element> {
        let service = self.service;
        let version = service.version();

        let mut root = wsdl("definitions");
        root.declare_namespace("wsdl", WSDL_NAMESPACE);
        root.declare_namespace(version.binding_prefix(), version.binding_namespace());
        root.declare_namespace(self.tns, service.target_namespace());
        for (uri, prefix) in &self.prefixes {
            root.declare_namespace(prefix.clone(), uri.clone());
        }
        attr(&mut root, "name", service.name());
        attr(&mut root, "targetNamespace", service.target_namespace());

        let mut types = wsdl("types");
        for schema in &self.schemas {
            types.add_child(schema_to_element(schema)?);
        }
        root.add_child(types);

        for method in service.methods() {
            for message in self.messages(method)? {
                root.add_child(message);
            }
        }

        let mut port_type = wsdl("portType");
        attr(&mut port_type, "name", format!("{}PortType", service.name()));
        for method in service.methods() {
            let mut operation = wsdl("operation");
            attr(&mut operation, "name", method.operation_name());
            let mut input = wsdl("input");
            attr(&mut input, "message", self.local(&format!("{}Input", method.operation_name())));
            let mut output = wsdl("output");
            attr(&mut output, "message", self.local(&format!("{}Output", method.operation_name())));
            operation.add_child(input);
            operation.add_child(output);
            port_type.add_child(operation);
        }
        root.add_child(port_type);

        root.add_child(self.binding());

        let binding_ns = version.binding_namespace();
        let mut address = Element::new(QName::namespaced(binding_ns, "address"));
        attr(&mut address, "location", service.location());
        let mut port = wsdl("port");
        attr(&mut port, "name", format!("{}Port", service.name()));
        attr(&mut port, "binding", self.local(&format!("{}Binding", service.name())));
        port.add_child(address);
        let mut svc = wsdl("service");
        attr(&mut svc, "name", service.name());
        svc.add_child(port);
        root.add_child(svc);

        Ok(root)
    }

    fn messages(&self, method: &SoapMethod) -> Result<Vec<Element>> {
        let name = method.operation_name();
        let mut out = Vec::new();
        for (suffix, element) in [("Input", method.input()), ("Output", method.output())] {
            let qname = self.service.element_qname(element).ok_or_else(|| {
                Error::Schema(format!("Unknown element '{}' in operation '{}'", element, name))
            })?;
            let mut part = wsdl("part");
            attr(&mut part, "name", "body");
            attr(&mut part, "element", self.reference(&qname));
            let mut message = wsdl("message");
            attr(&mut message, "name", format!("{}{}", name, suffix));
            message.add_child(part);
            out.push(message);
        }

        let headers = [
            ("InputHeader", self.service.input_header_for(method)),
            ("OutputHeader", self.service.output_header_for(method)),
        ];
        for (suffix, ty) in headers {
            let Some(ty) = ty else { continue };
            let mut part = wsdl("part");
            attr(&mut part, "name", "header");
            attr(&mut part, "type", self.header_type(ty)?);
            let mut message = wsdl("message");
            attr(&mut message, "name", format!("{}{}", name, suffix));
            message.add_child(part);
            out.push(message);
        }
        Ok(out)
    }

    fn header_type(&self, ty: &Arc<ComplexType>) -> Result<String> {
        ty.qname()
            .map(|q| self.reference(&q))
            .ok_or_else(|| Error::Schema("Header types must be named".to_string()))
    }

    fn binding(&self) -> Element {
        let service = self.service;
        let binding_ns = service.version().binding_namespace();
        let soap = |local: &str| Element::new(QName::namespaced(binding_ns, local));

        let mut binding = wsdl("binding");
        attr(&mut binding, "name", format!("{}Binding", service.name()));
        attr(&mut binding, "type", self.local(&format!("{}PortType", service.name())));
        let mut soap_binding = soap("binding");
        attr(&mut soap_binding, "style", "document");
        attr(&mut soap_binding, "transport", SOAP_HTTP_TRANSPORT);
        binding.add_child(soap_binding);

        for method in service.methods() {
            let name = method.operation_name();
            let mut operation = wsdl("operation");
            attr(&mut operation, "name", name);
            let mut soap_operation = soap("operation");
            attr(&mut soap_operation, "soapAction", method.soap_action());
            attr(&mut soap_operation, "style", "document");
            operation.add_child(soap_operation);

            let directions = [
                ("input", "InputHeader", service.input_header_for(method)),
                ("output", "OutputHeader", service.output_header_for(method)),
            ];
            for (direction, header_suffix, header) in directions {
                let mut io = wsdl(direction);
                let mut body = soap("body");
                attr(&mut body, "use", "literal");
                io.add_child(body);
                if header.is_some() {
                    let mut soap_header = soap("header");
                    let message = self.local(&format!("{}{}", name, header_suffix));
                    attr(&mut soap_header, "message", message);
                    attr(&mut soap_header, "part", "header");
                    attr(&mut soap_header, "use", "literal");
                    io.add_child(soap_header);
                }
                operation.add_child(io);
            }
            binding.add_child(operation);
        }
        binding
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::{MethodResponse, SoapMethod};
    use crate::soap::SoapVersion;
    use crate::xsd::fields::Field;
    use crate::xsd::simple::Primitive;

    fn service(version: SoapVersion, schema_namespace: &str) -> Arc<SoapService> {
        let request = ComplexType::builder("EchoRequest")
            .field(Field::element("value", Primitive::String))
            .build()
            .unwrap();
        let header = ComplexType::builder("AuthHeader")
            .field(Field::element("token", Primitive::String))
            .build()
            .unwrap();
        let schema = Schema::builder()
            .target_namespace(schema_namespace)
            .complex_type(request.clone())
            .complex_type(header.clone())
            .element(Field::element("echoRequest", request.clone()))
            .element(Field::element("echoResponse", request))
            .build()
            .unwrap();
        SoapService::builder("Echo")
            .target_namespace("http://example.com/echo")
            .version(version)
            .schema(schema)
            .input_header(header)
            .method(
                SoapMethod::new("echo", "echoRequest", "echoResponse", |_, input| {
                    Ok(MethodResponse::new(input))
                })
                .with_soap_action("urn:echo"),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn test_soap11_wsdl() {
        let wsdl = generate_wsdl(&service(SoapVersion::Soap11, "http://example.com/echo")).unwrap();
        assert!(wsdl.contains("xmlns:tns=\"http://example.com/echo\""));
        assert!(wsdl.contains("<wsdl:part name=\"body\" element=\"tns:echoRequest\"/>"));
        assert!(wsdl.contains("<wsdl:message name=\"echoInputHeader\">"));
        assert!(wsdl.contains("<wsoap:operation soapAction=\"urn:echo\" style=\"document\"/>"));
        assert!(wsdl.contains(
            "<wsoap:header message=\"tns:echoInputHeader\" part=\"header\" use=\"literal\"/>"
        ));
        assert!(wsdl.contains("<wsoap:address location=\"${scheme}://${host}/Echo\"/>"));
        assert!(wsdl.contains("<xs:schema"));
    }

    #[test]
    fn test_soap12_binding() {
        let wsdl = generate_wsdl(&service(SoapVersion::Soap12, "http://example.com/echo")).unwrap();
        assert!(wsdl.contains("xmlns:wsoap12=\"http://schemas.xmlsoap.org/wsdl/soap12/\""));
        assert!(wsdl.contains("<wsoap12:binding style=\"document\""));
    }

    #[test]
    fn test_foreign_schema_namespace() {
        let wsdl = generate_wsdl(&service(SoapVersion::Soap11, "urn:types")).unwrap();
        assert!(wsdl.contains("xmlns:defs=\"http://example.com/echo\""));
        assert!(wsdl.contains("xmlns:s0=\"urn:types\""));
        assert!(wsdl.contains("element=\"s0:echoRequest\""));
        assert!(wsdl.contains("xmlns:tns=\"urn:types\""));
    }

    #[test]
    fn test_substitute_location() {
        let wsdl = generate_wsdl(&service(SoapVersion::Soap11, "http://example.com/echo")).unwrap();
        let served = substitute_location(&wsdl, "https", "example.org:8443");
        assert!(served.contains("location=\"https://example.org:8443/Echo\""));
    }
}
