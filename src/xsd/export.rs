//! XSD export
//!
//! Renders a [`Schema`] back into an `xs:schema` document. The result is
//! served for `?xsd=` lookups and inlined into generated WSDL.

use crate::documents::Element;
use crate::error::{Error, Result};
use crate::names::local_part;
use crate::namespaces::{QName, XSD_NAMESPACE};
use crate::xsd::complex::{ComplexKind, ComplexType};
use crate::xsd::fields::{Field, FieldKind, MaxOccurs, XsdType};
use crate::xsd::schema::Schema;
use crate::xsd::simple::SimpleType;
use indexmap::IndexMap;
use rust_decimal::Decimal;
use std::sync::Arc;

/// Render `schema` as an `xs:schema` element
pub fn schema_to_element(schema: &Schema) -> Result<Element> {
    XsdExporter::new(schema).export()
}

/// Render `schema` as XSD text
pub fn schema_to_xsd(schema: &Schema) -> Result<String> {
    let root = schema_to_element(schema)?;
    let bytes = root.to_xml_bytes(true)?;
    String::from_utf8(bytes).map_err(|e| Error::Xml(e.to_string()))
}

fn xs(local: &str) -> Element {
    Element::new(QName::namespaced(XSD_NAMESPACE, local))
}

fn attr(element: &mut Element, name: &str, value: impl Into<String>) {
    element.set_attribute(QName::local(name), value);
}

struct XsdExporter<'a> {
    schema: &'a Schema,
    /// namespace URI -> prefix
    prefixes: IndexMap<String, String>,
}

impl<'a> XsdExporter<'a> {
    fn new(schema: &'a Schema) -> Self {
        let mut prefixes = IndexMap::new();
        if let Some(ns) = schema.target_namespace() {
            prefixes.insert(ns.to_string(), "tns".to_string());
        }
        for imported in schema.imports() {
            if let Some(ns) = imported.target_namespace() {
                if !prefixes.contains_key(ns) {
                    let prefix = format!("ns{}", prefixes.len());
                    prefixes.insert(ns.to_string(), prefix);
                }
            }
        }
        Self { schema, prefixes }
    }

    fn export(mut self) -> Result<Element> {
        let schema = self.schema;
        let mut children = Vec::new();

        for imported in schema.imports() {
            let mut import = xs("import");
            if let Some(ns) = imported.target_namespace() {
                attr(&mut import, "namespace", ns);
            }
            if let Some(location) = imported.location() {
                attr(&mut import, "schemaLocation", location);
            }
            children.push(import);
        }
        for included in schema.includes() {
            if let Some(location) = included.location() {
                let mut include = xs("include");
                attr(&mut include, "schemaLocation", location);
                children.push(include);
            }
        }

        for st in schema.simple_types() {
            let mut simple = self.simple_type(st);
            if let Some(name) = st.name() {
                attr(&mut simple, "name", name);
            }
            children.push(simple);
        }
        for group in schema.attribute_groups() {
            children.push(self.attribute_group(group)?);
        }
        for group in schema.groups() {
            children.push(self.group(group)?);
        }
        for ct in schema.complex_types() {
            let mut complex = self.complex_type(ct)?;
            if let Some(name) = ct.name() {
                attr(&mut complex, "name", name);
            }
            children.push(complex);
        }
        for field in schema.elements().values() {
            children.push(self.top_level_element(field)?);
        }

        let mut root = xs("schema");
        root.declare_namespace("xs", XSD_NAMESPACE);
        for (uri, prefix) in &self.prefixes {
            root.declare_namespace(prefix.clone(), uri.clone());
        }
        if let Some(ns) = schema.target_namespace() {
            attr(&mut root, "targetNamespace", ns);
        }
        attr(
            &mut root,
            "elementFormDefault",
            schema.element_form_default().to_string(),
        );
        root.children = children;
        Ok(root)
    }

    /// Prefixed reference to a named component
    fn reference(&mut self, namespace: Option<&str>, name: &str) -> String {
        let Some(ns) = namespace else {
            return name.to_string();
        };
        let next = format!("ns{}", self.prefixes.len());
        let prefix = self.prefixes.entry(ns.to_string()).or_insert(next);
        format!("{}:{}", prefix, name)
    }

    fn simple_type(&mut self, st: &SimpleType) -> Element {
        let mut simple = xs("simpleType");
        let mut restriction = xs("restriction");
        attr(
            &mut restriction,
            "base",
            format!("xs:{}", st.primitive().xsd_name()),
        );

        let facets = st.restriction();
        let mut facet = |name: &str, value: String| {
            let mut el = xs(name);
            attr(&mut el, "value", value);
            restriction.add_child(el);
        };
        for value in &facets.enumeration.values {
            facet("enumeration", value.clone());
        }
        if let Some(pattern) = &facets.pattern {
            facet("pattern", pattern.pattern.clone());
        }
        if let Some(length) = facets.length {
            facet("length", length.value.to_string());
        }
        if let Some(length) = facets.min_length {
            facet("minLength", length.value.to_string());
        }
        if let Some(length) = facets.max_length {
            facet("maxLength", length.value.to_string());
        }
        if let Some(white_space) = facets.white_space {
            facet("whiteSpace", white_space.to_string());
        }
        let bounds: [(&str, Option<Decimal>); 4] = [
            ("minInclusive", facets.range.min_inclusive),
            ("maxInclusive", facets.range.max_inclusive),
            ("minExclusive", facets.range.min_exclusive),
            ("maxExclusive", facets.range.max_exclusive),
        ];
        for (name, bound) in bounds {
            if let Some(bound) = bound {
                facet(name, bound.to_string());
            }
        }
        if let Some(digits) = facets.fraction_digits {
            facet("fractionDigits", digits.value.to_string());
        }
        if let Some(digits) = facets.total_digits {
            facet("totalDigits", digits.value.to_string());
        }

        simple.add_child(restriction);
        simple
    }

    /// Sets `type=` on `element` or nests an anonymous definition
    fn type_of(&mut self, element: &mut Element, field: &Field) -> Result<()> {
        match field.xsd_type()? {
            XsdType::Any => attr(element, "type", "xs:anyType"),
            XsdType::Simple(st) => match st.name() {
                Some(name) => {
                    let reference = self.reference(st.namespace(), name);
                    attr(element, "type", reference);
                }
                None if st.restriction().is_empty() => {
                    attr(element, "type", format!("xs:{}", st.primitive().xsd_name()));
                }
                None => {
                    let simple = self.simple_type(st);
                    element.add_child(simple);
                }
            },
            XsdType::Complex(ct) => match ct.name() {
                Some(name) => {
                    let reference = self.reference(ct.namespace(), name);
                    attr(element, "type", reference);
                }
                None => {
                    let complex = self.complex_type(ct)?;
                    element.add_child(complex);
                }
            },
        }
        Ok(())
    }

    fn top_level_element(&mut self, field: &Field) -> Result<Element> {
        let mut element = xs("element");
        attr(&mut element, "name", field.name.clone());
        self.type_of(&mut element, field)?;
        if field.nillable {
            attr(&mut element, "nillable", "true");
        }
        if let Some(default) = &field.default {
            attr(&mut element, "default", default.clone());
        }
        if let Some(head) = &field.substitution_group {
            let head = local_part(head);
            let namespace = self
                .schema
                .find_element(head)
                .and_then(|(owner, _)| owner.target_namespace());
            let reference = self.reference(namespace, head);
            attr(&mut element, "substitutionGroup", reference);
        }
        Ok(element)
    }

    fn particle(&mut self, field: &Field) -> Result<Element> {
        if field.kind == FieldKind::ClassNamed {
            let mut any = xs("any");
            attr(&mut any, "processContents", "lax");
            if field.min_occurs == 0 {
                attr(&mut any, "minOccurs", "0");
            }
            return Ok(any);
        }

        let mut element = xs("element");
        let foreign = field
            .namespace
            .as_deref()
            .filter(|ns| Some(*ns) != self.schema.target_namespace());
        match foreign {
            Some(ns) => {
                let reference = self.reference(Some(ns), field.tag());
                attr(&mut element, "ref", reference);
            }
            None => {
                attr(&mut element, "name", field.tag());
                self.type_of(&mut element, field)?;
            }
        }
        if field.min_occurs != 1 {
            attr(&mut element, "minOccurs", field.min_occurs.to_string());
        }
        if field.max_occurs != MaxOccurs::Bounded(1) {
            attr(&mut element, "maxOccurs", field.max_occurs.to_string());
        }
        if field.nillable {
            attr(&mut element, "nillable", "true");
        }
        if let Some(default) = &field.default {
            attr(&mut element, "default", default.clone());
        }
        Ok(element)
    }

    fn attribute(&mut self, field: &Field) -> Result<Element> {
        let mut attribute = xs("attribute");
        attr(&mut attribute, "name", field.tag());
        self.type_of(&mut attribute, field)?;
        if field.is_required() {
            attr(&mut attribute, "use", "required");
        }
        if let Some(default) = &field.default {
            attr(&mut attribute, "default", default.clone());
        }
        Ok(attribute)
    }

    fn group_reference(&mut self, field: &Field) -> Result<Option<(ComplexKind, Element)>> {
        let Some(group) = field.xsd_type()?.as_complex() else {
            return Ok(None);
        };
        let Some(name) = group.name() else {
            return Ok(None);
        };
        let tag = match group.kind() {
            ComplexKind::AttributeGroup => "attributeGroup",
            _ => "group",
        };
        let mut reference = xs(tag);
        let target = self.reference(group.namespace(), name);
        attr(&mut reference, "ref", target);
        Ok(Some((group.kind(), reference)))
    }

    /// Model element plus trailing attribute declarations for `fields`
    fn content(&mut self, ct: &ComplexType, fields: &[&Arc<Field>]) -> Result<Vec<Element>> {
        let mut model = xs(&ct.model().to_string());
        let mut attributes = Vec::new();
        for field in fields {
            match field.kind {
                FieldKind::Attribute => attributes.push(self.attribute(field)?),
                FieldKind::Ref => match self.group_reference(field)? {
                    Some((ComplexKind::AttributeGroup, reference)) => attributes.push(reference),
                    Some((_, reference)) => model.add_child(reference),
                    None => {}
                },
                _ => {
                    let particle = self.particle(field)?;
                    model.add_child(particle);
                }
            }
        }
        let mut out = Vec::new();
        if !model.children.is_empty() {
            out.push(model);
        }
        out.extend(attributes);
        Ok(out)
    }

    fn complex_type(&mut self, ct: &ComplexType) -> Result<Element> {
        let mut complex = xs("complexType");
        let own = ct.own_fields();
        match ct.base() {
            Some(base) => {
                let mut extension = xs("extension");
                let base_name = base.name().unwrap_or_default();
                let reference = self.reference(base.namespace(), base_name);
                attr(&mut extension, "base", reference);
                extension.children = self.content(ct, &own)?;
                let mut content = xs("complexContent");
                content.add_child(extension);
                complex.add_child(content);
            }
            None => complex.children = self.content(ct, &own)?,
        }
        Ok(complex)
    }

    fn group(&mut self, group: &ComplexType) -> Result<Element> {
        let mut element = xs("group");
        attr(&mut element, "name", group.name().unwrap_or_default());
        let fields: Vec<_> = group.meta().all.iter().collect();
        let mut model = xs(&group.model().to_string());
        for field in fields {
            match field.kind {
                FieldKind::Ref => {
                    if let Some((_, reference)) = self.group_reference(field)? {
                        model.add_child(reference);
                    }
                }
                FieldKind::Attribute => {}
                _ => {
                    let particle = self.particle(field)?;
                    model.add_child(particle);
                }
            }
        }
        element.add_child(model);
        Ok(element)
    }

    fn attribute_group(&mut self, group: &ComplexType) -> Result<Element> {
        let mut element = xs("attributeGroup");
        attr(&mut element, "name", group.name().unwrap_or_default());
        for field in &group.meta().all {
            match field.kind {
                FieldKind::Ref => {
                    if let Some((_, reference)) = self.group_reference(field)? {
                        element.add_child(reference);
                    }
                }
                _ => {
                    let attribute = self.attribute(field)?;
                    element.add_child(attribute);
                }
            }
        }
        Ok(element)
    }
}
