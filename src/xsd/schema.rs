//! Schema registry
//!
//! A [`Schema`] gathers the types and top-level elements of one target
//! namespace. Building it stamps the namespace onto every registered type
//! and resolves every forward type reference, so a built schema never hits
//! an unresolved name later on.

use crate::documents::Element;
use crate::error::{Error, Result};
use crate::names::{local_part, validate_ncname};
use crate::namespaces::QName;
use crate::xsd::complex::{ComplexKind, ComplexType};
use crate::xsd::fields::{Field, FieldKind, XsdType};
use crate::xsd::simple::SimpleType;
use crate::xsd::validation;
use indexmap::IndexMap;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Element form default
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ElementForm {
    /// Unqualified (default)
    #[default]
    Unqualified,
    /// Qualified
    Qualified,
}

impl ElementForm {
    /// Parse from string value
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "qualified" => Some(Self::Qualified),
            "unqualified" => Some(Self::Unqualified),
            _ => None,
        }
    }

    /// Check if qualified
    pub fn is_qualified(&self) -> bool {
        matches!(self, Self::Qualified)
    }
}

impl fmt::Display for ElementForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Qualified => write!(f, "qualified"),
            Self::Unqualified => write!(f, "unqualified"),
        }
    }
}

/// Types and top-level elements of one target namespace
#[derive(Debug)]
pub struct Schema {
    target_namespace: Option<String>,
    element_form_default: ElementForm,
    location: Option<String>,
    simple_types: Vec<Arc<SimpleType>>,
    attribute_groups: Vec<Arc<ComplexType>>,
    groups: Vec<Arc<ComplexType>>,
    complex_types: Vec<Arc<ComplexType>>,
    elements: IndexMap<String, Arc<Field>>,
    imports: Vec<Arc<Schema>>,
    includes: Vec<Arc<Schema>>,
}

/// Builder for [`Schema`]
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    target_namespace: Option<String>,
    element_form_default: ElementForm,
    location: Option<String>,
    simple_types: Vec<Arc<SimpleType>>,
    attribute_groups: Vec<Arc<ComplexType>>,
    groups: Vec<Arc<ComplexType>>,
    complex_types: Vec<Arc<ComplexType>>,
    elements: Vec<Field>,
    imports: Vec<Arc<Schema>>,
    includes: Vec<Arc<Schema>>,
}

impl SchemaBuilder {
    /// Set the target namespace
    pub fn target_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.target_namespace = Some(namespace.into());
        self
    }

    /// Set the element form default
    pub fn element_form_default(mut self, form: ElementForm) -> Self {
        self.element_form_default = form;
        self
    }

    /// Location other schemas use to import this one
    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Register a named simple type
    pub fn simple_type(mut self, ty: Arc<SimpleType>) -> Self {
        self.simple_types.push(ty);
        self
    }

    /// Register an attribute group
    pub fn attribute_group(mut self, group: Arc<ComplexType>) -> Self {
        self.attribute_groups.push(group);
        self
    }

    /// Register a model group
    pub fn group(mut self, group: Arc<ComplexType>) -> Self {
        self.groups.push(group);
        self
    }

    /// Register a complex type
    pub fn complex_type(mut self, ty: Arc<ComplexType>) -> Self {
        self.complex_types.push(ty);
        self
    }

    /// Declare a top-level element
    pub fn element(mut self, element: Field) -> Self {
        self.elements.push(element);
        self
    }

    /// Import a schema of another namespace
    pub fn import(mut self, schema: Arc<Schema>) -> Self {
        self.imports.push(schema);
        self
    }

    /// Include a schema of the same namespace
    pub fn include(mut self, schema: Arc<Schema>) -> Self {
        self.includes.push(schema);
        self
    }

    /// Stamp namespaces, resolve every type reference and freeze the schema
    pub fn build(self) -> Result<Arc<Schema>> {
        let mut elements = IndexMap::new();
        for field in self.elements {
            validate_ncname(&field.name)?;
            if field.kind != FieldKind::Element {
                return Err(Error::Schema(format!(
                    "Top-level element '{}' must be a plain element",
                    field.name
                )));
            }
            if elements.contains_key(&field.name) {
                return Err(Error::Schema(format!(
                    "Duplicate top-level element '{}'",
                    field.name
                )));
            }
            elements.insert(field.name.clone(), Arc::new(field));
        }

        for included in &self.includes {
            if included.target_namespace.is_some()
                && included.target_namespace != self.target_namespace
            {
                return Err(Error::Schema(format!(
                    "Included schema has namespace '{}', expected '{}'",
                    included.target_namespace.as_deref().unwrap_or_default(),
                    self.target_namespace.as_deref().unwrap_or_default()
                )));
            }
        }

        let schema = Schema {
            target_namespace: self.target_namespace,
            element_form_default: self.element_form_default,
            location: self.location,
            simple_types: self.simple_types,
            attribute_groups: self.attribute_groups,
            groups: self.groups,
            complex_types: self.complex_types,
            elements,
            imports: self.imports,
            includes: self.includes,
        };

        schema.stamp()?;
        schema.resolve()?;
        schema.check_elements()?;

        tracing::debug!(
            namespace = schema.target_namespace.as_deref().unwrap_or(""),
            complex_types = schema.complex_types.len(),
            simple_types = schema.simple_types.len(),
            elements = schema.elements.len(),
            "schema built"
        );
        Ok(Arc::new(schema))
    }
}

impl Schema {
    /// Start building a schema
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    /// Target namespace
    pub fn target_namespace(&self) -> Option<&str> {
        self.target_namespace.as_deref()
    }

    /// Element form default
    pub fn element_form_default(&self) -> ElementForm {
        self.element_form_default
    }

    /// Import location
    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    /// Registered simple types
    pub fn simple_types(&self) -> &[Arc<SimpleType>] {
        &self.simple_types
    }

    /// Registered attribute groups
    pub fn attribute_groups(&self) -> &[Arc<ComplexType>] {
        &self.attribute_groups
    }

    /// Registered model groups
    pub fn groups(&self) -> &[Arc<ComplexType>] {
        &self.groups
    }

    /// Registered complex types
    pub fn complex_types(&self) -> &[Arc<ComplexType>] {
        &self.complex_types
    }

    /// Top-level elements by name
    pub fn elements(&self) -> &IndexMap<String, Arc<Field>> {
        &self.elements
    }

    /// Imported schemas
    pub fn imports(&self) -> &[Arc<Schema>] {
        &self.imports
    }

    /// Included schemas
    pub fn includes(&self) -> &[Arc<Schema>] {
        &self.includes
    }

    fn registered_complex(&self) -> impl Iterator<Item = &Arc<ComplexType>> {
        self.complex_types
            .iter()
            .chain(self.groups.iter())
            .chain(self.attribute_groups.iter())
    }

    fn stamp(&self) -> Result<()> {
        let namespace = self.target_namespace.as_deref();
        if let Some(ns) = namespace {
            for st in &self.simple_types {
                st.bind_namespace(ns)?;
            }
        }
        for ct in self.registered_complex() {
            ct.bind(namespace, self.element_form_default)?;
        }
        for field in self.elements.values() {
            if !field.type_ref().is_resolved() {
                continue;
            }
            if let Ok(XsdType::Complex(ct)) = field.xsd_type() {
                if ct.binding().is_none() {
                    ct.bind(namespace, self.element_form_default)?;
                }
            }
        }
        Ok(())
    }

    fn resolve(&self) -> Result<()> {
        let mut visited = HashSet::new();
        for ct in self.registered_complex() {
            self.resolve_complex(ct, &mut visited)?;
        }
        for field in self.elements.values() {
            self.resolve_field(field, &mut visited)
                .map_err(|e| context(e, &format!("element '{}'", field.name)))?;
        }
        Ok(())
    }

    fn resolve_complex(
        &self,
        ct: &Arc<ComplexType>,
        visited: &mut HashSet<*const ComplexType>,
    ) -> Result<()> {
        if !visited.insert(Arc::as_ptr(ct)) {
            return Ok(());
        }
        for field in &ct.meta().all {
            self.resolve_field(field, visited).map_err(|e| {
                context(
                    e,
                    &format!("field '{}' of '{}'", field.name, ct.name().unwrap_or("(anonymous)")),
                )
            })?;
            if field.default.is_some() {
                field
                    .default_for_instance()
                    .map_err(|e| {
                        Error::Schema(format!("Invalid default for '{}': {}", field.name, e))
                    })?;
            }
        }
        Ok(())
    }

    fn resolve_field(
        &self,
        field: &Field,
        visited: &mut HashSet<*const ComplexType>,
    ) -> Result<()> {
        let ty = field.type_ref().resolve_with(|name| self.lookup_type(name))?;
        if let XsdType::Complex(ct) = ty {
            self.resolve_complex(ct, visited)?;
        }
        Ok(())
    }

    fn check_elements(&self) -> Result<()> {
        for field in self.elements.values() {
            if let Some(head) = &field.substitution_group {
                if self.get_element_by_name(local_part(head)).is_none() {
                    return Err(Error::Schema(format!(
                        "Element '{}' names unknown substitution group head '{}'",
                        field.name, head
                    )));
                }
            }
        }
        Ok(())
    }

    /// Named type in this schema or its imports and includes
    fn lookup_type(&self, name: &str) -> Option<XsdType> {
        if let Some(ct) = self.complex_types.iter().find(|t| t.name() == Some(name)) {
            return Some(XsdType::Complex(ct.clone()));
        }
        if let Some(st) = self.simple_types.iter().find(|t| t.name() == Some(name)) {
            return Some(XsdType::Simple(st.clone()));
        }
        self.includes
            .iter()
            .chain(self.imports.iter())
            .find_map(|s| s.lookup_type(name))
    }

    /// Named type, searching imports and includes
    pub fn get_type_by_name(&self, name: &str) -> Option<XsdType> {
        self.lookup_type(local_part(name))
    }

    /// Top-level element by name, searching own elements first and then
    /// imported and included schemas; `None` when declared nowhere
    pub fn get_element_by_name(&self, name: &str) -> Option<&Arc<Field>> {
        self.find_element(name).map(|(_, field)| field)
    }

    /// Top-level element by name together with the schema declaring it
    pub fn find_element(&self, name: &str) -> Option<(&Schema, &Arc<Field>)> {
        if let Some(field) = self.elements.get(name) {
            return Some((self, field));
        }
        self.imports
            .iter()
            .chain(self.includes.iter())
            .find_map(|s| s.find_element(name))
    }

    /// Top-level element by qualified name across every reachable schema
    pub fn find_element_qname(&self, qname: &QName) -> Option<(&Schema, &Arc<Field>)> {
        self.all_schemas().into_iter().find_map(|s| {
            if s.target_namespace() != qname.namespace() {
                return None;
            }
            s.elements.get(&qname.local_name).map(|field| (s, field))
        })
    }

    /// Qualified name of a top-level element of this schema
    pub fn element_qname(&self, name: &str) -> QName {
        QName::new(self.target_namespace(), name)
    }

    /// This schema followed by every schema reachable through imports and includes
    pub fn all_schemas(&self) -> Vec<&Schema> {
        let mut out: Vec<&Schema> = Vec::new();
        let mut stack: Vec<&Schema> = vec![self];
        while let Some(schema) = stack.pop() {
            if out.iter().any(|s| std::ptr::eq(*s, schema)) {
                continue;
            }
            out.push(schema);
            for child in schema.includes.iter().chain(schema.imports.iter()).rev() {
                stack.push(child);
            }
        }
        out
    }

    /// Complex types across all reachable schemas that extend `base`
    pub fn subtypes_of<'a>(&'a self, base: &'a ComplexType) -> Vec<&'a Arc<ComplexType>> {
        self.all_schemas()
            .into_iter()
            .flat_map(|s| s.complex_types.iter())
            .filter(|ct| ct.kind() == ComplexKind::Complex && !std::ptr::eq(ct.as_ref(), base))
            .filter(|ct| ct.is_subtype_of(base))
            .collect()
    }

    /// Validate a document, failing with [`Error::DocumentInvalid`]
    pub fn assert_valid(&self, root: &Element) -> Result<()> {
        validation::validate_document(self, root)
    }

    /// Whether a document is valid
    pub fn validate(&self, root: &Element) -> bool {
        self.assert_valid(root).is_ok()
    }
}

fn context(err: Error, location: &str) -> Error {
    match err {
        Error::Schema(msg) => Error::Schema(format!("{} in {}", msg, location)),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xsd::complex::Instance;
    use crate::xsd::simple::Primitive;

    fn echo_type() -> Arc<ComplexType> {
        ComplexType::builder("EchoType")
            .field(Field::element("value", Primitive::String))
            .build()
            .unwrap()
    }

    #[test]
    fn test_element_form_parse() {
        assert_eq!(ElementForm::from_str("qualified"), Some(ElementForm::Qualified));
        assert_eq!(ElementForm::from_str("unqualified"), Some(ElementForm::Unqualified));
        assert_eq!(ElementForm::from_str("invalid"), None);
        assert!(ElementForm::Qualified.is_qualified());
    }

    #[test]
    fn test_stamps_namespace_and_qualification() {
        let ty = echo_type();
        let schema = Schema::builder()
            .target_namespace("urn:echo")
            .element_form_default(ElementForm::Qualified)
            .complex_type(ty.clone())
            .element(Field::element("echo", "tns:EchoType"))
            .build()
            .unwrap();

        assert_eq!(ty.namespace(), Some("urn:echo"));
        let instance = Instance::with_values(&ty, [("value", "x")]).unwrap();
        let element = instance.to_element(schema.element_qname("echo")).unwrap();
        assert!(element.children[0].qname.matches(Some("urn:echo"), "value"));
    }

    #[test]
    fn test_unqualified_renders_bare_tags() {
        let ty = echo_type();
        let schema = Schema::builder()
            .target_namespace("urn:echo")
            .complex_type(ty.clone())
            .element(Field::element("echo", ty.clone()))
            .build()
            .unwrap();

        let instance = Instance::with_values(&ty, [("value", "x")]).unwrap();
        let element = instance.to_element(schema.element_qname("echo")).unwrap();
        assert!(element.children[0].qname.matches(None, "value"));
    }

    #[test]
    fn test_forward_references_resolve_eagerly() {
        let holder = ComplexType::builder("Holder")
            .field(Field::element("code", "tns:Code"))
            .build()
            .unwrap();
        let code = Arc::new(SimpleType::named("Code", Primitive::String).with_length(3));

        Schema::builder()
            .target_namespace("urn:codes")
            .simple_type(code)
            .complex_type(holder.clone())
            .build()
            .unwrap();

        let field = holder.meta().get("code").unwrap();
        assert!(field.type_ref().is_resolved());
        let mut instance = Instance::new(&holder);
        assert!(instance.set("code", "ABCD").is_err());
    }

    #[test]
    fn test_unresolved_reference_fails_build() {
        let holder = ComplexType::builder("Holder")
            .field(Field::element("code", "tns:Missing"))
            .build()
            .unwrap();
        let err = Schema::builder().complex_type(holder).build().unwrap_err();
        assert!(matches!(err, Error::Schema(msg) if msg.contains("Missing")));
    }

    #[test]
    fn test_conflicting_stamp_fails() {
        let ty = echo_type();
        Schema::builder()
            .target_namespace("urn:a")
            .complex_type(ty.clone())
            .build()
            .unwrap();
        let second = Schema::builder()
            .target_namespace("urn:b")
            .complex_type(ty)
            .build();
        assert!(matches!(second, Err(Error::Schema(_))));
    }

    #[test]
    fn test_get_element_by_name_searches_imports() {
        let imported = Schema::builder()
            .target_namespace("urn:common")
            .element(Field::element("note", Primitive::String))
            .build()
            .unwrap();
        let schema = Schema::builder()
            .target_namespace("urn:main")
            .import(imported)
            .element(Field::element("main", Primitive::Int))
            .build()
            .unwrap();

        assert!(schema.get_element_by_name("main").is_some());
        let (owner, _) = schema.find_element("note").unwrap();
        assert_eq!(owner.target_namespace(), Some("urn:common"));
        assert!(schema.get_element_by_name("absent").is_none());
        assert_eq!(schema.all_schemas().len(), 2);
        assert!(schema
            .find_element_qname(&QName::namespaced("urn:common", "note"))
            .is_some());
    }

    #[test]
    fn test_substitution_group_head_must_exist() {
        let ok = Schema::builder()
            .element(Field::element("vehicle", Primitive::String))
            .element(Field::element("car", Primitive::String).substitution_group("vehicle"))
            .build();
        assert!(ok.is_ok());

        let missing = Schema::builder()
            .element(Field::element("car", Primitive::String).substitution_group("vehicle"))
            .build();
        assert!(missing.is_err());
    }

    #[test]
    fn test_invalid_default_fails_build() {
        let ty = ComplexType::builder("Defaults")
            .field(Field::element("count", "tns:Count").default_value("many"))
            .build()
            .unwrap();
        let count = Arc::new(SimpleType::named("Count", Primitive::Int));
        let err = Schema::builder()
            .target_namespace("urn:counts")
            .simple_type(count)
            .complex_type(ty)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Schema(m) if m.contains("Invalid default")));
    }

    #[test]
    fn test_subtypes_of() {
        let base = echo_type();
        let derived = ComplexType::builder("LoudEcho")
            .extends(base.clone())
            .field(Field::element("volume", Primitive::Int))
            .build()
            .unwrap();
        let schema = Schema::builder()
            .complex_type(base.clone())
            .complex_type(derived)
            .build()
            .unwrap();
        let subtypes = schema.subtypes_of(&base);
        assert_eq!(subtypes.len(), 1);
        assert_eq!(subtypes[0].name(), Some("LoudEcho"));
    }
}
