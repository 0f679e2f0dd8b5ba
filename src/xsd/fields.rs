//! Field descriptors
//!
//! A [`Field`] describes one member of a structured type: how many times it
//! occurs, which tag it renders under, whether it may be nil and which type
//! validates its value. Fields are shared between every instance of their
//! type and carry no per-document state.

use crate::documents::Element;
use crate::error::{Error, Result, ValidationError};
use crate::names::local_part;
use crate::namespaces::QName;
use crate::xsd::complex::ComplexType;
use crate::xsd::schema::ElementForm;
use crate::xsd::simple::{Primitive, SimpleType, UNBOUNDED};
use crate::xsd::values::Value;
use once_cell::sync::OnceCell;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static CREATION_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Namespace and qualification in effect while rendering
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderContext {
    /// Target namespace of the enclosing schema
    pub namespace: Option<String>,
    /// Whether local elements are namespace-qualified
    pub form: ElementForm,
}

impl RenderContext {
    /// Create a render context
    pub fn new(namespace: Option<&str>, form: ElementForm) -> Self {
        Self {
            namespace: namespace.map(str::to_string),
            form,
        }
    }
}

// =============================================================================
// Types and type references
// =============================================================================

/// Resolved type of a field
#[derive(Debug, Clone)]
pub enum XsdType {
    /// Simple (text-only) type
    Simple(Arc<SimpleType>),
    /// Structured type
    Complex(Arc<ComplexType>),
    /// Untyped content (`xs:anyType`)
    Any,
}

impl XsdType {
    /// Validate a value against this type
    pub fn accept(&self, value: Value) -> Result<Value> {
        match self {
            XsdType::Simple(st) => st.accept(value),
            XsdType::Complex(ct) => ct.accept(value),
            XsdType::Any => match value {
                v @ (Value::Xml(_) | Value::Complex(_) | Value::Named(_) | Value::String(_)) => {
                    Ok(v)
                }
                other => Err(Error::Type(format!(
                    "xs:anyType cannot hold a {} value",
                    other.kind()
                ))),
            },
        }
    }

    /// Render a value as the content of `element`
    pub fn render(&self, element: &mut Element, value: &Value, ctx: &RenderContext) -> Result<()> {
        match self {
            XsdType::Simple(st) => st.render(element, value),
            XsdType::Complex(_) => match value {
                Value::Complex(instance) => instance.ty().render(element, instance, ctx),
                other => Err(Error::Type(format!(
                    "Expected a structured value, got {}",
                    other.kind()
                ))),
            },
            XsdType::Any => render_any(element, value),
        }
    }

    /// Read a value from the content of `element`
    pub fn parse(&self, element: &Element) -> Result<Option<Value>> {
        match self {
            XsdType::Simple(st) => st.from_text(element.text_content()),
            XsdType::Complex(ct) => {
                ComplexType::parse_xmlelement(ct, element).map(|i| Some(Value::Complex(i)))
            }
            XsdType::Any => Ok(Some(Value::Xml(element.clone()))),
        }
    }

    /// Simple type, if this is one
    pub fn as_simple(&self) -> Option<&Arc<SimpleType>> {
        match self {
            XsdType::Simple(st) => Some(st),
            _ => None,
        }
    }

    /// Structured type, if this is one
    pub fn as_complex(&self) -> Option<&Arc<ComplexType>> {
        match self {
            XsdType::Complex(ct) => Some(ct),
            _ => None,
        }
    }
}

/// Render untyped content; structured values use their own schema binding
pub(crate) fn render_any(element: &mut Element, value: &Value) -> Result<()> {
    match value {
        Value::Xml(source) => {
            for (qname, attr) in &source.attributes {
                element.set_attribute(qname.clone(), attr.clone());
            }
            for (prefix, uri) in source.namespaces.iter() {
                element.declare_namespace(prefix.clone(), uri.clone());
            }
            if let Some(text) = &source.text {
                element.set_text(text.clone());
            }
            element.children.extend(source.children.iter().cloned());
            Ok(())
        }
        Value::Complex(instance) => {
            instance
                .ty()
                .render(element, instance, &RenderContext::default())
        }
        Value::String(text) => {
            element.set_text(text.clone());
            Ok(())
        }
        Value::Named(named) => {
            let qname = QName::new(named.namespace.as_deref(), named.name.clone());
            let mut child = Element::new(qname);
            render_any(&mut child, &named.value)?;
            element.add_child(child);
            Ok(())
        }
        other => Err(Error::Type(format!(
            "xs:anyType cannot render a {} value",
            other.kind()
        ))),
    }
}

/// Built-in type for `xs:name` / `xsd:name` / bare `name`
pub fn builtin_type(name: &str) -> Option<XsdType> {
    let local = match name.split_once(':') {
        Some(("xs" | "xsd", local)) => local,
        Some(_) => return None,
        None => name,
    };
    if local == "anyType" {
        return Some(XsdType::Any);
    }
    Primitive::from_name(local).map(|p| XsdType::Simple(SimpleType::builtin(p)))
}

/// Type of a field, given directly or by name and resolved once
#[derive(Debug, Clone)]
pub struct TypeRef {
    name: Option<String>,
    resolved: OnceCell<XsdType>,
}

impl TypeRef {
    /// Forward reference resolved later by the owning schema
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            resolved: OnceCell::new(),
        }
    }

    /// Already resolved type
    pub fn resolved(ty: XsdType) -> Self {
        Self {
            name: None,
            resolved: OnceCell::from(ty),
        }
    }

    /// Name of a forward reference
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Whether the type is known
    pub fn is_resolved(&self) -> bool {
        self.resolved.get().is_some()
    }

    /// Resolved type; built-in names resolve on first use
    pub fn get(&self) -> Result<&XsdType> {
        if let Some(ty) = self.resolved.get() {
            return Ok(ty);
        }
        let name = self.name.as_deref().unwrap_or_default();
        match builtin_type(name) {
            Some(ty) => Ok(self.resolved.get_or_init(|| ty)),
            None => Err(Error::Type(format!("Unresolved type reference '{}'", name))),
        }
    }

    /// Resolve through `lookup` (called with the local name) unless already resolved
    pub fn resolve_with<F>(&self, lookup: F) -> Result<&XsdType>
    where
        F: FnOnce(&str) -> Option<XsdType>,
    {
        if let Some(ty) = self.resolved.get() {
            return Ok(ty);
        }
        let name = self.name.as_deref().unwrap_or_default();
        let found = match name.split_once(':') {
            Some(("xs" | "xsd", _)) => builtin_type(name),
            _ => lookup(local_part(name)).or_else(|| builtin_type(local_part(name))),
        };
        match found {
            Some(ty) => Ok(self.resolved.get_or_init(|| ty)),
            None => Err(Error::Schema(format!("Unresolved type '{}'", name))),
        }
    }
}

impl From<XsdType> for TypeRef {
    fn from(ty: XsdType) -> Self {
        TypeRef::resolved(ty)
    }
}

impl From<Primitive> for TypeRef {
    fn from(p: Primitive) -> Self {
        TypeRef::resolved(XsdType::Simple(SimpleType::builtin(p)))
    }
}

impl From<SimpleType> for TypeRef {
    fn from(st: SimpleType) -> Self {
        TypeRef::resolved(XsdType::Simple(Arc::new(st)))
    }
}

impl From<Arc<SimpleType>> for TypeRef {
    fn from(st: Arc<SimpleType>) -> Self {
        TypeRef::resolved(XsdType::Simple(st))
    }
}

impl From<Arc<ComplexType>> for TypeRef {
    fn from(ct: Arc<ComplexType>) -> Self {
        TypeRef::resolved(XsdType::Complex(ct))
    }
}

impl From<&str> for TypeRef {
    fn from(name: &str) -> Self {
        TypeRef::named(name)
    }
}

impl From<String> for TypeRef {
    fn from(name: String) -> Self {
        TypeRef::named(name)
    }
}

// =============================================================================
// Fields
// =============================================================================

/// What kind of member a field declares
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Child element occurring at most once
    Element,
    /// Attribute of the owning element
    Attribute,
    /// Repeated child element
    List,
    /// Group whose members render directly into the owner
    Ref,
    /// Child element named after its runtime value
    ClassNamed,
}

/// Upper occurrence bound
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaxOccurs {
    /// At most this many
    Bounded(u64),
    /// No upper bound
    Unbounded,
}

impl MaxOccurs {
    /// Parse `unbounded` or a positive integer
    pub fn from_str(s: &str) -> Result<Self> {
        match SimpleType::new(Primitive::MaxOccurs).accept(Value::String(s.to_string()))? {
            Value::Integer(n) => u64::try_from(n)
                .map(MaxOccurs::Bounded)
                .map_err(|_| Error::validation(format!("maxOccurs out of range: {}", n))),
            _ => Ok(MaxOccurs::Unbounded),
        }
    }

    /// Whether `count` occurrences are allowed
    pub fn allows(&self, count: usize) -> bool {
        match self {
            MaxOccurs::Bounded(max) => count as u64 <= *max,
            MaxOccurs::Unbounded => true,
        }
    }
}

impl fmt::Display for MaxOccurs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaxOccurs::Bounded(n) => write!(f, "{}", n),
            MaxOccurs::Unbounded => f.write_str(UNBOUNDED),
        }
    }
}

/// One declared member of a structured type
#[derive(Debug, Clone)]
pub struct Field {
    /// Member name
    pub name: String,
    /// Kind of member
    pub kind: FieldKind,
    type_ref: TypeRef,
    /// Minimum occurrences (`use="required"` for attributes)
    pub min_occurs: u64,
    /// Maximum occurrences
    pub max_occurs: MaxOccurs,
    /// Tag to render instead of the member name
    pub tagname: Option<String>,
    /// Whether the nil sentinel is allowed
    pub nillable: bool,
    /// Default value, as text
    pub default: Option<String>,
    /// Namespace overriding the schema's qualification
    pub namespace: Option<String>,
    /// Head of the substitution group (top-level elements)
    pub substitution_group: Option<String>,
    creation_order: u64,
}

impl Field {
    fn new(name: impl Into<String>, kind: FieldKind, type_ref: TypeRef) -> Self {
        Self {
            name: name.into(),
            kind,
            type_ref,
            min_occurs: 1,
            max_occurs: MaxOccurs::Bounded(1),
            tagname: None,
            nillable: false,
            default: None,
            namespace: None,
            substitution_group: None,
            creation_order: CREATION_COUNTER.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Required child element
    pub fn element(name: impl Into<String>, ty: impl Into<TypeRef>) -> Self {
        Self::new(name, FieldKind::Element, ty.into())
    }

    /// Optional attribute; call [`Field::required`] for `use="required"`
    pub fn attribute(name: impl Into<String>, ty: impl Into<TypeRef>) -> Self {
        let mut field = Self::new(name, FieldKind::Attribute, ty.into());
        field.min_occurs = 0;
        field
    }

    /// Repeated element rendered as `tagname`, zero to unbounded times
    pub fn list(
        name: impl Into<String>,
        tagname: impl Into<String>,
        ty: impl Into<TypeRef>,
    ) -> Self {
        let mut field = Self::new(name, FieldKind::List, ty.into());
        field.tagname = Some(tagname.into());
        field.min_occurs = 0;
        field.max_occurs = MaxOccurs::Unbounded;
        field
    }

    /// Reference to a group or attribute group
    pub fn reference(name: impl Into<String>, group: Arc<ComplexType>) -> Self {
        Self::new(name, FieldKind::Ref, group.into())
    }

    /// Element whose tag comes from the value it holds
    pub fn class_named(name: impl Into<String>, ty: impl Into<TypeRef>) -> Self {
        Self::new(name, FieldKind::ClassNamed, ty.into())
    }

    /// Allow the field to be absent
    pub fn optional(mut self) -> Self {
        self.min_occurs = 0;
        self
    }

    /// Require the field
    pub fn required(mut self) -> Self {
        self.min_occurs = 1;
        self
    }

    /// Set the minimum occurrences
    pub fn min_occurs(mut self, min: u64) -> Self {
        self.min_occurs = min;
        self
    }

    /// Set the maximum occurrences
    pub fn max_occurs(mut self, max: MaxOccurs) -> Self {
        self.max_occurs = max;
        self
    }

    /// Allow the nil sentinel
    pub fn nillable(mut self) -> Self {
        self.nillable = true;
        self
    }

    /// Render under `tagname` instead of the field name
    pub fn tagname(mut self, tagname: impl Into<String>) -> Self {
        self.tagname = Some(tagname.into());
        self
    }

    /// Render in `namespace` whatever the schema's qualification
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Value assigned to new instances, given as text
    pub fn default_value(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Declare membership of a substitution group
    pub fn substitution_group(mut self, head: impl Into<String>) -> Self {
        self.substitution_group = Some(head.into());
        self
    }

    /// Tag name used on the wire
    pub fn tag(&self) -> &str {
        self.tagname.as_deref().unwrap_or(&self.name)
    }

    /// Position in declaration order across all fields
    pub fn creation_order(&self) -> u64 {
        self.creation_order
    }

    /// Type reference as declared
    pub fn type_ref(&self) -> &TypeRef {
        &self.type_ref
    }

    /// Resolved type
    pub fn xsd_type(&self) -> Result<&XsdType> {
        self.type_ref.get()
    }

    /// Whether at least one occurrence is required
    pub fn is_required(&self) -> bool {
        self.min_occurs > 0
    }

    /// Whether this field renders as a child element
    pub fn is_element(&self) -> bool {
        matches!(
            self.kind,
            FieldKind::Element | FieldKind::List | FieldKind::ClassNamed
        )
    }

    /// Qualified tag under `ctx`
    pub fn qname(&self, ctx: &RenderContext) -> QName {
        let namespace = match (&self.namespace, ctx.form) {
            (Some(ns), _) => Some(ns.clone()),
            (None, ElementForm::Qualified) if self.kind != FieldKind::Attribute => {
                ctx.namespace.clone()
            }
            _ => None,
        };
        QName::new(namespace, self.tag())
    }

    /// Whether a child element carries this field's tag
    pub fn matches(&self, child: &Element) -> bool {
        child.local_name() == self.tag()
    }

    fn annotate(&self, err: Error) -> Error {
        match err {
            Error::Validation(v) if v.field.is_none() => {
                Error::Validation(v.with_field(&self.name))
            }
            other => other,
        }
    }

    fn not_nillable(&self) -> Error {
        Error::Validation(ValidationError::new("Field is not nillable").with_field(&self.name))
    }

    /// Validate a value for assignment
    pub fn accept(&self, value: Value) -> Result<Value> {
        match self.kind {
            FieldKind::List => match value {
                Value::List(list) => {
                    if !self.max_occurs.allows(list.len()) {
                        return Err(Error::Validation(
                            ValidationError::new(format!(
                                "List exceeds maxOccurs of {}",
                                self.max_occurs
                            ))
                            .with_field(&self.name),
                        ));
                    }
                    for item in list.iter() {
                        self.accept_item(item.clone())?;
                    }
                    Ok(Value::List(list))
                }
                other => Err(Error::Type(format!(
                    "List field '{}' cannot hold a {} value",
                    self.name,
                    other.kind()
                ))),
            },
            FieldKind::ClassNamed => match value {
                Value::Nil if self.nillable => Ok(Value::Nil),
                Value::Nil => Err(self.not_nillable()),
                v @ (Value::Named(_) | Value::Complex(_) | Value::Xml(_)) => Ok(v),
                other => Err(Error::Type(format!(
                    "Field '{}' needs a named value, got {}",
                    self.name,
                    other.kind()
                ))),
            },
            _ => self.accept_item(value),
        }
    }

    /// Validate one occurrence of the field's type
    pub fn accept_item(&self, value: Value) -> Result<Value> {
        if value.is_nil() {
            return if self.nillable {
                Ok(Value::Nil)
            } else {
                Err(self.not_nillable())
            };
        }
        self.xsd_type()?
            .accept(value)
            .map_err(|e| self.annotate(e))
    }

    /// Default value converted to the field's type
    pub fn default_for_instance(&self) -> Result<Option<Value>> {
        let Some(text) = &self.default else {
            return Ok(None);
        };
        match self.xsd_type()? {
            XsdType::Simple(st) => match st.from_text(text)? {
                Some(value) => st.accept(value).map(Some),
                None => Ok(None),
            },
            _ => Err(Error::Schema(format!(
                "Field '{}' has a default but no simple type",
                self.name
            ))),
        }
    }

    /// Render the field's value into `parent`
    pub fn render(
        &self,
        parent: &mut Element,
        value: Option<&Value>,
        ctx: &RenderContext,
    ) -> Result<()> {
        match self.kind {
            FieldKind::Element => {
                let Some(value) = value else {
                    return Ok(());
                };
                let child = self.render_occurrence(value, ctx)?;
                parent.add_child(child);
                Ok(())
            }
            FieldKind::Attribute => self.render_attribute(parent, value),
            FieldKind::List => {
                let items: &[Value] = match value {
                    Some(Value::List(list)) => list.as_slice(),
                    None => &[],
                    Some(other) => {
                        return Err(Error::Type(format!(
                            "List field '{}' cannot render a {} value",
                            self.name,
                            other.kind()
                        )))
                    }
                };
                if (items.len() as u64) < self.min_occurs || !self.max_occurs.allows(items.len()) {
                    return Err(Error::Validation(
                        ValidationError::new(format!(
                            "List must have between {} and {} items",
                            self.min_occurs, self.max_occurs
                        ))
                        .with_field(&self.name)
                        .with_reason(format!("{} items", items.len())),
                    ));
                }
                for item in items {
                    let child = self.render_occurrence(item, ctx)?;
                    parent.add_child(child);
                }
                Ok(())
            }
            FieldKind::Ref => match value {
                Some(Value::Complex(group)) => group.ty().render_fields(parent, group, ctx),
                None => Ok(()),
                Some(other) => Err(Error::Type(format!(
                    "Group reference '{}' cannot render a {} value",
                    self.name,
                    other.kind()
                ))),
            },
            FieldKind::ClassNamed => self.render_class_named(parent, value),
        }
    }

    fn render_occurrence(&self, value: &Value, ctx: &RenderContext) -> Result<Element> {
        let mut child = Element::new(self.qname(ctx));
        if value.is_nil() {
            if !self.nillable {
                return Err(self.not_nillable());
            }
            child.set_nil();
        } else {
            self.xsd_type()?
                .render(&mut child, value, ctx)
                .map_err(|e| self.annotate(e))?;
        }
        Ok(child)
    }

    fn render_attribute(&self, parent: &mut Element, value: Option<&Value>) -> Result<()> {
        let qname = QName::new(self.namespace.as_deref(), self.tag());
        let text = match value {
            None if self.is_required() => {
                return Err(Error::Validation(
                    ValidationError::new("Required attribute is missing").with_field(&self.name),
                ))
            }
            None => return Ok(()),
            Some(Value::Nil) if !self.nillable => return Err(self.not_nillable()),
            Some(Value::Nil) => "nil".to_string(),
            Some(value) => match self.xsd_type()? {
                XsdType::Simple(st) => st.to_text(value)?,
                _ => {
                    return Err(Error::Type(format!(
                        "Attribute '{}' must have a simple type",
                        self.name
                    )))
                }
            },
        };
        parent.set_attribute(qname, text);
        Ok(())
    }

    fn render_class_named(&self, parent: &mut Element, value: Option<&Value>) -> Result<()> {
        match value {
            None => Ok(()),
            Some(Value::Nil) => {
                let mut child = Element::new(QName::local(self.tag()));
                child.set_nil();
                parent.add_child(child);
                Ok(())
            }
            Some(Value::Xml(element)) => {
                parent.add_child(element.clone());
                Ok(())
            }
            Some(Value::Named(named)) => {
                let mut child =
                    Element::new(QName::new(named.namespace.as_deref(), named.name.clone()));
                render_any(&mut child, &named.value)?;
                parent.add_child(child);
                Ok(())
            }
            Some(Value::Complex(instance)) => {
                let ty = instance.ty();
                let name = ty.name().ok_or_else(|| {
                    Error::Type(format!(
                        "Field '{}' needs a named type to derive its tag",
                        self.name
                    ))
                })?;
                let mut child = Element::new(QName::new(ty.namespace(), name));
                ty.render(&mut child, instance, &RenderContext::default())?;
                parent.add_child(child);
                Ok(())
            }
            Some(other) => Err(Error::Type(format!(
                "Field '{}' cannot render a {} value",
                self.name,
                other.kind()
            ))),
        }
    }

    /// Read one occurrence from a matching child element
    pub fn parse_element(&self, child: &Element) -> Result<Option<Value>> {
        if child.is_nil() {
            return Ok(Some(Value::Nil));
        }
        self.xsd_type()?.parse(child).map_err(|e| self.annotate(e))
    }

    /// Read the attribute value from `node`
    pub fn parse_attribute(&self, node: &Element) -> Result<Option<Value>> {
        let qname = QName::new(self.namespace.as_deref(), self.tag());
        let Some(text) = node.get_attribute_qname(&qname) else {
            return Ok(None);
        };
        if text == "nil" && self.nillable {
            return Ok(Some(Value::Nil));
        }
        match self.xsd_type()? {
            XsdType::Simple(st) => st.from_text(text).map_err(|e| self.annotate(e)),
            _ => Err(Error::Type(format!(
                "Attribute '{}' must have a simple type",
                self.name
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespaces::XSI_NAMESPACE;

    fn parent() -> Element {
        Element::new(QName::local("parent"))
    }

    #[test]
    fn test_nil_semantics() {
        let nillable = Field::element("value", Primitive::String).nillable();
        assert_eq!(nillable.accept(Value::Nil).unwrap(), Value::Nil);

        let mut node = parent();
        nillable.render(&mut node, Some(&Value::Nil), &RenderContext::default()).unwrap();
        let child = &node.children[0];
        assert!(child.is_nil());
        assert!(child.children.is_empty() && child.text.is_none());

        let strict = Field::element("value", Primitive::String);
        assert!(matches!(strict.accept(Value::Nil), Err(Error::Validation(_))));
    }

    #[test]
    fn test_element_qualification() {
        let field = Field::element("name", Primitive::String);
        let value = Value::from("x");

        let mut qualified = parent();
        let ctx = RenderContext::new(Some("urn:t"), ElementForm::Qualified);
        field.render(&mut qualified, Some(&value), &ctx).unwrap();
        assert!(qualified.children[0].qname.matches(Some("urn:t"), "name"));

        let mut unqualified = parent();
        let ctx = RenderContext::new(Some("urn:t"), ElementForm::Unqualified);
        field.render(&mut unqualified, Some(&value), &ctx).unwrap();
        assert!(unqualified.children[0].qname.matches(None, "name"));
    }

    #[test]
    fn test_absent_element_renders_nothing() {
        let field = Field::element("value", Primitive::String);
        let mut node = parent();
        field.render(&mut node, None, &RenderContext::default()).unwrap();
        assert!(node.children.is_empty());
    }

    #[test]
    fn test_attribute_rendering_rules() {
        let required = Field::attribute("id", Primitive::Int).required();
        let mut node = parent();
        assert!(required.render(&mut node, None, &RenderContext::default()).is_err());

        let not_nillable = Field::attribute("lang", Primitive::String);
        assert!(not_nillable
            .render(&mut node, Some(&Value::Nil), &RenderContext::default())
            .is_err());

        required
            .render(&mut node, Some(&Value::Integer(7)), &RenderContext::default())
            .unwrap();
        assert_eq!(node.get_attribute("id"), Some("7"));
        assert_eq!(required.parse_attribute(&node).unwrap(), Some(Value::Integer(7)));
    }

    #[test]
    fn test_parse_nil_child() {
        let field = Field::element("value", Primitive::Int).nillable();
        let mut child = Element::new(QName::local("value"));
        child.set_attribute(QName::namespaced(XSI_NAMESPACE, "nil"), "true");
        assert_eq!(field.parse_element(&child).unwrap(), Some(Value::Nil));
    }

    #[test]
    fn test_type_ref_resolution() {
        let builtin = TypeRef::named("xs:int");
        assert!(matches!(
            builtin.get(),
            Ok(XsdType::Simple(st)) if st.primitive() == Primitive::Int
        ));

        let forward = TypeRef::named("tns:Airport");
        assert!(matches!(forward.get(), Err(Error::Type(_))));
        let resolved = forward
            .resolve_with(|name| {
                assert_eq!(name, "Airport");
                Some(XsdType::Simple(Arc::new(SimpleType::named("Airport", Primitive::String))))
            })
            .unwrap();
        assert!(resolved.as_simple().is_some());
        assert!(forward.is_resolved());

        assert!(TypeRef::named("tns:Missing").resolve_with(|_| None).is_err());
    }

    #[test]
    fn test_max_occurs_parse() {
        assert_eq!(MaxOccurs::from_str("unbounded").unwrap(), MaxOccurs::Unbounded);
        assert_eq!(MaxOccurs::from_str("5").unwrap(), MaxOccurs::Bounded(5));
        assert!(MaxOccurs::from_str("0").is_err());
        assert!(MaxOccurs::Bounded(2).allows(2));
        assert!(!MaxOccurs::Bounded(2).allows(3));
    }

    #[test]
    fn test_creation_order_is_monotonic() {
        let first = Field::element("a", Primitive::String);
        let second = Field::attribute("b", Primitive::String);
        assert!(first.creation_order() < second.creation_order());
    }
}
