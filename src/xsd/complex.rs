//! Structured types and their instances
//!
//! A [`ComplexType`] is built once from its declared fields and exposes them
//! through [`Meta`], in declaration order. An [`Instance`] holds the values of
//! one document node; every assignment goes through the field's `accept`.

use crate::documents::Element;
use crate::error::{Error, Result, ValidationError};
use crate::names::validate_ncname;
use crate::namespaces::QName;
use crate::xsd::fields::{Field, FieldKind, MaxOccurs, RenderContext, XsdType};
use crate::xsd::schema::{ElementForm, Schema};
use crate::xsd::values::{ListValue, Value};
use indexmap::IndexMap;
use once_cell::sync::OnceCell;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Content model of a structured type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModelType {
    /// Ordered sequence of particles
    #[default]
    Sequence,
    /// One of multiple alternatives
    Choice,
    /// Unordered set of particles
    All,
}

impl ModelType {
    /// Parse from element tag name
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "sequence" => Some(Self::Sequence),
            "choice" => Some(Self::Choice),
            "all" => Some(Self::All),
            _ => None,
        }
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sequence => write!(f, "sequence"),
            Self::Choice => write!(f, "choice"),
            Self::All => write!(f, "all"),
        }
    }
}

/// Role of a structured type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ComplexKind {
    /// Ordinary complex type rendered under its own tag
    #[default]
    Complex,
    /// Model group, composed into other types through a reference
    Group,
    /// Attribute group, composed into other types through a reference
    AttributeGroup,
    /// Single-root document wrapper
    Document,
}

/// Reflected field inventory of a structured type
#[derive(Debug, Clone, Default)]
pub struct Meta {
    /// Element, list and class-named fields
    pub fields: Vec<Arc<Field>>,
    /// Attribute fields
    pub attributes: Vec<Arc<Field>>,
    /// Group and attribute group references
    pub groups: Vec<Arc<Field>>,
    /// Every field, in declaration order
    pub all: Vec<Arc<Field>>,
}

impl Meta {
    fn from_fields(all: Vec<Arc<Field>>) -> Self {
        let mut meta = Meta::default();
        for field in &all {
            match field.kind {
                FieldKind::Attribute => meta.attributes.push(field.clone()),
                FieldKind::Ref => meta.groups.push(field.clone()),
                _ => meta.fields.push(field.clone()),
            }
        }
        meta.all = all;
        meta
    }

    /// Field by name
    pub fn get(&self, name: &str) -> Option<&Arc<Field>> {
        self.all.iter().find(|f| f.name == name)
    }
}

/// Namespace and qualification stamped by the owning schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaBinding {
    /// Target namespace
    pub namespace: Option<String>,
    /// Element form default
    pub element_form: ElementForm,
}

/// XSD complex type, group or attribute group
#[derive(Debug)]
pub struct ComplexType {
    name: Option<String>,
    kind: ComplexKind,
    model: ModelType,
    base: Option<Arc<ComplexType>>,
    meta: Meta,
    binding: OnceCell<SchemaBinding>,
}

/// Builder for [`ComplexType`]
#[derive(Debug)]
pub struct ComplexTypeBuilder {
    name: Option<String>,
    kind: ComplexKind,
    model: ModelType,
    base: Option<Arc<ComplexType>>,
    fields: Vec<Field>,
}

impl ComplexTypeBuilder {
    fn new(name: Option<String>, kind: ComplexKind) -> Self {
        Self {
            name,
            kind,
            model: ModelType::Sequence,
            base: None,
            fields: Vec::new(),
        }
    }

    /// Set the content model
    pub fn model(mut self, model: ModelType) -> Self {
        self.model = model;
        self
    }

    /// Extend a base type; its fields come first
    pub fn extends(mut self, base: Arc<ComplexType>) -> Self {
        self.base = Some(base);
        self
    }

    /// Declare a field
    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    /// Build the type and its reflected inventory
    pub fn build(self) -> Result<Arc<ComplexType>> {
        let type_name = self.name.clone().unwrap_or_else(|| "(anonymous)".to_string());
        if let Some(name) = &self.name {
            validate_ncname(name)?;
        }

        let mut own = self.fields;
        own.sort_by_key(Field::creation_order);

        for field in &own {
            validate_ncname(field.tag())?;
            check_field(&type_name, self.kind, field)?;
        }

        let mut all: Vec<Arc<Field>> = Vec::new();
        if let Some(base) = &self.base {
            if base.kind != ComplexKind::Complex {
                return Err(Error::Schema(format!(
                    "Type '{}' can only extend a complex type",
                    type_name
                )));
            }
            all.extend(base.meta.all.iter().cloned());
        }

        let mut seen: HashSet<String> = all.iter().map(|f| f.name.clone()).collect();
        for field in own {
            if !seen.insert(field.name.clone()) {
                return Err(Error::Schema(format!(
                    "Duplicate field '{}' in type '{}'",
                    field.name, type_name
                )));
            }
            all.push(Arc::new(field));
        }

        let meta = Meta::from_fields(all);
        if self.kind == ComplexKind::Document
            && (meta.all.len() != 1 || meta.fields.len() != 1)
        {
            return Err(Error::Schema(format!(
                "Document '{}' must declare exactly one element",
                type_name
            )));
        }

        Ok(Arc::new(ComplexType {
            name: self.name,
            kind: self.kind,
            model: self.model,
            base: self.base,
            meta,
            binding: OnceCell::new(),
        }))
    }
}

fn check_field(type_name: &str, kind: ComplexKind, field: &Field) -> Result<()> {
    let fail = |msg: &str| {
        Err(Error::Schema(format!(
            "Field '{}' of '{}' {}",
            field.name, type_name, msg
        )))
    };

    match field.kind {
        FieldKind::Element | FieldKind::ClassNamed
            if field.min_occurs > 1 || field.max_occurs != MaxOccurs::Bounded(1) =>
        {
            return fail("occurs more than once; declare it as a list");
        }
        FieldKind::List if !field.max_occurs.allows(field.min_occurs as usize) => {
            return fail("has minOccurs above maxOccurs");
        }
        FieldKind::Attribute if field.type_ref().is_resolved() => {
            if !matches!(field.xsd_type()?, XsdType::Simple(_)) {
                return fail("is an attribute and needs a simple type");
            }
        }
        FieldKind::Ref => {
            let group_kind = field.xsd_type()?.as_complex().map(|g| g.kind);
            if !matches!(
                group_kind,
                Some(ComplexKind::Group | ComplexKind::AttributeGroup)
            ) {
                return fail("must reference a group or attribute group");
            }
        }
        _ => {}
    }

    if field.default.is_some() && field.type_ref().is_resolved() {
        if let Err(e) = field.default_for_instance() {
            return fail(&format!("has an invalid default: {}", e));
        }
    }

    if kind == ComplexKind::AttributeGroup
        && !matches!(field.kind, FieldKind::Attribute | FieldKind::Ref)
    {
        return fail("is not an attribute");
    }
    Ok(())
}

impl ComplexType {
    /// Named complex type
    pub fn builder(name: impl Into<String>) -> ComplexTypeBuilder {
        ComplexTypeBuilder::new(Some(name.into()), ComplexKind::Complex)
    }

    /// Anonymous complex type, declared inline on an element
    pub fn anonymous() -> ComplexTypeBuilder {
        ComplexTypeBuilder::new(None, ComplexKind::Complex)
    }

    /// Named model group
    pub fn group(name: impl Into<String>) -> ComplexTypeBuilder {
        ComplexTypeBuilder::new(Some(name.into()), ComplexKind::Group)
    }

    /// Named attribute group
    pub fn attribute_group(name: impl Into<String>) -> ComplexTypeBuilder {
        ComplexTypeBuilder::new(Some(name.into()), ComplexKind::AttributeGroup)
    }

    /// Document with a single root element
    pub fn document(name: impl Into<String>) -> ComplexTypeBuilder {
        ComplexTypeBuilder::new(Some(name.into()), ComplexKind::Document)
    }

    /// Type name, `None` for anonymous types
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("(anonymous)")
    }

    /// Role of the type
    pub fn kind(&self) -> ComplexKind {
        self.kind
    }

    /// Content model
    pub fn model(&self) -> ModelType {
        self.model
    }

    /// Base type of an extension
    pub fn base(&self) -> Option<&Arc<ComplexType>> {
        self.base.as_ref()
    }

    /// Reflected field inventory
    pub fn meta(&self) -> &Meta {
        &self.meta
    }

    /// Fields declared by this type itself, without inherited ones
    pub fn own_fields(&self) -> Vec<&Arc<Field>> {
        match &self.base {
            Some(base) => self
                .meta
                .all
                .iter()
                .filter(|f| !base.meta.all.iter().any(|b| Arc::ptr_eq(b, f)))
                .collect(),
            None => self.meta.all.iter().collect(),
        }
    }

    /// Schema binding, once registered
    pub fn binding(&self) -> Option<&SchemaBinding> {
        self.binding.get()
    }

    /// Target namespace of the owning schema
    pub fn namespace(&self) -> Option<&str> {
        self.binding.get().and_then(|b| b.namespace.as_deref())
    }

    /// Qualified name of a named type
    pub fn qname(&self) -> Option<QName> {
        self.name
            .as_ref()
            .map(|name| QName::new(self.namespace(), name.clone()))
    }

    /// Stamp the owning schema's namespace and element form
    ///
    /// A type belongs to at most one schema; binding it again with other
    /// settings fails.
    pub fn bind(&self, namespace: Option<&str>, element_form: ElementForm) -> Result<()> {
        let binding = SchemaBinding {
            namespace: namespace.map(str::to_string),
            element_form,
        };
        if let Err(requested) = self.binding.set(binding) {
            if self.binding.get() != Some(&requested) {
                return Err(Error::Schema(format!(
                    "Type '{}' is already bound to namespace '{}'",
                    self.display_name(),
                    self.namespace().unwrap_or_default()
                )));
            }
        }
        Ok(())
    }

    /// Whether this type is `other` or extends it
    pub fn is_subtype_of(&self, other: &ComplexType) -> bool {
        let mut current = Some(self);
        while let Some(ty) = current {
            if std::ptr::eq(ty, other) {
                return true;
            }
            current = ty.base.as_deref();
        }
        false
    }

    /// Validate a value for a field of this type
    pub fn accept(&self, value: Value) -> Result<Value> {
        match value {
            Value::Complex(instance) if instance.ty().is_subtype_of(self) => {
                Ok(Value::Complex(instance))
            }
            Value::Complex(instance) => Err(Error::Type(format!(
                "Expected an instance of '{}', got '{}'",
                self.display_name(),
                instance.ty().display_name()
            ))),
            other => Err(Error::Type(format!(
                "Expected an instance of '{}', got a {} value",
                self.display_name(),
                other.kind()
            ))),
        }
    }

    /// Render context for this type's children
    ///
    /// Bound complex types use their schema's settings; groups and unbound
    /// types inherit them from the enclosing element.
    pub fn context(&self, inherited: &RenderContext) -> RenderContext {
        match (self.kind, self.binding.get()) {
            (ComplexKind::Complex | ComplexKind::Document, Some(binding)) => RenderContext {
                namespace: binding.namespace.clone(),
                form: binding.element_form,
            },
            _ => inherited.clone(),
        }
    }

    /// Render `instance` as the content of `element`
    pub fn render(
        &self,
        element: &mut Element,
        instance: &Instance,
        ctx: &RenderContext,
    ) -> Result<()> {
        let ty = instance.ty();
        if !ty.is_subtype_of(self) {
            return Err(Error::Type(format!(
                "Cannot render '{}' as '{}'",
                ty.display_name(),
                self.display_name()
            )));
        }
        ty.render_fields(element, instance, &ty.context(ctx))
    }

    /// Render every field of `instance` into `element` without switching context
    pub fn render_fields(
        &self,
        element: &mut Element,
        instance: &Instance,
        ctx: &RenderContext,
    ) -> Result<()> {
        for field in &self.meta.all {
            field.render(element, instance.get(&field.name), ctx)?;
        }
        Ok(())
    }

    /// Build an instance from an element
    pub fn parse_xmlelement(ty: &Arc<ComplexType>, node: &Element) -> Result<Instance> {
        let mut instance = Instance::new(ty);
        if ty.kind == ComplexKind::Document {
            let field = document_field(ty)?;
            if let Some(value) = field.parse_element(node)? {
                instance.set(&field.name, value)?;
            }
            return Ok(instance);
        }
        Self::parse_fields(ty, node, &mut instance)?;
        Ok(instance)
    }

    /// Parse bytes, optionally validating against `schema` first
    pub fn parsexml(
        ty: &Arc<ComplexType>,
        xml: &[u8],
        schema: Option<&Schema>,
    ) -> Result<Instance> {
        let root = Element::parse(xml)?;
        if let Some(schema) = schema {
            schema.assert_valid(&root)?;
        }
        Self::parse_xmlelement(ty, &root)
    }

    fn parse_fields(ty: &Arc<ComplexType>, node: &Element, instance: &mut Instance) -> Result<()> {
        for field in &ty.meta.attributes {
            if let Some(value) = field.parse_attribute(node)? {
                instance.set(&field.name, value)?;
            }
        }

        match ty.model {
            ModelType::Choice => Self::parse_choice(ty, node, instance)?,
            _ => {
                for field in &ty.meta.fields {
                    Self::parse_field(ty, field, node, instance)?;
                }
            }
        }

        for field in &ty.meta.groups {
            let group = field.xsd_type()?.as_complex().cloned().ok_or_else(|| {
                Error::Type(format!("Group reference '{}' has no group type", field.name))
            })?;
            let mut group_instance = Instance::new(&group);
            Self::parse_fields(&group, node, &mut group_instance)?;
            instance.set(&field.name, Value::Complex(group_instance))?;
        }
        Ok(())
    }

    /// A choice-typed element may stand for the chosen member itself, so the
    /// node's own tag is tried first; otherwise the first member found among
    /// the children wins.
    fn parse_choice(ty: &Arc<ComplexType>, node: &Element, instance: &mut Instance) -> Result<()> {
        if let Some(field) = ty.meta.fields.iter().find(|f| f.matches(node)) {
            if let Some(value) = field.parse_element(node)? {
                instance.set(&field.name, value)?;
            }
            return Ok(());
        }
        for field in &ty.meta.fields {
            if Self::parse_field(ty, field, node, instance)? {
                break;
            }
        }
        Ok(())
    }

    /// Parse one field from the children of `node`; true if anything matched
    fn parse_field(
        ty: &ComplexType,
        field: &Arc<Field>,
        node: &Element,
        instance: &mut Instance,
    ) -> Result<bool> {
        match field.kind {
            FieldKind::Element => {
                let Some(child) = node.children.iter().find(|c| field.matches(c)) else {
                    return Ok(false);
                };
                if let Some(value) = field.parse_element(child)? {
                    instance.set(&field.name, value)?;
                }
                Ok(true)
            }
            FieldKind::List => {
                let mut matched = false;
                for child in node.children.iter().filter(|c| field.matches(c)) {
                    matched = true;
                    if let Some(value) = field.parse_element(child)? {
                        instance.list_mut(&field.name)?.push(value)?;
                    }
                }
                Ok(matched)
            }
            FieldKind::ClassNamed => {
                let claimed_elsewhere = |child: &Element| {
                    ty.meta
                        .fields
                        .iter()
                        .any(|f| !Arc::ptr_eq(f, field) && f.matches(child))
                };
                let Some(child) = node.children.iter().find(|c| !claimed_elsewhere(c)) else {
                    return Ok(false);
                };
                if let Some(value) = field.parse_element(child)? {
                    instance.set(&field.name, value)?;
                }
                Ok(true)
            }
            FieldKind::Attribute | FieldKind::Ref => Ok(false),
        }
    }
}

fn document_field(ty: &ComplexType) -> Result<&Arc<Field>> {
    ty.meta
        .fields
        .first()
        .ok_or_else(|| Error::Schema(format!("Document '{}' has no root", ty.display_name())))
}

// =============================================================================
// Instances
// =============================================================================

/// Values of one structured type node
#[derive(Debug, Clone)]
pub struct Instance {
    ty: Arc<ComplexType>,
    values: IndexMap<String, Option<Value>>,
}

impl Instance {
    /// Fresh instance with every field at its empty value
    ///
    /// Lists start empty, group references hold a fresh group instance and
    /// scalars start unset or at their declared default.
    pub fn new(ty: &Arc<ComplexType>) -> Self {
        let mut values = IndexMap::with_capacity(ty.meta.all.len());
        for field in &ty.meta.all {
            values.insert(field.name.clone(), Self::empty_value(field));
        }
        Self {
            ty: ty.clone(),
            values,
        }
    }

    fn empty_value(field: &Arc<Field>) -> Option<Value> {
        match field.kind {
            FieldKind::List => Some(Value::List(ListValue::new(field.clone()))),
            FieldKind::Ref => match field.xsd_type() {
                Ok(XsdType::Complex(group)) => Some(Value::Complex(Instance::new(group))),
                _ => None,
            },
            // resolved defaults are checked at build, named ones by the schema;
            // an unresolved reference has no default yet
            _ => field.default_for_instance().ok().flatten(),
        }
    }

    /// Instance with the given fields assigned
    pub fn with_values<I, K, V>(ty: &Arc<ComplexType>, values: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let mut instance = Self::new(ty);
        for (name, value) in values {
            instance.set(name.as_ref(), value)?;
        }
        Ok(instance)
    }

    /// Type of this instance
    pub fn ty(&self) -> &Arc<ComplexType> {
        &self.ty
    }

    fn field(&self, name: &str) -> Result<&Arc<Field>> {
        self.ty.meta.get(name).ok_or_else(|| {
            Error::Attribute(format!(
                "'{}' has no field '{}'",
                self.ty.display_name(),
                name
            ))
        })
    }

    /// Value of a field, `None` when unset or undeclared
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name).and_then(Option::as_ref)
    }

    /// Value of a declared field
    pub fn field_value(&self, name: &str) -> Result<Option<&Value>> {
        self.field(name)?;
        Ok(self.get(name))
    }

    /// Validate and assign a field
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        let field = self.field(name)?.clone();
        let value = match (field.kind, value.into()) {
            (FieldKind::List, Value::List(items)) => {
                let mut list = ListValue::new(field.clone());
                list.extend(items.iter().cloned())?;
                Value::List(list)
            }
            (_, value) => field.accept(value)?,
        };
        self.values.insert(field.name.clone(), Some(value));
        Ok(())
    }

    /// Reset a field to its empty value
    pub fn unset(&mut self, name: &str) -> Result<()> {
        let field = self.field(name)?.clone();
        let empty = match field.kind {
            FieldKind::List | FieldKind::Ref => Self::empty_value(&field),
            _ => None,
        };
        self.values.insert(field.name.clone(), empty);
        Ok(())
    }

    /// String value of a field
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    /// Nested instance of a field
    pub fn get_instance(&self, name: &str) -> Option<&Instance> {
        self.get(name).and_then(Value::as_instance)
    }

    /// List value of a field
    pub fn get_list(&self, name: &str) -> Option<&ListValue> {
        self.get(name).and_then(Value::as_list)
    }

    /// Whether a field holds the nil sentinel
    pub fn is_nil(&self, name: &str) -> bool {
        matches!(self.get(name), Some(Value::Nil))
    }

    /// Mutable access to a list field
    pub fn list_mut(&mut self, name: &str) -> Result<&mut ListValue> {
        let field = self.field(name)?.clone();
        let slot = self
            .values
            .entry(field.name.clone())
            .or_insert(None)
            .get_or_insert_with(|| Value::List(ListValue::new(field.clone())));
        match slot {
            Value::List(list) => Ok(list),
            _ => Err(Error::Attribute(format!("'{}' is not a list field", name))),
        }
    }

    /// Mutable access to a group reference
    pub fn group_mut(&mut self, name: &str) -> Result<&mut Instance> {
        let field = self.field(name)?.clone();
        if field.kind != FieldKind::Ref {
            return Err(Error::Attribute(format!("'{}' is not a group reference", name)));
        }
        match self.values.get_mut(&field.name).and_then(Option::as_mut) {
            Some(Value::Complex(group)) => Ok(group),
            _ => Err(Error::Type(format!("Group '{}' is unresolved", name))),
        }
    }

    /// Iterate over field names and values in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&Value>)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_ref()))
    }

    /// Render into `element` under `ctx`
    pub fn render(&self, element: &mut Element, ctx: &RenderContext) -> Result<()> {
        self.ty.render(element, self, ctx)
    }

    /// Render as a standalone element named `tag`
    pub fn to_element(&self, tag: QName) -> Result<Element> {
        let mut element = Element::new(tag);
        self.ty.render(&mut element, self, &RenderContext::default())?;
        Ok(element)
    }

    /// Render the root of a document instance
    pub fn render_document(&self) -> Result<Element> {
        let field = document_field(&self.ty)?;
        let value = self.get(&field.name).ok_or_else(|| {
            Error::Validation(
                ValidationError::new("Document root is not set").with_field(&field.name),
            )
        })?;
        let ctx = RenderContext::new(self.ty.namespace(), ElementForm::Qualified);
        let mut holder = Element::new(QName::local("document"));
        field.render(&mut holder, Some(value), &ctx)?;
        holder
            .children
            .pop()
            .ok_or_else(|| Error::Xml("Document rendered no root element".to_string()))
    }

    /// Serialize under a root `tag`, validating against `schema` if given
    pub fn xml(
        &self,
        tag: &str,
        namespace: Option<&str>,
        form: ElementForm,
        schema: Option<&Schema>,
    ) -> Result<String> {
        let root = if self.ty.kind == ComplexKind::Document {
            self.render_document()?
        } else {
            let mut root = Element::new(QName::new(namespace, tag));
            self.ty
                .render(&mut root, self, &RenderContext::new(namespace, form))?;
            root
        };
        if let Some(schema) = schema {
            schema.assert_valid(&root)?;
        }
        root.to_xml_string()
    }

    fn canonical_xml(&self) -> Option<String> {
        let root = if self.ty.kind == ComplexKind::Document {
            self.render_document().ok()?
        } else {
            let mut root = Element::new(QName::local(self.ty.display_name()));
            self.ty
                .render(&mut root, self, &RenderContext::default())
                .ok()?;
            root
        };
        root.to_xml_string().ok()
    }
}

/// Instances compare by their serialized form
impl PartialEq for Instance {
    fn eq(&self, other: &Self) -> bool {
        match (self.canonical_xml(), other.canonical_xml()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

impl PartialOrd for Instance {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.canonical_xml()?.cmp(&other.canonical_xml()?))
    }
}
