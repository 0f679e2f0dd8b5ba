//! Document validation
//!
//! Checks an element tree against the declarations of a [`Schema`]: root
//! lookup, attribute use, content models (sequence, choice, all, groups and
//! extensions), namespace qualification and simple-type facets. The first
//! violation ends validation with [`Error::DocumentInvalid`] carrying the
//! path of the offending node.

use crate::documents::Element;
use crate::error::{Error, Result, ValidationError};
use crate::names::local_part;
use crate::namespaces::{QName, XML_NAMESPACE, XSI_NAMESPACE};
use crate::xsd::complex::{ComplexKind, ComplexType, ModelType};
use crate::xsd::fields::{Field, FieldKind, MaxOccurs, RenderContext, XsdType};
use crate::xsd::schema::Schema;
use crate::xsd::simple::SimpleType;
use std::sync::Arc;

/// Validate a document root against the top-level elements of `schema`
/// and everything it imports or includes.
pub fn validate_document(schema: &Schema, root: &Element) -> Result<()> {
    let mut validator = Validator::new(schema);
    let Some((owner, field)) = schema.find_element_qname(&root.qname) else {
        return Err(Error::invalid(
            format!("Unknown root element '{}'", root.qname),
            format!("/{}", root.local_name()),
        ));
    };
    let ctx = RenderContext::new(owner.target_namespace(), owner.element_form_default());
    validator.element(root, field, &ctx)
}

/// Validate an element as an instance of `ty`, whatever its own tag.
///
/// Used for SOAP headers, whose root tag belongs to the envelope.
pub fn validate_element_against(
    ty: &Arc<ComplexType>,
    element: &Element,
    schema: &Schema,
) -> Result<()> {
    let mut validator = Validator::new(schema);
    validator.path.push(element.local_name().to_string());
    let result = validator.complex(element, ty, &RenderContext::default());
    validator.path.pop();
    result
}

// =============================================================================
// Content model particles
// =============================================================================

enum Particle<'a> {
    Field {
        field: &'a Arc<Field>,
        ctx: RenderContext,
    },
    Model {
        model: ModelType,
        parts: Vec<Particle<'a>>,
    },
}

impl Particle<'_> {
    fn nullable(&self) -> bool {
        match self {
            Particle::Field { field, .. } => field.min_occurs == 0,
            Particle::Model {
                model: ModelType::Choice,
                parts,
            } => parts.is_empty() || parts.iter().any(Particle::nullable),
            Particle::Model { parts, .. } => parts.iter().all(Particle::nullable),
        }
    }

    fn describe(&self) -> String {
        match self {
            Particle::Field { field, .. } => field.tag().to_string(),
            Particle::Model { model, parts } => {
                let inner: Vec<String> = parts.iter().map(Particle::describe).collect();
                format!("{}({})", model, inner.join(", "))
            }
        }
    }
}

fn group_type(field: &Field) -> Result<&Arc<ComplexType>> {
    field
        .xsd_type()?
        .as_complex()
        .ok_or_else(|| Error::Type(format!("Group reference '{}' has no group type", field.name)))
}

/// Particle tree of `ct`; extensions put the base content first
fn content_particle<'a>(ct: &'a ComplexType, inherited: &RenderContext) -> Result<Particle<'a>> {
    let ctx = ct.context(inherited);
    let own = model_particle(ct.model(), ct.own_fields(), &ctx)?;
    match ct.base() {
        Some(base) => Ok(Particle::Model {
            model: ModelType::Sequence,
            parts: vec![content_particle(base, inherited)?, own],
        }),
        None => Ok(own),
    }
}

fn model_particle<'a>(
    model: ModelType,
    fields: Vec<&'a Arc<Field>>,
    ctx: &RenderContext,
) -> Result<Particle<'a>> {
    let mut parts = Vec::new();
    for field in fields {
        match field.kind {
            FieldKind::Attribute => {}
            FieldKind::Ref => {
                let group = group_type(field)?;
                if group.kind() == ComplexKind::Group {
                    let fields = group.meta().all.iter().collect();
                    parts.push(model_particle(group.model(), fields, ctx)?);
                }
            }
            _ => parts.push(Particle::Field {
                field,
                ctx: ctx.clone(),
            }),
        }
    }
    Ok(Particle::Model { model, parts })
}

fn collect_attributes<'a>(ct: &'a ComplexType, out: &mut Vec<&'a Arc<Field>>) -> Result<()> {
    out.extend(ct.meta().attributes.iter());
    for field in &ct.meta().groups {
        collect_attributes(group_type(field)?, out)?;
    }
    Ok(())
}

/// Declaration matched by a child element
struct Matched {
    decl: Arc<Field>,
    namespace: Option<Option<String>>,
    ctx: RenderContext,
}

// =============================================================================
// Validator
// =============================================================================

struct Validator<'s> {
    schema: &'s Schema,
    path: Vec<String>,
}

impl<'s> Validator<'s> {
    fn new(schema: &'s Schema) -> Self {
        Self {
            schema,
            path: Vec::new(),
        }
    }

    fn current_path(&self) -> String {
        format!("/{}", self.path.join("/"))
    }

    fn fail(&self, message: impl Into<String>) -> Error {
        Error::invalid(message, self.current_path())
    }

    fn wrap(&self, err: Error) -> Error {
        match err {
            Error::Validation(v) | Error::DocumentInvalid(v) if v.path.is_none() => {
                Error::DocumentInvalid(v.with_path(self.current_path()))
            }
            Error::Validation(v) => Error::DocumentInvalid(v),
            e @ Error::DocumentInvalid(_) => e,
            other => Error::DocumentInvalid(
                ValidationError::new(other.to_string()).with_path(self.current_path()),
            ),
        }
    }

    fn element(&mut self, element: &Element, field: &Field, ctx: &RenderContext) -> Result<()> {
        self.path.push(element.local_name().to_string());
        let result = self.check_element(element, field, ctx);
        self.path.pop();
        result
    }

    fn check_element(
        &mut self,
        element: &Element,
        field: &Field,
        ctx: &RenderContext,
    ) -> Result<()> {
        if element.is_nil() {
            if !field.nillable {
                return Err(self.fail(format!(
                    "Element '{}' is not nillable",
                    element.local_name()
                )));
            }
            if !element.children.is_empty() || !element.text_content().trim().is_empty() {
                return Err(self.fail(format!(
                    "Nilled element '{}' must be empty",
                    element.local_name()
                )));
            }
            return Ok(());
        }

        match field.xsd_type().map_err(|e| self.wrap(e))? {
            XsdType::Simple(st) => self.simple(element, st),
            XsdType::Complex(ct) => self.complex_or_subtype(element, ct, ctx),
            XsdType::Any => Ok(()),
        }
    }

    fn simple(&self, element: &Element, st: &SimpleType) -> Result<()> {
        if let Some(child) = element.children.first() {
            return Err(self.fail(format!(
                "Element '{}' has simple content but contains child element '{}'",
                element.local_name(),
                child.local_name()
            )));
        }
        for qname in element.attributes.keys() {
            if !is_foreign_attribute(qname) {
                return Err(self.fail(format!(
                    "Unknown attribute '{}' on element '{}'",
                    qname,
                    element.local_name()
                )));
            }
        }
        let value = st
            .from_text(element.text_content())
            .map_err(|e| self.wrap(e))?
            .ok_or_else(|| self.fail(format!("Element '{}' has no value", element.local_name())))?;
        st.accept(value).map_err(|e| self.wrap(e))?;
        Ok(())
    }

    /// An extension may stand in for its base without `xsi:type`, so
    /// registered subtypes are tried when the declared type rejects the node.
    fn complex_or_subtype(
        &mut self,
        element: &Element,
        ct: &Arc<ComplexType>,
        ctx: &RenderContext,
    ) -> Result<()> {
        let first = match self.complex(element, ct, ctx) {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };
        let schema = self.schema;
        for subtype in schema.subtypes_of(ct) {
            let depth = self.path.len();
            let result = self.complex(element, subtype, ctx);
            self.path.truncate(depth);
            if result.is_ok() {
                return Ok(());
            }
        }
        Err(first)
    }

    fn complex(
        &mut self,
        element: &Element,
        ct: &Arc<ComplexType>,
        ctx: &RenderContext,
    ) -> Result<()> {
        self.attributes(element, ct)?;

        if !element.text_content().trim().is_empty() {
            return Err(self.fail(format!(
                "Element '{}' does not allow text content",
                element.local_name()
            )));
        }

        let particle = content_particle(ct, ctx).map_err(|e| self.wrap(e))?;
        let children: Vec<&Element> = element.children.iter().collect();
        let pos = self.particle(&particle, &children, 0)?;
        if let Some(extra) = children.get(pos) {
            return Err(self.fail(format!(
                "Unexpected child element '{}' in '{}'; expected {}",
                extra.local_name(),
                element.local_name(),
                particle.describe()
            )));
        }
        Ok(())
    }

    fn attributes(&self, element: &Element, ct: &ComplexType) -> Result<()> {
        let mut declared = Vec::new();
        collect_attributes(ct, &mut declared).map_err(|e| self.wrap(e))?;

        for field in &declared {
            let qname = QName::new(field.namespace.as_deref(), field.tag());
            if element.get_attribute_qname(&qname).is_none() {
                if field.is_required() {
                    return Err(self.fail(format!(
                        "Missing required attribute '{}' on element '{}'",
                        field.tag(),
                        element.local_name()
                    )));
                }
                continue;
            }
            let value = field
                .parse_attribute(element)
                .map_err(|e| self.wrap(e))?
                .ok_or_else(|| self.fail(format!("Attribute '{}' has no value", field.tag())))?;
            field.accept_item(value).map_err(|e| self.wrap(e))?;
        }

        for qname in element.attributes.keys() {
            if is_foreign_attribute(qname) {
                continue;
            }
            let known = declared
                .iter()
                .any(|f| {
                    f.tag() == qname.local_name && f.namespace.as_deref() == qname.namespace()
                });
            if !known {
                return Err(self.fail(format!(
                    "Unknown attribute '{}' on element '{}'",
                    qname,
                    element.local_name()
                )));
            }
        }
        Ok(())
    }

    /// Match `particle` against `children` from `pos`, returning the next
    /// unconsumed position
    fn particle(
        &mut self,
        particle: &Particle<'_>,
        children: &[&Element],
        pos: usize,
    ) -> Result<usize> {
        match particle {
            Particle::Field { field, ctx } => self.field(field, ctx, children, pos),
            Particle::Model {
                model: ModelType::Sequence,
                parts,
            } => {
                let mut pos = pos;
                for part in parts {
                    pos = self.particle(part, children, pos)?;
                }
                Ok(pos)
            }
            Particle::Model {
                model: ModelType::Choice,
                parts,
            } => {
                if let Some(child) = children.get(pos) {
                    if let Some(part) = parts.iter().find(|p| self.starts_with(p, child)) {
                        return self.particle(part, children, pos);
                    }
                }
                if particle.nullable() {
                    return Ok(pos);
                }
                let options: Vec<String> = parts.iter().map(Particle::describe).collect();
                Err(self.fail(format!("Expected one of: {}", options.join(", "))))
            }
            Particle::Model {
                model: ModelType::All,
                parts,
            } => {
                let mut used = vec![false; parts.len()];
                let mut pos = pos;
                'children: while let Some(child) = children.get(pos) {
                    for (i, part) in parts.iter().enumerate() {
                        if !used[i] && self.starts_with(part, child) {
                            used[i] = true;
                            pos = self.particle(part, children, pos)?;
                            continue 'children;
                        }
                    }
                    break;
                }
                for (part, _) in parts.iter().zip(used).filter(|(_, used)| !used) {
                    if !part.nullable() {
                        return Err(self.fail(format!(
                            "Missing required element '{}'",
                            part.describe()
                        )));
                    }
                }
                Ok(pos)
            }
        }
    }

    fn starts_with(&self, particle: &Particle<'_>, child: &Element) -> bool {
        match particle {
            Particle::Field { field, ctx } => self.match_child(field, ctx, child).is_some(),
            Particle::Model {
                model: ModelType::Sequence,
                parts,
            } => {
                for part in parts {
                    if self.starts_with(part, child) {
                        return true;
                    }
                    if !part.nullable() {
                        return false;
                    }
                }
                false
            }
            Particle::Model { parts, .. } => parts.iter().any(|p| self.starts_with(p, child)),
        }
    }

    /// Declaration for `child` if it can occupy `field`, directly or as a
    /// member of the field's substitution group
    fn match_child(
        &self,
        field: &Arc<Field>,
        ctx: &RenderContext,
        child: &Element,
    ) -> Option<Matched> {
        if field.kind == FieldKind::ClassNamed {
            return Some(Matched {
                decl: field.clone(),
                namespace: None,
                ctx: ctx.clone(),
            });
        }
        if field.matches(child) {
            return Some(Matched {
                decl: field.clone(),
                namespace: Some(field.qname(ctx).namespace().map(str::to_string)),
                ctx: ctx.clone(),
            });
        }
        self.schema.all_schemas().into_iter().find_map(|schema| {
            let member = schema.elements().get(child.local_name())?;
            let head = member.substitution_group.as_deref()?;
            (local_part(head) == field.tag()).then(|| Matched {
                decl: member.clone(),
                namespace: Some(schema.target_namespace().map(str::to_string)),
                ctx: RenderContext::new(schema.target_namespace(), schema.element_form_default()),
            })
        })
    }

    fn field(
        &mut self,
        field: &Arc<Field>,
        ctx: &RenderContext,
        children: &[&Element],
        pos: usize,
    ) -> Result<usize> {
        let max = match field.kind {
            FieldKind::List => field.max_occurs,
            _ => MaxOccurs::Bounded(1),
        };
        let mut count = 0usize;
        let mut pos = pos;
        while let Some(child) = children.get(pos) {
            if !max.allows(count + 1) {
                break;
            }
            let Some(matched) = self.match_child(field, ctx, child) else {
                break;
            };
            if let Some(expected) = &matched.namespace {
                if child.namespace() != expected.as_deref() {
                    let wanted = QName::new(expected.as_deref(), child.local_name());
                    return Err(self.fail(format!(
                        "Element '{}' should be '{}'",
                        child.qname, wanted
                    )));
                }
            }
            self.element(child, &matched.decl, &matched.ctx)?;
            count += 1;
            pos += 1;
        }
        if (count as u64) < field.min_occurs {
            return Err(self.fail(format!(
                "Missing required element '{}' ({} of at least {})",
                field.tag(),
                count,
                field.min_occurs
            )));
        }
        Ok(pos)
    }
}

fn is_foreign_attribute(qname: &QName) -> bool {
    matches!(qname.namespace(), Some(XSI_NAMESPACE) | Some(XML_NAMESPACE))
}
