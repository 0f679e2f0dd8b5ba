//! Primitive and restricted simple types
//!
//! A [`SimpleType`] is a built-in [`Primitive`] plus an optional
//! [`Restriction`]. It validates values (`accept`), renders them to element
//! or attribute text (`to_text`) and reads them back (`from_text`).
//!
//! Numeric checks run against the text form of a value, in the order
//! enumeration, fraction digits, bounds, pattern, total digits.

use crate::documents::Element;
use crate::error::{Error, Result, ValidationError};
use crate::names::is_valid_qname;
use crate::namespaces::{QName, XML_NAMESPACE};
use crate::xsd::facets::{
    EnumerationFacet, FractionDigitsFacet, LengthFacet, MaxLengthFacet, MinLengthFacet,
    PatternFacet, RangeFacets, TotalDigitsFacet, WhiteSpace,
};
use crate::xsd::values::{Value, XsdDate, XsdDateTime};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use once_cell::sync::OnceCell;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Lexical value of `maxOccurs` meaning no upper bound
pub const UNBOUNDED: &str = "unbounded";

// =============================================================================
// Primitives
// =============================================================================

/// Built-in XSD types supported by the type model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    /// xs:string
    String,
    /// xs:normalizedString
    NormalizedString,
    /// xs:token
    Token,
    /// xs:anyURI
    AnyUri,
    /// xs:QName
    QName,
    /// xs:boolean
    Boolean,
    /// xs:decimal
    Decimal,
    /// xs:integer
    Integer,
    /// xs:long
    Long,
    /// xs:int
    Int,
    /// xs:short
    Short,
    /// xs:byte
    Byte,
    /// xs:nonNegativeInteger
    NonNegativeInteger,
    /// xs:positiveInteger
    PositiveInteger,
    /// xs:nonPositiveInteger
    NonPositiveInteger,
    /// xs:negativeInteger
    NegativeInteger,
    /// xs:unsignedLong
    UnsignedLong,
    /// xs:unsignedInt
    UnsignedInt,
    /// xs:unsignedShort
    UnsignedShort,
    /// xs:unsignedByte
    UnsignedByte,
    /// xs:float
    Float,
    /// xs:double
    Double,
    /// xs:date
    Date,
    /// xs:dateTime
    DateTime,
    /// xs:base64Binary
    Base64Binary,
    /// Positive integer or `unbounded`, as used by `maxOccurs`
    MaxOccurs,
}

impl Primitive {
    /// Look up a built-in type by its local XSD name
    pub fn from_name(name: &str) -> Option<Self> {
        let primitive = match name {
            "string" => Primitive::String,
            "normalizedString" => Primitive::NormalizedString,
            "token" => Primitive::Token,
            "anyURI" => Primitive::AnyUri,
            "QName" => Primitive::QName,
            "boolean" => Primitive::Boolean,
            "decimal" => Primitive::Decimal,
            "integer" => Primitive::Integer,
            "long" => Primitive::Long,
            "int" => Primitive::Int,
            "short" => Primitive::Short,
            "byte" => Primitive::Byte,
            "nonNegativeInteger" => Primitive::NonNegativeInteger,
            "positiveInteger" => Primitive::PositiveInteger,
            "nonPositiveInteger" => Primitive::NonPositiveInteger,
            "negativeInteger" => Primitive::NegativeInteger,
            "unsignedLong" => Primitive::UnsignedLong,
            "unsignedInt" => Primitive::UnsignedInt,
            "unsignedShort" => Primitive::UnsignedShort,
            "unsignedByte" => Primitive::UnsignedByte,
            "float" => Primitive::Float,
            "double" => Primitive::Double,
            "date" => Primitive::Date,
            "dateTime" => Primitive::DateTime,
            "base64Binary" => Primitive::Base64Binary,
            _ => return None,
        };
        Some(primitive)
    }

    /// Local name in the XSD namespace
    ///
    /// `MaxOccurs` has no built-in counterpart and is published as a string.
    pub fn xsd_name(&self) -> &'static str {
        match self {
            Primitive::String | Primitive::MaxOccurs => "string",
            Primitive::NormalizedString => "normalizedString",
            Primitive::Token => "token",
            Primitive::AnyUri => "anyURI",
            Primitive::QName => "QName",
            Primitive::Boolean => "boolean",
            Primitive::Decimal => "decimal",
            Primitive::Integer => "integer",
            Primitive::Long => "long",
            Primitive::Int => "int",
            Primitive::Short => "short",
            Primitive::Byte => "byte",
            Primitive::NonNegativeInteger => "nonNegativeInteger",
            Primitive::PositiveInteger => "positiveInteger",
            Primitive::NonPositiveInteger => "nonPositiveInteger",
            Primitive::NegativeInteger => "negativeInteger",
            Primitive::UnsignedLong => "unsignedLong",
            Primitive::UnsignedInt => "unsignedInt",
            Primitive::UnsignedShort => "unsignedShort",
            Primitive::UnsignedByte => "unsignedByte",
            Primitive::Float => "float",
            Primitive::Double => "double",
            Primitive::Date => "date",
            Primitive::DateTime => "dateTime",
            Primitive::Base64Binary => "base64Binary",
        }
    }

    /// Type this primitive derives from, if any
    pub fn base(&self) -> Option<Primitive> {
        match self {
            Primitive::NormalizedString => Some(Primitive::String),
            Primitive::Token => Some(Primitive::NormalizedString),
            Primitive::Integer => Some(Primitive::Decimal),
            Primitive::Long | Primitive::NonNegativeInteger | Primitive::NonPositiveInteger => {
                Some(Primitive::Integer)
            }
            Primitive::Int => Some(Primitive::Long),
            Primitive::Short => Some(Primitive::Int),
            Primitive::Byte => Some(Primitive::Short),
            Primitive::PositiveInteger | Primitive::UnsignedLong => {
                Some(Primitive::NonNegativeInteger)
            }
            Primitive::NegativeInteger => Some(Primitive::NonPositiveInteger),
            Primitive::UnsignedInt => Some(Primitive::UnsignedLong),
            Primitive::UnsignedShort => Some(Primitive::UnsignedInt),
            Primitive::UnsignedByte => Some(Primitive::UnsignedShort),
            _ => None,
        }
    }

    /// Check whether this primitive is `other` or derives from it
    pub fn derives_from(&self, other: Primitive) -> bool {
        let mut current = Some(*self);
        while let Some(p) = current {
            if p == other {
                return true;
            }
            current = p.base();
        }
        false
    }

    /// Check if this is a string-valued primitive
    pub fn is_string(&self) -> bool {
        matches!(
            self,
            Primitive::String
                | Primitive::NormalizedString
                | Primitive::Token
                | Primitive::AnyUri
                | Primitive::QName
        )
    }

    /// Check if this is xs:integer or one of its restrictions
    pub fn is_integer(&self) -> bool {
        self.derives_from(Primitive::Integer)
    }

    /// Check if this type is numeric
    pub fn is_numeric(&self) -> bool {
        self.derives_from(Primitive::Decimal)
            || matches!(self, Primitive::Float | Primitive::Double)
    }

    /// White space handling fixed by the primitive
    pub fn white_space(&self) -> WhiteSpace {
        match self {
            Primitive::String => WhiteSpace::Preserve,
            Primitive::NormalizedString => WhiteSpace::Replace,
            _ => WhiteSpace::Collapse,
        }
    }

    /// Value bounds fixed by the primitive and its ancestors
    pub fn bounds(&self) -> RangeFacets {
        let own = match self {
            Primitive::Long => range(i64::MIN as i128, i64::MAX as i128),
            Primitive::Int => range(i32::MIN as i128, i32::MAX as i128),
            Primitive::Short => range(i16::MIN as i128, i16::MAX as i128),
            Primitive::Byte => range(i8::MIN as i128, i8::MAX as i128),
            Primitive::NonNegativeInteger => RangeFacets {
                min_inclusive: Some(Decimal::ZERO),
                ..RangeFacets::default()
            },
            Primitive::PositiveInteger => RangeFacets {
                min_inclusive: Some(Decimal::ONE),
                ..RangeFacets::default()
            },
            Primitive::NonPositiveInteger => RangeFacets {
                max_inclusive: Some(Decimal::ZERO),
                ..RangeFacets::default()
            },
            Primitive::NegativeInteger => RangeFacets {
                max_inclusive: Some(Decimal::NEGATIVE_ONE),
                ..RangeFacets::default()
            },
            Primitive::UnsignedLong => range(0, u64::MAX as i128),
            Primitive::UnsignedInt => range(0, u32::MAX as i128),
            Primitive::UnsignedShort => range(0, u16::MAX as i128),
            Primitive::UnsignedByte => range(0, u8::MAX as i128),
            _ => RangeFacets::default(),
        };
        match self.base() {
            Some(base) => base.bounds().narrow(&own),
            None => own,
        }
    }

    /// Fraction digits fixed by the primitive (zero for the integer family)
    pub fn fraction_digits(&self) -> Option<u32> {
        if self.is_integer() {
            Some(0)
        } else {
            None
        }
    }
}

fn range(min: i128, max: i128) -> RangeFacets {
    RangeFacets {
        min_inclusive: Decimal::from_i128(min),
        max_inclusive: Decimal::from_i128(max),
        ..RangeFacets::default()
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "xs:{}", self.xsd_name())
    }
}

// =============================================================================
// Restrictions
// =============================================================================

/// Facets narrowing a primitive
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Restriction {
    /// Allowed literal values
    pub enumeration: EnumerationFacet,
    /// Regular expression the text form must match
    pub pattern: Option<PatternFacet>,
    /// Exact length
    pub length: Option<LengthFacet>,
    /// Minimum length
    pub min_length: Option<MinLengthFacet>,
    /// Maximum length
    pub max_length: Option<MaxLengthFacet>,
    /// White space handling override
    pub white_space: Option<WhiteSpace>,
    /// Exact number of fraction digits
    pub fraction_digits: Option<FractionDigitsFacet>,
    /// Maximum number of digits
    pub total_digits: Option<TotalDigitsFacet>,
    /// Inclusive and exclusive bounds
    pub range: RangeFacets,
}

impl Restriction {
    /// True when no facet is set
    pub fn is_empty(&self) -> bool {
        *self == Restriction::default()
    }
}

// =============================================================================
// Simple types
// =============================================================================

/// A primitive, optionally restricted and named
#[derive(Debug)]
pub struct SimpleType {
    name: Option<String>,
    primitive: Primitive,
    restriction: Restriction,
    xml_lang: Option<String>,
    namespace: OnceCell<String>,
}

impl SimpleType {
    /// Anonymous type for a primitive
    pub fn new(primitive: Primitive) -> Self {
        Self {
            name: None,
            primitive,
            restriction: Restriction::default(),
            xml_lang: None,
            namespace: OnceCell::new(),
        }
    }

    /// Named restriction of a primitive
    pub fn named(name: impl Into<String>, primitive: Primitive) -> Self {
        let mut simple = Self::new(primitive);
        simple.name = Some(name.into());
        simple
    }

    /// Shared handle for an unrestricted built-in type
    pub fn builtin(primitive: Primitive) -> Arc<Self> {
        Arc::new(Self::new(primitive))
    }

    /// Restrict to a set of literal values
    pub fn with_enumeration<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.restriction.enumeration =
            EnumerationFacet::new(values.into_iter().map(Into::into).collect());
        self
    }

    /// Require the text form to match a regular expression
    pub fn with_pattern(mut self, pattern: &str) -> Result<Self> {
        self.restriction.pattern = Some(PatternFacet::new(pattern)?);
        Ok(self)
    }

    /// Require an exact length
    pub fn with_length(mut self, length: usize) -> Self {
        self.restriction.length = Some(LengthFacet::new(length));
        self
    }

    /// Require a minimum length
    pub fn with_min_length(mut self, length: usize) -> Self {
        self.restriction.min_length = Some(MinLengthFacet::new(length));
        self
    }

    /// Require a maximum length
    pub fn with_max_length(mut self, length: usize) -> Self {
        self.restriction.max_length = Some(MaxLengthFacet::new(length));
        self
    }

    /// Override white space handling
    pub fn with_white_space(mut self, white_space: WhiteSpace) -> Self {
        self.restriction.white_space = Some(white_space);
        self
    }

    /// Require an exact number of fraction digits
    pub fn with_fraction_digits(mut self, digits: u32) -> Self {
        self.restriction.fraction_digits = Some(FractionDigitsFacet::new(digits));
        self
    }

    /// Limit the total number of digits
    pub fn with_total_digits(mut self, digits: u32) -> Self {
        self.restriction.total_digits = Some(TotalDigitsFacet::new(digits));
        self
    }

    /// Set numeric bounds
    pub fn with_range(mut self, range: RangeFacets) -> Self {
        self.restriction.range = range;
        self
    }

    /// Tag rendered elements with `xml:lang`
    pub fn with_xml_lang(mut self, lang: impl Into<String>) -> Self {
        self.xml_lang = Some(lang.into());
        self
    }

    /// Type name, `None` for anonymous and built-in types
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Underlying primitive
    pub fn primitive(&self) -> Primitive {
        self.primitive
    }

    /// Declared facets
    pub fn restriction(&self) -> &Restriction {
        &self.restriction
    }

    /// Namespace stamped by the owning schema
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.get().map(String::as_str)
    }

    /// Bind to a schema's target namespace; a type belongs to one schema
    pub fn bind_namespace(&self, namespace: &str) -> Result<()> {
        if let Err(requested) = self.namespace.set(namespace.to_string()) {
            if self.namespace() != Some(requested.as_str()) {
                return Err(Error::Schema(format!(
                    "Simple type '{}' is already bound to namespace '{}'",
                    self.name.as_deref().unwrap_or("(anonymous)"),
                    self.namespace().unwrap_or_default()
                )));
            }
        }
        Ok(())
    }

    /// Qualified name of a named type
    pub fn qname(&self) -> Option<QName> {
        self.name
            .as_ref()
            .map(|name| QName::new(self.namespace(), name.clone()))
    }

    fn white_space(&self) -> WhiteSpace {
        self.restriction
            .white_space
            .unwrap_or_else(|| self.primitive.white_space())
    }

    fn bounds(&self) -> RangeFacets {
        self.primitive.bounds().narrow(&self.restriction.range)
    }

    /// Validate a value and return its canonical form
    pub fn accept(&self, value: Value) -> Result<Value> {
        let value = self.coerce(value)?;
        self.check_facets(&value)?;
        Ok(value)
    }

    /// Convert any supported representation into this type's value variant
    fn coerce(&self, value: Value) -> Result<Value> {
        let mismatch = |value: &Value| {
            Error::Type(format!(
                "{} cannot hold a {} value",
                self.primitive,
                value.kind()
            ))
        };

        match self.primitive {
            p if p.is_string() => match value {
                Value::String(s) => {
                    let s = self.white_space().normalize(&s);
                    if p == Primitive::QName && !is_valid_qname(&s) {
                        return Err(Error::Validation(
                            ValidationError::new("Invalid QName").with_value(s),
                        ));
                    }
                    Ok(Value::String(s))
                }
                other => Err(mismatch(&other)),
            },
            Primitive::Boolean => match value {
                Value::Boolean(b) => Ok(Value::Boolean(b)),
                Value::String(s) => parse_boolean(&s).map(Value::Boolean),
                other => Err(mismatch(&other)),
            },
            Primitive::Decimal => match value {
                Value::Decimal(d) => Ok(Value::Decimal(d)),
                Value::Integer(i) => decimal_from_i128(i).map(Value::Decimal),
                Value::String(s) => parse_decimal(&s).map(Value::Decimal),
                other => Err(mismatch(&other)),
            },
            p if p.is_integer() => match value {
                Value::Integer(i) => Ok(Value::Integer(i)),
                Value::Decimal(d) if d.fract().is_zero() => d
                    .trunc()
                    .to_i128()
                    .map(Value::Integer)
                    .ok_or_else(|| Error::validation(format!("Integer out of range: {}", d))),
                Value::String(s) => parse_integer(&s).map(Value::Integer),
                other => Err(mismatch(&other)),
            },
            Primitive::Float | Primitive::Double => match value {
                Value::Float(f) => Ok(Value::Float(f)),
                Value::Integer(i) => Ok(Value::Float(i as f64)),
                Value::Decimal(d) => d
                    .to_f64()
                    .map(Value::Float)
                    .ok_or_else(|| Error::validation(format!("Invalid float: {}", d))),
                Value::String(s) => parse_float(&s).map(Value::Float),
                other => Err(mismatch(&other)),
            },
            Primitive::Date => match value {
                Value::Date(d) => Ok(Value::Date(d)),
                Value::DateTime(_) => Err(Error::validation(
                    "Date value must not contain a time component",
                )),
                Value::String(s) => XsdDate::parse(&s).map(Value::Date),
                other => Err(mismatch(&other)),
            },
            Primitive::DateTime => match value {
                Value::DateTime(d) => Ok(Value::DateTime(d)),
                Value::String(s) => XsdDateTime::parse(&s).map(Value::DateTime),
                other => Err(mismatch(&other)),
            },
            Primitive::Base64Binary => match value {
                Value::Binary(b) => Ok(Value::Binary(b)),
                Value::String(s) => decode_base64(&s).map(Value::Binary),
                other => Err(mismatch(&other)),
            },
            Primitive::MaxOccurs => match value {
                Value::Integer(i) if i > 0 => Ok(Value::Integer(i)),
                Value::String(s) if s.trim() == UNBOUNDED => {
                    Ok(Value::String(UNBOUNDED.to_string()))
                }
                Value::String(s) => match s.trim().parse::<i128>() {
                    Ok(i) if i > 0 => Ok(Value::Integer(i)),
                    _ => Err(Error::Validation(
                        ValidationError::new("maxOccurs must be a positive integer or 'unbounded'")
                            .with_value(s),
                    )),
                },
                other => Err(Error::Validation(
                    ValidationError::new("maxOccurs must be a positive integer or 'unbounded'")
                        .with_value(format!("{:?}", other)),
                )),
            },
            _ => Err(mismatch(&value)),
        }
    }

    fn check_facets(&self, value: &Value) -> Result<()> {
        let r = &self.restriction;
        let text = self.to_text(value)?;

        if self.primitive.is_numeric() {
            r.enumeration.validate(&text)?;
            if let Some(digits) = r
                .fraction_digits
                .or_else(|| self.primitive.fraction_digits().map(FractionDigitsFacet::new))
            {
                digits.validate(&text)?;
            }
            let bounds = self.bounds();
            match value {
                Value::Integer(i) => bounds.validate_integer(*i, &text)?,
                Value::Decimal(d) => bounds.validate(d, &text)?,
                Value::Float(f) if f.is_finite() => bounds.validate_float(*f, &text)?,
                _ => {}
            }
            if let Some(pattern) = &r.pattern {
                pattern.validate(&text)?;
            }
            if let Some(total) = r.total_digits {
                total.validate(&text)?;
            }
            return Ok(());
        }

        r.enumeration.validate(&text)?;
        let len = match value {
            Value::Binary(bytes) => bytes.len(),
            _ => text.chars().count(),
        };
        if let Some(f) = r.length {
            f.validate_len(len, &text)?;
        }
        if let Some(f) = r.min_length {
            f.validate_len(len, &text)?;
        }
        if let Some(f) = r.max_length {
            f.validate_len(len, &text)?;
        }
        if let Some(pattern) = &r.pattern {
            pattern.validate(&text)?;
        }
        Ok(())
    }

    /// Text form of a value of this type
    pub fn to_text(&self, value: &Value) -> Result<String> {
        let text = match value {
            Value::String(s) => s.clone(),
            Value::Boolean(b) => b.to_string(),
            Value::Integer(i) => i.to_string(),
            Value::Decimal(d) => d.to_string(),
            Value::Float(f) => format_float(*f),
            Value::Date(d) => d.to_string(),
            Value::DateTime(d) => d.to_string(),
            Value::Binary(b) => STANDARD.encode(b),
            other => {
                return Err(Error::Type(format!(
                    "{} cannot render a {} value",
                    self.primitive,
                    other.kind()
                )))
            }
        };
        Ok(text)
    }

    /// Read a value from element or attribute text
    ///
    /// Returns `None` when the text carries no value: empty text for
    /// non-string types, and `nil` for booleans.
    pub fn from_text(&self, text: &str) -> Result<Option<Value>> {
        if self.primitive.is_string() {
            return Ok(Some(Value::String(text.to_string())));
        }
        let trimmed = text.trim();
        if trimmed.is_empty() || (self.primitive == Primitive::Boolean && trimmed == "nil") {
            return Ok(None);
        }
        self.coerce(Value::String(trimmed.to_string())).map(Some)
    }

    /// Write a value as the text of `element`
    pub fn render(&self, element: &mut Element, value: &Value) -> Result<()> {
        element.set_text(self.to_text(value)?);
        if let Some(lang) = &self.xml_lang {
            element.set_attribute(QName::namespaced(XML_NAMESPACE, "lang"), lang.clone());
        }
        Ok(())
    }
}

fn parse_boolean(s: &str) -> Result<bool> {
    match s.trim() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        other => Err(Error::Validation(
            ValidationError::new("Invalid boolean").with_value(other),
        )),
    }
}

fn parse_decimal(s: &str) -> Result<Decimal> {
    let s = s.trim();
    Decimal::from_str(s).map_err(|e| {
        Error::Validation(
            ValidationError::new("Invalid decimal")
                .with_value(s)
                .with_reason(e.to_string()),
        )
    })
}

fn decimal_from_i128(i: i128) -> Result<Decimal> {
    Decimal::from_i128(i).ok_or_else(|| Error::validation(format!("Decimal out of range: {}", i)))
}

fn parse_integer(s: &str) -> Result<i128> {
    let s = s.trim();
    s.strip_prefix('+')
        .unwrap_or(s)
        .parse::<i128>()
        .map_err(|e| {
            Error::Validation(
                ValidationError::new("Invalid integer")
                    .with_value(s)
                    .with_reason(e.to_string()),
            )
        })
}

fn parse_float(s: &str) -> Result<f64> {
    match s.trim() {
        "INF" => Ok(f64::INFINITY),
        "-INF" => Ok(f64::NEG_INFINITY),
        "NaN" => Ok(f64::NAN),
        other => other.parse::<f64>().map_err(|e| {
            Error::Validation(
                ValidationError::new("Invalid float")
                    .with_value(other)
                    .with_reason(e.to_string()),
            )
        }),
    }
}

fn format_float(f: f64) -> String {
    if f.is_nan() {
        "NaN".to_string()
    } else if f == f64::INFINITY {
        "INF".to_string()
    } else if f == f64::NEG_INFINITY {
        "-INF".to_string()
    } else {
        f.to_string()
    }
}

fn decode_base64(s: &str) -> Result<Vec<u8>> {
    let compact: String = s.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD.decode(compact.as_bytes()).map_err(|e| {
        Error::Validation(
            ValidationError::new("Invalid base64Binary")
                .with_value(s)
                .with_reason(e.to_string()),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn text(st: &SimpleType, value: Value) -> String {
        st.to_text(&st.accept(value).unwrap()).unwrap()
    }

    #[test]
    fn test_primitive_lookup() {
        assert_eq!(Primitive::from_name("int"), Some(Primitive::Int));
        assert_eq!(Primitive::from_name("anyURI"), Some(Primitive::AnyUri));
        assert_eq!(Primitive::from_name("nope"), None);
        assert_eq!(Primitive::Int.to_string(), "xs:int");
    }

    #[test]
    fn test_integer_family_bounds() {
        assert!(SimpleType::new(Primitive::Int).accept(Value::Integer(i32::MAX as i128)).is_ok());
        let int = SimpleType::new(Primitive::Int);
        assert!(int.accept(Value::Integer(i32::MAX as i128 + 1)).is_err());
        assert!(SimpleType::new(Primitive::Byte).accept("-129".into()).is_err());
        assert!(SimpleType::new(Primitive::UnsignedShort).accept("65535".into()).is_ok());
        assert!(SimpleType::new(Primitive::PositiveInteger).accept("0".into()).is_err());
        assert!(SimpleType::new(Primitive::NegativeInteger).accept("-1".into()).is_ok());
        assert!(SimpleType::new(Primitive::Integer).accept("1.5".into()).is_err());
    }

    #[test]
    fn test_fraction_digits_boundary() {
        let st = SimpleType::new(Primitive::Decimal).with_fraction_digits(2);
        assert!(st.accept("2.22".into()).is_ok());
        assert!(st.accept("2.2".into()).is_err());
        assert!(st.accept("2.222".into()).is_err());
    }

    #[test]
    fn test_numeric_restrictions() {
        let st = SimpleType::new(Primitive::Decimal)
            .with_range(RangeFacets {
                min_exclusive: Some(Decimal::ZERO),
                max_inclusive: Some(Decimal::from(100)),
                ..RangeFacets::default()
            })
            .with_total_digits(3);
        assert!(st.accept("99.5".into()).is_ok());
        assert!(st.accept("0".into()).is_err());
        assert!(st.accept("100.01".into()).is_err());
        assert!(st.accept("9.999".into()).is_err());
    }

    #[test]
    fn test_numeric_enumeration() {
        let st = SimpleType::new(Primitive::Integer).with_enumeration(["1", "2"]);
        assert!(st.accept(Value::Integer(2)).is_ok());
        assert!(st.accept(Value::Integer(3)).is_err());
    }

    #[test]
    fn test_string_whitespace_before_length() {
        let st = SimpleType::new(Primitive::String)
            .with_white_space(WhiteSpace::Collapse)
            .with_max_length(5);
        assert_eq!(text(&st, "  a   b  ".into()), "a b");
        assert!(st.accept("abcdef".into()).is_err());

        let replace = SimpleType::new(Primitive::String).with_white_space(WhiteSpace::Replace);
        assert_eq!(text(&replace, "a\t\tb".into()), "a  b");
    }

    #[test]
    fn test_string_pattern_and_enumeration() {
        let st = SimpleType::new(Primitive::String).with_pattern("[A-Z]{2}").unwrap();
        assert!(st.accept("NL".into()).is_ok());
        assert!(st.accept("nl".into()).is_err());

        let colors = SimpleType::new(Primitive::String).with_enumeration(["red", "green"]);
        assert!(colors.accept("red".into()).is_ok());
        assert!(colors.accept("blue".into()).is_err());
        assert!(colors.accept(Value::Integer(1)).is_err());
    }

    #[test]
    fn test_boolean_text() {
        let st = SimpleType::new(Primitive::Boolean);
        assert_eq!(st.from_text("true").unwrap(), Some(Value::Boolean(true)));
        assert_eq!(st.from_text("0").unwrap(), Some(Value::Boolean(false)));
        assert_eq!(st.from_text("nil").unwrap(), None);
        assert_eq!(st.from_text("").unwrap(), None);
        assert!(st.from_text("yes").is_err());
        assert_eq!(text(&st, Value::Boolean(false)), "false");
    }

    #[test]
    fn test_date_accepts_string_and_rejects_datetime() {
        let st = SimpleType::new(Primitive::Date);
        assert_eq!(text(&st, "2011-05-06+01:00".into()), "2011-05-06+01:00");
        assert!(st.accept("2011-05-06T10:00:00".into()).is_err());
    }

    #[test]
    fn test_max_occurs() {
        let st = SimpleType::new(Primitive::MaxOccurs);
        assert_eq!(st.accept("unbounded".into()).unwrap(), Value::String("unbounded".into()));
        assert_eq!(st.accept("3".into()).unwrap(), Value::Integer(3));
        assert!(st.accept("0".into()).is_err());
        assert!(st.accept("many".into()).is_err());
    }

    #[test]
    fn test_base64_and_qname() {
        let st = SimpleType::new(Primitive::Base64Binary);
        assert_eq!(text(&st, Value::Binary(b"hello".to_vec())), "aGVsbG8=");
        assert_eq!(st.from_text("aGVs\nbG8=").unwrap(), Some(Value::Binary(b"hello".to_vec())));

        let qname = SimpleType::new(Primitive::QName);
        assert!(qname.accept("soap:Client".into()).is_ok());
        assert!(qname.accept("soap:".into()).is_err());
    }

    #[test]
    fn test_bind_namespace_once() {
        let st = SimpleType::named("Color", Primitive::String);
        st.bind_namespace("urn:a").unwrap();
        st.bind_namespace("urn:a").unwrap();
        assert!(matches!(st.bind_namespace("urn:b"), Err(Error::Schema(_))));
        assert_eq!(st.qname(), Some(QName::namespaced("urn:a", "Color")));
    }

    #[test]
    fn test_integer_bounds_beyond_decimal_range() {
        let huge = "100000000000000000000000000000";
        assert!(SimpleType::new(Primitive::Long).accept(huge.into()).is_err());
        assert!(SimpleType::new(Primitive::Int).accept(format!("-{}", huge).into()).is_err());
        assert!(SimpleType::new(Primitive::UnsignedLong).accept(huge.into()).is_err());
        assert!(SimpleType::new(Primitive::NonPositiveInteger).accept(huge.into()).is_err());
        let positive = SimpleType::new(Primitive::PositiveInteger);
        assert!(positive.accept(format!("-{}", huge).into()).is_err());
        assert!(SimpleType::new(Primitive::Integer).accept(huge.into()).is_ok());

        let long = SimpleType::new(Primitive::Long);
        assert!(long.accept(Value::Integer(i64::MAX as i128)).is_ok());
        assert!(long.accept(Value::Integer(i64::MAX as i128 + 1)).is_err());
        assert!(long.accept(Value::Integer(i64::MIN as i128 - 1)).is_err());
        let unsigned = SimpleType::new(Primitive::UnsignedLong);
        assert!(unsigned.accept(Value::Integer(u64::MAX as i128)).is_ok());
        assert!(unsigned.accept(Value::Integer(u64::MAX as i128 + 1)).is_err());
        assert!(unsigned.accept(Value::Integer(-1)).is_err());

        let bounded = SimpleType::new(Primitive::Double).with_range(RangeFacets {
            max_inclusive: Some(Decimal::from(10)),
            ..RangeFacets::default()
        });
        assert!(bounded.accept(Value::Float(1e40)).is_err());
    }

    proptest! {
        #[test]
        fn prop_integer_text_round_trip(i in any::<i64>()) {
            let st = SimpleType::new(Primitive::Long);
            let value = st.accept(Value::Integer(i as i128)).unwrap();
            let parsed = st.from_text(&st.to_text(&value).unwrap()).unwrap();
            prop_assert_eq!(parsed, Some(value));
        }

        #[test]
        fn prop_accept_is_idempotent(s in "[a-z ]{0,20}") {
            let st = SimpleType::new(Primitive::Token);
            let once = st.accept(Value::String(s)).unwrap();
            let twice = st.accept(once.clone()).unwrap();
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn prop_decimal_text_round_trip(units in any::<i64>(), scale in 0u32..10) {
            let st = SimpleType::new(Primitive::Decimal);
            let value = Value::Decimal(Decimal::new(units, scale));
            let parsed = st.from_text(&st.to_text(&value).unwrap()).unwrap();
            prop_assert_eq!(parsed, Some(value));
        }
    }
}
