//! Runtime values held by structured type instances

use crate::documents::Element;
use crate::error::{Error, Result, ValidationError};
use crate::xsd::complex::Instance;
use crate::xsd::fields::{Field, MaxOccurs};
use chrono::{FixedOffset, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use std::fmt;
use std::sync::Arc;

/// A value assigned to a field
///
/// `Nil` is the explicit nil sentinel (`xsi:nil="true"`); an unset field is
/// represented by the absence of a value, not by `Nil`.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Explicit nil
    Nil,
    /// Any string-derived primitive
    String(String),
    /// xs:boolean
    Boolean(bool),
    /// xs:integer and its derived types
    Integer(i128),
    /// xs:decimal
    Decimal(Decimal),
    /// xs:float / xs:double
    Float(f64),
    /// xs:date
    Date(XsdDate),
    /// xs:dateTime
    DateTime(XsdDateTime),
    /// xs:base64Binary
    Binary(Vec<u8>),
    /// Instance of a structured type
    Complex(Instance),
    /// Repeated element values
    List(ListValue),
    /// Value carrying its own tag name (polymorphic payload slot)
    Named(Box<NamedValue>),
    /// Raw XML content for untyped fields
    Xml(Element),
}

impl Value {
    /// True for the nil sentinel
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// String content, if this is a string value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Boolean content
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Integer content
    pub fn as_integer(&self) -> Option<i128> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Decimal content
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Value::Decimal(d) => Some(*d),
            _ => None,
        }
    }

    /// Structured instance content
    pub fn as_instance(&self) -> Option<&Instance> {
        match self {
            Value::Complex(i) => Some(i),
            _ => None,
        }
    }

    /// List content
    pub fn as_list(&self) -> Option<&ListValue> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    /// Raw XML content
    pub fn as_xml(&self) -> Option<&Element> {
        match self {
            Value::Xml(e) => Some(e),
            _ => None,
        }
    }

    /// Short name of the variant, used in type errors
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::String(_) => "string",
            Value::Boolean(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Decimal(_) => "decimal",
            Value::Float(_) => "float",
            Value::Date(_) => "date",
            Value::DateTime(_) => "dateTime",
            Value::Binary(_) => "binary",
            Value::Complex(_) => "complex",
            Value::List(_) => "list",
            Value::Named(_) => "named",
            Value::Xml(_) => "xml",
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i as i128)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i as i128)
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Integer(i as i128)
    }
}

impl From<u64> for Value {
    fn from(i: u64) -> Self {
        Value::Integer(i as i128)
    }
}

impl From<i128> for Value {
    fn from(i: i128) -> Self {
        Value::Integer(i)
    }
}

impl From<Decimal> for Value {
    fn from(d: Decimal) -> Self {
        Value::Decimal(d)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<XsdDate> for Value {
    fn from(d: XsdDate) -> Self {
        Value::Date(d)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::Date(XsdDate::new(d))
    }
}

impl From<XsdDateTime> for Value {
    fn from(d: XsdDateTime) -> Self {
        Value::DateTime(d)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(d: NaiveDateTime) -> Self {
        Value::DateTime(XsdDateTime::new(d))
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Binary(b)
    }
}

impl From<Instance> for Value {
    fn from(i: Instance) -> Self {
        Value::Complex(i)
    }
}

impl From<ListValue> for Value {
    fn from(l: ListValue) -> Self {
        Value::List(l)
    }
}

impl From<NamedValue> for Value {
    fn from(n: NamedValue) -> Self {
        Value::Named(Box::new(n))
    }
}

impl From<Element> for Value {
    fn from(e: Element) -> Self {
        Value::Xml(e)
    }
}

// =============================================================================
// Dates
// =============================================================================

/// Split a trailing `Z` or `±HH:MM` timezone off a lexical date/time
fn split_offset(s: &str) -> Result<(&str, Option<FixedOffset>)> {
    if let Some(body) = s.strip_suffix('Z') {
        return Ok((body, FixedOffset::east_opt(0)));
    }
    let bytes = s.as_bytes();
    if bytes.len() > 6 {
        let sign_at = bytes.len() - 6;
        if matches!(bytes[sign_at], b'+' | b'-') && bytes[sign_at + 3] == b':' {
            let (body, tz) = s.split_at(sign_at);
            return Ok((body, Some(parse_offset(tz)?)));
        }
    }
    Ok((s, None))
}

fn parse_offset(tz: &str) -> Result<FixedOffset> {
    let invalid = || Error::validation(format!("Invalid timezone offset '{}'", tz));
    let sign = match tz.as_bytes().first() {
        Some(b'+') => 1,
        Some(b'-') => -1,
        _ => return Err(invalid()),
    };
    let (hours, minutes) = tz[1..].split_once(':').ok_or_else(invalid)?;
    let hours: i32 = hours.parse().map_err(|_| invalid())?;
    let minutes: i32 = minutes.parse().map_err(|_| invalid())?;
    if hours > 14 || minutes > 59 {
        return Err(invalid());
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
}

fn write_offset(f: &mut fmt::Formatter<'_>, offset: &Option<FixedOffset>) -> fmt::Result {
    match offset {
        None => Ok(()),
        Some(o) if o.local_minus_utc() == 0 => f.write_str("Z"),
        Some(o) => {
            let secs = o.local_minus_utc();
            let sign = if secs < 0 { '-' } else { '+' };
            let secs = secs.abs();
            write!(f, "{}{:02}:{:02}", sign, secs / 3600, (secs % 3600) / 60)
        }
    }
}

/// Calendar date with an optional fixed timezone offset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct XsdDate {
    /// Calendar date
    pub date: NaiveDate,
    /// Timezone offset, if the lexical form carried one
    pub offset: Option<FixedOffset>,
}

impl XsdDate {
    /// Date without timezone
    pub fn new(date: NaiveDate) -> Self {
        Self { date, offset: None }
    }

    /// Attach a timezone offset
    pub fn with_offset(mut self, offset: FixedOffset) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Parse `YYYY-MM-DD` with an optional `Z` or `±HH:MM` suffix
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.contains('T') {
            return Err(Error::Validation(
                ValidationError::new("Date value must not contain a time component").with_value(s),
            ));
        }
        let (body, offset) = split_offset(s)?;
        let date = NaiveDate::parse_from_str(body, "%Y-%m-%d").map_err(|e| {
            Error::Validation(
                ValidationError::new("Invalid date")
                    .with_value(s)
                    .with_reason(e.to_string()),
            )
        })?;
        Ok(Self { date, offset })
    }
}

impl fmt::Display for XsdDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.date.format("%Y-%m-%d"))?;
        write_offset(f, &self.offset)
    }
}

/// Date and time with an optional fixed timezone offset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct XsdDateTime {
    /// Local date and time
    pub datetime: NaiveDateTime,
    /// Timezone offset, if the lexical form carried one
    pub offset: Option<FixedOffset>,
}

impl XsdDateTime {
    /// Date-time without timezone
    pub fn new(datetime: NaiveDateTime) -> Self {
        Self {
            datetime,
            offset: None,
        }
    }

    /// Attach a timezone offset
    pub fn with_offset(mut self, offset: FixedOffset) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Parse `YYYY-MM-DDTHH:MM:SS[.fff]` with an optional timezone suffix
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        let (body, offset) = split_offset(s)?;
        let datetime = NaiveDateTime::parse_from_str(body, "%Y-%m-%dT%H:%M:%S%.f").map_err(|e| {
            Error::Validation(
                ValidationError::new("Invalid dateTime")
                    .with_value(s)
                    .with_reason(e.to_string()),
            )
        })?;
        Ok(Self { datetime, offset })
    }
}

impl fmt::Display for XsdDateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.datetime.format("%Y-%m-%dT%H:%M:%S%.f"))?;
        write_offset(f, &self.offset)
    }
}

// =============================================================================
// Named and list values
// =============================================================================

/// A value that names its own element
#[derive(Debug, Clone, PartialEq)]
pub struct NamedValue {
    /// Tag local name
    pub name: String,
    /// Tag namespace
    pub namespace: Option<String>,
    /// Content rendered inside the tag
    pub value: Value,
}

impl NamedValue {
    /// Create a named value
    pub fn new(namespace: Option<&str>, name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.map(str::to_string),
            value: value.into(),
        }
    }
}

/// Ordered values of a list field
///
/// Every insert is checked against the field's item type and `maxOccurs`,
/// so an invalid list cannot be built in the first place.
#[derive(Debug, Clone)]
pub struct ListValue {
    field: Arc<Field>,
    items: Vec<Value>,
}

impl ListValue {
    /// Empty list bound to a list field
    pub fn new(field: Arc<Field>) -> Self {
        Self {
            field,
            items: Vec::new(),
        }
    }

    /// Field this list belongs to
    pub fn field(&self) -> &Arc<Field> {
        &self.field
    }

    /// Validate and append an item
    pub fn push(&mut self, value: impl Into<Value>) -> Result<()> {
        let value = self.field.accept_item(value.into())?;
        if let MaxOccurs::Bounded(max) = self.field.max_occurs {
            if self.items.len() as u64 >= max {
                return Err(Error::Validation(
                    ValidationError::new(format!("List exceeds maxOccurs of {}", max))
                        .with_field(&self.field.name),
                ));
            }
        }
        self.items.push(value);
        Ok(())
    }

    /// Append every item of an iterator
    pub fn extend<I, V>(&mut self, values: I) -> Result<()>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        for value in values {
            self.push(value)?;
        }
        Ok(())
    }

    /// Number of items
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True when the list has no items
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Item at `index`
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.items.get(index)
    }

    /// Iterate over the items
    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.items.iter()
    }

    /// Remove every item
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Items as a slice
    pub fn as_slice(&self) -> &[Value] {
        &self.items
    }
}

impl PartialEq for ListValue {
    fn eq(&self, other: &Self) -> bool {
        self.items == other.items
    }
}

impl<'a> IntoIterator for &'a ListValue {
    type Item = &'a Value;
    type IntoIter = std::slice::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
