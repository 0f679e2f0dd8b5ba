//! XSD constraining facets
//!
//! Facets restrict the value space of a simple type. Numeric facets work on
//! the canonical text of a value, so `2.20` and `2.2` are different as far as
//! `fractionDigits` is concerned.

use crate::error::{Error, Result, ValidationError};
use regex::Regex;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use std::fmt;

/// White space handling modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WhiteSpace {
    /// Preserve all white space
    #[default]
    Preserve,
    /// Replace each tab, newline and carriage return with a space
    Replace,
    /// Replace, then merge runs of spaces and trim the ends
    Collapse,
}

impl WhiteSpace {
    /// Parse from the facet value
    pub fn from_str(s: &str) -> Result<Self> {
        match s {
            "preserve" => Ok(WhiteSpace::Preserve),
            "replace" => Ok(WhiteSpace::Replace),
            "collapse" => Ok(WhiteSpace::Collapse),
            _ => Err(Error::Schema(format!(
                "Invalid whiteSpace value: '{}'. Must be 'preserve', 'replace', or 'collapse'",
                s
            ))),
        }
    }

    /// Facet value as written in a schema
    pub fn as_str(&self) -> &'static str {
        match self {
            WhiteSpace::Preserve => "preserve",
            WhiteSpace::Replace => "replace",
            WhiteSpace::Collapse => "collapse",
        }
    }

    /// Normalize a string according to this white space mode
    pub fn normalize(&self, s: &str) -> String {
        match self {
            WhiteSpace::Preserve => s.to_string(),
            WhiteSpace::Replace => s.replace(['\t', '\n', '\r'], " "),
            WhiteSpace::Collapse => s.split_whitespace().collect::<Vec<_>>().join(" "),
        }
    }
}

fn violation(message: String, value: &str) -> Error {
    Error::Validation(ValidationError::new(message).with_value(value))
}

/// Length facet constrains the exact length of a value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LengthFacet {
    /// Required length
    pub value: usize,
}

impl LengthFacet {
    /// Create a new length facet
    pub fn new(value: usize) -> Self {
        Self { value }
    }

    /// Validate a length
    pub fn validate_len(&self, len: usize, value: &str) -> Result<()> {
        if len != self.value {
            Err(Error::Validation(
                ValidationError::new(format!("Length must be exactly {}", self.value))
                    .with_value(value)
                    .with_reason(format!("Actual length: {}", len)),
            ))
        } else {
            Ok(())
        }
    }
}

/// Minimum length facet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MinLengthFacet {
    /// Minimum length
    pub value: usize,
}

impl MinLengthFacet {
    /// Create a new minimum length facet
    pub fn new(value: usize) -> Self {
        Self { value }
    }

    /// Validate a length
    pub fn validate_len(&self, len: usize, value: &str) -> Result<()> {
        if len < self.value {
            Err(Error::Validation(
                ValidationError::new(format!("Length must be at least {}", self.value))
                    .with_value(value)
                    .with_reason(format!("Actual length: {}", len)),
            ))
        } else {
            Ok(())
        }
    }
}

/// Maximum length facet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaxLengthFacet {
    /// Maximum length
    pub value: usize,
}

impl MaxLengthFacet {
    /// Create a new maximum length facet
    pub fn new(value: usize) -> Self {
        Self { value }
    }

    /// Validate a length
    pub fn validate_len(&self, len: usize, value: &str) -> Result<()> {
        if len > self.value {
            Err(Error::Validation(
                ValidationError::new(format!("Length must be at most {}", self.value))
                    .with_value(value)
                    .with_reason(format!("Actual length: {}", len)),
            ))
        } else {
            Ok(())
        }
    }
}

/// Pattern facet; XSD patterns always match the whole value
#[derive(Debug, Clone)]
pub struct PatternFacet {
    /// Regular expression as declared
    pub pattern: String,
    regex: Regex,
}

impl PatternFacet {
    /// Compile a pattern facet
    pub fn new(pattern: &str) -> Result<Self> {
        let regex = Regex::new(&format!("^(?:{})$", pattern))
            .map_err(|e| Error::Schema(format!("Invalid pattern '{}': {}", pattern, e)))?;

        Ok(Self {
            pattern: pattern.to_string(),
            regex,
        })
    }

    /// Validate a value against this pattern
    pub fn validate(&self, value: &str) -> Result<()> {
        if self.regex.is_match(value) {
            Ok(())
        } else {
            Err(violation(
                format!("Value does not match pattern '{}'", self.pattern),
                value,
            ))
        }
    }
}

impl PartialEq for PatternFacet {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern
    }
}

/// Enumeration facet restricts values to a literal set
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EnumerationFacet {
    /// Allowed values
    pub values: Vec<String>,
}

impl EnumerationFacet {
    /// Create a new enumeration facet
    pub fn new(values: Vec<String>) -> Self {
        Self { values }
    }

    /// True when no values are declared (the facet does not apply)
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Validate a value against this enumeration
    pub fn validate(&self, value: &str) -> Result<()> {
        if self.values.is_empty() || self.values.iter().any(|v| v == value) {
            Ok(())
        } else {
            Err(Error::Validation(
                ValidationError::new("Value is not in the enumeration")
                    .with_value(value)
                    .with_reason(format!("Allowed values: {:?}", self.values)),
            ))
        }
    }
}

/// Inclusive and exclusive numeric bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RangeFacets {
    /// Smallest allowed value
    pub min_inclusive: Option<Decimal>,
    /// Largest allowed value
    pub max_inclusive: Option<Decimal>,
    /// Value must be strictly greater
    pub min_exclusive: Option<Decimal>,
    /// Value must be strictly smaller
    pub max_exclusive: Option<Decimal>,
}

impl RangeFacets {
    /// True when no bound is set
    pub fn is_empty(&self) -> bool {
        self.min_inclusive.is_none()
            && self.max_inclusive.is_none()
            && self.min_exclusive.is_none()
            && self.max_exclusive.is_none()
    }

    /// Tighten these bounds with another set; the narrower bound wins
    pub fn narrow(&self, other: &RangeFacets) -> RangeFacets {
        fn pick(a: Option<Decimal>, b: Option<Decimal>, upper: bool) -> Option<Decimal> {
            match (a, b) {
                (Some(a), Some(b)) => Some(if upper { a.min(b) } else { a.max(b) }),
                (a, b) => a.or(b),
            }
        }
        RangeFacets {
            min_inclusive: pick(self.min_inclusive, other.min_inclusive, false),
            max_inclusive: pick(self.max_inclusive, other.max_inclusive, true),
            min_exclusive: pick(self.min_exclusive, other.min_exclusive, false),
            max_exclusive: pick(self.max_exclusive, other.max_exclusive, true),
        }
    }

    /// Validate a numeric value
    pub fn validate(&self, value: &Decimal, repr: &str) -> Result<()> {
        if let Some(min) = self.min_inclusive {
            if *value < min {
                return Err(violation(format!("Value must be >= {}", min), repr));
            }
        }
        if let Some(max) = self.max_inclusive {
            if *value > max {
                return Err(violation(format!("Value must be <= {}", max), repr));
            }
        }
        if let Some(min) = self.min_exclusive {
            if *value <= min {
                return Err(violation(format!("Value must be > {}", min), repr));
            }
        }
        if let Some(max) = self.max_exclusive {
            if *value >= max {
                return Err(violation(format!("Value must be < {}", max), repr));
            }
        }
        Ok(())
    }

    /// Validate an integer, including values a `Decimal` cannot hold
    pub fn validate_integer(&self, value: i128, repr: &str) -> Result<()> {
        match Decimal::from_i128(value) {
            Some(number) => self.validate(&number, repr),
            None => self.validate_beyond_decimal(value > 0, repr),
        }
    }

    /// Validate a finite float, including values a `Decimal` cannot hold
    pub fn validate_float(&self, value: f64, repr: &str) -> Result<()> {
        match Decimal::from_f64(value) {
            Some(number) => self.validate(&number, repr),
            None if value.abs() >= 1.0 => self.validate_beyond_decimal(value > 0.0, repr),
            // below Decimal's scale: compare as zero
            None => self.validate(&Decimal::ZERO, repr),
        }
    }

    /// A value outside the `Decimal` range exceeds every bound on its side
    fn validate_beyond_decimal(&self, positive: bool, repr: &str) -> Result<()> {
        if positive {
            if let Some(max) = self.max_inclusive {
                return Err(violation(format!("Value must be <= {}", max), repr));
            }
            if let Some(max) = self.max_exclusive {
                return Err(violation(format!("Value must be < {}", max), repr));
            }
        } else {
            if let Some(min) = self.min_inclusive {
                return Err(violation(format!("Value must be >= {}", min), repr));
            }
            if let Some(min) = self.min_exclusive {
                return Err(violation(format!("Value must be > {}", min), repr));
            }
        }
        Ok(())
    }
}

/// Fraction digits facet; the text form must carry exactly this many
/// fractional digits, and none at all (no decimal point) for zero
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FractionDigitsFacet {
    /// Required number of fractional digits
    pub value: u32,
}

impl FractionDigitsFacet {
    /// Create a new fraction digits facet
    pub fn new(value: u32) -> Self {
        Self { value }
    }

    /// Validate the text representation of a number
    pub fn validate(&self, repr: &str) -> Result<()> {
        let ok = match repr.find('.') {
            None => self.value == 0,
            Some(dot) => self.value != 0 && repr.len() - dot - 1 == self.value as usize,
        };
        if ok {
            Ok(())
        } else {
            Err(violation(
                format!("Value must have exactly {} fraction digits", self.value),
                repr,
            ))
        }
    }
}

/// Total digits facet - maximum number of digits in the text form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TotalDigitsFacet {
    /// Maximum total number of digits allowed
    pub value: u32,
}

impl TotalDigitsFacet {
    /// Create a new total digits facet
    pub fn new(value: u32) -> Self {
        Self { value }
    }

    /// Validate the text representation of a number
    pub fn validate(&self, repr: &str) -> Result<()> {
        let digits = repr.chars().filter(|c| c.is_ascii_digit()).count();
        if digits > self.value as usize {
            Err(Error::Validation(
                ValidationError::new(format!("Value exceeds totalDigits limit of {}", self.value))
                    .with_value(repr)
                    .with_reason(format!("{} digits", digits)),
            ))
        } else {
            Ok(())
        }
    }
}

impl fmt::Display for WhiteSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whitespace_modes() {
        assert_eq!(WhiteSpace::from_str("preserve").unwrap(), WhiteSpace::Preserve);
        assert_eq!(WhiteSpace::from_str("replace").unwrap(), WhiteSpace::Replace);
        assert_eq!(WhiteSpace::from_str("collapse").unwrap(), WhiteSpace::Collapse);
        assert!(WhiteSpace::from_str("invalid").is_err());
    }

    #[test]
    fn test_whitespace_normalize() {
        let text = "  hello\t\nworld  ";

        assert_eq!(WhiteSpace::Preserve.normalize(text), text);
        assert_eq!(WhiteSpace::Replace.normalize(text), "  hello  world  ");
        assert_eq!(WhiteSpace::Collapse.normalize(text), "hello world");
    }

    #[test]
    fn test_length_facets() {
        assert!(LengthFacet::new(5).validate_len(5, "hello").is_ok());
        assert!(LengthFacet::new(5).validate_len(2, "hi").is_err());
        assert!(MinLengthFacet::new(3).validate_len(2, "hi").is_err());
        assert!(MaxLengthFacet::new(5).validate_len(7, "toolong").is_err());
    }

    #[test]
    fn test_pattern_is_anchored() {
        let facet = PatternFacet::new(r"\d{3}-\d{4}").unwrap();

        assert!(facet.validate("123-4567").is_ok());
        assert!(facet.validate("x123-4567").is_err());
        assert!(facet.validate("123-45678").is_err());
        assert!(PatternFacet::new("(").is_err());
    }

    #[test]
    fn test_enumeration_facet() {
        let facet = EnumerationFacet::new(vec!["red".to_string(), "green".to_string()]);

        assert!(facet.validate("red").is_ok());
        assert!(facet.validate("Red").is_err());
        assert!(EnumerationFacet::default().validate("anything").is_ok());
    }

    #[test]
    fn test_fraction_digits_exact() {
        let two = FractionDigitsFacet::new(2);
        assert!(two.validate("2.22").is_ok());
        assert!(two.validate("2.2").is_err());
        assert!(two.validate("2.222").is_err());
        assert!(two.validate("2").is_err());

        let zero = FractionDigitsFacet::new(0);
        assert!(zero.validate("12").is_ok());
        assert!(zero.validate("12.0").is_err());
    }

    #[test]
    fn test_total_digits() {
        let facet = TotalDigitsFacet::new(4);
        assert!(facet.validate("-12.34").is_ok());
        assert!(facet.validate("123.45").is_err());
    }

    #[test]
    fn test_range_facets() {
        let range = RangeFacets {
            min_inclusive: Some(Decimal::from(1)),
            max_exclusive: Some(Decimal::from(10)),
            ..RangeFacets::default()
        };
        assert!(range.validate(&Decimal::from(1), "1").is_ok());
        assert!(range.validate(&Decimal::from(0), "0").is_err());
        assert!(range.validate(&Decimal::from(10), "10").is_err());

        let narrowed = range.narrow(&RangeFacets {
            min_inclusive: Some(Decimal::from(5)),
            ..RangeFacets::default()
        });
        assert_eq!(narrowed.min_inclusive, Some(Decimal::from(5)));
        assert_eq!(narrowed.max_exclusive, Some(Decimal::from(10)));
    }

    #[test]
    fn test_range_beyond_decimal() {
        let range = RangeFacets {
            min_inclusive: Some(Decimal::from(0)),
            max_inclusive: Some(Decimal::from(100)),
            ..RangeFacets::default()
        };
        let huge = 10_i128.pow(30);
        assert!(Decimal::from_i128(huge).is_none());
        assert!(range.validate_integer(huge, "1e30").is_err());
        assert!(range.validate_integer(-huge, "-1e30").is_err());
        assert!(range.validate_integer(50, "50").is_ok());
        assert!(range.validate_float(1e40, "1e40").is_err());
        assert!(range.validate_float(-1e40, "-1e40").is_err());

        let unbounded = RangeFacets::default();
        assert!(unbounded.validate_integer(huge, "1e30").is_ok());
        let lower_only = RangeFacets {
            min_inclusive: Some(Decimal::from(1)),
            ..RangeFacets::default()
        };
        assert!(lower_only.validate_integer(huge, "1e30").is_ok());
        assert!(lower_only.validate_integer(-huge, "-1e30").is_err());
    }
}
