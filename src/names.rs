//! XML name checks
//!
//! Lexical validation for the names that end up as tags or attribute names,
//! and for values of the `QName` primitive.

use crate::error::{Error, Result};

fn is_name_start_char(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | '\u{B7}')
}

/// Check if a string is a valid NCName (non-colonized name)
pub fn is_valid_ncname(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if is_name_start_char(first) => chars.all(is_name_char),
        _ => false,
    }
}

/// Check if a string is a valid QName (`prefix:local` or `local`)
pub fn is_valid_qname(name: &str) -> bool {
    match name.split_once(':') {
        Some((prefix, local)) => is_valid_ncname(prefix) && is_valid_ncname(local),
        None => is_valid_ncname(name),
    }
}

/// Validate an NCName used as a tag or attribute name
pub fn validate_ncname(name: &str) -> Result<()> {
    if is_valid_ncname(name) {
        Ok(())
    } else {
        Err(Error::Schema(format!("Invalid XML name: '{}'", name)))
    }
}

/// Split a QName into prefix and local name
pub fn split_qname(qname: &str) -> (Option<&str>, &str) {
    match qname.split_once(':') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, qname),
    }
}

/// Local part of a possibly prefixed name
pub fn local_part(qname: &str) -> &str {
    split_qname(qname).1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_valid_ncname() {
        assert!(is_valid_ncname("echoRequest"));
        assert!(is_valid_ncname("my-element.v2"));
        assert!(is_valid_ncname("_private"));

        assert!(!is_valid_ncname(""));
        assert!(!is_valid_ncname("1st"));
        assert!(!is_valid_ncname("soap:Body"));
    }

    #[test]
    fn test_is_valid_qname() {
        assert!(is_valid_qname("soap:Client"));
        assert!(is_valid_qname("Client"));
        assert!(!is_valid_qname(":Client"));
        assert!(!is_valid_qname("soap:"));
    }

    #[test]
    fn test_split_and_local_part() {
        assert_eq!(split_qname("xs:string"), (Some("xs"), "string"));
        assert_eq!(split_qname("string"), (None, "string"));
        assert_eq!(local_part("tns:EchoRequest"), "EchoRequest");
    }

    #[test]
    fn test_validate_ncname() {
        assert!(validate_ncname("value").is_ok());
        assert!(matches!(validate_ncname("va lue"), Err(Error::Schema(_))));
    }
}
