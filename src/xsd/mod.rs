//! XML Schema object model
//!
//! Declarative types and fields that render to and parse from XML, grouped
//! into [`Schema`] registries that validate whole documents and export
//! themselves as XSD.

pub mod complex;
pub mod export;
pub mod facets;
pub mod fields;
pub mod schema;
pub mod simple;
pub mod validation;
pub mod values;

pub use complex::{ComplexKind, ComplexType, ComplexTypeBuilder, Instance, Meta, ModelType};
pub use export::{schema_to_element, schema_to_xsd};
pub use facets::{RangeFacets, WhiteSpace};
pub use fields::{Field, FieldKind, MaxOccurs, RenderContext, TypeRef, XsdType};
pub use schema::{ElementForm, Schema, SchemaBuilder};
pub use simple::{Primitive, Restriction, SimpleType, UNBOUNDED};
pub use values::{ListValue, NamedValue, Value, XsdDate, XsdDateTime};
