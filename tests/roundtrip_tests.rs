//! Schema-bound documents: render, validate, parse back

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use soapschema::{
    ComplexType, Element, ElementForm, Error, Field, Instance, MaxOccurs, ModelType, Primitive,
    Schema, SimpleType, Value,
};
use std::sync::Arc;

const SHOP: &str = "urn:shop";

struct Shop {
    schema: Arc<Schema>,
    order: Arc<ComplexType>,
    line: Arc<ComplexType>,
    payment: Arc<ComplexType>,
}

fn shop(form: ElementForm) -> Shop {
    let status = Arc::new(
        SimpleType::named("Status", Primitive::String)
            .with_enumeration(["open", "paid", "shipped"]),
    );
    let price = Arc::new(SimpleType::named("Price", Primitive::Decimal).with_fraction_digits(2));
    let line = ComplexType::builder("Line")
        .field(Field::attribute("sku", Primitive::String).required())
        .field(Field::element("quantity", Primitive::PositiveInteger))
        .field(Field::element("price", "tns:Price"))
        .build()
        .unwrap();
    let payment = ComplexType::builder("Payment")
        .model(ModelType::Choice)
        .field(Field::element("card", Primitive::String))
        .field(Field::element("invoice", Primitive::String))
        .build()
        .unwrap();
    let order = ComplexType::builder("Order")
        .field(Field::attribute("id", Primitive::Int).required())
        .field(Field::element("status", "tns:Status"))
        .field(Field::list("lines", "line", line.clone()).max_occurs(MaxOccurs::Unbounded))
        .field(Field::element("payment", payment.clone()).optional())
        .field(Field::element("note", Primitive::String).optional().nillable())
        .build()
        .unwrap();
    let schema = Schema::builder()
        .target_namespace(SHOP)
        .element_form_default(form)
        .simple_type(status)
        .simple_type(price)
        .complex_type(line.clone())
        .complex_type(payment.clone())
        .complex_type(order.clone())
        .element(Field::element("order", "tns:Order"))
        .build()
        .unwrap();
    Shop {
        schema,
        order,
        line,
        payment,
    }
}

fn line(shop: &Shop, sku: &str, quantity: &str, price: &str) -> Instance {
    Instance::with_values(&shop.line, [("sku", sku), ("quantity", quantity), ("price", price)])
        .unwrap()
}

fn sample(shop: &Shop) -> Instance {
    let values = [("id", Value::from(7)), ("status", Value::from("paid"))];
    let mut order = Instance::with_values(&shop.order, values).unwrap();
    let lines = order.list_mut("lines").unwrap();
    lines.push(line(shop, "A-1", "2", "9.95")).unwrap();
    lines.push(line(shop, "B-2", "1", "120.50")).unwrap();
    order
        .set("payment", Instance::with_values(&shop.payment, [("invoice", "INV-9")]).unwrap())
        .unwrap();
    order
}

#[test]
fn test_structured_round_trip() {
    let shop = shop(ElementForm::Unqualified);
    let order = sample(&shop);

    let element = order.to_element(shop.schema.element_qname("order")).unwrap();
    shop.schema.assert_valid(&element).unwrap();

    let xml = element.to_xml_string().unwrap();
    let reparsed = Element::from_string(&xml).unwrap();
    shop.schema.assert_valid(&reparsed).unwrap();

    let parsed = ComplexType::parse_xmlelement(&shop.order, &reparsed).unwrap();
    assert_eq!(parsed, order);
    assert_eq!(parsed.get_list("lines").unwrap().len(), 2);
    assert_eq!(
        parsed.get_instance("payment").unwrap().get_str("invoice"),
        Some("INV-9")
    );
    assert_eq!(parsed.get("id").and_then(Value::as_integer), Some(7));
}

#[test]
fn test_qualified_children_carry_namespace() {
    let qualified = shop(ElementForm::Qualified);
    let element = sample(&qualified)
        .to_element(qualified.schema.element_qname("order"))
        .unwrap();
    qualified.schema.assert_valid(&element).unwrap();
    assert!(element.qname.matches(Some(SHOP), "order"));
    assert!(element.children[0].qname.matches(Some(SHOP), "status"));

    let unqualified = shop(ElementForm::Unqualified);
    let element = sample(&unqualified)
        .to_element(unqualified.schema.element_qname("order"))
        .unwrap();
    assert!(element.qname.matches(Some(SHOP), "order"));
    assert!(element.children[0].qname.matches(None, "status"));
    assert!(!qualified.schema.validate(&element));
}

#[test]
fn test_enumeration_is_closed() {
    let shop = shop(ElementForm::Unqualified);
    let mut order = Instance::new(&shop.order);
    assert!(order.set("status", "open").is_ok());
    assert!(order.set("status", "lost").is_err());

    let xml = format!(r#"<s:order xmlns:s="{SHOP}" id="1"><status>lost</status></s:order>"#);
    assert!(!shop.schema.validate(&Element::from_string(&xml).unwrap()));
}

#[test]
fn test_price_fraction_digits() {
    let shop = shop(ElementForm::Unqualified);
    let mut line = Instance::with_values(&shop.line, [("sku", "A"), ("quantity", "1")]).unwrap();
    assert!(line.set("price", "2.22").is_ok());
    assert!(line.set("price", "2.222").is_err());
    assert!(line.set("quantity", "0").is_err());
}

#[test]
fn test_nil_note_survives() {
    let shop = shop(ElementForm::Unqualified);
    let mut order = sample(&shop);
    order.set("note", Value::Nil).unwrap();

    let element = order.to_element(shop.schema.element_qname("order")).unwrap();
    shop.schema.assert_valid(&element).unwrap();

    let reparsed = Element::from_string(&element.to_xml_string().unwrap()).unwrap();
    let parsed = ComplexType::parse_xmlelement(&shop.order, &reparsed).unwrap();
    assert!(parsed.is_nil("note"));
    assert!(matches!(order.set("status", Value::Nil), Err(Error::Validation(_))));
}

#[test]
fn test_choice_rejects_both_branches() {
    let shop = shop(ElementForm::Unqualified);
    let both = format!(
        r#"<s:order xmlns:s="{SHOP}" id="1"><status>open</status><payment><card>c</card><invoice>i</invoice></payment></s:order>"#
    );
    assert!(!shop.schema.validate(&Element::from_string(&both).unwrap()));

    let one = format!(
        r#"<s:order xmlns:s="{SHOP}" id="1"><status>open</status><payment><card>c</card></payment></s:order>"#
    );
    shop.schema.assert_valid(&Element::from_string(&one).unwrap()).unwrap();
}

fn counters() -> (Arc<ComplexType>, Arc<Schema>) {
    let ty = ComplexType::builder("Counters")
        .field(Field::element("signed", Primitive::Long).optional())
        .field(Field::element("unsigned", Primitive::UnsignedLong).optional())
        .field(Field::attribute("small", Primitive::UnsignedInt))
        .build()
        .unwrap();
    let schema = Schema::builder()
        .target_namespace("urn:counters")
        .complex_type(ty.clone())
        .element(Field::element("counters", "tns:Counters"))
        .build()
        .unwrap();
    (ty, schema)
}

#[test]
fn test_integer_limits_through_set() {
    let (ty, _) = counters();
    let mut counters = Instance::new(&ty);

    assert!(counters.set("signed", Value::from(i64::MAX)).is_ok());
    assert!(counters.set("signed", Value::from(i64::MAX as i128 + 1)).is_err());
    assert!(counters.set("signed", Value::from(i64::MIN as i128 - 1)).is_err());
    assert!(counters.set("signed", "9223372036854775808").is_err());
    assert!(counters.set("signed", "100000000000000000000000000000").is_err());

    assert!(counters.set("unsigned", Value::from(u64::MAX)).is_ok());
    assert!(counters.set("unsigned", Value::from(u64::MAX as i128 + 1)).is_err());
    assert!(counters.set("unsigned", "18446744073709551616").is_err());
    assert!(counters.set("unsigned", Value::from(-1)).is_err());

    assert!(counters.set("small", Value::from(u32::MAX as i64)).is_ok());
    assert!(counters.set("small", Value::from(u32::MAX as i64 + 1)).is_err());
    assert!(counters.set("small", "-1").is_err());
    assert!(counters.set("small", "100000000000000000000000000000").is_err());

    assert_eq!(
        counters.get("signed").and_then(Value::as_integer),
        Some(i64::MAX as i128)
    );
}

#[test]
fn test_integer_limits_through_parsexml() {
    let (ty, schema) = counters();
    let doc = |signed: &str, unsigned: &str, small: &str| {
        format!(
            r#"<c:counters xmlns:c="urn:counters" small="{small}"><signed>{signed}</signed><unsigned>{unsigned}</unsigned></c:counters>"#
        )
    };

    let max = doc("9223372036854775807", "18446744073709551615", "4294967295");
    let parsed = ComplexType::parsexml(&ty, max.as_bytes(), Some(&schema)).unwrap();
    assert_eq!(
        parsed.get("unsigned").and_then(Value::as_integer),
        Some(u64::MAX as i128)
    );

    for xml in [
        doc("9223372036854775808", "0", "0"),
        doc("-9223372036854775809", "0", "0"),
        doc("100000000000000000000000000000", "0", "0"),
        doc("0", "18446744073709551616", "0"),
        doc("0", "-1", "0"),
        doc("0", "0", "4294967296"),
        doc("0", "0", "-1"),
    ] {
        assert!(ComplexType::parsexml(&ty, xml.as_bytes(), None).is_err(), "{xml}");
        assert!(!schema.validate(&Element::from_string(&xml).unwrap()), "{xml}");
    }
}

proptest! {
    #[test]
    fn prop_text_and_integers_round_trip(
        note in "[a-zA-Z0-9<>&'\"]([a-zA-Z0-9 <>&'\"]{0,18}[a-zA-Z0-9<>&'\"])?",
        id in any::<i32>(),
    ) {
        let shop = shop(ElementForm::Qualified);
        let values = [("id", Value::from(id)), ("status", Value::from("open"))];
        let mut order = Instance::with_values(&shop.order, values).unwrap();
        order.set("note", note.as_str()).unwrap();

        let xml = order
            .xml("order", Some(SHOP), ElementForm::Qualified, Some(&shop.schema))
            .unwrap();
        let parsed =
            ComplexType::parsexml(&shop.order, xml.as_bytes(), Some(&shop.schema)).unwrap();
        prop_assert_eq!(parsed.get_str("note"), Some(note.as_str()));
        prop_assert_eq!(parsed.get("id").and_then(Value::as_integer), Some(id as i128));
    }
}
