//! XML element trees
//!
//! An owned, namespace-resolved element tree. Parsing goes through
//! `roxmltree` (namespaces resolved, DTDs rejected) and serialization through
//! `quick-xml`, with prefixes assigned deterministically so two equal trees
//! always serialize to the same bytes.

use crate::error::{Error, Result};
use crate::limits::Limits;
use crate::namespaces::{well_known_prefix, NamespaceContext, QName, XML_NAMESPACE, XSI_NAMESPACE};
use indexmap::{IndexMap, IndexSet};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

/// XML Element in the document tree
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    /// Element qualified name
    pub qname: QName,
    /// Element attributes, in document order
    pub attributes: IndexMap<QName, String>,
    /// Text content (only kept for elements without child elements)
    pub text: Option<String>,
    /// Child elements
    pub children: Vec<Element>,
    /// Namespace declarations in scope (parsed) or to declare (serialized root)
    pub namespaces: NamespaceContext,
}

impl Element {
    /// Create a new element
    pub fn new(qname: QName) -> Self {
        Self {
            qname,
            attributes: IndexMap::new(),
            text: None,
            children: Vec::new(),
            namespaces: NamespaceContext::new(),
        }
    }

    /// Get the local name of the element
    pub fn local_name(&self) -> &str {
        &self.qname.local_name
    }

    /// Get the namespace of the element
    pub fn namespace(&self) -> Option<&str> {
        self.qname.namespace.as_deref()
    }

    /// Get an attribute value by local name, whatever its namespace
    pub fn get_attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(qname, _)| qname.local_name == name)
            .map(|(_, value)| value.as_str())
    }

    /// Get an attribute value by qualified name
    pub fn get_attribute_qname(&self, qname: &QName) -> Option<&str> {
        self.attributes.get(qname).map(|s| s.as_str())
    }

    /// Set an attribute
    pub fn set_attribute(&mut self, qname: QName, value: impl Into<String>) {
        self.attributes.insert(qname, value.into());
    }

    /// Add a child element
    pub fn add_child(&mut self, child: Element) {
        self.children.push(child);
    }

    /// Set text content
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = Some(text.into());
    }

    /// Text content, empty when absent
    pub fn text_content(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }

    /// Find child elements by local name
    pub fn find_children(&self, local_name: &str) -> Vec<&Element> {
        self.children
            .iter()
            .filter(|e| e.local_name() == local_name)
            .collect()
    }

    /// First child element with the given local name
    pub fn find_child(&self, local_name: &str) -> Option<&Element> {
        self.children.iter().find(|e| e.local_name() == local_name)
    }

    /// Whether the element carries `xsi:nil="true"`
    pub fn is_nil(&self) -> bool {
        matches!(
            self.get_attribute_qname(&QName::namespaced(XSI_NAMESPACE, "nil")),
            Some("true") | Some("1")
        )
    }

    /// Mark the element as nil
    pub fn set_nil(&mut self) {
        self.set_attribute(QName::namespaced(XSI_NAMESPACE, "nil"), "true");
    }

    /// Declare a namespace prefix on this element
    pub fn declare_namespace(&mut self, prefix: impl Into<String>, namespace: impl Into<String>) {
        self.namespaces.add_prefix(prefix, namespace);
    }

    /// Parse an XML document from bytes with default limits
    pub fn parse(xml: &[u8]) -> Result<Self> {
        Self::parse_with_limits(xml, &Limits::default())
    }

    /// Parse an XML document from bytes, returning its root element
    pub fn parse_with_limits(xml: &[u8], limits: &Limits) -> Result<Self> {
        limits.check_xml_size(xml.len())?;
        let text = std::str::from_utf8(xml)
            .map_err(|e| Error::Xml(format!("Document is not valid UTF-8: {}", e)))?;
        let text = text.trim_start_matches('\u{feff}');
        let doc = roxmltree::Document::parse(text)?;
        Self::from_node(doc.root_element(), 1, limits)
    }

    /// Parse an XML document from a string
    pub fn from_string(xml: &str) -> Result<Self> {
        Self::parse(xml.as_bytes())
    }

    fn from_node(node: roxmltree::Node<'_, '_>, depth: usize, limits: &Limits) -> Result<Self> {
        limits.check_xml_depth(depth)?;

        let tag = node.tag_name();
        let mut element = Element::new(QName::new(tag.namespace(), tag.name()));

        for ns in node.namespaces() {
            match ns.name() {
                Some(prefix) => element.namespaces.add_prefix(prefix, ns.uri()),
                None => element.namespaces.set_default_namespace(ns.uri()),
            }
        }

        let mut attribute_count = 0;
        for attr in node.attributes() {
            attribute_count += 1;
            element.attributes.insert(
                QName::new(attr.namespace(), attr.name()),
                attr.value().to_string(),
            );
        }
        limits.check_attributes(attribute_count)?;

        let mut text = None::<String>;
        for child in node.children() {
            if child.is_element() {
                element.add_child(Self::from_node(child, depth + 1, limits)?);
            } else if child.is_text() {
                if let Some(t) = child.text() {
                    text.get_or_insert_with(String::new).push_str(t);
                }
            }
        }
        if element.children.is_empty() {
            element.text = text;
        }

        Ok(element)
    }

    /// Serialize to a string without an XML declaration
    pub fn to_xml_string(&self) -> Result<String> {
        let bytes = self.to_xml_bytes(false)?;
        String::from_utf8(bytes).map_err(|e| Error::Xml(e.to_string()))
    }

    /// Serialize to bytes, optionally preceded by an XML declaration
    pub fn to_xml_bytes(&self, declaration: bool) -> Result<Vec<u8>> {
        let prefixes = self.prefix_map();
        let mut writer = Writer::new(Vec::new());
        if declaration {
            writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
        }
        let scope: IndexMap<String, String> = prefixes
            .iter()
            .map(|(uri, prefix)| (prefix.clone(), uri.clone()))
            .collect();
        self.write_into(&mut writer, &prefixes, &scope, true)?;
        Ok(writer.into_inner())
    }

    /// Namespace URI -> prefix for every namespace used in the tree.
    ///
    /// Prefixes declared on the root win, then well-known prefixes, then
    /// generated `nsN` prefixes in order of first use.
    fn prefix_map(&self) -> IndexMap<String, String> {
        let mut map: IndexMap<String, String> = IndexMap::new();
        for (prefix, uri) in self.namespaces.iter() {
            if uri != XML_NAMESPACE
                && !map.contains_key(uri)
                && !map.values().any(|p| p == prefix)
            {
                map.insert(uri.clone(), prefix.clone());
            }
        }

        let mut used = IndexSet::new();
        self.collect_namespaces(&mut used);

        let mut counter = 0;
        for uri in used {
            if uri == XML_NAMESPACE || map.contains_key(&uri) {
                continue;
            }
            let prefix = match well_known_prefix(&uri) {
                Some(p) if !map.values().any(|v| v == p) => p.to_string(),
                _ => loop {
                    let candidate = format!("ns{}", counter);
                    counter += 1;
                    if !map.values().any(|v| *v == candidate) {
                        break candidate;
                    }
                },
            };
            map.insert(uri, prefix);
        }
        map
    }

    fn collect_namespaces(&self, out: &mut IndexSet<String>) {
        if let Some(ns) = self.namespace() {
            out.insert(ns.to_string());
        }
        for qname in self.attributes.keys() {
            if let Some(ns) = qname.namespace() {
                out.insert(ns.to_string());
            }
        }
        for child in &self.children {
            child.collect_namespaces(out);
        }
    }

    fn write_into(
        &self,
        writer: &mut Writer<Vec<u8>>,
        prefixes: &IndexMap<String, String>,
        scope: &IndexMap<String, String>,
        is_root: bool,
    ) -> Result<()> {
        let name = prefixed_name(&self.qname, prefixes);
        let mut start = BytesStart::new(name.clone());

        // nested declarations keep prefixes used in attribute values (e.g. type="tns:Foo")
        let mut inner_scope = None::<IndexMap<String, String>>;
        if is_root {
            for (uri, prefix) in prefixes {
                let decl = format!("xmlns:{}", prefix);
                start.push_attribute((decl.as_str(), uri.as_str()));
            }
        } else {
            for (prefix, uri) in self.namespaces.iter() {
                let in_scope = scope.get(prefix) == Some(uri);
                let clashes = prefixes.iter().any(|(u, p)| p == prefix && u != uri);
                if uri == XML_NAMESPACE || in_scope || clashes {
                    continue;
                }
                let decl = format!("xmlns:{}", prefix);
                start.push_attribute((decl.as_str(), uri.as_str()));
                inner_scope
                    .get_or_insert_with(|| scope.clone())
                    .insert(prefix.clone(), uri.clone());
            }
        }
        let scope = inner_scope.as_ref().unwrap_or(scope);
        for (qname, value) in &self.attributes {
            let attr_name = prefixed_name(qname, prefixes);
            start.push_attribute((attr_name.as_str(), value.as_str()));
        }

        let text = self.text.as_deref().filter(|t| !t.is_empty());
        if self.children.is_empty() && text.is_none() {
            writer.write_event(Event::Empty(start))?;
            return Ok(());
        }

        writer.write_event(Event::Start(start))?;
        if let Some(text) = text {
            writer.write_event(Event::Text(BytesText::new(text)))?;
        }
        for child in &self.children {
            child.write_into(writer, prefixes, scope, false)?;
        }
        writer.write_event(Event::End(BytesEnd::new(name)))?;
        Ok(())
    }
}

fn prefixed_name(qname: &QName, prefixes: &IndexMap<String, String>) -> String {
    match qname.namespace() {
        Some(XML_NAMESPACE) => format!("xml:{}", qname.local_name),
        Some(ns) => match prefixes.get(ns) {
            Some(prefix) => format!("{}:{}", prefix, qname.local_name),
            None => qname.local_name.clone(),
        },
        None => qname.local_name.clone(),
    }
}
