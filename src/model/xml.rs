use quick_xml::escape::{escape, partial_escape};

/// Namespace bound to the reserved `xml` prefix.
pub const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

/// A node in a parsed XML document.
///
/// The document type declaration and anything outside the root element are not
/// kept. CDATA sections are folded into text.
#[derive(Debug, Clone, PartialEq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
    Comment(String),
    /// `target data` without the `<?`/`?>` delimiters.
    ProcessingInstruction(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct XmlAttribute {
    /// Qualified name as written, e.g. `xmlns:md` or `entityID`.
    pub name: String,
    /// Unescaped value.
    pub value: String,
}

/// An element with its qualified name, attributes in document order and children.
///
/// Namespace declarations are kept as ordinary `xmlns`/`xmlns:*` attributes;
/// resolving prefixes to namespaces goes through a [`NamespaceScope`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<XmlAttribute>,
    pub children: Vec<XmlNode>,
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.children.push(XmlNode::Element(child));
        self
    }

    pub fn prefix(&self) -> Option<&str> {
        self.name.split_once(':').map(|(prefix, _)| prefix)
    }

    pub fn local_name(&self) -> &str {
        self.name.rsplit(':').next().unwrap_or(&self.name)
    }

    /// Looks up an attribute by its qualified name.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    /// Sets an attribute, replacing the value in place if it already exists.
    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|a| a.name == name) {
            Some(existing) => existing.value = value,
            None => self.attributes.push(XmlAttribute { name, value }),
        }
    }

    /// Namespace declarations made on this element, as `(prefix, namespace)`.
    /// The default namespace has the empty prefix.
    pub fn namespace_declarations(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes.iter().filter_map(|a| {
            namespace_declaration_prefix(&a.name).map(|prefix| (prefix, a.value.as_str()))
        })
    }

    /// Binds `prefix` to `namespace` on this element.
    pub fn declare_namespace(&mut self, prefix: &str, namespace: &str) {
        if prefix.is_empty() {
            self.set_attr("xmlns", namespace);
        } else {
            self.set_attr(format!("xmlns:{prefix}"), namespace);
        }
    }

    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|c| match c {
            XmlNode::Element(e) => Some(e),
            _ => None,
        })
    }

    pub fn elements_mut(&mut self) -> impl Iterator<Item = &mut XmlElement> {
        self.children.iter_mut().filter_map(|c| match c {
            XmlNode::Element(e) => Some(e),
            _ => None,
        })
    }

    /// Concatenated text of this element and all its descendants.
    pub fn text(&self) -> String {
        let mut out = String::new();
        collect_text(self, &mut out);
        out
    }

    /// Replaces all children with a single text node.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.children = vec![XmlNode::Text(text.into())];
    }

    /// Appends text, merging with a trailing text node if there is one.
    pub fn push_text(&mut self, text: &str) {
        if let Some(XmlNode::Text(last)) = self.children.last_mut() {
            last.push_str(text);
        } else {
            self.children.push(XmlNode::Text(text.to_string()));
        }
    }

    pub fn insert_first(&mut self, child: XmlElement) {
        self.children.insert(0, XmlNode::Element(child));
    }

    /// Keeps only the child elements for which `keep` returns true.
    /// Text and comment children are left alone.
    pub fn retain_elements<F>(&mut self, mut keep: F)
    where
        F: FnMut(&XmlElement) -> bool,
    {
        self.children.retain(|c| match c {
            XmlNode::Element(e) => keep(e),
            _ => true,
        });
    }

    /// Serializes the element and its subtree, without an XML declaration.
    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        self.write_to(&mut out);
        out
    }

    fn write_to(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);
        for attr in &self.attributes {
            out.push(' ');
            out.push_str(&attr.name);
            out.push_str("=\"");
            out.push_str(&escape(attr.value.as_str()));
            out.push('"');
        }
        if self.children.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        for child in &self.children {
            match child {
                XmlNode::Element(e) => e.write_to(out),
                XmlNode::Text(t) => out.push_str(&partial_escape(t.as_str())),
                XmlNode::Comment(c) => {
                    out.push_str("<!--");
                    out.push_str(c);
                    out.push_str("-->");
                }
                XmlNode::ProcessingInstruction(pi) => {
                    out.push_str("<?");
                    out.push_str(pi);
                    out.push_str("?>");
                }
            }
        }
        out.push_str("</");
        out.push_str(&self.name);
        out.push('>');
    }
}

fn collect_text(element: &XmlElement, out: &mut String) {
    for child in &element.children {
        match child {
            XmlNode::Element(e) => collect_text(e, out),
            XmlNode::Text(t) => out.push_str(t),
            XmlNode::Comment(_) | XmlNode::ProcessingInstruction(_) => {}
        }
    }
}

/// Returns the declared prefix if `attr_name` is a namespace declaration
/// (`""` for `xmlns`, `"md"` for `xmlns:md`).
pub fn namespace_declaration_prefix(attr_name: &str) -> Option<&str> {
    if attr_name == "xmlns" {
        Some("")
    } else {
        attr_name.strip_prefix("xmlns:")
    }
}

/// A parsed document. Only the root element is retained.
#[derive(Debug, Clone, PartialEq)]
pub struct XmlDocument {
    pub root: XmlElement,
}

/// Prefix bindings in effect at some element, innermost last.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NamespaceScope {
    bindings: Vec<(String, String)>,
}

impl NamespaceScope {
    /// Returns the scope in effect inside `element`, given that `self` is the
    /// scope of its parent.
    pub fn enter(&self, element: &XmlElement) -> NamespaceScope {
        let mut scope = self.clone();
        for (prefix, namespace) in element.namespace_declarations() {
            scope
                .bindings
                .push((prefix.to_string(), namespace.to_string()));
        }
        scope
    }

    /// Resolves a prefix (`""` for the default namespace). An undeclared
    /// default namespace, or one reset with `xmlns=""`, resolves to `None`.
    pub fn resolve(&self, prefix: &str) -> Option<&str> {
        if prefix == "xml" {
            return Some(XML_NS);
        }
        self.bindings
            .iter()
            .rev()
            .find(|(p, _)| p == prefix)
            .map(|(_, ns)| ns.as_str())
            .filter(|ns| !ns.is_empty())
    }

    /// Namespace of `element`, where `self` is the scope entered for it.
    pub fn namespace_of(&self, element: &XmlElement) -> Option<&str> {
        self.resolve(element.prefix().unwrap_or(""))
    }

    /// True if `element` (with `self` entered for it) is `{namespace}local`.
    pub fn is(&self, element: &XmlElement, namespace: &str, local: &str) -> bool {
        element.local_name() == local && self.namespace_of(element) == Some(namespace)
    }

    /// Effective bindings, one per prefix, sorted by prefix.
    pub fn in_scope(&self) -> Vec<(&str, &str)> {
        let mut out: Vec<(&str, &str)> = Vec::new();
        for (prefix, namespace) in self.bindings.iter().rev() {
            if !out.iter().any(|(p, _)| *p == prefix.as_str()) {
                out.push((prefix.as_str(), namespace.as_str()));
            }
        }
        out.sort();
        out
    }
}

/// Child elements of `parent` named `{namespace}local`; `scope` is the scope
/// entered for `parent`.
pub fn children_named<'a>(
    parent: &'a XmlElement,
    scope: &NamespaceScope,
    namespace: &str,
    local: &str,
) -> Vec<&'a XmlElement> {
    parent
        .elements()
        .filter(|child| scope.enter(child).is(child, namespace, local))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_and_local_name() {
        let e = XmlElement::new("md:EntityDescriptor");
        assert_eq!(e.prefix(), Some("md"));
        assert_eq!(e.local_name(), "EntityDescriptor");

        let e = XmlElement::new("EntityDescriptor");
        assert_eq!(e.prefix(), None);
        assert_eq!(e.local_name(), "EntityDescriptor");
    }

    #[test]
    fn set_attr_replaces_in_place() {
        let mut e = XmlElement::new("a").with_attr("x", "1").with_attr("y", "2");
        e.set_attr("x", "3");
        assert_eq!(e.attr("x"), Some("3"));
        assert_eq!(e.attributes[0].name, "x");
        assert_eq!(e.attr("y"), Some("2"));
        assert!(e.attr("z").is_none());
    }

    #[test]
    fn serializes_with_escaping() {
        let mut e = XmlElement::new("a").with_attr("title", "x\"<y>&");
        e.push_text("1 < 2 & 3");
        e.children.push(XmlNode::Element(XmlElement::new("b")));
        assert_eq!(
            e.to_xml(),
            "<a title=\"x&quot;&lt;y&gt;&amp;\">1 &lt; 2 &amp; 3<b/></a>"
        );
    }

    #[test]
    fn scope_resolves_innermost_binding() {
        let outer = XmlElement::new("a")
            .with_attr("xmlns", "urn:outer")
            .with_attr("xmlns:p", "urn:p");
        let inner = XmlElement::new("b").with_attr("xmlns", "urn:inner");
        let reset = XmlElement::new("c").with_attr("xmlns", "");

        let s1 = NamespaceScope::default().enter(&outer);
        let s2 = s1.enter(&inner);
        let s3 = s2.enter(&reset);

        assert_eq!(s1.resolve(""), Some("urn:outer"));
        assert_eq!(s2.resolve(""), Some("urn:inner"));
        assert_eq!(s2.resolve("p"), Some("urn:p"));
        assert_eq!(s3.resolve(""), None);
        assert_eq!(s3.resolve("xml"), Some(XML_NS));
        assert_eq!(s2.in_scope(), vec![("", "urn:inner"), ("p", "urn:p")]);
    }

    #[test]
    fn children_named_matches_namespace_not_prefix() {
        let parent = XmlElement::new("root")
            .with_attr("xmlns:a", "urn:x")
            .with_child(XmlElement::new("a:item"))
            .with_child(XmlElement::new("b:item").with_attr("xmlns:b", "urn:x"))
            .with_child(XmlElement::new("item"));
        let scope = NamespaceScope::default().enter(&parent);
        assert_eq!(children_named(&parent, &scope, "urn:x", "item").len(), 2);
    }
}
