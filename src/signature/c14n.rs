//! Exclusive XML Canonicalization 1.0, without comments.
//!
//! Works on the parsed tree, so entity references are already expanded,
//! line endings normalized and CDATA folded into text. A namespace
//! declaration is emitted on an element only when the element or one of its
//! attributes visibly uses the prefix and the nearest output ancestor has not
//! already emitted the same binding.

use crate::model::xml::{namespace_declaration_prefix, NamespaceScope, XmlElement, XmlNode};

/// Canonical form of `element`, where `parent_scope` holds the bindings
/// inherited from its ancestors.
pub fn canonicalize(element: &XmlElement, parent_scope: &NamespaceScope) -> String {
    let mut out = String::new();
    write_element(element, parent_scope, &[], &mut out);
    out
}

fn write_element(
    element: &XmlElement,
    parent_scope: &NamespaceScope,
    rendered: &[(String, String)],
    out: &mut String,
) {
    let scope = parent_scope.enter(element);

    let mut utilized: Vec<&str> = vec![element.prefix().unwrap_or("")];
    for attr in &element.attributes {
        if namespace_declaration_prefix(&attr.name).is_some() {
            continue;
        }
        if let Some((prefix, _)) = attr.name.split_once(':') {
            if prefix != "xml" && !utilized.contains(&prefix) {
                utilized.push(prefix);
            }
        }
    }

    let mut declarations: Vec<(String, String)> = Vec::new();
    for prefix in utilized {
        let namespace = scope.resolve(prefix).unwrap_or("");
        let previous = rendered
            .iter()
            .rev()
            .find(|(p, _)| p == prefix)
            .map(|(_, ns)| ns.as_str())
            .unwrap_or("");
        if namespace != previous {
            declarations.push((prefix.to_string(), namespace.to_string()));
        }
    }
    declarations.sort();

    let mut attributes: Vec<(&str, &str, &str, &str)> = element
        .attributes
        .iter()
        .filter(|a| namespace_declaration_prefix(&a.name).is_none())
        .map(|a| {
            let (namespace, local) = match a.name.split_once(':') {
                Some((prefix, local)) => (scope.resolve(prefix).unwrap_or(""), local),
                None => ("", a.name.as_str()),
            };
            (namespace, local, a.name.as_str(), a.value.as_str())
        })
        .collect();
    attributes.sort_by(|x, y| (x.0, x.1).cmp(&(y.0, y.1)));

    out.push('<');
    out.push_str(&element.name);
    for (prefix, namespace) in &declarations {
        if prefix.is_empty() {
            out.push_str(" xmlns=\"");
        } else {
            out.push_str(" xmlns:");
            out.push_str(prefix);
            out.push_str("=\"");
        }
        escape_attr(namespace, out);
        out.push('"');
    }
    for (_, _, name, value) in &attributes {
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        escape_attr(value, out);
        out.push('"');
    }
    out.push('>');

    let mut child_rendered = rendered.to_vec();
    child_rendered.extend(declarations);
    for child in &element.children {
        match child {
            XmlNode::Element(e) => write_element(e, &scope, &child_rendered, out),
            XmlNode::Text(t) => escape_text(t, out),
            XmlNode::Comment(_) => {}
            XmlNode::ProcessingInstruction(pi) => {
                out.push_str("<?");
                out.push_str(pi);
                out.push_str("?>");
            }
        }
    }

    out.push_str("</");
    out.push_str(&element.name);
    out.push('>');
}

fn escape_text(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' => out.push_str("&#xD;"),
            _ => out.push(c),
        }
    }
}

fn escape_attr(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '"' => out.push_str("&quot;"),
            '\t' => out.push_str("&#x9;"),
            '\n' => out.push_str("&#xA;"),
            '\r' => out.push_str("&#xD;"),
            _ => out.push(c),
        }
    }
}
