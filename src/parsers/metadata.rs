use encoding_rs::{Encoding, UTF_8};
use quick_xml::encoding::detect_encoding;
use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use tracing::debug;

use crate::error::ProvisionError;
use crate::model::metadata::{EntityDescriptor, MD_NS};
use crate::model::xml::{NamespaceScope, XmlAttribute, XmlDocument, XmlElement, XmlNode};

/// Decodes `data` in the encoding named by its byte order mark or XML
/// declaration (UTF-8 when neither says otherwise) and parses it.
pub fn parse_bytes(data: &[u8]) -> Result<XmlDocument, ProvisionError> {
    let (encoding, bom) = document_encoding(data)?;
    if encoding != UTF_8 {
        debug!(encoding = encoding.name(), "decoding metadata");
    }
    let xml = encoding
        .decode_without_bom_handling_and_without_replacement(&data[bom..])
        .ok_or_else(|| {
            ProvisionError::Xml(format!("document is not valid {}", encoding.name()))
        })?;
    parse_str(&xml)
}

fn document_encoding(data: &[u8]) -> Result<(&'static Encoding, usize), ProvisionError> {
    match detect_encoding(data) {
        Some((encoding, bom)) if bom > 0 || encoding != UTF_8 => return Ok((encoding, bom)),
        _ => {}
    }
    let mut reader = Reader::from_reader(data);
    let Ok(Event::Decl(decl)) = reader.read_event() else {
        return Ok((UTF_8, 0));
    };
    match decl.encoding() {
        None => Ok((UTF_8, 0)),
        Some(label) => {
            let label = label.map_err(|e| ProvisionError::Xml(e.to_string()))?;
            Encoding::for_label(&label).map(|encoding| (encoding, 0)).ok_or_else(|| {
                ProvisionError::Xml(format!(
                    "unsupported document encoding {}",
                    String::from_utf8_lossy(&label)
                ))
            })
        }
    }
}

pub fn parse_str(xml: &str) -> Result<XmlDocument, ProvisionError> {
    // XML end-of-line handling
    let normalized = xml.replace("\r\n", "\n").replace('\r', "\n");
    let mut reader = Reader::from_str(&normalized);
    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        match reader.read_event() {
            Err(e) => {
                return Err(ProvisionError::Xml(format!(
                    "at position {}: {}",
                    reader.error_position(),
                    e
                )))
            }
            Ok(Event::Eof) => break,
            Ok(Event::Start(e)) => stack.push(element(&e)?),
            Ok(Event::Empty(e)) => attach(&mut stack, &mut root, element(&e)?)?,
            Ok(Event::End(_)) => {
                let done = stack
                    .pop()
                    .ok_or_else(|| ProvisionError::Xml("unbalanced end tag".to_string()))?;
                attach(&mut stack, &mut root, done)?;
            }
            Ok(Event::Text(e)) => {
                if let Some(parent) = stack.last_mut() {
                    let text = e
                        .unescape()
                        .map_err(|err| ProvisionError::Xml(err.to_string()))?;
                    parent.push_text(&text);
                }
            }
            Ok(Event::CData(e)) => {
                if let Some(parent) = stack.last_mut() {
                    parent.push_text(&String::from_utf8_lossy(&e));
                }
            }
            Ok(Event::Comment(e)) => {
                if let Some(parent) = stack.last_mut() {
                    parent
                        .children
                        .push(XmlNode::Comment(String::from_utf8_lossy(&e).into_owned()));
                }
            }
            Ok(Event::PI(e)) => {
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(XmlNode::ProcessingInstruction(
                        String::from_utf8_lossy(&e).into_owned(),
                    ));
                }
            }
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(ProvisionError::Xml(format!("unclosed element <{}>", open.name)));
    }
    root.map(|root| XmlDocument { root })
        .ok_or_else(|| ProvisionError::Xml("document has no root element".to_string()))
}

fn element(e: &BytesStart<'_>) -> Result<XmlElement, ProvisionError> {
    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let mut attributes = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|err| {
            ProvisionError::Xml(format!("malformed attribute on <{}>: {}", name, err))
        })?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        // attribute-value normalization: literal whitespace becomes a space,
        // character references survive
        let raw = String::from_utf8_lossy(&attr.value).replace(['\t', '\n'], " ");
        let value = unescape(&raw)
            .map_err(|err| ProvisionError::Xml(format!("attribute {} on <{}>: {}", key, name, err)))?
            .into_owned();
        attributes.push(XmlAttribute { name: key, value });
    }
    Ok(XmlElement {
        name,
        attributes,
        children: Vec::new(),
    })
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> Result<(), ProvisionError> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(XmlNode::Element(element));
    } else if root.is_none() {
        *root = Some(element);
    } else {
        return Err(ProvisionError::Xml("more than one root element".to_string()));
    }
    Ok(())
}

/// Enumerates the entities of a metadata document.
///
/// An `EntitiesDescriptor` root yields its direct `EntityDescriptor` children;
/// an `EntityDescriptor` root is yielded as is. Nested `EntitiesDescriptor`
/// groups are rejected rather than skipped. Each returned entity carries the
/// namespace declarations it inherited from the wrapper.
pub fn entities(doc: &XmlDocument) -> Result<Vec<EntityDescriptor>, ProvisionError> {
    let root_scope = NamespaceScope::default().enter(&doc.root);

    if root_scope.is(&doc.root, MD_NS, "EntityDescriptor") {
        return Ok(vec![EntityDescriptor::new(doc.root.clone())]);
    }
    if !root_scope.is(&doc.root, MD_NS, "EntitiesDescriptor") {
        return Err(ProvisionError::UnsupportedDocument(format!(
            "root element <{}> is neither EntitiesDescriptor nor EntityDescriptor",
            doc.root.name
        )));
    }

    let mut found = Vec::new();
    for child in doc.root.elements() {
        let child_scope = root_scope.enter(child);
        if child_scope.is(child, MD_NS, "EntitiesDescriptor") {
            return Err(ProvisionError::UnsupportedDocument(format!(
                "nested EntitiesDescriptor{} is not supported",
                child
                    .attr("Name")
                    .map(|n| format!(" \"{}\"", n))
                    .unwrap_or_default()
            )));
        }
        if child_scope.is(child, MD_NS, "EntityDescriptor") {
            found.push(EntityDescriptor::new(detach(child, &root_scope)));
        }
    }
    debug!(count = found.len(), "enumerated entity descriptors");
    Ok(found)
}

/// Copies `element` out of its parent, declaring every inherited prefix
/// binding it does not redeclare itself.
fn detach(element: &XmlElement, parent_scope: &NamespaceScope) -> XmlElement {
    let mut detached = element.clone();
    let own: Vec<String> = element
        .namespace_declarations()
        .map(|(prefix, _)| prefix.to_string())
        .collect();
    for (prefix, namespace) in parent_scope.in_scope() {
        if namespace.is_empty() || own.iter().any(|p| p == prefix) {
            continue;
        }
        detached.declare_namespace(prefix, namespace);
    }
    detached
}
