use crate::utils::error::{ModelError, Result};
use crate::xml::element::Element;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::ResolveResult;
use quick_xml::reader::NsReader;

/// Parses a document into an [`Element`] tree with namespaces resolved to
/// Clark notation. Whitespace-only text between elements is dropped.
pub fn parse(source: &str) -> Result<Element> {
    let mut reader = NsReader::from_str(source);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let (resolved, event) = reader.read_resolved_event()?;
        let namespace = resolved_namespace(resolved)?;
        match event {
            Event::Start(start) => {
                let element = start_element(&reader, namespace, &start)?;
                stack.push(element);
            }
            Event::Empty(start) => {
                let element = start_element(&reader, namespace, &start)?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::End(_) => {
                let element = stack.pop().ok_or_else(|| ModelError::InvalidValue {
                    tag: "document".to_string(),
                    text: "unbalanced end tag".to_string(),
                })?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::Text(text) => {
                if let Some(current) = stack.last_mut() {
                    append_text(current, &text.unescape()?);
                }
            }
            Event::CData(data) => {
                if let Some(current) = stack.last_mut() {
                    append_text(current, &String::from_utf8_lossy(&data.into_inner()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    root.ok_or_else(|| ModelError::InvalidValue {
        tag: "document".to_string(),
        text: "no root element".to_string(),
    })
}

fn resolved_namespace(resolved: ResolveResult<'_>) -> Result<Option<String>> {
    match resolved {
        ResolveResult::Bound(ns) => Ok(Some(String::from_utf8_lossy(ns.0).into_owned())),
        ResolveResult::Unbound => Ok(None),
        ResolveResult::Unknown(prefix) => Err(ModelError::InvalidValue {
            tag: String::from_utf8_lossy(&prefix).into_owned(),
            text: "undeclared namespace prefix".to_string(),
        }),
    }
}

fn qualified(namespace: Option<String>, local: &[u8]) -> String {
    let local = String::from_utf8_lossy(local);
    match namespace {
        Some(uri) if !uri.is_empty() => format!("{{{}}}{}", uri, local),
        _ => local.into_owned(),
    }
}

fn start_element(
    reader: &NsReader<&[u8]>,
    namespace: Option<String>,
    start: &BytesStart<'_>,
) -> Result<Element> {
    let mut element = Element::new(qualified(namespace, start.local_name().as_ref()));
    for attr in start.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        if attr.key.as_namespace_binding().is_some() {
            continue;
        }
        let (resolved, local) = reader.resolve_attribute(attr.key);
        let name = qualified(resolved_namespace(resolved)?, local.as_ref());
        let value = attr.unescape_value()?;
        element.set(&name, value.into_owned());
    }
    Ok(element)
}

fn append_text(element: &mut Element, text: &str) {
    match element.text() {
        Some(existing) => {
            let joined = format!("{}{}", existing, text);
            element.set_text(joined);
        }
        None => element.set_text(text),
    }
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) -> Result<()> {
    if let Some(parent) = stack.last_mut() {
        parent.append(element);
        return Ok(());
    }
    if root.is_some() {
        return Err(ModelError::InvalidValue {
            tag: element.tag().to_string(),
            text: "more than one root element".to_string(),
        });
    }
    *root = Some(element);
    Ok(())
}
