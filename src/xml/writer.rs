use crate::utils::error::{ModelError, Result};
use crate::xml::element::{split_tag, Element};
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::Write;

/// Serializes an element tree. A default namespace declaration is written
/// wherever an element's namespace differs from its parent's; namespaced
/// attributes get generated `nsN` prefixes.
pub fn to_string(element: &Element, indent: bool) -> Result<String> {
    let buffer = if indent {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        write_element(&mut writer, element, None)?;
        writer.into_inner()
    } else {
        let mut writer = Writer::new(Vec::new());
        write_element(&mut writer, element, None)?;
        writer.into_inner()
    };
    String::from_utf8(buffer).map_err(|e| ModelError::InvalidValue {
        tag: element.tag().to_string(),
        text: e.to_string(),
    })
}

fn write_element<W: Write>(writer: &mut Writer<W>, element: &Element, parent_ns: Option<&str>) -> Result<()> {
    let (namespace, local) = split_tag(element.tag());
    let mut start = BytesStart::new(local);
    if namespace != parent_ns {
        start.push_attribute(("xmlns", namespace.unwrap_or("")));
    }

    let mut prefixes = 0;
    for (name, value) in element.attributes() {
        match split_tag(name) {
            (Some(uri), attr_local) => {
                prefixes += 1;
                let prefix = format!("ns{}", prefixes);
                start.push_attribute((format!("xmlns:{}", prefix).as_str(), uri));
                start.push_attribute((format!("{}:{}", prefix, attr_local).as_str(), value));
            }
            (None, attr_local) => start.push_attribute((attr_local, value)),
        }
    }

    if element.is_empty() && element.text().is_none() {
        writer.write_event(Event::Empty(start))?;
        return Ok(());
    }

    writer.write_event(Event::Start(start))?;
    if let Some(text) = element.text() {
        writer.write_event(Event::Text(BytesText::new(text)))?;
    }
    for child in element.children() {
        write_element(writer, child, namespace)?;
    }
    writer.write_event(Event::End(BytesEnd::new(local)))?;
    Ok(())
}
