/// A mutable XML element.
///
/// Tags use Clark notation, `{namespace-uri}local`, or just `local` when
/// the element has no namespace. Attribute order is preserved.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Element {
    tag: String,
    text: Option<String>,
    attributes: Vec<(String, String)>,
    children: Vec<Element>,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    pub fn with_attribute(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn local_name(&self) -> &str {
        local_name(&self.tag)
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = Some(text.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Replaces the value in place when the attribute already exists.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attributes.iter_mut().find(|(key, _)| key == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name.to_string(), value)),
        }
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn children(&self) -> &[Element] {
        &self.children
    }

    pub fn children_mut(&mut self) -> &mut Vec<Element> {
        &mut self.children
    }

    pub fn append(&mut self, child: Element) {
        self.children.push(child);
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// First direct child with the given tag.
    pub fn find(&self, tag: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.tag == tag)
    }

    pub fn find_text(&self, tag: &str) -> Option<&str> {
        self.find(tag).and_then(Element::text)
    }
}

/// Builds Clark-notation tags for one namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    uri: Option<String>,
}

impl Namespace {
    pub fn new(uri: &str) -> Self {
        Self {
            uri: Some(uri.to_string()),
        }
    }

    /// Unqualified names.
    pub fn local() -> Self {
        Self { uri: None }
    }

    pub fn uri(&self) -> Option<&str> {
        self.uri.as_deref()
    }

    pub fn tag(&self, local: &str) -> String {
        match &self.uri {
            Some(uri) => format!("{{{}}}{}", uri, local),
            None => local.to_string(),
        }
    }

    pub fn element(&self, local: &str) -> Element {
        Element::new(self.tag(local))
    }
}

pub fn split_tag(tag: &str) -> (Option<&str>, &str) {
    if let Some(rest) = tag.strip_prefix('{') {
        if let Some((uri, local)) = rest.split_once('}') {
            return (Some(uri), local);
        }
    }
    (None, tag)
}

pub fn local_name(tag: &str) -> &str {
    split_tag(tag).1
}
