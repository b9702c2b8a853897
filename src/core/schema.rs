//! Declarative document grammar.
//!
//! A schema is a tree of [`Container`]s whose children are attribute nodes
//! and element nodes ([`Leaf`], [`LeafList`], nested [`Container`]s).
//! Element children must appear in the order the schema declares them;
//! each element node consumes the contiguous run of same-tag children at
//! the current position. Validation never stops at the first problem, it
//! collects every [`ValidationIssue`] it finds.

use crate::core::types::ScalarType;
use crate::core::value::Value;
use crate::xml::Element;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationIssue {
    #[error("{tag}: missing element")]
    MissingElement { tag: String },

    #[error("{tag}: too few elements")]
    TooFewElements { tag: String },

    #[error("{tag}: too many elements")]
    TooManyElements { tag: String },

    #[error("{tag}: unknown element")]
    UnknownElement { tag: String },

    #[error("{tag}: invalid value")]
    InvalidValue { tag: String },

    #[error("{tag}[{index}]: invalid value")]
    InvalidListValue { tag: String, index: usize },

    #[error("{tag}: list element is not unique: {value}")]
    DuplicateListElement { tag: String, value: String },

    #[error("{tag}[{attribute}]: attribute missing")]
    AttributeMissing { tag: String, attribute: String },

    #[error("{tag}[{attribute}]: invalid value")]
    InvalidAttribute { tag: String, attribute: String },
}

impl ValidationIssue {
    pub fn tag(&self) -> &str {
        match self {
            ValidationIssue::MissingElement { tag }
            | ValidationIssue::TooFewElements { tag }
            | ValidationIssue::TooManyElements { tag }
            | ValidationIssue::UnknownElement { tag }
            | ValidationIssue::InvalidValue { tag }
            | ValidationIssue::InvalidListValue { tag, .. }
            | ValidationIssue::DuplicateListElement { tag, .. }
            | ValidationIssue::AttributeMissing { tag, .. }
            | ValidationIssue::InvalidAttribute { tag, .. } => tag,
        }
    }
}

/// Accumulates issues during one validation run.
#[derive(Debug, Default)]
pub struct ValidationContext {
    issues: Vec<ValidationIssue>,
}

impl ValidationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&mut self, issue: ValidationIssue) {
        tracing::debug!("validation: {}", issue);
        self.issues.push(issue);
    }

    pub fn issues(&self) -> &[ValidationIssue] {
        &self.issues
    }

    pub fn into_issues(self) -> Vec<ValidationIssue> {
        self.issues
    }
}

/// An XML attribute on an element.
#[derive(Debug, Clone)]
pub struct AttributeNode {
    name: String,
    ty: ScalarType,
    mandatory: bool,
}

impl AttributeNode {
    pub fn new(name: impl Into<String>, ty: ScalarType) -> Self {
        Self {
            name: name.into(),
            ty,
            mandatory: false,
        }
    }

    pub fn mandatory(mut self) -> Self {
        self.mandatory = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn scalar_type(&self) -> &ScalarType {
        &self.ty
    }

    pub fn is_mandatory(&self) -> bool {
        self.mandatory
    }

    pub fn validate(&self, element: &Element, ctx: &mut ValidationContext) {
        match element.get(&self.name) {
            None if self.mandatory => ctx.error(ValidationIssue::AttributeMissing {
                tag: element.tag().to_string(),
                attribute: self.name.clone(),
            }),
            None => {}
            Some(text) => {
                if !self.ty.validate(text) {
                    ctx.error(ValidationIssue::InvalidAttribute {
                        tag: element.tag().to_string(),
                        attribute: self.name.clone(),
                    });
                }
            }
        }
    }
}

/// A single typed text element.
#[derive(Debug, Clone)]
pub struct Leaf {
    tag: String,
    ty: ScalarType,
    mandatory: bool,
    attributes: Vec<AttributeNode>,
}

impl Leaf {
    pub fn new(tag: impl Into<String>, ty: ScalarType) -> Self {
        Self {
            tag: tag.into(),
            ty,
            mandatory: false,
            attributes: Vec::new(),
        }
    }

    pub fn mandatory(mut self) -> Self {
        self.mandatory = true;
        self
    }

    pub fn attribute(mut self, attribute: AttributeNode) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn scalar_type(&self) -> &ScalarType {
        &self.ty
    }

    pub fn is_mandatory(&self) -> bool {
        self.mandatory
    }

    fn validate(&self, parent: &Element, cursor: usize, ctx: &mut ValidationContext) -> usize {
        let (run, next) = extract_run(parent, cursor, &self.tag);
        if run.is_empty() && self.mandatory {
            ctx.error(ValidationIssue::MissingElement { tag: self.tag.clone() });
        } else if run.len() > 1 {
            ctx.error(ValidationIssue::TooManyElements { tag: self.tag.clone() });
        }
        for element in run {
            validate_attributes(&self.attributes, element, ctx);
            if !self.ty.validate(element_text(element)) {
                ctx.error(ValidationIssue::InvalidValue { tag: self.tag.clone() });
            }
        }
        next
    }
}

/// A repeated typed text element whose values must be unique.
#[derive(Debug, Clone)]
pub struct LeafList {
    tag: String,
    ty: ScalarType,
    min_elements: Option<usize>,
    max_elements: Option<usize>,
    attributes: Vec<AttributeNode>,
}

impl LeafList {
    pub fn new(tag: impl Into<String>, ty: ScalarType) -> Self {
        Self {
            tag: tag.into(),
            ty,
            min_elements: None,
            max_elements: None,
            attributes: Vec::new(),
        }
    }

    pub fn min_elements(mut self, min: usize) -> Self {
        self.min_elements = Some(min);
        self
    }

    pub fn max_elements(mut self, max: usize) -> Self {
        self.max_elements = Some(max);
        self
    }

    pub fn attribute(mut self, attribute: AttributeNode) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn scalar_type(&self) -> &ScalarType {
        &self.ty
    }

    fn validate(&self, parent: &Element, cursor: usize, ctx: &mut ValidationContext) -> usize {
        let (run, next) = extract_run(parent, cursor, &self.tag);
        check_cardinality(&self.tag, run.len(), self.min_elements, self.max_elements, ctx);
        let mut seen: Vec<Value> = Vec::with_capacity(run.len());
        for (index, element) in run.iter().enumerate() {
            validate_attributes(&self.attributes, element, ctx);
            let text = element_text(element);
            match self.ty.decode(text) {
                Ok(value) if self.ty.validate(text) => {
                    if seen.contains(&value) {
                        ctx.error(ValidationIssue::DuplicateListElement {
                            tag: self.tag.clone(),
                            value: value.to_string(),
                        });
                    }
                    seen.push(value);
                }
                _ => ctx.error(ValidationIssue::InvalidListValue {
                    tag: self.tag.clone(),
                    index,
                }),
            }
        }
        next
    }
}

/// An interior element with its own attributes and ordered children.
#[derive(Debug, Clone)]
pub struct Container {
    tag: String,
    min_elements: Option<usize>,
    max_elements: Option<usize>,
    attributes: Vec<AttributeNode>,
    elements: Vec<SchemaNode>,
}

impl Container {
    /// Zero or one occurrence unless changed.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            min_elements: Some(0),
            max_elements: Some(1),
            attributes: Vec::new(),
            elements: Vec::new(),
        }
    }

    pub fn min_elements(mut self, min: usize) -> Self {
        self.min_elements = Some(min);
        self
    }

    pub fn max_elements(mut self, max: usize) -> Self {
        self.max_elements = Some(max);
        self
    }

    pub fn unbounded(mut self) -> Self {
        self.max_elements = None;
        self
    }

    pub fn attribute(mut self, attribute: AttributeNode) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn element(mut self, element: impl Into<SchemaNode>) -> Self {
        self.elements.push(element.into());
        self
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn attributes(&self) -> &[AttributeNode] {
        &self.attributes
    }

    pub fn elements(&self) -> &[SchemaNode] {
        &self.elements
    }

    fn validate(&self, parent: &Element, cursor: usize, ctx: &mut ValidationContext) -> usize {
        let (run, next) = extract_run(parent, cursor, &self.tag);
        check_cardinality(&self.tag, run.len(), self.min_elements, self.max_elements, ctx);
        self.validate_run(run, ctx);
        next
    }

    fn validate_run(&self, run: &[Element], ctx: &mut ValidationContext) {
        for element in run {
            validate_attributes(&self.attributes, element, ctx);
            let mut cursor = 0;
            for node in &self.elements {
                cursor = node.validate(element, cursor, ctx);
            }
            report_unknown(&element.children()[cursor..], ctx);
        }
    }
}

/// Element-level schema node.
#[derive(Debug, Clone)]
pub enum SchemaNode {
    Leaf(Leaf),
    LeafList(LeafList),
    Container(Container),
}

impl SchemaNode {
    pub fn tag(&self) -> &str {
        match self {
            SchemaNode::Leaf(leaf) => &leaf.tag,
            SchemaNode::LeafList(list) => &list.tag,
            SchemaNode::Container(container) => &container.tag,
        }
    }

    pub fn attributes(&self) -> &[AttributeNode] {
        match self {
            SchemaNode::Leaf(leaf) => &leaf.attributes,
            SchemaNode::LeafList(list) => &list.attributes,
            SchemaNode::Container(container) => &container.attributes,
        }
    }

    /// Validates the run of matching children of `parent` starting at
    /// `cursor` and returns the position after it.
    pub fn validate(&self, parent: &Element, cursor: usize, ctx: &mut ValidationContext) -> usize {
        match self {
            SchemaNode::Leaf(leaf) => leaf.validate(parent, cursor, ctx),
            SchemaNode::LeafList(list) => list.validate(parent, cursor, ctx),
            SchemaNode::Container(container) => container.validate(parent, cursor, ctx),
        }
    }
}

impl From<Leaf> for SchemaNode {
    fn from(leaf: Leaf) -> Self {
        SchemaNode::Leaf(leaf)
    }
}

impl From<LeafList> for SchemaNode {
    fn from(list: LeafList) -> Self {
        SchemaNode::LeafList(list)
    }
}

impl From<Container> for SchemaNode {
    fn from(container: Container) -> Self {
        SchemaNode::Container(container)
    }
}

/// Entry point of a schema: the expected document element.
#[derive(Debug, Clone)]
pub struct RootNode {
    document_element: Arc<Container>,
}

impl RootNode {
    pub fn new(document_element: Container) -> Self {
        Self {
            document_element: Arc::new(document_element),
        }
    }

    pub fn document_element(&self) -> &Arc<Container> {
        &self.document_element
    }

    pub fn validate(&self, element: &Element) -> Vec<ValidationIssue> {
        let mut ctx = ValidationContext::new();
        if element.tag() != self.document_element.tag {
            ctx.error(ValidationIssue::MissingElement {
                tag: self.document_element.tag.clone(),
            });
            return ctx.into_issues();
        }
        self.document_element.validate_run(std::slice::from_ref(element), &mut ctx);
        ctx.into_issues()
    }
}

/// The maximal run of children at `cursor` carrying `tag`.
fn extract_run<'a>(parent: &'a Element, cursor: usize, tag: &str) -> (&'a [Element], usize) {
    let children = parent.children();
    let start = cursor.min(children.len());
    let end = start
        + children[start..]
            .iter()
            .take_while(|child| child.tag() == tag)
            .count();
    (&children[start..end], end)
}

fn check_cardinality(
    tag: &str,
    count: usize,
    min: Option<usize>,
    max: Option<usize>,
    ctx: &mut ValidationContext,
) {
    if min.is_some_and(|min| count < min) {
        ctx.error(ValidationIssue::TooFewElements { tag: tag.to_string() });
    }
    if max.is_some_and(|max| count > max) {
        ctx.error(ValidationIssue::TooManyElements { tag: tag.to_string() });
    }
}

fn validate_attributes(attributes: &[AttributeNode], element: &Element, ctx: &mut ValidationContext) {
    for attribute in attributes {
        attribute.validate(element, ctx);
    }
}

fn report_unknown(children: &[Element], ctx: &mut ValidationContext) {
    for child in children {
        ctx.error(ValidationIssue::UnknownElement {
            tag: child.tag().to_string(),
        });
    }
}

pub(crate) fn element_text(element: &Element) -> &str {
    element.text().map(str::trim).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::Namespace;

    fn playlist_schema(ns: &Namespace) -> RootNode {
        RootNode::new(
            Container::new(ns.tag("playlist"))
                .attribute(AttributeNode::new("publish", ScalarType::Timestamp))
                .element(Leaf::new(ns.tag("title"), ScalarType::Str).mandatory())
                .element(LeafList::new(ns.tag("keyword"), ScalarType::Str))
                .element(
                    Container::new(ns.tag("clip"))
                        .unbounded()
                        .attribute(AttributeNode::new("src", ScalarType::Str).mandatory())
                        .attribute(AttributeNode::new("offset", ScalarType::Int).mandatory())
                        .attribute(AttributeNode::new("length", ScalarType::Int).mandatory()),
                ),
        )
    }

    fn clip(ns: &Namespace, src: &str, offset: &str) -> Element {
        ns.element("clip")
            .with_attribute("src", src)
            .with_attribute("offset", offset)
            .with_attribute("length", "20")
    }

    #[test]
    fn test_conformant_document_has_no_issues() {
        let ns = Namespace::new("urn:cms");
        let doc = ns
            .element("playlist")
            .with_attribute("publish", "2024-01-15T10:30:00Z")
            .with_child(ns.element("title").with_text("Morning"))
            .with_child(ns.element("keyword").with_text("news"))
            .with_child(ns.element("keyword").with_text("sport"))
            .with_child(clip(&ns, "/a", "0"))
            .with_child(clip(&ns, "/b", "20"));
        assert_eq!(playlist_schema(&ns).validate(&doc), Vec::<ValidationIssue>::new());
    }

    #[test]
    fn test_missing_mandatory_leaf_is_reported() {
        let ns = Namespace::new("urn:cms");
        let doc = ns.element("playlist");
        let issues = playlist_schema(&ns).validate(&doc);
        assert_eq!(
            issues,
            vec![ValidationIssue::MissingElement {
                tag: ns.tag("title")
            }]
        );
        assert_eq!(issues[0].to_string(), "{urn:cms}title: missing element");
    }

    #[test]
    fn test_two_leaves_are_too_many() {
        let ns = Namespace::new("urn:cms");
        let doc = ns
            .element("playlist")
            .with_child(ns.element("title").with_text("a"))
            .with_child(ns.element("title").with_text("b"));
        let issues = playlist_schema(&ns).validate(&doc);
        assert!(issues
            .iter()
            .any(|i| i.to_string() == "{urn:cms}title: too many elements"));
    }

    #[test]
    fn test_leaf_checks_only_its_text() {
        let ns = Namespace::new("urn:cms");
        let doc = ns
            .element("playlist")
            .with_child(
                ns.element("title")
                    .with_text("Morning")
                    .with_child(ns.element("b").with_text("bold")),
            );
        assert_eq!(playlist_schema(&ns).validate(&doc), Vec::<ValidationIssue>::new());
    }

    #[test]
    fn test_wrong_root_stops_validation() {
        let ns = Namespace::new("urn:cms");
        let issues = playlist_schema(&ns).validate(&ns.element("asset"));
        assert_eq!(
            issues,
            vec![ValidationIssue::MissingElement {
                tag: ns.tag("playlist")
            }]
        );
    }

    #[test]
    fn test_out_of_order_children_are_unknown() {
        let ns = Namespace::new("urn:cms");
        let doc = ns
            .element("playlist")
            .with_child(clip(&ns, "/a", "0"))
            .with_child(ns.element("title").with_text("late"));
        let issues = playlist_schema(&ns).validate(&doc);
        assert!(issues.contains(&ValidationIssue::MissingElement { tag: ns.tag("title") }));
        assert!(issues.contains(&ValidationIssue::UnknownElement { tag: ns.tag("clip") }));
        assert!(issues.contains(&ValidationIssue::UnknownElement { tag: ns.tag("title") }));
    }

    #[test]
    fn test_attribute_issues_are_collected() {
        let ns = Namespace::new("urn:cms");
        let doc = ns
            .element("playlist")
            .with_attribute("publish", "not a date")
            .with_child(ns.element("title").with_text("x"))
            .with_child(ns.element("clip").with_attribute("src", "/a").with_attribute("offset", "zero"));
        let issues = playlist_schema(&ns).validate(&doc);
        let rendered: Vec<String> = issues.iter().map(ToString::to_string).collect();
        assert_eq!(
            rendered,
            vec![
                "{urn:cms}playlist[publish]: invalid value",
                "{urn:cms}clip[offset]: invalid value",
                "{urn:cms}clip[length]: attribute missing",
            ]
        );
    }

    #[test]
    fn test_leaf_list_uniqueness_and_values() {
        let ns = Namespace::local();
        let root = RootNode::new(
            Container::new("numbers").element(LeafList::new("n", ScalarType::Int).max_elements(3)),
        );
        let doc = Element::new("numbers")
            .with_child(Element::new("n").with_text("1"))
            .with_child(Element::new("n").with_text(" 01 "))
            .with_child(Element::new("n").with_text("x"))
            .with_child(Element::new("n").with_text("2"));
        let issues = root.validate(&doc);
        assert!(issues.contains(&ValidationIssue::TooManyElements { tag: ns.tag("n") }));
        assert!(issues.contains(&ValidationIssue::DuplicateListElement {
            tag: "n".to_string(),
            value: "1".to_string()
        }));
        assert!(issues.contains(&ValidationIssue::InvalidListValue {
            tag: "n".to_string(),
            index: 2
        }));
    }

    #[test]
    fn test_container_cardinality() {
        let root = RootNode::new(
            Container::new("doc").element(Container::new("part").min_elements(1).max_elements(2)),
        );
        let none = Element::new("doc");
        assert_eq!(
            root.validate(&none),
            vec![ValidationIssue::TooFewElements { tag: "part".to_string() }]
        );
        let three = Element::new("doc")
            .with_child(Element::new("part"))
            .with_child(Element::new("part"))
            .with_child(Element::new("part"));
        assert_eq!(
            root.validate(&three),
            vec![ValidationIssue::TooManyElements { tag: "part".to_string() }]
        );
    }
}
