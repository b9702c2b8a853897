use modelbind::xml::{self, Namespace};
use modelbind::{AttributeNode, Container, Leaf, LeafList, RootNode, ScalarType, ValidationIssue};

fn playlist_schema() -> anyhow::Result<RootNode> {
    let ns = Namespace::new("urn:cms");
    Ok(RootNode::new(
        Container::new(ns.tag("playlist"))
            .attribute(AttributeNode::new("id", ScalarType::pattern(ScalarType::Str, "[a-z]{3}-[0-9]+")?).mandatory())
            .element(Leaf::new(ns.tag("title"), ScalarType::Str).mandatory())
            .element(Leaf::new(ns.tag("duration"), ScalarType::range(ScalarType::Int, 1, 86_400)))
            .element(LeafList::new(ns.tag("tag"), ScalarType::Str).max_elements(3))
            .element(
                Container::new(ns.tag("clip"))
                    .min_elements(1)
                    .unbounded()
                    .attribute(AttributeNode::new("src", ScalarType::Str).mandatory())
                    .element(Leaf::new(ns.tag("start"), ScalarType::Timestamp).mandatory()),
            ),
    ))
}

fn messages(issues: &[ValidationIssue]) -> Vec<String> {
    issues.iter().map(ToString::to_string).collect()
}

#[test]
fn test_conformant_document() -> anyhow::Result<()> {
    let doc = xml::parse(
        r#"<playlist xmlns="urn:cms" id="abc-12">
             <title>Morning</title>
             <duration>3600</duration>
             <tag>news</tag>
             <tag>sport</tag>
             <clip src="/a"><start>2024-01-15T10:30:00Z</start></clip>
             <clip src="/b"><start>2024-01-15</start></clip>
           </playlist>"#,
    )?;
    assert_eq!(playlist_schema()?.validate(&doc), vec![]);
    Ok(())
}

#[test]
fn test_every_problem_is_reported() -> anyhow::Result<()> {
    let doc = xml::parse(
        r#"<playlist xmlns="urn:cms" id="ABC">
             <duration>0</duration>
             <tag>a</tag><tag>a</tag>
             <clip><start>yesterday</start></clip>
             <extra/>
           </playlist>"#,
    )?;
    assert_eq!(
        messages(&playlist_schema()?.validate(&doc)),
        vec![
            "{urn:cms}playlist[id]: invalid value",
            "{urn:cms}title: missing element",
            "{urn:cms}duration: invalid value",
            "{urn:cms}tag: list element is not unique: \"a\"",
            "{urn:cms}clip[src]: attribute missing",
            "{urn:cms}start: invalid value",
            "{urn:cms}extra: unknown element",
        ]
    );
    Ok(())
}

#[test]
fn test_leaf_given_twice_is_too_many() -> anyhow::Result<()> {
    let doc = xml::parse(
        r#"<playlist xmlns="urn:cms" id="abc-1">
             <title>one</title><title>two</title>
             <clip src="/a"><start>2024-01-15</start></clip>
           </playlist>"#,
    )?;
    assert_eq!(
        messages(&playlist_schema()?.validate(&doc)),
        vec!["{urn:cms}title: too many elements"]
    );
    Ok(())
}

#[test]
fn test_missing_required_container_is_too_few() -> anyhow::Result<()> {
    let doc = xml::parse(r#"<playlist xmlns="urn:cms" id="abc-1"><title>t</title></playlist>"#)?;
    assert_eq!(
        messages(&playlist_schema()?.validate(&doc)),
        vec!["{urn:cms}clip: too few elements"]
    );
    Ok(())
}

#[test]
fn test_other_namespace_is_a_different_document() -> anyhow::Result<()> {
    let doc = xml::parse(r#"<playlist xmlns="urn:other" id="abc-1"/>"#)?;
    assert_eq!(
        messages(&playlist_schema()?.validate(&doc)),
        vec!["{urn:cms}playlist: missing element"]
    );
    Ok(())
}
