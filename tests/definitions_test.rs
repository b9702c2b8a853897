use modelbind::utils::validation::Validate;
use modelbind::{Definitions, Mapper, MemoryStore, ModelError, Value, Workspace};
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;

const LIBRARY: &str = r#"
[[models]]
name = "Author"
attributes = [
    { name = "name", type = "string" },
    { name = "born", type = "timestamp", optional = true },
]

[[models]]
name = "Book"
collection = "books"
attributes = [
    { name = "title", type = "string" },
    { name = "pages", type = "int", default = 100 },
    { name = "price", type = "double", optional = true },
    { name = "author", type = "reference", class = "Author" },
    { name = "isbn", type = "sequence", element = "string" },
]

[[models]]
name = "Ebook"
extends = "Book"
attributes = [{ name = "drm", type = "bool", default = false }]

[[schemas]]
name = "book"
namespace = "urn:library"

[schemas.root]
tag = "book"
attributes = [
    { name = "title", mandatory = true },
    { name = "pages", type = "int" },
]

[[schemas.root.elements]]
tag = "price"
kind = "leaf"
type = "double"

[[schemas.root.elements]]
tag = "author"
attributes = [{ name = "name", mandatory = true }, { name = "born", type = "timestamp" }]

[[schemas.root.elements]]
tag = "isbn"
kind = "leaf-list"
pattern = "[0-9-]{10,17}"

[[bindings]]
schema = "book"
model = "Book"
"#;

fn write_definitions(content: &str) -> anyhow::Result<NamedTempFile> {
    let mut file = NamedTempFile::new()?;
    file.write_all(content.as_bytes())?;
    Ok(file)
}

#[test]
fn test_workspace_converts_documents_both_ways() -> anyhow::Result<()> {
    let file = write_definitions(LIBRARY)?;
    let definitions = Definitions::from_file(file.path())?;
    definitions.validate()?;
    let workspace = Workspace::from_definitions(&definitions)?;

    let document = r#"<book xmlns="urn:library" title="Dune" pages="412"><price>9.99</price><author name="Frank Herbert" born="1920-10-08"/><isbn>978-0441013593</isbn></book>"#;
    assert!(workspace.validate_document(document)?.is_empty());

    let record = workspace.to_record(document)?;
    assert_eq!(record.get("_typename"), Some(&serde_json::json!("book")));
    assert_eq!(record.get("pages"), Some(&serde_json::json!(412)));
    assert_eq!(
        record.get("author"),
        Some(&serde_json::json!({
            "_typename": "author",
            "name": "Frank Herbert",
            "born": "1920-10-08T00:00:00.000000000Z",
        }))
    );

    let xml = workspace.from_record(&serde_json::to_string(&record)?, false)?;
    assert_eq!(
        xml,
        r#"<book xmlns="urn:library" title="Dune" pages="412"><price>9.99</price><author name="Frank Herbert" born="1920-10-08T00:00:00Z"/><isbn>978-0441013593</isbn></book>"#
    );
    Ok(())
}

#[test]
fn test_invalid_isbn_is_reported() -> anyhow::Result<()> {
    let workspace = Workspace::from_definitions(&Definitions::from_toml_str(LIBRARY)?)?;
    let issues = workspace.validate_document(r#"<book xmlns="urn:library" title="x"><isbn>abc</isbn></book>"#)?;
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].to_string(), "{urn:library}isbn[0]: invalid value");

    let err = workspace
        .to_record(r#"<book xmlns="urn:library" title="x"><isbn>abc</isbn></book>"#)
        .unwrap_err();
    assert!(matches!(err, ModelError::InvalidValue { ref tag, .. } if tag == "{urn:library}isbn"));
    Ok(())
}

#[test]
fn test_registry_from_definitions_drives_the_mapper() -> anyhow::Result<()> {
    let (registry, _) = Definitions::from_toml_str(LIBRARY)?.build()?;
    let ebook = registry.class("Ebook")?;
    assert_eq!(ebook.collection(), "books");
    assert_eq!(ebook.type_tag(), "book,ebook");
    let names: Vec<&str> = ebook.attributes(true).iter().map(|a| a.name()).collect();
    assert_eq!(names, vec!["drm", "title", "pages", "price", "author", "isbn"]);

    let mapper = Mapper::new(MemoryStore::new(), Arc::clone(&registry));
    tokio_test::block_on(async {
        let mut copy = modelbind::ModelInstance::new(&ebook, [("title", "Dune")])?;
        let id = mapper.save(&mut copy).await?;
        let books = mapper.find("Book", &[], None, 0).await?;
        assert_eq!(books.len(), 1);
        assert_eq!(books[0].class_name(), "Ebook");
        assert_eq!(books[0].get("pages")?, &Value::Int(100));
        assert_eq!(books[0].id(), Some(id.as_str()));
        Ok::<_, anyhow::Error>(())
    })
}

#[test]
fn test_unknown_reference_in_definitions() -> anyhow::Result<()> {
    let definitions = Definitions::from_toml_str(
        r#"
[[models]]
name = "Book"
attributes = [{ name = "author", type = "reference", class = "Writer" }]
"#,
    )?;
    assert!(matches!(
        definitions.build(),
        Err(ModelError::ConfigValidationError { ref field, .. }) if field == "models.Book.author.class"
    ));
    Ok(())
}
