use modelbind::domain::model::Record;
use modelbind::{
    AttributeDescriptor, Mapper, MemoryStore, ModelClass, ModelError, ModelInstance, ModelRegistry, Value,
    ValueKind,
};
use serde_json::json;
use std::sync::Arc;

fn registry() -> anyhow::Result<Arc<ModelRegistry>> {
    let mut registry = ModelRegistry::new();
    registry.define(
        ModelClass::builder("Animal")
            .attribute("name", AttributeDescriptor::string())
            .attribute("legs", AttributeDescriptor::integer().default_value(4))
            .attribute("born", AttributeDescriptor::timestamp().optional()),
    )?;
    registry.define(
        ModelClass::builder("Dog")
            .extends("Animal")
            .attribute("tricks", AttributeDescriptor::sequence(ValueKind::Str))
            .attribute("friend", AttributeDescriptor::reference("Animal")),
    )?;
    registry.define(ModelClass::builder("Animalcule").attribute("name", AttributeDescriptor::string()))?;
    Ok(Arc::new(registry))
}

#[tokio::test]
async fn test_find_ancestor_returns_subclass_instances() -> anyhow::Result<()> {
    let registry = registry()?;
    let mapper = Mapper::new(MemoryStore::new(), Arc::clone(&registry));

    let animal = registry.class("Animal")?;
    let dog = registry.class("Dog")?;
    assert_eq!(dog.collection(), "animal");

    let mut bird = ModelInstance::new(&animal, [("name", Value::from("Tweety")), ("legs", Value::from(2))])?;
    let mut rex = ModelInstance::new(&dog, [("name", Value::from("Rex")), ("friend", Value::from(bird.clone()))])?;
    rex.sequence_mut("tricks")?.extend(["sit", "roll"])?;
    mapper.save(&mut bird).await?;
    mapper.save(&mut rex).await?;

    let mut other = ModelInstance::new(&registry.class("Animalcule")?, [("name", "amoeba")])?;
    mapper.save(&mut other).await?;

    let all = mapper.find("Animal", &[], None, 0).await?;
    assert_eq!(all.len(), 2);
    let found_rex = all.iter().find(|a| a.class_name() == "Dog").expect("dog comes back as a Dog");
    assert_eq!(found_rex, &rex);
    assert_eq!(found_rex.id(), rex.id());
    assert_eq!(found_rex.get("friend")?.as_model(), Some(&bird));

    let dogs = mapper.find("Dog", &[], None, 0).await?;
    assert_eq!(dogs.len(), 1);

    let legs = animal.require("legs")?;
    let four_legged = mapper.find("Animal", &[legs.ge(3), legs.le(4)], None, 0).await?;
    assert_eq!(four_legged.len(), 1);
    assert_eq!(four_legged[0].get("name")?, &Value::from("Rex"));

    let not_rex = mapper
        .find("Animal", &[animal.require("name")?.ne("Rex")], None, 0)
        .await?;
    assert_eq!(not_rex, vec![bird.clone()]);

    let paged = mapper.find("Animal", &[], Some(1), 1).await?;
    assert_eq!(paged.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_get_by_identity() -> anyhow::Result<()> {
    let registry = registry()?;
    let store = MemoryStore::new();
    let mapper = Mapper::new(store.clone(), Arc::clone(&registry));

    let mut rex = ModelInstance::new(&registry.class("Dog")?, [("name", "Rex")])?;
    let id = mapper.save(&mut rex).await?;

    let loaded = mapper.get("Animal", &id).await?;
    assert_eq!(loaded.class_name(), "Dog");
    assert_eq!(loaded, rex);

    assert!(matches!(
        mapper.get("Animal", "ffffffffffffffffffffffff").await,
        Err(ModelError::UnknownIdentity { .. })
    ));

    let duplicate = Record::from_json(json!({"_id": id.clone(), "_typename": "animal", "name": "Copy"}))
        .expect("object");
    store.push_raw("animal", duplicate).await;
    assert!(matches!(
        mapper.get("Animal", &id).await,
        Err(ModelError::AmbiguousIdentity { .. })
    ));
    // the Dog subtree still sees one record
    assert_eq!(mapper.get("Dog", &id).await?, rex);
    Ok(())
}

#[tokio::test]
async fn test_saving_again_replaces_the_record() -> anyhow::Result<()> {
    let registry = registry()?;
    let store = MemoryStore::new();
    let mapper = Mapper::new(store.clone(), Arc::clone(&registry));

    let mut tweety = ModelInstance::new(&registry.class("Animal")?, [("name", "Tweety")])?;
    let id = mapper.save(&mut tweety).await?;
    tweety.set("legs", 2)?;
    assert_eq!(mapper.save(&mut tweety).await?, id);

    assert_eq!(store.records("animal").await.len(), 1);
    assert_eq!(mapper.get("Animal", &id).await?.get("legs")?, &Value::Int(2));
    Ok(())
}

#[tokio::test]
async fn test_unresolvable_records_fail_loudly() -> anyhow::Result<()> {
    let registry = registry()?;
    let store = MemoryStore::new();
    let mapper = Mapper::new(store.clone(), Arc::clone(&registry));

    store
        .push_raw(
            "animal",
            Record::from_json(json!({"_id": "1", "_typename": "animal,cat", "name": "Tom"})).expect("object"),
        )
        .await;
    let err = mapper.find("Animal", &[], None, 0).await.unwrap_err();
    assert!(matches!(err, ModelError::UnknownTypeTag { ref tag } if tag == "animal,cat"));

    let err = mapper
        .decode_record(&Record::from_json(json!({"name": "Tom"})).expect("object"))
        .unwrap_err();
    assert!(matches!(err, ModelError::MissingTypeTag { .. }));
    Ok(())
}
