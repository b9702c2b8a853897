pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;
pub mod xml;

#[cfg(feature = "cli")]
pub use config::{CliConfig, Command};

pub use adapters::MemoryStore;
pub use app::Workspace;
pub use config::Definitions;
pub use crate::core::{
    attribute::{AttributeDescriptor, Condition, Operator, TypedList, ValueKind},
    binder::{Binder, SchemaBinding},
    instance::ModelInstance,
    mapper::Mapper,
    registry::{ClassBuilder, ModelClass, ModelRegistry},
    schema::{AttributeNode, Container, Leaf, LeafList, RootNode, SchemaNode, ValidationIssue},
    types::ScalarType,
    value::Value,
};
pub use domain::model::{Query, Record};
pub use domain::ports::{Converter, DocumentCollection, DocumentStore};
pub use utils::error::{ModelError, Result};
