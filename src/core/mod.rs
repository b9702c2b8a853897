pub mod attribute;
pub mod binder;
pub mod instance;
pub mod mapper;
pub mod registry;
pub mod schema;
pub mod types;
pub mod value;

pub use crate::utils::error::Result;
