pub mod element;
pub mod parser;
pub mod writer;

pub use element::{local_name, split_tag, Element, Namespace};
pub use parser::parse;
pub use writer::to_string;
