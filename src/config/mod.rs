#[cfg(feature = "cli")]
pub mod cli;
pub mod definitions;

#[cfg(feature = "cli")]
pub use cli::{CliConfig, Command};
pub use definitions::Definitions;
