// Application layer: the operations the CLI exposes, usable without clap.

pub mod commands;

pub use commands::Workspace;
