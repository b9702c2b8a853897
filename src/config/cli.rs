use crate::utils::error::{ModelError, Result};
use crate::utils::validation::Validate;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Parser)]
#[command(name = "modelbind")]
#[command(about = "Validate and convert XML documents against model definitions")]
pub struct CliConfig {
    #[arg(long, short = 'd', help = "TOML file declaring models, schemas and bindings")]
    pub definitions: PathBuf,

    #[arg(long, short = 'v', help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Write logs as JSON lines")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Check an XML document against the schema bound to its root element
    Validate { input: PathBuf },

    /// Convert an XML document into a store record (JSON)
    ToRecord {
        input: PathBuf,
        #[arg(long, help = "Pretty-print the JSON output")]
        pretty: bool,
    },

    /// Convert a store record (JSON) into an XML document
    FromRecord {
        input: PathBuf,
        #[arg(long, help = "Indent the XML output")]
        indent: bool,
    },
}

impl Command {
    pub fn input(&self) -> &Path {
        match self {
            Command::Validate { input } | Command::ToRecord { input, .. } | Command::FromRecord { input, .. } => {
                input.as_path()
            }
        }
    }
}

fn require_file(field: &str, path: &Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(ModelError::InvalidConfigValueError {
            field: field.to_string(),
            value: path.display().to_string(),
            reason: "file does not exist".to_string(),
        })
    }
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        require_file("definitions", &self.definitions)?;
        require_file("input", self.command.input())?;
        Ok(())
    }
}
