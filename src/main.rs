use anyhow::Context;
use clap::Parser;
use modelbind::utils::error::{ErrorCategory, ModelError};
use modelbind::utils::{logger, validation::Validate};
use modelbind::{CliConfig, Command, Definitions, Workspace};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = CliConfig::parse();

    // 初始化日誌
    if config.json_logs {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(config.verbose);
    }

    tracing::info!("Starting modelbind CLI");
    tracing::debug!("CLI config: {:?}", config);

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(2);
    }

    match run(&config).await {
        Ok(0) => Ok(()),
        Ok(code) => std::process::exit(code),
        Err(e) => {
            tracing::error!("❌ {:#}", e);
            let exit_code = match e.downcast_ref::<ModelError>() {
                Some(model_error) => {
                    eprintln!("❌ {}", model_error.user_friendly_message());
                    // 根據錯誤類別決定退出碼
                    match model_error.category() {
                        ErrorCategory::Configuration => 2,
                        ErrorCategory::Document => 3,
                        ErrorCategory::Model | ErrorCategory::Binding => 4,
                        ErrorCategory::Persistence => 5,
                    }
                }
                None => {
                    eprintln!("❌ {:#}", e);
                    1
                }
            };
            std::process::exit(exit_code);
        }
    }
}

/// Returns the process exit code: 1 when a document has validation issues.
async fn run(config: &CliConfig) -> anyhow::Result<i32> {
    let definitions = Definitions::from_file(&config.definitions)?;
    let workspace = Workspace::from_definitions(&definitions)?;

    let input = config.command.input();
    let source = tokio::fs::read_to_string(input)
        .await
        .map_err(ModelError::IoError)
        .with_context(|| format!("reading {}", input.display()))?;

    match &config.command {
        Command::Validate { .. } => {
            let issues = workspace.validate_document(&source)?;
            if issues.is_empty() {
                tracing::info!("✅ {} is valid", input.display());
                println!("✅ {} is valid", input.display());
                return Ok(0);
            }
            tracing::warn!("{} validation issue(s) in {}", issues.len(), input.display());
            for issue in &issues {
                println!("{}", issue);
            }
            Ok(1)
        }
        Command::ToRecord { pretty, .. } => {
            let record = workspace.to_record(&source)?;
            let output = if *pretty {
                serde_json::to_string_pretty(&record)?
            } else {
                serde_json::to_string(&record)?
            };
            println!("{}", output);
            Ok(0)
        }
        Command::FromRecord { indent, .. } => {
            let output = workspace.from_record(&source, *indent)?;
            println!("{}", output);
            Ok(0)
        }
    }
}
