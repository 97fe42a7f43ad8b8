use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde::Serialize;

use preprocess_proxy::config::load_config;
use preprocess_proxy::pipeline::{Pipeline, StagedFile};
use preprocess_proxy::rules::{Resolved, RuleLoader};

#[derive(Parser)]
#[command(name = "preprocess-cli")]
#[command(about = "Inspect and dry-run the preprocessing rule chain", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List configured rules and whether each one resolves
    Rules,
    /// Run the enabled rule chain against a local file
    Apply {
        /// File to process (left untouched)
        file: PathBuf,
        /// Where to write the result (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Serialize)]
struct RuleStatus {
    name: String,
    enabled: bool,
    rule: String,
    status: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;
    let loader = RuleLoader::new();

    match cli.command {
        Commands::Rules => {
            let mut statuses = Vec::with_capacity(config.rules.len());
            for rule in &config.rules {
                let status = match loader.resolve(&rule.rule).await {
                    Ok(Resolved::Ready(_)) => "ready".to_string(),
                    Ok(Resolved::Misconfigured(reason)) => format!("misconfigured: {reason}"),
                    Err(e) => format!("load failed: {e}"),
                };
                statuses.push(RuleStatus {
                    name: rule.name.clone(),
                    enabled: rule.enabled,
                    rule: rule.rule.clone(),
                    status,
                });
            }
            println!("{}", serde_json::to_string_pretty(&statuses)?);
        }
        Commands::Apply { file, output } => {
            let staged = StagedFile::copy_from(&config.upload.staging_dir(), &file).await?;
            let report = Pipeline::new(loader).run(&config.rule_chain(), staged.path()).await;
            eprintln!("{}", serde_json::to_string_pretty(&report)?);

            let result = tokio::fs::read(staged.path()).await;
            staged.remove().await?;
            let result = result?;

            match output {
                Some(path) => tokio::fs::write(path, result).await?,
                None => {
                    use std::io::Write;
                    std::io::stdout().write_all(&result)?;
                }
            }
        }
    }

    Ok(())
}
