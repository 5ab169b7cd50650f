//! Bulk translation binary - fills empty translated columns of one table
//! from the configured field mappings and prints the report as JSON.
//!
//! Usage:
//!   cargo run --bin bulk-translate -- <table> <source_language>
//!   cargo run --bin bulk-translate -- articles fr --max-rows 500 --provider openai
//!
//! Required environment variables:
//! - DATABASE_URL
//! - FIELD_MAPPINGS_FILE (mappings saved by the HTTP service)
//!
//! Optional:
//! - TRANSLATION_PROVIDERS and provider credentials, as for the server

use anyhow::{bail, Context, Result};
use std::sync::Arc;
use tracing::info;
use translation_orchestrator::{
    app, config::Config, field_mapping::BulkTranslateOptions, providers,
    service::TranslationService,
};

fn print_usage() {
    eprintln!("Usage: bulk-translate <table> <source_language> [--max-rows N] [--provider NAME]");
}

/// Parse `--max-rows` and `--provider` out of the trailing arguments
fn parse_options(args: &[String]) -> Result<BulkTranslateOptions> {
    let mut options = BulkTranslateOptions::default();
    let mut iter = args.iter();

    while let Some(flag) = iter.next() {
        let value = iter
            .next()
            .with_context(|| format!("Missing value for {}", flag))?;
        match flag.as_str() {
            "--max-rows" => {
                options.max_rows = Some(
                    value
                        .parse()
                        .with_context(|| format!("Invalid --max-rows '{}'", value))?,
                )
            }
            "--provider" => options.provider = Some(value.clone()),
            other => bail!("Unknown option: {}", other),
        }
    }
    Ok(options)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "translation_orchestrator=info".into()),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 || matches!(args[1].as_str(), "--help" | "-h" | "help") {
        print_usage();
        return Ok(());
    }

    let table = &args[1];
    let source_language = &args[2];
    let options = parse_options(&args[3..])?;

    let config = Config::from_env()?;
    if config.database_url.is_none() {
        bail!("DATABASE_URL is required for bulk translation");
    }
    if config.field_mappings_file.is_none() {
        bail!("FIELD_MAPPINGS_FILE is required for bulk translation");
    }

    let translator = Arc::new(TranslationService::new(
        &config,
        providers::build_providers(&config)?,
    ));
    let store = app::connect_row_store(&config).await?;
    let mappings = app::field_mapping_service(&config, translator, store).await?;

    info!("Bulk translating {} from '{}'", table, source_language);
    let report = mappings
        .bulk_translate_table(table, source_language, &options)
        .await?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    if !report.success {
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_options() {
        let options = parse_options(&args(&["--max-rows", "50", "--provider", "openai"])).unwrap();
        assert_eq!(options.max_rows, Some(50));
        assert_eq!(options.provider.as_deref(), Some("openai"));
    }

    #[test]
    fn test_parse_options_rejects_bad_input() {
        assert!(parse_options(&args(&["--max-rows"])).is_err());
        assert!(parse_options(&args(&["--max-rows", "many"])).is_err());
        assert!(parse_options(&args(&["--dry-run", "yes"])).is_err());
    }
}
