// Copyright 2026 Prodex Contributors
// SPDX-License-Identifier: Apache-2.0

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use prodex::browser::chromium::{find_chromium, ChromiumBrowser};
use prodex::browser::{Browser, NoopBrowser};
use prodex::extract::ai::OpenAiCompletion;
use prodex::pipeline::Orchestrator;
use prodex::record::ExtractionOutcome;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(
    name = "prodex",
    about = "Prodex — turn any e-commerce product URL into one normalized record",
    version
)]
struct Cli {
    /// Output results as JSON (machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Enable verbose/debug logging
    #[arg(long, short, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Suppress all logging output
    #[arg(long, short, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract a product record from a URL
    Extract {
        /// Product page URL
        url: String,
        /// Path to manually saved page source (the manual-HTML escalation path)
        #[arg(long)]
        manual_html: Option<PathBuf>,
        /// Override the page-fetch budget in milliseconds
        #[arg(long, value_name = "MS")]
        timeout: Option<u64>,
    },
    /// Check environment: browser binary, AI configuration
    Doctor,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if !cli.quiet {
        let default_level = if cli.verbose { "prodex=debug" } else { "prodex=info" };
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::from_default_env()
                    .add_directive(default_level.parse().expect("level directive is valid")),
            )
            .with_writer(std::io::stderr)
            .init();
    }

    match cli.command {
        Commands::Extract {
            url,
            manual_html,
            timeout,
        } => run_extract(url, manual_html, timeout, cli.json).await,
        Commands::Doctor => run_doctor(cli.json),
    }
}

async fn run_extract(
    url: String,
    manual_html: Option<PathBuf>,
    timeout_ms: Option<u64>,
    json: bool,
) -> Result<()> {
    let manual = match &manual_html {
        Some(path) => Some(
            std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?,
        ),
        None => None,
    };

    let browser: Arc<dyn Browser> = match ChromiumBrowser::new().await {
        Ok(b) => {
            info!("chromium available, specialized extraction enabled");
            Arc::new(b)
        }
        Err(e) => {
            warn!("no browser available ({e}); running in HTTP-only mode");
            Arc::new(NoopBrowser)
        }
    };

    let mut orchestrator =
        Orchestrator::new(browser.clone(), Arc::new(OpenAiCompletion::from_env()));
    if let Some(ms) = timeout_ms {
        orchestrator = orchestrator.with_fetch_timeout(ms);
    }
    let outcome = orchestrator.extract(&url, manual.as_deref()).await;
    browser.shutdown().await.ok();

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    match outcome {
        ExtractionOutcome::Success { record } => {
            println!("Product:    {}", record.product_name);
            println!("Price:      {}", record.price);
            println!("Compare at: {}", record.compare_at_price);
            println!("Vendor:     {}", record.vendor);
            println!("Weight:     {} {}", record.weight, record.weight_unit);
            println!("Images:     {}", record.images.len());
            for img in &record.images {
                println!("  {img}");
            }
        }
        ExtractionOutcome::ManualHtmlRequired {
            message,
            instructions,
        } => {
            println!("{message}");
            for (i, step) in instructions.iter().enumerate() {
                println!("  {}. {step}", i + 1);
            }
            println!("\nThen re-run with: prodex extract {url} --manual-html page.html");
        }
        ExtractionOutcome::Failure { reason } => {
            eprintln!("Extraction failed: {reason}");
            eprintln!("Please add this product manually.");
            std::process::exit(1);
        }
    }
    Ok(())
}

fn run_doctor(json: bool) -> Result<()> {
    let chromium = find_chromium();
    let ai_key = std::env::var("PRODEX_AI_API_KEY").is_ok();
    let ai_base = std::env::var("PRODEX_AI_BASE_URL").ok();

    if json {
        println!(
            "{}",
            serde_json::json!({
                "chromium": chromium.as_ref().map(|p| p.display().to_string()),
                "aiKeyConfigured": ai_key,
                "aiBaseUrl": ai_base,
            })
        );
        return Ok(());
    }

    match &chromium {
        Some(path) => println!("  ok: chromium found at {}", path.display()),
        None => println!(
            "  !!  chromium not found; specialized extraction will fall back to AI.\n\
             \x20     Set PRODEX_CHROMIUM_PATH or install Chrome."
        ),
    }
    if ai_key {
        println!("  ok: PRODEX_AI_API_KEY is set");
    } else {
        println!("  !!  PRODEX_AI_API_KEY is not set; AI fallback will fail");
    }
    if let Some(base) = ai_base {
        println!("  ok: AI base URL override: {base}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn extract_accepts_quiet_and_timeout_override() {
        let cli = Cli::try_parse_from([
            "prodex",
            "--quiet",
            "extract",
            "https://shop.test/p/1",
            "--timeout",
            "5000",
        ])
        .unwrap();
        assert!(cli.quiet);
        match cli.command {
            Commands::Extract { timeout, .. } => assert_eq!(timeout, Some(5000)),
            _ => panic!("expected extract subcommand"),
        }
    }

    #[test]
    fn quiet_and_verbose_are_mutually_exclusive() {
        let err = Cli::try_parse_from(["prodex", "--quiet", "--verbose", "doctor"]);
        assert!(err.is_err());
    }
}
