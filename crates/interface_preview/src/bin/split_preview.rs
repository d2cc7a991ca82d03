//! Split Preview Binary
//!
//! Reads a preview document and prints the computed split as JSON.
//!
//! # Usage
//!
//! ```bash
//! # Read the document from a file
//! cargo run --bin split-preview -- preview.json
//!
//! # Or from stdin, with fees charged to partners
//! SPLIT_FEE_POLICY=proportional_to_partners cargo run --bin split-preview < preview.json
//! ```
//!
//! # Environment Variables
//!
//! * `SPLIT_LOG_LEVEL` - Log level or filter directive (default: info)
//! * `SPLIT_LOG_FORMAT` - `plain` or `json` (default: plain)
//! * `SPLIT_FEE_POLICY` - `merchant_borne` or `proportional_to_partners` (default: merchant_borne)
//! * `SPLIT_DEFAULT_CURRENCY` - ISO code used when the document has none (default: USD)
//!
//! Logs go to stderr so stdout stays valid JSON.

use std::io::Read;

use anyhow::Context;
use interface_preview::config::{LogFormat, PreviewConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() -> anyhow::Result<()> {
    // Load .env file if present (useful for local development)
    dotenvy::dotenv().ok();

    let config = PreviewConfig::from_env().context("invalid SPLIT_* configuration")?;
    init_tracing(&config.log_level, config.log_format);

    let input = match std::env::args().nth(1) {
        Some(path) => std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path))?,
        None => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("failed to read stdin")?;
            buffer
        }
    };

    tracing::info!(fee_policy = ?config.fee_policy, "Running split preview");

    let response = interface_preview::run_preview_json(&input, config.engine())?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

/// Initializes the tracing subscriber for structured logging.
///
/// # Arguments
///
/// * `log_level` - Filter used when `RUST_LOG` is unset
/// * `format` - Plain text or JSON lines
fn init_tracing(log_level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Plain => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .init(),
    }
}
