//! # Ratio
//!
//! Capture structured facts about records (for example clinical trials)
//! through forms generated from an ontology.
//!
//! ## Usage
//!
//! ```bash
//! ratio init
//! ratio load-schema trial.ttl
//! ratio new-record "Study 42" --template trial.template
//! ratio show 1
//! ratio set-value 1 ex:Trial_1_1 ex:title 0 "Aspirin in migraine"
//! ratio export 1 -t ntriples -o study.nt
//! ```
//!
//! Set `RATIO_LOG_FORMAT=json` for machine-parseable logs and `RUST_LOG` to
//! change the filter.

use clap::Parser;
use ratio::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    let log_format = std::env::var("RATIO_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "ratio=info,ratio_core=info".into());

    // Logs go to stderr so `--json-mode` output stays parseable.
    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    let cli = cli::Cli::parse();

    if let Err(e) = cli::execute(cli) {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}
