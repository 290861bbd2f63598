mod error;
mod models;
mod parser;
mod pipeline;
mod server;
mod session;
mod settings;
mod tplc;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};

use models::{SearchQuery, DEFAULT_MIN_YEAR};
use session::HttpBrowser;
use settings::Settings;

#[derive(Parser)]
#[command(name = "tplc_scraper", about = "Device and patient problems from the FDA TPLC database")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search TPLC for a device and print the aggregated problems as JSON
    Scrape {
        /// Device name to search for
        #[arg(short, long)]
        device_name: String,
        /// Optional product code filter
        #[arg(short, long)]
        product_code: Option<String>,
        /// Minimum report year (2000-2024)
        #[arg(short, long, default_value_t = DEFAULT_MIN_YEAR)]
        min_year: i32,
    },
    /// Parse and aggregate a JSON array of raw device records
    Parse {
        /// File holding the raw records
        file: PathBuf,
    },
    /// Serve the scrape API over HTTP
    Serve {
        /// Listen address (overrides TPLC_BIND)
        #[arg(short, long)]
        bind: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let mut settings = Settings::load()?;

    match cli.command {
        Commands::Scrape {
            device_name,
            product_code,
            min_year,
        } => {
            let query = SearchQuery::new(device_name, product_code, min_year)?;
            let browser = HttpBrowser::new(settings.clone());
            let response = pipeline::run(&query, &browser, &settings).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
            eprintln!(
                "{} devices in {}",
                response.devices().len(),
                format_duration(t0.elapsed())
            );
        }
        Commands::Parse { file } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let raw: Vec<serde_json::Value> =
                serde_json::from_str(&text).context("expected a JSON array of device records")?;
            let response = parser::process_values(&raw);
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Commands::Serve { bind } => {
            if let Some(bind) = bind {
                settings.bind = bind;
            }
            let browser = HttpBrowser::new(settings.clone());
            server::serve(server::AppState { settings, browser }).await?;
        }
    }

    Ok(())
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else {
        format!("{}m {}s", secs / 60, secs % 60)
    }
}
