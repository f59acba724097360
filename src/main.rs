//! kaspi-crawler - kaspi.kz product page extraction CLI

use anyhow::Result;
use clap::{Parser, Subcommand};
use kaspi_crawler::commands::{ProductCommand, Stage, StageCommand};
use kaspi_crawler::config::{Config, OutputFormat};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "kaspi-crawler",
    version,
    about = "Scrape kaspi.kz product pages",
    long_about = "Renders kaspi.kz product pages in headless Chromium and collects name, images, attributes, seller offers, rating and category."
)]
struct Cli {
    /// Proxy URL (e.g., socks5://host:port)
    #[arg(long, global = true, env = "KASPI_PROXY")]
    proxy: Option<String>,

    /// Attempt ceiling for every retry loop
    #[arg(long, global = true)]
    max_retries: Option<u32>,

    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true)]
    format: Option<OutputFormat>,

    /// Show the browser window
    #[arg(long, global = true)]
    headful: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape full product records
    #[command(alias = "p")]
    Product {
        /// Product URL(s), e.g. https://kaspi.kz/shop/p/<name>-<id>/?c=<city>
        #[arg(required = true)]
        urls: Vec<String>,
    },

    /// List seller offers for a product
    #[command(alias = "o")]
    Offers {
        /// Product URL
        url: String,
    },

    /// Extract rating and review count
    Rating {
        /// Product URL
        url: String,
    },

    /// Resolve the breadcrumb category path
    Category {
        /// Product URL
        url: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new(Level::DEBUG.to_string())
    } else {
        EnvFilter::from_default_env().add_directive(Level::WARN.into())
    };

    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    // Load config with layered overrides
    let mut config = Config::load(cli.config.as_deref())?.with_env();

    // Apply CLI overrides
    if let Some(proxy) = cli.proxy {
        config.proxy = Some(proxy);
    }
    if let Some(retries) = cli.max_retries {
        config.max_retries = retries;
    }
    if let Some(format) = cli.format {
        config.format = format;
    }
    if cli.headful {
        config.headless = false;
    }

    let output = match cli.command {
        Commands::Product { urls } => {
            let cmd = ProductCommand::new(config);
            if urls.len() == 1 {
                cmd.execute(&urls[0]).await?
            } else {
                cmd.execute_batch(&urls).await?
            }
        }
        Commands::Offers { url } => StageCommand::new(config, Stage::Offers).execute(&url).await?,
        Commands::Rating { url } => StageCommand::new(config, Stage::Rating).execute(&url).await?,
        Commands::Category { url } => {
            StageCommand::new(config, Stage::Category).execute(&url).await?
        }
    };

    println!("{}", output);
    Ok(())
}
