use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use mp_core::Config;
use mp_ocr::TesseractEngine;
use mp_scraper::{ArticlePipeline, HttpFetcher};
use mp_web::{create_app, AppState};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod report;

#[derive(Parser, Debug)]
#[command(author, version, about = "Scrape WeChat articles, OCR their images and store them in Feishu Bitable", long_about = None)]
pub struct Cli {
    /// JSON configuration file; environment variables override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Scrape one article and print the report
    Scrape {
        url: String,
        /// Skip OCR of the article images
        #[arg(long)]
        no_ocr: bool,
        /// Do not download images (implies no OCR)
        #[arg(long)]
        no_images: bool,
    },
    /// Scrape one article and store it in Feishu Bitable
    Save {
        url: String,
        #[arg(long)]
        no_ocr: bool,
        #[arg(long)]
        no_images: bool,
    },
    /// Run the HTTP API
    Serve {
        /// Listen address, overrides `server.bind`
        #[arg(long)]
        bind: Option<String>,
    },
    /// Check the OCR installation and the Feishu configuration
    Check,
}

fn build_pipeline(config: &Config) -> anyhow::Result<ArticlePipeline> {
    let fetcher = Arc::new(HttpFetcher::new(&config.http)?);
    let ocr = mp_ocr::create_engine(&config.ocr)?;
    info!("🧠 OCR engine initialized (using {})", ocr.name());
    let storage = mp_storage::create_storage(config)?;
    if let Some(storage) = &storage {
        info!("💾 Table store initialized (using {})", storage.name());
    }
    Ok(ArticlePipeline::from_config(config, fetcher, ocr, storage)?)
}

async fn check(config: &Config) -> anyhow::Result<()> {
    let mut healthy = true;

    let engine = TesseractEngine::new(&config.ocr.binary);
    match engine.version().await {
        Ok(version) => println!("✅ Tesseract version: {}", version),
        Err(e) => {
            println!("❌ Tesseract unavailable: {}", e);
            healthy = false;
        }
    }
    if healthy {
        match engine.languages().await {
            Ok(langs) if langs.iter().any(|l| *l == config.ocr.language) => {
                println!("✅ Language pack {} installed", config.ocr.language)
            }
            Ok(langs) => {
                println!("⚠️  Language pack {} not installed", config.ocr.language);
                println!("   Available languages: {}", langs.join(", "));
            }
            Err(e) => println!("⚠️  Could not list languages: {}", e),
        }
    }

    match mp_storage::create_storage(config) {
        Ok(None) => println!("ℹ️  Feishu persistence disabled"),
        Ok(Some(storage)) => match storage.ensure_ready().await {
            Ok(()) => println!("✅ Feishu table {} reachable", config.feishu.table_id),
            Err(e) => {
                println!("❌ Feishu check failed: {}", e);
                healthy = false;
            }
        },
        Err(e) => {
            println!("❌ Feishu configuration invalid: {}", e);
            healthy = false;
        }
    }

    if !healthy {
        bail!("installation check failed");
    }
    println!("🎉 All checks passed");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref()).context("loading configuration")?;

    match cli.command {
        Commands::Scrape { url, no_ocr, no_images } => {
            let pipeline = build_pipeline(&config)?;
            let article = pipeline.process(&url, !no_ocr, !no_images).await?;
            println!("{}", report::render(&article, config.content_preview));
        }
        Commands::Save { url, no_ocr, no_images } => {
            let pipeline = build_pipeline(&config)?;
            if !pipeline.storage_enabled() {
                bail!("Feishu persistence is disabled; set FEISHU_ENABLED=true");
            }
            let article = pipeline.process(&url, !no_ocr, !no_images).await?;
            println!("{}", report::render(&article, config.content_preview));
            match pipeline.persist(&article).await {
                Ok(record_id) => println!("✅ Saved to Feishu Bitable (record {})", record_id),
                Err(e) => {
                    warn!("Feishu write failed: {}", e);
                    return Err(e.into());
                }
            }
        }
        Commands::Serve { bind } => {
            if let Some(bind) = bind {
                config.server.bind = bind;
            }
            let pipeline = build_pipeline(&config)?;
            let app = create_app(AppState::new(Arc::new(pipeline)));
            let listener = tokio::net::TcpListener::bind(&config.server.bind)
                .await
                .with_context(|| format!("binding {}", config.server.bind))?;
            info!("🚀 Listening on {}", config.server.bind);
            axum::serve(listener, app).await?;
        }
        Commands::Check => check(&config).await?,
    }

    Ok(())
}
