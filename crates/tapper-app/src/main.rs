use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{ArgAction, Parser};
use tapper_app::{Backends, PollingLoop};
use tapper_config::{Config, Target};
use tapper_types::{Polarity, Region, TieBreak};
use tokio::signal;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "tapper",
    version,
    about = "Clicks a word or an image whenever it shows up on screen"
)]
struct Args {
    /// Word to find by OCR, matched case-insensitively
    #[arg(long, conflicts_with = "template")]
    text: Option<String>,

    /// Reference image to find by template matching
    #[arg(long)]
    template: Option<PathBuf>,

    /// Search area as left,top,width,height
    #[arg(long)]
    region: Option<Region>,

    /// Seconds between detection passes
    #[arg(long)]
    interval: Option<u64>,

    /// Minimum template score in [0, 1]
    #[arg(long)]
    confidence: Option<f32>,

    /// Path to the tesseract binary
    #[arg(long)]
    tesseract: Option<PathBuf>,

    /// Directory holding tesseract language data
    #[arg(long)]
    tessdata: Option<PathBuf>,

    #[arg(long)]
    lang: Option<String>,

    /// light_on_dark or dark_on_light
    #[arg(long)]
    polarity: Option<Polarity>,

    /// reading_order or engine_order
    #[arg(long)]
    tie_break: Option<TieBreak>,

    #[arg(long)]
    click_pause_ms: Option<u64>,

    /// Keep clicking even with the cursor parked in a screen corner
    #[arg(long, action = ArgAction::SetTrue)]
    no_failsafe: bool,

    /// JSON profile, flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log as JSON lines
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,

    /// Seconds to wait before the first pass
    #[arg(long, default_value_t = 3)]
    delay: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    init_tracing(args.json);

    let config = build_config(&args)?;
    config.validate().context("Invalid configuration")?;

    if args.delay > 0 {
        tracing::info!("Starting in {} seconds", args.delay);
        tokio::time::sleep(Duration::from_secs(args.delay)).await;
    }

    let (mut polling, events) = PollingLoop::new();
    polling.start(&config, Backends::system(&config))?;

    let printer = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            println!("{event}");
        }
    });

    let stop = polling.stop_handle();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown requested");
            stop.stop();
        }
    });

    let result = polling.join().await;

    // Closes the event channel so the printer drains and exits
    drop(polling);
    if let Err(e) = printer.await {
        tracing::error!("Event printer panicked: {e}");
    }

    match result {
        Err(e) if !e.is_user_abort() => Err(e.into()),
        _ => Ok(()),
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Profile or defaults, then environment, then flags
fn build_config(args: &Args) -> anyhow::Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::from_json_file(path)?,
        None => Config::default(),
    };
    config.apply_overrides(|key| std::env::var(key).ok());

    if let Some(text) = &args.text {
        config.target = Some(Target::Text(text.clone()));
    }
    if let Some(path) = &args.template {
        config.target = Some(Target::Template(path.clone()));
    }
    if let Some(region) = args.region {
        config.region = Some(region);
    }
    if let Some(interval) = args.interval {
        config.polling.interval_secs = interval;
    }
    if let Some(confidence) = args.confidence {
        config.matcher.confidence = confidence;
    }
    if let Some(path) = &args.tesseract {
        config.ocr.engine_path = path.clone();
    }
    if let Some(dir) = &args.tessdata {
        config.ocr.tessdata_dir = Some(dir.clone());
    }
    if let Some(lang) = &args.lang {
        config.ocr.language = lang.clone();
    }
    if let Some(polarity) = args.polarity {
        config.ocr.polarity = polarity;
    }
    if let Some(tie_break) = args.tie_break {
        config.ocr.tie_break = tie_break;
    }
    if let Some(pause) = args.click_pause_ms {
        config.click.pause_ms = pause;
    }
    if args.no_failsafe {
        config.click.failsafe = false;
    }

    Ok(config)
}
