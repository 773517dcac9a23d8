use anyhow::{anyhow, Result};
use clap::{Arg, ArgAction, Command};
use std::path::PathBuf;
use std::sync::Arc;
use chrono::Utc;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use thumbsheet::{Config, ExtractionReport, FfmpegTool, MediaTool, SpriteSheet, StrategyKind};

fn cli() -> Command {
    Command::new("thumbsheet")
        .version("0.1.0")
        .author("TigreRoll")
        .about("Extract video thumbnails in parallel and build sprite sheets with WebVTT tracks")
        .arg(
            Arg::new("input")
                .short('i')
                .long("input")
                .value_name("FILE")
                .help("Video file to process")
                .required(true),
        )
        .arg(
            Arg::new("output-dir")
                .short('o')
                .long("output-dir")
                .value_name("DIR")
                .help("Directory for extracted thumbnails")
                .default_value("./thumbnails"),
        )
        .arg(
            Arg::new("sprite")
                .long("sprite")
                .value_name("FILE")
                .help("Composite the thumbnails into this sprite sheet"),
        )
        .arg(
            Arg::new("webvtt")
                .long("webvtt")
                .value_name("FILE")
                .help("Write a WebVTT track for the sprite sheet")
                .requires("sprite"),
        )
        .arg(
            Arg::new("width")
                .long("width")
                .value_name("PX")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new("height")
                .long("height")
                .value_name("PX")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new("ips")
                .long("ips")
                .value_name("SECONDS")
                .help("Seconds of video per thumbnail")
                .value_parser(clap::value_parser!(f64)),
        )
        .arg(
            Arg::new("chunk-duration")
                .long("chunk-duration")
                .value_name("SECONDS")
                .help("Length of each parallel extraction window")
                .value_parser(clap::value_parser!(f64)),
        )
        .arg(
            Arg::new("workers")
                .short('w')
                .long("workers")
                .value_name("NUM")
                .help("Number of concurrent ffmpeg processes")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("TOML configuration file"),
        )
        .arg(
            Arg::new("sequential")
                .long("sequential")
                .help("Use a single ffmpeg pass instead of parallel chunks")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("stream")
                .long("stream")
                .help("Report frames as soon as they are available")
                .action(ArgAction::SetTrue)
                .conflicts_with("sequential"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(ArgAction::SetTrue),
        )
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();

    let mut config = match matches.get_one::<String>("config") {
        Some(path) => {
            let mut config = Config::from_file(path)?;
            config.apply_env();
            config
        }
        None => Config::load().unwrap_or_else(|e| {
            eprintln!("Failed to load config, using defaults: {}", e);
            Config::default()
        }),
    };

    let level = if matches.get_flag("verbose") {
        "debug".to_string()
    } else {
        config.output.log_level.clone()
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("thumbsheet={},warn", level)));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Some(&width) = matches.get_one::<u32>("width") {
        config.extraction.width = width;
    }
    if let Some(&height) = matches.get_one::<u32>("height") {
        config.extraction.height = height;
    }
    if let Some(&ips) = matches.get_one::<f64>("ips") {
        config.extraction.ips = ips;
    }
    if let Some(&chunk) = matches.get_one::<f64>("chunk-duration") {
        config.extraction.chunk_duration = chunk;
    }
    if let Some(&workers) = matches.get_one::<usize>("workers") {
        config.performance.max_workers = workers;
    }
    if matches.get_flag("sequential") {
        config.performance.prefer_parallel = false;
    }
    config.validate()?;

    let input = PathBuf::from(
        matches
            .get_one::<String>("input")
            .ok_or_else(|| anyhow!("--input is required"))?,
    );
    let output_dir = PathBuf::from(
        matches
            .get_one::<String>("output-dir")
            .ok_or_else(|| anyhow!("--output-dir is required"))?,
    );

    if !input.is_file() {
        return Err(anyhow!("Input video not found: {}", input.display()));
    }

    info!("🚀 Thumbsheet starting...");
    info!("📹 Input: {}", input.display());
    info!("📂 Output directory: {}", output_dir.display());
    info!("{}", config.summary());

    let tool: Arc<dyn MediaTool> = Arc::new(FfmpegTool::from_config(&config.tools));
    let start_time = std::time::Instant::now();

    let mut sheet = SpriteSheet::new(&input, &output_dir, config.clone(), tool)?
        .with_progress(|done, total| info!("Progress: {}/{} chunks", done, total));

    let stale = sheet.count_frames();
    if stale > 0 {
        warn!(
            "{} already holds {} frames from an earlier run; they will be removed",
            output_dir.display(),
            stale
        );
    }

    let report = if matches.get_flag("stream") {
        stream_thumbs(&sheet).await?
    } else {
        sheet.generate_thumbs(config.performance.prefer_parallel).await?
    };
    if config.output.save_report {
        report.save(&output_dir).await?;
    }

    if let Some(sprite) = matches.get_one::<String>("sprite") {
        sheet.generate_sprite(sprite).await?;
        if let Some(webvtt) = matches.get_one::<String>("webvtt") {
            sheet.generate_webvtt(webvtt).await?;
        }
    }

    info!(
        "🎉 {:?} extraction produced {} frames in {:.2}s",
        report.strategy,
        report.frames,
        start_time.elapsed().as_secs_f64()
    );
    if report.failed_chunks > 0 {
        warn!("❌ {} chunks produced no frames", report.failed_chunks);
    }

    Ok(())
}

/// Drain a streaming extraction, logging frames as they land in order
async fn stream_thumbs(sheet: &SpriteSheet) -> Result<ExtractionReport> {
    let started = std::time::Instant::now();
    let started_at = Utc::now();

    let mut frames = sheet.extract_streaming(None).await?;
    let mut count = 0;
    while let Some(frame) = frames.next().await {
        let frame = frame?;
        debug!("🖼️ Frame {}: {}", frame.number, frame.path.display());
        count += 1;
    }

    Ok(ExtractionReport {
        strategy: StrategyKind::Parallel,
        source: sheet.video_path().to_path_buf(),
        output_dir: sheet.thumbnail_dir().to_path_buf(),
        duration: Some(frames.duration()),
        chunks: frames.total_chunks(),
        failed_chunks: frames.failed_chunks(),
        frames: count,
        started_at,
        elapsed_secs: started.elapsed().as_secs_f64(),
    })
}
