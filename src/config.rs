use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{ExtractError, Result};

/// Upper bound on concurrent decode-tool processes, whatever is requested.
pub const MAX_WORKER_CAP: usize = 64;

/// Configuration for thumbnail extraction and sprite generation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Frame extraction settings
    pub extraction: ExtractionConfig,

    /// Concurrency settings
    pub performance: PerformanceConfig,

    /// Sprite sheet layout
    pub sprite: SpriteConfig,

    /// External tool locations
    pub tools: ToolConfig,

    /// Output and logging settings
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Thumbnail width in pixels
    pub width: u32,

    /// Thumbnail height in pixels
    pub height: u32,

    /// Seconds of source timeline per extracted frame
    pub ips: f64,

    /// Length of one parallel extraction window in seconds
    pub chunk_duration: f64,

    /// Frame file extension
    pub frame_extension: String,

    /// Zero-padded width of frame numbers
    pub frame_number_width: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    /// Maximum number of concurrent decode processes
    pub max_workers: usize,

    /// Use chunked parallel extraction when the probe tool is available
    pub prefer_parallel: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpriteConfig {
    pub rows: u32,
    pub columns: u32,
    /// Montage background colour
    pub background: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    pub ffmpeg: String,
    pub ffprobe: String,
    pub montage: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Log level used when RUST_LOG is not set
    pub log_level: String,

    /// Write extraction_report.json next to the frames
    pub save_report: bool,
}

/// Default worker count: a small multiple of the available cores, capped.
pub fn default_max_workers() -> usize {
    (num_cpus::get() + 4).min(8)
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            width: 512,
            height: 288,
            ips: 1.0,
            chunk_duration: 10.0,
            frame_extension: "jpg".to_string(),
            frame_number_width: 4,
        }
    }
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            prefer_parallel: true,
        }
    }
}

impl Default for SpriteConfig {
    fn default() -> Self {
        Self {
            rows: 30,
            columns: 30,
            background: "#336699".to_string(),
        }
    }
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            ffmpeg: "ffmpeg".to_string(),
            ffprobe: "ffprobe".to_string(),
            montage: "montage".to_string(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            save_report: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            extraction: ExtractionConfig::default(),
            performance: PerformanceConfig::default(),
            sprite: SpriteConfig::default(),
            tools: ToolConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the first config file found, then apply
    /// environment overrides. Falls back to defaults when no file exists.
    pub fn load() -> Result<Self> {
        let config_paths = ["thumbsheet.toml", "config/thumbsheet.toml"];

        let mut config = None;
        for path in &config_paths {
            if Path::new(path).exists() {
                config = Some(Self::from_file(path)?);
                break;
            }
        }

        let mut config = config.unwrap_or_default();
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from an explicit TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let config_str =
            std::fs::read_to_string(path).map_err(|e| ExtractError::io(path, e))?;
        let config: Config = toml::from_str(&config_str).map_err(|e| {
            ExtractError::Configuration(format!("failed to parse {}: {}", path.display(), e))
        })?;
        tracing::info!("📄 Loaded configuration from: {}", path.display());
        Ok(config)
    }

    /// Override fields from THUMBSHEET_* environment variables
    pub fn apply_env(&mut self) {
        if let Ok(workers) = std::env::var("THUMBSHEET_WORKERS") {
            match workers.parse() {
                Ok(workers) => self.performance.max_workers = workers,
                Err(_) => tracing::warn!("Ignoring invalid THUMBSHEET_WORKERS={}", workers),
            }
        }

        if let Ok(ips) = std::env::var("THUMBSHEET_IPS") {
            match ips.parse() {
                Ok(ips) => self.extraction.ips = ips,
                Err(_) => tracing::warn!("Ignoring invalid THUMBSHEET_IPS={}", ips),
            }
        }

        if let Ok(chunk) = std::env::var("THUMBSHEET_CHUNK_DURATION") {
            match chunk.parse() {
                Ok(chunk) => self.extraction.chunk_duration = chunk,
                Err(_) => tracing::warn!("Ignoring invalid THUMBSHEET_CHUNK_DURATION={}", chunk),
            }
        }

        if let Ok(ffmpeg) = std::env::var("THUMBSHEET_FFMPEG") {
            self.tools.ffmpeg = ffmpeg;
        }

        if let Ok(ffprobe) = std::env::var("THUMBSHEET_FFPROBE") {
            self.tools.ffprobe = ffprobe;
        }

        if let Ok(log_level) = std::env::var("THUMBSHEET_LOG_LEVEL") {
            self.output.log_level = log_level;
        }
    }

    /// Save configuration to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let config_str = toml::to_string_pretty(self)
            .map_err(|e| ExtractError::Configuration(e.to_string()))?;
        std::fs::write(path, config_str).map_err(|e| ExtractError::io(path, e))?;
        tracing::info!("💾 Configuration saved to: {}", path.display());
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let extraction = &self.extraction;
        if extraction.width == 0 || extraction.height == 0 {
            return Err(ExtractError::Configuration(
                "width and height must be greater than 0".to_string(),
            ));
        }

        if !(extraction.ips.is_finite() && extraction.ips > 0.0) {
            return Err(ExtractError::Configuration(
                "ips must be a positive number of seconds".to_string(),
            ));
        }

        if !(extraction.chunk_duration.is_finite() && extraction.chunk_duration > 0.0) {
            return Err(ExtractError::Configuration(
                "chunk_duration must be a positive number of seconds".to_string(),
            ));
        }

        if extraction.frame_extension.is_empty() || extraction.frame_number_width == 0 {
            return Err(ExtractError::Configuration(
                "frame naming needs an extension and a non-zero number width".to_string(),
            ));
        }

        if self.performance.max_workers == 0 {
            return Err(ExtractError::Configuration(
                "max_workers must be greater than 0".to_string(),
            ));
        }

        if self.sprite.rows == 0 || self.sprite.columns == 0 {
            return Err(ExtractError::Configuration(
                "sprite grid needs at least one row and one column".to_string(),
            ));
        }

        Ok(())
    }

    /// Get runtime configuration summary
    pub fn summary(&self) -> String {
        format!(
            "Thumbsheet Configuration:\n\
            - Thumbnail: {}x{} every {}s\n\
            - Chunk Duration: {}s\n\
            - Workers: {}\n\
            - Parallel Preferred: {}\n\
            - Sprite Grid: {}x{}",
            self.extraction.width,
            self.extraction.height,
            self.extraction.ips,
            self.extraction.chunk_duration,
            self.performance.max_workers,
            self.performance.prefer_parallel,
            self.sprite.columns,
            self.sprite.rows,
        )
    }
}

/// Configuration builder for programmatic config creation
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.config.performance.max_workers = workers;
        self
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.config.extraction.width = width;
        self.config.extraction.height = height;
        self
    }

    pub fn with_ips(mut self, ips: f64) -> Self {
        self.config.extraction.ips = ips;
        self
    }

    pub fn with_chunk_duration(mut self, seconds: f64) -> Self {
        self.config.extraction.chunk_duration = seconds;
        self
    }

    pub fn with_grid(mut self, rows: u32, columns: u32) -> Self {
        self.config.sprite.rows = rows;
        self.config.sprite.columns = columns;
        self
    }

    pub fn prefer_parallel(mut self, enable: bool) -> Self {
        self.config.performance.prefer_parallel = enable;
        self
    }

    pub fn save_report(mut self, enable: bool) -> Self {
        self.config.output.save_report = enable;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
