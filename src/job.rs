use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{Config, ExtractionConfig, MAX_WORKER_CAP};
use crate::error::{ExtractError, Result};

/// Called with `(completed_chunks, total_chunks)` after each chunk resolves.
pub type ProgressCallback = Arc<dyn Fn(usize, usize) + Send + Sync>;

/// Fixed-width numeric frame file names, e.g. `0001.jpg`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameNaming {
    pub width: usize,
    pub extension: String,
}

impl FrameNaming {
    pub fn new(width: usize, extension: impl Into<String>) -> Self {
        Self {
            width,
            extension: extension.into(),
        }
    }

    /// File name for a 1-based frame number
    pub fn file_name(&self, number: usize) -> String {
        format!("{:0width$}.{}", number, self.extension, width = self.width)
    }

    /// printf-style output pattern handed to the decode tool
    pub fn tool_pattern(&self) -> String {
        format!("%0{}d.{}", self.width, self.extension)
    }

    /// Numeric part of a file name produced with this naming, if it matches
    pub fn parse_number(&self, path: &Path) -> Option<usize> {
        let extension = path.extension()?.to_str()?;
        if !extension.eq_ignore_ascii_case(&self.extension) {
            return None;
        }
        path.file_stem()?.to_str()?.parse().ok()
    }

    pub fn matches(&self, path: &Path) -> bool {
        self.parse_number(path).is_some()
    }
}

impl Default for FrameNaming {
    fn default() -> Self {
        Self::new(4, "jpg")
    }
}

/// One extraction call. Built once, never reused across calls.
#[derive(Clone)]
pub struct ExtractionJob {
    pub source: PathBuf,
    pub output_dir: PathBuf,
    pub width: u32,
    pub height: u32,
    /// Seconds of source timeline per extracted frame
    pub ips: f64,
    pub chunk_duration: f64,
    pub max_workers: usize,
    pub naming: FrameNaming,
    pub progress: Option<ProgressCallback>,
}

impl ExtractionJob {
    pub fn new(source: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self::with_settings(
            source,
            output_dir,
            &ExtractionConfig::default(),
            crate::config::default_max_workers(),
        )
    }

    pub fn from_config(
        source: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        config: &Config,
    ) -> Self {
        Self::with_settings(
            source,
            output_dir,
            &config.extraction,
            config.performance.max_workers,
        )
    }

    fn with_settings(
        source: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        extraction: &ExtractionConfig,
        max_workers: usize,
    ) -> Self {
        Self {
            source: source.into(),
            output_dir: output_dir.into(),
            width: extraction.width,
            height: extraction.height,
            ips: extraction.ips,
            chunk_duration: extraction.chunk_duration,
            max_workers,
            naming: FrameNaming::new(
                extraction.frame_number_width,
                extraction.frame_extension.clone(),
            ),
            progress: None,
        }
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_ips(mut self, ips: f64) -> Self {
        self.ips = ips;
        self
    }

    pub fn with_chunk_duration(mut self, seconds: f64) -> Self {
        self.chunk_duration = seconds;
        self
    }

    pub fn with_max_workers(mut self, workers: usize) -> Self {
        self.max_workers = workers;
        self
    }

    pub fn with_naming(mut self, naming: FrameNaming) -> Self {
        self.naming = naming;
        self
    }

    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(usize, usize) + Send + Sync + 'static,
    {
        self.progress = Some(Arc::new(callback));
        self
    }

    /// Worker limit actually used by the dispatcher
    pub fn worker_limit(&self) -> usize {
        self.max_workers.clamp(1, MAX_WORKER_CAP)
    }

    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(ExtractError::InvalidJob(format!(
                "frame size {}x{} must be positive",
                self.width, self.height
            )));
        }
        if !(self.ips.is_finite() && self.ips > 0.0) {
            return Err(ExtractError::InvalidJob(format!(
                "sampling interval {} must be a positive number of seconds",
                self.ips
            )));
        }
        if !(self.chunk_duration.is_finite() && self.chunk_duration > 0.0) {
            return Err(ExtractError::InvalidJob(format!(
                "chunk duration {} must be a positive number of seconds",
                self.chunk_duration
            )));
        }
        if self.max_workers == 0 {
            return Err(ExtractError::InvalidJob(
                "worker limit must be at least 1".to_string(),
            ));
        }
        if self.naming.width == 0 || self.naming.extension.is_empty() {
            return Err(ExtractError::InvalidJob(
                "frame naming needs a width and an extension".to_string(),
            ));
        }
        Ok(())
    }

    pub(crate) fn report_progress(&self, completed: usize, total: usize) {
        if let Some(ref callback) = self.progress {
            callback(completed, total);
        }
    }
}

impl fmt::Debug for ExtractionJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionJob")
            .field("source", &self.source)
            .field("output_dir", &self.output_dir)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("ips", &self.ips)
            .field("chunk_duration", &self.chunk_duration)
            .field("max_workers", &self.max_workers)
            .field("naming", &self.naming)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}
