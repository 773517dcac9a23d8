use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::ToolConfig;
use crate::error::{ProbeError, ToolFailure};

/// One chunk's worth of work for the decode tool.
#[derive(Debug, Clone)]
pub struct SegmentRequest {
    pub source: PathBuf,
    pub chunk_index: usize,
    /// Seek offset in seconds
    pub start: f64,
    /// Seconds of timeline to process after `start`
    pub duration: f64,
    pub width: u32,
    pub height: u32,
    pub ips: f64,
    pub output_dir: PathBuf,
    /// printf-style file pattern, e.g. `%04d.jpg`
    pub pattern: String,
}

/// Whole-file extraction used by the sequential strategy.
#[derive(Debug, Clone)]
pub struct SequentialRequest {
    pub source: PathBuf,
    pub width: u32,
    pub height: u32,
    pub ips: f64,
    pub output_dir: PathBuf,
    pub pattern: String,
}

/// Which external tools answered when asked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolCapabilities {
    pub probe: bool,
    pub decode: bool,
}

/// The external media tooling the extraction pipeline drives.
#[async_trait]
pub trait MediaTool: Send + Sync {
    /// Total media duration in seconds
    async fn probe_duration(&self, source: &Path) -> Result<f64, ProbeError>;

    /// Extract one time window into `request.output_dir`
    async fn extract_segment(&self, request: &SegmentRequest) -> Result<(), ToolFailure>;

    /// Extract the whole file in one invocation
    async fn extract_all(&self, request: &SequentialRequest) -> Result<(), ToolFailure>;

    async fn capabilities(&self) -> ToolCapabilities;
}

/// `ffprobe`/`ffmpeg` driven as subprocesses
#[derive(Debug, Clone)]
pub struct FfmpegTool {
    ffmpeg: String,
    ffprobe: String,
}

impl FfmpegTool {
    pub fn new() -> Self {
        Self::from_config(&ToolConfig::default())
    }

    pub fn from_config(tools: &ToolConfig) -> Self {
        Self {
            ffmpeg: tools.ffmpeg.clone(),
            ffprobe: tools.ffprobe.clone(),
        }
    }

    /// Arguments for a single chunk, seeking before the input for speed
    pub fn segment_args(&self, request: &SegmentRequest) -> Vec<String> {
        let output = request.output_dir.join(&request.pattern);
        vec![
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            "-ss".to_string(),
            seconds_arg(request.start),
            "-t".to_string(),
            seconds_arg(request.duration),
            "-i".to_string(),
            request.source.to_string_lossy().into_owned(),
            "-r".to_string(),
            sampling_rate(request.ips),
            "-vf".to_string(),
            format!("scale={}:{}", request.width, request.height),
            "-y".to_string(),
            output.to_string_lossy().into_owned(),
        ]
    }

    pub fn sequential_args(&self, request: &SequentialRequest) -> Vec<String> {
        let output = request.output_dir.join(&request.pattern);
        vec![
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            "-i".to_string(),
            request.source.to_string_lossy().into_owned(),
            "-r".to_string(),
            sampling_rate(request.ips),
            "-vf".to_string(),
            format!("scale={}:{}", request.width, request.height),
            "-y".to_string(),
            output.to_string_lossy().into_owned(),
        ]
    }

    pub fn probe_args(source: &Path) -> Vec<String> {
        vec![
            "-v".to_string(),
            "error".to_string(),
            "-show_entries".to_string(),
            "format=duration".to_string(),
            "-of".to_string(),
            "json".to_string(),
            source.to_string_lossy().into_owned(),
        ]
    }
}

impl Default for FfmpegTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaTool for FfmpegTool {
    async fn probe_duration(&self, source: &Path) -> Result<f64, ProbeError> {
        if !source.is_file() {
            return Err(ProbeError::MissingSource(source.to_path_buf()));
        }

        let stdout = run_tool(&self.ffprobe, &Self::probe_args(source)).await?;
        let duration = parse_duration(&stdout)?;
        debug!("Video duration: {:.2}s", duration);
        Ok(duration)
    }

    async fn extract_segment(&self, request: &SegmentRequest) -> Result<(), ToolFailure> {
        run_tool(&self.ffmpeg, &self.segment_args(request)).await?;
        Ok(())
    }

    async fn extract_all(&self, request: &SequentialRequest) -> Result<(), ToolFailure> {
        info!("🎞️ Extracting frames sequentially from {}", request.source.display());
        run_tool(&self.ffmpeg, &self.sequential_args(request)).await?;
        Ok(())
    }

    async fn capabilities(&self) -> ToolCapabilities {
        ToolCapabilities {
            probe: tool_available(&self.ffprobe).await,
            decode: tool_available(&self.ffmpeg).await,
        }
    }
}

/// Timestamp argument with no rounding, so adjacent chunk windows meet exactly
pub fn seconds_arg(seconds: f64) -> String {
    format!("{}", seconds)
}

/// `-r` value: one frame per `ips` seconds
pub fn sampling_rate(ips: f64) -> String {
    format!("1/{}", ips)
}

/// Pull `format.duration` out of ffprobe's JSON output
pub fn parse_duration(json: &str) -> Result<f64, ProbeError> {
    let probe: serde_json::Value = serde_json::from_str(json)?;
    let raw = &probe["format"]["duration"];

    let duration = match raw {
        serde_json::Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| ProbeError::InvalidDuration(s.clone()))?,
        serde_json::Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| ProbeError::InvalidDuration(n.to_string()))?,
        serde_json::Value::Null => return Err(ProbeError::MissingDuration),
        other => return Err(ProbeError::InvalidDuration(other.to_string())),
    };

    if !duration.is_finite() {
        return Err(ProbeError::InvalidDuration(duration.to_string()));
    }
    Ok(duration)
}

/// Run a tool to completion, returning stdout on success.
/// The child is killed if the future is dropped first.
pub(crate) async fn run_tool(program: &str, args: &[String]) -> Result<String, ToolFailure> {
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|source| ToolFailure::Spawn {
            program: program.to_string(),
            source,
        })?;

    if !output.status.success() {
        return Err(ToolFailure::Exited {
            program: program.to_string(),
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Whether `program -version` can be launched and exits cleanly
pub async fn tool_available(program: &str) -> bool {
    Command::new(program)
        .arg("-version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .status()
        .await
        .map(|status| status.success())
        .unwrap_or(false)
}
