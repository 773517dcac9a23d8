use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::error::{ExtractError, Result};
use crate::extraction::chunk::{list_frames, ChunkExtractor};
use crate::extraction::dispatcher::Dispatcher;
use crate::extraction::merge::{clear_frames, merge_chunks};
use crate::extraction::planner::plan_chunks;
use crate::extraction::streaming::{FrameStream, FrameTransform};
use crate::job::ExtractionJob;
use crate::video::{MediaTool, SequentialRequest};

pub const REPORT_FILE_NAME: &str = "extraction_report.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StrategyKind {
    Parallel,
    Sequential,
}

/// Summary of one extraction call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionReport {
    pub strategy: StrategyKind,
    pub source: PathBuf,
    pub output_dir: PathBuf,
    /// Probed duration; the sequential path never probes
    pub duration: Option<f64>,
    pub chunks: usize,
    pub failed_chunks: usize,
    /// Frames now in `output_dir`. This is the authoritative result.
    pub frames: usize,
    pub started_at: DateTime<Utc>,
    pub elapsed_secs: f64,
}

impl ExtractionReport {
    /// Write the report as JSON into `dir`
    pub async fn save(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(REPORT_FILE_NAME);
        let json_data = serde_json::to_string_pretty(self)?;
        tokio::fs::write(&path, json_data)
            .await
            .map_err(|e| ExtractError::io(&path, e))?;
        info!("💾 Report saved to: {}", path.display());
        Ok(path)
    }
}

/// A way of turning a video into a numbered frame directory.
#[async_trait]
pub trait ExtractionStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    async fn extract(&self, job: &ExtractionJob) -> Result<ExtractionReport>;
}

/// Probe, plan, extract chunks concurrently, merge.
pub struct ParallelExtractor {
    tool: Arc<dyn MediaTool>,
}

impl ParallelExtractor {
    pub fn new(tool: Arc<dyn MediaTool>) -> Self {
        Self { tool }
    }

    async fn probe(&self, job: &ExtractionJob) -> Result<f64> {
        self.tool.probe_duration(&job.source).await.map_err(|e| {
            error!("Failed to get video duration: {}", e);
            ExtractError::Probe(e)
        })
    }

    /// Start extraction and hand frames out as soon as they are in order
    pub async fn stream(
        &self,
        job: &ExtractionJob,
        transform: Option<FrameTransform>,
    ) -> Result<FrameStream> {
        job.validate()?;
        info!("🚀 Starting streaming frame extraction: {}", job.source.display());

        let duration = self.probe(job).await?;
        let chunks = plan_chunks(duration, job.chunk_duration, job.ips);
        info!(
            "Video duration: {:.2}s, streaming {} chunks",
            duration,
            chunks.len()
        );

        tokio::fs::create_dir_all(&job.output_dir)
            .await
            .map_err(|e| ExtractError::io(&job.output_dir, e))?;
        clear_frames(&job.output_dir, &job.naming).await?;

        let dispatcher = Dispatcher::new(
            ChunkExtractor::new(Arc::clone(&self.tool), job),
            job.worker_limit(),
        );
        let handle = dispatcher.dispatch(chunks, job.progress.clone());
        Ok(FrameStream::new(
            handle,
            job.output_dir.clone(),
            job.naming.clone(),
            transform,
            duration,
        ))
    }
}

#[async_trait]
impl ExtractionStrategy for ParallelExtractor {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Parallel
    }

    async fn extract(&self, job: &ExtractionJob) -> Result<ExtractionReport> {
        job.validate()?;
        let started = Instant::now();
        let started_at = Utc::now();
        info!("🚀 Starting parallel frame extraction: {}", job.source.display());

        let duration = self.probe(job).await?;
        let chunks = plan_chunks(duration, job.chunk_duration, job.ips);
        info!(
            "Video duration: {:.2}s, processing in {} chunks",
            duration,
            chunks.len()
        );

        // Frames from an earlier run would survive past the new total
        clear_frames(&job.output_dir, &job.naming).await?;

        let chunk_count = chunks.len();
        let dispatcher = Dispatcher::new(
            ChunkExtractor::new(Arc::clone(&self.tool), job),
            job.worker_limit(),
        );
        let outcomes = dispatcher.dispatch(chunks, job.progress.clone()).collect().await;
        let failed_chunks = outcomes.iter().filter(|o| o.is_empty()).count();
        if failed_chunks > 0 {
            warn!("{} of {} chunks produced no frames", failed_chunks, chunk_count);
        }

        let frames = merge_chunks(outcomes, &job.output_dir, &job.naming).await?;
        info!("✅ Parallel extraction complete: {} frames", frames);

        Ok(ExtractionReport {
            strategy: StrategyKind::Parallel,
            source: job.source.clone(),
            output_dir: job.output_dir.clone(),
            duration: Some(duration),
            chunks: chunk_count,
            failed_chunks,
            frames,
            started_at,
            elapsed_secs: started.elapsed().as_secs_f64(),
        })
    }
}

/// One decode-tool run over the whole file, straight into the destination.
pub struct SequentialExtractor {
    tool: Arc<dyn MediaTool>,
}

impl SequentialExtractor {
    pub fn new(tool: Arc<dyn MediaTool>) -> Self {
        Self { tool }
    }
}

#[async_trait]
impl ExtractionStrategy for SequentialExtractor {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Sequential
    }

    async fn extract(&self, job: &ExtractionJob) -> Result<ExtractionReport> {
        job.validate()?;
        let started = Instant::now();
        let started_at = Utc::now();

        tokio::fs::create_dir_all(&job.output_dir)
            .await
            .map_err(|e| ExtractError::io(&job.output_dir, e))?;
        clear_frames(&job.output_dir, &job.naming).await?;

        let request = SequentialRequest {
            source: job.source.clone(),
            width: job.width,
            height: job.height,
            ips: job.ips,
            output_dir: job.output_dir.clone(),
            pattern: job.naming.tool_pattern(),
        };
        self.tool
            .extract_all(&request)
            .await
            .map_err(ExtractError::Sequential)?;
        job.report_progress(1, 1);

        let frames = list_frames(&job.output_dir, &job.naming)
            .await
            .map_err(|e| ExtractError::io(&job.output_dir, e))?
            .len();
        info!("✅ Sequential extraction complete: {} frames", frames);

        Ok(ExtractionReport {
            strategy: StrategyKind::Sequential,
            source: job.source.clone(),
            output_dir: job.output_dir.clone(),
            duration: None,
            chunks: 1,
            failed_chunks: 0,
            frames,
            started_at,
            elapsed_secs: started.elapsed().as_secs_f64(),
        })
    }
}

/// Pick parallel extraction when it is wanted and the probe tool answers,
/// otherwise fall back to the sequential path.
pub async fn select_strategy(
    tool: Arc<dyn MediaTool>,
    prefer_parallel: bool,
) -> Box<dyn ExtractionStrategy> {
    if !prefer_parallel {
        return Box::new(SequentialExtractor::new(tool));
    }

    if tool.capabilities().await.probe {
        Box::new(ParallelExtractor::new(tool))
    } else {
        warn!("Duration probe tool unavailable, falling back to sequential extraction");
        Box::new(SequentialExtractor::new(tool))
    }
}

/// High-level entry point. Never fails just because parallel extraction
/// is unavailable.
pub async fn extract_frames(
    job: &ExtractionJob,
    tool: Arc<dyn MediaTool>,
    prefer_parallel: bool,
) -> Result<ExtractionReport> {
    let strategy = select_strategy(tool, prefer_parallel).await;
    strategy.extract(job).await
}

/// Batch parallel extraction; returns the number of frames written.
pub async fn extract_parallel(job: &ExtractionJob, tool: Arc<dyn MediaTool>) -> Result<usize> {
    let report = ParallelExtractor::new(tool).extract(job).await?;
    Ok(report.frames)
}

/// Streaming extraction. Has no sequential fallback, so a missing probe
/// tool is an error.
pub async fn stream_frames(
    job: &ExtractionJob,
    tool: Arc<dyn MediaTool>,
    transform: Option<FrameTransform>,
) -> Result<FrameStream> {
    if !tool.capabilities().await.probe {
        return Err(ExtractError::MissingCapability {
            capability: "ffprobe".to_string(),
            operation: "streaming extraction".to_string(),
            hint: "install FFmpeg (which ships ffprobe) or set THUMBSHEET_FFPROBE".to_string(),
        });
    }
    ParallelExtractor::new(tool).stream(job, transform).await
}
