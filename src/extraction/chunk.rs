use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;
use tracing::{debug, warn};

use crate::error::ChunkFailure;
use crate::extraction::planner::ChunkSpan;
use crate::job::{ExtractionJob, FrameNaming};
use crate::video::{MediaTool, SegmentRequest};

/// A chunk-exclusive temporary directory. Removed on drop if still present.
#[derive(Debug)]
pub struct ScratchDir {
    dir: TempDir,
}

impl ScratchDir {
    pub fn create(chunk_index: usize) -> std::io::Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(&format!("thumbsheet_chunk_{}_", chunk_index))
            .tempdir()?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Remove the directory once its frames have been moved out
    pub fn release(self) {
        remove_scratch_dir(self.dir.path());
    }
}

/// Best-effort removal of an emptied scratch directory.
/// Missing or non-empty directories are not errors.
pub fn remove_scratch_dir(path: &Path) {
    if let Err(e) = std::fs::remove_dir(path) {
        debug!("Scratch directory {} not removed: {}", path.display(), e);
    }
}

/// Frames produced for one chunk, still in its scratch directory.
#[derive(Debug)]
pub struct ChunkFrames {
    pub index: usize,
    /// Sorted in local extraction order
    pub frames: Vec<PathBuf>,
    pub scratch: Option<ScratchDir>,
}

/// Per-chunk result. Failures stay inside the task that produced them.
#[derive(Debug)]
pub enum ChunkOutcome {
    Extracted(ChunkFrames),
    Empty { index: usize, failure: ChunkFailure },
}

impl ChunkOutcome {
    pub fn index(&self) -> usize {
        match self {
            ChunkOutcome::Extracted(frames) => frames.index,
            ChunkOutcome::Empty { index, .. } => *index,
        }
    }

    pub fn frame_count(&self) -> usize {
        match self {
            ChunkOutcome::Extracted(frames) => frames.frames.len(),
            ChunkOutcome::Empty { .. } => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, ChunkOutcome::Empty { .. })
    }

    /// Frames plus the scratch directory that owns them
    pub fn into_frames(self) -> ChunkFrames {
        match self {
            ChunkOutcome::Extracted(frames) => frames,
            ChunkOutcome::Empty { index, .. } => ChunkFrames {
                index,
                frames: Vec::new(),
                scratch: None,
            },
        }
    }
}

/// Runs the decode tool for a single time window.
pub struct ChunkExtractor {
    tool: Arc<dyn MediaTool>,
    source: PathBuf,
    width: u32,
    height: u32,
    ips: f64,
    naming: FrameNaming,
}

impl ChunkExtractor {
    pub fn new(tool: Arc<dyn MediaTool>, job: &ExtractionJob) -> Self {
        Self {
            tool,
            source: job.source.clone(),
            width: job.width,
            height: job.height,
            ips: job.ips,
            naming: job.naming.clone(),
        }
    }

    /// Extract one chunk. Never fails: errors become an empty outcome.
    pub async fn extract(&self, chunk: &ChunkSpan) -> ChunkOutcome {
        match self.try_extract(chunk).await {
            Ok(frames) => {
                debug!(
                    "Chunk {} complete: {} frames extracted (expected ~{})",
                    chunk.index,
                    frames.frames.len(),
                    chunk.expected_frames
                );
                ChunkOutcome::Extracted(frames)
            }
            Err(failure) => {
                warn!(
                    "⚠️ Chunk {} ({:.1}-{:.1}s) produced no frames: {}",
                    chunk.index, chunk.start, chunk.end, failure
                );
                ChunkOutcome::Empty {
                    index: chunk.index,
                    failure,
                }
            }
        }
    }

    async fn try_extract(&self, chunk: &ChunkSpan) -> Result<ChunkFrames, ChunkFailure> {
        let scratch = ScratchDir::create(chunk.index).map_err(ChunkFailure::Scratch)?;

        let request = SegmentRequest {
            source: self.source.clone(),
            chunk_index: chunk.index,
            start: chunk.start,
            duration: chunk.span(),
            width: self.width,
            height: self.height,
            ips: self.ips,
            output_dir: scratch.path().to_path_buf(),
            pattern: self.naming.tool_pattern(),
        };

        debug!(
            "Chunk {} ({:.1}-{:.1}s): Starting extraction",
            chunk.index, chunk.start, chunk.end
        );

        // Anything written before a failure is discarded with the scratch dir
        self.tool.extract_segment(&request).await?;

        let frames = list_frames(scratch.path(), &self.naming)
            .await
            .map_err(ChunkFailure::Listing)?;
        if frames.is_empty() {
            return Err(ChunkFailure::NoFrames);
        }

        Ok(ChunkFrames {
            index: chunk.index,
            frames,
            scratch: Some(scratch),
        })
    }
}

/// Frame files in `dir` that match `naming`, in frame-number order
pub async fn list_frames(dir: &Path, naming: &FrameNaming) -> std::io::Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut frames = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if !entry.file_type().await?.is_file() {
            continue;
        }
        if let Some(number) = naming.parse_number(&path) {
            frames.push((number, path));
        }
    }

    frames.sort();
    Ok(frames.into_iter().map(|(_, path)| path).collect())
}
