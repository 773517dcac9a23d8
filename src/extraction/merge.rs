//! Reassembly of per-chunk frames into one contiguous sequence.
//!
//! Frames live in two numbering spaces. Inside a scratch directory a
//! frame is numbered `1..=n` by the decode tool (local order). In the
//! destination it gets a global number `1..=total`. [`FrameNumbering`]
//! owns the mapping between the two: each chunk, taken in index order,
//! is assigned an offset equal to the number of frames before it, and
//! local position `k` (0-based) maps to `offset + k + 1`.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{ExtractError, Result};
use crate::extraction::chunk::{list_frames, ChunkOutcome};
use crate::job::FrameNaming;

/// Local-to-global frame number mapping, built chunk by chunk.
#[derive(Debug, Default, Clone)]
pub struct FrameNumbering {
    offsets: Vec<usize>,
    assigned: usize,
}

impl FrameNumbering {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the next chunk in order; returns its position
    pub fn push_chunk(&mut self, frame_count: usize) -> usize {
        self.offsets.push(self.assigned);
        self.assigned += frame_count;
        self.offsets.len() - 1
    }

    /// Frames numbered before the chunk at `position`
    pub fn offset(&self, position: usize) -> Option<usize> {
        self.offsets.get(position).copied()
    }

    /// 1-based global number of the `local_index`-th (0-based) frame of a chunk
    pub fn global_number(&self, position: usize, local_index: usize) -> usize {
        self.offsets[position] + local_index + 1
    }

    pub fn total(&self) -> usize {
        self.assigned
    }
}

/// Move every frame into `output_dir`, ordered by chunk index then local
/// order, and return how many were moved.
pub async fn merge_chunks(
    mut outcomes: Vec<ChunkOutcome>,
    output_dir: &Path,
    naming: &FrameNaming,
) -> Result<usize> {
    tokio::fs::create_dir_all(output_dir)
        .await
        .map_err(|e| ExtractError::io(output_dir, e))?;

    // Completion order is irrelevant from here on
    outcomes.sort_by_key(ChunkOutcome::index);

    let mut numbering = FrameNumbering::new();
    for outcome in outcomes {
        let chunk = outcome.into_frames();
        let frames = existing_frames(chunk.frames).await;
        let position = numbering.push_chunk(frames.len());

        for (local_index, frame) in frames.iter().enumerate() {
            let number = numbering.global_number(position, local_index);
            relocate(frame, &output_dir.join(naming.file_name(number))).await?;
        }

        if let Some(scratch) = chunk.scratch {
            scratch.release();
        }
        debug!(
            "Merged chunk {}: {} frames at offset {}",
            chunk.index,
            frames.len(),
            numbering.offset(position).unwrap_or_default()
        );
    }

    info!(
        "📦 Merged {} frames into {}",
        numbering.total(),
        output_dir.display()
    );
    Ok(numbering.total())
}

/// Drop frames that disappeared from scratch so numbering stays gapless
pub(crate) async fn existing_frames(frames: Vec<PathBuf>) -> Vec<PathBuf> {
    let mut kept = Vec::with_capacity(frames.len());
    for frame in frames {
        if tokio::fs::try_exists(&frame).await.unwrap_or(false) {
            kept.push(frame);
        } else {
            debug!("Frame {} vanished before merge, skipping", frame.display());
        }
    }
    kept
}

/// Move `from` to `to`; copies across filesystems when rename cannot.
pub async fn relocate(from: &Path, to: &Path) -> Result<()> {
    if tokio::fs::rename(from, to).await.is_ok() {
        return Ok(());
    }

    tokio::fs::copy(from, to)
        .await
        .map_err(|source| ExtractError::Relocate {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
            source,
        })?;
    tokio::fs::remove_file(from)
        .await
        .map_err(|e| ExtractError::io(from, e))?;
    Ok(())
}

/// Delete frames left in `dir` by an earlier run so the new sequence is
/// the only one there. Other files are left alone. Returns how many went.
pub async fn clear_frames(dir: &Path, naming: &FrameNaming) -> Result<usize> {
    let frames = match list_frames(dir, naming).await {
        Ok(frames) => frames,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(ExtractError::io(dir, e)),
    };

    for frame in &frames {
        tokio::fs::remove_file(frame)
            .await
            .map_err(|e| ExtractError::io(frame, e))?;
    }
    if !frames.is_empty() {
        info!(
            "🧹 Removed {} stale frames from {}",
            frames.len(),
            dir.display()
        );
    }
    Ok(frames.len())
}
