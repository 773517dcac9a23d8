use std::collections::{BTreeMap, VecDeque};
use std::path::{Path, PathBuf};

use futures::stream::{self, Stream};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::extraction::chunk::{ChunkOutcome, ScratchDir};
use crate::extraction::dispatcher::DispatchHandle;
use crate::extraction::merge::{existing_frames, relocate, FrameNumbering};
use crate::job::FrameNaming;

/// Per-frame hook: `(frame_path, global_frame_number) -> path to yield`
pub type FrameTransform = Box<dyn FnMut(&Path, usize) -> PathBuf + Send>;

/// A frame surfaced by [`FrameStream`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamedFrame {
    pub path: PathBuf,
    /// 1-based global frame number
    pub number: usize,
}

/// Frames in global order, available as soon as every earlier chunk is done.
///
/// Chunks that finish ahead of the cursor wait in a buffer until the gap
/// closes. Each emitted frame is moved to its final name in the output
/// directory before it is handed to the transform, so the on-disk layout
/// matches a batch run. Dropping the stream aborts outstanding chunks.
pub struct FrameStream {
    handle: DispatchHandle,
    output_dir: PathBuf,
    naming: FrameNaming,
    transform: Option<FrameTransform>,
    /// Completed chunks whose index is ahead of `cursor`
    pending: BTreeMap<usize, ChunkOutcome>,
    /// Next chunk index to emit
    cursor: usize,
    numbering: FrameNumbering,
    current: VecDeque<PathBuf>,
    current_position: usize,
    current_local: usize,
    current_scratch: Option<ScratchDir>,
    duration: f64,
    failed_chunks: usize,
    failed: bool,
}

impl FrameStream {
    pub(crate) fn new(
        handle: DispatchHandle,
        output_dir: PathBuf,
        naming: FrameNaming,
        transform: Option<FrameTransform>,
        duration: f64,
    ) -> Self {
        Self {
            handle,
            output_dir,
            naming,
            transform,
            pending: BTreeMap::new(),
            cursor: 0,
            numbering: FrameNumbering::new(),
            current: VecDeque::new(),
            current_position: 0,
            current_local: 0,
            current_scratch: None,
            duration,
            failed_chunks: 0,
            failed: false,
        }
    }

    pub fn total_chunks(&self) -> usize {
        self.handle.total()
    }

    /// Probed source duration in seconds
    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Chunks replayed so far that produced no frames
    pub fn failed_chunks(&self) -> usize {
        self.failed_chunks
    }

    /// Frames emitted so far
    pub fn emitted(&self) -> usize {
        self.numbering
            .offset(self.current_position)
            .map_or(0, |offset| offset + self.current_local)
    }

    /// Next frame in global order. After an error the stream ends.
    pub async fn next(&mut self) -> Option<Result<StreamedFrame>> {
        if self.failed {
            return None;
        }

        loop {
            if let Some(frame) = self.current.pop_front() {
                let result = self.emit(frame).await;
                if result.is_err() {
                    self.failed = true;
                }
                return Some(result);
            }

            if let Some(scratch) = self.current_scratch.take() {
                scratch.release();
            }

            if self.cursor >= self.handle.total() {
                info!("✅ Streaming extraction complete: {} frames", self.numbering.total());
                return None;
            }

            if let Some(outcome) = self.pending.remove(&self.cursor) {
                self.load(outcome).await;
                self.cursor += 1;
                continue;
            }

            match self.handle.next().await {
                Some(outcome) => {
                    self.pending.insert(outcome.index(), outcome);
                }
                None => {
                    warn!("Chunk {} never reported back, skipping it", self.cursor);
                    self.cursor += 1;
                }
            }
        }
    }

    /// Adapt into a `futures::Stream`
    pub fn into_stream(self) -> impl Stream<Item = Result<StreamedFrame>> + Send {
        stream::unfold(self, |mut frames| async move {
            let item = frames.next().await?;
            Some((item, frames))
        })
    }

    /// Drain the stream, returning how many frames were produced
    pub async fn run_to_end(mut self) -> Result<usize> {
        let mut count = 0;
        while let Some(frame) = self.next().await {
            frame?;
            count += 1;
        }
        Ok(count)
    }

    async fn load(&mut self, outcome: ChunkOutcome) {
        if outcome.is_empty() {
            self.failed_chunks += 1;
        }
        let chunk = outcome.into_frames();
        let frames = existing_frames(chunk.frames).await;

        debug!("Emitting chunk {} ({} frames)", chunk.index, frames.len());
        self.current_position = self.numbering.push_chunk(frames.len());
        self.current_local = 0;
        self.current = frames.into();
        self.current_scratch = chunk.scratch;
    }

    async fn emit(&mut self, frame: PathBuf) -> Result<StreamedFrame> {
        let number = self
            .numbering
            .global_number(self.current_position, self.current_local);
        self.current_local += 1;

        let destination = self.output_dir.join(self.naming.file_name(number));
        relocate(&frame, &destination).await?;

        let path = match self.transform.as_mut() {
            Some(transform) => transform(&destination, number),
            None => destination,
        };
        Ok(StreamedFrame { path, number })
    }
}
