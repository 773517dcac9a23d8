//! Chunked, concurrent frame extraction.
//!
//! The timeline is split into fixed windows ([`planner`]), each window is
//! decoded into its own scratch directory ([`chunk`]) by a bounded pool of
//! tasks ([`dispatcher`]), and the results are renumbered into one
//! contiguous sequence ([`merge`]) or replayed in order as they arrive
//! ([`streaming`]).

pub mod chunk;
pub mod dispatcher;
pub mod merge;
pub mod planner;
pub mod strategy;
pub mod streaming;

pub use chunk::{list_frames, remove_scratch_dir, ChunkExtractor, ChunkFrames, ChunkOutcome, ScratchDir};
pub use dispatcher::{DispatchHandle, Dispatcher};
pub use merge::{clear_frames, merge_chunks, relocate, FrameNumbering};
pub use planner::{expected_frames, plan_chunks, ChunkSpan};
pub use strategy::{
    extract_frames, extract_parallel, select_strategy, stream_frames, ExtractionReport,
    ExtractionStrategy, ParallelExtractor, SequentialExtractor, StrategyKind,
};
pub use streaming::{FrameStream, FrameTransform, StreamedFrame};
