/// Thumbsheet - parallel thumbnail extraction for video sprite sheets
///
/// Splits a video's timeline into chunks, extracts frames from each chunk
/// concurrently with ffmpeg, and reassembles them into one contiguously
/// numbered frame sequence. Sprite sheets and WebVTT tracks are built on top.

pub mod config;
pub mod error;
pub mod extraction;
pub mod job;
pub mod sprites;
pub mod video;

// Re-export main types for easy access
pub use crate::config::{Config, ConfigBuilder};
pub use crate::error::{ChunkFailure, ExtractError, ProbeError, Result, ToolFailure};
pub use crate::extraction::{
    extract_frames, extract_parallel, plan_chunks, stream_frames, ChunkSpan, ExtractionReport,
    ExtractionStrategy, FrameStream, FrameTransform, StrategyKind, StreamedFrame,
};
pub use crate::job::{ExtractionJob, FrameNaming, ProgressCallback};
pub use crate::sprites::{CaptionCue, SpriteSheet, WebVttDocument};
pub use crate::video::{FfmpegTool, MediaTool, SegmentRequest, SequentialRequest, ToolCapabilities};
