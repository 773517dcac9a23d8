use std::path::PathBuf;

/// Result type for extraction operations
pub type Result<T> = std::result::Result<T, ExtractError>;

/// Fatal errors. Any of these aborts the whole extraction call.
#[derive(thiserror::Error, Debug)]
pub enum ExtractError {
    #[error("Duration probe failed: {0}")]
    Probe(#[from] ProbeError),

    #[error("Invalid extraction job: {0}")]
    InvalidJob(String),

    #[error("IO error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to move frame {} to {}: {source}", from.display(), to.display())]
    Relocate {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{capability} is required for {operation} but is not available: {hint}")]
    MissingCapability {
        capability: String,
        operation: String,
        hint: String,
    },

    #[error("Sequential extraction failed: {0}")]
    Sequential(#[source] ToolFailure),

    #[error("Sprite composition failed: {0}")]
    Montage(#[source] ToolFailure),

    #[error("Thumbnail directory {} is not usable: {reason}", path.display())]
    ThumbnailDir { path: PathBuf, reason: String },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Report serialization failed: {0}")]
    Report(#[from] serde_json::Error),
}

impl ExtractError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Failures while asking the probe tool for the media duration.
#[derive(thiserror::Error, Debug)]
pub enum ProbeError {
    #[error("source video not found: {}", .0.display())]
    MissingSource(PathBuf),

    #[error(transparent)]
    Tool(#[from] ToolFailure),

    #[error("probe output is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("probe output has no format.duration field")]
    MissingDuration,

    #[error("probe reported a non-numeric duration: {0:?}")]
    InvalidDuration(String),
}

/// A single external tool invocation that did not succeed.
#[derive(thiserror::Error, Debug)]
pub enum ToolFailure {
    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {}: {stderr}", code.map_or_else(|| "a signal".to_string(), |c| format!("status {c}")))]
    Exited {
        program: String,
        code: Option<i32>,
        stderr: String,
    },
}

/// Why a chunk produced no frames. Soft: the job keeps going.
#[derive(thiserror::Error, Debug)]
pub enum ChunkFailure {
    #[error(transparent)]
    Tool(#[from] ToolFailure),

    #[error("decode tool produced no frames")]
    NoFrames,

    #[error("could not create scratch directory: {0}")]
    Scratch(#[source] std::io::Error),

    #[error("could not list scratch directory: {0}")]
    Listing(#[source] std::io::Error),

    #[error("worker task panicked: {0}")]
    Panicked(String),
}
