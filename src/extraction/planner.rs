use serde::{Deserialize, Serialize};

/// One time window of the source, `[start, end)` in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChunkSpan {
    /// Position in timeline order; the only key used for reassembly
    pub index: usize,
    pub start: f64,
    pub end: f64,
    /// Planning estimate only, never enforced
    pub expected_frames: usize,
}

impl ChunkSpan {
    pub fn span(&self) -> f64 {
        self.end - self.start
    }
}

/// Estimated frames for a window of `span` seconds. Never zero.
pub fn expected_frames(span: f64, ips: f64) -> usize {
    let estimate = (span / ips).floor();
    if estimate.is_finite() && estimate >= 1.0 {
        estimate as usize
    } else {
        1
    }
}

/// Split `[0, duration)` into consecutive windows of `chunk_duration`
/// seconds; the last one ends exactly at `duration`.
///
/// A non-positive duration yields no chunks. Boundaries are computed as
/// `index * chunk_duration` so each chunk's start is bit-identical to the
/// previous chunk's end.
pub fn plan_chunks(duration: f64, chunk_duration: f64, ips: f64) -> Vec<ChunkSpan> {
    if duration.is_nan() || duration <= 0.0 || chunk_duration.is_nan() || chunk_duration <= 0.0 {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut start = 0.0;
    let mut index = 0;

    while start < duration {
        let end = ((index + 1) as f64 * chunk_duration).min(duration);
        chunks.push(ChunkSpan {
            index,
            start,
            end,
            expected_frames: expected_frames(end - start, ips),
        });
        start = end;
        index += 1;
    }

    tracing::debug!(
        "Split {:.2}s video into {} chunks of {}s each",
        duration,
        chunks.len(),
        chunk_duration
    );
    chunks
}
