//! Scripted stand-in for ffmpeg/ffprobe used by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use thumbsheet::extraction::expected_frames;
use thumbsheet::{MediaTool, ProbeError, SegmentRequest, SequentialRequest, ToolCapabilities, ToolFailure};

pub struct FakeTool {
    duration: Option<f64>,
    probe_available: bool,
    frames: HashMap<usize, usize>,
    delays: HashMap<usize, Duration>,
    failing: HashSet<usize>,
    panicking: HashSet<usize>,
    sequential_frames: usize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub segment_calls: AtomicUsize,
    pub sequential_calls: AtomicUsize,
    pub scratch_dirs: Mutex<Vec<PathBuf>>,
}

impl FakeTool {
    /// A tool reporting `duration` seconds that produces one frame per
    /// `ips` seconds of each requested window
    pub fn new(duration: f64) -> Self {
        Self {
            duration: Some(duration),
            probe_available: true,
            frames: HashMap::new(),
            delays: HashMap::new(),
            failing: HashSet::new(),
            panicking: HashSet::new(),
            sequential_frames: 0,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            segment_calls: AtomicUsize::new(0),
            sequential_calls: AtomicUsize::new(0),
            scratch_dirs: Mutex::new(Vec::new()),
        }
    }

    /// Probe exits non-zero
    pub fn broken_probe() -> Self {
        Self {
            duration: None,
            ..Self::new(0.0)
        }
    }

    pub fn without_probe(mut self) -> Self {
        self.probe_available = false;
        self
    }

    pub fn with_frames(mut self, chunk: usize, count: usize) -> Self {
        self.frames.insert(chunk, count);
        self
    }

    pub fn with_delay(mut self, chunk: usize, millis: u64) -> Self {
        self.delays.insert(chunk, Duration::from_millis(millis));
        self
    }

    pub fn failing(mut self, chunk: usize) -> Self {
        self.failing.insert(chunk);
        self
    }

    pub fn panicking(mut self, chunk: usize) -> Self {
        self.panicking.insert(chunk);
        self
    }

    pub fn with_sequential_frames(mut self, count: usize) -> Self {
        self.sequential_frames = count;
        self
    }

    pub fn scratch_dirs(&self) -> Vec<PathBuf> {
        self.scratch_dirs.lock().unwrap().clone()
    }
}

/// Expand a `%0Nd.ext` pattern
fn frame_name(pattern: &str, number: usize) -> String {
    let extension = pattern.rsplit('.').next().unwrap_or("jpg");
    format!("{:04}.{}", number, extension)
}

/// Content written into each fake frame, so tests can check where it came from
pub fn frame_tag(chunk: usize, local: usize) -> String {
    format!("chunk{}:{}", chunk, local)
}

#[async_trait]
impl MediaTool for FakeTool {
    async fn probe_duration(&self, _source: &Path) -> Result<f64, ProbeError> {
        self.duration.ok_or_else(|| {
            ProbeError::Tool(ToolFailure::Exited {
                program: "ffprobe".to_string(),
                code: Some(1),
                stderr: "Invalid data found when processing input".to_string(),
            })
        })
    }

    async fn extract_segment(&self, request: &SegmentRequest) -> Result<(), ToolFailure> {
        let index = request.chunk_index;
        self.segment_calls.fetch_add(1, Ordering::SeqCst);
        self.scratch_dirs
            .lock()
            .unwrap()
            .push(request.output_dir.clone());

        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);

        if let Some(delay) = self.delays.get(&index) {
            tokio::time::sleep(*delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.panicking.contains(&index) {
            panic!("decoder crashed on chunk {}", index);
        }

        if self.failing.contains(&index) {
            // Partial output that must never reach the destination
            tokio::fs::write(
                request.output_dir.join(frame_name(&request.pattern, 1)),
                frame_tag(index, 1),
            )
            .await
            .unwrap();
            return Err(ToolFailure::Exited {
                program: "ffmpeg".to_string(),
                code: Some(1),
                stderr: format!("corrupt packet in chunk {}", index),
            });
        }

        let count = self
            .frames
            .get(&index)
            .copied()
            .unwrap_or_else(|| expected_frames(request.duration, request.ips));
        for local in 1..=count {
            tokio::fs::write(
                request.output_dir.join(frame_name(&request.pattern, local)),
                frame_tag(index, local),
            )
            .await
            .unwrap();
        }
        Ok(())
    }

    async fn extract_all(&self, request: &SequentialRequest) -> Result<(), ToolFailure> {
        self.sequential_calls.fetch_add(1, Ordering::SeqCst);
        for number in 1..=self.sequential_frames {
            tokio::fs::write(
                request.output_dir.join(frame_name(&request.pattern, number)),
                format!("sequential:{}", number),
            )
            .await
            .unwrap();
        }
        Ok(())
    }

    async fn capabilities(&self) -> ToolCapabilities {
        ToolCapabilities {
            probe: self.probe_available,
            decode: true,
        }
    }
}

/// Tags of the frames in `dir`, in file-name order
pub fn frame_tags(dir: &Path) -> Vec<String> {
    let mut names: Vec<PathBuf> = std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|path| path.extension().map_or(false, |ext| ext == "jpg"))
        .collect();
    names.sort();
    names
        .iter()
        .map(|path| std::fs::read_to_string(path).unwrap())
        .collect()
}

/// `chunk0:1 .. chunk0:n0, chunk1:1 ..` for the given per-chunk counts
pub fn expected_tags(counts: &[(usize, usize)]) -> Vec<String> {
    counts
        .iter()
        .flat_map(|&(chunk, count)| (1..=count).map(move |local| frame_tag(chunk, local)))
        .collect()
}
