mod common;

use common::{expected_tags, frame_tags, FakeTool};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

use thumbsheet::{
    extract_frames, extract_parallel, stream_frames, ExtractError, ExtractionJob, FrameTransform,
    MediaTool, StrategyKind,
};

fn job(output: &Path) -> ExtractionJob {
    ExtractionJob::new("fake.mp4", output)
        .with_ips(1.0)
        .with_chunk_duration(10.0)
        .with_max_workers(4)
}

fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn test_merge_ignores_completion_order() {
    let temp_dir = TempDir::new().unwrap();
    let output = temp_dir.path().join("frames");
    // Chunk 2 finishes first, chunk 0 last
    let tool = Arc::new(
        FakeTool::new(30.0)
            .with_delay(0, 300)
            .with_delay(1, 150),
    );

    let frames = extract_parallel(&job(&output), tool).await.unwrap();

    assert_eq!(frames, 30);
    assert_eq!(
        frame_tags(&output),
        expected_tags(&[(0, 10), (1, 10), (2, 10)])
    );
    assert_eq!(file_names(&output).first().unwrap(), "0001.jpg");
    assert_eq!(file_names(&output).last().unwrap(), "0030.jpg");
}

#[tokio::test]
async fn test_uneven_chunks_keep_contiguous_numbering() {
    let temp_dir = TempDir::new().unwrap();
    let tool = Arc::new(
        FakeTool::new(25.0)
            .with_frames(0, 5)
            .with_frames(1, 7)
            .with_frames(2, 2)
            .with_delay(0, 100),
    );

    let frames = extract_parallel(&job(temp_dir.path()), tool).await.unwrap();

    assert_eq!(frames, 14);
    assert_eq!(
        frame_tags(temp_dir.path()),
        expected_tags(&[(0, 5), (1, 7), (2, 2)])
    );
}

#[tokio::test]
async fn test_failed_chunk_contributes_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let tool = Arc::new(FakeTool::new(30.0).failing(1));

    let report = extract_frames(&job(temp_dir.path()), tool.clone(), true)
        .await
        .unwrap();

    assert_eq!(report.strategy, StrategyKind::Parallel);
    assert_eq!(report.chunks, 3);
    assert_eq!(report.failed_chunks, 1);
    assert_eq!(report.frames, 20);
    // No gap where chunk 1 would have been, and its partial frame is gone
    assert_eq!(
        frame_tags(temp_dir.path()),
        expected_tags(&[(0, 10), (2, 10)])
    );
    assert!(!temp_dir.path().join("0021.jpg").exists());
}

#[tokio::test]
async fn test_panicking_chunk_is_isolated() {
    let temp_dir = TempDir::new().unwrap();
    let tool = Arc::new(FakeTool::new(30.0).panicking(0));

    let frames = extract_parallel(&job(temp_dir.path()), tool).await.unwrap();

    assert_eq!(frames, 20);
    assert_eq!(
        frame_tags(temp_dir.path()),
        expected_tags(&[(1, 10), (2, 10)])
    );
}

#[tokio::test]
async fn test_all_chunks_failing_is_not_an_error() {
    let temp_dir = TempDir::new().unwrap();
    let tool = Arc::new(FakeTool::new(20.0).failing(0).failing(1));

    let frames = extract_parallel(&job(temp_dir.path()), tool).await.unwrap();

    assert_eq!(frames, 0);
    assert!(file_names(temp_dir.path()).is_empty());
}

#[tokio::test]
async fn test_progress_reported_once_per_chunk() {
    let temp_dir = TempDir::new().unwrap();
    let calls = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&calls);
    let tool = Arc::new(
        FakeTool::new(40.0)
            .with_delay(0, 120)
            .with_delay(2, 60)
            .failing(3),
    );

    let job = job(temp_dir.path())
        .with_progress(move |done, total| sink.lock().unwrap().push((done, total)));
    extract_parallel(&job, tool).await.unwrap();

    assert_eq!(*calls.lock().unwrap(), vec![(1, 4), (2, 4), (3, 4), (4, 4)]);
}

#[tokio::test]
async fn test_zero_duration_extracts_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let output = temp_dir.path().join("frames");
    let calls = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&calls);
    let tool = Arc::new(FakeTool::new(0.0));

    let job = job(&output).with_progress(move |done, total| sink.lock().unwrap().push((done, total)));
    let report = extract_frames(&job, tool.clone(), true).await.unwrap();

    assert_eq!(report.frames, 0);
    assert_eq!(report.chunks, 0);
    assert!(calls.lock().unwrap().is_empty());
    assert_eq!(tool.segment_calls.load(Ordering::SeqCst), 0);
    assert!(output.is_dir());
}

#[tokio::test]
async fn test_probe_failure_is_fatal() {
    let temp_dir = TempDir::new().unwrap();
    let tool = Arc::new(FakeTool::broken_probe());

    let result = extract_parallel(&job(temp_dir.path()), tool.clone()).await;

    assert!(matches!(result, Err(ExtractError::Probe(_))));
    assert_eq!(tool.segment_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_invalid_job_rejected_before_probing() {
    let temp_dir = TempDir::new().unwrap();
    let tool = Arc::new(FakeTool::broken_probe());

    let result = extract_parallel(&job(temp_dir.path()).with_ips(0.0), tool).await;

    assert!(matches!(result, Err(ExtractError::InvalidJob(_))));
}

#[tokio::test]
async fn test_worker_limit_bounds_concurrency() {
    let temp_dir = TempDir::new().unwrap();
    let mut tool = FakeTool::new(80.0);
    for chunk in 0..8 {
        tool = tool.with_delay(chunk, 40);
    }
    let tool = Arc::new(tool);

    let frames = extract_parallel(&job(temp_dir.path()).with_max_workers(2), tool.clone())
        .await
        .unwrap();

    assert_eq!(frames, 80);
    assert_eq!(tool.segment_calls.load(Ordering::SeqCst), 8);
    let peak = tool.max_in_flight.load(Ordering::SeqCst);
    assert!(peak >= 1 && peak <= 2, "peak concurrency was {}", peak);
}

#[tokio::test]
async fn test_scratch_dirs_removed_after_merge() {
    let temp_dir = TempDir::new().unwrap();
    let tool = Arc::new(FakeTool::new(30.0).failing(2));

    extract_parallel(&job(temp_dir.path()), tool.clone())
        .await
        .unwrap();

    let scratch = tool.scratch_dirs();
    assert_eq!(scratch.len(), 3);
    for dir in scratch {
        assert!(!dir.exists(), "{} left behind", dir.display());
    }
}

#[tokio::test]
async fn test_sequential_when_parallel_not_preferred() {
    let temp_dir = TempDir::new().unwrap();
    let tool = Arc::new(FakeTool::new(30.0).with_sequential_frames(30));

    let report = extract_frames(&job(temp_dir.path()), tool.clone(), false)
        .await
        .unwrap();

    assert_eq!(report.strategy, StrategyKind::Sequential);
    assert_eq!(report.frames, 30);
    assert_eq!(report.duration, None);
    assert_eq!(tool.sequential_calls.load(Ordering::SeqCst), 1);
    assert_eq!(tool.segment_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_falls_back_to_sequential_without_probe() {
    let temp_dir = TempDir::new().unwrap();
    let calls = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&calls);
    let tool = Arc::new(
        FakeTool::new(30.0)
            .without_probe()
            .with_sequential_frames(12),
    );

    let job = job(temp_dir.path()).with_progress(move |done, total| sink.lock().unwrap().push((done, total)));
    let report = extract_frames(&job, tool.clone(), true).await.unwrap();

    assert_eq!(report.strategy, StrategyKind::Sequential);
    assert_eq!(report.frames, 12);
    assert_eq!(*calls.lock().unwrap(), vec![(1, 1)]);
    assert_eq!(tool.segment_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_stream_requires_probe() {
    let temp_dir = TempDir::new().unwrap();
    let tool = Arc::new(FakeTool::new(30.0).without_probe());

    let result = stream_frames(&job(temp_dir.path()), tool, None).await;

    match result {
        Err(ExtractError::MissingCapability { capability, .. }) => {
            assert_eq!(capability, "ffprobe")
        }
        Err(other) => panic!("unexpected error: {}", other),
        Ok(_) => panic!("streaming should not start without a probe tool"),
    }
}

#[tokio::test]
async fn test_stream_yields_in_global_order() {
    let temp_dir = TempDir::new().unwrap();
    let output = temp_dir.path().join("frames");
    let tool = Arc::new(
        FakeTool::new(30.0)
            .with_delay(0, 300)
            .with_delay(1, 150),
    );

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let transform: FrameTransform = Box::new(move |path: &Path, number: usize| {
        sink.lock().unwrap().push(number);
        PathBuf::from(format!("tagged-{}-{}", number, path.display()))
    });

    let mut stream = stream_frames(&job(&output), tool.clone(), Some(transform))
        .await
        .unwrap();
    assert_eq!(stream.total_chunks(), 3);

    let mut numbers = Vec::new();
    while let Some(frame) = stream.next().await {
        let frame = frame.unwrap();
        let expected_path = output.join(format!("{:04}.jpg", frame.number));
        assert_eq!(
            frame.path,
            PathBuf::from(format!("tagged-{}-{}", frame.number, expected_path.display()))
        );
        assert!(expected_path.is_file());
        numbers.push(frame.number);
    }

    assert_eq!(numbers, (1..=30).collect::<Vec<_>>());
    assert_eq!(*seen.lock().unwrap(), numbers);
    assert_eq!(stream.emitted(), 30);
    // Same layout a batch run would leave behind
    assert_eq!(
        frame_tags(&output),
        expected_tags(&[(0, 10), (1, 10), (2, 10)])
    );
    for dir in tool.scratch_dirs() {
        assert!(!dir.exists());
    }
}

#[tokio::test]
async fn test_stream_skips_failed_chunk_without_gap() {
    let temp_dir = TempDir::new().unwrap();
    let tool = Arc::new(FakeTool::new(30.0).failing(0).with_delay(2, 50));

    let frames: Vec<_> = stream_frames(&job(temp_dir.path()), tool, None)
        .await
        .unwrap()
        .into_stream()
        .map(|frame| frame.unwrap().number)
        .collect()
        .await;

    assert_eq!(frames, (1..=20).collect::<Vec<_>>());
    assert_eq!(
        frame_tags(temp_dir.path()),
        expected_tags(&[(1, 10), (2, 10)])
    );
}

#[tokio::test]
async fn test_stream_run_to_end_counts_frames() {
    let temp_dir = TempDir::new().unwrap();
    let tool = Arc::new(FakeTool::new(25.0).with_frames(2, 3));

    let count = stream_frames(&job(temp_dir.path()), tool, None)
        .await
        .unwrap()
        .run_to_end()
        .await
        .unwrap();

    assert_eq!(count, 23);
}

#[tokio::test]
async fn test_dropping_stream_cancels_outstanding_chunks() {
    let temp_dir = TempDir::new().unwrap();
    let tool = Arc::new(
        FakeTool::new(40.0)
            .with_delay(1, 5_000)
            .with_delay(2, 5_000)
            .with_delay(3, 5_000),
    );

    let mut stream = stream_frames(&job(temp_dir.path()), tool.clone(), None)
        .await
        .unwrap();
    for expected in 1..=3 {
        let frame = stream.next().await.unwrap().unwrap();
        assert_eq!(frame.number, expected);
    }
    drop(stream);

    // Give the runtime a moment to tear down the aborted tasks
    tokio::time::sleep(Duration::from_millis(200)).await;

    for dir in tool.scratch_dirs() {
        assert!(!dir.exists(), "{} left behind", dir.display());
    }
    assert_eq!(file_names(temp_dir.path()).len(), 3);
}

#[tokio::test]
async fn test_report_saved_next_to_frames() {
    let temp_dir = TempDir::new().unwrap();
    let tool: Arc<dyn MediaTool> = Arc::new(FakeTool::new(12.0));

    let report = extract_frames(&job(temp_dir.path()), tool, true)
        .await
        .unwrap();
    let path = report.save(temp_dir.path()).await.unwrap();

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(json["frames"], 12);
    assert_eq!(json["chunks"], 2);
    assert_eq!(json["duration"], 12.0);
    assert_eq!(path.file_name().unwrap(), "extraction_report.json");
}

/// Fill `dir` with `0001.jpg..` frames left over from a longer video
fn leftover_frames(dir: &Path, count: usize) {
    std::fs::create_dir_all(dir).unwrap();
    for number in 1..=count {
        std::fs::write(dir.join(format!("{:04}.jpg", number)), b"stale").unwrap();
    }
    std::fs::write(dir.join("notes.txt"), b"keep me").unwrap();
}

#[tokio::test]
async fn test_parallel_replaces_frames_from_earlier_run() {
    let temp_dir = TempDir::new().unwrap();
    leftover_frames(temp_dir.path(), 50);
    let tool = Arc::new(FakeTool::new(20.0));

    let frames = extract_parallel(&job(temp_dir.path()), tool).await.unwrap();

    assert_eq!(frames, 20);
    assert_eq!(frame_tags(temp_dir.path()), expected_tags(&[(0, 10), (1, 10)]));
    assert!(!temp_dir.path().join("0021.jpg").exists());
    assert!(temp_dir.path().join("notes.txt").exists());
}

#[tokio::test]
async fn test_sequential_replaces_frames_from_earlier_run() {
    let temp_dir = TempDir::new().unwrap();
    leftover_frames(temp_dir.path(), 50);
    let tool = Arc::new(FakeTool::new(20.0).with_sequential_frames(12));

    let report = extract_frames(&job(temp_dir.path()), tool, false)
        .await
        .unwrap();

    assert_eq!(report.strategy, StrategyKind::Sequential);
    assert_eq!(report.frames, 12);
    assert_eq!(frame_tags(temp_dir.path()).len(), 12);
    assert!(!temp_dir.path().join("0013.jpg").exists());
}

#[tokio::test]
async fn test_stream_replaces_frames_from_earlier_run() {
    let temp_dir = TempDir::new().unwrap();
    leftover_frames(temp_dir.path(), 50);
    let tool = Arc::new(FakeTool::new(20.0).with_delay(0, 50));

    let count = stream_frames(&job(temp_dir.path()), tool, None)
        .await
        .unwrap()
        .run_to_end()
        .await
        .unwrap();

    assert_eq!(count, 20);
    assert_eq!(frame_tags(temp_dir.path()), expected_tags(&[(0, 10), (1, 10)]));
}

#[tokio::test]
async fn test_stream_reports_progress_once_per_chunk() {
    let temp_dir = TempDir::new().unwrap();
    let calls = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&calls);
    let tool = Arc::new(
        FakeTool::new(40.0)
            .with_delay(0, 150)
            .with_delay(1, 75)
            .failing(2),
    );

    let job = job(temp_dir.path())
        .with_progress(move |done, total| sink.lock().unwrap().push((done, total)));
    let mut stream = stream_frames(&job, tool, None).await.unwrap();

    let mut frames = 0;
    while let Some(frame) = stream.next().await {
        frame.unwrap();
        frames += 1;
    }

    assert_eq!(frames, 30);
    assert_eq!(stream.failed_chunks(), 1);
    assert_eq!(stream.duration(), 40.0);
    assert_eq!(*calls.lock().unwrap(), vec![(1, 4), (2, 4), (3, 4), (4, 4)]);
}
