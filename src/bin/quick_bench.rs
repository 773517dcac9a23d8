use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use thumbsheet::extraction::FrameNumbering;
use thumbsheet::sprites::{sprite_position, Cue, SpriteCue};
use thumbsheet::{plan_chunks, ExtractionJob, FfmpegTool, MediaTool, WebVttDocument};

fn main() {
    println!("🚀 Thumbsheet - Quick Performance Benchmark");
    println!("===========================================");

    // Benchmark 1: Chunk planning
    println!("\n🗂️ Chunk Planning Benchmarks:");

    let start = Instant::now();
    let mut planned = 0;
    for _ in 0..10_000 {
        planned += plan_chunks(3600.0, 10.0, 1.0).len();
    }
    let plan_time = start.elapsed();
    println!(
        "  ✅ 10,000 one-hour plans ({} chunks each): {:?} ({:.2}μs each)",
        planned / 10_000,
        plan_time,
        plan_time.as_micros() as f64 / 10_000.0
    );

    // Benchmark 2: Frame numbering
    println!("\n🔢 Frame Numbering Benchmarks:");

    let start = Instant::now();
    let mut numbering = FrameNumbering::new();
    let mut last = 0;
    for chunk in 0..360 {
        let position = numbering.push_chunk(10);
        for local in 0..10 {
            last = numbering.global_number(position, local);
        }
        debug_assert_eq!(position, chunk);
    }
    let numbering_time = start.elapsed();
    println!(
        "  ✅ 3,600 global numbers (last = {}): {:?}",
        last, numbering_time
    );

    // Benchmark 3: WebVTT generation
    println!("\n📝 WebVTT Generation Benchmarks:");

    let start = Instant::now();
    let mut bytes = 0;
    for _ in 0..10 {
        let mut document = WebVttDocument::new();
        for index in 0..3600usize {
            let (x, y) = sprite_position(index, 30, 30, 512, 288);
            document.push(Cue::Sprite(SpriteCue {
                start: index as f64,
                end: (index + 1) as f64,
                sprite: "sprite.jpg".to_string(),
                x,
                y,
                width: 512,
                height: 288,
            }));
        }
        bytes += document.render().len();
    }
    let webvtt_time = start.elapsed();
    println!(
        "  ✅ 10 one-hour tracks (3,600 cues, {} KB each): {:?} ({:.2}ms each)",
        bytes / 10 / 1024,
        webvtt_time,
        webvtt_time.as_millis() as f64 / 10.0
    );

    // Benchmark 4: Real extraction, when a video is supplied
    let video = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("THUMBSHEET_BENCH_VIDEO").ok())
        .map(PathBuf::from);

    match video {
        Some(video) if video.is_file() => bench_real_video(video),
        Some(video) => println!("\n⚠️ Benchmark video not found: {}", video.display()),
        None => println!("\n💡 Pass a video path (or set THUMBSHEET_BENCH_VIDEO) to time real extraction"),
    }

    println!("\n🎉 Benchmark complete!");
}

fn bench_real_video(video: PathBuf) {
    println!("\n🎬 Extraction Benchmarks ({}):", video.display());

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            println!("  ❌ Failed to start runtime: {}", e);
            return;
        }
    };

    rt.block_on(async {
        let tool: Arc<dyn MediaTool> = Arc::new(FfmpegTool::new());

        for parallel in [false, true] {
            let temp_dir = match tempfile::TempDir::new() {
                Ok(dir) => dir,
                Err(e) => {
                    println!("  ❌ Failed to create temp dir: {}", e);
                    return;
                }
            };
            let job = ExtractionJob::new(&video, temp_dir.path());
            let label = if parallel { "Parallel" } else { "Sequential" };

            let start = Instant::now();
            match thumbsheet::extract_frames(&job, Arc::clone(&tool), parallel).await {
                Ok(report) => println!(
                    "  ✅ {} extraction: {} frames in {:?}",
                    label,
                    report.frames,
                    start.elapsed()
                ),
                Err(e) => println!("  ❌ {} extraction failed: {}", label, e),
            }
        }
    });
}
