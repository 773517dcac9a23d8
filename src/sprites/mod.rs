//! Thumbnail sprite sheets and their WebVTT index tracks.

pub mod webvtt;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};
use walkdir::WalkDir;

use crate::config::Config;
use crate::error::{ExtractError, Result};
use crate::extraction::{self, ExtractionReport, FrameStream, FrameTransform};
use crate::job::{ExtractionJob, FrameNaming, ProgressCallback};
use crate::video::{run_tool, tool_available, MediaTool};

pub use webvtt::{CaptionCue, Cue, SpriteCue, WebVttDocument};

/// Grid position of a thumbnail, in pixels, within its sprite sheet
pub fn sprite_position(index: usize, rows: u32, columns: u32, width: u32, height: u32) -> (u32, u32) {
    let columns = columns.max(1) as usize;
    let grid = (rows.max(1) as usize) * columns;
    let slot = index % grid;
    let x = (slot % columns) as u32 * width;
    let y = (slot / columns) as u32 * height;
    (x, y)
}

/// Video → thumbnails → sprite sheet → WebVTT
pub struct SpriteSheet {
    video_path: PathBuf,
    thumbnail_dir: PathBuf,
    sprite_file: Option<PathBuf>,
    config: Config,
    tool: Arc<dyn MediaTool>,
    progress: Option<ProgressCallback>,
}

impl SpriteSheet {
    /// Creates the thumbnail directory when missing
    pub fn new(
        video_path: impl Into<PathBuf>,
        thumbnail_dir: impl Into<PathBuf>,
        config: Config,
        tool: Arc<dyn MediaTool>,
    ) -> Result<Self> {
        let thumbnail_dir = thumbnail_dir.into();
        if !thumbnail_dir.is_dir() {
            std::fs::create_dir_all(&thumbnail_dir)
                .map_err(|e| ExtractError::io(&thumbnail_dir, e))?;
        }

        Ok(Self {
            video_path: video_path.into(),
            thumbnail_dir,
            sprite_file: None,
            config,
            tool,
            progress: None,
        })
    }

    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(usize, usize) + Send + Sync + 'static,
    {
        self.progress = Some(Arc::new(callback));
        self
    }

    pub fn video_path(&self) -> &Path {
        &self.video_path
    }

    pub fn thumbnail_dir(&self) -> &Path {
        &self.thumbnail_dir
    }

    pub fn sprite_file(&self) -> Option<&Path> {
        self.sprite_file.as_deref()
    }

    fn naming(&self) -> FrameNaming {
        FrameNaming::new(
            self.config.extraction.frame_number_width,
            self.config.extraction.frame_extension.clone(),
        )
    }

    fn job(&self) -> ExtractionJob {
        let mut job = ExtractionJob::from_config(&self.video_path, &self.thumbnail_dir, &self.config);
        job.progress = self.progress.clone();
        job
    }

    /// Use a sprite sheet composed earlier instead of calling `generate_sprite`
    pub fn with_sprite_file(mut self, sprite_file: impl Into<PathBuf>) -> Self {
        self.sprite_file = Some(sprite_file.into());
        self
    }

    fn files(&self) -> impl Iterator<Item = walkdir::DirEntry> {
        WalkDir::new(&self.thumbnail_dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
    }

    /// Regular files directly inside the thumbnail directory
    pub fn count_files(&self) -> usize {
        self.files().count()
    }

    /// Files named like extracted frames; reports and other strays are ignored
    pub fn count_frames(&self) -> usize {
        let naming = self.naming();
        self.files().filter(|entry| naming.matches(entry.path())).count()
    }

    /// Extract thumbnails, in parallel when asked and possible
    pub async fn generate_thumbs(&self, parallel: bool) -> Result<ExtractionReport> {
        let prefer_parallel = parallel && self.config.performance.prefer_parallel;
        extraction::extract_frames(&self.job(), Arc::clone(&self.tool), prefer_parallel).await
    }

    /// Stream thumbnails in order as chunks complete
    pub async fn extract_streaming(&self, transform: Option<FrameTransform>) -> Result<FrameStream> {
        extraction::stream_frames(&self.job(), Arc::clone(&self.tool), transform).await
    }

    /// Arguments for the compositing tool, thumbnails in frame order
    pub async fn montage_args(&self, sprite_file: &Path) -> Result<Vec<String>> {
        let frames = extraction::list_frames(&self.thumbnail_dir, &self.naming())
            .await
            .map_err(|e| ExtractError::io(&self.thumbnail_dir, e))?;

        let sprite = &self.config.sprite;
        let extraction = &self.config.extraction;
        let mut args = vec![
            "-background".to_string(),
            sprite.background.clone(),
            "-tile".to_string(),
            format!("{}x{}", sprite.columns, sprite.rows),
            "-geometry".to_string(),
            format!("{}x{}+0+0", extraction.width, extraction.height),
        ];
        args.extend(frames.iter().map(|p| p.to_string_lossy().into_owned()));
        args.push(sprite_file.to_string_lossy().into_owned());
        Ok(args)
    }

    /// Composite the thumbnails into `sprite_file`
    pub async fn generate_sprite(&mut self, sprite_file: impl Into<PathBuf>) -> Result<&mut Self> {
        let sprite_file = sprite_file.into();
        let mut args = self.montage_args(&sprite_file).await?;

        // ImageMagick 7 ships `magick montage`; 6 ships a bare `montage`
        let program = if tool_available("magick").await {
            args.insert(0, "montage".to_string());
            "magick".to_string()
        } else {
            self.config.tools.montage.clone()
        };

        debug!("{} composing sprite [{}]", program, sprite_file.display());
        run_tool(&program, &args)
            .await
            .map_err(ExtractError::Montage)?;

        info!("🖼️ Sprite sheet written: {}", sprite_file.display());
        self.sprite_file = Some(sprite_file);
        Ok(self)
    }

    /// One cue per thumbnail, each covering `ips` seconds
    pub fn webvtt_document(&self) -> WebVttDocument {
        let sprite_name = self
            .sprite_file
            .as_ref()
            .and_then(|path| path.file_name())
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let extraction = &self.config.extraction;
        let sprite = &self.config.sprite;
        let mut document = WebVttDocument::new();

        for index in 0..self.count_frames() {
            let (x, y) = sprite_position(
                index,
                sprite.rows,
                sprite.columns,
                extraction.width,
                extraction.height,
            );
            document.push(Cue::Sprite(SpriteCue {
                start: index as f64 * extraction.ips,
                end: (index + 1) as f64 * extraction.ips,
                sprite: sprite_name.clone(),
                x,
                y,
                width: extraction.width,
                height: extraction.height,
            }));
        }

        document
    }

    pub async fn generate_webvtt(&self, webvtt_file: impl AsRef<Path>) -> Result<()> {
        let document = self.webvtt_document();
        document.save_to_file(webvtt_file.as_ref()).await?;
        info!(
            "📝 WebVTT written: {} ({} cues)",
            webvtt_file.as_ref().display(),
            document.len()
        );
        Ok(())
    }

    /// Full pipeline into an existing, empty thumbnail directory
    pub async fn from_media(
        video_path: impl Into<PathBuf>,
        thumbnail_dir: impl Into<PathBuf>,
        sprite_file: impl Into<PathBuf>,
        webvtt_file: impl AsRef<Path>,
        config: Config,
        tool: Arc<dyn MediaTool>,
        parallel: bool,
    ) -> Result<Self> {
        let thumbnail_dir = thumbnail_dir.into();
        ensure_empty_dir(&thumbnail_dir)?;

        let mut sheet = SpriteSheet::new(video_path, thumbnail_dir, config, tool)?;
        sheet.generate_thumbs(parallel).await?;
        sheet.generate_sprite(sprite_file).await?;
        sheet.generate_webvtt(webvtt_file).await?;
        Ok(sheet)
    }
}

fn ensure_empty_dir(dir: &Path) -> Result<()> {
    if !dir.is_dir() {
        return Err(ExtractError::ThumbnailDir {
            path: dir.to_path_buf(),
            reason: "directory does not exist, create it first".to_string(),
        });
    }

    let mut entries = std::fs::read_dir(dir).map_err(|e| ExtractError::io(dir, e))?;
    if entries.next().is_some() {
        return Err(ExtractError::ThumbnailDir {
            path: dir.to_path_buf(),
            reason: "directory already contains files".to_string(),
        });
    }
    Ok(())
}
