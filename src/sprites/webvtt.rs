use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::error::{ExtractError, Result};

pub const WEBVTT_HEADER: &str = "WEBVTT";

/// `HH:MM:SS`, whole seconds (sprite tracks)
pub fn format_clock(seconds: f64) -> String {
    let total = seconds.max(0.0).floor() as u64;
    format!(
        "{:02}:{:02}:{:02}",
        total / 3600,
        (total % 3600) / 60,
        total % 60
    )
}

/// `HH:MM:SS.mmm` (caption tracks)
pub fn format_timestamp(seconds: f64) -> String {
    let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let ms = total_ms % 1000;
    let total = total_ms / 1000;
    format!(
        "{:02}:{:02}:{:02}.{:03}",
        total / 3600,
        (total % 3600) / 60,
        total % 60,
        ms
    )
}

/// Thumbnail cue pointing at a region of a sprite sheet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpriteCue {
    pub start: f64,
    pub end: f64,
    pub sprite: String,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl fmt::Display for SpriteCue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} --> {}\n{}#xywh={},{},{},{}\n",
            format_clock(self.start),
            format_clock(self.end),
            self.sprite,
            self.x,
            self.y,
            self.width,
            self.height
        )
    }
}

/// Timed text cue, as produced by transcription or frame description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionCue {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

impl CaptionCue {
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into().trim().to_string(),
        }
    }
}

impl fmt::Display for CaptionCue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} --> {}\n{}\n",
            format_timestamp(self.start),
            format_timestamp(self.end),
            self.text
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Cue {
    Sprite(SpriteCue),
    Caption(CaptionCue),
}

impl Cue {
    pub fn start(&self) -> f64 {
        match self {
            Cue::Sprite(cue) => cue.start,
            Cue::Caption(cue) => cue.start,
        }
    }
}

impl fmt::Display for Cue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cue::Sprite(cue) => cue.fmt(f),
            Cue::Caption(cue) => cue.fmt(f),
        }
    }
}

/// A WebVTT file under construction
#[derive(Debug, Clone, Default)]
pub struct WebVttDocument {
    cues: Vec<Cue>,
}

impl WebVttDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, cue: Cue) {
        self.cues.push(cue);
    }

    pub fn add_caption(&mut self, start: f64, end: f64, text: impl Into<String>) {
        self.cues.push(Cue::Caption(CaptionCue::new(start, end, text)));
    }

    /// Order cues by start time
    pub fn sort_cues(&mut self) {
        self.cues.sort_by(|a, b| a.start().total_cmp(&b.start()));
    }

    pub fn cues(&self) -> &[Cue] {
        &self.cues
    }

    pub fn len(&self) -> usize {
        self.cues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cues.is_empty()
    }

    pub fn render(&self) -> String {
        let mut content = String::from(WEBVTT_HEADER);
        content.push_str("\n\n");

        for cue in &self.cues {
            content.push_str(&cue.to_string());
            content.push('\n');
        }

        content
    }

    pub async fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        tokio::fs::write(path, self.render())
            .await
            .map_err(|e| ExtractError::io(path, e))
    }
}
