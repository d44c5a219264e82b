use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Which media the downloader should keep for a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VideoOptions {
    /// Drop audio-only overrides so the downloader's default (video) applies
    DownloadVideo,
    /// Force best-quality audio extraction
    ExtractAudio,
    #[default]
    NoneSelected,
}

impl VideoOptions {
    /// Parse the `video-opts` form value; anything unrecognised means no override.
    pub fn from_form(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some("download-video") => VideoOptions::DownloadVideo,
            Some("extract-audio") => VideoOptions::ExtractAudio,
            _ => VideoOptions::NoneSelected,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VideoOptions::DownloadVideo => "download-video",
            VideoOptions::ExtractAudio => "extract-audio",
            VideoOptions::NoneSelected => "none-selected",
        }
    }
}

impl fmt::Display for VideoOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-job configuration overrides
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobOptions {
    #[serde(rename = "video-options", default)]
    pub video_options: VideoOptions,
}

impl JobOptions {
    pub fn with_video(video_options: VideoOptions) -> Self {
        Self { video_options }
    }
}

/// One accepted download request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub url: String,
    pub options: JobOptions,
    pub submitted_at: DateTime<Utc>,
}

impl Job {
    pub fn new(url: impl Into<String>, options: JobOptions) -> Self {
        Self {
            id: Uuid::now_v7(),
            url: url.into(),
            options,
            submitted_at: Utc::now(),
        }
    }
}

/// How a job ended, as seen by its supervisor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Completed,
    Failed { code: Option<i32> },
    /// Killed by the stuck-job heuristic
    Killed { code: Option<i32> },
    SpawnFailed,
}
