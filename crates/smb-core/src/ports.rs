use std::path::PathBuf;

use async_trait::async_trait;

use crate::Result;

/// Fetches a web page body over HTTP.
///
/// Implementations return `Error::Http` for non-200 responses.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String>;
}

/// Options for one media extraction, independent of the tool behind it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DownloadSpec {
    /// Format selector in yt-dlp syntax.
    pub format: String,
    /// Extract audio to mp3 at this bitrate (kbps).
    pub extract_audio_kbps: Option<u32>,
    /// Output template, e.g. `downloads/%(title)s_%(id)s.%(ext)s`.
    pub output_template: String,
    pub cookies_file: Option<PathBuf>,
}

/// Metadata reported before downloading.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MediaInfo {
    pub id: Option<String>,
    pub title: Option<String>,
    pub uploader: Option<String>,
    pub description: Option<String>,
    pub duration_secs: Option<u64>,
    pub filesize: Option<u64>,
    pub filesize_approx: Option<u64>,
}

/// Backend that resolves and downloads media from video sites.
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    async fn probe(&self, url: &str, spec: &DownloadSpec) -> Result<MediaInfo>;

    /// Download and return the path of the final file on disk.
    async fn download(&self, url: &str, spec: &DownloadSpec) -> Result<PathBuf>;
}
