use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::{
    article::truncate_chars,
    config::TierLimits,
    domain::MediaFormat,
    errors::Error,
    ports::{DownloadSpec, MediaFetcher},
    Result,
};

const DESCRIPTION_MAX_CHARS: usize = 500;

/// A finished download, ready to be sent to the user.
#[derive(Clone, Debug, PartialEq)]
pub struct DownloadedMedia {
    pub path: PathBuf,
    pub format: MediaFormat,
    pub title: String,
    pub uploader: String,
    pub duration_secs: u64,
    pub description: String,
}

pub struct MediaDownloader {
    fetcher: Arc<dyn MediaFetcher>,
    download_folder: PathBuf,
    cookies_file: Option<PathBuf>,
}

impl MediaDownloader {
    pub fn new(
        fetcher: Arc<dyn MediaFetcher>,
        download_folder: impl Into<PathBuf>,
        cookies_file: Option<PathBuf>,
    ) -> Self {
        Self {
            fetcher,
            download_folder: download_folder.into(),
            cookies_file,
        }
    }

    pub fn spec_for(&self, format: MediaFormat, limits: &TierLimits) -> DownloadSpec {
        let output_template = self
            .download_folder
            .join("%(title)s_%(id)s.%(ext)s")
            .to_string_lossy()
            .into_owned();

        let (format, extract_audio_kbps) = match format {
            MediaFormat::Audio => ("bestaudio/best".to_string(), Some(limits.audio_quality_kbps)),
            MediaFormat::Video => (limits.video_format.to_string(), None),
        };

        DownloadSpec {
            format,
            extract_audio_kbps,
            output_template,
            cookies_file: self.cookies_file.clone(),
        }
    }

    /// Probe, enforce the plan's size limit, then download.
    pub async fn download(
        &self,
        url: &str,
        format: MediaFormat,
        limits: &TierLimits,
    ) -> Result<DownloadedMedia> {
        let spec = self.spec_for(format, limits);
        let info = self.fetcher.probe(url, &spec).await?;

        // Size is often unknown up front; only a known size can be rejected.
        // A reported size of zero means unknown, so fall through to the estimate.
        let size = info
            .filesize
            .filter(|&n| n > 0)
            .or(info.filesize_approx)
            .unwrap_or(0);
        if size > limits.max_file_size {
            return Err(Error::FileTooLarge {
                size,
                limit: limits.max_file_size,
                plan: limits.plan,
            });
        }

        let mut path = self.fetcher.download(url, &spec).await?;
        if format == MediaFormat::Audio && path.extension().map_or(true, |e| e != "mp3") {
            path = path.with_extension("mp3");
        }

        let description = match info.description.as_deref().filter(|d| !d.is_empty()) {
            Some(d) => format!("{}...", truncate_chars(d, DESCRIPTION_MAX_CHARS)),
            None => String::new(),
        };

        tracing::info!(url, path = %path.display(), "download complete");

        Ok(DownloadedMedia {
            path,
            format,
            title: info.title.unwrap_or_else(|| "Unknown".to_string()),
            uploader: info.uploader.unwrap_or_else(|| "Unknown".to_string()),
            duration_secs: info.duration_secs.unwrap_or(0),
            description,
        })
    }

    /// Best-effort removal of a sent file.
    pub async fn discard(&self, path: &Path) {
        if let Err(e) = tokio::fs::remove_file(path).await {
            tracing::debug!(path = %path.display(), "could not remove download: {e}");
        }
    }
}
