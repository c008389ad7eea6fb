//! yt-dlp adapter.
//!
//! Runs the `yt-dlp` executable twice per request: once with
//! `--dump-single-json` to learn title and size, then for the real download
//! with `--print after_move:filepath` so the final path comes back on stdout.

use std::{
    collections::VecDeque,
    path::{Path, PathBuf},
    process::Stdio,
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use serde::Deserialize;
use smb_core::{
    errors::Error,
    ports::{DownloadSpec, MediaFetcher, MediaInfo},
    Result,
};
use tokio::{
    io::{AsyncBufReadExt, AsyncReadExt, BufReader},
    process::Command,
    sync::Mutex,
};

const STDERR_TAIL_MAX_BYTES: usize = 16 * 1024;
const STDERR_TAIL_MAX_LINES: usize = 200;

#[derive(Clone, Debug)]
pub struct YtDlpConfig {
    pub program: PathBuf,
    /// Upper bound for a single yt-dlp invocation; the process is killed past it.
    pub timeout: Duration,
}

#[derive(Clone, Debug)]
pub struct YtDlpClient {
    cfg: YtDlpConfig,
}

#[derive(Clone, Debug, Default)]
struct StderrTail {
    lines: VecDeque<String>,
    bytes: usize,
}

impl StderrTail {
    fn push_line(&mut self, line: String) {
        self.bytes = self.bytes.saturating_add(line.len() + 1);
        self.lines.push_back(line);

        while self.lines.len() > STDERR_TAIL_MAX_LINES || self.bytes > STDERR_TAIL_MAX_BYTES {
            match self.lines.pop_front() {
                Some(front) => self.bytes = self.bytes.saturating_sub(front.len() + 1),
                None => break,
            }
        }
    }

    /// The last `ERROR:` line yt-dlp printed, without its prefix.
    fn last_error(&self) -> Option<String> {
        self.lines
            .iter()
            .rev()
            .find_map(|l| l.trim().strip_prefix("ERROR:"))
            .map(|l| l.trim().to_string())
    }

    fn snapshot(&self) -> String {
        self.lines.iter().cloned().collect::<Vec<_>>().join("\n")
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawFormat {
    filesize: Option<f64>,
    filesize_approx: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct RawInfo {
    id: Option<String>,
    title: Option<String>,
    uploader: Option<String>,
    description: Option<String>,
    duration: Option<f64>,
    filesize: Option<f64>,
    filesize_approx: Option<f64>,
    #[serde(default)]
    requested_formats: Vec<RawFormat>,
}

fn as_u64(v: Option<f64>) -> Option<u64> {
    v.filter(|n| n.is_finite() && *n >= 0.0).map(|n| n as u64)
}

impl RawInfo {
    fn into_media_info(self) -> MediaInfo {
        let mut filesize = as_u64(self.filesize);
        let mut filesize_approx = as_u64(self.filesize_approx);

        // Merged video+audio selections only report sizes per stream.
        if filesize.is_none() && filesize_approx.is_none() && !self.requested_formats.is_empty() {
            let sizes: Vec<Option<u64>> = self
                .requested_formats
                .iter()
                .map(|f| as_u64(f.filesize).or(as_u64(f.filesize_approx)))
                .collect();
            if sizes.iter().all(Option::is_some) {
                filesize_approx = Some(sizes.into_iter().flatten().sum());
            }
            filesize = None;
        }

        MediaInfo {
            id: self.id,
            title: self.title,
            uploader: self.uploader,
            description: self.description,
            duration_secs: as_u64(self.duration),
            filesize,
            filesize_approx,
        }
    }
}

pub fn parse_info(json: &str) -> Result<MediaInfo> {
    let raw: RawInfo = serde_json::from_str(json)?;
    Ok(raw.into_media_info())
}

fn common_args(args: &mut Vec<String>, spec: &DownloadSpec) {
    args.extend(["--no-playlist", "--no-warnings", "-f"].map(String::from));
    args.push(spec.format.clone());
    if let Some(cookies) = &spec.cookies_file {
        args.push("--cookies".to_string());
        args.push(cookies.to_string_lossy().into_owned());
    }
}

pub fn probe_args(url: &str, spec: &DownloadSpec) -> Vec<String> {
    let mut args = vec!["--dump-single-json".to_string()];
    common_args(&mut args, spec);
    args.push("--".to_string());
    args.push(url.to_string());
    args
}

pub fn download_args(url: &str, spec: &DownloadSpec) -> Vec<String> {
    let mut args = Vec::new();
    common_args(&mut args, spec);
    args.push("-o".to_string());
    args.push(spec.output_template.clone());
    if let Some(kbps) = spec.extract_audio_kbps {
        args.extend(["-x", "--audio-format", "mp3", "--audio-quality"].map(String::from));
        args.push(format!("{kbps}K"));
    }
    args.extend(
        [
            "--no-progress",
            "--no-simulate",
            "--print",
            "after_move:filepath",
            "--",
        ]
        .map(String::from),
    );
    args.push(url.to_string());
    args
}

impl YtDlpClient {
    pub fn new(cfg: YtDlpConfig) -> Self {
        Self { cfg }
    }

    pub fn program(&self) -> &Path {
        &self.cfg.program
    }

    /// Run yt-dlp to completion and return its stdout.
    async fn run(&self, args: &[String]) -> Result<String> {
        let mut child = Command::new(&self.cfg.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                Error::External(format!(
                    "could not start {}: {e}",
                    self.cfg.program.display()
                ))
            })?;

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::External("yt-dlp stdout was not captured".to_string()))?;
        let stderr_tail = Arc::new(Mutex::new(StderrTail::default()));

        // Drain stderr in background to avoid blocking on a full pipe.
        let drain = child.stderr.take().map(|stderr| {
            let tail = stderr_tail.clone();
            tokio::spawn(async move {
                let mut r = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = r.next_line().await {
                    tail.lock().await.push_line(line);
                }
            })
        });

        let work = async {
            let mut out = String::new();
            stdout.read_to_string(&mut out).await?;
            let status = child.wait().await?;
            Ok::<_, std::io::Error>((out, status))
        };
        let outcome = tokio::time::timeout(self.cfg.timeout, work).await;

        let (out, status) = match outcome {
            Ok(res) => res?,
            Err(_) => {
                if let Err(e) = child.kill().await {
                    tracing::warn!("failed to kill timed out yt-dlp: {e}");
                }
                return Err(Error::External(format!(
                    "timed out after {}s",
                    self.cfg.timeout.as_secs()
                )));
            }
        };
        if let Some(drain) = drain {
            if let Err(e) = drain.await {
                tracing::debug!("stderr drain task failed: {e}");
            }
        }

        if !status.success() {
            let tail = stderr_tail.lock().await;
            if let Some(err) = tail.last_error() {
                return Err(Error::External(err));
            }
            let stderr = tail.snapshot();
            tracing::debug!(%status, stderr = %stderr, "yt-dlp failed");
            return Err(Error::External(format!("yt-dlp exited with status {status}")));
        }
        Ok(out)
    }
}

#[async_trait]
impl MediaFetcher for YtDlpClient {
    async fn probe(&self, url: &str, spec: &DownloadSpec) -> Result<MediaInfo> {
        let out = self.run(&probe_args(url, spec)).await?;
        parse_info(&out)
    }

    async fn download(&self, url: &str, spec: &DownloadSpec) -> Result<PathBuf> {
        let out = self.run(&download_args(url, spec)).await?;
        let path = out
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .last()
            .ok_or_else(|| Error::External("yt-dlp did not report an output file".to_string()))?;
        tracing::debug!(url, path, "yt-dlp finished");
        Ok(PathBuf::from(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(audio: Option<u32>) -> DownloadSpec {
        DownloadSpec {
            format: "best[height<=1080]/best".to_string(),
            extract_audio_kbps: audio,
            output_template: "downloads/%(title)s_%(id)s.%(ext)s".to_string(),
            cookies_file: Some(PathBuf::from("youtube_cookies.txt")),
        }
    }

    #[test]
    fn probe_args_dump_json_for_one_video() {
        let args = probe_args("https://youtu.be/x", &spec(None));
        assert_eq!(
            args,
            vec![
                "--dump-single-json",
                "--no-playlist",
                "--no-warnings",
                "-f",
                "best[height<=1080]/best",
                "--cookies",
                "youtube_cookies.txt",
                "--",
                "https://youtu.be/x",
            ]
        );
    }

    #[test]
    fn audio_download_extracts_mp3_at_bitrate() {
        let args = download_args("https://youtu.be/x", &spec(Some(128)));
        let joined = args.join(" ");
        assert!(joined.contains("-x --audio-format mp3 --audio-quality 128K"));
        assert!(joined.contains("-o downloads/%(title)s_%(id)s.%(ext)s"));
        assert!(joined.ends_with("--print after_move:filepath -- https://youtu.be/x"));
    }

    #[test]
    fn video_download_has_no_extraction() {
        let args = download_args("https://youtu.be/x", &spec(None));
        assert!(!args.contains(&"-x".to_string()));
    }

    #[test]
    fn parses_probe_json() {
        let info = parse_info(
            r#"{"id":"abc","title":"Clip","uploader":"Chan","duration":61.4,
                "filesize":null,"filesize_approx":1048576.7,"description":"d"}"#,
        )
        .unwrap();
        assert_eq!(info.id.as_deref(), Some("abc"));
        assert_eq!(info.duration_secs, Some(61));
        assert_eq!(info.filesize, None);
        assert_eq!(info.filesize_approx, Some(1_048_576));
    }

    #[test]
    fn merged_formats_sum_stream_sizes() {
        let info = parse_info(
            r#"{"title":"Clip","requested_formats":[{"filesize":100},{"filesize_approx":50}]}"#,
        )
        .unwrap();
        assert_eq!(info.filesize_approx, Some(150));

        let unknown =
            parse_info(r#"{"requested_formats":[{"filesize":100},{}]}"#).unwrap();
        assert_eq!(unknown.filesize_approx, None);
    }

    #[test]
    fn stderr_tail_keeps_last_error() {
        let mut tail = StderrTail::default();
        tail.push_line("[youtube] abc: Downloading webpage".to_string());
        tail.push_line("ERROR: [youtube] abc: Video unavailable".to_string());
        assert_eq!(
            tail.last_error().as_deref(),
            Some("[youtube] abc: Video unavailable")
        );

        for i in 0..(STDERR_TAIL_MAX_LINES + 10) {
            tail.push_line(format!("line {i}"));
        }
        assert_eq!(tail.lines.len(), STDERR_TAIL_MAX_LINES);
        assert!(tail.last_error().is_none());
    }

    #[cfg(unix)]
    fn fake_ytdlp(dir: &Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("yt-dlp");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn download_returns_last_printed_path() {
        let dir = tempfile::tempdir().unwrap();
        let program = fake_ytdlp(
            dir.path(),
            "echo 'downloads/Clip_abc.webm'\necho 'downloads/Clip_abc.mp3'",
        );
        let client = YtDlpClient::new(YtDlpConfig {
            program,
            timeout: Duration::from_secs(10),
        });
        let path = client
            .download("https://youtu.be/x", &spec(Some(128)))
            .await
            .unwrap();
        assert_eq!(path, PathBuf::from("downloads/Clip_abc.mp3"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failure_surfaces_error_line() {
        let dir = tempfile::tempdir().unwrap();
        let program = fake_ytdlp(
            dir.path(),
            "echo 'ERROR: [youtube] x: Private video' >&2\nexit 1",
        );
        let client = YtDlpClient::new(YtDlpConfig {
            program,
            timeout: Duration::from_secs(10),
        });
        let err = client
            .probe("https://youtu.be/x", &spec(None))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "[youtube] x: Private video");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn slow_process_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let program = fake_ytdlp(dir.path(), "sleep 5");
        let client = YtDlpClient::new(YtDlpConfig {
            program,
            timeout: Duration::from_millis(200),
        });
        let err = client
            .probe("https://youtu.be/x", &spec(None))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }
}
