use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{domain::Plan, errors::Error, Result};

const MIB: u64 = 1024 * 1024;

/// Typed configuration for the bot, read from the environment (and `.env`).
#[derive(Clone, Debug)]
pub struct Config {
    // Core
    pub bot_token: String,

    // Quotas
    pub max_free_downloads: u32,
    pub max_free_summaries: u32,
    pub max_premium_downloads: u32,
    pub max_premium_summaries: u32,
    pub premium_price: f64,
    pub premium_days: i64,
    pub trial_days: i64,

    // Storage
    pub download_folder: PathBuf,
    pub user_data_file: PathBuf,

    // yt-dlp
    pub ytdlp_path: PathBuf,
    pub cookies_file: Option<PathBuf>,
    pub download_timeout: Duration,

    // Article fetching
    pub fetch_timeout: Duration,

    // Telegram client
    pub telegram_connect_timeout: Duration,
    pub telegram_request_timeout: Duration,

    // Health server
    pub health_bind: String,
    pub health_port: u16,
}

/// Per-plan constants used by downloads and summaries.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TierLimits {
    pub plan: Plan,
    pub downloads_per_day: u32,
    pub summaries_per_day: u32,
    pub max_file_size: u64,
    pub summary_max_chars: usize,
    pub max_paragraphs: usize,
    pub article_text_limit: usize,
    pub audio_quality_kbps: u32,
    pub video_format: &'static str,
}

impl Config {
    pub fn load() -> Result<Self> {
        // Existing env always wins over `.env`.
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; `load` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let parse = |key: &str| lookup(key).map(|s| s.trim().to_string());

        let bot_token = parse("BOT_TOKEN").unwrap_or_default();
        if bot_token.is_empty() {
            return Err(Error::Config(
                "Bot token not set. Set BOT_TOKEN in your environment or .env".to_string(),
            ));
        }

        let download_folder =
            PathBuf::from(lookup("DOWNLOAD_FOLDER").unwrap_or("downloads".to_string()));
        fs::create_dir_all(&download_folder)?;

        let cookies_file = PathBuf::from(
            lookup("YTDLP_COOKIES_FILE").unwrap_or("youtube_cookies.txt".to_string()),
        );

        Ok(Self {
            bot_token,
            max_free_downloads: parsed(&parse, "MAX_FREE_DOWNLOADS").unwrap_or(3),
            max_free_summaries: parsed(&parse, "MAX_FREE_SUMMARIES").unwrap_or(5),
            max_premium_downloads: parsed(&parse, "MAX_PREMIUM_DOWNLOADS").unwrap_or(100),
            max_premium_summaries: parsed(&parse, "MAX_PREMIUM_SUMMARIES").unwrap_or(50),
            premium_price: parsed(&parse, "PREMIUM_PRICE").unwrap_or(9.99),
            premium_days: parsed(&parse, "PREMIUM_DAYS").unwrap_or(30),
            trial_days: parsed(&parse, "TRIAL_DAYS").unwrap_or(7),
            download_folder,
            user_data_file: PathBuf::from(
                lookup("USER_DATA_FILE").unwrap_or("user_data.json".to_string()),
            ),
            ytdlp_path: lookup("YTDLP_PATH")
                .map(PathBuf::from)
                .or_else(|| which_in_path("yt-dlp"))
                .unwrap_or_else(|| PathBuf::from("yt-dlp")),
            cookies_file: cookies_file.is_file().then_some(cookies_file),
            download_timeout: Duration::from_secs(
                parsed(&parse, "DOWNLOAD_TIMEOUT_SECS").unwrap_or(600),
            ),
            fetch_timeout: Duration::from_secs(parsed(&parse, "FETCH_TIMEOUT_SECS").unwrap_or(15)),
            telegram_connect_timeout: Duration::from_secs(
                parsed(&parse, "TELEGRAM_CONNECT_TIMEOUT_SECS").unwrap_or(20),
            ),
            telegram_request_timeout: Duration::from_secs(
                parsed(&parse, "TELEGRAM_REQUEST_TIMEOUT_SECS").unwrap_or(60),
            ),
            health_bind: lookup("HEALTH_BIND").unwrap_or("0.0.0.0".to_string()),
            health_port: parsed(&parse, "PORT").unwrap_or(10000),
        })
    }

    /// Defaults without touching the environment or the filesystem.
    pub fn with_token(bot_token: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            max_free_downloads: 3,
            max_free_summaries: 5,
            max_premium_downloads: 100,
            max_premium_summaries: 50,
            premium_price: 9.99,
            premium_days: 30,
            trial_days: 7,
            download_folder: PathBuf::from("downloads"),
            user_data_file: PathBuf::from("user_data.json"),
            ytdlp_path: PathBuf::from("yt-dlp"),
            cookies_file: None,
            download_timeout: Duration::from_secs(600),
            fetch_timeout: Duration::from_secs(15),
            telegram_connect_timeout: Duration::from_secs(20),
            telegram_request_timeout: Duration::from_secs(60),
            health_bind: "0.0.0.0".to_string(),
            health_port: 10000,
        }
    }

    pub fn limits(&self, plan: Plan) -> TierLimits {
        match plan {
            Plan::Free => TierLimits {
                plan,
                downloads_per_day: self.max_free_downloads,
                summaries_per_day: self.max_free_summaries,
                max_file_size: 50 * MIB,
                summary_max_chars: 300,
                max_paragraphs: 5,
                article_text_limit: 3000,
                audio_quality_kbps: 128,
                video_format: "best[filesize<50M]/best[height<=480]",
            },
            Plan::Premium => TierLimits {
                plan,
                downloads_per_day: self.max_premium_downloads,
                summaries_per_day: self.max_premium_summaries,
                max_file_size: 500 * MIB,
                summary_max_chars: 500,
                max_paragraphs: 8,
                article_text_limit: 5000,
                audio_quality_kbps: 320,
                video_format: "best[height<=1080]/best",
            },
        }
    }
}

/// Malformed values read as absent so the caller's default applies.
fn parsed<T: std::str::FromStr>(get: impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    get(key).and_then(|s| s.parse::<T>().ok())
}

fn which_in_path(binary: &str) -> Option<PathBuf> {
    let path = env::var_os("PATH")?;
    env::split_paths(&path)
        .map(|dir| dir.join(binary))
        .find(|candidate| is_executable_file(candidate))
}

fn is_executable_file(p: &Path) -> bool {
    if !p.is_file() {
        return false;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Ok(md) = fs::metadata(p) {
            return (md.permissions().mode() & 0o111) != 0;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn premium_limits_are_strictly_larger() {
        let cfg = Config::with_token("t");
        let free = cfg.limits(Plan::Free);
        let premium = cfg.limits(Plan::Premium);

        assert_eq!(free.downloads_per_day, 3);
        assert_eq!(free.summaries_per_day, 5);
        assert_eq!(free.max_file_size, 50 * MIB);
        assert_eq!(premium.max_file_size, 500 * MIB);
        assert!(premium.summary_max_chars > free.summary_max_chars);
        assert!(premium.article_text_limit > free.article_text_limit);
        assert_eq!(premium.audio_quality_kbps, 320);
    }

    fn load_from(pairs: &[(&str, String)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn blank_token_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let folder = dir.path().join("dl").to_string_lossy().into_owned();
        let err = load_from(&[
            ("BOT_TOKEN", "   ".to_string()),
            ("DOWNLOAD_FOLDER", folder),
        ])
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("Bot token not set"));
    }

    #[test]
    fn malformed_numbers_fall_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let folder = dir.path().join("dl");
        let cfg = load_from(&[
            ("BOT_TOKEN", "  123:abc \n".to_string()),
            ("DOWNLOAD_FOLDER", folder.to_string_lossy().into_owned()),
            ("MAX_FREE_DOWNLOADS", "abc".to_string()),
            ("MAX_FREE_SUMMARIES", " 8 ".to_string()),
            ("PORT", "-1".to_string()),
            ("PREMIUM_PRICE", "4.5".to_string()),
            (
                "YTDLP_COOKIES_FILE",
                dir.path().join("missing.txt").to_string_lossy().into_owned(),
            ),
        ])
        .unwrap();

        assert_eq!(cfg.bot_token, "123:abc");
        assert_eq!(cfg.max_free_downloads, 3);
        assert_eq!(cfg.max_free_summaries, 8);
        assert_eq!(cfg.health_port, 10000);
        assert_eq!(cfg.premium_price, 4.5);
        assert_eq!(cfg.cookies_file, None);
        assert!(folder.is_dir());
    }

    #[test]
    fn existing_cookies_file_is_used() {
        let dir = tempfile::tempdir().unwrap();
        let cookies = dir.path().join("cookies.txt");
        fs::write(&cookies, "# Netscape HTTP Cookie File\n").unwrap();
        let cfg = load_from(&[
            ("BOT_TOKEN", "t".to_string()),
            (
                "DOWNLOAD_FOLDER",
                dir.path().join("dl").to_string_lossy().into_owned(),
            ),
            ("YTDLP_COOKIES_FILE", cookies.to_string_lossy().into_owned()),
        ])
        .unwrap();
        assert_eq!(cfg.cookies_file, Some(cookies));
    }

    #[test]
    fn limits_follow_configured_quotas() {
        let mut cfg = Config::with_token("t");
        cfg.max_free_downloads = 10;
        assert_eq!(cfg.limits(Plan::Free).downloads_per_day, 10);
        assert_eq!(cfg.limits(Plan::Premium).downloads_per_day, 100);
    }
}
