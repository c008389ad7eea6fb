//! URL extraction from chat messages and routing to the right feature.

const YOUTUBE_DOMAINS: [&str; 4] = ["youtube.com", "youtu.be", "m.youtube.com", "youtube.be"];

/// A link entity attached to a message by Telegram.
///
/// Offsets and lengths are in UTF-16 code units, as the Bot API reports them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LinkEntity {
    /// A URL typed in the message text.
    Url { offset: usize, length: usize },
    /// Text with a hidden target URL.
    TextLink { url: String },
}

/// Where a URL should be sent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Route {
    Download(String),
    Summarize(String),
}

/// Pick the URL a message is about: the first link entity, else the trimmed text.
pub fn extract_url(text: &str, entities: &[LinkEntity]) -> String {
    for entity in entities {
        match entity {
            LinkEntity::TextLink { url } if !url.is_empty() => return url.clone(),
            LinkEntity::TextLink { .. } => continue,
            LinkEntity::Url { offset, length } => {
                if let Some(url) = utf16_slice(text, *offset, *length) {
                    return url;
                }
            }
        }
    }
    text.trim().to_string()
}

pub fn is_youtube_url(url: &str) -> bool {
    let lower = url.to_lowercase();
    YOUTUBE_DOMAINS.iter().any(|d| lower.contains(d))
}

pub fn route(url: String) -> Route {
    if is_youtube_url(&url) {
        Route::Download(url)
    } else {
        Route::Summarize(url)
    }
}

fn utf16_slice(text: &str, offset: usize, length: usize) -> Option<String> {
    let units: Vec<u16> = text.encode_utf16().collect();
    let end = offset.checked_add(length)?;
    let slice = units.get(offset..end)?;
    String::from_utf16(slice).ok()
}
