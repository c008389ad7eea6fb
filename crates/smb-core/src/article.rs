//! Article body extraction from raw HTML.

use scraper::{Html, Selector};

use crate::{errors::Error, Result};

/// Page furniture whose paragraphs are never article text.
const SKIPPED_CONTAINERS: [&str; 6] = ["script", "style", "nav", "footer", "aside", "header"];

/// Paragraphs at or below this many characters are treated as captions/boilerplate.
const MIN_PARAGRAPH_CHARS: usize = 50;

/// Collect up to `max_paragraphs` substantial `<p>` texts, joined by a space
/// with all whitespace runs collapsed.
pub fn extract_article_text(html: &str, max_paragraphs: usize) -> Result<String> {
    let document = Html::parse_document(html);
    let selector =
        Selector::parse("p").map_err(|e| Error::External(format!("selector error: {e}")))?;

    let mut paragraphs: Vec<String> = Vec::new();
    for p in document.select(&selector) {
        if paragraphs.len() >= max_paragraphs {
            break;
        }

        let inside_furniture = p.ancestors().any(|node| {
            node.value()
                .as_element()
                .is_some_and(|el| SKIPPED_CONTAINERS.contains(&el.name()))
        });
        if inside_furniture {
            continue;
        }

        let text = p.text().collect::<String>();
        let text = text.trim();
        if text.chars().count() > MIN_PARAGRAPH_CHARS {
            paragraphs.push(text.to_string());
        }
    }

    Ok(collapse_whitespace(&paragraphs.join(" ")))
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Keep at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
