//! Small text helpers for Telegram HTML replies.

/// Escape HTML special characters for Telegram HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// `m:ss`, minutes unbounded (a two hour video is `120:00`).
pub fn format_duration(seconds: u64) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

/// First `max_chars` characters followed by `...`.
pub fn preview(text: &str, max_chars: usize) -> String {
    format!("{}...", text.chars().take(max_chars).collect::<String>())
}

/// Cut an HTML string to at most `max_chars` characters without leaving a
/// dangling tag or entity behind. Tags still open at the cut are closed, and
/// the closing tags count towards `max_chars`.
pub fn clamp_html(html: &str, max_chars: usize) -> String {
    if html.chars().count() <= max_chars {
        return html.to_string();
    }

    let mut cut = max_chars;
    loop {
        let mut out: String = html.chars().take(cut).collect();
        if let Some(lt) = out.rfind('<') {
            if !out[lt..].contains('>') {
                out.truncate(lt);
            }
        }
        if let Some(amp) = out.rfind('&') {
            if !out[amp..].contains(';') {
                out.truncate(amp);
            }
        }

        let closers = closing_tags(&out);
        let total = out.chars().count() + closers.chars().count();
        if total <= max_chars || cut == 0 {
            out.push_str(&closers);
            return out;
        }
        cut = cut.saturating_sub(total - max_chars);
    }
}

/// Closing tags for every element left open in `html`, innermost first.
fn closing_tags(html: &str) -> String {
    let mut open: Vec<&str> = Vec::new();
    let mut rest = html;
    while let Some(lt) = rest.find('<') {
        let Some(len) = rest[lt..].find('>') else {
            break;
        };
        let tag = &rest[lt + 1..lt + len];
        rest = &rest[lt + len + 1..];

        if let Some(name) = tag.strip_prefix('/') {
            let name = name.trim();
            if let Some(pos) = open.iter().rposition(|n| n.eq_ignore_ascii_case(name)) {
                open.truncate(pos);
            }
        } else if !tag.ends_with('/') {
            let name = tag.split_whitespace().next().unwrap_or("");
            if !name.is_empty() {
                open.push(name);
            }
        }
    }
    open.iter().rev().map(|n| format!("</{n}>")).collect()
}
