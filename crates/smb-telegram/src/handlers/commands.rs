use std::sync::Arc;

use teloxide::prelude::*;

use super::{log_failure, sender};
use crate::router::AppState;

fn parse_command(text: &str) -> (String, String) {
    // Telegram may send `/cmd@botname arg1 ...`
    let mut parts = text.trim().splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("").trim().to_string();

    let cmd = first
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase();

    (cmd, rest)
}

pub async fn handle_command(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(user) = msg.from() else {
        return Ok(());
    };
    let Some(text) = msg.text() else {
        return Ok(());
    };

    let from = sender(msg.chat.id, user);
    let (cmd, args) = parse_command(text);

    let result = match cmd.as_str() {
        "start" => state.bot.start(&from, &args).await,
        "help" => state.bot.help(from.chat_id).await,
        "audio" => state.bot.audio(&from, &args).await,
        _ => {
            tracing::debug!(cmd, "ignoring unknown command");
            Ok(())
        }
    };
    log_failure(&format!("/{cmd}"), &from, result);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_command_and_payload() {
        assert_eq!(
            parse_command("/start ref_ab12cd34"),
            ("start".to_string(), "ref_ab12cd34".to_string())
        );
        assert_eq!(
            parse_command("/Audio@SmartMediaBot  https://youtu.be/x "),
            ("audio".to_string(), "https://youtu.be/x".to_string())
        );
        assert_eq!(parse_command("/help"), ("help".to_string(), String::new()));
    }
}
