use std::sync::Arc;

use teloxide::{
    prelude::*,
    types::{MessageEntity, MessageEntityKind},
};

use smb_core::urls::LinkEntity;

use super::{log_failure, sender};
use crate::router::AppState;

pub async fn handle_text(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(user) = msg.from() else {
        return Ok(());
    };
    let Some(text) = msg.text() else {
        return Ok(());
    };

    let from = sender(msg.chat.id, user);
    let entities = link_entities(msg.entities().unwrap_or_default());
    let result = state.bot.handle_text(&from, text, &entities).await;
    log_failure("text", &from, result);
    Ok(())
}

/// Keep the link entities; offsets stay in UTF-16 code units.
fn link_entities(entities: &[MessageEntity]) -> Vec<LinkEntity> {
    entities
        .iter()
        .filter_map(|e| match &e.kind {
            MessageEntityKind::Url => Some(LinkEntity::Url {
                offset: e.offset,
                length: e.length,
            }),
            MessageEntityKind::TextLink { url } => Some(LinkEntity::TextLink {
                url: url.to_string(),
            }),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_only_links() {
        let entities = vec![
            MessageEntity::new(MessageEntityKind::Bold, 0, 4),
            MessageEntity::new(MessageEntityKind::Url, 5, 20),
            MessageEntity::new(
                MessageEntityKind::TextLink {
                    url: "https://example.com/a".parse().unwrap(),
                },
                0,
                4,
            ),
        ];
        assert_eq!(
            link_entities(&entities),
            vec![
                LinkEntity::Url {
                    offset: 5,
                    length: 20
                },
                LinkEntity::TextLink {
                    url: "https://example.com/a".to_string()
                },
            ]
        );
    }
}
