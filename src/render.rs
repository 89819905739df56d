use serde::Serialize;

use crate::models::{ChatMessage, Role};

/// Presentation bucket for one log entry. The host decides alignment and
/// styling; this module only classifies.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BubbleKind {
    /// The first system message, shown as a left-aligned assistant bubble.
    Welcome,
    /// Centered chip announcing that the summary was replaced.
    UpdateNotice,
    /// Centered chip announcing an explicit mode switch.
    ModeNotice,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DisplayMessage {
    pub kind: BubbleKind,
    pub content: String,
}

/// Map the message log to its display order. System messages after the first
/// are classified by substring into notification chips; ones matching neither
/// bucket are suppressed. The log itself is never mutated.
pub fn render_history(history: &[ChatMessage]) -> Vec<DisplayMessage> {
    let mut seen_system = false;
    let mut out = Vec::with_capacity(history.len());

    for message in history {
        let kind = match message.role {
            Role::System => {
                if !seen_system {
                    seen_system = true;
                    Some(BubbleKind::Welcome)
                } else {
                    classify_notification(&message.content)
                }
            }
            Role::User => Some(BubbleKind::User),
            Role::Assistant => Some(BubbleKind::Assistant),
        };

        if let Some(kind) = kind {
            out.push(DisplayMessage {
                kind,
                content: message.content.clone(),
            });
        }
    }

    out
}

fn classify_notification(content: &str) -> Option<BubbleKind> {
    if content.contains("summary has been") || content.contains('✅') {
        Some(BubbleKind::UpdateNotice)
    } else if content.contains("Switched to") {
        Some(BubbleKind::ModeNotice)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{GREETING, SUMMARY_UPDATED_NOTICE, UPDATE_MODE_NOTICE};

    #[test]
    fn first_system_message_is_the_welcome_bubble() {
        let history = vec![ChatMessage::system(GREETING)];
        let rendered = render_history(&history);
        assert_eq!(rendered.len(), 1);
        assert_eq!(rendered[0].kind, BubbleKind::Welcome);
    }

    #[test]
    fn later_system_messages_become_notification_chips() {
        let history = vec![
            ChatMessage::system(GREETING),
            ChatMessage::user("rewrite the summary"),
            ChatMessage::system(SUMMARY_UPDATED_NOTICE),
            ChatMessage::assistant("Done."),
            ChatMessage::system(UPDATE_MODE_NOTICE),
        ];

        let kinds: Vec<BubbleKind> = render_history(&history)
            .into_iter()
            .map(|message| message.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                BubbleKind::Welcome,
                BubbleKind::User,
                BubbleKind::UpdateNotice,
                BubbleKind::Assistant,
                BubbleKind::ModeNotice,
            ]
        );
    }

    #[test]
    fn unrecognized_system_messages_are_suppressed() {
        let history = vec![
            ChatMessage::system(GREETING),
            ChatMessage::system("internal marker"),
            ChatMessage::user("hello"),
        ];

        let rendered = render_history(&history);
        assert_eq!(rendered.len(), 2);
        assert_eq!(rendered[0].kind, BubbleKind::Welcome);
        assert_eq!(rendered[1].kind, BubbleKind::User);
    }
}
