//! Chat webhook payloads.

use legacymark_core::workflow::step_runner::ChatMessage;
use serde_json::{Value, json};

/// Discord incoming webhooks take `{content}`; Slack (and anything else) takes `{text}`.
pub(super) fn webhook_body(message: &ChatMessage) -> Value {
    if is_discord(&message.webhook_url) {
        json!({ "content": message.text })
    } else {
        json!({ "text": message.text })
    }
}

fn is_discord(url: &str) -> bool {
    let url = url.to_ascii_lowercase();
    url.contains("discord.com/api/webhooks") || url.contains("discordapp.com/api/webhooks")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(url: &str) -> ChatMessage {
        ChatMessage {
            webhook_url: url.to_string(),
            text: "Deal won".to_string(),
        }
    }

    #[test]
    fn test_slack_uses_text() {
        let body = webhook_body(&message("https://hooks.slack.com/services/T0/B0/x"));
        assert_eq!(body, json!({"text": "Deal won"}));
    }

    #[test]
    fn test_discord_uses_content() {
        let body = webhook_body(&message("https://discord.com/api/webhooks/1/abc"));
        assert_eq!(body, json!({"content": "Deal won"}));
    }
}
