use serde::{Deserialize, Serialize};
use tracing::info;

use super::{format_alert, Notifier};
use crate::error::NotifyError;

const API_BASE: &str = "https://api.telegram.org";

/// Posts alerts to a Telegram chat through the Bot API.
pub struct TelegramNotifier {
    token: String,
    chat_id: String,
    title: String,
    client: reqwest::blocking::Client,
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: String,
    parse_mode: &'static str,
    disable_web_page_preview: bool,
}

#[derive(Debug, Deserialize)]
struct ApiReply {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

impl TelegramNotifier {
    pub fn new(token: &str, chat_id: &str, title: &str, timeout_secs: u64) -> Self {
        TelegramNotifier {
            token: token.to_string(),
            chat_id: chat_id.to_string(),
            title: title.to_string(),
            client: crate::source::http_client(timeout_secs),
        }
    }

    fn payload(&self, code: &str, provenance_link: &str) -> SendMessage<'_> {
        SendMessage {
            chat_id: &self.chat_id,
            text: format_alert(&self.title, code, provenance_link),
            parse_mode: "Markdown",
            disable_web_page_preview: true,
        }
    }
}

impl Notifier for TelegramNotifier {
    fn send(&self, code: &str, provenance_link: &str) -> Result<(), NotifyError> {
        let url = format!("{}/bot{}/sendMessage", API_BASE, self.token);
        let resp = self
            .client
            .post(&url)
            .json(&self.payload(code, provenance_link))
            .send()?;
        let status = resp.status();
        let body = resp.text()?;
        if !status.is_success() {
            return Err(NotifyError::Status {
                status: status.as_u16(),
                body,
            });
        }
        check_reply(&body)?;
        info!("Sent code to Telegram: {}", code);
        Ok(())
    }
}

fn check_reply(body: &str) -> Result<(), NotifyError> {
    let reply: ApiReply =
        serde_json::from_str(body).map_err(|e| NotifyError::Rejected(e.to_string()))?;
    if reply.ok {
        Ok(())
    } else {
        Err(NotifyError::Rejected(
            reply.description.unwrap_or_else(|| "no description".into()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_matches_bot_api() {
        let n = TelegramNotifier::new("tok", "@chan", "New Tacticus Code Found!", 5);
        let v = serde_json::to_value(n.payload("ABCD1234", "https://example.test/x")).unwrap();
        assert_eq!(v["chat_id"], "@chan");
        assert_eq!(v["parse_mode"], "Markdown");
        assert_eq!(v["disable_web_page_preview"], true);
        assert!(v["text"].as_str().unwrap().contains("`ABCD1234`"));
    }

    #[test]
    fn reply_ok_flag_decides() {
        assert!(check_reply(r#"{"ok":true,"result":{}}"#).is_ok());
        match check_reply(r#"{"ok":false,"description":"Bad Request: chat not found"}"#) {
            Err(NotifyError::Rejected(d)) => assert!(d.contains("chat not found")),
            other => panic!("unexpected {:?}", other),
        }
        assert!(check_reply("not json").is_err());
    }
}
