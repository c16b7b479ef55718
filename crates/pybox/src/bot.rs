//! Telegram bot surface.
//!
//! Long-polls the Bot API for incoming messages and answers them with
//! the agent. Every chat gets its own [`Session`], so conversation
//! history never leaks between chats.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use pybox_openai_model::OpenAIProvider;
use pybox_storage::BlobClient;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tokio::time::sleep;

use crate::{Session, SessionBuilder};

const API_BASE: &str = "https://api.telegram.org";

// Long-poll wait on the Telegram side; the HTTP client itself does not
// time out.
const POLL_TIMEOUT_SECS: u64 = 50;

const RETRY_DELAY: Duration = Duration::from_secs(5);

const FALLBACK_REPLY: &str = "Failed to get response from bot";

#[derive(Deserialize)]
struct UpdatesResponse {
    ok: bool,
    #[serde(default)]
    result: Vec<Update>,
    description: Option<String>,
}

#[derive(Deserialize)]
struct Update {
    update_id: i64,
    message: Option<IncomingMessage>,
}

#[derive(Deserialize)]
struct IncomingMessage {
    chat: Chat,
    text: Option<String>,
}

#[derive(Deserialize)]
struct Chat {
    id: i64,
}

/// Runs the bot until the process is terminated.
///
/// Transport errors are logged and retried after a short delay, they
/// never bring the bot down.
pub async fn run_bot(
    token: &str,
    provider: OpenAIProvider,
    blob: Option<BlobClient>,
    output_dir: PathBuf,
) {
    let http = Client::new();
    let mut sessions: HashMap<i64, Session> = HashMap::new();
    let mut offset = 0;

    info!("bot started, waiting for messages");

    loop {
        let updates = match poll_updates(&http, token, offset).await {
            Ok(updates) => updates,
            Err(err) => {
                warn!("failed to poll updates: {err}");
                sleep(RETRY_DELAY).await;
                continue;
            }
        };

        for update in updates {
            offset = offset.max(update.update_id + 1);

            let Some(message) = update.message else {
                continue;
            };
            let Some(text) = message.text else {
                continue;
            };
            let chat_id = message.chat.id;

            send_typing(&http, token, chat_id).await;

            let session = sessions.entry(chat_id).or_insert_with(|| {
                let mut builder =
                    SessionBuilder::with_model_provider(provider.clone())
                        .with_system_prompt(include_str!(
                            "./system_prompt.md"
                        ))
                        .with_output_dir(output_dir.clone());
                if let Some(blob) = blob.clone() {
                    builder = builder.with_blob_client(blob);
                }
                builder.build()
            });

            let reply = match session.send_message(text.trim()).await {
                Ok(reply) => reply,
                Err(err) => {
                    error!("turn failed for chat {chat_id}: {err}");
                    FALLBACK_REPLY.to_owned()
                }
            };
            send_reply(&http, token, chat_id, &reply).await;
        }
    }
}

async fn poll_updates(
    http: &Client,
    token: &str,
    offset: i64,
) -> Result<Vec<Update>, String> {
    let resp = http
        .get(updates_url(token, offset))
        .send()
        .await
        .map_err(|err| format!("{err}"))?;
    let resp: UpdatesResponse =
        resp.json().await.map_err(|err| format!("{err}"))?;
    if !resp.ok {
        return Err(resp
            .description
            .unwrap_or_else(|| "unknown API error".to_owned()));
    }
    Ok(resp.result)
}

fn updates_url(token: &str, offset: i64) -> String {
    format!(
        "{API_BASE}/bot{token}/getUpdates\
         ?timeout={POLL_TIMEOUT_SECS}&offset={offset}"
    )
}

async fn send_typing(http: &Client, token: &str, chat_id: i64) {
    let url = format!("{API_BASE}/bot{token}/sendChatAction");
    let result = http
        .post(url)
        .json(&json!({ "chat_id": chat_id, "action": "typing" }))
        .send()
        .await;
    if let Err(err) = result {
        debug!("failed to send typing action: {err}");
    }
}

async fn send_reply(http: &Client, token: &str, chat_id: i64, text: &str) {
    let url = format!("{API_BASE}/bot{token}/sendMessage");
    let result = http
        .post(url)
        .json(&json!({ "chat_id": chat_id, "text": text }))
        .send()
        .await;
    if let Err(err) = result {
        error!("failed to send reply to chat {chat_id}: {err}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_updates_url_carries_long_poll_parameters() {
        assert_eq!(
            updates_url("123:abc", 42),
            "https://api.telegram.org/bot123:abc/getUpdates\
             ?timeout=50&offset=42"
        );
    }

    #[test]
    fn test_updates_response_parsing() {
        let raw = r#"{
            "ok": true,
            "result": [{
                "update_id": 7,
                "message": {
                    "chat": { "id": 99 },
                    "text": "hello"
                }
            }]
        }"#;
        let resp: UpdatesResponse = serde_json::from_str(raw).unwrap();
        assert!(resp.ok);
        assert_eq!(resp.result[0].update_id, 7);
        let message = resp.result[0].message.as_ref().unwrap();
        assert_eq!(message.chat.id, 99);
        assert_eq!(message.text.as_deref(), Some("hello"));
    }
}
