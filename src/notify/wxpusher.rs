use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{Message, Notifier};
use crate::{AlertError, Result};

pub const DEFAULT_ENDPOINT: &str = "https://wxpusher.zjiecode.com/api/send/message";

/// WxPusher reports success in the body, not the HTTP status.
const CODE_OK: i64 = 1000;
const CONTENT_TYPE_TEXT: u8 = 1;

#[derive(Clone)]
pub struct WxPusherNotifier {
    token: String,
    uid: String,
    endpoint: String,
    client: Client,
    timeout: Duration,
}

impl WxPusherNotifier {
    pub fn new(token: String, uid: String) -> Self {
        Self {
            token,
            uid,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            client: Client::new(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_endpoint(mut self, url: String) -> Self {
        self.endpoint = url;
        self
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SendRequest<'a> {
    app_token: &'a str,
    content: &'a str,
    summary: &'a str,
    content_type: u8,
    topic_ids: Vec<u64>,
    uids: Vec<&'a str>,
    url: &'a str,
}

#[derive(Deserialize)]
struct SendResponse {
    code: i64,
    #[serde(default)]
    msg: Option<String>,
}

#[async_trait::async_trait]
impl Notifier for WxPusherNotifier {
    async fn send(&self, msg: &Message) -> Result<()> {
        let body = SendRequest {
            app_token: &self.token,
            content: &msg.content,
            summary: &msg.summary,
            content_type: CONTENT_TYPE_TEXT,
            topic_ids: Vec::new(),
            uids: vec![&self.uid],
            url: "",
        };

        let resp = self
            .client
            .post(&self.endpoint)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| AlertError::notifier(format!("wxpusher request failed: {e}")))?
            .error_for_status()
            .map_err(|e| AlertError::notifier(format!("wxpusher HTTP error: {e}")))?;

        let parsed: SendResponse = resp
            .json()
            .await
            .map_err(|e| AlertError::notifier(format!("wxpusher response unreadable: {e}")))?;

        if parsed.code != CODE_OK {
            return Err(AlertError::notifier(format!(
                "wxpusher rejected message: code {} ({})",
                parsed.code,
                parsed.msg.unwrap_or_default()
            )));
        }
        tracing::info!(summary = %msg.summary, "wxpusher notification sent");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "wxpusher"
    }
}
