use anyhow::Context;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use super::{Message, Notifier};
use crate::{AlertError, Result};

pub const DEFAULT_ENDPOINT: &str = "https://www.pushplus.plus/send";

const CODE_OK: i64 = 200;

pub struct PushPlusNotifier {
    token: String,
    endpoint: String,
    client: Client,
    timeout: Duration,
}

impl PushPlusNotifier {
    pub fn new(token: String) -> Self {
        Self {
            token,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            client: Client::new(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_endpoint(mut self, url: String) -> Self {
        self.endpoint = url;
        self
    }

    async fn post(&self, msg: &Message) -> anyhow::Result<()> {
        let body = serde_json::json!({
            "token": self.token,
            "title": msg.summary,
            "content": msg.content,
            "template": "txt",
        });

        #[derive(Deserialize)]
        struct Reply {
            code: i64,
            #[serde(default)]
            msg: Option<String>,
        }

        let reply: Reply = self
            .client
            .post(&self.endpoint)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .context("pushplus post")?
            .error_for_status()
            .context("pushplus non-2xx")?
            .json()
            .await
            .context("pushplus reply")?;

        if reply.code != CODE_OK {
            anyhow::bail!(
                "pushplus rejected message: code {} ({})",
                reply.code,
                reply.msg.unwrap_or_default()
            );
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Notifier for PushPlusNotifier {
    async fn send(&self, msg: &Message) -> Result<()> {
        self.post(msg)
            .await
            .map_err(|e| AlertError::notifier(format!("{e:#}")))?;
        tracing::info!(summary = %msg.summary, "pushplus notification sent");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "pushplus"
    }
}
