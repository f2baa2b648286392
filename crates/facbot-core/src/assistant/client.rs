//! HTTP client for a hosted assistants API (threads, messages, streamed runs).

use std::time::Duration;

use eventsource_stream::{Event, EventStreamError, Eventsource};
use futures_util::{Stream, StreamExt};
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use super::prompt::{extraction_prompt, strip_citations};
use super::{Assistant, Result};
use crate::error::RemoteServiceError;
use crate::models::config::AssistantConfig;

const BETA_HEADER: &str = "assistants=v2";

/// Client bound to one preconfigured assistant.
///
/// Every call opens a fresh thread, posts a single user message and drains a
/// streamed run until the service reports completion.
#[derive(Debug, Clone)]
pub struct AssistantClient {
    http: Client,
    base_url: String,
    assistant_id: String,
    api_key: String,
}

impl AssistantClient {
    /// Create a client from explicit parts.
    pub fn new(
        base_url: impl Into<String>,
        assistant_id: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let assistant_id = assistant_id.into();
        if assistant_id.trim().is_empty() {
            return Err(RemoteServiceError::Config("assistant id is empty".to_string()));
        }

        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            http: builder.build()?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            assistant_id,
            api_key: api_key.into(),
        })
    }

    /// Create a client from the assistant configuration section.
    pub fn from_config(config: &AssistantConfig) -> Result<Self> {
        let api_key = resolve_api_key(config)?;
        Self::new(
            config.base_url.clone(),
            config.assistant_id.clone(),
            api_key,
            config.timeout_secs.map(Duration::from_secs),
        )
    }

    async fn ask(&self, content: &str) -> Result<String> {
        let thread_id = self.create_thread().await?;
        debug!("Created thread {}", thread_id);

        self.post_message(&thread_id, content).await?;
        let reply = self.run_to_completion(&thread_id).await?;
        clean_reply(&reply)
    }

    async fn create_thread(&self) -> Result<String> {
        let response = self
            .http
            .post(self.url("/threads"))
            .bearer_auth(&self.api_key)
            .header("OpenAI-Beta", BETA_HEADER)
            .json(&json!({}))
            .send()
            .await?;

        let thread: ObjectId = check_status(response).await?.json().await?;
        Ok(thread.id)
    }

    async fn post_message(&self, thread_id: &str, content: &str) -> Result<()> {
        let response = self
            .http
            .post(self.url(&format!("/threads/{thread_id}/messages")))
            .bearer_auth(&self.api_key)
            .header("OpenAI-Beta", BETA_HEADER)
            .json(&json!({ "role": "user", "content": content }))
            .send()
            .await?;

        check_status(response).await?;
        Ok(())
    }

    async fn run_to_completion(&self, thread_id: &str) -> Result<String> {
        let response = self
            .http
            .post(self.url(&format!("/threads/{thread_id}/runs")))
            .bearer_auth(&self.api_key)
            .header("OpenAI-Beta", BETA_HEADER)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(&json!({ "assistant_id": self.assistant_id, "stream": true }))
            .send()
            .await?;

        let response = check_status(response).await?;
        collect_run(response.bytes_stream()).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Assistant for AssistantClient {
    async fn extract_invoice(&self, invoice_text: &str) -> Result<String> {
        debug!("Requesting extraction for {} chars of invoice text", invoice_text.len());
        self.ask(&extraction_prompt(invoice_text)).await
    }

    async fn chat(&self, message: &str) -> Result<String> {
        self.ask(message).await
    }
}

/// Drain a run's event stream into the reply text.
async fn collect_run<S, B>(body: S) -> Result<String>
where
    S: Stream<Item = std::result::Result<B, reqwest::Error>>,
    B: AsRef<[u8]>,
{
    let mut events = std::pin::pin!(body.eventsource());
    let mut collector = RunCollector::default();

    while let Some(event) = events.next().await {
        let event = event.map_err(|e| match e {
            EventStreamError::Transport(e) => RemoteServiceError::Http(e),
            other => RemoteServiceError::Stream(other.to_string()),
        })?;
        collector.apply(&event)?;
        if collector.done {
            break;
        }
    }

    collector.finish()
}

/// Strip citation markers; a reply with nothing left is an error.
fn clean_reply(reply: &str) -> Result<String> {
    let reply = strip_citations(reply);
    if reply.trim().is_empty() {
        return Err(RemoteServiceError::EmptyReply);
    }
    info!("Assistant replied with {} chars", reply.len());
    Ok(reply)
}

/// Environment variable first, then the key file.
fn resolve_api_key(config: &AssistantConfig) -> Result<String> {
    if let Ok(key) = std::env::var(&config.api_key_env) {
        if !key.trim().is_empty() {
            return Ok(key.trim().to_string());
        }
    }

    if let Some(path) = &config.api_key_file {
        let key = std::fs::read_to_string(path).map_err(|e| {
            RemoteServiceError::Config(format!("cannot read key file {}: {}", path.display(), e))
        })?;
        if !key.trim().is_empty() {
            return Ok(key.trim().to_string());
        }
    }

    Err(RemoteServiceError::Config(format!(
        "no API key in ${} or a key file",
        config.api_key_env
    )))
}

async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    warn!("Assistant service returned {}", status);
    Err(RemoteServiceError::Status {
        status: status.as_u16(),
        body,
    })
}

#[derive(Debug, Deserialize)]
struct ObjectId {
    id: String,
}

#[derive(Debug, Deserialize)]
struct MessageObject {
    #[serde(default)]
    content: Vec<ContentPart>,
}

#[derive(Debug, Deserialize)]
struct MessageDeltaEvent {
    delta: MessageObject,
}

#[derive(Debug, Deserialize)]
struct ContentPart {
    #[serde(default)]
    text: Option<TextPart>,
}

#[derive(Debug, Deserialize)]
struct TextPart {
    #[serde(default)]
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RunObject {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    last_error: Option<RunError>,
}

#[derive(Debug, Deserialize)]
struct RunError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl MessageObject {
    fn first_text(&self) -> Option<String> {
        self.content
            .iter()
            .find_map(|part| part.text.as_ref().and_then(|t| t.value.clone()))
    }
}

impl RunObject {
    fn describe(&self, fallback: &str) -> String {
        let status = self.status.as_deref().unwrap_or(fallback);
        match &self.last_error {
            Some(RunError { code, message }) => format!(
                "{} ({}: {})",
                status,
                code.as_deref().unwrap_or("error"),
                message.as_deref().unwrap_or("no message")
            ),
            None => status.to_string(),
        }
    }
}

/// Folds run events into the final reply text.
#[derive(Debug, Default)]
struct RunCollector {
    deltas: String,
    completed: Option<String>,
    done: bool,
}

impl RunCollector {
    fn apply(&mut self, event: &Event) -> Result<()> {
        if event.data == "[DONE]" {
            self.done = true;
            return Ok(());
        }

        match event.event.as_str() {
            "thread.message.delta" => {
                let delta: MessageDeltaEvent = serde_json::from_str(&event.data)?;
                for part in delta.delta.content {
                    if let Some(value) = part.text.and_then(|t| t.value) {
                        self.deltas.push_str(&value);
                    }
                }
            }
            "thread.message.completed" => {
                if self.completed.is_none() {
                    let message: MessageObject = serde_json::from_str(&event.data)?;
                    self.completed = message.first_text();
                }
            }
            "thread.run.failed" | "thread.run.cancelled" | "thread.run.expired" => {
                let fallback = event.event.trim_start_matches("thread.run.");
                let run: RunObject = serde_json::from_str(&event.data)?;
                return Err(RemoteServiceError::RunFailed(run.describe(fallback)));
            }
            "thread.run.requires_action" => {
                return Err(RemoteServiceError::RunFailed(
                    "assistant requested a tool call".to_string(),
                ));
            }
            "error" => {
                return Err(RemoteServiceError::Stream(event.data.clone()));
            }
            "thread.run.completed" | "done" => self.done = true,
            other => debug!("Skipping run event {}", other),
        }
        Ok(())
    }

    fn finish(self) -> Result<String> {
        if !self.done && self.completed.is_none() {
            return Err(RemoteServiceError::Stream(
                "stream ended before the run completed".to_string(),
            ));
        }
        let text = self.completed.unwrap_or(self.deltas);
        if text.trim().is_empty() {
            return Err(RemoteServiceError::EmptyReply);
        }
        Ok(text)
    }
}
