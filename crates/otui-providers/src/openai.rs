//! OpenAI's Chat Completions API: SSE framing over `/v1/chat/completions`,
//! Bearer auth.

use async_trait::async_trait;
use secrecy::{ExposeSecret, Secret};
use serde_json::json;

use crate::{
    error::{Error, Result},
    http::{classify_response, sse_data_lines},
    leak,
    sse::{OpenAiStreamState, SseOutcome, finalize_tool_calls, process_openai_sse_line},
    tool_schema::to_openai_tools,
    traits::{CHAT_STREAM_TIMEOUT, ChatStream, ProviderAdapter, with_total_timeout},
    types::{Message, ModelInfo, StreamEvent, ToolSchema, role_str},
};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub struct OpenAiAdapter {
    client: reqwest::Client,
    api_key: Secret<String>,
    base_url: String,
    model: String,
}

impl OpenAiAdapter {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self { client: reqwest::Client::new(), api_key: Secret::new(api_key.into()), base_url: DEFAULT_BASE_URL.to_string(), model: model.into() }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

fn messages_to_json(messages: &[Message]) -> Vec<serde_json::Value> {
    messages.iter().map(|m| json!({ "role": role_str(&m.role), "content": m.content })).collect()
}

#[async_trait]
impl ProviderAdapter for OpenAiAdapter {
    async fn chat_stream<'a>(&'a self, messages: &'a [Message], tools: Option<&'a [ToolSchema]>) -> Result<ChatStream<'a>> {
        let body = json!({
            "model": self.model,
            "messages": messages_to_json(messages),
            "stream": true,
            "tools": tools.map(to_openai_tools).unwrap_or_default(),
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;
        let response = classify_response(response).await?;
        let lines = sse_data_lines(response);

        let stream = async_stream::stream! {
            let mut state = OpenAiStreamState::default();
            let mut full_text = String::new();
            let mut saw_native_tool_call = false;
            tokio::pin!(lines);

            while let Some(line) = futures::StreamExt::next(&mut lines).await {
                let data = match line {
                    Ok(d) => d,
                    Err(e) => { yield Err(e); return; },
                };
                match process_openai_sse_line(&data, &mut state) {
                    SseOutcome::Done => break,
                    SseOutcome::Skip => {},
                    SseOutcome::Text(t) => full_text.push_str(&t),
                }
            }

            let calls = finalize_tool_calls(&mut state);
            if !calls.is_empty() {
                saw_native_tool_call = true;
            }

            let (leaked, cleaned) = leak::leak_and_clean(&full_text, !saw_native_tool_call);
            if !cleaned.is_empty() {
                yield Ok(StreamEvent::TextDelta(cleaned));
            }
            if saw_native_tool_call {
                yield Ok(StreamEvent::ToolCalls(calls));
            } else if let Some(call) = leaked {
                yield Ok(StreamEvent::ToolCalls(vec![call]));
            }
            yield Ok(StreamEvent::Done);
        };

        Ok(Box::pin(with_total_timeout(stream, CHAT_STREAM_TIMEOUT)))
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let response = self
            .client
            .get(format!("{}/models", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .send()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;
        let response = classify_response(response).await?;
        let payload: serde_json::Value = response.json().await.map_err(|e| Error::MalformedResponse(e.to_string()))?;

        let models = payload["data"]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|m| m["id"].as_str())
                    .map(|id| ModelInfo { display_name: id.to_string(), internal_name: id.to_string(), provider: "openai".to_string(), size: None })
                    .collect()
            })
            .unwrap_or_default();
        Ok(models)
    }

    async fn ping(&self) -> Result<()> {
        let response = self
            .client
            .get(format!("{}/models", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .timeout(std::time::Duration::from_secs(5))
            .send()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;
        classify_response(response).await?;
        Ok(())
    }

    fn get_model(&self) -> &str {
        &self.model
    }

    fn get_display_name(&self) -> &str {
        &self.model
    }

    fn set_model(&mut self, model: String) {
        self.model = model;
    }
}
