//! OpenRouter: OpenAI-wire SSE, plus two OpenRouter-specific rules —
//! tool names are mangled (`.` -> `__`) because the API rejects dots, and
//! Qwen-family models are blacklisted from receiving tool instructions at
//! all (they leak XML when prompted with them).

use async_trait::async_trait;
use secrecy::{ExposeSecret, Secret};
use serde_json::json;

use crate::{
    error::{Error, Result},
    http::{classify_response, sse_data_lines},
    leak,
    openrouter_names::{convert_tool_name_for_openrouter, restore_tool_name_from_openrouter, strip_provider_prefix},
    qwen::is_qwen_blacklisted,
    sse::{OpenAiStreamState, SseOutcome, finalize_tool_calls, process_openai_sse_line},
    tool_schema::to_openai_tools_mangled,
    traits::{CHAT_STREAM_TIMEOUT, ChatStream, ProviderAdapter, with_total_timeout},
    types::{Message, ModelInfo, StreamEvent, ToolCall, ToolSchema, role_str},
};

const BASE_URL: &str = "https://openrouter.ai/api/v1";

pub struct OpenRouterAdapter {
    client: reqwest::Client,
    api_key: Secret<String>,
    model: String,
}

impl OpenRouterAdapter {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self { client: reqwest::Client::new(), api_key: Secret::new(api_key.into()), model: model.into() }
    }
}

fn messages_to_json(messages: &[Message]) -> Vec<serde_json::Value> {
    messages.iter().map(|m| json!({ "role": role_str(&m.role), "content": m.content })).collect()
}

fn restore_names(calls: Vec<ToolCall>) -> Vec<ToolCall> {
    calls.into_iter().map(|c| ToolCall { name: restore_tool_name_from_openrouter(&c.name), ..c }).collect()
}

#[async_trait]
impl ProviderAdapter for OpenRouterAdapter {
    async fn chat_stream<'a>(&'a self, messages: &'a [Message], tools: Option<&'a [ToolSchema]>) -> Result<ChatStream<'a>> {
        let blacklisted = is_qwen_blacklisted(&self.model);
        let tools_json = if blacklisted { Vec::new() } else { tools.map(|t| to_openai_tools_mangled(t, convert_tool_name_for_openrouter)).unwrap_or_default() };

        let body = json!({
            "model": self.model,
            "messages": messages_to_json(messages),
            "stream": true,
            "tools": tools_json,
        });

        let response = self
            .client
            .post(format!("{BASE_URL}/chat/completions"))
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

            let calls = restore_names(finalize_tool_calls(&mut state));
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
                let restored = ToolCall { name: restore_tool_name_from_openrouter(&call.name), ..call };
                yield Ok(StreamEvent::ToolCalls(vec![restored]));
            }
            yield Ok(StreamEvent::Done);
        };

        Ok(Box::pin(with_total_timeout(stream, CHAT_STREAM_TIMEOUT)))
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let response = self
            .client
            .get(format!("{BASE_URL}/models"))
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
                    .map(|id| ModelInfo {
                        display_name: strip_provider_prefix(id).to_string(),
                        internal_name: id.to_string(),
                        provider: "openrouter".to_string(),
                        size: None,
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(models)
    }

    async fn ping(&self) -> Result<()> {
        let response = self
            .client
            .get(format!("{BASE_URL}/models"))
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
        strip_provider_prefix(&self.model)
    }

    fn set_model(&mut self, model: String) {
        self.model = model;
    }
}
