//! Anthropic's `/v1/messages`: `x-api-key`/`anthropic-version` headers
//! instead of Bearer auth, a top-level `system` field instead of a system
//! message in the array, and an indexed content-block SSE shape (see
//! `anthropic_sse`). `listModels` returns a curated static catalog rather
//! than querying an endpoint — Anthropic's model lineup changes rarely
//! enough that a hardcoded list is the simpler, more predictable choice.

use async_trait::async_trait;
use secrecy::{ExposeSecret, Secret};
use serde_json::json;

use crate::{
    anthropic_sse::{AnthropicOutcome, AnthropicStreamState, finalize_tool_calls, process_anthropic_event},
    error::{Error, Result},
    http::{classify_response, sse_data_lines},
    leak,
    tool_schema::to_anthropic_tools,
    traits::{CHAT_STREAM_TIMEOUT, ChatStream, ProviderAdapter, with_total_timeout},
    types::{Message, ModelInfo, Role, StreamEvent, ToolSchema},
};

const BASE_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// (model id, display name), newest first.
const ANTHROPIC_MODELS: &[(&str, &str)] = &[
    ("claude-opus-4-5-20251101", "Claude Opus 4.5"),
    ("claude-sonnet-4-5-20250929", "Claude Sonnet 4.5"),
    ("claude-haiku-4-5-20251001", "Claude Haiku 4.5"),
    ("claude-opus-4-1-20250805", "Claude Opus 4.1"),
    ("claude-3-7-sonnet-20250219", "Claude 3.7 Sonnet"),
    ("claude-3-haiku-20240307", "Claude 3 Haiku"),
];

pub struct AnthropicAdapter {
    client: reqwest::Client,
    api_key: Secret<String>,
    model: String,
    max_tokens: u32,
}

impl AnthropicAdapter {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self { client: reqwest::Client::new(), api_key: Secret::new(api_key.into()), model: model.into(), max_tokens: DEFAULT_MAX_TOKENS }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// Anthropic keeps the system prompt out of the message array. Tool-role
/// turns have no first-class mapping onto a plain `Message` yet, so they
/// ride along as a user turn until the orchestrator carries a
/// `tool_use_id` for a proper `tool_result` block.
fn split_system_and_turns(messages: &[Message]) -> (String, Vec<serde_json::Value>) {
    let mut system = String::new();
    let mut turns = Vec::new();
    for message in messages {
        match message.role {
            Role::System => {
                if !system.is_empty() {
                    system.push_str("\n\n");
                }
                system.push_str(&message.content);
            },
            Role::User | Role::Tool => turns.push(json!({ "role": "user", "content": message.content })),
            Role::Assistant => turns.push(json!({ "role": "assistant", "content": message.content })),
        }
    }
    (system, turns)
}

#[async_trait]
impl ProviderAdapter for AnthropicAdapter {
    async fn chat_stream<'a>(&'a self, messages: &'a [Message], tools: Option<&'a [ToolSchema]>) -> Result<ChatStream<'a>> {
        let (system, turns) = split_system_and_turns(messages);

        let mut body = json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "messages": turns,
            "stream": true,
        });
        if !system.is_empty() {
            body["system"] = json!(system);
        }
        if let Some(tools) = tools
            && !tools.is_empty()
        {
            body["tools"] = json!(to_anthropic_tools(tools));
        }

        let response = self
            .client
            .post(format!("{BASE_URL}/messages"))
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;
        let response = classify_response(response).await?;
        let lines = sse_data_lines(response);

        let stream = async_stream::stream! {
            let mut state = AnthropicStreamState::default();
            let mut full_text = String::new();
            let mut saw_native_tool_call = false;
            tokio::pin!(lines);

            while let Some(line) = futures::StreamExt::next(&mut lines).await {
                let data = match line {
                    Ok(d) => d,
                    Err(e) => { yield Err(e); return; },
                };
                match process_anthropic_event(&data, &mut state) {
                    AnthropicOutcome::Done => break,
                    AnthropicOutcome::Skip => {},
                    AnthropicOutcome::Text(t) => full_text.push_str(&t),
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
        Ok(ANTHROPIC_MODELS
            .iter()
            .map(|(id, name)| ModelInfo { display_name: (*name).to_string(), internal_name: (*id).to_string(), provider: "anthropic".to_string(), size: None })
            .collect())
    }

    async fn ping(&self) -> Result<()> {
        let response = self
            .client
            .get(format!("{BASE_URL}/models"))
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", ANTHROPIC_VERSION)
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
        ANTHROPIC_MODELS.iter().find(|(id, _)| *id == self.model).map(|(_, name)| *name).unwrap_or(&self.model)
    }

    fn set_model(&mut self, model: String) {
        self.model = model;
    }
}

#[cfg(test)]
mod tests {
    use otui_common::types::Message as CommonMessage;

    use super::*;

    #[test]
    fn splits_system_prompt_out_of_the_turn_array() {
        let messages = vec![
            CommonMessage::new(Role::System, "be terse", 0),
            CommonMessage::new(Role::User, "hi", 1),
        ];
        let (system, turns) = split_system_and_turns(&messages);
        assert_eq!(system, "be terse");
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0]["role"], "user");
    }

    #[test]
    fn display_name_falls_back_to_model_id_for_unknown_models() {
        let adapter = AnthropicAdapter::new("key", "some-future-model");
        assert_eq!(adapter.get_display_name(), "some-future-model");
    }
}
