//! Local Ollama backend: `/api/chat` streams newline-delimited JSON objects
//! (not SSE), and `/api/tags` lists locally-pulled models with their size
//! on disk.

use async_trait::async_trait;
use serde::Deserialize;

use crate::{
    error::{Error, Result},
    http::{classify_response, shared_http_client},
    leak,
    ollama_prompt::build_ollama_messages,
    tool_schema::to_openai_tools,
    traits::{CHAT_STREAM_TIMEOUT, ChatStream, ProviderAdapter, with_total_timeout},
    types::{Message, ModelInfo, StreamEvent, ToolSchema},
};

pub struct OllamaAdapter {
    base_url: String,
    model: String,
}

impl OllamaAdapter {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self { base_url: normalize_base_url(&base_url.into()), model: model.into() }
    }
}

fn normalize_base_url(base_url: &str) -> String {
    let trimmed = base_url.trim_end_matches('/');
    trimmed.strip_suffix("/v1").unwrap_or(trimmed).to_string()
}

#[derive(Debug, Deserialize)]
struct OllamaChatLine {
    #[serde(default)]
    message: Option<OllamaChatMessage>,
    #[serde(default)]
    done: bool,
}

#[derive(Debug, Deserialize)]
struct OllamaChatMessage {
    #[serde(default)]
    content: String,
    #[serde(default)]
    tool_calls: Vec<OllamaToolCall>,
}

#[derive(Debug, Deserialize)]
struct OllamaToolCall {
    function: OllamaToolCallFunction,
}

#[derive(Debug, Deserialize)]
struct OllamaToolCallFunction {
    name: String,
    #[serde(default)]
    arguments: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct OllamaTagEntry {
    name: String,
    #[serde(default)]
    size: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct OllamaTagsPayload {
    #[serde(default)]
    models: Vec<OllamaTagEntry>,
}

#[async_trait]
impl ProviderAdapter for OllamaAdapter {
    async fn chat_stream<'a>(&'a self, messages: &'a [Message], tools: Option<&'a [ToolSchema]>) -> Result<ChatStream<'a>> {
        let tool_names: Vec<String> = tools.unwrap_or_default().iter().map(|t| t.name.clone()).collect();
        let system = messages.iter().find(|m| matches!(m.role, otui_common::types::Role::System)).map(|m| m.content.as_str()).unwrap_or("");
        let conversation: Vec<&Message> = messages.iter().filter(|m| !matches!(m.role, otui_common::types::Role::System)).collect();
        let conversation_owned: Vec<Message> = conversation.into_iter().cloned().collect();

        let body = serde_json::json!({
            "model": self.model,
            "messages": build_ollama_messages(system, &tool_names, &conversation_owned),
            "stream": true,
            "tools": tools.map(to_openai_tools).unwrap_or_default(),
        });

        let response = shared_http_client()
            .post(format!("{}/api/chat", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;
        let response = classify_response(response).await?;

        let stream = async_stream::stream! {
            let mut full_text = String::new();
            let mut native_calls: Vec<crate::types::ToolCall> = Vec::new();
            let mut byte_stream = response.bytes_stream();
            let mut buf = String::new();
            let mut finished = false;

            'outer: while let Some(chunk) = futures::StreamExt::next(&mut byte_stream).await {
                let chunk = match chunk {
                    Ok(c) => c,
                    Err(e) => { yield Err(Error::Transport(e.to_string())); return; },
                };
                buf.push_str(&String::from_utf8_lossy(&chunk));
                while let Some(pos) = buf.find('\n') {
                    let line = buf[..pos].to_string();
                    buf.drain(..=pos);
                    if line.trim().is_empty() { continue; }
                    let Ok(parsed) = serde_json::from_str::<OllamaChatLine>(&line) else { continue };
                    if let Some(msg) = &parsed.message {
                        if !msg.content.is_empty() {
                            full_text.push_str(&msg.content);
                        }
                        if !msg.tool_calls.is_empty() {
                            native_calls.extend(msg.tool_calls.iter().enumerate().map(|(i, tc)| crate::types::ToolCall {
                                id: format!("call-{i}"),
                                name: tc.function.name.clone(),
                                arguments: tc.function.arguments.clone(),
                            }));
                        }
                    }
                    if parsed.done {
                        finished = true;
                        break;
                    }
                }
                if finished {
                    break 'outer;
                }
            }

            let saw_native_tool_call = !native_calls.is_empty();
            let (leaked, cleaned) = leak::leak_and_clean(&full_text, !saw_native_tool_call);
            if !cleaned.is_empty() {
                yield Ok(StreamEvent::TextDelta(cleaned));
            }
            if saw_native_tool_call {
                yield Ok(StreamEvent::ToolCalls(native_calls));
            } else if let Some(call) = leaked {
                yield Ok(StreamEvent::ToolCalls(vec![call]));
            }
            yield Ok(StreamEvent::Done);
        };

        Ok(Box::pin(with_total_timeout(stream, CHAT_STREAM_TIMEOUT)))
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let response = shared_http_client()
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;
        let response = classify_response(response).await?;
        let payload: OllamaTagsPayload = response.json().await.map_err(|e| Error::MalformedResponse(e.to_string()))?;

        Ok(payload
            .models
            .into_iter()
            .map(|entry| ModelInfo { display_name: entry.name.clone(), internal_name: entry.name, provider: "ollama".to_string(), size: entry.size })
            .collect())
    }

    async fn ping(&self) -> Result<()> {
        let response = shared_http_client()
            .get(format!("{}/api/tags", self.base_url))
            .timeout(std::time::Duration::from_secs(2))
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_base_url_with_trailing_v1_and_slash() {
        assert_eq!(normalize_base_url("http://localhost:11434/v1/"), "http://localhost:11434");
        assert_eq!(normalize_base_url("http://localhost:11434"), "http://localhost:11434");
    }
}
