//! Incremental parsing of the OpenAI-wire streaming chat format, shared by
//! ollama (native tool-calling), openai, and openrouter. Native tool calls
//! stream as index-addressed fragments; they're buffered here and only
//! surfaced as a whole `ToolCalls` event once the stream ends, matching the
//! coarser `{textDelta?, toolCalls?}` contract.

use std::collections::HashMap;

use crate::types::ToolCall;

#[derive(Default)]
pub struct OpenAiStreamState {
    /// index -> (id, name, arguments buffer)
    tool_calls: HashMap<usize, (Option<String>, String, String)>,
}

pub enum SseOutcome {
    Skip,
    Done,
    Text(String),
}

pub fn process_openai_sse_line(data: &str, state: &mut OpenAiStreamState) -> SseOutcome {
    if data == "[DONE]" {
        return SseOutcome::Done;
    }
    let Ok(evt) = serde_json::from_str::<serde_json::Value>(data) else {
        return SseOutcome::Skip;
    };
    let delta = &evt["choices"][0]["delta"];

    if let Some(tool_calls) = delta["tool_calls"].as_array() {
        for tc in tool_calls {
            let index = tc["index"].as_u64().unwrap_or(0) as usize;
            let entry = state.tool_calls.entry(index).or_insert_with(|| (None, String::new(), String::new()));
            if let Some(id) = tc["id"].as_str() {
                entry.0 = Some(id.to_string());
            }
            if let Some(name) = tc["function"]["name"].as_str() {
                entry.1.push_str(name);
            }
            if let Some(args) = tc["function"]["arguments"].as_str() {
                entry.2.push_str(args);
            }
        }
    }

    if let Some(content) = delta["content"].as_str()
        && !content.is_empty()
    {
        return SseOutcome::Text(content.to_string());
    }

    SseOutcome::Skip
}

pub fn finalize_tool_calls(state: &mut OpenAiStreamState) -> Vec<ToolCall> {
    let mut entries: Vec<_> = state.tool_calls.drain().collect();
    entries.sort_by_key(|(index, _)| *index);
    entries
        .into_iter()
        .filter(|(_, (_, name, _))| !name.is_empty())
        .map(|(index, (id, name, args))| {
            let arguments = serde_json::from_str(&args).unwrap_or_else(|_| serde_json::json!({}));
            ToolCall { id: id.unwrap_or_else(|| format!("call-{index}")), name, arguments }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn done_sentinel_ends_the_stream() {
        let mut state = OpenAiStreamState::default();
        assert!(matches!(process_openai_sse_line("[DONE]", &mut state), SseOutcome::Done));
    }

    #[test]
    fn extracts_text_delta() {
        let mut state = OpenAiStreamState::default();
        let line = r#"{"choices":[{"delta":{"content":"hel"}}]}"#;
        match process_openai_sse_line(line, &mut state) {
            SseOutcome::Text(t) => assert_eq!(t, "hel"),
            _ => panic!("expected text delta"),
        }
    }

    #[test]
    fn accumulates_tool_call_arguments_split_across_chunks() {
        let mut state = OpenAiStreamState::default();
        let start = r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_1","function":{"name":"fs.read","arguments":""}}]}}]}"#;
        let part1 = r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"{\"path\":"}}]}}]}"#;
        let part2 = r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"\"/tmp/x\"}"}}]}}]}"#;
        process_openai_sse_line(start, &mut state);
        process_openai_sse_line(part1, &mut state);
        process_openai_sse_line(part2, &mut state);
        let calls = finalize_tool_calls(&mut state);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, "call_1");
        assert_eq!(calls[0].name, "fs.read");
        assert_eq!(calls[0].arguments, serde_json::json!({"path": "/tmp/x"}));
    }
}
