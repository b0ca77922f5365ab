//! Parsing for Anthropic's `/v1/messages` streaming event shape, which
//! differs from the OpenAI-wire format: content arrives as indexed blocks
//! (`content_block_start`/`content_block_delta`/`content_block_stop`)
//! rather than a flat delta, and tool calls are `tool_use` blocks whose
//! input streams as `input_json_delta` fragments.

use std::collections::HashMap;

use crate::types::ToolCall;

#[derive(Default)]
pub struct AnthropicStreamState {
    /// index -> (id, name, partial JSON input buffer)
    tool_uses: HashMap<usize, (String, String, String)>,
}

pub enum AnthropicOutcome {
    Skip,
    Done,
    Text(String),
}

pub fn process_anthropic_event(data: &str, state: &mut AnthropicStreamState) -> AnthropicOutcome {
    let Ok(evt) = serde_json::from_str::<serde_json::Value>(data) else {
        return AnthropicOutcome::Skip;
    };

    match evt["type"].as_str() {
        Some("content_block_start") => {
            let index = evt["index"].as_u64().unwrap_or(0) as usize;
            let block = &evt["content_block"];
            if block["type"].as_str() == Some("tool_use") {
                let id = block["id"].as_str().unwrap_or_default().to_string();
                let name = block["name"].as_str().unwrap_or_default().to_string();
                state.tool_uses.insert(index, (id, name, String::new()));
            }
            AnthropicOutcome::Skip
        },
        Some("content_block_delta") => {
            let index = evt["index"].as_u64().unwrap_or(0) as usize;
            let delta = &evt["delta"];
            match delta["type"].as_str() {
                Some("text_delta") => AnthropicOutcome::Text(delta["text"].as_str().unwrap_or_default().to_string()),
                Some("input_json_delta") => {
                    if let Some(entry) = state.tool_uses.get_mut(&index) {
                        entry.2.push_str(delta["partial_json"].as_str().unwrap_or_default());
                    }
                    AnthropicOutcome::Skip
                },
                _ => AnthropicOutcome::Skip,
            }
        },
        Some("message_stop") => AnthropicOutcome::Done,
        Some("error") => AnthropicOutcome::Skip,
        _ => AnthropicOutcome::Skip,
    }
}

pub fn finalize_tool_calls(state: &mut AnthropicStreamState) -> Vec<ToolCall> {
    let mut entries: Vec<_> = state.tool_uses.drain().collect();
    entries.sort_by_key(|(index, _)| *index);
    entries
        .into_iter()
        .filter(|(_, (_, name, _))| !name.is_empty())
        .map(|(_, (id, name, json))| {
            let arguments = serde_json::from_str(&json).unwrap_or_else(|_| serde_json::json!({}));
            ToolCall { id, name, arguments }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_stop_ends_the_stream() {
        let mut state = AnthropicStreamState::default();
        let evt = r#"{"type":"message_stop"}"#;
        assert!(matches!(process_anthropic_event(evt, &mut state), AnthropicOutcome::Done));
    }

    #[test]
    fn extracts_text_delta() {
        let mut state = AnthropicStreamState::default();
        let evt = r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"hi"}}"#;
        match process_anthropic_event(evt, &mut state) {
            AnthropicOutcome::Text(t) => assert_eq!(t, "hi"),
            _ => panic!("expected text delta"),
        }
    }

    #[test]
    fn accumulates_tool_use_input_across_chunks() {
        let mut state = AnthropicStreamState::default();
        let start = r#"{"type":"content_block_start","index":1,"content_block":{"type":"tool_use","id":"toolu_1","name":"fs.read"}}"#;
        let delta1 = r#"{"type":"content_block_delta","index":1,"delta":{"type":"input_json_delta","partial_json":"{\"path\":"}}"#;
        let delta2 = r#"{"type":"content_block_delta","index":1,"delta":{"type":"input_json_delta","partial_json":"\"/tmp/x\"}"}}"#;
        process_anthropic_event(start, &mut state);
        process_anthropic_event(delta1, &mut state);
        process_anthropic_event(delta2, &mut state);
        let calls = finalize_tool_calls(&mut state);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, "toolu_1");
        assert_eq!(calls[0].name, "fs.read");
        assert_eq!(calls[0].arguments, serde_json::json!({"path": "/tmp/x"}));
    }
}
