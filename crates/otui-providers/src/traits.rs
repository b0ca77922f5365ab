//! The `ProviderAdapter` contract: a tagged variant over the capability set
//! `{stream, listModels, ping, setModel}` that keeps the orchestrator
//! provider-agnostic. Each backend (ollama/openrouter/openai/anthropic)
//! implements this trait; leak parsing and name-mangling stay behind it.

use std::{pin::Pin, time::Duration};

use async_trait::async_trait;
use tokio_stream::Stream;

use crate::{
    error::{Error, Result},
    types::{Message, ModelInfo, StreamEvent, ToolSchema},
};

pub const CHAT_STREAM_TIMEOUT: Duration = Duration::from_secs(120);

pub type ChatStream<'a> = Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send + 'a>>;

#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    async fn chat_stream<'a>(&'a self, messages: &'a [Message], tools: Option<&'a [ToolSchema]>) -> Result<ChatStream<'a>>;

    async fn list_models(&self) -> Result<Vec<ModelInfo>>;

    async fn ping(&self) -> Result<()>;

    fn get_model(&self) -> &str;

    fn get_display_name(&self) -> &str;

    fn set_model(&mut self, model: String);
}

/// Wrap a stream with an overall deadline. Once the deadline elapses the
/// wrapper yields one `ContextCancelled` error and ends the stream; it does
/// not retry or resume.
pub fn with_total_timeout<S>(stream: S, deadline: Duration) -> impl Stream<Item = Result<StreamEvent>> + Send
where
    S: Stream<Item = Result<StreamEvent>> + Send,
{
    async_stream::stream! {
        let sleep = tokio::time::sleep(deadline);
        tokio::pin!(sleep);
        tokio::pin!(stream);
        loop {
            tokio::select! {
                biased;
                () = &mut sleep => {
                    yield Err(Error::ContextCancelled);
                    break;
                }
                maybe_item = futures::StreamExt::next(&mut stream) => {
                    match maybe_item {
                        Some(item) => yield item,
                        None => break,
                    }
                }
            }
        }
    }
}
