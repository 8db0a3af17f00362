use std::pin::Pin;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use ollama_rs::{
    Ollama,
    generation::chat::{ChatMessage, ChatMessageResponseStream, request::ChatMessageRequest},
    models::ModelOptions,
};

/// A chunk of completion text.
#[derive(Debug, Clone)]
pub struct Token {
    pub text: String,
}

pub type TokenStream = Pin<Box<dyn Stream<Item = Token> + Send>>;

/// A fully collected completion.
///
/// `finish_reason` is `Some("stop")` for a normally terminated stream; the
/// compliance scan, not this field, decides whether a reply is usable.
#[derive(Debug, Clone)]
pub struct CompletionReply {
    pub text: String,
    pub finish_reason: Option<String>,
}

/// Common interface for chat-completion backends.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Streams text fragments in response to chat messages.
    async fn chat_stream(
        &self,
        messages: &[ChatMessage],
    ) -> Result<TokenStream, Box<dyn std::error::Error + Send + Sync>>;
}

/// Collect the entire response into a [`CompletionReply`].
pub async fn collect_reply(
    llm: &dyn CompletionClient,
    messages: &[ChatMessage],
) -> Result<CompletionReply, Box<dyn std::error::Error + Send + Sync>> {
    let mut stream = llm.chat_stream(messages).await?;
    let mut out = String::new();
    while let Some(tok) = stream.next().await {
        out.push_str(&tok.text);
    }
    tracing::debug!(chars = out.len(), "llm full response");
    Ok(CompletionReply {
        text: out,
        finish_reason: Some("stop".to_string()),
    })
}

fn build_request(model: &str, temperature: f32, messages: &[ChatMessage]) -> ChatMessageRequest {
    tracing::trace!(%temperature, model, "llm request");
    ChatMessageRequest::new(model.to_string(), messages.to_vec())
        .options(ModelOptions::default().temperature(temperature))
}

fn map_stream(stream: ChatMessageResponseStream) -> TokenStream {
    let mapped = stream.filter_map(|res| async {
        match res {
            Ok(resp) => {
                let tok = resp.message.content;
                tracing::trace!(%tok, "llm token");
                Some(Token { text: tok })
            }
            Err(e) => {
                tracing::error!(?e, "ollama stream error");
                None
            }
        }
    });
    Box::pin(mapped)
}

/// [`CompletionClient`] implementation backed by [`Ollama`].
#[derive(Clone)]
pub struct OllamaClient {
    client: Ollama,
    model: String,
    temperature: f32,
}

impl OllamaClient {
    pub fn new(client: Ollama, model: impl Into<String>, temperature: f32) -> Self {
        Self {
            client,
            model: model.into(),
            temperature,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl CompletionClient for OllamaClient {
    async fn chat_stream(
        &self,
        messages: &[ChatMessage],
    ) -> Result<TokenStream, Box<dyn std::error::Error + Send + Sync>> {
        let req = build_request(&self.model, self.temperature, messages);
        let stream = self.client.send_chat_messages_stream(req).await?;
        Ok(map_stream(stream))
    }
}
