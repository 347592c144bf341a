
pub mod stream;

use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::RagError;
use crate::chat::ConversationHistory;
use crate::config::Config;
use crate::embeddings::estimate_token_count;
use crate::retrieval::Retriever;

pub use stream::{GenerateOptions, GenerateRequest, TokenStream};

/// A service that turns a prompt into a stream of answer fragments
pub trait TextGenerator: Send + Sync {
    fn generate(&self, request: &GenerateRequest) -> Result<TokenStream>;
}

/// Result of answering one query
#[derive(Debug)]
pub enum GenerationOutcome {
    /// Answer fragments, produced as the service generates them
    Stream(TokenStream),
    /// A complete message describing why no answer could be produced
    Failed(String),
}

impl GenerationOutcome {
    #[inline]
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Answers queries by retrieving dataset context and prompting the
/// generation service. Built once at startup and shared by the session.
pub struct ResponseGenerator {
    retriever: Arc<Retriever>,
    generator: Arc<dyn TextGenerator>,
    model: String,
    options: GenerateOptions,
    stream: bool,
    top_k: usize,
    history_window: usize,
    role: String,
}

impl ResponseGenerator {
    #[inline]
    pub fn new(retriever: Arc<Retriever>, generator: Arc<dyn TextGenerator>, config: &Config) -> Self {
        Self {
            retriever,
            generator,
            model: config.ollama.generation_model.clone(),
            options: GenerateOptions {
                temperature: config.generation.temperature,
                num_ctx: config.generation.context_window,
            },
            stream: config.generation.stream,
            top_k: config.retrieval.top_k,
            history_window: config.retrieval.history_window,
            role: config.assistant.role.clone(),
        }
    }

    /// Answer `query` given the session so far. Never fails: any problem
    /// reaching the encoder or the generation service becomes `Failed`.
    #[inline]
    pub async fn generate(&self, query: &str, history: &ConversationHistory) -> GenerationOutcome {
        let context = match self.retriever.retrieve_texts(query, self.top_k).await {
            Ok(texts) => texts.join("\n"),
            Err(e @ (RagError::Embedding(_) | RagError::Network(_))) => {
                return connection_failure(&e.to_string());
            }
            Err(e) => return index_failure(&e.to_string()),
        };

        let history_text = history_fragment(history, self.history_window);
        let prompt = build_prompt(&self.role, &history_text, &context, query);

        let prompt_tokens = estimate_token_count(&prompt);
        if prompt_tokens > self.options.num_ctx as usize {
            warn!(
                "Prompt is about {} tokens, larger than the {} token context window",
                prompt_tokens, self.options.num_ctx
            );
        }

        let request = GenerateRequest {
            model: self.model.clone(),
            prompt,
            options: self.options,
            stream: self.stream,
        };

        debug!("Requesting answer from model {}", self.model);
        match self.generator.generate(&request) {
            Ok(stream) => GenerationOutcome::Stream(stream),
            Err(e) => connection_failure(&format!("{e:#}")),
        }
    }
}

fn connection_failure(detail: &str) -> GenerationOutcome {
    warn!("Generation failed: {}", detail);
    GenerationOutcome::Failed(format!(
        "Error: Could not connect to Ollama ({detail}). Ensure Ollama is running and model is pulled."
    ))
}

fn index_failure(detail: &str) -> GenerationOutcome {
    warn!("Retrieval failed: {}", detail);
    GenerationOutcome::Failed(format!(
        "Error: Could not search the support index ({detail}). \
         Run 'support-rag index --rebuild' to rebuild it."
    ))
}

/// Labeled lines for the most recent `window` exchanges, oldest first
#[inline]
pub fn history_fragment(history: &ConversationHistory, window: usize) -> String {
    history
        .recent(window)
        .iter()
        .map(|exchange| {
            format!(
                "Previous User: {}\nPrevious Assistant: {}\n",
                exchange.user, exchange.assistant
            )
        })
        .collect()
}

#[inline]
pub fn build_prompt(role: &str, history: &str, context: &str, query: &str) -> String {
    format!(
        "\nYou are {role}.\nAnswer the CURRENT QUERY using dataset context.\n\
         === History ===\n{history}\n\
         === Dataset Context ===\n{context}\n\
         === Current Query ===\n{query}\n\
         === Answer ===\n"
    )
}
