//! Generation boundary.
//!
//! Defines the [`Generator`] trait the chat pipeline calls into, plus
//! the prompt assembly helpers shared by every backend. The concrete
//! HTTP provider lives in the `raggate` app crate.

use anyhow::Result;
use async_trait::async_trait;

use crate::models::ChatTurn;

/// The sentence the assistant is instructed to answer with when the
/// retrieved context does not cover the question.
pub const FALLBACK_ANSWER: &str = "I don't have enough information, sorry about that.";

/// Everything a backend needs to produce one answer.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub system_prompt: String,
    /// Prior turns for this user, oldest first.
    pub history: Vec<ChatTurn>,
    /// Retrieved context snippets, in retrieval order.
    pub contexts: Vec<String>,
    pub question: String,
}

/// Trait for answer-generation backends.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Produce a plain-text answer for the request.
    async fn generate(&self, req: &GenerationRequest) -> Result<String>;
}

/// Build the fixed system prompt.
///
/// The organization name is runtime configuration; the behavioral
/// contract (context-only answers, bracketed-index citations, the fixed
/// fallback sentence) is part of the prompt itself.
pub fn system_prompt(org_name: &str, today: &str) -> String {
    format!(
        "You are a precise and concise assistant for {org}.\n\
         \n\
         - ONLY answer based on the provided context\n\
         - Respond in a short, clear format as clean markdown\n\
         - Cite sources using bracketed indices like [1][2] when available\n\
         - If you don't know, say: \"{fallback}\"\n\
         - Do NOT repeat the question\n\
         - Today's date is {today}\n",
        org = org_name,
        fallback = FALLBACK_ANSWER,
        today = today,
    )
}

/// Build the single combined user message: numbered context snippets
/// followed by the question. The numbering is what the bracketed-index
/// citations in the system prompt refer to. An empty context list is
/// passed through as-is; deciding that nothing can be answered is the
/// model's job, not the pipeline's.
pub fn combined_user_message(contexts: &[String], question: &str) -> String {
    let mut message = String::from("Context:\n");
    for (i, context) in contexts.iter().enumerate() {
        message.push_str(&format!("[{}] {}\n", i + 1, context));
    }
    message.push_str("\nQuestion:\n");
    message.push_str(question);
    message
}
