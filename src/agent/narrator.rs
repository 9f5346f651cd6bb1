// src/agent/narrator.rs

//! Turns aggregated results into a short natural-language answer.
//!
//! Collection-ownership questions have a fully determined boolean/numeric
//! answer, so they bypass the model entirely. Everything else goes through
//! the completion service with a deterministic sentence as the fallback.

use crate::agent::completion::CompletionClient;
use crate::agent::schema::Intent;
use crate::aggregate::QueryResults;
use tracing::warn;

const NARRATOR_SYSTEM_PROMPT: &str = "You are The Hunter, a laconic blockchain tracker. \
Answer in character, in at most 200 words. Mention only fields that are \
present in the data; never invent numbers that are not there.";

pub const FALLBACK_WITH_RESULTS: &str =
    "The hunt is complete. The findings are laid out below.";
pub const FALLBACK_EMPTY: &str = "The trail grows cold. Nothing of note was found.";

pub struct Narrator {
    completion: CompletionClient,
}

impl Narrator {
    pub fn new(completion: CompletionClient) -> Self {
        Self { completion }
    }

    pub async fn summarize(&self, query: &str, intent: Intent, results: &QueryResults) -> String {
        if let Some(line) = collection_verdict(results) {
            return line;
        }
        let data = serde_json::to_string(&results.to_json())
            .unwrap_or_else(|_| "[]".to_string());
        let prompt = format!(
            "Question: {query}\nIntent: {intent}\nData: {data}\n\nWrite the answer.",
            query = query,
            intent = intent.as_str(),
            data = data,
        );
        match self
            .completion
            .complete_text(NARRATOR_SYSTEM_PROMPT, &prompt, 400)
            .await
        {
            Ok(text) => text,
            Err(e) => {
                warn!("narration degraded to fallback: {:#}", e);
                fallback_summary(results).to_string()
            }
        }
    }
}

pub fn fallback_summary(results: &QueryResults) -> &'static str {
    if results.is_empty() {
        FALLBACK_EMPTY
    } else {
        FALLBACK_WITH_RESULTS
    }
}

/// Deterministic sentence for "does X own collection Y" questions.
pub fn collection_verdict(results: &QueryResults) -> Option<String> {
    let QueryResults::Addresses(list) = results else {
        return None;
    };
    for result in list {
        if let Some(requested) = &result.requested_collection {
            let line = if requested.found {
                format!(
                    "The trail is warm. {} holds {} item(s) from {}.",
                    result.short_address, requested.count, requested.name
                )
            } else {
                format!(
                    "The den is empty. {} holds nothing from {}.",
                    result.short_address, requested.name
                )
            };
            return Some(line);
        }
    }
    None
}
