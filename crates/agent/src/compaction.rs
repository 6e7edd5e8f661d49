//! History compaction.
//!
//! When the persisted history grows past its cap, the oldest turns are
//! evicted and folded into the rolling summary. The model writes the new
//! summary; if that call fails, a plain digest of the evicted turns is used.

use llmcode_core::error::HistoryError;
use llmcode_core::history::HistoryStore;
use llmcode_core::message::Message;
use llmcode_core::provider::{ChatRequest, Provider, StreamEvent};
use llmcode_core::text::{clip, truncate_with_suffix};
use tracing::{debug, info, warn};

use crate::stream_reader::{DEFAULT_LOOKBACK, Segment, ThinkDemux};

/// Characters of each evicted message sent to the summarizer.
const MESSAGE_CHARS: usize = 1000;
/// Characters of each evicted message kept by the fallback digest.
const DIGEST_CHARS: usize = 200;
/// Upper bound on any summary we store.
const SUMMARY_CHARS: usize = 4000;

const SUMMARY_SYSTEM: &str = "You condense coding-assistant conversations. \
Write a short summary of the decisions made, files touched and open tasks. \
Plain prose, no tool calls.";

fn transcript(evicted: &[Message], per_message: usize) -> String {
    evicted
        .iter()
        .filter(|m| !m.is_tool_results())
        .map(|m| format!("{}: {}", m.role.as_str(), clip(&m.content, per_message)))
        .collect::<Vec<_>>()
        .join("\n")
}

/// A summary built without the model.
pub fn fallback_digest(previous: &str, evicted: &[Message]) -> String {
    let mut digest = previous.trim().to_string();
    let turns = transcript(evicted, DIGEST_CHARS);
    if !turns.is_empty() {
        if !digest.is_empty() {
            digest.push_str("\n\n");
        }
        digest.push_str("Earlier turns:\n");
        digest.push_str(&turns);
    }
    truncate_with_suffix(&digest, SUMMARY_CHARS)
}

/// Ask the model to fold `evicted` into `previous`.
pub async fn summarize_evicted(
    provider: &dyn Provider,
    model: &str,
    previous: &str,
    evicted: &[Message],
) -> String {
    let mut prompt = String::new();
    if !previous.trim().is_empty() {
        prompt.push_str("Existing summary:\n");
        prompt.push_str(previous.trim());
        prompt.push_str("\n\n");
    }
    prompt.push_str("New conversation turns:\n");
    prompt.push_str(&transcript(evicted, MESSAGE_CHARS));
    prompt.push_str("\n\nWrite the updated summary.");

    let request = ChatRequest::new(model, vec![Message::system(SUMMARY_SYSTEM), Message::user(prompt)]);

    match collect_visible(provider, request).await {
        Ok(summary) if !summary.trim().is_empty() => {
            truncate_with_suffix(summary.trim(), SUMMARY_CHARS)
        }
        Ok(_) => {
            debug!("Summarizer returned nothing; using digest");
            fallback_digest(previous, evicted)
        }
        Err(message) => {
            warn!(error = %message, "Summarizer failed; using digest");
            fallback_digest(previous, evicted)
        }
    }
}

/// Stream a response and keep only the text outside think spans.
async fn collect_visible(provider: &dyn Provider, request: ChatRequest) -> Result<String, String> {
    let mut events = provider.chat_stream(request).await.map_err(|e| e.to_string())?;
    let mut demux = ThinkDemux::new(DEFAULT_LOOKBACK);
    let mut visible = String::new();
    let mut keep = |segment: Segment| {
        if let Segment::Visible(text) = segment {
            visible.push_str(&text);
        }
    };

    while let Some(event) = events.recv().await {
        match event.map_err(|e| e.to_string())? {
            StreamEvent::Token { content } => demux.push(&content).into_iter().for_each(&mut keep),
            StreamEvent::Error { message, .. } => return Err(message),
            StreamEvent::Done { .. } => break,
            StreamEvent::Start { .. } => {}
        }
    }
    if let Some(segment) = demux.finish() {
        keep(segment);
    }
    Ok(visible)
}

/// Compact `store` if it is over its cap. Returns whether anything was evicted.
pub async fn compact_history(
    store: &dyn HistoryStore,
    provider: &dyn Provider,
    model: &str,
    keep_recent: usize,
) -> Result<bool, HistoryError> {
    if !store.needs_compression().await? {
        return Ok(false);
    }

    let evicted = store.compress(keep_recent).await?;
    if evicted.is_empty() {
        return Ok(false);
    }

    let previous = store.get_summary().await?;
    let summary = summarize_evicted(provider, model, &previous, &evicted).await;
    store.set_summary(&summary).await?;
    info!(evicted = evicted.len(), summary_chars = summary.len(), "History compacted");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::ScriptedProvider;
    use llmcode_core::message::Role;
    use llmcode_memory::InMemoryHistory;

    fn turns() -> Vec<Message> {
        vec![
            Message::user("rename foo to bar"),
            Message::assistant("Done, renamed in lib.rs"),
            Message::user("Tool results:\n\n### read_file\n```json\n{}\n```\n"),
        ]
    }

    #[test]
    fn digest_skips_tool_results() {
        let digest = fallback_digest("Earlier: set up the repo.", &turns());
        assert!(digest.starts_with("Earlier: set up the repo.\n\nEarlier turns:\n"));
        assert!(digest.contains("user: rename foo to bar"));
        assert!(digest.contains("assistant: Done, renamed in lib.rs"));
        assert!(!digest.contains("read_file"));
    }

    #[tokio::test]
    async fn summary_drops_think_spans() {
        let provider = ScriptedProvider::new(vec!["<think>what happened?</think>Renamed foo to bar."]);
        let summary = summarize_evicted(&provider, "m", "", &turns()).await;
        assert_eq!(summary, "Renamed foo to bar.");

        let prompt = &provider.requests()[0].messages[1].content;
        assert!(prompt.starts_with("New conversation turns:\nuser: rename foo to bar"));
        assert!(!prompt.contains("Tool results:"));
    }

    #[tokio::test]
    async fn failed_summary_uses_digest() {
        let provider = ScriptedProvider::failing_after("", "model unloaded");
        let summary = summarize_evicted(&provider, "m", "old", &turns()).await;
        assert_eq!(summary, fallback_digest("old", &turns()));
    }

    #[tokio::test]
    async fn compacts_only_over_cap() {
        let store = InMemoryHistory::new(4);
        for i in 0..4 {
            store.add_message(Role::User, &format!("q{i}")).await.unwrap();
        }
        let provider = ScriptedProvider::new(vec!["summary one"]);
        assert!(!compact_history(&store, &provider, "m", 2).await.unwrap());
        assert_eq!(provider.calls(), 0);

        store.add_message(Role::Assistant, "a4").await.unwrap();
        assert!(compact_history(&store, &provider, "m", 2).await.unwrap());
        assert_eq!(store.len().await.unwrap(), 2);
        assert_eq!(store.get_summary().await.unwrap(), "summary one");

        let kept = store.get_messages(10).await.unwrap();
        assert_eq!(kept[0].content, "q3");
        assert_eq!(kept[1].content, "a4");
    }
}
