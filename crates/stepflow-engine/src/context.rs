use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use stepflow_core::types::ChatTurn;

/// Working state threaded through a single run.
///
/// Created with the caller's query and (windowed) chat history; each handler
/// may read any field and set new ones. Extra keys let custom handlers pass
/// data downstream without new fields here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionContext {
    pub query: String,
    /// Concatenated knowledge-base chunks from the last retrieval step.
    #[serde(default)]
    pub retrieved_context: Option<String>,
    /// Text produced by the last generation step.
    #[serde(default)]
    pub response: Option<String>,
    /// The value surfaced to the caller when the run ends.
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    history: Vec<ChatTurn>,
    #[serde(default)]
    extra: HashMap<String, serde_json::Value>,
}

impl ExecutionContext {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    /// Attach prior turns, keeping only the last `window` of them.
    pub fn with_history(mut self, history: &[ChatTurn], window: usize) -> Self {
        let skip = history.len().saturating_sub(window);
        self.history = history[skip..].to_vec();
        self
    }

    pub fn history(&self) -> &[ChatTurn] {
        &self.history
    }

    /// Retrieved context, treating an empty retrieval as absent.
    pub fn retrieved(&self) -> Option<&str> {
        self.retrieved_context.as_deref().filter(|c| !c.is_empty())
    }

    /// Get an extra value as a string, if it's a string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.extra.get(key).and_then(|v| v.as_str())
    }

    /// Set an extra string value.
    pub fn set_str(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.extra
            .insert(key.into(), serde_json::Value::String(value.into()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turns(n: usize) -> Vec<ChatTurn> {
        (0..n).map(|i| ChatTurn::user(format!("m{}", i))).collect()
    }

    #[test]
    fn test_new_sets_query_only() {
        let ctx = ExecutionContext::new("hello");
        assert_eq!(ctx.query, "hello");
        assert!(ctx.retrieved_context.is_none());
        assert!(ctx.response.is_none());
        assert!(ctx.result.is_none());
        assert!(ctx.history().is_empty());
    }

    #[test]
    fn test_history_window_keeps_tail() {
        let ctx = ExecutionContext::new("q").with_history(&turns(8), 5);
        let kept: Vec<_> = ctx.history().iter().map(|t| t.content.as_str()).collect();
        assert_eq!(kept, vec!["m3", "m4", "m5", "m6", "m7"]);
    }

    #[test]
    fn test_history_shorter_than_window() {
        let ctx = ExecutionContext::new("q").with_history(&turns(2), 5);
        assert_eq!(ctx.history().len(), 2);
        let ctx = ExecutionContext::new("q").with_history(&turns(3), 0);
        assert!(ctx.history().is_empty());
    }

    #[test]
    fn test_empty_retrieval_is_absent() {
        let mut ctx = ExecutionContext::new("q");
        ctx.retrieved_context = Some(String::new());
        assert_eq!(ctx.retrieved(), None);
        ctx.retrieved_context = Some("chunk".into());
        assert_eq!(ctx.retrieved(), Some("chunk"));
    }

    #[test]
    fn test_extra_values() {
        let mut ctx = ExecutionContext::new("q");
        ctx.set_str("lang", "en");
        assert_eq!(ctx.get_str("lang"), Some("en"));
        assert_eq!(ctx.get_str("missing"), None);
        ctx.set_str("lang", "fr");
        assert_eq!(ctx.get_str("lang"), Some("fr"));
    }
}
