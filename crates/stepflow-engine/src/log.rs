use serde::{Deserialize, Serialize};

/// One audit record for a visited node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Step tag of the handler that produced the entry (e.g. `llm_engine`).
    pub step: String,
    pub node_id: String,
    #[serde(default)]
    pub details: serde_json::Map<String, serde_json::Value>,
}

impl LogEntry {
    pub fn new(step: impl Into<String>, node_id: impl Into<String>) -> Self {
        Self {
            step: step.into(),
            node_id: node_id.into(),
            details: serde_json::Map::new(),
        }
    }

    /// Add a detail field.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    pub fn detail(&self, key: &str) -> Option<&serde_json::Value> {
        self.details.get(key)
    }
}

/// Append-only sequence of log entries for a single run.
#[derive(Debug, Clone, Default)]
pub struct ExecutionLog {
    entries: Vec<LogEntry>,
}

impl ExecutionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: LogEntry) {
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_entries(self) -> Vec<LogEntry> {
        self.entries
    }
}

/// Truncate `text` to `max_chars` characters, marking the cut with `...`.
pub fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let mut cut: String = text.chars().take(max_chars).collect();
        cut.push_str("...");
        cut
    } else {
        text.to_string()
    }
}
