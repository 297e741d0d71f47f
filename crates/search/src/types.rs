use context_syntax::NodeKind;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Free-text query against the cached trees
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeQuery {
    pub text: String,
}

impl CodeQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Check if the query has nothing to match
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }

    pub fn tokens(&self) -> HashSet<String> {
        tokenize(&self.text)
    }
}

impl From<&str> for CodeQuery {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for CodeQuery {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}

/// A search hit. Built fresh for every query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeReference {
    pub file_path: String,
    pub line: usize,
    pub column: usize,
    /// Node text cut to the configured number of grapheme clusters
    pub snippet: String,
    /// Relevance in `[0, 1]`
    pub score: f64,
    pub kind: NodeKind,
    pub symbol: Option<String>,
}

/// Lower-cased word pieces of `text`, split on non-word characters
pub fn tokenize(text: &str) -> HashSet<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|piece| !piece.is_empty())
        .map(str::to_lowercase)
        .collect()
}
