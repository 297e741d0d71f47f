//! Relevance search over normalized syntax trees.
//!
//! No index is kept: every query walks the cached trees and scores each node
//! by token overlap with the query, plus a bonus for a literal match.

mod relevance;
mod types;

pub use relevance::{
    truncate_snippet, RelevanceSearch, DEFAULT_MAX_RESULTS, DEFAULT_SNIPPET_CHARS,
};
pub use types::{tokenize, CodeQuery, CodeReference};
