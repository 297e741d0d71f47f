use crate::types::{tokenize, CodeQuery, CodeReference};
use context_syntax::SyntaxNode;
use std::collections::HashSet;
use unicode_segmentation::UnicodeSegmentation;

pub const DEFAULT_MAX_RESULTS: usize = 20;
pub const DEFAULT_SNIPPET_CHARS: usize = 200;

/// Bonus for nodes whose text contains the whole query
const SUBSTRING_BONUS: f64 = 0.5;

/// Scores every node of every tree against a query.
///
/// score = Jaccard(query tokens, node tokens) + 0.5 on a case-insensitive
/// substring match, clamped to `[0, 1]`.
#[derive(Debug, Clone, Copy)]
pub struct RelevanceSearch {
    max_results: usize,
    snippet_chars: usize,
}

impl RelevanceSearch {
    pub fn new(max_results: usize, snippet_chars: usize) -> Self {
        Self {
            max_results,
            snippet_chars,
        }
    }

    /// Trees are visited in the order given; nodes in pre-order. Ties keep
    /// that order.
    pub fn search<'a>(
        &self,
        query: &CodeQuery,
        trees: impl IntoIterator<Item = &'a SyntaxNode>,
    ) -> Vec<CodeReference> {
        if query.is_empty() {
            return Vec::new();
        }
        let query_tokens = query.tokens();
        let needle = query.text.trim().to_lowercase();

        let mut hits: Vec<CodeReference> = trees
            .into_iter()
            .flat_map(SyntaxNode::descendants)
            .filter_map(|node| self.score(node, &query_tokens, &needle))
            .collect();

        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(self.max_results);
        log::debug!("Query {:?} matched {} node(s)", query.text, hits.len());
        hits
    }

    fn score(
        &self,
        node: &SyntaxNode,
        query_tokens: &HashSet<String>,
        needle: &str,
    ) -> Option<CodeReference> {
        let node_tokens = tokenize(&node.text);
        let overlap = jaccard(query_tokens, &node_tokens);
        // both sides lower-cased, so the literal match ignores case
        let substring = node.text.to_lowercase().contains(needle);
        let score = (overlap + if substring { SUBSTRING_BONUS } else { 0.0 }).clamp(0.0, 1.0);

        if score <= 0.0 && !substring {
            return None;
        }
        Some(CodeReference {
            file_path: node.location.file.clone(),
            line: node.location.start_line,
            column: node.location.start_column,
            snippet: truncate_snippet(&node.text, self.snippet_chars),
            score,
            kind: node.kind(),
            symbol: node.name.clone(),
        })
    }
}

impl Default for RelevanceSearch {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RESULTS, DEFAULT_SNIPPET_CHARS)
    }
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

/// Longest prefix of `text` with at most `max_chars` chars that does not
/// split a grapheme cluster
pub fn truncate_snippet(text: &str, max_chars: usize) -> String {
    let mut used = 0;
    for (offset, grapheme) in text.grapheme_indices(true) {
        used += grapheme.chars().count();
        if used > max_chars {
            return text[..offset].to_string();
        }
    }
    text.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jaccard() {
        let a: HashSet<String> = ["class", "widget"].map(String::from).into();
        let b: HashSet<String> = ["widget"].map(String::from).into();
        assert!((jaccard(&a, &b) - 0.5).abs() < f64::EPSILON);
        assert_eq!(jaccard(&HashSet::new(), &HashSet::new()), 0.0);
    }

    #[test]
    fn test_truncate_keeps_grapheme_clusters() {
        let text = "e\u{301}e\u{301}e\u{301}";
        assert_eq!(truncate_snippet(text, 4), "e\u{301}e\u{301}");
        assert_eq!(truncate_snippet(text, 3), "e\u{301}");
        assert_eq!(truncate_snippet("short", 200), "short");
        assert_eq!(truncate_snippet("👩‍👩‍👧 family", 6), "👩‍👩‍👧 ");
        assert_eq!(truncate_snippet("👩‍👩‍👧 family", 4), "");
    }

    #[test]
    fn test_snippet_cap_counts_chars() {
        let combining = "a\u{301}".repeat(150);
        let snippet = truncate_snippet(&combining, DEFAULT_SNIPPET_CHARS);
        assert_eq!(snippet.chars().count(), DEFAULT_SNIPPET_CHARS);
        assert_eq!(snippet.graphemes(true).count(), 100);
    }
}
