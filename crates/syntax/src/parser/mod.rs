mod regex_parser;
mod tree_sitter_parser;

pub use regex_parser::RegexParser;
pub use tree_sitter_parser::TreeSitterParser;

use crate::language::Language;
use crate::outcome::{ParseError, ParseOutcome};
use std::path::Path;
use std::sync::Arc;

/// A parser backend for one or more languages.
///
/// Implementations turn parse problems into [`ParseOutcome::Failure`] instead
/// of panicking; they may leave node attributes partially populated.
pub trait SourceParser: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    fn supports(&self, language: Language) -> bool;

    fn parse(&self, source: &str, language: Language, path: &str) -> ParseOutcome;
}

/// Routes `(source, language)` to the first registered parser that handles
/// the language. Holds no per-parse state and is cheap to clone.
#[derive(Clone)]
pub struct ParseDispatcher {
    parsers: Vec<Arc<dyn SourceParser>>,
}

impl ParseDispatcher {
    /// Dispatcher with the built-in tree-sitter and regex backends
    pub fn new() -> Self {
        Self {
            parsers: vec![Arc::new(TreeSitterParser::new()), Arc::new(RegexParser::new())],
        }
    }

    /// Dispatcher with no parsers; every language is unsupported
    pub fn empty() -> Self {
        Self {
            parsers: Vec::new(),
        }
    }

    /// Register a parser ahead of the existing ones
    #[must_use]
    pub fn with_parser(mut self, parser: Arc<dyn SourceParser>) -> Self {
        self.parsers.insert(0, parser);
        self
    }

    pub fn supports(&self, language: Language) -> bool {
        self.parsers.iter().any(|p| p.supports(language))
    }

    /// Parse on the caller's thread
    pub fn parse_sync(&self, source: &str, language: Language, path: &str) -> ParseOutcome {
        let Some(parser) = self.parsers.iter().find(|p| p.supports(language)) else {
            log::debug!("No parser for {language} ({path})");
            return ParseOutcome::failure(ParseError::unsupported_language(language));
        };

        let outcome = parser.parse(source, language, path);
        if let ParseOutcome::Failure { errors } = &outcome {
            log::debug!(
                "{} parser failed on {path}: {} error(s)",
                parser.name(),
                errors.len()
            );
        }
        outcome
    }

    /// Parse on tokio's blocking pool
    pub async fn parse(&self, source: String, language: Language, path: String) -> ParseOutcome {
        let dispatcher = self.clone();
        match tokio::task::spawn_blocking(move || dispatcher.parse_sync(&source, language, &path))
            .await
        {
            Ok(outcome) => outcome,
            Err(err) => {
                ParseOutcome::failure(ParseError::infrastructure(format!("parse task failed: {err}")))
            }
        }
    }

    /// Read and parse a file, detecting its language from the extension
    pub async fn parse_file(&self, path: impl AsRef<Path>) -> ParseOutcome {
        let path = path.as_ref();
        let language = Language::from_path(path);
        if !self.supports(language) {
            return ParseOutcome::failure(ParseError::unsupported_language(language));
        }

        match tokio::fs::read_to_string(path).await {
            Ok(source) => {
                self.parse(source, language, path.to_string_lossy().into_owned())
                    .await
            }
            Err(err) => ParseOutcome::failure(ParseError::infrastructure(format!(
                "failed to read {}: {err}",
                path.display()
            ))),
        }
    }
}

impl Default for ParseDispatcher {
    fn default() -> Self {
        Self::new()
    }
}
