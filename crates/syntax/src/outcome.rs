use crate::types::{SourceLocation, SyntaxNode};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Classification of a parse problem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseErrorKind {
    /// No registered parser handles the language
    UnsupportedLanguage,
    /// Malformed source
    Syntax,
    /// The source could not be obtained (I/O, task failure)
    Infrastructure,
}

/// A problem found while parsing, with a location when one is known
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    pub location: Option<SourceLocation>,
}

impl ParseError {
    pub fn unsupported_language(language: impl fmt::Display) -> Self {
        Self {
            kind: ParseErrorKind::UnsupportedLanguage,
            message: format!("unsupported language: {language}"),
            location: None,
        }
    }

    pub fn syntax(message: impl Into<String>, location: Option<SourceLocation>) -> Self {
        Self {
            kind: ParseErrorKind::Syntax,
            message: message.into(),
            location,
        }
    }

    pub fn infrastructure(message: impl Into<String>) -> Self {
        Self {
            kind: ParseErrorKind::Infrastructure,
            message: message.into(),
            location: None,
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(location) => write!(f, "{} at {}", self.message, location),
            None => f.write_str(&self.message),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseMetrics {
    pub node_count: usize,
    pub line_count: usize,
    pub duration_micros: u64,
}

/// Result of parsing one file. Exactly one variant holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ParseOutcome {
    Success {
        root: SyntaxNode,
        warnings: Vec<ParseError>,
        metrics: ParseMetrics,
    },
    Failure {
        errors: Vec<ParseError>,
    },
}

impl ParseOutcome {
    pub fn success(root: SyntaxNode, warnings: Vec<ParseError>, metrics: ParseMetrics) -> Self {
        Self::Success {
            root,
            warnings,
            metrics,
        }
    }

    pub fn failure(error: ParseError) -> Self {
        Self::Failure {
            errors: vec![error],
        }
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    #[must_use]
    pub fn root(&self) -> Option<&SyntaxNode> {
        match self {
            Self::Success { root, .. } => Some(root),
            Self::Failure { .. } => None,
        }
    }

    #[must_use]
    pub fn into_root(self) -> Option<SyntaxNode> {
        match self {
            Self::Success { root, .. } => Some(root),
            Self::Failure { .. } => None,
        }
    }

    /// Errors of a failure, warnings of a success
    #[must_use]
    pub fn problems(&self) -> &[ParseError] {
        match self {
            Self::Success { warnings, .. } => warnings,
            Self::Failure { errors } => errors,
        }
    }

    /// Check whether the failure was caused by an unsupported language
    #[must_use]
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Failure { errors } if errors
            .iter()
            .any(|e| e.kind == ParseErrorKind::UnsupportedLanguage))
    }
}
