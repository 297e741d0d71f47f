use thiserror::Error;

/// Result type for syntax operations
pub type Result<T> = std::result::Result<T, SyntaxError>;

/// Errors raised while setting up parsers.
///
/// Problems with the parsed source itself are never reported through this
/// type: they travel as [`crate::ParseError`] values inside a
/// [`crate::ParseOutcome::Failure`].
#[derive(Error, Debug)]
pub enum SyntaxError {
    /// Unsupported language
    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),
}

impl SyntaxError {
    /// Create an unsupported language error
    pub fn unsupported_language(lang: impl Into<String>) -> Self {
        Self::UnsupportedLanguage(lang.into())
    }
}
