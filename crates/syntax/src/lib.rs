//! # Context Syntax
//!
//! Language-neutral syntax trees for the context engine.
//!
//! Every supported language is parsed into the same [`SyntaxNode`] shape so
//! the dependency graph and the search layer never look at grammar-specific
//! node kinds.
//!
//! ## Architecture
//!
//! ```text
//! (source, path)
//!     │
//!     ├──> Language Detection (from extension)
//!     │
//!     └──> ParseDispatcher
//!          ├─> TreeSitterParser  rust, python, javascript, typescript
//!          ├─> RegexParser       java, kotlin
//!          └─> ParseOutcome
//!               ├─> Success { root, warnings, metrics }
//!               └─> Failure { errors }
//! ```
//!
//! Parse problems are values, never panics: an unsupported language, broken
//! source or unreadable file all come back as [`ParseOutcome::Failure`].
//!
//! ## Example
//!
//! ```rust
//! use context_syntax::{Language, NodeKind, ParseDispatcher};
//!
//! let dispatcher = ParseDispatcher::new();
//! let outcome = dispatcher.parse_sync(
//!     "class Circle(Shape):\n    pass\n",
//!     Language::Python,
//!     "circle.py",
//! );
//!
//! let root = outcome.root().expect("valid python");
//! let circle = &root.children[0];
//! assert_eq!(circle.kind(), NodeKind::Class);
//! assert_eq!(circle.name(), Some("Circle"));
//! ```

mod error;
mod language;
mod outcome;
mod parser;
mod types;

pub use error::{Result, SyntaxError};
pub use language::{Language, ParserBackend, SUPPORTED_EXTENSIONS};
pub use outcome::{ParseError, ParseErrorKind, ParseMetrics, ParseOutcome};
pub use parser::{ParseDispatcher, RegexParser, SourceParser, TreeSitterParser};
pub use types::{
    ClassDetail, ClassFlavor, Descendants, MethodDetail, NodeDetail, NodeKind, Parameter,
    SourceLocation, SyntaxNode,
};
