use crate::error::{Result, SyntaxError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Source language of a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Rust,
    Python,
    JavaScript,
    TypeScript,
    Java,
    Kotlin,
    Go,
    C,
    Cpp,
    CSharp,
    Ruby,
    Unknown,
}

/// Parser family able to handle a language
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParserBackend {
    /// Full tree-sitter grammar
    TreeSitter,
    /// Line/brace driven best-effort parsing
    Regex,
}

/// Extensions the project walker picks up. Everything else is ignored.
pub const SUPPORTED_EXTENSIONS: &[&str] = &[
    "rs", "py", "pyi", "js", "mjs", "cjs", "jsx", "ts", "mts", "cts", "java", "kt", "kts",
];

impl Language {
    /// Languages with a registered parser backend
    pub const PARSEABLE: &'static [Language] = &[
        Language::Rust,
        Language::Python,
        Language::JavaScript,
        Language::TypeScript,
        Language::Java,
        Language::Kotlin,
    ];

    /// Detect language from file extension
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "rs" => Language::Rust,
            "py" | "pyi" | "pyw" => Language::Python,
            "js" | "mjs" | "cjs" | "jsx" => Language::JavaScript,
            "ts" | "mts" | "cts" => Language::TypeScript,
            "java" => Language::Java,
            "kt" | "kts" => Language::Kotlin,
            "go" => Language::Go,
            "c" | "h" => Language::C,
            "cpp" | "cc" | "cxx" | "hpp" | "hh" | "hxx" => Language::Cpp,
            "cs" => Language::CSharp,
            "rb" => Language::Ruby,
            _ => Language::Unknown,
        }
    }

    /// Detect language from file path
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(Self::from_extension)
            .unwrap_or(Language::Unknown)
    }

    /// Whether the walker should pick up a file with this path
    pub fn is_supported_path(path: impl AsRef<Path>) -> bool {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                let ext = ext.to_lowercase();
                SUPPORTED_EXTENSIONS.iter().any(|candidate| *candidate == ext)
            })
    }

    /// Get language name as string
    pub fn as_str(self) -> &'static str {
        match self {
            Language::Rust => "rust",
            Language::Python => "python",
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::Java => "java",
            Language::Kotlin => "kotlin",
            Language::Go => "go",
            Language::C => "c",
            Language::Cpp => "cpp",
            Language::CSharp => "csharp",
            Language::Ruby => "ruby",
            Language::Unknown => "unknown",
        }
    }

    /// Parser family for this language, `None` when nothing can parse it
    pub fn backend(self) -> Option<ParserBackend> {
        match self {
            Language::Rust | Language::Python | Language::JavaScript | Language::TypeScript => {
                Some(ParserBackend::TreeSitter)
            }
            Language::Java | Language::Kotlin => Some(ParserBackend::Regex),
            _ => None,
        }
    }

    pub fn is_supported(self) -> bool {
        self.backend().is_some()
    }

    /// Get Tree-sitter language instance
    pub fn tree_sitter_language(self) -> Result<tree_sitter::Language> {
        match self {
            Language::Rust => Ok(tree_sitter_rust::LANGUAGE.into()),
            Language::Python => Ok(tree_sitter_python::LANGUAGE.into()),
            Language::JavaScript => Ok(tree_sitter_javascript::LANGUAGE.into()),
            Language::TypeScript => Ok(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
            _ => Err(SyntaxError::unsupported_language(self.as_str())),
        }
    }

    /// Built-in scalar type names that never produce dependency edges
    pub fn primitive_types(self) -> &'static [&'static str] {
        match self {
            Language::Rust => &[
                "i8", "i16", "i32", "i64", "i128", "isize", "u8", "u16", "u32", "u64", "u128",
                "usize", "f32", "f64", "bool", "char", "str", "Self", "self",
            ],
            Language::Python => &["int", "float", "complex", "bool", "str", "bytes", "None"],
            Language::JavaScript | Language::TypeScript => &[
                "number", "string", "boolean", "bigint", "symbol", "any", "never", "undefined",
                "null", "object",
            ],
            Language::Java => &[
                "byte", "short", "int", "long", "float", "double", "boolean", "char",
            ],
            Language::Kotlin => &[
                "Byte", "Short", "Int", "Long", "Float", "Double", "Boolean", "Char", "Unit",
                "Any", "Nothing",
            ],
            _ => &[],
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_extension() {
        assert_eq!(Language::from_extension("rs"), Language::Rust);
        assert_eq!(Language::from_extension("RS"), Language::Rust);
        assert_eq!(Language::from_extension("pyi"), Language::Python);
        assert_eq!(Language::from_extension("jsx"), Language::JavaScript);
        assert_eq!(Language::from_extension("ts"), Language::TypeScript);
        assert_eq!(Language::from_extension("kts"), Language::Kotlin);
        assert_eq!(Language::from_extension("unknown"), Language::Unknown);
    }

    #[test]
    fn test_from_path() {
        assert_eq!(Language::from_path("src/Main.java"), Language::Java);
        assert_eq!(Language::from_path("src/main.py"), Language::Python);
        assert_eq!(Language::from_path("no_extension"), Language::Unknown);
    }

    #[test]
    fn test_backends() {
        assert_eq!(Language::Rust.backend(), Some(ParserBackend::TreeSitter));
        assert_eq!(Language::Java.backend(), Some(ParserBackend::Regex));
        assert_eq!(Language::Go.backend(), None);
        assert!(!Language::Unknown.is_supported());
        assert!(Language::PARSEABLE.iter().all(|lang| lang.is_supported()));
    }

    #[test]
    fn test_tree_sitter_language() {
        assert!(Language::Rust.tree_sitter_language().is_ok());
        assert!(Language::TypeScript.tree_sitter_language().is_ok());
        assert!(matches!(
            Language::Java.tree_sitter_language(),
            Err(SyntaxError::UnsupportedLanguage(name)) if name == "java"
        ));
    }

    #[test]
    fn test_supported_paths() {
        assert!(Language::is_supported_path("a/b/widget.ts"));
        assert!(Language::is_supported_path("Widget.KT"));
        assert!(!Language::is_supported_path("main.go"));
        assert!(!Language::is_supported_path("README"));
    }
}
