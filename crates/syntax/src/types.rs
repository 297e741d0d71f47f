use crate::language::Language;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a node lives in its file. Lines and columns are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceLocation {
    pub file: String,
    pub start_line: usize,
    pub start_column: usize,
    pub end_line: usize,
    pub end_column: usize,
}

impl SourceLocation {
    #[must_use]
    pub fn new(
        file: impl Into<String>,
        start_line: usize,
        start_column: usize,
        end_line: usize,
        end_column: usize,
    ) -> Self {
        Self {
            file: file.into(),
            start_line,
            start_column,
            end_line,
            end_column,
        }
    }

    /// Single-point location, used for errors
    #[must_use]
    pub fn point(file: impl Into<String>, line: usize, column: usize) -> Self {
        Self::new(file, line, column, line, column)
    }

    /// Check if location covers a specific line
    #[must_use]
    pub const fn contains_line(&self, line: usize) -> bool {
        line >= self.start_line && line <= self.end_line
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}-{}:{}",
            self.file, self.start_line, self.start_column, self.end_line, self.end_column
        )
    }
}

/// Coarse node kind, derived from [`NodeDetail`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Module,
    Class,
    /// Methods and free functions
    Method,
    Variable,
    Expression,
    Statement,
}

impl NodeKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Module => "module",
            Self::Class => "class",
            Self::Method => "method",
            Self::Variable => "variable",
            Self::Expression => "expression",
            Self::Statement => "statement",
        }
    }

    /// Check if this kind declares a named symbol
    #[must_use]
    pub const fn is_declaration(self) -> bool {
        matches!(self, Self::Class | Self::Method | Self::Variable)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What sort of type-like declaration a class node came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassFlavor {
    Class,
    Interface,
    Struct,
    Enum,
    Trait,
    /// Rust `impl` block, named after its target type
    Impl,
    /// Kotlin `object` / companion
    Object,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassDetail {
    pub flavor: Option<ClassFlavor>,
    pub superclass: Option<String>,
    pub interfaces: Vec<String>,
    pub imports: Vec<String>,
}

impl ClassDetail {
    #[must_use]
    pub fn new(flavor: ClassFlavor) -> Self {
        Self {
            flavor: Some(flavor),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn superclass(mut self, name: impl Into<String>) -> Self {
        self.superclass = Some(name.into());
        self
    }

    #[must_use]
    pub fn interface(mut self, name: impl Into<String>) -> Self {
        self.interfaces.push(name.into());
        self
    }

    #[must_use]
    pub fn import(mut self, name: impl Into<String>) -> Self {
        self.imports.push(name.into());
        self
    }
}

/// One formal parameter; the type is absent for untyped languages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub type_name: Option<String>,
}

impl Parameter {
    #[must_use]
    pub fn new(name: impl Into<String>, type_name: Option<String>) -> Self {
        Self {
            name: name.into(),
            type_name,
        }
    }

    #[must_use]
    pub fn typed(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self::new(name, Some(type_name.into()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodDetail {
    pub return_type: Option<String>,
    pub parameters: Vec<Parameter>,
    pub throws: Vec<String>,
}

impl MethodDetail {
    #[must_use]
    pub fn returns(mut self, type_name: impl Into<String>) -> Self {
        self.return_type = Some(type_name.into());
        self
    }

    #[must_use]
    pub fn parameter(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    #[must_use]
    pub fn throws(mut self, type_name: impl Into<String>) -> Self {
        self.throws.push(type_name.into());
        self
    }
}

/// Kind-specific attributes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum NodeDetail {
    Module {
        language: Language,
        imports: Vec<String>,
    },
    Class(ClassDetail),
    Method(MethodDetail),
    Variable {
        type_name: Option<String>,
    },
    Expression,
    Statement,
}

impl NodeDetail {
    #[must_use]
    pub const fn kind(&self) -> NodeKind {
        match self {
            Self::Module { .. } => NodeKind::Module,
            Self::Class(_) => NodeKind::Class,
            Self::Method(_) => NodeKind::Method,
            Self::Variable { .. } => NodeKind::Variable,
            Self::Expression => NodeKind::Expression,
            Self::Statement => NodeKind::Statement,
        }
    }
}

/// A node of the normalized syntax tree.
///
/// Children are owned, so a tree never shares or cycles; dependency edges
/// derived from it live elsewhere as plain strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntaxNode {
    pub name: Option<String>,
    pub location: SourceLocation,
    pub text: String,
    pub detail: NodeDetail,
    #[serde(default)]
    pub children: Vec<SyntaxNode>,
}

impl SyntaxNode {
    #[must_use]
    pub fn new(
        detail: NodeDetail,
        name: Option<String>,
        location: SourceLocation,
        text: impl Into<String>,
    ) -> Self {
        Self {
            name,
            location,
            text: text.into(),
            detail,
            children: Vec::new(),
        }
    }

    #[must_use]
    pub fn module(
        language: Language,
        imports: Vec<String>,
        location: SourceLocation,
        text: impl Into<String>,
    ) -> Self {
        Self::new(NodeDetail::Module { language, imports }, None, location, text)
    }

    #[must_use]
    pub fn class(
        name: impl Into<String>,
        detail: ClassDetail,
        location: SourceLocation,
        text: impl Into<String>,
    ) -> Self {
        Self::new(NodeDetail::Class(detail), Some(name.into()), location, text)
    }

    #[must_use]
    pub fn method(
        name: impl Into<String>,
        detail: MethodDetail,
        location: SourceLocation,
        text: impl Into<String>,
    ) -> Self {
        Self::new(NodeDetail::Method(detail), Some(name.into()), location, text)
    }

    #[must_use]
    pub fn variable(
        name: impl Into<String>,
        type_name: Option<String>,
        location: SourceLocation,
        text: impl Into<String>,
    ) -> Self {
        Self::new(
            NodeDetail::Variable { type_name },
            Some(name.into()),
            location,
            text,
        )
    }

    /// Builder: append children
    #[must_use]
    pub fn with_children(mut self, children: impl IntoIterator<Item = SyntaxNode>) -> Self {
        self.children.extend(children);
        self
    }

    #[must_use]
    pub const fn kind(&self) -> NodeKind {
        self.detail.kind()
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[must_use]
    pub fn class_detail(&self) -> Option<&ClassDetail> {
        match &self.detail {
            NodeDetail::Class(detail) => Some(detail),
            _ => None,
        }
    }

    #[must_use]
    pub fn method_detail(&self) -> Option<&MethodDetail> {
        match &self.detail {
            NodeDetail::Method(detail) => Some(detail),
            _ => None,
        }
    }

    /// Declared type of a variable node
    #[must_use]
    pub fn variable_type(&self) -> Option<&str> {
        match &self.detail {
            NodeDetail::Variable { type_name } => type_name.as_deref(),
            _ => None,
        }
    }

    /// Imports declared by a module node
    #[must_use]
    pub fn module_imports(&self) -> &[String] {
        match &self.detail {
            NodeDetail::Module { imports, .. } => imports,
            _ => &[],
        }
    }

    /// Field declarations of a class (its variable children)
    pub fn fields(&self) -> impl Iterator<Item = &SyntaxNode> {
        self.children
            .iter()
            .filter(|child| child.kind() == NodeKind::Variable)
    }

    /// Methods of a class (its method children)
    pub fn methods(&self) -> impl Iterator<Item = &SyntaxNode> {
        self.children
            .iter()
            .filter(|child| child.kind() == NodeKind::Method)
    }

    /// Pre-order traversal, starting with `self`
    #[must_use]
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants { stack: vec![self] }
    }

    /// Follow a path of child indices from this node
    #[must_use]
    pub fn at_path(&self, path: &[usize]) -> Option<&SyntaxNode> {
        path.iter()
            .try_fold(self, |node, &idx| node.children.get(idx))
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.descendants().count()
    }

    /// Rough heap footprint of the tree
    #[must_use]
    pub fn estimated_size_bytes(&self) -> usize {
        self.descendants()
            .map(|node| {
                std::mem::size_of::<SyntaxNode>()
                    + node.text.len()
                    + node.location.file.len()
                    + node.name.as_ref().map_or(0, String::len)
            })
            .sum()
    }
}

/// Pre-order iterator over a subtree
pub struct Descendants<'a> {
    stack: Vec<&'a SyntaxNode>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a SyntaxNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn loc(line: usize) -> SourceLocation {
        SourceLocation::new("Widget.java", line, 1, line, 10)
    }

    fn sample_tree() -> SyntaxNode {
        let method = SyntaxNode::method(
            "render",
            MethodDetail::default().returns("Frame"),
            loc(3),
            "Frame render() {}",
        );
        let field = SyntaxNode::variable("count", Some("int".into()), loc(2), "int count;");
        let class = SyntaxNode::class(
            "Widget",
            ClassDetail::new(ClassFlavor::Class).superclass("Base"),
            loc(1),
            "class Widget extends Base {}",
        )
        .with_children([field, method]);
        SyntaxNode::module(Language::Java, vec![], loc(1), "").with_children([class])
    }

    #[test]
    fn test_descendants_preorder() {
        let root = sample_tree();
        let names: Vec<_> = root
            .descendants()
            .map(|n| n.name().unwrap_or("<module>"))
            .collect();
        assert_eq!(names, vec!["<module>", "Widget", "count", "render"]);
        assert_eq!(root.node_count(), 4);
    }

    #[test]
    fn test_class_accessors() {
        let root = sample_tree();
        let class = &root.children[0];
        assert_eq!(class.kind(), NodeKind::Class);
        assert_eq!(class.fields().count(), 1);
        assert_eq!(class.methods().count(), 1);
        assert_eq!(
            class.class_detail().and_then(|d| d.superclass.as_deref()),
            Some("Base")
        );
    }

    #[test]
    fn test_at_path() {
        let root = sample_tree();
        assert_eq!(root.at_path(&[0, 1]).and_then(|n| n.name()), Some("render"));
        assert!(root.at_path(&[3]).is_none());
        assert_eq!(root.at_path(&[]).map(|n| n.kind()), Some(NodeKind::Module));
    }

    #[test]
    fn test_location_display() {
        let location = SourceLocation::new("src/a.rs", 1, 2, 3, 4);
        assert_eq!(location.to_string(), "src/a.rs:1:2-3:4");
        assert!(location.contains_line(2));
        assert!(!location.contains_line(4));
    }
}
