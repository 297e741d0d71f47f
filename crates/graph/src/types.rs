use context_syntax::SyntaxNode;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Stable identifier of a declaration:
/// `kind:name@file:startLine:startCol-endLine:endCol`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GraphNodeId(String);

impl GraphNodeId {
    pub fn for_node(node: &SyntaxNode) -> Self {
        Self(format!(
            "{}:{}@{}",
            node.kind(),
            node.name().unwrap_or("anonymous"),
            node.location
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GraphNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for GraphNodeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for GraphNodeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Why one declaration depends on a name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyKind {
    /// Superclass
    Class,
    /// Thrown exception
    Exception,
    Import,
    Interface,
    /// Field, parameter or return type
    Type,
}

impl DependencyKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Class => "class",
            Self::Exception => "exception",
            Self::Import => "import",
            Self::Interface => "interface",
            Self::Type => "type",
        }
    }
}

/// Outgoing edge of a declaration, rendered as `kind:name`.
///
/// Targets are plain names; they need not resolve to a known declaration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DependencyTarget {
    pub kind: DependencyKind,
    pub name: String,
}

impl DependencyTarget {
    pub fn new(kind: DependencyKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }

    /// Last path segment without generic arguments
    /// (`java.util.List<T>` -> `List`, `crate::a::Widget` -> `Widget`)
    pub fn simple_name(&self) -> &str {
        simple_name(&self.name)
    }
}

pub(crate) fn simple_name(name: &str) -> &str {
    let head = name.split(['<', '(', '[']).next().unwrap_or(name).trim();
    head.rsplit(['.', ':', '/']).next().unwrap_or(head)
}

impl fmt::Display for DependencyTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.as_str(), self.name)
    }
}

/// Where a registered declaration lives: a shared cached root plus the child
/// index path from it. Subtrees are never cloned.
#[derive(Debug, Clone)]
pub struct NodeRef {
    pub root: Arc<SyntaxNode>,
    pub path: Vec<usize>,
}

impl NodeRef {
    pub fn node(&self) -> Option<&SyntaxNode> {
        self.root.at_path(&self.path)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphStatistics {
    pub node_count: usize,
    /// Dependency targets across all nodes
    pub edge_count: usize,
    /// Node-to-node edges after name resolution
    pub resolved_edge_count: usize,
    pub avg_out_degree: f64,
    pub max_out_degree: usize,
    pub cycle_count: usize,
}

/// A node reached from another within a bounded number of hops
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedNode {
    pub id: GraphNodeId,
    pub distance: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use context_syntax::{ClassDetail, ClassFlavor, SourceLocation};

    #[test]
    fn test_node_id_format() {
        let node = SyntaxNode::class(
            "Widget",
            ClassDetail::new(ClassFlavor::Class),
            SourceLocation::new("src/Widget.java", 3, 1, 9, 2),
            "",
        );
        assert_eq!(
            GraphNodeId::for_node(&node).as_str(),
            "class:Widget@src/Widget.java:3:1-9:2"
        );
    }

    #[test]
    fn test_anonymous_node_id() {
        let node = SyntaxNode::new(
            context_syntax::NodeDetail::Statement,
            None,
            SourceLocation::new("a.py", 1, 1, 1, 5),
            "pass",
        );
        assert_eq!(GraphNodeId::for_node(&node).as_str(), "statement:anonymous@a.py:1:1-1:5");
    }

    #[test]
    fn test_target_display_and_simple_name() {
        let target = DependencyTarget::new(DependencyKind::Import, "java.util.List");
        assert_eq!(target.to_string(), "import:java.util.List");
        assert_eq!(target.simple_name(), "List");

        assert_eq!(simple_name("crate::model::Widget"), "Widget");
        assert_eq!(simple_name("Comparable<Widget>"), "Comparable");
        assert_eq!(simple_name("Shape()"), "Shape");
        assert_eq!(simple_name("./base"), "base");
    }

    #[test]
    fn test_targets_order_by_rendering() {
        let mut targets = vec![
            DependencyTarget::new(DependencyKind::Type, "Widget"),
            DependencyTarget::new(DependencyKind::Class, "Base"),
            DependencyTarget::new(DependencyKind::Interface, "Flag"),
        ];
        targets.sort();
        let rendered: Vec<_> = targets.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, vec!["class:Base", "interface:Flag", "type:Widget"]);
    }
}
