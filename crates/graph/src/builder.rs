use crate::graph::DependencyGraph;
use crate::types::{DependencyKind, DependencyTarget, GraphNodeId, NodeRef};
use context_syntax::{Language, MethodDetail, NodeDetail, SyntaxNode};
use regex::Regex;
use std::collections::HashSet;
use std::sync::{Arc, LazyLock};

/// Identifier tokens of a type expression; qualified paths stay whole
static TYPE_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"'?[A-Za-z_$][\w$]*(?:(?:\.|::)[A-Za-z_$][\w$]*)*").expect("type token pattern")
});

/// Words that show up inside type text without naming a type
const TYPE_KEYWORDS: &[&str] = &[
    "mut", "dyn", "impl", "const", "static", "typeof", "keyof", "readonly", "extends", "super",
    "in", "out", "as", "is", "unique", "infer", "where", "for",
];

/// Derives dependency edges from normalized syntax trees
pub struct GraphBuilder {
    primitives: HashSet<&'static str>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        let mut primitives: HashSet<&'static str> = Language::PARSEABLE
            .iter()
            .flat_map(|lang| lang.primitive_types().iter().copied())
            .collect();
        primitives.extend(["void", "Object", "unknown"]);
        Self { primitives }
    }

    /// Build a graph over `roots`. Pure: the trees are only read.
    pub fn build(&self, roots: &[Arc<SyntaxNode>]) -> DependencyGraph {
        let mut graph = DependencyGraph::default();
        for root in roots {
            let mut path = Vec::new();
            self.visit(&mut graph, root, root, &mut path);
        }
        graph.resolve_edges();

        log::debug!(
            "Built dependency graph: {} nodes, {} resolved edges",
            graph.node_count(),
            graph.resolved.edge_count()
        );
        graph
    }

    fn visit(
        &self,
        graph: &mut DependencyGraph,
        root: &Arc<SyntaxNode>,
        node: &SyntaxNode,
        path: &mut Vec<usize>,
    ) {
        let id = GraphNodeId::for_node(node);
        graph.register(
            id.clone(),
            NodeRef {
                root: Arc::clone(root),
                path: path.clone(),
            },
        );
        for target in self.targets(node) {
            graph.add_target(&id, target);
        }

        for (idx, child) in node.children.iter().enumerate() {
            path.push(idx);
            self.visit(graph, root, child, path);
            path.pop();
        }
    }

    /// Outgoing targets of a single node
    pub fn targets(&self, node: &SyntaxNode) -> Vec<DependencyTarget> {
        let mut out = Vec::new();
        match &node.detail {
            NodeDetail::Module { imports, .. } => {
                out.extend(
                    imports
                        .iter()
                        .map(|import| DependencyTarget::new(DependencyKind::Import, import)),
                );
            }
            NodeDetail::Class(detail) => {
                if let Some(superclass) = &detail.superclass {
                    self.push_named(&mut out, DependencyKind::Class, superclass);
                }
                for interface in &detail.interfaces {
                    self.push_named(&mut out, DependencyKind::Interface, interface);
                }
                out.extend(
                    detail
                        .imports
                        .iter()
                        .map(|import| DependencyTarget::new(DependencyKind::Import, import)),
                );
                for type_name in node.fields().filter_map(SyntaxNode::variable_type) {
                    self.push_types(&mut out, type_name);
                }
                for method in node.methods().filter_map(SyntaxNode::method_detail) {
                    self.push_signature(&mut out, method);
                }
            }
            NodeDetail::Method(detail) => {
                self.push_signature(&mut out, detail);
                for thrown in &detail.throws {
                    self.push_named(&mut out, DependencyKind::Exception, thrown);
                }
            }
            NodeDetail::Variable { .. } | NodeDetail::Expression | NodeDetail::Statement => {}
        }
        out
    }

    /// Non-primitive identifier tokens of a type expression
    /// (`Map<String, Widget>` -> `Map`, `Widget`)
    pub fn type_names(&self, text: &str) -> Vec<String> {
        TYPE_TOKEN
            .find_iter(text)
            .map(|m| m.as_str())
            .filter(|token| !token.starts_with('\''))
            .filter(|token| !TYPE_KEYWORDS.contains(token) && !self.is_primitive(token))
            .map(str::to_string)
            .collect()
    }

    pub fn is_primitive(&self, name: &str) -> bool {
        self.primitives.contains(name)
    }

    fn push_signature(&self, out: &mut Vec<DependencyTarget>, method: &MethodDetail) {
        if let Some(return_type) = &method.return_type {
            self.push_types(out, return_type);
        }
        for type_name in method.parameters.iter().filter_map(|p| p.type_name.as_deref()) {
            self.push_types(out, type_name);
        }
    }

    fn push_types(&self, out: &mut Vec<DependencyTarget>, text: &str) {
        out.extend(
            self.type_names(text)
                .into_iter()
                .map(|name| DependencyTarget::new(DependencyKind::Type, name)),
        );
    }

    /// Superclass, interface or exception: the head of the type without
    /// arguments
    fn push_named(&self, out: &mut Vec<DependencyTarget>, kind: DependencyKind, text: &str) {
        let head = text.split(['<', '(']).next().unwrap_or(text).trim();
        if !head.is_empty() && !self.is_primitive(head) {
            out.push(DependencyTarget::new(kind, head));
        }
    }
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}
