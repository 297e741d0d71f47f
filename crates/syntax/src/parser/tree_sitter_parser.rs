use super::SourceParser;
use crate::language::{Language, ParserBackend};
use crate::outcome::{ParseError, ParseMetrics, ParseOutcome};
use crate::types::{
    ClassDetail, ClassFlavor, MethodDetail, NodeDetail, Parameter, SourceLocation, SyntaxNode,
};
use std::time::Instant;
use tree_sitter::{Node, Parser};

/// Grammar-backed parser for Rust, Python, JavaScript and TypeScript.
///
/// Tree-sitter always produces a tree; `ERROR` nodes make the outcome a
/// failure, `MISSING` nodes are kept as warnings.
pub struct TreeSitterParser;

impl TreeSitterParser {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TreeSitterParser {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceParser for TreeSitterParser {
    fn name(&self) -> &'static str {
        "tree-sitter"
    }

    fn supports(&self, language: Language) -> bool {
        language.backend() == Some(ParserBackend::TreeSitter)
    }

    fn parse(&self, source: &str, language: Language, path: &str) -> ParseOutcome {
        let started = Instant::now();

        let Ok(ts_language) = language.tree_sitter_language() else {
            return ParseOutcome::failure(ParseError::unsupported_language(language));
        };
        let mut parser = Parser::new();
        if let Err(e) = parser.set_language(&ts_language) {
            return ParseOutcome::failure(ParseError::infrastructure(format!(
                "failed to set language: {e}"
            )));
        }
        let Some(tree) = parser.parse(source, None) else {
            return ParseOutcome::failure(ParseError::infrastructure("parser produced no tree"));
        };

        let normalizer = Normalizer {
            source,
            path,
            language,
        };
        let root = tree.root_node();

        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        normalizer.collect_problems(root, &mut errors, &mut warnings);
        if !errors.is_empty() {
            return ParseOutcome::Failure { errors };
        }

        let module = normalizer.module(root);
        let metrics = ParseMetrics {
            node_count: module.node_count(),
            line_count: source.lines().count(),
            duration_micros: u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX),
        };
        ParseOutcome::success(module, warnings, metrics)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Module,
    ClassBody,
    Block,
}

struct Normalizer<'a> {
    source: &'a str,
    path: &'a str,
    language: Language,
}

fn named_children(node: Node<'_>) -> Vec<Node<'_>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor).collect()
}

fn is_comment(kind: &str) -> bool {
    matches!(kind, "comment" | "line_comment" | "block_comment")
}

/// Strip annotation punctuation (`: int`, `-> T`) from a type
fn clean_type(raw: &str) -> Option<String> {
    let cleaned = raw.trim().trim_start_matches(':').trim();
    (!cleaned.is_empty()).then(|| cleaned.to_string())
}

/// `Foo<T>` -> `Foo`, `crate::a::Foo` stays as is
fn base_type_name(raw: &str) -> String {
    raw.split('<').next().unwrap_or(raw).trim().to_string()
}

impl<'a> Normalizer<'a> {
    fn text(&self, node: Node<'_>) -> &'a str {
        node.utf8_text(self.source.as_bytes()).unwrap_or("")
    }

    fn field_text(&self, node: Node<'_>, field: &str) -> Option<String> {
        node.child_by_field_name(field)
            .map(|child| self.text(child).to_string())
            .filter(|text| !text.is_empty())
    }

    fn location(&self, node: Node<'_>) -> SourceLocation {
        let start = node.start_position();
        let end = node.end_position();
        SourceLocation::new(
            self.path,
            start.row + 1,
            start.column + 1,
            end.row + 1,
            end.column + 1,
        )
    }

    fn collect_problems(
        &self,
        node: Node<'_>,
        errors: &mut Vec<ParseError>,
        warnings: &mut Vec<ParseError>,
    ) {
        if node.is_error() {
            errors.push(ParseError::syntax(
                "unexpected syntax",
                Some(self.location(node)),
            ));
            return;
        }
        if node.is_missing() {
            warnings.push(ParseError::syntax(
                format!("missing `{}`", node.kind()),
                Some(self.location(node)),
            ));
            return;
        }
        if !node.has_error() {
            return;
        }
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.collect_problems(child, errors, warnings);
        }
    }

    fn module(&self, root: Node<'_>) -> SyntaxNode {
        let imports = self.imports(root);
        let mut children = self.items(root, Scope::Module);
        for child in &mut children {
            if let NodeDetail::Class(detail) = &mut child.detail {
                detail.imports = imports.clone();
            }
        }
        SyntaxNode::module(self.language, imports, self.location(root), self.source)
            .with_children(children)
    }

    fn imports(&self, container: Node<'_>) -> Vec<String> {
        let mut imports = Vec::new();
        for child in named_children(container) {
            match (self.language, child.kind()) {
                (Language::Rust, "use_declaration") => {
                    imports.extend(self.field_text(child, "argument"));
                }
                (Language::Python, "import_statement") => {
                    for name in named_children(child) {
                        let target = match name.kind() {
                            "aliased_import" => self.field_text(name, "name"),
                            _ => Some(self.text(name).to_string()),
                        };
                        imports.extend(target);
                    }
                }
                (Language::Python, "import_from_statement") => {
                    let module = self.field_text(child, "module_name").unwrap_or_default();
                    let mut cursor = child.walk();
                    let names: Vec<String> = child
                        .children_by_field_name("name", &mut cursor)
                        .map(|name| match name.kind() {
                            "aliased_import" => self.field_text(name, "name").unwrap_or_default(),
                            _ => self.text(name).to_string(),
                        })
                        .filter(|name| !name.is_empty())
                        .collect();
                    if names.is_empty() {
                        imports.push(module);
                    } else {
                        imports.extend(names.into_iter().map(|name| format!("{module}.{name}")));
                    }
                }
                (Language::JavaScript | Language::TypeScript, "import_statement") => {
                    if let Some(source) = self.field_text(child, "source") {
                        imports.push(source.trim_matches(|c| c == '"' || c == '\'').to_string());
                    }
                }
                _ => {}
            }
        }
        imports
    }

    fn items(&self, container: Node<'_>, scope: Scope) -> Vec<SyntaxNode> {
        let mut out = Vec::new();
        for child in named_children(container) {
            match self.language {
                Language::Rust => self.rust_item(child, scope, &mut out),
                Language::Python => self.python_item(child, scope, &mut out),
                _ => self.js_item(child, scope, &mut out),
            }
        }
        out
    }

    fn statement(&self, node: Node<'_>) -> SyntaxNode {
        let detail = if node.kind().contains("expression") {
            NodeDetail::Expression
        } else {
            NodeDetail::Statement
        };
        SyntaxNode::new(detail, None, self.location(node), self.text(node))
    }

    fn variable(&self, node: Node<'_>, name: Option<String>, type_name: Option<String>) -> SyntaxNode {
        SyntaxNode::new(
            NodeDetail::Variable { type_name },
            name,
            self.location(node),
            self.text(node),
        )
    }

    fn function(&self, node: Node<'_>) -> SyntaxNode {
        let parameters = node
            .child_by_field_name("parameters")
            .map(|params| self.parameters(params))
            .unwrap_or_default();
        let return_type = node
            .child_by_field_name("return_type")
            .and_then(|ret| clean_type(self.text(ret)));
        let body = node
            .child_by_field_name("body")
            .map(|body| self.items(body, Scope::Block))
            .unwrap_or_default();

        let detail = MethodDetail {
            return_type,
            parameters,
            throws: Vec::new(),
        };
        SyntaxNode::new(
            NodeDetail::Method(detail),
            self.field_text(node, "name"),
            self.location(node),
            self.text(node),
        )
        .with_children(body)
    }

    fn parameters(&self, params: Node<'_>) -> Vec<Parameter> {
        let mut out = Vec::new();
        for param in named_children(params) {
            let (name, type_name) = match param.kind() {
                "parameter" => (
                    self.field_text(param, "pattern"),
                    self.field_text(param, "type"),
                ),
                "identifier" => {
                    let name = self.text(param);
                    if self.language == Language::Python && matches!(name, "self" | "cls") {
                        continue;
                    }
                    (Some(name.to_string()), None)
                }
                "typed_parameter" => (
                    param.named_child(0).map(|n| self.text(n).to_string()),
                    self.field_text(param, "type"),
                ),
                "default_parameter" | "typed_default_parameter" => (
                    self.field_text(param, "name"),
                    self.field_text(param, "type"),
                ),
                "required_parameter" | "optional_parameter" => (
                    self.field_text(param, "pattern"),
                    param
                        .child_by_field_name("type")
                        .and_then(|t| clean_type(self.text(t))),
                ),
                "assignment_pattern" => (self.field_text(param, "left"), None),
                "list_splat_pattern" | "dictionary_splat_pattern" | "rest_pattern" => {
                    (param.named_child(0).map(|n| self.text(n).to_string()), None)
                }
                _ => continue,
            };
            if let Some(name) = name {
                out.push(Parameter::new(name, type_name.and_then(|t| clean_type(&t))));
            }
        }
        out
    }

    // Rust

    fn rust_item(&self, node: Node<'_>, scope: Scope, out: &mut Vec<SyntaxNode>) {
        match node.kind() {
            "function_item" | "function_signature_item" => out.push(self.function(node)),
            "struct_item" | "union_item" => out.push(self.rust_struct(node)),
            "enum_item" => out.push(self.rust_class(node, ClassDetail::new(ClassFlavor::Enum), None)),
            "trait_item" => {
                let mut detail = ClassDetail::new(ClassFlavor::Trait);
                if let Some(bounds) = node.child_by_field_name("bounds") {
                    detail.interfaces = named_children(bounds)
                        .into_iter()
                        .filter(|b| b.kind() != "lifetime")
                        .map(|b| self.text(b).to_string())
                        .collect();
                }
                out.push(self.rust_class(node, detail, None));
            }
            "impl_item" => {
                let mut detail = ClassDetail::new(ClassFlavor::Impl);
                detail.interfaces.extend(self.field_text(node, "trait"));
                let target = self.field_text(node, "type").map(|t| base_type_name(&t));
                out.push(self.rust_class(node, detail, target));
            }
            "mod_item" => {
                let body = node.child_by_field_name("body");
                let imports = body.map(|b| self.imports(b)).unwrap_or_default();
                let children = body
                    .map(|b| self.items(b, Scope::Module))
                    .unwrap_or_default();
                out.push(
                    SyntaxNode::new(
                        NodeDetail::Module {
                            language: self.language,
                            imports,
                        },
                        self.field_text(node, "name"),
                        self.location(node),
                        self.text(node),
                    )
                    .with_children(children),
                );
            }
            "const_item" | "static_item" => out.push(self.variable(
                node,
                self.field_text(node, "name"),
                self.field_text(node, "type"),
            )),
            "let_declaration" => out.push(self.variable(
                node,
                self.field_text(node, "pattern"),
                self.field_text(node, "type"),
            )),
            "use_declaration" | "attribute_item" | "inner_attribute_item" | "type_item" => {}
            kind if is_comment(kind) => {}
            _ if scope != Scope::ClassBody => out.push(self.statement(node)),
            _ => {}
        }
    }

    fn rust_struct(&self, node: Node<'_>) -> SyntaxNode {
        let mut fields = Vec::new();
        if let Some(body) = node.child_by_field_name("body") {
            match body.kind() {
                "field_declaration_list" => {
                    for field in named_children(body) {
                        if field.kind() == "field_declaration" {
                            fields.push(self.variable(
                                field,
                                self.field_text(field, "name"),
                                self.field_text(field, "type"),
                            ));
                        }
                    }
                }
                "ordered_field_declaration_list" => {
                    let mut cursor = body.walk();
                    let types: Vec<_> = body.children_by_field_name("type", &mut cursor).collect();
                    for (idx, ty) in types.into_iter().enumerate() {
                        fields.push(self.variable(
                            ty,
                            Some(idx.to_string()),
                            Some(self.text(ty).to_string()),
                        ));
                    }
                }
                _ => {}
            }
        }
        self.rust_class(node, ClassDetail::new(ClassFlavor::Struct), None)
            .with_children(fields)
    }

    fn rust_class(&self, node: Node<'_>, detail: ClassDetail, name: Option<String>) -> SyntaxNode {
        let body = match node.kind() {
            "struct_item" | "union_item" | "enum_item" => Vec::new(),
            _ => node
                .child_by_field_name("body")
                .map(|b| self.items(b, Scope::ClassBody))
                .unwrap_or_default(),
        };
        SyntaxNode::new(
            NodeDetail::Class(detail),
            name.or_else(|| self.field_text(node, "name")),
            self.location(node),
            self.text(node),
        )
        .with_children(body)
    }

    // Python

    fn python_item(&self, node: Node<'_>, scope: Scope, out: &mut Vec<SyntaxNode>) {
        match node.kind() {
            "function_definition" => out.push(self.function(node)),
            "class_definition" => out.push(self.python_class(node)),
            "decorated_definition" => {
                if let Some(definition) = node.child_by_field_name("definition") {
                    self.python_item(definition, scope, out);
                }
            }
            "expression_statement" => match node.named_child(0) {
                Some(assignment) if assignment.kind() == "assignment" => out.push(self.variable(
                    node,
                    self.field_text(assignment, "left"),
                    self.field_text(assignment, "type"),
                )),
                _ if scope != Scope::ClassBody => out.push(SyntaxNode::new(
                    NodeDetail::Expression,
                    None,
                    self.location(node),
                    self.text(node),
                )),
                _ => {}
            },
            "import_statement" | "import_from_statement" | "future_import_statement" => {}
            kind if is_comment(kind) => {}
            _ if scope != Scope::ClassBody => out.push(self.statement(node)),
            _ => {}
        }
    }

    fn python_class(&self, node: Node<'_>) -> SyntaxNode {
        let mut detail = ClassDetail::new(ClassFlavor::Class);
        if let Some(bases) = node.child_by_field_name("superclasses") {
            let mut names = named_children(bases)
                .into_iter()
                .filter(|b| matches!(b.kind(), "identifier" | "attribute" | "subscript"))
                .map(|b| self.text(b).to_string());
            detail.superclass = names.next();
            detail.interfaces = names.collect();
        }
        let body = node
            .child_by_field_name("body")
            .map(|b| self.items(b, Scope::ClassBody))
            .unwrap_or_default();
        SyntaxNode::new(
            NodeDetail::Class(detail),
            self.field_text(node, "name"),
            self.location(node),
            self.text(node),
        )
        .with_children(body)
    }

    // JavaScript / TypeScript

    fn js_item(&self, node: Node<'_>, scope: Scope, out: &mut Vec<SyntaxNode>) {
        match node.kind() {
            "function_declaration"
            | "generator_function_declaration"
            | "function_signature"
            | "method_definition"
            | "method_signature"
            | "abstract_method_signature" => out.push(self.function(node)),
            "class_declaration" | "abstract_class_declaration" | "class" => {
                out.push(self.js_class(node));
            }
            "interface_declaration" => out.push(self.ts_interface(node)),
            "enum_declaration" => out.push(SyntaxNode::new(
                NodeDetail::Class(ClassDetail::new(ClassFlavor::Enum)),
                self.field_text(node, "name"),
                self.location(node),
                self.text(node),
            )),
            "lexical_declaration" | "variable_declaration" => {
                for declarator in named_children(node) {
                    if declarator.kind() == "variable_declarator" {
                        out.push(self.variable(
                            declarator,
                            self.field_text(declarator, "name"),
                            declarator
                                .child_by_field_name("type")
                                .and_then(|t| clean_type(self.text(t))),
                        ));
                    }
                }
            }
            "public_field_definition" | "field_definition" | "property_signature" => {
                let name = self
                    .field_text(node, "name")
                    .or_else(|| self.field_text(node, "property"));
                let type_name = node
                    .child_by_field_name("type")
                    .and_then(|t| clean_type(self.text(t)));
                out.push(self.variable(node, name, type_name));
            }
            "export_statement" => match node.child_by_field_name("declaration") {
                Some(declaration) => self.js_item(declaration, scope, out),
                None if scope != Scope::ClassBody => out.push(self.statement(node)),
                None => {}
            },
            "import_statement" | "type_alias_declaration" | "decorator" => {}
            kind if is_comment(kind) => {}
            _ if scope != Scope::ClassBody => out.push(self.statement(node)),
            _ => {}
        }
    }

    fn js_class(&self, node: Node<'_>) -> SyntaxNode {
        let mut detail = ClassDetail::new(ClassFlavor::Class);
        for child in named_children(node) {
            if child.kind() != "class_heritage" {
                continue;
            }
            for clause in named_children(child) {
                match clause.kind() {
                    "extends_clause" => {
                        detail.superclass = clause
                            .child_by_field_name("value")
                            .or_else(|| clause.named_child(0))
                            .map(|v| self.text(v).to_string());
                    }
                    "implements_clause" => {
                        detail.interfaces.extend(
                            named_children(clause)
                                .into_iter()
                                .map(|t| self.text(t).to_string()),
                        );
                    }
                    _ => detail.superclass = Some(self.text(clause).to_string()),
                }
            }
        }
        let body = node
            .child_by_field_name("body")
            .map(|b| self.items(b, Scope::ClassBody))
            .unwrap_or_default();
        SyntaxNode::new(
            NodeDetail::Class(detail),
            self.field_text(node, "name"),
            self.location(node),
            self.text(node),
        )
        .with_children(body)
    }

    fn ts_interface(&self, node: Node<'_>) -> SyntaxNode {
        let mut detail = ClassDetail::new(ClassFlavor::Interface);
        for child in named_children(node) {
            if child.kind() == "extends_type_clause" {
                detail.interfaces.extend(
                    named_children(child)
                        .into_iter()
                        .map(|t| self.text(t).to_string()),
                );
            }
        }
        let body = node
            .child_by_field_name("body")
            .map(|b| self.items(b, Scope::ClassBody))
            .unwrap_or_default();
        SyntaxNode::new(
            NodeDetail::Class(detail),
            self.field_text(node, "name"),
            self.location(node),
            self.text(node),
        )
        .with_children(body)
    }
}
