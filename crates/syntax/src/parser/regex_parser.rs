//! Best-effort parsing for Java and Kotlin.
//!
//! The scanner works line by line on a copy of the source with comments and
//! literal contents blanked out, so brace counting only sees real code.
//! Declarations are recognized by their headers; a header opens a scope at
//! the next `{` and the scope ends at the matching `}`.

use super::SourceParser;
use crate::language::{Language, ParserBackend};
use crate::outcome::{ParseError, ParseMetrics, ParseOutcome};
use crate::types::{
    ClassDetail, ClassFlavor, MethodDetail, NodeDetail, NodeKind, Parameter, SourceLocation,
    SyntaxNode,
};
use regex::Regex;
use std::sync::LazyLock;
use std::time::Instant;

const ANNOTATION: &str = r"@[\w.]+(?:\([^)]*\))?";

static IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*import\s+(?:static\s+)?([A-Za-z_][\w.]*(?:\.\*)?)").expect("import pattern")
});

static CLASS_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"^\s*((?:(?:{ann}|public|protected|private|internal|abstract|final|static|sealed|non-sealed|open|data|inner|enum|annotation|value|strictfp|companion|fun)\s+)*)(class|interface|enum|record|object|@interface)(?:\s+([A-Za-z_$][\w$]*))?(?:[\s{{(<:]|$)",
        ann = ANNOTATION
    ))
    .expect("class header pattern")
});

static JAVA_METHOD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"^\s*(?:(?:{ann}|public|protected|private|static|final|abstract|synchronized|native|default|strictfp)\s+)*(?:<[^>]*>\s+)?([\w.$]+(?:<[^;{{}}()]*>)?(?:\[\])*)\s+([A-Za-z_$][\w$]*)\s*\(",
        ann = ANNOTATION
    ))
    .expect("java method pattern")
});

static JAVA_CONSTRUCTOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"^\s*(?:(?:{ann}|public|protected|private)\s+)*([A-Za-z_$][\w$]*)\s*\(",
        ann = ANNOTATION
    ))
    .expect("java constructor pattern")
});

static JAVA_FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"^\s*(?:(?:{ann}|public|protected|private|static|final|transient|volatile)\s+)*([\w.$]+(?:<[^;{{}}()=]*>)?(?:\[\])*)\s+([A-Za-z_$][\w$]*)\s*(?:=[^;]*)?;",
        ann = ANNOTATION
    ))
    .expect("java field pattern")
});

static KOTLIN_FUN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"^\s*(?:(?:{ann}|public|protected|private|internal|open|override|abstract|final|suspend|inline|operator|infix|tailrec|external|actual|expect)\s+)*fun\s+(?:<[^>]*>\s*)?(?:[\w.<>?]+\.)?([A-Za-z_]\w*)\s*\(",
        ann = ANNOTATION
    ))
    .expect("kotlin fun pattern")
});

static KOTLIN_PROPERTY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"^\s*(?:(?:{ann}|public|protected|private|internal|open|override|abstract|final|const|lateinit|actual|expect)\s+)*(?:val|var)\s+([A-Za-z_]\w*)\s*(?::\s*([^=]+?))?\s*(?:(?:=|\bby\b).*)?$",
        ann = ANNOTATION
    ))
    .expect("kotlin property pattern")
});

static JAVA_HERITAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(extends|implements|permits)\b").expect("heritage pattern"));

static THROWS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bthrows\s+(.+)$").expect("throws pattern"));

static ANNOTATIONS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(ANNOTATION).expect("annotation pattern"));

/// Words that can precede `(` in a method body or header without naming a type
const JAVA_RESERVED: &[&str] = &[
    "return", "new", "else", "throw", "case", "yield", "if", "for", "while", "switch", "catch",
    "synchronized", "public", "protected", "private", "static", "final", "abstract", "native",
    "default", "package", "import", "assert", "break", "continue",
];

/// Java/Kotlin parser driven by declaration-header patterns and brace depth
pub struct RegexParser;

impl RegexParser {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RegexParser {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceParser for RegexParser {
    fn name(&self) -> &'static str {
        "regex"
    }

    fn supports(&self, language: Language) -> bool {
        language.backend() == Some(ParserBackend::Regex)
    }

    fn parse(&self, source: &str, language: Language, path: &str) -> ParseOutcome {
        if !self.supports(language) {
            return ParseOutcome::failure(ParseError::unsupported_language(language));
        }
        let started = Instant::now();

        match Scanner::new(source, language, path).run() {
            Ok((root, warnings)) => {
                let metrics = ParseMetrics {
                    node_count: root.node_count(),
                    line_count: source.lines().count(),
                    duration_micros: u64::try_from(started.elapsed().as_micros())
                        .unwrap_or(u64::MAX),
                };
                ParseOutcome::success(root, warnings, metrics)
            }
            Err(error) => ParseOutcome::failure(error),
        }
    }
}

enum DeclKind {
    Class { flavor: ClassFlavor, keyword: String },
    JavaMethod { return_type: Option<String> },
    KotlinFun,
}

/// A declaration header seen but not yet attached to a body
struct Pending {
    kind: DeclKind,
    name: Option<String>,
    header: String,
    /// Byte offset in `header` just past the declared name
    name_end: usize,
    start_line: usize,
    start_column: usize,
    end_line: usize,
    paren_depth: i32,
}

enum LineMatch {
    Import(String),
    Member(SyntaxNode),
    Declaration(Pending),
    Nothing,
}

struct Frame {
    node: SyntaxNode,
    body_depth: usize,
}

struct Scanner<'a> {
    source: &'a str,
    language: Language,
    path: &'a str,
    lines: Vec<&'a str>,
    depth: usize,
    stack: Vec<Frame>,
    pending: Option<Pending>,
    module_children: Vec<SyntaxNode>,
    imports: Vec<String>,
    warnings: Vec<ParseError>,
}

impl<'a> Scanner<'a> {
    fn new(source: &'a str, language: Language, path: &'a str) -> Self {
        Self {
            source,
            language,
            path,
            lines: source.lines().collect(),
            depth: 0,
            stack: Vec::new(),
            pending: None,
            module_children: Vec::new(),
            imports: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn run(mut self) -> Result<(SyntaxNode, Vec<ParseError>), ParseError> {
        let code = sanitize(self.source);
        for (idx, line) in code.iter().enumerate() {
            self.scan_line(idx + 1, line)?;
        }
        Ok(self.finish())
    }

    fn scan_line(&mut self, line_no: usize, code: &str) -> Result<(), ParseError> {
        let mut offset = 0;
        while offset < code.len() {
            match self.scan_segment(line_no, code, offset)? {
                Some(next) => offset = next,
                None => break,
            }
        }
        Ok(())
    }

    /// Scan `line[offset..]` until the member scope changes. Returns the
    /// offset the rest of the line resumes from, so several members on one
    /// line are each matched.
    fn scan_segment(
        &mut self,
        line_no: usize,
        line: &str,
        offset: usize,
    ) -> Result<Option<usize>, ParseError> {
        let code = &line[offset..];
        let trimmed = code.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }

        // Kotlin lets classes and functions go without a body
        if self.language == Language::Kotlin
            && self
                .pending
                .as_ref()
                .is_some_and(|p| p.end_line < line_no && !continues_header(p, trimmed))
        {
            self.flush_pending();
        }

        match self.match_line(line_no, scope_text(code), offset) {
            LineMatch::Import(import) => self.imports.push(import),
            LineMatch::Member(node) => {
                self.flush_pending();
                self.attach(node);
            }
            LineMatch::Declaration(pending) => {
                self.flush_pending();
                self.pending = Some(pending);
            }
            LineMatch::Nothing => {
                if let Some(pending) = self.pending.as_mut() {
                    pending.header.push(' ');
                    pending.header.push_str(trimmed);
                    pending.end_line = line_no;
                }
            }
        }

        for (idx, ch) in code.char_indices() {
            let resume = offset + idx + 1;
            match ch {
                '(' => {
                    if let Some(pending) = self.pending.as_mut() {
                        pending.paren_depth += 1;
                    }
                }
                ')' => {
                    if let Some(pending) = self.pending.as_mut() {
                        pending.paren_depth -= 1;
                    }
                }
                '{' => {
                    self.depth += 1;
                    if self.pending_at_top_level() {
                        if let Some(pending) = self.pending.take() {
                            let node = self.build(pending);
                            self.stack.push(Frame {
                                node,
                                body_depth: self.depth,
                            });
                            return Ok(Some(resume));
                        }
                    }
                }
                '}' => {
                    if self.depth == 0 {
                        return Err(ParseError::syntax(
                            "unbalanced closing brace",
                            Some(SourceLocation::point(self.path, line_no, resume)),
                        ));
                    }
                    if self.pending_at_top_level() {
                        self.flush_pending();
                    }
                    if self
                        .stack
                        .last()
                        .is_some_and(|frame| frame.body_depth == self.depth)
                    {
                        self.close_frame(line_no, resume + 1);
                    }
                    self.depth -= 1;
                    if self.pending.is_none() && self.at_member_level() {
                        return Ok(Some(resume));
                    }
                }
                ';' => {
                    if self.pending_at_top_level() {
                        self.flush_pending();
                    }
                    if self.pending.is_none() && self.at_member_level() {
                        return Ok(Some(resume));
                    }
                }
                '=' if self.pending_at_top_level()
                    && matches!(
                        self.pending.as_ref().map(|p| &p.kind),
                        Some(DeclKind::KotlinFun)
                    )
                    && is_assignment(code, idx) =>
                {
                    self.flush_pending();
                }
                _ => {}
            }
        }
        Ok(None)
    }

    fn pending_at_top_level(&self) -> bool {
        self.pending.as_ref().is_some_and(|p| p.paren_depth <= 0)
    }

    /// Whether the scanner sits directly in a declaration body or at file level
    fn at_member_level(&self) -> bool {
        match self.stack.last() {
            Some(frame) => self.depth == frame.body_depth,
            None => self.depth == 0,
        }
    }

    fn match_line(&self, line_no: usize, code: &str, offset: usize) -> LineMatch {
        let scope = self.stack.last().map(|frame| frame.node.kind());
        let column = offset + code.len() - code.trim_start().len() + 1;

        if scope.is_none() && self.depth == 0 {
            if let Some(caps) = IMPORT.captures(code) {
                return LineMatch::Import(caps[1].to_string());
            }
        }

        if let Some(caps) = CLASS_HEADER.captures(code) {
            let modifiers = caps.get(1).map_or("", |m| m.as_str());
            let keyword = caps[2].to_string();
            let name = caps.get(3).map(|m| m.as_str().to_string());
            if name.is_some() || keyword == "object" {
                let name_end = caps
                    .get(3)
                    .or_else(|| caps.get(2))
                    .map_or(code.len(), |m| m.end());
                let flavor = class_flavor(&keyword, modifiers);
                let name = name.or_else(|| Some("Companion".to_string()));
                return LineMatch::Declaration(self.pending(
                    DeclKind::Class { flavor, keyword },
                    name,
                    code,
                    name_end,
                    line_no,
                    column,
                ));
            }
        }

        if !self.at_member_level() {
            return LineMatch::Nothing;
        }

        match (self.language, scope) {
            (Language::Java, Some(NodeKind::Class)) => self.match_java_member(line_no, code, column),
            (Language::Kotlin, None | Some(NodeKind::Class)) => {
                self.match_kotlin_member(line_no, code, column)
            }
            _ => LineMatch::Nothing,
        }
    }

    fn match_java_member(&self, line_no: usize, code: &str, column: usize) -> LineMatch {
        if let Some(caps) = JAVA_METHOD.captures(code) {
            let return_type = &caps[1];
            let name = &caps[2];
            if !JAVA_RESERVED.contains(&return_type) && !JAVA_RESERVED.contains(&name) {
                let name_end = caps.get(2).map_or(code.len(), |m| m.end());
                return LineMatch::Declaration(self.pending(
                    DeclKind::JavaMethod {
                        return_type: Some(return_type.to_string()),
                    },
                    Some(name.to_string()),
                    code,
                    name_end,
                    line_no,
                    column,
                ));
            }
        }

        if let Some(caps) = JAVA_CONSTRUCTOR.captures(code) {
            let enclosing = self.stack.last().and_then(|frame| frame.node.name());
            if enclosing == Some(&caps[1]) {
                let name_end = caps.get(1).map_or(code.len(), |m| m.end());
                return LineMatch::Declaration(self.pending(
                    DeclKind::JavaMethod { return_type: None },
                    Some(caps[1].to_string()),
                    code,
                    name_end,
                    line_no,
                    column,
                ));
            }
        }

        if let Some(caps) = JAVA_FIELD.captures(code) {
            if !JAVA_RESERVED.contains(&&caps[1]) {
                return LineMatch::Member(self.member(
                    line_no,
                    column,
                    caps[2].to_string(),
                    Some(caps[1].to_string()),
                ));
            }
        }

        LineMatch::Nothing
    }

    fn match_kotlin_member(&self, line_no: usize, code: &str, column: usize) -> LineMatch {
        if let Some(caps) = KOTLIN_FUN.captures(code) {
            let name_end = caps.get(1).map_or(code.len(), |m| m.end());
            return LineMatch::Declaration(self.pending(
                DeclKind::KotlinFun,
                Some(caps[1].to_string()),
                code,
                name_end,
                line_no,
                column,
            ));
        }

        if let Some(caps) = KOTLIN_PROPERTY.captures(code) {
            let type_name = caps
                .get(2)
                .map(|m| m.as_str().trim().to_string())
                .filter(|t| !t.is_empty());
            return LineMatch::Member(self.member(line_no, column, caps[1].to_string(), type_name));
        }

        LineMatch::Nothing
    }

    fn pending(
        &self,
        kind: DeclKind,
        name: Option<String>,
        code: &str,
        name_end: usize,
        line_no: usize,
        column: usize,
    ) -> Pending {
        Pending {
            kind,
            name,
            header: code.to_string(),
            name_end,
            start_line: line_no,
            start_column: column,
            end_line: line_no,
            paren_depth: 0,
        }
    }

    fn member(
        &self,
        line_no: usize,
        column: usize,
        name: String,
        type_name: Option<String>,
    ) -> SyntaxNode {
        let line = self.lines.get(line_no - 1).copied().unwrap_or("");
        SyntaxNode::variable(
            name,
            type_name,
            SourceLocation::new(self.path, line_no, column, line_no, line.len() + 1),
            line.trim(),
        )
    }

    /// Turn a header into a node. The end position and text are filled in
    /// when the declaration closes.
    fn build(&self, pending: Pending) -> SyntaxNode {
        let location = SourceLocation::point(self.path, pending.start_line, pending.start_column);
        let signature = pending
            .header
            .get(pending.name_end..)
            .map(cut_at_body)
            .unwrap_or("");

        match pending.kind {
            DeclKind::Class { flavor, keyword } => {
                let (detail, components) = self.class_detail(flavor, &keyword, signature);
                let fields = components.into_iter().map(|param| {
                    SyntaxNode::variable(param.name, param.type_name, location.clone(), "")
                });
                SyntaxNode::new(NodeDetail::Class(detail), pending.name, location.clone(), "")
                    .with_children(fields.collect::<Vec<_>>())
            }
            DeclKind::JavaMethod { return_type } => {
                let (params, rest) = split_parameters(signature);
                let throws = THROWS
                    .captures(rest)
                    .map(|caps| {
                        split_top_level(&caps[1])
                            .into_iter()
                            .map(str::to_string)
                            .collect()
                    })
                    .unwrap_or_default();
                let detail = MethodDetail {
                    return_type,
                    parameters: java_parameters(params),
                    throws,
                };
                SyntaxNode::new(NodeDetail::Method(detail), pending.name, location, "")
            }
            DeclKind::KotlinFun => {
                let (params, rest) = split_parameters(signature);
                let detail = MethodDetail {
                    return_type: kotlin_return_type(rest),
                    parameters: kotlin_parameters(params)
                        .into_iter()
                        .map(|(param, _)| param)
                        .collect(),
                    throws: Vec::new(),
                };
                SyntaxNode::new(NodeDetail::Method(detail), pending.name, location, "")
            }
        }
    }

    /// Heritage and primary-constructor properties from the text after a
    /// class name
    fn class_detail(
        &self,
        flavor: ClassFlavor,
        keyword: &str,
        signature: &str,
    ) -> (ClassDetail, Vec<Parameter>) {
        let mut detail = ClassDetail::new(flavor);
        let mut components = Vec::new();

        let mut rest = signature.trim_start();
        if rest.starts_with('<') {
            if let Some((_, close)) = bracket_group(rest, '<', '>') {
                rest = rest[close + 1..].trim_start();
            }
        }
        for word in ["private", "protected", "internal", "public", "constructor"] {
            if let Some(stripped) = rest.strip_prefix(word) {
                rest = stripped.trim_start();
            }
        }
        if rest.starts_with('(') {
            let (params, after) = split_parameters(rest);
            components = match self.language {
                Language::Kotlin => kotlin_parameters(params)
                    .into_iter()
                    .filter_map(|(param, is_property)| is_property.then_some(param))
                    .collect(),
                _ => java_parameters(params),
            };
            rest = after;
        }

        match self.language {
            Language::Kotlin => {
                if let Some(list) = rest.trim_start().strip_prefix(':') {
                    let list = list.split(" where ").next().unwrap_or(list);
                    for entry in split_top_level(list) {
                        let entry = entry.split(" by ").next().unwrap_or(entry).trim();
                        match entry.find('(') {
                            Some(paren) if detail.superclass.is_none() => {
                                detail.superclass = Some(entry[..paren].trim().to_string());
                            }
                            _ => detail.interfaces.push(entry.to_string()),
                        }
                    }
                }
            }
            _ => {
                let marks: Vec<_> = JAVA_HERITAGE.captures_iter(rest).collect();
                for (idx, caps) in marks.iter().enumerate() {
                    let (Some(whole), Some(word)) = (caps.get(0), caps.get(1)) else {
                        continue;
                    };
                    let end = marks
                        .get(idx + 1)
                        .and_then(|next| next.get(0))
                        .map_or(rest.len(), |m| m.start());
                    let names = split_top_level(&rest[whole.end()..end]);
                    match word.as_str() {
                        "extends" if keyword != "interface" && keyword != "@interface" => {
                            let mut names = names.into_iter();
                            detail.superclass = names.next().map(str::to_string);
                            detail.interfaces.extend(names.map(str::to_string));
                        }
                        "extends" | "implements" => {
                            detail.interfaces.extend(names.into_iter().map(str::to_string));
                        }
                        _ => {}
                    }
                }
            }
        }

        (detail, components)
    }

    fn flush_pending(&mut self) {
        let Some(pending) = self.pending.take() else {
            return;
        };
        let end_line = pending.end_line;
        let mut node = self.build(pending);
        self.close(&mut node, end_line, self.line_len(end_line) + 1);
        self.attach(node);
    }

    fn close_frame(&mut self, line_no: usize, end_column: usize) {
        if let Some(frame) = self.stack.pop() {
            let mut node = frame.node;
            self.close(&mut node, line_no, end_column);
            self.attach(node);
        }
    }

    fn close(&self, node: &mut SyntaxNode, end_line: usize, end_column: usize) {
        node.location.end_line = end_line;
        node.location.end_column = end_column;
        let start = node.location.start_line.saturating_sub(1);
        node.text = self
            .lines
            .get(start..end_line.min(self.lines.len()))
            .map(|lines| lines.join("\n"))
            .unwrap_or_default();
    }

    fn attach(&mut self, node: SyntaxNode) {
        match self.stack.last_mut() {
            Some(frame) => frame.node.children.push(node),
            None => self.module_children.push(node),
        }
    }

    fn line_len(&self, line_no: usize) -> usize {
        self.lines
            .get(line_no.saturating_sub(1))
            .map_or(0, |line| line.len())
    }

    fn finish(mut self) -> (SyntaxNode, Vec<ParseError>) {
        self.flush_pending();

        let last_line = self.lines.len().max(1);
        let last_column = self.line_len(last_line) + 1;
        while let Some(frame) = self.stack.last() {
            let start = &frame.node.location;
            self.warnings.push(ParseError::syntax(
                format!(
                    "unclosed declaration `{}`",
                    frame.node.name().unwrap_or("anonymous")
                ),
                Some(SourceLocation::point(
                    self.path,
                    start.start_line,
                    start.start_column,
                )),
            ));
            self.close_frame(last_line, last_column);
        }

        for child in &mut self.module_children {
            if let NodeDetail::Class(detail) = &mut child.detail {
                detail.imports = self.imports.clone();
            }
        }

        let location = SourceLocation::new(self.path, 1, 1, last_line, last_column);
        let root = SyntaxNode::module(self.language, self.imports, location, self.source)
            .with_children(self.module_children);
        (root, self.warnings)
    }
}

fn class_flavor(keyword: &str, modifiers: &str) -> ClassFlavor {
    let has = |word: &str| modifiers.split_whitespace().any(|m| m == word);
    match keyword {
        "interface" | "@interface" => ClassFlavor::Interface,
        "enum" => ClassFlavor::Enum,
        "object" => ClassFlavor::Object,
        _ if has("enum") => ClassFlavor::Enum,
        _ if has("annotation") => ClassFlavor::Interface,
        _ => ClassFlavor::Class,
    }
}

fn continues_header(pending: &Pending, trimmed: &str) -> bool {
    pending.paren_depth > 0
        || trimmed.starts_with(['{', ':', ',', ')', '('])
        || trimmed.starts_with("where ")
        || pending.header.trim_end().ends_with([':', ',', '('])
}

/// Text up to the `}` that closes the enclosing scope
fn scope_text(code: &str) -> &str {
    let mut depth = 0usize;
    for (idx, ch) in code.char_indices() {
        match ch {
            '{' => depth += 1,
            '}' if depth == 0 => return &code[..idx],
            '}' => depth -= 1,
            _ => {}
        }
    }
    code
}

/// `=` that is not part of `==`, `!=`, `<=`, `>=`
fn is_assignment(code: &str, idx: usize) -> bool {
    let before = code[..idx].chars().next_back();
    let after = code[idx + 1..].chars().next();
    !matches!(before, Some('=' | '!' | '<' | '>')) && after != Some('=')
}

/// Header text before the body or terminator
fn cut_at_body(text: &str) -> &str {
    let mut depth = 0i32;
    for (idx, ch) in text.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => depth -= 1,
            '{' | ';' if depth <= 0 => return &text[..idx],
            _ => {}
        }
    }
    text
}

/// Split `(params) rest` into the parameter list and what follows it
fn split_parameters(text: &str) -> (&str, &str) {
    match bracket_group(text, '(', ')') {
        Some((open, close)) => (&text[open + 1..close], &text[close + 1..]),
        None => match text.find('(') {
            Some(open) => (&text[open + 1..], ""),
            None => ("", text),
        },
    }
}

/// Byte offsets of the first `open` and its matching `close`
fn bracket_group(text: &str, open: char, close: char) -> Option<(usize, usize)> {
    let start = text.find(open)?;
    let mut depth = 0usize;
    for (idx, ch) in text[start..].char_indices() {
        if ch == open {
            depth += 1;
        } else if ch == close {
            depth -= 1;
            if depth == 0 {
                return Some((start, start + idx));
            }
        }
    }
    None
}

/// Split on commas outside of brackets and generics
fn split_top_level(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    let mut prev = ' ';
    for (idx, ch) in text.char_indices() {
        match ch {
            '<' | '(' | '[' => depth += 1,
            '>' if prev != '-' => depth -= 1,
            ')' | ']' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(text[start..idx].trim());
                start = idx + 1;
            }
            _ => {}
        }
        prev = ch;
    }
    parts.push(text[start..].trim());
    parts.retain(|part| !part.is_empty());
    parts
}

fn java_parameters(text: &str) -> Vec<Parameter> {
    split_top_level(text)
        .into_iter()
        .filter_map(|piece| {
            let piece = ANNOTATIONS.replace_all(piece, "");
            let tokens: Vec<&str> = piece
                .split_whitespace()
                .filter(|token| *token != "final")
                .collect();
            let (name, type_tokens) = tokens.split_last()?;
            if type_tokens.is_empty() {
                return None;
            }
            Some(Parameter::typed(*name, type_tokens.join(" ")))
        })
        .collect()
}

/// Kotlin parameters, flagged when declared `val`/`var`
fn kotlin_parameters(text: &str) -> Vec<(Parameter, bool)> {
    const MODIFIERS: &[&str] = &[
        "vararg",
        "private",
        "protected",
        "internal",
        "public",
        "override",
        "open",
        "final",
        "crossinline",
        "noinline",
    ];

    split_top_level(text)
        .into_iter()
        .filter_map(|piece| {
            let piece = ANNOTATIONS.replace_all(piece, "");
            let mut rest = piece.trim();
            let mut is_property = false;
            loop {
                let Some((word, tail)) = rest.split_once(char::is_whitespace) else {
                    break;
                };
                if word == "val" || word == "var" {
                    is_property = true;
                } else if !MODIFIERS.contains(&word) {
                    break;
                }
                rest = tail.trim_start();
            }

            let (name, type_name) = match rest.split_once(':') {
                Some((name, ty)) => {
                    let ty = ty.split('=').next().unwrap_or(ty).trim();
                    (name.trim(), (!ty.is_empty()).then(|| ty.to_string()))
                }
                None => (rest.split('=').next().unwrap_or(rest).trim(), None),
            };
            (!name.is_empty()).then(|| (Parameter::new(name, type_name), is_property))
        })
        .collect()
}

fn kotlin_return_type(rest: &str) -> Option<String> {
    let after = rest.trim_start().strip_prefix(':')?;
    let mut depth = 0i32;
    let mut end = after.len();
    let mut prev = ' ';
    for (idx, ch) in after.char_indices() {
        match ch {
            '<' | '(' => depth += 1,
            '>' if prev != '-' => depth -= 1,
            ')' => depth -= 1,
            '=' | '{' if depth <= 0 => {
                end = idx;
                break;
            }
            _ => {}
        }
        prev = ch;
    }
    let ty = after[..end].split(" where ").next().unwrap_or("").trim();
    (!ty.is_empty()).then(|| ty.to_string())
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum LexState {
    Code,
    BlockComment,
    TextBlock,
}

/// Copy of the source with comments removed and literal contents blanked.
/// Byte offsets within each line are preserved.
fn sanitize(source: &str) -> Vec<String> {
    fn blank(out: &mut String, ch: char) {
        out.extend(std::iter::repeat(' ').take(ch.len_utf8()));
    }

    let mut state = LexState::Code;
    let mut result = Vec::new();
    for line in source.lines() {
        let mut out = String::with_capacity(line.len());
        let mut quote: Option<char> = None;
        let mut chars = line.char_indices();
        while let Some((idx, ch)) = chars.next() {
            let rest = &line[idx..];
            match state {
                LexState::BlockComment => {
                    if rest.starts_with("*/") {
                        chars.next();
                        out.push_str("  ");
                        state = LexState::Code;
                    } else {
                        blank(&mut out, ch);
                    }
                }
                LexState::TextBlock => {
                    if rest.starts_with("\"\"\"") {
                        chars.next();
                        chars.next();
                        out.push_str("\"\"\"");
                        state = LexState::Code;
                    } else {
                        blank(&mut out, ch);
                    }
                }
                LexState::Code => {
                    if let Some(open) = quote {
                        if ch == '\\' {
                            blank(&mut out, ch);
                            if let Some((_, escaped)) = chars.next() {
                                blank(&mut out, escaped);
                            }
                        } else if ch == open {
                            out.push(ch);
                            quote = None;
                        } else {
                            blank(&mut out, ch);
                        }
                    } else if rest.starts_with("//") {
                        break;
                    } else if rest.starts_with("/*") {
                        chars.next();
                        out.push_str("  ");
                        state = LexState::BlockComment;
                    } else if rest.starts_with("\"\"\"") {
                        chars.next();
                        chars.next();
                        out.push_str("\"\"\"");
                        state = LexState::TextBlock;
                    } else if ch == '"' || ch == '\'' {
                        out.push(ch);
                        quote = Some(ch);
                    } else {
                        out.push(ch);
                    }
                }
            }
        }
        result.push(out);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(source: &str, language: Language) -> SyntaxNode {
        RegexParser::new()
            .parse(source, language, "Test.src")
            .into_root()
            .expect("parse succeeds")
    }

    fn child<'n>(node: &'n SyntaxNode, name: &str) -> &'n SyntaxNode {
        node.children
            .iter()
            .find(|c| c.name() == Some(name))
            .unwrap_or_else(|| panic!("child {name} not found"))
    }

    #[test]
    fn java_class_members_and_heritage() {
        let code = r#"package com.acme;

import java.util.List;
import com.acme.base.Base;

public class Widget extends Base implements Runnable, Comparable<Widget> {
    private final List<String> names = new ArrayList<>();
    private int count;

    public Widget(int count) {
        this.count = count;
    }

    @Override
    public void run() throws IOException, InterruptedException {
        if (count > 0) {
            System.out.println("{");
        }
    }
}
"#;
        let root = parse(code, Language::Java);
        assert_eq!(
            root.module_imports(),
            &["java.util.List".to_string(), "com.acme.base.Base".to_string()]
        );
        assert_eq!(root.children.len(), 1);

        let widget = &root.children[0];
        let detail = widget.class_detail().unwrap();
        assert_eq!(detail.superclass.as_deref(), Some("Base"));
        assert_eq!(
            detail.interfaces,
            vec!["Runnable".to_string(), "Comparable<Widget>".to_string()]
        );
        assert_eq!(detail.imports.len(), 2);
        assert_eq!(widget.location.start_line, 6);
        assert_eq!(widget.location.end_line, 20);

        let fields: Vec<_> = widget
            .fields()
            .map(|f| (f.name().unwrap(), f.variable_type().unwrap()))
            .collect();
        assert_eq!(fields, vec![("names", "List<String>"), ("count", "int")]);

        let ctor = child(widget, "Widget").method_detail().unwrap();
        assert_eq!(ctor.return_type, None);
        assert_eq!(ctor.parameters, vec![Parameter::typed("count", "int")]);

        let run = child(widget, "run");
        let detail = run.method_detail().unwrap();
        assert_eq!(detail.return_type.as_deref(), Some("void"));
        assert_eq!(
            detail.throws,
            vec!["IOException".to_string(), "InterruptedException".to_string()]
        );
        assert_eq!(run.location.start_line, 15);
        assert_eq!(run.location.end_line, 19);
    }

    #[test]
    fn java_single_line_classes() {
        let root = parse("class A extends B {}\nclass B extends A {}\n", Language::Java);
        let names: Vec<_> = root.children.iter().filter_map(|c| c.name()).collect();
        assert_eq!(names, vec!["A", "B"]);
        assert_eq!(
            root.children[1].class_detail().and_then(|d| d.superclass.as_deref()),
            Some("A")
        );
        assert_eq!(root.children[0].text, "class A extends B {}");
    }

    #[test]
    fn java_members_on_the_opening_line() {
        let root = parse(
            "class W { Widget make(Gadget g) throws Oops { return null; } Helper h; int n; }",
            Language::Java,
        );
        let w = &root.children[0];
        assert_eq!(w.location.end_line, 1);

        let make = child(w, "make").method_detail().unwrap();
        assert_eq!(make.return_type.as_deref(), Some("Widget"));
        assert_eq!(make.parameters, vec![Parameter::typed("g", "Gadget")]);
        assert_eq!(make.throws, vec!["Oops".to_string()]);

        let fields: Vec<_> = w
            .fields()
            .map(|f| (f.name().unwrap(), f.variable_type().unwrap()))
            .collect();
        assert_eq!(fields, vec![("h", "Helper"), ("n", "int")]);
        assert_eq!(child(w, "h").location.start_column, 62);
    }

    #[test]
    fn java_array_initializer_stays_one_field() {
        let root = parse("class T {
    int[] xs = {1, 2}; Tag tag;
}
", Language::Java);
        let fields: Vec<_> = root.children[0]
            .fields()
            .map(|f| (f.name().unwrap(), f.variable_type().unwrap()))
            .collect();
        assert_eq!(fields, vec![("xs", "int[]"), ("tag", "Tag")]);
    }

    #[test]
    fn kotlin_members_on_the_opening_line() {
        let root = parse(
            "class K { fun go(a: Widget): Gadget = a.g() }
class P { val b: Box }
",
            Language::Kotlin,
        );
        let go = child(&root.children[0], "go").method_detail().unwrap();
        assert_eq!(go.return_type.as_deref(), Some("Gadget"));
        assert_eq!(go.parameters, vec![Parameter::typed("a", "Widget")]);

        let fields: Vec<_> = root.children[1]
            .fields()
            .map(|f| (f.name().unwrap(), f.variable_type()))
            .collect();
        assert_eq!(fields, vec![("b", Some("Box"))]);
    }

    #[test]
    fn java_interface_with_abstract_and_nested() {
        let code = r#"interface Shape extends Comparable<Shape>, Serializable {
    double area();
    class Unit implements Shape {
        public double area() { return 1.0; }
    }
}"#;
        let root = parse(code, Language::Java);
        let shape = &root.children[0];
        let detail = shape.class_detail().unwrap();
        assert_eq!(detail.flavor, Some(ClassFlavor::Interface));
        assert_eq!(detail.superclass, None);
        assert_eq!(
            detail.interfaces,
            vec!["Comparable<Shape>".to_string(), "Serializable".to_string()]
        );

        let area = child(shape, "area");
        assert_eq!(area.kind(), NodeKind::Method);
        assert_eq!(area.location.end_line, 2);

        let unit = child(shape, "Unit");
        assert_eq!(unit.class_detail().unwrap().interfaces, vec!["Shape".to_string()]);
        assert_eq!(unit.methods().count(), 1);
    }

    #[test]
    fn kotlin_declarations() {
        let code = r#"package shapes

import shapes.base.Shape
import kotlin.math.PI

data class Circle(val radius: Double, private val label: String, scale: Int = 1) : Shape(), Drawable {
    val area: Double
        get() = PI * radius * radius

    fun scaled(factor: Double): Circle = Circle(radius * factor, label)

    fun draw(canvas: Canvas): Unit {
        canvas.paint(this)
    }

    companion object {
        const val UNIT = 1.0
    }
}

class Marker(val id: Int)

fun main() {
    println(Circle(1.0, "c").scaled(2.0))
}
"#;
        let root = parse(code, Language::Kotlin);
        assert_eq!(
            root.module_imports(),
            &["shapes.base.Shape".to_string(), "kotlin.math.PI".to_string()]
        );
        let names: Vec<_> = root.children.iter().filter_map(|c| c.name()).collect();
        assert_eq!(names, vec!["Circle", "Marker", "main"]);

        let circle = &root.children[0];
        let detail = circle.class_detail().unwrap();
        assert_eq!(detail.superclass.as_deref(), Some("Shape"));
        assert_eq!(detail.interfaces, vec!["Drawable".to_string()]);

        let fields: Vec<_> = circle
            .fields()
            .map(|f| (f.name().unwrap(), f.variable_type()))
            .collect();
        assert_eq!(
            fields,
            vec![
                ("radius", Some("Double")),
                ("label", Some("String")),
                ("area", Some("Double"))
            ]
        );

        let scaled = child(circle, "scaled").method_detail().unwrap();
        assert_eq!(scaled.return_type.as_deref(), Some("Circle"));
        assert_eq!(scaled.parameters, vec![Parameter::typed("factor", "Double")]);

        let draw = child(circle, "draw");
        assert_eq!(draw.method_detail().unwrap().return_type.as_deref(), Some("Unit"));
        assert_eq!(draw.location.end_line, 14);

        let companion = child(circle, "Companion");
        assert_eq!(
            companion.class_detail().unwrap().flavor,
            Some(ClassFlavor::Object)
        );
        assert_eq!(companion.fields().count(), 1);

        let marker = &root.children[1];
        assert_eq!(marker.location.start_line, 21);
        assert_eq!(marker.location.end_line, 21);
        assert_eq!(marker.fields().count(), 1);
    }

    #[test]
    fn braces_in_comments_and_strings_are_ignored() {
        let code = r#"class Quoted {
    // } stray brace in comment
    /* { block
       } */
    String s = "}{";
    char c = '{';
}"#;
        let outcome = RegexParser::new().parse(code, Language::Java, "Quoted.java");
        assert!(outcome.is_success());
        assert!(outcome.problems().is_empty());
        let quoted = &outcome.root().unwrap().children[0];
        assert_eq!(quoted.fields().count(), 2);
        assert_eq!(quoted.location.end_line, 7);
    }

    #[test]
    fn unbalanced_brace_fails_with_location() {
        let outcome = RegexParser::new().parse("class A {\n}\n}\n", Language::Java, "A.java");
        assert!(!outcome.is_success());
        let error = &outcome.problems()[0];
        assert_eq!(error.location, Some(SourceLocation::point("A.java", 3, 1)));
    }

    #[test]
    fn unclosed_scopes_become_warnings() {
        let outcome = RegexParser::new().parse(
            "public class Open {\n    void f() {\n",
            Language::Java,
            "Open.java",
        );
        assert!(outcome.is_success());
        assert_eq!(outcome.problems().len(), 2);
        let open = &outcome.root().unwrap().children[0];
        assert_eq!(open.name(), Some("Open"));
        assert_eq!(open.methods().count(), 1);
        assert_eq!(open.location.end_line, 2);
    }

    #[test]
    fn rejects_other_languages() {
        let outcome = RegexParser::new().parse("fn main() {}", Language::Rust, "main.rs");
        assert!(outcome.is_unsupported());
    }

    #[test]
    fn split_respects_generics_and_arrows() {
        assert_eq!(
            split_top_level("Map<K, V>, (Int) -> Unit, List<T>"),
            vec!["Map<K, V>", "(Int) -> Unit", "List<T>"]
        );
    }
}
