//! Module analysis over the scanned token stream.
//!
//! Extracts what the incremental engine needs from a script: imports and
//! re-exports (the dependency edges), the exported declaration surface (the
//! file's semantic signature), component metadata and the spans of
//! type-only statements that are erased on emit.

use crate::scan::{Token, TokenKind};
use kiln_common::{ContentHash, ContentHasher};
use kiln_source::{FileId, Span};
use std::collections::{BTreeMap, BTreeSet};

/// Keywords that may precede a class member name.
const MEMBER_MODIFIERS: &[&str] = &[
    "public",
    "private",
    "protected",
    "readonly",
    "static",
    "async",
    "get",
    "set",
    "override",
    "declare",
    "abstract",
    "accessor",
];

/// Keywords that may precede a top-level declaration keyword.
const DECLARATION_PREFIXES: &[&str] = &["export", "default", "declare", "abstract", "async"];

/// One name bound by an import declaration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImportBinding {
    /// The exported name being imported (`default` and `*` for the default
    /// and namespace forms).
    pub imported: String,
    /// The local name.
    pub local: String,
    /// Span of the local name.
    pub span: Span,
    /// Whether this binding is type-only.
    pub type_only: bool,
}

/// An `import` declaration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImportDecl {
    /// The module specifier.
    pub specifier: String,
    /// Span of the specifier string literal.
    pub specifier_span: Span,
    /// Bound names; empty for side-effect imports.
    pub bindings: Vec<ImportBinding>,
    /// Whether the whole declaration is `import type`.
    pub type_only: bool,
    /// Span of the whole statement.
    pub span: Span,
}

/// A name re-exported from another module.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReExportName {
    /// Name in the source module (`*` for `export * as ns`).
    pub imported: String,
    /// Name under which it is exported here.
    pub exported: String,
    /// Span of the imported name.
    pub span: Span,
}

/// An `export ... from` declaration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReExport {
    /// The module specifier.
    pub specifier: String,
    /// Span of the specifier string literal.
    pub specifier_span: Span,
    /// Named re-exports, or `None` for `export *`.
    pub names: Option<Vec<ReExportName>>,
    /// Whether this is `export type`.
    pub type_only: bool,
}

/// A name exported by the module itself.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportedName {
    /// The exported name.
    pub name: String,
    /// The local declaration the export refers to, if known.
    pub local: Option<String>,
    /// Span of the exported name.
    pub span: Span,
}

/// A dynamic `import('...')` expression with a literal specifier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DynamicImport {
    /// The module specifier.
    pub specifier: String,
    /// Span of the specifier string literal.
    pub specifier_span: Span,
}

/// Where a component's template comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TemplateSource {
    /// `template: '...'` embedded in the decorator.
    Inline {
        /// Unescaped template text.
        text: String,
        /// Span of the string literal.
        literal: Span,
    },
    /// `templateUrl: './x.html'`.
    External {
        /// The URL as written.
        url: String,
        /// Span of the string literal.
        literal: Span,
        /// Span of the whole `templateUrl: '...'` property.
        property: Span,
    },
}

/// A resource URL inside component metadata.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceUrl {
    /// The URL as written.
    pub url: String,
    /// Span of the string literal.
    pub literal: Span,
}

/// An inline style inside component metadata.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InlineStyle {
    /// Unescaped style text.
    pub text: String,
    /// Span of the string literal.
    pub literal: Span,
}

/// A decorated component class.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Component {
    /// Name of the decorated class.
    pub class_name: String,
    /// Span of the class name.
    pub class_span: Span,
    /// Names of fields, accessors, methods and parameter properties.
    pub members: Vec<String>,
    /// The template, if any.
    pub template: Option<TemplateSource>,
    /// External stylesheets from `styleUrls`/`styleUrl`.
    pub style_urls: Vec<ResourceUrl>,
    /// Span of the `styleUrls`/`styleUrl` property.
    pub style_urls_property: Option<Span>,
    /// Same as `style_urls_property`, extended over a trailing comma.
    pub style_urls_removal: Option<Span>,
    /// Inline styles from `styles`.
    pub inline_styles: Vec<InlineStyle>,
    /// Span of the `styles` property value.
    pub styles_value: Option<Span>,
}

/// Everything the engine knows about one script module.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModuleInfo {
    /// Static import declarations.
    pub imports: Vec<ImportDecl>,
    /// Dynamic imports with literal specifiers.
    pub dynamic_imports: Vec<DynamicImport>,
    /// Names exported by this module's own declarations.
    pub exports: Vec<ExportedName>,
    /// `export ... from` declarations.
    pub reexports: Vec<ReExport>,
    /// Decorated component classes.
    pub components: Vec<Component>,
    /// Spans of type-only statements removed on emit.
    pub erased: Vec<Span>,
    /// Identifiers referenced outside import declarations.
    pub references: BTreeSet<String>,
    /// Hash of the exported surface.
    pub signature: ContentHash,
}

impl ModuleInfo {
    /// Returns all static specifiers in declaration order: imports, then
    /// re-exports, then dynamic imports.
    pub fn specifiers(&self) -> Vec<(&str, Span)> {
        self.imports
            .iter()
            .map(|i| (i.specifier.as_str(), i.specifier_span))
            .chain(
                self.reexports
                    .iter()
                    .map(|r| (r.specifier.as_str(), r.specifier_span)),
            )
            .chain(
                self.dynamic_imports
                    .iter()
                    .map(|d| (d.specifier.as_str(), d.specifier_span)),
            )
            .collect()
    }

    /// Returns the names this module exports directly (without following `export *`).
    pub fn direct_export_names(&self) -> BTreeSet<String> {
        let mut names: BTreeSet<String> = self.exports.iter().map(|e| e.name.clone()).collect();
        for reexport in &self.reexports {
            if let Some(list) = &reexport.names {
                names.extend(list.iter().map(|n| n.exported.clone()));
            }
        }
        names
    }
}

/// Analyzes a scanned module.
pub fn analyze_module(source: &str, file: FileId, tokens: &[Token]) -> ModuleInfo {
    let mut analyzer = Analyzer::new(source, file, tokens);
    analyzer.walk();
    analyzer.finish()
}

struct Analyzer<'a> {
    src: &'a str,
    file: FileId,
    tokens: &'a [Token],
    matching: Vec<Option<usize>>,
    imports: Vec<ImportDecl>,
    dynamic_imports: Vec<DynamicImport>,
    exports: Vec<ExportedName>,
    reexports: Vec<ReExport>,
    components: Vec<Component>,
    erased: Vec<Span>,
    references: BTreeSet<String>,
    declarations: BTreeMap<String, String>,
}

impl<'a> Analyzer<'a> {
    fn new(src: &'a str, file: FileId, tokens: &'a [Token]) -> Self {
        Self {
            src,
            file,
            tokens,
            matching: compute_matching(tokens),
            imports: Vec::new(),
            dynamic_imports: Vec::new(),
            exports: Vec::new(),
            reexports: Vec::new(),
            components: Vec::new(),
            erased: Vec::new(),
            references: BTreeSet::new(),
            declarations: BTreeMap::new(),
        }
    }

    fn tok(&self, i: usize) -> Token {
        let last = self.tokens.len().saturating_sub(1);
        self.tokens
            .get(i.min(last))
            .copied()
            .unwrap_or(Token {
                kind: TokenKind::Eof,
                span: Span::new(self.file, 0, 0),
            })
    }

    fn text(&self, i: usize) -> &'a str {
        let t = self.tok(i);
        &self.src[t.span.start as usize..t.span.end as usize]
    }

    fn word(&self, i: usize, w: &str) -> bool {
        self.tok(i).is_word(self.src, w)
    }

    fn ident(&self, i: usize) -> bool {
        self.tok(i).kind == TokenKind::Ident
    }

    fn punct(&self, i: usize, p: u8) -> bool {
        self.tok(i).is_punct(p)
    }

    fn is_eof(&self, i: usize) -> bool {
        self.tok(i).kind == TokenKind::Eof
    }

    fn string(&self, i: usize) -> Option<String> {
        self.tok(i).string_value(self.src)
    }

    fn is_string(&self, i: usize) -> bool {
        matches!(self.tok(i).kind, TokenKind::Str | TokenKind::Template)
    }

    fn span(&self, first: usize, last: usize) -> Span {
        Span::new(self.file, self.tok(first).span.start, self.tok(last).span.end)
    }

    fn newline_before(&self, i: usize) -> bool {
        if i == 0 {
            return true;
        }
        let prev_end = self.tok(i - 1).span.end as usize;
        let start = self.tok(i).span.start as usize;
        self.src[prev_end..start].contains('\n')
    }

    fn statement_start(&self, i: usize) -> bool {
        if i == 0 || self.newline_before(i) {
            return true;
        }
        let prev = self.tok(i - 1);
        matches!(prev.kind, TokenKind::Punct(b';' | b'}' | b'{' | b')'))
            || DECLARATION_PREFIXES.contains(&self.text(i - 1))
    }

    fn skip_semicolon(&self, i: usize) -> usize {
        if self.punct(i, b';') {
            i + 1
        } else {
            i
        }
    }

    /// Index of the `;` ending the statement at `i` (or of the EOF token).
    fn statement_end(&self, mut i: usize) -> usize {
        while !self.is_eof(i) && !self.punct(i, b';') {
            if let Some(close) = self.matching.get(i).copied().flatten() {
                i = close;
            } else if matches!(self.tok(i).kind, TokenKind::Punct(b')' | b']' | b'}')) {
                return i.saturating_sub(1);
            }
            i += 1;
        }
        i
    }

    fn tokens_text(&self, from: usize, to: usize) -> String {
        (from..to)
            .map(|i| self.text(i))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn walk(&mut self) {
        let mut i = 0;
        let mut depth = 0usize;
        while !self.is_eof(i) {
            let t = self.tok(i);
            match t.kind {
                TokenKind::Punct(b'{') => depth += 1,
                TokenKind::Punct(b'}') => depth = depth.saturating_sub(1),
                TokenKind::Punct(b'@') if self.word(i + 1, "Component") => {
                    if let Some(component) = self.parse_component(i) {
                        self.components.push(component);
                    }
                }
                TokenKind::Ident => {
                    let text = self.text(i);
                    if text == "import" && self.punct(i + 1, b'(') {
                        if let Some(specifier) = self.string(i + 2) {
                            if self.punct(i + 3, b')') {
                                self.dynamic_imports.push(DynamicImport {
                                    specifier,
                                    specifier_span: self.tok(i + 2).span,
                                });
                            }
                        }
                    } else if depth == 0 && text == "import" && self.statement_start(i) {
                        if let Some(next) = self.parse_import(i) {
                            i = next;
                            continue;
                        }
                    } else if depth == 0 && text == "export" && self.statement_start(i) {
                        if let Some(next) = self.parse_export(i) {
                            i = next;
                            continue;
                        }
                    } else if depth == 0 && self.statement_start(i) {
                        self.parse_declaration(i);
                    }
                    let after_dot = i > 0 && self.punct(i - 1, b'.');
                    if !after_dot {
                        self.references.insert(text.to_string());
                    }
                }
                _ => {}
            }
            i += 1;
        }
    }

    fn parse_import(&mut self, start: usize) -> Option<usize> {
        let mut j = start + 1;
        let mut type_only = false;
        if self.word(j, "type") && !self.punct(j + 1, b',') && !self.word(j + 1, "from") {
            type_only = true;
            j += 1;
        }

        if self.tok(j).kind == TokenKind::Str {
            let specifier = self.string(j)?;
            let end = self.skip_semicolon(j + 1);
            self.imports.push(ImportDecl {
                specifier,
                specifier_span: self.tok(j).span,
                bindings: Vec::new(),
                type_only,
                span: self.span(start, end - 1),
            });
            return Some(end);
        }

        let mut bindings = Vec::new();
        if self.ident(j) && !self.word(j, "from") {
            bindings.push(ImportBinding {
                imported: "default".to_string(),
                local: self.text(j).to_string(),
                span: self.tok(j).span,
                type_only,
            });
            j += 1;
            if self.punct(j, b',') {
                j += 1;
            }
        }
        if self.punct(j, b'*') && self.word(j + 1, "as") && self.ident(j + 2) {
            bindings.push(ImportBinding {
                imported: "*".to_string(),
                local: self.text(j + 2).to_string(),
                span: self.tok(j + 2).span,
                type_only,
            });
            j += 3;
        }
        if self.punct(j, b'{') {
            let close = self.matching.get(j).copied().flatten()?;
            let mut k = j + 1;
            while k < close {
                let mut binding_type_only = type_only;
                if self.word(k, "type") && self.ident(k + 1) && !self.word(k + 1, "as") {
                    binding_type_only = true;
                    k += 1;
                }
                if !self.ident(k) && !self.is_string(k) {
                    k += 1;
                    continue;
                }
                let imported = self.string(k).unwrap_or_else(|| self.text(k).to_string());
                let (local, span, next) = if self.word(k + 1, "as") && self.ident(k + 2) {
                    (self.text(k + 2).to_string(), self.tok(k + 2).span, k + 3)
                } else {
                    (imported.clone(), self.tok(k).span, k + 1)
                };
                bindings.push(ImportBinding {
                    imported,
                    local,
                    span,
                    type_only: binding_type_only,
                });
                k = if self.punct(next, b',') { next + 1 } else { next };
            }
            j = close + 1;
        }
        if !self.word(j, "from") || self.tok(j + 1).kind != TokenKind::Str {
            return None;
        }
        let specifier = self.string(j + 1)?;
        let end = self.skip_semicolon(j + 2);
        let span = self.span(start, end - 1);
        if type_only {
            self.erased.push(span);
        }
        self.imports.push(ImportDecl {
            specifier,
            specifier_span: self.tok(j + 1).span,
            bindings,
            type_only,
            span,
        });
        Some(end)
    }

    fn parse_export(&mut self, start: usize) -> Option<usize> {
        let mut j = start + 1;
        let mut type_only = false;
        if self.word(j, "type") && (self.punct(j + 1, b'{') || self.punct(j + 1, b'*')) {
            type_only = true;
            j += 1;
        }

        if self.punct(j, b'*') {
            let mut names = None;
            let mut k = j + 1;
            if self.word(k, "as") && self.ident(k + 1) {
                names = Some(vec![ReExportName {
                    imported: "*".to_string(),
                    exported: self.text(k + 1).to_string(),
                    span: self.tok(k + 1).span,
                }]);
                k += 2;
            }
            if !self.word(k, "from") || self.tok(k + 1).kind != TokenKind::Str {
                return None;
            }
            let end = self.skip_semicolon(k + 2);
            if type_only {
                self.erased.push(self.span(start, end - 1));
            }
            self.reexports.push(ReExport {
                specifier: self.string(k + 1)?,
                specifier_span: self.tok(k + 1).span,
                names,
                type_only,
            });
            return Some(end);
        }

        if self.punct(j, b'{') {
            let close = self.matching.get(j).copied().flatten()?;
            let mut entries = Vec::new();
            let mut k = j + 1;
            while k < close {
                if self.word(k, "type") && self.ident(k + 1) && !self.word(k + 1, "as") {
                    k += 1;
                }
                if !self.ident(k) {
                    k += 1;
                    continue;
                }
                let local = self.text(k).to_string();
                let local_span = self.tok(k).span;
                let (exported, next) = if self.word(k + 1, "as") && self.ident(k + 2) {
                    (self.text(k + 2).to_string(), k + 3)
                } else {
                    (local.clone(), k + 1)
                };
                entries.push((local, exported, local_span));
                k = if self.punct(next, b',') { next + 1 } else { next };
            }
            let mut end = close + 1;
            if self.word(end, "from") && self.tok(end + 1).kind == TokenKind::Str {
                let specifier = self.string(end + 1)?;
                let specifier_span = self.tok(end + 1).span;
                end = self.skip_semicolon(end + 2);
                self.reexports.push(ReExport {
                    specifier,
                    specifier_span,
                    names: Some(
                        entries
                            .into_iter()
                            .map(|(imported, exported, span)| ReExportName {
                                imported,
                                exported,
                                span,
                            })
                            .collect(),
                    ),
                    type_only,
                });
            } else {
                end = self.skip_semicolon(end);
                for (local, exported, span) in entries {
                    self.references.insert(local.clone());
                    self.exports.push(ExportedName {
                        name: exported,
                        local: Some(local),
                        span,
                    });
                }
            }
            if type_only {
                self.erased.push(self.span(start, end - 1));
            }
            return Some(end);
        }

        if self.word(j, "default") {
            let local = self.declared_name(j + 1);
            self.exports.push(ExportedName {
                name: "default".to_string(),
                local,
                span: self.tok(j).span,
            });
            return Some(j + 1);
        }

        let mut k = j;
        while self.word(k, "declare") || self.word(k, "abstract") || self.word(k, "async") {
            k += 1;
        }
        let keyword = self.text(k);
        if matches!(
            keyword,
            "class" | "function" | "const" | "let" | "var" | "interface" | "type" | "enum" | "namespace"
        ) {
            if let Some(name) = self.declared_name(k) {
                self.exports.push(ExportedName {
                    name: name.clone(),
                    local: Some(name),
                    span: self.tok(start).span,
                });
            }
        }
        Some(j)
    }

    /// Returns the name declared by the declaration keyword at `i`.
    fn declared_name(&self, i: usize) -> Option<String> {
        let mut k = i;
        while self.word(k, "declare") || self.word(k, "abstract") || self.word(k, "async") {
            k += 1;
        }
        if self.word(k, "const") && self.word(k + 1, "enum") {
            k += 1;
        }
        match self.text(k) {
            "function" => {
                let name_at = if self.punct(k + 1, b'*') { k + 2 } else { k + 1 };
                self.ident(name_at).then(|| self.text(name_at).to_string())
            }
            "class" | "const" | "let" | "var" | "interface" | "type" | "enum" | "namespace" => {
                (self.ident(k + 1) && !self.word(k + 1, "extends") && !self.word(k + 1, "implements"))
                    .then(|| self.text(k + 1).to_string())
            }
            _ => None,
        }
    }

    /// Records a top-level declaration's surface and erases type-only ones.
    fn parse_declaration(&mut self, i: usize) {
        let keyword = self.text(i);
        let is_declaration = match keyword {
            "class" | "function" | "const" | "let" | "var" | "enum" | "namespace" => true,
            "interface" => self.ident(i + 1),
            "type" => self.ident(i + 1) && (self.punct(i + 2, b'=') || self.punct(i + 2, b'<')),
            _ => false,
        };
        if !is_declaration {
            return;
        }
        let Some(name) = self.declared_name(i) else {
            return;
        };
        let name_at = (i + 1..i + 3)
            .find(|&k| self.ident(k) && self.text(k) == name)
            .unwrap_or(i + 1);

        let surface = match keyword {
            "class" => {
                let Some(open) = self.body_open(name_at + 1) else {
                    return;
                };
                let members = self
                    .matching
                    .get(open)
                    .copied()
                    .flatten()
                    .map(|close| self.class_members(open, close))
                    .unwrap_or_default();
                format!(
                    "class {} {{{}}}",
                    self.tokens_text(name_at, open),
                    members.join(",")
                )
            }
            "function" => {
                let end = self.body_open(name_at + 1).unwrap_or_else(|| self.statement_end(i));
                format!("function {}", self.tokens_text(name_at, end))
            }
            "const" | "let" | "var" => {
                let mut end = name_at + 1;
                while !self.is_eof(end) && !self.punct(end, b'=') && !self.punct(end, b';') {
                    if self.newline_before(end) && !self.punct(end - 1, b':') && !self.punct(end, b':') {
                        break;
                    }
                    end = self.matching.get(end).copied().flatten().unwrap_or(end) + 1;
                }
                format!("{keyword} {}", self.tokens_text(name_at, end))
            }
            "interface" => {
                let Some(open) = self.body_open(name_at + 1) else {
                    return;
                };
                let close = self.matching.get(open).copied().flatten().unwrap_or(open);
                let start = self.erasure_start(i);
                self.erased.push(self.span(start, close));
                format!("interface {}", self.tokens_text(name_at, close + 1))
            }
            "type" => {
                let end = self.statement_end(i);
                let start = self.erasure_start(i);
                let last = if self.punct(end, b';') { end } else { end.saturating_sub(1) };
                self.erased.push(self.span(start, last));
                format!("type {}", self.tokens_text(name_at, end))
            }
            _ => {
                let end = match self.body_open(name_at + 1) {
                    Some(open) => self.matching.get(open).copied().flatten().unwrap_or(open) + 1,
                    None => self.statement_end(i),
                };
                format!("{keyword} {}", self.tokens_text(name_at, end))
            }
        };
        self.declarations.insert(name, surface);
    }

    /// Extends an erased declaration back over `export`/`declare` prefixes.
    fn erasure_start(&self, keyword: usize) -> usize {
        let mut start = keyword;
        while start > 0 && (self.word(start - 1, "export") || self.word(start - 1, "declare")) {
            start -= 1;
        }
        start
    }

    /// Finds the `{` opening a declaration body, skipping heritage clauses,
    /// parameter lists and type arguments.
    fn body_open(&self, mut i: usize) -> Option<usize> {
        while !self.is_eof(i) {
            match self.tok(i).kind {
                TokenKind::Punct(b'{') => return Some(i),
                TokenKind::Punct(b';') => return None,
                TokenKind::Punct(b'(') | TokenKind::Punct(b'[') => {
                    i = self.matching.get(i).copied().flatten()?;
                }
                TokenKind::Punct(b':') => {
                    // Return type annotation: an object type is not the body.
                    if self.punct(i + 1, b'{') {
                        i = self.matching.get(i + 1).copied().flatten()?;
                    }
                }
                _ => {}
            }
            i += 1;
        }
        None
    }

    fn class_members(&self, open: usize, close: usize) -> Vec<String> {
        let mut members = Vec::new();
        let mut k = open + 1;
        while k < close {
            let t = self.tok(k);
            match t.kind {
                TokenKind::Punct(b'(') | TokenKind::Punct(b'[') | TokenKind::Punct(b'{') => {
                    let Some(group_close) = self.matching.get(k).copied().flatten() else {
                        k += 1;
                        continue;
                    };
                    if t.is_punct(b'(') && self.word(k - 1, "constructor") {
                        for p in k + 1..group_close {
                            let text = self.text(p);
                            if self.ident(p)
                                && ["private", "public", "protected", "readonly"]
                                    .contains(&self.text(p - 1))
                                && !MEMBER_MODIFIERS.contains(&text)
                            {
                                members.push(text.to_string());
                            }
                        }
                    }
                    k = group_close + 1;
                }
                TokenKind::Punct(b'@') => {
                    k += 1;
                    while self.ident(k) || self.punct(k, b'.') {
                        k += 1;
                    }
                    if self.punct(k, b'(') {
                        k = self.matching.get(k).copied().flatten().map_or(k + 1, |c| c + 1);
                    }
                }
                TokenKind::Ident => {
                    let text = self.text(k);
                    let next = self.tok(k + 1);
                    if MEMBER_MODIFIERS.contains(&text)
                        && (next.kind == TokenKind::Ident || next.is_punct(b'['))
                    {
                        k += 1;
                        continue;
                    }
                    let boundary = k == open + 1
                        || self.newline_before(k)
                        || matches!(
                            self.tok(k - 1).kind,
                            TokenKind::Punct(b';' | b'}' | b')' | b']')
                        )
                        || MEMBER_MODIFIERS.contains(&self.text(k - 1));
                    let follows = matches!(
                        next.kind,
                        TokenKind::Punct(b'(' | b':' | b'=' | b';' | b'?' | b'!' | b'<' | b'}')
                    );
                    if boundary && follows && text != "constructor" {
                        members.push(text.to_string());
                    }
                    k += 1;
                }
                _ => k += 1,
            }
        }
        members
    }

    fn parse_component(&self, at: usize) -> Option<Component> {
        let call_open = at + 2;
        if !self.punct(call_open, b'(') || !self.punct(call_open + 1, b'{') {
            return None;
        }
        let call_close = self.matching.get(call_open).copied().flatten()?;
        let obj_open = call_open + 1;
        let obj_close = self.matching.get(obj_open).copied().flatten()?;

        let mut template = None;
        let mut style_urls = Vec::new();
        let mut style_urls_property = None;
        let mut style_urls_removal = None;
        let mut inline_styles = Vec::new();
        let mut styles_value = None;

        let mut k = obj_open + 1;
        while k < obj_close {
            let key = if self.ident(k) {
                self.text(k).to_string()
            } else if let Some(s) = self.string(k).filter(|_| self.tok(k).kind == TokenKind::Str) {
                s
            } else {
                k += 1;
                continue;
            };
            if !self.punct(k + 1, b':') {
                k += 1;
                continue;
            }
            let value = k + 2;
            let mut value_end = value;
            while value_end < obj_close && !self.punct(value_end, b',') {
                value_end = self
                    .matching
                    .get(value_end)
                    .copied()
                    .flatten()
                    .unwrap_or(value_end)
                    + 1;
            }
            let value_end = value_end.min(obj_close);
            let last = value_end.saturating_sub(1);
            let property = self.span(k, last);
            // Removal also takes the comma and the whitespace up to the next property.
            let removal = if !self.punct(value_end, b',') {
                property
            } else if value_end + 1 < obj_close {
                Span::new(self.file, self.tok(k).span.start, self.tok(value_end + 1).span.start)
            } else {
                self.span(k, value_end)
            };

            match key.as_str() {
                "templateUrl" => {
                    if let Some(url) = self.string(value) {
                        template = Some(TemplateSource::External {
                            url,
                            literal: self.tok(value).span,
                            property,
                        });
                    }
                }
                "template" => {
                    if let Some(text) = self.string(value) {
                        template = Some(TemplateSource::Inline {
                            text,
                            literal: self.tok(value).span,
                        });
                    }
                }
                "styleUrls" | "styleUrl" => {
                    style_urls_property = Some(property);
                    style_urls_removal = Some(removal);
                    for idx in value..value_end {
                        if self.tok(idx).kind == TokenKind::Str {
                            if let Some(url) = self.string(idx) {
                                style_urls.push(ResourceUrl {
                                    url,
                                    literal: self.tok(idx).span,
                                });
                            }
                        }
                    }
                }
                "styles" => {
                    styles_value = Some(self.span(value, last));
                    for idx in value..value_end {
                        if self.is_string(idx) {
                            if let Some(text) = self.string(idx) {
                                inline_styles.push(InlineStyle {
                                    text,
                                    literal: self.tok(idx).span,
                                });
                            }
                        }
                    }
                }
                _ => {}
            }
            k = value_end + 1;
        }

        let mut c = call_close + 1;
        loop {
            if self.punct(c, b'@') {
                c += 1;
                while self.ident(c) || self.punct(c, b'.') {
                    c += 1;
                }
                if self.punct(c, b'(') {
                    c = self.matching.get(c).copied().flatten()? + 1;
                }
            } else if ["export", "default", "abstract", "declare"].contains(&self.text(c))
                && self.ident(c)
            {
                c += 1;
            } else {
                break;
            }
        }
        if !self.word(c, "class") || !self.ident(c + 1) {
            return None;
        }
        let open = self.body_open(c + 2)?;
        let close = self.matching.get(open).copied().flatten()?;

        Some(Component {
            class_name: self.text(c + 1).to_string(),
            class_span: self.tok(c + 1).span,
            members: self.class_members(open, close),
            template,
            style_urls,
            style_urls_property,
            style_urls_removal,
            inline_styles,
            styles_value,
        })
    }

    fn finish(self) -> ModuleInfo {
        let mut hasher = ContentHasher::new();
        let mut surfaces: Vec<(String, String)> = self
            .exports
            .iter()
            .map(|e| {
                let surface = e
                    .local
                    .as_ref()
                    .and_then(|l| self.declarations.get(l))
                    .cloned()
                    .unwrap_or_else(|| e.local.clone().unwrap_or_default());
                (e.name.clone(), surface)
            })
            .collect();
        surfaces.sort();
        for (name, surface) in &surfaces {
            hasher.update_str(name).update_str(surface);
        }
        for reexport in &self.reexports {
            hasher.update_str(&reexport.specifier);
            match &reexport.names {
                None => {
                    hasher.update_str("*");
                }
                Some(names) => {
                    for n in names {
                        hasher.update_str(&n.imported).update_str(&n.exported);
                    }
                }
            }
        }
        ModuleInfo {
            imports: self.imports,
            dynamic_imports: self.dynamic_imports,
            exports: self.exports,
            reexports: self.reexports,
            components: self.components,
            erased: self.erased,
            references: self.references,
            signature: hasher.finish(),
        }
    }
}

/// Pairs every opening delimiter token with its closing token.
fn compute_matching(tokens: &[Token]) -> Vec<Option<usize>> {
    let mut matching = vec![None; tokens.len()];
    let mut stack: Vec<(u8, usize)> = Vec::new();
    for (i, token) in tokens.iter().enumerate() {
        match token.kind {
            TokenKind::Punct(p @ (b'(' | b'[' | b'{')) => stack.push((p, i)),
            TokenKind::Punct(p @ (b')' | b']' | b'}')) => {
                let open = match p {
                    b')' => b'(',
                    b']' => b'[',
                    _ => b'{',
                };
                if let Some(pos) = stack.iter().rposition(|(o, _)| *o == open) {
                    let (_, idx) = stack[pos];
                    stack.truncate(pos);
                    matching[idx] = Some(i);
                }
            }
            _ => {}
        }
    }
    matching
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::scan;
    use pretty_assertions::assert_eq;

    fn analyze(src: &str) -> ModuleInfo {
        let scanned = scan(src, FileId::from_raw(0));
        analyze_module(src, FileId::from_raw(0), &scanned.tokens)
    }

    #[test]
    fn import_forms() {
        let info = analyze(
            "import def, { a, b as c, type T } from './x';\n\
             import * as ns from \"./ns\";\n\
             import './side-effect';\n\
             import type { Only } from './types';\n",
        );
        assert_eq!(info.imports.len(), 4);
        let first = &info.imports[0];
        assert_eq!(first.specifier, "./x");
        let locals: Vec<_> = first.bindings.iter().map(|b| b.local.as_str()).collect();
        assert_eq!(locals, vec!["def", "a", "c", "T"]);
        assert_eq!(first.bindings[2].imported, "b");
        assert!(first.bindings[3].type_only);
        assert_eq!(info.imports[1].bindings[0].imported, "*");
        assert!(info.imports[2].bindings.is_empty());
        assert!(info.imports[3].type_only);
        assert_eq!(info.erased.len(), 1);
    }

    #[test]
    fn references_exclude_import_bindings() {
        let info = analyze("import { used, unused } from './x';\nconsole.log(used.prop);\n");
        assert!(info.references.contains("used"));
        assert!(!info.references.contains("unused"));
        assert!(!info.references.contains("prop"));
    }

    #[test]
    fn export_forms() {
        let info = analyze(
            "export class A {}\n\
             export function f(x: number): string { return ''; }\n\
             export const c = 1;\n\
             export interface I { a: string }\n\
             export type T = string;\n\
             export default A;\n\
             const hidden = 2;\n\
             export { hidden as visible };\n\
             export { r } from './r';\n\
             export * from './star';\n\
             export * as ns from './ns';\n",
        );
        let names: Vec<_> = info.exports.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["A", "f", "c", "I", "T", "default", "visible"]);
        assert_eq!(info.reexports.len(), 3);
        assert!(info.reexports[1].names.is_none());
        let direct = info.direct_export_names();
        assert!(direct.contains("r"));
        assert!(direct.contains("ns"));
    }

    #[test]
    fn type_declarations_are_erased() {
        let src = "export interface I {\n  a: string;\n}\ntype T = { b: number };\nconst x = 1;\n";
        let info = analyze(src);
        assert_eq!(info.erased.len(), 2);
        let first = info.erased[0];
        assert_eq!(
            &src[first.start as usize..first.end as usize],
            "export interface I {\n  a: string;\n}"
        );
        let second = info.erased[1];
        assert_eq!(
            &src[second.start as usize..second.end as usize],
            "type T = { b: number };"
        );
    }

    #[test]
    fn signature_ignores_bodies_and_private_code() {
        let a = analyze("export function f(x: number): number { return x + 1; }\nconst y = 1;");
        let b = analyze("export function f(x: number): number {\n  return x * 2;\n}\nconst y = 2;");
        assert_eq!(a.signature, b.signature);
    }

    #[test]
    fn signature_tracks_exported_surface() {
        let a = analyze("export function f(x: number): number { return x; }");
        let b = analyze("export function f(x: string): number { return 1; }");
        let c = analyze("export function f(x: number): number { return x; }\nexport const g = 1;");
        assert_ne!(a.signature, b.signature);
        assert_ne!(a.signature, c.signature);
    }

    #[test]
    fn signature_tracks_class_members() {
        let a = analyze("export class A { x = 1; }");
        let b = analyze("export class A { x = 1; y = 2; }");
        let c = analyze("export class A { x = 5; }");
        assert_ne!(a.signature, b.signature);
        assert_eq!(a.signature, c.signature);
    }

    #[test]
    fn dynamic_imports() {
        let info = analyze("const routes = [{ load: () => import('./lazy').then(m => m.Lazy) }];");
        assert_eq!(info.dynamic_imports.len(), 1);
        assert_eq!(info.dynamic_imports[0].specifier, "./lazy");
        assert_eq!(info.specifiers().len(), 1);
    }

    #[test]
    fn component_metadata() {
        let src = r#"
import { Component, Input } from '@kiln/core';

@Component({
  selector: 'app-root',
  templateUrl: './app.component.html',
  styleUrls: ['./app.component.css', './theme.css'],
  styles: [`:host { display: block }`],
})
export class AppComponent {
  @Input() title: string = '';
  count = 0;
  private readonly items: string[] = [];
  constructor(private service: DataService, plain: number) {}
  get total(): number { return this.count; }
  increment(): void { this.count++; }
}
"#;
        let info = analyze(src);
        assert_eq!(info.components.len(), 1);
        let component = &info.components[0];
        assert_eq!(component.class_name, "AppComponent");
        assert_eq!(
            component.members,
            vec!["title", "count", "items", "service", "total", "increment"]
        );
        match &component.template {
            Some(TemplateSource::External { url, property, .. }) => {
                assert_eq!(url, "./app.component.html");
                assert_eq!(
                    &src[property.start as usize..property.end as usize],
                    "templateUrl: './app.component.html'"
                );
            }
            other => panic!("unexpected template {other:?}"),
        }
        let urls: Vec<_> = component.style_urls.iter().map(|u| u.url.as_str()).collect();
        assert_eq!(urls, vec!["./app.component.css", "./theme.css"]);
        assert_eq!(component.inline_styles.len(), 1);
        assert_eq!(component.inline_styles[0].text, ":host { display: block }");
        let removal = component.style_urls_removal.unwrap();
        assert!(src[removal.start as usize..removal.end as usize].ends_with("],\n  "));
        assert!(src[removal.end as usize..].starts_with("styles:"));
        assert!(info.references.contains("Input"));
        assert!(info.references.contains("Component"));
    }

    #[test]
    fn inline_template_component() {
        let info = analyze(
            "@Component({ selector: 'x', template: '<p>{{ name }}</p>' })\nclass X { name = 'a'; }",
        );
        let component = &info.components[0];
        assert_eq!(
            component.template,
            Some(TemplateSource::Inline {
                text: "<p>{{ name }}</p>".to_string(),
                literal: component_literal(&info),
            })
        );
        assert_eq!(component.members, vec!["name"]);
    }

    fn component_literal(info: &ModuleInfo) -> Span {
        match &info.components[0].template {
            Some(TemplateSource::Inline { literal, .. }) => *literal,
            _ => Span::DUMMY,
        }
    }
}
