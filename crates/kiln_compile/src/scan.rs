//! Lexical scanner for script modules.
//!
//! Produces a flat token stream for the module analyzer. Whitespace and
//! comments are skipped. Only the syntax errors the analyzer cannot recover
//! from are reported: unterminated literals and comments, and unbalanced
//! `()`, `[]`, `{}` delimiters.

use kiln_diagnostics::{Category, Diagnostic, DiagnosticCode};
use kiln_source::{FileId, Span};

/// Unterminated string literal.
pub const UNTERMINATED_STRING: DiagnosticCode = DiagnosticCode::new(Category::Syntax, 1002);
/// A closing delimiter was expected.
pub const DELIMITER_EXPECTED: DiagnosticCode = DiagnosticCode::new(Category::Syntax, 1005);
/// Unterminated block comment.
pub const UNTERMINATED_COMMENT: DiagnosticCode = DiagnosticCode::new(Category::Syntax, 1010);
/// A closing delimiter with no matching opener.
pub const UNEXPECTED_DELIMITER: DiagnosticCode = DiagnosticCode::new(Category::Syntax, 1128);
/// Unterminated template literal.
pub const UNTERMINATED_TEMPLATE: DiagnosticCode = DiagnosticCode::new(Category::Syntax, 1160);

/// The kind of a scanned token.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenKind {
    /// An identifier or keyword.
    Ident,
    /// A numeric literal.
    Number,
    /// A single- or double-quoted string literal, quotes included.
    Str,
    /// A backtick template literal, backticks included.
    Template,
    /// A regular expression literal.
    Regex,
    /// A single punctuation byte.
    Punct(u8),
    /// End of input.
    Eof,
}

/// A token with its location in the source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Token {
    /// What was scanned.
    pub kind: TokenKind,
    /// Where it was scanned.
    pub span: Span,
}

impl Token {
    /// Returns the source text covered by this token.
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.span.start as usize..self.span.end as usize]
    }

    /// Returns `true` if this is the identifier `word`.
    pub fn is_word(&self, source: &str, word: &str) -> bool {
        self.kind == TokenKind::Ident && self.text(source) == word
    }

    /// Returns `true` if this is the punctuation byte `p`.
    pub fn is_punct(&self, p: u8) -> bool {
        self.kind == TokenKind::Punct(p)
    }

    /// Returns the unescaped value of a string or template literal.
    pub fn string_value(&self, source: &str) -> Option<String> {
        if !matches!(self.kind, TokenKind::Str | TokenKind::Template) {
            return None;
        }
        let text = self.text(source);
        let inner = text.get(1..text.len().saturating_sub(1)).unwrap_or("");
        Some(unescape(inner))
    }
}

/// The result of scanning one file.
#[derive(Debug, Default)]
pub struct Scanned {
    /// Tokens in source order, always ending with [`TokenKind::Eof`].
    pub tokens: Vec<Token>,
    /// Syntax errors found while scanning.
    pub diagnostics: Vec<Diagnostic>,
}

/// Scans script source text into tokens.
pub fn scan(source: &str, file: FileId) -> Scanned {
    let mut scanner = Scanner {
        source: source.as_bytes(),
        pos: 0,
        file,
        tokens: Vec::new(),
        diagnostics: Vec::new(),
        delimiters: Vec::new(),
    };
    scanner.scan_all();
    Scanned {
        tokens: scanner.tokens,
        diagnostics: scanner.diagnostics,
    }
}

struct Scanner<'a> {
    source: &'a [u8],
    pos: usize,
    file: FileId,
    tokens: Vec<Token>,
    diagnostics: Vec<Diagnostic>,
    delimiters: Vec<(u8, Span)>,
}

impl Scanner<'_> {
    fn scan_all(&mut self) {
        loop {
            self.skip_whitespace_and_comments();
            if self.pos >= self.source.len() {
                break;
            }
            let token = self.next_token();
            if let TokenKind::Punct(p) = token.kind {
                self.track_delimiter(p, token.span);
            }
            self.tokens.push(token);
        }
        while let Some((open, span)) = self.delimiters.pop() {
            self.unclosed(open, span);
        }
        let end = self.source.len() as u32;
        self.tokens.push(Token {
            kind: TokenKind::Eof,
            span: Span::new(self.file, end, end),
        });
    }

    fn peek(&self) -> u8 {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> u8 {
        self.source.get(self.pos + offset).copied().unwrap_or(0)
    }

    fn span_from(&self, start: usize) -> Span {
        Span::new(self.file, start as u32, self.pos as u32)
    }

    fn error(&mut self, code: DiagnosticCode, message: String, span: Span) {
        self.diagnostics.push(Diagnostic::error(code, message, span));
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            while self.pos < self.source.len() && self.source[self.pos].is_ascii_whitespace() {
                self.pos += 1;
            }
            if self.peek() == b'/' && self.peek_at(1) == b'/' {
                while self.pos < self.source.len() && self.source[self.pos] != b'\n' {
                    self.pos += 1;
                }
                continue;
            }
            if self.peek() == b'/' && self.peek_at(1) == b'*' {
                let start = self.pos;
                self.pos += 2;
                loop {
                    if self.pos >= self.source.len() {
                        let span = self.span_from(start);
                        self.error(UNTERMINATED_COMMENT, "'*/' expected.".to_string(), span);
                        break;
                    }
                    if self.source[self.pos] == b'*' && self.peek_at(1) == b'/' {
                        self.pos += 2;
                        break;
                    }
                    self.pos += 1;
                }
                continue;
            }
            break;
        }
    }

    fn next_token(&mut self) -> Token {
        let start = self.pos;
        let b = self.peek();

        if is_ident_start(b) {
            while self.pos < self.source.len() && is_ident_char(self.source[self.pos]) {
                self.pos += 1;
            }
            return self.token(TokenKind::Ident, start);
        }
        if b.is_ascii_digit() || (b == b'.' && self.peek_at(1).is_ascii_digit()) {
            while self.pos < self.source.len()
                && (self.source[self.pos].is_ascii_alphanumeric()
                    || matches!(self.source[self.pos], b'.' | b'_'))
            {
                self.pos += 1;
            }
            return self.token(TokenKind::Number, start);
        }
        if b == b'"' || b == b'\'' {
            return self.scan_string(start, b);
        }
        if b == b'`' {
            return self.scan_template(start);
        }
        if b == b'/' && self.regex_allowed() {
            if let Some(token) = self.try_scan_regex(start) {
                return token;
            }
        }
        self.pos += 1;
        self.token(TokenKind::Punct(b), start)
    }

    fn token(&self, kind: TokenKind, start: usize) -> Token {
        Token {
            kind,
            span: self.span_from(start),
        }
    }

    fn scan_string(&mut self, start: usize, quote: u8) -> Token {
        self.pos += 1;
        loop {
            if self.pos >= self.source.len() || self.source[self.pos] == b'\n' {
                let span = self.span_from(start);
                self.error(
                    UNTERMINATED_STRING,
                    "Unterminated string literal.".to_string(),
                    span,
                );
                return self.token(TokenKind::Str, start);
            }
            match self.source[self.pos] {
                b'\\' => self.pos = (self.pos + 2).min(self.source.len()),
                c if c == quote => {
                    self.pos += 1;
                    return self.token(TokenKind::Str, start);
                }
                _ => self.pos += 1,
            }
        }
    }

    fn scan_template(&mut self, start: usize) -> Token {
        self.pos += 1;
        loop {
            if self.pos >= self.source.len() {
                let span = self.span_from(start);
                self.error(
                    UNTERMINATED_TEMPLATE,
                    "Unterminated template literal.".to_string(),
                    span,
                );
                return self.token(TokenKind::Template, start);
            }
            match self.source[self.pos] {
                b'\\' => self.pos = (self.pos + 2).min(self.source.len()),
                b'`' => {
                    self.pos += 1;
                    return self.token(TokenKind::Template, start);
                }
                _ => self.pos += 1,
            }
        }
    }

    /// A `/` starts a regex unless the previous token ends an expression.
    fn regex_allowed(&self) -> bool {
        let Some(prev) = self.tokens.last() else {
            return true;
        };
        match prev.kind {
            TokenKind::Punct(p) => !matches!(p, b')' | b']' | b'}'),
            TokenKind::Ident => {
                let text = &self.source[prev.span.start as usize..prev.span.end as usize];
                matches!(
                    text,
                    b"return"
                        | b"typeof"
                        | b"case"
                        | b"do"
                        | b"else"
                        | b"in"
                        | b"of"
                        | b"new"
                        | b"delete"
                        | b"void"
                        | b"throw"
                        | b"yield"
                        | b"await"
                )
            }
            _ => false,
        }
    }

    /// Scans a regex literal, or returns `None` (without consuming) if the
    /// line ends before the closing `/`.
    fn try_scan_regex(&mut self, start: usize) -> Option<Token> {
        let mut pos = start + 1;
        let mut in_class = false;
        loop {
            let c = *self.source.get(pos)?;
            match c {
                b'\n' => return None,
                b'\\' => pos += 1,
                b'[' => in_class = true,
                b']' => in_class = false,
                b'/' if !in_class => break,
                _ => {}
            }
            pos += 1;
        }
        pos += 1;
        while pos < self.source.len() && is_ident_char(self.source[pos]) {
            pos += 1;
        }
        self.pos = pos;
        Some(self.token(TokenKind::Regex, start))
    }

    fn track_delimiter(&mut self, p: u8, span: Span) {
        match p {
            b'(' | b'[' | b'{' => self.delimiters.push((p, span)),
            b')' | b']' | b'}' => {
                let open = opener_of(p);
                if !self.delimiters.iter().any(|(o, _)| *o == open) {
                    self.error(
                        UNEXPECTED_DELIMITER,
                        format!("Unexpected '{}'.", p as char),
                        span,
                    );
                    return;
                }
                while let Some((o, o_span)) = self.delimiters.pop() {
                    if o == open {
                        break;
                    }
                    self.unclosed(o, o_span);
                }
            }
            _ => {}
        }
    }

    fn unclosed(&mut self, open: u8, span: Span) {
        let close = closer_of(open) as char;
        self.diagnostics.push(
            Diagnostic::error(DELIMITER_EXPECTED, format!("'{close}' expected."), span)
                .with_related(span, format!("'{}' opened here", open as char)),
        );
    }
}

fn opener_of(close: u8) -> u8 {
    match close {
        b')' => b'(',
        b']' => b'[',
        _ => b'{',
    }
}

fn closer_of(open: u8) -> u8 {
    match open {
        b'(' => b')',
        b'[' => b']',
        _ => b'}',
    }
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b == b'$' || b >= 0x80
}

fn is_ident_char(b: u8) -> bool {
    is_ident_start(b) || b.is_ascii_digit()
}

/// Resolves the common backslash escapes of a literal body.
pub fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('0') => out.push('\0'),
            Some('\n') => {}
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        scan(source, FileId::from_raw(0))
            .tokens
            .iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn scans_import_statement() {
        let src = "import { a } from './a';";
        let scanned = scan(src, FileId::from_raw(0));
        assert!(scanned.diagnostics.is_empty());
        let texts: Vec<_> = scanned.tokens.iter().map(|t| t.text(src)).collect();
        assert_eq!(texts, vec!["import", "{", "a", "}", "from", "'./a'", ";", ""]);
    }

    #[test]
    fn skips_comments() {
        assert_eq!(
            kinds("// line\n/* block */ x"),
            vec![TokenKind::Ident, TokenKind::Eof]
        );
    }

    #[test]
    fn string_value_unescapes() {
        let src = r#"'it\'s\n'"#;
        let scanned = scan(src, FileId::from_raw(0));
        assert_eq!(scanned.tokens[0].string_value(src).unwrap(), "it's\n");
    }

    #[test]
    fn template_literal_is_one_token() {
        assert_eq!(
            kinds("`<p>{{ a }}</p>\n<b></b>`"),
            vec![TokenKind::Template, TokenKind::Eof]
        );
    }

    #[test]
    fn regex_after_operator() {
        assert_eq!(
            kinds("x = /a'b/g;"),
            vec![
                TokenKind::Ident,
                TokenKind::Punct(b'='),
                TokenKind::Regex,
                TokenKind::Punct(b';'),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn division_is_punct() {
        assert_eq!(
            kinds("a / b"),
            vec![
                TokenKind::Ident,
                TokenKind::Punct(b'/'),
                TokenKind::Ident,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn unterminated_string() {
        let scanned = scan("const a = 'oops\n;", FileId::from_raw(0));
        assert_eq!(scanned.diagnostics.len(), 1);
        assert_eq!(scanned.diagnostics[0].code, UNTERMINATED_STRING);
    }

    #[test]
    fn unclosed_brace() {
        let scanned = scan("class A {\n  x = 1;\n", FileId::from_raw(0));
        assert_eq!(scanned.diagnostics.len(), 1);
        let diag = &scanned.diagnostics[0];
        assert_eq!(diag.code, DELIMITER_EXPECTED);
        assert_eq!(diag.message, "'}' expected.");
        assert_eq!(diag.primary_span.start, 8);
    }

    #[test]
    fn unexpected_closer() {
        let scanned = scan("a(); }", FileId::from_raw(0));
        assert_eq!(scanned.diagnostics.len(), 1);
        assert_eq!(scanned.diagnostics[0].code, UNEXPECTED_DELIMITER);
    }

    #[test]
    fn mismatched_closer_reports_inner_opener() {
        let scanned = scan("f(a[0);", FileId::from_raw(0));
        assert_eq!(scanned.diagnostics.len(), 1);
        assert_eq!(scanned.diagnostics[0].message, "']' expected.");
    }

    #[test]
    fn unterminated_block_comment() {
        let scanned = scan("x /* never closed", FileId::from_raw(0));
        assert_eq!(scanned.diagnostics[0].code, UNTERMINATED_COMMENT);
    }
}
