//! Binding extraction from component templates.
//!
//! Finds the root identifiers a template reads from its component:
//! interpolations, property/event/two-way bindings, structural directives and
//! control-flow blocks. Template-local names (`#ref`, `let x`, `@for` items)
//! are collected separately so the checker can exclude them.

use crate::scan::{scan, TokenKind};
use kiln_source::FileId;
use std::collections::BTreeSet;

/// Names every template may read without declaring them.
const IMPLICIT_NAMES: &[&str] = &[
    "$event", "$any", "$index", "$first", "$last", "$even", "$odd", "$count", "$implicit",
    "undefined", "null", "true", "false", "this", "typeof", "let", "of", "as", "track",
    "Math", "JSON", "Number", "String", "Boolean", "Array", "Object", "Date",
];

/// A root identifier read by a template expression.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TemplateBinding {
    /// The identifier.
    pub name: String,
    /// Byte offset of the identifier within the template text.
    pub offset: u32,
}

/// What a template reads and declares.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TemplateInfo {
    /// Root identifiers in template order.
    pub bindings: Vec<TemplateBinding>,
    /// Names declared by the template itself.
    pub locals: BTreeSet<String>,
}

impl TemplateInfo {
    /// Returns the bindings that are neither template locals nor implicit names.
    pub fn component_bindings(&self) -> impl Iterator<Item = &TemplateBinding> {
        self.bindings
            .iter()
            .filter(|b| !self.locals.contains(&b.name) && !IMPLICIT_NAMES.contains(&b.name.as_str()))
    }
}

/// Extracts bindings and locals from template text.
pub fn analyze_template(text: &str) -> TemplateInfo {
    let mut info = TemplateInfo::default();
    let bytes = text.as_bytes();
    let mut pos = 0;
    while pos < bytes.len() {
        if bytes[pos..].starts_with(b"{{") {
            let start = pos + 2;
            let Some(len) = text[start..].find("}}") else {
                break;
            };
            collect_expression(&text[start..start + len], start, &mut info);
            pos = start + len + 2;
        } else if bytes[pos] == b'<' && bytes.get(pos + 1).is_some_and(u8::is_ascii_alphabetic) {
            pos = scan_tag(text, pos, &mut info);
        } else if bytes[pos] == b'@' && bytes.get(pos + 1).is_some_and(u8::is_ascii_alphabetic) {
            pos = scan_block(text, pos, &mut info);
        } else {
            pos += text[pos..].chars().next().map_or(1, char::len_utf8);
        }
    }
    info
}

/// Scans the attributes of an element opening tag.
fn scan_tag(text: &str, start: usize, info: &mut TemplateInfo) -> usize {
    let bytes = text.as_bytes();
    let mut pos = start + 1;
    while pos < bytes.len() && !bytes[pos].is_ascii_whitespace() && bytes[pos] != b'>' {
        pos += 1;
    }
    loop {
        while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
            pos += 1;
        }
        if pos >= bytes.len() {
            return pos;
        }
        if bytes[pos] == b'>' || (bytes[pos] == b'/' && bytes.get(pos + 1) == Some(&b'>')) {
            return pos + 1;
        }
        let name_start = pos;
        while pos < bytes.len()
            && !bytes[pos].is_ascii_whitespace()
            && !matches!(bytes[pos], b'=' | b'>')
        {
            pos += 1;
        }
        let name = &text[name_start..pos];
        let mut value = None;
        if bytes.get(pos) == Some(&b'=') {
            pos += 1;
            if let Some(&quote @ (b'"' | b'\'')) = bytes.get(pos) {
                let value_start = pos + 1;
                let len = text[value_start..]
                    .find(quote as char)
                    .unwrap_or(text.len() - value_start);
                value = Some((value_start, &text[value_start..value_start + len]));
                pos = value_start + len + 1;
            } else {
                let value_start = pos;
                while pos < bytes.len() && !bytes[pos].is_ascii_whitespace() && bytes[pos] != b'>' {
                    pos += 1;
                }
                value = Some((value_start, &text[value_start..pos]));
            }
        }
        attribute(name, value, info);
    }
}

fn attribute(name: &str, value: Option<(usize, &str)>, info: &mut TemplateInfo) {
    if let Some(reference) = name.strip_prefix('#') {
        info.locals.insert(reference.to_string());
        return;
    }
    if let Some(local) = name.strip_prefix("let-") {
        info.locals.insert(local.to_string());
        return;
    }
    let Some((offset, value)) = value else {
        return;
    };
    let is_binding = (name.starts_with('[') && name.ends_with(']'))
        || (name.starts_with('(') && name.ends_with(')'))
        || name.starts_with("bind-")
        || name.starts_with("on-");
    if name.starts_with('*') {
        collect_microsyntax(value, offset, info);
    } else if is_binding {
        collect_expression(value, offset, info);
    } else if value.contains("{{") {
        let mut rest = 0;
        while let Some(open) = value[rest..].find("{{") {
            let start = rest + open + 2;
            let Some(len) = value[start..].find("}}") else {
                break;
            };
            collect_expression(&value[start..start + len], offset + start, info);
            rest = start + len + 2;
        }
    }
}

/// Handles `*ngFor="let item of items; let i = index"` and `*ngIf="cond as x"`.
fn collect_microsyntax(value: &str, offset: usize, info: &mut TemplateInfo) {
    let mut part_offset = offset;
    for part in value.split(';') {
        let trimmed = part.trim_start();
        let lead = part.len() - trimmed.len();
        if let Some(rest) = trimmed.strip_prefix("let ") {
            let rest_offset = part_offset + lead + 4;
            let (name, tail) = rest.split_once(|c: char| c.is_whitespace() || c == '=').unwrap_or((rest, ""));
            info.locals.insert(name.trim().to_string());
            let tail_trimmed = tail.trim_start().trim_start_matches('=').trim_start();
            if let Some(iterable) = tail_trimmed.strip_prefix("of ") {
                let iter_offset = rest_offset + (rest.len() - iterable.len());
                collect_expression(iterable, iter_offset, info);
            }
        } else if let Some((expr, alias)) = trimmed.split_once(" as ") {
            collect_expression(expr, part_offset + lead, info);
            info.locals.insert(alias.trim().to_string());
        } else if let Some((key, expr)) = trimmed.split_once(':') {
            if key.trim().chars().all(|c| c.is_ascii_alphanumeric()) {
                let expr_offset = part_offset + lead + key.len() + 1;
                collect_expression(expr, expr_offset, info);
            } else {
                collect_expression(trimmed, part_offset + lead, info);
            }
        } else {
            collect_expression(trimmed, part_offset + lead, info);
        }
        part_offset += part.len() + 1;
    }
}

/// Handles `@if (expr)`, `@for (item of items; track item.id)`, `@switch (expr)`.
fn scan_block(text: &str, start: usize, info: &mut TemplateInfo) -> usize {
    let bytes = text.as_bytes();
    let mut pos = start + 1;
    while pos < bytes.len() && bytes[pos].is_ascii_alphabetic() {
        pos += 1;
    }
    let keyword = &text[start + 1..pos];
    while pos < bytes.len() && bytes[pos] == b' ' {
        pos += 1;
    }
    if bytes.get(pos) != Some(&b'(') {
        return pos;
    }
    let open = pos;
    let mut depth = 0usize;
    let mut close = None;
    for (i, &b) in bytes.iter().enumerate().skip(open) {
        match b {
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    close = Some(i);
                    break;
                }
            }
            _ => {}
        }
    }
    let Some(close) = close else {
        return pos + 1;
    };
    let inner = &text[open + 1..close];
    let inner_offset = open + 1;
    match keyword {
        "for" => {
            let mut part_offset = inner_offset;
            for (index, part) in inner.split(';').enumerate() {
                let trimmed = part.trim_start();
                let lead = part.len() - trimmed.len();
                if index == 0 {
                    if let Some((item, iterable)) = trimmed.split_once(" of ") {
                        info.locals.insert(item.trim().to_string());
                        let iter_offset = part_offset + lead + item.len() + 4;
                        collect_expression(iterable, iter_offset, info);
                    }
                } else if let Some(expr) = trimmed.strip_prefix("track ") {
                    collect_expression(expr, part_offset + lead + 6, info);
                } else if let Some(rest) = trimmed.strip_prefix("let ") {
                    for alias in rest.split(',') {
                        if let Some((name, _)) = alias.split_once('=') {
                            info.locals.insert(name.trim().to_string());
                        }
                    }
                }
                part_offset += part.len() + 1;
            }
        }
        "if" | "else" => {
            let (expr, alias) = match inner.split_once(';') {
                Some((expr, rest)) => (expr, rest.trim().strip_prefix("as ")),
                None => (inner, None),
            };
            collect_expression(expr, inner_offset, info);
            if let Some(alias) = alias {
                info.locals.insert(alias.trim().to_string());
            }
        }
        _ => collect_expression(inner, inner_offset, info),
    }
    close + 1
}

/// Collects root identifiers of an expression located at `offset`.
fn collect_expression(expr: &str, offset: usize, info: &mut TemplateInfo) {
    let scanned = scan(expr, FileId::DUMMY);
    let tokens = &scanned.tokens;
    for (i, token) in tokens.iter().enumerate() {
        if token.kind != TokenKind::Ident {
            continue;
        }
        let prev = i.checked_sub(1).map(|p| tokens[p]);
        let next = tokens.get(i + 1);
        if prev.is_some_and(|p| p.is_punct(b'.')) {
            continue;
        }
        // `value | pipeName`
        let is_pipe = prev.is_some_and(|p| p.is_punct(b'|'))
            && !i
                .checked_sub(2)
                .is_some_and(|pp| tokens[pp].is_punct(b'|'))
            && !next.is_some_and(|n| n.is_punct(b'|'));
        if is_pipe {
            continue;
        }
        // Object literal keys.
        let is_key = next.is_some_and(|n| n.is_punct(b':'))
            && prev.is_some_and(|p| p.is_punct(b'{') || p.is_punct(b','));
        if is_key {
            continue;
        }
        info.bindings.push(TemplateBinding {
            name: token.text(expr).to_string(),
            offset: (offset + token.span.start as usize) as u32,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(info: &TemplateInfo) -> Vec<&str> {
        info.component_bindings().map(|b| b.name.as_str()).collect()
    }

    #[test]
    fn interpolation_roots() {
        let info = analyze_template("<p>{{ user.name }} and {{ count + 1 }}</p>");
        assert_eq!(names(&info), vec!["user", "count"]);
    }

    #[test]
    fn binding_offsets_point_into_template() {
        let text = "<p>{{ title }}</p>";
        let info = analyze_template(text);
        let binding = &info.bindings[0];
        assert_eq!(
            &text[binding.offset as usize..binding.offset as usize + 5],
            "title"
        );
    }

    #[test]
    fn property_and_event_bindings() {
        let info = analyze_template(
            r#"<button [disabled]="busy" (click)="save($event)" [(ngModel)]="draft">Go</button>"#,
        );
        assert_eq!(names(&info), vec!["busy", "save", "draft"]);
    }

    #[test]
    fn pipes_are_not_bindings() {
        let info = analyze_template("<p>{{ when | date:'short' }} {{ a || b }}</p>");
        assert_eq!(names(&info), vec!["when", "a", "b"]);
    }

    #[test]
    fn ng_for_microsyntax() {
        let info = analyze_template(
            r#"<li *ngFor="let item of items; let i = index">{{ i }}: {{ item.label }}</li>"#,
        );
        assert_eq!(names(&info), vec!["items"]);
        assert!(info.locals.contains("item"));
        assert!(info.locals.contains("i"));
    }

    #[test]
    fn ng_if_alias() {
        let info = analyze_template(r#"<div *ngIf="user$ as user">{{ user.name }}</div>"#);
        assert_eq!(names(&info), vec!["user$"]);
    }

    #[test]
    fn template_references() {
        let info = analyze_template(r#"<input #box (keyup)="onKey(box.value)">"#);
        assert_eq!(names(&info), vec!["onKey"]);
    }

    #[test]
    fn control_flow_blocks() {
        let info = analyze_template(
            "@if (loaded) { <ul> @for (row of rows; track row.id) { <li>{{ row.name }} {{ $index }}</li> } </ul> }",
        );
        assert_eq!(names(&info), vec!["loaded", "rows"]);
    }

    #[test]
    fn object_literal_keys_are_skipped() {
        let info = analyze_template(r#"<div [ngClass]="{ active: isActive, 'x-y': other }"></div>"#);
        assert_eq!(names(&info), vec!["isActive", "other"]);
    }

    #[test]
    fn non_ascii_text_keeps_byte_offsets() {
        let text = "<h1>Café {{ title }}</h1><p title=\"naïve\">{{ ünits }} / {{ count }}</p>";
        let info = analyze_template(text);
        assert_eq!(names(&info), vec!["title", "ünits", "count"]);
        let title = &info.bindings[0];
        assert_eq!(title.offset, 13);
        assert_eq!(&text[title.offset as usize..title.offset as usize + 5], "title");
    }

    #[test]
    fn plain_attributes_are_ignored() {
        let info = analyze_template(r#"<a href="/home" class="nav">Home</a>"#);
        assert!(info.bindings.is_empty());
    }
}
