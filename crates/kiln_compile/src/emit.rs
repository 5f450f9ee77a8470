//! JavaScript emission for script modules.
//!
//! Emission is a set of text edits over the original source: type-only
//! statements are erased and component resource references are rewritten.
//! The full strategy inlines processed resources; the light strategy turns
//! them into imports that a bundler resolves.

use crate::module::{Component, TemplateSource};
use crate::program::{Program, ResourceRef};
use crate::resources::{ResourceCache, ResourceKey};
use kiln_common::{path, ContentHash, ContentHasher};
use kiln_source::{FileId, SourceKind, Span};
use std::path::{Path, PathBuf};

/// Query suffix marking a resource import for the bundler.
pub const RESOURCE_QUERY: &str = "?kiln-resource";

/// Output of emitting one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmitOutput {
    /// Destination path.
    pub filename: PathBuf,
    /// Emitted text.
    pub contents: String,
    /// Resource files inlined into the output, when known.
    pub dependencies: Option<Vec<PathBuf>>,
    /// Program files the output was produced from.
    pub sources: Vec<FileId>,
}

struct Edit {
    start: u32,
    end: u32,
    text: String,
}

impl Edit {
    fn replace(span: Span, text: impl Into<String>) -> Self {
        Self {
            start: span.start,
            end: span.end,
            text: text.into(),
        }
    }
}

fn apply_edits(source: &str, mut edits: Vec<Edit>) -> String {
    edits.sort_by_key(|e| (e.start, e.end));
    let mut out = String::with_capacity(source.len());
    let mut cursor = 0usize;
    for edit in edits {
        let start = edit.start as usize;
        if start < cursor {
            continue;
        }
        out.push_str(&source[cursor..start]);
        out.push_str(&edit.text);
        cursor = edit.end as usize;
    }
    out.push_str(&source[cursor..]);
    out
}

/// Returns the output path of a script: `src/app.ts` becomes `src/app.js`.
pub fn output_path(source: &Path) -> PathBuf {
    let name = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = name.strip_suffix(".ts").unwrap_or(&name);
    path::dirname(source).join(format!("{stem}.js"))
}

fn json_string(text: &str) -> String {
    serde_json::to_string(text).unwrap_or_else(|_| format!("{text:?}"))
}

fn erase_types(program: &Program, id: FileId) -> Vec<Edit> {
    program
        .module(id)
        .map(|m| m.info.erased.iter().map(|s| Edit::replace(*s, "")).collect())
        .unwrap_or_default()
}

fn component_resources(resources: &[ResourceRef], index: usize) -> impl Iterator<Item = &ResourceRef> {
    resources.iter().filter(move |r| r.component == index)
}

/// Rewrites the style properties of a component to `styles: [..]` with `values`.
fn rewrite_styles(component: &Component, values: &[String], edits: &mut Vec<Edit>) {
    let list = format!("[{}]", values.join(", "));
    match (component.styles_value, component.style_urls_property) {
        (Some(value), Some(_)) => {
            edits.push(Edit::replace(value, list));
            if let Some(removal) = component.style_urls_removal {
                edits.push(Edit::replace(removal, ""));
            }
        }
        (None, Some(property)) => edits.push(Edit::replace(property, format!("styles: {list}"))),
        (Some(value), None) => edits.push(Edit::replace(value, list)),
        (None, None) => {}
    }
}

/// Emits a script with templates and stylesheets inlined.
///
/// Returns `None` for files that produce no output (anything but scripts).
/// Resources that do not exist are left as written.
pub fn emit_inlined(program: &Program, id: FileId, styles: &ResourceCache) -> Option<EmitOutput> {
    let file = program.file(id).filter(|f| f.kind == SourceKind::Script)?;
    let module = program.module(id)?;
    let resources = program.resources(id);
    let mut edits = erase_types(program, id);
    let mut dependencies = Vec::new();

    for (index, component) in module.info.components.iter().enumerate() {
        if let Some(TemplateSource::External { property, .. }) = &component.template {
            let template = component_resources(resources, index)
                .find(|r| r.kind == SourceKind::Template)
                .and_then(|r| r.file)
                .and_then(|f| program.file(f));
            if let Some(template) = template {
                edits.push(Edit::replace(
                    *property,
                    format!("template: {}", json_string(&template.content)),
                ));
                dependencies.push(template.path.clone());
            }
        }

        let external: Vec<&ResourceRef> = component_resources(resources, index)
            .filter(|r| r.kind == SourceKind::Style)
            .collect();
        if external.iter().any(|r| r.file.is_none()) {
            continue;
        }
        let mut values: Vec<String> = component
            .inline_styles
            .iter()
            .enumerate()
            .map(|(order, style)| {
                let key = ResourceKey::Inline {
                    file: id,
                    component: index,
                    order,
                };
                json_string(styles.contents(key).unwrap_or(&style.text))
            })
            .collect();
        for resource in external {
            let Some(style) = resource.file.and_then(|f| program.file(f)) else {
                continue;
            };
            let text = styles
                .contents(ResourceKey::File(style.id))
                .unwrap_or(&style.content);
            values.push(json_string(text));
            dependencies.push(style.path.clone());
        }
        if !values.is_empty() {
            rewrite_styles(component, &values, &mut edits);
        }
    }

    Some(EmitOutput {
        filename: output_path(&file.path),
        contents: apply_edits(&file.content, edits),
        dependencies: Some(dependencies),
        sources: vec![id],
    })
}

/// Emits a script with resource references turned into `?kiln-resource` imports.
///
/// Inline styles are kept verbatim.
pub fn emit_deferred(program: &Program, id: FileId) -> Option<EmitOutput> {
    let file = program.file(id).filter(|f| f.kind == SourceKind::Script)?;
    let module = program.module(id)?;
    let mut edits = erase_types(program, id);
    let mut imports = String::new();
    let mut next = 0usize;
    let mut import_resource = |url: &str| {
        let name = format!("__kiln_resource_{next}__");
        next += 1;
        imports.push_str(&format!(
            "import {name} from {};\n",
            json_string(&format!("{url}{RESOURCE_QUERY}"))
        ));
        name
    };

    for component in &module.info.components {
        if let Some(TemplateSource::External { url, property, .. }) = &component.template {
            let name = import_resource(url);
            edits.push(Edit::replace(*property, format!("template: {name}")));
        }
        if component.style_urls.is_empty() {
            continue;
        }
        let mut values: Vec<String> = component
            .inline_styles
            .iter()
            .map(|s| file.snippet(s.literal.start, s.literal.end).to_string())
            .collect();
        values.extend(component.style_urls.iter().map(|s| import_resource(&s.url)));
        rewrite_styles(component, &values, &mut edits);
    }

    if !imports.is_empty() {
        edits.push(Edit {
            start: 0,
            end: 0,
            text: imports,
        });
    }
    Some(EmitOutput {
        filename: output_path(&file.path),
        contents: apply_edits(&file.content, edits),
        dependencies: None,
        sources: vec![id],
    })
}

/// Fingerprint of everything an inlined emit of `id` reads: the script
/// version, the version of each resource, and the options.
pub fn emit_fingerprint(program: &Program, id: FileId, options_hash: ContentHash) -> Option<ContentHash> {
    let file = program.file(id)?;
    let mut hasher = ContentHasher::new();
    hasher.update_hash(file.content_hash).update_hash(options_hash);
    for resource in program.resources(id) {
        hasher.update_str(&path::to_slash(&resource.path));
        match resource.file.and_then(|f| program.file(f)) {
            Some(r) => hasher.update_hash(r.content_hash),
            None => hasher.update_str("<missing>"),
        };
    }
    Some(hasher.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::ProgramBuilder;
    use kiln_config::CompilationOptions;
    use kiln_host::{HostOptions, MemoryFileSystem, ProgramHost};
    use kiln_source::FileRegistry;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn build(files: &[(&str, &str)], full: bool) -> (Program, FileId) {
        let fs = MemoryFileSystem::with_files(files.iter().copied());
        let host = ProgramHost::new(&HostOptions::new(Arc::new(fs)));
        let options = CompilationOptions::new("/ws/kiln.toml");
        let mut registry = FileRegistry::new();
        let program = ProgramBuilder {
            options: &options,
            host: &host,
            registry: &mut registry,
            prior: None,
            include_resources: full,
        }
        .build(&[PathBuf::from("/ws/app.ts")])
        .unwrap();
        let id = registry.lookup(Path::new("/ws/app.ts")).unwrap();
        (program, id)
    }

    #[test]
    fn erases_type_only_statements() {
        let src = "import type { T } from './t';\ninterface A { x: T }\nexport const a = 1;\n";
        let (program, id) = build(&[("/ws/app.ts", src)], false);
        let out = emit_deferred(&program, id).unwrap();
        assert_eq!(out.filename, PathBuf::from("/ws/app.js"));
        assert_eq!(out.contents.trim(), "export const a = 1;");
        assert_eq!(out.dependencies, None);
    }

    const COMPONENT: &str = "@Component({ templateUrl: './app.html', styleUrls: ['./app.css'] })\nexport class App {}\n";

    #[test]
    fn inlines_templates_and_styles() {
        let (program, id) = build(
            &[
                ("/ws/app.ts", COMPONENT),
                ("/ws/app.html", "<p class=\"x\">hi</p>"),
                ("/ws/app.css", "p { color: red }"),
            ],
            true,
        );
        let out = emit_inlined(&program, id, &ResourceCache::default()).unwrap();
        assert_eq!(
            out.contents,
            "@Component({ template: \"<p class=\\\"x\\\">hi</p>\", styles: [\"p { color: red }\"] })\nexport class App {}\n"
        );
        assert_eq!(
            out.dependencies,
            Some(vec![PathBuf::from("/ws/app.html"), PathBuf::from("/ws/app.css")])
        );
    }

    #[test]
    fn inline_and_external_styles_merge() {
        let src = "@Component({ styleUrls: ['./app.css'], styles: ['a {}'] })\nexport class App {}\n";
        let (program, id) = build(&[("/ws/app.ts", src), ("/ws/app.css", "b {}")], true);
        let out = emit_inlined(&program, id, &ResourceCache::default()).unwrap();
        assert_eq!(
            out.contents,
            "@Component({ styles: [\"a {}\", \"b {}\"] })\nexport class App {}\n"
        );
    }

    #[test]
    fn multiline_style_urls_leave_no_blank_line() {
        let src = "@Component({\n  styleUrls: ['./app.css'],\n  styles: ['a {}'],\n})\nexport class App {}\n";
        let (program, id) = build(&[("/ws/app.ts", src), ("/ws/app.css", "b {}")], true);
        let out = emit_inlined(&program, id, &ResourceCache::default()).unwrap();
        assert_eq!(
            out.contents,
            "@Component({\n  styles: [\"a {}\", \"b {}\"],\n})\nexport class App {}\n"
        );
    }

    #[test]
    fn missing_resources_keep_original_text() {
        let (program, id) = build(&[("/ws/app.ts", COMPONENT)], true);
        let out = emit_inlined(&program, id, &ResourceCache::default()).unwrap();
        assert_eq!(out.contents, COMPONENT);
        assert_eq!(out.dependencies, Some(vec![]));
    }

    #[test]
    fn deferred_resources_become_imports() {
        let (program, id) = build(&[("/ws/app.ts", COMPONENT)], false);
        let out = emit_deferred(&program, id).unwrap();
        assert_eq!(
            out.contents,
            "import __kiln_resource_0__ from \"./app.html?kiln-resource\";\n\
             import __kiln_resource_1__ from \"./app.css?kiln-resource\";\n\
             @Component({ template: __kiln_resource_0__, styles: [__kiln_resource_1__] })\nexport class App {}\n"
        );
    }

    #[test]
    fn declarations_produce_no_output() {
        let (program, _) = build(&[("/ws/app.ts", "import './types';"), ("/ws/types.d.ts", "")], false);
        let types = program
            .files()
            .find(|f| f.kind == SourceKind::Declaration)
            .unwrap()
            .id;
        assert!(emit_deferred(&program, types).is_none());
    }

    #[test]
    fn fingerprint_tracks_resources() {
        let files = [("/ws/app.ts", COMPONENT), ("/ws/app.html", "a"), ("/ws/app.css", "b")];
        let (first, id) = build(&files, true);
        let opts = ContentHash::from_text("o");
        let a = emit_fingerprint(&first, id, opts);
        let (same, _) = build(&files, true);
        assert_eq!(a, emit_fingerprint(&same, id, opts));
        let (changed, _) = build(
            &[("/ws/app.ts", COMPONENT), ("/ws/app.html", "changed"), ("/ws/app.css", "b")],
            true,
        );
        assert_ne!(a, emit_fingerprint(&changed, id, opts));
        assert_ne!(a, emit_fingerprint(&first, id, ContentHash::from_text("p")));
    }
}
