//! Semantic and template checks over a [`Program`].

use crate::module::TemplateSource;
use crate::program::{Program, Resolution};
use crate::template::analyze_template;
use kiln_diagnostics::{Category, Diagnostic, DiagnosticCode};
use kiln_source::{FileId, SourceKind, Span};

/// A relative or aliased specifier that matches no file.
pub const CANNOT_FIND_MODULE: DiagnosticCode = DiagnosticCode::new(Category::Semantic, 2307);
/// A named import the target module does not export.
pub const NO_EXPORTED_MEMBER: DiagnosticCode = DiagnosticCode::new(Category::Semantic, 2305);
/// An imported binding that is never referenced.
pub const UNUSED_IMPORT: DiagnosticCode = DiagnosticCode::new(Category::Lint, 6133);
/// A template binding not declared on the component class.
pub const UNKNOWN_TEMPLATE_PROPERTY: DiagnosticCode =
    DiagnosticCode::new(Category::Template, 2339);
/// A template or stylesheet file that does not exist.
pub const MISSING_RESOURCE: DiagnosticCode = DiagnosticCode::new(Category::Template, 2001);

/// Checks imports of one module: resolution, exported members, and usage.
pub fn semantic_diagnostics(program: &Program, id: FileId) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    let Some(module) = program.module(id) else {
        return diagnostics;
    };
    let resolutions = program.resolutions(id);

    for (index, (specifier, span)) in module.info.specifiers().into_iter().enumerate() {
        if resolutions.get(index) == Some(&Resolution::Unresolved) {
            diagnostics.push(Diagnostic::error(
                CANNOT_FIND_MODULE,
                format!("Cannot find module '{specifier}' or its corresponding type declarations."),
                span,
            ));
        }
    }

    let mut check_member = |target: FileId, specifier: &str, name: &str, span: Span| {
        if name == "*" || program.exported_names(target).contains(name) {
            return;
        }
        let message = if name == "default" {
            format!("Module '\"{specifier}\"' has no default export.")
        } else {
            format!("Module '\"{specifier}\"' has no exported member '{name}'.")
        };
        diagnostics.push(Diagnostic::error(NO_EXPORTED_MEMBER, message, span));
    };
    for (index, import) in module.info.imports.iter().enumerate() {
        if let Some(Resolution::File(target)) = resolutions.get(index) {
            for binding in &import.bindings {
                check_member(*target, &import.specifier, &binding.imported, binding.span);
            }
        }
    }
    let offset = module.info.imports.len();
    for (index, reexport) in module.info.reexports.iter().enumerate() {
        let (Some(Resolution::File(target)), Some(names)) =
            (resolutions.get(offset + index), &reexport.names)
        else {
            continue;
        };
        for name in names {
            check_member(*target, &reexport.specifier, &name.imported, name.span);
        }
    }

    let is_declaration = program
        .file(id)
        .is_some_and(|f| f.kind == SourceKind::Declaration);
    if !is_declaration {
        for binding in module.info.imports.iter().flat_map(|i| &i.bindings) {
            if !module.info.references.contains(&binding.local) {
                diagnostics.push(Diagnostic::warning(
                    UNUSED_IMPORT,
                    format!("'{}' is declared but its value is never read.", binding.local),
                    binding.span,
                ));
            }
        }
    }
    diagnostics
}

/// Checks the templates and resource references of every component in a module.
///
/// Unknown bindings are only reported with `strict` set; missing resource
/// files always are.
pub fn template_diagnostics(program: &Program, id: FileId, strict: bool) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    let Some(module) = program.module(id) else {
        return diagnostics;
    };
    let resources = program.resources(id);

    for resource in resources.iter().filter(|r| !r.exists) {
        let what = match resource.kind {
            SourceKind::Template => "template",
            _ => "stylesheet",
        };
        diagnostics.push(Diagnostic::error(
            MISSING_RESOURCE,
            format!("Could not find {what} file '{}'.", resource.url),
            resource.literal,
        ));
    }
    if !strict {
        return diagnostics;
    }

    for (index, component) in module.info.components.iter().enumerate() {
        // (template text, file the offsets refer to, base offset)
        let located = match &component.template {
            Some(TemplateSource::Inline { text, literal }) => {
                Some((text.as_str(), id, literal.start + 1))
            }
            Some(TemplateSource::External { .. }) => resources
                .iter()
                .find(|r| r.component == index && r.kind == SourceKind::Template)
                .and_then(|r| r.file)
                .and_then(|f| program.file(f))
                .map(|f| (f.content.as_str(), f.id, 0)),
            None => None,
        };
        let Some((text, file, base)) = located else {
            continue;
        };
        let info = analyze_template(text);
        for binding in info.component_bindings() {
            if component.members.iter().any(|m| *m == binding.name) {
                continue;
            }
            let start = base + binding.offset;
            diagnostics.push(Diagnostic::error(
                UNKNOWN_TEMPLATE_PROPERTY,
                format!(
                    "Property '{}' does not exist on type '{}'.",
                    binding.name, component.class_name
                ),
                Span::new(file, start, start + binding.name.len() as u32),
            ));
        }
    }
    diagnostics
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::ProgramBuilder;
    use kiln_config::CompilationOptions;
    use kiln_host::{HostOptions, MemoryFileSystem, ProgramHost};
    use kiln_source::FileRegistry;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    fn program(files: &[(&str, &str)], registry: &mut FileRegistry) -> Program {
        let fs = MemoryFileSystem::with_files(files.iter().copied());
        let host = ProgramHost::new(&HostOptions::new(Arc::new(fs)));
        let options = CompilationOptions::new("/ws/kiln.toml");
        ProgramBuilder {
            options: &options,
            host: &host,
            registry,
            prior: None,
            include_resources: true,
        }
        .build(&[PathBuf::from("/ws/main.ts")])
        .unwrap()
    }

    fn messages(diagnostics: &[Diagnostic]) -> Vec<String> {
        diagnostics.iter().map(|d| d.message.clone()).collect()
    }

    #[test]
    fn unresolved_import_and_dynamic_import() {
        let mut registry = FileRegistry::new();
        let p = program(
            &[("/ws/main.ts", "import { a } from './nope';\nconsole.log(a);\nimport('./lazy');")],
            &mut registry,
        );
        let main = registry.lookup(Path::new("/ws/main.ts")).unwrap();
        let diags = semantic_diagnostics(&p, main);
        assert_eq!(
            messages(&diags),
            vec![
                "Cannot find module './nope' or its corresponding type declarations.".to_string(),
                "Cannot find module './lazy' or its corresponding type declarations.".to_string(),
            ]
        );
        assert!(diags.iter().all(|d| d.code == CANNOT_FIND_MODULE));
    }

    #[test]
    fn missing_member_follows_star_exports() {
        let mut registry = FileRegistry::new();
        let p = program(
            &[
                ("/ws/main.ts", "import { deep, nope } from './barrel';\nimport def from './barrel';\ndeep(nope, def);"),
                ("/ws/barrel.ts", "export * from './deep';"),
                ("/ws/deep.ts", "export function deep() {}\nexport default 1;"),
            ],
            &mut registry,
        );
        let main = registry.lookup(Path::new("/ws/main.ts")).unwrap();
        assert_eq!(
            messages(&semantic_diagnostics(&p, main)),
            vec![
                "Module '\"./barrel\"' has no exported member 'nope'.".to_string(),
                "Module '\"./barrel\"' has no default export.".to_string(),
            ]
        );
    }

    #[test]
    fn unused_import_is_a_warning() {
        let mut registry = FileRegistry::new();
        let p = program(
            &[
                ("/ws/main.ts", "import { a, b } from './lib';\nimport './side-effect';\nconsole.log(a);"),
                ("/ws/lib.ts", "export const a = 1;\nexport const b = 2;"),
                ("/ws/side-effect.ts", "window.x = 1;"),
            ],
            &mut registry,
        );
        let main = registry.lookup(Path::new("/ws/main.ts")).unwrap();
        let diags = semantic_diagnostics(&p, main);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].code, UNUSED_IMPORT);
        assert!(!diags[0].severity.is_error());
        assert_eq!(diags[0].message, "'b' is declared but its value is never read.");
    }

    const COMPONENT: &str = "import { Component } from '@kiln/core';\n\
        @Component({ selector: 'x', template: '<p>{{ title }} {{ missing }}</p>', styleUrls: ['./gone.css'] })\n\
        export class App { title = 'x'; }\n";

    #[test]
    fn inline_template_bindings_are_checked_at_their_offset() {
        let mut registry = FileRegistry::new();
        let p = program(&[("/ws/main.ts", COMPONENT)], &mut registry);
        let main = registry.lookup(Path::new("/ws/main.ts")).unwrap();
        let diags = template_diagnostics(&p, main, true);
        assert_eq!(
            messages(&diags),
            vec![
                "Could not find stylesheet file './gone.css'.".to_string(),
                "Property 'missing' does not exist on type 'App'.".to_string(),
            ]
        );
        let span = diags[1].primary_span;
        assert_eq!(&COMPONENT[span.start as usize..span.end as usize], "missing");
    }

    #[test]
    fn lenient_templates_only_report_missing_files() {
        let mut registry = FileRegistry::new();
        let p = program(&[("/ws/main.ts", COMPONENT)], &mut registry);
        let main = registry.lookup(Path::new("/ws/main.ts")).unwrap();
        let diags = template_diagnostics(&p, main, false);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].code, MISSING_RESOURCE);
    }

    #[test]
    fn external_template_spans_point_into_the_template() {
        let mut registry = FileRegistry::new();
        let p = program(
            &[
                (
                    "/ws/main.ts",
                    "@Component({ templateUrl: './app.html' })\nexport class App { name = ''; }\n",
                ),
                ("/ws/app.html", "<b>{{ nmae }}</b>"),
            ],
            &mut registry,
        );
        let main = registry.lookup(Path::new("/ws/main.ts")).unwrap();
        let html = registry.lookup(Path::new("/ws/app.html")).unwrap();
        let diags = template_diagnostics(&p, main, true);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].primary_span, Span::new(html, 6, 10));
    }
}
