//! One immutable snapshot of all source modules and their resolved graph.

use crate::error::CompileError;
use crate::module::{analyze_module, ModuleInfo, TemplateSource};
use crate::scan::scan;
use crate::template::analyze_template;
use kiln_common::{path, ContentHash, ContentHasher};
use kiln_config::CompilationOptions;
use kiln_diagnostics::Diagnostic;
use kiln_host::ProgramHost;
use kiln_source::{FileId, FileRegistry, SourceDb, SourceFile, SourceKind, Span};
use petgraph::graphmap::DiGraphMap;
use petgraph::Direction;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A scanned and analyzed script, shared between snapshots while its text is unchanged.
#[derive(Debug)]
pub struct ParsedModule {
    /// The analysis result.
    pub info: ModuleInfo,
    /// Syntax errors reported by the scanner.
    pub syntax: Vec<Diagnostic>,
    /// Content hash of the text this was parsed from.
    pub version: ContentHash,
}

impl ParsedModule {
    fn parse(file: &SourceFile) -> Self {
        let scanned = scan(&file.content, file.id);
        let info = analyze_module(&file.content, file.id, &scanned.tokens);
        Self {
            info,
            syntax: scanned.diagnostics,
            version: file.content_hash,
        }
    }
}

/// How a module specifier resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// A file in this program.
    File(FileId),
    /// A bare package specifier outside the program.
    External,
    /// A relative or aliased specifier with no matching file.
    Unresolved,
}

/// A template or stylesheet referenced by a component.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceRef {
    /// [`SourceKind::Template`] or [`SourceKind::Style`].
    pub kind: SourceKind,
    /// Index of the component within its module.
    pub component: usize,
    /// The URL as written.
    pub url: String,
    /// Span of the URL literal in the script.
    pub literal: Span,
    /// The resolved path.
    pub path: PathBuf,
    /// Whether the file exists.
    pub exists: bool,
    /// The file, when resources are program members.
    pub file: Option<FileId>,
}

/// All source files of one build plus their parsed representation.
///
/// A program is never mutated after construction. The next build receives it
/// as a seed and reuses parsed modules whose text did not change.
#[derive(Debug, Default)]
pub struct Program {
    sources: SourceDb,
    modules: BTreeMap<FileId, Arc<ParsedModule>>,
    resolutions: BTreeMap<FileId, Vec<Resolution>>,
    resources: BTreeMap<FileId, Vec<ResourceRef>>,
    origins: BTreeMap<FileId, FileId>,
    roots: Vec<FileId>,
    missing_roots: Vec<PathBuf>,
    graph: DiGraphMap<FileId, bool>,
}

impl Program {
    /// Returns the source database of this snapshot.
    pub fn sources(&self) -> &SourceDb {
        &self.sources
    }

    /// Returns a file by id.
    pub fn file(&self, id: FileId) -> Option<&SourceFile> {
        self.sources.get(id)
    }

    /// Iterates over all files in id order.
    pub fn files(&self) -> impl Iterator<Item = &SourceFile> {
        self.sources.iter()
    }

    /// Returns `true` if `id` is part of this snapshot.
    pub fn contains(&self, id: FileId) -> bool {
        self.sources.contains(id)
    }

    /// Returns the parsed module of a script or declaration file.
    pub fn module(&self, id: FileId) -> Option<&ParsedModule> {
        self.modules.get(&id).map(Arc::as_ref)
    }

    /// Returns the resolution of each of a module's specifiers, in
    /// [`ModuleInfo::specifiers`] order.
    pub fn resolutions(&self, id: FileId) -> &[Resolution] {
        self.resolutions.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Returns the component resources referenced by a module.
    pub fn resources(&self, id: FileId) -> &[ResourceRef] {
        self.resources.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Returns the file a type-check shadow was generated for.
    pub fn origin(&self, id: FileId) -> Option<FileId> {
        self.origins.get(&id).copied()
    }

    /// Returns the root files that were found.
    pub fn roots(&self) -> &[FileId] {
        &self.roots
    }

    /// Returns root paths that could not be read.
    pub fn missing_roots(&self) -> &[PathBuf] {
        &self.missing_roots
    }

    /// Returns the files `id` imports, re-exports from, or reads resources from.
    pub fn dependencies(&self, id: FileId) -> BTreeSet<FileId> {
        if !self.graph.contains_node(id) {
            return BTreeSet::new();
        }
        self.graph
            .neighbors_directed(id, Direction::Outgoing)
            .collect()
    }

    /// Returns the files depending on `id`, flagged when the edge is a re-export.
    pub fn importers(&self, id: FileId) -> Vec<(FileId, bool)> {
        if !self.graph.contains_node(id) {
            return Vec::new();
        }
        let mut importers: Vec<_> = self
            .graph
            .neighbors_directed(id, Direction::Incoming)
            .map(|from| (from, self.graph.edge_weight(from, id).copied().unwrap_or(false)))
            .collect();
        importers.sort();
        importers
    }

    /// Returns the semantic signature of a file.
    ///
    /// Modules use their exported surface. A module with `export *` also
    /// folds in the names its star targets currently provide, so removing or
    /// adding a target changes the signature of every barrel in front of it.
    /// Other files use their version.
    pub fn signature(&self, id: FileId) -> Option<ContentHash> {
        let Some(module) = self.modules.get(&id) else {
            return self.sources.get(id).map(|f| f.content_hash);
        };
        if module.info.reexports.iter().all(|r| r.names.is_some()) {
            return Some(module.info.signature);
        }
        let mut hasher = ContentHasher::new();
        hasher.update_hash(module.info.signature);
        for name in self.exported_names(id) {
            hasher.update_str(&name);
        }
        Some(hasher.finish())
    }

    /// Returns every name a module exports, following `export *` chains.
    pub fn exported_names(&self, id: FileId) -> BTreeSet<String> {
        let mut visited = BTreeSet::new();
        self.collect_exported_names(id, &mut visited)
    }

    fn collect_exported_names(&self, id: FileId, visited: &mut BTreeSet<FileId>) -> BTreeSet<String> {
        if !visited.insert(id) {
            return BTreeSet::new();
        }
        let Some(module) = self.module(id) else {
            return BTreeSet::new();
        };
        let mut names = module.info.direct_export_names();
        let offset = module.info.imports.len();
        for (index, reexport) in module.info.reexports.iter().enumerate() {
            if reexport.names.is_some() {
                continue;
            }
            if let Some(Resolution::File(target)) = self.resolutions(id).get(offset + index) {
                names.extend(
                    self.collect_exported_names(*target, visited)
                        .into_iter()
                        .filter(|n| n != "default"),
                );
            }
        }
        names
    }

    /// Returns every path a watcher should observe: all program members
    /// except generated shadows, plus existing resources that are not members.
    pub fn referenced_files(&self) -> Vec<PathBuf> {
        let mut paths: BTreeSet<PathBuf> = self
            .sources
            .iter()
            .filter(|f| f.kind != SourceKind::TypeCheckShadow)
            .map(|f| f.path.clone())
            .collect();
        for refs in self.resources.values() {
            paths.extend(refs.iter().filter(|r| r.exists).map(|r| r.path.clone()));
        }
        paths.into_iter().collect()
    }
}

/// Constructs a [`Program`] by walking imports from the root files.
pub struct ProgramBuilder<'a> {
    /// Compiler options of the build.
    pub options: &'a CompilationOptions,
    /// Host used for all reads.
    pub host: &'a ProgramHost,
    /// The engine-lifetime path registry.
    pub registry: &'a mut FileRegistry,
    /// The previous snapshot, if any.
    pub prior: Option<&'a Program>,
    /// Whether component resources and type-check shadows become program members.
    pub include_resources: bool,
}

impl ProgramBuilder<'_> {
    /// Builds the program for `roots`.
    pub fn build(mut self, roots: &[PathBuf]) -> Result<Program, CompileError> {
        let mut program = Program::default();
        let mut queue: VecDeque<PathBuf> = roots.iter().map(|r| path::normalize(r)).collect();
        let root_set: BTreeSet<PathBuf> = queue.iter().cloned().collect();
        let mut visited = BTreeSet::new();

        while let Some(file_path) = queue.pop_front() {
            if !visited.insert(file_path.clone()) {
                continue;
            }
            let Some(text) = self.host.read_file(&file_path)? else {
                if root_set.contains(&file_path) {
                    program.missing_roots.push(file_path);
                }
                continue;
            };
            let id = self.registry.intern(&file_path);
            let kind = SourceKind::from_path(&file_path);
            let file = SourceFile::new(id, file_path.clone(), text, kind);
            if root_set.contains(&file_path) {
                program.roots.push(id);
            }

            if kind.is_module() {
                let parsed = match self.prior.and_then(|p| p.modules.get(&id)) {
                    Some(previous) if previous.version == file.content_hash => Arc::clone(previous),
                    _ => Arc::new(ParsedModule::parse(&file)),
                };
                let dir = path::dirname(&file_path);

                let mut resolutions = Vec::new();
                for (specifier, _) in parsed.info.specifiers() {
                    let resolution = match self.resolve_module(specifier, &dir) {
                        Some(target) => {
                            queue.push_back(target.clone());
                            Resolution::File(self.registry.intern(&target))
                        }
                        None if is_relative(specifier) || self.alias_targets(specifier).is_some() => {
                            Resolution::Unresolved
                        }
                        None => Resolution::External,
                    };
                    resolutions.push(resolution);
                }

                let mut resources = Vec::new();
                for (index, component) in parsed.info.components.iter().enumerate() {
                    let template = match &component.template {
                        Some(TemplateSource::External { url, literal, .. }) => {
                            Some((SourceKind::Template, url, *literal))
                        }
                        _ => None,
                    };
                    let styles = component
                        .style_urls
                        .iter()
                        .map(|s| (SourceKind::Style, &s.url, s.literal));
                    for (resource_kind, url, literal) in template.into_iter().chain(styles) {
                        let resource_path = path::resolve(&dir, Path::new(url));
                        let exists = self.host.file_exists(&resource_path);
                        let file = if exists && self.include_resources {
                            queue.push_back(resource_path.clone());
                            Some(self.registry.intern(&resource_path))
                        } else {
                            None
                        };
                        resources.push(ResourceRef {
                            kind: resource_kind,
                            component: index,
                            url: url.clone(),
                            literal,
                            path: resource_path,
                            exists,
                            file,
                        });
                    }
                }

                program.resolutions.insert(id, resolutions);
                if !resources.is_empty() {
                    program.resources.insert(id, resources);
                }
                program.modules.insert(id, parsed);
            }
            program.sources.insert(file);
        }

        program.settle_dangling();
        program.build_graph();
        if self.include_resources {
            self.add_shadows(&mut program);
        }
        Ok(program)
    }

    /// Resolves a module specifier to an existing file path.
    fn resolve_module(&self, specifier: &str, dir: &Path) -> Option<PathBuf> {
        if is_relative(specifier) {
            return self.first_existing(&path::resolve(dir, Path::new(specifier)));
        }
        let root = self.options.module_root();
        self.alias_targets(specifier)?
            .iter()
            .find_map(|target| self.first_existing(&path::resolve(&root, Path::new(target))))
    }

    /// Returns the substituted targets of the best `paths` pattern matching `specifier`.
    ///
    /// Exact patterns win; otherwise the wildcard pattern with the longest prefix.
    fn alias_targets(&self, specifier: &str) -> Option<Vec<String>> {
        let mut best: Option<(usize, Vec<String>)> = None;
        for (pattern, targets) in &self.options.paths {
            let stars = pattern.matches('*').count();
            if stars == 0 && pattern == specifier {
                return Some(targets.clone());
            }
            if stars != 1 {
                continue;
            }
            let (prefix, suffix) = pattern.split_once('*')?;
            let matches = specifier.len() >= prefix.len() + suffix.len()
                && specifier.starts_with(prefix)
                && specifier.ends_with(suffix);
            if !matches || best.as_ref().is_some_and(|(len, _)| *len >= prefix.len()) {
                continue;
            }
            let captured = &specifier[prefix.len()..specifier.len() - suffix.len()];
            let substituted = targets.iter().map(|t| t.replacen('*', captured, 1)).collect();
            best = Some((prefix.len(), substituted));
        }
        best.map(|(_, targets)| targets)
    }

    fn first_existing(&self, base: &Path) -> Option<PathBuf> {
        candidates(base)
            .into_iter()
            .find(|candidate| self.host.file_exists(candidate))
    }

    fn add_shadows(&mut self, program: &mut Program) {
        let component_files: Vec<FileId> = program
            .modules
            .iter()
            .filter(|(id, m)| {
                !m.info.components.is_empty()
                    && program.file(**id).is_some_and(|f| f.kind == SourceKind::Script)
            })
            .map(|(id, _)| *id)
            .collect();
        for origin in component_files {
            let Some(file) = program.file(origin) else {
                continue;
            };
            let shadow_path = shadow_path(&file.path);
            let text = shadow_text(program, origin);
            let id = self.registry.intern(&shadow_path);
            program.sources.insert(SourceFile::new(
                id,
                shadow_path,
                text,
                SourceKind::TypeCheckShadow,
            ));
            program.origins.insert(id, origin);
        }
    }
}

impl Program {
    /// Downgrades resolutions to files that could not be read.
    fn settle_dangling(&mut self) {
        let sources = &self.sources;
        for resolutions in self.resolutions.values_mut() {
            for resolution in resolutions.iter_mut() {
                if let Resolution::File(target) = resolution {
                    if !sources.contains(*target) {
                        *resolution = Resolution::Unresolved;
                    }
                }
            }
        }
        for refs in self.resources.values_mut() {
            for resource in refs.iter_mut() {
                if resource.file.is_some_and(|f| !sources.contains(f)) {
                    resource.file = None;
                    resource.exists = false;
                }
            }
        }
    }

    fn build_graph(&mut self) {
        let mut graph = DiGraphMap::new();
        for file in self.sources.iter() {
            graph.add_node(file.id);
        }
        for (&id, module) in &self.modules {
            let reexport_range =
                module.info.imports.len()..module.info.imports.len() + module.info.reexports.len();
            for (index, resolution) in self.resolutions(id).iter().enumerate() {
                if let Resolution::File(target) = resolution {
                    let is_reexport = reexport_range.contains(&index);
                    let existing = graph.edge_weight(id, *target).copied().unwrap_or(false);
                    graph.add_edge(id, *target, existing || is_reexport);
                }
            }
            for resource in self.resources(id) {
                if let Some(target) = resource.file {
                    graph.add_edge(id, target, false);
                }
            }
        }
        self.graph = graph;
    }
}

fn is_relative(specifier: &str) -> bool {
    specifier.starts_with("./")
        || specifier.starts_with("../")
        || specifier == "."
        || specifier == ".."
        || specifier.starts_with('/')
}

/// Candidate files for an extensionless module path.
fn candidates(base: &Path) -> Vec<PathBuf> {
    let name = base.to_string_lossy();
    if name.ends_with(".ts") {
        return vec![base.to_path_buf()];
    }
    if let Some(stem) = name.strip_suffix(".js") {
        return vec![PathBuf::from(format!("{stem}.ts"))];
    }
    vec![
        PathBuf::from(format!("{name}.ts")),
        PathBuf::from(format!("{name}.d.ts")),
        base.join("index.ts"),
        base.join("index.d.ts"),
    ]
}

/// Returns the shadow path of a component file: `app.component.ts` becomes
/// `app.component.typecheck.ts`.
pub fn shadow_path(file: &Path) -> PathBuf {
    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = name.strip_suffix(".ts").unwrap_or(&name);
    path::dirname(file).join(format!("{stem}.typecheck.ts"))
}

/// Renders the type-check shadow of a component file.
///
/// The text changes exactly when something a template check reads changes:
/// template bindings, class members, or the export surface of the imports.
fn shadow_text(program: &Program, origin: FileId) -> String {
    let mut out = String::new();
    let Some(module) = program.module(origin) else {
        return out;
    };
    let resources = program.resources(origin);
    for (index, component) in module.info.components.iter().enumerate() {
        let _ = writeln!(out, "// component {}", component.class_name);
        let _ = writeln!(out, "//   members: {}", component.members.join(", "));
        let template_text = match &component.template {
            Some(TemplateSource::Inline { text, .. }) => Some(text.clone()),
            Some(TemplateSource::External { .. }) => resources
                .iter()
                .find(|r| r.component == index && r.kind == SourceKind::Template)
                .and_then(|r| r.file)
                .and_then(|f| program.file(f))
                .map(|f| f.content.clone()),
            None => None,
        };
        match template_text {
            Some(text) => {
                let info = analyze_template(&text);
                let bindings: Vec<String> = info
                    .component_bindings()
                    .map(|b| format!("{}@{}", b.name, b.offset))
                    .collect();
                let _ = writeln!(out, "//   bindings: {}", bindings.join(", "));
            }
            None => {
                let _ = writeln!(out, "//   bindings: <none>");
            }
        }
    }
    for (index, import) in module.info.imports.iter().enumerate() {
        if let Some(Resolution::File(target)) = program.resolutions(origin).get(index) {
            let names: Vec<String> = program.exported_names(*target).into_iter().collect();
            let _ = writeln!(out, "// import {}: {}", import.specifier, names.join(", "));
        }
    }
    out
}
