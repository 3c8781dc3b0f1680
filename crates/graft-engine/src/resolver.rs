//! Import and reference resolution.
//!
//! Imports are bound against the graph's path index using each language's
//! module conventions, then the configured search paths. Named imports bind
//! to the target file's symbol of that name, following re-exports through the
//! target's own imports. What does not bind is classed as external or
//! unresolved; neither is an error.
//!
//! References and superclasses are bound afterwards, using the bindings the
//! file's imports introduced.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use graft_core::{
    CodeGraph, EdgeKind, EdgeTarget, FileId, GraftError, ImportStatus, Language, NodeId, NodeKind, ResolutionConfig,
    Result,
};
use graft_indexer::{GrammarAdapter, ModuleConventions};
use petgraph::graph::{DiGraph, NodeIndex};
use regex::Regex;
use serde::Serialize;

/// An import (or one name of it) that did not bind.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolutionFailure {
    pub import: NodeId,
    pub path: PathBuf,
    pub module: String,
    /// The imported name, for named imports.
    pub name: Option<String>,
    pub reason: String,
}

impl ResolutionFailure {
    pub fn to_error(&self) -> GraftError {
        GraftError::Resolution {
            path: self.path.clone(),
            module: self.module.clone(),
        }
    }
}

/// Per-import binding counts.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResolutionReport {
    pub total: usize,
    pub resolved: usize,
    pub external: usize,
    pub unresolved: usize,
    #[serde(skip)]
    pub count_external_as_resolved: bool,
    pub failures: Vec<ResolutionFailure>,
}

impl ResolutionReport {
    fn new(count_external_as_resolved: bool) -> Self {
        ResolutionReport {
            count_external_as_resolved,
            ..Default::default()
        }
    }

    /// Fraction of imports that bound; `None` when there were no imports.
    pub fn rate(&self) -> Option<f64> {
        if self.total == 0 {
            return None;
        }
        let bound = if self.count_external_as_resolved {
            self.resolved + self.external
        } else {
            self.resolved
        };
        Some(bound as f64 / self.total as f64)
    }

    pub fn merge(&mut self, other: ResolutionReport) {
        self.total += other.total;
        self.resolved += other.resolved;
        self.external += other.external;
        self.unresolved += other.unresolved;
        self.failures.extend(other.failures);
    }

    fn count(&mut self, status: ImportStatus) {
        self.total += 1;
        match status {
            ImportStatus::Resolved => self.resolved += 1,
            ImportStatus::External => self.external += 1,
            ImportStatus::Unresolved | ImportStatus::Pending => self.unresolved += 1,
        }
    }
}

/// A set of files that import each other in a loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportCycle {
    /// In import order, starting from the file the search entered first.
    pub files: Vec<FileId>,
    pub paths: Vec<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct Resolver {
    adapter: GrammarAdapter,
    config: ResolutionConfig,
    external: Vec<Regex>,
}

impl Resolver {
    pub fn new(adapter: GrammarAdapter, config: ResolutionConfig) -> Result<Self> {
        let external = config.external_matchers()?;
        Ok(Resolver {
            adapter,
            config,
            external,
        })
    }

    pub fn config(&self) -> &ResolutionConfig {
        &self.config
    }

    /// Re-resolve every given file. Files that no longer exist are skipped.
    pub fn resolve_files(&self, graph: &mut CodeGraph, files: impl IntoIterator<Item = FileId>) -> ResolutionReport {
        let mut report = ResolutionReport::new(self.config.count_external_as_resolved);
        for file in files {
            report.merge(self.resolve_file(graph, file));
        }
        report
    }

    /// Drop a file's outgoing edges and bind its imports, references and superclasses again.
    pub fn resolve_file(&self, graph: &mut CodeGraph, file: FileId) -> ResolutionReport {
        let mut report = ResolutionReport::new(self.config.count_external_as_resolved);
        let Some(record) = graph.file(file) else {
            return report;
        };
        let Some(conventions) = self.adapter.conventions(record.language) else {
            return report;
        };
        let plan = Planner {
            graph,
            resolver: self,
            conventions,
            file,
            language: record.language,
            importer: record.path.clone(),
            bindings: HashMap::new(),
            wildcards: Vec::new(),
        }
        .plan();

        graph.clear_resolution(file);
        for (import, status) in plan.statuses {
            graph.set_import_status(import, status);
            report.count(status);
        }
        for (kind, source, target, name) in plan.edges {
            graph.add_edge(kind, source, target, name);
        }
        report.failures = plan.failures;
        tracing::debug!(
            "Resolved {}: {}/{} imports bound, {} external",
            self.display(graph, file),
            report.resolved,
            report.total,
            report.external
        );
        report
    }

    fn display(&self, graph: &CodeGraph, file: FileId) -> String {
        graph.file(file).map(|f| f.display_path()).unwrap_or_default()
    }

    fn is_external(&self, conventions: &dyn ModuleConventions, module: &str) -> bool {
        conventions.looks_external(module) || self.external.iter().any(|re| re.is_match(module))
    }
}

/// Where a module specifier landed.
#[derive(Debug, Clone)]
enum ModuleTarget {
    File(FileId),
    /// A directory of files (Go packages, Java packages).
    Package(Vec<FileId>),
}

impl ModuleTarget {
    fn files(&self) -> Vec<FileId> {
        match self {
            ModuleTarget::File(file) => vec![*file],
            ModuleTarget::Package(files) => files.clone(),
        }
    }
}

/// What a local identifier introduced by an import stands for.
#[derive(Debug, Clone)]
enum Binding {
    Node(NodeId),
    Module(ModuleTarget),
    External(String),
}

/// Everything one file's resolution will write.
#[derive(Debug, Default)]
struct Plan {
    statuses: Vec<(NodeId, ImportStatus)>,
    edges: Vec<(EdgeKind, NodeId, EdgeTarget, String)>,
    failures: Vec<ResolutionFailure>,
}

struct Planner<'a> {
    graph: &'a CodeGraph,
    resolver: &'a Resolver,
    conventions: &'a dyn ModuleConventions,
    file: FileId,
    language: Language,
    importer: PathBuf,
    bindings: HashMap<String, Binding>,
    wildcards: Vec<ModuleTarget>,
}

impl Planner<'_> {
    fn plan(mut self) -> Plan {
        let mut plan = Plan::default();
        let ids: Vec<NodeId> = self.graph.nodes_in_file(self.file).collect();

        for id in &ids {
            if self.graph.node(*id).is_some_and(|n| n.import().is_some()) {
                self.plan_import(*id, &mut plan);
            }
        }
        for id in &ids {
            let Some(node) = self.graph.node(*id) else {
                continue;
            };
            if let Some(reference) = node.reference() {
                let target = self.bind_reference(*id, &reference.name, reference.qualifier.as_deref());
                if let Some(target) = target {
                    plan.edges.push((EdgeKind::Reference, *id, target, reference.name.clone()));
                }
            }
            for superclass in node.superclasses() {
                let target = self
                    .bind_reference(*id, &superclass.name, superclass.qualifier.as_deref())
                    .filter(|t| t.node() != Some(*id));
                let name = match &superclass.qualifier {
                    Some(q) => format!("{q}{}{}", self.conventions.separator(), superclass.name),
                    None => superclass.name.clone(),
                };
                plan.edges
                    .push((EdgeKind::Inheritance, *id, target.unwrap_or(EdgeTarget::Unresolved), name));
            }
        }
        plan
    }

    fn plan_import(&mut self, id: NodeId, plan: &mut Plan) {
        let Some(data) = self.graph.node(id).and_then(|n| n.import()).cloned() else {
            return;
        };
        let target = self.locate(self.conventions, &self.importer, &data.module);
        let external = target.is_none() && self.resolver.is_external(self.conventions, &data.module);

        if data.names.is_empty() {
            let status = match target {
                Some(target) => {
                    let entry = self.entry_node(&target, &data.module);
                    plan.edges
                        .push((EdgeKind::Dependency, id, EdgeTarget::Node(entry), data.module.clone()));
                    if data.wildcard && data.alias.is_none() {
                        self.wildcards.push(target);
                    } else if entry.is_root() {
                        self.bind_module(&data.module, data.alias.as_deref(), Binding::Module(target));
                    } else {
                        self.bind_module(&data.module, data.alias.as_deref(), Binding::Node(entry));
                    }
                    ImportStatus::Resolved
                }
                None if external => {
                    plan.edges.push((
                        EdgeKind::Dependency,
                        id,
                        EdgeTarget::External(data.module.clone()),
                        data.module.clone(),
                    ));
                    self.bind_module(&data.module, data.alias.as_deref(), Binding::External(data.module.clone()));
                    ImportStatus::External
                }
                None => {
                    plan.edges
                        .push((EdgeKind::Dependency, id, EdgeTarget::Unresolved, data.module.clone()));
                    plan.failures.push(self.failure(id, &data.module, None, "no file matches the module"));
                    ImportStatus::Unresolved
                }
            };
            plan.statuses.push((id, status));
            return;
        }

        let mut bound = 0;
        let mut externals = 0;
        let mut missing = 0;
        for imported in &data.names {
            let local = imported.local_name().to_string();
            let direct = target
                .as_ref()
                .and_then(|t| self.bind_name(t, &imported.name, &mut HashSet::new()));
            if let Some(node) = direct {
                plan.edges
                    .push((EdgeKind::Dependency, id, EdgeTarget::Node(node), imported.name.clone()));
                self.bindings.insert(local, Binding::Node(node));
                bound += 1;
                continue;
            }
            let submodule = self
                .conventions
                .submodule(&data.module, &imported.name)
                .and_then(|m| self.locate(self.conventions, &self.importer, &m).map(|t| (m, t)));
            if let Some((module, sub)) = submodule {
                let entry = self.entry_node(&sub, &module);
                plan.edges
                    .push((EdgeKind::Dependency, id, EdgeTarget::Node(entry), imported.name.clone()));
                let binding = if entry.is_root() {
                    Binding::Module(sub)
                } else {
                    Binding::Node(entry)
                };
                self.bindings.insert(local, binding);
                bound += 1;
            } else if external {
                plan.edges.push((
                    EdgeKind::Dependency,
                    id,
                    EdgeTarget::External(data.module.clone()),
                    imported.name.clone(),
                ));
                self.bindings.insert(local, Binding::External(data.module.clone()));
                externals += 1;
            } else {
                plan.edges
                    .push((EdgeKind::Dependency, id, EdgeTarget::Unresolved, imported.name.clone()));
                let reason = if target.is_some() {
                    "module has no symbol of that name"
                } else {
                    "no file matches the module"
                };
                plan.failures
                    .push(self.failure(id, &data.module, Some(imported.name.clone()), reason));
                missing += 1;
            }
        }
        let status = if missing > 0 {
            ImportStatus::Unresolved
        } else if bound == 0 && externals > 0 {
            ImportStatus::External
        } else {
            ImportStatus::Resolved
        };
        plan.statuses.push((id, status));
    }

    fn failure(&self, import: NodeId, module: &str, name: Option<String>, reason: &str) -> ResolutionFailure {
        ResolutionFailure {
            import,
            path: self.importer.clone(),
            module: module.to_string(),
            name,
            reason: reason.to_string(),
        }
    }

    /// Record the identifiers a whole-module import introduces: its alias or
    /// default binding, plus the specifier itself for dotted qualifiers.
    fn bind_module(&mut self, module: &str, alias: Option<&str>, binding: Binding) {
        let local = alias
            .map(str::to_string)
            .or_else(|| self.conventions.default_binding(module));
        if let Some(local) = local {
            self.bindings.insert(local, binding.clone());
        }
        self.bindings.insert(module.to_string(), binding);
    }

    fn locate(&self, conventions: &dyn ModuleConventions, importer: &Path, module: &str) -> Option<ModuleTarget> {
        let candidates = conventions.module_candidates(importer, module);
        if let Some(found) = candidates.iter().find_map(|c| self.target_at(c)) {
            return Some(found);
        }
        if conventions.is_relative(module) {
            return None;
        }
        self.resolver
            .config
            .module_search_paths
            .iter()
            .find_map(|root| candidates.iter().find_map(|c| self.target_at(&root.join(c))))
    }

    fn target_at(&self, candidate: &Path) -> Option<ModuleTarget> {
        let candidate = graft_core::io::normalize_path(candidate);
        if let Some(file) = self.graph.file_id(&candidate) {
            return Some(ModuleTarget::File(file));
        }
        if candidate.as_os_str().is_empty() {
            return None;
        }
        let files = self.graph.files_in_dir(&candidate);
        (!files.is_empty()).then_some(ModuleTarget::Package(files))
    }

    /// The node a whole-module import points at: the symbol the module is
    /// named after (Java classes) or the file root.
    fn entry_node(&self, target: &ModuleTarget, module: &str) -> NodeId {
        let files = target.files();
        let first = files.first().copied().unwrap_or(self.file);
        if let Some(name) = self.conventions.default_binding(module) {
            if let Some(symbol) = files.iter().find_map(|f| self.graph.symbol_in_file(*f, &name)) {
                let top_level = self.graph.parent(symbol).is_some_and(|p| p.is_root());
                if top_level {
                    return symbol;
                }
            }
        }
        NodeId::root(first)
    }

    /// A symbol `name` exported by `target`, directly or through its own imports.
    fn bind_name(&self, target: &ModuleTarget, name: &str, visited: &mut HashSet<FileId>) -> Option<NodeId> {
        for file in target.files() {
            if !visited.insert(file) {
                continue;
            }
            if let Some(id) = self.graph.symbol_in_file(file, name) {
                return Some(id);
            }
            let Some(record) = self.graph.file(file) else {
                continue;
            };
            let Some(conventions) = self.resolver.adapter.conventions(record.language) else {
                continue;
            };
            for import in record.nodes.iter().filter_map(|id| self.graph.node(*id)?.import()) {
                let forwarded = match import.names.iter().find(|n| n.local_name() == name) {
                    Some(imported) => imported.name.as_str(),
                    None if import.wildcard && import.alias.is_none() => name,
                    None => continue,
                };
                let Some(next) = self.locate(conventions, &record.path, &import.module) else {
                    continue;
                };
                if let Some(found) = self.bind_name(&next, forwarded, visited) {
                    return Some(found);
                }
            }
        }
        None
    }

    fn bind_reference(&self, id: NodeId, name: &str, qualifier: Option<&str>) -> Option<EdgeTarget> {
        match qualifier {
            None => Some(self.bind_plain(name)),
            Some(qualifier) => self.bind_qualified(id, name, qualifier),
        }
    }

    fn bind_plain(&self, name: &str) -> EdgeTarget {
        if let Some(symbol) = self.graph.symbol_in_file(self.file, name) {
            return EdgeTarget::Node(symbol);
        }
        match self.bindings.get(name) {
            Some(Binding::Node(node)) => return EdgeTarget::Node(*node),
            Some(Binding::Module(target)) => return EdgeTarget::Node(self.entry_node(target, name)),
            Some(Binding::External(module)) => return EdgeTarget::External(module.clone()),
            None => {}
        }
        for target in &self.wildcards {
            if let Some(node) = self.bind_name(target, name, &mut HashSet::new()) {
                return EdgeTarget::Node(node);
            }
        }
        if let Some(node) = self.package_sibling(name) {
            return EdgeTarget::Node(node);
        }
        EdgeTarget::Unresolved
    }

    /// Go and Java see every file of their own directory without importing it.
    fn package_sibling(&self, name: &str) -> Option<NodeId> {
        if !matches!(self.language, Language::Go | Language::Java) {
            return None;
        }
        let dir = self.importer.parent().map(Path::to_path_buf).unwrap_or_default();
        self.graph
            .files_in_dir(&dir)
            .into_iter()
            .filter(|f| *f != self.file)
            .find_map(|f| self.top_level_symbol(f, name))
    }

    fn top_level_symbol(&self, file: FileId, name: &str) -> Option<NodeId> {
        self.graph
            .symbol_in_file(file, name)
            .filter(|id| self.graph.parent(*id).is_some_and(|p| p.is_root()))
    }

    /// `qualifier.name`: a member of the enclosing type for `self`/`this`, a
    /// symbol of an imported module, or a member of a known type. Anything
    /// else (attribute access on locals) is left without an edge.
    fn bind_qualified(&self, id: NodeId, name: &str, qualifier: &str) -> Option<EdgeTarget> {
        if matches!(qualifier, "self" | "this" | "cls" | "Self" | "super") {
            return self.bind_member_of_enclosing(id, name).map(EdgeTarget::Node);
        }

        let binding = self.bindings.get(qualifier).or_else(|| {
            let head = qualifier.split(['.', ':', '/']).next().unwrap_or(qualifier);
            self.bindings
                .get(head)
                .filter(|b| matches!(b, Binding::External(_)))
        });
        match binding {
            Some(Binding::Module(target)) => {
                let found = target
                    .files()
                    .into_iter()
                    .find_map(|f| self.graph.symbol_in_file(f, name));
                return Some(found.map(EdgeTarget::Node).unwrap_or(EdgeTarget::Unresolved));
            }
            Some(Binding::Node(owner)) => return self.bind_member(*owner, name).map(EdgeTarget::Node),
            Some(Binding::External(module)) => return Some(EdgeTarget::External(module.clone())),
            None => {}
        }

        let owner = self
            .graph
            .symbol_in_file(self.file, qualifier)
            .or_else(|| self.package_sibling(qualifier))?;
        self.bind_member(owner, name).map(EdgeTarget::Node)
    }

    fn bind_member_of_enclosing(&self, id: NodeId, name: &str) -> Option<NodeId> {
        match self.graph.enclosing(id, |k| k.is_type_definition()) {
            Some(owner) => self.bind_member(owner, name),
            None => self.method_in_file(id.file, name),
        }
    }

    /// A member of a type definition. Rust and Go declare methods outside
    /// the type body, so fall back to a same-file method of that name.
    fn bind_member(&self, owner: NodeId, name: &str) -> Option<NodeId> {
        let node = self.graph.node(owner)?;
        if !node.kind.is_type_definition() {
            return None;
        }
        self.graph
            .member_named(owner, name)
            .or_else(|| self.method_in_file(owner.file, name))
    }

    fn method_in_file(&self, file: FileId, name: &str) -> Option<NodeId> {
        self.graph.nodes_in_file(file).find(|id| {
            self.graph
                .node(*id)
                .is_some_and(|n| n.kind == NodeKind::Method && n.name.as_deref() == Some(name))
        })
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Colour {
    White,
    Grey,
    Black,
}

/// Every import cycle among files, each reported once.
///
/// Depth-first search with white/grey/black colouring over the file-level
/// dependency graph; a grey successor closes a cycle. Cycles are reported,
/// never treated as errors.
pub fn find_import_cycles(graph: &CodeGraph) -> Vec<ImportCycle> {
    let mut deps: DiGraph<FileId, ()> = DiGraph::new();
    let mut index: HashMap<FileId, NodeIndex> = HashMap::new();
    for file in graph.files() {
        index.insert(file.id, deps.add_node(file.id));
    }
    for edge in graph.edges().filter(|e| e.kind == EdgeKind::Dependency) {
        let Some(target) = edge.target.node() else {
            continue;
        };
        if edge.source.file == target.file {
            continue;
        }
        if let (Some(from), Some(to)) = (index.get(&edge.source.file), index.get(&target.file)) {
            if !deps.contains_edge(*from, *to) {
                deps.add_edge(*from, *to, ());
            }
        }
    }

    let mut search = CycleSearch {
        deps: &deps,
        colour: vec![Colour::White; deps.node_count()],
        stack: Vec::new(),
        seen: HashSet::new(),
        cycles: Vec::new(),
    };
    let mut roots: Vec<NodeIndex> = deps.node_indices().collect();
    roots.sort_by_key(|ix| deps[*ix]);
    for root in roots {
        if search.colour[root.index()] == Colour::White {
            search.visit(root);
        }
    }

    search
        .cycles
        .into_iter()
        .map(|files| {
            let paths = files
                .iter()
                .filter_map(|f| graph.file(*f).map(|r| r.path.clone()))
                .collect();
            ImportCycle { files, paths }
        })
        .collect()
}

struct CycleSearch<'g> {
    deps: &'g DiGraph<FileId, ()>,
    colour: Vec<Colour>,
    stack: Vec<NodeIndex>,
    seen: HashSet<Vec<FileId>>,
    cycles: Vec<Vec<FileId>>,
}

impl CycleSearch<'_> {
    fn visit(&mut self, node: NodeIndex) {
        self.colour[node.index()] = Colour::Grey;
        self.stack.push(node);
        let mut next: Vec<NodeIndex> = self.deps.neighbors(node).collect();
        next.sort_by_key(|ix| self.deps[*ix]);
        for succ in next {
            match self.colour[succ.index()] {
                Colour::White => self.visit(succ),
                Colour::Grey => self.record(succ),
                Colour::Black => {}
            }
        }
        self.stack.pop();
        self.colour[node.index()] = Colour::Black;
    }

    fn record(&mut self, entry: NodeIndex) {
        let Some(pos) = self.stack.iter().position(|ix| *ix == entry) else {
            return;
        };
        let files: Vec<FileId> = self.stack[pos..].iter().map(|ix| self.deps[*ix]).collect();
        let mut key = files.clone();
        key.sort();
        if self.seen.insert(key) {
            self.cycles.push(files);
        }
    }
}
