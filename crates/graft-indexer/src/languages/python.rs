//! Python dispatch table and module conventions

use std::path::{Path, PathBuf};

use graft_core::{ExtendedSpan, ImportData, Language, NameRef, NodeKind};
use tree_sitter::Node;

use super::helpers::*;
use super::{Built, DispatchTable, LanguageGrammar, ModuleConventions, Visit};

pub fn grammar() -> LanguageGrammar {
    LanguageGrammar {
        language: Language::Python,
        ts_language: tree_sitter_python::LANGUAGE.into(),
        table: table(),
        conventions: Box::new(PythonConventions),
    }
}

pub fn table() -> DispatchTable {
    DispatchTable::new()
        .on("function_definition", function)
        .on("class_definition", class)
        .on("decorated_definition", decorated)
        .on("import_statement", import)
        .on("import_from_statement", import_from)
        .on("call", call_expr)
        .on("assignment", module_constant)
}

fn function<'t>(node: Node<'t>, source: &[u8]) -> Option<Built<'t>> {
    let kind = if is_member_of(node, &["decorated_definition"], &["block"], &["class_definition"]) {
        NodeKind::Method
    } else {
        NodeKind::Function
    };
    let sem = named_symbol(kind, node, source)?;
    Some(Built::descending(sem, node))
}

fn class<'t>(node: Node<'t>, source: &[u8]) -> Option<Built<'t>> {
    let sem = named_symbol(NodeKind::Class, node, source)?;
    let supers: Vec<NameRef> = node
        .child_by_field_name("superclasses")
        .map(|args| {
            named_children(args)
                .into_iter()
                .filter(|c| matches!(c.kind(), "identifier" | "attribute"))
                .filter_map(|c| name_ref(c, source, &["."]))
                .collect()
        })
        .unwrap_or_default();
    let visit = node
        .child_by_field_name("body")
        .map(|body| vec![Visit::ChildrenOf(body)])
        .unwrap_or_default();
    Some(Built {
        node: with_superclasses(sem, supers),
        visit,
    })
}

/// Decorators become leading fragments of the definition they wrap.
fn decorated<'t>(node: Node<'t>, source: &[u8]) -> Option<Built<'t>> {
    let definition = node.child_by_field_name("definition")?;
    let mut built = match definition.kind() {
        "function_definition" => function(definition, source)?,
        "class_definition" => class(definition, source)?,
        _ => return None,
    };
    let mut cursor = node.walk();
    let decorators: Vec<_> = node
        .children(&mut cursor)
        .filter(|c| c.kind() == "decorator")
        .map(span)
        .collect();
    built.node.extended = ExtendedSpan::from_fragments(decorators.into_iter().chain([span(definition)]));
    Some(built)
}

/// `import a.b, c as d`: the first module is the statement's node, the rest are children.
fn import<'t>(node: Node<'t>, source: &[u8]) -> Option<Built<'t>> {
    let mut modules = children_by_field(node, "name").into_iter().map(|m| {
        let (module, alias) = match m.kind() {
            "aliased_import" => (
                m.child_by_field_name("name").unwrap_or(m),
                m.child_by_field_name("alias").map(|a| text(a, source).to_string()),
            ),
            _ => (m, None),
        };
        (
            m,
            ImportData {
                module: text(module, source).to_string(),
                module_span: span(module),
                names: Vec::new(),
                alias,
                wildcard: false,
            },
        )
    });
    let (_, first) = modules.next()?;
    let mut sem = import_node(node, first);
    for (m, data) in modules {
        sem.children.push(import_node(m, data));
    }
    Some(Built::leaf(sem))
}

fn import_from<'t>(node: Node<'t>, source: &[u8]) -> Option<Built<'t>> {
    let module = node.child_by_field_name("module_name")?;
    let names = children_by_field(node, "name")
        .into_iter()
        .map(|n| match n.kind() {
            "aliased_import" => imported_name(
                n.child_by_field_name("name").unwrap_or(n),
                n.child_by_field_name("alias"),
                source,
            ),
            _ => imported_name(n, None, source),
        })
        .collect();
    let data = ImportData {
        module: text(module, source).to_string(),
        module_span: span(module),
        names,
        alias: None,
        wildcard: find_child_by_kind(node, "wildcard_import").is_some(),
    };
    Some(Built::leaf(import_node(node, data)))
}

fn call_expr<'t>(node: Node<'t>, source: &[u8]) -> Option<Built<'t>> {
    let callee = node.child_by_field_name("function")?;
    let sem = match callee.kind() {
        "identifier" => call(node, callee, None, source),
        "attribute" => {
            let attr = callee.child_by_field_name("attribute")?;
            let qualifier = callee
                .child_by_field_name("object")
                .and_then(|o| simple_qualifier(o, source));
            call(node, attr, qualifier, source)
        }
        _ => return None,
    };
    Some(Built::descending(sem, node))
}

/// Module-level `NAME = value`.
fn module_constant<'t>(node: Node<'t>, source: &[u8]) -> Option<Built<'t>> {
    let statement = node.parent().filter(|p| p.kind() == "expression_statement")?;
    statement.parent().filter(|p| p.kind() == "module")?;
    let left = node.child_by_field_name("left").filter(|l| l.kind() == "identifier")?;
    let sem = symbol(NodeKind::Constant, node, left, source);
    let visit = node
        .child_by_field_name("right")
        .map(|r| vec![Visit::Node(r)])
        .unwrap_or_default();
    Some(Built { node: sem, visit })
}

pub struct PythonConventions;

impl PythonConventions {
    fn file_candidates(base: &Path) -> Vec<PathBuf> {
        let stem = graft_core::node::display_path(base);
        vec![
            PathBuf::from(format!("{stem}.py")),
            base.join("__init__.py"),
            PathBuf::from(format!("{stem}.pyi")),
        ]
    }
}

impl ModuleConventions for PythonConventions {
    fn module_candidates(&self, importer: &Path, module: &str) -> Vec<PathBuf> {
        let dots = module.chars().take_while(|c| *c == '.').count();
        let rest = &module[dots..];
        let rest_path: PathBuf = rest.split('.').filter(|s| !s.is_empty()).collect();

        if dots == 0 {
            return Self::file_candidates(&rest_path);
        }
        let mut base = importer.parent().map(Path::to_path_buf).unwrap_or_default();
        for _ in 1..dots {
            base.pop();
        }
        if rest.is_empty() {
            return vec![base.join("__init__.py")];
        }
        Self::file_candidates(&base.join(rest_path))
    }

    fn is_relative(&self, module: &str) -> bool {
        module.starts_with('.')
    }

    fn separator(&self) -> &'static str {
        "."
    }

    fn submodule(&self, module: &str, name: &str) -> Option<String> {
        if module.ends_with('.') {
            Some(format!("{module}{name}"))
        } else {
            Some(format!("{module}.{name}"))
        }
    }

    fn default_binding(&self, module: &str) -> Option<String> {
        module.split('.').next().filter(|s| !s.is_empty()).map(str::to_string)
    }

    fn render_import(&self, _importer: &Path, target: &Path, name: &str) -> Option<String> {
        if target.extension().and_then(|e| e.to_str()) != Some("py") {
            return None;
        }
        let mut parts: Vec<String> = target
            .with_extension("")
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        if parts.last().is_some_and(|p| p == "__init__") {
            parts.pop();
        }
        if parts.is_empty() {
            return None;
        }
        Some(format!("from {} import {}\n", parts.join("."), name))
    }
}
