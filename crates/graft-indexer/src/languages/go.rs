//! Go dispatch table and module conventions

use std::path::{Path, PathBuf};

use graft_core::io::normalize_path;
use graft_core::{ImportData, Language, NodeKind};
use tree_sitter::Node;

use super::helpers::*;
use super::{Built, DispatchTable, LanguageGrammar, ModuleConventions, Visit};

pub fn grammar() -> LanguageGrammar {
    LanguageGrammar {
        language: Language::Go,
        ts_language: tree_sitter_go::LANGUAGE.into(),
        table: table(),
        conventions: Box::new(GoConventions),
    }
}

pub fn table() -> DispatchTable {
    DispatchTable::new()
        .on("function_declaration", function)
        .on("method_declaration", function)
        .on("type_spec", type_spec)
        .on("type_alias", type_spec)
        .on("const_spec", const_spec)
        .on("import_declaration", import_declaration)
        .on("import_spec", import_spec)
        .on("call_expression", call_expr)
        .with_leading(doc_comment)
}

fn doc_comment(node: Node<'_>, source: &[u8]) -> bool {
    node.kind() == "comment" && text(node, source).starts_with("//")
}

fn function<'t>(node: Node<'t>, source: &[u8]) -> Option<Built<'t>> {
    let kind = match node.kind() {
        "method_declaration" => NodeKind::Method,
        _ => NodeKind::Function,
    };
    let sem = named_symbol(kind, node, source)?;
    Some(Built::descending(sem, node))
}

fn type_spec<'t>(node: Node<'t>, source: &[u8]) -> Option<Built<'t>> {
    let underlying = node.child_by_field_name("type").map(|t| t.kind());
    let kind = match (node.kind(), underlying) {
        ("type_spec", Some("struct_type")) => NodeKind::Struct,
        ("type_spec", Some("interface_type")) => NodeKind::Interface,
        _ => NodeKind::TypeAlias,
    };
    let sem = named_symbol(kind, node, source)?;
    Some(Built::descending(sem, node))
}

/// `const X = ...`; grouped names (`const a, b = 1, 2`) stay unstructured.
fn const_spec<'t>(node: Node<'t>, source: &[u8]) -> Option<Built<'t>> {
    let names = children_by_field(node, "name");
    let [name] = names.as_slice() else {
        return None;
    };
    let sem = symbol(NodeKind::Constant, node, *name, source);
    let visit = node
        .child_by_field_name("value")
        .map(|v| vec![Visit::ChildrenOf(v)])
        .unwrap_or_default();
    Some(Built { node: sem, visit })
}

/// A single `import "fmt"` covers the whole declaration; grouped imports descend
/// so each spec becomes its own node.
fn import_declaration<'t>(node: Node<'t>, source: &[u8]) -> Option<Built<'t>> {
    let spec = find_child_by_kind(node, "import_spec")?;
    let data = import_data(spec, source)?;
    Some(Built::leaf(import_node(node, data)))
}

fn import_spec<'t>(node: Node<'t>, source: &[u8]) -> Option<Built<'t>> {
    let data = import_data(node, source)?;
    Some(Built::leaf(import_node(node, data)))
}

fn import_data(spec: Node<'_>, source: &[u8]) -> Option<ImportData> {
    let path = spec.child_by_field_name("path")?;
    let mut data = ImportData {
        module: unquote(text(path, source)).to_string(),
        module_span: span(path),
        ..ImportData::default()
    };
    if let Some(name) = spec.child_by_field_name("name") {
        match name.kind() {
            "dot" => data.wildcard = true,
            "blank_identifier" => {}
            _ => data.alias = Some(text(name, source).to_string()),
        }
    }
    Some(data)
}

fn call_expr<'t>(node: Node<'t>, source: &[u8]) -> Option<Built<'t>> {
    let callee = node.child_by_field_name("function")?;
    let sem = match callee.kind() {
        "identifier" => call(node, callee, None, source),
        "selector_expression" => {
            let field = callee.child_by_field_name("field")?;
            let qualifier = callee
                .child_by_field_name("operand")
                .and_then(|o| simple_qualifier(o, source));
            call(node, field, qualifier, source)
        }
        _ => return None,
    };
    Some(Built::descending(sem, node))
}

/// Go imports name package directories. Without reading `go.mod`, every suffix
/// of the import path is tried as a directory under the root.
pub struct GoConventions;

impl ModuleConventions for GoConventions {
    fn module_candidates(&self, importer: &Path, module: &str) -> Vec<PathBuf> {
        if self.is_relative(module) {
            let dir = importer.parent().unwrap_or(Path::new(""));
            return vec![normalize_path(&dir.join(module))];
        }
        let segments: Vec<&str> = module.split('/').filter(|s| !s.is_empty()).collect();
        (0..segments.len())
            .map(|skip| segments[skip..].iter().collect::<PathBuf>())
            .collect()
    }

    fn is_relative(&self, module: &str) -> bool {
        module.starts_with("./") || module.starts_with("../")
    }

    fn separator(&self) -> &'static str {
        "/"
    }

    fn default_binding(&self, module: &str) -> Option<String> {
        let mut segments = module.rsplit('/');
        let last = segments.next()?;
        // `example.com/mod/v2` binds `mod`.
        let is_version = last.len() > 1 && last.starts_with('v') && last[1..].chars().all(|c| c.is_ascii_digit());
        let binding = if is_version { segments.next()? } else { last };
        Some(binding.replace('-', "_"))
    }

    /// Go import paths depend on the module path in `go.mod`, which is not tracked.
    fn render_import(&self, _importer: &Path, _target: &Path, _name: &str) -> Option<String> {
        None
    }
}
