//! JavaScript dispatch table. The ECMAScript constructors here are shared with TypeScript.

use std::path::{Path, PathBuf};

use graft_core::io::{normalize_path, relative_path};
use graft_core::node::display_path;
use graft_core::{ExtendedSpan, ImportData, ImportedName, Language, NameRef, NodeKind};
use tree_sitter::Node;

use super::helpers::*;
use super::{Built, DispatchTable, LanguageGrammar, ModuleConventions, Visit};

pub fn grammar() -> LanguageGrammar {
    LanguageGrammar {
        language: Language::JavaScript,
        ts_language: tree_sitter_javascript::LANGUAGE.into(),
        table: table(),
        conventions: Box::new(EcmaConventions { typescript: false }),
    }
}

pub fn table() -> DispatchTable {
    DispatchTable::new()
        .on("function_declaration", function)
        .on("generator_function_declaration", function)
        .on("class_declaration", class)
        .on("method_definition", method)
        .on("lexical_declaration", top_level_binding)
        .on("variable_declaration", top_level_binding)
        .on("import_statement", import)
        .on("export_statement", export)
        .on("call_expression", call_expr)
        .on("new_expression", new_expr)
}

pub(crate) fn function<'t>(node: Node<'t>, source: &[u8]) -> Option<Built<'t>> {
    let sem = named_symbol(NodeKind::Function, node, source)?;
    Some(Built::descending(sem, node))
}

pub(crate) fn class<'t>(node: Node<'t>, source: &[u8]) -> Option<Built<'t>> {
    let sem = named_symbol(NodeKind::Class, node, source)?;
    let supers = find_child_by_kind(node, "class_heritage")
        .map(|h| heritage(h, source))
        .unwrap_or_default();
    let visit = node
        .child_by_field_name("body")
        .map(|b| vec![Visit::ChildrenOf(b)])
        .unwrap_or_default();
    Some(Built {
        node: with_superclasses(sem, supers),
        visit,
    })
}

/// `extends Base` (JS) or `extends_clause`/`implements_clause` (TS).
fn heritage(node: Node<'_>, source: &[u8]) -> Vec<NameRef> {
    let mut out = Vec::new();
    for child in named_children(node) {
        match child.kind() {
            "identifier" | "member_expression" | "type_identifier" | "nested_type_identifier" => {
                out.extend(name_ref(child, source, &["."]));
            }
            "extends_clause" | "implements_clause" => out.extend(heritage(child, source)),
            "generic_type" => {
                if let Some(name) = child.child_by_field_name("name") {
                    out.extend(name_ref(name, source, &["."]));
                }
            }
            _ => {}
        }
    }
    out
}

pub(crate) fn method<'t>(node: Node<'t>, source: &[u8]) -> Option<Built<'t>> {
    let sem = named_symbol(NodeKind::Method, node, source)?;
    Some(Built::descending(sem, node))
}

/// Top-level `const x = ...`: arrow functions and function expressions become
/// functions, everything else a constant.
pub(crate) fn top_level_binding<'t>(node: Node<'t>, source: &[u8]) -> Option<Built<'t>> {
    let parent = node.parent()?;
    if !matches!(parent.kind(), "program" | "export_statement") {
        return None;
    }
    let declarators: Vec<Node<'t>> = named_children(node)
        .into_iter()
        .filter(|c| c.kind() == "variable_declarator")
        .collect();
    // Multi-declarator statements stay unstructured.
    let [declarator] = declarators.as_slice() else {
        return None;
    };
    let name = declarator.child_by_field_name("name").filter(|n| n.kind() == "identifier")?;
    let value = declarator.child_by_field_name("value");
    let kind = match value.map(|v| v.kind()) {
        Some("arrow_function" | "function_expression" | "function" | "generator_function") => NodeKind::Function,
        _ => NodeKind::Constant,
    };
    let sem = symbol(kind, node, name, source);
    let visit = value.map(|v| vec![Visit::ChildrenOf(v)]).unwrap_or_default();
    Some(Built { node: sem, visit })
}

pub(crate) fn import<'t>(node: Node<'t>, source: &[u8]) -> Option<Built<'t>> {
    let module_node = node.child_by_field_name("source")?;
    let mut data = ImportData {
        module: unquote(text(module_node, source)).to_string(),
        module_span: span(module_node),
        ..ImportData::default()
    };
    if let Some(clause) = find_child_by_kind(node, "import_clause") {
        for child in named_children(clause) {
            match child.kind() {
                // Default import binds the whole module.
                "identifier" => data.alias = Some(text(child, source).to_string()),
                "namespace_import" => {
                    data.alias = find_child_by_kind(child, "identifier").map(|n| text(n, source).to_string());
                }
                "named_imports" => {
                    for spec in named_children(child) {
                        if spec.kind() != "import_specifier" {
                            continue;
                        }
                        if let Some(name) = spec.child_by_field_name("name") {
                            data.names.push(imported_name(name, spec.child_by_field_name("alias"), source));
                        }
                    }
                }
                _ => {}
            }
        }
    }
    Some(Built::leaf(import_node(node, data)))
}

/// `export <declaration>` keeps the keyword as a leading fragment;
/// `export { a } from './x'` is a re-exporting import.
pub(crate) fn export<'t>(node: Node<'t>, source: &[u8]) -> Option<Built<'t>> {
    if let Some(declaration) = node.child_by_field_name("declaration") {
        let mut built = declaration_for(declaration, source)?;
        built.node.extended = ExtendedSpan::from_fragments([span(node), built.node.span]);
        return Some(built);
    }
    let module_node = node.child_by_field_name("source")?;
    let mut data = ImportData {
        module: unquote(text(module_node, source)).to_string(),
        module_span: span(module_node),
        ..ImportData::default()
    };
    match find_child_by_kind(node, "export_clause") {
        Some(clause) => {
            for spec in named_children(clause) {
                if spec.kind() != "export_specifier" {
                    continue;
                }
                if let Some(name) = spec.child_by_field_name("name") {
                    data.names.push(ImportedName {
                        name: text(name, source).to_string(),
                        alias: spec.child_by_field_name("alias").map(|a| text(a, source).to_string()),
                        span: span(name),
                    });
                }
            }
        }
        None => data.wildcard = true,
    }
    Some(Built::leaf(import_node(node, data)))
}

fn declaration_for<'t>(declaration: Node<'t>, source: &[u8]) -> Option<Built<'t>> {
    match declaration.kind() {
        "function_declaration" | "generator_function_declaration" => function(declaration, source),
        "class_declaration" => class(declaration, source),
        "lexical_declaration" | "variable_declaration" => top_level_binding(declaration, source),
        "interface_declaration" | "type_alias_declaration" | "enum_declaration" | "abstract_class_declaration" => {
            super::typescript::declaration(declaration, source)
        }
        _ => None,
    }
}

pub(crate) fn call_expr<'t>(node: Node<'t>, source: &[u8]) -> Option<Built<'t>> {
    let callee = node.child_by_field_name("function")?;
    let sem = callee_call(node, callee, source)?;
    Some(Built::descending(sem, node))
}

pub(crate) fn new_expr<'t>(node: Node<'t>, source: &[u8]) -> Option<Built<'t>> {
    let callee = node.child_by_field_name("constructor")?;
    let sem = callee_call(node, callee, source)?;
    Some(Built::descending(sem, node))
}

fn callee_call(node: Node<'_>, callee: Node<'_>, source: &[u8]) -> Option<graft_core::SemanticNode> {
    match callee.kind() {
        "identifier" => Some(call(node, callee, None, source)),
        "member_expression" => {
            let property = callee.child_by_field_name("property")?;
            let qualifier = callee
                .child_by_field_name("object")
                .and_then(|o| simple_qualifier(o, source));
            Some(call(node, property, qualifier, source))
        }
        _ => None,
    }
}

/// Module resolution for JavaScript and TypeScript.
pub struct EcmaConventions {
    pub typescript: bool,
}

const SCRIPT_EXTENSIONS: &[&str] = &["ts", "tsx", "js", "jsx", "mjs", "cjs"];

impl EcmaConventions {
    fn extensions(&self) -> &'static [&'static str] {
        if self.typescript {
            &["ts", "tsx", "d.ts", "js", "jsx", "mjs"]
        } else {
            &["js", "jsx", "mjs", "cjs"]
        }
    }
}

impl ModuleConventions for EcmaConventions {
    fn module_candidates(&self, importer: &Path, module: &str) -> Vec<PathBuf> {
        let base = if self.is_relative(module) {
            let dir = importer.parent().unwrap_or(Path::new(""));
            normalize_path(&dir.join(module))
        } else {
            PathBuf::from(module)
        };
        let stem = display_path(&base);
        let mut out = Vec::new();
        let has_ext = base
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| SCRIPT_EXTENSIONS.contains(&e));
        if has_ext {
            out.push(base.clone());
            // `./x.js` written in TypeScript sources names `./x.ts`.
            if self.typescript {
                let without = base.with_extension("");
                out.push(PathBuf::from(format!("{}.ts", display_path(&without))));
                out.push(PathBuf::from(format!("{}.tsx", display_path(&without))));
            }
        }
        for ext in self.extensions() {
            out.push(PathBuf::from(format!("{stem}.{ext}")));
        }
        for ext in self.extensions() {
            out.push(base.join(format!("index.{ext}")));
        }
        out
    }

    fn is_relative(&self, module: &str) -> bool {
        module == "." || module == ".." || module.starts_with("./") || module.starts_with("../")
    }

    fn separator(&self) -> &'static str {
        "."
    }

    fn default_binding(&self, _module: &str) -> Option<String> {
        None
    }

    fn render_import(&self, importer: &Path, target: &Path, name: &str) -> Option<String> {
        let dir = importer.parent().unwrap_or(Path::new(""));
        let relative = relative_path(dir, &target.with_extension(""));
        let mut spec = display_path(&relative);
        if !spec.starts_with('.') {
            spec = format!("./{spec}");
        }
        Some(format!("import {{ {name} }} from '{spec}';\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_candidates() {
        let c = EcmaConventions { typescript: true };
        let candidates = c.module_candidates(Path::new("src/app/main.ts"), "../lib/util");
        assert_eq!(candidates[0], PathBuf::from("src/lib/util.ts"));
        assert!(candidates.contains(&PathBuf::from("src/lib/util/index.ts")));
        assert!(c.looks_external("react"));
        assert!(!c.looks_external("./x"));
    }

    #[test]
    fn test_render_import_is_relative() {
        let c = EcmaConventions { typescript: true };
        assert_eq!(
            c.render_import(Path::new("src/a.ts"), Path::new("src/util/b.ts"), "helper").as_deref(),
            Some("import { helper } from './util/b';\n")
        );
    }
}
