//! Java dispatch table and module conventions

use std::path::{Path, PathBuf};

use graft_core::{ImportData, ImportedName, Language, NameRef, NodeKind};
use tree_sitter::Node;

use super::helpers::*;
use super::{Built, DispatchTable, LanguageGrammar, ModuleConventions, Visit};

pub fn grammar() -> LanguageGrammar {
    LanguageGrammar {
        language: Language::Java,
        ts_language: tree_sitter_java::LANGUAGE.into(),
        table: table(),
        conventions: Box::new(JavaConventions),
    }
}

pub fn table() -> DispatchTable {
    DispatchTable::new()
        .on("class_declaration", type_declaration)
        .on("interface_declaration", type_declaration)
        .on("enum_declaration", type_declaration)
        .on("record_declaration", type_declaration)
        .on("method_declaration", method)
        .on("constructor_declaration", method)
        .on("import_declaration", import)
        .on("method_invocation", invocation)
        .on("object_creation_expression", object_creation)
        .with_leading(javadoc)
}

fn javadoc(node: Node<'_>, source: &[u8]) -> bool {
    node.kind() == "block_comment" && text(node, source).starts_with("/**")
}

fn type_declaration<'t>(node: Node<'t>, source: &[u8]) -> Option<Built<'t>> {
    let kind = match node.kind() {
        "interface_declaration" => NodeKind::Interface,
        "enum_declaration" => NodeKind::Enum,
        _ => NodeKind::Class,
    };
    let sem = named_symbol(kind, node, source)?;
    let mut supers = Vec::new();
    if let Some(superclass) = node.child_by_field_name("superclass") {
        supers.extend(type_refs(superclass, source));
    }
    if let Some(interfaces) = node.child_by_field_name("interfaces") {
        supers.extend(type_refs(interfaces, source));
    }
    if let Some(extends) = find_child_by_kind(node, "extends_interfaces") {
        supers.extend(type_refs(extends, source));
    }
    let visit = node
        .child_by_field_name("body")
        .map(|b| vec![Visit::ChildrenOf(b)])
        .unwrap_or_default();
    Some(Built {
        node: with_superclasses(sem, supers),
        visit,
    })
}

/// Type names under `superclass`, `super_interfaces` and `type_list` wrappers.
fn type_refs(node: Node<'_>, source: &[u8]) -> Vec<NameRef> {
    let mut out = Vec::new();
    for child in named_children(node) {
        match child.kind() {
            "type_identifier" | "scoped_type_identifier" => out.extend(name_ref(child, source, &["."])),
            "generic_type" => {
                if let Some(base) = named_children(child).into_iter().next() {
                    out.extend(name_ref(base, source, &["."]));
                }
            }
            "type_list" => out.extend(type_refs(child, source)),
            _ => {}
        }
    }
    out
}

fn method<'t>(node: Node<'t>, source: &[u8]) -> Option<Built<'t>> {
    let sem = named_symbol(NodeKind::Method, node, source)?;
    Some(Built::descending(sem, node))
}

/// `import a.b.C;` binds `C` from `a/b/C.java`; `import a.b.*;` binds the package.
fn import<'t>(node: Node<'t>, source: &[u8]) -> Option<Built<'t>> {
    let path = named_children(node)
        .into_iter()
        .find(|c| matches!(c.kind(), "scoped_identifier" | "identifier"))?;
    let is_static = find_child_by_kind(node, "static").is_some();
    let wildcard = find_child_by_kind(node, "asterisk").is_some();
    let mut data = ImportData {
        module: text(path, source).to_string(),
        module_span: span(path),
        wildcard,
        ..ImportData::default()
    };
    // `import static a.b.C.member;` names a member of the class file.
    if is_static && !wildcard && path.kind() == "scoped_identifier" {
        let scope = path.child_by_field_name("scope")?;
        let name = path.child_by_field_name("name")?;
        data.module = text(scope, source).to_string();
        data.module_span = span(scope);
        data.names.push(ImportedName {
            name: text(name, source).to_string(),
            alias: None,
            span: span(name),
        });
    }
    Some(Built::leaf(import_node(node, data)))
}

fn invocation<'t>(node: Node<'t>, source: &[u8]) -> Option<Built<'t>> {
    let name = node.child_by_field_name("name")?;
    let qualifier = node
        .child_by_field_name("object")
        .and_then(|o| simple_qualifier(o, source));
    Some(Built::descending(call(node, name, qualifier, source), node))
}

fn object_creation<'t>(node: Node<'t>, source: &[u8]) -> Option<Built<'t>> {
    let mut ty = node.child_by_field_name("type")?;
    if ty.kind() == "generic_type" {
        ty = named_children(ty).into_iter().next()?;
    }
    let reference = name_ref(ty, source, &["."])?;
    let name_node = match ty.kind() {
        "scoped_type_identifier" => named_children(ty).into_iter().last()?,
        _ => ty,
    };
    Some(Built::descending(
        call(node, name_node, reference.qualifier.as_deref(), source),
        node,
    ))
}

/// Source roots searched for package paths, in order.
const SOURCE_ROOTS: &[&str] = &["", "src/main/java", "src/test/java", "src"];

pub struct JavaConventions;

impl ModuleConventions for JavaConventions {
    fn module_candidates(&self, _importer: &Path, module: &str) -> Vec<PathBuf> {
        let relative: PathBuf = module.split('.').filter(|s| !s.is_empty()).collect();
        let mut out = Vec::new();
        for root in SOURCE_ROOTS {
            let base = Path::new(root).join(&relative);
            out.push(base.with_extension("java"));
        }
        for root in SOURCE_ROOTS {
            out.push(Path::new(root).join(&relative));
        }
        out
    }

    fn is_relative(&self, _module: &str) -> bool {
        false
    }

    fn separator(&self) -> &'static str {
        "."
    }

    fn submodule(&self, module: &str, name: &str) -> Option<String> {
        Some(format!("{module}.{name}"))
    }

    fn default_binding(&self, module: &str) -> Option<String> {
        module.rsplit('.').next().map(str::to_string)
    }

    fn render_import(&self, _importer: &Path, target: &Path, name: &str) -> Option<String> {
        let stem = target.file_stem()?.to_str()?;
        let dir = target.parent().unwrap_or(Path::new(""));
        let package_dir = SOURCE_ROOTS
            .iter()
            .filter(|root| !root.is_empty())
            .find_map(|root| dir.strip_prefix(root).ok())
            .unwrap_or(dir);
        let mut parts: Vec<String> = package_dir
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        parts.push(stem.to_string());
        let class = parts.join(".");
        if name == stem {
            Some(format!("import {class};\n"))
        } else {
            Some(format!("import static {class}.{name};\n"))
        }
    }
}
