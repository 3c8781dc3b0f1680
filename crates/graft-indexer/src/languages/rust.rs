//! Rust dispatch table and module conventions

use std::path::{Component, Path, PathBuf};

use graft_core::node::display_path;
use graft_core::{ImportData, ImportedName, Language, NodeKind};
use tree_sitter::Node;

use super::helpers::*;
use super::{Built, DispatchTable, LanguageGrammar, ModuleConventions};

pub fn grammar() -> LanguageGrammar {
    LanguageGrammar {
        language: Language::Rust,
        ts_language: tree_sitter_rust::LANGUAGE.into(),
        table: table(),
        conventions: Box::new(RustConventions),
    }
}

pub fn table() -> DispatchTable {
    DispatchTable::new()
        .on("function_item", function)
        .on("function_signature_item", function)
        .on("struct_item", item)
        .on("enum_item", item)
        .on("union_item", item)
        .on("trait_item", item)
        .on("type_item", item)
        .on("const_item", item)
        .on("static_item", item)
        .on("mod_item", item)
        .on("use_declaration", use_declaration)
        .on("call_expression", call_expr)
        .with_leading(attribute_or_doc)
}

/// `#[attr]` items and `///` doc comments directly above an item.
fn attribute_or_doc(node: Node<'_>, source: &[u8]) -> bool {
    match node.kind() {
        "attribute_item" => true,
        "line_comment" => {
            let t = text(node, source);
            t.starts_with("///") && !t.starts_with("////")
        }
        "block_comment" => text(node, source).starts_with("/**"),
        _ => false,
    }
}

fn function<'t>(node: Node<'t>, source: &[u8]) -> Option<Built<'t>> {
    let kind = if is_member_of(node, &[], &["declaration_list"], &["impl_item", "trait_item"]) {
        NodeKind::Method
    } else {
        NodeKind::Function
    };
    let sem = named_symbol(kind, node, source)?;
    Some(Built::descending(sem, node))
}

fn item<'t>(node: Node<'t>, source: &[u8]) -> Option<Built<'t>> {
    let kind = match node.kind() {
        "struct_item" | "union_item" => NodeKind::Struct,
        "enum_item" => NodeKind::Enum,
        "trait_item" => NodeKind::Trait,
        "type_item" => NodeKind::TypeAlias,
        "const_item" | "static_item" => NodeKind::Constant,
        "mod_item" => NodeKind::Module,
        _ => return None,
    };
    let sem = named_symbol(kind, node, source)?;
    Some(Built::descending(sem, node))
}

fn use_declaration<'t>(node: Node<'t>, source: &[u8]) -> Option<Built<'t>> {
    let argument = node.child_by_field_name("argument")?;
    let mut data = ImportData::default();
    match argument.kind() {
        "scoped_identifier" => {
            let path = argument.child_by_field_name("path")?;
            let name = argument.child_by_field_name("name")?;
            set_module(&mut data, path, source);
            data.names.push(imported_name(name, None, source));
        }
        "use_as_clause" => {
            let path = argument.child_by_field_name("path")?;
            let alias = argument.child_by_field_name("alias");
            match path.kind() {
                "scoped_identifier" => {
                    let prefix = path.child_by_field_name("path")?;
                    let name = path.child_by_field_name("name")?;
                    set_module(&mut data, prefix, source);
                    data.names.push(imported_name(name, alias, source));
                }
                _ => {
                    set_module(&mut data, path, source);
                    data.alias = alias.map(|a| text(a, source).to_string());
                }
            }
        }
        "scoped_use_list" => {
            let path = argument.child_by_field_name("path")?;
            set_module(&mut data, path, source);
            if let Some(list) = argument.child_by_field_name("list") {
                data.names = use_list(list, source);
            }
        }
        "use_wildcard" => {
            let path = named_children(argument).into_iter().next()?;
            set_module(&mut data, path, source);
            data.wildcard = true;
        }
        "identifier" | "crate" | "self" | "super" => set_module(&mut data, argument, source),
        _ => return None,
    }
    Some(Built::leaf(import_node(node, data)))
}

fn set_module(data: &mut ImportData, path: Node<'_>, source: &[u8]) {
    data.module = text(path, source).to_string();
    data.module_span = span(path);
}

fn use_list(list: Node<'_>, source: &[u8]) -> Vec<ImportedName> {
    named_children(list)
        .into_iter()
        .filter_map(|entry| match entry.kind() {
            "identifier" => Some(imported_name(entry, None, source)),
            "use_as_clause" => {
                let path = entry.child_by_field_name("path")?;
                let name = match path.kind() {
                    "scoped_identifier" => path.child_by_field_name("name")?,
                    _ => path,
                };
                Some(imported_name(name, entry.child_by_field_name("alias"), source))
            }
            "scoped_identifier" => {
                let name = entry.child_by_field_name("name")?;
                Some(imported_name(name, None, source))
            }
            _ => None,
        })
        .collect()
}

fn call_expr<'t>(node: Node<'t>, source: &[u8]) -> Option<Built<'t>> {
    let mut callee = node.child_by_field_name("function")?;
    if callee.kind() == "generic_function" {
        callee = callee.child_by_field_name("function")?;
    }
    let sem = match callee.kind() {
        "identifier" => call(node, callee, None, source),
        "scoped_identifier" => {
            let name = callee.child_by_field_name("name")?;
            let qualifier = callee.child_by_field_name("path").map(|p| text(p, source));
            call(node, name, qualifier, source)
        }
        "field_expression" => {
            let field = callee.child_by_field_name("field")?;
            let qualifier = callee
                .child_by_field_name("value")
                .and_then(|v| simple_qualifier(v, source));
            call(node, field, qualifier, source)
        }
        _ => return None,
    };
    Some(Built::descending(sem, node))
}

pub struct RustConventions;

impl RustConventions {
    /// Directory holding the crate root (`src/`), found by walking up from the importer.
    fn crate_src(importer: &Path) -> PathBuf {
        let components: Vec<Component> = importer.components().collect();
        match components.iter().rposition(|c| c.as_os_str() == "src") {
            Some(pos) => components[..=pos].iter().collect(),
            None => importer.parent().map(Path::to_path_buf).unwrap_or_default(),
        }
    }

    /// Directory whose files are this file's child modules.
    fn module_dir(importer: &Path) -> PathBuf {
        let parent = importer.parent().map(Path::to_path_buf).unwrap_or_default();
        match importer.file_stem().and_then(|s| s.to_str()) {
            Some("lib" | "main" | "mod") | None => parent,
            Some(stem) => parent.join(stem),
        }
    }

    fn file_candidates(base: &Path, crate_root: bool) -> Vec<PathBuf> {
        if crate_root {
            return vec![base.join("lib.rs"), base.join("main.rs")];
        }
        vec![PathBuf::from(format!("{}.rs", display_path(base))), base.join("mod.rs")]
    }
}

impl ModuleConventions for RustConventions {
    fn module_candidates(&self, importer: &Path, module: &str) -> Vec<PathBuf> {
        let segments: Vec<&str> = module.split("::").filter(|s| !s.is_empty()).collect();
        let crate_src = Self::crate_src(importer);
        let (mut base, rest) = match segments.first() {
            Some(&"crate") => (crate_src.clone(), &segments[1..]),
            Some(&"self") => (Self::module_dir(importer), &segments[1..]),
            Some(&"super") => {
                let mut base = Self::module_dir(importer);
                let supers = segments.iter().take_while(|s| **s == "super").count();
                for _ in 0..supers {
                    base.pop();
                }
                (base, &segments[supers..])
            }
            _ => (crate_src.clone(), &segments[..]),
        };
        if rest.is_empty() {
            if base == crate_src {
                return Self::file_candidates(&base, true);
            }
            if module.starts_with("self") {
                return vec![importer.to_path_buf()];
            }
            return Self::file_candidates(&base, false);
        }
        for segment in rest {
            base.push(segment);
        }
        Self::file_candidates(&base, false)
    }

    fn is_relative(&self, module: &str) -> bool {
        module == "crate"
            || module == "self"
            || module == "super"
            || module.starts_with("crate::")
            || module.starts_with("self::")
            || module.starts_with("super::")
    }

    fn separator(&self) -> &'static str {
        "::"
    }

    fn submodule(&self, module: &str, name: &str) -> Option<String> {
        Some(format!("{module}::{name}"))
    }

    fn default_binding(&self, module: &str) -> Option<String> {
        module.rsplit("::").next().map(str::to_string)
    }

    fn render_import(&self, importer: &Path, target: &Path, name: &str) -> Option<String> {
        let crate_src = Self::crate_src(importer);
        let relative = target.strip_prefix(&crate_src).ok()?;
        let mut segments: Vec<String> = relative
            .with_extension("")
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        if segments.last().is_some_and(|s| matches!(s.as_str(), "mod" | "lib" | "main")) {
            segments.pop();
        }
        let mut path = String::from("crate");
        for segment in segments {
            path.push_str("::");
            path.push_str(&segment);
        }
        Some(format!("use {path}::{name};\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crate_paths() {
        let c = RustConventions;
        assert_eq!(
            c.module_candidates(Path::new("src/main.rs"), "crate::utils::helper"),
            vec![PathBuf::from("src/utils/helper.rs"), PathBuf::from("src/utils/helper/mod.rs")]
        );
        assert_eq!(
            c.module_candidates(Path::new("src/a/b.rs"), "super::c"),
            vec![PathBuf::from("src/a/c.rs"), PathBuf::from("src/a/c/mod.rs")]
        );
        assert!(c.looks_external("serde::Serialize"));
        assert!(!c.looks_external("crate::x"));
    }

    #[test]
    fn test_render_import() {
        let c = RustConventions;
        assert_eq!(
            c.render_import(Path::new("src/main.rs"), Path::new("src/util/mod.rs"), "helper").as_deref(),
            Some("use crate::util::helper;\n")
        );
    }
}
