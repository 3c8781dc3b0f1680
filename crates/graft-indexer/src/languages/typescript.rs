//! TypeScript and TSX dispatch tables

use graft_core::{Language, NodeKind, SemanticNode};
use tree_sitter::Node;

use super::helpers::*;
use super::javascript::{self, EcmaConventions};
use super::{Built, DispatchTable, LanguageGrammar};

pub fn grammar() -> LanguageGrammar {
    LanguageGrammar {
        language: Language::TypeScript,
        ts_language: tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
        table: table(),
        conventions: Box::new(EcmaConventions { typescript: true }),
    }
}

pub fn tsx_grammar() -> LanguageGrammar {
    LanguageGrammar {
        language: Language::Tsx,
        ts_language: tree_sitter_typescript::LANGUAGE_TSX.into(),
        table: table(),
        conventions: Box::new(EcmaConventions { typescript: true }),
    }
}

pub fn table() -> DispatchTable {
    javascript::table()
        .on("abstract_class_declaration", declaration)
        .on("interface_declaration", declaration)
        .on("type_alias_declaration", declaration)
        .on("enum_declaration", declaration)
        .on("abstract_method_signature", declaration)
        .on("union_type", union_type)
        .on("intersection_type", intersection_type)
}

/// TypeScript-only declarations.
pub(crate) fn declaration<'t>(node: Node<'t>, source: &[u8]) -> Option<Built<'t>> {
    let kind = match node.kind() {
        "abstract_class_declaration" => return javascript::class(node, source),
        "interface_declaration" => NodeKind::Interface,
        "type_alias_declaration" => NodeKind::TypeAlias,
        "enum_declaration" => NodeKind::Enum,
        "abstract_method_signature" => NodeKind::Method,
        _ => return None,
    };
    let sem = named_symbol(kind, node, source)?;
    let sem = match node.kind() {
        "interface_declaration" => {
            let supers = find_child_by_kind(node, "extends_type_clause")
                .map(|clause| {
                    named_children(clause)
                        .into_iter()
                        .filter_map(|t| match t.kind() {
                            "generic_type" => t.child_by_field_name("name"),
                            _ => Some(t),
                        })
                        .filter_map(|t| name_ref(t, source, &["."]))
                        .collect()
                })
                .unwrap_or_default();
            with_superclasses(sem, supers)
        }
        _ => sem,
    };
    Some(Built::descending(sem, node))
}

fn union_type<'t>(node: Node<'t>, _source: &[u8]) -> Option<Built<'t>> {
    Some(Built::descending(SemanticNode::new(NodeKind::UnionType, span(node)), node))
}

/// `A & B` is its own kind, distinct from unions.
fn intersection_type<'t>(node: Node<'t>, _source: &[u8]) -> Option<Built<'t>> {
    Some(Built::descending(
        SemanticNode::new(NodeKind::IntersectionType, span(node)),
        node,
    ))
}

/// Older behaviour that folded intersections into unions. Not registered in any table.
#[deprecated(note = "intersection types map to NodeKind::IntersectionType")]
pub fn intersection_as_union<'t>(node: Node<'t>, source: &[u8]) -> Option<Built<'t>> {
    union_type(node, source)
}
