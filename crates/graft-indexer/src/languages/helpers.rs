//! Small tree-sitter helpers shared by the language tables

use graft_core::{
    ImportData, ImportedName, NameRef, NodeKind, NodePayload, ReferenceData, SemanticNode, Span, SymbolData,
};
use tree_sitter::Node;

pub fn span(node: Node<'_>) -> Span {
    Span::new(node.start_byte(), node.end_byte())
}

pub fn text<'s>(node: Node<'_>, source: &'s [u8]) -> &'s str {
    node.utf8_text(source).unwrap_or("")
}

/// Text and span of a named field.
pub fn field<'s>(node: Node<'_>, name: &str, source: &'s [u8]) -> Option<(&'s str, Span)> {
    let child = node.child_by_field_name(name)?;
    Some((text(child, source), span(child)))
}

pub fn find_child_by_kind<'t>(node: Node<'t>, kind: &str) -> Option<Node<'t>> {
    let mut cursor = node.walk();
    node.children(&mut cursor).find(|c| c.kind() == kind)
}

pub fn named_children<'t>(node: Node<'t>) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor).collect()
}

pub fn children_by_field<'t>(node: Node<'t>, name: &str) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.children_by_field_name(name, &mut cursor).collect()
}

/// Strip one layer of matching quotes from a string literal.
pub fn unquote(literal: &str) -> &str {
    let trimmed = literal.trim();
    for quote in ['"', '\'', '`'] {
        if let Some(inner) = trimmed.strip_prefix(quote).and_then(|s| s.strip_suffix(quote)) {
            return inner;
        }
    }
    trimmed
}

/// True if `node`'s parent chain (skipping `skip` wrappers) reaches `container` through `body`.
pub fn is_member_of(node: Node<'_>, skip: &[&str], body: &[&str], container: &[&str]) -> bool {
    let mut parent = node.parent();
    while let Some(p) = parent {
        if skip.contains(&p.kind()) {
            parent = p.parent();
        } else {
            break;
        }
    }
    let Some(body_node) = parent.filter(|p| body.contains(&p.kind())) else {
        return false;
    };
    body_node
        .parent()
        .is_some_and(|owner| container.contains(&owner.kind()))
}

/// A named symbol node with an empty symbol payload.
pub fn symbol(kind: NodeKind, node: Node<'_>, name_node: Node<'_>, source: &[u8]) -> SemanticNode {
    SemanticNode::new(kind, span(node))
        .with_name(text(name_node, source), span(name_node))
        .with_payload(NodePayload::Symbol(SymbolData::default()))
}

/// Symbol built from the node's `name` field.
pub fn named_symbol(kind: NodeKind, node: Node<'_>, source: &[u8]) -> Option<SemanticNode> {
    let name = node.child_by_field_name("name")?;
    Some(symbol(kind, node, name, source))
}

pub fn with_superclasses(mut node: SemanticNode, supers: Vec<NameRef>) -> SemanticNode {
    if let NodePayload::Symbol(data) = &mut node.payload {
        data.superclasses = supers;
    }
    node
}

/// `Foo` or `pkg.Foo` as a [`NameRef`] pointing at the last segment.
pub fn name_ref(node: Node<'_>, source: &[u8], separators: &[&str]) -> Option<NameRef> {
    let full = text(node, source);
    if full.is_empty() {
        return None;
    }
    let mut split_at = None;
    for sep in separators {
        if let Some(pos) = full.rfind(sep) {
            let end = pos + sep.len();
            if split_at.is_none_or(|(_, e)| end > e) {
                split_at = Some((pos, end));
            }
        }
    }
    let start = node.start_byte();
    Some(match split_at {
        Some((pos, end)) => NameRef {
            name: full[end..].to_string(),
            qualifier: Some(full[..pos].to_string()),
            span: Span::new(start + end, node.end_byte()),
        },
        None => NameRef {
            name: full.to_string(),
            qualifier: None,
            span: span(node),
        },
    })
}

/// A call node referencing `name`, with the callee's identifier token as name span.
pub fn call(node: Node<'_>, name_node: Node<'_>, qualifier: Option<&str>, source: &[u8]) -> SemanticNode {
    let name = text(name_node, source);
    SemanticNode::new(NodeKind::Call, span(node))
        .with_name(name, span(name_node))
        .with_payload(NodePayload::Reference(ReferenceData {
            name: name.to_string(),
            qualifier: qualifier.filter(|q| !q.is_empty()).map(str::to_string),
        }))
}

/// Qualifier text for a member access object, when it is a plain (possibly dotted) name.
pub fn simple_qualifier<'s>(object: Node<'_>, source: &'s [u8]) -> Option<&'s str> {
    let t = text(object, source);
    let simple = !t.is_empty()
        && t.chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '.' || c == ':' || c == '$');
    simple.then_some(t)
}

pub fn import_node(node: Node<'_>, data: ImportData) -> SemanticNode {
    SemanticNode::new(NodeKind::Import, span(node)).with_payload(NodePayload::Import(data))
}

pub fn imported_name(name_node: Node<'_>, alias: Option<Node<'_>>, source: &[u8]) -> ImportedName {
    ImportedName {
        name: text(name_node, source).to_string(),
        alias: alias.map(|a| text(a, source).to_string()),
        span: span(name_node),
    }
}

/// Text between two offsets is blank and holds at most one line break.
pub fn directly_above(source: &[u8], end: usize, start: usize) -> bool {
    let Some(gap) = source.get(end..start) else {
        return false;
    };
    gap.iter().all(|b| b.is_ascii_whitespace()) && gap.iter().filter(|b| **b == b'\n').count() <= 1
}
