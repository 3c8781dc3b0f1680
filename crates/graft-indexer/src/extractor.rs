//! Raw tree to semantic tree conversion.
//!
//! The walker looks every named raw node up in the language's dispatch table.
//! A hit builds a [`SemanticNode`] and continues into the raw subtrees the
//! constructor asked for; a miss (or a constructor declining) descends through
//! the raw node, so semantic children attach to the nearest semantic ancestor.

use graft_core::{NodeKind, SemanticNode, Span};
use tree_sitter::{Node, Tree};

use crate::languages::helpers::{directly_above, span};
use crate::languages::{DispatchTable, Visit};

/// Semantic tree of one file plus its syntax-error spans.
#[derive(Debug)]
pub struct Extraction {
    pub root: SemanticNode,
    pub syntax_errors: Vec<Span>,
}

/// Walk a whole parse tree. The root is a `File` node spanning the full text.
pub fn extract(tree: &Tree, source: &[u8], table: &DispatchTable) -> Extraction {
    let raw_root = tree.root_node();
    let mut root = SemanticNode::new(NodeKind::File, Span::new(0, source.len()));
    let walker = Walker { source, table };
    walker.walk_children(raw_root, &mut root.children);
    walker.contain(&mut root);

    let syntax_errors = if raw_root.has_error() {
        syntax_errors(raw_root)
    } else {
        Vec::new()
    };
    Extraction { root, syntax_errors }
}

/// Semantic node for a single raw node, `Unknown` when the table has no entry for it.
pub fn convert_node(raw: Node<'_>, source: &[u8], table: &DispatchTable) -> SemanticNode {
    let walker = Walker { source, table };
    if let Some(mut node) = walker.build(raw) {
        walker.contain(&mut node);
        return node;
    }
    let mut node = SemanticNode::unknown(span(raw));
    walker.walk_children(raw, &mut node.children);
    walker.contain(&mut node);
    node
}

/// `ERROR` node spans and zero-width spans where the parser inserted missing tokens.
pub fn syntax_errors(root: Node<'_>) -> Vec<Span> {
    let mut out = Vec::new();
    let mut cursor = root.walk();
    loop {
        let node = cursor.node();
        let descend = if node.is_error() {
            out.push(span(node));
            false
        } else if node.is_missing() {
            out.push(Span::empty(node.start_byte()));
            false
        } else {
            node.has_error()
        };
        if descend && cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return out;
            }
        }
    }
}

struct Walker<'a> {
    source: &'a [u8],
    table: &'a DispatchTable,
}

impl Walker<'_> {
    fn walk_children(&self, raw: Node<'_>, out: &mut Vec<SemanticNode>) {
        let mut cursor = raw.walk();
        for child in raw.named_children(&mut cursor) {
            self.walk(child, out);
        }
    }

    fn walk(&self, raw: Node<'_>, out: &mut Vec<SemanticNode>) {
        if raw.is_missing() || (raw.is_extra() && raw.child_count() == 0) {
            return;
        }
        match self.build(raw) {
            Some(node) => out.push(node),
            None => self.walk_children(raw, out),
        }
    }

    fn build(&self, raw: Node<'_>) -> Option<SemanticNode> {
        let constructor = self.table.get(raw.kind())?;
        let built = constructor(raw, self.source)?;
        let mut node = built.node;
        for visit in built.visit {
            match visit {
                Visit::Node(child) => self.walk(child, &mut node.children),
                Visit::ChildrenOf(child) => self.walk_children(child, &mut node.children),
            }
        }
        self.attach_leading(raw, &mut node);
        Some(node)
    }

    /// Attributes and doc comments directly above a definition join its extended span.
    fn attach_leading(&self, raw: Node<'_>, node: &mut SemanticNode) {
        let Some(is_leading) = self.table.leading() else {
            return;
        };
        if !node.kind.is_symbol() {
            return;
        }
        let mut top = node.extended.bounds().start;
        let mut previous = raw.prev_sibling();
        while let Some(sibling) = previous {
            if !sibling.is_named() && sibling.utf8_text(self.source).is_ok_and(|t| t.trim().is_empty()) {
                previous = sibling.prev_sibling();
                continue;
            }
            if !is_leading(sibling, self.source) || !directly_above(self.source, sibling.end_byte(), top) {
                break;
            }
            node.extended = std::mem::take(&mut node.extended).with_fragment(span(sibling));
            top = sibling.start_byte();
            previous = sibling.prev_sibling();
        }
    }

    /// Children must lie inside their parent and in source order.
    fn contain(&self, node: &mut SemanticNode) {
        let parent = node.span;
        let before = node.children.len();
        node.children.retain(|child| parent.contains(&child.span));
        if node.children.len() != before {
            tracing::debug!(
                "Dropped {} child node(s) escaping {:?} {}",
                before - node.children.len(),
                node.kind,
                parent
            );
        }
        node.children.sort_by_key(|child| (child.span.start, std::cmp::Reverse(child.span.end)));
        for child in &mut node.children {
            self.contain(child);
        }
    }
}
