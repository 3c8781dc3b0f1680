//! Unit tests for graft-core

use std::path::{Path, PathBuf};

use crate::test_utils::*;
use crate::*;

const SOURCE: &str = "def foo():\n    bar()\n\ndef bar():\n    pass\n";

fn sample_content(text: &str, shift: usize, with_bar: bool) -> ParsedContent {
    let mut root = root(text.len());
    let mut foo = function("foo", shift, shift + 20);
    foo.children.push(call("bar", shift + 15));
    root.children.push(foo);
    if with_bar {
        root.children.push(function("bar", shift + 22, shift + 41));
    }
    ParsedContent {
        text: text.to_string(),
        tree: None,
        root,
        syntax_errors: Vec::new(),
    }
}

fn graph_with_sample() -> (CodeGraph, FileId) {
    let mut graph = CodeGraph::new();
    let file = graph.insert_file(PathBuf::from("a.py"), Language::Python);
    graph
        .replace_contents(file, sample_content(SOURCE, 0, true), &OffsetMap::identity())
        .unwrap();
    (graph, file)
}

#[test]
fn test_span_overlap_rules() {
    let a = Span::new(0, 5);
    let b = Span::new(5, 10);
    assert!(!a.overlaps(&b), "adjacent spans do not overlap");
    assert!(Span::new(0, 10).overlaps(&Span::new(5, 8)));
    assert!(Span::new(0, 10).overlaps(&Span::empty(5)), "insert inside a replaced range conflicts");
    assert!(!Span::new(0, 10).overlaps(&Span::empty(10)));
}

#[test]
fn test_extended_span_merges_fragments() {
    let ext = ExtendedSpan::from_fragments([Span::new(20, 40), Span::new(0, 10), Span::new(8, 12)]);
    assert_eq!(ext.fragments(), &[Span::new(0, 12), Span::new(20, 40)]);
    assert_eq!(ext.bounds(), Span::new(0, 40));
}

#[test]
fn test_language_detection() {
    assert_eq!(Language::from_path(Path::new("a/b.py")), Language::Python);
    assert_eq!(Language::from_path(Path::new("x.tsx")), Language::Tsx);
    assert_eq!(Language::from_path(Path::new("x.mjs")), Language::JavaScript);
    assert_eq!(Language::from_path(Path::new("lib.rs")), Language::Rust);
    assert_eq!(Language::from_path(Path::new("Main.java")), Language::Java);
    assert_eq!(Language::from_path(Path::new("README.md")), Language::Other);
}

#[test]
fn test_node_kind_capabilities() {
    assert!(NodeKind::Method.is_symbol());
    assert!(NodeKind::Method.is_statement());
    assert!(NodeKind::Import.is_import());
    assert!(NodeKind::IntersectionType.is_expression());
    assert!(!NodeKind::IntersectionType.is_symbol());
    assert!(!NodeKind::Unknown.is_statement());
}

#[test]
fn test_install_assigns_qualified_names_and_preorder() {
    let (graph, file) = graph_with_sample();

    let ids: Vec<NodeId> = graph.nodes_in_file(file).collect();
    assert_eq!(ids.len(), 4);
    assert_eq!(ids[0], NodeId::root(file));

    let foo = graph.find_symbol("a.py::foo").unwrap();
    let bar = graph.find_symbol("a.py::bar").unwrap();
    assert_eq!(graph.node(foo).unwrap().name.as_deref(), Some("foo"));
    assert_eq!(graph.parent(foo), Some(NodeId::root(file)));
    assert_eq!(graph.children(NodeId::root(file)).collect::<Vec<_>>(), vec![foo, bar]);

    // Restartable: a second pass yields the same sequence.
    assert_eq!(graph.nodes_in_file(file).collect::<Vec<_>>(), ids);
}

#[test]
fn test_every_span_is_contained_in_its_parent() {
    let (graph, file) = graph_with_sample();
    for id in graph.nodes_in_file(file) {
        if let Some(parent) = graph.parent(id) {
            let child_span = graph.node(id).unwrap().span;
            let parent_span = graph.node(parent).unwrap().span;
            assert!(parent_span.contains(&child_span), "{id} escapes {parent}");
        }
    }
}

#[test]
fn test_nested_symbols_are_qualified_by_owner() {
    let mut graph = CodeGraph::new();
    let file = graph.insert_file(PathBuf::from("pkg/m.py"), Language::Python);
    let text = "class A:\n    def m(self): pass\n";
    let mut method = function("m", 13, 30);
    method.kind = NodeKind::Method;
    let mut r = root(text.len());
    r.children.push(class("A", 0, 30, vec![method]));
    graph
        .replace_contents(
            file,
            ParsedContent {
                text: text.into(),
                tree: None,
                root: r,
                syntax_errors: vec![],
            },
            &OffsetMap::identity(),
        )
        .unwrap();

    let a = graph.find_symbol("pkg/m.py::A").unwrap();
    let m = graph.find_symbol("pkg/m.py::A::m").unwrap();
    assert_eq!(graph.member_named(a, "m"), Some(m));
    assert_eq!(graph.symbol_in_file(file, "A"), Some(a));
}

#[test]
fn test_reindex_keeps_ids_through_offset_map() {
    let (mut graph, file) = graph_with_sample();
    let foo = graph.find_symbol("a.py::foo").unwrap();
    let bar = graph.find_symbol("a.py::bar").unwrap();

    let text = format!("x = 1\n{SOURCE}");
    let map = OffsetMap::from_edits([(Span::empty(0), 6)]);
    let diff = graph
        .replace_contents(file, sample_content(&text, 6, true), &map)
        .unwrap();

    assert!(diff.is_empty());
    assert_eq!(graph.find_symbol("a.py::foo"), Some(foo));
    assert_eq!(graph.find_symbol("a.py::bar"), Some(bar));
    assert_eq!(graph.node(bar).unwrap().span, Span::new(28, 47));
    assert_eq!(graph.file(file).unwrap().revision, 2);
}

#[test]
fn test_removed_node_edges_become_unresolved() {
    let (mut graph, file) = graph_with_sample();
    let bar = graph.find_symbol("a.py::bar").unwrap();
    let call_id = graph.nodes_in_file(file).nth(2).unwrap();
    let edge = graph.add_edge(EdgeKind::Reference, call_id, EdgeTarget::Node(bar), "bar");

    let diff = graph
        .replace_contents(file, sample_content(SOURCE, 0, false), &OffsetMap::identity())
        .unwrap();

    assert_eq!(diff.removed_nodes, vec![bar]);
    assert_eq!(diff.retargeted_edges, vec![edge]);
    let edge = graph.edge(edge).unwrap();
    assert_eq!(edge.target, EdgeTarget::Unresolved);
    assert_eq!(edge.name, "bar");
    assert!(graph.integrity_violations().is_empty());
}

#[test]
fn test_checkpoint_restore_is_exact() {
    let (mut graph, file) = graph_with_sample();
    let bar = graph.find_symbol("a.py::bar").unwrap();
    let call_id = graph.nodes_in_file(file).nth(2).unwrap();
    let edge = graph.add_edge(EdgeKind::Reference, call_id, EdgeTarget::Node(bar), "bar");
    let nodes_before: Vec<NodeId> = graph.nodes_in_file(file).collect();

    graph.begin_checkpoint();
    graph
        .replace_contents(file, sample_content(SOURCE, 0, false), &OffsetMap::identity())
        .unwrap();
    let other = graph.insert_file(PathBuf::from("b.py"), Language::Python);
    let checkpoint = graph.take_checkpoint().unwrap();
    assert_eq!(checkpoint.touched_files().collect::<Vec<_>>(), vec![file, other]);

    graph.restore(checkpoint);

    assert_eq!(graph.nodes_in_file(file).collect::<Vec<_>>(), nodes_before);
    assert_eq!(graph.edge(edge).unwrap().target, EdgeTarget::Node(bar));
    assert_eq!(graph.edges_to(bar).count(), 1);
    assert!(graph.file_id(Path::new("b.py")).is_none());
    assert_eq!(graph.file(file).unwrap().text, SOURCE);
    // Rollback is a change: the revision keeps increasing.
    assert_eq!(graph.file(file).unwrap().revision, 3);
}

#[test]
fn test_restore_unresolves_edges_into_nodes_removed_after_checkpoint() {
    let (mut graph, file) = graph_with_sample();
    let bar = graph.find_symbol("a.py::bar").unwrap();
    let call_id = graph.nodes_in_file(file).nth(2).unwrap();
    let edge = graph.add_edge(EdgeKind::Reference, call_id, EdgeTarget::Node(bar), "bar");

    graph.begin_checkpoint();
    graph.clear_resolution(file);
    let checkpoint = graph.take_checkpoint().unwrap();

    // Re-indexed outside the checkpoint: `bar` is gone.
    graph
        .replace_contents(file, sample_content(SOURCE, 0, false), &OffsetMap::identity())
        .unwrap();
    let demoted = graph.restore(checkpoint);

    assert_eq!(demoted.into_iter().collect::<Vec<_>>(), vec![file]);
    assert_eq!(graph.edge(edge).unwrap().target, EdgeTarget::Unresolved);
    assert!(graph.integrity_violations().is_empty());
}

#[test]
fn test_restore_drops_edges_whose_source_is_gone() {
    let (mut graph, file) = graph_with_sample();
    let bar = graph.find_symbol("a.py::bar").unwrap();
    let call_id = graph.nodes_in_file(file).nth(2).unwrap();
    let edge = graph.add_edge(EdgeKind::Reference, call_id, EdgeTarget::Node(bar), "bar");

    graph.begin_checkpoint();
    graph.clear_resolution(file);
    let checkpoint = graph.take_checkpoint().unwrap();

    let empty = ParsedContent {
        text: SOURCE.to_string(),
        tree: None,
        root: root(SOURCE.len()),
        syntax_errors: Vec::new(),
    };
    graph.replace_contents(file, empty, &OffsetMap::identity()).unwrap();
    graph.restore(checkpoint);

    assert!(graph.edge(edge).is_none());
    assert_eq!(graph.edge_count(), 0);
    assert!(graph.integrity_violations().is_empty());
}

#[test]
fn test_restore_single_file_keeps_rest_of_journal() {
    let (mut graph, file) = graph_with_sample();
    let nodes_before: Vec<NodeId> = graph.nodes_in_file(file).collect();

    graph.begin_checkpoint();
    graph
        .replace_contents(file, sample_content(SOURCE, 0, false), &OffsetMap::identity())
        .unwrap();
    let other = graph.insert_file(PathBuf::from("b.py"), Language::Python);

    assert!(graph.restore_file(file));
    assert!(graph.is_journaling());
    assert_eq!(graph.nodes_in_file(file).collect::<Vec<_>>(), nodes_before);
    assert!(!graph.restore_file(file));

    let checkpoint = graph.take_checkpoint().unwrap();
    assert_eq!(checkpoint.touched_files().collect::<Vec<_>>(), vec![other]);
}

#[test]
fn test_remove_file_retargets_cross_file_edges() {
    let (mut graph, file) = graph_with_sample();
    let bar = graph.find_symbol("a.py::bar").unwrap();
    let other = graph.insert_file(PathBuf::from("b.py"), Language::Python);
    graph
        .replace_contents(
            other,
            ParsedContent {
                text: "bar()\n".into(),
                tree: None,
                root: {
                    let mut r = root(6);
                    r.children.push(call("bar", 0));
                    r
                },
                syntax_errors: vec![],
            },
            &OffsetMap::identity(),
        )
        .unwrap();
    let caller = graph.nodes_in_file(other).nth(1).unwrap();
    let edge = graph.add_edge(EdgeKind::Reference, caller, EdgeTarget::Node(bar), "bar");
    assert_eq!(graph.dependents_of(file).into_iter().collect::<Vec<_>>(), vec![other]);

    graph.remove_file(file).unwrap();

    assert!(graph.find_symbol("a.py::bar").is_none());
    assert!(graph.node(bar).is_none());
    assert_eq!(graph.edge(edge).unwrap().target, EdgeTarget::Unresolved);
    assert!(graph.integrity_violations().is_empty());
}

#[test]
fn test_rename_file_rewrites_qualified_names() {
    let (mut graph, file) = graph_with_sample();
    let foo = graph.find_symbol("a.py::foo").unwrap();

    graph.rename_file(file, PathBuf::from("lib/z.py")).unwrap();

    assert_eq!(graph.find_symbol("lib/z.py::foo"), Some(foo));
    assert!(graph.find_symbol("a.py::foo").is_none());
    assert_eq!(graph.file_id(Path::new("lib/z.py")), Some(file));
}

#[test]
fn test_dangling_edge_is_an_integrity_violation() {
    let (mut graph, file) = graph_with_sample();
    let ghost = NodeId::new(file, 999);
    graph.add_edge(EdgeKind::Reference, NodeId::root(file), EdgeTarget::Node(ghost), "ghost");

    let problems = graph.integrity_violations();
    assert_eq!(problems.len(), 1);
    assert!(problems[0].contains("missing target"));
}

#[test]
fn test_repo_structure_helper() {
    let dir = create_repo_with_structure(&[("pkg/a.py", "import b\n"), ("b.py", "")]);
    let files = LocalFs.list(dir.path()).unwrap();
    assert_eq!(files.len(), 2);
}
