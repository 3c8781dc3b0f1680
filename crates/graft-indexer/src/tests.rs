//! Unit tests for graft-indexer

use std::path::{Path, PathBuf};

use graft_core::{
    GraftError, ImportData, IndexConfig, Language, MemoryFs, NodeKind, NodePayload, ScanControl, ScanProgress,
    SemanticNode,
};

use crate::adapter::GrammarAdapter;
use crate::coordinator::Coordinator;
use crate::discovery::discover;

fn parse(path: &str, source: &str) -> graft_core::ParsedContent {
    let adapter = GrammarAdapter::new();
    let path = Path::new(path);
    adapter
        .parse(path, Language::from_path(path), source.to_string(), None)
        .unwrap()
}

fn flatten(node: &SemanticNode) -> Vec<&SemanticNode> {
    let mut out = vec![node];
    for child in node.children() {
        out.extend(flatten(child));
    }
    out
}

fn named<'a>(root: &'a SemanticNode, kind: NodeKind, name: &str) -> &'a SemanticNode {
    flatten(root)
        .into_iter()
        .find(|n| n.kind == kind && n.name.as_deref() == Some(name))
        .unwrap_or_else(|| panic!("no {kind:?} named {name}"))
}

fn imports(root: &SemanticNode) -> Vec<&ImportData> {
    flatten(root)
        .into_iter()
        .filter_map(|n| match &n.payload {
            NodePayload::Import(data) => Some(data),
            _ => None,
        })
        .collect()
}

fn calls(node: &SemanticNode) -> Vec<(String, Option<String>)> {
    flatten(node)
        .into_iter()
        .filter_map(|n| match &n.payload {
            NodePayload::Reference(r) if n.kind == NodeKind::Call => Some((r.name.clone(), r.qualifier.clone())),
            _ => None,
        })
        .collect()
}

fn assert_contained(node: &SemanticNode) {
    for pair in node.children.windows(2) {
        assert!(!pair[0].span.overlaps(&pair[1].span), "siblings overlap: {:?}", pair);
    }
    for child in node.children() {
        assert!(node.span.contains(&child.span));
        assert_contained(child);
    }
}

const PYTHON: &str = "import os
from .util import helper as h

@decorator
def top():
    helper()

class Foo(Base):
    def method(self):
        self.top()
";

#[test]
fn test_python_extraction() {
    let parsed = parse("pkg/mod.py", PYTHON);
    let root = &parsed.root;
    assert_eq!(root.kind, NodeKind::File);
    assert_eq!(root.span.end, PYTHON.len());
    assert!(parsed.syntax_errors.is_empty());
    assert_contained(root);

    let top = named(root, NodeKind::Function, "top");
    assert!(top.extended.is_multi_fragment());
    assert_eq!(top.extended.bounds().start, PYTHON.find("@decorator").unwrap());
    assert_eq!(calls(top), vec![("helper".to_string(), None)]);

    let foo = named(root, NodeKind::Class, "Foo");
    match &foo.payload {
        NodePayload::Symbol(data) => assert_eq!(data.superclasses[0].name, "Base"),
        other => panic!("unexpected payload {other:?}"),
    }
    let method = named(foo, NodeKind::Method, "method");
    assert_eq!(calls(method), vec![("top".to_string(), Some("self".to_string()))]);

    let imports = imports(root);
    assert_eq!(imports.len(), 2);
    assert_eq!(imports[0].module, "os");
    assert_eq!(imports[1].module, ".util");
    assert_eq!(imports[1].names[0].name, "helper");
    assert_eq!(imports[1].names[0].local_name(), "h");
}

#[test]
fn test_syntax_errors_are_recorded_not_fatal() {
    let parsed = parse("broken.py", "def broken(:\n    pass\n\ndef fine():\n    pass\n");
    assert!(!parsed.syntax_errors.is_empty());
    assert!(parsed.tree.is_some());
}

const TYPESCRIPT: &str = "export interface Shape extends Base { area(): number }
type Both = A & B;
export class Circle implements Shape { area() { return compute(1); } }
import { compute } from './math';
";

#[test]
fn test_typescript_extraction() {
    let parsed = parse("src/shapes.ts", TYPESCRIPT);
    let root = &parsed.root;
    assert_contained(root);

    let shape = named(root, NodeKind::Interface, "Shape");
    assert_eq!(shape.extended.bounds().start, 0);
    assert!(shape.span.start > 0);

    let both = named(root, NodeKind::TypeAlias, "Both");
    assert!(flatten(both).iter().any(|n| n.kind == NodeKind::IntersectionType));
    assert!(!flatten(both).iter().any(|n| n.kind == NodeKind::UnionType));

    let circle = named(root, NodeKind::Class, "Circle");
    match &circle.payload {
        NodePayload::Symbol(data) => assert_eq!(data.superclasses[0].name, "Shape"),
        other => panic!("unexpected payload {other:?}"),
    }
    let area = named(circle, NodeKind::Method, "area");
    assert_eq!(calls(area), vec![("compute".to_string(), None)]);

    let imports = imports(root);
    assert_eq!(imports.len(), 1);
    assert_eq!(imports[0].module, "./math");
    assert_eq!(imports[0].names[0].name, "compute");
}

const RUST: &str = "use crate::util::helper;
use std::collections::{HashMap, HashSet as Set};

/// Docs.
#[derive(Debug)]
pub struct Point { x: i32 }

impl Point {
    pub fn norm(&self) -> i32 { helper(self.x) }
}

fn main() { Point::origin(); }
";

#[test]
fn test_rust_extraction() {
    let parsed = parse("src/main.rs", RUST);
    let root = &parsed.root;
    assert_contained(root);

    let point = named(root, NodeKind::Struct, "Point");
    assert_eq!(point.extended.bounds().start, RUST.find("/// Docs").unwrap());
    assert_eq!(point.span.start, RUST.find("pub struct").unwrap());

    let norm = named(root, NodeKind::Method, "norm");
    assert_eq!(calls(norm), vec![("helper".to_string(), None)]);
    let main = named(root, NodeKind::Function, "main");
    assert_eq!(calls(main), vec![("origin".to_string(), Some("Point".to_string()))]);

    let imports = imports(root);
    assert_eq!(imports.len(), 2);
    assert_eq!(imports[0].module, "crate::util");
    assert_eq!(imports[0].names[0].name, "helper");
    assert_eq!(imports[1].module, "std::collections");
    let names: Vec<&str> = imports[1].names.iter().map(|n| n.local_name()).collect();
    assert_eq!(names, vec!["HashMap", "Set"]);
}

const GO: &str = "package main

import (
\t\"fmt\"
\tstr \"strings\"
)

type Point struct{ X int }

// Len returns the length.
func (p Point) Len() int { return helper(p.X) }

func main() { fmt.Println(str.ToUpper(\"x\")) }
";

#[test]
fn test_go_extraction() {
    let parsed = parse("main.go", GO);
    let root = &parsed.root;
    assert_contained(root);

    named(root, NodeKind::Struct, "Point");
    let len = named(root, NodeKind::Method, "Len");
    assert_eq!(len.extended.bounds().start, GO.find("// Len").unwrap());
    let main = named(root, NodeKind::Function, "main");
    let mut main_calls = calls(main);
    main_calls.sort();
    assert_eq!(
        main_calls,
        vec![
            ("Println".to_string(), Some("fmt".to_string())),
            ("ToUpper".to_string(), Some("str".to_string())),
        ]
    );

    let imports = imports(root);
    assert_eq!(imports.len(), 2);
    assert_eq!(imports[0].module, "fmt");
    assert_eq!(imports[1].module, "strings");
    assert_eq!(imports[1].alias.as_deref(), Some("str"));
}

const JAVA: &str = "import com.acme.Util;
import java.util.*;

/** Docs. */
public class App extends Base implements Runnable {
    public void run() { Util.help(); new Thing(); }
}
";

#[test]
fn test_java_extraction() {
    let parsed = parse("src/main/java/App.java", JAVA);
    let root = &parsed.root;
    assert_contained(root);

    let app = named(root, NodeKind::Class, "App");
    assert_eq!(app.extended.bounds().start, JAVA.find("/** Docs").unwrap());
    match &app.payload {
        NodePayload::Symbol(data) => {
            let supers: Vec<&str> = data.superclasses.iter().map(|s| s.name.as_str()).collect();
            assert_eq!(supers, vec!["Base", "Runnable"]);
        }
        other => panic!("unexpected payload {other:?}"),
    }
    let run = named(app, NodeKind::Method, "run");
    assert_eq!(
        calls(run),
        vec![("help".to_string(), Some("Util".to_string())), ("Thing".to_string(), None)]
    );

    let imports = imports(root);
    assert_eq!(imports[0].module, "com.acme.Util");
    assert!(!imports[0].wildcard);
    assert_eq!(imports[1].module, "java.util");
    assert!(imports[1].wildcard);
}

#[test]
fn test_convert_falls_back_to_unknown() {
    let adapter = GrammarAdapter::new();
    let parsed = parse("x.py", "x = 1 + 2\n");
    let tree = parsed.tree.as_ref().unwrap();
    let module = tree.root_node();
    assert_eq!(module.kind(), "module");
    let converted = adapter.convert(Language::Python, module, parsed.text.as_bytes());
    assert_eq!(converted.kind, NodeKind::Unknown);
    assert_eq!(converted.span.start, 0);
}

#[test]
fn test_unsupported_language_is_an_error() {
    let adapter = GrammarAdapter::new();
    let err = adapter
        .parse(Path::new("notes.txt"), Language::Other, String::new(), None)
        .unwrap_err();
    assert!(matches!(err, GraftError::UnsupportedLanguage(_)));
}

fn project() -> MemoryFs {
    MemoryFs::with_files([
        ("/proj/a.py", b"def a():\n    pass\n".to_vec()),
        ("/proj/src/b.ts", b"export function b() {}\n".to_vec()),
        ("/proj/README.md", b"# readme\n".to_vec()),
        ("/proj/node_modules/x/index.js", b"module.exports = 1;\n".to_vec()),
        ("/proj/bad.py", vec![0xff, 0xfe, 0x00]),
    ])
}

#[test]
fn test_discovery_applies_filters() {
    let fs = project();
    let adapter = GrammarAdapter::new();
    let files = discover(&fs, Path::new("/proj"), &IndexConfig::default(), adapter.registry()).unwrap();
    let paths: Vec<PathBuf> = files.into_iter().map(|f| f.path).collect();
    assert_eq!(
        paths,
        vec![PathBuf::from("a.py"), PathBuf::from("bad.py"), PathBuf::from("src/b.ts")]
    );

    let config = IndexConfig {
        include: vec!["src/**".to_string()],
        ..IndexConfig::default()
    };
    let files = discover(&fs, Path::new("/proj"), &config, adapter.registry()).unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].language, Language::TypeScript);
}

#[test]
fn test_scan_collects_failures_and_reports_progress() {
    let fs = project();
    let coordinator = Coordinator::new(GrammarAdapter::new(), IndexConfig::default());
    let (control, mut rx) = ScanControl::channel();
    let outcome = coordinator.scan(&fs, Path::new("/proj"), &control).unwrap();

    assert_eq!(outcome.parsed.len(), 2);
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].path, PathBuf::from("bad.py"));
    assert_eq!(outcome.parsed[0].path, PathBuf::from("a.py"));

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    assert_eq!(events.first(), Some(&ScanProgress::Started { total: 3 }));
    assert_eq!(events.last(), Some(&ScanProgress::Finished { parsed: 2, failed: 1 }));
}

#[test]
fn test_cancelled_scan_returns_nothing() {
    let fs = project();
    let coordinator = Coordinator::new(GrammarAdapter::new(), IndexConfig::default());
    let (control, mut rx) = ScanControl::channel();
    control.cancel();
    let err = coordinator.scan(&fs, Path::new("/proj"), &control).unwrap_err();
    assert!(matches!(err, GraftError::Cancelled));

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    assert_eq!(events.last(), Some(&ScanProgress::Cancelled { done: 0 }));
}

#[test]
fn test_scan_with_dedicated_threads() {
    let fs = project();
    let config = IndexConfig {
        threads: 2,
        ..IndexConfig::default()
    };
    let coordinator = Coordinator::new(GrammarAdapter::new(), config);
    let outcome = coordinator.scan(&fs, Path::new("/proj"), &ScanControl::new()).unwrap();
    assert_eq!(outcome.parsed.len(), 2);
}
