//! Integration tests for Graft
//!
//! These run the whole pipeline against projects on a real disk: scan,
//! resolve, edit, write back and undo.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use graft::core::{LocalFs, ScanProgress};
use graft::{Codebase, EdgeKind, GraftConfig, NodeId, ScanControl, Span, Transaction, TransactionState, ValidationStatus};
use tempfile::TempDir;

fn write_project(files: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for (path, text) in files {
        let path = dir.path().join(path);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, text).unwrap();
    }
    dir
}

/// Every regular file under `root`, relative path to contents.
fn snapshot(root: &Path) -> BTreeMap<PathBuf, String> {
    let mut out = BTreeMap::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in std::fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                stack.push(path);
            } else {
                let text = std::fs::read_to_string(&path).unwrap();
                out.insert(path.strip_prefix(root).unwrap().to_path_buf(), text);
            }
        }
    }
    out
}

const SHOP: &[(&str, &str)] = &[
    ("shop/__init__.py", ""),
    (
        "shop/pricing.py",
        "import math\n\n\ndef total(items):\n    return math.fsum(items)\n\n\ndef legacy_total(items):\n    return sum(items)\n",
    ),
    (
        "shop/cart.py",
        "from .pricing import total\n\n\nclass Cart:\n    def __init__(self):\n        self.items = []\n\n    def checkout(self):\n        return total(self.items)\n",
    ),
    ("web/api.js", "import { format } from './format.js';\n\nexport function render(cart) {\n    return format(cart);\n}\n"),
    ("web/format.js", "export function format(value) {\n    return String(value);\n}\n"),
];

#[test]
fn test_index_mixed_language_project() {
    let dir = write_project(SHOP);
    let codebase = Codebase::open(dir.path()).unwrap();
    let view = codebase.read();

    assert_eq!(view.file_count(), 5);
    assert!(view.find_symbol("shop/cart.py::Cart::checkout").is_some());
    let total = view.find_symbol("shop/pricing.py::total").unwrap();
    assert_eq!(view.usages_of_kind(total, EdgeKind::Reference).count(), 1);
    assert_eq!(view.usages_of_kind(total, EdgeKind::Dependency).count(), 1);

    let format = view.find_symbol("web/format.js::format").unwrap();
    assert_eq!(view.usages(format).count(), 2);

    let unused: Vec<&str> = view.unused_functions().filter_map(|n| n.name.as_deref()).collect();
    assert!(unused.contains(&"legacy_total"));
    assert!(!unused.contains(&"total"));
    drop(view);

    assert!(codebase.validate().is_success());
}

#[test]
fn test_progress_is_reported_on_load() {
    let dir = write_project(SHOP);
    let codebase = Codebase::new(dir.path(), GraftConfig::default(), Arc::new(LocalFs)).unwrap();
    let (control, mut events) = ScanControl::channel();
    let summary = codebase.load(&control).unwrap();
    assert_eq!(summary.parsed, 5);

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    assert_eq!(seen.first(), Some(&ScanProgress::Started { total: 5 }));
    assert_eq!(seen.last(), Some(&ScanProgress::Finished { parsed: 5, failed: 0 }));
    let parsed = seen
        .iter()
        .filter(|e| matches!(e, ScanProgress::FileParsed { .. }))
        .count();
    assert_eq!(parsed, 5);
}

#[test]
fn test_batched_edits_use_original_offsets() {
    let source = "def one():\n    return 1\n\n\ndef two():\n    return 2\n";
    let dir = write_project(&[("m.py", source)]);
    let codebase = Codebase::open(dir.path()).unwrap();
    let one = codebase.find_symbol("m.py::one").unwrap();
    let two = codebase.find_symbol("m.py::two").unwrap();

    // Queued front to back; applying the first would shift the second.
    codebase.queue(Transaction::replace(one.file, Span::new(4, 7), "first_function"));
    codebase.queue(Transaction::replace(one.file, Span::new(30, 33), "second"));
    codebase.queue(Transaction::insert(one.file, 0, "\"\"\"Numbers.\"\"\"\n"));
    let report = codebase.commit().unwrap();
    assert!(report.is_clean());

    let expected = "\"\"\"Numbers.\"\"\"\ndef first_function():\n    return 1\n\n\ndef second():\n    return 2\n";
    assert_eq!(std::fs::read_to_string(dir.path().join("m.py")).unwrap(), expected);
    assert_eq!(codebase.find_symbol("m.py::first_function"), Some(one));
    assert_eq!(codebase.find_symbol("m.py::second"), Some(two));
}

#[test]
fn test_conflicting_batch_leaves_disk_untouched() {
    let dir = write_project(SHOP);
    let before = snapshot(dir.path());
    let codebase = Codebase::open(dir.path()).unwrap();
    let total = codebase.find_symbol("shop/pricing.py::total").unwrap();
    let span = codebase.read().node(total).unwrap().span;

    let a = codebase.queue(Transaction::replace(total.file, span, "pass"));
    let b = codebase.queue(Transaction::delete(total.file, Span::new(span.start + 4, span.start + 9)));
    let report = codebase.commit().unwrap();

    assert!(report.committed.is_empty());
    assert_eq!(codebase.transaction_state(a), Some(TransactionState::Conflicted));
    assert_eq!(codebase.transaction_state(b), Some(TransactionState::Conflicted));
    assert_eq!(snapshot(dir.path()), before);
    assert!(!codebase.rollback().unwrap());
}

#[test]
fn test_commit_then_rollback_restores_disk_and_graph() {
    let dir = write_project(SHOP);
    let before = snapshot(dir.path());
    let codebase = Codebase::open(dir.path()).unwrap();

    let ids_before: Vec<NodeId> = codebase.nodes_in_file(Path::new("shop/cart.py"));
    let total = codebase.find_symbol("shop/pricing.py::total").unwrap();
    let format = codebase.find_symbol("web/format.js::format").unwrap();

    codebase.rename(total, "grand_total").unwrap().into_result().unwrap();
    codebase.rename(format, "show").unwrap().into_result().unwrap();
    let api = std::fs::read_to_string(dir.path().join("web/api.js")).unwrap();
    assert!(api.contains("import { show } from './format.js';"));
    assert!(api.contains("return show(cart);"));

    // Only the most recent batch is undone.
    assert!(codebase.rollback().unwrap());
    assert!(!codebase.rollback().unwrap());
    let cart = std::fs::read_to_string(dir.path().join("shop/cart.py")).unwrap();
    assert!(cart.contains("return grand_total(self.items)"));
    assert_eq!(snapshot(dir.path())[Path::new("web/api.js")], before[Path::new("web/api.js")]);
    assert_eq!(codebase.find_symbol("web/format.js::format"), Some(format));
    assert_eq!(codebase.nodes_in_file(Path::new("shop/cart.py")), ids_before);
}

#[test]
fn test_dead_code_sweep() {
    let dir = write_project(SHOP);
    let codebase = Codebase::open(dir.path()).unwrap();

    let unused: Vec<NodeId> = codebase
        .read()
        .unused_functions()
        .filter(|n| n.name.as_deref() == Some("legacy_total"))
        .map(|n| n.id)
        .collect();
    assert_eq!(unused.len(), 1);
    codebase.remove(unused[0]).unwrap().into_result().unwrap();

    let pricing = std::fs::read_to_string(dir.path().join("shop/pricing.py")).unwrap();
    assert_eq!(pricing, "import math\n\n\ndef total(items):\n    return math.fsum(items)\n\n\n");
    assert!(codebase.find_symbol("shop/pricing.py::legacy_total").is_none());
    assert!(codebase.validate().is_success());
}

#[test]
fn test_cyclic_imports_are_reported_not_fatal() {
    let dir = write_project(&[
        ("a.js", "import { b } from './b';\n\nexport function a() {\n    return b();\n}\n"),
        ("b.js", "import { c } from './c';\n\nexport function b() {\n    return c();\n}\n"),
        ("c.js", "import { a } from './a';\n\nexport function c() {\n    return a();\n}\n"),
    ]);
    let codebase = Codebase::open(dir.path()).unwrap();
    let cycles = codebase.import_cycles();
    assert_eq!(cycles.len(), 1);
    assert_eq!(cycles[0].files.len(), 3);

    let c = codebase.find_symbol("c.js::c").unwrap();
    assert_eq!(codebase.read().usages_of_kind(c, EdgeKind::Reference).count(), 1);
    assert_eq!(codebase.validate().status, ValidationStatus::Success);
}

#[test]
fn test_spans_nest_inside_parents() {
    let dir = write_project(SHOP);
    let codebase = Codebase::open(dir.path()).unwrap();
    let view = codebase.read();
    for file in view.files() {
        for id in view.nodes_in_file(file.id) {
            let node = view.node(id).unwrap();
            assert!(node.span.end <= file.text.len(), "{id} outside {}", file.path.display());
            if let Some(parent) = view.parent(id).filter(|p| !p.is_root()) {
                let outer = view.node(parent).unwrap().extended.bounds();
                assert!(outer.contains(&node.span), "{id} escapes {parent}");
            }
        }
    }
}

#[test]
fn test_move_function_between_files() {
    let dir = write_project(SHOP);
    let codebase = Codebase::open(dir.path()).unwrap();
    let total = codebase.find_symbol("shop/pricing.py::total").unwrap();

    let report = codebase.move_to_file(total, Path::new("shop/totals.py")).unwrap();
    assert!(report.is_clean(), "{:?}", report.failures);

    let cart = std::fs::read_to_string(dir.path().join("shop/cart.py")).unwrap();
    assert!(cart.starts_with("from shop.totals import total\n"));
    let moved = codebase.find_symbol("shop/totals.py::total").unwrap();
    assert_eq!(codebase.read().usages_of_kind(moved, EdgeKind::Reference).count(), 1);
}

#[test]
fn test_validation_report_serializes() {
    let dir = write_project(&[("only.py", "from .gone import thing\n")]);
    let codebase = Codebase::open(dir.path()).unwrap();
    let result = codebase.validate();
    let json: serde_json::Value = serde_json::from_str(&result.to_json().unwrap()).unwrap();
    assert_eq!(json["status"], "low_import_resolution_rate");
    assert_eq!(json["resolution_rate"], 0.0);
    assert_eq!(json["recovery"][0]["code"], "check_module_search_paths");
}
