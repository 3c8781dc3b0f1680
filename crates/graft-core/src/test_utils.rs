//! Test utilities for graft-core

use std::fs;

use tempfile::TempDir;

use crate::model::*;
use crate::node::{NodePayload, ReferenceData, SemanticNode};

/// Create a repository with a specific file structure
pub fn create_repo_with_structure(structure: &[(&str, &str)]) -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();

    for (path, content) in structure {
        let full_path = root.join(path);

        // Create parent directories if needed
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).unwrap();
        }

        fs::write(&full_path, content).unwrap();
    }

    temp_dir
}

/// A file root spanning `len` bytes.
pub fn root(len: usize) -> SemanticNode {
    SemanticNode::new(NodeKind::File, Span::new(0, len))
}

/// A named function node with its name token at the start of the span.
pub fn function(name: &str, start: usize, end: usize) -> SemanticNode {
    let name_start = start + 4;
    SemanticNode::new(NodeKind::Function, Span::new(start, end))
        .with_name(name, Span::new(name_start, name_start + name.len()))
}

pub fn class(name: &str, start: usize, end: usize, members: Vec<SemanticNode>) -> SemanticNode {
    let name_start = start + 6;
    let mut node = SemanticNode::new(NodeKind::Class, Span::new(start, end))
        .with_name(name, Span::new(name_start, name_start + name.len()));
    node.children = members;
    node
}

pub fn call(name: &str, start: usize) -> SemanticNode {
    SemanticNode::new(NodeKind::Call, Span::new(start, start + name.len() + 2))
        .with_name(name, Span::new(start, start + name.len()))
        .with_payload(NodePayload::Reference(ReferenceData {
            name: name.to_string(),
            qualifier: None,
        }))
}
