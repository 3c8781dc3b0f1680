//! Node-level edits. Each call queues its transactions and commits them.

use std::collections::BTreeSet;
use std::path::Path;

use graft_core::{EdgeKind, FileId, GraftError, Language, NodeId, NodeRecord, Result, Span, WhitespaceRule};

use crate::codebase::Codebase;
use crate::query::CodebaseView;
use crate::transaction::{CommitReport, Transaction};

fn lookup<'v>(view: &'v CodebaseView<'_>, node: NodeId) -> Result<&'v NodeRecord> {
    view.node(node)
        .ok_or_else(|| GraftError::UnknownNode(node.to_string()))
}

fn text_of<'v>(view: &'v CodebaseView<'_>, file: FileId, span: Span) -> Result<&'v str> {
    let record = view
        .file(file)
        .ok_or_else(|| GraftError::UnknownFile(file.to_string()))?;
    record.text.get(span.start..span.end).ok_or_else(|| GraftError::InvalidSpan {
        path: record.path.clone(),
        span,
        len: record.text.len(),
    })
}

/// Pin a text edit to the revision of the text its offsets were read from.
fn pinned(view: &CodebaseView<'_>, tx: Transaction) -> Transaction {
    match tx.file().and_then(|file| view.file(file)) {
        Some(record) if !tx.op.is_file_op() => {
            let revision = record.revision;
            tx.at_revision(revision)
        }
        _ => tx,
    }
}

/// The range a deletion of `span` removes under `rule`.
///
/// `Line` widens to whole lines when nothing but whitespace shares them with
/// the node; `BlankLines` also takes the blank lines that follow.
pub fn deletion_span(text: &str, span: Span, rule: WhitespaceRule) -> Span {
    if rule == WhitespaceRule::Exact || span.end > text.len() {
        return span;
    }
    let line_start = text[..span.start].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let line_end = text[span.end..]
        .find('\n')
        .map(|i| span.end + i + 1)
        .unwrap_or(text.len());
    let leading = &text[line_start..span.start];
    let trailing = &text[span.end..line_end];
    if !leading.chars().all(|c| c == ' ' || c == '\t') || !trailing.trim().is_empty() {
        return span;
    }
    let mut end = line_end;
    if rule == WhitespaceRule::BlankLines {
        while end < text.len() {
            let next = text[end..].find('\n').map(|i| end + i + 1).unwrap_or(text.len());
            if !text[end..next].trim().is_empty() {
                break;
            }
            end = next;
        }
    }
    Span::new(line_start, end)
}

impl Codebase {
    /// Delete a node together with its leading decorators, comments or
    /// attributes. Deleting a file root deletes the file.
    pub fn remove(&self, node: NodeId) -> Result<CommitReport> {
        let tx = {
            let view = self.read();
            let record = lookup(&view, node)?;
            if node.is_root() {
                Transaction::delete_file(node.file)
            } else {
                let file = view
                    .file(node.file)
                    .ok_or_else(|| GraftError::UnknownFile(node.file.to_string()))?;
                let span = deletion_span(&file.text, record.extended.bounds(), self.config().edits.whitespace);
                pinned(&view, Transaction::delete(node.file, span))
            }
        };
        self.queue(tx);
        self.commit()
    }

    /// Rename a symbol at its definition and at every use the graph knows of.
    pub fn rename(&self, node: NodeId, new_name: &str) -> Result<CommitReport> {
        let edits = {
            let view = self.read();
            let record = lookup(&view, node)?;
            let (Some(old), Some(name_span)) = (record.name.clone(), record.name_span) else {
                return Err(GraftError::UnknownNode(format!("{node} has no name to rename")));
            };
            let mut edits: BTreeSet<(FileId, Span)> = BTreeSet::new();
            edits.insert((node.file, name_span));
            for edge in view.edges_to(node) {
                let Some(source) = view.node(edge.source) else {
                    continue;
                };
                let candidates: Vec<Span> = match edge.kind {
                    EdgeKind::Reference => source.name_span.into_iter().collect(),
                    EdgeKind::Inheritance => source
                        .superclasses()
                        .iter()
                        .filter(|s| s.name == old)
                        .map(|s| s.span)
                        .collect(),
                    EdgeKind::Dependency => source
                        .import()
                        .map(|data| data.names.iter().filter(|n| n.name == old).map(|n| n.span).collect())
                        .unwrap_or_default(),
                };
                for span in candidates {
                    if text_of(&view, edge.source.file, span).is_ok_and(|t| t == old) {
                        edits.insert((edge.source.file, span));
                    }
                }
            }
            edits
                .into_iter()
                .map(|(file, span)| pinned(&view, Transaction::replace(file, span, new_name)))
                .collect::<Vec<_>>()
        };
        tracing::debug!("Renaming {} at {} site(s)", node, edits.len());
        for tx in edits {
            self.queue(tx);
        }
        self.commit()
    }

    /// Insert text before a node's extended span.
    pub fn insert_before(&self, node: NodeId, text: &str) -> Result<CommitReport> {
        let tx = {
            let view = self.read();
            let offset = lookup(&view, node)?.extended.bounds().start;
            pinned(&view, Transaction::insert(node.file, offset, text))
        };
        self.queue(tx);
        self.commit()
    }

    pub fn insert_after(&self, node: NodeId, text: &str) -> Result<CommitReport> {
        let tx = {
            let view = self.read();
            let offset = lookup(&view, node)?.span.end;
            pinned(&view, Transaction::insert(node.file, offset, text))
        };
        self.queue(tx);
        self.commit()
    }

    /// Replace a node's primary span.
    pub fn replace_node(&self, node: NodeId, text: &str) -> Result<CommitReport> {
        let tx = {
            let view = self.read();
            let span = lookup(&view, node)?.span;
            pinned(&view, Transaction::replace(node.file, span, text))
        };
        self.queue(tx);
        self.commit()
    }

    /// Replace a byte range of a file.
    pub fn edit(&self, path: &Path, span: Span, text: &str) -> Result<CommitReport> {
        let relative = self.relative(path);
        let file = self
            .read()
            .file_id(&relative)
            .ok_or_else(|| GraftError::UnknownFile(relative.display().to_string()))?;
        self.queue(Transaction::replace(file, span, text));
        self.commit()
    }

    /// Move a top-level symbol into another file of the same language,
    /// creating it if needed.
    ///
    /// Importers whose import names only this symbol are rewritten to import
    /// it from the new file; other importers get an extra import line. If the
    /// old file still uses the symbol it imports it too. Imports the moved code
    /// itself relies on are not carried over.
    pub fn move_to_file(&self, node: NodeId, destination: &Path) -> Result<CommitReport> {
        let destination = self.relative(destination);
        let txs = {
            let view = self.read();
            let record = lookup(&view, node)?;
            let top_level = view.parent(node).is_some_and(|p| p.is_root());
            let Some(name) = record.name.clone().filter(|_| record.kind.is_symbol() && top_level) else {
                return Err(GraftError::UnknownNode(format!("{node} is not a top-level symbol")));
            };
            let source = view
                .file(node.file)
                .ok_or_else(|| GraftError::UnknownFile(node.file.to_string()))?;
            if source.path == destination {
                return Ok(CommitReport::default());
            }
            if Language::from_path(&destination) != source.language {
                return Err(GraftError::UnsupportedLanguage(destination));
            }
            let conventions = self
                .adapter()
                .conventions(source.language)
                .ok_or_else(|| GraftError::UnsupportedLanguage(source.path.clone()))?;

            let bounds = record.extended.bounds();
            let moved = text_of(&view, node.file, bounds)?.to_string();
            let mut txs = vec![Transaction::delete(
                node.file,
                deletion_span(&source.text, bounds, self.config().edits.whitespace),
            )];

            let target = view.file_id(&destination);
            match target.and_then(|t| view.file(t)) {
                Some(existing) => {
                    let separator = if existing.text.is_empty() || existing.text.ends_with("\n\n") {
                        ""
                    } else if existing.text.ends_with('\n') {
                        "\n"
                    } else {
                        "\n\n"
                    };
                    txs.push(Transaction::insert(
                        existing.id,
                        existing.text.len(),
                        format!("{separator}{moved}\n"),
                    ));
                }
                None => txs.push(Transaction::create_file(destination.clone(), format!("{moved}\n"))),
            }

            let subtree = view.descendants(node);
            let mut rewritten: BTreeSet<NodeId> = BTreeSet::new();
            let mut source_uses = false;
            for edge in view.edges_to(node) {
                let importer = edge.source.file;
                if importer == node.file {
                    source_uses |= !subtree.contains(&edge.source);
                    continue;
                }
                if Some(importer) == target || edge.kind != EdgeKind::Dependency || !rewritten.insert(edge.source) {
                    continue;
                }
                let (Some(import), Some(importer_file)) = (view.node(edge.source), view.file(importer)) else {
                    continue;
                };
                let Some(line) = conventions.render_import(&importer_file.path, &destination, &name) else {
                    continue;
                };
                let only_this = import
                    .import()
                    .is_some_and(|d| d.names.len() == 1 && d.names[0].name == name && d.names[0].alias.is_none());
                if only_this {
                    txs.push(Transaction::replace(importer, import.span, line.trim_end()));
                } else {
                    txs.push(Transaction::insert(importer, import.extended.bounds().start, line));
                }
            }
            if source_uses {
                if let Some(line) = conventions.render_import(&source.path, &destination, &name) {
                    txs.push(Transaction::insert(node.file, 0, line));
                }
            }
            tracing::debug!(
                "Moving {} from {} to {} ({} transactions)",
                name,
                source.path.display(),
                destination.display(),
                txs.len()
            );
            txs.into_iter().map(|tx| pinned(&view, tx)).collect::<Vec<_>>()
        };
        for tx in txs {
            self.queue(tx);
        }
        self.commit()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEXT: &str = "a = 1\n\ndef f():\n    pass\n\n\nb = 2\n";

    #[test]
    fn test_exact_keeps_surrounding_whitespace() {
        let span = Span::new(7, 24);
        assert_eq!(deletion_span(TEXT, span, WhitespaceRule::Exact), span);
    }

    #[test]
    fn test_line_rule_takes_the_newline() {
        let span = deletion_span(TEXT, Span::new(7, 24), WhitespaceRule::Line);
        assert_eq!(span, Span::new(7, 25));
        let mut text = TEXT.to_string();
        text.replace_range(span.start..span.end, "");
        assert_eq!(text, "a = 1\n\n\n\nb = 2\n");
    }

    #[test]
    fn test_blank_lines_rule_takes_following_blank_lines() {
        let span = deletion_span(TEXT, Span::new(7, 24), WhitespaceRule::BlankLines);
        let mut text = TEXT.to_string();
        text.replace_range(span.start..span.end, "");
        assert_eq!(text, "a = 1\n\nb = 2\n");
    }

    #[test]
    fn test_shared_line_stays_exact() {
        let text = "x = f(1); y = 2\n";
        let span = Span::new(4, 8);
        assert_eq!(deletion_span(text, span, WhitespaceRule::Line), span);
    }
}
