//! Sorted transaction queue.
//!
//! Transactions live in an arena; text edits are additionally indexed by
//! `(file, start, end, seq)` so the queue is always sorted and draining walks
//! the index backwards: rightmost edit first, the wider of two edits at the
//! same start first, and the later-queued of two identical ranges first.

use std::collections::BTreeMap;

use graft_core::FileId;

use super::{Transaction, TransactionId, TransactionState, TxTarget};

type EditKey = (FileId, usize, usize, u64);

#[derive(Debug, Default)]
pub struct TransactionQueue {
    arena: Vec<Transaction>,
    text_index: BTreeMap<EditKey, usize>,
    /// File operations in queue order.
    file_ops: Vec<usize>,
    next_seq: u64,
}

/// The contents of a drained queue.
#[derive(Debug, Default)]
pub struct Batch {
    /// Per file, in application order.
    pub text_edits: BTreeMap<FileId, Vec<Transaction>>,
    /// Creates, renames and deletes, in queue order.
    pub file_ops: Vec<Transaction>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.text_edits.values().map(Vec::len).sum::<usize>() + self.file_ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TransactionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign the next id and sequence number and index the transaction.
    pub fn push(&mut self, mut tx: Transaction) -> TransactionId {
        self.next_seq += 1;
        tx.seq = self.next_seq;
        tx.id = TransactionId(self.next_seq);
        tx.state = TransactionState::Queued;
        let id = tx.id;
        let slot = self.arena.len();
        match (&tx.target, tx.op.span()) {
            (TxTarget::File(file), Some(span)) => {
                self.text_index.insert((*file, span.start, span.end, tx.seq), slot);
            }
            _ => self.file_ops.push(slot),
        }
        tracing::debug!("Queued {} {:?} on {:?}", id, tx.op, tx.target);
        self.arena.push(tx);
        id
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    pub fn get(&self, id: TransactionId) -> Option<&Transaction> {
        self.arena.iter().find(|tx| tx.id == id)
    }

    /// Queued transactions in application order.
    pub fn iter(&self) -> impl Iterator<Item = &Transaction> + '_ {
        self.text_index
            .values()
            .rev()
            .chain(self.file_ops.iter())
            .map(|slot| &self.arena[*slot])
    }

    /// Empty the queue, returning its contents in application order.
    pub fn drain(&mut self) -> Batch {
        let mut slots: Vec<Option<Transaction>> = std::mem::take(&mut self.arena).into_iter().map(Some).collect();
        let mut batch = Batch::default();
        for ((file, ..), slot) in std::mem::take(&mut self.text_index).into_iter().rev() {
            if let Some(mut tx) = slots[slot].take() {
                tx.state = TransactionState::Sorted;
                batch.text_edits.entry(file).or_default().push(tx);
            }
        }
        for slot in std::mem::take(&mut self.file_ops) {
            if let Some(mut tx) = slots[slot].take() {
                tx.state = TransactionState::Sorted;
                batch.file_ops.push(tx);
            }
        }
        batch
    }
}

/// The first overlapping pair among one file's edits, given in application order.
///
/// Ranges that merely touch do not conflict.
pub fn find_conflict(edits: &[Transaction]) -> Option<(&Transaction, &Transaction)> {
    let mut widest: Option<&Transaction> = None;
    for tx in edits.iter().rev() {
        let Some(span) = tx.op.span() else {
            continue;
        };
        if let Some(prev) = widest {
            let prev_span = prev.op.span()?;
            if prev_span.overlaps(&span) {
                return Some((prev, tx));
            }
            if span.end > prev_span.end {
                widest = Some(tx);
            }
        } else {
            widest = Some(tx);
        }
    }
    None
}
