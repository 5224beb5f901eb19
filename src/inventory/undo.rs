use std::collections::BTreeMap;

use log::debug;
use rust_decimal::Decimal;

/// Immutable point-in-time copy of the ledger mapping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    products: BTreeMap<String, Decimal>,
}

impl Snapshot {
    pub(crate) fn new(products: BTreeMap<String, Decimal>) -> Snapshot {
        Snapshot { products }
    }

    pub fn products(&self) -> &BTreeMap<String, Decimal> {
        &self.products
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    pub(crate) fn into_products(self) -> BTreeMap<String, Decimal> {
        self.products
    }
}

/// One-directional rollback stack. There is no redo.
#[derive(Debug, Default)]
pub struct UndoStack {
    snapshots: Vec<Snapshot>,
    limit: Option<usize>,
}

impl UndoStack {
    pub fn new() -> UndoStack {
        UndoStack {
            snapshots: Vec::new(),
            limit: None,
        }
    }

    /// A limit of zero is treated as one.
    pub fn with_limit(limit: Option<usize>) -> UndoStack {
        UndoStack {
            snapshots: Vec::new(),
            limit: limit.map(|limit| limit.max(1)),
        }
    }

    pub fn push(&mut self, snapshot: Snapshot) {
        self.snapshots.push(snapshot);

        if let Some(limit) = self.limit {
            if self.snapshots.len() > limit {
                let dropped = self.snapshots.len() - limit;
                self.snapshots.drain(..dropped);
                debug!("undo stack over limit, dropped {} oldest snapshot(s)", dropped);
            }
        }
    }

    pub fn pop(&mut self) -> Option<Snapshot> {
        self.snapshots.pop()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }
}
