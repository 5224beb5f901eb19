use log::{debug, info};
use rust_decimal::Decimal;

use super::commands::{Add, Clear, Edit, Mutation, Remove};
use super::history::HistoryLog;
use super::ledger::{compare_names, Ledger};
use super::undo::UndoStack;
use super::{ExecutableMutation, InventoryError};

/// Session context: the ledger plus its history log and undo stack.
///
/// Owned by the application loop and passed explicitly to whatever needs it.
#[derive(Debug, Default)]
pub struct Inventory {
    ledger: Ledger,
    history: HistoryLog,
    undo: UndoStack,
}

impl Inventory {
    pub fn new() -> Inventory {
        Inventory::with_ledger(Ledger::new(), None)
    }

    pub fn with_ledger(ledger: Ledger, undo_limit: Option<usize>) -> Inventory {
        Inventory {
            ledger,
            history: HistoryLog::new(),
            undo: UndoStack::with_limit(undo_limit),
        }
    }

    /// Runs a mutation as a unit. The pre-mutation snapshot is pushed and the
    /// history appended only when the mutation succeeds; on failure the ledger
    /// is put back exactly as it was.
    pub fn execute(&mut self, mutation: impl Into<Mutation>) -> Result<(), InventoryError> {
        let mutation = mutation.into();
        let snapshot = self.ledger.snapshot();

        let records = match mutation.execute(&mut self.ledger) {
            Ok(records) => records,
            Err(err) => {
                self.ledger.restore(snapshot);
                debug!("rejected mutation {:?}, err={}", mutation, err);
                return Err(err.into());
            },
        };

        if let Err(err) = records.iter().try_for_each(|record| record.validate()) {
            self.ledger.restore(snapshot);
            return Err(err.into());
        }

        self.undo.push(snapshot);
        for record in records {
            self.history.append(record.kind, record.description)?;
        }

        Ok(())
    }

    pub fn add(&mut self, name: &str, weight: Decimal) -> Result<(), InventoryError> {
        self.execute(Add::new(name, weight)?)
    }

    pub fn remove<I, S>(&mut self, names: I) -> Result<(), InventoryError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.execute(Remove::new(names)?)
    }

    pub fn clear(&mut self) -> Result<(), InventoryError> {
        self.execute(Clear)
    }

    pub fn edit(&mut self, edit: Edit) -> Result<(), InventoryError> {
        self.execute(edit)
    }

    /// Rolls the ledger back to the most recent snapshot. Undo is not itself
    /// recorded in the history and cannot be redone.
    pub fn undo(&mut self) -> Result<(), InventoryError> {
        let snapshot = self.undo.pop().ok_or(InventoryError::EmptyStack)?;
        self.ledger.restore(snapshot);
        info!("undo restored {} product(s), {} step(s) left", self.ledger.len(), self.undo.len());

        Ok(())
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn history(&self) -> &HistoryLog {
        &self.history
    }

    pub fn undo_depth(&self) -> usize {
        self.undo.len()
    }

    pub fn total_weight(&self) -> Option<Decimal> {
        self.ledger.total_weight()
    }

    pub fn sorted_view(&self) -> Vec<(&str, Decimal)> {
        self.ledger.sorted_view()
    }

    /// Known product names starting with `prefix`, ignoring case.
    pub fn names_matching(&self, prefix: &str) -> Vec<&str> {
        let prefix = prefix.trim().to_lowercase();
        let mut names: Vec<&str> = self
            .ledger
            .products_iter()
            .map(|(name, _)| name.as_str())
            .filter(|name| name.to_lowercase().starts_with(&prefix))
            .collect();
        names.sort_by(|a, b| compare_names(a, b));
        names
    }
}
