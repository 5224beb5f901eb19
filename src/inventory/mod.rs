use std::str::FromStr;

use enum_dispatch::enum_dispatch;
use rust_decimal::{Decimal, RoundingStrategy};
use thiserror::Error;

pub mod commands;
pub mod history;
pub mod ledger;
pub mod store;
pub mod undo;


pub use commands::{Add, Clear, Edit, Mutation, Remove};
pub use history::{ActionKind, HistoryEntry, HistoryLog, HistoryRecord};
pub use ledger::Ledger;
pub use store::Inventory;
pub use undo::{Snapshot, UndoStack};

/// Bad or missing user input. Nothing is applied when one of these is returned.
#[derive(Debug, PartialEq, Error)]
pub enum ValidationError {
    #[error("product name cannot be empty")]
    EmptyName,
    #[error("weight must be a valid number, got `{0}`")]
    InvalidWeight(String),
    #[error("weight must be greater than 0")]
    NonPositiveWeight,
    #[error("weight to subtract cannot be negative")]
    NegativeSubtraction,
    #[error("resulting weight for `{0}` must be greater than 0")]
    NonPositiveResult(String),
    #[error("product `{0}` not found")]
    UnknownProduct(String),
    #[error("select at least one product")]
    EmptySelection,
    #[error("none of the selected products exist")]
    NothingSelected,
    #[error("weight of `{0}` is too large")]
    WeightOverflow(String),
    #[error("history description cannot be empty")]
    EmptyDescription,
}

#[derive(Debug, PartialEq, Error)]
pub enum InventoryError {
    #[error("{0}")]
    Validation(#[from] ValidationError),
    #[error("nothing to undo")]
    EmptyStack,
}

#[enum_dispatch]
pub trait ExecutableMutation {
    /// Applies the mutation and returns the history records it produced.
    /// Implementations validate before touching the ledger.
    fn execute(&self, ledger: &mut Ledger) -> Result<Vec<HistoryRecord>, ValidationError>;
}

/// Parses user supplied weight text. Surrounding whitespace is ignored.
pub fn parse_weight(text: &str) -> Result<Decimal, ValidationError> {
    let text = text.trim();
    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .map_err(|_| ValidationError::InvalidWeight(text.to_string()))
}

/// Formats a weight the way every listing, report and history line shows it.
pub fn format_weight(weight: Decimal) -> String {
    let mut rounded = weight.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    format!("{} lb", rounded)
}
