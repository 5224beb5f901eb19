use std::fmt;
use std::slice::Iter;

use chrono::{Local, NaiveDateTime, SubsecRound};
use getset::{CopyGetters, Getters};

use super::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Added,
    Modified,
    Deleted,
    Edited,
    WeightSubtracted,
    WeightReplaced,
    WeightMerged,
}

impl ActionKind {
    pub fn label(&self) -> &'static str {
        match self {
            ActionKind::Added => "Added",
            ActionKind::Modified => "Modified",
            ActionKind::Deleted => "Deleted",
            ActionKind::Edited => "Edited",
            ActionKind::WeightSubtracted => "WeightSubtracted",
            ActionKind::WeightReplaced => "WeightReplaced",
            ActionKind::WeightMerged => "WeightMerged",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A record produced by a mutation that has not been committed to the log yet.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRecord {
    pub kind: ActionKind,
    pub description: String,
}

impl HistoryRecord {
    pub fn new(kind: ActionKind, description: impl Into<String>) -> HistoryRecord {
        HistoryRecord {
            kind,
            description: description.into(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.description.trim().is_empty() {
            return Err(ValidationError::EmptyDescription);
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Getters, CopyGetters)]
pub struct HistoryEntry {
    #[getset(get_copy = "pub")]
    timestamp: NaiveDateTime,
    #[getset(get_copy = "pub")]
    kind: ActionKind,
    #[getset(get = "pub")]
    description: String,
}

/// Append-only audit trail. Entries are never altered or removed.
#[derive(Debug, Default)]
pub struct HistoryLog {
    entries: Vec<HistoryEntry>,
}

impl HistoryLog {
    pub fn new() -> HistoryLog {
        HistoryLog { entries: Vec::new() }
    }

    /// Stamps the entry with the current local time, to the second.
    pub fn append(&mut self, kind: ActionKind, description: impl Into<String>) -> Result<(), ValidationError> {
        self.append_at(Local::now().naive_local().trunc_subsecs(0), kind, description)
    }

    pub fn append_at(
        &mut self,
        timestamp: NaiveDateTime,
        kind: ActionKind,
        description: impl Into<String>,
    ) -> Result<(), ValidationError> {
        let record = HistoryRecord::new(kind, description);
        record.validate()?;

        self.entries.push(HistoryEntry {
            timestamp,
            kind: record.kind,
            description: record.description,
        });

        Ok(())
    }

    /// Entries in insertion order. Calling again restarts from the first entry.
    pub fn entries(&self) -> Iter<'_, HistoryEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
