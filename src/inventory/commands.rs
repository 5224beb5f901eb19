use std::collections::BTreeSet;

use enum_dispatch::enum_dispatch;
use rust_decimal::Decimal;

use super::history::{ActionKind, HistoryRecord};
use super::ledger::Ledger;
use super::{format_weight, parse_weight, ExecutableMutation, ValidationError};

#[enum_dispatch(ExecutableMutation)]
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    Add,
    Remove,
    Clear,
    Edit,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Add {
    name: String,
    weight: Decimal,
}

impl Add {
    pub fn new(name: &str, weight: Decimal) -> Result<Add, ValidationError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyName);
        }

        if weight <= Decimal::ZERO {
            return Err(ValidationError::NonPositiveWeight);
        }

        Ok(Add {
            name: name.to_string(),
            weight,
        })
    }

    /// Same as [`Add::new`] with the weight still in its textual form.
    pub fn parse(name: &str, weight: &str) -> Result<Add, ValidationError> {
        if name.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }

        Add::new(name, parse_weight(weight)?)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn weight(&self) -> Decimal {
        self.weight
    }
}

impl ExecutableMutation for Add {
    fn execute(&self, ledger: &mut Ledger) -> Result<Vec<HistoryRecord>, ValidationError> {
        let merged = ledger.contains(&self.name);
        ledger.accumulate(&self.name, self.weight)?;

        let record = if merged {
            HistoryRecord::new(
                ActionKind::Modified,
                format!("{} - +{}", self.name, format_weight(self.weight)),
            )
        } else {
            HistoryRecord::new(
                ActionKind::Added,
                format!("{} - {}", self.name, format_weight(self.weight)),
            )
        };

        Ok(vec![record])
    }
}

/// Removes a selection of products as a single undoable step.
#[derive(Debug, Clone, PartialEq)]
pub struct Remove {
    names: BTreeSet<String>,
}

impl Remove {
    pub fn new<I, S>(names: I) -> Result<Remove, ValidationError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: BTreeSet<String> = names.into_iter().map(Into::into).collect();
        if names.is_empty() {
            return Err(ValidationError::EmptySelection);
        }

        Ok(Remove { names })
    }

    pub fn names(&self) -> &BTreeSet<String> {
        &self.names
    }
}

impl ExecutableMutation for Remove {
    fn execute(&self, ledger: &mut Ledger) -> Result<Vec<HistoryRecord>, ValidationError> {
        if !self.names.iter().any(|name| ledger.contains(name)) {
            return Err(ValidationError::NothingSelected);
        }

        // Names that are not present are skipped silently.
        let records = self
            .names
            .iter()
            .filter_map(|name| {
                ledger.remove(name).map(|weight| {
                    HistoryRecord::new(ActionKind::Deleted, format!("{} - {}", name, format_weight(weight)))
                })
            })
            .collect();

        Ok(records)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Clear;

impl ExecutableMutation for Clear {
    fn execute(&self, ledger: &mut Ledger) -> Result<Vec<HistoryRecord>, ValidationError> {
        let records = ledger
            .take_all()
            .into_iter()
            .map(|(name, weight)| {
                HistoryRecord::new(ActionKind::Deleted, format!("{} - {}", name, format_weight(weight)))
            })
            .collect();

        Ok(records)
    }
}

/// Rename and/or reweigh a single product.
///
/// `replace` wins over `subtract` when both are given, although the
/// subtraction is still recorded in the history. Renaming into a product that
/// already exists merges the two weights.
#[derive(Debug, Clone, PartialEq)]
pub struct Edit {
    old_name: String,
    new_name: Option<String>,
    subtract: Option<Decimal>,
    replace: Option<Decimal>,
}

impl Edit {
    pub fn new(old_name: &str) -> Edit {
        Edit {
            old_name: old_name.to_string(),
            new_name: None,
            subtract: None,
            replace: None,
        }
    }

    pub fn rename(mut self, new_name: &str) -> Edit {
        self.new_name = Some(new_name.to_string());
        self
    }

    pub fn subtract(mut self, weight: Decimal) -> Edit {
        self.subtract = Some(weight);
        self
    }

    pub fn replace(mut self, weight: Decimal) -> Edit {
        self.replace = Some(weight);
        self
    }

    pub fn old_name(&self) -> &str {
        &self.old_name
    }

    /// The name the product ends up under. Blank means unchanged.
    pub fn target_name(&self) -> &str {
        match self.new_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name,
            _ => &self.old_name,
        }
    }
}

impl ExecutableMutation for Edit {
    fn execute(&self, ledger: &mut Ledger) -> Result<Vec<HistoryRecord>, ValidationError> {
        let current = ledger
            .weight(&self.old_name)
            .ok_or_else(|| ValidationError::UnknownProduct(self.old_name.clone()))?;

        let mut records = Vec::new();
        let mut final_weight = current;

        if let Some(subtract) = self.subtract {
            if subtract < Decimal::ZERO {
                return Err(ValidationError::NegativeSubtraction);
            }

            final_weight -= subtract;
            records.push(HistoryRecord::new(
                ActionKind::WeightSubtracted,
                format!("{} - -{}", self.old_name, format_weight(subtract)),
            ));
        }

        if let Some(replace) = self.replace {
            if replace <= Decimal::ZERO {
                return Err(ValidationError::NonPositiveWeight);
            }

            final_weight = replace;
            records.push(HistoryRecord::new(
                ActionKind::WeightReplaced,
                format!(
                    "{} - {} → {}",
                    self.old_name,
                    format_weight(current),
                    format_weight(replace)
                ),
            ));
        }

        if final_weight <= Decimal::ZERO {
            return Err(ValidationError::NonPositiveResult(self.old_name.clone()));
        }

        let target = self.target_name();
        let merge_total = match ledger.weight(target) {
            Some(existing) if target != self.old_name => Some(
                existing
                    .checked_add(final_weight)
                    .ok_or_else(|| ValidationError::WeightOverflow(target.to_string()))?,
            ),
            _ => None,
        };

        ledger.remove(&self.old_name);

        if let Some(total) = merge_total {
            ledger.insert(target, total);
            records.push(HistoryRecord::new(
                ActionKind::WeightMerged,
                format!(
                    "{} → {} - +{} (total {})",
                    self.old_name,
                    target,
                    format_weight(final_weight),
                    format_weight(total)
                ),
            ));
        } else {
            ledger.insert(target, final_weight);
            records.push(HistoryRecord::new(
                ActionKind::Edited,
                format!("{} → {} - {}", self.old_name, target, format_weight(final_weight)),
            ));
        }

        Ok(records)
    }
}
