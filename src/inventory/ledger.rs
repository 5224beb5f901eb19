use std::cmp::Ordering;
use std::collections::btree_map::Iter;
use std::collections::BTreeMap;

use rust_decimal::Decimal;

use super::undo::Snapshot;
use super::ValidationError;

/// The authoritative name → weight mapping.
///
/// Keys are case sensitive. Mutators are crate private: the only way in from
/// outside is through [`super::Inventory`], which validates, snapshots and
/// records history around every change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ledger {
    products: BTreeMap<String, Decimal>,
}

impl Ledger {
    pub fn new() -> Ledger {
        Ledger {
            products: BTreeMap::new(),
        }
    }

    /// Builds a ledger from already validated entries (see `session`).
    pub(crate) fn from_products(products: BTreeMap<String, Decimal>) -> Ledger {
        Ledger { products }
    }

    pub fn weight(&self, name: &str) -> Option<Decimal> {
        self.products.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.products.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    pub fn products_iter(&self) -> Iter<String, Decimal> {
        self.products.iter()
    }

    pub fn products(&self) -> &BTreeMap<String, Decimal> {
        &self.products
    }

    /// Sum of every weight, recomputed on each call. `None` when the sum does
    /// not fit in a `Decimal`.
    pub fn total_weight(&self) -> Option<Decimal> {
        self.products
            .values()
            .try_fold(Decimal::ZERO, |total, weight| total.checked_add(*weight))
    }

    /// Entries ordered by case-insensitive name. Names equal ignoring case
    /// fall back to ordinal order of the original name, so "Rice" < "rice".
    pub fn sorted_view(&self) -> Vec<(&str, Decimal)> {
        let mut view: Vec<(&str, Decimal)> = self
            .products
            .iter()
            .map(|(name, weight)| (name.as_str(), *weight))
            .collect();
        view.sort_by(|(a, _), (b, _)| compare_names(a, b));
        view
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot::new(self.products.clone())
    }

    pub(crate) fn restore(&mut self, snapshot: Snapshot) {
        self.products = snapshot.into_products();
    }

    pub(crate) fn insert(&mut self, name: &str, weight: Decimal) {
        self.products.insert(name.to_string(), weight);
    }

    /// Adds `weight` to an existing entry or creates it. Returns the new total
    /// for that name. On overflow the ledger is left unchanged.
    pub(crate) fn accumulate(&mut self, name: &str, weight: Decimal) -> Result<Decimal, ValidationError> {
        let total = self
            .weight(name)
            .unwrap_or(Decimal::ZERO)
            .checked_add(weight)
            .ok_or_else(|| ValidationError::WeightOverflow(name.to_string()))?;
        self.products.insert(name.to_string(), total);

        Ok(total)
    }

    pub(crate) fn remove(&mut self, name: &str) -> Option<Decimal> {
        self.products.remove(name)
    }

    pub(crate) fn take_all(&mut self) -> BTreeMap<String, Decimal> {
        std::mem::take(&mut self.products)
    }
}

pub fn compare_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| a.cmp(b))
}
