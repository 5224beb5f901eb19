//! Session persistence: the ledger saved as a flat JSON object of
//! `"name": weight` pairs, plus the periodic autosave.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use log::{debug, error, info};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::inventory::Ledger;

pub const DEFAULT_SESSION_FILE: &str = "products_session.json";
pub const DEFAULT_AUTOSAVE_INTERVAL: Duration = Duration::from_secs(10);

const TMP_SUFFIX: &str = ".tmp";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("malformed session file: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid session entry: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> SessionStore {
        SessionStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Overwrites the session file with the full ledger.
    pub fn save(&self, ledger: &Ledger) -> Result<(), SessionError> {
        let data = serde_json::to_string_pretty(ledger.products())?;
        write_atomic(&self.path, &data)?;
        debug!("saved {} product(s) to {}", ledger.len(), self.path.display());

        Ok(())
    }

    /// `Ok(None)` when there is no session file yet.
    pub fn load(&self) -> Result<Option<Ledger>, SessionError> {
        if !self.path.exists() {
            debug!("no session file at {}", self.path.display());
            return Ok(None);
        }

        let data = fs::read_to_string(&self.path)?;
        let products: BTreeMap<String, Decimal> = serde_json::from_str(&data)?;

        for (name, weight) in &products {
            if name.trim().is_empty() {
                return Err(SessionError::Invalid("blank product name".to_string()));
            }

            if *weight <= Decimal::ZERO {
                return Err(SessionError::Invalid(format!("`{}` has non positive weight {}", name, weight)));
            }
        }

        info!("loaded {} product(s) from {}", products.len(), self.path.display());
        Ok(Some(Ledger::from_products(products)))
    }

    /// Startup load. Any failure degrades to an empty ledger; the error is
    /// handed back so the caller can tell the user.
    pub fn load_or_empty(&self) -> (Ledger, Option<SessionError>) {
        match self.load() {
            Ok(Some(ledger)) => (ledger, None),
            Ok(None) => (Ledger::new(), None),
            Err(err) => {
                error!("failed to load session from {}, err={}", self.path.display(), err);
                (Ledger::new(), Some(err))
            },
        }
    }
}

fn write_atomic(path: &Path, data: &str) -> io::Result<()> {
    let mut tmp = OsString::from(path.as_os_str());
    tmp.push(TMP_SUFFIX);
    let tmp = PathBuf::from(tmp);

    {
        let mut file = File::create(&tmp)?;
        file.write_all(data.as_bytes())?;
        file.sync_all()?;
    }

    fs::rename(&tmp, path)
}

/// Cooperative autosave timer, polled by the event loop between events.
#[derive(Debug)]
pub struct AutoSave {
    interval: Duration,
    next_due: Instant,
}

impl AutoSave {
    pub fn new(interval: Duration, now: Instant) -> AutoSave {
        AutoSave {
            interval,
            next_due: now + interval,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_due(&self, now: Instant) -> bool {
        now >= self.next_due
    }

    /// How long the loop may wait for the next event before a save is due.
    pub fn time_remaining(&self, now: Instant) -> Duration {
        self.next_due.saturating_duration_since(now)
    }

    /// Saves silently when due and schedules the next run. Returns `None` if
    /// it was not time yet.
    pub fn run_if_due(&mut self, now: Instant, store: &SessionStore, ledger: &Ledger) -> Option<Result<(), SessionError>> {
        if !self.is_due(now) {
            return None;
        }

        self.next_due = now + self.interval;
        let result = store.save(ledger);
        match &result {
            Ok(()) => debug!("autosave complete"),
            Err(err) => error!("autosave failed, err={}", err),
        }

        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use anyhow::{bail, Result};
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;
    use tempfile::TempDir;

    use super::*;
    use crate::inventory::Inventory;

    fn store_in(dir: &TempDir) -> SessionStore {
        SessionStore::new(dir.path().join(DEFAULT_SESSION_FILE))
    }

    #[test]
    fn test_save_then_load() -> Result<()> {
        let dir = TempDir::new()?;
        let store = store_in(&dir);

        let mut inventory = Inventory::new();
        inventory.add("Rice", dec!(5))?;
        inventory.add("rice", dec!(2.75))?;
        inventory.add("Brown beans", dec!(12.34))?;
        inventory.add("Brown beans", dec!(0.5))?;
        store.save(inventory.ledger())?;

        let loaded = match store.load()? {
            Some(ledger) => ledger,
            None => bail!("session file should exist after a save"),
        };

        let rounded = |ledger: &Ledger| -> Vec<(String, Decimal)> {
            ledger
                .products_iter()
                .map(|(name, weight)| (name.clone(), weight.round_dp(2)))
                .collect()
        };
        assert_eq!(rounded(&loaded), rounded(inventory.ledger()));
        assert!(!dir.path().join("products_session.json.tmp").exists());

        Ok(())
    }

    #[test]
    fn test_saved_weights_are_json_numbers() -> Result<()> {
        let dir = TempDir::new()?;
        let store = store_in(&dir);

        let mut inventory = Inventory::new();
        inventory.add("Rice", dec!(5.5))?;
        store.save(inventory.ledger())?;

        let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(store.path())?)?;
        assert_eq!(value["Rice"].as_f64(), Some(5.5));

        Ok(())
    }

    #[test]
    fn test_save_overwrites() -> Result<()> {
        let dir = TempDir::new()?;
        let store = store_in(&dir);

        let mut inventory = Inventory::new();
        inventory.add("Rice", dec!(5))?;
        store.save(inventory.ledger())?;
        inventory.clear()?;
        store.save(inventory.ledger())?;

        assert_eq!(store.load()?.map(|ledger| ledger.len()), Some(0));

        Ok(())
    }

    #[test]
    fn test_load_missing_file() -> Result<()> {
        let dir = TempDir::new()?;
        let store = store_in(&dir);

        assert!(store.load()?.is_none());
        let (ledger, err) = store.load_or_empty();
        assert!(ledger.is_empty());
        assert!(err.is_none());

        Ok(())
    }

    #[test]
    fn test_load_accepts_integer_weights() -> Result<()> {
        let dir = TempDir::new()?;
        let store = store_in(&dir);
        fs::write(store.path(), r#"{"Rice": 5, "Beans": 2.25}"#)?;

        let (ledger, err) = store.load_or_empty();
        assert!(err.is_none());
        assert_eq!(ledger.weight("Rice"), Some(dec!(5)));
        assert_eq!(ledger.weight("Beans"), Some(dec!(2.25)));

        Ok(())
    }

    #[test]
    fn test_malformed_file_degrades_to_empty() -> Result<()> {
        let dir = TempDir::new()?;
        let store = store_in(&dir);

        for contents in [r#"{"Rice": "#, r#"["Rice", 5]"#, r#"{"Rice": -1}"#, r#"{" ": 1}"#] {
            fs::write(store.path(), contents)?;
            let (ledger, err) = store.load_or_empty();
            assert!(ledger.is_empty());
            assert!(err.is_some(), "`{}` should fail to load", contents);
        }

        Ok(())
    }

    #[test]
    fn test_save_to_missing_directory_fails() -> Result<()> {
        let dir = TempDir::new()?;
        let store = SessionStore::new(dir.path().join("missing").join("session.json"));

        if let Err(err) = store.save(&Ledger::new()) {
            assert!(matches!(err, SessionError::Io(_)));
        } else {
            bail!("saving into a missing directory should fail");
        }

        Ok(())
    }

    #[test]
    fn test_autosave_schedule() -> Result<()> {
        let dir = TempDir::new()?;
        let store = store_in(&dir);
        let start = Instant::now();
        let mut autosave = AutoSave::new(DEFAULT_AUTOSAVE_INTERVAL, start);

        assert!(!autosave.is_due(start));
        assert_eq!(autosave.time_remaining(start), Duration::from_secs(10));
        assert!(autosave.run_if_due(start, &store, &Ledger::new()).is_none());
        assert!(!store.path().exists());

        let later = start + Duration::from_secs(11);
        assert_eq!(autosave.time_remaining(later), Duration::ZERO);
        assert!(matches!(autosave.run_if_due(later, &store, &Ledger::new()), Some(Ok(()))));
        assert!(store.path().exists());
        assert!(!autosave.is_due(later));
        assert!(autosave.is_due(later + Duration::from_secs(10)));

        Ok(())
    }
}
