use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::session::{DEFAULT_AUTOSAVE_INTERVAL, DEFAULT_SESSION_FILE};

#[derive(Debug, Parser)]
#[command(name = "weightbook", version, about = "Track product weights, with undo, history and PDF export")]
pub struct Args {
    /// Session file holding the product list.
    #[arg(long, value_name = "PATH", env = "WEIGHTBOOK_SESSION", default_value = DEFAULT_SESSION_FILE)]
    pub session: PathBuf,

    /// Seconds between automatic saves (minimum 1).
    #[arg(long = "autosave-secs", value_name = "SECS", env = "WEIGHTBOOK_AUTOSAVE_SECS")]
    pub autosave_secs: Option<u64>,

    /// Maximum number of undo steps kept (unbounded when omitted).
    #[arg(long = "undo-limit", value_name = "STEPS")]
    pub undo_limit: Option<usize>,

    /// Do not save the session when leaving with `exit`.
    #[arg(long = "no-save-on-exit")]
    pub no_save_on_exit: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub session_file: PathBuf,
    pub autosave_interval: Duration,
    pub undo_limit: Option<usize>,
    pub save_on_exit: bool,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            session_file: PathBuf::from(DEFAULT_SESSION_FILE),
            autosave_interval: DEFAULT_AUTOSAVE_INTERVAL,
            undo_limit: None,
            save_on_exit: true,
        }
    }
}

impl From<Args> for Config {
    fn from(args: Args) -> Config {
        let autosave_interval = args
            .autosave_secs
            .map(|secs| Duration::from_secs(secs.max(1)))
            .unwrap_or(DEFAULT_AUTOSAVE_INTERVAL);

        Config {
            session_file: args.session,
            autosave_interval,
            undo_limit: args.undo_limit,
            save_on_exit: !args.no_save_on_exit,
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::from(Args::parse_from(["weightbook", "--session", DEFAULT_SESSION_FILE]));
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_flags() {
        let args = Args::parse_from([
            "weightbook",
            "--session",
            "/tmp/pantry.json",
            "--autosave-secs",
            "0",
            "--undo-limit",
            "25",
            "--no-save-on-exit",
        ]);
        let config = Config::from(args);

        assert_eq!(config.session_file, PathBuf::from("/tmp/pantry.json"));
        assert_eq!(config.autosave_interval, Duration::from_secs(1));
        assert_eq!(config.undo_limit, Some(25));
        assert!(!config.save_on_exit);
    }
}
