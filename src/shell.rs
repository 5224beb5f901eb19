//! Interactive line shell: parses typed requests, dispatches them to the
//! inventory and reports every outcome as a readable message.

use std::fs::File;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::str::FromStr;
use std::thread;
use std::time::Instant;

use anyhow::Result;
use chrono::NaiveDate;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use log::{debug, error, info, warn};
use thiserror::Error;

use crate::config::Config;
use crate::inventory::{
    format_weight, parse_weight, Add, Edit, HistoryEntry, HistoryLog, Inventory, InventoryError, Mutation, Remove,
    ValidationError,
};
use crate::report::{self, ReportRenderer};
use crate::session::{AutoSave, SessionStore};

const PROMPT: &str = "> ";

const HELP: &str = "\
Commands:
  add <name> <weight>                 add a product or increase its weight
  edit <name> [--name <new>] [--subtract <w>] [--replace <w>]
  delete <name>...                    delete the selected products
  clear                               delete every product
  undo                                revert the last change
  list                                show products and the total weight
  total                               show the total weight
  history                             show the action history
  suggest <prefix>                    list known product names
  save                                save the session now
  export <path>                       export the list to a PDF file
  export-csv [path]                   export the list as CSV (stdout by default)
  help                                show this message
  exit | quit                         save and leave
Quote names that contain spaces, e.g. add \"Brown rice\" 2.5";

#[derive(Debug, PartialEq, Error)]
pub enum ShellError {
    #[error("unknown command `{0}`, type `help` for a list of commands")]
    UnknownCommand(String),
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error("could not read input: {0}")]
    Tokenize(String),
}

/// A parsed shell line. Weights are kept as text until dispatch so that a bad
/// number is reported as a validation error.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Add {
        name: String,
        weight: String,
    },
    Edit {
        name: String,
        new_name: Option<String>,
        subtract: Option<String>,
        replace: Option<String>,
    },
    Delete {
        names: Vec<String>,
    },
    Clear,
    Undo,
    List,
    Total,
    History,
    Suggest {
        prefix: String,
    },
    Save,
    Export {
        path: PathBuf,
    },
    ExportCsv {
        path: Option<PathBuf>,
    },
    Help,
    Exit,
}

impl FromStr for Request {
    type Err = ShellError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let words = shell_words::split(line).map_err(|err| ShellError::Tokenize(err.to_string()))?;
        let (command, args) = match words.split_first() {
            Some((command, args)) => (command.to_lowercase(), args),
            None => return Err(ShellError::Usage("type `help` for a list of commands")),
        };

        match (command.as_str(), args) {
            ("add", [name, weight]) => Ok(Request::Add {
                name: name.clone(),
                weight: weight.clone(),
            }),
            ("add", _) => Err(ShellError::Usage("add <name> <weight>")),
            ("edit", [name, options @ ..]) => parse_edit(name, options),
            ("edit", _) => Err(ShellError::Usage(EDIT_USAGE)),
            ("delete" | "remove", names) if !names.is_empty() => Ok(Request::Delete { names: names.to_vec() }),
            ("delete" | "remove", _) => Err(ShellError::Usage("delete <name>...")),
            ("clear", []) => Ok(Request::Clear),
            ("undo", []) => Ok(Request::Undo),
            ("list", []) => Ok(Request::List),
            ("total", []) => Ok(Request::Total),
            ("history", []) => Ok(Request::History),
            ("suggest", []) => Ok(Request::Suggest { prefix: String::new() }),
            ("suggest", [prefix]) => Ok(Request::Suggest { prefix: prefix.clone() }),
            ("suggest", _) => Err(ShellError::Usage("suggest <prefix>")),
            ("save", []) => Ok(Request::Save),
            ("export", [path]) => Ok(Request::Export { path: PathBuf::from(path) }),
            ("export", _) => Err(ShellError::Usage("export <path>")),
            ("export-csv", []) => Ok(Request::ExportCsv { path: None }),
            ("export-csv", [path]) => Ok(Request::ExportCsv {
                path: Some(PathBuf::from(path)),
            }),
            ("export-csv", _) => Err(ShellError::Usage("export-csv [path]")),
            ("help", _) => Ok(Request::Help),
            ("exit" | "quit", []) => Ok(Request::Exit),
            ("clear" | "undo" | "list" | "total" | "history" | "save" | "exit" | "quit", _) => {
                Err(ShellError::Usage("this command takes no arguments"))
            },
            _ => Err(ShellError::UnknownCommand(command)),
        }
    }
}

const EDIT_USAGE: &str = "edit <name> [--name <new>] [--subtract <w>] [--replace <w>]";

fn parse_edit(name: &str, options: &[String]) -> Result<Request, ShellError> {
    let mut new_name = None;
    let mut subtract = None;
    let mut replace = None;

    let mut options = options.iter();
    while let Some(flag) = options.next() {
        let slot = match flag.as_str() {
            "--name" => &mut new_name,
            "--subtract" => &mut subtract,
            "--replace" => &mut replace,
            _ => return Err(ShellError::Usage(EDIT_USAGE)),
        };

        match options.next() {
            Some(value) => *slot = Some(value.clone()),
            None => return Err(ShellError::Usage(EDIT_USAGE)),
        }
    }

    Ok(Request::Edit {
        name: name.to_string(),
        new_name,
        subtract,
        replace,
    })
}

impl Request {
    /// Builds the ledger mutation for requests that change the product list.
    pub fn mutation(&self) -> Result<Option<Mutation>, ValidationError> {
        let mutation = match self {
            Request::Add { name, weight } => Add::parse(name, weight)?.into(),
            Request::Edit {
                name,
                new_name,
                subtract,
                replace,
            } => {
                let mut edit = Edit::new(name);
                if let Some(new_name) = new_name {
                    edit = edit.rename(new_name);
                }
                if let Some(subtract) = subtract {
                    edit = edit.subtract(parse_weight(subtract)?);
                }
                if let Some(replace) = replace {
                    edit = edit.replace(parse_weight(replace)?);
                }
                edit.into()
            },
            Request::Delete { names } => Remove::new(names.iter().cloned())?.into(),
            Request::Clear => Mutation::Clear(crate::inventory::Clear),
            _ => return Ok(None),
        };

        Ok(Some(mutation))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

pub struct Shell<R: ReportRenderer, W: Write> {
    inventory: Inventory,
    store: SessionStore,
    renderer: R,
    out: W,
    config: Config,
}

impl<R: ReportRenderer, W: Write> Shell<R, W> {
    /// Loads the session file. A file that cannot be read is reported and the
    /// shell starts with an empty list.
    pub fn start(config: Config, renderer: R, mut out: W) -> io::Result<Shell<R, W>> {
        let store = SessionStore::new(config.session_file.clone());
        let (ledger, load_error) = store.load_or_empty();
        if let Some(err) = load_error {
            writeln!(out, "Could not load the session: {}", err)?;
        }

        Ok(Shell {
            inventory: Inventory::with_ledger(ledger, config.undo_limit),
            store,
            renderer,
            out,
            config,
        })
    }

    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    pub fn into_output(self) -> W {
        self.out
    }

    /// Handles one input line. `confirm` is asked for a yes/no answer after
    /// the question has been printed.
    pub fn handle_line(&mut self, line: &str, confirm: &mut dyn FnMut() -> bool) -> io::Result<Flow> {
        if line.trim().is_empty() {
            return Ok(Flow::Continue);
        }

        match line.parse::<Request>() {
            Ok(request) => self.handle(request, confirm),
            Err(err) => {
                writeln!(self.out, "Error: {}", err)?;
                Ok(Flow::Continue)
            },
        }
    }

    pub fn handle(&mut self, request: Request, confirm: &mut dyn FnMut() -> bool) -> io::Result<Flow> {
        debug!("handling {:?}", request);

        let mutation = match request.mutation() {
            Ok(mutation) => mutation,
            Err(err) => {
                writeln!(self.out, "Error: {}", err)?;
                return Ok(Flow::Continue);
            },
        };

        if let Some(mutation) = mutation {
            if let Some(question) = confirmation_question(&request) {
                write!(self.out, "{} [y/N] ", question)?;
                self.out.flush()?;
                if !confirm() {
                    writeln!(self.out, "Cancelled.")?;
                    return Ok(Flow::Continue);
                }
            }

            return self.apply(mutation);
        }

        match request {
            Request::Undo => match self.inventory.undo() {
                Ok(()) => {
                    writeln!(self.out, "Undid the last change.")?;
                    self.write_total()?;
                },
                Err(InventoryError::EmptyStack) => writeln!(self.out, "Nothing to undo.")?,
                Err(err) => writeln!(self.out, "Error: {}", err)?,
            },
            Request::List => self.write_list()?,
            Request::Total => self.write_total()?,
            Request::History => {
                let text = format_history(self.inventory.history());
                write!(self.out, "{}", text)?;
            },
            Request::Suggest { prefix } => {
                let names = self.inventory.names_matching(&prefix);
                if names.is_empty() {
                    writeln!(self.out, "No matching products.")?;
                } else {
                    for name in names {
                        writeln!(self.out, "  {}", name)?;
                    }
                }
            },
            Request::Save => match self.store.save(self.inventory.ledger()) {
                Ok(()) => writeln!(self.out, "Session saved to {}.", self.store.path().display())?,
                Err(err) => writeln!(self.out, "Could not save the session: {}", err)?,
            },
            Request::Export { path } => match report::export_report(&self.renderer, self.inventory.ledger(), &path) {
                Ok(pages) => writeln!(self.out, "List exported to {} ({} page(s)).", path.display(), pages)?,
                Err(err) => writeln!(self.out, "Could not export the PDF: {}", err)?,
            },
            Request::ExportCsv { path } => self.export_csv(path)?,
            Request::Help => writeln!(self.out, "{}", HELP)?,
            Request::Exit => return Ok(Flow::Exit),
            Request::Add { .. } | Request::Edit { .. } | Request::Delete { .. } | Request::Clear => {},
        }

        Ok(Flow::Continue)
    }

    fn apply(&mut self, mutation: Mutation) -> io::Result<Flow> {
        let before = self.inventory.ledger().len();
        let message = match &mutation {
            Mutation::Add(add) if self.inventory.ledger().contains(add.name()) => {
                Some(format!("Added {} to {}.", format_weight(add.weight()), add.name()))
            },
            Mutation::Add(add) => Some(format!("Added {} ({}).", add.name(), format_weight(add.weight()))),
            Mutation::Remove(_) => None,
            Mutation::Clear(_) => Some("The list has been cleared.".to_string()),
            Mutation::Edit(edit) => Some(format!("Updated {}.", edit.target_name())),
        };

        match self.inventory.execute(mutation) {
            Ok(()) => {
                let message = message
                    .unwrap_or_else(|| format!("Deleted {} product(s).", before - self.inventory.ledger().len()));
                writeln!(self.out, "{}", message)?;
                self.write_total()?;
            },
            Err(err) => writeln!(self.out, "Error: {}", err)?,
        }

        Ok(Flow::Continue)
    }

    fn export_csv(&mut self, path: Option<PathBuf>) -> io::Result<()> {
        let result = match &path {
            Some(path) => File::create(path)
                .map_err(report::ReportError::from)
                .and_then(|file| report::export_csv(self.inventory.ledger(), file)),
            None => report::export_csv(self.inventory.ledger(), &mut self.out),
        };

        match (result, path) {
            (Ok(()), Some(path)) => writeln!(self.out, "List exported to {}.", path.display()),
            (Ok(()), None) => Ok(()),
            (Err(err), _) => writeln!(self.out, "Could not export the CSV: {}", err),
        }
    }

    fn write_list(&mut self) -> io::Result<()> {
        let view = self.inventory.sorted_view();
        if view.is_empty() {
            writeln!(self.out, "No products.")?;
        }

        for (name, weight) in view {
            writeln!(self.out, "  {}: {}", name, format_weight(weight))?;
        }

        self.write_total()
    }

    fn write_total(&mut self) -> io::Result<()> {
        match self.inventory.total_weight() {
            Some(total) => writeln!(self.out, "Total weight: {}", format_weight(total)),
            None => writeln!(self.out, "Error: total weight is too large to display"),
        }
    }

    fn prompt(&mut self) -> io::Result<()> {
        write!(self.out, "{}", PROMPT)?;
        self.out.flush()
    }

    /// Event loop. Input lines arrive on `input`; between lines the autosave
    /// runs whenever it is due. Everything happens on the calling thread.
    pub fn run(mut self, input: Receiver<String>) -> Result<()> {
        let mut autosave = AutoSave::new(self.config.autosave_interval, Instant::now());
        info!(
            "session started with {} product(s), autosave every {:?}",
            self.inventory.ledger().len(),
            autosave.interval()
        );
        self.prompt()?;

        loop {
            match input.recv_timeout(autosave.time_remaining(Instant::now())) {
                Ok(line) => {
                    let mut confirm = || read_answer(&input);
                    if self.handle_line(&line, &mut confirm)? == Flow::Exit {
                        break;
                    }
                    self.prompt()?;
                },
                Err(RecvTimeoutError::Timeout) => {},
                Err(RecvTimeoutError::Disconnected) => {
                    writeln!(self.out)?;
                    break;
                },
            }

            if let Some(Err(err)) = autosave.run_if_due(Instant::now(), &self.store, self.inventory.ledger()) {
                writeln!(self.out, "Autosave failed: {}", err)?;
            }
        }

        self.shutdown()
    }

    fn shutdown(mut self) -> Result<()> {
        if self.config.save_on_exit {
            if let Err(err) = self.store.save(self.inventory.ledger()) {
                warn!("failed to save session on exit, err={}", err);
                writeln!(self.out, "Could not save the session: {}", err)?;
            }
        }

        self.out.flush()?;
        Ok(())
    }
}

fn confirmation_question(request: &Request) -> Option<String> {
    match request {
        Request::Delete { names } => Some(format!("Delete {} selected product(s)?", names.len())),
        Request::Clear => Some("Clear the whole list?".to_string()),
        _ => None,
    }
}

fn read_answer(input: &Receiver<String>) -> bool {
    match input.recv() {
        Ok(answer) => is_yes(&answer),
        Err(_) => false,
    }
}

pub fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

/// Groups consecutive entries by calendar date, as shown by `history`.
pub fn group_by_date<'a, I>(entries: I) -> Vec<(NaiveDate, Vec<&'a HistoryEntry>)>
where
    I: IntoIterator<Item = &'a HistoryEntry>,
{
    let mut groups: Vec<(NaiveDate, Vec<&'a HistoryEntry>)> = Vec::new();
    for entry in entries {
        let date = entry.timestamp().date();
        if let Some((last, group)) = groups.last_mut() {
            if *last == date {
                group.push(entry);
                continue;
            }
        }

        groups.push((date, vec![entry]));
    }

    groups
}

pub fn format_history(log: &HistoryLog) -> String {
    if log.is_empty() {
        return "No actions recorded.\n".to_string();
    }

    let mut text = String::from("=== Action history ===\n");
    for (date, entries) in group_by_date(log.entries()) {
        text.push_str(&format!("\n{}:\n", date.format("%Y-%m-%d")));
        for entry in entries {
            text.push_str(&format!(
                "  {} - {}: {}\n",
                entry.timestamp().format("%H:%M:%S"),
                entry.kind(),
                entry.description()
            ));
        }
    }

    text
}

/// Forwards stdin lines over a channel so the event loop can wait with a
/// timeout. The channel disconnects at end of input.
pub fn spawn_stdin_reader() -> Receiver<String> {
    let (sender, receiver) = crossbeam_channel::unbounded();

    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if sender.send(line).is_err() {
                        break;
                    }
                },
                Err(err) => {
                    error!("failed to read stdin, err={}", err);
                    break;
                },
            }
        }
    });

    receiver
}

#[cfg(test)]
#[path = "shell_tests.rs"]
mod tests;
