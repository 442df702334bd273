//! Terminal input for the play prompt.
//!
//! Wraps rustyline with command and save-slot completion, falling back to
//! plain stdin when no terminal is attached.

use std::fs;
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};

use log::{info, warn};
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::Validator;
use rustyline::{Context, Helper};

use crate::save_files::collect_save_slots;

/// Outcome of reading a line from the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    Line(String),
    Eof,
    Interrupted,
}

const COMMANDS: &[&str] = &[
    "delete", "help", "inv", "inventory", "load", "quests", "quit", "routes", "route", "save", "saves", "stats", "use",
];

#[cfg(feature = "dev-mode")]
const DEV_COMMANDS: &[&str] = &[":flags", ":set-flag", ":clear-flag", ":give", ":stat"];
#[cfg(not(feature = "dev-mode"))]
const DEV_COMMANDS: &[&str] = &[];

/// Commands whose argument is an existing save slot.
const SLOT_COMMANDS: &[&str] = &["load", "delete"];

type PromptEditor = rustyline::Editor<FableHelper, DefaultHistory>;

struct FableHelper {
    save_dir: PathBuf,
}

impl Helper for FableHelper {}

impl Completer for FableHelper {
    type Candidate = Pair;

    fn complete(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> rustyline::Result<(usize, Vec<Self::Candidate>)> {
        let (start, prefix) = current_prefix(line, pos);
        if prefix.is_empty() {
            return Ok((start, Vec::new()));
        }
        let lower = prefix.to_lowercase();
        if let Some((command, partial)) = lower.split_once(char::is_whitespace)
            && SLOT_COMMANDS.contains(&command)
        {
            let partial = partial.trim_start();
            let offset = start + prefix.len() - partial.len();
            let pairs = slot_names(&self.save_dir)
                .into_iter()
                .filter(|slot| slot.to_lowercase().starts_with(partial))
                .map(|slot| Pair {
                    display: slot.clone(),
                    replacement: slot,
                })
                .collect();
            return Ok((offset, pairs));
        }
        let pairs = COMMANDS
            .iter()
            .chain(DEV_COMMANDS)
            .filter(|term| term.starts_with(&lower))
            .map(|term| Pair {
                display: (*term).to_string(),
                replacement: (*term).to_string(),
            })
            .collect();
        Ok((start, pairs))
    }
}

impl Hinter for FableHelper {
    type Hint = String;
}

impl Highlighter for FableHelper {}

impl Validator for FableHelper {}

fn current_prefix(line: &str, pos: usize) -> (usize, String) {
    let slice = &line[..pos];
    let trimmed = slice.trim_start_matches(char::is_whitespace);
    (pos - trimmed.len(), trimmed.to_string())
}

fn slot_names(dir: &Path) -> Vec<String> {
    match collect_save_slots(dir) {
        Ok(slots) => {
            let mut names: Vec<String> = slots.into_iter().map(|slot| slot.slot).collect();
            names.dedup();
            names
        },
        Err(err) => {
            warn!("failed to enumerate save slots for completion: {err}");
            Vec::new()
        },
    }
}

/// Owns the active input backend.
///
/// Prefers rustyline on an interactive terminal, otherwise reads stdin directly.
pub struct InputManager {
    backend: Backend,
}

impl InputManager {
    pub fn new(save_dir: &Path) -> Self {
        let backend = if io::stdin().is_terminal() {
            match RustylineInput::new(save_dir) {
                Ok(editor) => {
                    info!("using rustyline-backed prompt input");
                    Backend::Rustyline(Box::new(editor))
                },
                Err(err) => {
                    warn!("failed to initialize rustyline ({err}), falling back to basic stdin");
                    Backend::plain()
                },
            }
        } else {
            info!("stdin is not a TTY; using basic input mode");
            Backend::plain()
        };
        Self { backend }
    }

    /// Read a line. If rustyline fails, switch to plain stdin and retry once.
    ///
    /// # Errors
    /// Unrecoverable IO errors from the plain backend.
    pub fn read_line(&mut self, prompt: &str) -> io::Result<InputEvent> {
        match self.backend.read_line(prompt) {
            Ok(event) => Ok(event),
            Err(err) if self.backend.is_rustyline() => {
                warn!("rustyline input failed: {err} -- switching to basic stdin");
                self.backend = Backend::plain();
                self.backend.read_line(prompt)
            },
            Err(err) => Err(err),
        }
    }
}

enum Backend {
    Rustyline(Box<RustylineInput>),
    Plain(StdinInput),
}

impl Backend {
    fn plain() -> Self {
        Backend::Plain(StdinInput::default())
    }

    fn is_rustyline(&self) -> bool {
        matches!(self, Backend::Rustyline(_))
    }

    fn read_line(&mut self, prompt: &str) -> io::Result<InputEvent> {
        match self {
            Backend::Rustyline(editor) => editor.read_line(prompt),
            Backend::Plain(stdin) => stdin.read_line(prompt),
        }
    }
}

struct RustylineInput {
    editor: PromptEditor,
    history_path: Option<PathBuf>,
}

impl RustylineInput {
    fn new(save_dir: &Path) -> io::Result<Self> {
        let mut editor = PromptEditor::new().map_err(map_io_err)?;
        editor.set_helper(Some(FableHelper {
            save_dir: save_dir.to_path_buf(),
        }));
        let history_path = history_file_path();

        if let Some(path) = history_path.as_ref() {
            if let Some(dir) = path.parent()
                && let Err(err) = fs::create_dir_all(dir)
            {
                warn!("failed to create history directory {}: {err}", dir.display());
            }
            match editor.load_history(path) {
                Ok(()) => {},
                Err(ReadlineError::Io(ref io_err)) if io_err.kind() == io::ErrorKind::NotFound => {
                    info!("no prior history found at {}, starting fresh", path.display());
                },
                Err(other) => warn!("failed to load history from {}: {other}", path.display()),
            }
        }

        Ok(Self { editor, history_path })
    }

    fn read_line(&mut self, prompt: &str) -> io::Result<InputEvent> {
        match self.editor.readline(prompt) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    if let Err(err) = self.editor.add_history_entry(line.as_str()) {
                        warn!("failed to append to history: {err}");
                    }
                    if let Some(path) = self.history_path.as_ref()
                        && let Err(err) = self.editor.save_history(path)
                    {
                        warn!("failed to persist history to {}: {err}", path.display());
                    }
                }
                Ok(InputEvent::Line(line))
            },
            Err(err) => convert_readline_error(err),
        }
    }
}

#[derive(Default)]
struct StdinInput {
    buffer: String,
}

impl StdinInput {
    fn read_line(&mut self, prompt: &str) -> io::Result<InputEvent> {
        print!("{prompt}");
        io::stdout().flush()?;

        self.buffer.clear();
        if io::stdin().read_line(&mut self.buffer)? == 0 {
            return Ok(InputEvent::Eof);
        }
        let line = self.buffer.trim_end_matches(['\n', '\r']);
        Ok(InputEvent::Line(line.to_string()))
    }
}

fn convert_readline_error(err: ReadlineError) -> io::Result<InputEvent> {
    match err {
        ReadlineError::Interrupted => Ok(InputEvent::Interrupted),
        ReadlineError::Eof => Ok(InputEvent::Eof),
        other => Err(map_io_err(other)),
    }
}

fn map_io_err(err: ReadlineError) -> io::Error {
    match err {
        ReadlineError::Io(io_err) => io_err,
        other => io::Error::other(other),
    }
}

fn history_file_path() -> Option<PathBuf> {
    dirs::data_dir()
        .or_else(dirs::data_local_dir)
        .map(|base| build_history_path(&base))
}

fn build_history_path(base: &Path) -> PathBuf {
    base.join("fable").join("history.txt")
}
