//! Error taxonomy for the narrative engine.
//!
//! [`EngineError`] covers everything the interpreter itself can report. Problems in
//! story data never abort a session: they are wrapped in a [`Diagnostic`], logged,
//! and recorded so the operator can inspect them afterwards.

use std::fmt;

use fable_data::Id;
use log::{error, warn};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// A next/target reference that does not resolve inside the current scene.
    #[error("node '{node}' in scene '{scene}' points to missing node '{target}'")]
    GraphIntegrity { scene: Id, node: Id, target: Id },
    /// An item, attribute or pool id absent from the loaded catalogs.
    #[error("unknown {kind} '{id}' ({context})")]
    DataMissing { kind: &'static str, id: Id, context: String },
    #[error("malformed '{clause}' clause ignored ({context})")]
    ConditionMalformed { clause: &'static str, context: String },
    #[error("inventory full ({capacity} stacks): no room for '{item}'")]
    InventoryFull { item: Id, capacity: usize },
    #[error("only {held} of '{item}' held, {requested} needed")]
    NotInInventory { item: Id, requested: u32, held: u32 },
    #[error("'{item}' cannot be used")]
    NotUsable { item: Id },
    #[error("option {index} is unavailable: {reason}")]
    OptionDisabled { index: usize, reason: String },
    #[error("there is no option {index} ({available} available)")]
    NoSuchOption { index: usize, available: usize },
    #[error("the story is not waiting for a choice")]
    NotAwaitingChoice,
    /// Passthrough nodes looped without ever suspending.
    #[error("no suspension after {steps} silent steps at {cursor}")]
    Stalled { cursor: String, steps: usize },
    #[error("route '{route}' cannot be selected: {reason}")]
    RouteUnavailable { route: Id, reason: String },
    /// Snapshot rejected or unreadable; the in-memory state is left untouched.
    #[error("persistence: {0}")]
    Persistence(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

/// A logged, non-fatal engine problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub error: EngineError,
}

impl Diagnostic {
    pub fn warning(error: EngineError) -> Self {
        Self {
            severity: Severity::Warning,
            error,
        }
    }

    pub fn error(error: EngineError) -> Self {
        Self {
            severity: Severity::Error,
            error,
        }
    }

    /// Write the diagnostic to the log at its severity.
    pub fn log(&self) {
        match self.severity {
            Severity::Warning => warn!("{}", self.error),
            Severity::Error => error!("{}", self.error),
        }
    }

    pub fn is_graph_integrity(&self) -> bool {
        matches!(self.error, EngineError::GraphIntegrity { .. })
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "{label}: {}", self.error)
    }
}
