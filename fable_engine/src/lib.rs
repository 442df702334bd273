#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
//! ** Fable **
//! Branching narrative interpreter: walks a chapter/scene/node story graph,
//! gates choices behind conditions, applies effect batches to the player state
//! and resolves skill checks.

pub const FABLE_VERSION: &str = env!("CARGO_PKG_VERSION");
/// Debug commands (`:flags`, `:give`, ...) are accepted at the prompt.
pub const DEV_MODE: bool = cfg!(feature = "dev-mode");

pub mod condition;
pub mod config;
pub mod data_paths;
pub mod dice;
pub mod effect;
pub mod error;
pub mod events;
pub mod loader;
pub mod player;
pub mod presentation;
pub mod processor;
pub mod quest;
pub mod random_event;
pub mod repl;
pub mod route;
pub mod save_files;
pub mod session;
pub mod story;
pub mod style;
pub mod threshold;

pub use condition::{ConditionReport, Requirement, evaluate};
pub use config::{EngineConfig, InventoryLimits, load_config};
pub use effect::EffectApplier;
pub use error::{Diagnostic, EngineError, Severity};
pub use events::{EventBus, EventLog, GameEvent, Listener, ListenerId, StatKind};
pub use loader::load_story;
pub use player::{Cursor, ItemStack, Meter, PlayerState, Snapshot};
pub use presentation::{CancelToken, ChoiceInput, Clock, ManualClock, Presenter, SystemClock, Typewriter};
pub use processor::{NodeProcessor, PresentedChoice, PresentedOption, Suspension};
pub use repl::run_repl;
pub use session::{RunOutcome, Session, Step};
pub use story::{Catalog, StoryGraph};
