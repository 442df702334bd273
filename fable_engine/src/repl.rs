//! Interactive terminal front end.
//!
//! Drives a [`Session`] step by step, rendering through [`TerminalPresenter`].
//! At a choice prompt the player types an option number or one of the
//! commands handled by the submodules.

pub mod dev;
mod input;
pub mod status;
pub mod system;
mod terminal;

pub use terminal::{TerminalPresenter, indented_block, normal_block};

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use log::info;

use crate::presentation::{ChoiceInput, Presenter};
use crate::processor::{PresentedChoice, Suspension};
use crate::save_files::save_dir_for_story;
use crate::session::Session;
use crate::style::GameStyle;
use dev::DevCommand;
use input::InputManager;

/// Control flow signal returned by command handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplControl {
    /// Stay at the current prompt.
    Continue,
    /// The game state was replaced; resume stepping the story.
    Resume,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Help,
    Save(String),
    Load(String),
    ListSaves,
    Delete(String),
    Stats,
    Inventory,
    Quests,
    Routes,
    ChooseRoute(String),
    Use(String),
    Quit,
    Dev(DevCommand),
    Unknown(String),
}

/// Parse a non-numeric line typed at a choice prompt.
pub fn parse_command(line: &str) -> ReplCommand {
    let line = line.trim();
    let (verb, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let arg = rest.trim().to_string();
    match (verb.to_lowercase().as_str(), arg.is_empty()) {
        ("help" | "?", _) => ReplCommand::Help,
        ("save", false) => ReplCommand::Save(arg),
        ("load", false) => ReplCommand::Load(arg),
        ("delete", false) => ReplCommand::Delete(arg),
        ("saves", _) => ReplCommand::ListSaves,
        ("stats" | "status", _) => ReplCommand::Stats,
        ("inv" | "inventory" | "i", _) => ReplCommand::Inventory,
        ("quests" | "journal", _) => ReplCommand::Quests,
        ("routes", _) | ("route", true) => ReplCommand::Routes,
        ("route", false) => ReplCommand::ChooseRoute(arg),
        ("use", false) => ReplCommand::Use(arg),
        ("quit" | "exit" | "q", _) => ReplCommand::Quit,
        (dev, _) if crate::DEV_MODE && dev.starts_with(':') => {
            dev::parse_dev_command(dev, &arg).map_or_else(|| ReplCommand::Unknown(line.to_string()), ReplCommand::Dev)
        },
        _ => ReplCommand::Unknown(line.to_string()),
    }
}

/// Everything command handlers need besides the session.
pub struct ReplContext {
    pub save_dir: PathBuf,
    pub save_slots: usize,
}

/// Play `session` in the terminal until the story ends or the player quits.
///
/// # Errors
/// Fails if the story's save directory cannot be created.
pub fn run_repl(session: &mut Session) -> Result<()> {
    let ctx = ReplContext {
        save_dir: save_dir_for_story(&session.config().save_dir, session.graph().meta()),
        save_slots: session.config().save_slots,
    };
    fs::create_dir_all(&ctx.save_dir)
        .with_context(|| format!("creating save directory {}", ctx.save_dir.display()))?;
    let input = InputManager::new(&ctx.save_dir);
    let mut presenter = TerminalPresenter::new(session.shared_graph(), session.config(), input);
    let mut last_tick = Instant::now();

    loop {
        let step = session.step();
        for event in &step.events {
            presenter.notify(event);
        }
        let control = match step.suspension {
            Suspension::Reveal { speaker, text } => {
                let cancel = session.cancel_token();
                cancel.reset();
                presenter.reveal(speaker.as_deref(), &text, &cancel);
                ReplControl::Continue
            },
            Suspension::Delay(delay) => {
                presenter.wait(delay);
                ReplControl::Continue
            },
            Suspension::AwaitChoice(choice) => prompt(session, &mut presenter, &ctx, choice),
            Suspension::Ended => {
                system::ending_summary(session);
                ReplControl::Quit
            },
            Suspension::Halted(diagnostic) => {
                println!("\n{}", diagnostic.to_string().error_style());
                println!("{}", "The story cannot continue from here.".denied_style());
                ReplControl::Quit
            },
        };
        session.add_play_time(last_tick.elapsed());
        last_tick = Instant::now();
        match control {
            ReplControl::Quit => break,
            ReplControl::Resume => presenter.reset_scene(),
            ReplControl::Continue => {},
        }
    }
    info!("leaving the story after {:?} of play", session.state().play_time());
    Ok(())
}

/// Handle input at a choice until an option is taken or the game is left.
fn prompt(
    session: &mut Session,
    presenter: &mut TerminalPresenter,
    ctx: &ReplContext,
    mut choice: PresentedChoice,
) -> ReplControl {
    loop {
        match presenter.choose(&choice) {
            ChoiceInput::Select(index) => match session.choose(index) {
                Ok(events) => {
                    for event in &events {
                        presenter.notify(event);
                    }
                    return ReplControl::Continue;
                },
                Err(err) => presenter.rejected(&err),
            },
            ChoiceInput::Quit => return system::quit_handler(session),
            ChoiceInput::Command(line) => {
                let control = match parse_command(&line) {
                    ReplCommand::Help => {
                        system::help_handler();
                        ReplControl::Continue
                    },
                    ReplCommand::Save(slot) => system::save_handler(session, ctx, &slot),
                    ReplCommand::Load(slot) => system::load_handler(session, ctx, &slot),
                    ReplCommand::ListSaves => system::list_saves_handler(ctx),
                    ReplCommand::Delete(slot) => system::delete_handler(ctx, &slot),
                    ReplCommand::Stats => status::stats_handler(session),
                    ReplCommand::Inventory => status::inventory_handler(session),
                    ReplCommand::Quests => status::quests_handler(session),
                    ReplCommand::Routes => status::routes_handler(session),
                    ReplCommand::ChooseRoute(route) => status::choose_route_handler(session, presenter, &route),
                    ReplCommand::Use(item) => status::use_handler(session, presenter, &item),
                    ReplCommand::Quit => system::quit_handler(session),
                    ReplCommand::Dev(command) => dev::dev_handler(session, presenter, &command),
                    ReplCommand::Unknown(text) => {
                        println!("{}", format!("'{text}' is not an option or command (try 'help').").denied_style());
                        ReplControl::Continue
                    },
                };
                if control != ReplControl::Continue {
                    return control;
                }
            },
        }
        if let Some(current) = session.current_choice() {
            choice = current;
        }
    }
}
