//! `repl::system` module
//!
//! Prompt handlers for saving, loading and leaving the game.

use colored::Colorize;
use log::{info, warn};

use crate::repl::{ReplContext, ReplControl};
use crate::save_files::{
    SaveFile, SaveFileStatus, build_save_entries, delete_save, format_modified, format_play_time, load_slot,
    write_save,
};
use crate::session::Session;
use crate::style::GameStyle;

pub fn help_handler() {
    println!("\n{}", "Commands".section_style());
    for (command, what) in [
        ("<number>", "pick an option"),
        ("stats", "attributes, pools and relationships"),
        ("inv", "what you are carrying"),
        ("use <item>", "use a carried item"),
        ("quests", "quest journal"),
        ("routes / route <id>", "discovered routes, or commit to one"),
        ("save <slot> / load <slot>", "save or restore the game"),
        ("saves / delete <slot>", "list or remove saved games"),
        ("quit", "leave the story"),
    ] {
        println!("  {}{what}", format!("{command:<28}").option_style());
    }
    if crate::DEV_MODE {
        for (command, what) in [
            (":flags / :set-flag / :clear-flag", "inspect and edit flags"),
            (":give <item> [n] / :stat <id> <n>", "edit inventory and stats"),
        ] {
            println!("  {}{what}", format!("{command:<36}").option_style());
        }
    }
}

pub fn save_handler(session: &Session, ctx: &ReplContext, slot: &str) -> ReplControl {
    let save = SaveFile::new(session.graph().meta(), session.snapshot());
    match write_save(&ctx.save_dir, slot, &save, ctx.save_slots) {
        Ok(_) => {
            println!("Game saved as {}.", slot.underline());
            info!("└─ action: saved game to slot '{slot}'");
        },
        Err(err) => {
            warn!("save to '{slot}' failed: {err:#}");
            println!("{}", format!("Could not save: {err}").error_style());
        },
    }
    ReplControl::Continue
}

pub fn load_handler(session: &mut Session, ctx: &ReplContext, slot: &str) -> ReplControl {
    let save = match load_slot(&ctx.save_dir, slot, session.graph().meta()) {
        Ok(save) => save,
        Err(err) => {
            warn!("load of '{slot}' failed: {err:#}");
            println!("{}", format!("Could not load: {err}").error_style());
            return ReplControl::Continue;
        },
    };
    match session.restore(save.snapshot) {
        Ok(()) => {
            println!("Saved game {} loaded ({}).", slot.underline().green(), save.saved_at);
            info!("└─ action: loaded slot '{slot}'");
            ReplControl::Resume
        },
        Err(err) => {
            println!("{}", err.to_string().error_style());
            ReplControl::Continue
        },
    }
}

pub fn list_saves_handler(ctx: &ReplContext) -> ReplControl {
    let entries = match build_save_entries(&ctx.save_dir) {
        Ok(entries) => entries,
        Err(err) => {
            println!("{}", format!("Could not read saves: {err}").error_style());
            return ReplControl::Continue;
        },
    };
    if entries.is_empty() {
        println!("No saved games yet.");
        return ReplControl::Continue;
    }
    println!("\n{}", "Saved games".section_style());
    for entry in entries {
        let when = entry.modified.map(format_modified).unwrap_or_default();
        match (&entry.status, &entry.summary) {
            (SaveFileStatus::Corrupted { message }, _) => {
                println!("  {} {}", entry.slot.denied_style(), message.error_style());
            },
            (status, Some(summary)) => {
                let note = if let SaveFileStatus::VersionMismatch { save_version, .. } = status {
                    format!(" (v{save_version})").error_style().to_string()
                } else {
                    String::new()
                };
                println!(
                    "  {}{note}  {}  played {}  {when}",
                    entry.slot.option_style(),
                    summary.position,
                    format_play_time(summary.play_time)
                );
            },
            (_, None) => println!("  {}  {when}", entry.slot),
        }
    }
    ReplControl::Continue
}

pub fn delete_handler(ctx: &ReplContext, slot: &str) -> ReplControl {
    match delete_save(&ctx.save_dir, slot) {
        Ok(_) => println!("Deleted save {}.", slot.underline()),
        Err(err) => println!("{}", err.to_string().error_style()),
    }
    ReplControl::Continue
}

/// Leave the game.
pub fn quit_handler(session: &Session) -> ReplControl {
    let state = session.state();
    info!("player quit at {}", state.cursor());
    info!("ending flags:");
    state.flags().for_each(|flag| info!("* {flag}"));
    info!("ending inventory:");
    state.inventory().iter().for_each(|stack| info!("- {} x{}", stack.item, stack.count));
    println!("\nYou close the book after {}. Farewell.", format_play_time(state.play_time()));
    ReplControl::Quit
}

/// Closing summary shown when the story reaches its end.
pub fn ending_summary(session: &Session) {
    let state = session.state();
    println!("\n{}", "Journey's end".section_style());
    if let Some(route) = session.selected_route() {
        println!("  Route: {}", route.name.quest_style());
    }
    let completed = session
        .quest_log()
        .into_iter()
        .filter(|(_, status, _)| *status == crate::quest::QuestStatus::Completed)
        .count();
    println!("  Quests completed: {completed}/{}", session.graph().quests().len());
    println!("  Time played: {}", format_play_time(state.play_time()));
    let problems = session.diagnostics().len();
    if problems > 0 {
        info!("{problems} diagnostics raised during play");
    }
}
