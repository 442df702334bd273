//! `repl::status` module
//!
//! Prompt handlers that inspect the player: stats, inventory, quests and
//! routes, plus item use and route selection.

use colored::Colorize;

use crate::presentation::Presenter;
use crate::quest::QuestStatus;
use crate::repl::{ReplControl, TerminalPresenter};
use crate::session::Session;
use crate::style::GameStyle;

pub fn stats_handler(session: &Session) -> ReplControl {
    let state = session.state();
    let catalog = session.graph().catalog();
    println!("\n{}", "Attributes".section_style());
    for (id, meter) in state.attributes() {
        println!("  {:<16}{}", catalog.stat_name(id), format!("{}/{}", meter.value, meter.max).stat_style());
    }
    if state.pools().next().is_some() {
        println!("{}", "Pools".section_style());
        for (id, meter) in state.pools() {
            println!("  {:<16}{}", catalog.stat_name(id), format!("{}/{}", meter.value, meter.max).stat_style());
        }
    }
    if state.relationships().next().is_some() {
        println!("{}", "Relationships".section_style());
        for (id, value) in state.relationships() {
            println!("  {:<16}{value:+}", catalog.character_name(id));
        }
    }
    ReplControl::Continue
}

pub fn inventory_handler(session: &Session) -> ReplControl {
    let state = session.state();
    let catalog = session.graph().catalog();
    if state.inventory().is_empty() {
        println!("You are carrying nothing.");
        return ReplControl::Continue;
    }
    println!("\n{}", "Inventory".section_style());
    for stack in state.inventory() {
        let usable = catalog
            .item(&stack.item)
            .is_some_and(|def| def.use_effect.is_some());
        let marker = if usable { " (usable)".dimmed().to_string() } else { String::new() };
        println!("  {} x{}{marker}", catalog.item_name(&stack.item).item_style(), stack.count);
    }
    ReplControl::Continue
}

pub fn quests_handler(session: &Session) -> ReplControl {
    let log = session.quest_log();
    let mut shown = false;
    for (quest, status, (done, total)) in log {
        let line = match status {
            QuestStatus::Locked => continue,
            QuestStatus::Active => format!("{} ({done}/{total})", quest.name).quest_style(),
            QuestStatus::Completed => quest.name.quest_style().strikethrough(),
        };
        if !shown {
            println!("\n{}", "Quests".section_style());
            shown = true;
        }
        println!("  {line}");
        if status == QuestStatus::Active && !quest.description.is_empty() {
            println!("{}", textwrap::fill(&quest.description, &super::indented_block()).dimmed());
        }
    }
    if !shown {
        println!("Your journal is empty.");
    }
    ReplControl::Continue
}

pub fn routes_handler(session: &Session) -> ReplControl {
    let chosen = session.selected_route().map(|route| route.id.clone());
    let mut any = false;
    for route in session.unlocked_routes() {
        if !any {
            println!("\n{}", "Routes".section_style());
            any = true;
        }
        let mark = if chosen.as_deref() == Some(route.id.as_str()) { " (chosen)" } else { "" };
        println!("  {} [{}]{mark}", route.name.option_style(), route.id);
    }
    if !any {
        println!("No routes have revealed themselves yet.");
    }
    ReplControl::Continue
}

pub fn choose_route_handler(session: &mut Session, presenter: &mut TerminalPresenter, route: &str) -> ReplControl {
    match session.select_route(route) {
        Ok(events) => {
            events.iter().for_each(|event| presenter.notify(event));
            println!("You commit to the {} route.", route.underline());
        },
        Err(err) => presenter.rejected(&err),
    }
    ReplControl::Continue
}

/// Use a held item, matched by id or (case-insensitive) name.
pub fn use_handler(session: &mut Session, presenter: &mut TerminalPresenter, wanted: &str) -> ReplControl {
    let item = {
        let catalog = session.graph().catalog();
        session
            .state()
            .inventory()
            .iter()
            .map(|stack| stack.item.as_str())
            .find(|id| *id == wanted || catalog.item_name(id).eq_ignore_ascii_case(wanted))
            .unwrap_or(wanted)
            .to_string()
    };
    match session.use_item(&item) {
        Ok(events) => events.iter().for_each(|event| presenter.notify(event)),
        Err(err) => presenter.rejected(&err),
    }
    ReplControl::Continue
}
