//! `repl::dev` module
//!
//! Debug commands, accepted only in builds with the `dev-mode` feature.
//! Every edit goes through [`Session::apply_external`], so thresholds and
//! quests react exactly as they would to story effects.

use std::collections::BTreeMap;

use fable_data::{EffectDef, ItemGrantDef, Lenient};
use log::warn;

use crate::presentation::Presenter;
use crate::repl::{ReplControl, TerminalPresenter};
use crate::session::Session;
use crate::style::GameStyle;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DevCommand {
    ListFlags,
    SetFlag(String),
    ClearFlag(String),
    Give { item: String, count: u32 },
    Stat { id: String, delta: i32 },
}

/// Parse `:verb args`. Returns `None` for unknown verbs or bad arguments.
pub fn parse_dev_command(verb: &str, args: &str) -> Option<DevCommand> {
    let mut parts = args.split_whitespace();
    let first = parts.next();
    let second = parts.next();
    match (verb, first, second) {
        (":flags", None, _) => Some(DevCommand::ListFlags),
        (":set-flag", Some(flag), None) => Some(DevCommand::SetFlag(flag.to_string())),
        (":clear-flag", Some(flag), None) => Some(DevCommand::ClearFlag(flag.to_string())),
        (":give", Some(item), count) => Some(DevCommand::Give {
            item: item.to_string(),
            count: count.map_or(Some(1), |c| c.parse().ok())?,
        }),
        (":stat", Some(id), Some(delta)) => Some(DevCommand::Stat {
            id: id.to_string(),
            delta: delta.parse().ok()?,
        }),
        _ => None,
    }
}

pub fn dev_handler(session: &mut Session, presenter: &mut TerminalPresenter, command: &DevCommand) -> ReplControl {
    let effect = match command {
        DevCommand::ListFlags => {
            println!("\n{}", "Flags".section_style());
            for flag in session.state().flags() {
                println!("  {flag}");
            }
            return ReplControl::Continue;
        },
        DevCommand::SetFlag(flag) => EffectDef {
            set_flags: Lenient::Valid(vec![flag.clone()]),
            ..EffectDef::default()
        },
        DevCommand::ClearFlag(flag) => EffectDef {
            clear_flags: Lenient::Valid(vec![flag.clone()]),
            ..EffectDef::default()
        },
        DevCommand::Give { item, count } => EffectDef {
            items: Lenient::Valid(vec![ItemGrantDef {
                item: item.clone(),
                count: *count,
            }]),
            ..EffectDef::default()
        },
        DevCommand::Stat { id, delta } => EffectDef {
            attributes: Lenient::Valid(BTreeMap::from([(id.clone(), *delta)])),
            ..EffectDef::default()
        },
    };
    warn!("dev-mode command used: {command:?}");
    for event in session.apply_external(&effect, "dev command") {
        presenter.notify(&event);
    }
    ReplControl::Continue
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_dev_commands() {
        assert_eq!(parse_dev_command(":flags", ""), Some(DevCommand::ListFlags));
        assert_eq!(
            parse_dev_command(":give", "herb 3"),
            Some(DevCommand::Give {
                item: "herb".into(),
                count: 3
            })
        );
        assert_eq!(
            parse_dev_command(":give", "herb"),
            Some(DevCommand::Give {
                item: "herb".into(),
                count: 1
            })
        );
        assert_eq!(
            parse_dev_command(":stat", "courage -5"),
            Some(DevCommand::Stat {
                id: "courage".into(),
                delta: -5
            })
        );
        assert_eq!(parse_dev_command(":give", "herb lots"), None);
        assert_eq!(parse_dev_command(":teleport", "x"), None);
    }
}
