//! Quest progress.
//!
//! Quest status lives in player flags (`quest:<id>:active`, `quest:<id>:done`),
//! so it is saved and restored with the rest of the state and is changed only
//! through the effect applier.

use fable_data::{EffectDef, Lenient, ObjectiveDef, QuestDef};
use log::info;

use crate::condition::evaluate;
use crate::effect::EffectApplier;
use crate::events::{EventBus, GameEvent};
use crate::player::PlayerState;
use crate::story::Catalog;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestStatus {
    Locked,
    Active,
    Completed,
}

pub fn active_flag(quest: &str) -> String {
    format!("quest:{quest}:active")
}

pub fn done_flag(quest: &str) -> String {
    format!("quest:{quest}:done")
}

pub fn status(quest: &QuestDef, state: &PlayerState) -> QuestStatus {
    if state.has_flag(&done_flag(&quest.id)) {
        QuestStatus::Completed
    } else if state.has_flag(&active_flag(&quest.id)) {
        QuestStatus::Active
    } else {
        QuestStatus::Locked
    }
}

pub fn objective_met(objective: &ObjectiveDef, state: &PlayerState) -> bool {
    match objective {
        ObjectiveDef::Flag { flag, .. } => state.has_flag(flag),
        ObjectiveDef::Collect { item, count } => state.item_count(item) >= *count,
    }
}

/// Completed and total objective counts.
pub fn progress(quest: &QuestDef, state: &PlayerState) -> (usize, usize) {
    let done = quest.objectives.iter().filter(|obj| objective_met(obj, state)).count();
    (done, quest.objectives.len())
}

/// Unlock quests whose conditions hold and complete quests whose objectives
/// are all met, applying rewards. Chained quests unlock in the same call.
/// Returns true if any quest changed status.
pub fn refresh_quests(
    quests: &[QuestDef],
    catalog: &Catalog,
    applier: &EffectApplier<'_>,
    state: &mut PlayerState,
    bus: &mut EventBus,
) -> bool {
    let mut changed = false;
    for _ in 0..=quests.len() {
        let mut progressed = false;
        for quest in quests {
            match status(quest, state) {
                QuestStatus::Locked => {
                    if predecessors_done(quest, quests, state)
                        && evaluate(Some(&quest.unlock), state, catalog).passed
                    {
                        info!("└─ quest: '{}' unlocked", quest.id);
                        applier.apply(&flag_effect(vec![active_flag(&quest.id)], Vec::new()), state, bus);
                        bus.publish(GameEvent::QuestUnlocked(quest.id.clone()));
                        progressed = true;
                    }
                },
                QuestStatus::Active => {
                    // a quest without objectives is finished by the story itself (setting its done flag)
                    if !quest.objectives.is_empty() && quest.objectives.iter().all(|obj| objective_met(obj, state)) {
                        info!("└─ quest: '{}' completed", quest.id);
                        applier.apply(
                            &flag_effect(vec![done_flag(&quest.id)], vec![active_flag(&quest.id)]),
                            state,
                            bus,
                        );
                        applier.apply(&quest.rewards, state, bus);
                        bus.publish(GameEvent::QuestCompleted(quest.id.clone()));
                        progressed = true;
                    }
                },
                QuestStatus::Completed => {},
            }
        }
        bus.flush();
        if !progressed {
            break;
        }
        changed = true;
    }
    changed
}

/// A quest named as another quest's `next_quest` waits for that quest to finish.
fn predecessors_done(quest: &QuestDef, quests: &[QuestDef], state: &PlayerState) -> bool {
    quests
        .iter()
        .filter(|other| other.next_quest.as_deref() == Some(quest.id.as_str()))
        .all(|other| status(other, state) == QuestStatus::Completed)
}

fn flag_effect(set: Vec<String>, clear: Vec<String>) -> EffectDef {
    EffectDef {
        set_flags: Lenient::Valid(set),
        clear_flags: Lenient::Valid(clear),
        ..EffectDef::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InventoryLimits;
    use crate::events::EventLog;
    use crate::player::Cursor;
    use fable_data::{ConditionDef, ItemCategory, ItemDef, ItemGrantDef};

    fn herb() -> ItemDef {
        ItemDef {
            id: "herb".into(),
            name: "Herb".into(),
            description: String::new(),
            category: ItemCategory::Material,
            stackable: None,
            stack_limit: None,
            use_effect: None,
        }
    }

    fn quests() -> Vec<QuestDef> {
        vec![
            QuestDef {
                id: "gather".into(),
                name: "Gather herbs".into(),
                description: String::new(),
                unlock: ConditionDef {
                    flags: Lenient::Valid(vec!["met_healer".into()]),
                    ..ConditionDef::default()
                },
                objectives: vec![ObjectiveDef::Collect {
                    item: "herb".into(),
                    count: 3,
                }],
                rewards: flag_effect(vec!["healer_trusts_you".into()], Vec::new()),
                next_quest: Some("deliver".into()),
            },
            QuestDef {
                id: "deliver".into(),
                name: "Deliver".into(),
                description: String::new(),
                unlock: ConditionDef::default(),
                objectives: vec![ObjectiveDef::Flag {
                    flag: "delivered".into(),
                    description: String::new(),
                }],
                rewards: EffectDef::default(),
                next_quest: None,
            },
        ]
    }

    #[test]
    fn quests_unlock_complete_and_chain() {
        let catalog = Catalog::from_defs(&[], &[], &[], &[herb()]);
        let applier = EffectApplier::new(&catalog, InventoryLimits::default());
        let mut state = PlayerState::new_game(&catalog, Cursor::new("c", "s", "n"));
        let mut bus = EventBus::new();
        let log = EventLog::new();
        bus.subscribe(log.clone());
        let quests = quests();

        assert!(!refresh_quests(&quests, &catalog, &applier, &mut state, &mut bus));
        assert_eq!(status(&quests[1], &state), QuestStatus::Locked);

        state.flags.insert("met_healer".into());
        assert!(refresh_quests(&quests, &catalog, &applier, &mut state, &mut bus));
        assert_eq!(status(&quests[0], &state), QuestStatus::Active);
        assert_eq!(progress(&quests[0], &state), (0, 1));

        let grant = EffectDef {
            items: Lenient::Valid(vec![ItemGrantDef {
                item: "herb".into(),
                count: 3,
            }]),
            ..EffectDef::default()
        };
        applier.apply(&grant, &mut state, &mut bus);
        refresh_quests(&quests, &catalog, &applier, &mut state, &mut bus);
        assert_eq!(status(&quests[0], &state), QuestStatus::Completed);
        assert!(state.has_flag("healer_trusts_you"));
        assert_eq!(status(&quests[1], &state), QuestStatus::Active);
        assert_eq!(log.count(|e| matches!(e, GameEvent::QuestCompleted(_))), 1);
        assert_eq!(log.count(|e| matches!(e, GameEvent::QuestUnlocked(_))), 2);
    }
}
