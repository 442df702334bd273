//! Random events rolled on scene entry.

use std::collections::{BTreeMap, BTreeSet};

use fable_data::{Id, RandomEventDef};
use log::info;

use crate::condition::evaluate;
use crate::dice::Roller;
use crate::effect::EffectApplier;
use crate::events::{EventBus, GameEvent};
use crate::player::PlayerState;
use crate::story::Catalog;

/// Tracks event cooldowns, counted in scene entries.
#[derive(Debug, Default, Clone)]
pub struct RandomEvents {
    cooldowns: BTreeMap<Id, u32>,
}

impl RandomEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cooling_down(&self, event: &str) -> bool {
        self.cooldowns.contains_key(event)
    }

    pub fn reset(&mut self) {
        self.cooldowns.clear();
    }

    /// Roll the events eligible in `scene`, in declaration order, and fire the
    /// first that succeeds. At most one event fires per scene entry.
    #[allow(clippy::too_many_arguments)]
    pub fn on_scene_entered(
        &mut self,
        events: &[RandomEventDef],
        scene: &str,
        catalog: &Catalog,
        applier: &EffectApplier<'_>,
        roller: &mut dyn Roller,
        state: &mut PlayerState,
        bus: &mut EventBus,
    ) -> Option<Id> {
        let blocked: BTreeSet<Id> = self.cooldowns.keys().cloned().collect();
        for remaining in self.cooldowns.values_mut() {
            *remaining = remaining.saturating_sub(1);
        }
        self.cooldowns.retain(|_, remaining| *remaining > 0);

        let fired = events.iter().find(|event| {
            !blocked.contains(&event.id)
                && (event.scenes.is_empty() || event.scenes.iter().any(|s| s == scene))
                && evaluate(event.condition.as_ref(), state, catalog).passed
                && roller.chance(event.chance)
        })?;

        info!("└─ random event: '{}' fired in scene '{scene}'", fired.id);
        bus.publish(GameEvent::RandomEventFired {
            event: fired.id.clone(),
            text: fired.text.clone(),
        });
        applier.apply(&fired.effect, state, bus);
        if fired.cooldown > 0 {
            self.cooldowns.insert(fired.id.clone(), fired.cooldown);
        }
        Some(fired.id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InventoryLimits;
    use crate::dice::SequenceRoller;
    use crate::player::Cursor;
    use fable_data::{EffectDef, Lenient};

    fn ambush(cooldown: u32) -> RandomEventDef {
        RandomEventDef {
            id: "ambush".into(),
            name: "Ambush".into(),
            text: "Bandits leap from the brush!".into(),
            scenes: vec!["forest".into()],
            chance: 1.0,
            condition: None,
            effect: EffectDef {
                set_flags: Lenient::Valid(vec!["ambushed".into()]),
                ..EffectDef::default()
            },
            cooldown,
        }
    }

    #[test]
    fn fires_only_in_listed_scenes_and_respects_cooldown() {
        let catalog = Catalog::default();
        let applier = EffectApplier::new(&catalog, InventoryLimits::default());
        let mut state = PlayerState::new_game(&catalog, Cursor::new("c", "forest", "n"));
        let mut bus = EventBus::new();
        let mut roller = SequenceRoller::new([], 1);
        let mut events = RandomEvents::new();
        let defs = [ambush(1)];

        let mut enter = |scene: &str, events: &mut RandomEvents, state: &mut PlayerState| {
            events.on_scene_entered(&defs, scene, &catalog, &applier, &mut roller, state, &mut bus)
        };
        assert_eq!(enter("village", &mut events, &mut state), None);
        assert_eq!(enter("forest", &mut events, &mut state), Some("ambush".into()));
        assert!(state.has_flag("ambushed"));
        assert_eq!(enter("forest", &mut events, &mut state), None);
        assert_eq!(enter("forest", &mut events, &mut state), Some("ambush".into()));
    }

    #[test]
    fn failed_roll_does_not_fire() {
        let catalog = Catalog::default();
        let applier = EffectApplier::new(&catalog, InventoryLimits::default());
        let mut state = PlayerState::new_game(&catalog, Cursor::new("c", "forest", "n"));
        let mut bus = EventBus::new();
        let mut roller = SequenceRoller::new([90], 90);
        let mut def = ambush(0);
        def.chance = 0.25;
        let mut events = RandomEvents::new();
        assert_eq!(
            events.on_scene_entered(&[def], "forest", &catalog, &applier, &mut roller, &mut state, &mut bus),
            None
        );
        assert!(!state.has_flag("ambushed"));
    }
}
