//! Route detection and selection.
//!
//! While the player is in one of a route's detection chapters, the route
//! unlocks as soon as its condition holds. Unlocked and selected routes are
//! stored as flags (`route:<id>`, `route:selected:<id>`).

use fable_data::{EffectDef, Id, Lenient, RouteDef};
use log::info;

use crate::condition::evaluate;
use crate::effect::EffectApplier;
use crate::error::EngineError;
use crate::events::{EventBus, GameEvent};
use crate::player::PlayerState;
use crate::story::Catalog;

pub fn unlocked_flag(route: &str) -> String {
    format!("route:{route}")
}

pub fn selected_flag(route: &str) -> String {
    format!("route:selected:{route}")
}

pub fn is_unlocked(route: &str, state: &PlayerState) -> bool {
    state.has_flag(&unlocked_flag(route))
}

pub fn selected_route<'a>(routes: &'a [RouteDef], state: &PlayerState) -> Option<&'a RouteDef> {
    routes.iter().find(|route| state.has_flag(&selected_flag(&route.id)))
}

/// Unlock every locked route detectable in `chapter` whose condition passes.
/// Returns the ids unlocked by this call.
pub fn detect_routes(
    routes: &[RouteDef],
    chapter: &str,
    catalog: &Catalog,
    applier: &EffectApplier<'_>,
    state: &mut PlayerState,
    bus: &mut EventBus,
) -> Vec<Id> {
    let mut unlocked = Vec::new();
    for route in routes {
        if !route.detect_in.iter().any(|c| c == chapter) || is_unlocked(&route.id, state) {
            continue;
        }
        if evaluate(Some(&route.unlock), state, catalog).passed {
            info!("└─ route: '{}' unlocked in chapter '{chapter}'", route.id);
            applier.apply(&set_flag(unlocked_flag(&route.id)), state, bus);
            bus.publish(GameEvent::RouteUnlocked(route.id.clone()));
            unlocked.push(route.id.clone());
        }
    }
    bus.flush();
    unlocked
}

/// Commit to an unlocked route. Only one route can ever be selected.
///
/// # Errors
/// [`EngineError::RouteUnavailable`] if the route is unknown, still locked, or
/// another route was already selected.
pub fn select_route(
    routes: &[RouteDef],
    route: &str,
    applier: &EffectApplier<'_>,
    state: &mut PlayerState,
    bus: &mut EventBus,
) -> Result<(), EngineError> {
    let unavailable = |reason: &str| EngineError::RouteUnavailable {
        route: route.to_string(),
        reason: reason.to_string(),
    };
    if !routes.iter().any(|r| r.id == route) {
        return Err(unavailable("no such route"));
    }
    if let Some(chosen) = selected_route(routes, state) {
        return Err(unavailable(&format!("route '{}' already chosen", chosen.id)));
    }
    if !is_unlocked(route, state) {
        return Err(unavailable("not unlocked yet"));
    }
    info!("└─ action: selected route '{route}'");
    applier.apply(&set_flag(selected_flag(route)), state, bus);
    Ok(())
}

fn set_flag(flag: String) -> EffectDef {
    EffectDef {
        set_flags: Lenient::Valid(vec![flag]),
        ..EffectDef::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InventoryLimits;
    use crate::player::Cursor;
    use fable_data::ConditionDef;

    fn routes() -> Vec<RouteDef> {
        let needs = |flag: &str| ConditionDef {
            flags: Lenient::Valid(vec![flag.to_string()]),
            ..ConditionDef::default()
        };
        vec![
            RouteDef {
                id: "mercy".into(),
                name: "Mercy".into(),
                description: String::new(),
                unlock: needs("spared_rival"),
                detect_in: vec!["ch3".into()],
            },
            RouteDef {
                id: "vengeance".into(),
                name: "Vengeance".into(),
                description: String::new(),
                unlock: needs("swore_oath"),
                detect_in: vec!["ch3".into()],
            },
        ]
    }

    #[test]
    fn routes_unlock_only_in_detection_chapters() {
        let catalog = Catalog::default();
        let applier = EffectApplier::new(&catalog, InventoryLimits::default());
        let mut state = PlayerState::new_game(&catalog, Cursor::new("ch1", "s", "n"));
        state.flags.insert("spared_rival".into());
        let mut bus = EventBus::new();
        let routes = routes();

        assert!(detect_routes(&routes, "ch1", &catalog, &applier, &mut state, &mut bus).is_empty());
        assert_eq!(
            detect_routes(&routes, "ch3", &catalog, &applier, &mut state, &mut bus),
            vec!["mercy".to_string()]
        );
        assert!(detect_routes(&routes, "ch3", &catalog, &applier, &mut state, &mut bus).is_empty());
    }

    #[test]
    fn only_one_unlocked_route_can_be_selected() {
        let catalog = Catalog::default();
        let applier = EffectApplier::new(&catalog, InventoryLimits::default());
        let mut state = PlayerState::new_game(&catalog, Cursor::new("ch3", "s", "n"));
        state.flags.insert("spared_rival".into());
        state.flags.insert("swore_oath".into());
        let mut bus = EventBus::new();
        let routes = routes();
        detect_routes(&routes, "ch3", &catalog, &applier, &mut state, &mut bus);

        assert!(select_route(&routes, "nowhere", &applier, &mut state, &mut bus).is_err());
        select_route(&routes, "mercy", &applier, &mut state, &mut bus).expect("mercy unlocked");
        assert_eq!(selected_route(&routes, &state).map(|r| r.id.as_str()), Some("mercy"));
        assert!(matches!(
            select_route(&routes, "vengeance", &applier, &mut state, &mut bus),
            Err(EngineError::RouteUnavailable { .. })
        ));
    }
}
