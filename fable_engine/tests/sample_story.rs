use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use fable_engine as fe;
use fe::dice::SequenceRoller;
use fe::quest::QuestStatus;
use fe::save_files::{SaveFile, load_slot, write_save};
use fe::*;

fn story_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("data").join("story.ron")
}

fn sample_session(rolls: impl IntoIterator<Item = u32>) -> Session {
    let graph = load_story(&story_path(), true).expect("bundled story is valid");
    Session::new(Arc::new(graph), EngineConfig::default())
        .expect("bundled story has nodes")
        .with_roller(SequenceRoller::new(rolls, 100))
}

/// Presenter that answers choices from a fixed list and records what it saw.
#[derive(Default)]
struct Script {
    picks: VecDeque<usize>,
    revealed: Vec<String>,
    rejected: usize,
    events: Vec<GameEvent>,
}

impl Script {
    fn new(picks: impl IntoIterator<Item = usize>) -> Self {
        Self {
            picks: picks.into_iter().collect(),
            ..Self::default()
        }
    }

    fn count(&self, predicate: impl Fn(&GameEvent) -> bool) -> usize {
        self.events.iter().filter(|event| predicate(event)).count()
    }
}

impl Presenter for Script {
    fn reveal(&mut self, _speaker: Option<&str>, text: &str, _cancel: &CancelToken) {
        self.revealed.push(text.to_string());
    }

    fn wait(&mut self, _delay: Duration) {}

    fn choose(&mut self, choice: &PresentedChoice) -> ChoiceInput {
        if choice.forced {
            return ChoiceInput::Select(0);
        }
        self.picks.pop_front().map_or(ChoiceInput::Quit, ChoiceInput::Select)
    }

    fn rejected(&mut self, _error: &EngineError) {
        self.rejected += 1;
    }

    fn notify(&mut self, event: &GameEvent) {
        self.events.push(event.clone());
    }
}

fn quest_status(session: &Session, id: &str) -> QuestStatus {
    session
        .quest_log()
        .into_iter()
        .find(|(quest, _, _)| quest.id == id)
        .map(|(_, status, _)| status)
        .expect("quest exists")
}

#[test]
fn bundled_story_passes_strict_validation() {
    let graph = load_story(&story_path(), true).expect("bundled story is valid");
    assert_eq!(graph.meta().slug, "lantern-road");
    assert_eq!(graph.chapters().len(), 2);
}

#[test]
fn plays_through_to_the_lit_tower() {
    // every chance roll misses: no random events, the ford check fails
    let mut session = sample_session([]);
    // oil flasks, gather herbs, shove the tollman, light the lamp
    let mut script = Script::new([0, 0, 2, 0]);

    assert_eq!(session.run(&mut script), RunOutcome::Ended);
    assert_eq!(script.rejected, 0);
    assert_eq!(
        script.revealed.last().map(String::as_str),
        Some("Light floods the marsh. Far off, the ferry bell answers.")
    );

    let state = session.state();
    for flag in ["took_oil", "soaked", "shoved_toll", "tower_lit"] {
        assert!(state.has_flag(flag), "missing flag {flag}");
    }
    assert_eq!(state.item_count("oil_flask"), 2);
    assert_eq!(state.item_count("marsh_herb"), 3);
    assert_eq!(state.stat_value("oil"), 0);
    assert_eq!(state.stat_value("health"), 80);
    assert_eq!(state.stat_value("courage"), 60);
    assert_eq!(state.relationship("toll"), -30);

    assert_eq!(quest_status(&session, "carry_flame"), QuestStatus::Completed);
    assert_eq!(quest_status(&session, "healer"), QuestStatus::Completed);
    assert_eq!(quest_status(&session, "keepers_heir"), QuestStatus::Active);
    // the healer reward
    assert_eq!(session.state().item_count("poultice"), 1);

    assert_eq!(script.count(GameEvent::is_random_event_fired), 0);
    assert_eq!(script.count(GameEvent::is_story_ended), 1);
    let oil_warnings = script.count(|event| matches!(event, GameEvent::ThresholdReached { stat, .. } if stat == "oil"));
    assert_eq!(oil_warnings, 1);
    assert!(session.selected_route().is_none());
}

#[test]
fn using_an_item_applies_its_effect() {
    let mut session = sample_session([]);
    let mut script = Script::new([0, 0, 2, 0]);
    session.run(&mut script);

    let events = session.use_item("poultice").expect("poultice is held and usable");
    assert_eq!(session.state().item_count("poultice"), 0);
    assert_eq!(session.state().stat_value("health"), 100);
    assert!(events.iter().any(|e| matches!(e, GameEvent::AttributeChanged { id, delta: 20, .. } if id == "health")));

    assert!(matches!(session.use_item("poultice"), Err(EngineError::NotInInventory { .. })));
    assert!(matches!(session.use_item("marsh_herb"), Err(EngineError::NotUsable { .. })));
}

#[test]
fn random_coin_opens_the_toll_option() {
    // wisp misses, the coin turns up, then the ford check fails
    let mut session = sample_session([90, 10]);
    let mut script = Script::new([0, 1, 0, 0]);

    assert_eq!(session.run(&mut script), RunOutcome::Ended);
    assert_eq!(script.count(GameEvent::is_random_event_fired), 1);
    assert!(session.state().has_flag("found_coin"));
    assert!(session.state().has_flag("paid_toll"));
    assert_eq!(script.rejected, 0);
}

#[test]
fn refused_pick_is_reported_and_offered_again() {
    let mut session = sample_session([]);
    // "Ask Maren to come with you" needs more affinity than she starts with
    let mut script = Script::new([2, 3, 2, 0, 1, 0]);

    assert_eq!(session.run(&mut script), RunOutcome::Ended);
    assert_eq!(script.rejected, 1);
    assert!(session.state().has_flag("maren_joins"));
    assert_eq!(session.state().relationship("maren"), 25);
    assert!(session.unlocked_routes().any(|route| route.id == "ferry"));
}

#[test]
fn running_out_of_answers_quits() {
    let mut session = sample_session([]);
    let mut script = Script::new([]);
    assert_eq!(session.run(&mut script), RunOutcome::Quit);
    assert_eq!(session.state().cursor().node, "supplies");
}

#[test]
fn route_selection_follows_unlocks() {
    let mut session = sample_session([]);
    // take the journal, then stop at the tower
    let mut script = Script::new([1, 1, 2]);
    assert_eq!(session.run(&mut script), RunOutcome::Quit);
    assert_eq!(session.state().cursor().node, "top");

    assert!(matches!(session.select_route("ferry"), Err(EngineError::RouteUnavailable { .. })));
    session.select_route("keeper").expect("keeper route is unlocked");
    assert_eq!(session.selected_route().map(|r| r.id.as_str()), Some("keeper"));
    assert!(matches!(session.select_route("keeper"), Err(EngineError::RouteUnavailable { .. })));
}

#[test]
fn saved_game_round_trips_through_a_slot() {
    let dir = tempfile::tempdir().expect("temp dir");
    let mut session = sample_session([]);
    let mut script = Script::new([0, 0]);
    session.run(&mut script);
    assert_eq!(session.state().cursor().node, "toll_choice");

    let save = SaveFile::new(session.graph().meta(), session.snapshot());
    write_save(dir.path(), "marsh", &save, 3).expect("slot written");

    let mut fresh = sample_session([]);
    let loaded = load_slot(dir.path(), "marsh", fresh.graph().meta()).expect("slot loads");
    fresh.restore(loaded.snapshot).expect("cursor exists");
    assert_eq!(fresh.snapshot(), session.snapshot());

    let mut script = Script::new([2, 0]);
    assert_eq!(fresh.run(&mut script), RunOutcome::Ended);
    assert!(fresh.state().has_flag("shoved_toll"));
}
