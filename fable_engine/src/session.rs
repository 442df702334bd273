//! The play session.
//!
//! `Session` owns the story graph, player state, event bus and the node
//! processor, and runs the collaborators (thresholds, routes, random events
//! and quests) over every batch of events until the state settles.

use std::sync::Arc;

use anyhow::{Result, bail};
use fable_data::{EffectDef, Id, QuestDef, RouteDef};
use log::{info, warn};

use crate::config::EngineConfig;
use crate::dice::{RandomRoller, Roller};
use crate::effect::EffectApplier;
use crate::error::{Diagnostic, EngineError};
use crate::events::{EventBus, GameEvent, Listener, ListenerId};
use crate::player::{PlayerState, Snapshot};
use crate::presentation::{CancelToken, ChoiceInput, Presenter};
use crate::processor::{NodeProcessor, PresentedChoice, Suspension};
use crate::quest::{self, QuestStatus};
use crate::random_event::RandomEvents;
use crate::route;
use crate::story::StoryGraph;
use crate::threshold::ThresholdWatcher;

/// Upper bound on collaborator rounds per step; effects that keep re-triggering
/// each other are cut off here.
const MAX_SETTLE_ROUNDS: usize = 16;

/// One resumption of the interpreter.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub suspension: Suspension,
    /// Everything published since the previous step, in order.
    pub events: Vec<GameEvent>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Ended,
    Halted(Diagnostic),
    Quit,
}

pub struct Session {
    graph: Arc<StoryGraph>,
    config: EngineConfig,
    state: PlayerState,
    processor: NodeProcessor,
    bus: EventBus,
    roller: Box<dyn Roller>,
    random_events: RandomEvents,
    thresholds: ThresholdWatcher,
    cancel: CancelToken,
    diagnostics: Vec<Diagnostic>,
    /// (chapter, scene) of the last node entered.
    last_scene: Option<(Id, Id)>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("story", &self.graph.meta().title)
            .field("cursor", self.state.cursor())
            .field("diagnostics", &self.diagnostics.len())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Start a new game at the first node of the story.
    ///
    /// # Errors
    /// Fails if the story has no playable node.
    pub fn new(graph: Arc<StoryGraph>, config: EngineConfig) -> Result<Self> {
        let Some(start) = graph.first_cursor() else {
            bail!("story '{}' has no nodes to play", graph.meta().title);
        };
        let state = PlayerState::new_game(graph.catalog(), start);
        let processor = NodeProcessor::new(Arc::clone(&graph), &config);
        let thresholds = ThresholdWatcher::new(graph.thresholds());
        info!(
            "new session for '{}' at {} ({} thresholds watched)",
            graph.meta().title,
            state.cursor(),
            thresholds.len()
        );
        Ok(Self {
            roller: Box::new(RandomRoller::new(config.rng_seed)),
            graph,
            config,
            state,
            processor,
            bus: EventBus::new(),
            random_events: RandomEvents::new(),
            thresholds,
            cancel: CancelToken::new(),
            diagnostics: Vec::new(),
            last_scene: None,
        })
    }

    /// Replace the dice, e.g. with a scripted sequence in tests.
    #[must_use]
    pub fn with_roller(mut self, roller: impl Roller + 'static) -> Self {
        self.roller = Box::new(roller);
        self
    }

    pub fn graph(&self) -> &StoryGraph {
        &self.graph
    }

    pub fn shared_graph(&self) -> Arc<StoryGraph> {
        Arc::clone(&self.graph)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state(&self) -> &PlayerState {
        &self.state
    }

    /// Token that cuts the current text reveal short.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn subscribe(&mut self, listener: impl Listener + 'static) -> ListenerId {
        self.bus.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.bus.unsubscribe(id)
    }

    /// Warnings and errors raised so far, oldest first.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn is_awaiting_choice(&self) -> bool {
        self.processor.is_awaiting_choice()
    }

    pub fn is_finished(&self) -> bool {
        self.processor.is_ended() || self.processor.is_halted()
    }

    pub fn add_play_time(&mut self, elapsed: std::time::Duration) {
        self.state.add_play_time(elapsed);
    }

    /// Advance to the next suspension point.
    pub fn step(&mut self) -> Step {
        let suspension = self.processor.resume(&mut self.state, &mut self.bus, self.roller.as_mut());
        let journal = self.bus.drain_journal();
        let events = self.settle(journal);
        // collaborators may have changed what the pending choice allows
        let suspension = match suspension {
            Suspension::AwaitChoice(choice) => {
                Suspension::AwaitChoice(self.processor.current_choice(&self.state).unwrap_or(choice))
            },
            other => other,
        };
        Step { suspension, events }
    }

    pub fn current_choice(&self) -> Option<PresentedChoice> {
        self.processor.current_choice(&self.state)
    }

    /// Select an option of the pending choice.
    ///
    /// # Errors
    /// Refused selections leave the state untouched; see [`NodeProcessor::choose`].
    pub fn choose(&mut self, index: usize) -> Result<Vec<GameEvent>, EngineError> {
        self.processor.choose(index, &mut self.state, &mut self.bus)?;
        let journal = self.bus.drain_journal();
        Ok(self.settle(journal))
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            pending_continue: self.processor.pending_continue().cloned(),
            ..self.state.snapshot()
        }
    }

    /// Replace the player state with a saved one and pick up at its cursor.
    ///
    /// # Errors
    /// [`EngineError::Persistence`] if the cursor does not exist in this story.
    /// Nothing is changed in that case.
    pub fn restore(&mut self, snapshot: Snapshot) -> Result<(), EngineError> {
        if !self.graph.contains(&snapshot.cursor) {
            return Err(EngineError::Persistence(format!(
                "saved position {} does not exist in '{}'",
                snapshot.cursor,
                self.graph.meta().title
            )));
        }
        let pending_continue = snapshot.pending_continue.clone();
        self.state = PlayerState::from(snapshot);
        self.processor.reenter(&self.state, pending_continue);
        self.random_events.reset();
        let cursor = self.state.cursor();
        self.last_scene = Some((cursor.chapter.clone(), cursor.scene.clone()));
        self.bus.flush();
        self.bus.drain_journal();
        info!("restored game at {}", self.state.cursor());
        Ok(())
    }

    /// Use one unit of a held item, applying its use effect.
    ///
    /// # Errors
    /// The item must be known, held and usable. Nothing changes on error.
    pub fn use_item(&mut self, item: &str) -> Result<Vec<GameEvent>, EngineError> {
        let graph = Arc::clone(&self.graph);
        let def = graph.catalog().item(item).ok_or_else(|| EngineError::DataMissing {
            kind: "item",
            id: item.to_string(),
            context: "use".to_string(),
        })?;
        let effect = def.use_effect.as_ref().ok_or_else(|| EngineError::NotUsable { item: item.to_string() })?;

        let applier = EffectApplier::new(graph.catalog(), self.config.limits());
        applier.consume(item, 1, &mut self.state, &mut self.bus)?;
        applier.apply(effect, &mut self.state, &mut self.bus);
        info!("└─ action: used '{item}'");
        let journal = self.bus.drain_journal();
        Ok(self.settle(journal))
    }

    /// Apply an effect coming from outside the story graph (debug commands,
    /// embedding applications).
    pub fn apply_external(&mut self, effect: &EffectDef, source: &str) -> Vec<GameEvent> {
        info!("└─ action: external effect from {source}");
        let graph = Arc::clone(&self.graph);
        EffectApplier::new(graph.catalog(), self.config.limits()).apply(effect, &mut self.state, &mut self.bus);
        let journal = self.bus.drain_journal();
        self.settle(journal)
    }

    /// Commit to an unlocked route.
    ///
    /// # Errors
    /// See [`route::select_route`].
    pub fn select_route(&mut self, route_id: &str) -> Result<Vec<GameEvent>, EngineError> {
        let graph = Arc::clone(&self.graph);
        let applier = EffectApplier::new(graph.catalog(), self.config.limits());
        route::select_route(graph.routes(), route_id, &applier, &mut self.state, &mut self.bus)?;
        let journal = self.bus.drain_journal();
        Ok(self.settle(journal))
    }

    pub fn selected_route(&self) -> Option<&RouteDef> {
        route::selected_route(self.graph.routes(), &self.state)
    }

    pub fn unlocked_routes(&self) -> impl Iterator<Item = &RouteDef> {
        self.graph
            .routes()
            .iter()
            .filter(|r| route::is_unlocked(&r.id, &self.state))
    }

    /// Every quest with its status and objective progress.
    pub fn quest_log(&self) -> Vec<(&QuestDef, QuestStatus, (usize, usize))> {
        self.graph
            .quests()
            .iter()
            .map(|q| (q, quest::status(q, &self.state), quest::progress(q, &self.state)))
            .collect()
    }

    /// Drive the story to its end through `presenter`.
    pub fn run(&mut self, presenter: &mut impl Presenter) -> RunOutcome {
        loop {
            let step = self.step();
            for event in &step.events {
                presenter.notify(event);
            }
            match step.suspension {
                Suspension::Reveal { speaker, text } => {
                    self.cancel.reset();
                    presenter.reveal(speaker.as_deref(), &text, &self.cancel);
                },
                Suspension::Delay(delay) => presenter.wait(delay),
                Suspension::AwaitChoice(mut choice) => loop {
                    match presenter.choose(&choice) {
                        ChoiceInput::Quit => return RunOutcome::Quit,
                        ChoiceInput::Command(line) => warn!("'{line}' is not an option; choose by number"),
                        ChoiceInput::Select(index) => match self.choose(index) {
                            Ok(events) => {
                                for event in &events {
                                    presenter.notify(event);
                                }
                                break;
                            },
                            Err(err) => {
                                presenter.rejected(&err);
                                if let Some(current) = self.current_choice() {
                                    choice = current;
                                }
                            },
                        },
                    }
                },
                Suspension::Ended => return RunOutcome::Ended,
                Suspension::Halted(diagnostic) => return RunOutcome::Halted(diagnostic),
            }
        }
    }

    /// Feed events to the collaborators, round after round, until nothing new happens.
    fn settle(&mut self, mut batch: Vec<GameEvent>) -> Vec<GameEvent> {
        let graph = Arc::clone(&self.graph);
        let catalog = graph.catalog();
        let applier = EffectApplier::new(catalog, self.config.limits());
        let mut all = Vec::new();

        for round in 0.. {
            if batch.is_empty() {
                break;
            }
            if round == MAX_SETTLE_ROUNDS {
                warn!("collaborators still producing events after {MAX_SETTLE_ROUNDS} rounds; stopping");
                all.append(&mut batch);
                break;
            }
            let mut touched = false;
            for event in &batch {
                match event {
                    GameEvent::AttributeChanged { .. } => {
                        self.thresholds.observe(event, &applier, &mut self.state, &mut self.bus);
                        touched = true;
                    },
                    GameEvent::RelationshipChanged { .. }
                    | GameEvent::InventoryChanged { .. }
                    | GameEvent::FlagChanged { .. } => touched = true,
                    GameEvent::NodeEntered { cursor, .. } => {
                        touched = true;
                        route::detect_routes(
                            graph.routes(),
                            &cursor.chapter,
                            catalog,
                            &applier,
                            &mut self.state,
                            &mut self.bus,
                        );
                        let scene = (cursor.chapter.clone(), cursor.scene.clone());
                        if self.last_scene.as_ref() != Some(&scene) {
                            self.last_scene = Some(scene);
                            self.random_events.on_scene_entered(
                                graph.random_events(),
                                &cursor.scene,
                                catalog,
                                &applier,
                                self.roller.as_mut(),
                                &mut self.state,
                                &mut self.bus,
                            );
                        }
                    },
                    GameEvent::Diagnostic(diagnostic) => self.diagnostics.push(diagnostic.clone()),
                    _ => {},
                }
            }
            if touched {
                quest::refresh_quests(graph.quests(), catalog, &applier, &mut self.state, &mut self.bus);
            }
            self.bus.flush();
            all.append(&mut batch);
            batch = self.bus.drain_journal();
        }
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dice::SequenceRoller;
    use fable_data::{ChapterDef, Lenient, NodeDef, NodeKind, SceneDef, StoryDef};

    fn narration(id: &str, text: &str, next: Option<&str>) -> NodeDef {
        NodeDef {
            id: id.into(),
            next: next.map(Into::into),
            kind: NodeKind::Narration { text: text.into() },
        }
    }

    fn story() -> StoryDef {
        StoryDef {
            chapters: vec![ChapterDef {
                id: "ch1".into(),
                title: "One".into(),
                scenes: vec![SceneDef {
                    id: "gate".into(),
                    title: "Gate".into(),
                    nodes: vec![
                        narration("a", "The gate looms.", Some("b")),
                        narration("b", "It creaks open.", None),
                    ],
                }],
            }],
            ..StoryDef::default()
        }
    }

    fn session() -> Session {
        Session::new(Arc::new(StoryGraph::from(story())), EngineConfig::default())
            .expect("story has nodes")
            .with_roller(SequenceRoller::new([], 50))
    }

    #[test]
    fn empty_story_is_rejected() {
        let graph = Arc::new(StoryGraph::from(StoryDef::default()));
        assert!(Session::new(graph, EngineConfig::default()).is_err());
    }

    #[test]
    fn steps_through_to_the_end() {
        let mut session = session();
        let mut reveals = Vec::new();
        loop {
            let step = session.step();
            match step.suspension {
                Suspension::Reveal { text, .. } => reveals.push(text),
                Suspension::Delay(_) => {},
                Suspension::Ended => break,
                other => panic!("unexpected suspension {other:?}"),
            }
        }
        assert_eq!(reveals, ["The gate looms.", "It creaks open."]);
        assert!(session.is_finished());
    }

    #[test]
    fn restore_rejects_unknown_cursor_without_changes() {
        let mut session = session();
        let before = session.snapshot();
        let mut bad = before.clone();
        bad.cursor.node = "nowhere".into();
        assert!(matches!(session.restore(bad), Err(EngineError::Persistence(_))));
        assert_eq!(session.snapshot(), before);
    }

    #[test]
    fn external_effects_reach_state_and_events() {
        let mut session = session();
        let effect = EffectDef {
            set_flags: Lenient::Valid(vec!["debug".into()]),
            ..EffectDef::default()
        };
        let events = session.apply_external(&effect, "test");
        assert!(session.state().has_flag("debug"));
        assert!(events.iter().any(GameEvent::is_flag_changed));
    }

    #[test]
    fn using_unknown_or_unheld_items_fails() {
        let mut session = session();
        assert!(matches!(session.use_item("ghost"), Err(EngineError::DataMissing { .. })));
    }
}
