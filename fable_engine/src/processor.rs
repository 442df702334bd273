//! The narrative state machine.
//!
//! [`NodeProcessor`] walks the story graph one node at a time. Each call to
//! [`NodeProcessor::resume`] runs until the next suspension point and reports it
//! as a [`Suspension`]: a cancellable text reveal, a fixed delay, a choice
//! waiting for input, the end of the story, or a halt caused by a broken graph.
//! Choices are answered with [`NodeProcessor::choose`]; the selected option's
//! effect is applied and flushed before the following `resume` moves the cursor.

use std::sync::Arc;
use std::time::Duration;

use fable_data::{Id, NodeKind, OptionDef};
use log::{info, warn};
use variantly::Variantly;

use crate::condition::{Requirement, evaluate};
use crate::config::{EngineConfig, InventoryLimits};
use crate::dice::{CheckRoll, Roller, check_chance};
use crate::effect::EffectApplier;
use crate::error::{Diagnostic, EngineError};
use crate::events::{EventBus, GameEvent};
use crate::player::{Cursor, PlayerState};
use crate::story::StoryGraph;

/// Label of the option synthesized at the end of a scene.
pub const CONTINUE_LABEL: &str = "Continue";

/// Steps allowed without suspending before the processor assumes a loop.
const MAX_SILENT_STEPS: usize = 1_000;

/// Why the processor stopped and what it needs from presentation.
#[derive(Debug, Clone, PartialEq, Eq, Variantly)]
pub enum Suspension {
    /// Reveal text; cancellable.
    Reveal { speaker: Option<String>, text: String },
    /// Fixed pause (auto-advance or toast); not cancellable.
    Delay(Duration),
    /// Waiting for [`NodeProcessor::choose`].
    AwaitChoice(PresentedChoice),
    Ended,
    Halted(Diagnostic),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresentedOption {
    pub index: usize,
    pub text: String,
    pub enabled: bool,
    pub requirements: Vec<Requirement>,
}

impl PresentedOption {
    pub fn unmet(&self) -> impl Iterator<Item = &Requirement> {
        self.requirements.iter().filter(|req| !req.passed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresentedChoice {
    pub cursor: Cursor,
    pub description: Option<String>,
    pub options: Vec<PresentedOption>,
    /// True for the single "continue" option offered at the end of a scene.
    pub forced: bool,
}

impl PresentedChoice {
    pub fn enabled_count(&self) -> usize {
        self.options.iter().filter(|opt| opt.enabled).count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Transition {
    /// A node id within the current scene.
    Node(Id),
    /// Resolve the next scene or chapter.
    SceneEnd,
    /// A fully resolved position (the synthesized continue option).
    Enter(Cursor),
}

impl Transition {
    fn to(target: Option<&Id>) -> Self {
        target.map_or(Transition::SceneEnd, |id| Transition::Node(id.clone()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PendingChoice {
    /// Options of the choice node under the cursor.
    Node,
    Continue(Cursor),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Phase {
    /// Enter the node under the player's cursor.
    Enter,
    /// Text shown; pause, then take the transition.
    Revealed(Transition),
    /// Pause served; take the transition.
    Advance(Transition),
    /// Choice description shown; present the options.
    Described,
    AwaitingChoice(PendingChoice),
    Ended,
    Halted(Diagnostic),
}

enum Flow {
    Suspend(Suspension),
    Continue,
}

#[derive(Debug, Clone, Copy)]
struct Timing {
    auto_advance: Duration,
    toast: Duration,
}

#[derive(Debug)]
pub struct NodeProcessor {
    graph: Arc<StoryGraph>,
    limits: InventoryLimits,
    timing: Timing,
    phase: Phase,
    diagnostics: Vec<Diagnostic>,
}

impl NodeProcessor {
    /// A processor that will enter the node under the player's cursor on the first `resume`.
    pub fn new(graph: Arc<StoryGraph>, config: &EngineConfig) -> Self {
        Self {
            graph,
            limits: config.limits(),
            timing: Timing {
                auto_advance: config.auto_advance(),
                toast: config.toast(),
            },
            phase: Phase::Enter,
            diagnostics: Vec::new(),
        }
    }

    pub fn graph(&self) -> &StoryGraph {
        &self.graph
    }

    /// Graph-integrity and data diagnostics recorded so far.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn is_awaiting_choice(&self) -> bool {
        matches!(self.phase, Phase::AwaitingChoice(_))
    }

    pub fn is_ended(&self) -> bool {
        matches!(self.phase, Phase::Ended)
    }

    pub fn is_halted(&self) -> bool {
        matches!(self.phase, Phase::Halted(_))
    }

    /// Start of the next scene when the "Continue" prompt is waiting.
    pub fn pending_continue(&self) -> Option<&Cursor> {
        match &self.phase {
            Phase::AwaitingChoice(PendingChoice::Continue(next)) => Some(next),
            _ => None,
        }
    }

    /// Forget the in-flight step and pick up at the cursor, as after a load.
    ///
    /// A save taken at a "Continue" prompt offers that prompt again. Otherwise
    /// a saved cursor on a choice node presents that choice again, and any
    /// other node was already processed before the save, so play moves past it.
    pub fn reenter(&mut self, state: &PlayerState, pending_continue: Option<Cursor>) {
        if let Some(next) = pending_continue.filter(|next| self.graph.contains(next)) {
            self.phase = Phase::AwaitingChoice(PendingChoice::Continue(next));
            return;
        }
        self.phase = match self.graph.node(state.cursor()) {
            Some(node) if !matches!(node.kind, NodeKind::Choice { .. }) => {
                Phase::Advance(Transition::to(node.next.as_ref()))
            },
            _ => Phase::Enter,
        };
    }

    /// Run until the next suspension point.
    pub fn resume(&mut self, state: &mut PlayerState, bus: &mut EventBus, roller: &mut dyn Roller) -> Suspension {
        for _ in 0..MAX_SILENT_STEPS {
            let phase = std::mem::replace(&mut self.phase, Phase::Enter);
            let flow = match phase {
                Phase::Enter => self.enter(state, bus, roller),
                Phase::Revealed(next) => {
                    self.phase = Phase::Advance(next);
                    Flow::Suspend(Suspension::Delay(self.timing.auto_advance))
                },
                Phase::Advance(next) => self.take(next, state, bus),
                Phase::Described => self.await_choice(PendingChoice::Node, state, bus),
                Phase::AwaitingChoice(pending) => {
                    let (choice, _) = self.present(&pending, state);
                    self.phase = Phase::AwaitingChoice(pending);
                    Flow::Suspend(Suspension::AwaitChoice(choice))
                },
                Phase::Ended => {
                    self.phase = Phase::Ended;
                    Flow::Suspend(Suspension::Ended)
                },
                Phase::Halted(diag) => {
                    self.phase = Phase::Halted(diag.clone());
                    Flow::Suspend(Suspension::Halted(diag))
                },
            };
            if let Flow::Suspend(suspension) = flow {
                return suspension;
            }
        }

        self.halted(
            EngineError::Stalled {
                cursor: state.cursor().to_string(),
                steps: MAX_SILENT_STEPS,
            },
            bus,
        )
    }

    /// The pending choice re-evaluated against the current state, if one is waiting.
    pub fn current_choice(&self, state: &PlayerState) -> Option<PresentedChoice> {
        match &self.phase {
            Phase::AwaitingChoice(pending) => Some(self.present(pending, state).0),
            _ => None,
        }
    }

    /// Select option `index` (zero-based) of the waiting choice.
    ///
    /// The option's condition is re-checked here, whatever the front end showed;
    /// a refused selection leaves the state untouched and the choice waiting.
    ///
    /// # Errors
    /// [`EngineError::NotAwaitingChoice`], [`EngineError::NoSuchOption`] or
    /// [`EngineError::OptionDisabled`].
    pub fn choose(&mut self, index: usize, state: &mut PlayerState, bus: &mut EventBus) -> Result<(), EngineError> {
        let Phase::AwaitingChoice(pending) = &self.phase else {
            return Err(EngineError::NotAwaitingChoice);
        };

        match pending.clone() {
            PendingChoice::Continue(target) => {
                if index != 0 {
                    return Err(EngineError::NoSuchOption { index, available: 1 });
                }
                info!("└─ action: continue to {target}");
                self.phase = Phase::Advance(Transition::Enter(target));
                Ok(())
            },
            PendingChoice::Node => {
                let graph = Arc::clone(&self.graph);
                let options = choice_options(&graph, state.cursor()).ok_or(EngineError::NotAwaitingChoice)?;
                let option = options.get(index).ok_or(EngineError::NoSuchOption {
                    index,
                    available: options.len(),
                })?;

                let report = evaluate(option.condition.as_ref(), state, graph.catalog());
                if !report.passed {
                    return Err(EngineError::OptionDisabled {
                        index,
                        reason: report.unmet_text(),
                    });
                }

                info!("└─ action: chose \"{}\" at {}", option.text, state.cursor());
                if let Some(effect) = &option.effect {
                    EffectApplier::new(graph.catalog(), self.limits).apply(effect, state, bus);
                }
                self.phase = Phase::Advance(Transition::to(option.target.as_ref()));
                Ok(())
            },
        }
    }

    fn enter(&mut self, state: &mut PlayerState, bus: &mut EventBus, roller: &mut dyn Roller) -> Flow {
        let graph = Arc::clone(&self.graph);
        let cursor = state.cursor().clone();
        let Some(node) = graph.node(&cursor) else {
            return Flow::Suspend(self.halted(
                EngineError::GraphIntegrity {
                    scene: cursor.scene.clone(),
                    node: cursor.node.clone(),
                    target: cursor.node.clone(),
                },
                bus,
            ));
        };

        info!("entering {cursor} ({})", node.kind.tag());
        bus.publish(GameEvent::NodeEntered {
            cursor: cursor.clone(),
            kind: node.kind.tag(),
        });
        let then = Transition::to(node.next.as_ref());
        let catalog = graph.catalog();

        let flow = match &node.kind {
            NodeKind::Dialogue { speaker, text } => {
                self.phase = Phase::Revealed(then);
                Flow::Suspend(Suspension::Reveal {
                    speaker: speaker.as_deref().map(|id| catalog.character_name(id).to_string()),
                    text: text.clone(),
                })
            },
            NodeKind::Narration { text } => {
                self.phase = Phase::Revealed(then);
                Flow::Suspend(Suspension::Reveal {
                    speaker: None,
                    text: text.clone(),
                })
            },
            NodeKind::Choice { description, options } => {
                if options.is_empty() {
                    warn!("choice at {cursor} has no options; moving on");
                    self.phase = Phase::Advance(then);
                    Flow::Continue
                } else if let Some(text) = description.as_ref().filter(|text| !text.trim().is_empty()) {
                    self.phase = Phase::Described;
                    Flow::Suspend(Suspension::Reveal {
                        speaker: None,
                        text: text.clone(),
                    })
                } else {
                    self.await_choice(PendingChoice::Node, state, bus)
                }
            },
            NodeKind::Check {
                attribute,
                difficulty,
                success,
                failure,
            } => {
                if state.stat(attribute).is_none() && catalog.stat_max(attribute).is_none() {
                    self.record(
                        Diagnostic::warning(EngineError::DataMissing {
                            kind: "attribute",
                            id: attribute.clone(),
                            context: format!("check at {cursor}"),
                        }),
                        bus,
                    );
                }
                let chance = check_chance(state.stat_value(attribute), *difficulty);
                let outcome = CheckRoll::resolve(roller.percentile(), chance);
                info!(
                    "└─ check: {attribute} rolled {} against {}% ({})",
                    outcome.roll,
                    outcome.chance,
                    if outcome.success { "success" } else { "failure" }
                );
                bus.publish(GameEvent::CheckResolved {
                    attribute: attribute.clone(),
                    roll: outcome.roll,
                    chance: outcome.chance,
                    success: outcome.success,
                });
                let target = if outcome.success { success } else { failure };
                self.phase = Phase::Advance(Transition::to(target.as_ref()));
                Flow::Suspend(Suspension::Delay(self.timing.toast))
            },
            NodeKind::ItemGrant { items } => {
                bus.flush();
                let applier = EffectApplier::new(catalog, self.limits);
                for grant in items {
                    let before = state.item_count(&grant.item);
                    applier.grant(grant, state, bus);
                    let added = state.item_count(&grant.item).saturating_sub(before);
                    if added > 0 {
                        bus.publish(GameEvent::ItemGranted {
                            item: grant.item.clone(),
                            count: added,
                        });
                    }
                }
                self.phase = Phase::Advance(then);
                Flow::Suspend(Suspension::Delay(self.timing.toast))
            },
            NodeKind::EventTrigger { event, effect } => {
                bus.flush();
                if let Some(effect) = effect {
                    EffectApplier::new(catalog, self.limits).apply(effect, state, bus);
                }
                info!("└─ event: {event}");
                bus.publish(GameEvent::EventTriggered(event.clone()));
                self.phase = Phase::Advance(then);
                Flow::Suspend(Suspension::Delay(self.timing.auto_advance))
            },
            NodeKind::Passthrough { text } => match text.as_ref().filter(|text| !text.trim().is_empty()) {
                Some(text) => {
                    self.phase = Phase::Revealed(then);
                    Flow::Suspend(Suspension::Reveal {
                        speaker: None,
                        text: text.clone(),
                    })
                },
                None => {
                    self.phase = Phase::Advance(then);
                    Flow::Continue
                },
            },
        };
        bus.flush();
        flow
    }

    fn take(&mut self, transition: Transition, state: &mut PlayerState, bus: &mut EventBus) -> Flow {
        let current = state.cursor().clone();
        match transition {
            Transition::Node(id) => match self.graph.resolve_in_scene(&current, &id) {
                Some(next) => {
                    state.set_cursor(next);
                    self.phase = Phase::Enter;
                    Flow::Continue
                },
                None => Flow::Suspend(self.halted(
                    EngineError::GraphIntegrity {
                        scene: current.scene,
                        node: current.node,
                        target: id,
                    },
                    bus,
                )),
            },
            Transition::Enter(target) => {
                if self.graph.contains(&target) {
                    state.set_cursor(target);
                    self.phase = Phase::Enter;
                    Flow::Continue
                } else {
                    Flow::Suspend(self.halted(
                        EngineError::GraphIntegrity {
                            scene: target.scene,
                            node: current.node,
                            target: target.node,
                        },
                        bus,
                    ))
                }
            },
            Transition::SceneEnd => match self.graph.next_scene_start(&current) {
                Some(next) => {
                    info!("scene '{}' finished; next up {next}", current.scene);
                    self.await_choice(PendingChoice::Continue(next), state, bus)
                },
                None => {
                    info!("story ended at {current}");
                    bus.publish(GameEvent::StoryEnded);
                    bus.flush();
                    self.phase = Phase::Ended;
                    Flow::Suspend(Suspension::Ended)
                },
            },
        }
    }

    fn await_choice(&mut self, pending: PendingChoice, state: &PlayerState, bus: &mut EventBus) -> Flow {
        let (choice, problems) = self.present(&pending, state);
        for problem in problems {
            self.record(Diagnostic::warning(problem), bus);
        }
        bus.publish(GameEvent::ChoicePresented {
            cursor: Some(choice.cursor.clone()),
            options: choice.options.len(),
            enabled: choice.enabled_count(),
        });
        bus.flush();
        self.phase = Phase::AwaitingChoice(pending);
        Flow::Suspend(Suspension::AwaitChoice(choice))
    }

    /// Evaluate the pending choice. Pure: problems are returned, not recorded.
    fn present(&self, pending: &PendingChoice, state: &PlayerState) -> (PresentedChoice, Vec<EngineError>) {
        let cursor = state.cursor().clone();
        match pending {
            PendingChoice::Continue(_) => (
                PresentedChoice {
                    cursor,
                    description: None,
                    options: vec![PresentedOption {
                        index: 0,
                        text: CONTINUE_LABEL.to_string(),
                        enabled: true,
                        requirements: Vec::new(),
                    }],
                    forced: true,
                },
                Vec::new(),
            ),
            PendingChoice::Node => {
                let mut problems = Vec::new();
                let (description, options) = match self.graph.node(&cursor).map(|node| &node.kind) {
                    Some(NodeKind::Choice { description, options }) => (description.clone(), options.as_slice()),
                    _ => (None, [].as_slice()),
                };
                let options = options
                    .iter()
                    .enumerate()
                    .map(|(index, option)| {
                        let report = evaluate(option.condition.as_ref(), state, self.graph.catalog());
                        problems.extend(report.problems);
                        PresentedOption {
                            index,
                            text: option.text.clone(),
                            enabled: report.passed,
                            requirements: report.requirements,
                        }
                    })
                    .collect();
                (
                    PresentedChoice {
                        cursor,
                        description,
                        options,
                        forced: false,
                    },
                    problems,
                )
            },
        }
    }

    /// Stop at the current node; the cursor is left where it is.
    fn halted(&mut self, error: EngineError, bus: &mut EventBus) -> Suspension {
        let diag = Diagnostic::error(error);
        self.record(diag.clone(), bus);
        bus.flush();
        self.phase = Phase::Halted(diag.clone());
        Suspension::Halted(diag)
    }

    fn record(&mut self, diag: Diagnostic, bus: &mut EventBus) {
        diag.log();
        self.diagnostics.push(diag.clone());
        bus.publish(GameEvent::Diagnostic(diag));
    }
}

fn choice_options<'g>(graph: &'g StoryGraph, cursor: &Cursor) -> Option<&'g [OptionDef]> {
    match &graph.node(cursor)?.kind {
        NodeKind::Choice { options, .. } => Some(options),
        _ => None,
    }
}
