//! Typed event bus.
//!
//! The interpreter never calls presentation or collaborators directly. It
//! publishes [`GameEvent`]s; [`EventBus::flush`] hands the queued events to every
//! subscribed [`Listener`] in publication order and appends them to a journal
//! the [`Session`](crate::session::Session) drains between transitions.

use std::cell::RefCell;
use std::rc::Rc;

use fable_data::Id;
use log::debug;
use serde::{Deserialize, Serialize};
use variantly::Variantly;

use crate::error::Diagnostic;
use crate::player::Cursor;

/// Which store a bounded stat lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatKind {
    Attribute,
    Pool,
}

#[derive(Debug, Clone, PartialEq, Variantly)]
pub enum GameEvent {
    AttributeChanged {
        kind: StatKind,
        id: Id,
        old: i32,
        new: i32,
        delta: i32,
    },
    RelationshipChanged {
        character: Id,
        old: i32,
        new: i32,
        delta: i32,
    },
    InventoryChanged {
        item: Id,
        old: u32,
        new: u32,
        delta: i64,
    },
    FlagChanged {
        flag: Id,
        set: bool,
    },
    NodeEntered {
        cursor: Cursor,
        kind: &'static str,
    },
    ChoicePresented {
        cursor: Option<Cursor>,
        options: usize,
        enabled: usize,
    },
    CheckResolved {
        attribute: Id,
        roll: u32,
        chance: u32,
        success: bool,
    },
    ItemGranted {
        item: Id,
        count: u32,
    },
    EventTriggered(String),
    StoryEnded,
    ThresholdReached {
        stat: Id,
        rule: String,
        value: i32,
        message: String,
    },
    QuestUnlocked(Id),
    QuestCompleted(Id),
    RouteUnlocked(Id),
    RandomEventFired {
        event: Id,
        text: String,
    },
    Diagnostic(Diagnostic),
}

/// Handle returned by [`EventBus::subscribe`].
pub type ListenerId = usize;

/// Receives events as they are flushed.
pub trait Listener {
    fn on_event(&mut self, event: &GameEvent);
}

impl<F> Listener for F
where
    F: FnMut(&GameEvent),
{
    fn on_event(&mut self, event: &GameEvent) {
        self(event);
    }
}

#[derive(Default)]
pub struct EventBus {
    pending: Vec<GameEvent>,
    journal: Vec<GameEvent>,
    listeners: Vec<(ListenerId, Box<dyn Listener>)>,
    next_id: ListenerId,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("pending", &self.pending.len())
            .field("journal", &self.journal.len())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, listener: impl Listener + 'static) -> ListenerId {
        let id = self.next_id;
        self.next_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Remove a listener. Returns false if the id was not subscribed.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener_id, _)| *listener_id != id);
        self.listeners.len() != before
    }

    /// Queue an event for the next flush.
    pub fn publish(&mut self, event: GameEvent) {
        self.pending.push(event);
    }

    pub fn publish_all(&mut self, events: impl IntoIterator<Item = GameEvent>) {
        self.pending.extend(events);
    }

    pub fn pending(&self) -> &[GameEvent] {
        &self.pending
    }

    /// Deliver all queued events to every listener, in publication order.
    pub fn flush(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let batch = std::mem::take(&mut self.pending);
        debug!("flushing {} event(s) to {} listener(s)", batch.len(), self.listeners.len());
        for event in &batch {
            for (_, listener) in &mut self.listeners {
                listener.on_event(event);
            }
        }
        self.journal.extend(batch);
    }

    /// Take every event flushed since the last call.
    pub fn drain_journal(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.journal)
    }
}

/// Shared recorder of delivered events, handy for tests and debugging tools.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Rc<RefCell<Vec<GameEvent>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<GameEvent> {
        self.events.borrow().clone()
    }

    pub fn count(&self, predicate: impl Fn(&GameEvent) -> bool) -> usize {
        self.events.borrow().iter().filter(|event| predicate(event)).count()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }
}

impl Listener for EventLog {
    fn on_event(&mut self, event: &GameEvent) {
        self.events.borrow_mut().push(event.clone());
    }
}
