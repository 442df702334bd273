//! Presentation-side contracts: cancellable text reveal, timing, and the
//! [`Presenter`] trait a front end implements to drive a session.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crate::error::EngineError;
use crate::events::GameEvent;
use crate::processor::PresentedChoice;

/// Shared flag asking an in-progress reveal to finish immediately.
///
/// Clones share the flag, so a token can be handed to an input thread and
/// triggered at any time.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Source of (possibly simulated) sleeping.
pub trait Clock {
    fn sleep(&mut self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn sleep(&mut self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Clock that only records how long it was asked to sleep.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    pub elapsed: Duration,
    pub naps: usize,
}

impl Clock for ManualClock {
    fn sleep(&mut self, duration: Duration) {
        self.elapsed += duration;
        self.naps += 1;
    }
}

/// Character-by-character reveal of one text.
#[derive(Debug, Clone)]
pub struct Typewriter<'a> {
    text: &'a str,
    shown: usize,
    delay: Duration,
}

impl<'a> Typewriter<'a> {
    pub fn new(text: &'a str, delay: Duration) -> Self {
        Self { text, shown: 0, delay }
    }

    pub fn revealed(&self) -> &'a str {
        &self.text[..self.shown]
    }

    pub fn is_done(&self) -> bool {
        self.shown >= self.text.len()
    }

    /// Reveal the next character, or everything left if `cancel` is set.
    /// Returns the newly revealed slice.
    pub fn tick(&mut self, cancel: &CancelToken) -> &'a str {
        let rest = &self.text[self.shown..];
        let step = if cancel.is_cancelled() {
            rest.len()
        } else {
            rest.chars().next().map_or(0, char::len_utf8)
        };
        self.shown += step;
        &rest[..step]
    }

    /// Tick to completion, sleeping between characters and passing each new
    /// chunk to `sink`.
    pub fn run(mut self, cancel: &CancelToken, clock: &mut dyn Clock, mut sink: impl FnMut(&str)) {
        while !self.is_done() {
            let chunk = self.tick(cancel);
            sink(chunk);
            if !self.is_done() {
                clock.sleep(self.delay);
            }
        }
    }
}

/// What the player answered at a choice prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChoiceInput {
    /// Zero-based option index.
    Select(usize),
    /// Anything else the player typed, for the front end to interpret.
    Command(String),
    Quit,
}

/// A front end able to present a running story.
pub trait Presenter {
    /// Show `text`; may return early once `cancel` is triggered, but must show the full text.
    fn reveal(&mut self, speaker: Option<&str>, text: &str, cancel: &CancelToken);

    /// Non-cancellable pause (auto-advance, toasts).
    fn wait(&mut self, delay: Duration);

    fn choose(&mut self, choice: &PresentedChoice) -> ChoiceInput;

    /// The previous selection was refused; the same choice will be offered again.
    fn rejected(&mut self, error: &EngineError) {
        let _ = error;
    }

    fn notify(&mut self, event: &GameEvent) {
        let _ = event;
    }
}
