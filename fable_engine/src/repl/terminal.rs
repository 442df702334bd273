//! Terminal rendering of a running story.

use std::io::{self, Write};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use colored::Colorize;
use log::warn;
use textwrap::{Options, fill, termwidth};

use crate::config::EngineConfig;
use crate::error::{EngineError, Severity};
use crate::events::GameEvent;
use crate::player::Cursor;
use crate::presentation::{CancelToken, ChoiceInput, Presenter, SystemClock, Typewriter};
use crate::processor::PresentedChoice;
use crate::story::StoryGraph;
use crate::style::GameStyle;

use super::input::{InputEvent, InputManager};

const INDENT: &str = "    ";

/// Wrap options for body text.
pub fn normal_block() -> Options<'static> {
    Options::new(termwidth().min(100))
}

/// Wrap options for indented detail lines.
pub fn indented_block() -> Options<'static> {
    normal_block().initial_indent(INDENT).subsequent_indent(INDENT)
}

pub struct TerminalPresenter {
    graph: Arc<StoryGraph>,
    input: InputManager,
    clock: SystemClock,
    char_delay: Duration,
    last_scene: Option<(String, String)>,
}

impl TerminalPresenter {
    pub fn new(graph: Arc<StoryGraph>, config: &EngineConfig, input: InputManager) -> Self {
        Self {
            graph,
            input,
            clock: SystemClock,
            char_delay: config.char_delay(),
            last_scene: None,
        }
    }

    /// Forget the current scene so the next node prints its heading again.
    pub fn reset_scene(&mut self) {
        self.last_scene = None;
    }

    fn scene_heading(&mut self, cursor: &Cursor) {
        let key = (cursor.chapter.clone(), cursor.scene.clone());
        if self.last_scene.as_ref() == Some(&key) {
            return;
        }
        let chapter_changed = self.last_scene.as_ref().is_none_or(|(chapter, _)| *chapter != cursor.chapter);
        self.last_scene = Some(key);
        if chapter_changed && let Some(chapter) = self.graph.chapter(&cursor.chapter) {
            println!("\n{}", chapter.title.chapter_style());
        }
        if let Some(scene) = self.graph.scene(&cursor.chapter, &cursor.scene)
            && !scene.title.is_empty()
        {
            println!("{}", scene.title.as_str().section_style());
        }
    }

    fn toast(&self, text: &str) {
        println!("{}", fill(text, &indented_block()).toast_style());
    }
}

impl Presenter for TerminalPresenter {
    fn reveal(&mut self, speaker: Option<&str>, text: &str, cancel: &CancelToken) {
        println!();
        let wrapped = fill(text, &normal_block());
        if let Some(speaker) = speaker {
            println!("{}", self.graph.catalog().character_name(speaker).speaker_style());
        }
        let narration = speaker.is_none();
        let mut stdout = io::stdout();
        Typewriter::new(&wrapped, self.char_delay).run(cancel, &mut self.clock, |chunk| {
            let styled = if narration { chunk.narration_style() } else { chunk.dialogue_style() };
            print!("{styled}");
            let _ = stdout.flush();
        });
        println!();
    }

    fn wait(&mut self, delay: Duration) {
        thread::sleep(delay);
    }

    fn choose(&mut self, choice: &PresentedChoice) -> ChoiceInput {
        if let Some(description) = &choice.description {
            println!("\n{}", fill(description, &normal_block()).narration_style());
        }
        println!();
        for option in &choice.options {
            let label = format!("{:>2}. {}", option.index + 1, option.text);
            if option.enabled {
                println!("{}", label.option_style());
            } else {
                let unmet: Vec<&str> = option.unmet().map(|req| req.text.as_str()).collect();
                println!("{}  {}", label.option_disabled_style(), format!("({})", unmet.join("; ")).requirement_style());
            }
        }
        loop {
            match self.input.read_line("\n> ") {
                Ok(InputEvent::Line(line)) => {
                    let line = line.trim();
                    if line.is_empty() {
                        if choice.forced {
                            return ChoiceInput::Select(0);
                        }
                        continue;
                    }
                    if let Ok(number) = line.parse::<usize>() {
                        // out-of-range numbers are refused by the session
                        return ChoiceInput::Select(number.wrapping_sub(1));
                    }
                    return ChoiceInput::Command(line.to_string());
                },
                Ok(InputEvent::Eof) => return ChoiceInput::Quit,
                Ok(InputEvent::Interrupted) => println!("{}", "(type 'quit' to leave)".denied_style()),
                Err(err) => {
                    warn!("failed to read input: {err}");
                    return ChoiceInput::Quit;
                },
            }
        }
    }

    fn rejected(&mut self, error: &EngineError) {
        println!("{}", error.to_string().denied_style());
    }

    fn notify(&mut self, event: &GameEvent) {
        let graph = Arc::clone(&self.graph);
        let catalog = graph.catalog();
        match event {
            GameEvent::NodeEntered { cursor, .. } => self.scene_heading(cursor),
            GameEvent::AttributeChanged { id, delta, new, .. } => {
                let sign = if *delta > 0 { "+" } else { "" };
                let label = catalog.stat_name(id);
                println!("{}", format!("{INDENT}{label} {sign}{delta} ({new})").stat_style());
            },
            GameEvent::RelationshipChanged { character, delta, .. } => {
                let verb = if *delta > 0 { "warms to you" } else { "cools toward you" };
                self.toast(&format!("{} {verb}.", catalog.character_name(character)));
            },
            GameEvent::InventoryChanged { item, delta, new, .. } => {
                let name = catalog.item_name(item);
                let line = if *delta > 0 {
                    format!("{INDENT}+ {name} x{delta} ({new} held)")
                } else {
                    format!("{INDENT}- {name} x{} ({new} held)", delta.unsigned_abs())
                };
                println!("{}", line.item_style());
            },
            GameEvent::CheckResolved {
                attribute,
                roll,
                chance,
                success,
            } => {
                let outcome = if *success { "Success".green() } else { "Failure".red() };
                println!(
                    "{INDENT}[{} check: rolled {roll} against {chance}%] {outcome}",
                    catalog.stat_name(attribute)
                );
            },
            GameEvent::ThresholdReached { message, .. } if !message.is_empty() => self.toast(message),
            GameEvent::QuestUnlocked(id) => {
                let name = graph.quests().iter().find(|q| q.id == *id).map_or(id.as_str(), |q| q.name.as_str());
                println!("{}", format!("{INDENT}New quest: {name}").quest_style());
            },
            GameEvent::QuestCompleted(id) => {
                let name = graph.quests().iter().find(|q| q.id == *id).map_or(id.as_str(), |q| q.name.as_str());
                println!("{}", format!("{INDENT}Quest complete: {name}").quest_style());
            },
            GameEvent::RouteUnlocked(id) => {
                let name = graph.routes().iter().find(|r| r.id == *id).map_or(id.as_str(), |r| r.name.as_str());
                self.toast(&format!("A new path opens: {name}"));
            },
            GameEvent::RandomEventFired { text, .. } if !text.is_empty() => {
                println!("\n{}", fill(text, &normal_block()).narration_style());
            },
            GameEvent::Diagnostic(diagnostic) if diagnostic.severity == Severity::Error || crate::DEV_MODE => {
                println!("{}", diagnostic.to_string().error_style());
            },
            GameEvent::StoryEnded => println!("\n{}", "~ The End ~".chapter_style()),
            _ => {},
        }
    }
}
