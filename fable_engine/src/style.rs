//! Styling helpers for terminal output.
//!
//! [`GameStyle`] applies the front end's palette through `colored`; it is
//! implemented for `&str` and `String` so literals can be styled directly.

use colored::{ColoredString, Colorize};

pub trait GameStyle {
    fn speaker_style(&self) -> ColoredString;
    fn narration_style(&self) -> ColoredString;
    fn dialogue_style(&self) -> ColoredString;
    fn chapter_style(&self) -> ColoredString;
    fn option_style(&self) -> ColoredString;
    fn option_disabled_style(&self) -> ColoredString;
    fn requirement_style(&self) -> ColoredString;
    fn item_style(&self) -> ColoredString;
    fn stat_style(&self) -> ColoredString;
    fn toast_style(&self) -> ColoredString;
    fn quest_style(&self) -> ColoredString;
    fn error_style(&self) -> ColoredString;
    fn denied_style(&self) -> ColoredString;
    fn section_style(&self) -> ColoredString;
}

impl GameStyle for &str {
    fn speaker_style(&self) -> ColoredString {
        self.bold().truecolor(13, 170, 90)
    }
    fn narration_style(&self) -> ColoredString {
        self.italic().truecolor(102, 208, 250)
    }
    fn dialogue_style(&self) -> ColoredString {
        self.truecolor(235, 235, 225)
    }
    fn chapter_style(&self) -> ColoredString {
        self.truecolor(223, 77, 10).underline()
    }
    fn option_style(&self) -> ColoredString {
        self.truecolor(220, 180, 40)
    }
    fn option_disabled_style(&self) -> ColoredString {
        self.dimmed().truecolor(120, 120, 120)
    }
    fn requirement_style(&self) -> ColoredString {
        self.italic().truecolor(200, 90, 90)
    }
    fn item_style(&self) -> ColoredString {
        self.truecolor(220, 180, 40)
    }
    fn stat_style(&self) -> ColoredString {
        self.truecolor(110, 220, 110)
    }
    fn toast_style(&self) -> ColoredString {
        self.italic().truecolor(230, 230, 30)
    }
    fn quest_style(&self) -> ColoredString {
        self.truecolor(220, 40, 220)
    }
    fn error_style(&self) -> ColoredString {
        self.truecolor(230, 30, 30)
    }
    fn denied_style(&self) -> ColoredString {
        self.italic().truecolor(230, 30, 30)
    }
    fn section_style(&self) -> ColoredString {
        format!("[{self}]").truecolor(75, 80, 75)
    }
}

impl GameStyle for String {
    fn speaker_style(&self) -> ColoredString {
        self.as_str().speaker_style()
    }
    fn narration_style(&self) -> ColoredString {
        self.as_str().narration_style()
    }
    fn dialogue_style(&self) -> ColoredString {
        self.as_str().dialogue_style()
    }
    fn chapter_style(&self) -> ColoredString {
        self.as_str().chapter_style()
    }
    fn option_style(&self) -> ColoredString {
        self.as_str().option_style()
    }
    fn option_disabled_style(&self) -> ColoredString {
        self.as_str().option_disabled_style()
    }
    fn requirement_style(&self) -> ColoredString {
        self.as_str().requirement_style()
    }
    fn item_style(&self) -> ColoredString {
        self.as_str().item_style()
    }
    fn stat_style(&self) -> ColoredString {
        self.as_str().stat_style()
    }
    fn toast_style(&self) -> ColoredString {
        self.as_str().toast_style()
    }
    fn quest_style(&self) -> ColoredString {
        self.as_str().quest_style()
    }
    fn error_style(&self) -> ColoredString {
        self.as_str().error_style()
    }
    fn denied_style(&self) -> ColoredString {
        self.as_str().denied_style()
    }
    fn section_style(&self) -> ColoredString {
        self.as_str().section_style()
    }
}
