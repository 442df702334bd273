#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
//! ** Fable **
//! Terminal player for branching stories.
//!
//! Usage: `fable [story.ron|story.json]`. Without an argument the story named
//! in `fable.toml` is loaded from the data directory.

use std::env;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use fable_engine::data_paths::data_path;
use fable_engine::repl::normal_block;
use fable_engine::style::GameStyle;
use fable_engine::{FABLE_VERSION, Session, load_config, load_story, run_repl};

use anyhow::{Context, Result};
use colored::Colorize;
use log::info;

fn main() -> Result<()> {
    env_logger::init();
    let config = load_config(&data_path("fable.toml"));
    let story_path = env::args_os()
        .nth(1)
        .map_or_else(|| data_path(&config.story_file), PathBuf::from);

    info!("Start: loading story from {}...", story_path.display());
    let graph = load_story(&story_path, config.strict_validation).context("while loading story")?;
    let mut session = Session::new(Arc::new(graph), config).context("while starting session")?;
    info!("Story loaded successfully.");

    // clear the screen
    print!("\x1B[2J\x1B[H");
    std::io::stdout().flush().context("flushing stdout")?;
    info!("Starting the story!");

    let meta = session.graph().meta();
    println!("{:^84}", meta.title.to_uppercase().bright_yellow().underline());
    if !meta.author.is_empty() {
        println!("{:^84}", format!("by {}", meta.author).dimmed());
    }
    println!("{:^84}", format!("fable v{FABLE_VERSION}").dimmed());
    if !meta.intro.is_empty() {
        println!("\n{}", textwrap::fill(&meta.intro, &normal_block()).narration_style());
    }
    println!("\n{}", "Type 'help' at any choice for commands.".dimmed());

    run_repl(&mut session)
}
