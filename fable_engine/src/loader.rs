//! Story loading.
//!
//! Stories are RON or JSON files (chosen by extension) deserialized into
//! `StoryDef`, validated, and indexed into a `StoryGraph`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use fable_data::{StoryDef, validate_story};
use log::{info, warn};

use crate::story::StoryGraph;

/// Read a story definition without validating it.
///
/// # Errors
/// IO failures, unknown extensions, and parse errors.
pub fn load_story_def(path: &Path) -> Result<StoryDef> {
    let text = fs::read_to_string(path).with_context(|| format!("reading story from '{}'", path.display()))?;
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("ron") => ron::from_str(&text).with_context(|| format!("parsing story RON from '{}'", path.display())),
        Some("json") => {
            serde_json::from_str(&text).with_context(|| format!("parsing story JSON from '{}'", path.display()))
        },
        other => bail!(
            "unsupported story format '{}' for '{}' (expected .ron or .json)",
            other.unwrap_or(""),
            path.display()
        ),
    }
}

/// Load, validate and index a story.
///
/// Validation problems are logged as warnings; with `strict` they abort the load.
/// Broken references left in a non-strict load halt play when reached.
///
/// # Errors
/// See [`load_story_def`]; with `strict`, any validation problem.
pub fn load_story(path: &Path, strict: bool) -> Result<StoryGraph> {
    let def = load_story_def(path)?;
    let problems = validate_story(&def);
    if !problems.is_empty() {
        if strict {
            let details = problems
                .into_iter()
                .map(|err| format!("- {err}"))
                .collect::<Vec<_>>()
                .join("\n");
            bail!("story validation failed:\n{details}");
        }
        for problem in &problems {
            warn!("story '{}': {problem}", path.display());
        }
    }

    let graph = StoryGraph::from(def);
    info!("story \"{}\" loaded from {}", graph.meta().title, path.display());
    info!("{} chapters added to story", graph.chapters().len());
    info!("{} quests and {} routes added to story", graph.quests().len(), graph.routes().len());
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::Builder;

    const STORY: &str = r#"(
        meta: (title: "Pocket Tale"),
        chapters: [(
            id: "ch1",
            title: "Start",
            scenes: [(
                id: "room",
                title: "Room",
                nodes: [(id: "a", kind: narration(text: "Hello."))],
            )],
        )],
    )"#;

    fn write_temp(suffix: &str, body: &str) -> Result<tempfile::NamedTempFile> {
        let mut file = Builder::new().suffix(suffix).tempfile()?;
        file.write_all(body.as_bytes())?;
        Ok(file)
    }

    #[test]
    fn loads_ron_stories() -> Result<()> {
        let file = write_temp(".ron", STORY)?;
        let graph = load_story(file.path(), true)?;
        assert_eq!(graph.meta().title, "Pocket Tale");
        assert!(graph.first_cursor().is_some());
        Ok(())
    }

    #[test]
    fn loads_json_stories() -> Result<()> {
        let json = r#"{
            "meta": {"title": "Json Tale"},
            "chapters": [{"id": "ch1", "title": "Start", "scenes": [
                {"id": "room", "title": "Room", "nodes": [{"id": "a", "kind": {"narration": {"text": "Hi."}}}]}
            ]}]
        }"#;
        let file = write_temp(".json", json)?;
        assert_eq!(load_story(file.path(), true)?.meta().title, "Json Tale");
        Ok(())
    }

    #[test]
    fn strict_mode_rejects_broken_references() -> Result<()> {
        let broken = STORY.replace(r#"(id: "a","#, r#"(id: "a", next: Some("missing"),"#);
        let file = write_temp(".ron", &broken)?;
        assert!(load_story(file.path(), true).is_err());
        assert!(load_story(file.path(), false).is_ok());
        Ok(())
    }

    #[test]
    fn unknown_extension_is_an_error() -> Result<()> {
        let file = write_temp(".yaml", "title: nope")?;
        assert!(load_story(file.path(), false).is_err());
        Ok(())
    }
}
