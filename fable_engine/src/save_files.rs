//! Save-game discovery and serialization helpers.
//!
//! Saves are RON files named `<slot>-fable-<version>.ron`, kept in a
//! per-story folder under the save directory.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result, bail};
use fable_data::StoryMeta;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::macros::format_description;
use uuid::Uuid;

use crate::FABLE_VERSION;
use crate::player::Snapshot;

pub const SAVE_DIR: &str = "saved_games";

const SLOT_MARKER: &str = "-fable-";

/// Everything written to a save slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveFile {
    /// Engine version that wrote the file.
    pub version: String,
    /// Stable id derived from the story slug; saves of other stories are refused.
    pub story_id: Uuid,
    pub story_title: String,
    pub saved_at: String,
    pub snapshot: Snapshot,
}

impl SaveFile {
    pub fn new(meta: &StoryMeta, snapshot: Snapshot) -> Self {
        Self {
            version: FABLE_VERSION.to_string(),
            story_id: story_id(meta),
            story_title: meta.title.clone(),
            saved_at: timestamp(),
            snapshot,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveSlot {
    pub slot: String,
    pub version: String,
    pub path: PathBuf,
    pub file_name: String,
    pub modified: Option<SystemTime>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveSummary {
    pub story_title: String,
    pub saved_at: String,
    /// Display form of the saved cursor.
    pub position: String,
    pub play_time: Duration,
    pub items: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveFileStatus {
    Ready,
    VersionMismatch { save_version: String, current_version: String },
    Corrupted { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveFileEntry {
    pub slot: String,
    pub version: String,
    pub path: PathBuf,
    pub file_name: String,
    pub modified: Option<SystemTime>,
    pub summary: Option<SaveSummary>,
    pub status: SaveFileStatus,
}

/// Deterministic id for a story, from its slug (or title when no slug is set).
pub fn story_id(meta: &StoryMeta) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, sanitize_slug(story_key(meta)).as_bytes())
}

fn story_key(meta: &StoryMeta) -> &str {
    if meta.slug.trim().is_empty() { &meta.title } else { &meta.slug }
}

/// Save folder for a story under `root`.
pub fn save_dir_for_story(root: &Path, meta: &StoryMeta) -> PathBuf {
    root.join(sanitize_slug(story_key(meta)))
}

/// Path of `slot` for the running engine version.
pub fn slot_path(dir: &Path, slot: &str) -> PathBuf {
    dir.join(format!("{slot}{SLOT_MARKER}{FABLE_VERSION}.ron"))
}

/// Slot names become file names; keep them to a safe alphabet.
///
/// # Errors
/// Rejects empty names and names with characters outside `[A-Za-z0-9_]`.
pub fn validate_slot_name(slot: &str) -> Result<()> {
    if slot.is_empty() {
        bail!("slot name is empty");
    }
    if !slot.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_') {
        bail!("slot name '{slot}' may only contain letters, digits and '_'");
    }
    Ok(())
}

/// Write `save` into `slot`, replacing any older file for that slot.
///
/// New slots are refused once `max_slots` distinct slots exist.
///
/// # Errors
/// Invalid slot names, a full save directory, or IO and serialization failures.
pub fn write_save(dir: &Path, slot: &str, save: &SaveFile, max_slots: usize) -> Result<PathBuf> {
    validate_slot_name(slot)?;
    let existing = collect_save_slots(dir)?;
    let mut distinct: Vec<&str> = existing.iter().map(|s| s.slot.as_str()).collect();
    distinct.sort_unstable();
    distinct.dedup();
    if !distinct.contains(&slot) && distinct.len() >= max_slots {
        bail!("all {max_slots} save slots are in use; delete one first");
    }

    fs::create_dir_all(dir).with_context(|| format!("creating save directory {}", dir.display()))?;
    let raw = ron::ser::to_string_pretty(save, ron::ser::PrettyConfig::default()).context("serializing save")?;
    let path = slot_path(dir, slot);
    fs::write(&path, raw).with_context(|| format!("writing save file {}", path.display()))?;

    // drop files written for this slot by other versions
    for stale in existing.iter().filter(|s| s.slot == slot && s.path != path) {
        if let Err(err) = fs::remove_file(&stale.path) {
            warn!("could not remove stale save {}: {err}", stale.path.display());
        }
    }
    info!("game saved to {}", path.display());
    Ok(path)
}

/// Find the newest file for `slot` in `dir`.
///
/// # Errors
/// Returns an error if the directory cannot be read or the slot does not exist.
pub fn find_slot(dir: &Path, slot: &str) -> Result<SaveSlot> {
    collect_save_slots(dir)?
        .into_iter()
        .filter(|s| s.slot == slot)
        .max_by(|a, b| a.modified.cmp(&b.modified))
        .with_context(|| format!("no save named '{slot}'"))
}

/// Load a save file from disk.
///
/// # Errors
/// Returns an error if the file cannot be read or deserialized.
pub fn load_save_file(path: &Path) -> Result<SaveFile> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading save file {}", path.display()))?;
    ron::from_str::<SaveFile>(&raw).with_context(|| format!("parsing save file {}", path.display()))
}

/// Load `slot` for the story described by `meta`.
///
/// # Errors
/// Missing or unreadable slots, and saves written for a different story.
pub fn load_slot(dir: &Path, slot: &str, meta: &StoryMeta) -> Result<SaveFile> {
    let found = find_slot(dir, slot)?;
    let save = load_save_file(&found.path)?;
    if save.story_id != story_id(meta) {
        bail!("save '{slot}' belongs to '{}', not '{}'", save.story_title, meta.title);
    }
    if save.version != FABLE_VERSION {
        warn!("loading save '{slot}' written by version {} (running {FABLE_VERSION})", save.version);
    }
    Ok(save)
}

/// Remove every file stored for `slot`. Returns the number of files removed.
///
/// # Errors
/// Returns an error if the slot does not exist or a file cannot be removed.
pub fn delete_save(dir: &Path, slot: &str) -> Result<usize> {
    let doomed: Vec<SaveSlot> = collect_save_slots(dir)?.into_iter().filter(|s| s.slot == slot).collect();
    if doomed.is_empty() {
        bail!("no save named '{slot}'");
    }
    for save in &doomed {
        fs::remove_file(&save.path).with_context(|| format!("removing {}", save.path.display()))?;
    }
    info!("deleted save '{slot}' ({} file(s))", doomed.len());
    Ok(doomed.len())
}

/// Discover save slot files stored in `dir`.
///
/// # Errors
/// Returns an error if the directory contents cannot be read or enumerated.
pub fn collect_save_slots(dir: &Path) -> Result<Vec<SaveSlot>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut slots = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("reading {}", dir.display()))? {
        let entry = entry.with_context(|| format!("enumerating {}", dir.display()))?;
        if let Some(slot) = slot_from_entry(&entry) {
            slots.push(slot);
        }
    }
    slots.sort_by(|a, b| a.slot.cmp(&b.slot).then(a.version.cmp(&b.version)));
    Ok(slots)
}

/// Build descriptive entries for save files located in `dir`, newest first.
///
/// # Errors
/// Returns an error if reading the directory fails.
pub fn build_save_entries(dir: &Path) -> Result<Vec<SaveFileEntry>> {
    let slots = collect_save_slots(dir)?;
    let mut entries: Vec<_> = slots.into_iter().map(entry_for_slot).collect();
    entries.sort_by(|a, b| b.modified.cmp(&a.modified).then(a.slot.cmp(&b.slot)));
    Ok(entries)
}

/// Format a human-friendly modified time relative to now.
pub fn format_modified(modified: SystemTime) -> String {
    match SystemTime::now().duration_since(modified) {
        Ok(delta) => format_ago(delta),
        Err(_) => "in the future".to_string(),
    }
}

/// Format play time as `1h 05m` / `12m 30s`.
pub fn format_play_time(played: Duration) -> String {
    let secs = played.as_secs();
    let (hours, minutes, seconds) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if hours > 0 {
        format!("{hours}h {minutes:02}m")
    } else {
        format!("{minutes}m {seconds:02}s")
    }
}

fn timestamp() -> String {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    now.format(format_description!("[year]-[month]-[day] [hour]:[minute]"))
        .unwrap_or_else(|_| now.unix_timestamp().to_string())
}

fn entry_for_slot(slot: SaveSlot) -> SaveFileEntry {
    let mut version = slot.version.clone();
    let (summary, status) = match fs::read_to_string(&slot.path) {
        Ok(raw) => match ron::from_str::<SaveFile>(&raw) {
            Ok(save) => {
                version.clone_from(&save.version);
                let status = if save.version == FABLE_VERSION {
                    SaveFileStatus::Ready
                } else {
                    SaveFileStatus::VersionMismatch {
                        save_version: save.version.clone(),
                        current_version: FABLE_VERSION.to_string(),
                    }
                };
                let summary = SaveSummary {
                    story_title: save.story_title,
                    saved_at: save.saved_at,
                    position: save.snapshot.cursor.to_string(),
                    play_time: Duration::from_millis(save.snapshot.play_time_ms),
                    items: save.snapshot.inventory.iter().map(|stack| stack.count as usize).sum(),
                };
                (Some(summary), status)
            },
            Err(err) => {
                warn!("failed to parse save '{}' ({}): {}", slot.slot, slot.path.display(), err);
                (
                    None,
                    SaveFileStatus::Corrupted {
                        message: format!("parse error: {}", trim_error(&err)),
                    },
                )
            },
        },
        Err(err) => {
            warn!("failed to read save '{}' ({}): {}", slot.slot, slot.path.display(), err);
            (
                None,
                SaveFileStatus::Corrupted {
                    message: format!("read error: {}", trim_error(&err)),
                },
            )
        },
    };

    SaveFileEntry {
        slot: slot.slot,
        version,
        path: slot.path,
        file_name: slot.file_name,
        modified: slot.modified,
        summary,
        status,
    }
}

fn slot_from_entry(entry: &fs::DirEntry) -> Option<SaveSlot> {
    let path = entry.path();
    if !path.is_file() || path.extension().and_then(|ext| ext.to_str()) != Some("ron") {
        return None;
    }
    let file_name = path.file_name().and_then(|name| name.to_str())?.to_string();
    let stem = path.file_stem().and_then(|stem| stem.to_str())?;
    let (slot, version) = stem.rsplit_once(SLOT_MARKER)?;
    if slot.is_empty() {
        return None;
    }
    let modified = entry.metadata().ok().and_then(|meta| meta.modified().ok());
    Some(SaveSlot {
        slot: slot.to_string(),
        version: version.to_string(),
        path,
        file_name,
        modified,
    })
}

/// Lowercase ASCII slug; runs of other characters collapse to one dash.
fn sanitize_slug(raw: &str) -> String {
    let mut slug = String::new();
    for ch in raw.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_end_matches('-');
    if slug.is_empty() { "story".to_string() } else { slug.to_string() }
}

fn format_ago(duration: Duration) -> String {
    const MINUTE: u64 = 60;
    const HOUR: u64 = MINUTE * 60;
    const DAY: u64 = HOUR * 24;
    const WEEK: u64 = DAY * 7;

    let secs = duration.as_secs();
    if secs < 30 {
        "just now".to_string()
    } else if secs < MINUTE {
        format!("{secs}s ago")
    } else if secs < HOUR {
        format!("{}m ago", secs / MINUTE)
    } else if secs < DAY {
        format!("{}h ago", secs / HOUR)
    } else if secs < WEEK {
        format!("{}d ago", secs / DAY)
    } else {
        format!("{}w ago", secs / WEEK)
    }
}

/// Clamp verbose error messages to a readable length.
fn trim_error(err: &impl ToString) -> String {
    let message = err.to_string();
    if message.chars().count() <= 120 {
        return message;
    }
    let mut trimmed: String = message.chars().take(117).collect();
    trimmed.push_str("...");
    trimmed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::Cursor;
    use std::collections::{BTreeMap, BTreeSet};
    use tempfile::tempdir;

    fn meta(title: &str) -> StoryMeta {
        StoryMeta {
            title: title.into(),
            ..StoryMeta::default()
        }
    }

    fn snapshot() -> Snapshot {
        Snapshot {
            cursor: Cursor::new("ch1", "gate", "a"),
            attributes: BTreeMap::new(),
            pools: BTreeMap::new(),
            inventory: Vec::new(),
            flags: BTreeSet::from(["met_mentor".to_string()]),
            relationships: BTreeMap::new(),
            play_time_ms: 754_000,
            pending_continue: None,
        }
    }

    #[test]
    fn collect_save_slots_handles_missing_directory() -> Result<()> {
        let dir = tempdir()?;
        assert!(collect_save_slots(&dir.path().join("missing"))?.is_empty());
        Ok(())
    }

    #[test]
    fn collect_save_slots_skips_invalid_files() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path();
        fs::write(path.join("alpha-fable-0.3.0.ron"), "()")?;
        fs::write(path.join("notes.txt"), "ignore me")?;
        fs::write(path.join("-fable-0.3.0.ron"), "()")?;
        fs::create_dir_all(path.join("nested"))?;

        let slots = collect_save_slots(path)?;
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].slot, "alpha");
        assert_eq!(slots[0].version, "0.3.0");
        Ok(())
    }

    #[test]
    fn write_then_load_slot() -> Result<()> {
        let dir = tempdir()?;
        let story = meta("The Lantern Road");
        let save = SaveFile::new(&story, snapshot());
        write_save(dir.path(), "morning", &save, 3)?;

        let loaded = load_slot(dir.path(), "morning", &story)?;
        assert_eq!(loaded.snapshot, save.snapshot);
        assert!(load_slot(dir.path(), "morning", &meta("Another Tale")).is_err());
        assert!(load_slot(dir.path(), "evening", &story).is_err());
        Ok(())
    }

    #[test]
    fn slot_limit_and_names_are_enforced() -> Result<()> {
        let dir = tempdir()?;
        let save = SaveFile::new(&meta("Tale"), snapshot());
        write_save(dir.path(), "one", &save, 1)?;
        write_save(dir.path(), "one", &save, 1)?;
        assert!(write_save(dir.path(), "two", &save, 1).is_err());
        assert!(write_save(dir.path(), "../escape", &save, 5).is_err());

        assert_eq!(delete_save(dir.path(), "one")?, 1);
        assert!(delete_save(dir.path(), "one").is_err());
        write_save(dir.path(), "two", &save, 1)?;
        Ok(())
    }

    #[test]
    fn build_save_entries_reports_status_variants() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path();
        let save = SaveFile::new(&meta("Tale"), snapshot());
        write_save(path, "alpha", &save, 10)?;

        let mut old = save.clone();
        old.version = "0.0.1".into();
        fs::write(path.join("beta-fable-0.0.1.ron"), ron::ser::to_string(&old)?)?;
        fs::write(path.join("gamma-fable-0.3.0.ron"), "this is not valid ron")?;

        let entries = build_save_entries(path)?;
        let find = |slot: &str| entries.iter().find(|entry| entry.slot == slot).expect("entry listed");

        let alpha = find("alpha");
        assert_eq!(alpha.status, SaveFileStatus::Ready);
        let summary = alpha.summary.as_ref().expect("summary");
        assert_eq!(summary.position, "ch1/gate/a");
        assert_eq!(format_play_time(summary.play_time), "12m 34s");

        assert!(matches!(find("beta").status, SaveFileStatus::VersionMismatch { .. }));
        assert_eq!(find("beta").version, "0.0.1");

        let gamma = find("gamma");
        assert!(matches!(gamma.status, SaveFileStatus::Corrupted { .. }));
        assert!(gamma.summary.is_none());
        Ok(())
    }

    #[test]
    fn story_ids_follow_the_slug() {
        let mut a = meta("The Lantern Road");
        let b = meta("the lantern road");
        assert_eq!(story_id(&a), story_id(&b));
        a.slug = "lantern".into();
        assert_ne!(story_id(&a), story_id(&b));
        assert_eq!(save_dir_for_story(Path::new("saves"), &b), Path::new("saves/the-lantern-road"));
    }
}
