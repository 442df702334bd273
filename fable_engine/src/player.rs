//! Player state module
//!
//! [`PlayerState`] is the mutable aggregate the story acts on: attributes,
//! resource pools, inventory, flags, relationships, the narrative cursor and
//! accumulated play time. Readers are public; writes go through
//! [`EffectApplier`](crate::effect::EffectApplier) so that every change is
//! clamped and announced on the event bus.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::time::Duration;

use fable_data::Id;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::events::StatKind;
use crate::story::Catalog;

pub const RELATIONSHIP_MIN: i32 = -100;
pub const RELATIONSHIP_MAX: i32 = 100;

/// Position in the story graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cursor {
    pub chapter: Id,
    pub scene: Id,
    pub node: Id,
}

impl Cursor {
    pub fn new(chapter: impl Into<Id>, scene: impl Into<Id>, node: impl Into<Id>) -> Self {
        Self {
            chapter: chapter.into(),
            scene: scene.into(),
            node: node.into(),
        }
    }

    /// Same chapter and scene, different node.
    pub fn with_node(&self, node: impl Into<Id>) -> Self {
        Self {
            node: node.into(),
            ..self.clone()
        }
    }

    pub fn same_scene(&self, other: &Cursor) -> bool {
        self.chapter == other.chapter && self.scene == other.scene
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.chapter, self.scene, self.node)
    }
}

/// A bounded value: attributes and resource pools share this shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meter {
    pub value: i32,
    pub max: i32,
}

impl Meter {
    /// Create a meter, clamping `value` into `[0, max]`.
    pub fn new(value: i32, max: i32) -> Self {
        let max = max.max(0);
        Self {
            value: value.clamp(0, max),
            max,
        }
    }

    /// Value after adding `delta`, clamped into `[0, ceiling]`.
    pub fn shifted(self, delta: i32, ceiling: i32) -> Meter {
        Meter::new(self.value.saturating_add(delta), ceiling)
    }
}

/// One inventory entry. Stackable items share a single stack; each
/// non-stackable unit gets its own stack with its own instance id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStack {
    pub item: Id,
    pub count: u32,
    pub instance: Uuid,
}

impl ItemStack {
    pub fn new(item: impl Into<Id>, count: u32) -> Self {
        Self {
            item: item.into(),
            count,
            instance: Uuid::new_v4(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerState {
    pub(crate) attributes: BTreeMap<Id, Meter>,
    pub(crate) pools: BTreeMap<Id, Meter>,
    pub(crate) inventory: Vec<ItemStack>,
    pub(crate) flags: BTreeSet<Id>,
    pub(crate) relationships: BTreeMap<Id, i32>,
    pub(crate) cursor: Cursor,
    pub(crate) play_time: Duration,
}

impl PlayerState {
    /// Fresh new-game state built from catalog defaults, positioned at `start`.
    pub fn new_game(catalog: &Catalog, start: Cursor) -> Self {
        let attributes = catalog
            .attributes()
            .map(|def| (def.id.clone(), Meter::new(def.initial, def.max)))
            .collect();
        let pools = catalog
            .pools()
            .map(|def| (def.id.clone(), Meter::new(def.initial.unwrap_or(def.max), def.max)))
            .collect();
        let relationships = catalog
            .characters()
            .map(|def| {
                (
                    def.id.clone(),
                    def.initial_relationship.clamp(RELATIONSHIP_MIN, RELATIONSHIP_MAX),
                )
            })
            .collect();
        Self {
            attributes,
            pools,
            inventory: Vec::new(),
            flags: BTreeSet::new(),
            relationships,
            cursor: start,
            play_time: Duration::ZERO,
        }
    }

    pub fn attribute(&self, id: &str) -> Option<Meter> {
        self.attributes.get(id).copied()
    }

    pub fn pool(&self, id: &str) -> Option<Meter> {
        self.pools.get(id).copied()
    }

    /// Look an id up as an attribute first, then as a pool.
    pub fn stat(&self, id: &str) -> Option<(StatKind, Meter)> {
        self.attribute(id)
            .map(|meter| (StatKind::Attribute, meter))
            .or_else(|| self.pool(id).map(|meter| (StatKind::Pool, meter)))
    }

    /// Current value of an attribute or pool; missing entries read as 0.
    pub fn stat_value(&self, id: &str) -> i32 {
        self.stat(id).map_or(0, |(_, meter)| meter.value)
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&Id, &Meter)> {
        self.attributes.iter()
    }

    pub fn pools(&self) -> impl Iterator<Item = (&Id, &Meter)> {
        self.pools.iter()
    }

    pub fn inventory(&self) -> &[ItemStack] {
        &self.inventory
    }

    /// Total units held across all stacks of `item`.
    pub fn item_count(&self, item: &str) -> u32 {
        self.inventory
            .iter()
            .filter(|stack| stack.item == item)
            .map(|stack| stack.count)
            .sum()
    }

    pub fn has_item(&self, item: &str) -> bool {
        self.inventory.iter().any(|stack| stack.item == item)
    }

    pub fn has_flag(&self, flag: &str) -> bool {
        self.flags.contains(flag)
    }

    pub fn flags(&self) -> impl Iterator<Item = &Id> {
        self.flags.iter()
    }

    /// Affinity with a character; unknown characters read as 0.
    pub fn relationship(&self, character: &str) -> i32 {
        self.relationships.get(character).copied().unwrap_or(0)
    }

    pub fn relationships(&self) -> impl Iterator<Item = (&Id, &i32)> {
        self.relationships.iter()
    }

    pub fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    pub(crate) fn set_cursor(&mut self, cursor: Cursor) {
        self.cursor = cursor;
    }

    pub fn play_time(&self) -> Duration {
        self.play_time
    }

    pub fn add_play_time(&mut self, elapsed: Duration) {
        self.play_time = self.play_time.saturating_add(elapsed);
    }

    /// Capture everything needed to reproduce this state.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            cursor: self.cursor.clone(),
            attributes: self.attributes.clone(),
            pools: self.pools.clone(),
            inventory: self.inventory.clone(),
            flags: self.flags.clone(),
            relationships: self.relationships.clone(),
            play_time_ms: u64::try_from(self.play_time.as_millis()).unwrap_or(u64::MAX),
            pending_continue: None,
        }
    }
}

/// Persisted form of a [`PlayerState`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub cursor: Cursor,
    #[serde(default)]
    pub attributes: BTreeMap<Id, Meter>,
    #[serde(default)]
    pub pools: BTreeMap<Id, Meter>,
    #[serde(default)]
    pub inventory: Vec<ItemStack>,
    #[serde(default)]
    pub flags: BTreeSet<Id>,
    #[serde(default)]
    pub relationships: BTreeMap<Id, i32>,
    #[serde(default)]
    pub play_time_ms: u64,
    /// First node of the next scene when saved at a scene-end "Continue" prompt.
    #[serde(default)]
    pub pending_continue: Option<Cursor>,
}

impl From<Snapshot> for PlayerState {
    /// Rebuild state from a snapshot, re-applying the value bounds and dropping empty stacks.
    fn from(snapshot: Snapshot) -> Self {
        let clamp_meters = |meters: BTreeMap<Id, Meter>| {
            meters
                .into_iter()
                .map(|(id, meter)| (id, Meter::new(meter.value, meter.max)))
                .collect()
        };
        Self {
            attributes: clamp_meters(snapshot.attributes),
            pools: clamp_meters(snapshot.pools),
            inventory: snapshot.inventory.into_iter().filter(|stack| stack.count > 0).collect(),
            flags: snapshot.flags,
            relationships: snapshot
                .relationships
                .into_iter()
                .map(|(id, value)| (id, value.clamp(RELATIONSHIP_MIN, RELATIONSHIP_MAX)))
                .collect(),
            cursor: snapshot.cursor,
            play_time: Duration::from_millis(snapshot.play_time_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_state() -> PlayerState {
        PlayerState {
            attributes: BTreeMap::from([("strength".to_string(), Meter::new(40, 100))]),
            pools: BTreeMap::from([("health".to_string(), Meter::new(80, 100))]),
            inventory: vec![ItemStack::new("herb", 2)],
            flags: BTreeSet::from(["met_mentor".to_string()]),
            relationships: BTreeMap::from([("lin".to_string(), 15)]),
            cursor: Cursor::new("ch1", "s1", "n3"),
            play_time: Duration::from_secs(95),
        }
    }

    #[test]
    fn meter_clamps_into_range() {
        assert_eq!(Meter::new(150, 100).value, 100);
        assert_eq!(Meter::new(-5, 100).value, 0);
        assert_eq!(Meter::new(50, 100).shifted(-200, 100).value, 0);
        assert_eq!(Meter::new(50, 100).shifted(i32::MAX, 100).value, 100);
    }

    #[test]
    fn missing_entries_read_as_zero() {
        let state = sample_state();
        assert_eq!(state.stat_value("wisdom"), 0);
        assert_eq!(state.relationship("stranger"), 0);
        assert_eq!(state.stat_value("health"), 80);
        assert_eq!(state.stat("health").map(|(kind, _)| kind), Some(StatKind::Pool));
    }

    #[test]
    fn snapshot_round_trip_reproduces_state() {
        let state = sample_state();
        let restored = PlayerState::from(state.snapshot());
        assert_eq!(restored, state);
    }

    #[test]
    fn snapshot_keeps_fractional_play_time() {
        let mut state = sample_state();
        state.add_play_time(Duration::from_millis(1_500));
        let restored = PlayerState::from(state.snapshot());
        assert_eq!(restored.play_time(), Duration::from_millis(96_500));
        assert_eq!(restored, state);
    }

    #[test]
    fn snapshot_survives_ron_serialization() {
        let state = sample_state();
        let ron = ron::ser::to_string(&state.snapshot()).expect("serialize");
        let parsed: Snapshot = ron::from_str(&ron).expect("deserialize");
        assert_eq!(PlayerState::from(parsed), state);
    }

    #[test]
    fn restoring_clamps_out_of_range_values() {
        let mut snapshot = sample_state().snapshot();
        snapshot.relationships.insert("lin".into(), 400);
        snapshot.inventory.push(ItemStack::new("ghost", 0));
        let state = PlayerState::from(snapshot);
        assert_eq!(state.relationship("lin"), RELATIONSHIP_MAX);
        assert!(!state.has_item("ghost"));
    }
}
