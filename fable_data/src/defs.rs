use serde::de::{Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::Lenient;

/// Stable identifier used across StoryDef references.
pub type Id = String;

/// Top-level story data loaded by the engine.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StoryDef {
    #[serde(default)]
    pub meta: StoryMeta,
    #[serde(default)]
    pub attributes: Vec<AttributeDef>,
    #[serde(default)]
    pub pools: Vec<PoolDef>,
    #[serde(default)]
    pub characters: Vec<CharacterDef>,
    #[serde(default)]
    pub items: Vec<ItemDef>,
    #[serde(default)]
    pub chapters: Vec<ChapterDef>,
    #[serde(default)]
    pub quests: Vec<QuestDef>,
    #[serde(default)]
    pub routes: Vec<RouteDef>,
    #[serde(default)]
    pub random_events: Vec<RandomEventDef>,
    #[serde(default)]
    pub thresholds: Vec<ThresholdDef>,
}

/// Story-level metadata shown at startup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoryMeta {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub intro: String,
}

/// A player attribute such as strength or insight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeDef {
    pub id: Id,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_attribute_initial")]
    pub initial: i32,
    #[serde(default = "default_ceiling")]
    pub max: i32,
}

/// A depletable/regenerating resource pool (health, stamina).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolDef {
    pub id: Id,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_ceiling")]
    pub max: i32,
    /// Starting value; a fresh pool starts full when omitted.
    #[serde(default)]
    pub initial: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharacterDef {
    pub id: Id,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub initial_relationship: i32,
}

/// Broad item grouping. Equipment and key items do not stack unless told otherwise.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ItemCategory {
    Consumable,
    Equipment,
    Key,
    Material,
    #[default]
    Misc,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemDef {
    pub id: Id,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: ItemCategory,
    #[serde(default)]
    pub stackable: Option<bool>,
    #[serde(default)]
    pub stack_limit: Option<u32>,
    /// Effect applied when the player uses the item; the item is consumed afterwards.
    #[serde(default)]
    pub use_effect: Option<EffectDef>,
}

impl ItemDef {
    /// Whether grants of this item merge into an existing stack.
    pub fn is_stackable(&self) -> bool {
        self.stackable
            .unwrap_or(!matches!(self.category, ItemCategory::Equipment | ItemCategory::Key))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChapterDef {
    pub id: Id,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub scenes: Vec<SceneDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneDef {
    pub id: Id,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub nodes: Vec<NodeDef>,
}

/// One step of narrative content. Ids are unique within the owning scene.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDef {
    pub id: Id,
    #[serde(default)]
    pub next: Option<Id>,
    pub kind: NodeKind,
}

/// Behavior-specific payload of a node.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeKind {
    Dialogue {
        #[serde(default)]
        speaker: Option<Id>,
        text: String,
    },
    Narration {
        text: String,
    },
    Choice {
        #[serde(default)]
        description: Option<String>,
        #[serde(default)]
        options: Vec<OptionDef>,
    },
    Check {
        attribute: Id,
        #[serde(default = "default_difficulty")]
        difficulty: i32,
        #[serde(default)]
        success: Option<Id>,
        #[serde(default)]
        failure: Option<Id>,
    },
    ItemGrant {
        items: Vec<ItemGrantDef>,
    },
    EventTrigger {
        event: String,
        #[serde(default)]
        effect: Option<EffectDef>,
    },
    #[serde(rename = "default", alias = "passthrough")]
    Passthrough {
        #[serde(default)]
        text: Option<String>,
    },
}

impl NodeKind {
    /// Short type tag used in logs and diagnostics.
    pub fn tag(&self) -> &'static str {
        match self {
            NodeKind::Dialogue { .. } => "dialogue",
            NodeKind::Narration { .. } => "narration",
            NodeKind::Choice { .. } => "choice",
            NodeKind::Check { .. } => "check",
            NodeKind::ItemGrant { .. } => "itemGrant",
            NodeKind::EventTrigger { .. } => "eventTrigger",
            NodeKind::Passthrough { .. } => "default",
        }
    }
}

/// A selectable option of a choice node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionDef {
    #[serde(default)]
    pub id: Option<Id>,
    pub text: String,
    #[serde(default)]
    pub condition: Option<ConditionDef>,
    #[serde(default)]
    pub effect: Option<EffectDef>,
    /// Node to enter after selection; `None` ends the scene.
    #[serde(default)]
    pub target: Option<Id>,
}

/// Minimum values keyed by id, kept in the order the story file lists them.
///
/// A repeated id keeps its first position and takes the last value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Minimums(Vec<(Id, i32)>);

impl Minimums {
    pub fn iter(&self) -> impl Iterator<Item = (&Id, &i32)> {
        self.0.iter().map(|(id, value)| (id, value))
    }

    pub fn keys(&self) -> impl Iterator<Item = &Id> {
        self.0.iter().map(|(id, _)| id)
    }

    pub fn get(&self, id: &str) -> Option<&i32> {
        self.0.iter().find(|(key, _)| key == id).map(|(_, value)| value)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn insert(&mut self, id: Id, value: i32) {
        match self.0.iter_mut().find(|(key, _)| *key == id) {
            Some(entry) => entry.1 = value,
            None => self.0.push((id, value)),
        }
    }
}

impl FromIterator<(Id, i32)> for Minimums {
    fn from_iter<I: IntoIterator<Item = (Id, i32)>>(iter: I) -> Self {
        let mut minimums = Minimums::default();
        for (id, value) in iter {
            minimums.insert(id, value);
        }
        minimums
    }
}

impl<const N: usize> From<[(Id, i32); N]> for Minimums {
    fn from(entries: [(Id, i32); N]) -> Self {
        entries.into_iter().collect()
    }
}

impl Serialize for Minimums {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (id, value) in &self.0 {
            map.serialize_entry(id, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Minimums {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct MinimumsVisitor;

        impl<'de> Visitor<'de> for MinimumsVisitor {
            type Value = Minimums;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of ids to minimum values")
            }

            fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut minimums = Minimums::default();
                while let Some((id, value)) = access.next_entry::<Id, i32>()? {
                    minimums.insert(id, value);
                }
                Ok(minimums)
            }
        }

        deserializer.deserialize_map(MinimumsVisitor)
    }
}

/// Requirement clauses gating an option, quest, route or random event.
///
/// Absent clauses are vacuously satisfied. Keys accepted by older story files
/// are kept as aliases and unknown keys are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConditionDef {
    #[serde(default, alias = "needs_attribute", alias = "需要属性")]
    pub attributes: Lenient<Minimums>,
    #[serde(default, alias = "needs_item", alias = "需要物品")]
    pub items: Lenient<Vec<Id>>,
    #[serde(default, alias = "needs_relationship", alias = "需要好感")]
    pub relationships: Lenient<Minimums>,
    #[serde(default, alias = "needs_flag", alias = "需要标记")]
    pub flags: Lenient<Vec<Id>>,
    #[serde(default, alias = "forbid_flag", alias = "禁止标记")]
    pub forbidden_flags: Lenient<Vec<Id>>,
}

impl ConditionDef {
    /// Names of clauses whose value could not be parsed.
    pub fn malformed_clauses(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.attributes.is_malformed() {
            names.push("attributes");
        }
        if self.items.is_malformed() {
            names.push("items");
        }
        if self.relationships.is_malformed() {
            names.push("relationships");
        }
        if self.flags.is_malformed() {
            names.push("flags");
        }
        if self.forbidden_flags.is_malformed() {
            names.push("forbidden_flags");
        }
        names
    }
}

/// A batch of state mutations. Applied in a fixed clause order regardless of
/// field order in the source file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EffectDef {
    #[serde(default, alias = "attribute_change", alias = "属性变化")]
    pub attributes: Lenient<BTreeMap<Id, i32>>,
    #[serde(default, alias = "relationship_change", alias = "好感变化")]
    pub relationships: Lenient<BTreeMap<Id, i32>>,
    #[serde(default, alias = "get_items", alias = "获得物品")]
    pub items: Lenient<Vec<ItemGrantDef>>,
    #[serde(default, alias = "set_flags", alias = "设置标记")]
    pub set_flags: Lenient<Vec<Id>>,
    #[serde(default, alias = "remove_flags", alias = "移除标记")]
    pub clear_flags: Lenient<Vec<Id>>,
}

impl EffectDef {
    /// Names of clauses whose value could not be parsed.
    pub fn malformed_clauses(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.attributes.is_malformed() {
            names.push("attributes");
        }
        if self.relationships.is_malformed() {
            names.push("relationships");
        }
        if self.items.is_malformed() {
            names.push("items");
        }
        if self.set_flags.is_malformed() {
            names.push("set_flags");
        }
        if self.clear_flags.is_malformed() {
            names.push("clear_flags");
        }
        names
    }
}

/// Grant of `count` units of an item. A bare id string means one unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ItemGrantRepr")]
pub struct ItemGrantDef {
    pub item: Id,
    pub count: u32,
}

impl ItemGrantDef {
    pub fn one(item: impl Into<Id>) -> Self {
        Self {
            item: item.into(),
            count: 1,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ItemGrantRepr {
    Bare(Id),
    Counted {
        #[serde(alias = "id")]
        item: Id,
        #[serde(default = "default_grant_count")]
        count: u32,
    },
}

impl From<ItemGrantRepr> for ItemGrantDef {
    fn from(repr: ItemGrantRepr) -> Self {
        match repr {
            ItemGrantRepr::Bare(item) => ItemGrantDef { item, count: 1 },
            ItemGrantRepr::Counted { item, count } => ItemGrantDef { item, count },
        }
    }
}

/// A quest unlocked by a condition and completed when every objective holds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestDef {
    pub id: Id,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub unlock: ConditionDef,
    #[serde(default)]
    pub objectives: Vec<ObjectiveDef>,
    #[serde(default)]
    pub rewards: EffectDef,
    /// Quest considered for unlock as soon as this one completes.
    #[serde(default)]
    pub next_quest: Option<Id>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ObjectiveDef {
    Flag {
        flag: Id,
        #[serde(default)]
        description: String,
    },
    Collect {
        item: Id,
        #[serde(default = "default_grant_count")]
        count: u32,
    },
}

/// A story route (ending branch) that unlocks when its condition holds while
/// the player is inside one of the detection chapters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteDef {
    pub id: Id,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub unlock: ConditionDef,
    #[serde(default)]
    pub detect_in: Vec<Id>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomEventDef {
    pub id: Id,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub text: String,
    /// Scenes where the event may fire; empty means anywhere.
    #[serde(default)]
    pub scenes: Vec<Id>,
    /// Probability in `0.0..=1.0` per eligible scene entry.
    pub chance: f64,
    #[serde(default)]
    pub condition: Option<ConditionDef>,
    #[serde(default)]
    pub effect: EffectDef,
    /// Number of scene entries to wait before the event may fire again.
    #[serde(default)]
    pub cooldown: u32,
}

/// Watches an attribute or pool and reacts when its value enters a range.
///
/// Rules: `<N`, `<=N`, `>N`, `>=N`, `A-B`, `N以下` (below N), `N以上` (at least N).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdDef {
    pub stat: Id,
    pub rule: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub effect: Option<EffectDef>,
}

fn default_attribute_initial() -> i32 {
    10
}

fn default_ceiling() -> i32 {
    100
}

fn default_difficulty() -> i32 {
    50
}

fn default_grant_count() -> u32 {
    1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn condition_accepts_legacy_keys_and_ignores_unknown() {
        let raw = r#"{
            "needs_attribute": {"strength": 40},
            "需要标记": ["met_mentor"],
            "mystery_clause": 12
        }"#;
        let cond: ConditionDef = serde_json::from_str(raw).unwrap();
        assert_eq!(cond.attributes.valid().and_then(|m| m.get("strength")), Some(&40));
        assert_eq!(cond.flags.valid().map(Vec::len), Some(1));
        assert!(cond.malformed_clauses().is_empty());
    }

    #[test]
    fn condition_minimums_keep_written_order() {
        let raw = r#"{"attributes": {"wits": 30, "courage": 20, "wits": 35}}"#;
        let cond: ConditionDef = serde_json::from_str(raw).unwrap();
        let entries: Vec<(&str, i32)> = cond
            .attributes
            .valid()
            .map(|m| m.iter().map(|(id, v)| (id.as_str(), *v)).collect())
            .unwrap_or_default();
        assert_eq!(entries, [("wits", 35), ("courage", 20)]);

        let ron_cond: ConditionDef = ron::from_str(r#"(relationships: {"toll": 5, "maren": 20})"#).unwrap();
        let keys: Vec<&Id> = ron_cond.relationships.valid().map(|m| m.keys().collect()).unwrap_or_default();
        assert_eq!(keys, ["toll", "maren"]);
    }

    #[test]
    fn malformed_effect_clause_is_kept_as_marker() {
        let raw = r#"{"set_flags": "oops", "get_items": ["herb", {"id": "coin", "count": 3}]}"#;
        let effect: EffectDef = serde_json::from_str(raw).unwrap();
        assert_eq!(effect.malformed_clauses(), vec!["set_flags"]);
        let grants = effect.items.valid().unwrap();
        assert_eq!(grants[0], ItemGrantDef::one("herb"));
        assert_eq!(grants[1].count, 3);
    }

    #[test]
    fn equipment_does_not_stack_by_default() {
        let sword = ItemDef {
            id: "sword".into(),
            name: "Sword".into(),
            description: String::new(),
            category: ItemCategory::Equipment,
            stackable: None,
            stack_limit: None,
            use_effect: None,
        };
        assert!(!sword.is_stackable());
        let herb = ItemDef {
            category: ItemCategory::Consumable,
            ..sword.clone()
        };
        assert!(herb.is_stackable());
    }

    #[test]
    fn check_node_defaults_difficulty() {
        let node: NodeDef =
            serde_json::from_str(r#"{"id": "c1", "kind": {"check": {"attribute": "strength"}}}"#).unwrap();
        match node.kind {
            NodeKind::Check { difficulty, .. } => assert_eq!(difficulty, 50),
            other => panic!("unexpected node kind {other:?}"),
        }
    }
}
