//! Runtime story graph.
//!
//! [`StoryGraph`] wraps a loaded [`StoryDef`] with the lookups the interpreter
//! needs: node resolution within a scene, scene/chapter succession, and the
//! read-only [`Catalog`] of attributes, pools, characters and items. It is built
//! once per session and never mutated.

use std::collections::BTreeMap;

use fable_data::{
    AttributeDef, ChapterDef, CharacterDef, Id, ItemDef, NodeDef, PoolDef, QuestDef, RandomEventDef, RouteDef,
    SceneDef, StoryDef, StoryMeta, ThresholdDef,
};

use crate::player::Cursor;

/// Read-only lookup tables for ids referenced by conditions and effects.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    attributes: BTreeMap<Id, AttributeDef>,
    pools: BTreeMap<Id, PoolDef>,
    characters: BTreeMap<Id, CharacterDef>,
    items: BTreeMap<Id, ItemDef>,
}

impl Catalog {
    pub fn from_defs(
        attributes: &[AttributeDef],
        pools: &[PoolDef],
        characters: &[CharacterDef],
        items: &[ItemDef],
    ) -> Self {
        Self {
            attributes: attributes.iter().map(|d| (d.id.clone(), d.clone())).collect(),
            pools: pools.iter().map(|d| (d.id.clone(), d.clone())).collect(),
            characters: characters.iter().map(|d| (d.id.clone(), d.clone())).collect(),
            items: items.iter().map(|d| (d.id.clone(), d.clone())).collect(),
        }
    }

    pub fn attribute(&self, id: &str) -> Option<&AttributeDef> {
        self.attributes.get(id)
    }

    pub fn pool(&self, id: &str) -> Option<&PoolDef> {
        self.pools.get(id)
    }

    pub fn character(&self, id: &str) -> Option<&CharacterDef> {
        self.characters.get(id)
    }

    pub fn item(&self, id: &str) -> Option<&ItemDef> {
        self.items.get(id)
    }

    pub fn attributes(&self) -> impl Iterator<Item = &AttributeDef> {
        self.attributes.values()
    }

    pub fn pools(&self) -> impl Iterator<Item = &PoolDef> {
        self.pools.values()
    }

    pub fn characters(&self) -> impl Iterator<Item = &CharacterDef> {
        self.characters.values()
    }

    /// Declared ceiling of an attribute or pool.
    pub fn stat_max(&self, id: &str) -> Option<i32> {
        self.attribute(id)
            .map(|def| def.max)
            .or_else(|| self.pool(id).map(|def| def.max))
    }

    /// Display name of an attribute or pool, falling back to its id.
    pub fn stat_name<'a>(&'a self, id: &'a str) -> &'a str {
        let name = self
            .attribute(id)
            .map(|def| def.name.as_str())
            .or_else(|| self.pool(id).map(|def| def.name.as_str()));
        non_empty_or(name, id)
    }

    pub fn item_name<'a>(&'a self, id: &'a str) -> &'a str {
        non_empty_or(self.item(id).map(|def| def.name.as_str()), id)
    }

    pub fn character_name<'a>(&'a self, id: &'a str) -> &'a str {
        non_empty_or(self.character(id).map(|def| def.name.as_str()), id)
    }
}

fn non_empty_or<'a>(name: Option<&'a str>, fallback: &'a str) -> &'a str {
    match name {
        Some(name) if !name.is_empty() => name,
        _ => fallback,
    }
}

#[derive(Debug, Clone)]
pub struct StoryGraph {
    meta: StoryMeta,
    chapters: Vec<ChapterDef>,
    catalog: Catalog,
    quests: Vec<QuestDef>,
    routes: Vec<RouteDef>,
    random_events: Vec<RandomEventDef>,
    thresholds: Vec<ThresholdDef>,
}

impl From<StoryDef> for StoryGraph {
    fn from(def: StoryDef) -> Self {
        let catalog = Catalog::from_defs(&def.attributes, &def.pools, &def.characters, &def.items);
        Self {
            meta: def.meta,
            chapters: def.chapters,
            catalog,
            quests: def.quests,
            routes: def.routes,
            random_events: def.random_events,
            thresholds: def.thresholds,
        }
    }
}

impl StoryGraph {
    pub fn meta(&self) -> &StoryMeta {
        &self.meta
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn chapters(&self) -> &[ChapterDef] {
        &self.chapters
    }

    pub fn quests(&self) -> &[QuestDef] {
        &self.quests
    }

    pub fn routes(&self) -> &[RouteDef] {
        &self.routes
    }

    pub fn random_events(&self) -> &[RandomEventDef] {
        &self.random_events
    }

    pub fn thresholds(&self) -> &[ThresholdDef] {
        &self.thresholds
    }

    /// First node of the first non-empty scene, if the story has any nodes.
    pub fn first_cursor(&self) -> Option<Cursor> {
        self.chapters.iter().find_map(|chapter| first_cursor_in(chapter, &chapter.scenes))
    }

    pub fn chapter(&self, id: &str) -> Option<&ChapterDef> {
        self.chapters.iter().find(|chapter| chapter.id == id)
    }

    pub fn scene(&self, chapter: &str, scene: &str) -> Option<&SceneDef> {
        self.chapter(chapter)?.scenes.iter().find(|s| s.id == scene)
    }

    pub fn node(&self, cursor: &Cursor) -> Option<&NodeDef> {
        self.scene(&cursor.chapter, &cursor.scene)?
            .nodes
            .iter()
            .find(|node| node.id == cursor.node)
    }

    pub fn contains(&self, cursor: &Cursor) -> bool {
        self.node(cursor).is_some()
    }

    /// Resolve `node` within the scene under `cursor`.
    pub fn resolve_in_scene(&self, cursor: &Cursor, node: &str) -> Option<Cursor> {
        let target = cursor.with_node(node);
        self.contains(&target).then_some(target)
    }

    /// First node of the scene following `cursor`'s scene: later scenes of the
    /// same chapter first, then the scenes of following chapters. Empty scenes
    /// are skipped.
    pub fn next_scene_start(&self, cursor: &Cursor) -> Option<Cursor> {
        let chapter_idx = self.chapters.iter().position(|c| c.id == cursor.chapter)?;
        let chapter = &self.chapters[chapter_idx];
        let scene_idx = chapter.scenes.iter().position(|s| s.id == cursor.scene)?;

        first_cursor_in(chapter, &chapter.scenes[scene_idx + 1..]).or_else(|| {
            self.chapters[chapter_idx + 1..]
                .iter()
                .find_map(|chapter| first_cursor_in(chapter, &chapter.scenes))
        })
    }
}

fn first_cursor_in(chapter: &ChapterDef, scenes: &[SceneDef]) -> Option<Cursor> {
    scenes.iter().find_map(|scene| {
        scene
            .nodes
            .first()
            .map(|node| Cursor::new(chapter.id.clone(), scene.id.clone(), node.id.clone()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use fable_data::NodeKind;

    fn narration(id: &str) -> NodeDef {
        NodeDef {
            id: id.into(),
            next: None,
            kind: NodeKind::Narration { text: id.into() },
        }
    }

    fn scene(id: &str, nodes: &[&str]) -> SceneDef {
        SceneDef {
            id: id.into(),
            title: String::new(),
            nodes: nodes.iter().map(|n| narration(n)).collect(),
        }
    }

    fn graph() -> StoryGraph {
        StoryGraph::from(StoryDef {
            chapters: vec![
                ChapterDef {
                    id: "ch1".into(),
                    title: "One".into(),
                    scenes: vec![scene("empty", &[]), scene("s1", &["a", "b"]), scene("s2", &["c"])],
                },
                ChapterDef {
                    id: "ch2".into(),
                    title: "Two".into(),
                    scenes: vec![scene("s3", &[]), scene("s4", &["d"])],
                },
            ],
            ..StoryDef::default()
        })
    }

    #[test]
    fn first_cursor_skips_empty_scenes() {
        assert_eq!(graph().first_cursor(), Some(Cursor::new("ch1", "s1", "a")));
    }

    #[test]
    fn next_scene_walks_scenes_then_chapters() {
        let graph = graph();
        let in_s1 = Cursor::new("ch1", "s1", "b");
        assert_eq!(graph.next_scene_start(&in_s1), Some(Cursor::new("ch1", "s2", "c")));
        let in_s2 = Cursor::new("ch1", "s2", "c");
        assert_eq!(graph.next_scene_start(&in_s2), Some(Cursor::new("ch2", "s4", "d")));
        let last = Cursor::new("ch2", "s4", "d");
        assert_eq!(graph.next_scene_start(&last), None);
    }

    #[test]
    fn resolution_is_scoped_to_the_scene() {
        let graph = graph();
        let cursor = Cursor::new("ch1", "s1", "a");
        assert!(graph.resolve_in_scene(&cursor, "b").is_some());
        assert!(graph.resolve_in_scene(&cursor, "c").is_none());
    }

    #[test]
    fn names_fall_back_to_ids() {
        let catalog = Catalog::default();
        assert_eq!(catalog.stat_name("strength"), "strength");
        assert_eq!(catalog.item_name("herb"), "herb");
    }
}
