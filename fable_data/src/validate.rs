use std::collections::HashSet;
use std::fmt;

use crate::*;

/// Validation error for malformed or missing references in a StoryDef.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    DuplicateId { kind: &'static str, id: String },
    MissingReference { kind: &'static str, id: String, context: String },
    InvalidValue { context: String },
    MalformedClause { clause: &'static str, context: String },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::DuplicateId { kind, id } => {
                write!(f, "duplicate {kind} id '{id}'")
            },
            ValidationError::MissingReference { kind, id, context } => {
                write!(f, "missing {kind} '{id}' ({context})")
            },
            ValidationError::InvalidValue { context } => {
                write!(f, "invalid value ({context})")
            },
            ValidationError::MalformedClause { clause, context } => {
                write!(f, "malformed '{clause}' clause, treated as satisfied ({context})")
            },
        }
    }
}

impl std::error::Error for ValidationError {}

/// Validate cross-references and basic invariants in a StoryDef.
///
/// ```
/// use fable_data::{ChapterDef, NodeDef, NodeKind, SceneDef, StoryDef, validate_story};
///
/// let story = StoryDef {
///     chapters: vec![ChapterDef {
///         id: "ch1".into(),
///         title: "Beginnings".into(),
///         scenes: vec![SceneDef {
///             id: "s1".into(),
///             title: "Gate".into(),
///             nodes: vec![NodeDef {
///                 id: "n1".into(),
///                 next: None,
///                 kind: NodeKind::Narration { text: "The gate creaks.".into() },
///             }],
///         }],
///     }],
///     ..StoryDef::default()
/// };
/// assert!(validate_story(&story).is_empty());
/// ```
pub fn validate_story(story: &StoryDef) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    let mut attributes = HashSet::new();
    let mut pools = HashSet::new();
    let mut characters = HashSet::new();
    let mut items = HashSet::new();
    let mut chapters = HashSet::new();
    let mut scenes = HashSet::new();
    let mut quests = HashSet::new();

    track_ids(
        "attribute",
        story.attributes.iter().map(|a| a.id.as_str()),
        &mut attributes,
        &mut errors,
    );
    track_ids("pool", story.pools.iter().map(|p| p.id.as_str()), &mut pools, &mut errors);
    track_ids(
        "character",
        story.characters.iter().map(|c| c.id.as_str()),
        &mut characters,
        &mut errors,
    );
    track_ids("item", story.items.iter().map(|i| i.id.as_str()), &mut items, &mut errors);
    track_ids(
        "chapter",
        story.chapters.iter().map(|c| c.id.as_str()),
        &mut chapters,
        &mut errors,
    );
    track_ids(
        "scene",
        story.chapters.iter().flat_map(|c| c.scenes.iter().map(|s| s.id.as_str())),
        &mut scenes,
        &mut errors,
    );
    track_ids("quest", story.quests.iter().map(|q| q.id.as_str()), &mut quests, &mut errors);
    track_ids(
        "route",
        story.routes.iter().map(|r| r.id.as_str()),
        &mut HashSet::new(),
        &mut errors,
    );
    track_ids(
        "random event",
        story.random_events.iter().map(|e| e.id.as_str()),
        &mut HashSet::new(),
        &mut errors,
    );

    let stats: HashSet<String> = attributes.union(&pools).cloned().collect();
    let ids = IdSets {
        stats: &stats,
        characters: &characters,
        items: &items,
        chapters: &chapters,
        scenes: &scenes,
        quests: &quests,
    };

    if story.chapters.iter().all(|c| c.scenes.iter().all(|s| s.nodes.is_empty())) {
        errors.push(ValidationError::InvalidValue {
            context: "story has no nodes".to_string(),
        });
    }

    for attr in &story.attributes {
        if attr.max < 0 || !(0..=attr.max).contains(&attr.initial) {
            errors.push(ValidationError::InvalidValue {
                context: format!("attribute '{}' initial {} outside 0..={}", attr.id, attr.initial, attr.max),
            });
        }
    }
    for pool in &story.pools {
        if let Some(initial) = pool.initial
            && !(0..=pool.max).contains(&initial)
        {
            errors.push(ValidationError::InvalidValue {
                context: format!("pool '{}' initial {} outside 0..={}", pool.id, initial, pool.max),
            });
        }
    }

    for item in &story.items {
        if item.stack_limit == Some(0) {
            errors.push(ValidationError::InvalidValue {
                context: format!("item '{}' stack limit is zero", item.id),
            });
        }
        if let Some(effect) = &item.use_effect {
            validate_effect(effect, &ids, &mut errors, &format!("item '{}' use effect", item.id));
        }
    }

    for chapter in &story.chapters {
        for scene in &chapter.scenes {
            validate_scene(scene, &ids, &mut errors);
        }
    }

    for quest in &story.quests {
        let context = format!("quest '{}'", quest.id);
        validate_condition(&quest.unlock, &ids, &mut errors, &context);
        validate_effect(&quest.rewards, &ids, &mut errors, &context);
        for objective in &quest.objectives {
            if let ObjectiveDef::Collect { item, .. } = objective {
                check_ref("item", item, ids.items, context.clone(), &mut errors);
            }
        }
        if let Some(next) = &quest.next_quest {
            check_ref("quest", next, ids.quests, context.clone(), &mut errors);
        }
    }

    for route in &story.routes {
        let context = format!("route '{}'", route.id);
        validate_condition(&route.unlock, &ids, &mut errors, &context);
        for chapter in &route.detect_in {
            check_ref("chapter", chapter, ids.chapters, context.clone(), &mut errors);
        }
    }

    for event in &story.random_events {
        let context = format!("random event '{}'", event.id);
        if !(0.0..=1.0).contains(&event.chance) {
            errors.push(ValidationError::InvalidValue {
                context: format!("{context} chance {} outside 0.0..=1.0", event.chance),
            });
        }
        for scene in &event.scenes {
            check_ref("scene", scene, ids.scenes, context.clone(), &mut errors);
        }
        if let Some(cond) = &event.condition {
            validate_condition(cond, &ids, &mut errors, &context);
        }
        validate_effect(&event.effect, &ids, &mut errors, &context);
    }

    for threshold in &story.thresholds {
        let context = format!("threshold on '{}'", threshold.stat);
        check_ref("attribute", &threshold.stat, ids.stats, context.clone(), &mut errors);
        if threshold.rule.trim().is_empty() {
            errors.push(ValidationError::InvalidValue {
                context: format!("{context} has an empty rule"),
            });
        }
        if let Some(effect) = &threshold.effect {
            validate_effect(effect, &ids, &mut errors, &context);
        }
    }

    errors
}

struct IdSets<'a> {
    stats: &'a HashSet<String>,
    characters: &'a HashSet<String>,
    items: &'a HashSet<String>,
    chapters: &'a HashSet<String>,
    scenes: &'a HashSet<String>,
    quests: &'a HashSet<String>,
}

fn track_ids<'a>(
    kind: &'static str,
    ids: impl Iterator<Item = &'a str>,
    set: &mut HashSet<String>,
    errors: &mut Vec<ValidationError>,
) {
    for id in ids {
        if !set.insert(id.to_string()) {
            errors.push(ValidationError::DuplicateId {
                kind,
                id: id.to_string(),
            });
        }
    }
}

fn check_ref(kind: &'static str, id: &str, set: &HashSet<String>, context: String, errors: &mut Vec<ValidationError>) {
    if !set.contains(id) {
        errors.push(ValidationError::MissingReference {
            kind,
            id: id.to_string(),
            context,
        });
    }
}

fn validate_scene(scene: &SceneDef, ids: &IdSets<'_>, errors: &mut Vec<ValidationError>) {
    let mut nodes = HashSet::new();
    track_ids("node", scene.nodes.iter().map(|n| n.id.as_str()), &mut nodes, errors);

    for node in &scene.nodes {
        let context = format!("scene '{}' node '{}'", scene.id, node.id);
        if let Some(next) = &node.next {
            check_ref("node", next, &nodes, context.clone(), errors);
        }
        match &node.kind {
            NodeKind::Dialogue { speaker, .. } => {
                if let Some(speaker) = speaker {
                    check_ref("character", speaker, ids.characters, context, errors);
                }
            },
            NodeKind::Narration { .. } | NodeKind::Passthrough { .. } => {},
            NodeKind::Choice { options, .. } => {
                if options.is_empty() {
                    errors.push(ValidationError::InvalidValue {
                        context: format!("{context} has no options"),
                    });
                }
                for (idx, option) in options.iter().enumerate() {
                    let context = format!("{context} option {}", idx + 1);
                    if let Some(target) = &option.target {
                        check_ref("node", target, &nodes, context.clone(), errors);
                    }
                    if let Some(cond) = &option.condition {
                        validate_condition(cond, ids, errors, &context);
                    }
                    if let Some(effect) = &option.effect {
                        validate_effect(effect, ids, errors, &context);
                    }
                }
            },
            NodeKind::Check {
                attribute,
                success,
                failure,
                ..
            } => {
                check_ref("attribute", attribute, ids.stats, context.clone(), errors);
                for target in [success, failure].into_iter().flatten() {
                    check_ref("node", target, &nodes, context.clone(), errors);
                }
            },
            NodeKind::ItemGrant { items } => {
                for grant in items {
                    check_ref("item", &grant.item, ids.items, context.clone(), errors);
                }
            },
            NodeKind::EventTrigger { effect, .. } => {
                if let Some(effect) = effect {
                    validate_effect(effect, ids, errors, &context);
                }
            },
        }
    }
}

fn validate_condition(cond: &ConditionDef, ids: &IdSets<'_>, errors: &mut Vec<ValidationError>, context: &str) {
    for clause in cond.malformed_clauses() {
        errors.push(ValidationError::MalformedClause {
            clause,
            context: context.to_string(),
        });
    }
    if let Some(attrs) = cond.attributes.valid() {
        for id in attrs.keys() {
            check_ref("attribute", id, ids.stats, context.to_string(), errors);
        }
    }
    if let Some(items) = cond.items.valid() {
        for id in items {
            check_ref("item", id, ids.items, context.to_string(), errors);
        }
    }
    if let Some(rels) = cond.relationships.valid() {
        for id in rels.keys() {
            check_ref("character", id, ids.characters, context.to_string(), errors);
        }
    }
}

fn validate_effect(effect: &EffectDef, ids: &IdSets<'_>, errors: &mut Vec<ValidationError>, context: &str) {
    for clause in effect.malformed_clauses() {
        errors.push(ValidationError::MalformedClause {
            clause,
            context: context.to_string(),
        });
    }
    if let Some(attrs) = effect.attributes.valid() {
        for id in attrs.keys() {
            check_ref("attribute", id, ids.stats, context.to_string(), errors);
        }
    }
    if let Some(rels) = effect.relationships.valid() {
        for id in rels.keys() {
            check_ref("character", id, ids.characters, context.to_string(), errors);
        }
    }
    if let Some(grants) = effect.items.valid() {
        for grant in grants {
            check_ref("item", &grant.item, ids.items, context.to_string(), errors);
        }
    }
}
