//! Condition evaluation.
//!
//! [`evaluate`] is a pure function of the condition, the player state and the
//! catalog. Clauses are checked independently in a fixed order (attributes,
//! items, relationships, required flags, forbidden flags) and the result lists
//! one [`Requirement`] line per entry for UI explanation text.
//!
//! Missing attribute or relationship entries read as 0. A clause whose value had
//! the wrong shape is skipped (it passes) and reported in
//! [`ConditionReport::problems`].

use std::fmt::Write;

use fable_data::ConditionDef;

use crate::error::EngineError;
use crate::player::PlayerState;
use crate::story::Catalog;

const ICON_MET: &str = "✓";
const ICON_UNMET: &str = "✗";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub text: String,
    pub passed: bool,
    /// Current value for numeric requirements.
    pub current: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionReport {
    pub passed: bool,
    pub requirements: Vec<Requirement>,
    /// Malformed clauses and unknown ids encountered while evaluating.
    pub problems: Vec<EngineError>,
}

impl ConditionReport {
    fn vacuous() -> Self {
        Self {
            passed: true,
            requirements: Vec::new(),
            problems: Vec::new(),
        }
    }

    pub fn unmet(&self) -> impl Iterator<Item = &Requirement> {
        self.requirements.iter().filter(|req| !req.passed)
    }

    /// Unmet requirement texts joined for a one-line explanation.
    pub fn unmet_text(&self) -> String {
        self.unmet().map(|req| req.text.as_str()).collect::<Vec<_>>().join("; ")
    }

    /// All requirements as `✓`/`✗` prefixed lines.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        for (idx, req) in self.requirements.iter().enumerate() {
            if idx > 0 {
                out.push('\n');
            }
            let icon = if req.passed { ICON_MET } else { ICON_UNMET };
            let _ = write!(out, "{icon} {}", req.text);
        }
        out
    }
}

/// Evaluate `condition` against `state`. An absent condition always passes.
pub fn evaluate(condition: Option<&ConditionDef>, state: &PlayerState, catalog: &Catalog) -> ConditionReport {
    let Some(condition) = condition else {
        return ConditionReport::vacuous();
    };
    let mut report = ConditionReport::vacuous();
    let context = format!("condition at {}", state.cursor());

    for clause in condition.malformed_clauses() {
        report.problems.push(EngineError::ConditionMalformed {
            clause,
            context: context.clone(),
        });
    }

    if let Some(attributes) = condition.attributes.valid() {
        for (id, threshold) in attributes.iter() {
            if state.stat(id).is_none() && catalog.stat_max(id).is_none() {
                report.problems.push(EngineError::DataMissing {
                    kind: "attribute",
                    id: id.clone(),
                    context: context.clone(),
                });
            }
            let current = state.stat_value(id);
            report.push(Requirement {
                text: format!("{} ≥ {threshold}", catalog.stat_name(id)),
                passed: current >= *threshold,
                current: Some(current),
            });
        }
    }

    if let Some(items) = condition.items.valid() {
        for id in items {
            if catalog.item(id).is_none() {
                report.problems.push(EngineError::DataMissing {
                    kind: "item",
                    id: id.clone(),
                    context: context.clone(),
                });
            }
            report.push(Requirement {
                text: format!("Requires item: {}", catalog.item_name(id)),
                passed: state.has_item(id),
                current: None,
            });
        }
    }

    if let Some(relationships) = condition.relationships.valid() {
        for (id, threshold) in relationships.iter() {
            let current = state.relationship(id);
            report.push(Requirement {
                text: format!("{} affinity ≥ {threshold}", catalog.character_name(id)),
                passed: current >= *threshold,
                current: Some(current),
            });
        }
    }

    if let Some(flags) = condition.flags.valid() {
        for flag in flags {
            report.push(Requirement {
                text: format!("Requires: {flag}"),
                passed: state.has_flag(flag),
                current: None,
            });
        }
    }

    if let Some(flags) = condition.forbidden_flags.valid() {
        for flag in flags {
            report.push(Requirement {
                text: format!("Forbidden: {flag}"),
                passed: !state.has_flag(flag),
                current: None,
            });
        }
    }

    report
}

impl ConditionReport {
    fn push(&mut self, requirement: Requirement) {
        self.passed &= requirement.passed;
        self.requirements.push(requirement);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::Cursor;
    use fable_data::{AttributeDef, CharacterDef, ItemDef, Lenient, Minimums};

    fn catalog() -> Catalog {
        Catalog::from_defs(
            &[AttributeDef {
                id: "strength".into(),
                name: "Strength".into(),
                initial: 40,
                max: 100,
            }],
            &[],
            &[CharacterDef {
                id: "lin".into(),
                name: "Lin".into(),
                description: String::new(),
                initial_relationship: 10,
            }],
            &[ItemDef {
                id: "key".into(),
                name: "Brass Key".into(),
                description: String::new(),
                category: fable_data::ItemCategory::Key,
                stackable: None,
                stack_limit: None,
                use_effect: None,
            }],
        )
    }

    fn state(catalog: &Catalog) -> PlayerState {
        PlayerState::new_game(catalog, Cursor::new("ch1", "s1", "n1"))
    }

    #[test]
    fn absent_condition_passes_without_requirements() {
        let catalog = catalog();
        let report = evaluate(None, &state(&catalog), &catalog);
        assert!(report.passed);
        assert!(report.requirements.is_empty());
    }

    #[test]
    fn missing_flag_is_reported_unmet() {
        let catalog = catalog();
        let cond = ConditionDef {
            flags: Lenient::Valid(vec!["met_mentor".into()]),
            ..ConditionDef::default()
        };
        let report = evaluate(Some(&cond), &state(&catalog), &catalog);
        assert!(!report.passed);
        assert_eq!(report.unmet_text(), "Requires: met_mentor");
        assert_eq!(report.summary(), "✗ Requires: met_mentor");
    }

    #[test]
    fn requirements_follow_clause_order() {
        let catalog = catalog();
        let cond = ConditionDef {
            forbidden_flags: Lenient::Valid(vec!["cursed".into()]),
            flags: Lenient::Valid(vec!["met_mentor".into()]),
            relationships: Lenient::Valid(Minimums::from([("lin".to_string(), 5)])),
            items: Lenient::Valid(vec!["key".into()]),
            attributes: Lenient::Valid(Minimums::from([("strength".to_string(), 30)])),
        };
        let report = evaluate(Some(&cond), &state(&catalog), &catalog);
        let texts: Vec<_> = report.requirements.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(
            texts,
            vec![
                "Strength ≥ 30",
                "Requires item: Brass Key",
                "Lin affinity ≥ 5",
                "Requires: met_mentor",
                "Forbidden: cursed",
            ]
        );
        assert_eq!(report.requirements[0].current, Some(40));
        assert_eq!(report.requirements[2].current, Some(10));
    }

    #[test]
    fn attribute_minimums_keep_written_order() {
        let catalog = catalog();
        let cond = ConditionDef {
            attributes: Lenient::Valid(Minimums::from([("strength".to_string(), 30), ("luck".to_string(), 1)])),
            ..ConditionDef::default()
        };
        let report = evaluate(Some(&cond), &state(&catalog), &catalog);
        let texts: Vec<_> = report.requirements.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["Strength ≥ 30", "luck ≥ 1"]);
    }

    #[test]
    fn unknown_attribute_reads_as_zero() {
        let catalog = catalog();
        let cond = ConditionDef {
            attributes: Lenient::Valid(Minimums::from([("luck".to_string(), 1)])),
            ..ConditionDef::default()
        };
        let report = evaluate(Some(&cond), &state(&catalog), &catalog);
        assert!(!report.passed);
        assert_eq!(report.requirements[0].current, Some(0));
        assert!(matches!(report.problems[0], EngineError::DataMissing { kind: "attribute", .. }));
    }

    #[test]
    fn malformed_clause_fails_open() {
        let catalog = catalog();
        let cond = ConditionDef {
            flags: Lenient::Malformed,
            ..ConditionDef::default()
        };
        let report = evaluate(Some(&cond), &state(&catalog), &catalog);
        assert!(report.passed);
        assert!(matches!(
            report.problems[0],
            EngineError::ConditionMalformed { clause: "flags", .. }
        ));
    }

    #[test]
    fn evaluation_is_pure() {
        let catalog = catalog();
        let player = state(&catalog);
        let cond = ConditionDef {
            attributes: Lenient::Valid(Minimums::from([("strength".to_string(), 50)])),
            forbidden_flags: Lenient::Valid(vec!["cursed".into()]),
            ..ConditionDef::default()
        };
        let before = player.clone();
        let first = evaluate(Some(&cond), &player, &catalog);
        let second = evaluate(Some(&cond), &player, &catalog);
        assert_eq!(first, second);
        assert_eq!(player, before);
    }
}
