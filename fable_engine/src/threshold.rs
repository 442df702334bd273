//! Stat thresholds.
//!
//! A threshold fires when a stat change moves the value from outside its
//! range to inside it. Staying inside the range does not fire again.

use std::str::FromStr;
use std::sync::LazyLock;

use fable_data::ThresholdDef;
use log::{info, warn};
use regex::Regex;

use crate::effect::EffectApplier;
use crate::events::{EventBus, GameEvent};
use crate::player::PlayerState;

static RULE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:(?P<op><=|>=|<|>)\s*(?P<n>-?\d+)|(?P<a>-?\d+)\s*(?:(?P<suffix>以下|以上)|-\s*(?P<b>-?\d+)))\s*$")
        .expect("threshold rule pattern compiles")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdRule {
    Below(i32),
    AtMost(i32),
    Above(i32),
    AtLeast(i32),
    /// Inclusive on both ends.
    Between(i32, i32),
}

impl ThresholdRule {
    pub fn contains(self, value: i32) -> bool {
        match self {
            ThresholdRule::Below(n) => value < n,
            ThresholdRule::AtMost(n) => value <= n,
            ThresholdRule::Above(n) => value > n,
            ThresholdRule::AtLeast(n) => value >= n,
            ThresholdRule::Between(lo, hi) => (lo..=hi).contains(&value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized threshold rule '{0}'")]
pub struct InvalidRule(pub String);

impl FromStr for ThresholdRule {
    type Err = InvalidRule;

    fn from_str(rule: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidRule(rule.to_string());
        let caps = RULE.captures(rule).ok_or_else(invalid)?;
        let num = |name: &str| caps.name(name).and_then(|m| m.as_str().parse::<i32>().ok());

        if let Some(op) = caps.name("op") {
            let n = num("n").ok_or_else(invalid)?;
            return Ok(match op.as_str() {
                "<" => ThresholdRule::Below(n),
                "<=" => ThresholdRule::AtMost(n),
                ">" => ThresholdRule::Above(n),
                _ => ThresholdRule::AtLeast(n),
            });
        }
        let a = num("a").ok_or_else(invalid)?;
        match (caps.name("suffix").map(|m| m.as_str()), num("b")) {
            (Some("以下"), _) => Ok(ThresholdRule::Below(a)),
            (Some(_), _) => Ok(ThresholdRule::AtLeast(a)),
            (None, Some(b)) if a <= b => Ok(ThresholdRule::Between(a, b)),
            _ => Err(invalid()),
        }
    }
}

#[derive(Debug, Default)]
pub struct ThresholdWatcher {
    watches: Vec<(ThresholdDef, ThresholdRule)>,
}

impl ThresholdWatcher {
    /// Parse every rule up front. Unparseable rules are logged and skipped.
    pub fn new(defs: &[ThresholdDef]) -> Self {
        let watches = defs
            .iter()
            .filter_map(|def| match def.rule.parse::<ThresholdRule>() {
                Ok(rule) => Some((def.clone(), rule)),
                Err(err) => {
                    warn!("threshold on '{}' ignored: {err}", def.stat);
                    None
                },
            })
            .collect();
        Self { watches }
    }

    pub fn len(&self) -> usize {
        self.watches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.watches.is_empty()
    }

    /// React to a stat change. Returns the number of thresholds that fired.
    pub fn observe(
        &self,
        event: &GameEvent,
        applier: &EffectApplier<'_>,
        state: &mut PlayerState,
        bus: &mut EventBus,
    ) -> usize {
        let GameEvent::AttributeChanged { id, old, new, .. } = event else {
            return 0;
        };
        let mut fired = 0;
        for (def, rule) in self.watches.iter().filter(|(def, _)| def.stat == *id) {
            if rule.contains(*old) || !rule.contains(*new) {
                continue;
            }
            info!("└─ threshold: '{id}' entered '{}' at {new}", def.rule);
            bus.publish(GameEvent::ThresholdReached {
                stat: id.clone(),
                rule: def.rule.clone(),
                value: *new,
                message: def.message.clone(),
            });
            if let Some(effect) = &def.effect {
                applier.apply(effect, state, bus);
            }
            fired += 1;
        }
        bus.flush();
        fired
    }
}
