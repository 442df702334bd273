//! Effect application.
//!
//! [`EffectApplier`] is the only writer of [`PlayerState`] values. A batch is
//! computed against a working copy in a fixed clause order (attribute deltas,
//! relationship deltas, item grants, flag sets, flag clears), committed in one
//! assignment, and only then are its change events published and flushed. An
//! observer therefore never sees a half-applied batch.

use fable_data::{EffectDef, ItemGrantDef};
use log::{debug, info};

use crate::config::InventoryLimits;
use crate::error::{Diagnostic, EngineError};
use crate::events::{EventBus, GameEvent, StatKind};
use crate::player::{ItemStack, Meter, PlayerState, RELATIONSHIP_MAX, RELATIONSHIP_MIN};
use crate::story::Catalog;

/// Events produced by one applied batch, diagnostics included, in order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Applied {
    pub events: Vec<GameEvent>,
}

impl Applied {
    /// True if the batch changed any value.
    pub fn changed(&self) -> bool {
        self.events.iter().any(|event| !event.is_diagnostic())
    }

    pub fn diagnostics(&self) -> impl Iterator<Item = &Diagnostic> {
        self.events.iter().filter_map(|event| match event {
            GameEvent::Diagnostic(diag) => Some(diag),
            _ => None,
        })
    }

    fn warn(&mut self, error: EngineError) {
        let diag = Diagnostic::warning(error);
        diag.log();
        self.events.push(GameEvent::Diagnostic(diag));
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EffectApplier<'a> {
    catalog: &'a Catalog,
    limits: InventoryLimits,
}

impl<'a> EffectApplier<'a> {
    pub fn new(catalog: &'a Catalog, limits: InventoryLimits) -> Self {
        Self { catalog, limits }
    }

    /// Apply a batch and publish its events, flushing the bus.
    pub fn apply(&self, effect: &EffectDef, state: &mut PlayerState, bus: &mut EventBus) -> Applied {
        let applied = self.apply_to(effect, state);
        publish(&applied, bus);
        applied
    }

    /// Apply a batch without publishing; the caller owns the returned events.
    pub fn apply_to(&self, effect: &EffectDef, state: &mut PlayerState) -> Applied {
        let mut work = state.clone();
        let mut applied = Applied::default();

        for clause in effect.malformed_clauses() {
            applied.warn(EngineError::ConditionMalformed {
                clause,
                context: format!("effect at {}", state.cursor()),
            });
        }

        if let Some(deltas) = effect.attributes.valid() {
            for (id, delta) in deltas {
                self.shift_stat(&mut work, id, *delta, &mut applied);
            }
        }
        if let Some(deltas) = effect.relationships.valid() {
            for (id, delta) in deltas {
                shift_relationship(&mut work, id, *delta, &mut applied);
            }
        }
        if let Some(grants) = effect.items.valid() {
            for grant in grants {
                self.grant_into(&mut work, grant, &mut applied);
            }
        }
        if let Some(flags) = effect.set_flags.valid() {
            for flag in flags {
                if work.flags.insert(flag.clone()) {
                    info!("└─ effect: set flag '{flag}'");
                    applied.events.push(GameEvent::FlagChanged {
                        flag: flag.clone(),
                        set: true,
                    });
                }
            }
        }
        if let Some(flags) = effect.clear_flags.valid() {
            for flag in flags {
                if work.flags.remove(flag) {
                    info!("└─ effect: cleared flag '{flag}'");
                    applied.events.push(GameEvent::FlagChanged {
                        flag: flag.clone(),
                        set: false,
                    });
                }
            }
        }

        *state = work;
        applied
    }

    /// Grant a single item stack as its own batch.
    pub fn grant(&self, grant: &ItemGrantDef, state: &mut PlayerState, bus: &mut EventBus) -> Applied {
        let mut work = state.clone();
        let mut applied = Applied::default();
        self.grant_into(&mut work, grant, &mut applied);
        *state = work;
        publish(&applied, bus);
        applied
    }

    /// Remove `count` units of `item`, emptying later stacks first.
    ///
    /// # Errors
    /// Returns [`EngineError::NotInInventory`] if fewer than `count` units are held;
    /// the state is left untouched.
    pub fn consume(
        &self,
        item: &str,
        count: u32,
        state: &mut PlayerState,
        bus: &mut EventBus,
    ) -> Result<Applied, EngineError> {
        let held = state.item_count(item);
        if held < count {
            return Err(EngineError::NotInInventory {
                item: item.to_string(),
                requested: count,
                held,
            });
        }

        let mut work = state.clone();
        let mut remaining = count;
        for stack in work.inventory.iter_mut().rev().filter(|stack| stack.item == item) {
            let taken = remaining.min(stack.count);
            stack.count -= taken;
            remaining -= taken;
            if remaining == 0 {
                break;
            }
        }
        work.inventory.retain(|stack| stack.count > 0);

        let mut applied = Applied::default();
        push_inventory_change(&mut applied, item, held, work.item_count(item));
        *state = work;
        publish(&applied, bus);
        Ok(applied)
    }

    fn shift_stat(&self, work: &mut PlayerState, id: &str, delta: i32, applied: &mut Applied) {
        let (kind, meter) = match work.stat(id) {
            Some(found) => found,
            None => {
                if let Some(def) = self.catalog.attribute(id) {
                    (StatKind::Attribute, Meter::new(def.initial, def.max))
                } else if let Some(def) = self.catalog.pool(id) {
                    (StatKind::Pool, Meter::new(def.initial.unwrap_or(def.max), def.max))
                } else {
                    applied.warn(EngineError::DataMissing {
                        kind: "attribute",
                        id: id.to_string(),
                        context: format!("effect at {}", work.cursor()),
                    });
                    return;
                }
            },
        };

        // The declared ceiling wins; the recorded max covers stats the catalog lacks.
        let ceiling = self.catalog.stat_max(id).unwrap_or(meter.max);
        let updated = meter.shifted(delta, ceiling);
        let store = match kind {
            StatKind::Attribute => &mut work.attributes,
            StatKind::Pool => &mut work.pools,
        };
        store.insert(id.to_string(), updated);

        if updated.value != meter.value {
            info!("└─ effect: {id} {} → {}", meter.value, updated.value);
            applied.events.push(GameEvent::AttributeChanged {
                kind,
                id: id.to_string(),
                old: meter.value,
                new: updated.value,
                delta: updated.value - meter.value,
            });
        }
    }

    fn grant_into(&self, work: &mut PlayerState, grant: &ItemGrantDef, applied: &mut Applied) {
        let item = grant.item.as_str();
        let Some(def) = self.catalog.item(item) else {
            applied.warn(EngineError::DataMissing {
                kind: "item",
                id: item.to_string(),
                context: format!("item grant at {}", work.cursor()),
            });
            return;
        };
        if grant.count == 0 {
            return;
        }

        let old = work.item_count(item);
        let capacity = self.limits.capacity;
        if def.is_stackable() {
            let limit = def.stack_limit.unwrap_or(self.limits.default_stack_limit);
            if limit == 0 {
                applied.warn(EngineError::DataMissing {
                    kind: "stack room",
                    id: item.to_string(),
                    context: "stack limit is 0".to_string(),
                });
                return;
            }
            if let Some(stack) = work.inventory.iter_mut().find(|stack| stack.item == item) {
                let capped = stack.count.saturating_add(grant.count).min(limit).max(stack.count);
                if capped < stack.count.saturating_add(grant.count) {
                    debug!("stack of '{item}' capped at {limit}");
                }
                stack.count = capped;
            } else if work.inventory.len() >= capacity {
                applied.warn(EngineError::InventoryFull {
                    item: item.to_string(),
                    capacity,
                });
            } else {
                work.inventory.push(ItemStack::new(item, grant.count.min(limit)));
            }
        } else {
            for _ in 0..grant.count {
                if work.inventory.len() >= capacity {
                    applied.warn(EngineError::InventoryFull {
                        item: item.to_string(),
                        capacity,
                    });
                    break;
                }
                work.inventory.push(ItemStack::new(item, 1));
            }
        }

        push_inventory_change(applied, item, old, work.item_count(item));
    }
}

fn shift_relationship(work: &mut PlayerState, id: &str, delta: i32, applied: &mut Applied) {
    let old = work.relationship(id);
    let new = old.saturating_add(delta).clamp(RELATIONSHIP_MIN, RELATIONSHIP_MAX);
    work.relationships.insert(id.to_string(), new);
    if new != old {
        info!("└─ effect: affinity with {id} {old} → {new}");
        applied.events.push(GameEvent::RelationshipChanged {
            character: id.to_string(),
            old,
            new,
            delta: new - old,
        });
    }
}

fn push_inventory_change(applied: &mut Applied, item: &str, old: u32, new: u32) {
    if new != old {
        info!("└─ effect: {item} ×{old} → ×{new}");
        applied.events.push(GameEvent::InventoryChanged {
            item: item.to_string(),
            old,
            new,
            delta: i64::from(new) - i64::from(old),
        });
    }
}

fn publish(applied: &Applied, bus: &mut EventBus) {
    bus.publish_all(applied.events.iter().cloned());
    bus.flush();
}
