// Mark storage policies
//
// The traversal only talks to marks through `UsageMarker`. The two
// `should_be_marked_*` predicates decide when a walk goes deeper, so a
// marker can change what counts as "already done" without touching the
// traversal.

use super::usage_mark::{Reason, ShortestUsageMark, UsageState};
use crate::classfile::Entity;
use std::collections::HashMap;
use std::rc::Rc;

pub trait UsageMarker {
    /// Saved reason context, restored by [`UsageMarker::leave`]
    type Scope;

    fn mark_as_used(&mut self, entity: Entity);

    /// Has no effect on entities that are already used
    fn mark_as_possibly_used(&mut self, entity: Entity);

    /// Clear a possibly-used mark; used marks stay. Returns whether a mark
    /// was cleared.
    fn mark_as_unused(&mut self, entity: Entity) -> bool;

    fn is_used(&self, entity: Entity) -> bool;

    fn is_possibly_used(&self, entity: Entity) -> bool;

    fn should_be_marked_as_used(&self, entity: Entity) -> bool {
        !self.is_used(entity)
    }

    fn should_be_marked_as_possibly_used(&self, entity: Entity) -> bool {
        !self.is_used(entity) && !self.is_possibly_used(entity)
    }

    /// Make `reason`, caused by `producer`, the context for the next marks
    fn enter(&mut self, reason: Reason, producer: Option<Entity>) -> Self::Scope;

    /// Start a fresh chain for a root
    fn enter_root(&mut self, reason: Reason) -> Self::Scope;

    fn leave(&mut self, scope: Self::Scope);

    /// Number of entities marked as used
    fn used_count(&self) -> usize;

    /// Marked entities with their state, sorted
    fn marked_entities(&self) -> Vec<(Entity, UsageState)>;
}

/// Records usage state only
#[derive(Debug, Default)]
pub struct SimpleUsageMarker {
    marks: HashMap<Entity, UsageState>,
    used: usize,
}

impl SimpleUsageMarker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, entity: Entity) -> Option<UsageState> {
        self.marks.get(&entity).copied()
    }
}

impl UsageMarker for SimpleUsageMarker {
    type Scope = ();

    fn mark_as_used(&mut self, entity: Entity) {
        if self.marks.insert(entity, UsageState::Used) != Some(UsageState::Used) {
            self.used += 1;
        }
    }

    fn mark_as_possibly_used(&mut self, entity: Entity) {
        self.marks.entry(entity).or_insert(UsageState::PossiblyUsed);
    }

    fn mark_as_unused(&mut self, entity: Entity) -> bool {
        if self.marks.get(&entity) == Some(&UsageState::PossiblyUsed) {
            self.marks.remove(&entity);
            return true;
        }
        false
    }

    fn is_used(&self, entity: Entity) -> bool {
        self.marks.get(&entity) == Some(&UsageState::Used)
    }

    fn is_possibly_used(&self, entity: Entity) -> bool {
        self.marks.get(&entity) == Some(&UsageState::PossiblyUsed)
    }

    fn enter(&mut self, _reason: Reason, _producer: Option<Entity>) -> Self::Scope {}

    fn enter_root(&mut self, _reason: Reason) -> Self::Scope {}

    fn leave(&mut self, _scope: Self::Scope) {}

    fn used_count(&self) -> usize {
        self.used
    }

    fn marked_entities(&self) -> Vec<(Entity, UsageState)> {
        let mut entities: Vec<_> = self.marks.iter().map(|(e, s)| (*e, *s)).collect();
        entities.sort_by_key(|(e, _)| *e);
        entities
    }
}

#[derive(Debug, Clone)]
struct Mark {
    state: UsageState,
    mark: Rc<ShortestUsageMark>,
}

/// Records, for every mark, the shortest known chain of reasons behind it
#[derive(Debug)]
pub struct ShortestUsageMarker {
    marks: HashMap<Entity, Mark>,
    current: Rc<ShortestUsageMark>,
    used: usize,
}

impl Default for ShortestUsageMarker {
    fn default() -> Self {
        Self::new()
    }
}

impl ShortestUsageMarker {
    pub fn new() -> Self {
        Self::with_root_reason(Reason::KeptByDirective("unspecified".to_string()))
    }

    pub fn with_root_reason(reason: Reason) -> Self {
        Self {
            marks: HashMap::new(),
            current: Rc::new(ShortestUsageMark::root(reason)),
            used: 0,
        }
    }

    /// The context attributed to whatever gets marked next
    pub fn current_usage_mark(&self) -> &Rc<ShortestUsageMark> {
        &self.current
    }

    pub fn usage_mark(&self, entity: Entity) -> Option<&Rc<ShortestUsageMark>> {
        self.marks.get(&entity).map(|m| &m.mark)
    }

    pub fn state(&self, entity: Entity) -> Option<UsageState> {
        self.marks.get(&entity).map(|m| m.state)
    }

    /// Reasons and producers from `entity` back to its root
    pub fn explain(&self, entity: Entity) -> Vec<(Reason, Option<Entity>)> {
        self.usage_mark(entity)
            .map(|mark| {
                mark.chain()
                    .map(|link| (link.reason().clone(), link.producer()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl UsageMarker for ShortestUsageMarker {
    type Scope = Rc<ShortestUsageMark>;

    fn mark_as_used(&mut self, entity: Entity) {
        match self.marks.get_mut(&entity) {
            Some(existing) if existing.state == UsageState::Used => {
                if self.current.is_shorter_than(&existing.mark) {
                    existing.mark = self.current.clone();
                }
            }
            // Promotion keeps the reason the member was wanted for
            Some(existing) => {
                existing.state = UsageState::Used;
                if self.current.is_shorter_than(&existing.mark) {
                    existing.mark = self.current.clone();
                }
                self.used += 1;
            }
            None => {
                self.marks.insert(
                    entity,
                    Mark {
                        state: UsageState::Used,
                        mark: self.current.clone(),
                    },
                );
                self.used += 1;
            }
        }
    }

    fn mark_as_possibly_used(&mut self, entity: Entity) {
        match self.marks.get_mut(&entity) {
            Some(existing) => {
                if existing.state == UsageState::PossiblyUsed && self.current.is_shorter_than(&existing.mark) {
                    existing.mark = self.current.clone();
                }
            }
            None => {
                self.marks.insert(
                    entity,
                    Mark {
                        state: UsageState::PossiblyUsed,
                        mark: self.current.clone(),
                    },
                );
            }
        }
    }

    fn mark_as_unused(&mut self, entity: Entity) -> bool {
        if self.state(entity) == Some(UsageState::PossiblyUsed) {
            self.marks.remove(&entity);
            return true;
        }
        false
    }

    fn is_used(&self, entity: Entity) -> bool {
        self.state(entity) == Some(UsageState::Used)
    }

    fn is_possibly_used(&self, entity: Entity) -> bool {
        self.state(entity) == Some(UsageState::PossiblyUsed)
    }

    fn should_be_marked_as_used(&self, entity: Entity) -> bool {
        match self.marks.get(&entity) {
            Some(existing) if existing.state == UsageState::Used => self.current.is_shorter_than(&existing.mark),
            _ => true,
        }
    }

    fn should_be_marked_as_possibly_used(&self, entity: Entity) -> bool {
        match self.marks.get(&entity) {
            Some(existing) if existing.state == UsageState::Used => false,
            Some(existing) => self.current.is_shorter_than(&existing.mark),
            None => true,
        }
    }

    fn enter(&mut self, reason: Reason, producer: Option<Entity>) -> Self::Scope {
        let previous = producer
            .and_then(|p| self.marks.get(&p))
            .map(|m| m.mark.clone())
            .unwrap_or_else(|| self.current.clone());
        let next = Rc::new(ShortestUsageMark::derive(previous, reason, producer));
        std::mem::replace(&mut self.current, next)
    }

    fn enter_root(&mut self, reason: Reason) -> Self::Scope {
        std::mem::replace(&mut self.current, Rc::new(ShortestUsageMark::root(reason)))
    }

    fn leave(&mut self, scope: Self::Scope) {
        self.current = scope;
    }

    fn used_count(&self) -> usize {
        self.used
    }

    fn marked_entities(&self) -> Vec<(Entity, UsageState)> {
        let mut entities: Vec<_> = self.marks.iter().map(|(e, m)| (*e, m.state)).collect();
        entities.sort_by_key(|(e, _)| *e);
        entities
    }
}
