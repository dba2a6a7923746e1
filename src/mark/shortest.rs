// Marking that records why each entity is used

use super::class_marker::ClassUsageMarker;
use super::marker::ShortestUsageMarker;
use super::usage_mark::Reason;
use super::MarkingMode;
use crate::classfile::{ClassPool, Entity};
use std::ops::{Deref, DerefMut};

/// A [`ClassUsageMarker`] that installs a reason for every propagation step,
/// so each mark links back to the root that caused it along the shortest
/// chain found
pub struct ShortestClassUsageMarker<'p> {
    inner: ClassUsageMarker<'p, ShortestUsageMarker>,
}

impl<'p> ShortestClassUsageMarker<'p> {
    pub fn new(pool: &'p ClassPool) -> Self {
        Self::with_mode(pool, MarkingMode::default())
    }

    pub fn with_mode(pool: &'p ClassPool, mode: MarkingMode) -> Self {
        let mut inner = ClassUsageMarker::with_mode(pool, ShortestUsageMarker::new(), mode);
        inner.explain = true;
        Self { inner }
    }

    pub fn into_inner(self) -> ClassUsageMarker<'p, ShortestUsageMarker> {
        self.inner
    }

    /// Reasons from `entity` back to its root, each with the entity that
    /// caused it
    pub fn explain(&self, entity: Entity) -> Vec<(Reason, Option<Entity>)> {
        self.inner.usage_marker().explain(entity)
    }

    /// Depth of the chain that justifies `entity`
    pub fn depth(&self, entity: Entity) -> Option<u32> {
        self.inner.usage_marker().usage_mark(entity).map(|mark| mark.depth())
    }
}

impl<'p> Deref for ShortestClassUsageMarker<'p> {
    type Target = ClassUsageMarker<'p, ShortestUsageMarker>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl<'p> DerefMut for ShortestClassUsageMarker<'p> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}
