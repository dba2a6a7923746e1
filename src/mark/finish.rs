// Completion passes run after the roots are marked
//
// Some marks depend on other classes being used: InnerClasses, NestMembers
// and PermittedSubclasses rows, and Kotlin declarations anchored on members.
// Those are re-evaluated over all used classes until nothing changes.

use super::class_marker::ClassUsageMarker;
use super::usage_mark::Reason;
use super::{MarkError, UsageMarker};
use crate::classfile::{AttributeId, AttributeKind, AttributeOwner, ClassId, Entity, ProgramClass};
use tracing::{debug, info};

impl<'p, M: UsageMarker> ClassUsageMarker<'p, M> {
    /// Run completion passes to a fixpoint; returns the number of passes
    pub fn finish(&mut self) -> Result<usize, MarkError> {
        let pool = self.pool;
        let mut passes = 0;

        loop {
            passes += 1;
            let before = self.marker.used_count();

            for (id, class) in pool.program_classes() {
                if !self.marker.is_used(Entity::Class(id)) {
                    continue;
                }
                self.reasoned(Reason::DeclaredBy, Entity::Class(id), |m| {
                    m.mark_kotlin_metadata(id, class)?;
                    m.mark_class_table_rows(id, class)
                })?;
            }

            let after = self.marker.used_count();
            debug!("Completion pass {}: {} -> {} used entities", passes, before, after);
            if after == before {
                break;
            }
        }

        info!("Marking finished after {} completion passes, {} used entities", passes, self.marker.used_count());
        Ok(passes)
    }

    fn mark_class_table_rows(&mut self, id: ClassId, class: &'p ProgramClass) -> Result<(), MarkError> {
        for (index, attribute) in class.attributes.iter().enumerate() {
            let attribute_id = AttributeId::new(id, AttributeOwner::Class, index as u16);
            match &attribute.kind {
                AttributeKind::InnerClasses(rows) => {
                    for (row, info) in rows.iter().enumerate() {
                        self.visit_inner_classes_info(id, class, attribute_id, attribute, row as u16, info)?;
                    }
                }
                AttributeKind::NestMembers(rows) | AttributeKind::PermittedSubclasses(rows) => {
                    for (row, &class_index) in rows.iter().enumerate() {
                        self.visit_class_table_row(id, class, attribute_id, attribute, row as u16, class_index)?;
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }
}
