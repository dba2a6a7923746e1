//! Keep rules
//!
//! Turns the keep rules of a [`Config`] into marking roots. A `keep` rule
//! marks each matching program class and the listed members unconditionally;
//! a `class_members` rule only marks the listed members, which stay possibly
//! used until something else uses their class.

mod pattern;

pub use pattern::{ClassPattern, MemberPattern};

use crate::classfile::descriptor::external_class_name;
use crate::classfile::{ClassId, ClassPool, MemberId, ProgramClass};
use crate::config::{Config, KeepKind, KeepRule};
use crate::mark::{ClassUsageMarker, MarkError, Reason, UsageMarker};
use miette::Result;
use serde::Serialize;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
struct CompiledRule {
    source: String,
    kind: KeepKind,
    class: ClassPattern,
    extends: Option<ClassPattern>,
    members: Vec<MemberPattern>,
}

impl CompiledRule {
    fn new(rule: &KeepRule) -> Result<Self> {
        Ok(Self {
            source: rule.to_string(),
            kind: rule.kind,
            class: ClassPattern::new(&rule.class)?,
            extends: rule.extends.as_deref().map(ClassPattern::new).transpose()?,
            members: rule.members.iter().map(MemberPattern::new).collect::<Result<_>>()?,
        })
    }

    fn reason(&self) -> Reason {
        match self.kind {
            KeepKind::Keep => Reason::KeptByDirective(self.source.clone()),
            KeepKind::ClassMembers => Reason::KeptConditionally(self.source.clone()),
        }
    }

    fn matches_class(&self, pool: &ClassPool, id: ClassId, class: &ProgramClass) -> bool {
        if !self.class.matches(&external_class_name(class.name())) {
            return false;
        }
        let Some(extends) = &self.extends else {
            return true;
        };
        pool.hierarchy()
            .super_types(id)
            .into_iter()
            .filter_map(|super_type| pool.class(super_type))
            .any(|super_type| extends.matches(&external_class_name(super_type.name())))
    }

    fn matching_fields<'c>(&'c self, class: &'c ProgramClass) -> impl Iterator<Item = u16> + 'c {
        class.fields.iter().enumerate().filter_map(move |(index, field)| {
            let name = class.member_name(field);
            let descriptor = class.member_descriptor(field);
            self.members
                .iter()
                .any(|pattern| pattern.matches_field(name, descriptor))
                .then_some(index as u16)
        })
    }

    fn matching_methods<'c>(&'c self, class: &'c ProgramClass) -> impl Iterator<Item = u16> + 'c {
        class.methods.iter().enumerate().filter_map(move |(index, method)| {
            let name = class.member_name(method);
            let descriptor = class.member_descriptor(method);
            self.members
                .iter()
                .any(|pattern| pattern.matches_method(name, descriptor))
                .then_some(index as u16)
        })
    }
}

/// Roots seeded by [`KeepMarker::mark_roots`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct KeepStats {
    pub classes: usize,
    pub members: usize,
    /// Rules that matched no program class
    pub unmatched_rules: usize,
}

#[derive(Debug, Clone, Default)]
pub struct KeepMarker {
    rules: Vec<CompiledRule>,
}

impl KeepMarker {
    pub fn new(config: &Config) -> Result<Self> {
        Self::from_rules(&config.keep)
    }

    pub fn from_rules(rules: &[KeepRule]) -> Result<Self> {
        let rules = rules.iter().map(CompiledRule::new).collect::<Result<Vec<_>>>()?;
        debug!("Compiled {} keep rules", rules.len());
        Ok(Self { rules })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Mark everything the rules name, each rule starting its own chain
    pub fn mark_roots<M: UsageMarker>(&self, marker: &mut ClassUsageMarker<'_, M>) -> Result<KeepStats, MarkError> {
        let pool = marker.pool();
        let mut stats = KeepStats::default();

        for rule in &self.rules {
            let mut matched = false;

            for (id, class) in pool.program_classes() {
                if !rule.matches_class(pool, id, class) {
                    continue;
                }
                matched = true;

                let members = marker.mark_root(rule.reason(), |m| -> Result<usize, MarkError> {
                    if rule.kind == KeepKind::Keep {
                        m.visit_class(id)?;
                    }
                    let mut members = 0;
                    for index in rule.matching_fields(class) {
                        m.visit_field(MemberId::new(id, index))?;
                        members += 1;
                    }
                    for index in rule.matching_methods(class) {
                        m.visit_method(MemberId::new(id, index))?;
                        members += 1;
                    }
                    Ok(members)
                })?;

                debug!("{} matches {} ({} members)", rule.source, class.name(), members);
                if rule.kind == KeepKind::Keep {
                    stats.classes += 1;
                }
                stats.members += members;
            }

            if !matched {
                warn!("Keep rule matches no program class: {}", rule.source);
                stats.unmatched_rules += 1;
            }
        }

        info!(
            "Seeded {} classes and {} members from {} keep rules",
            stats.classes,
            stats.members,
            self.rules.len()
        );
        Ok(stats)
    }
}
