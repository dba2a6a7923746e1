//! Usage marking
//!
//! Starting from the roots a keep configuration names, [`ClassUsageMarker`]
//! walks classes, members, constants, attributes and Kotlin metadata and marks
//! everything a program needs. Mark storage is delegated to a [`UsageMarker`]:
//! [`SimpleUsageMarker`] only records state, [`ShortestUsageMarker`] also
//! records the shortest chain of reasons that led to each mark.

mod attributes;
mod class_marker;
mod finish;
mod kotlin;
mod marker;
mod shortest;
mod usage_mark;

pub use class_marker::ClassUsageMarker;
pub use kotlin::KotlinUsageMarker;
pub use marker::{ShortestUsageMarker, SimpleUsageMarker, UsageMarker};
pub use shortest::ShortestClassUsageMarker;
pub use usage_mark::{Reason, ShortestUsageMark, UsageState};

use crate::classfile::{ClassId, Constant, MemberId, ProgramClass, ProgramMember};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What the marks will be used for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkingMode {
    /// Everything a shrunk program still needs, including debug attributes
    #[default]
    Shrinking,
    /// Debug-only attributes are left unmarked
    Obfuscation,
}

impl MarkingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarkingMode::Shrinking => "shrinking",
            MarkingMode::Obfuscation => "obfuscation",
        }
    }
}

impl std::fmt::Display for MarkingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MarkError {
    #[error("Unsupported Kotlin metadata kind {kind} in class {class}")]
    UnsupportedKotlinMetadata { class: String, kind: u32 },
}

/// Called for every constant when it is first marked as used
pub trait ConstantVisitor {
    fn visit_constant(&mut self, class: ClassId, program: &ProgramClass, index: u16, constant: &Constant);
}

impl<F> ConstantVisitor for F
where
    F: FnMut(ClassId, &ProgramClass, u16, &Constant),
{
    fn visit_constant(&mut self, class: ClassId, program: &ProgramClass, index: u16, constant: &Constant) {
        self(class, program, index, constant)
    }
}

/// Called for every program method when it is first marked as used
pub trait MethodVisitor {
    fn visit_program_method(&mut self, method: MemberId, program: &ProgramClass, member: &ProgramMember);
}

impl<F> MethodVisitor for F
where
    F: FnMut(MemberId, &ProgramClass, &ProgramMember),
{
    fn visit_program_method(&mut self, method: MemberId, program: &ProgramClass, member: &ProgramMember) {
        self(method, program, member)
    }
}
