//! classmark - usage marking for Java bytecode shrinking
//!
//! Given a linked pool of program and library classes and a set of keep
//! rules, marks every class, member, constant, attribute and Kotlin metadata
//! node the program still needs, so a later pruning pass can drop the rest.
//!
//! # Architecture
//!
//! The pipeline consists of:
//! 1. **Loading** - Read a JSON class pool and link its symbolic references
//! 2. **Roots** - Compile the keep rules and feed matching classes and members
//!    into the marker
//! 3. **Marking** - Walk everything reachable from the roots, optionally
//!    recording the shortest reason chain behind each mark
//! 4. **Completion** - Re-evaluate table rows and Kotlin metadata that depend
//!    on other classes being used, until nothing changes
//! 5. **Reporting** - Print unused code, explanations and a summary

pub mod classfile;
pub mod config;
pub mod keep;
pub mod mark;
pub mod report;

pub use classfile::{ClassId, ClassPool, Clazz, Entity, MemberId};
pub use config::Config;
pub use keep::{KeepMarker, KeepStats};
pub use mark::{
    ClassUsageMarker, MarkError, MarkingMode, ShortestClassUsageMarker, ShortestUsageMarker, SimpleUsageMarker,
    UsageMarker,
};
pub use report::{MarkingReport, MarkingSummary, ReportFormat, Reporter, UsageReport};
