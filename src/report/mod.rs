mod explain;
mod json;
mod terminal;
mod usage;

pub use explain::{explain_target, resolve_target, Explanation, ExplanationStep};
pub use json::JsonReporter;
pub use terminal::TerminalReporter;
pub use usage::{UnusedClass, UsageReport};

use crate::classfile::{ClassPool, Entity, MemberId};
use crate::keep::KeepStats;
use crate::mark::{MarkingMode, UsageMarker};
use miette::{miette, Result};
use serde::Serialize;
use std::path::PathBuf;
use std::str::FromStr;

/// Output format for reports
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReportFormat {
    #[default]
    Terminal,
    Json,
}

impl FromStr for ReportFormat {
    type Err = miette::Report;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "terminal" => Ok(ReportFormat::Terminal),
            "json" => Ok(ReportFormat::Json),
            other => Err(miette!("Unknown report format: {} (expected terminal or json)", other)),
        }
    }
}

/// Counts over the program classes of a finished marking
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MarkingSummary {
    pub program_classes: usize,
    pub used_classes: usize,
    pub program_members: usize,
    pub used_members: usize,
    /// Every used entity, constants and attributes included
    pub used_entities: usize,
    pub completion_passes: usize,
    pub roots: KeepStats,
}

impl MarkingSummary {
    pub fn collect<M: UsageMarker>(pool: &ClassPool, marker: &M, roots: KeepStats, completion_passes: usize) -> Self {
        let mut summary = Self {
            used_entities: marker.used_count(),
            completion_passes,
            roots,
            ..Self::default()
        };

        for (id, class) in pool.program_classes() {
            summary.program_classes += 1;
            if marker.is_used(Entity::Class(id)) {
                summary.used_classes += 1;
            }

            let members = class.fields.len() + class.methods.len();
            summary.program_members += members;
            summary.used_members += (0..class.fields.len() as u16)
                .filter(|&i| marker.is_used(Entity::Field(MemberId::new(id, i))))
                .count();
            summary.used_members += (0..class.methods.len() as u16)
                .filter(|&i| marker.is_used(Entity::Method(MemberId::new(id, i))))
                .count();
        }

        summary
    }
}

/// Everything a run reports
#[derive(Debug, Clone, Serialize)]
pub struct MarkingReport {
    pub mode: MarkingMode,
    pub summary: MarkingSummary,
    pub usage: UsageReport,
    pub explanations: Vec<Explanation>,
}

/// Reporter for marking results
pub struct Reporter {
    format: ReportFormat,
    output_path: Option<PathBuf>,
    show_members: bool,
}

impl Reporter {
    pub fn new(format: ReportFormat, output_path: Option<PathBuf>) -> Self {
        Self {
            format,
            output_path,
            show_members: true,
        }
    }

    pub fn with_members(mut self, show: bool) -> Self {
        self.show_members = show;
        self
    }

    pub fn report(&self, report: &MarkingReport) -> Result<()> {
        match self.format {
            ReportFormat::Terminal => TerminalReporter::new().with_members(self.show_members).report(report),
            ReportFormat::Json => JsonReporter::new(self.output_path.clone()).report(report),
        }
    }
}
