use super::{Explanation, MarkingReport, MarkingSummary, UnusedClass};
use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use std::path::PathBuf;

/// JSON reporter for programmatic output
pub struct JsonReporter {
    output_path: Option<PathBuf>,
}

impl JsonReporter {
    pub fn new(output_path: Option<PathBuf>) -> Self {
        Self { output_path }
    }

    pub fn report(&self, report: &MarkingReport) -> Result<()> {
        let json = serde_json::to_string_pretty(&JsonReport::from_report(report)).into_diagnostic()?;

        if let Some(path) = &self.output_path {
            std::fs::write(path, &json).into_diagnostic()?;
            println!("Report written to: {}", path.display());
        } else {
            println!("{}", json);
        }

        Ok(())
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    version: &'static str,
    mode: &'static str,
    summary: &'a MarkingSummary,
    unused_classes: usize,
    unused_members: usize,
    unused: &'a [UnusedClass],
    explanations: &'a [Explanation],
}

impl<'a> JsonReport<'a> {
    fn from_report(report: &'a MarkingReport) -> Self {
        Self {
            version: "1.0",
            mode: report.mode.as_str(),
            summary: &report.summary,
            unused_classes: report.usage.unused_class_count(),
            unused_members: report.usage.unused_member_count(),
            unused: &report.usage.classes,
            explanations: &report.explanations,
        }
    }
}
