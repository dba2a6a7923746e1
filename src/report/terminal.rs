use super::{Explanation, MarkingReport, MarkingSummary, UsageReport};
use colored::Colorize;
use miette::Result;

/// Terminal reporter with colored output
pub struct TerminalReporter {
    /// List unused members of used classes
    show_members: bool,
}

impl TerminalReporter {
    pub fn new() -> Self {
        Self { show_members: true }
    }

    pub fn with_members(mut self, show: bool) -> Self {
        self.show_members = show;
        self
    }

    pub fn report(&self, report: &MarkingReport) -> Result<()> {
        for explanation in &report.explanations {
            self.print_explanation(explanation);
        }

        if report.usage.is_empty() {
            println!("{}", "Everything in the program is used!".green().bold());
        } else {
            self.print_usage(&report.usage);
        }

        self.print_summary(&report.summary, &report.usage);
        Ok(())
    }

    fn print_explanation(&self, explanation: &Explanation) {
        println!("{}", explanation.entity.cyan().bold());
        if explanation.state.is_none() {
            println!("  {}", "is not being kept.".yellow());
        } else if !explanation.is_kept() {
            println!("  {}", "is possibly used only:".yellow());
        }
        for step in &explanation.steps {
            match &step.producer {
                Some(producer) => println!("  {} {}", step.reason.dimmed(), producer),
                None => println!("  {}", step.reason.dimmed()),
            }
        }
        println!();
    }

    fn print_usage(&self, usage: &UsageReport) {
        println!();
        println!(
            "{}",
            format!(
                "Found {} unused classes and {} unused members:",
                usage.unused_class_count(),
                usage.unused_member_count()
            )
            .yellow()
            .bold()
        );
        println!();

        for class in &usage.classes {
            if class.whole_class {
                println!("  {} {}", "✗".red(), class.name.white());
                continue;
            }
            if !self.show_members {
                continue;
            }
            println!("  {} {}", "◌".yellow(), class.name.cyan());
            for member in &class.members {
                println!("      {}", member.dimmed());
            }
        }
        println!();
    }

    fn print_summary(&self, summary: &MarkingSummary, usage: &UsageReport) {
        println!("{}", "─".repeat(60).dimmed());
        println!(
            "Classes: {} used of {}, members: {} used of {}",
            summary.used_classes.to_string().green(),
            summary.program_classes,
            summary.used_members.to_string().green(),
            summary.program_members
        );
        println!(
            "{}",
            format!(
                "Roots: {} classes and {} members, {} completion passes, {} used entities",
                summary.roots.classes, summary.roots.members, summary.completion_passes, summary.used_entities
            )
            .dimmed()
        );
        if summary.roots.unmatched_rules > 0 {
            println!(
                "{}",
                format!("⚠ {} keep rules matched no program class", summary.roots.unmatched_rules).yellow()
            );
        }
        println!();

        if !usage.is_empty() {
            println!("{}", "Tip: Use --print-usage FILE to write the unused code list".dimmed());
        }
        println!("{}", "Tip: Use --why CLASS to see why a class is kept".dimmed());
    }
}

impl Default for TerminalReporter {
    fn default() -> Self {
        Self::new()
    }
}
