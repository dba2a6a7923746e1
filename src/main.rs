use clap::Parser;
use classmark::classfile::loader::load_pool;
use classmark::config::{KeepRule, MemberKind, MemberSpec};
use classmark::keep::{KeepMarker, KeepStats};
use classmark::mark::{ClassUsageMarker, MarkingMode, ShortestClassUsageMarker, SimpleUsageMarker, UsageMarker};
use classmark::report::{
    explain_target, Explanation, MarkingReport, MarkingSummary, ReportFormat, Reporter, UsageReport,
};
use classmark::{ClassPool, Config};
use colored::Colorize;
use miette::{IntoDiagnostic, Result};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

/// classmark - Mark the classes and members a Java program still needs
#[derive(Parser, Debug)]
#[command(name = "classmark")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Class pool to mark: a JSON file or a directory of JSON files
    input: PathBuf,

    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Keep a class pattern, or `Class#member` (can be specified multiple times)
    #[arg(short, long, value_name = "PATTERN")]
    keep: Vec<String>,

    /// Explain why a class or `Class#member` is kept (can be specified multiple times)
    #[arg(long, value_name = "TARGET")]
    why: Vec<String>,

    /// Write unused classes and members to FILE in ProGuard usage.txt format
    #[arg(long, value_name = "FILE")]
    print_usage: Option<PathBuf>,

    /// What the marks are for
    #[arg(short, long, value_enum)]
    mode: Option<ModeArg>,

    /// Output format (overrides the configuration)
    #[arg(short, long, value_enum)]
    format: Option<OutputFormat>,

    /// Output file (for json format)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Quiet mode - only output results
    #[arg(short, long)]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum OutputFormat {
    Terminal,
    Json,
}

impl From<OutputFormat> for ReportFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Terminal => ReportFormat::Terminal,
            OutputFormat::Json => ReportFormat::Json,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ModeArg {
    Shrinking,
    Obfuscation,
}

impl From<ModeArg> for MarkingMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Shrinking => MarkingMode::Shrinking,
            ModeArg::Obfuscation => MarkingMode::Obfuscation,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.quiet);

    info!("classmark v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(&cli)?;
    run(&config, &cli)
}

fn init_logging(verbose: bool, quiet: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = if let Some(config_path) = &cli.config {
        Config::from_file(config_path)?
    } else {
        Config::from_default_locations(config_root(&cli.input))?
    };

    // Override with CLI arguments
    config.keep.extend(cli.keep.iter().map(|pattern| keep_rule(pattern)));
    config.why_are_you_keeping.extend(cli.why.iter().cloned());
    if let Some(path) = &cli.print_usage {
        config.print_usage = Some(path.clone());
    }
    if let Some(mode) = cli.mode {
        config.mode = mode.into();
    }

    Ok(config)
}

/// Default configuration files live next to the pool
fn config_root(input: &Path) -> &Path {
    if input.is_dir() {
        input
    } else {
        input.parent().unwrap_or(Path::new("."))
    }
}

fn keep_rule(pattern: &str) -> KeepRule {
    match pattern.split_once('#') {
        Some((class, member)) => KeepRule {
            members: vec![MemberSpec {
                kind: MemberKind::Any,
                name: member.to_string(),
                descriptor: None,
            }],
            ..KeepRule::class(class)
        },
        None => KeepRule::class(pattern),
    }
}

fn run(config: &Config, cli: &Cli) -> Result<()> {
    let start_time = Instant::now();

    let format = match cli.format {
        Some(format) => format.into(),
        None => config.report.format.parse::<ReportFormat>()?,
    };

    let pool = load_pool(&cli.input)?;
    let keep = KeepMarker::new(config)?;
    if keep.is_empty() {
        warn!("No keep rules configured; every program class will be reported as unused");
    }

    info!("Marking {} classes in {} mode...", pool.len(), config.mode);

    let report = if config.why_are_you_keeping.is_empty() {
        let mut marker = ClassUsageMarker::with_mode(&pool, SimpleUsageMarker::new(), config.mode);
        let (roots, passes) = mark(&keep, &mut marker)?;
        build_report(config, &pool, marker.usage_marker(), roots, passes, Vec::new())
    } else {
        let mut marker = ShortestClassUsageMarker::with_mode(&pool, config.mode);
        let (roots, passes) = mark(&keep, &mut *marker)?;

        let mut explanations = Vec::new();
        for target in &config.why_are_you_keeping {
            explanations.extend(explain_target(&pool, marker.usage_marker(), target)?);
        }
        build_report(config, &pool, marker.usage_marker(), roots, passes, explanations)
    };

    if let Some(path) = &config.print_usage {
        report.usage.write(path)?;
        if !cli.quiet && format == ReportFormat::Terminal {
            println!("{}", format!("Usage written to: {}", path.display()).cyan());
        }
    }

    let reporter = Reporter::new(format, cli.output.clone()).with_members(config.report.show_members);
    reporter.report(&report)?;

    info!("Marking completed in {:.2?}", start_time.elapsed());
    Ok(())
}

fn mark<M: UsageMarker>(keep: &KeepMarker, marker: &mut ClassUsageMarker<'_, M>) -> Result<(KeepStats, usize)> {
    let roots = keep.mark_roots(marker).into_diagnostic()?;
    let passes = marker.finish().into_diagnostic()?;
    Ok((roots, passes))
}

fn build_report<M: UsageMarker>(
    config: &Config,
    pool: &ClassPool,
    marker: &M,
    roots: KeepStats,
    passes: usize,
    explanations: Vec<Explanation>,
) -> MarkingReport {
    MarkingReport {
        mode: config.mode,
        summary: MarkingSummary::collect(pool, marker, roots, passes),
        usage: UsageReport::collect(pool, marker),
        explanations,
    }
}
