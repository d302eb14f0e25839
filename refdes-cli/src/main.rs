//! Refdes CLI - schematic reference annotation from the command line.

use clap::{Parser, Subcommand, ValueEnum};
use refdes::{
    AnnotateAlgo, AnnotateOptions, AnnotateOrder, AnnotationErrorKind, AnnotationIssue,
    AnnotationSummary, CheckReport, RefdesCore, RefdesError,
};
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "refdes")]
#[command(about = "Schematic reference designator annotation tool", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Number unannotated symbols of a project
    Annotate {
        /// Path to the project file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Order in which symbols are numbered
        #[arg(long, value_enum)]
        order: Option<OrderArg>,

        /// Numbering scheme
        #[arg(long, value_enum)]
        numbering: Option<NumberingArg>,

        /// Numbers start above this value
        #[arg(long, value_name = "N")]
        start: Option<i32>,

        /// Renumber symbols that already have a reference
        #[arg(long)]
        reset: bool,

        /// Start each search from the symbol's current number
        #[arg(long)]
        start_at_current: bool,

        /// Only annotate this sheet path, e.g. /<uuid>
        #[arg(long, value_name = "PATH")]
        sheet: Option<String>,

        /// Annotate power symbols (#PWR) too
        #[arg(long)]
        include_power: bool,

        /// Write the annotated project here instead of overwriting FILE
        #[arg(short, long, value_name = "OUT")]
        output: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormat,
    },

    /// Renumber annotated symbols
    Reannotate {
        /// Path to the project file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Only renumber the second and later holders of a duplicated reference
        #[arg(long)]
        duplicates_only: bool,

        /// Write the annotated project here instead of overwriting FILE
        #[arg(short, long, value_name = "OUT")]
        output: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormat,
    },

    /// Check existing annotation
    Check {
        /// Path to the project file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormat,

        /// Exit with error code if issues of this kind are found
        #[arg(long, value_enum)]
        fail_on: Option<FailOn>,

        /// Check power symbols (#PWR) too
        #[arg(long)]
        include_power: bool,
    },

    /// Print references grouped by value, e.g. `10k: R1-R3, R5`
    Shorthand {
        /// Path to the project file
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output for CI/CD
    Json,
    /// GitHub Actions format
    Github,
    /// GitLab CI format
    Gitlab,
}

#[derive(Clone, ValueEnum)]
enum OrderArg {
    /// Left to right, then top to bottom
    X,
    /// Top to bottom, then left to right
    Y,
    /// Keep the hierarchy order
    Unsorted,
}

#[derive(Clone, ValueEnum)]
enum NumberingArg {
    /// First free number across the whole project
    Incremental,
    /// Sheet number x 100
    Sheet100,
    /// Sheet number x 1000
    Sheet1000,
}

#[derive(Clone, ValueEnum)]
enum FailOn {
    /// Any annotation issue
    Any,
    /// Duplicate references only
    Duplicates,
    /// Unannotated symbols only
    Unannotated,
}

impl From<OrderArg> for AnnotateOrder {
    fn from(order: OrderArg) -> Self {
        match order {
            OrderArg::X => AnnotateOrder::X,
            OrderArg::Y => AnnotateOrder::Y,
            OrderArg::Unsorted => AnnotateOrder::Unsorted,
        }
    }
}

impl From<NumberingArg> for AnnotateAlgo {
    fn from(numbering: NumberingArg) -> Self {
        match numbering {
            NumberingArg::Incremental => AnnotateAlgo::Incremental,
            NumberingArg::Sheet100 => AnnotateAlgo::SheetX100,
            NumberingArg::Sheet1000 => AnnotateAlgo::SheetX1000,
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let exit_code = match cli.command {
        Commands::Annotate {
            file,
            order,
            numbering,
            start,
            reset,
            start_at_current,
            sheet,
            include_power,
            output,
            format,
        } => {
            let overrides = AnnotateArgs {
                order,
                numbering,
                start,
                reset,
                start_at_current,
                sheet,
                include_power,
            };
            handle_annotate(&file, overrides, output.as_deref(), format)
        }
        Commands::Reannotate {
            file,
            duplicates_only,
            output,
            format,
        } => handle_reannotate(&file, duplicates_only, output.as_deref(), format),
        Commands::Check {
            file,
            format,
            fail_on,
            include_power,
        } => handle_check(&file, format, fail_on, include_power),
        Commands::Shorthand { file } => handle_shorthand(&file),
    };

    process::exit(exit_code);
}

/// Flags of `annotate`; unset ones fall back to the project's settings.
struct AnnotateArgs {
    order: Option<OrderArg>,
    numbering: Option<NumberingArg>,
    start: Option<i32>,
    reset: bool,
    start_at_current: bool,
    sheet: Option<String>,
    include_power: bool,
}

impl AnnotateArgs {
    fn apply(self, mut options: AnnotateOptions) -> AnnotateOptions {
        if let Some(order) = self.order {
            options.order = order.into();
        }
        if let Some(numbering) = self.numbering {
            options.algorithm = numbering.into();
        }
        if let Some(start) = self.start {
            options.start_number = start;
        }
        if self.sheet.is_some() {
            options.sheet = self.sheet;
        }
        options.reset |= self.reset;
        options.start_at_current |= self.start_at_current;
        options.include_power_symbols |= self.include_power;
        options
    }
}

fn handle_annotate(file: &Path, args: AnnotateArgs, output: Option<&Path>, format: OutputFormat) -> i32 {
    let result = RefdesCore::load_project(file).and_then(|mut project| {
        let options = args.apply(project.settings.clone());
        let summary = RefdesCore::annotate_project(&mut project, &options)?;
        RefdesCore::save_project(&project, output.unwrap_or(file))?;
        Ok(summary)
    });

    finish_annotation(result, &format)
}

fn handle_reannotate(
    file: &Path,
    duplicates_only: bool,
    output: Option<&Path>,
    format: OutputFormat,
) -> i32 {
    let result = RefdesCore::load_project(file).and_then(|mut project| {
        let include_power = project.settings.include_power_symbols;
        let summary = if duplicates_only {
            RefdesCore::reannotate_duplicates(&mut project, include_power)?
        } else {
            let options = AnnotateOptions {
                reset: true,
                ..project.settings.clone()
            };
            RefdesCore::annotate_project(&mut project, &options)?
        };
        RefdesCore::save_project(&project, output.unwrap_or(file))?;
        Ok(summary)
    });

    finish_annotation(result, &format)
}

fn finish_annotation(result: Result<AnnotationSummary, RefdesError>, format: &OutputFormat) -> i32 {
    match result {
        Ok(summary) => {
            match format {
                OutputFormat::Json => print_json(&serde_json::json!(summary)),
                _ => output_summary_human(&summary),
            }
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn handle_check(file: &Path, format: OutputFormat, fail_on: Option<FailOn>, include_power: bool) -> i32 {
    let result = RefdesCore::load_project(file)
        .and_then(|project| RefdesCore::check_project(&project, include_power));

    match result {
        Ok(report) => {
            output_report(file, &report, &format);
            match fail_on {
                Some(fail_on) if should_fail(&report, &fail_on) => 1,
                _ => 0,
            }
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn handle_shorthand(file: &Path) -> i32 {
    match RefdesCore::load_project(file).and_then(|project| RefdesCore::shorthand_by_value(&project)) {
        Ok(groups) => {
            for (value, refs) in groups {
                println!("{}: {}", value, refs);
            }
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn should_fail(report: &CheckReport, fail_on: &FailOn) -> bool {
    match fail_on {
        FailOn::Any => !report.is_clean(),
        FailOn::Duplicates => report.count(AnnotationErrorKind::DuplicateReference) > 0,
        FailOn::Unannotated => report.count(AnnotationErrorKind::Unannotated) > 0,
    }
}

fn output_summary_human(summary: &AnnotationSummary) {
    if summary.changes.is_empty() {
        println!("No references changed ({} symbols)", summary.total);
        return;
    }

    for change in &summary.changes {
        println!("  {:<8} -> {:<8} {} ({})", change.old, change.new, change.value, change.sheet_path);
    }
    println!("\n  {} of {} references changed", summary.changed(), summary.total);
}

fn output_report(file: &Path, report: &CheckReport, format: &OutputFormat) {
    match format {
        OutputFormat::Human => output_human(file, report),
        OutputFormat::Json => output_json(file, report),
        OutputFormat::Github => output_github(file, report),
        OutputFormat::Gitlab => output_gitlab(file, report),
    }
}

fn output_human(file: &Path, report: &CheckReport) {
    println!("\nFile: {}", file.display());
    println!("{}", "─".repeat(60));

    if report.is_clean() {
        println!("  No annotation issues found");
        return;
    }

    for issue in &report.issues {
        println!("  - {}", issue.message);
        if issue.sheet_path != "/" {
            println!("    Sheet: {}", issue.sheet_path);
        }
    }

    println!("\n  Summary:");
    println!("    Unannotated:     {}", report.stats.unannotated);
    println!("    Extra units:     {}", report.stats.extra_units);
    println!("    Duplicates:      {}", report.stats.duplicate_reference);
    println!("    Value mismatch:  {}", report.stats.different_unit_value);
}

fn output_json(file: &Path, report: &CheckReport) {
    let output = serde_json::json!({
        "file": file.display().to_string(),
        "issues": report.issues,
        "stats": report.stats,
        "total_issues": report.error_count(),
    });
    print_json(&output);
}

fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(e) => eprintln!("Error: {}", e),
    }
}

fn kind_to_github(issue: &AnnotationIssue) -> &'static str {
    match issue.kind {
        AnnotationErrorKind::DuplicateReference | AnnotationErrorKind::ExtraUnits => "error",
        AnnotationErrorKind::Unannotated | AnnotationErrorKind::DifferentUnitValue => "warning",
    }
}

fn output_github(file: &Path, report: &CheckReport) {
    for issue in &report.issues {
        println!(
            "::{} file={}::{}",
            kind_to_github(issue),
            file.display(),
            issue.message.replace('\n', " ")
        );
    }
}

fn kind_to_gitlab(issue: &AnnotationIssue) -> &'static str {
    match issue.kind {
        AnnotationErrorKind::DuplicateReference => "blocker",
        AnnotationErrorKind::ExtraUnits => "major",
        AnnotationErrorKind::DifferentUnitValue => "minor",
        AnnotationErrorKind::Unannotated => "info",
    }
}

fn output_gitlab(file: &Path, report: &CheckReport) {
    let reports: Vec<_> = report
        .issues
        .iter()
        .map(|issue| {
            serde_json::json!({
                "description": issue.message,
                "check_name": issue.kind.id(),
                "severity": kind_to_gitlab(issue),
                "location": {
                    "path": file.display().to_string(),
                }
            })
        })
        .collect();
    print_json(&serde_json::Value::Array(reports));
}
