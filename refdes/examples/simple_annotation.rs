//! Simple annotation example: annotate a project and print the changes.

use refdes::prelude::*;
use std::path::Path;

fn main() -> Result<(), RefdesError> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "tests/fixtures/hierarchical.json".to_string());
    let path = Path::new(&path);

    if !path.exists() {
        eprintln!("File not found: {}", path.display());
        eprintln!("Usage: cargo run --example simple_annotation [path/to/project.json]");
        std::process::exit(1);
    }

    let mut project = RefdesCore::load_project(path)?;
    let options = project.settings.clone();
    let summary = RefdesCore::annotate_project(&mut project, &options)?;

    println!("Annotation results for: {}", project.name);
    println!("References: {} ({} changed)", summary.total, summary.changed());
    println!();

    for change in &summary.changes {
        println!("  {:<8} -> {:<8} {} ({})", change.old, change.new, change.value, change.sheet_path);
    }

    let report = RefdesCore::check_project(&project, options.include_power_symbols)?;
    if !report.is_clean() {
        println!("\nAnnotation check found {} issues:", report.error_count());
        for issue in &report.issues {
            println!("  - {}", issue.message);
        }
        std::process::exit(1);
    }

    println!("\nAnnotation check passed.");
    Ok(())
}
