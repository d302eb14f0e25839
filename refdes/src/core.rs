//! Core annotation API shared by the CLI and library users.
//! Loads project snapshots, runs annotation or checks, writes results back.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::annotate::{build_locked_unit_map, AnnotateAlgo, AnnotateOrder, LockedUnitMap};
use crate::check::CheckReport;
use crate::list::ReferenceList;
use crate::reference::{InstanceKey, Reference};
use crate::schematic::Project;
use crate::shorthand::shorthand;

#[derive(Debug, thiserror::Error)]
pub enum RefdesError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid project file: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Recursive sheet hierarchy through {0}")]
    RecursiveSheet(String),
    #[error("Sheet file not found: {0}")]
    MissingSheet(String),
    #[error("Unknown sheet path: {0}")]
    UnknownSheetPath(String),
}

/// Options for annotation runs (CLI flags or the project's settings block).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotateOptions {
    pub order: AnnotateOrder,
    pub algorithm: AnnotateAlgo,
    pub start_number: i32,
    /// Renumber existing references too
    pub reset: bool,
    /// Keep units of annotated multi-unit symbols on their reference
    pub lock_units: bool,
    pub start_at_current: bool,
    pub include_power_symbols: bool,
    /// Only annotate this sheet occurrence; other sheets stay reserved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sheet: Option<String>,
}

impl Default for AnnotateOptions {
    fn default() -> Self {
        Self {
            order: AnnotateOrder::X,
            algorithm: AnnotateAlgo::Incremental,
            start_number: 0,
            reset: false,
            lock_units: true,
            start_at_current: false,
            include_power_symbols: false,
            sheet: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReferenceChange {
    pub sheet_path: String,
    pub old: String,
    pub new: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnnotationSummary {
    pub total: usize,
    pub changes: Vec<ReferenceChange>,
}

impl AnnotationSummary {
    pub fn changed(&self) -> usize {
        self.changes.len()
    }
}

/// Core annotation API used by the CLI.
pub struct RefdesCore;

impl RefdesCore {
    pub fn load_project(path: &Path) -> Result<Project, RefdesError> {
        let text = std::fs::read_to_string(path)?;
        let project: Project = serde_json::from_str(&text)?;
        tracing::debug!("Loaded project {} from {}", project.name, path.display());
        Ok(project)
    }

    pub fn save_project(project: &Project, path: &Path) -> Result<(), RefdesError> {
        let text = serde_json::to_string_pretty(project)?;
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Annotate a project in place and report which references changed.
    pub fn annotate_project(
        project: &mut Project,
        options: &AnnotateOptions,
    ) -> Result<AnnotationSummary, RefdesError> {
        let mut all = project.build_reference_list(options.include_power_symbols)?;
        all.split_references();

        let before = snapshot(&all);

        let (mut target, additional) = match &options.sheet {
            Some(path) => {
                if !project.sheet_occurrences()?.iter().any(|o| &o.path == path) {
                    return Err(RefdesError::UnknownSheetPath(path.clone()));
                }
                let (inside, outside): (Vec<Reference>, Vec<Reference>) =
                    all.into_iter().partition(|r| &r.sheet_path == path);
                (ReferenceList::from(inside), ReferenceList::from(outside))
            }
            None => (all, ReferenceList::new()),
        };

        if options.reset {
            target.reannotate_by_options(
                options.order,
                options.algorithm,
                options.start_number,
                &additional,
                options.start_at_current,
            );
        } else {
            let locked = if options.lock_units {
                build_locked_unit_map(&target)
            } else {
                LockedUnitMap::new()
            };
            target.annotate_by_options(
                options.order,
                options.algorithm,
                options.start_number,
                &locked,
                &additional,
                options.start_at_current,
            );
        }

        let changes = collect_changes(&before, &target);
        project.apply_references(&target)?;

        tracing::info!(
            "Annotated {}: {} of {} references changed",
            project.name,
            changes.len(),
            target.len()
        );

        Ok(AnnotationSummary {
            total: target.len(),
            changes,
        })
    }

    /// Renumber the second and later holders of a duplicated reference,
    /// leaving every other reference untouched.
    pub fn reannotate_duplicates(
        project: &mut Project,
        include_power: bool,
    ) -> Result<AnnotationSummary, RefdesError> {
        let mut all = project.build_reference_list(include_power)?;
        all.split_references();
        all.sort_by_instance_occurrence();

        let before = snapshot(&all);

        let mut seen: HashSet<String> = HashSet::new();
        let (duplicates, unique): (Vec<Reference>, Vec<Reference>) = all
            .into_iter()
            .partition(|r| !r.is_new && !seen.insert(r.full_reference(None)));

        let mut target = ReferenceList::from(duplicates);
        let additional = ReferenceList::from(unique);

        if target.is_empty() {
            tracing::info!("No duplicate references in {}", project.name);
            return Ok(AnnotationSummary {
                total: 0,
                changes: Vec::new(),
            });
        }

        target.reannotate_duplicates(&additional);

        let changes = collect_changes(&before, &target);
        project.apply_references(&target)?;

        tracing::info!(
            "Reannotated {} duplicate references in {}",
            changes.len(),
            project.name
        );

        Ok(AnnotationSummary {
            total: target.len(),
            changes,
        })
    }

    /// Run the annotation checks over the whole hierarchy.
    pub fn check_project(project: &Project, include_power: bool) -> Result<CheckReport, RefdesError> {
        let mut list = project.build_reference_list(include_power)?;
        Ok(list.check_annotation_report())
    }

    /// Annotated references grouped by value, e.g. `("10k", "R1-R3, R5")`.
    pub fn shorthand_by_value(project: &Project) -> Result<Vec<(String, String)>, RefdesError> {
        let mut list = project.build_reference_list(false)?;
        list.split_references();
        list.sort_by_reference_only();

        let mut by_value: BTreeMap<String, Vec<Reference>> = BTreeMap::new();
        for r in list.into_iter().filter(|r| !r.is_new) {
            by_value.entry(r.value.clone()).or_default().push(r);
        }

        Ok(by_value
            .into_iter()
            .map(|(value, mut records)| {
                // units of one package list the reference once
                records.dedup_by(|a, b| a.full_ref() == b.full_ref());
                (value, shorthand(&records))
            })
            .collect())
    }
}

fn snapshot(list: &ReferenceList) -> HashMap<InstanceKey, String> {
    list.iter()
        .map(|r| (r.instance_key(), r.display_ref()))
        .collect()
}

fn collect_changes(before: &HashMap<InstanceKey, String>, after: &ReferenceList) -> Vec<ReferenceChange> {
    after
        .iter()
        .filter_map(|r| {
            let old = before.get(&r.instance_key())?;
            let new = r.display_ref();
            (*old != new).then(|| ReferenceChange {
                sheet_path: r.sheet_path.clone(),
                old: old.clone(),
                new,
                value: r.value.clone(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_from_partial_settings() {
        let options: AnnotateOptions =
            serde_json::from_str(r#"{ "order": "y", "algorithm": "sheet100" }"#).unwrap();

        assert_eq!(options.order, AnnotateOrder::Y);
        assert_eq!(options.algorithm, AnnotateAlgo::SheetX100);
        assert!(options.lock_units);
        assert_eq!(options.start_number, 0);
    }

    #[test]
    fn test_error_messages() {
        let e = RefdesError::UnknownSheetPath("/nope".to_string());
        assert_eq!(e.to_string(), "Unknown sheet path: /nope");
    }
}
