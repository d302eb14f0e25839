//! Annotation consistency checks.
//!
//! Walks an annotated list sorted by reference and value and reports:
//! unannotated items, units beyond the symbol's unit count, duplicated
//! references and units of one component carrying different values.

use serde::{Deserialize, Serialize};

use crate::compare::{compare_ref, compare_value};
use crate::list::ReferenceList;
use crate::reference::{sub_reference, Reference};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationErrorKind {
    Unannotated,
    ExtraUnits,
    DuplicateReference,
    DifferentUnitValue,
}

impl AnnotationErrorKind {
    pub fn id(&self) -> &'static str {
        match self {
            AnnotationErrorKind::Unannotated => "unannotated",
            AnnotationErrorKind::ExtraUnits => "extra_units",
            AnnotationErrorKind::DuplicateReference => "duplicate_reference",
            AnnotationErrorKind::DifferentUnitValue => "different_unit_value",
        }
    }
}

impl std::fmt::Display for AnnotationErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotationIssue {
    pub kind: AnnotationErrorKind,
    pub message: String,
    /// Reference of the offending item, e.g. `U3B`
    pub component: String,
    pub sheet_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub other_component: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckStats {
    pub unannotated: usize,
    pub extra_units: usize,
    pub duplicate_reference: usize,
    pub different_unit_value: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckReport {
    pub issues: Vec<AnnotationIssue>,
    pub stats: CheckStats,
}

impl CheckReport {
    pub fn error_count(&self) -> usize {
        self.issues.len()
    }

    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn count(&self, kind: AnnotationErrorKind) -> usize {
        match kind {
            AnnotationErrorKind::Unannotated => self.stats.unannotated,
            AnnotationErrorKind::ExtraUnits => self.stats.extra_units,
            AnnotationErrorKind::DuplicateReference => self.stats.duplicate_reference,
            AnnotationErrorKind::DifferentUnitValue => self.stats.different_unit_value,
        }
    }

    fn push(&mut self, kind: AnnotationErrorKind, message: &str, a: &Reference, b: Option<&Reference>) {
        match kind {
            AnnotationErrorKind::Unannotated => self.stats.unannotated += 1,
            AnnotationErrorKind::ExtraUnits => self.stats.extra_units += 1,
            AnnotationErrorKind::DuplicateReference => self.stats.duplicate_reference += 1,
            AnnotationErrorKind::DifferentUnitValue => self.stats.different_unit_value += 1,
        }

        self.issues.push(AnnotationIssue {
            kind,
            message: message.to_string(),
            component: a.display_ref(),
            sheet_path: a.sheet_path.clone(),
            other_component: b.map(|b| b.display_ref()),
        });
    }
}

fn has_unit(r: &Reference) -> bool {
    r.unit > 0 && r.unit < i32::MAX
}

impl ReferenceList {
    /// Report annotation errors to `handler`, returning how many were found.
    ///
    /// Only the first unannotated item is reported; every other kind of error
    /// is reported for each occurrence.
    pub fn check_annotation<F>(&mut self, mut handler: F) -> usize
    where
        F: FnMut(AnnotationErrorKind, &str, &Reference, Option<&Reference>),
    {
        let mut errors = 0;

        self.split_references();
        self.sort_by_ref_and_value();

        let items = self.items();

        for r in items {
            if r.is_new {
                let msg = if has_unit(r) {
                    format!("Item not annotated: {}{} (unit {})", r.reference(), r.ref_number(), r.unit)
                } else {
                    format!("Item not annotated: {}{}", r.reference(), r.ref_number())
                };

                handler(AnnotationErrorKind::Unannotated, &msg, r, None);
                errors += 1;
                break;
            }

            // the library symbol may have lost units since the last annotation
            if r.unit_count.max(1) < r.unit {
                let msg = format!(
                    "Error: symbol {}{}{} (unit {}) exceeds units defined ({})",
                    r.reference(),
                    r.ref_number(),
                    sub_reference(r.unit),
                    r.unit,
                    r.unit_count
                );

                handler(AnnotationErrorKind::ExtraUnits, &msg, r, None);
                errors += 1;
            }
        }

        for pair in items.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);

            if compare_ref(a, b).is_ne() {
                continue;
            }

            if a.unit == b.unit {
                let msg = if a.unit_count > 1 && has_unit(a) {
                    format!("Duplicate items {}{}{}", a.reference(), a.ref_number(), sub_reference(a.unit))
                } else {
                    format!("Duplicate items {}{}", a.reference(), a.ref_number())
                };

                handler(AnnotationErrorKind::DuplicateReference, &msg, a, Some(b));
                errors += 1;
                continue;
            }

            // U3 with one unit next to U3B
            if a.unit_count != b.unit_count {
                let msg = if has_unit(a) {
                    format!("Duplicate items {}{}{}", a.reference(), a.ref_number(), sub_reference(a.unit))
                } else {
                    format!("Duplicate items {}{}", a.reference(), a.ref_number())
                };

                handler(AnnotationErrorKind::DuplicateReference, &msg, a, Some(b));
                errors += 1;
            }

            if compare_value(a, b).is_ne() {
                let msg = format!(
                    "Different values for {}{}{} ({}) and {}{}{} ({})",
                    a.reference(),
                    a.number,
                    sub_reference(a.unit),
                    a.value,
                    b.reference(),
                    b.number,
                    sub_reference(b.unit),
                    b.value
                );

                handler(AnnotationErrorKind::DifferentUnitValue, &msg, a, Some(b));
                errors += 1;
            }
        }

        if errors > 0 {
            tracing::debug!("Annotation check found {} errors", errors);
        }

        errors
    }

    /// [`ReferenceList::check_annotation`] collected into a report.
    pub fn check_annotation_report(&mut self) -> CheckReport {
        let mut report = CheckReport::default();
        self.check_annotation(|kind, msg, a, b| report.push(kind, msg, a, b));
        report
    }
}
