//! Refdes - schematic reference designator annotation library
//!
//! Assigns unique, deterministic references (`R1`, `U3A`, `U3B`) to the
//! symbols of a hierarchical schematic and checks existing annotation for
//! duplicates, missing numbers and inconsistent multi-unit parts.
//!
//! # Quick Start
//!
//! ```no_run
//! use refdes::{AnnotateOptions, RefdesCore};
//! use std::path::Path;
//!
//! let mut project = RefdesCore::load_project(Path::new("design.json")).unwrap();
//! let summary = RefdesCore::annotate_project(&mut project, &AnnotateOptions::default()).unwrap();
//!
//! for change in &summary.changes {
//!     println!("{} -> {}", change.old, change.new);
//! }
//! ```
//!
//! # Features
//!
//! - **Annotation**: position or caller order, incremental or per-sheet
//!   numbering, locked multi-unit groups, reserved references
//! - **Re-annotation**: renumber everything or only duplicates while keeping
//!   units of one package together
//! - **Checks**: unannotated items, extra units, duplicates, value mismatches
//! - **Shorthand**: compact summaries like `R1-R3, R5`

pub mod annotate;
pub mod check;
pub mod compare;
pub mod core;
pub mod list;
pub mod reference;
pub mod schematic;
pub mod shorthand;

// Re-export main types
pub use annotate::{build_locked_unit_map, AnnotateAlgo, AnnotateOrder, LockedUnitMap};
pub use check::{AnnotationErrorKind, AnnotationIssue, CheckReport, CheckStats};
pub use crate::core::{AnnotateOptions, AnnotationSummary, RefdesCore, RefdesError, ReferenceChange};
pub use list::{create_first_free_ref_id, ReferenceList, SymbolInstanceReference};
pub use reference::{sub_reference, InstanceKey, Position, Reference};
pub use schematic::{LibSymbol, Project, SheetFile, SheetInstance, Symbol, SymbolInstance};
pub use shorthand::shorthand;

/// Load a project snapshot (convenience wrapper).
pub fn load_project(path: &std::path::Path) -> Result<Project, RefdesError> {
    RefdesCore::load_project(path)
}

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{
        AnnotateAlgo, AnnotateOptions, AnnotateOrder, AnnotationErrorKind, CheckReport, LockedUnitMap,
        Project, RefdesCore, RefdesError, Reference, ReferenceList,
    };
}
