//! Sort orders over reference records.
//!
//! Every order ends on the symbol UUID (and the sheet path, which only
//! separates two occurrences of the same symbol) so no two distinct records
//! ever compare equal and sorting is reproducible.

use std::cmp::Ordering;

use crate::reference::Reference;

/// Prefix as a case-sensitive string, then the number as an integer.
pub fn compare_ref(a: &Reference, b: &Reference) -> Ordering {
    a.reference()
        .cmp(b.reference())
        .then(a.number.cmp(&b.number))
}

/// Prefix only; records of one prefix form one annotation group.
pub fn compare_prefix(a: &Reference, b: &Reference) -> Ordering {
    a.reference().cmp(b.reference())
}

pub fn compare_value(a: &Reference, b: &Reference) -> Ordering {
    a.value.cmp(&b.value)
}

pub fn compare_lib_name(a: &Reference, b: &Reference) -> Ordering {
    a.lib_name.cmp(&b.lib_name)
}

fn compare_identity(a: &Reference, b: &Reference) -> Ordering {
    a.uuid
        .cmp(&b.uuid)
        .then_with(|| a.sheet_path.cmp(&b.sheet_path))
}

pub fn by_x_position(a: &Reference, b: &Reference) -> Ordering {
    compare_ref(a, b)
        .then(a.sheet_number.cmp(&b.sheet_number))
        .then(a.position.x.total_cmp(&b.position.x))
        .then(a.position.y.total_cmp(&b.position.y))
        .then_with(|| compare_identity(a, b))
}

pub fn by_y_position(a: &Reference, b: &Reference) -> Ordering {
    compare_ref(a, b)
        .then(a.sheet_number.cmp(&b.sheet_number))
        .then(a.position.y.total_cmp(&b.position.y))
        .then(a.position.x.total_cmp(&b.position.x))
        .then_with(|| compare_identity(a, b))
}

pub fn by_ref_and_value(a: &Reference, b: &Reference) -> Ordering {
    compare_ref(a, b)
        .then_with(|| compare_value(a, b))
        .then(a.unit.cmp(&b.unit))
        .then(a.sheet_number.cmp(&b.sheet_number))
        .then(a.position.x.total_cmp(&b.position.x))
        .then(a.position.y.total_cmp(&b.position.y))
        .then_with(|| compare_identity(a, b))
}

/// Natural, case-insensitive order on the displayed reference (`r9 < R10`).
pub fn by_reference_only(a: &Reference, b: &Reference) -> Ordering {
    natord::compare_ignore_case(&a.full_ref(), &b.full_ref())
        .then(a.unit.cmp(&b.unit))
        .then_with(|| compare_identity(a, b))
}

pub fn by_instance_occurrence(a: &Reference, b: &Reference) -> Ordering {
    a.sheet_path
        .cmp(&b.sheet_path)
        .then_with(|| compare_identity(a, b))
}
