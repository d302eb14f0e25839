//! Flat reference list.
//!
//! The hierarchy walker produces one [`Reference`] per symbol unit and sheet
//! occurrence; the annotator and the checker operate on this list in place.

use std::collections::BTreeMap;
use std::ops::{Index, IndexMut};

use crate::compare::{self, compare_lib_name, compare_prefix, compare_value};
use crate::reference::Reference;

#[derive(Debug, Clone, Default)]
pub struct ReferenceList {
    items: Vec<Reference>,
}

/// Reference data of one symbol occurrence, as written back to a schematic
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolInstanceReference {
    pub path: String,
    pub reference: String,
    pub unit: i32,
    pub value: String,
    pub footprint: String,
}

impl ReferenceList {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Reference> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Reference> {
        self.items.iter_mut()
    }

    pub fn as_slice(&self) -> &[Reference] {
        &self.items
    }

    pub fn add_item(&mut self, item: Reference) {
        self.items.push(item);
    }

    /// Remove the record at `index`; out of range is a no-op.
    pub fn remove_item(&mut self, index: usize) {
        if index < self.items.len() {
            self.items.remove(index);
        }
    }

    pub fn contains(&self, item: &Reference) -> bool {
        self.items.iter().any(|r| r.is_same_instance(item))
    }

    pub fn split_references(&mut self) {
        for r in &mut self.items {
            if r.is_split_needed() {
                r.split();
            }
        }
    }

    pub fn sort_by_x_coordinate(&mut self) {
        self.items.sort_by(compare::by_x_position);
    }

    pub fn sort_by_y_coordinate(&mut self) {
        self.items.sort_by(compare::by_y_position);
    }

    pub fn sort_by_ref_and_value(&mut self) {
        self.items.sort_by(compare::by_ref_and_value);
    }

    pub fn sort_by_reference_only(&mut self) {
        self.items.sort_by(compare::by_reference_only);
    }

    pub fn sort_by_instance_occurrence(&mut self) {
        self.items.sort_by(compare::by_instance_occurrence);
    }

    /// Index of another record with the same prefix and number as
    /// `self[index]` carrying `unit`.
    pub fn find_unit(&self, index: usize, unit: i32, include_new: bool) -> Option<usize> {
        let target = &self.items[index];

        self.items.iter().enumerate().position(|(i, r)| {
            i != index
                && (include_new || !r.is_new)
                && r.number == target.number
                && compare_prefix(target, r).is_eq()
                && r.unit == unit
        })
    }

    pub fn find_ref_by_path(&self, path: &str) -> Option<usize> {
        self.items.iter().position(|r| r.sheet_path == path)
    }

    pub fn find_ref(&self, reference: &str) -> Option<usize> {
        self.items.iter().position(|r| r.reference() == reference)
    }

    /// Sorted, deduplicated numbers already committed for the prefix of
    /// `self[index]` that are at least `min`.
    pub fn refs_in_use(&self, index: usize, min: i32) -> Vec<i32> {
        refs_in_use(self.items.iter(), &self.items[index], min)
    }

    /// Units used by records sharing value, library name, prefix and number
    /// with `item`; always contains `item.unit`.
    pub fn units_matching_ref(&self, item: &Reference) -> Vec<i32> {
        let mut units = vec![item.unit];

        for r in &self.items {
            if compare_value(r, item).is_ne() || compare_lib_name(r, item).is_ne() {
                continue;
            }

            let mut r = r.clone();
            if r.is_split_needed() {
                r.split();
            }

            if compare_prefix(&r, item).is_ne() || r.number != item.number {
                continue;
            }

            units.push(r.unit);
        }

        units.sort_unstable();
        units.dedup();
        units
    }

    pub fn find_first_unused_reference(
        &self,
        item: &Reference,
        min: i32,
        required_units: &[i32],
    ) -> i32 {
        find_first_unused_reference(self.items.iter(), item, min, required_units)
    }

    pub fn symbol_instances(&self) -> Vec<SymbolInstanceReference> {
        self.items
            .iter()
            .map(|r| SymbolInstanceReference {
                path: r.sheet_path.clone(),
                reference: r.full_ref(),
                unit: r.unit,
                value: r.value.clone(),
                footprint: r.footprint.clone(),
            })
            .collect()
    }

    pub(crate) fn items(&self) -> &[Reference] {
        &self.items
    }

    pub(crate) fn items_mut(&mut self) -> &mut Vec<Reference> {
        &mut self.items
    }
}

pub(crate) fn refs_in_use<'a>(
    records: impl Iterator<Item = &'a Reference>,
    item: &Reference,
    min: i32,
) -> Vec<i32> {
    // records still to be numbered are not in use
    let mut ids: Vec<i32> = records
        .filter(|r| compare_prefix(item, r).is_eq() && r.number >= min && !r.is_new)
        .map(|r| r.number)
        .collect();

    ids.sort_unstable();
    ids.dedup();
    ids
}

/// First number at or above `min` whose existing holders (same prefix) can
/// share it with `item`: a holder blocks the number when it is a different
/// part (library name or value) or already occupies one of `required_units`.
pub(crate) fn find_first_unused_reference<'a>(
    records: impl Iterator<Item = &'a Reference>,
    item: &Reference,
    min: i32,
    required_units: &[i32],
) -> i32 {
    let mut by_number: BTreeMap<i32, Vec<&Reference>> = BTreeMap::new();
    for r in records {
        if compare_prefix(r, item).is_ne() || r.is_new {
            continue;
        }
        by_number.entry(r.number).or_default().push(r);
    }

    let mut candidate = min;
    while let Some(holders) = by_number.get(&candidate) {
        let in_use = required_units.iter().any(|unit| {
            holders.iter().any(|r| {
                compare_lib_name(r, item).is_ne()
                    || compare_value(r, item).is_ne()
                    || r.unit == *unit
            })
        });

        if !in_use {
            return candidate;
        }
        match candidate.checked_add(1) {
            Some(next) => candidate = next,
            None => return candidate,
        }
    }

    candidate
}

/// Smallest id at or above `first` missing from the sorted `ids`; the id is
/// inserted so the next call returns a different one.
pub fn create_first_free_ref_id(ids: &mut Vec<i32>, first: i32) -> i32 {
    let mut expected = first;
    let mut i = ids.partition_point(|&id| id < first);

    while i < ids.len() {
        if ids[i] != expected {
            ids.insert(i, expected);
            return expected;
        }
        match expected.checked_add(1) {
            Some(next) => expected = next,
            // every id up to i32::MAX is taken
            None => return expected,
        }
        i += 1;
    }

    ids.push(expected);
    expected
}

impl Index<usize> for ReferenceList {
    type Output = Reference;

    fn index(&self, index: usize) -> &Reference {
        &self.items[index]
    }
}

impl IndexMut<usize> for ReferenceList {
    fn index_mut(&mut self, index: usize) -> &mut Reference {
        &mut self.items[index]
    }
}

impl From<Vec<Reference>> for ReferenceList {
    fn from(items: Vec<Reference>) -> Self {
        Self { items }
    }
}

impl FromIterator<Reference> for ReferenceList {
    fn from_iter<I: IntoIterator<Item = Reference>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for ReferenceList {
    type Item = Reference;
    type IntoIter = std::vec::IntoIter<Reference>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a ReferenceList {
    type Item = &'a Reference;
    type IntoIter = std::slice::Iter<'a, Reference>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn split(text: &str) -> Reference {
        let mut r = Reference::new(text, Uuid::new_v4());
        r.split();
        r
    }

    #[test]
    fn test_free_ref_id_fills_first_gap() {
        let mut ids = vec![1, 2, 4, 7];
        assert_eq!(create_first_free_ref_id(&mut ids, 1), 3);
        assert_eq!(ids, vec![1, 2, 3, 4, 7]);
        assert_eq!(create_first_free_ref_id(&mut ids, 1), 5);
        assert_eq!(create_first_free_ref_id(&mut ids, 1), 6);
        assert_eq!(create_first_free_ref_id(&mut ids, 1), 8);
        assert_eq!(ids, vec![1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn test_free_ref_id_respects_floor() {
        let mut ids = vec![1, 2, 101, 102];
        assert_eq!(create_first_free_ref_id(&mut ids, 101), 103);

        let mut ids = Vec::new();
        assert_eq!(create_first_free_ref_id(&mut ids, 201), 201);
        assert_eq!(ids, vec![201]);
    }

    #[test]
    fn test_free_ref_id_at_upper_bound() {
        let mut ids = vec![i32::MAX - 1, i32::MAX];
        assert_eq!(create_first_free_ref_id(&mut ids, i32::MAX - 1), i32::MAX);
        assert_eq!(ids.len(), 2);

        let holder = split("U2147483647").with_unit(1, 2);
        let list: ReferenceList = vec![holder.clone()].into();
        assert_eq!(list.find_first_unused_reference(&holder, i32::MAX, &[1]), i32::MAX);
    }

    #[test]
    fn test_refs_in_use_skips_new_and_other_prefixes() {
        let mut unannotated = split("R?");
        unannotated.number = 9;
        let list: ReferenceList = vec![
            split("R3"),
            split("R1"),
            split("R3"),
            split("C2"),
            unannotated,
            split("R?"),
        ]
        .into();

        assert_eq!(list.refs_in_use(0, 1), vec![1, 3]);
        assert_eq!(list.refs_in_use(0, 2), vec![3]);
    }

    #[test]
    fn test_units_matching_ref() {
        let a = split("U1").with_unit(1, 4).with_value("LM324").with_lib_name("LM324");
        let b = split("U1").with_unit(3, 4).with_value("LM324").with_lib_name("LM324");
        let other_value = split("U1").with_unit(2, 4).with_value("TL074").with_lib_name("LM324");
        let unsplit = Reference::new("U1", Uuid::new_v4())
            .with_unit(4, 4)
            .with_value("LM324")
            .with_lib_name("LM324");
        let list: ReferenceList = vec![b, other_value, unsplit].into();

        assert_eq!(list.units_matching_ref(&a), vec![1, 3, 4]);
        // the list itself is left unsplit
        assert!(list[2].is_split_needed());
    }

    #[test]
    fn test_find_first_unused_reference_shares_package() {
        let u1a = split("U1").with_unit(1, 2).with_value("LM358").with_lib_name("LM358");
        let list: ReferenceList = vec![u1a].into();

        let b = split("U?").with_unit(2, 2).with_value("LM358").with_lib_name("LM358");
        assert_eq!(list.find_first_unused_reference(&b, 1, &[2]), 1);

        // same unit already placed
        let a = split("U?").with_unit(1, 2).with_value("LM358").with_lib_name("LM358");
        assert_eq!(list.find_first_unused_reference(&a, 1, &[1]), 2);

        // different part never shares a number
        let c = split("U?").with_unit(2, 2).with_value("TL072").with_lib_name("TL072");
        assert_eq!(list.find_first_unused_reference(&c, 1, &[2]), 2);
    }

    #[test]
    fn test_find_unit_and_lookups() {
        let list: ReferenceList = vec![
            split("U1").with_unit(1, 2),
            split("U1").with_unit(2, 2).with_sheet(2, "/sub"),
            split("U2").with_unit(2, 2),
        ]
        .into();

        assert_eq!(list.find_unit(0, 2, false), Some(1));
        assert_eq!(list.find_unit(0, 3, false), None);
        assert_eq!(list.find_ref_by_path("/sub"), Some(1));
        assert_eq!(list.find_ref("U"), Some(0));
        assert_eq!(list.find_ref("Q"), None);
    }

    #[test]
    fn test_remove_and_contains() {
        let r = split("R1");
        let mut list: ReferenceList = vec![r.clone(), split("R2")].into();
        assert!(list.contains(&r));
        list.remove_item(5);
        assert_eq!(list.len(), 2);
        list.remove_item(0);
        assert!(!list.contains(&r));
    }

    #[test]
    fn test_symbol_instances() {
        let list: ReferenceList = vec![split("R7").with_value("10k").with_footprint("R_0603")].into();
        let instances = list.symbol_instances();
        assert_eq!(instances[0].reference, "R7");
        assert_eq!(instances[0].value, "10k");
        assert_eq!(instances[0].footprint, "R_0603");
        assert_eq!(instances[0].path, "/");
    }
}
