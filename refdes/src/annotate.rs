//! Annotation engine.
//!
//! Numbers every unannotated record of a [`ReferenceList`] in a single
//! forward pass over the sorted list:
//!
//! - records are grouped by prefix (and by sheet when sheet numbering is on);
//!   each group starts searching at its floor (`start + 1` or
//!   `sheet * step + 1`)
//! - single-unit parts take the smallest number not used by the prefix
//! - units of a locked multi-unit group take one number together, keeping
//!   their unit assignment
//! - multi-unit parts with no group information only avoid numbers already
//!   holding the same unit
//!
//! Additional references (e.g. sheets outside the annotated scope) are
//! honoured as reservations without being inserted into the list.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::compare::{compare_lib_name, compare_prefix, compare_value};
use crate::list::{create_first_free_ref_id, find_first_unused_reference, refs_in_use, ReferenceList};
use crate::reference::{InstanceKey, Reference};

/// Traversal order used before numbering
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnotateOrder {
    #[default]
    #[serde(alias = "x_position")]
    X,
    #[serde(alias = "y_position")]
    Y,
    /// Keep the order the caller built
    Unsorted,
}

/// Numbering scheme
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnotateAlgo {
    #[default]
    Incremental,
    /// Sheet 3 uses 301, 302, ...
    #[serde(rename = "sheet100")]
    SheetX100,
    /// Sheet 3 uses 3001, 3002, ...
    #[serde(rename = "sheet1000")]
    SheetX1000,
}

impl AnnotateAlgo {
    /// `(use sheet number, sheet step)`
    pub fn sheet_numbering(self) -> (bool, i32) {
        match self {
            AnnotateAlgo::Incremental => (false, 100),
            AnnotateAlgo::SheetX100 => (true, 100),
            AnnotateAlgo::SheetX1000 => (true, 1000),
        }
    }
}

/// Full reference (`U3`) to the unit records that must stay one component.
pub type LockedUnitMap = BTreeMap<String, ReferenceList>;

/// Group the annotated multi-unit records of `list` by reference.
pub fn build_locked_unit_map(list: &ReferenceList) -> LockedUnitMap {
    let mut locked = LockedUnitMap::new();

    for r in list {
        let mut r = r.clone();
        if r.is_split_needed() {
            r.split();
        }

        if r.unit_count <= 1 || r.is_new || r.number < 0 {
            continue;
        }

        locked.entry(r.full_ref()).or_default().add_item(r);
    }

    locked
}

impl ReferenceList {
    /// Sort per `order`, then number every unannotated record.
    pub fn annotate_by_options(
        &mut self,
        order: AnnotateOrder,
        algo: AnnotateAlgo,
        start_number: i32,
        locked: &LockedUnitMap,
        additional: &ReferenceList,
        start_at_current: bool,
    ) {
        self.split_references();

        match order {
            AnnotateOrder::X => self.sort_by_x_coordinate(),
            AnnotateOrder::Y => self.sort_by_y_coordinate(),
            AnnotateOrder::Unsorted => {}
        }

        let (use_sheet_number, step) = algo.sheet_numbering();
        self.annotate(
            use_sheet_number,
            step,
            start_number,
            locked,
            additional,
            start_at_current,
        );
    }

    /// Renumber every record, keeping units of each existing reference
    /// together.
    pub fn reannotate_by_options(
        &mut self,
        order: AnnotateOrder,
        algo: AnnotateAlgo,
        start_number: i32,
        additional: &ReferenceList,
        start_at_current: bool,
    ) {
        self.split_references();

        let mut locked = LockedUnitMap::new();
        for r in self.iter_mut() {
            let full_ref = r.full_ref();

            // never lock unassigned references
            if full_ref.ends_with('?') {
                continue;
            }

            r.is_new = true;
            locked.entry(full_ref).or_default().add_item(r.clone());
        }

        self.annotate_by_options(order, algo, start_number, &locked, additional, start_at_current);
    }

    /// Give duplicated references new numbers above their current ones,
    /// avoiding everything in `additional`.
    pub fn reannotate_duplicates(&mut self, additional: &ReferenceList) {
        self.reannotate_by_options(
            AnnotateOrder::Unsorted,
            AnnotateAlgo::Incremental,
            0,
            additional,
            true,
        );
    }

    /// Number the unannotated records of the (already sorted) list.
    pub fn annotate(
        &mut self,
        use_sheet_number: bool,
        sheet_step: i32,
        start_number: i32,
        locked: &LockedUnitMap,
        additional: &ReferenceList,
        start_at_current: bool,
    ) {
        if self.is_empty() {
            return;
        }

        // Full references (`U3..2`) already handed out. Re-annotation can
        // start from duplicated references, so a full reference is never
        // propagated twice.
        let mut in_use: HashSet<String> = HashSet::new();

        let reserved: Vec<Reference> = additional
            .iter()
            .map(|r| {
                let mut r = r.clone();
                r.split();
                if !r.is_new {
                    in_use.insert(r.full_reference(None));
                }
                // reservations are never renumbered
                r.is_new = false;
                r
            })
            .collect();

        let lock_index: HashMap<InstanceKey, &str> = locked
            .iter()
            .flat_map(|(name, group)| group.iter().map(move |r| (r.instance_key(), name.as_str())))
            .collect();

        let pending_before = self.iter().filter(|r| r.is_new).count();

        tracing::debug!(
            "Annotating {} references ({} unannotated, {} reserved, {} locked groups), sheet numbering: {}, start: {}",
            self.len(),
            pending_before,
            reserved.len(),
            locked.len(),
            use_sheet_number,
            start_number
        );

        let floor_for = |r: &Reference| {
            if use_sheet_number {
                r.sheet_number.saturating_mul(sheet_step).saturating_add(1)
            } else {
                start_number.saturating_add(1)
            }
        };

        let items = self.items_mut();
        let mut first = 0;
        let mut min_ref_id = floor_for(&items[first]);

        for ii in 0..items.len() {
            if items[ii].flag {
                continue;
            }

            let group = lock_index
                .get(&items[ii].instance_key())
                .and_then(|name| locked.get(*name));

            if compare_prefix(&items[first], &items[ii]).is_ne()
                || (use_sheet_number && items[first].sheet_number != items[ii].sheet_number)
            {
                first = ii;
                min_ref_id = floor_for(&items[ii]);
            }

            if start_at_current && items[ii].number > 0 {
                min_ref_id = items[ii].number;
            }

            if items[ii].unit_count <= 1 {
                if items[ii].is_new {
                    let mut ids = refs_in_use(items.iter().chain(reserved.iter()), &items[first], min_ref_id);
                    items[ii].number = create_first_free_ref_id(&mut ids, min_ref_id);
                }

                items[ii].flag = true;
                items[ii].is_new = false;
                continue;
            }

            if let Some(group) = group {
                let units = group.units_matching_ref(&items[ii]);

                if items[ii].is_new {
                    let number = find_first_unused_reference(
                        items.iter().chain(reserved.iter()),
                        &items[ii],
                        min_ref_id,
                        &units,
                    );
                    let r = &mut items[ii];
                    r.number = number;
                    r.is_new = false;
                    r.flag = true;
                }

                // claim the unit of the symbol being annotated before any sibling
                if let Some(own) = group.iter().find(|r| r.is_same_instance(&items[ii])) {
                    items[ii].unit = own.unit;
                }
                in_use.insert(items[ii].full_reference(None));

                for locked_ref in group {
                    if locked_ref.is_same_instance(&items[ii])
                        || compare_value(locked_ref, &items[ii]).is_ne()
                        || compare_lib_name(locked_ref, &items[ii]).is_ne()
                    {
                        continue;
                    }

                    for jj in ii + 1..items.len() {
                        if !locked_ref.is_same_instance(&items[jj]) {
                            continue;
                        }
                        // already numbered with another package
                        if items[jj].flag {
                            break;
                        }

                        let candidate = items[ii].full_reference(Some(locked_ref.unit));
                        if in_use.contains(&candidate) {
                            continue;
                        }

                        let number = items[ii].number;
                        let r = &mut items[jj];
                        r.number = number;
                        r.is_new = false;
                        r.flag = true;
                        in_use.insert(candidate);
                        break;
                    }
                }
            } else if items[ii].is_new {
                // Unit of a multi-unit part with no group: its siblings are
                // numbered on their own turn, so only the same unit collides.
                let units = [items[ii].unit];
                let number = find_first_unused_reference(
                    items.iter().chain(reserved.iter()),
                    &items[ii],
                    min_ref_id,
                    &units,
                );
                let r = &mut items[ii];
                r.number = number;
                r.is_new = false;
                r.flag = true;
            }
        }

        for r in items.iter_mut() {
            r.flag = false;
        }

        let pending_after = self.iter().filter(|r| r.is_new).count();
        if pending_after > 0 {
            tracing::warn!("{} references left unannotated", pending_after);
        }
        tracing::debug!("Annotated {} references", pending_before - pending_after);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn part(reference: &str) -> Reference {
        Reference::new(reference, Uuid::new_v4())
    }

    fn multi(reference: &str, unit: i32, count: i32, value: &str) -> Reference {
        part(reference)
            .with_unit(unit, count)
            .with_value(value)
            .with_lib_name(value)
    }

    fn refs(list: &ReferenceList) -> Vec<String> {
        list.iter().map(|r| r.display_ref()).collect()
    }

    fn annotate_x(list: &mut ReferenceList) {
        list.annotate_by_options(
            AnnotateOrder::X,
            AnnotateAlgo::Incremental,
            0,
            &LockedUnitMap::new(),
            &ReferenceList::new(),
            false,
        );
    }

    #[test]
    fn test_smallest_free_number_below_existing() {
        let mut list: ReferenceList = vec![part("R5"), part("R?")].into();
        annotate_x(&mut list);

        let mut names = refs(&list);
        names.sort();
        assert_eq!(names, vec!["R1", "R5"]);
        assert!(list.iter().all(|r| !r.is_new));
    }

    #[test]
    fn test_unlocked_units_may_share_a_number() {
        let mut list: ReferenceList = vec![
            multi("U?", 1, 3, "LM324").with_position(0.0, 0.0),
            multi("U?", 2, 3, "LM324").with_position(10.0, 0.0),
            multi("U?", 3, 3, "LM324").with_position(20.0, 0.0),
        ]
        .into();
        annotate_x(&mut list);

        assert_eq!(refs(&list), vec!["U1A", "U1B", "U1C"]);
    }

    #[test]
    fn test_unlocked_same_unit_gets_next_number() {
        let mut list: ReferenceList = vec![
            multi("U?", 1, 2, "LM358").with_position(0.0, 0.0),
            multi("U?", 1, 2, "LM358").with_position(10.0, 0.0),
        ]
        .into();
        annotate_x(&mut list);

        assert_eq!(refs(&list), vec!["U1A", "U2A"]);
    }

    #[test]
    fn test_different_parts_never_share() {
        let mut list: ReferenceList = vec![
            multi("U?", 1, 2, "LM358").with_position(0.0, 0.0),
            multi("U?", 2, 2, "TL072").with_position(10.0, 0.0),
        ]
        .into();
        annotate_x(&mut list);

        assert_eq!(refs(&list), vec!["U1A", "U2B"]);
    }

    #[test]
    fn test_sheet_numbering_floor() {
        let mut list: ReferenceList = vec![
            part("R?").with_sheet(2, "/b"),
            part("R?").with_sheet(2, "/b").with_position(5.0, 0.0),
            part("R?").with_sheet(1, "/a"),
        ]
        .into();
        list.annotate_by_options(
            AnnotateOrder::X,
            AnnotateAlgo::SheetX100,
            0,
            &LockedUnitMap::new(),
            &ReferenceList::new(),
            false,
        );

        assert_eq!(refs(&list), vec!["R101", "R201", "R202"]);

        let mut list: ReferenceList = vec![part("C?").with_sheet(3, "/c")].into();
        list.annotate_by_options(
            AnnotateOrder::Y,
            AnnotateAlgo::SheetX1000,
            0,
            &LockedUnitMap::new(),
            &ReferenceList::new(),
            false,
        );
        assert_eq!(refs(&list), vec!["C3001"]);
    }

    #[test]
    fn test_start_number_offset() {
        let mut list: ReferenceList = vec![part("R?"), part("R?").with_position(1.0, 0.0)].into();
        list.annotate_by_options(
            AnnotateOrder::X,
            AnnotateAlgo::Incremental,
            10,
            &LockedUnitMap::new(),
            &ReferenceList::new(),
            false,
        );
        assert_eq!(refs(&list), vec!["R11", "R12"]);
    }

    #[test]
    fn test_additional_references_are_reserved_not_inserted() {
        let mut list: ReferenceList = vec![part("R?"), part("R?").with_position(1.0, 0.0)].into();
        let additional: ReferenceList = vec![part("R1"), part("R3"), part("C?")].into();

        list.annotate_by_options(
            AnnotateOrder::X,
            AnnotateAlgo::Incremental,
            0,
            &LockedUnitMap::new(),
            &additional,
            false,
        );

        assert_eq!(list.len(), 2);
        assert_eq!(refs(&list), vec!["R2", "R4"]);
        // the reservation list is untouched
        assert_eq!(additional[0].reference(), "R1");
    }

    #[test]
    fn test_locked_group_keeps_units_together() {
        let mut list: ReferenceList = vec![
            multi("U7", 1, 2, "LM358").with_position(0.0, 0.0),
            multi("U7", 2, 2, "LM358").with_position(50.0, 0.0),
            multi("U?", 1, 2, "LM358").with_position(10.0, 0.0),
        ]
        .into();
        list.reannotate_by_options(
            AnnotateOrder::X,
            AnnotateAlgo::Incremental,
            0,
            &ReferenceList::new(),
            false,
        );

        // unannotated U? sorts first, the locked pair follows as one package
        assert_eq!(refs(&list), vec!["U1A", "U2A", "U2B"]);
    }

    #[test]
    fn test_reannotate_compacts_numbers() {
        let mut list: ReferenceList = vec![
            multi("U5", 1, 2, "LM358").with_position(10.0, 0.0),
            multi("U5", 2, 2, "LM358").with_position(20.0, 0.0),
            multi("U2", 1, 2, "LM358").with_position(30.0, 0.0),
            part("R9"),
            part("R4"),
        ]
        .into();
        list.reannotate_by_options(
            AnnotateOrder::X,
            AnnotateAlgo::Incremental,
            0,
            &ReferenceList::new(),
            false,
        );

        assert_eq!(refs(&list), vec!["R1", "R2", "U1A", "U2A", "U2B"]);
    }

    #[test]
    fn test_locked_group_with_existing_duplicates() {
        // two packages both annotated U1; each unit may only be handed out once
        let mut list: ReferenceList = vec![
            multi("U1", 1, 2, "LM358").with_position(0.0, 0.0),
            multi("U1", 2, 2, "LM358").with_position(1.0, 0.0),
            multi("U1", 1, 2, "LM358").with_position(2.0, 0.0),
            multi("U1", 2, 2, "LM358").with_position(3.0, 0.0),
        ]
        .into();
        list.reannotate_by_options(
            AnnotateOrder::X,
            AnnotateAlgo::Incremental,
            0,
            &ReferenceList::new(),
            false,
        );

        let mut names = refs(&list);
        names.sort();
        assert_eq!(names, vec!["U1A", "U1B", "U2A", "U2B"]);
    }

    #[test]
    fn test_locked_duplicates_listed_against_position_order() {
        // both hold U1B; the group lists them opposite to the X order
        let mut list: ReferenceList = vec![
            multi("U1", 2, 2, "LM358").with_position(10.0, 0.0),
            multi("U1", 2, 2, "LM358").with_position(0.0, 0.0),
        ]
        .into();
        list.reannotate_by_options(
            AnnotateOrder::X,
            AnnotateAlgo::Incremental,
            0,
            &ReferenceList::new(),
            false,
        );

        assert_eq!(refs(&list), vec!["U1B", "U2B"]);
    }

    #[test]
    fn test_locked_duplicate_package_in_reverse_order() {
        let mut list: ReferenceList = vec![
            multi("U1", 2, 2, "LM358").with_position(30.0, 0.0),
            multi("U1", 1, 2, "LM358").with_position(20.0, 0.0),
            multi("U1", 2, 2, "LM358").with_position(10.0, 0.0),
            multi("U1", 1, 2, "LM358").with_position(0.0, 0.0),
        ]
        .into();
        list.reannotate_by_options(
            AnnotateOrder::X,
            AnnotateAlgo::Incremental,
            0,
            &ReferenceList::new(),
            false,
        );

        let mut names = refs(&list);
        names.sort();
        assert_eq!(names, vec!["U1A", "U1B", "U2A", "U2B"]);
    }

    #[test]
    fn test_start_number_at_upper_bound() {
        let mut list: ReferenceList = vec![part("R?")].into();
        list.annotate_by_options(
            AnnotateOrder::X,
            AnnotateAlgo::Incremental,
            i32::MAX,
            &LockedUnitMap::new(),
            &ReferenceList::new(),
            false,
        );

        assert_eq!(refs(&list), vec!["R2147483647"]);
    }

    #[test]
    fn test_reannotate_duplicates_against_existing() {
        let mut pasted: ReferenceList = vec![part("R1"), part("R2")].into();
        let existing: ReferenceList = vec![part("R1"), part("R2"), part("R3")].into();

        pasted.reannotate_duplicates(&existing);

        assert_eq!(refs(&pasted), vec!["R4", "R5"]);
    }

    #[test]
    fn test_start_at_current_raises_floor() {
        let mut list: ReferenceList = vec![part("R8"), part("R8")].into();
        list.reannotate_by_options(
            AnnotateOrder::Unsorted,
            AnnotateAlgo::Incremental,
            0,
            &ReferenceList::new(),
            true,
        );

        assert_eq!(refs(&list), vec!["R8", "R9"]);
    }

    #[test]
    fn test_build_locked_unit_map() {
        let list: ReferenceList = vec![
            multi("U3", 1, 2, "LM358"),
            multi("U3", 2, 2, "LM358"),
            multi("U?", 1, 2, "LM358"),
            part("R1"),
        ]
        .into();

        let locked = build_locked_unit_map(&list);
        assert_eq!(locked.len(), 1);
        assert_eq!(locked["U3"].len(), 2);
    }

    #[test]
    fn test_empty_list_is_noop() {
        let mut list = ReferenceList::new();
        annotate_x(&mut list);
        assert!(list.is_empty());
    }
}
