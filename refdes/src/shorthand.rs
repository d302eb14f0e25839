//! Compact reference summaries such as `R1-R3, R5`.

use crate::reference::Reference;

/// Collapse runs of consecutive numbers sharing a prefix.
///
/// A run of one prints as `R1`, a run of two as `R1, R2`, longer runs as a
/// range `R1-R4`. Records are taken in the given order.
pub fn shorthand(records: &[Reference]) -> String {
    let mut groups: Vec<String> = Vec::new();
    let mut i = 0;

    while i < records.len() {
        let prefix = records[i].reference();
        let number = records[i].number;

        let mut range = 1;
        while i + range < records.len()
            && records[i + range].reference() == prefix
            && number.checked_add(range as i32) == Some(records[i + range].number)
        {
            range += 1;
        }

        let first = &records[i];
        match range {
            1 => groups.push(first.full_ref()),
            2 => {
                groups.push(first.full_ref());
                groups.push(records[i + 1].full_ref());
            }
            _ => groups.push(format!("{}-{}", first.full_ref(), records[i + range - 1].full_ref())),
        }

        i += range;
    }

    groups.join(", ")
}
