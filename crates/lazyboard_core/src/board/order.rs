//! Manual ordering keys within one column.
//!
//! Keys are real numbers; larger keys are displayed first and equal keys fall
//! back to creation time, newest first. Inserting between two siblings
//! renumbers the tail of the column in unit steps instead of allocating
//! fractional keys.

use crate::config::{SortField, SortSpec};
use crate::model::mutation::MutationOp;
use crate::model::note::NoteRecord;
use std::cmp::Ordering;

/// Computes order updates for inserting `moved_id` at `target_index`.
///
/// `dest` must be the destination column in display order, without the
/// moved note. The moved note's update comes first, followed by any
/// renumbered siblings in list order.
pub fn compute_order_updates(
    dest: &[NoteRecord],
    moved_id: &str,
    target_index: usize,
) -> Vec<MutationOp> {
    let (first, last) = match (dest.first(), dest.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return Vec::new(),
    };

    if target_index == 0 {
        return vec![MutationOp::set_order(moved_id, first.order + 1.0)];
    }
    if target_index >= dest.len() {
        return vec![MutationOp::set_order(moved_id, last.order - 1.0)];
    }

    let new_order = dest[target_index - 1].order - 1.0;
    let mut updates = Vec::with_capacity(dest.len() - target_index + 1);
    updates.push(MutationOp::set_order(moved_id, new_order));
    let mut next = new_order;
    for note in &dest[target_index..] {
        next -= 1.0;
        updates.push(MutationOp::set_order(&note.id, next));
    }
    updates
}

/// Display comparator: `order` descending, then `created_ms` descending.
pub fn display_order(a: &NoteRecord, b: &NoteRecord) -> Ordering {
    b.order
        .total_cmp(&a.order)
        .then_with(|| b.created_ms.cmp(&a.created_ms))
}

/// Sorts notes in place for display, by `sort` when given.
pub fn sort_for_display(notes: &mut [NoteRecord], sort: Option<&SortSpec>) {
    match sort {
        None => notes.sort_by(display_order),
        Some(spec) => notes.sort_by(|a, b| {
            let ordering = match spec.field {
                SortField::CreatedTime => a.created_ms.cmp(&b.created_ms),
                SortField::Title => a
                    .title
                    .to_lowercase()
                    .cmp(&b.title.to_lowercase())
                    .then_with(|| a.title.cmp(&b.title)),
            };
            if spec.descending {
                ordering.reverse()
            } else {
                ordering
            }
        }),
    }
}
