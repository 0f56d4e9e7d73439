#![forbid(unsafe_code)]

//! Vertical compaction ("gravity").
//!
//! Items are visited by ascending `y` (ties keep list order) and each one is
//! pulled up a row at a time for as long as the cell above is a valid
//! position. An item can only be blocked by items above it, and those have
//! already settled when it is visited, so one pass reaches the fixed point.
//!
//! # Invariants
//!
//! 1. No item's `y` increases.
//! 2. No item is moved to an invalid position; items that are already
//!    invalid (out of bounds) stay where they are.
//! 3. `compact(compact(items)) == compact(items)`.
//! 4. List order is preserved.

use tessera_core::GridRect;

use crate::item::GridItem;
use crate::placement::Placement;

/// Compact `items` in place. Returns how many items moved.
pub fn compact_in_place(items: &mut [GridItem], columns: u16) -> usize {
    let mut order: Vec<usize> = (0..items.len()).collect();
    order.sort_by_key(|&i| items[i].y);

    let mut moved = 0;
    for i in order {
        let start = items[i].rect();
        let mut rect = start;
        while rect.y > 0 {
            let candidate = GridRect::new(rect.x, rect.y - 1, rect.w, rect.h);
            let placement = Placement::new(items, columns);
            if !placement.is_valid_position(candidate, Some(items[i].id.as_str())) {
                break;
            }
            rect = candidate;
        }
        if rect != start {
            items[i].y = rect.y;
            moved += 1;
        }
    }
    moved
}

/// Return a compacted copy of `items`.
#[must_use]
pub fn compact(items: &[GridItem], columns: u16) -> Vec<GridItem> {
    let mut out = items.to_vec();
    compact_in_place(&mut out, columns);
    out
}
