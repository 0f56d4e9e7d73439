#![forbid(unsafe_code)]

//! Layout checksums and ASCII grid rendering.
//!
//! A checksum covers the canonical item list and every breakpoint
//! projection, serialized as JSON. Projections are keyed by breakpoint name
//! in a sorted map, so the encoding (and the checksum) is deterministic.
//!
//! ```text
//! aaabbbbbbbbb
//! ...bbbbbbbbb
//! cccccc......
//! ```

use std::fmt::Write as _;

use serde::Serialize;
use tessera_layout::{GridItem, LayoutEntry, Layouts};

/// Prefix identifying the hash function in checksum strings.
pub const CHECKSUM_PREFIX: &str = "blake3:";

#[derive(Serialize)]
struct ChecksumInput<'a> {
    items: &'a [GridItem],
    layouts: &'a Layouts,
}

/// Checksum of a canonical list plus its projections.
pub fn layout_checksum(items: &[GridItem], layouts: &Layouts) -> crate::Result<String> {
    let bytes = serde_json::to_vec(&ChecksumInput { items, layouts })?;
    let hash = blake3::hash(&bytes);
    Ok(format!("{CHECKSUM_PREFIX}{}", hash.to_hex()))
}

/// Glyph for the `index`-th entry: `a..z`, `A..Z`, `0..9`, then `#`.
fn glyph(index: usize) -> char {
    const GLYPHS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    GLYPHS.get(index).map_or('#', |&b| char::from(b))
}

/// Render `entries` as a `columns`-wide character grid, one line per row.
///
/// Empty cells are `.`; cells covered by more than one entry are `!`.
pub fn render_grid(entries: &[LayoutEntry], columns: u16) -> String {
    let width = usize::from(columns);
    let height = entries
        .iter()
        .map(|e| usize::from(e.y) + usize::from(e.h))
        .max()
        .unwrap_or(0);
    let mut cells = vec!['.'; width * height];

    for (index, entry) in entries.iter().enumerate() {
        let mark = glyph(index);
        for row in usize::from(entry.y)..usize::from(entry.y) + usize::from(entry.h) {
            for col in usize::from(entry.x)..usize::from(entry.x) + usize::from(entry.w) {
                if col >= width {
                    continue;
                }
                let cell = &mut cells[row * width + col];
                *cell = if *cell == '.' { mark } else { '!' };
            }
        }
    }

    let mut out = String::with_capacity((width + 1) * height);
    for row in cells.chunks(width.max(1)) {
        out.extend(row);
        out.push('\n');
    }
    out
}

/// Render a legend mapping glyphs to item ids.
pub fn render_legend(entries: &[LayoutEntry]) -> String {
    let mut out = String::new();
    for (index, entry) in entries.iter().enumerate() {
        let _ = writeln!(
            out,
            "  {} {} {}x{}@({},{})",
            glyph(index),
            entry.item_id,
            entry.w,
            entry.h,
            entry.x,
            entry.y
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_layout::{BreakpointTable, GridRect, project, standard_breakpoints, to_layouts};

    fn items() -> Vec<GridItem> {
        vec![
            GridItem::new("a", "t", GridRect::new(0, 0, 3, 1)),
            GridItem::new("b", "t", GridRect::new(3, 0, 9, 2)),
            GridItem::new("c", "t", GridRect::new(0, 2, 6, 1)),
        ]
    }

    #[test]
    fn renders_tiles_and_gaps() {
        let bp = tessera_layout::Breakpoint::new("lg", 1200, 12);
        let grid = render_grid(&project(&items(), &bp, 10), 12);
        assert_eq!(grid, "aaabbbbbbbbb\n...bbbbbbbbb\ncccccc......\n");
    }

    #[test]
    fn empty_layout_renders_nothing() {
        assert_eq!(render_grid(&[], 12), "");
    }

    #[test]
    fn overlapping_cells_are_flagged() {
        let bp = tessera_layout::Breakpoint::new("lg", 1200, 12);
        let mut entries = project(&items(), &bp, 10);
        entries[2].y = 1;
        entries[2].x = 2;
        let grid = render_grid(&entries, 12);
        assert!(grid.contains('!'));
    }

    #[test]
    fn checksum_is_stable_and_sensitive() {
        let table = BreakpointTable::new(standard_breakpoints(), 12);
        let list = items();
        let first = layout_checksum(&list, &to_layouts(&list, &table, 10)).unwrap();
        let again = layout_checksum(&list, &to_layouts(&list, &table, 10)).unwrap();
        assert_eq!(first, again);
        assert!(first.starts_with(CHECKSUM_PREFIX));
        assert_eq!(first.len(), CHECKSUM_PREFIX.len() + 64);

        let mut moved = list.clone();
        moved[2].x = 1;
        let other = layout_checksum(&moved, &to_layouts(&moved, &table, 10)).unwrap();
        assert_ne!(first, other);
    }

    #[test]
    fn legend_lists_every_entry() {
        let bp = tessera_layout::Breakpoint::new("lg", 1200, 12);
        let legend = render_legend(&project(&items(), &bp, 10));
        assert_eq!(legend.lines().count(), 3);
        assert!(legend.contains("b b 9x2@(3,0)"));
    }
}
