//! Broad-phase spatial index.
//!
//! A uniform grid over world space. Each sprite's bounding box maps to an
//! inclusive range of cells; each occupied cell stores the sprite's id and
//! collision-class bitmask so queries can filter candidates before the AABB
//! and SAT tests run.
//!
//! Cells store their entries in a `BTreeMap` so candidate iteration is in
//! ascending sprite-id order; combined with row-major iteration over the cell
//! range, "first collision found" is deterministic rather than dependent on
//! hash-map insertion order.

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;

use crate::sprites::{ColBox, SpriteId};

/// Inclusive cell-coordinate range occupied by one bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRange {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

/// Uniform grid of cell → (sprite id → kind bitmask).
pub struct SpatialGrid {
    pub cell_w: f32,
    pub cell_h: f32,
    cells: FxHashMap<(i32, i32), BTreeMap<SpriteId, u32>>,
}

impl SpatialGrid {
    pub fn new(cell_w: f32, cell_h: f32) -> Self {
        Self {
            cell_w,
            cell_h,
            cells: FxHashMap::default(),
        }
    }

    /// Cell range covered by a bounding box (floor division of the box
    /// edges, inclusive on both ends).
    pub fn range_for(&self, b: &ColBox) -> CellRange {
        let (min, max) = b.bounds();
        CellRange {
            x1: (min.x / self.cell_w).floor() as i32,
            y1: (min.y / self.cell_h).floor() as i32,
            x2: (max.x / self.cell_w).floor() as i32,
            y2: (max.y / self.cell_h).floor() as i32,
        }
    }

    /// Cell range covered by a view rectangle anchored at its top-left.
    pub fn range_for_view(&self, x: f32, y: f32, w: f32, h: f32) -> CellRange {
        CellRange {
            x1: (x / self.cell_w).floor() as i32,
            y1: (y / self.cell_h).floor() as i32,
            x2: ((x + w) / self.cell_w).floor() as i32,
            y2: ((y + h) / self.cell_h).floor() as i32,
        }
    }

    /// Insert a sprite into every cell of `range`.
    pub fn add(&mut self, range: CellRange, id: SpriteId, kind: u32) {
        for y in range.y1..=range.y2 {
            for x in range.x1..=range.x2 {
                self.cells.entry((x, y)).or_default().insert(id, kind);
            }
        }
    }

    /// Remove a sprite from every cell of `range`. Touches only those cells.
    pub fn del(&mut self, range: CellRange, id: SpriteId) {
        for y in range.y1..=range.y2 {
            for x in range.x1..=range.x2 {
                if let Some(cell) = self.cells.get_mut(&(x, y)) {
                    cell.remove(&id);
                    if cell.is_empty() {
                        self.cells.remove(&(x, y));
                    }
                }
            }
        }
    }

    /// The entries of one cell, if occupied.
    pub fn cell(&self, x: i32, y: i32) -> Option<&BTreeMap<SpriteId, u32>> {
        self.cells.get(&(x, y))
    }

    /// True when no cell holds any sprite.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Number of occupied cells.
    pub fn occupied_cells(&self) -> usize {
        self.cells.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boxed(x: f32, y: f32, w: f32, h: f32) -> ColBox {
        ColBox {
            x,
            y,
            cx: w / 2.0,
            cy: h / 2.0,
            w,
            h,
        }
    }

    #[test]
    fn small_box_occupies_one_cell() {
        let grid = SpatialGrid::new(400.0, 400.0);
        let r = grid.range_for(&boxed(50.0, 50.0, 20.0, 20.0));
        assert_eq!(r, CellRange { x1: 0, y1: 0, x2: 0, y2: 0 });
    }

    #[test]
    fn box_spanning_cell_edge_occupies_both() {
        let grid = SpatialGrid::new(400.0, 400.0);
        let r = grid.range_for(&boxed(400.0, 50.0, 20.0, 20.0));
        assert_eq!(r, CellRange { x1: 0, y1: 0, x2: 1, y2: 0 });
    }

    #[test]
    fn negative_coordinates_floor_toward_negative_cells() {
        let grid = SpatialGrid::new(400.0, 400.0);
        let r = grid.range_for(&boxed(-50.0, -50.0, 20.0, 20.0));
        assert_eq!(r, CellRange { x1: -1, y1: -1, x2: -1, y2: -1 });
    }

    #[test]
    fn add_then_del_leaves_grid_empty() {
        let mut grid = SpatialGrid::new(400.0, 400.0);
        let range = CellRange { x1: -1, y1: 0, x2: 1, y2: 2 };
        grid.add(range, SpriteId(1), 1);
        assert_eq!(grid.occupied_cells(), 9);
        grid.del(range, SpriteId(1));
        assert!(grid.is_empty());
    }

    #[test]
    fn cell_iteration_is_in_ascending_id_order() {
        let mut grid = SpatialGrid::new(400.0, 400.0);
        let range = CellRange { x1: 0, y1: 0, x2: 0, y2: 0 };
        grid.add(range, SpriteId(9), 1);
        grid.add(range, SpriteId(3), 1);
        grid.add(range, SpriteId(7), 1);

        let ids: Vec<u64> = grid.cell(0, 0).unwrap().keys().map(|id| id.0).collect();
        assert_eq!(ids, vec![3, 7, 9]);
    }
}
