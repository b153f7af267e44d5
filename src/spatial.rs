//! Uniform grid index for candidate lookups in the ground plane
//!
//! Items are stored in every cell their bounding box overlaps. Queries
//! return all items of the cells overlapping the query rectangle, so callers
//! must re-check the exact geometry of each candidate.

use glam::DVec2;

use crate::geometry::{Bounded, Rect};

/// Uniform grid over a fixed rectangle of the ground plane
///
/// Positions outside the indexed rectangle are served by the nearest
/// boundary cells rather than rejected.
///
/// # Performance
///
/// - Insertion: O(cells covered by the item's bounding box)
/// - Probe: O(cells covered by the query + candidates returned)
/// - Built once per conversion run, there is no removal
///
/// # Example
///
/// ```
/// use scene_elevation::{IndexGrid, KnownSite, Rect};
///
/// let mut grid = IndexGrid::new(Rect::new(0.0, 0.0, 100.0, 100.0), 10, 10);
/// grid.insert(KnownSite::new(15.0, 15.0, 3.0));
/// grid.insert(KnownSite::new(85.0, 85.0, 7.0));
///
/// let hits: Vec<_> = grid.probe(Rect::new(10.0, 10.0, 20.0, 20.0)).collect();
/// assert_eq!(hits.len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct IndexGrid<T> {
    bounds: Rect,
    cell_count_x: usize,
    cell_count_z: usize,
    cell_size_x: f64,
    cell_size_z: f64,
    cells: Vec<Vec<T>>,
}

impl<T> IndexGrid<T> {
    /// Create an empty grid with a fixed number of cells per axis
    ///
    /// Cell counts below 1 are raised to 1.
    pub fn new(bounds: Rect, cell_count_x: usize, cell_count_z: usize) -> Self {
        let cell_count_x = cell_count_x.max(1);
        let cell_count_z = cell_count_z.max(1);

        let cell_size = |size: f64, count: usize| {
            let s = size / count as f64;
            if s > 0.0 && s.is_finite() { s } else { 1.0 }
        };

        Self {
            bounds,
            cell_count_x,
            cell_count_z,
            cell_size_x: cell_size(bounds.size_x(), cell_count_x),
            cell_size_z: cell_size(bounds.size_z(), cell_count_z),
            cells: (0..cell_count_x * cell_count_z).map(|_| Vec::new()).collect(),
        }
    }

    /// Create an empty grid whose cells are at most roughly the given size
    pub fn with_cell_size(bounds: Rect, approx_cell_size_x: f64, approx_cell_size_z: f64) -> Self {
        let count = |size: f64, cell: f64| {
            if cell > 0.0 && size.is_finite() {
                (size / cell) as usize + 1
            } else {
                1
            }
        };
        Self::new(
            bounds,
            count(bounds.size_x(), approx_cell_size_x),
            count(bounds.size_z(), approx_cell_size_z),
        )
    }

    #[inline]
    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    #[inline]
    pub fn cell_counts(&self) -> (usize, usize) {
        (self.cell_count_x, self.cell_count_z)
    }

    /// Extent of a single cell along X and Z
    #[inline]
    pub fn cell_size(&self) -> DVec2 {
        DVec2::new(self.cell_size_x, self.cell_size_z)
    }

    /// Cell coordinates of a position, clamped to the grid
    pub fn cell_coords(&self, pos: DVec2) -> (usize, usize) {
        (
            Self::clamp_cell((pos.x - self.bounds.min_x) / self.cell_size_x, self.cell_count_x),
            Self::clamp_cell((pos.y - self.bounds.min_z) / self.cell_size_z, self.cell_count_z),
        )
    }

    fn clamp_cell(offset: f64, count: usize) -> usize {
        // NaN maps to 0 through the saturating cast
        (offset.floor().max(0.0) as usize).min(count - 1)
    }

    /// Items stored in a single cell
    pub fn cell(&self, cell_x: usize, cell_z: usize) -> &[T] {
        if cell_x >= self.cell_count_x || cell_z >= self.cell_count_z {
            return &[];
        }
        &self.cells[cell_x * self.cell_count_z + cell_z]
    }

    /// Items of the cells within `radius` cells of the cell containing `pos`
    ///
    /// A radius of 1 yields the 3×3 neighborhood.
    pub fn neighborhood(&self, pos: DVec2, radius: usize) -> impl Iterator<Item = &T> + '_ {
        let (cx, cz) = self.cell_coords(pos);
        let x_range = cx.saturating_sub(radius)..=(cx + radius).min(self.cell_count_x - 1);
        let z_range = cz.saturating_sub(radius)..=(cz + radius).min(self.cell_count_z - 1);

        x_range.flat_map(move |x| {
            z_range
                .clone()
                .flat_map(move |z| self.cell(x, z).iter())
        })
    }

    /// Candidate items for a query rectangle
    ///
    /// Items spanning several cells are returned once per overlapped cell.
    pub fn probe(&self, query: Rect) -> impl Iterator<Item = &T> + '_ {
        let (min_x, min_z) = self.cell_coords(DVec2::new(query.min_x, query.min_z));
        let (max_x, max_z) = self.cell_coords(DVec2::new(query.max_x, query.max_z));

        (min_x..=max_x).flat_map(move |x| (min_z..=max_z).flat_map(move |z| self.cell(x, z).iter()))
    }

    /// Number of stored item references (items spanning several cells count multiple times)
    pub fn entry_count(&self) -> usize {
        self.cells.iter().map(Vec::len).sum()
    }
}

impl<T: Bounded + Clone> IndexGrid<T> {
    /// Add an item to every cell its bounding box overlaps
    pub fn insert(&mut self, item: T) {
        let bbox = item.bounding_box();
        let (min_x, min_z) = self.cell_coords(DVec2::new(bbox.min_x, bbox.min_z));
        let (max_x, max_z) = self.cell_coords(DVec2::new(bbox.max_x, bbox.max_z));

        for x in min_x..=max_x {
            for z in min_z..=max_z {
                self.cells[x * self.cell_count_z + z].push(item.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Item(Rect);

    impl Bounded for Item {
        fn bounding_box(&self) -> Rect {
            self.0
        }
    }

    fn grid() -> IndexGrid<Item> {
        IndexGrid::new(Rect::new(0.0, 0.0, 100.0, 100.0), 10, 10)
    }

    #[test]
    fn test_cell_coords_are_clamped() {
        let grid = grid();
        assert_eq!(grid.cell_coords(DVec2::new(15.0, 95.0)), (1, 9));
        assert_eq!(grid.cell_coords(DVec2::new(-500.0, 1e9)), (0, 9));
        assert_eq!(grid.cell_coords(DVec2::new(100.0, 100.0)), (9, 9));
        assert_eq!(grid.cell_coords(DVec2::new(f64::NAN, 5.0)), (0, 0));
    }

    #[test]
    fn test_item_lands_in_all_overlapped_cells() {
        let mut grid = grid();
        grid.insert(Item(Rect::new(5.0, 5.0, 25.0, 15.0)));
        assert_eq!(grid.entry_count(), 3 * 2);
        assert_eq!(grid.cell(2, 1).len(), 1);
        assert!(grid.cell(3, 1).is_empty());
    }

    #[test]
    fn test_probe_returns_candidates() {
        let mut grid = grid();
        let near = Item(Rect::new(41.0, 41.0, 42.0, 42.0));
        let far = Item(Rect::new(91.0, 91.0, 92.0, 92.0));
        grid.insert(near.clone());
        grid.insert(far);

        let hits: Vec<&Item> = grid.probe(Rect::new(35.0, 35.0, 45.0, 45.0)).collect();
        assert_eq!(hits, vec![&near]);
    }

    #[test]
    fn test_outside_items_use_boundary_cells() {
        let mut grid = grid();
        grid.insert(Item(Rect::new(150.0, 150.0, 160.0, 160.0)));
        assert_eq!(grid.cell(9, 9).len(), 1);
        assert_eq!(grid.probe(Rect::new(200.0, 200.0, 210.0, 210.0)).count(), 1);
    }

    #[test]
    fn test_neighborhood() {
        let mut grid = grid();
        grid.insert(Item(Rect::new(15.0, 15.0, 15.0, 15.0)));
        grid.insert(Item(Rect::new(35.0, 35.0, 35.0, 35.0)));

        assert_eq!(grid.neighborhood(DVec2::new(25.0, 25.0), 1).count(), 2);
        assert_eq!(grid.neighborhood(DVec2::new(5.0, 5.0), 1).count(), 1);
        assert_eq!(grid.neighborhood(DVec2::new(5.0, 5.0), 0).count(), 0);
    }

    #[test]
    fn test_with_cell_size() {
        let grid: IndexGrid<Item> =
            IndexGrid::with_cell_size(Rect::new(0.0, 0.0, 1000.0, 450.0), 300.0, 300.0);
        assert_eq!(grid.cell_counts(), (4, 2));
        assert_eq!(grid.cell_size(), DVec2::new(250.0, 225.0));
    }

    #[test]
    fn test_degenerate_bounds() {
        let mut grid: IndexGrid<Item> = IndexGrid::new(Rect::new(5.0, 5.0, 5.0, 5.0), 4, 4);
        grid.insert(Item(Rect::new(5.0, 5.0, 5.0, 5.0)));
        assert_eq!(grid.probe(Rect::new(5.0, 5.0, 5.0, 5.0)).count(), 1);
    }
}
