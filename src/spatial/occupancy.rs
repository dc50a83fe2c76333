//! Shared occupancy grid for collision and pathing
//!
//! Tracks which map cells are physically blocked, keyed by who blocks them.
//! Registrations are reference-counted per cell: two overlapping footprints
//! leave a cell blocked until both are gone.
//!
//! The grid itself is not thread-safe; during parallelized phases all writes
//! go through the per-feature deferred-operation queues and land here only
//! at the step barrier.

use ahash::AHashMap;
use glam::Vec3;

use crate::core::types::BlockingId;

/// Grid cell coordinate (x, z)
pub type Cell = (i32, i32);

/// Cells covered by a footprint of the given extent centered on a cell
///
/// Extents are in cells; even extents bias toward negative coordinates the
/// same way on every participant.
pub fn footprint_cells(center: Cell, extent_x: u32, extent_z: u32) -> Vec<Cell> {
    let (cx, cz) = center;
    let half_x = (extent_x / 2) as i32;
    let half_z = (extent_z / 2) as i32;
    let mut cells = Vec::with_capacity((extent_x * extent_z) as usize);
    for dz in 0..extent_z as i32 {
        for dx in 0..extent_x as i32 {
            cells.push((cx - half_x + dx, cz - half_z + dz));
        }
    }
    cells
}

/// Set of blocked grid cells, keyed by registered footprints
#[derive(Debug, Clone)]
pub struct OccupancyGrid {
    /// Number of registered footprints covering each cell
    cells: AHashMap<Cell, u32>,
    /// Cells claimed by each registration, for exact release
    footprints: AHashMap<BlockingId, Vec<Cell>>,
    cell_size: f32,
}

impl OccupancyGrid {
    /// Create a grid with default cell size of 1.0
    pub fn new() -> Self {
        Self::with_cell_size(1.0)
    }

    pub fn with_cell_size(cell_size: f32) -> Self {
        Self {
            cells: AHashMap::new(),
            footprints: AHashMap::new(),
            cell_size,
        }
    }

    /// Register a footprint, replacing any previous registration for the id
    pub fn register(&mut self, id: BlockingId, cells: Vec<Cell>) {
        self.unregister(id);
        for cell in &cells {
            *self.cells.entry(*cell).or_insert(0) += 1;
        }
        self.footprints.insert(id, cells);
    }

    /// Release a footprint; returns whether the id was registered
    pub fn unregister(&mut self, id: BlockingId) -> bool {
        let Some(cells) = self.footprints.remove(&id) else {
            return false;
        };
        for cell in cells {
            if let Some(count) = self.cells.get_mut(&cell) {
                *count -= 1;
                if *count == 0 {
                    self.cells.remove(&cell);
                }
            }
        }
        true
    }

    pub fn is_registered(&self, id: BlockingId) -> bool {
        self.footprints.contains_key(&id)
    }

    /// Check if a cell is blocked by any registration
    pub fn is_blocked(&self, x: i32, z: i32) -> bool {
        self.cells.contains_key(&(x, z))
    }

    /// Check if a world position is blocked
    pub fn is_position_blocked(&self, pos: Vec3) -> bool {
        let (x, z) = self.world_to_cell(pos);
        self.is_blocked(x, z)
    }

    /// Convert a world position to cell coordinates on the ground plane
    pub fn world_to_cell(&self, pos: Vec3) -> Cell {
        let x = (pos.x / self.cell_size).floor() as i32;
        let z = (pos.z / self.cell_size).floor() as i32;
        (x, z)
    }

    /// Number of distinct blocked cells
    pub fn blocked_cell_count(&self) -> usize {
        self.cells.len()
    }
}

impl Default for OccupancyGrid {
    fn default() -> Self {
        Self::new()
    }
}
