//! Deferred occupancy protocol
//!
//! The occupancy grid is the one structure contended between simulation
//! worker threads. It is protected by discipline, not locks: during a
//! parallelized phase a worker may only touch its own feature, so block and
//! unblock requests land in the feature's private pending list. The single
//! barrier thread drains every list once per step, in feature id order,
//! applying each feature's operations in the order they were issued. Other
//! threads therefore observe either the grid from before the step or the
//! net, in-order effect after it, never a partial state.

use crate::spatial::OccupancyGrid;

use super::Feature;

/// One queued occupancy mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingOp {
    /// (Re-)register the footprint at the feature's position at drain time
    Block,
    /// Release the footprint
    Unblock,
}

/// Whether the caller may touch the shared occupancy grid right now
pub enum GridAccess<'a> {
    /// Not inside a parallel phase: operations apply immediately
    Direct(&'a mut OccupancyGrid),
    /// Inside a parallel phase: operations wait for the step barrier
    Deferred,
}

impl Feature {
    /// Mark the footprint in the occupancy grid
    pub fn queue_block(&mut self, access: GridAccess<'_>) {
        self.queue_block_deferred();
        if let GridAccess::Direct(grid) = access {
            self.drain_pending(grid);
        }
    }

    /// Clear the footprint from the occupancy grid
    pub fn queue_unblock(&mut self, access: GridAccess<'_>) {
        self.queue_unblock_deferred();
        if let GridAccess::Direct(grid) = access {
            self.drain_pending(grid);
        }
    }

    pub(crate) fn queue_block_deferred(&mut self) {
        self.pending_ops.push(PendingOp::Block);
    }

    pub(crate) fn queue_unblock_deferred(&mut self) {
        self.pending_ops.push(PendingOp::Unblock);
    }

    pub fn has_pending_ops(&self) -> bool {
        !self.pending_ops.is_empty()
    }

    /// Apply and clear this feature's queued operations, in issue order
    ///
    /// Called exactly once per feature per step, only from the barrier after
    /// all parallel work has finished (or inline from `queue_*` when the
    /// caller holds direct grid access).
    pub fn drain_pending(&mut self, grid: &mut OccupancyGrid) {
        if self.pending_ops.is_empty() {
            return;
        }
        for op in std::mem::take(&mut self.pending_ops) {
            match op {
                PendingOp::Block => {
                    if self.def.block_movement {
                        let cells = self.footprint(grid);
                        grid.register(self.blocking_id(), cells);
                    }
                }
                PendingOp::Unblock => {
                    grid.unregister(self.blocking_id());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{test_def, test_feature};
    use super::*;

    #[test]
    fn test_direct_access_applies_immediately() {
        let mut grid = OccupancyGrid::new();
        let mut f = test_feature(test_def("rock"));

        f.queue_block(GridAccess::Direct(&mut grid));
        assert!(grid.is_registered(f.blocking_id()));
        assert!(grid.is_blocked(0, 0));

        f.queue_unblock(GridAccess::Direct(&mut grid));
        assert!(!grid.is_registered(f.blocking_id()));
    }

    #[test]
    fn test_deferred_ops_invisible_until_drain() {
        let mut grid = OccupancyGrid::new();
        let mut f = test_feature(test_def("rock"));

        f.queue_block(GridAccess::Deferred);
        f.queue_unblock(GridAccess::Deferred);
        f.queue_block(GridAccess::Deferred);

        // A concurrent reader during the step sees the pre-step grid.
        assert_eq!(grid.blocked_cell_count(), 0);
        assert!(f.has_pending_ops());

        f.drain_pending(&mut grid);
        // Net in-order effect: the final Block wins.
        assert!(grid.is_registered(f.blocking_id()));
        assert!(!f.has_pending_ops());
    }

    #[test]
    fn test_net_effect_ends_unblocked() {
        let mut grid = OccupancyGrid::new();
        let mut f = test_feature(test_def("rock"));

        f.queue_block(GridAccess::Deferred);
        f.queue_unblock(GridAccess::Deferred);
        f.drain_pending(&mut grid);

        assert!(!grid.is_registered(f.blocking_id()));
        assert_eq!(grid.blocked_cell_count(), 0);
    }

    #[test]
    fn test_drain_is_idempotent_after_clearing() {
        let mut grid = OccupancyGrid::new();
        let mut f = test_feature(test_def("rock"));

        f.queue_block(GridAccess::Deferred);
        f.drain_pending(&mut grid);
        let cells = grid.blocked_cell_count();

        // Nothing queued: a second drain must not duplicate anything.
        f.drain_pending(&mut grid);
        assert_eq!(grid.blocked_cell_count(), cells);
    }

    #[test]
    fn test_non_blocking_def_never_registers() {
        let mut grid = OccupancyGrid::new();
        let mut def = test_def("shrub");
        def.block_movement = false;
        let mut f = test_feature(def);

        f.queue_block(GridAccess::Direct(&mut grid));
        assert!(!grid.is_registered(f.blocking_id()));
        assert_eq!(grid.blocked_cell_count(), 0);
    }

    #[test]
    fn test_block_registers_at_drain_time_position() {
        let mut grid = OccupancyGrid::new();
        let mut f = test_feature(test_def("rock"));

        f.queue_block(GridAccess::Deferred);
        // Feature moves before the barrier runs; the drain must use the
        // position at drain time.
        f.set_position(glam::Vec3::new(10.0, 0.0, 10.0), 0.0, true);
        f.drain_pending(&mut grid);

        assert!(grid.is_blocked(10, 10));
        assert!(!grid.is_blocked(0, 0));
    }
}
