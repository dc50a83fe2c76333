pub mod occupancy;

pub use occupancy::{footprint_cells, OccupancyGrid};
