pub mod models;
pub mod occupancy;
pub mod sync_plan;
