//! Repository traits for metadata operations.

pub mod catalog;
pub mod sweeps;

pub use catalog::CatalogRepo;
pub use sweeps::SweepRepo;
