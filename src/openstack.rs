//! Release model: release sequence, series support windows and the static
//! workload compatibility table.

pub mod catalog;
pub mod release;

pub use catalog::Catalog;
pub use release::Release;
