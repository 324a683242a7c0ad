//! Output formatting module.

pub mod plan;
pub mod table;

pub use plan::{print_completion, print_data_plane_warning, print_plan};
pub use table::print_applications;
