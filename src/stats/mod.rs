//! Column statistics used for cost-based planning.

mod histogram;
mod string_histogram;
mod table_stats;

pub use histogram::IntHistogram;
pub use string_histogram::StringHistogram;
pub use table_stats::{Histogram, StatsRegistry, TableStats};
