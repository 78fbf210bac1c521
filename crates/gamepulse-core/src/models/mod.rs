//! Data models for GamePulse

mod chart;
mod intent;
mod metric;
mod platform;
mod table;
mod usage;

pub use chart::*;
pub use intent::*;
pub use metric::*;
pub use platform::*;
pub use table::*;
pub use usage::*;
