pub mod flat;
pub mod weighted;

use crate::{config::SchedConfig, core::Priority};
use std::time::Duration;

pub use flat::FlatSlice;
pub use weighted::WeightedSlice;

/// Maps a priority level to the length of a dispatch cycle.
pub trait SlicePolicy: Send {
    fn init(config: &SchedConfig) -> Self
    where
        Self: Sized;

    fn name(&self) -> &'static str;

    fn quantum(&self, priority: Priority) -> Duration;
}
