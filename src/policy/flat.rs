use super::SlicePolicy;
use crate::{config::SchedConfig, core::Priority};
use std::time::Duration;

/// Every level gets the base quantum.
pub struct FlatSlice {
    base: Duration,
}

impl SlicePolicy for FlatSlice {
    fn init(config: &SchedConfig) -> Self {
        Self {
            base: config.base_quantum(),
        }
    }

    fn name(&self) -> &'static str {
        "flat"
    }

    fn quantum(&self, _priority: Priority) -> Duration {
        self.base
    }
}
