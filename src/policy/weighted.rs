use super::SlicePolicy;
use crate::{config::SchedConfig, core::Priority};
use std::time::Duration;

/// Slice weights in percent of the base quantum, indexed by `priority - 1`.
pub const WEIGHTS_PCT: [u32; 4] = [100, 125, 150, 200];

/// Longer slices for higher levels. Since higher levels also dispatch
/// first, the favoured level gets both the earlier turn and the longer one.
pub struct WeightedSlice {
    base: Duration,
}

impl WeightedSlice {
    pub fn new(base: Duration) -> Self {
        Self { base }
    }
}

impl SlicePolicy for WeightedSlice {
    fn init(config: &SchedConfig) -> Self {
        Self::new(config.base_quantum())
    }

    fn name(&self) -> &'static str {
        "weighted"
    }

    fn quantum(&self, priority: Priority) -> Duration {
        let weight = WEIGHTS_PCT[(priority.get() - 1) as usize];
        self.base * weight / 100
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantum_table() {
        let policy = WeightedSlice::new(Duration::from_millis(10));
        let slices: Vec<_> = Priority::all().map(|p| policy.quantum(p)).collect();
        assert_eq!(
            slices,
            vec![
                Duration::from_millis(10),
                Duration::from_micros(12_500),
                Duration::from_millis(15),
                Duration::from_millis(20),
            ]
        );
    }

    #[test]
    fn init_uses_configured_base() {
        let config = SchedConfig {
            base_quantum_ms: 40,
            ..SchedConfig::default()
        };
        let policy = WeightedSlice::init(&config);
        assert_eq!(policy.quantum(Priority::MAX), Duration::from_millis(80));
    }
}
