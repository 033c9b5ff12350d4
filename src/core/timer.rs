use crossbeam_channel::{after, Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

/// One-shot quantum timer. Expiry is delivered on a channel, so a waiter
/// wakes as soon as the quantum ends instead of sleeping past it.
pub struct QuantumTimer {
    deadline: Instant,
    fired: Receiver<Instant>,
}

impl QuantumTimer {
    pub fn arm(quantum: Duration) -> Self {
        Self {
            deadline: Instant::now() + quantum,
            fired: after(quantum),
        }
    }

    pub fn expired(&self) -> bool {
        !self.fired.is_empty() || Instant::now() >= self.deadline
    }

    /// Blocks for at most `step`; true once the quantum is over.
    pub fn wait(&self, step: Duration) -> bool {
        match self.fired.recv_timeout(step) {
            Ok(_) | Err(RecvTimeoutError::Disconnected) => true,
            Err(RecvTimeoutError::Timeout) => self.expired(),
        }
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_once_the_quantum_elapses() {
        let start = Instant::now();
        let timer = QuantumTimer::arm(Duration::from_millis(15));
        assert!(!timer.expired());
        while !timer.wait(Duration::from_millis(1)) {}
        assert!(start.elapsed() >= Duration::from_millis(15));
        assert!(timer.expired());
        assert_eq!(timer.remaining(), Duration::ZERO);
    }

    #[test]
    fn long_step_does_not_overshoot() {
        let start = Instant::now();
        let timer = QuantumTimer::arm(Duration::from_millis(10));
        assert!(timer.wait(Duration::from_secs(5)));
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
