use crate::error::ConfigError;

/// Number of MLFQ priority levels. Level 0 is the highest priority.
pub const NUM_PRIORITIES: usize = 16;

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Quantum of the top level
    pub base_quantum: u64,
    /// Quantum of level `i > 0` is `i * quantum_step`
    pub quantum_step: u64,
    /// Ticks between MLFQ resets
    pub aging_interval: u64,
    /// Killed queue size that triggers reclamation
    pub reclaim_batch: usize,
    /// Killed-resource queue size that triggers reclamation
    pub resource_reclaim_batch: usize,
    pub resource_capacity: usize,
    /// Voluntary context switches between deadlock monitor runs
    pub deadlock_check_interval: u32,
    /// Upper bound of the random I/O delay, in ticks
    pub max_io_delay: u32,
    pub seed: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            base_quantum: 500,
            quantum_step: 1000,
            aging_interval: 2000,
            reclaim_batch: 5,
            resource_reclaim_batch: 5,
            resource_capacity: 200,
            deadlock_check_interval: 4,
            max_io_delay: 8,
            seed: 0x5eed,
        }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let nonzero = [
            ("base_quantum", self.base_quantum == 0),
            ("quantum_step", self.quantum_step == 0),
            ("aging_interval", self.aging_interval == 0),
            ("reclaim_batch", self.reclaim_batch == 0),
            ("resource_reclaim_batch", self.resource_reclaim_batch == 0),
            ("resource_capacity", self.resource_capacity == 0),
            ("deadlock_check_interval", self.deadlock_check_interval == 0),
            ("max_io_delay", self.max_io_delay == 0),
        ];
        match nonzero.iter().find(|(_, zero)| *zero) {
            Some((name, _)) => Err(ConfigError::Zero(*name)),
            None => Ok(()),
        }
    }

    /// Quantum magnitudes for every level, growing as priority drops.
    pub fn quanta(&self) -> [u64; NUM_PRIORITIES] {
        core::array::from_fn(|level| {
            if level == 0 {
                self.base_quantum
            } else {
                level as u64 * self.quantum_step
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert!(SchedulerConfig::default().validate().is_ok());
    }

    #[test]
    fn quanta_grow_with_level() {
        let quanta = SchedulerConfig::default().quanta();
        assert_eq!(quanta[0], 500);
        assert_eq!(quanta[1], 1000);
        assert_eq!(quanta[15], 15_000);
        assert!(quanta.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let config = SchedulerConfig {
            resource_capacity: 0,
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::Zero("resource_capacity"))
        );
    }
}
