use core::fmt;
use core::num::NonZeroU32;

/// Process identifier
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct ProcessId(NonZeroU32);

impl ProcessId {
    pub fn new(id: u32) -> Option<Self> {
        NonZeroU32::new(id).map(Self)
    }

    pub fn val(&self) -> u32 {
        self.0.get()
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

/// Resource (mutex) identifier, used as the Resource Table key
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct ResourceId(u32);

impl ResourceId {
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn val(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "M{}", self.0)
    }
}

/// Hands out monotonically increasing process and resource ids.
///
/// Owned by whoever builds processes (normally the workload factory) and
/// passed by reference; there is no process-wide counter.
#[derive(Debug)]
pub struct IdAllocator {
    next_pid: NonZeroU32,
    next_resource: u32,
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdAllocator {
    pub fn new() -> Self {
        Self {
            next_pid: NonZeroU32::MIN,
            next_resource: 1,
        }
    }

    pub fn next_pid(&mut self) -> ProcessId {
        let pid = ProcessId(self.next_pid);
        self.next_pid = self.next_pid.saturating_add(1);
        pid
    }

    pub fn next_resource(&mut self) -> ResourceId {
        let id = self.next_resource;
        self.next_resource += 1;
        ResourceId(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pids_are_monotonic_and_start_at_one() {
        let mut ids = IdAllocator::new();
        let a = ids.next_pid();
        let b = ids.next_pid();
        assert_eq!(a.val(), 1);
        assert_eq!(b.val(), 2);
        assert!(a < b);
    }

    #[test]
    fn resource_ids_are_independent_of_pids() {
        let mut ids = IdAllocator::new();
        ids.next_pid();
        ids.next_pid();
        assert_eq!(ids.next_resource(), ResourceId::new(1));
        assert_eq!(ids.next_resource(), ResourceId::new(2));
    }

    #[test]
    fn zero_is_not_a_pid() {
        assert!(ProcessId::new(0).is_none());
        assert_eq!(ProcessId::new(7).map(|p| p.to_string()), Some("P7".into()));
    }
}
