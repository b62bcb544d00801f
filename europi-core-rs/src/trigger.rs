//! Fire-and-forget trigger pulses.
//!
//! A pulse is a tiny task: assert a gate, wait, de-assert. The asserting half
//! runs synchronously inside [`Scheduler::trigger()`](crate::Scheduler::trigger);
//! the waiting half is a [`PulseTask`] deadline kept in a [`PulseTable`] and
//! retired by the scheduler at its next suspension point.
//!
//! # Overlapping pulses on one gate
//!
//! When a second pulse is emitted on a gate whose first pulse has not yet
//! finished, the outcome is decided by [`OverlapPolicy`]:
//!
//! ```text
//! emit(g, 30) at t=0, emit(g, 30) at t=20
//!
//! LatestDeadline:  ‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾\____  low at 50
//! Independent:     ‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾\_______________________  low at 30
//! ```

use heapless::Vec;

use crate::error::PulseError;

/// Default trigger length in milliseconds.
pub const DEFAULT_TRIGGER_MS: u32 = 10;

/// Maximum number of pulses in flight at once.
pub const MAX_PULSES: usize = 16;

/// What happens when pulses on the same gate overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OverlapPolicy {
    /// One task per gate; a new pulse moves its deadline to whichever of the
    /// two deadlines is later. The gate stays high until the last requested
    /// pulse has fully elapsed.
    #[default]
    LatestDeadline,
    /// Every pulse keeps its own deadline. The first one to expire drives the
    /// gate low, even if a later pulse wanted it held longer.
    Independent,
}

/// A pending de-assertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PulseTask {
    pub gate: usize,
    pub deadline_ms: u64,
}

/// Fixed-capacity set of in-flight pulses.
pub struct PulseTable<const N: usize = MAX_PULSES> {
    tasks: Vec<PulseTask, N>,
    policy: OverlapPolicy,
}

impl<const N: usize> PulseTable<N> {
    pub const fn new(policy: OverlapPolicy) -> Self {
        Self {
            tasks: Vec::new(),
            policy,
        }
    }

    pub fn policy(&self) -> OverlapPolicy {
        self.policy
    }

    /// Record a pulse on `gate` lasting `duration_ms` from `now_ms`.
    ///
    /// On [`PulseError::QueueFull`] nothing is recorded and the caller must
    /// not assert the gate.
    pub fn emit(&mut self, gate: usize, now_ms: u64, duration_ms: u32) -> Result<(), PulseError> {
        let deadline_ms = now_ms + duration_ms as u64;

        if self.policy == OverlapPolicy::LatestDeadline {
            if let Some(task) = self.tasks.iter_mut().find(|t| t.gate == gate) {
                task.deadline_ms = task.deadline_ms.max(deadline_ms);
                return Ok(());
            }
        }

        self.tasks
            .push(PulseTask { gate, deadline_ms })
            .map_err(|_| PulseError::QueueFull)
    }

    /// Remove every task whose deadline has passed and return the gates to
    /// drive low, in deadline order.
    pub fn expire(&mut self, now_ms: u64) -> Vec<usize, N> {
        let mut due: Vec<PulseTask, N> = Vec::new();
        self.tasks.retain(|task| {
            if task.deadline_ms <= now_ms {
                // Capacity is shared with `tasks`, so this cannot overflow.
                let _ = due.push(*task);
                false
            } else {
                true
            }
        });
        due.sort_unstable_by_key(|task| task.deadline_ms);
        due.iter().map(|task| task.gate).collect()
    }

    /// Earliest pending deadline.
    pub fn next_deadline(&self) -> Option<u64> {
        self.tasks.iter().map(|t| t.deadline_ms).min()
    }

    /// Whether any pulse on `gate` is still in flight.
    pub fn is_pending(&self, gate: usize) -> bool {
        self.tasks.iter().any(|t| t.gate == gate)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Drop every pending task without touching any output.
    pub fn clear(&mut self) {
        self.tasks.clear();
    }
}
