//! Session state shared across the tasks of one replay run.
//!
//! Replaces the ambient key-value store of the original flow host with an
//! explicit structure. The state lives behind a single mutex in the task
//! context; every read-modify-write happens inside one critical section.

/// Lifecycle phase of a replay session, derived from the armed flag and the
/// invocation counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Not armed; replay events are ignored.
    Idle,
    /// Armed and below the invocation bound.
    Replaying,
    /// Counter reached the bound exactly; the next invocation emits the
    /// terminal signal.
    Terminating,
    /// Counter passed the bound; permanently idle for this session.
    Done,
}

/// Mutable state of one replay session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    /// Whether replay is armed.
    pub armed: bool,
    /// Number of inbound replay events processed so far. Only ever
    /// increases within a session.
    pub invocations: u64,
    /// Count of accepted temperature readings, maintained by the filter
    /// task.
    pub temperatures_received: u64,
}

impl SessionState {
    /// Initial state: disarmed, counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms the session and starts a fresh invocation count.
    ///
    /// Resetting the counter here keeps the sequencer itself free of any
    /// backward counter movement.
    pub fn arm(&mut self) {
        self.armed = true;
        self.invocations = 0;
    }

    /// Disarms the session. Counters are left as-is for inspection.
    pub fn disarm(&mut self) {
        self.armed = false;
    }

    /// Current phase relative to the configured invocation bound.
    pub fn phase(&self, bound: u64) -> Phase {
        if !self.armed {
            Phase::Idle
        } else if self.invocations < bound {
            Phase::Replaying
        } else if self.invocations == bound {
            Phase::Terminating
        } else {
            Phase::Done
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state_is_idle() {
        let state = SessionState::new();
        assert!(!state.armed);
        assert_eq!(state.invocations, 0);
        assert_eq!(state.phase(100), Phase::Idle);
    }

    #[test]
    fn test_arm_enters_replaying_and_resets_counter() {
        let mut state = SessionState {
            armed: false,
            invocations: 42,
            temperatures_received: 0,
        };
        state.arm();
        assert_eq!(state.invocations, 0);
        assert_eq!(state.phase(100), Phase::Replaying);
    }

    #[test]
    fn test_phase_at_bound_is_terminating() {
        let mut state = SessionState::new();
        state.arm();
        state.invocations = 100;
        assert_eq!(state.phase(100), Phase::Terminating);
    }

    #[test]
    fn test_phase_past_bound_is_done() {
        let mut state = SessionState::new();
        state.arm();
        state.invocations = 101;
        assert_eq!(state.phase(100), Phase::Done);
        state.invocations = 5000;
        assert_eq!(state.phase(100), Phase::Done);
    }

    #[test]
    fn test_disarm_returns_to_idle() {
        let mut state = SessionState::new();
        state.arm();
        state.invocations = 7;
        state.disarm();
        assert_eq!(state.phase(100), Phase::Idle);
        // Counter is preserved for inspection.
        assert_eq!(state.invocations, 7);
    }
}
