//! Refresh cycle state machine.
//!
//! # States
//! - Idle: waiting for the timer or a trigger
//! - Fetching: sources are being read
//! - Merging: documents are parsed and merged
//! - Installing: the new snapshot is being swapped in
//! - Failed: the cycle hit an error; the old snapshot stays active
//!
//! # State Transitions
//! ```text
//! Idle → Fetching → Merging → Installing → Idle
//! Idle → Fetching → (Merging →) Failed → Idle
//! ```

use serde::Serialize;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RefreshState {
    Idle = 0,
    Fetching = 1,
    Merging = 2,
    Installing = 3,
    Failed = 4,
}

impl From<u8> for RefreshState {
    fn from(val: u8) -> Self {
        match val {
            1 => RefreshState::Fetching,
            2 => RefreshState::Merging,
            3 => RefreshState::Installing,
            4 => RefreshState::Failed,
            _ => RefreshState::Idle,
        }
    }
}

/// Point-in-time view of the controller, as served by the admin API.
#[derive(Debug, Clone, Serialize)]
pub struct RefreshStatus {
    pub state: RefreshState,
    pub version: u64,
    pub cycles: u64,
    pub consecutive_failures: u32,
    pub total_failures: u64,
    pub degraded: bool,
    pub last_error: Option<String>,
    pub profiles: Vec<String>,
    pub sources: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_round_trips_through_u8() {
        for state in [
            RefreshState::Idle,
            RefreshState::Fetching,
            RefreshState::Merging,
            RefreshState::Installing,
            RefreshState::Failed,
        ] {
            assert_eq!(RefreshState::from(state as u8), state);
        }
        assert_eq!(RefreshState::from(200), RefreshState::Idle);
    }
}
