use std::fmt::Display;
use std::sync::{Arc, Mutex};

/// The single source of truth for what the supervisor is doing. Written only
/// by the supervisor loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SupervisorState {
    #[default]
    Idle,
    ProbingConnectivity,
    Starting,
    Running,
    ChannelDown,
    Backoff,
    Stopping,
    Stopped,
}

impl SupervisorState {
    /// Whether a start request has been accepted and not yet wound down.
    pub fn is_active(&self) -> bool {
        !matches!(self, SupervisorState::Idle | SupervisorState::Stopped)
    }
}

impl Display for SupervisorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SupervisorState::Idle => "idle",
            SupervisorState::ProbingConnectivity => "probing-connectivity",
            SupervisorState::Starting => "starting",
            SupervisorState::Running => "running",
            SupervisorState::ChannelDown => "channel-down",
            SupervisorState::Backoff => "backoff",
            SupervisorState::Stopping => "stopping",
            SupervisorState::Stopped => "stopped",
        };
        write!(f, "{}", name)
    }
}

/// Shared view of the loop's current state. The loop is the only writer,
/// observers read a consistent snapshot.
#[derive(Clone, Default)]
pub struct StateCell(Arc<Mutex<SupervisorState>>);

impl StateCell {
    pub fn get(&self) -> SupervisorState {
        self.0.lock().map(|guard| *guard).unwrap_or_default()
    }

    pub(crate) fn set(&self, state: SupervisorState) {
        if let Ok(mut guard) = self.0.lock() {
            *guard = state;
        }
    }
}
