pub mod cli;
pub mod config;
pub mod event;
pub mod logging;
pub mod probe;
pub mod supervisor;
pub mod worker;

pub use crate::supervisor::state::SupervisorState;
pub use crate::supervisor::supervisor::{StartedSupervisor, Supervisor};
