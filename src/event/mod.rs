pub mod channel;
pub mod supervisor_event;
