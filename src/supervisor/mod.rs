pub mod failure;
pub mod state;
#[allow(clippy::module_inception)]
pub mod supervisor;
