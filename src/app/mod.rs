mod orchestrator;
mod runtime;
mod shutdown;
mod startup;
mod state;
mod status;
mod types;


pub use orchestrator::UvcCamOrchestrator;
pub use status::{StatusMonitor, StatusReport};
pub use types::{Component, ComponentState, ShutdownReason};
