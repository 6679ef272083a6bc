pub mod orchestrator;
pub mod reply;

pub use orchestrator::Orchestrator;
