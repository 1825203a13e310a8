pub mod balanced;
pub mod closing;
pub mod config;
pub mod enumerator;
pub mod error;
pub mod history;
pub mod orchestrator;
pub mod progress;
pub mod scoring;
pub mod stats;
pub mod strategy;
pub mod suggestion;
