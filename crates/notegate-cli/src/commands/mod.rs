//! CLI command implementations.

pub mod config;
pub mod doctor;
pub mod gateway;

pub use config::run_config;
pub use doctor::run_doctor;
pub use gateway::run_gateway;
