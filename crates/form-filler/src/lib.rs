pub mod config;
pub mod error;
pub mod forms;
pub mod storage;
pub mod submissions;
pub mod telemetry;
