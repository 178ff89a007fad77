pub mod command;
pub mod devices;
pub mod recommend;
pub mod telemetry;
