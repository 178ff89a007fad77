pub mod commands;
pub mod devices;
pub mod features;
pub mod requests;
pub mod responses;
pub mod telemetry;
