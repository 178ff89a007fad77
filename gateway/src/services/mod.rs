pub mod features;
pub mod ingest;
pub mod query;
pub mod recommend;
pub mod relay;
pub mod soc;
pub mod telemetry;
