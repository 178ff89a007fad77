pub mod devices;
pub mod features;
pub mod telemetry;

pub use devices::DeviceRepository;
pub use features::FeatureRepository;
pub use telemetry::TelemetryRepository;
