pub mod global;
pub mod loader;

pub use global::{HeatmapConfig, ScannerConfig, SignalMapConfig};
pub use loader::ConfigLoader;
pub use signalmap_logging::{LogFormat, LoggingConfig};
