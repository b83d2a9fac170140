//! Application use cases: scan, analyze, clean

pub mod analyze;
pub mod clean;
pub mod scan;

pub use analyze::{analyze, Analysis};
pub use clean::CleanRequest;
pub use scan::{ScanMode, ScanOptions, ScanSummary, ScanUseCase};
