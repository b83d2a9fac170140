//! Domain types for secret scanning

pub mod entities;
pub mod value_objects;

pub use entities::{Finding, ScanReport, SecretRecord, ValueRecord};
pub use value_objects::{mask_secret, ScanSource, CURRENT_PSEUDO_COMMIT, REDACTED_MARKER};
