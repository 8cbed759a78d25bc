//! County records, batch validation and feature construction.

/// Energy-deficit computation and feature matrix assembly.
pub mod features;
pub mod types;
/// Batch validation and canonicalisation.
pub mod validate;

pub use features::{
    ENERGY_DEFICIT_COL, FEATURE_COLUMNS, FeatureMatrix, energy_deficit, total_energy_need,
};
pub use types::{CountyRecord, RawCountyRecord};
pub use validate::validate_batch;
