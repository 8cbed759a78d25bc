//! Statistical models: scaler, forest regressor, k-means clusterer and the
//! trained generation that bundles them.

pub mod forest;
pub mod kmeans;
pub mod metrics;
pub mod scaler;
pub mod state;
pub mod tree;

pub use forest::RandomForest;
pub use kmeans::KMeans;
pub use scaler::StandardScaler;
pub use state::{CountyScore, ModelState, TrainingMetrics};
