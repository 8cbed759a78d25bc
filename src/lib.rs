//! County energy-deficit prioritisation and intervention recommendation.
//!
//! Raw county records are validated, turned into standardised features and
//! scored by a random-forest regressor alongside a k-means segmentation. A
//! recommendation layer sorts counties into technology buckets relative to
//! their batch, and a rule engine answers single-county siting questions when
//! no model is available.

pub mod cache;
pub mod cli;
pub mod config;
pub mod county;
pub mod error;
pub mod fallback;
pub mod io;
pub mod model;
pub mod planner;
pub mod recommend;
pub mod report;
pub mod telemetry;

pub use config::PlannerConfig;
pub use county::{CountyRecord, RawCountyRecord};
pub use error::{PersistenceError, PlannerError, TrainingError, ValidationError};
pub use planner::{PlannerService, Prioritization, RecommendMode, SingleRecommendation};
pub use report::{PriorityReport, PriorityResult};
