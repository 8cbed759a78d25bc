pub mod bundle;
pub mod counties;
