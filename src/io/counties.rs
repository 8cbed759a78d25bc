//! County batch files: TOML documents holding `[[counties]]` tables.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::county::RawCountyRecord;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct BatchFile {
    #[serde(default)]
    counties: Vec<RawCountyRecord>,
}

/// Parses a batch document.
///
/// Records are returned unvalidated; missing fields surface later as
/// validation violations, not parse errors.
pub fn parse_batch(text: &str) -> Result<Vec<RawCountyRecord>, String> {
    let file: BatchFile = toml::from_str(text).map_err(|e| e.to_string())?;
    Ok(file.counties)
}

/// Reads a county batch from `path`.
pub fn load_batch(path: &Path) -> Result<Vec<RawCountyRecord>, String> {
    let raw = fs::read_to_string(path)
        .map_err(|err| format!("failed to read county batch `{}`: {err}", path.display()))?;
    parse_batch(&raw)
        .map_err(|err| format!("invalid county batch `{}`: {err}", path.display()))
}

/// Resolves a named batch: `scenarios/<name>.toml` if present, else a built-in.
pub fn from_preset(name: &str) -> Result<Vec<RawCountyRecord>, String> {
    let path = PathBuf::from("scenarios").join(format!("{name}.toml"));
    if path.exists() {
        return load_batch(&path);
    }
    match name {
        "sample" => Ok(sample_batch()),
        _ => Err(format!(
            "unknown county batch `{name}` (expected `sample` or file `{}`)",
            path.display()
        )),
    }
}

/// Five Kenyan counties used when no batch file is given.
pub fn sample_batch() -> Vec<RawCountyRecord> {
    const ROWS: [(&str, f64, f64, f64, f64, f64, f64, f64); 5] = [
        ("Nairobi", 4_397_073.0, 50.0, 200.0, 5.0, 85.0, 0.0, 180_000.0),
        ("Mombasa", 1_208_333.0, 25.0, 100.0, 8.0, 70.0, 2.0, 80_000.0),
        ("Kisumu", 968_909.0, 15.0, 80.0, 12.0, 60.0, 5.0, 45_000.0),
        ("Nakuru", 1_603_325.0, 20.0, 120.0, 10.0, 65.0, 3.0, 70_000.0),
        ("Eldoret", 289_380.0, 10.0, 60.0, 15.0, 55.0, 8.0, 12_000.0),
    ];
    ROWS.iter()
        .map(
            |&(name, population, hospitals, schools, blackouts, activity, distance, kwh)| {
                RawCountyRecord {
                    county_name: Some(name.to_string()),
                    population: Some(population),
                    hospitals: Some(hospitals),
                    schools: Some(schools),
                    blackout_freq: Some(blackouts),
                    economic_activity: Some(activity),
                    grid_distance: Some(distance),
                    current_kwh: Some(kwh),
                    ..RawCountyRecord::default()
                }
            },
        )
        .collect()
}
