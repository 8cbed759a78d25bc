//! Command-line arguments.

use std::path::PathBuf;

use clap::Parser;

/// Rank counties by unmet energy need and recommend interventions.
#[derive(Debug, Parser)]
#[command(name = "county-priority", version, about)]
pub struct Cli {
    /// Planner configuration (TOML).
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// County batch file with `[[counties]]` tables.
    #[arg(long, value_name = "PATH", conflicts_with = "preset")]
    pub counties: Option<PathBuf>,

    /// Named batch: `scenarios/<name>.toml` or the built-in `sample`.
    #[arg(long, value_name = "NAME")]
    pub preset: Option<String>,

    /// Serve a previously saved model instead of training.
    #[arg(long, value_name = "PATH")]
    pub load_model: Option<PathBuf>,

    /// Save the serving model after the run.
    #[arg(long, value_name = "PATH", conflicts_with = "rules_only")]
    pub save_model: Option<PathBuf>,

    /// Skip the model and print the rule engine's recommendation per county.
    #[arg(long)]
    pub rules_only: bool,

    /// Bypass the result cache.
    #[arg(long)]
    pub no_cache: bool,

    /// Override `[training] timeout_secs`.
    #[arg(long, value_name = "SECS")]
    pub timeout_secs: Option<u64>,

    /// Print the report as JSON instead of text.
    #[arg(long)]
    pub json: bool,
}

impl Cli {
    /// Batch preset to use when no `--counties` file is given.
    pub fn preset_or_default(&self) -> &str {
        self.preset.as_deref().unwrap_or("sample")
    }
}
