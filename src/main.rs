//! County planner entry point: CLI wiring around [`PlannerService`].

use std::process;
use std::sync::Arc;

use clap::Parser;
use serde::Serialize;

use county_priority::cli::Cli;
use county_priority::county::validate_batch;
use county_priority::fallback::SitingInput;
use county_priority::io::counties::{from_preset, load_batch};
use county_priority::{PlannerConfig, PlannerService, RawCountyRecord, telemetry};

fn fail(msg: impl std::fmt::Display) -> ! {
    eprintln!("error: {msg}");
    process::exit(1);
}

fn print_json(value: &impl Serialize) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(e) => fail(format!("failed to encode JSON: {e}")),
    }
}

fn load_config(cli: &Cli) -> PlannerConfig {
    let mut config = match cli.config {
        Some(ref path) => PlannerConfig::from_toml_file(path).unwrap_or_else(|e| fail(e)),
        None => PlannerConfig::default(),
    };
    if let Some(secs) = cli.timeout_secs {
        config.training.timeout_secs = secs;
    }
    config
}

fn load_counties(cli: &Cli) -> Vec<RawCountyRecord> {
    let batch = match cli.counties {
        Some(ref path) => load_batch(path),
        None => from_preset(cli.preset_or_default()),
    };
    batch.unwrap_or_else(|e| fail(e))
}

fn run_rules_only(service: &PlannerService, batch: &[RawCountyRecord], json: bool) {
    let records = validate_batch(batch).unwrap_or_else(|e| fail(e));
    let per_capita = service.config().data.energy_per_capita;
    let recs: Vec<_> = records
        .iter()
        .map(|r| {
            let rec = service.recommend_siting(&SitingInput::from_county(r, per_capita));
            (r.county_name.clone(), rec)
        })
        .collect();
    if json {
        print_json(&recs);
        return;
    }
    println!("--- Rule Engine Recommendations ---");
    for (name, rec) in &recs {
        println!("{name:<16} {rec}");
    }
}

fn main() {
    let cli = Cli::parse();
    let config = load_config(&cli);

    let errors = config.validate();
    if !errors.is_empty() {
        for e in &errors {
            eprintln!("{e}");
        }
        process::exit(1);
    }

    if let Err(e) = telemetry::init(&config.logging) {
        fail(e);
    }

    let batch = load_counties(&cli);
    let service = Arc::new(PlannerService::new(config).unwrap_or_else(|e| fail(e)));

    if cli.rules_only {
        run_rules_only(&service, &batch, cli.json);
        return;
    }

    if let Some(ref path) = cli.load_model {
        if let Err(e) = service.load_model(path) {
            fail(e);
        }
    } else {
        let rt = tokio::runtime::Runtime::new()
            .unwrap_or_else(|e| fail(format!("failed to create tokio runtime: {e}")));
        match rt.block_on(Arc::clone(&service).train_in_background(batch.clone())) {
            Ok(metrics) if !cli.json => println!("{metrics}\n"),
            Ok(_) => {}
            Err(e) => fail(e),
        }
    }

    let outcome = service
        .prioritize(&batch, !cli.no_cache)
        .unwrap_or_else(|e| fail(e));
    if cli.json {
        print_json(outcome.report.as_ref());
    } else {
        println!("{}", outcome.report);
    }

    if let Some(ref path) = cli.save_model {
        if let Err(e) = service.save_model(path) {
            fail(e);
        }
        eprintln!("Model written to {}", path.display());
    }
}
