//! BESS sizing entry point: CLI wiring and config-driven engine construction.

use std::path::Path;
use std::process;

use bess_sizing::config::ScenarioConfig;
use bess_sizing::io::export::{export_csv, export_json};
use bess_sizing::logging;
use bess_sizing::sizing::SizingEngine;

/// Parsed CLI arguments.
struct CliArgs {
    scenario_path: Option<String>,
    preset: Option<String>,
    yearly_out: Option<String>,
    json_out: Option<String>,
}

fn print_help() {
    eprintln!("bess-sizing: battery storage sizing against an end-of-guarantee target");
    eprintln!();
    eprintln!("Usage: bess-sizing [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --scenario <path>     Load scenario from TOML config file");
    eprintln!(
        "  --preset <name>       Use a built-in preset ({})",
        ScenarioConfig::PRESETS.join(", ")
    );
    eprintln!("  --yearly-out <path>   Export yearly performance to CSV");
    eprintln!("  --json-out <path>     Export the full report to JSON");
    eprintln!("  --help                Show this help message");
    eprintln!();
    eprintln!("If no --scenario or --preset is given, the baseline preset is used.");
    eprintln!("Set RUST_LOG (e.g. RUST_LOG=debug) to trace the convergence loop.");
}

/// Returns the value following a flag, or exits with an error.
fn flag_value(args: &[String], i: usize, flag: &str) -> String {
    match args.get(i) {
        Some(v) => v.clone(),
        None => {
            eprintln!("error: {flag} requires an argument");
            process::exit(1);
        }
    }
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut cli = CliArgs {
        scenario_path: None,
        preset: None,
        yearly_out: None,
        json_out: None,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                process::exit(0);
            }
            "--scenario" => {
                i += 1;
                cli.scenario_path = Some(flag_value(&args, i, "--scenario"));
            }
            "--preset" => {
                i += 1;
                cli.preset = Some(flag_value(&args, i, "--preset"));
            }
            "--yearly-out" => {
                i += 1;
                cli.yearly_out = Some(flag_value(&args, i, "--yearly-out"));
            }
            "--json-out" => {
                i += 1;
                cli.json_out = Some(flag_value(&args, i, "--json-out"));
            }
            other => {
                eprintln!("error: unknown argument \"{other}\"");
                print_help();
                process::exit(1);
            }
        }
        i += 1;
    }

    cli
}

fn main() {
    let cli = parse_args();
    logging::init();

    // --scenario takes priority, then --preset, then baseline default
    let scenario = if let Some(ref path) = cli.scenario_path {
        match ScenarioConfig::from_toml_file(Path::new(path)) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("{e}");
                process::exit(1);
            }
        }
    } else if let Some(ref name) = cli.preset {
        match ScenarioConfig::from_preset(name) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("{e}");
                process::exit(1);
            }
        }
    } else {
        ScenarioConfig::baseline()
    };

    let errors = scenario.validate();
    if !errors.is_empty() {
        for e in &errors {
            eprintln!("{e}");
        }
        process::exit(1);
    }

    let inputs = match scenario.sizing_inputs() {
        Ok(inputs) => inputs,
        Err(e) => {
            eprintln!("{e}");
            process::exit(1);
        }
    };
    let report = match SizingEngine::new(scenario.catalogs).and_then(|e| e.run(&inputs, None)) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    };

    for r in &report.convergence.records {
        println!(
            "year {:>2}: SOH {:.4} usable {:>10.3} MWh{}",
            r.year_index,
            r.soh_absolute,
            r.poi_usable_mwh,
            if r.meets_guarantee { "" } else { "  (below target)" }
        );
    }
    println!("\n{report}");

    if let Some(ref path) = cli.yearly_out {
        if let Err(e) = export_csv(&report.convergence.records, Path::new(path)) {
            eprintln!("error: failed to write CSV: {e}");
            process::exit(1);
        }
        eprintln!("Yearly performance written to {path}");
    }
    if let Some(ref path) = cli.json_out {
        if let Err(e) = export_json(&report, Path::new(path)) {
            eprintln!("error: failed to write JSON: {e}");
            process::exit(1);
        }
        eprintln!("Report written to {path}");
    }
}
