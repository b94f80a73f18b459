use std::fs;

use clap::Parser;
use lifeplan::api::{self, SimulateOptions};
use lifeplan::config::{Cli, Command, SimulateArgs};
use lifeplan::telemetry;
use serde_json::Value;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    telemetry::init(cli.log_json);

    let result = match cli.command {
        Command::Serve(config) => api::run_http_server(&config)
            .await
            .map_err(|e| format!("Server error: {e}")),
        Command::Simulate(args) => run_simulate(&args),
    };

    if let Err(msg) = result {
        eprintln!("{msg}");
        std::process::exit(1);
    }
}

fn run_simulate(args: &SimulateArgs) -> Result<(), String> {
    let raw = fs::read(&args.input)
        .map_err(|e| format!("Failed to read {}: {e}", args.input.display()))?;
    let mut value: Value = serde_json::from_slice(&raw)
        .map_err(|e| format!("Invalid JSON in {}: {e}", args.input.display()))?;
    if value.get("inputParams").is_none() {
        value = serde_json::json!({ "inputParams": value });
    }

    let options = SimulateOptions {
        monte_carlo_runs: args.runs,
        seed: args.seed,
    };
    let response = api::simulate_value(value, options).map_err(|e| e.to_string())?;
    let rendered = if args.pretty {
        serde_json::to_string_pretty(&response)
    } else {
        serde_json::to_string(&response)
    }
    .map_err(|e| format!("Failed to render response: {e}"))?;
    println!("{rendered}");
    Ok(())
}
