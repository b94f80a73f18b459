use std::net::IpAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::core::DEFAULT_RUNS;

#[derive(Debug, Parser)]
#[command(
    name = "lifeplan",
    version,
    about = "Year-by-year household financial projection engine"
)]
pub struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true, env = "LIFEPLAN_LOG_JSON")]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve `POST /api/simulate` over HTTP.
    Serve(ServeConfig),
    /// Run one request body from a file and print the response JSON.
    Simulate(SimulateArgs),
}

#[derive(Debug, Clone, Args)]
pub struct ServeConfig {
    #[arg(long, env = "LIFEPLAN_HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    #[arg(long, env = "LIFEPLAN_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Stochastic runs per request.
    #[arg(
        long,
        env = "LIFEPLAN_MONTE_CARLO_RUNS",
        default_value_t = DEFAULT_RUNS,
        value_parser = parse_runs
    )]
    pub monte_carlo_runs: usize,
}

#[derive(Debug, Clone, Args)]
pub struct SimulateArgs {
    /// JSON file holding `{ "inputParams": ... }` or a bare input object.
    #[arg(long, short)]
    pub input: PathBuf,

    #[arg(long, default_value_t = DEFAULT_RUNS, value_parser = parse_runs)]
    pub runs: usize,

    /// Base seed for stochastic runs; overrides `stressTest.seed`.
    #[arg(long)]
    pub seed: Option<u64>,

    #[arg(long)]
    pub pretty: bool,
}

fn parse_runs(raw: &str) -> Result<usize, String> {
    let runs: usize = raw
        .parse()
        .map_err(|_| format!("`{raw}` is not a whole number"))?;
    if runs == 0 {
        return Err("run count must be at least 1".to_string());
    }
    Ok(runs)
}
