use rayon::prelude::*;
use serde::Serialize;
use tracing::info;

use super::engine::{project, resolve_start_date, stochastic_return_paths};
use super::error::SimulationError;
use super::returns::SeededRandom;
use super::types::{InterestScenario, SimulationInput, YearlyData};
use super::validate::validate_input;

pub const DEFAULT_RUNS: usize = 100;
pub const DEFAULT_SEED: u64 = 123_456_789;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PercentileBands {
    pub p10: Vec<f64>,
    pub p90: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonteCarloSummary {
    /// Share of runs in which total assets went negative in any year.
    pub bankruptcy_rate: f64,
    pub runs: usize,
    pub median_final_assets: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonteCarloResult {
    /// Path of the run whose final total assets are the median across runs.
    pub yearly_data: Vec<YearlyData>,
    pub percentile_data: PercentileBands,
    pub summary: MonteCarloSummary,
}

/// Seed for one run, derived so that runs do not share a random stream.
pub fn derive_seed(base_seed: u64, run: u32) -> u64 {
    splitmix64(base_seed ^ ((run as u64) << 32) ^ run as u64)
}

fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

fn percentile(values: &mut [f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let n = values.len();
    if n == 1 {
        return values[0];
    }
    let rank = (p / 100.0) * (n as f64 - 1.0);
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        values[lower]
    } else {
        let w = rank - lower as f64;
        values[lower] * (1.0 - w) + values[upper] * w
    }
}

fn final_assets(run: &[YearlyData]) -> f64 {
    run.last().map_or(0.0, |r| r.total_assets)
}

/// Reduces completed runs to the representative path, bands and depletion rate.
/// The result does not depend on run order.
pub fn summarize_runs(runs: Vec<Vec<YearlyData>>) -> Result<MonteCarloResult, SimulationError> {
    if runs.is_empty() {
        return Err(SimulationError::NoRuns);
    }
    let n = runs.len();

    let bankrupt = runs
        .iter()
        .filter(|run| run.iter().any(|r| r.total_assets < 0.0))
        .count();

    let years = runs.iter().map(Vec::len).min().unwrap_or(0);
    let mut p10 = Vec::with_capacity(years);
    let mut p90 = Vec::with_capacity(years);
    for year in 0..years {
        let mut assets: Vec<f64> = runs.iter().map(|run| run[year].total_assets).collect();
        p10.push(percentile(&mut assets, 10.0).round());
        p90.push(percentile(&mut assets, 90.0).round());
    }

    let mut finals: Vec<f64> = runs.iter().map(|run| final_assets(run)).collect();
    let median_final_assets = percentile(&mut finals, 50.0);

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        final_assets(&runs[a])
            .total_cmp(&final_assets(&runs[b]))
            .then_with(|| compare_paths(&runs[a], &runs[b]))
    });
    let representative = order[(n - 1) / 2];
    let yearly_data = runs
        .into_iter()
        .nth(representative)
        .ok_or(SimulationError::NoRuns)?;

    Ok(MonteCarloResult {
        yearly_data,
        percentile_data: PercentileBands { p10, p90 },
        summary: MonteCarloSummary {
            bankruptcy_rate: bankrupt as f64 / n as f64,
            runs: n,
            median_final_assets,
        },
    })
}

/// Tie-break between runs with equal final assets so the pick is order-independent.
fn compare_paths(a: &[YearlyData], b: &[YearlyData]) -> std::cmp::Ordering {
    a.iter()
        .zip(b)
        .map(|(x, y)| x.total_assets.total_cmp(&y.total_assets))
        .find(|o| o.is_ne())
        .unwrap_or(std::cmp::Ordering::Equal)
}

/// Runs `runs` independent stochastic projections in parallel and summarizes them.
pub fn run_monte_carlo(
    input: &SimulationInput,
    runs: usize,
    base_seed: u64,
) -> Result<MonteCarloResult, SimulationError> {
    if runs == 0 {
        return Err(SimulationError::NoRuns);
    }
    validate_input(input)?;

    let mut stochastic = input.clone();
    stochastic.interest_scenario = InterestScenario::Random;
    let start = resolve_start_date(&stochastic);

    let results = (0..runs as u32)
        .into_par_iter()
        .map(|run| {
            let mut source = SeededRandom::new(derive_seed(base_seed, run));
            let paths = stochastic_return_paths(&stochastic, &mut source);
            project(&stochastic, start, &paths)
        })
        .collect::<Result<Vec<_>, _>>()?;

    let result = summarize_runs(results)?;
    info!(
        runs,
        base_seed,
        bankruptcy_rate = result.summary.bankruptcy_rate,
        "monte-carlo batch finished"
    );
    Ok(result)
}
