mod engine;
mod error;
mod events;
mod loan;
mod monte_carlo;
mod returns;
mod tax;
mod types;
mod validate;
mod withdrawal;

pub use engine::{
    ANNUAL_TAX_ADVANTAGED_CAP, LIFETIME_TAX_ADVANTAGED_CAP, fixed_return_paths,
    lifetime_tax_advantaged_cap, project, resolve_start_date, run_projection,
    stochastic_return_paths,
};
pub use error::SimulationError;
pub use loan::{Repayment, annuity};
pub use monte_carlo::{
    DEFAULT_RUNS, DEFAULT_SEED, MonteCarloResult, MonteCarloSummary, PercentileBands,
    run_monte_carlo, summarize_runs,
};
pub use returns::{RandomSource, ReturnSeries, SeededRandom, generate_return_series};
pub use tax::{CAPITAL_GAINS_TAX_RATE, net_income};
pub use types::{
    AccountBucket, AccountKind, InterestScenario, InvestmentProduct, ProductCategory,
    SimulationInput, YearlyData,
};
pub use validate::validate_input;
pub use withdrawal::{ShortfallOutcome, cover_shortfall};
