use std::collections::BTreeMap;

use chrono::{Datelike, Local, NaiveDate};
use tracing::{debug, trace};

use super::error::SimulationError;
use super::events::{YearContext, expenses_for_year, income_for_year, self_earner};
use super::returns::{RandomSource, ReturnSeries, fixed_return_series, generate_return_series};
use super::types::{
    AccountBucket, AccountKind, AssetAllocation, ExpenseDetail, IncomeDetail, SimulationInput,
    WithdrawalDetail, YearlyData,
};
use super::validate::{resolve_product_ids, validate_input};
use super::withdrawal::cover_shortfall;

pub const LIFETIME_TAX_ADVANTAGED_CAP: f64 = 18_000_000.0;
pub const ANNUAL_TAX_ADVANTAGED_CAP: f64 = 3_600_000.0;
pub const SPOUSE_CAP_MULTIPLIER: f64 = 2.0;
pub const RETIREMENT_LOCKED_CONTRIBUTION_AGE_LIMIT: u32 = 60;
pub const RETIREMENT_LOCKED_MAX_PAYOUT_AGE: u32 = 75;

pub fn lifetime_tax_advantaged_cap(use_spouse_nisa: bool) -> f64 {
    if use_spouse_nisa {
        LIFETIME_TAX_ADVANTAGED_CAP * SPOUSE_CAP_MULTIPLIER
    } else {
        LIFETIME_TAX_ADVANTAGED_CAP
    }
}

pub fn resolve_start_date(input: &SimulationInput) -> NaiveDate {
    input
        .start_date
        .unwrap_or_else(|| Local::now().date_naive())
}

/// Share of the first calendar year that is simulated, and the months it covers.
pub fn first_year_span(start: NaiveDate) -> (f64, u32) {
    let months = 13 - start.month();
    (f64::from(months) / 12.0, months)
}

pub fn fixed_return_paths(input: &SimulationInput) -> Vec<ReturnSeries> {
    let horizon = input.year_count();
    input
        .products
        .iter()
        .map(|p| fixed_return_series(p.expected_return, horizon))
        .collect()
}

/// One crash-injected series per product, drawn in product order from `source`.
pub fn stochastic_return_paths(
    input: &SimulationInput,
    source: &mut dyn RandomSource,
) -> Vec<ReturnSeries> {
    let horizon = input.year_count();
    input
        .products
        .iter()
        .map(|p| generate_return_series(p.expected_return, p.key.volatility(), horizon, source))
        .collect()
}

#[derive(Debug, Clone)]
struct HouseholdState {
    cash: f64,
    buckets: Vec<AccountBucket>,
    /// Running tax-advantaged contributions counted against the lifetime cap.
    tax_advantaged_contributed: f64,
    /// Room freed by this year's shortfall sales; released at the start of next year.
    pending_freed_room: f64,
    retirement_locked_paid_out: bool,
}

struct YearFlows {
    income: f64,
    income_detail: IncomeDetail,
    expense: f64,
    expense_detail: ExpenseDetail,
    cash_flow: f64,
    invested: f64,
    withdrawal: WithdrawalDetail,
}

struct Projection<'a> {
    input: &'a SimulationInput,
    ids: Vec<String>,
    accounts: Vec<AccountKind>,
    paths: &'a [ReturnSeries],
    start_year: i32,
    year_fraction: f64,
    first_year_months: u32,
    lifetime_cap: f64,
    payout_age: u32,
}

impl Projection<'_> {
    fn initial_state(&self) -> HouseholdState {
        let buckets: Vec<AccountBucket> = self
            .input
            .products
            .iter()
            .map(|p| AccountBucket::opened_at(p.current_balance))
            .collect();
        let tax_advantaged_contributed = buckets
            .iter()
            .zip(&self.accounts)
            .filter(|(_, kind)| **kind == AccountKind::TaxAdvantaged)
            .map(|(b, _)| b.principal)
            .sum();
        HouseholdState {
            cash: self.input.current_savings,
            buckets,
            tax_advantaged_contributed,
            pending_freed_room: 0.0,
            retirement_locked_paid_out: false,
        }
    }

    fn rate_for(&self, product: usize, index: u32) -> f64 {
        self.paths
            .get(product)
            .and_then(|path| path.returns.get(index as usize))
            .copied()
            .unwrap_or(self.input.products[product].expected_return)
    }

    /// Deposits this year's retirement-locked contributions out of self gross pay and returns
    /// the amount withheld. Requests beyond the pay earned this year are scaled down pro rata.
    fn payroll_contributions(&self, ctx: &YearContext, state: &mut HouseholdState) -> f64 {
        let input = self.input;
        let earned = self_earner(input).gross_salary(ctx.age) * ctx.year_fraction;
        let open = !state.retirement_locked_paid_out
            && ctx.age < RETIREMENT_LOCKED_CONTRIBUTION_AGE_LIMIT
            && ctx.age < input.retirement_age
            && earned > 0.0;
        if !open {
            return 0.0;
        }

        let requests: Vec<(usize, f64)> = input
            .products
            .iter()
            .enumerate()
            .filter(|(i, _)| self.accounts[*i] == AccountKind::RetirementLocked)
            .map(|(i, p)| (i, p.requested_contribution(ctx.year_fraction)))
            .collect();
        let requested: f64 = requests.iter().map(|(_, amount)| amount).sum();
        if requested <= 0.0 {
            return 0.0;
        }
        let scale = (earned / requested).min(1.0);
        if scale < 1.0 {
            debug!(
                age = ctx.age,
                requested,
                earned,
                "payroll contributions capped at gross pay"
            );
        }

        let mut withheld = 0.0;
        for (i, amount) in requests {
            let deposit = amount * scale;
            state.buckets[i] = state.buckets[i].deposit(deposit);
            withheld += deposit;
        }
        withheld
    }

    fn step(&self, index: u32, prev: &HouseholdState) -> (HouseholdState, YearlyData) {
        let input = self.input;
        let ctx = YearContext::new(input, index, self.year_fraction, self.first_year_months);
        let mut next = prev.clone();

        if !next.retirement_locked_paid_out && ctx.age >= self.payout_age {
            let mut paid = 0.0;
            for (bucket, kind) in next.buckets.iter_mut().zip(&self.accounts) {
                if *kind == AccountKind::RetirementLocked {
                    paid += bucket.balance;
                    *bucket = AccountBucket::default();
                }
            }
            next.cash += paid;
            next.retirement_locked_paid_out = true;
            debug!(age = ctx.age, amount = paid, "retirement-locked holdings paid out");
        }

        next.tax_advantaged_contributed =
            (next.tax_advantaged_contributed - next.pending_freed_room).max(0.0);
        next.pending_freed_room = 0.0;

        let payroll_withheld = self.payroll_contributions(&ctx, &mut next);
        let mut invested = payroll_withheld;
        // Net pay is computed on an annual basis and then prorated.
        let payroll_deduction = if ctx.year_fraction > 0.0 {
            payroll_withheld / ctx.year_fraction
        } else {
            0.0
        };

        let income_detail = income_for_year(input, &ctx, payroll_deduction);
        let computed_income = income_detail.self_net
            + income_detail.spouse
            + income_detail.public_pension
            + income_detail.personal_pension
            + income_detail.one_time;
        let income = input
            .test_overrides
            .as_ref()
            .and_then(|o| o.income.get(&ctx.age).copied())
            .unwrap_or(computed_income);
        let expense_detail = expenses_for_year(input, &ctx);
        let expense = expense_detail.total();
        let cash_flow = income - expense;
        next.cash += cash_flow;

        let floor = input.emergency_fund;
        let mut withdrawal = WithdrawalDetail::default();
        if next.cash < floor {
            let deficit = floor - next.cash;
            let outcome = cover_shortfall(deficit, next.cash, &self.accounts, &next.buckets);
            debug!(
                age = ctx.age,
                deficit,
                gross = outcome.gross_withdrawn,
                tax = outcome.tax_paid,
                unmet = outcome.remaining_deficit,
                "shortfall remediation"
            );
            withdrawal = WithdrawalDetail {
                gross: outcome.gross_withdrawn,
                tax_paid: outcome.tax_paid,
                freed_room: outcome.freed_room,
            };
            next.pending_freed_room += outcome.freed_room;
            next.cash = outcome.cash;
            next.buckets = outcome.buckets;
        }

        if ctx.age < input.retirement_age {
            let mut surplus = (next.cash - floor).max(0.0);
            let mut annual_tax_advantaged = 0.0;
            for (i, product) in input.products.iter().enumerate() {
                if surplus <= 0.0 {
                    break;
                }
                let kind = self.accounts[i];
                let requested = product.requested_contribution(ctx.year_fraction).min(surplus);
                let amount = match kind {
                    AccountKind::RetirementLocked => continue,
                    AccountKind::Taxable => requested,
                    AccountKind::TaxAdvantaged => requested
                        .min(self.lifetime_cap - next.tax_advantaged_contributed)
                        .min(ANNUAL_TAX_ADVANTAGED_CAP - annual_tax_advantaged)
                        .max(0.0),
                };
                if amount <= 0.0 {
                    continue;
                }
                next.buckets[i] = next.buckets[i].deposit(amount);
                next.cash -= amount;
                surplus -= amount;
                invested += amount;
                if kind == AccountKind::TaxAdvantaged {
                    next.tax_advantaged_contributed += amount;
                    annual_tax_advantaged += amount;
                }
            }
        }

        for (i, bucket) in next.buckets.iter_mut().enumerate() {
            let growth = (1.0 + self.rate_for(i, index)).max(0.0).powf(ctx.year_fraction);
            bucket.balance *= growth;
        }
        trace!(age = ctx.age, cash = next.cash, "year closed");

        let flows = YearFlows {
            income,
            income_detail,
            expense,
            expense_detail,
            cash_flow,
            invested,
            withdrawal,
        };
        let record = self.emit(&ctx, &next, flows);
        (next, record)
    }

    fn emit(&self, ctx: &YearContext, state: &HouseholdState, flows: YearFlows) -> YearlyData {
        let mut taxable = AccountBucket::default();
        let mut tax_advantaged = AccountBucket::default();
        let mut retirement_locked = AccountBucket::default();
        let mut products = BTreeMap::new();
        for ((bucket, kind), id) in state.buckets.iter().zip(&self.accounts).zip(&self.ids) {
            match kind {
                AccountKind::Taxable => taxable = taxable + *bucket,
                AccountKind::TaxAdvantaged => tax_advantaged = tax_advantaged + *bucket,
                AccountKind::RetirementLocked => retirement_locked = retirement_locked + *bucket,
            }
            products.insert(id.clone(), bucket.rounded());
        }
        let (taxable, tax_advantaged, retirement_locked) = (
            taxable.rounded(),
            tax_advantaged.rounded(),
            retirement_locked.rounded(),
        );
        let cash = state.cash.round();
        let total_assets =
            cash + taxable.balance + tax_advantaged.balance + retirement_locked.balance;

        let gross_assets =
            cash.max(0.0) + taxable.balance + tax_advantaged.balance + retirement_locked.balance;
        let share = |v: f64| if gross_assets > 0.0 { v / gross_assets } else { 0.0 };

        let d = &flows.income_detail;
        let e = &flows.expense_detail;
        YearlyData {
            year: self.start_year + ctx.index as i32,
            age: ctx.age,
            spouse_age: ctx.spouse_age.filter(|_| ctx.married),
            income: flows.income.round(),
            income_detail: IncomeDetail {
                self_net: d.self_net.round(),
                spouse: d.spouse.round(),
                public_pension: d.public_pension.round(),
                personal_pension: d.personal_pension.round(),
                one_time: d.one_time.round(),
            },
            expense: flows.expense.round(),
            expense_detail: ExpenseDetail {
                living: e.living.round(),
                car: e.car.round(),
                housing: e.housing.round(),
                marriage: e.marriage.round(),
                children: e.children.round(),
                appliances: e.appliances.round(),
                care: e.care.round(),
            },
            balance: flows.cash_flow.round(),
            savings: cash,
            taxable,
            tax_advantaged,
            retirement_locked,
            investment_principal: (taxable.principal
                + tax_advantaged.principal
                + retirement_locked.principal)
                .round(),
            invested_amount: flows.invested.round(),
            withdrawal: WithdrawalDetail {
                gross: flows.withdrawal.gross.round(),
                tax_paid: flows.withdrawal.tax_paid.round(),
                freed_room: flows.withdrawal.freed_room.round(),
            },
            tax_advantaged_contributed: state.tax_advantaged_contributed.round(),
            total_assets,
            asset_allocation: AssetAllocation {
                cash: share(cash.max(0.0)),
                taxable: share(taxable.balance),
                tax_advantaged: share(tax_advantaged.balance),
                retirement_locked: share(retirement_locked.balance),
            },
            products,
        }
    }
}

/// Runs the year-by-year projection with one return series per product.
pub fn project(
    input: &SimulationInput,
    start: NaiveDate,
    paths: &[ReturnSeries],
) -> Result<Vec<YearlyData>, SimulationError> {
    validate_input(input)?;
    let ids = resolve_product_ids(&input.products)?;
    let (year_fraction, first_year_months) = first_year_span(start);

    let projection = Projection {
        input,
        ids,
        accounts: input.products.iter().map(|p| p.account).collect(),
        paths,
        start_year: start.year(),
        year_fraction,
        first_year_months,
        lifetime_cap: lifetime_tax_advantaged_cap(input.use_spouse_nisa),
        payout_age: input.retirement_age.min(RETIREMENT_LOCKED_MAX_PAYOUT_AGE),
    };
    debug!(
        years = input.year_count(),
        products = input.products.len(),
        year_fraction,
        "projection started"
    );

    let mut state = projection.initial_state();
    let mut records = Vec::with_capacity(input.year_count());
    for index in 0..=(input.end_age - input.initial_age) {
        let (next, record) = projection.step(index, &state);
        records.push(record);
        state = next;
    }
    Ok(records)
}

/// Deterministic projection at each product's expected return.
pub fn run_projection(input: &SimulationInput) -> Result<Vec<YearlyData>, SimulationError> {
    validate_input(input)?;
    let start = resolve_start_date(input);
    project(input, start, &fixed_return_paths(input))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::events::sample_input;
    use crate::core::returns::{SeededRandom, ScriptedRandom};
    use crate::core::tax::net_income;
    use crate::core::types::{InvestmentProduct, ProductCategory, Reemployment, TestOverrides};
    use proptest::prelude::*;

    fn january() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()
    }

    fn product(account: AccountKind, balance: f64, rate: f64) -> InvestmentProduct {
        InvestmentProduct {
            id: None,
            key: ProductCategory::Trust,
            account,
            current_balance: balance,
            recurring_annual: 0.0,
            spot_annual: 0.0,
            expected_return: rate,
        }
    }

    fn run(input: &SimulationInput) -> Vec<YearlyData> {
        project(input, january(), &fixed_return_paths(input)).unwrap()
    }

    #[test]
    fn one_year_salary_scenario_matches_hand_calculation() {
        let mut input = sample_input();
        input.end_age = 30;
        input.main_job_income_gross = 10_000_000.0;
        input.living_cost_simple_annual = 4_000_000.0;
        input.current_savings = 2_000_000.0;

        let records = run(&input);
        assert_eq!(records.len(), 1);
        let year = &records[0];
        assert_eq!(year.income, 7_101_500.0);
        assert_eq!(year.expense, 4_000_000.0);
        assert_eq!(year.savings, 2_000_000.0 + 7_101_500.0 - 4_000_000.0);
        assert_eq!(year.year, 2025);
    }

    #[test]
    fn compound_growth_on_taxable_holding_matches_hand_calculation() {
        let mut input = sample_input();
        input.end_age = 31;
        input.main_job_income_gross = 10_000_000.0;
        input.living_cost_simple_annual = 4_000_000.0;
        input.current_savings = 10_000_000.0;
        input.products = vec![product(AccountKind::Taxable, 5_000_000.0, 0.10)];

        let records = run(&input);
        assert_eq!(records[0].total_assets, 18_601_500.0);
        assert_eq!(records[1].total_assets, 22_253_000.0);
        assert_eq!(records[1].taxable.principal, 5_000_000.0);
        assert_eq!(records[1].products["trust-0"].balance, 6_050_000.0);
    }

    #[test]
    fn shortfall_draws_taxable_then_tax_advantaged_and_frees_room_next_year() {
        let mut input = sample_input();
        input.end_age = 31;
        input.emergency_fund = 3_000_000.0;
        input.current_savings = 2_000_000.0;
        input.main_job_income_gross = 5_000_000.0;
        input.living_cost_simple_annual = 5_000_000.0;
        let mut nisa = product(AccountKind::TaxAdvantaged, 2_000_000.0, 0.0);
        nisa.recurring_annual = 3_000_000.0;
        input.products = vec![product(AccountKind::Taxable, 2_000_000.0, 0.0), nisa];
        input.test_overrides = Some(TestOverrides {
            income: BTreeMap::from([(31, 10_000_000.0)]),
        });

        let records = run(&input);
        let first = &records[0];
        assert_eq!(first.balance, -1_123_500.0);
        assert_eq!(first.savings, 3_000_000.0);
        assert_eq!(first.taxable.balance, 0.0);
        assert_eq!(first.tax_advantaged.balance, 1_876_500.0);
        assert_eq!(first.withdrawal.freed_room, 123_500.0);
        assert_eq!(first.withdrawal.tax_paid, 0.0);
        // Room is not recycled in the same year.
        assert_eq!(first.tax_advantaged_contributed, 2_000_000.0);
        assert_eq!(first.invested_amount, 0.0);

        let second = &records[1];
        assert_eq!(second.income, 10_000_000.0);
        assert_eq!(second.tax_advantaged.principal, 1_876_500.0 + 3_000_000.0);
        assert_eq!(second.tax_advantaged_contributed, 1_876_500.0 + 3_000_000.0);
    }

    #[test]
    fn tax_advantaged_contributions_respect_annual_and_lifetime_caps() {
        let mut input = sample_input();
        input.end_age = 40;
        input.current_savings = 200_000_000.0;
        let mut nisa = product(AccountKind::TaxAdvantaged, 0.0, 0.0);
        nisa.recurring_annual = 10_000_000.0;
        input.products = vec![nisa];

        let records = run(&input);
        assert_eq!(records[0].invested_amount, ANNUAL_TAX_ADVANTAGED_CAP);
        assert_eq!(records[4].tax_advantaged_contributed, LIFETIME_TAX_ADVANTAGED_CAP);
        assert_eq!(records[5].invested_amount, 0.0);
        assert!(
            records
                .iter()
                .all(|r| r.tax_advantaged_contributed <= LIFETIME_TAX_ADVANTAGED_CAP)
        );
    }

    #[test]
    fn spouse_allowance_doubles_lifetime_cap() {
        let mut input = sample_input();
        input.current_savings = 200_000_000.0;
        input.use_spouse_nisa = true;
        let mut nisa = product(AccountKind::TaxAdvantaged, 0.0, 0.0);
        nisa.recurring_annual = 3_600_000.0;
        input.products = vec![nisa];
        let records = run(&input);
        assert_eq!(records[9].tax_advantaged_contributed, 36_000_000.0);
    }

    #[test]
    fn contributions_stop_at_retirement_and_respect_floor() {
        let mut input = sample_input();
        input.retirement_age = 32;
        input.end_age = 33;
        input.current_savings = 1_500_000.0;
        input.emergency_fund = 1_000_000.0;
        let mut stocks = product(AccountKind::Taxable, 0.0, 0.0);
        stocks.recurring_annual = 1_000_000.0;
        input.products = vec![stocks];

        let records = run(&input);
        assert_eq!(records[0].invested_amount, 500_000.0);
        assert_eq!(records[0].savings, 1_000_000.0);
        assert_eq!(records[2].invested_amount, 0.0);
    }

    #[test]
    fn retirement_locked_is_payroll_funded_and_paid_out_at_retirement() {
        let mut input = sample_input();
        input.initial_age = 58;
        input.end_age = 62;
        input.retirement_age = 61;
        input.main_job_income_gross = 5_200_000.0;
        let mut ideco = product(AccountKind::RetirementLocked, 1_000_000.0, 0.0);
        ideco.key = ProductCategory::Ideco;
        ideco.recurring_annual = 200_000.0;
        input.products = vec![ideco];

        let records = run(&input);
        // Deduction lowers taxable pay: net(5.0M) rather than net(5.2M).
        assert_eq!(records[0].income, 3_876_500.0);
        assert_eq!(records[0].retirement_locked.balance, 1_200_000.0);
        assert_eq!(records[1].retirement_locked.balance, 1_400_000.0);
        // Age 60: contribution window closed.
        assert_eq!(records[2].retirement_locked.balance, 1_400_000.0);
        // Age 61: paid out to cash.
        assert_eq!(records[3].retirement_locked.balance, 0.0);
        assert_eq!(records[3].savings - records[2].savings, 1_400_000.0);
        assert_eq!(records[4].retirement_locked.balance, 0.0);
    }

    #[test]
    fn payroll_contributions_never_exceed_gross_pay() {
        let mut input = sample_input();
        input.end_age = 30;
        input.side_job_income_gross = 100_000.0;
        let mut ideco = product(AccountKind::RetirementLocked, 0.0, 0.0);
        ideco.key = ProductCategory::Ideco;
        ideco.recurring_annual = 2_000_000.0;
        input.products = vec![ideco];

        let records = run(&input);
        let year = &records[0];
        assert_eq!(year.income, 0.0);
        assert_eq!(year.savings, 0.0);
        assert_eq!(year.retirement_locked.balance, 100_000.0);
        assert_eq!(year.invested_amount, 100_000.0);
        assert_eq!(year.total_assets, 100_000.0);
    }

    #[test]
    fn partial_year_payroll_deduction_matches_deposit() {
        let mut input = sample_input();
        input.end_age = 30;
        input.main_job_income_gross = 10_000_000.0;
        let mut ideco = product(AccountKind::RetirementLocked, 0.0, 0.0);
        ideco.key = ProductCategory::Ideco;
        ideco.recurring_annual = 1_000_000.0;
        input.products = vec![ideco];
        let start = NaiveDate::from_ymd_opt(2025, 7, 1).unwrap();

        let records = project(&input, start, &fixed_return_paths(&input)).unwrap();
        let year = &records[0];
        // Half a year of pay (5.0M) funds half a year of contributions (0.5M).
        assert_eq!(year.retirement_locked.balance, 500_000.0);
        assert_eq!(year.income, (net_income(9_000_000.0) * 0.5).round());
    }

    #[test]
    fn reemployment_freezes_and_cuts_gross_pay_until_retirement() {
        let mut input = sample_input();
        input.initial_age = 58;
        input.end_age = 65;
        input.retirement_age = 65;
        input.main_job_income_gross = 10_000_000.0;
        input.income_growth_rate = 0.02;
        input.reemployment = Some(Reemployment {
            start_age: 60,
            reduction_rate: 0.3,
        });

        let records = run(&input);
        let self_net: Vec<f64> = records.iter().map(|r| r.income_detail.self_net).collect();
        let at_59 = 10_000_000.0 * (1.0 + 0.02f64).powi(1);
        assert_eq!(self_net[0], net_income(10_000_000.0).round());
        assert_eq!(self_net[1], net_income(at_59).round());
        // The cut applies to gross pay, before tax and social insurance.
        let reemployed = net_income(at_59 * (1.0 - 0.3)).round();
        assert_eq!(self_net[2], reemployed);
        assert_ne!(reemployed, (net_income(at_59) * 0.7).round());
        assert!(self_net[2..7].iter().all(|net| *net == reemployed));
        assert_eq!(self_net[7], 0.0);
    }

    #[test]
    fn retirement_locked_is_never_sold_for_shortfall() {
        let mut input = sample_input();
        input.end_age = 31;
        input.emergency_fund = 1_000_000.0;
        input.living_cost_simple_annual = 2_000_000.0;
        input.products = vec![product(AccountKind::RetirementLocked, 5_000_000.0, 0.0)];
        let records = run(&input);
        assert_eq!(records[0].retirement_locked.balance, 5_000_000.0);
        assert_eq!(records[0].savings, -2_000_000.0);
        assert_eq!(records[1].total_assets, 5_000_000.0 - 4_000_000.0);
    }

    #[test]
    fn partial_first_year_prorates_salary_living_and_growth() {
        let mut input = sample_input();
        input.end_age = 31;
        input.main_job_income_gross = 10_000_000.0;
        input.living_cost_simple_annual = 1_200_000.0;
        input.products = vec![product(AccountKind::Taxable, 1_000_000.0, 0.21)];
        let start = NaiveDate::from_ymd_opt(2025, 7, 15).unwrap();
        let records = project(&input, start, &fixed_return_paths(&input)).unwrap();
        assert_eq!(records[0].income, (7_101_500.0f64 * 0.5).round());
        assert_eq!(records[0].expense, 600_000.0);
        assert_eq!(records[0].taxable.balance, 1_100_000.0);
        assert_eq!(records[1].expense, 1_200_000.0);
        assert_eq!(records[1].year, 2026);
    }

    #[test]
    fn first_year_span_counts_remaining_months() {
        assert_eq!(first_year_span(january()), (1.0, 12));
        let december = NaiveDate::from_ymd_opt(2025, 12, 31).unwrap();
        assert_eq!(first_year_span(december), (1.0 / 12.0, 1));
    }

    #[test]
    fn crash_year_with_total_loss_floors_balance_at_zero() {
        let mut input = sample_input();
        input.end_age = 31;
        input.products = vec![product(AccountKind::Taxable, 1_000_000.0, 0.0)];
        let paths = vec![ReturnSeries {
            returns: vec![-1.5, 0.1],
            crash_years: vec![0],
        }];
        let records = project(&input, january(), &paths).unwrap();
        assert_eq!(records[0].taxable.balance, 0.0);
        assert_eq!(records[1].taxable.balance, 0.0);
    }

    #[test]
    fn inverted_ages_are_rejected_before_projection() {
        let mut input = sample_input();
        input.end_age = 20;
        assert!(matches!(
            project(&input, january(), &[]),
            Err(SimulationError::InvalidAgeRange { .. })
        ));
    }

    #[test]
    fn stochastic_paths_are_drawn_per_product() {
        let mut input = sample_input();
        input.products = vec![
            product(AccountKind::Taxable, 0.0, 0.05),
            product(AccountKind::TaxAdvantaged, 0.0, 0.03),
        ];
        let paths = stochastic_return_paths(&input, &mut ScriptedRandom::constant(0.5));
        assert_eq!(paths.len(), 2);
        assert_eq!(paths[0].returns.len(), input.year_count());
        assert_eq!(paths[0].crash_years, vec![4]);
    }

    fn arb_scenario() -> impl Strategy<Value = (SimulationInput, u64)> {
        (
            20u32..60,
            0u32..30,
            0.0f64..15_000_000.0,
            0.0f64..8_000_000.0,
            0.0f64..20_000_000.0,
            0.0f64..5_000_000.0,
            proptest::collection::vec((0u8..3, 0.0f64..10_000_000.0, 0.0f64..4_000_000.0), 0..4),
            any::<u64>(),
        )
            .prop_map(
                |(initial_age, span, salary, living, savings, floor, holdings, seed)| {
                    let mut input = sample_input();
                    input.initial_age = initial_age;
                    input.end_age = initial_age + span;
                    input.retirement_age = initial_age + span / 2;
                    input.main_job_income_gross = salary;
                    input.living_cost_simple_annual = living;
                    input.current_savings = savings;
                    input.emergency_fund = floor;
                    input.products = holdings
                        .into_iter()
                        .map(|(kind, balance, recurring)| {
                            let account = match kind {
                                0 => AccountKind::Taxable,
                                1 => AccountKind::TaxAdvantaged,
                                _ => AccountKind::RetirementLocked,
                            };
                            let mut p = product(account, balance.min(6_000_000.0), 0.05);
                            p.recurring_annual = recurring;
                            p
                        })
                        .collect();
                    (input, seed)
                },
            )
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(48))]

        #[test]
        fn prop_projection_invariants_hold(
            (input, seed) in arb_scenario(),
        ) {
            let paths = stochastic_return_paths(&input, &mut SeededRandom::new(seed));
            let records = project(&input, january(), &paths).unwrap();

            prop_assert_eq!(records.len(), (input.end_age - input.initial_age + 1) as usize);
            for (i, r) in records.iter().enumerate() {
                prop_assert_eq!(r.age, input.initial_age + i as u32);
                let identity = r.savings
                    + r.taxable.balance
                    + r.tax_advantaged.balance
                    + r.retirement_locked.balance;
                prop_assert_eq!(r.total_assets, identity);
                prop_assert!(r.products.values().all(|b| b.balance >= 0.0));
                prop_assert!(r.tax_advantaged_contributed <= LIFETIME_TAX_ADVANTAGED_CAP);
                prop_assert!(r.total_assets.is_finite());
            }
        }
    }
}
