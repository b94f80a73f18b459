//! Per-year schedules for life events: what each plan costs or pays out at a given age.
//!
//! Everything here is a pure function of the scenario and a [`YearContext`]. Recurring
//! costs (living, rent, mortgage, care) are prorated by `year_fraction`; one-off events
//! and the age-banded education table are charged in full.

use super::loan::{annuity, car_loan_rate, DEFAULT_CAR_LOAN_YEARS};
use super::tax::{net_income, net_retirement_allowance};
use super::types::{
    AppliancePlan, CarPlan, CarePlan, ChildrenPlan, EducationPattern, ExpenseDetail, HousingPlan,
    HousingType, IncomeDetail, LumpSum, MarriagePlan, PersonalPensionKind, PersonalPensionPlan,
    Reemployment, RetirementAllowance, SimulationInput,
};

pub const TEN_THOUSAND: f64 = 10_000.0;
pub const CHILD_SPACING_YEARS: u32 = 3;
pub const EDUCATION_END_AGE: u32 = 22;

/// Annual cost per child in units of 10,000, for ages 0-6, 7-12, 13-15, 16-18, 19-22.
const EDUCATION_PUBLIC: [f64; 5] = [22.0, 33.0, 44.0, 55.0, 88.0];
const EDUCATION_MIXED: [f64; 5] = [35.0, 53.0, 70.0, 88.0, 141.0];
const EDUCATION_PRIVATE: [f64; 5] = [44.0, 66.0, 88.0, 110.0, 176.0];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YearContext {
    /// Years elapsed since the first simulated year.
    pub index: u32,
    pub age: u32,
    pub spouse_age: Option<u32>,
    pub year_fraction: f64,
    /// Months simulated in the first year.
    pub first_year_months: u32,
    pub married: bool,
}

impl YearContext {
    pub fn new(
        input: &SimulationInput,
        index: u32,
        year_fraction: f64,
        first_year_months: u32,
    ) -> Self {
        let age = input.initial_age.saturating_add(index);
        let married_by_event = input.marriage.as_ref().is_some_and(|m| age >= m.age);
        let spouse_age = match input.spouse_initial_age {
            Some(initial) => Some(initial.saturating_add(index)),
            None => input.marriage.as_ref().and_then(|m| {
                let spouse = m.spouse.as_ref()?;
                age.checked_sub(m.age)
                    .map(|since| spouse.age_at_marriage.saturating_add(since))
            }),
        };
        Self {
            index,
            age,
            spouse_age,
            year_fraction: if index == 0 { year_fraction } else { 1.0 },
            first_year_months,
            married: input.spouse_initial_age.is_some() || married_by_event,
        }
    }

    /// Months elapsed before this year began.
    fn months_before(&self) -> u32 {
        match self.index {
            0 => 0,
            i => self.first_year_months + 12 * (i - 1),
        }
    }

    fn months_this_year(&self) -> u32 {
        if self.index == 0 { self.first_year_months } else { 12 }
    }
}

/// One earner's salary stream.
#[derive(Debug, Clone, Copy)]
pub struct Earner<'a> {
    pub main_gross: f64,
    pub side_gross: f64,
    pub growth_rate: f64,
    /// Age at which `main_gross` applies; growth compounds from here.
    pub base_age: u32,
    pub retirement_age: u32,
    pub reemployment: Option<&'a Reemployment>,
}

impl Earner<'_> {
    pub fn gross_salary(&self, age: u32) -> f64 {
        if age >= self.retirement_age || age < self.base_age {
            return 0.0;
        }
        let main = match self.reemployment {
            Some(rule) if age >= rule.start_age => {
                if rule.start_age <= self.base_age {
                    self.main_gross
                } else {
                    let frozen_years = (rule.start_age - 1 - self.base_age) as i32;
                    self.main_gross
                        * (1.0 + self.growth_rate).powi(frozen_years)
                        * (1.0 - rule.reduction_rate.clamp(0.0, 1.0))
                }
            }
            _ => self.main_gross * (1.0 + self.growth_rate).powi((age - self.base_age) as i32),
        };
        main.max(0.0) + self.side_gross.max(0.0)
    }
}

pub fn self_earner(input: &SimulationInput) -> Earner<'_> {
    Earner {
        main_gross: input.main_job_income_gross,
        side_gross: input.side_job_income_gross,
        growth_rate: input.income_growth_rate,
        base_age: input.initial_age,
        retirement_age: input.retirement_age,
        reemployment: input.reemployment.as_ref(),
    }
}

/// The spouse's salary stream, if a spouse is part of the household at any point.
pub fn spouse_earner(input: &SimulationInput) -> Option<Earner<'_>> {
    let retirement_age = input.spouse_retirement_age.unwrap_or(input.retirement_age);
    let reemployment = input.spouse_reemployment.as_ref();
    if let Some(initial) = input.spouse_initial_age {
        return Some(Earner {
            main_gross: input.spouse_main_job_income_gross,
            side_gross: input.spouse_side_job_income_gross,
            growth_rate: input.spouse_income_growth_rate,
            base_age: initial,
            retirement_age,
            reemployment,
        });
    }
    let marriage = input.marriage.as_ref()?;
    let spouse = marriage.spouse.as_ref()?;
    Some(Earner {
        main_gross: spouse.income_gross,
        side_gross: 0.0,
        growth_rate: input.spouse_income_growth_rate,
        base_age: spouse.age_at_marriage,
        retirement_age,
        reemployment,
    })
}

fn personal_pension_income(plans: &[PersonalPensionPlan], age: u32) -> (f64, f64) {
    let mut annual = 0.0;
    let mut one_time = 0.0;
    for plan in plans {
        match plan.kind {
            PersonalPensionKind::LumpSum if age == plan.start_age => one_time += plan.amount,
            PersonalPensionKind::FixedTerm => {
                let duration = plan.duration.unwrap_or(0);
                if age >= plan.start_age && age < plan.start_age.saturating_add(duration) {
                    annual += plan.amount;
                }
            }
            PersonalPensionKind::LifeTime if age >= plan.start_age => annual += plan.amount,
            _ => {}
        }
    }
    (annual.max(0.0), one_time.max(0.0))
}

fn lump_sum_income(
    lump_sums: &[LumpSum],
    allowance: Option<&RetirementAllowance>,
    age: u32,
) -> f64 {
    let others: f64 = lump_sums
        .iter()
        .filter(|l| l.age == age)
        .map(|l| l.amount.max(0.0))
        .sum();
    let allowance = allowance
        .filter(|a| a.age == age)
        .map_or(0.0, |a| net_retirement_allowance(a.amount, a.years_of_service));
    others + allowance
}

/// Income for one year. `self_payroll_deduction` is deducted from self gross pay before the
/// net conversion (retirement-locked contributions).
pub fn income_for_year(
    input: &SimulationInput,
    ctx: &YearContext,
    self_payroll_deduction: f64,
) -> IncomeDetail {
    let self_gross = self_earner(input).gross_salary(ctx.age);
    let self_net = if self_gross > 0.0 {
        net_income((self_gross - self_payroll_deduction).max(0.0)) * ctx.year_fraction
    } else {
        0.0
    };

    let spouse_net = match (ctx.married, ctx.spouse_age, spouse_earner(input)) {
        (true, Some(spouse_age), Some(earner)) => {
            net_income(earner.gross_salary(spouse_age)) * ctx.year_fraction
        }
        _ => 0.0,
    };

    let mut public_pension = 0.0;
    if ctx.age >= input.pension_start_age {
        public_pension += input.pension_annual.max(0.0);
    }
    if let (true, Some(spouse_age)) = (ctx.married, ctx.spouse_age) {
        let spouse_start = input
            .spouse_pension_start_age
            .unwrap_or(input.pension_start_age);
        if spouse_age >= spouse_start {
            public_pension += input.spouse_pension_annual.max(0.0);
        }
    }

    let (self_annual, self_lump) = personal_pension_income(&input.personal_pension_plans, ctx.age);
    let (spouse_annual, spouse_lump) = match (ctx.married, ctx.spouse_age) {
        (true, Some(spouse_age)) => {
            personal_pension_income(&input.spouse_personal_pension_plans, spouse_age)
        }
        _ => (0.0, 0.0),
    };

    let mut one_time = self_lump
        + lump_sum_income(
            &input.other_lump_sums,
            input.retirement_income.as_ref(),
            ctx.age,
        );
    if let (true, Some(spouse_age)) = (ctx.married, ctx.spouse_age) {
        one_time += spouse_lump
            + lump_sum_income(
                &input.spouse_other_lump_sums,
                input.spouse_retirement_income.as_ref(),
                spouse_age,
            );
    }

    IncomeDetail {
        self_net,
        spouse: spouse_net,
        public_pension,
        personal_pension: self_annual + spouse_annual,
        one_time,
    }
}

pub fn living_expense(input: &SimulationInput, ctx: &YearContext) -> f64 {
    let annual = if ctx.age >= input.retirement_age {
        input.post_retirement_living_annual
    } else {
        match input.marriage.as_ref() {
            Some(m) if ctx.age >= m.age => m
                .new_living_cost_annual
                .unwrap_or_else(|| input.pre_retirement_living_annual()),
            _ => input.pre_retirement_living_annual(),
        }
    };
    annual.max(0.0) * ctx.year_fraction
}

/// Years elapsed `k` is an occurrence of a schedule that starts at `first` and repeats every
/// `cycle` years (`cycle == 0` means once).
fn on_cycle(k: u32, first: u32, cycle: u32) -> bool {
    match k.checked_sub(first) {
        Some(0) => true,
        Some(since) => cycle > 0 && since % cycle == 0,
        None => false,
    }
}

pub fn car_expense(plan: &CarPlan, ctx: &YearContext) -> f64 {
    let mut total = 0.0;

    if let Some(loan) = plan.current_loan.as_ref() {
        let left = loan.remaining_months.saturating_sub(ctx.months_before());
        total += f64::from(left.min(ctx.months_this_year())) * loan.monthly_payment.max(0.0);
    }

    if plan.price > 0.0 {
        if plan.loan.enabled {
            let years = plan.loan.years.filter(|y| *y > 0).unwrap_or(DEFAULT_CAR_LOAN_YEARS);
            let payment = annuity(plan.price, car_loan_rate(plan.loan.loan_type), years).annual_payment;
            // Overlapping loans from consecutive replacements are each paid.
            let active = (0..=ctx.index)
                .filter(|&k| on_cycle(k, plan.first_after_years, plan.frequency_years))
                .filter(|&k| ctx.index - k < years)
                .count();
            total += payment * active as f64;
        } else if on_cycle(ctx.index, plan.first_after_years, plan.frequency_years) {
            total += plan.price;
        }
    }

    total
}

pub fn housing_expense(
    plan: &HousingPlan,
    marriage: Option<&MarriagePlan>,
    ctx: &YearContext,
) -> f64 {
    let mut total = 0.0;
    let purchased = plan
        .purchase_plan
        .as_ref()
        .is_some_and(|p| ctx.age >= p.age);

    if plan.housing_type == HousingType::Rent && !purchased {
        let rent = match marriage {
            Some(m) if ctx.age >= m.age => m.new_housing_cost_annual.unwrap_or(plan.rent_annual),
            _ => plan.rent_annual,
        };
        total += rent.max(0.0) * ctx.year_fraction;
    }

    if plan.housing_type == HousingType::OwnedWithLoan {
        if let Some(loan) = plan.current_loan.as_ref() {
            let left = loan
                .remaining_years
                .saturating_mul(12)
                .saturating_sub(ctx.months_before());
            let months = left.min(ctx.months_this_year());
            total += loan.annual_payment.max(0.0) * f64::from(months) / 12.0;
        }
    }

    if let Some(purchase) = plan.purchase_plan.as_ref() {
        if ctx.age == purchase.age {
            total += purchase.down_payment.max(0.0);
        }
        let financed = (purchase.price - purchase.down_payment).max(0.0);
        if ctx.age >= purchase.age && ctx.age < purchase.age.saturating_add(purchase.years) {
            total += annuity(financed, purchase.rate, purchase.years).annual_payment;
        }
    }

    for renovation in &plan.renovations {
        let cycle = renovation.cycle_years.unwrap_or(0);
        if on_cycle(ctx.age, renovation.age, cycle) {
            total += renovation.cost.max(0.0);
        }
    }

    total
}

pub fn marriage_expense(plan: Option<&MarriagePlan>, ctx: &YearContext) -> f64 {
    plan.filter(|m| m.age == ctx.age)
        .map_or(0.0, |m| m.one_time_cost().max(0.0))
}

pub fn education_cost(pattern: EducationPattern, child_age: u32) -> f64 {
    let table = match pattern {
        EducationPattern::Public => &EDUCATION_PUBLIC,
        EducationPattern::Mixed => &EDUCATION_MIXED,
        EducationPattern::Private => &EDUCATION_PRIVATE,
    };
    let band = match child_age {
        0..=6 => 0,
        7..=12 => 1,
        13..=15 => 2,
        16..=18 => 3,
        19..=EDUCATION_END_AGE => 4,
        _ => return 0.0,
    };
    table[band] * TEN_THOUSAND
}

pub fn children_expense(plan: Option<&ChildrenPlan>, ctx: &YearContext) -> f64 {
    let Some(plan) = plan else {
        return 0.0;
    };
    (0..plan.count)
        .map(|k| plan.first_born_age.saturating_add(CHILD_SPACING_YEARS.saturating_mul(k)))
        .take_while(|born| *born <= ctx.age)
        .map(|born| ctx.age - born)
        .map(|child_age| education_cost(plan.education_pattern, child_age))
        .sum()
}

pub fn appliance_expense(plans: &[AppliancePlan], ctx: &YearContext) -> f64 {
    plans
        .iter()
        .filter(|a| a.cost > 0.0)
        .filter(|a| on_cycle(ctx.index, a.first_after_years, a.cycle_years))
        .map(|a| a.cost)
        .sum()
}

pub fn care_expense(plans: &[CarePlan], ctx: &YearContext) -> f64 {
    plans
        .iter()
        .filter(|c| {
            let parent_age = c.parent_current_age.saturating_add(ctx.index);
            parent_age >= c.parent_care_start_age
                && parent_age < c.parent_care_start_age.saturating_add(c.years)
        })
        .map(|c| c.annual_cost.max(0.0) * ctx.year_fraction)
        .sum()
}

pub fn expenses_for_year(input: &SimulationInput, ctx: &YearContext) -> ExpenseDetail {
    ExpenseDetail {
        living: living_expense(input, ctx),
        car: car_expense(&input.car, ctx),
        housing: housing_expense(&input.housing, input.marriage.as_ref(), ctx),
        marriage: marriage_expense(input.marriage.as_ref(), ctx),
        children: children_expense(input.children.as_ref(), ctx),
        appliances: appliance_expense(&input.appliances, ctx),
        care: care_expense(&input.cares, ctx),
    }
}

#[cfg(test)]
pub(crate) fn sample_input() -> SimulationInput {
    serde_json::from_value(serde_json::json!({
        "initialAge": 30,
        "endAge": 40,
        "retirementAge": 65,
    }))
    .expect("minimal input")
}
