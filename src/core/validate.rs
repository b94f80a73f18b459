use std::collections::HashSet;

use super::engine::lifetime_tax_advantaged_cap;
use super::error::SimulationError;
use super::types::{AccountKind, InvestmentProduct, SimulationInput};

/// Accepted range for the household's current ages.
pub const MIN_INITIAL_AGE: u32 = 18;
pub const MAX_INITIAL_AGE: u32 = 99;
/// Upper bound for every other age and for durations measured in years.
pub const MAX_PROJECTION_AGE: u32 = 120;

fn require_finite(field: &str, value: f64) -> Result<(), SimulationError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(SimulationError::invalid_field(field, "must be a finite number"))
    }
}

fn require_within(field: &str, value: u32, min: u32, max: u32) -> Result<(), SimulationError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(SimulationError::invalid_field(
            field,
            format!("must be between {min} and {max}"),
        ))
    }
}

fn require_at_most(field: &str, value: u32) -> Result<(), SimulationError> {
    require_within(field, value, 0, MAX_PROJECTION_AGE)
}

fn require_non_negative(field: &str, value: f64) -> Result<(), SimulationError> {
    require_finite(field, value)?;
    if value < 0.0 {
        return Err(SimulationError::invalid_field(field, "must not be negative"));
    }
    Ok(())
}

/// Rejects scenarios the projection cannot run. Nothing is computed before this passes.
pub fn validate_input(input: &SimulationInput) -> Result<(), SimulationError> {
    if input.end_age < input.initial_age {
        return Err(SimulationError::InvalidAgeRange {
            initial_age: input.initial_age,
            end_age: input.end_age,
        });
    }
    validate_ages(input)?;

    for (field, value) in [
        ("mainJobIncomeGross", input.main_job_income_gross),
        ("sideJobIncomeGross", input.side_job_income_gross),
        ("spouseMainJobIncomeGross", input.spouse_main_job_income_gross),
        ("spouseSideJobIncomeGross", input.spouse_side_job_income_gross),
        ("livingCostSimpleAnnual", input.living_cost_simple_annual),
        ("detailedFixedAnnual", input.detailed_fixed_annual),
        ("detailedVariableAnnual", input.detailed_variable_annual),
        ("postRetirementLivingAnnual", input.post_retirement_living_annual),
        ("pensionAnnual", input.pension_annual),
        ("spousePensionAnnual", input.spouse_pension_annual),
        ("emergencyFund", input.emergency_fund),
    ] {
        require_non_negative(field, value)?;
    }
    require_finite("currentSavings", input.current_savings)?;
    require_finite("incomeGrowthRate", input.income_growth_rate)?;
    require_finite("spouseIncomeGrowthRate", input.spouse_income_growth_rate)?;

    for (field, rule) in [
        ("reemployment", input.reemployment.as_ref()),
        ("spouseReemployment", input.spouse_reemployment.as_ref()),
    ] {
        if let Some(rule) = rule {
            if !(0.0..=1.0).contains(&rule.reduction_rate) {
                return Err(SimulationError::invalid_field(
                    format!("{field}.reductionRate"),
                    "must be between 0 and 1",
                ));
            }
        }
    }

    for (i, product) in input.products.iter().enumerate() {
        validate_product(i, product)?;
    }

    let tax_advantaged_principal: f64 = input
        .products
        .iter()
        .filter(|p| p.account == AccountKind::TaxAdvantaged)
        .map(|p| p.current_balance)
        .sum();
    let cap = lifetime_tax_advantaged_cap(input.use_spouse_nisa);
    if tax_advantaged_principal > cap {
        return Err(SimulationError::TaxAdvantagedCapExceeded {
            principal: tax_advantaged_principal,
            cap,
        });
    }

    resolve_product_ids(&input.products)?;
    Ok(())
}

fn validate_ages(input: &SimulationInput) -> Result<(), SimulationError> {
    require_within("initialAge", input.initial_age, MIN_INITIAL_AGE, MAX_INITIAL_AGE)?;
    if let Some(age) = input.spouse_initial_age {
        require_within("spouseInitialAge", age, MIN_INITIAL_AGE, MAX_INITIAL_AGE)?;
    }
    require_at_most("endAge", input.end_age)?;
    require_at_most("retirementAge", input.retirement_age)?;

    let housing = &input.housing;
    let mut terms = vec![
        (
            "housing.currentLoan.remainingYears".to_string(),
            housing.current_loan.as_ref().map(|l| l.remaining_years),
        ),
        (
            "housing.purchasePlan.years".to_string(),
            housing.purchase_plan.as_ref().map(|p| p.years),
        ),
        ("car.loan.years".to_string(), input.car.loan.years),
        (
            "children.count".to_string(),
            input.children.as_ref().map(|c| c.count),
        ),
    ];
    for (list, plans) in [
        ("personalPensionPlans", &input.personal_pension_plans),
        ("spousePersonalPensionPlans", &input.spouse_personal_pension_plans),
    ] {
        for (i, plan) in plans.iter().enumerate() {
            terms.push((format!("{list}[{i}].duration"), plan.duration));
        }
    }
    for (i, care) in input.cares.iter().enumerate() {
        terms.push((format!("cares[{i}].years"), Some(care.years)));
    }
    for (field, value) in terms {
        if let Some(value) = value {
            require_at_most(&field, value)?;
        }
    }
    Ok(())
}

fn validate_product(index: usize, product: &InvestmentProduct) -> Result<(), SimulationError> {
    let field = |name: &str| format!("products[{index}].{name}");
    require_non_negative(&field("currentBalance"), product.current_balance)?;
    require_non_negative(&field("recurringAnnual"), product.recurring_annual)?;
    require_non_negative(&field("spotAnnual"), product.spot_annual)?;
    require_finite(&field("expectedReturn"), product.expected_return)?;
    if product.expected_return <= -1.0 {
        return Err(SimulationError::invalid_field(
            field("expectedReturn"),
            "must be greater than -1",
        ));
    }
    Ok(())
}

/// Stable identity per product: the explicit `id`, or `{category}-{index}` when absent.
pub fn resolve_product_ids(products: &[InvestmentProduct]) -> Result<Vec<String>, SimulationError> {
    let mut seen = HashSet::new();
    let mut ids = Vec::with_capacity(products.len());
    for (i, product) in products.iter().enumerate() {
        let id = match product.id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => format!("{}-{i}", product.key.as_str()),
        };
        if !seen.insert(id.clone()) {
            return Err(SimulationError::DuplicateProductId(id));
        }
        ids.push(id);
    }
    Ok(ids)
}
