//! Japanese employment-income taxation: gross salary to take-home pay, plus the separate
//! treatment of retirement allowances.

pub const SOCIAL_INSURANCE_RATE: f64 = 0.15;
pub const BASIC_DEDUCTION: f64 = 480_000.0;
pub const RESIDENT_TAX_RATE: f64 = 0.10;
pub const RESIDENT_TAX_FIXED: f64 = 5_000.0;
pub const CAPITAL_GAINS_TAX_RATE: f64 = 0.20315;

/// Upper bound, rate, fixed subtraction.
const INCOME_TAX_BRACKETS: [(f64, f64, f64); 7] = [
    (1_950_000.0, 0.05, 0.0),
    (3_300_000.0, 0.10, 97_500.0),
    (6_950_000.0, 0.20, 427_500.0),
    (9_000_000.0, 0.23, 636_000.0),
    (18_000_000.0, 0.33, 1_536_000.0),
    (40_000_000.0, 0.40, 2_796_000.0),
    (f64::INFINITY, 0.45, 4_796_000.0),
];

pub fn salary_income_deduction(gross: f64) -> f64 {
    if gross <= 1_625_000.0 {
        550_000.0
    } else if gross <= 1_800_000.0 {
        gross * 0.4 - 100_000.0
    } else if gross <= 3_600_000.0 {
        gross * 0.3 + 80_000.0
    } else if gross <= 6_600_000.0 {
        gross * 0.2 + 440_000.0
    } else if gross <= 8_500_000.0 {
        gross * 0.1 + 1_100_000.0
    } else {
        1_950_000.0
    }
}

pub fn progressive_income_tax(taxable: f64) -> f64 {
    if taxable <= 0.0 {
        return 0.0;
    }
    let (_, rate, fixed) = INCOME_TAX_BRACKETS
        .iter()
        .copied()
        .find(|(upper, _, _)| taxable <= *upper)
        .unwrap_or(INCOME_TAX_BRACKETS[INCOME_TAX_BRACKETS.len() - 1]);
    (taxable * rate - fixed).max(0.0)
}

/// Annual take-home pay for one earner. Non-finite or negative gross is treated as zero.
pub fn net_income(gross: f64) -> f64 {
    if !gross.is_finite() || gross <= 0.0 {
        return 0.0;
    }
    let social_insurance = gross * SOCIAL_INSURANCE_RATE;
    let taxable =
        (gross - salary_income_deduction(gross) - social_insurance - BASIC_DEDUCTION).max(0.0);
    let income_tax = progressive_income_tax(taxable);
    let resident_tax = taxable * RESIDENT_TAX_RATE + RESIDENT_TAX_FIXED;
    (gross - social_insurance - income_tax - resident_tax).max(0.0)
}

pub fn retirement_allowance_deduction(years_of_service: u32) -> f64 {
    let years = f64::from(years_of_service);
    let deduction = if years_of_service <= 20 {
        400_000.0 * years
    } else {
        8_000_000.0 + 700_000.0 * (years - 20.0)
    };
    deduction.max(800_000.0)
}

/// Take-home amount of a retirement allowance: only half of the amount above the service-years
/// deduction is taxed, with no social insurance.
pub fn net_retirement_allowance(amount: f64, years_of_service: u32) -> f64 {
    if !amount.is_finite() || amount <= 0.0 {
        return 0.0;
    }
    let taxable = ((amount - retirement_allowance_deduction(years_of_service)) * 0.5).max(0.0);
    let tax = progressive_income_tax(taxable) + taxable * RESIDENT_TAX_RATE;
    (amount - tax).max(0.0)
}
