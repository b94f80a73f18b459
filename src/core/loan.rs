use super::types::CarLoanType;

pub const BANK_CAR_LOAN_RATE: f64 = 0.015;
pub const DEALER_CAR_LOAN_RATE: f64 = 0.045;
pub const GENERAL_CAR_LOAN_RATE: f64 = 0.025;
pub const DEFAULT_CAR_LOAN_YEARS: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Repayment {
    pub annual_payment: f64,
    pub total_repayment: f64,
}

impl Repayment {
    const NONE: Repayment = Repayment {
        annual_payment: 0.0,
        total_repayment: 0.0,
    };
}

/// Level repayment for a loan compounded monthly. Degenerate terms yield a zero schedule.
pub fn annuity(principal: f64, annual_rate: f64, years: u32) -> Repayment {
    if !principal.is_finite() || principal <= 0.0 || !annual_rate.is_finite() || annual_rate < 0.0
    {
        return Repayment::NONE;
    }
    if years == 0 {
        return Repayment::NONE;
    }
    let years_f = f64::from(years);
    if annual_rate == 0.0 {
        return Repayment {
            annual_payment: principal / years_f,
            total_repayment: principal,
        };
    }
    let monthly_rate = annual_rate / 12.0;
    let months = years_f * 12.0;
    let growth = (1.0 + monthly_rate).powf(months);
    // Very long terms converge to interest-only payments.
    let monthly_payment = if growth.is_finite() {
        principal * monthly_rate * growth / (growth - 1.0)
    } else {
        principal * monthly_rate
    };
    let annual_payment = monthly_payment * 12.0;
    Repayment {
        annual_payment,
        total_repayment: annual_payment * years_f,
    }
}

pub fn car_loan_rate(loan_type: Option<CarLoanType>) -> f64 {
    match loan_type {
        Some(CarLoanType::Bank) => BANK_CAR_LOAN_RATE,
        Some(CarLoanType::Dealer) => DEALER_CAR_LOAN_RATE,
        None => GENERAL_CAR_LOAN_RATE,
    }
}
