use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProductCategory {
    Stocks,
    Trust,
    Bonds,
    Crypto,
    Ideco,
    #[serde(alias = "worldStock", alias = "world_stock")]
    WorldStock,
    Other,
}

impl ProductCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            ProductCategory::Stocks => "stocks",
            ProductCategory::Trust => "trust",
            ProductCategory::Bonds => "bonds",
            ProductCategory::Crypto => "crypto",
            ProductCategory::Ideco => "ideco",
            ProductCategory::WorldStock => "world-stock",
            ProductCategory::Other => "other",
        }
    }

    /// Annual return volatility used when the stochastic scenario is active.
    pub fn volatility(self) -> f64 {
        match self {
            ProductCategory::Stocks => 0.20,
            ProductCategory::Trust | ProductCategory::WorldStock | ProductCategory::Ideco => 0.18,
            ProductCategory::Bonds => 0.05,
            ProductCategory::Crypto => 0.80,
            ProductCategory::Other => 0.10,
        }
    }
}

/// Tax classification of a holding. Withdrawal priority follows declaration order.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccountKind {
    #[serde(alias = "課税")]
    Taxable,
    #[serde(alias = "taxAdvantaged", alias = "nisa", alias = "非課税")]
    TaxAdvantaged,
    #[serde(alias = "retirementLocked", alias = "ideco", alias = "iDeCo")]
    RetirementLocked,
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum InterestScenario {
    #[default]
    #[serde(alias = "固定利回り")]
    Fixed,
    #[serde(alias = "stochastic", alias = "ランダム変動")]
    Random,
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpenseMode {
    #[default]
    Simple,
    Detailed,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EducationPattern {
    #[serde(alias = "公立中心")]
    Public,
    #[serde(alias = "公私混合")]
    Mixed,
    #[serde(alias = "私立中心")]
    Private,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CarLoanType {
    #[serde(alias = "銀行ローン")]
    Bank,
    #[serde(alias = "ディーラーローン")]
    Dealer,
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum HousingType {
    #[default]
    #[serde(alias = "賃貸")]
    Rent,
    #[serde(alias = "ownedWithLoan", alias = "持ち家（ローン中）")]
    OwnedWithLoan,
    #[serde(alias = "ownedOutright", alias = "持ち家（完済）")]
    OwnedOutright,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PersonalPensionKind {
    LumpSum,
    FixedTerm,
    LifeTime,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reemployment {
    #[serde(default = "default_reemployment_start_age")]
    pub start_age: u32,
    pub reduction_rate: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CarLoan {
    #[serde(rename = "use")]
    pub enabled: bool,
    pub years: Option<u32>,
    #[serde(rename = "type")]
    pub loan_type: Option<CarLoanType>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentCarLoan {
    #[serde(alias = "monthlyPaymentJPY")]
    pub monthly_payment: f64,
    pub remaining_months: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CarPlan {
    #[serde(alias = "priceJPY")]
    pub price: f64,
    pub first_after_years: u32,
    pub frequency_years: u32,
    pub loan: CarLoan,
    pub current_loan: Option<CurrentCarLoan>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentMortgage {
    pub annual_payment: f64,
    pub remaining_years: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchasePlan {
    pub age: u32,
    #[serde(alias = "priceJPY")]
    pub price: f64,
    #[serde(alias = "downPaymentJPY")]
    pub down_payment: f64,
    pub years: u32,
    pub rate: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Renovation {
    pub age: u32,
    #[serde(alias = "costJPY")]
    pub cost: f64,
    #[serde(default)]
    pub cycle_years: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HousingPlan {
    #[serde(rename = "type")]
    pub housing_type: HousingType,
    pub rent_annual: f64,
    pub current_loan: Option<CurrentMortgage>,
    pub purchase_plan: Option<PurchasePlan>,
    pub renovations: Vec<Renovation>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarriageSpouse {
    pub age_at_marriage: u32,
    #[serde(default)]
    pub income_gross: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarriagePlan {
    pub age: u32,
    #[serde(default, alias = "engagementJPY")]
    pub engagement: f64,
    #[serde(default, alias = "weddingJPY")]
    pub wedding: f64,
    #[serde(default, alias = "honeymoonJPY")]
    pub honeymoon: f64,
    #[serde(default, alias = "movingJPY")]
    pub moving: f64,
    #[serde(default)]
    pub spouse: Option<MarriageSpouse>,
    #[serde(default)]
    pub new_living_cost_annual: Option<f64>,
    #[serde(default)]
    pub new_housing_cost_annual: Option<f64>,
}

impl MarriagePlan {
    pub fn one_time_cost(&self) -> f64 {
        self.engagement + self.wedding + self.honeymoon + self.moving
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildrenPlan {
    pub count: u32,
    /// Parent's age when the first child is born; later children follow every three years.
    pub first_born_age: u32,
    pub education_pattern: EducationPattern,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliancePlan {
    #[serde(default)]
    pub name: String,
    pub cycle_years: u32,
    #[serde(default)]
    pub first_after_years: u32,
    pub cost: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CarePlan {
    pub parent_current_age: u32,
    pub parent_care_start_age: u32,
    pub years: u32,
    pub annual_cost: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetirementAllowance {
    #[serde(alias = "amountJPY")]
    pub amount: f64,
    pub age: u32,
    #[serde(default)]
    pub years_of_service: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalPensionPlan {
    #[serde(rename = "type")]
    pub kind: PersonalPensionKind,
    /// Total for `lumpSum`, annual amount otherwise.
    #[serde(alias = "amountJPY")]
    pub amount: f64,
    pub start_age: u32,
    #[serde(default)]
    pub duration: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LumpSum {
    #[serde(default)]
    pub name: String,
    #[serde(alias = "amountJPY")]
    pub amount: f64,
    pub age: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StressTest {
    pub enabled: bool,
    pub seed: Option<u64>,
}

/// Verification hook: replaces the computed total income at the listed ages.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TestOverrides {
    pub income: BTreeMap<u32, f64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvestmentProduct {
    /// Stable identity; generated as `{key}-{index}` when absent.
    #[serde(default)]
    pub id: Option<String>,
    pub key: ProductCategory,
    pub account: AccountKind,
    #[serde(default, alias = "currentJPY")]
    pub current_balance: f64,
    #[serde(default, alias = "recurringJPY")]
    pub recurring_annual: f64,
    #[serde(default, alias = "spotJPY")]
    pub spot_annual: f64,
    #[serde(default)]
    pub expected_return: f64,
}

impl InvestmentProduct {
    /// Recurring contributions scale with the simulated share of the year, spot ones do not.
    pub fn requested_contribution(&self, year_fraction: f64) -> f64 {
        (self.recurring_annual.max(0.0) * year_fraction + self.spot_annual.max(0.0)).max(0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationInput {
    pub initial_age: u32,
    #[serde(default)]
    pub spouse_initial_age: Option<u32>,
    pub end_age: u32,
    pub retirement_age: u32,
    #[serde(default)]
    pub spouse_retirement_age: Option<u32>,
    #[serde(default = "default_pension_start_age")]
    pub pension_start_age: u32,
    #[serde(default)]
    pub spouse_pension_start_age: Option<u32>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,

    #[serde(default)]
    pub main_job_income_gross: f64,
    #[serde(default)]
    pub side_job_income_gross: f64,
    #[serde(default)]
    pub spouse_main_job_income_gross: f64,
    #[serde(default)]
    pub spouse_side_job_income_gross: f64,
    #[serde(default)]
    pub income_growth_rate: f64,
    #[serde(default)]
    pub spouse_income_growth_rate: f64,
    #[serde(default)]
    pub reemployment: Option<Reemployment>,
    #[serde(default)]
    pub spouse_reemployment: Option<Reemployment>,

    #[serde(default)]
    pub expense_mode: ExpenseMode,
    #[serde(default)]
    pub living_cost_simple_annual: f64,
    #[serde(default)]
    pub detailed_fixed_annual: f64,
    #[serde(default)]
    pub detailed_variable_annual: f64,
    #[serde(default)]
    pub post_retirement_living_annual: f64,

    #[serde(default)]
    pub car: CarPlan,
    #[serde(default)]
    pub housing: HousingPlan,
    #[serde(default)]
    pub marriage: Option<MarriagePlan>,
    #[serde(default)]
    pub children: Option<ChildrenPlan>,
    #[serde(default)]
    pub appliances: Vec<AppliancePlan>,
    #[serde(default)]
    pub cares: Vec<CarePlan>,

    #[serde(default)]
    pub pension_annual: f64,
    #[serde(default)]
    pub spouse_pension_annual: f64,
    #[serde(default)]
    pub retirement_income: Option<RetirementAllowance>,
    #[serde(default)]
    pub spouse_retirement_income: Option<RetirementAllowance>,
    #[serde(default)]
    pub personal_pension_plans: Vec<PersonalPensionPlan>,
    #[serde(default)]
    pub spouse_personal_pension_plans: Vec<PersonalPensionPlan>,
    #[serde(default)]
    pub other_lump_sums: Vec<LumpSum>,
    #[serde(default)]
    pub spouse_other_lump_sums: Vec<LumpSum>,

    #[serde(default, alias = "currentSavingsJPY")]
    pub current_savings: f64,
    #[serde(default, alias = "emergencyFundJPY")]
    pub emergency_fund: f64,
    #[serde(default)]
    pub products: Vec<InvestmentProduct>,
    #[serde(default)]
    pub use_spouse_nisa: bool,
    #[serde(default)]
    pub interest_scenario: InterestScenario,
    #[serde(default)]
    pub stress_test: StressTest,

    #[serde(default, alias = "_testOverrides")]
    pub test_overrides: Option<TestOverrides>,
}

impl SimulationInput {
    pub fn pre_retirement_living_annual(&self) -> f64 {
        match self.expense_mode {
            ExpenseMode::Simple => self.living_cost_simple_annual,
            ExpenseMode::Detailed => self.detailed_fixed_annual + self.detailed_variable_annual,
        }
    }

    pub fn is_stochastic(&self) -> bool {
        self.interest_scenario == InterestScenario::Random
    }

    pub fn year_count(&self) -> usize {
        self.end_age.saturating_sub(self.initial_age) as usize + 1
    }
}

fn default_pension_start_age() -> u32 {
    65
}

fn default_reemployment_start_age() -> u32 {
    60
}

/// Cost basis and market value of one holding.
#[derive(Copy, Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct AccountBucket {
    pub principal: f64,
    pub balance: f64,
}

impl AccountBucket {
    pub fn opened_at(balance: f64) -> Self {
        let balance = balance.max(0.0);
        Self {
            principal: balance,
            balance,
        }
    }

    /// Share of the market value that is unrealized gain; zero for empty or underwater holdings.
    pub fn gain_ratio(&self) -> f64 {
        if self.balance <= 0.0 {
            return 0.0;
        }
        ((self.balance - self.principal) / self.balance).clamp(0.0, 1.0)
    }

    /// Removes up to `amount` of market value. Principal shrinks by the same fraction as the
    /// balance. Returns the new bucket, the amount actually removed and the principal removed.
    pub fn withdraw(self, amount: f64) -> (Self, f64, f64) {
        if amount <= 0.0 || self.balance <= 0.0 {
            return (self, 0.0, 0.0);
        }
        let taken = amount.min(self.balance);
        let fraction = taken / self.balance;
        let principal_removed = (self.principal * fraction).min(self.principal).max(0.0);
        let next = Self {
            principal: (self.principal - principal_removed).max(0.0),
            balance: (self.balance - taken).max(0.0),
        };
        (next, taken, principal_removed)
    }

    pub fn deposit(self, amount: f64) -> Self {
        let amount = amount.max(0.0);
        Self {
            principal: self.principal + amount,
            balance: self.balance + amount,
        }
    }

    pub fn rounded(self) -> Self {
        Self {
            principal: self.principal.round(),
            balance: self.balance.round(),
        }
    }
}

impl std::ops::Add for AccountBucket {
    type Output = AccountBucket;

    fn add(self, rhs: Self) -> Self::Output {
        AccountBucket {
            principal: self.principal + rhs.principal,
            balance: self.balance + rhs.balance,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomeDetail {
    #[serde(rename = "self")]
    pub self_net: f64,
    pub spouse: f64,
    pub public_pension: f64,
    pub personal_pension: f64,
    pub one_time: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseDetail {
    pub living: f64,
    pub car: f64,
    pub housing: f64,
    pub marriage: f64,
    pub children: f64,
    pub appliances: f64,
    pub care: f64,
}

impl ExpenseDetail {
    pub fn total(&self) -> f64 {
        self.living
            + self.car
            + self.housing
            + self.marriage
            + self.children
            + self.appliances
            + self.care
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalDetail {
    pub gross: f64,
    pub tax_paid: f64,
    pub freed_room: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AssetAllocation {
    pub cash: f64,
    pub taxable: f64,
    #[serde(rename = "taxAdvantaged")]
    pub tax_advantaged: f64,
    #[serde(rename = "retirementLocked")]
    pub retirement_locked: f64,
}

/// One emitted projection year. Monetary fields are rounded to whole currency units.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearlyData {
    pub year: i32,
    pub age: u32,
    pub spouse_age: Option<u32>,
    pub income: f64,
    pub income_detail: IncomeDetail,
    pub expense: f64,
    pub expense_detail: ExpenseDetail,
    pub balance: f64,
    pub savings: f64,
    pub taxable: AccountBucket,
    pub tax_advantaged: AccountBucket,
    pub retirement_locked: AccountBucket,
    pub investment_principal: f64,
    pub invested_amount: f64,
    pub withdrawal: WithdrawalDetail,
    pub tax_advantaged_contributed: f64,
    pub total_assets: f64,
    pub asset_allocation: AssetAllocation,
    pub products: BTreeMap<String, AccountBucket>,
}
