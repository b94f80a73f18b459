use super::tax::CAPITAL_GAINS_TAX_RATE;
use super::types::{AccountBucket, AccountKind};

#[derive(Debug, Clone, PartialEq)]
pub struct ShortfallOutcome {
    pub cash: f64,
    pub buckets: Vec<AccountBucket>,
    pub gross_withdrawn: f64,
    pub tax_paid: f64,
    /// Tax-advantaged principal removed; becomes contribution room next year.
    pub freed_room: f64,
    /// Deficit left after every liquidatable holding was drawn down.
    pub remaining_deficit: f64,
}

#[derive(Debug, Clone, Copy)]
struct LegOutcome {
    gross: f64,
    net: f64,
    tax: f64,
    principal_removed: f64,
}

/// Raises `deficit` in cash by selling taxable holdings first, then tax-advantaged ones.
/// Retirement-locked holdings are never sold.
pub fn cover_shortfall(
    deficit: f64,
    cash: f64,
    accounts: &[AccountKind],
    buckets: &[AccountBucket],
) -> ShortfallOutcome {
    let mut outcome = ShortfallOutcome {
        cash,
        buckets: buckets.to_vec(),
        gross_withdrawn: 0.0,
        tax_paid: 0.0,
        freed_room: 0.0,
        remaining_deficit: deficit.max(0.0),
    };
    if outcome.remaining_deficit <= 0.0 {
        return outcome;
    }

    for kind in [AccountKind::Taxable, AccountKind::TaxAdvantaged] {
        if outcome.remaining_deficit <= 0.0 {
            break;
        }
        let leg = withdraw_from_class(
            kind,
            outcome.remaining_deficit,
            accounts,
            &mut outcome.buckets,
        );
        outcome.cash += leg.net;
        outcome.gross_withdrawn += leg.gross;
        outcome.tax_paid += leg.tax;
        outcome.remaining_deficit = (outcome.remaining_deficit - leg.net).max(0.0);
        if kind == AccountKind::TaxAdvantaged {
            outcome.freed_room += leg.principal_removed;
        }
    }

    outcome
}

fn withdraw_from_class(
    kind: AccountKind,
    needed_net: f64,
    accounts: &[AccountKind],
    buckets: &mut [AccountBucket],
) -> LegOutcome {
    let members: Vec<usize> = accounts
        .iter()
        .enumerate()
        .filter(|(i, account)| **account == kind && buckets[*i].balance > 0.0)
        .map(|(i, _)| i)
        .collect();

    let class_total = members
        .iter()
        .fold(AccountBucket::default(), |acc, &i| acc + buckets[i]);
    if class_total.balance <= 0.0 {
        return LegOutcome {
            gross: 0.0,
            net: 0.0,
            tax: 0.0,
            principal_removed: 0.0,
        };
    }

    let gain_tax_share = match kind {
        AccountKind::Taxable => class_total.gain_ratio() * CAPITAL_GAINS_TAX_RATE,
        _ => 0.0,
    };
    let required_gross = needed_net / (1.0 - gain_tax_share);
    let gross = required_gross.min(class_total.balance);

    let mut taken = 0.0;
    let mut principal_removed = 0.0;
    for &i in &members {
        let share = buckets[i].balance / class_total.balance;
        let (next, withdrawn, principal) = buckets[i].withdraw(gross * share);
        buckets[i] = next;
        taken += withdrawn;
        principal_removed += principal;
    }

    let tax = taken * gain_tax_share;
    LegOutcome {
        gross: taken,
        net: taken - tax,
        tax,
        principal_removed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn assert_approx(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() <= tol,
            "actual={actual}, expected={expected}, tol={tol}"
        );
    }

    fn bucket(principal: f64, balance: f64) -> AccountBucket {
        AccountBucket { principal, balance }
    }

    #[test]
    fn taxable_gain_is_taxed_before_tax_advantaged_draw() {
        let accounts = [AccountKind::Taxable, AccountKind::TaxAdvantaged];
        let buckets = [
            bucket(1_800_000.0, 2_000_000.0),
            bucket(4_500_000.0, 5_000_000.0),
        ];
        let out = cover_shortfall(3_000_000.0, 0.0, &accounts, &buckets);

        assert_approx(out.tax_paid, 40_630.0, 1e-6);
        assert_approx(out.buckets[0].balance, 0.0, 1e-9);
        assert_approx(out.buckets[0].principal, 0.0, 1e-9);
        assert_approx(out.buckets[1].balance, 5_000_000.0 - 1_040_630.0, 1e-6);
        assert_approx(out.freed_room, 1_040_630.0 * 0.9, 1e-6);
        assert_approx(out.cash, 3_000_000.0, 1e-6);
        assert_approx(out.remaining_deficit, 0.0, 1e-9);
    }

    #[test]
    fn taxable_leg_grosses_up_for_gains_tax() {
        let accounts = [AccountKind::Taxable];
        let buckets = [bucket(500_000.0, 1_000_000.0)];
        let out = cover_shortfall(100_000.0, 0.0, &accounts, &buckets);
        let gross = 100_000.0 / (1.0 - 0.5 * CAPITAL_GAINS_TAX_RATE);
        assert_approx(out.gross_withdrawn, gross, 1e-6);
        assert_approx(out.cash, 100_000.0, 1e-6);
        // Gain ratio survives the sale.
        assert_approx(out.buckets[0].gain_ratio(), 0.5, 1e-12);
        assert_eq!(out.freed_room, 0.0);
    }

    #[test]
    fn no_gain_taxable_draw_then_tax_advantaged_remainder() {
        let accounts = [AccountKind::Taxable, AccountKind::TaxAdvantaged];
        let buckets = [
            bucket(2_000_000.0, 2_000_000.0),
            bucket(2_000_000.0, 2_000_000.0),
        ];
        let out = cover_shortfall(2_123_500.0, 876_500.0, &accounts, &buckets);
        assert_approx(out.cash, 3_000_000.0, 1e-6);
        assert_approx(out.buckets[0].balance, 0.0, 1e-9);
        assert_approx(out.buckets[1].balance, 1_876_500.0, 1e-6);
        assert_approx(out.buckets[1].principal, 1_876_500.0, 1e-6);
        assert_approx(out.freed_room, 123_500.0, 1e-6);
        assert_eq!(out.tax_paid, 0.0);
    }

    #[test]
    fn retirement_locked_holdings_are_never_sold() {
        let accounts = [AccountKind::RetirementLocked];
        let buckets = [bucket(1_000_000.0, 3_000_000.0)];
        let out = cover_shortfall(500_000.0, 100.0, &accounts, &buckets);
        assert_eq!(out.buckets, buckets.to_vec());
        assert_eq!(out.cash, 100.0);
        assert_approx(out.remaining_deficit, 500_000.0, 1e-9);
    }

    #[test]
    fn draw_is_proportional_to_balance_within_a_class() {
        let accounts = [AccountKind::Taxable, AccountKind::Taxable];
        let buckets = [bucket(300_000.0, 300_000.0), bucket(100_000.0, 100_000.0)];
        let out = cover_shortfall(200_000.0, 0.0, &accounts, &buckets);
        assert_approx(out.buckets[0].balance, 150_000.0, 1e-6);
        assert_approx(out.buckets[1].balance, 50_000.0, 1e-6);
    }

    #[test]
    fn exhausted_accounts_leave_remaining_deficit() {
        let accounts = [AccountKind::Taxable, AccountKind::TaxAdvantaged];
        let buckets = [bucket(100.0, 100.0), bucket(50.0, 50.0)];
        let out = cover_shortfall(1_000.0, 0.0, &accounts, &buckets);
        assert_approx(out.cash, 150.0, 1e-9);
        assert_approx(out.remaining_deficit, 850.0, 1e-9);
        assert!(out.buckets.iter().all(|b| b.balance == 0.0));
    }

    #[test]
    fn zero_deficit_is_a_no_op() {
        let accounts = [AccountKind::Taxable];
        let buckets = [bucket(1.0, 2.0)];
        let out = cover_shortfall(0.0, 5.0, &accounts, &buckets);
        assert_eq!(out.buckets, buckets.to_vec());
        assert_eq!(out.cash, 5.0);
        assert_eq!(out.gross_withdrawn, 0.0);
    }

    fn arb_account() -> impl Strategy<Value = AccountKind> {
        prop_oneof![
            Just(AccountKind::Taxable),
            Just(AccountKind::TaxAdvantaged),
            Just(AccountKind::RetirementLocked),
        ]
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(64))]

        #[test]
        fn prop_balances_stay_non_negative_and_principal_within_balance_ratio(
            holdings in proptest::collection::vec((arb_account(), 0.0f64..5_000_000.0, 0.0f64..1.5), 1..6),
            deficit in 0.0f64..20_000_000.0,
        ) {
            let accounts: Vec<AccountKind> = holdings.iter().map(|h| h.0).collect();
            let buckets: Vec<AccountBucket> = holdings
                .iter()
                .map(|h| AccountBucket { principal: h.1 * h.2.min(1.0), balance: h.1 })
                .collect();
            let out = cover_shortfall(deficit, 0.0, &accounts, &buckets);
            for (before, after) in buckets.iter().zip(out.buckets.iter()) {
                prop_assert!(after.balance >= 0.0);
                prop_assert!(after.principal >= 0.0);
                prop_assert!(after.balance <= before.balance + 1e-9);
            }
            prop_assert!(out.cash <= deficit + 1e-6);
            prop_assert!(out.tax_paid >= 0.0);
        }
    }
}
