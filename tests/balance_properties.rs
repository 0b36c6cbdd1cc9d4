//! Property tests: balances never go negative and failed operations change nothing

use bank_core::{Account, AccountKind, AccountOwner, BankError};
use chrono::{Duration, NaiveDate};
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

#[derive(Debug, Clone)]
enum Op {
    Deposit(usize, i64),
    Withdraw(usize, i64),
    Transfer(usize, usize, i64),
    Wait(i64),
}

fn op() -> impl Strategy<Value = Op> {
    let idx = 0..3usize;
    let cents = -10_000i64..300_000;
    prop_oneof![
        (idx.clone(), cents.clone()).prop_map(|(i, c)| Op::Deposit(i, c)),
        (idx.clone(), cents.clone()).prop_map(|(i, c)| Op::Withdraw(i, c)),
        (idx.clone(), idx, cents).prop_map(|(a, b, c)| Op::Transfer(a, b, c)),
        (0i64..40).prop_map(Op::Wait),
    ]
}

fn accounts(opened: NaiveDate, cheque: i64, savings: i64, investment: i64) -> Vec<Account> {
    let owner = AccountOwner::new("CUST-001", "CUST-001");
    vec![
        Account::open(
            "CHQ",
            AccountKind::cheque("Acme", "", true),
            Decimal::new(cheque, 2),
            owner.clone(),
            opened,
        )
        .unwrap(),
        Account::open(
            "SAV",
            AccountKind::savings(dec!(0.025), dec!(500), opened),
            dec!(500) + Decimal::new(savings, 2),
            owner.clone(),
            opened,
        )
        .unwrap(),
        Account::open(
            "INV",
            AccountKind::investment(dec!(0.065), opened),
            dec!(500) + Decimal::new(investment, 2),
            owner,
            opened,
        )
        .unwrap(),
    ]
}

fn pair(accounts: &mut [Account], a: usize, b: usize) -> (&mut Account, &mut Account) {
    if a < b {
        let (left, right) = accounts.split_at_mut(b);
        (&mut left[a], &mut right[0])
    } else {
        let (left, right) = accounts.split_at_mut(a);
        (&mut right[0], &mut left[b])
    }
}

fn balances(accounts: &[Account]) -> Vec<Decimal> {
    accounts.iter().map(|a| a.balance()).collect()
}

proptest! {
    #[test]
    fn prop_balances_stay_within_floors(
        cheque in 0i64..200_000,
        savings in 0i64..200_000,
        investment in 0i64..200_000,
        ops in prop::collection::vec(op(), 1..60),
    ) {
        let opened = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let mut today = opened;
        let mut accounts = accounts(opened, cheque, savings, investment);
        let mut expected_total: Decimal = accounts.iter().map(|a| a.balance()).sum();

        for op in ops {
            let before = balances(&accounts);
            let result = match op {
                Op::Deposit(i, c) => accounts[i].deposit(Decimal::new(c, 2)).map(|_| {
                    expected_total += Decimal::new(c, 2);
                }),
                Op::Withdraw(i, c) => accounts[i].withdraw_on(Decimal::new(c, 2), today).map(|_| {
                    expected_total -= Decimal::new(c, 2);
                }),
                Op::Transfer(a, b, c) if a == b => {
                    let mut copy = accounts[b].clone();
                    let err = accounts[a]
                        .transfer_to_on(&mut copy, Decimal::new(c, 2), today)
                        .unwrap_err();
                    prop_assert!(matches!(err, BankError::InvalidArgument(_)));
                    Err(err)
                }
                Op::Transfer(a, b, c) => {
                    let (source, target) = pair(&mut accounts, a, b);
                    source.transfer_to_on(target, Decimal::new(c, 2), today)
                }
                Op::Wait(days) => {
                    today += Duration::days(days);
                    Ok(())
                }
            };

            if result.is_err() {
                prop_assert_eq!(balances(&accounts), before);
            }
            for account in &accounts {
                prop_assert!(account.balance() >= Decimal::ZERO);
            }
            prop_assert!(accounts[1].balance() >= dec!(500));
            prop_assert!(accounts[2].balance() >= dec!(500));
            prop_assert_eq!(balances(&accounts).into_iter().sum::<Decimal>(), expected_total);
        }
    }

    #[test]
    fn prop_savings_withdraw_always_fails(
        balance in 0i64..10_000_000,
        amount in -10_000i64..10_000_000,
        days in 0i64..1000,
    ) {
        let opened = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let mut account = Account::open(
            "SAV",
            AccountKind::savings(dec!(0.025), dec!(500), opened),
            Decimal::new(balance, 2),
            AccountOwner::new("CUST-001", "CUST-001"),
            opened,
        )
        .unwrap();

        let result = account.withdraw_on(Decimal::new(amount, 2), opened + Duration::days(days));
        prop_assert!(matches!(result, Err(BankError::InvalidState(_))));
        prop_assert_eq!(account.balance(), Decimal::new(balance, 2));
    }

    #[test]
    fn prop_interest_zero_inside_accrual_window(
        balance in 0i64..10_000_000,
        days in 0i64..30,
    ) {
        let opened = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let account = Account::open(
            "SAV",
            AccountKind::savings(dec!(0.025), dec!(500), opened),
            Decimal::new(balance, 2),
            AccountOwner::new("CUST-001", "CUST-001"),
            opened,
        )
        .unwrap();

        prop_assert_eq!(account.calculate_interest_on(opened + Duration::days(days)), Decimal::ZERO);
    }
}
