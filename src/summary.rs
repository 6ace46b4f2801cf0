//! Derived totals for a month.
//!
//! Every intermediate total is rounded to two decimals before it is combined with anything else.
//! This is the correction the stored data has always been computed with, and a total summed first
//! and rounded last can differ from it by a cent.

use crate::model::{round2, Amount, MonthRecord, Payment};
use rust_decimal::Decimal;
use serde::Serialize;

/// The derived totals of a `MonthRecord`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    /// Sum of the automatic (recurring) payments.
    pub total_automatic: Amount,
    /// Sum of the credit (installment) payments.
    pub total_credit: Amount,
    /// `total_automatic + total_credit`
    pub total_expenses: Amount,
    /// Bank balance plus cash.
    pub total_balance: Amount,
    /// `total_balance + income`
    pub total_available: Amount,
    /// What is left after all expenses: `total_available - total_expenses`.
    pub remaining: Amount,
    /// What can still be spent while keeping `target` for next month: `remaining - target`.
    pub spendable: Amount,
}

impl Summary {
    pub fn of(record: &MonthRecord) -> Self {
        let total_automatic = sum(record.automatic_payments());
        let total_credit = sum(record.credit_payments());
        let total_expenses = combine(total_automatic, total_credit, Decimal::saturating_add);
        let total_balance = combine(record.balance(), record.cash(), Decimal::saturating_add);
        let total_available = combine(total_balance, record.income(), Decimal::saturating_add);
        let remaining = combine(total_available, total_expenses, Decimal::saturating_sub);
        let spendable = combine(remaining, record.target(), Decimal::saturating_sub);
        Self {
            total_automatic,
            total_credit,
            total_expenses,
            total_balance,
            total_available,
            remaining,
            spendable,
        }
    }

    /// True when the month keeps at least its target.
    pub fn meets_target(&self) -> bool {
        !self.spendable.is_negative()
    }
}

/// `round2(Σ amount)`. Totals saturate at the bounds of `Decimal`.
fn sum(payments: &[Payment]) -> Amount {
    let total = payments
        .iter()
        .fold(Decimal::ZERO, |total, p| total.saturating_add(p.amount().value()));
    Amount::new(round2(total))
}

/// `round2(op(a, b))`
fn combine(a: Amount, b: Amount, op: fn(Decimal, Decimal) -> Decimal) -> Amount {
    Amount::new(round2(op(a.value(), b.value())))
}
