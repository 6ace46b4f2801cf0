//! Carry-forward: deriving one month's record from another's.
//!
//! These functions work on a whole `Dataset` so that they can run inside `Synchronizer::mutate`.
//! Each returns the record it wrote. Copied payments always get fresh ids.

use crate::model::{Amount, Dataset, MonthKey, MonthRecord, PaymentKind};

/// Replaces the record at `to` with a copy of the record at `from` that keeps `income`, `target`
/// and both payment sequences, with `balance` and `cash` reset to zero. When `from` has no record
/// the record at `to` becomes the empty record.
pub fn clone_month(dataset: &mut Dataset, from: MonthKey, to: MonthKey) -> MonthRecord {
    let mut cloned = MonthRecord::empty();
    if let Some(source) = dataset.get(&from) {
        cloned.set_income(source.income());
        cloned.set_target(source.target());
        for kind in [PaymentKind::Recurring, PaymentKind::Installment] {
            cloned.append_copies(kind, source.payments(kind));
        }
    }
    dataset.insert(to, cloned.clone());
    cloned
}

/// Appends copies of the `kind` payments of `from` to the end of the same sequence at `to`. The
/// record at `to` is written even if nothing was copied.
pub fn copy_payments(
    dataset: &mut Dataset,
    kind: PaymentKind,
    from: MonthKey,
    to: MonthKey,
) -> MonthRecord {
    let copies = dataset
        .get(&from)
        .map(|source| source.payments(kind).to_vec())
        .unwrap_or_default();
    let target = dataset.month_mut(to);
    target.append_copies(kind, &copies);
    target.clone()
}

/// Sets the balance of `to`, leaving everything else as it was.
pub fn transfer_balance(dataset: &mut Dataset, to: MonthKey, amount: Amount) -> MonthRecord {
    let target = dataset.month_mut(to);
    target.set_balance(amount);
    target.clone()
}

/// Resets the record at `key` to the empty record.
pub fn clear_month(dataset: &mut Dataset, key: MonthKey) -> MonthRecord {
    let record = dataset.month_mut(key);
    record.clear();
    record.clone()
}
