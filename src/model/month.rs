//! The month key and the month record.

use crate::error::{Error, Result};
use crate::model::{Amount, Payment, PaymentId, PaymentKind};
use chrono::{Datelike, Local, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashSet;
use std::fmt;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Identifies a month record. The canonical text form is `YYYY-MM`, 1-indexed month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthKey {
    year: u16,
    month: u8,
}

impl MonthKey {
    /// Creates a key, returning `None` if `month` is not in `1..=12` or `year` has more than four
    /// digits.
    pub fn new(year: u16, month: u8) -> Option<Self> {
        if !(1..=12).contains(&month) || year > 9999 {
            return None;
        }
        Some(Self { year, month })
    }

    /// The month containing today's date on the local clock.
    pub fn current() -> Self {
        Self::from_date(Local::now().date_naive())
    }

    pub fn year(&self) -> u16 {
        self.year
    }

    pub fn month(&self) -> u8 {
        self.month
    }

    /// The following month, rolling over into the next year after December. `None` after
    /// `9999-12`.
    pub fn next(&self) -> Option<Self> {
        match self.month {
            12 => MonthKey::new(self.year.checked_add(1)?, 1),
            month => MonthKey::new(self.year, month + 1),
        }
    }

    /// The preceding month, rolling back into the previous year before January. `None` before
    /// `0000-01`.
    pub fn prev(&self) -> Option<Self> {
        match self.month {
            1 => MonthKey::new(self.year.checked_sub(1)?, 12),
            month => MonthKey::new(self.year, month - 1),
        }
    }

    fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year().clamp(0, 9999) as u16,
            month: date.month() as u8,
        }
    }
}

/// An error returned when a string is not a `YYYY-MM` month key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthKeyError(String);

impl Display for MonthKeyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid month '{}', expected YYYY-MM", self.0)
    }
}

impl std::error::Error for MonthKeyError {}

impl FromStr for MonthKey {
    type Err = MonthKeyError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let err = || MonthKeyError(s.to_string());
        let (year, month) = s.split_once('-').ok_or_else(err)?;
        if year.len() != 4 || month.len() != 2 {
            return Err(err());
        }
        if !year.bytes().chain(month.bytes()).all(|b| b.is_ascii_digit()) {
            return Err(err());
        }
        let year: u16 = year.parse().map_err(|_| err())?;
        let month: u8 = month.parse().map_err(|_| err())?;
        MonthKey::new(year, month).ok_or_else(err)
    }
}

impl Display for MonthKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl Serialize for MonthKey {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MonthKey {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        MonthKey::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// The ledger for a single month: bank and cash balances, expected income, the amount the user
/// wants to carry into the next month, and the two ordered payment sequences.
///
/// A record always has both sequences, possibly empty. Each payment's `kind` agrees with the
/// sequence that holds it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RawMonthRecord")]
pub struct MonthRecord {
    balance: Amount,
    cash: Amount,
    income: Amount,
    target: Amount,
    automatic_payments: Vec<Payment>,
    credit_payments: Vec<Payment>,
}

/// The stored form of a month. Any field may be missing.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMonthRecord {
    #[serde(default)]
    balance: Amount,
    #[serde(default)]
    cash: Amount,
    #[serde(default)]
    income: Amount,
    #[serde(default)]
    target: Amount,
    #[serde(default, deserialize_with = "null_as_empty")]
    automatic_payments: Vec<Payment>,
    #[serde(default, deserialize_with = "null_as_empty")]
    credit_payments: Vec<Payment>,
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Vec<Payment>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<Payment>>::deserialize(deserializer)?.unwrap_or_default())
}

impl From<RawMonthRecord> for MonthRecord {
    fn from(raw: RawMonthRecord) -> Self {
        let mut record = MonthRecord {
            balance: raw.balance,
            cash: raw.cash,
            income: raw.income,
            target: raw.target,
            automatic_payments: raw.automatic_payments,
            credit_payments: raw.credit_payments,
        };
        for kind in [PaymentKind::Recurring, PaymentKind::Installment] {
            for payment in record.payments_mut(kind) {
                payment.set_kind(kind);
            }
        }
        record
    }
}

impl MonthRecord {
    /// The canonical empty record: all amounts zero, both sequences empty.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::empty()
    }

    pub fn balance(&self) -> Amount {
        self.balance
    }

    pub fn cash(&self) -> Amount {
        self.cash
    }

    pub fn income(&self) -> Amount {
        self.income
    }

    pub fn target(&self) -> Amount {
        self.target
    }

    pub fn set_balance(&mut self, value: Amount) {
        self.balance = value;
    }

    pub fn set_cash(&mut self, value: Amount) {
        self.cash = value;
    }

    pub fn set_income(&mut self, value: Amount) {
        self.income = value;
    }

    pub fn set_target(&mut self, value: Amount) {
        self.target = value;
    }

    pub fn automatic_payments(&self) -> &[Payment] {
        &self.automatic_payments
    }

    pub fn credit_payments(&self) -> &[Payment] {
        &self.credit_payments
    }

    /// The sequence that holds payments of `kind`.
    pub fn payments(&self, kind: PaymentKind) -> &[Payment] {
        match kind {
            PaymentKind::Recurring => &self.automatic_payments,
            PaymentKind::Installment => &self.credit_payments,
        }
    }

    pub(crate) fn payments_mut(&mut self, kind: PaymentKind) -> &mut Vec<Payment> {
        match kind {
            PaymentKind::Recurring => &mut self.automatic_payments,
            PaymentKind::Installment => &mut self.credit_payments,
        }
    }

    /// Appends copies of `payments` with freshly minted ids to the sequence of `kind`, keeping
    /// their order.
    pub(crate) fn append_copies(&mut self, kind: PaymentKind, payments: &[Payment]) {
        let copies = payments.iter().map(|p| {
            let mut copy = p.duplicate();
            copy.set_kind(kind);
            copy
        });
        self.payments_mut(kind).extend(copies);
    }

    /// Adds a new payment to the end of the sequence of `kind` and returns its id.
    ///
    /// # Errors
    /// - `Validation` if `name` is blank or `amount` is negative.
    pub fn add_payment(
        &mut self,
        kind: PaymentKind,
        name: &str,
        amount: Amount,
    ) -> Result<PaymentId> {
        let name = validate_name(name)?;
        validate_amount(amount)?;
        let payment = Payment::new(name, amount, kind);
        let id = payment.id().clone();
        self.payments_mut(kind).push(payment);
        Ok(id)
    }

    /// Changes the name and/or amount of the payment `id`, keeping its position and identity.
    ///
    /// # Errors
    /// - `Validation` if the payment does not exist, the new name is blank or the new amount is
    ///   negative.
    pub fn edit_payment(
        &mut self,
        kind: PaymentKind,
        id: &PaymentId,
        name: Option<&str>,
        amount: Option<Amount>,
    ) -> Result<()> {
        let name = name.map(validate_name).transpose()?;
        if let Some(amount) = amount {
            validate_amount(amount)?;
        }
        let payment = self
            .payments_mut(kind)
            .iter_mut()
            .find(|p| p.id() == id)
            .ok_or_else(|| Error::validation(format!("No {kind} payment with id '{id}'")))?;
        if let Some(name) = name {
            payment.set_name(name);
        }
        if let Some(amount) = amount {
            payment.set_amount(amount);
        }
        Ok(())
    }

    /// Removes and returns the payment `id`.
    ///
    /// # Errors
    /// - `Validation` if the payment does not exist.
    pub fn remove_payment(&mut self, kind: PaymentKind, id: &PaymentId) -> Result<Payment> {
        let payments = self.payments_mut(kind);
        let index = payments
            .iter()
            .position(|p| p.id() == id)
            .ok_or_else(|| Error::validation(format!("No {kind} payment with id '{id}'")))?;
        Ok(payments.remove(index))
    }

    /// Moves the payment at `from` so that it ends up at `to`. Returns `false`, leaving the order
    /// unchanged, when either index is out of range.
    pub fn move_payment(&mut self, kind: PaymentKind, from: usize, to: usize) -> bool {
        let payments = self.payments_mut(kind);
        if from >= payments.len() || to >= payments.len() {
            return false;
        }
        let moved = payments.remove(from);
        payments.insert(to, moved);
        true
    }

    /// Resets every field to the empty state.
    pub fn clear(&mut self) {
        *self = Self::empty();
    }

    /// Checks the payment invariants of a record that was assembled elsewhere, e.g. received over
    /// HTTP: names are not blank, amounts are not negative and no id appears twice.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for payment in self.automatic_payments.iter().chain(&self.credit_payments) {
            validate_name(payment.name())?;
            validate_amount(payment.amount())?;
            if !seen.insert(payment.id()) {
                return Err(Error::validation(format!(
                    "Payment id '{}' appears more than once",
                    payment.id()
                )));
            }
        }
        Ok(())
    }
}

fn validate_name(name: &str) -> Result<&str> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(Error::validation("A payment name is required"));
    }
    Ok(trimmed)
}

fn validate_amount(amount: Amount) -> Result<()> {
    if amount.is_negative() {
        return Err(Error::validation(format!(
            "A payment amount cannot be negative, got {amount}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> MonthKey {
        MonthKey::from_str(s).unwrap()
    }

    #[test]
    fn test_month_key_parse_and_display() {
        let k = key("2026-02");
        assert_eq!(k.year(), 2026);
        assert_eq!(k.month(), 2);
        assert_eq!(k.to_string(), "2026-02");
    }

    #[test]
    fn test_month_key_rejects_other_forms() {
        for bad in ["2026-2", "26-02", "2026-13", "2026-00", "2026/02", "abcd-ef", "2026-02-01"] {
            assert!(MonthKey::from_str(bad).is_err(), "{bad} should not parse");
        }
    }

    #[test]
    fn test_month_key_next_and_prev_roll_over() {
        assert_eq!(key("2026-12").next(), Some(key("2027-01")));
        assert_eq!(key("2026-01").prev(), Some(key("2025-12")));
        assert_eq!(key("2026-05").next().and_then(|k| k.prev()), Some(key("2026-05")));
    }

    #[test]
    fn test_month_key_stops_at_the_ends_of_the_calendar() {
        assert_eq!(key("9999-12").next(), None);
        assert_eq!(key("9999-11").next(), Some(key("9999-12")));
        assert_eq!(key("0000-01").prev(), None);
        assert_eq!(key("0000-02").prev(), Some(key("0000-01")));
    }

    #[test]
    fn test_month_key_orders_chronologically() {
        assert!(key("2025-12") < key("2026-01"));
        assert!(key("2026-02") < key("2026-10"));
    }

    #[test]
    fn test_deserialize_fills_missing_fields() {
        let record: MonthRecord = serde_json::from_str(r#"{"income": 5000}"#).unwrap();
        assert_eq!(record.income(), Amount::from_cents(500000));
        assert!(record.balance().is_zero());
        assert!(record.automatic_payments().is_empty());
        assert!(record.credit_payments().is_empty());
    }

    #[test]
    fn test_deserialize_null_sequences() {
        let record: MonthRecord =
            serde_json::from_str(r#"{"automaticPayments": null, "creditPayments": null}"#)
                .unwrap();
        assert!(record.is_empty());
    }

    #[test]
    fn test_deserialize_restores_kind_from_sequence() {
        let json = r#"{
            "automaticPayments": [{"id": 1, "name": "Rent", "amount": 1000}],
            "creditPayments": [{"id": 2, "name": "Car", "amount": 400, "kind": "recurring"}]
        }"#;
        let record: MonthRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.automatic_payments()[0].kind(), PaymentKind::Recurring);
        assert_eq!(record.credit_payments()[0].kind(), PaymentKind::Installment);
    }

    #[test]
    fn test_serialize_uses_stored_field_names() {
        let mut record = MonthRecord::empty();
        record.set_balance(Amount::from_cents(100000));
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "balance": 1000,
                "cash": 0,
                "income": 0,
                "target": 0,
                "automaticPayments": [],
                "creditPayments": []
            })
        );
    }

    #[test]
    fn test_add_payment() {
        let mut record = MonthRecord::empty();
        let id = record
            .add_payment(PaymentKind::Installment, " Phone ", Amount::from_cents(5000))
            .unwrap();
        let payment = &record.credit_payments()[0];
        assert_eq!(payment.id(), &id);
        assert_eq!(payment.name(), "Phone");
        assert_eq!(payment.kind(), PaymentKind::Installment);
    }

    #[test]
    fn test_add_payment_validation() {
        let mut record = MonthRecord::empty();
        let e = record
            .add_payment(PaymentKind::Recurring, "  ", Amount::from_cents(1))
            .unwrap_err();
        assert!(e.is_validation());
        let e = record
            .add_payment(PaymentKind::Recurring, "Gym", Amount::from_cents(-1))
            .unwrap_err();
        assert!(e.is_validation());
        assert!(record.is_empty());
    }

    #[test]
    fn test_edit_payment_keeps_identity_and_position() {
        let mut record = MonthRecord::empty();
        let kind = PaymentKind::Recurring;
        record.add_payment(kind, "A", Amount::from_cents(100)).unwrap();
        let b = record.add_payment(kind, "B", Amount::from_cents(200)).unwrap();
        record
            .edit_payment(kind, &b, Some("Bee"), Some(Amount::from_cents(250)))
            .unwrap();
        let edited = &record.automatic_payments()[1];
        assert_eq!(edited.id(), &b);
        assert_eq!(edited.name(), "Bee");
        assert_eq!(edited.amount(), Amount::from_cents(250));
    }

    #[test]
    fn test_edit_missing_payment() {
        let mut record = MonthRecord::empty();
        let e = record
            .edit_payment(PaymentKind::Recurring, &PaymentId::from("x"), None, None)
            .unwrap_err();
        assert!(e.is_validation());
    }

    #[test]
    fn test_remove_payment() {
        let mut record = MonthRecord::empty();
        let kind = PaymentKind::Installment;
        let a = record.add_payment(kind, "A", Amount::from_cents(100)).unwrap();
        record.add_payment(kind, "B", Amount::from_cents(200)).unwrap();
        let removed = record.remove_payment(kind, &a).unwrap();
        assert_eq!(removed.name(), "A");
        assert_eq!(record.credit_payments().len(), 1);
        assert!(record.remove_payment(kind, &a).is_err());
    }

    #[test]
    fn test_move_payment() {
        let mut record = MonthRecord::empty();
        let kind = PaymentKind::Recurring;
        for name in ["A", "B", "C"] {
            record.add_payment(kind, name, Amount::ZERO).unwrap();
        }
        assert!(record.move_payment(kind, 0, 2));
        let names: Vec<&str> = record.automatic_payments().iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["B", "C", "A"]);
        assert!(!record.move_payment(kind, 2, 3));
        let names: Vec<&str> = record.automatic_payments().iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["B", "C", "A"]);
    }

    #[test]
    fn test_clear() {
        let mut record = MonthRecord::empty();
        record.set_cash(Amount::from_cents(1));
        record
            .add_payment(PaymentKind::Recurring, "A", Amount::ZERO)
            .unwrap();
        record.clear();
        assert!(record.is_empty());
    }

    #[test]
    fn test_validate_received_record() {
        let json = r#"{
            "automaticPayments": [{"id": "a", "name": "Rent", "amount": 1000}],
            "creditPayments": [{"id": "b", "name": "Card", "amount": 50}]
        }"#;
        let record: MonthRecord = serde_json::from_str(json).unwrap();
        assert!(record.validate().is_ok());

        let json = r#"{
            "automaticPayments": [{"id": "a", "name": "Rent", "amount": 1000}],
            "creditPayments": [{"id": "a", "name": "Card", "amount": 50}]
        }"#;
        let record: MonthRecord = serde_json::from_str(json).unwrap();
        assert!(record.validate().unwrap_err().is_validation());

        let json = r#"{"creditPayments": [{"id": "c", "name": "  ", "amount": 50}]}"#;
        let record: MonthRecord = serde_json::from_str(json).unwrap();
        assert!(record.validate().is_err());

        let json = r#"{"creditPayments": [{"id": "c", "name": "Card", "amount": -1}]}"#;
        let record: MonthRecord = serde_json::from_str(json).unwrap();
        assert!(record.validate().is_err());
    }
}
