//! The `Payment` entity: a named, recurring bill or an installment.

use crate::model::Amount;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// The opaque identity of a payment.
///
/// New ids are UUID v4 strings. Documents written by older clients used numeric ids; those are
/// read as their decimal text so that an existing payment keeps its identity.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct PaymentId(String);

impl PaymentId {
    /// Mints a new, globally unique id.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for PaymentId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for PaymentId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PaymentId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl<'de> Deserialize<'de> for PaymentId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(PaymentIdVisitor)
    }
}

struct PaymentIdVisitor;

impl Visitor<'_> for PaymentIdVisitor {
    type Value = PaymentId;

    fn expecting(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("a string or numeric payment id")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<PaymentId, E> {
        Ok(PaymentId(v.to_string()))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<PaymentId, E> {
        Ok(PaymentId(v.to_string()))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<PaymentId, E> {
        Ok(PaymentId(v.to_string()))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<PaymentId, E> {
        Ok(PaymentId(v.to_string()))
    }
}

/// Which of the two payment sequences of a month a payment belongs to.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum PaymentKind {
    /// Bills, subscriptions, dues. Held in `automaticPayments`.
    #[default]
    Recurring,
    /// Loan and credit card installments. Held in `creditPayments`.
    Installment,
}

serde_plain::derive_display_from_serialize!(PaymentKind);
serde_plain::derive_fromstr_from_deserialize!(PaymentKind);

/// A single payment in a month's automatic or credit sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    id: PaymentId,
    name: String,
    amount: Amount,
    /// Older documents do not store the kind; it is restored from the owning sequence.
    #[serde(default)]
    kind: PaymentKind,
}

impl Payment {
    /// Creates a payment with a freshly minted id.
    pub fn new(name: impl Into<String>, amount: Amount, kind: PaymentKind) -> Self {
        Self {
            id: PaymentId::new(),
            name: name.into(),
            amount,
            kind,
        }
    }

    pub fn id(&self) -> &PaymentId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }

    pub fn kind(&self) -> PaymentKind {
        self.kind
    }

    /// Returns a copy of this payment with a new id. A copy is never the same logical payment as
    /// its source.
    pub fn duplicate(&self) -> Self {
        Self {
            id: PaymentId::new(),
            ..self.clone()
        }
    }

    pub(crate) fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub(crate) fn set_amount(&mut self, amount: Amount) {
        self.amount = amount;
    }

    pub(crate) fn set_kind(&mut self, kind: PaymentKind) {
        self.kind = kind;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_ids_are_unique() {
        let a = PaymentId::new();
        let b = PaymentId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn test_duplicate_mints_new_id() {
        let rent = Payment::new("Rent", Amount::from_cents(100000), PaymentKind::Recurring);
        let copy = rent.duplicate();
        assert_ne!(rent.id(), copy.id());
        assert_eq!(rent.name(), copy.name());
        assert_eq!(rent.amount(), copy.amount());
        assert_eq!(rent.kind(), copy.kind());
    }

    #[test]
    fn test_deserialize_legacy_numeric_id() {
        let json = r#"{"id": 1767225600123.5, "name": "Internet", "amount": 349.9}"#;
        let payment: Payment = serde_json::from_str(json).unwrap();
        assert_eq!(payment.id().as_str(), "1767225600123.5");
        assert_eq!(payment.amount(), Amount::from_cents(34990));
        assert_eq!(payment.kind(), PaymentKind::Recurring);
    }

    #[test]
    fn test_deserialize_integer_id() {
        let json = r#"{"id": 1, "name": "Rent", "amount": 1000}"#;
        let payment: Payment = serde_json::from_str(json).unwrap();
        assert_eq!(payment.id(), &PaymentId::from("1"));
    }

    #[test]
    fn test_serialize() {
        let mut payment = Payment::new(
            "Car loan",
            Amount::from_cents(250050),
            PaymentKind::Installment,
        );
        payment.id = PaymentId::from("abc");
        let json = serde_json::to_value(&payment).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "id": "abc",
                "name": "Car loan",
                "amount": 2500.5,
                "kind": "installment"
            })
        );
    }

    #[test]
    fn test_kind_from_str() {
        use std::str::FromStr;
        assert_eq!(
            PaymentKind::from_str("installment").unwrap(),
            PaymentKind::Installment
        );
        assert_eq!(PaymentKind::Recurring.to_string(), "recurring");
    }
}
