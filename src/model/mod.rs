//! Types that represent the core data model, such as `MonthRecord` and `Payment`.
mod amount;
mod dataset;
mod month;
mod payment;

pub use amount::{round2, Amount, AmountError};
pub use dataset::Dataset;
pub use month::{MonthKey, MonthKeyError, MonthRecord};
pub use payment::{Payment, PaymentId, PaymentKind};
