//! The `Ledger` is what the command line and the HTTP server call into. Reads go through
//! `Synchronizer::load` and every write is a `Synchronizer::mutate` of the whole dataset.

use crate::carry;
use crate::error::Result;
use crate::model::{Amount, Dataset, MonthKey, MonthRecord, PaymentKind};
use crate::summary::Summary;
use crate::sync::{MonthSink, SaveReport, Snapshot, Synchronizer};
use crate::{Config, Mode};
use serde::Serialize;
use tracing::debug;

/// The value a write produced along with how it was saved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Saved<T> {
    pub value: T,
    pub report: SaveReport,
}

#[derive(Clone)]
pub struct Ledger {
    sync: Synchronizer,
}

impl Ledger {
    pub fn new(sync: Synchronizer) -> Self {
        Self { sync }
    }

    pub async fn open(config: &Config, mode: Mode) -> Result<Self> {
        Ok(Self::new(Synchronizer::from_config(config, mode).await?))
    }

    pub fn synchronizer(&self) -> &Synchronizer {
        &self.sync
    }

    pub async fn load(&self) -> Result<Snapshot> {
        self.sync.load().await
    }

    /// The record for `key`, or the empty record if there is none.
    pub async fn get_month(&self, key: MonthKey) -> Result<MonthRecord> {
        Ok(self.load().await?.dataset().month(&key))
    }

    pub async fn get_all(&self) -> Result<Dataset> {
        Ok(self.load().await?.into_dataset())
    }

    pub async fn summary(&self, key: MonthKey) -> Result<Summary> {
        Ok(Summary::of(&self.get_month(key).await?))
    }

    /// Replaces the record at `key`. Every other month is written back as it was loaded.
    ///
    /// # Errors
    /// - `Validation` if a payment has a blank name, a negative amount or a repeated id.
    pub async fn set_month(
        &self,
        key: MonthKey,
        record: MonthRecord,
    ) -> Result<Saved<MonthRecord>> {
        record.validate()?;
        debug!("Setting {key}");
        let ((), report) = self
            .sync
            .mutate(|dataset| {
                dataset.insert(key, record.clone());
                Ok(())
            })
            .await?;
        Ok(Saved {
            value: record,
            report,
        })
    }

    /// Applies `edit` to the freshly loaded record at `key` and saves it. `edit` may run more than
    /// once. When it returns an error nothing is saved.
    pub async fn update_month<T, F>(
        &self,
        key: MonthKey,
        mut edit: F,
    ) -> Result<(T, Saved<MonthRecord>)>
    where
        F: FnMut(&mut MonthRecord) -> Result<T> + Send,
        T: Send,
    {
        let ((value, record), report) = self
            .sync
            .mutate(|dataset| {
                let record = dataset.month_mut(key);
                let value = edit(record)?;
                Ok((value, record.clone()))
            })
            .await?;
        Ok((
            value,
            Saved {
                value: record,
                report,
            },
        ))
    }

    /// Replaces `to` with a copy of `from` that keeps income, target and payments and starts with
    /// zero balance and cash.
    pub async fn clone_month(&self, from: MonthKey, to: MonthKey) -> Result<Saved<MonthRecord>> {
        debug!("Cloning {from} into {to}");
        self.save(|dataset| carry::clone_month(dataset, from, to))
            .await
    }

    /// Appends copies of the `kind` payments of `from` to `to`.
    pub async fn copy_payments(
        &self,
        kind: PaymentKind,
        from: MonthKey,
        to: MonthKey,
    ) -> Result<Saved<MonthRecord>> {
        debug!("Copying {kind} payments from {from} to {to}");
        self.save(|dataset| carry::copy_payments(dataset, kind, from, to))
            .await
    }

    pub async fn transfer_balance(
        &self,
        to: MonthKey,
        amount: Amount,
    ) -> Result<Saved<MonthRecord>> {
        debug!("Setting the balance of {to} to {amount}");
        self.save(|dataset| carry::transfer_balance(dataset, to, amount))
            .await
    }

    pub async fn clear_month(&self, key: MonthKey) -> Result<Saved<MonthRecord>> {
        debug!("Clearing {key}");
        self.save(|dataset| carry::clear_month(dataset, key)).await
    }

    async fn save<F>(&self, mut operation: F) -> Result<Saved<MonthRecord>>
    where
        F: FnMut(&mut Dataset) -> MonthRecord + Send,
    {
        let (value, report) = self
            .sync
            .mutate(|dataset| Ok(operation(dataset)))
            .await?;
        Ok(Saved { value, report })
    }
}

#[async_trait::async_trait]
impl MonthSink for Ledger {
    async fn save_month(&self, key: MonthKey, record: MonthRecord) -> Result<SaveReport> {
        Ok(self.set_month(key, record).await?.report)
    }
}
