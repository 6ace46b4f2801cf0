//! Debounced saving of month edits.
//!
//! Edits are sent to a background task that waits for a quiet period before saving. Each new edit
//! restarts the wait, so a burst of edits produces one save of the final state. An edit for a
//! different month saves the pending one first. A save that has started always runs to the end;
//! edits that arrive meanwhile form the next burst.

use crate::error::Result;
use crate::model::{MonthKey, MonthRecord};
use crate::sync::SaveReport;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info};

/// Receives the month records that autosave decides to persist.
#[async_trait::async_trait]
pub trait MonthSink: Send + Sync + 'static {
    async fn save_month(&self, key: MonthKey, record: MonthRecord) -> Result<SaveReport>;
}

enum Command {
    Edit(MonthKey, MonthRecord),
    Flush(oneshot::Sender<Option<Result<SaveReport>>>),
}

/// Handle to the debouncing task. Dropping it stops the task after it has saved anything pending.
pub struct Autosave {
    tx: mpsc::UnboundedSender<Command>,
    task: JoinHandle<()>,
}

impl Autosave {
    /// Starts the debouncing task on the current runtime.
    pub fn spawn(sink: Arc<dyn MonthSink>, quiet: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(sink, quiet, rx));
        Self { tx, task }
    }

    /// Schedules a save of `record` under `key` once edits have been quiet for the configured
    /// period.
    pub fn notify(&self, key: MonthKey, record: MonthRecord) {
        if self.tx.send(Command::Edit(key, record)).is_err() {
            error!("Autosave has stopped, the edit to {key} will not be saved");
        }
    }

    /// Saves any pending edit now and returns the result of that save, or `None` if nothing was
    /// pending.
    pub async fn flush(&self) -> Option<Result<SaveReport>> {
        let (done, result) = oneshot::channel();
        self.tx.send(Command::Flush(done)).ok()?;
        result.await.ok().flatten()
    }

    /// Saves any pending edit and stops the task.
    pub async fn shutdown(self) -> Option<Result<SaveReport>> {
        let result = self.flush().await;
        drop(self.tx);
        if let Err(e) = self.task.await {
            error!("The autosave task ended abnormally: {e}");
        }
        result
    }
}

async fn run(
    sink: Arc<dyn MonthSink>,
    quiet: Duration,
    mut rx: mpsc::UnboundedReceiver<Command>,
) {
    let mut pending: Option<(MonthKey, MonthRecord)> = None;
    let timer = sleep(quiet);
    tokio::pin!(timer);

    loop {
        tokio::select! {
            command = rx.recv() => match command {
                Some(Command::Edit(key, record)) => {
                    if pending.as_ref().is_some_and(|(pending_key, _)| *pending_key != key) {
                        if let Some((previous, record)) = pending.take() {
                            debug!("Autosave: {key} was edited, saving {previous} first");
                            save(sink.as_ref(), previous, record).await;
                        }
                    }
                    pending = Some((key, record));
                    timer.as_mut().reset(Instant::now() + quiet);
                }
                Some(Command::Flush(done)) => {
                    let result = match pending.take() {
                        Some((key, record)) => Some(save(sink.as_ref(), key, record).await),
                        None => None,
                    };
                    let _ = done.send(result);
                }
                None => {
                    if let Some((key, record)) = pending.take() {
                        save(sink.as_ref(), key, record).await;
                    }
                    break;
                }
            },
            () = &mut timer, if pending.is_some() => {
                if let Some((key, record)) = pending.take() {
                    save(sink.as_ref(), key, record).await;
                }
            }
        }
    }
}

async fn save(sink: &dyn MonthSink, key: MonthKey, record: MonthRecord) -> Result<SaveReport> {
    let result = sink.save_month(key, record).await;
    match &result {
        Ok(report) => info!("Autosaved {key}: {}", report.describe()),
        Err(e) => error!("Autosave of {key} failed: {e}"),
    }
    result
}

/// Edits one month at a time and tells autosave about every change.
///
/// Opening a month is not an edit: it never schedules a save.
pub struct MonthEditor<'a> {
    autosave: &'a Autosave,
    key: MonthKey,
    record: MonthRecord,
}

impl<'a> MonthEditor<'a> {
    pub fn open(autosave: &'a Autosave, key: MonthKey, record: MonthRecord) -> Self {
        Self {
            autosave,
            key,
            record,
        }
    }

    /// Replaces the month being edited, e.g. after navigating to another month. Not an edit.
    pub fn switch(&mut self, key: MonthKey, record: MonthRecord) {
        self.key = key;
        self.record = record;
    }

    pub fn key(&self) -> MonthKey {
        self.key
    }

    pub fn record(&self) -> &MonthRecord {
        &self.record
    }

    /// Applies `change` and schedules a save if the record is now different.
    pub fn edit<T>(&mut self, change: impl FnOnce(&mut MonthRecord) -> T) -> T {
        let before = self.record.clone();
        let value = change(&mut self.record);
        if self.record != before {
            self.autosave.notify(self.key, self.record.clone());
        }
        value
    }
}
