use crate::commands::Out;
use crate::ledger::Ledger;
use crate::model::{Amount, Dataset, MonthKey, MonthRecord, Payment};
use crate::summary::Summary;
use crate::sync::Origin;
use crate::{Config, Mode, Result};
use serde::Serialize;
use std::fmt::Write;

/// A month as `ledger show` prints it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthView {
    pub month: MonthKey,
    pub record: MonthRecord,
    pub summary: Summary,
}

impl MonthView {
    pub fn new(month: MonthKey, record: MonthRecord) -> Self {
        let summary = Summary::of(&record);
        Self {
            month,
            record,
            summary,
        }
    }

    pub(super) fn render(&self) -> String {
        let r = &self.record;
        let s = &self.summary;
        let mut out = String::new();
        let _ = writeln!(out, "{}", self.month);
        let _ = writeln!(out, "  Balance        {:>14}", r.balance().to_string());
        let _ = writeln!(out, "  Cash           {:>14}", r.cash().to_string());
        let _ = writeln!(out, "  Income         {:>14}", r.income().to_string());
        let _ = writeln!(out, "  Target         {:>14}", r.target().to_string());
        render_payments(
            &mut out,
            "Automatic payments",
            r.automatic_payments(),
            s.total_automatic,
        );
        render_payments(
            &mut out,
            "Credit payments",
            r.credit_payments(),
            s.total_credit,
        );
        let _ = writeln!(out, "  Total expenses {:>14}", s.total_expenses.to_string());
        let _ = writeln!(out, "  Available      {:>14}", s.total_available.to_string());
        let _ = writeln!(out, "  Remaining      {:>14}", s.remaining.to_string());
        let _ = write!(out, "  Spendable      {:>14}", s.spendable.to_string());
        if !s.meets_target() {
            out.push_str("  (below target)");
        }
        out
    }
}

fn render_payments(out: &mut String, title: &str, payments: &[Payment], total: Amount) {
    let _ = writeln!(out, "  {title} ({total})");
    for (index, payment) in payments.iter().enumerate() {
        let _ = writeln!(
            out,
            "    {index:>2}. {:<24} {:>12}  [{}]",
            payment.name(),
            payment.amount().to_string(),
            payment.id()
        );
    }
}

/// Shows one month and its totals. An absent month shows as the empty record.
pub async fn show_month(config: Config, mode: Mode, month: MonthKey) -> Result<Out<MonthView>> {
    let ledger = Ledger::open(&config, mode).await?;
    let snapshot = ledger.load().await?;
    let view = MonthView::new(month, snapshot.dataset().month(&month));
    let mut message = view.render();
    if let Some(note) = origin_note(snapshot.origin()) {
        message = format!("{message}\n{note}");
    }
    Ok(Out::new(message, view))
}

/// Shows every stored month, oldest first.
pub async fn show_all(config: Config, mode: Mode) -> Result<Out<Dataset>> {
    let ledger = Ledger::open(&config, mode).await?;
    let snapshot = ledger.load().await?;
    let dataset = snapshot.dataset();
    let mut message = if dataset.is_empty() {
        "The ledger has no months yet".to_string()
    } else {
        dataset
            .iter()
            .map(|(key, record)| MonthView::new(*key, record.clone()).render())
            .collect::<Vec<_>>()
            .join("\n\n")
    };
    if let Some(note) = origin_note(snapshot.origin()) {
        message = format!("{message}\n{note}");
    }
    Ok(Out::new(message, dataset.clone()))
}

fn origin_note(origin: Origin) -> Option<&'static str> {
    match origin {
        Origin::Remote => None,
        Origin::Cache => Some("(from the local cache, the remote store is not available)"),
        Origin::Empty => Some("(the remote store is not available and the local cache is empty)"),
    }
}
