use crate::args::{PaymentSubcommand, SetArgs};
use crate::commands::Out;
use crate::ledger::{Ledger, Saved};
use crate::model::MonthRecord;
use crate::sync::{Autosave, MonthEditor, SaveReport};
use crate::{Config, Mode, Result};
use std::sync::Arc;
use tracing::debug;

/// Changes the balance, cash, income and/or target of a month.
///
/// The changes are made through autosave, the same way an interactive editor makes them, so they
/// are coalesced into a single save. Giving values that are already stored saves nothing.
pub async fn set(config: Config, mode: Mode, args: SetArgs) -> Result<Out<Saved<MonthRecord>>> {
    let ledger = Ledger::open(&config, mode).await?;
    let month = args.month();
    let record = ledger.get_month(month).await?;

    let autosave = Autosave::spawn(Arc::new(ledger.clone()), config.autosave_delay());
    let mut editor = MonthEditor::open(&autosave, month, record);
    if let Some(value) = args.balance() {
        editor.edit(|r| r.set_balance(value));
    }
    if let Some(value) = args.cash() {
        editor.edit(|r| r.set_cash(value));
    }
    if let Some(value) = args.income() {
        editor.edit(|r| r.set_income(value));
    }
    if let Some(value) = args.target() {
        editor.edit(|r| r.set_target(value));
    }
    let record = editor.record().clone();

    match autosave.shutdown().await {
        None => {
            debug!("Nothing changed in {month}");
            Ok(Out::new(
                format!("{month} already has these values, nothing was saved"),
                Saved {
                    value: record,
                    report: SaveReport::unchanged(),
                },
            ))
        }
        Some(result) => {
            let report = result?;
            Ok(Out::new(
                format!("Updated {month}. {}", report.describe()),
                Saved {
                    value: record,
                    report,
                },
            ))
        }
    }
}

/// Adds, edits, deletes or moves one payment of a month.
pub async fn payment(
    config: Config,
    mode: Mode,
    action: PaymentSubcommand,
) -> Result<Out<Saved<MonthRecord>>> {
    let ledger = Ledger::open(&config, mode).await?;
    match action {
        PaymentSubcommand::Add(args) => {
            let list = args.list();
            let (id, saved) = ledger
                .update_month(list.month(), |record| {
                    record.add_payment(list.kind(), args.name(), args.amount())
                })
                .await?;
            Ok(Out::new(
                format!(
                    "Added {} payment '{}' with id {id} to {}. {}",
                    list.kind(),
                    args.name().trim(),
                    list.month(),
                    saved.report.describe()
                ),
                saved,
            ))
        }
        PaymentSubcommand::Edit(args) => {
            let target = args.target();
            let list = target.list();
            let id = target.id();
            let ((), saved) = ledger
                .update_month(list.month(), |record| {
                    record.edit_payment(list.kind(), &id, args.name(), args.amount())
                })
                .await?;
            Ok(Out::new(
                format!(
                    "Updated {} payment {id} in {}. {}",
                    list.kind(),
                    list.month(),
                    saved.report.describe()
                ),
                saved,
            ))
        }
        PaymentSubcommand::Delete(target) => {
            let list = target.list();
            let id = target.id();
            let (removed, saved) = ledger
                .update_month(list.month(), |record| record.remove_payment(list.kind(), &id))
                .await?;
            Ok(Out::new(
                format!(
                    "Deleted {} payment '{}' from {}. {}",
                    list.kind(),
                    removed.name(),
                    list.month(),
                    saved.report.describe()
                ),
                saved,
            ))
        }
        PaymentSubcommand::Move(args) => {
            let list = args.list();
            let (moved, saved) = ledger
                .update_month(list.month(), |record| {
                    Ok(record.move_payment(list.kind(), args.from(), args.to()))
                })
                .await?;
            let message = if moved {
                format!(
                    "Moved {} payment {} to position {} in {}. {}",
                    list.kind(),
                    args.from(),
                    args.to(),
                    list.month(),
                    saved.report.describe()
                )
            } else {
                format!(
                    "Position {} or {} is out of range, the order of the {} payments in {} is \
                    unchanged",
                    args.from(),
                    args.to(),
                    list.kind(),
                    list.month()
                )
            };
            Ok(Out::new(message, saved))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::{PaymentAddArgs, PaymentList, PaymentMoveArgs, PaymentTarget};
    use crate::model::{Amount, MonthKey, PaymentKind};
    use crate::test::TestEnv;
    use std::str::FromStr;

    fn april() -> MonthKey {
        MonthKey::from_str("2026-04").unwrap()
    }

    fn add(name: &str, cents: i64) -> PaymentSubcommand {
        PaymentSubcommand::Add(PaymentAddArgs::new(
            PaymentList::new(april(), PaymentKind::Recurring),
            name,
            Amount::from_cents(cents),
        ))
    }

    #[tokio::test]
    async fn test_set_coalesces_into_one_save() {
        let env = TestEnv::new().await;
        let args = SetArgs::new(
            april(),
            Some(Amount::from_cents(100)),
            Some(Amount::from_cents(200)),
            Some(Amount::from_cents(300)),
            None,
        );
        let out = set(env.config(), Mode::Test, args).await.unwrap();
        let saved = out.structure().unwrap();
        assert!(saved.report.is_committed());
        assert_eq!(saved.value.income(), Amount::from_cents(300));
        assert_eq!(env.store().write_count("public/budget.json"), 1);

        let args = SetArgs::new(april(), Some(Amount::from_cents(100)), None, None, None);
        let out = set(env.config(), Mode::Test, args).await.unwrap();
        assert!(out.message().contains("nothing was saved"));
        assert_eq!(env.store().write_count("public/budget.json"), 1);
    }

    #[tokio::test]
    async fn test_payment_commands() {
        let env = TestEnv::new().await;
        payment(env.config(), Mode::Test, add("Rent", 100_000))
            .await
            .unwrap();
        let out = payment(env.config(), Mode::Test, add("Phone", 4_500))
            .await
            .unwrap();
        let phone = out.structure().unwrap().value.automatic_payments()[1].clone();

        let out = payment(
            env.config(),
            Mode::Test,
            PaymentSubcommand::Move(PaymentMoveArgs::new(
                PaymentList::new(april(), PaymentKind::Recurring),
                1,
                0,
            )),
        )
        .await
        .unwrap();
        let names: Vec<_> = out
            .structure()
            .unwrap()
            .value
            .automatic_payments()
            .iter()
            .map(|p| p.name().to_string())
            .collect();
        assert_eq!(names, ["Phone", "Rent"]);

        let out = payment(
            env.config(),
            Mode::Test,
            PaymentSubcommand::Move(PaymentMoveArgs::new(
                PaymentList::new(april(), PaymentKind::Recurring),
                0,
                5,
            )),
        )
        .await
        .unwrap();
        assert!(out.message().contains("out of range"));

        let out = payment(
            env.config(),
            Mode::Test,
            PaymentSubcommand::Delete(PaymentTarget::new(
                PaymentList::new(april(), PaymentKind::Recurring),
                phone.id().as_str(),
            )),
        )
        .await
        .unwrap();
        assert!(out.message().contains("'Phone'"));
        assert_eq!(out.structure().unwrap().value.automatic_payments().len(), 1);

        let err = payment(env.config(), Mode::Test, add("  ", 1))
            .await
            .unwrap_err();
        assert!(err.is_validation());
    }
}
