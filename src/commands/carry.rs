use crate::args::{CloneArgs, CopyArgs, TransferArgs};
use crate::commands::Out;
use crate::ledger::{Ledger, Saved};
use crate::model::{Amount, MonthKey, MonthRecord};
use crate::summary::Summary;
use crate::{Config, Error, Mode, Result};
use tracing::debug;

type Written = Out<Saved<MonthRecord>>;

pub async fn clone(config: Config, mode: Mode, args: CloneArgs) -> Result<Written> {
    let ledger = Ledger::open(&config, mode).await?;
    let from = args.from();
    let to = target(from, args.to())?;
    let saved = ledger.clone_month(from, to).await?;
    let message = if saved.value.is_empty() {
        format!("{from} has no data, {to} was reset to empty. {}", saved.report.describe())
    } else {
        format!(
            "Started {to} from {from} with {} automatic and {} credit payment(s). {}",
            saved.value.automatic_payments().len(),
            saved.value.credit_payments().len(),
            saved.report.describe()
        )
    };
    Ok(Out::new(message, saved))
}

pub async fn copy(config: Config, mode: Mode, args: CopyArgs) -> Result<Written> {
    let ledger = Ledger::open(&config, mode).await?;
    let to = target(args.from(), args.to())?;
    let saved = ledger.copy_payments(args.kind(), args.from(), to).await?;
    Ok(Out::new(
        format!(
            "Copied the {} payments of {} to {to}, which now has {}. {}",
            args.kind(),
            args.from(),
            saved.value.payments(args.kind()).len(),
            saved.report.describe()
        ),
        saved,
    ))
}

/// Sets the balance of a month. Without an amount the balance becomes what remains of the month
/// before it, which must be positive.
pub async fn transfer(config: Config, mode: Mode, args: TransferArgs) -> Result<Written> {
    let ledger = Ledger::open(&config, mode).await?;
    let to = args.to();
    let amount = match args.amount() {
        Some(amount) => amount,
        None => {
            let previous = to
                .prev()
                .ok_or_else(|| Error::validation(format!("There is no month before {to}")))?;
            let remaining = Summary::of(&ledger.get_month(previous).await?).remaining;
            debug!("The remaining amount of {previous} is {remaining}");
            if remaining <= Amount::ZERO {
                return Err(Error::validation(format!(
                    "Nothing remains of {previous} ({remaining}) to carry into {to}, \
                    pass --amount to set the balance anyway"
                )));
            }
            remaining
        }
    };
    let saved = ledger.transfer_balance(to, amount).await?;
    Ok(Out::new(
        format!(
            "Set the balance of {to} to {amount}. {}",
            saved.report.describe()
        ),
        saved,
    ))
}

/// The explicit target, or an error when the month after `from` was wanted and there is none.
fn target(from: MonthKey, to: Option<MonthKey>) -> Result<MonthKey> {
    to.ok_or_else(|| Error::validation(format!("There is no month after {from}, pass --to")))
}

pub async fn clear(config: Config, mode: Mode, month: MonthKey) -> Result<Written> {
    let ledger = Ledger::open(&config, mode).await?;
    let saved = ledger.clear_month(month).await?;
    Ok(Out::new(
        format!("Cleared {month}. {}", saved.report.describe()),
        saved,
    ))
}
