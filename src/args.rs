//! These structs provide the CLI interface for the ledger CLI.

use crate::model::{Amount, MonthKey, PaymentId, PaymentKind};
use clap::{Parser, Subcommand};
use std::convert::Infallible;
use std::fmt::{Display, Formatter};
use std::net::SocketAddr;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::error;
use tracing_subscriber::filter::LevelFilter;

/// ledger: A monthly budget ledger that lives in a GitHub repository.
///
/// Each month holds your bank balance, cash, expected income, the amount you want to carry into
/// the next month, and two lists of payments: recurring (automatic) payments and installments.
/// The whole ledger is one JSON document in a GitHub repository. Every change is also written to
/// a local cache, so nothing is lost when GitHub cannot be reached or no token is configured.
#[derive(Debug, Parser, Clone)]
pub struct Args {
    #[clap(flatten)]
    common: Common,

    #[command(subcommand)]
    command: Command,
}

impl Args {
    pub fn new(common: Common, command: Command) -> Self {
        Self { common, command }
    }

    pub fn common(&self) -> &Common {
        &self.common
    }

    pub fn command(&self) -> &Command {
        &self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create the data directory and initialize the configuration files.
    ///
    /// - Decide what directory you want to store data in and pass this as --ledger-home. By
    ///   default, it will be $HOME/ledger.
    ///
    /// - Pass the GitHub repository that holds (or will hold) the ledger as --repo-url.
    ///
    /// - Optionally pass a GitHub token with write access to the repository's contents as
    ///   --token. Without a token every change is saved locally only. The token can also be
    ///   provided later through LEDGER_GITHUB_TOKEN.
    Init(InitArgs),
    /// Show a month with its totals, or the whole ledger.
    Show(ShowArgs),
    /// Change the balances, income or target of a month.
    Set(SetArgs),
    /// Add, edit, delete or reorder the payments of a month.
    Payment(PaymentArgs),
    /// Start a month from another: keeps income, target and payments, zeroes balance and cash.
    Clone(CloneArgs),
    /// Append copies of one payment list of a month to another month.
    Copy(CopyArgs),
    /// Set the balance of a month, by default to what remains of the month before it.
    Transfer(TransferArgs),
    /// Reset a month to the empty record.
    Clear(MonthArgs),
    /// Download the remote ledger into the local cache, keeping a backup of what was downloaded.
    Pull,
    /// Serve the ledger over HTTP.
    Serve(ServeArgs),
}

/// Arguments common to all subcommands.
#[derive(Debug, Parser, Clone)]
pub struct Common {
    /// The logging verbosity. One of, from least to most verbose:
    /// off, error, warn, info, debug, trace
    ///
    /// This can be overridden by RUST_LOG.
    #[arg(long, default_value_t = LevelFilter::INFO)]
    log_level: LevelFilter,

    /// The directory where ledger data and configuration is held. Defaults to ~/ledger
    #[arg(long, env = "LEDGER_HOME", default_value_t = default_ledger_home())]
    ledger_home: DisplayPath,
}

impl Common {
    pub fn new(log_level: LevelFilter, ledger_home: PathBuf) -> Self {
        Self {
            log_level,
            ledger_home: ledger_home.into(),
        }
    }

    pub fn log_level(&self) -> LevelFilter {
        self.log_level
    }

    pub fn ledger_home(&self) -> &DisplayPath {
        &self.ledger_home
    }
}

/// Args for the `ledger init` command.
#[derive(Debug, Parser, Clone)]
pub struct InitArgs {
    /// The GitHub repository that holds the ledger documents. It looks like this:
    /// https://github.com/OWNER/REPO
    #[arg(long)]
    repo_url: String,

    /// A GitHub token with write access to the repository's contents. It is saved to the secrets
    /// directory, readable only by you.
    #[arg(long)]
    token: Option<String>,
}

impl InitArgs {
    pub fn new(repo_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            repo_url: repo_url.into(),
            token,
        }
    }

    pub fn repo_url(&self) -> &str {
        &self.repo_url
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }
}

/// Selects a single month. Defaults to the current month.
#[derive(Debug, Parser, Clone)]
pub struct MonthArgs {
    /// The month, written YYYY-MM.
    #[arg(long, default_value_t = MonthKey::current())]
    month: MonthKey,
}

impl MonthArgs {
    pub fn new(month: MonthKey) -> Self {
        Self { month }
    }

    pub fn month(&self) -> MonthKey {
        self.month
    }
}

/// Args for the `ledger show` command.
#[derive(Debug, Parser, Clone)]
pub struct ShowArgs {
    #[clap(flatten)]
    month: MonthArgs,

    /// Show every month instead of one.
    #[arg(long, conflicts_with = "month")]
    all: bool,
}

impl ShowArgs {
    pub fn new(month: MonthKey, all: bool) -> Self {
        Self {
            month: MonthArgs::new(month),
            all,
        }
    }

    pub fn month(&self) -> MonthKey {
        self.month.month()
    }

    pub fn all(&self) -> bool {
        self.all
    }
}

/// Args for the `ledger set` command. Fields that are not given keep their value.
#[derive(Debug, Parser, Clone)]
pub struct SetArgs {
    #[clap(flatten)]
    month: MonthArgs,

    /// The bank balance.
    #[arg(long, allow_hyphen_values = true)]
    balance: Option<Amount>,

    /// Cash on hand.
    #[arg(long, allow_hyphen_values = true)]
    cash: Option<Amount>,

    /// Expected income.
    #[arg(long, allow_hyphen_values = true)]
    income: Option<Amount>,

    /// The amount to keep for next month.
    #[arg(long, allow_hyphen_values = true)]
    target: Option<Amount>,
}

impl SetArgs {
    pub fn new(
        month: MonthKey,
        balance: Option<Amount>,
        cash: Option<Amount>,
        income: Option<Amount>,
        target: Option<Amount>,
    ) -> Self {
        Self {
            month: MonthArgs::new(month),
            balance,
            cash,
            income,
            target,
        }
    }

    pub fn month(&self) -> MonthKey {
        self.month.month()
    }

    pub fn balance(&self) -> Option<Amount> {
        self.balance
    }

    pub fn cash(&self) -> Option<Amount> {
        self.cash
    }

    pub fn income(&self) -> Option<Amount> {
        self.income
    }

    pub fn target(&self) -> Option<Amount> {
        self.target
    }
}

/// Args for the `ledger payment` command.
#[derive(Debug, Parser, Clone)]
pub struct PaymentArgs {
    #[command(subcommand)]
    action: PaymentSubcommand,
}

impl PaymentArgs {
    pub fn new(action: PaymentSubcommand) -> Self {
        Self { action }
    }

    pub fn action(&self) -> &PaymentSubcommand {
        &self.action
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum PaymentSubcommand {
    /// Add a payment to the end of a list.
    Add(PaymentAddArgs),
    /// Change the name or amount of a payment.
    Edit(PaymentEditArgs),
    /// Delete a payment.
    Delete(PaymentTarget),
    /// Move a payment to another position in its list.
    Move(PaymentMoveArgs),
}

/// The list a payment command works on.
#[derive(Debug, Parser, Clone)]
pub struct PaymentList {
    #[clap(flatten)]
    month: MonthArgs,

    /// Which list: recurring (automatic payments) or installment (credit payments).
    #[arg(long, default_value_t = PaymentKind::Recurring)]
    kind: PaymentKind,
}

impl PaymentList {
    pub fn new(month: MonthKey, kind: PaymentKind) -> Self {
        Self {
            month: MonthArgs::new(month),
            kind,
        }
    }

    pub fn month(&self) -> MonthKey {
        self.month.month()
    }

    pub fn kind(&self) -> PaymentKind {
        self.kind
    }
}

#[derive(Debug, Parser, Clone)]
pub struct PaymentAddArgs {
    #[clap(flatten)]
    list: PaymentList,

    #[arg(long)]
    name: String,

    #[arg(long)]
    amount: Amount,
}

impl PaymentAddArgs {
    pub fn new(list: PaymentList, name: impl Into<String>, amount: Amount) -> Self {
        Self {
            list,
            name: name.into(),
            amount,
        }
    }

    pub fn list(&self) -> &PaymentList {
        &self.list
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }
}

/// Identifies one payment.
#[derive(Debug, Parser, Clone)]
pub struct PaymentTarget {
    #[clap(flatten)]
    list: PaymentList,

    /// The id of the payment, as shown by `ledger show`.
    #[arg(long)]
    id: String,
}

impl PaymentTarget {
    pub fn new(list: PaymentList, id: impl Into<String>) -> Self {
        Self {
            list,
            id: id.into(),
        }
    }

    pub fn list(&self) -> &PaymentList {
        &self.list
    }

    pub fn id(&self) -> PaymentId {
        PaymentId::from(self.id.as_str())
    }
}

#[derive(Debug, Parser, Clone)]
pub struct PaymentEditArgs {
    #[clap(flatten)]
    target: PaymentTarget,

    #[arg(long)]
    name: Option<String>,

    #[arg(long, allow_hyphen_values = true)]
    amount: Option<Amount>,
}

impl PaymentEditArgs {
    pub fn new(target: PaymentTarget, name: Option<String>, amount: Option<Amount>) -> Self {
        Self {
            target,
            name,
            amount,
        }
    }

    pub fn target(&self) -> &PaymentTarget {
        &self.target
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn amount(&self) -> Option<Amount> {
        self.amount
    }
}

#[derive(Debug, Parser, Clone)]
pub struct PaymentMoveArgs {
    #[clap(flatten)]
    list: PaymentList,

    /// The current position of the payment, starting at 0.
    #[arg(long)]
    from: usize,

    /// The position the payment should end up at, starting at 0.
    #[arg(long)]
    to: usize,
}

impl PaymentMoveArgs {
    pub fn new(list: PaymentList, from: usize, to: usize) -> Self {
        Self { list, from, to }
    }

    pub fn list(&self) -> &PaymentList {
        &self.list
    }

    pub fn from(&self) -> usize {
        self.from
    }

    pub fn to(&self) -> usize {
        self.to
    }
}

/// Args for the `ledger clone` command.
#[derive(Debug, Parser, Clone)]
pub struct CloneArgs {
    /// The month to copy from.
    #[arg(long)]
    from: MonthKey,

    /// The month to replace. Defaults to the month after --from.
    #[arg(long)]
    to: Option<MonthKey>,
}

impl CloneArgs {
    pub fn new(from: MonthKey, to: Option<MonthKey>) -> Self {
        Self { from, to }
    }

    pub fn from(&self) -> MonthKey {
        self.from
    }

    /// `None` when --to was omitted and --from is the last representable month.
    pub fn to(&self) -> Option<MonthKey> {
        self.to.or_else(|| self.from.next())
    }
}

/// Args for the `ledger copy` command.
#[derive(Debug, Parser, Clone)]
pub struct CopyArgs {
    /// Which list to copy.
    #[arg(long)]
    kind: PaymentKind,

    /// The month to copy from.
    #[arg(long)]
    from: MonthKey,

    /// The month to append to. Defaults to the month after --from.
    #[arg(long)]
    to: Option<MonthKey>,
}

impl CopyArgs {
    pub fn new(kind: PaymentKind, from: MonthKey, to: Option<MonthKey>) -> Self {
        Self { kind, from, to }
    }

    pub fn kind(&self) -> PaymentKind {
        self.kind
    }

    pub fn from(&self) -> MonthKey {
        self.from
    }

    /// `None` when --to was omitted and --from is the last representable month.
    pub fn to(&self) -> Option<MonthKey> {
        self.to.or_else(|| self.from.next())
    }
}

/// Args for the `ledger transfer` command.
#[derive(Debug, Parser, Clone)]
pub struct TransferArgs {
    /// The month whose balance is set.
    #[arg(long)]
    to: MonthKey,

    /// The new balance. Defaults to the remaining amount of the month before --to, which must be
    /// positive.
    #[arg(long, allow_hyphen_values = true)]
    amount: Option<Amount>,
}

impl TransferArgs {
    pub fn new(to: MonthKey, amount: Option<Amount>) -> Self {
        Self { to, amount }
    }

    pub fn to(&self) -> MonthKey {
        self.to
    }

    pub fn amount(&self) -> Option<Amount> {
        self.amount
    }
}

/// Args for the `ledger serve` command.
#[derive(Debug, Parser, Clone)]
pub struct ServeArgs {
    /// The address to listen on.
    #[arg(long, default_value = "127.0.0.1:8080")]
    addr: SocketAddr,
}

impl ServeArgs {
    pub fn new(addr: SocketAddr) -> Self {
        Self { addr }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

fn default_ledger_home() -> DisplayPath {
    DisplayPath(match dirs::home_dir() {
        Some(home) => home.join("ledger"),
        None => {
            error!(
                "There was an error when trying to get your home directory. You can get around \
                this by providing --ledger-home or LEDGER_HOME instead of relying on the default \
                ledger home directory. If you continue using the program right now, you may have \
                problems!",
            );
            PathBuf::from("ledger")
        }
    })
}

#[derive(Debug, Default, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DisplayPath(PathBuf);

impl From<PathBuf> for DisplayPath {
    fn from(value: PathBuf) -> Self {
        DisplayPath(value)
    }
}

impl Deref for DisplayPath {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<Path> for DisplayPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl Display for DisplayPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_string_lossy())
    }
}

impl FromStr for DisplayPath {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(PathBuf::from(s)))
    }
}

impl DisplayPath {
    pub fn new(path: PathBuf) -> Self {
        Self(path)
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("ledger").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_args_are_consistent() {
        <Args as CommandFactory>::command().debug_assert();
    }

    #[test]
    fn test_parse_clone_defaults_to_next_month() {
        let args = parse(&["clone", "--from", "2026-12"]);
        let Command::Clone(clone) = args.command() else {
            panic!("expected clone, got {:?}", args.command());
        };
        assert_eq!(clone.to().unwrap().to_string(), "2027-01");

        let args = parse(&["clone", "--from", "9999-12"]);
        let Command::Clone(clone) = args.command() else {
            panic!("expected clone, got {:?}", args.command());
        };
        assert_eq!(clone.to(), None);
    }

    #[test]
    fn test_parse_payment_add() {
        let args = parse(&[
            "--ledger-home",
            "/tmp/ledger-test",
            "payment",
            "add",
            "--month",
            "2026-03",
            "--kind",
            "installment",
            "--name",
            "Laptop",
            "--amount",
            "$1,200.50",
        ]);
        assert_eq!(
            args.common().ledger_home().path(),
            Path::new("/tmp/ledger-test")
        );
        let Command::Payment(payment) = args.command() else {
            panic!("expected payment, got {:?}", args.command());
        };
        let PaymentSubcommand::Add(add) = payment.action() else {
            panic!("expected add, got {:?}", payment.action());
        };
        assert_eq!(add.list().kind(), PaymentKind::Installment);
        assert_eq!(add.list().month().to_string(), "2026-03");
        assert_eq!(add.amount(), Amount::from_cents(120_050));
    }

    #[test]
    fn test_bad_month_is_rejected() {
        let result = Args::try_parse_from(["ledger", "clear", "--month", "2026-13"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_huge_amount_is_rejected() {
        let result = Args::try_parse_from([
            "ledger",
            "set",
            "--month",
            "2026-01",
            "--balance",
            "10000000000000000000000000000",
        ]);
        assert!(result.is_err());
    }
}
