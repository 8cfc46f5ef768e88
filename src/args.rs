//! These structs provide the CLI interface for the finanzas CLI.

use crate::api::{PasswordChange, ProfileUpdate, Registration};
use crate::model::Amount;
use crate::report::Window;
use crate::utils::parse_amount;
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt::{Display, Formatter};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::error;
use tracing_subscriber::filter::LevelFilter;

/// finanzas: keep track of your income, expenses, savings and goals from the command line.
///
/// Your records are held by a finanzas server. This program logs in to it, lets you add, change
/// and delete records, and computes reports (totals, top expenses, categories, monthly evolution
/// and goal progress) from what the server returns.
///
/// Start with `finanzas init --base-url <URL>` and then `finanzas login <USERNAME>`.
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
    /// Create the data directory and the configuration file.
    ///
    /// This is the first command you should run. By default the data directory is
    /// $HOME/finanzas; pass --finanzas-home if you want it somewhere else.
    Init(InitArgs),
    /// Create an account on the server. You are logged in afterwards if the server allows it.
    Register(RegisterArgs),
    /// Log in and remember the session.
    Login(LoginArgs),
    /// Forget the session.
    Logout,
    /// Show whether you are logged in, and as whom.
    Status,
    /// Show or change your profile.
    Profile(ProfileArgs),
    /// Change your password.
    Password(PasswordArgs),
    /// List the records of one kind.
    List(KindArgs),
    /// List the frequencies that recurring expenses and goals can have.
    Frequencies,
    /// Add a record.
    Add(AddArgs),
    /// Replace a record. Fields you do not pass keep their current values.
    Update(UpdateArgs),
    /// Delete a record.
    Delete(DeleteArgs),
    /// Put money into a savings fund.
    Deposit(MoneyArgs),
    /// Put money towards a goal. You cannot go over the goal's target.
    Contribute(MoneyArgs),
    /// Compute a report.
    Report(ReportArgs),
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

    /// The directory where finanzas keeps its configuration and session. Defaults to ~/finanzas
    #[arg(long, env = "FINANZAS_HOME", default_value_t = default_finanzas_home())]
    finanzas_home: DisplayPath,
}

impl Common {
    pub fn new(log_level: LevelFilter, finanzas_home: PathBuf) -> Self {
        Self {
            log_level,
            finanzas_home: finanzas_home.into(),
        }
    }

    pub fn log_level(&self) -> LevelFilter {
        self.log_level
    }

    pub fn finanzas_home(&self) -> &DisplayPath {
        &self.finanzas_home
    }
}

/// Args for the `finanzas init` command.
#[derive(Debug, Parser, Clone)]
pub struct InitArgs {
    /// The origin of the finanzas API, e.g. https://finanzas.example.com
    #[arg(long)]
    base_url: String,
}

impl InitArgs {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

/// Args for the `finanzas register` command.
#[derive(Debug, Parser, Clone)]
pub struct RegisterArgs {
    username: String,

    #[arg(long, env = "FINANZAS_PASSWORD", hide_env_values = true)]
    password: String,

    #[arg(long)]
    email: Option<String>,
}

impl RegisterArgs {
    pub fn registration(&self) -> Registration {
        Registration {
            username: self.username.clone(),
            password: self.password.clone(),
            email: self.email.clone(),
        }
    }
}

/// Args for the `finanzas login` command.
#[derive(Debug, Parser, Clone)]
pub struct LoginArgs {
    username: String,

    /// Your password. Prefer the environment variable so it does not end up in your shell history.
    #[arg(long, env = "FINANZAS_PASSWORD", hide_env_values = true)]
    password: String,
}

impl LoginArgs {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

/// Args for the `finanzas profile` command. With no options the stored profile is shown.
#[derive(Debug, Parser, Clone, Default)]
pub struct ProfileArgs {
    #[arg(long)]
    username: Option<String>,

    #[arg(long)]
    email: Option<String>,

    #[arg(long)]
    first_name: Option<String>,

    #[arg(long)]
    last_name: Option<String>,
}

impl ProfileArgs {
    pub fn update(&self) -> ProfileUpdate {
        ProfileUpdate {
            username: self.username.clone(),
            email: self.email.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
        }
    }
}

/// Args for the `finanzas password` command.
#[derive(Debug, Parser, Clone)]
pub struct PasswordArgs {
    #[arg(long, env = "FINANZAS_PASSWORD", hide_env_values = true)]
    current: String,

    #[arg(long, env = "FINANZAS_NEW_PASSWORD", hide_env_values = true)]
    new: String,
}

impl PasswordArgs {
    pub fn change(&self) -> PasswordChange {
        PasswordChange {
            old_password: self.current.clone(),
            new_password: self.new.clone(),
        }
    }
}

/// The kinds of records.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
    Income,
    #[default]
    Expense,
    Recurring,
    Savings,
    Goal,
}

serde_plain::derive_display_from_serialize!(Kind);
serde_plain::derive_fromstr_from_deserialize!(Kind);

#[derive(Debug, Parser, Clone)]
pub struct KindArgs {
    #[arg(value_enum)]
    kind: Kind,
}

impl KindArgs {
    pub fn new(kind: Kind) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }
}

/// The fields of a record. Which of them are needed depends on the kind:
///
/// - income, expense: --amount, --date, --description
/// - recurring: --amount, --description and optionally --frequency
/// - savings: --name, --amount, --start-date and optionally --end-date (one year after the start
///   by default) and --description
/// - goal: --name, --target and optionally --current and --frequency
#[derive(Debug, Parser, Clone, Default, PartialEq, Eq)]
pub struct RecordFields {
    #[arg(long, value_parser = parse_amount, allow_hyphen_values = true)]
    pub amount: Option<Amount>,

    /// YYYY-MM-DD
    #[arg(long)]
    pub date: Option<NaiveDate>,

    #[arg(long)]
    pub description: Option<String>,

    #[arg(long)]
    pub name: Option<String>,

    /// YYYY-MM-DD
    #[arg(long)]
    pub start_date: Option<NaiveDate>,

    /// YYYY-MM-DD
    #[arg(long)]
    pub end_date: Option<NaiveDate>,

    /// The amount a goal is aiming for.
    #[arg(long, value_parser = parse_amount)]
    pub target: Option<Amount>,

    /// The amount already put towards a goal.
    #[arg(long, value_parser = parse_amount)]
    pub current: Option<Amount>,

    /// The id of a frequency, see `finanzas frequencies`.
    #[arg(long)]
    pub frequency: Option<u64>,
}

/// Args for the `finanzas add` command.
#[derive(Debug, Parser, Clone)]
pub struct AddArgs {
    #[arg(value_enum)]
    kind: Kind,

    #[clap(flatten)]
    fields: RecordFields,
}

impl AddArgs {
    pub fn new(kind: Kind, fields: RecordFields) -> Self {
        Self { kind, fields }
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn fields(&self) -> &RecordFields {
        &self.fields
    }
}

/// Args for the `finanzas update` command.
#[derive(Debug, Parser, Clone)]
pub struct UpdateArgs {
    #[arg(value_enum)]
    kind: Kind,

    id: u64,

    #[clap(flatten)]
    fields: RecordFields,
}

impl UpdateArgs {
    pub fn new(kind: Kind, id: u64, fields: RecordFields) -> Self {
        Self { kind, id, fields }
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn fields(&self) -> &RecordFields {
        &self.fields
    }
}

/// Args for the `finanzas delete` command.
#[derive(Debug, Parser, Clone)]
pub struct DeleteArgs {
    #[arg(value_enum)]
    kind: Kind,

    id: u64,
}

impl DeleteArgs {
    pub fn new(kind: Kind, id: u64) -> Self {
        Self { kind, id }
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

/// Args for `finanzas deposit` and `finanzas contribute`.
#[derive(Debug, Parser, Clone)]
pub struct MoneyArgs {
    id: u64,

    #[arg(value_parser = parse_amount)]
    amount: Amount,
}

impl MoneyArgs {
    pub fn new(id: u64, amount: Amount) -> Self {
        Self { id, amount }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }
}

/// Args for the `finanzas report` command.
#[derive(Debug, Parser, Clone)]
pub struct ReportArgs {
    #[command(subcommand)]
    report: Report,
}

impl ReportArgs {
    pub fn new(report: Report) -> Self {
        Self { report }
    }

    pub fn report(&self) -> &Report {
        &self.report
    }
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Report {
    /// Income, expenses, savings and the balance.
    Summary,
    /// The total of every kind of record.
    Totals,
    /// The largest records of one kind.
    Top {
        #[arg(value_enum, default_value_t = Kind::Expense)]
        kind: Kind,

        /// How many to show. Defaults to `top_n` in config.json.
        #[arg(long, short)]
        n: Option<usize>,
    },
    /// Totals per keyword category, or per exact description with --by-label.
    Categories {
        #[arg(value_enum, default_value_t = Kind::Expense)]
        kind: Kind,

        #[arg(long)]
        by_label: bool,
    },
    /// Income, expense, savings and balance for each of the last 6 or 12 months.
    Evolution {
        #[arg(long, value_enum, default_value_t = Window::Six)]
        months: Window,
    },
    /// How far along each goal is.
    Goals,
}

fn default_finanzas_home() -> DisplayPath {
    DisplayPath(match dirs::home_dir() {
        Some(home) => home.join("finanzas"),
        None => {
            error!(
                "There was an error when trying to get your home directory. You can get around \
                this by providing --finanzas-home or FINANZAS_HOME instead of relying on the \
                default directory.",
            );
            PathBuf::from("finanzas")
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
    pub fn path(&self) -> &Path {
        &self.0
    }
}
