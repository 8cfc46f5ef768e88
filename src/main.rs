use clap::Parser;
use finanzas::args::{Args, Command};
use finanzas::{commands, ApiClient, ClientError, Config, Error, Mode, Result};
use std::path::Path;
use std::process::ExitCode;
use tracing::{debug, error, trace};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let log_level = args.common().log_level();
    init_logger(log_level);
    debug!("Log level set to {}", log_level.to_string().to_lowercase());

    match main_inner(args).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Exiting with error: {e:#}");
            if needs_login(&e) {
                error!("Run 'finanzas login <USERNAME>' and try again");
            }
            ExitCode::FAILURE
        }
    }
}

pub async fn main_inner(args: Args) -> Result<()> {
    trace!("{args:?}");
    let home = args.common().finanzas_home().path();

    // When FINANZAS_IN_TEST_MODE is set and non-empty, requests go to an in-memory fake server
    // instead of the configured base_url.
    let mode = Mode::from_env();

    let _: () = match args.command() {
        Command::Init(a) => commands::init(home, a.base_url()).await?.print(),
        Command::Register(a) => {
            let (_, client) = connect(home, mode).await?;
            commands::register(&client, &a.registration()).await?.print()
        }
        Command::Login(a) => {
            let (_, client) = connect(home, mode).await?;
            commands::login(&client, a.username(), a.password())
                .await?
                .print()
        }
        Command::Logout => {
            let (_, client) = connect(home, mode).await?;
            commands::logout(&client).await?.print()
        }
        Command::Status => {
            let (_, client) = connect(home, mode).await?;
            commands::status(&client).await?.print()
        }
        Command::Profile(a) => {
            let (_, client) = connect(home, mode).await?;
            commands::profile(&client, &a.update()).await?.print()
        }
        Command::Password(a) => {
            let (_, client) = connect(home, mode).await?;
            commands::password(&client, &a.change()).await?.print()
        }
        Command::List(a) => {
            let (_, client) = connect(home, mode).await?;
            commands::list(&client, a.kind()).await?.print()
        }
        Command::Frequencies => {
            let (_, client) = connect(home, mode).await?;
            commands::frequencies(&client).await?.print()
        }
        Command::Add(a) => {
            let (_, client) = connect(home, mode).await?;
            commands::add(&client, a.kind(), a.fields()).await?.print()
        }
        Command::Update(a) => {
            let (_, client) = connect(home, mode).await?;
            commands::update(&client, a.kind(), a.id(), a.fields())
                .await?
                .print()
        }
        Command::Delete(a) => {
            let (_, client) = connect(home, mode).await?;
            commands::delete(&client, a.kind(), a.id()).await?.print()
        }
        Command::Deposit(a) => {
            let (_, client) = connect(home, mode).await?;
            commands::deposit(&client, a.id(), a.amount()).await?.print()
        }
        Command::Contribute(a) => {
            let (_, client) = connect(home, mode).await?;
            commands::contribute(&client, a.id(), a.amount())
                .await?
                .print()
        }
        Command::Report(a) => {
            let (config, client) = connect(home, mode).await?;
            let today = chrono::Local::now().date_naive();
            commands::report(&client, &config, a.report(), today)
                .await?
                .print()
        }
    };
    Ok(())
}

/// Loads the configuration under `home` and the client it describes. Every command except `init`
/// needs both.
async fn connect(home: &Path, mode: Mode) -> Result<(Config, ApiClient)> {
    let config = Config::load(home).await?;
    let client = ApiClient::from_config(&config, mode).await?;
    Ok((config, client))
}

/// True when the failure is the server (or the missing session) refusing us.
fn needs_login(e: &Error) -> bool {
    e.chain()
        .filter_map(|cause| cause.downcast_ref::<ClientError>())
        .any(ClientError::is_auth)
}

/// Initializes the tracing subscriber.
pub fn init_logger(level: LevelFilter) {
    let filter = match std::env::var("RUST_LOG").ok() {
        // RUST_LOG wins when present.
        Some(_) => EnvFilter::from_default_env(),
        None => EnvFilter::new(format!(
            "{}={},{}={}",
            env!("CARGO_CRATE_NAME"),
            level,
            env!("CARGO_BIN_NAME"),
            level
        )),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
