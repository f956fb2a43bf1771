//! services/tracker/src/bin/scrap_tracker.rs

use chrono::{NaiveDate, SecondsFormat};
use clap::{Parser, Subcommand};
use scrap_tracker_core::domain::{Record, RecordFields};
use scrap_tracker_core::ports::{KeyValueStore, RecordRepository};
use serde_json::Value;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tracker_lib::{
    adapters::{http::DEFAULT_RECENT_LIMIT, ApiClient, ClientError, MemoryStorage, SqliteStorage},
    config::{Config, StorageLocation},
    error::AppError,
    services::{IdentityService, LocalRecordStore},
    web::{
        router::{DASHBOARD_PATH, HISTORY_PATH, HOME_PATH, LOGIN_PATH, REGISTER_PATH},
        History, Page, SessionContext, ViewRouter,
    },
};

#[derive(Parser)]
#[command(name = "scrap-tracker", version, about = "Daily scrap record tracker")]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the admin account and log in
    Register {
        username: String,
        password: String,
        /// Repeat the password
        #[arg(long)]
        confirm: String,
    },
    Login {
        username: String,
        password: String,
    },
    Logout,
    /// Show the current user
    Whoami,
    /// Show which page a path leads to
    Open { path: String },
    /// Add a daily record from key=value fields
    Add {
        #[arg(required = true, value_parser = parse_field)]
        fields: Vec<(String, String)>,
    },
    /// List all records, or those of one UTC day
    History {
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// List the newest records
    Recent {
        #[arg(long, default_value_t = DEFAULT_RECENT_LIMIT)]
        limit: usize,
    },
    /// Delete a record by id
    Remove { id: String },
    Dashboard,
    /// Talk to the remote records API
    Remote {
        #[command(subcommand)]
        cmd: RemoteCommand,
    },
}

#[derive(Subcommand)]
enum RemoteCommand {
    Register { username: String, password: String },
    Login { username: String, password: String },
    Me,
    CheckAdmin,
    Records {
        #[arg(long = "filter", value_parser = parse_field)]
        filters: Vec<(String, String)>,
    },
    Get { id: String },
    Create {
        #[arg(required = true, value_parser = parse_field)]
        fields: Vec<(String, String)>,
    },
    Update {
        id: String,
        #[arg(required = true, value_parser = parse_field)]
        fields: Vec<(String, String)>,
    },
    Delete { id: String },
    Stats {
        #[arg(long = "filter", value_parser = parse_field)]
        filters: Vec<(String, String)>,
    },
    Recent {
        #[arg(long, default_value_t = DEFAULT_RECENT_LIMIT)]
        limit: usize,
    },
    ByDate { date: NaiveDate },
}

/// Values typed on the command line are always strings.
fn into_record_fields(fields: Vec<(String, String)>) -> RecordFields {
    fields
        .into_iter()
        .map(|(key, value)| (key, Value::String(value)))
        .collect()
}

fn parse_field(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected key=value, got '{}'", raw)),
    }
}

/// Everything a page needs, built once per process.
struct App {
    session: Arc<SessionContext>,
    router: ViewRouter,
    records: LocalRecordStore,
    api: ApiClient,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // --- 1. Load Configuration & Set Up Logging ---
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
    info!("Configuration loaded.");

    // --- 2. Build the App & Run the Command ---
    let result = match build_app(&config).await {
        Ok(app) => run(&app, cli.cmd).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Command failed: {:?}", e);
            eprintln!("{}", e.user_message());
            ExitCode::FAILURE
        }
    }
}

async fn build_app(config: &Config) -> Result<App, AppError> {
    let storage: Arc<dyn KeyValueStore> = match &config.storage {
        StorageLocation::Memory => Arc::new(MemoryStorage::new()),
        StorageLocation::Sqlite(url) => {
            info!("Opening storage at {}", url);
            let storage = SqliteStorage::connect(url).await?;
            storage.run_migrations().await?;
            Arc::new(storage)
        }
    };

    let identity = Arc::new(IdentityService::new(storage.clone(), config.auth_delay));
    let session = Arc::new(SessionContext::new(storage.clone(), identity));
    session.init().await?;

    let history = Arc::new(History::default());
    let router = ViewRouter::new(session.clone(), history.clone());
    let records = LocalRecordStore::new(storage);
    let api = ApiClient::new(config.api_base_url.clone(), session.clone(), history);

    Ok(App {
        session,
        router,
        records,
        api,
    })
}

/// Opens `path` and reports whether the expected page rendered.
async fn enter(app: &App, path: &str, expected: Page) -> Result<bool, AppError> {
    let page = app.router.open(path).await?;
    if page == expected {
        return Ok(true);
    }
    println!("Redirected to {} ({:?})", app.router.location(), page);
    Ok(false)
}

async fn run(app: &App, cmd: Commands) -> Result<(), AppError> {
    match cmd {
        Commands::Register {
            username,
            password,
            confirm,
        } => {
            if !enter(app, REGISTER_PATH, Page::Register).await? {
                return Ok(());
            }
            if confirm != password {
                return Err(AppError::Validation("Passwords do not match".to_string()));
            }
            let session = app.session.identity().register(&username, &password).await?;
            app.session.login(session).await?;
            greet(app);
        }
        Commands::Login { username, password } => {
            if !enter(app, LOGIN_PATH, Page::Login).await? {
                return Ok(());
            }
            let session = app.session.identity().login(&username, &password).await?;
            app.session.login(session).await?;
            greet(app);
        }
        Commands::Logout => {
            app.session.logout().await?;
            app.router.open(LOGIN_PATH).await?;
            println!("Logged out.");
        }
        Commands::Whoami => match app.session.current_user() {
            Some(user) => println!("{} ({})", user.username, user.role.as_str()),
            None => println!("Not logged in."),
        },
        Commands::Open { path } => {
            let page = app.router.open(&path).await?;
            println!("{} -> {:?}", app.router.location(), page);
        }
        Commands::Add { fields } => {
            if !enter(app, HOME_PATH, Page::DailyRecord).await? {
                return Ok(());
            }
            let record = app.records.add(into_record_fields(fields)).await?;
            println!("Saved record {}", record.id);
        }
        Commands::History { date } => {
            if !enter(app, HISTORY_PATH, Page::History).await? {
                return Ok(());
            }
            let records = match date {
                Some(date) => app.records.by_date(date).await?,
                None => app.records.list().await?,
            };
            print_records(&records);
        }
        Commands::Recent { limit } => {
            if !enter(app, HISTORY_PATH, Page::History).await? {
                return Ok(());
            }
            print_records(&app.records.recent(limit).await?);
        }
        Commands::Remove { id } => {
            if !enter(app, HISTORY_PATH, Page::History).await? {
                return Ok(());
            }
            app.records.remove(&id).await?;
            println!("Removed {}", id);
        }
        Commands::Dashboard => {
            if !enter(app, DASHBOARD_PATH, Page::Dashboard).await? {
                return Ok(());
            }
            let stats = app.records.dashboard_stats().await?;
            println!("Total records: {}", stats.total_records);
            println!("Records today: {}", stats.records_today);
            for (day, count) in &stats.records_per_day {
                println!("  {}: {}", day, count);
            }
            if let Some(latest) = &stats.latest {
                print!("Latest: ");
                print_record(latest);
            }
        }
        Commands::Remote { cmd } => run_remote(app, cmd).await?,
    }
    Ok(())
}

async fn run_remote(app: &App, cmd: RemoteCommand) -> Result<(), AppError> {
    let api = &app.api;
    let output: Value = match cmd {
        RemoteCommand::Register { username, password } => {
            let response = api.register(&username, &password).await?;
            let session = response.into_session().map_err(ClientError::from)?;
            app.session.login(session).await?;
            greet(app);
            return Ok(());
        }
        RemoteCommand::Login { username, password } => {
            let response = api.login(&username, &password).await?;
            let session = response.into_session().map_err(ClientError::from)?;
            app.session.login(session).await?;
            greet(app);
            return Ok(());
        }
        RemoteCommand::Me => api.me().await?,
        RemoteCommand::CheckAdmin => {
            let response = api.check_admin().await?;
            println!("Admin exists: {}", response.has_admin);
            return Ok(());
        }
        RemoteCommand::Records { filters } => api.get_records(&filters).await?,
        RemoteCommand::Get { id } => api.get_record(&id).await?,
        RemoteCommand::Create { fields } => {
            api.create_record(&into_record_fields(fields)).await?
        }
        RemoteCommand::Update { id, fields } => {
            api.update_record(&id, &into_record_fields(fields)).await?
        }
        RemoteCommand::Delete { id } => api.delete_record(&id).await?,
        RemoteCommand::Stats { filters } => api.dashboard_stats(&filters).await?,
        RemoteCommand::Recent { limit } => api.recent(limit).await?,
        RemoteCommand::ByDate { date } => api.records_by_date(date).await?,
    };
    let pretty = serde_json::to_string_pretty(&output)
        .map_err(|e| AppError::Internal(e.to_string()))?;
    println!("{}", pretty);
    Ok(())
}

fn greet(app: &App) {
    if let Some(user) = app.session.current_user() {
        println!("Welcome, {}", user.username);
    }
}

fn print_records(records: &[Record]) {
    if records.is_empty() {
        println!("No records yet.");
    }
    for record in records {
        print_record(record);
    }
}

fn print_record(record: &Record) {
    let fields = record
        .fields
        .iter()
        .map(|(k, v)| match v {
            Value::String(s) => format!("{}={}", k, s),
            other => format!("{}={}", k, other),
        })
        .collect::<Vec<_>>()
        .join(" ");
    println!(
        "{}  {}  {}",
        record.id,
        record.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
        fields
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_requires_the_confirmation() {
        assert!(Cli::try_parse_from(["scrap-tracker", "register", "foreman", "secret1"]).is_err());

        let cli = Cli::try_parse_from([
            "scrap-tracker",
            "register",
            "foreman",
            "secret1",
            "--confirm",
            "secret1",
        ])
        .unwrap();
        assert!(matches!(
            cli.cmd,
            Commands::Register { confirm, password, .. } if confirm == password
        ));
    }

    #[test]
    fn history_takes_an_optional_day() {
        let cli = Cli::try_parse_from(["scrap-tracker", "history", "--date", "2024-03-02"]).unwrap();
        assert!(matches!(
            cli.cmd,
            Commands::History { date: Some(d) } if d == NaiveDate::from_ymd_opt(2024, 3, 2).unwrap()
        ));
        assert!(Cli::try_parse_from(["scrap-tracker", "history", "--date", "yesterday"]).is_err());

        let cli = Cli::try_parse_from(["scrap-tracker", "recent"]).unwrap();
        assert!(matches!(cli.cmd, Commands::Recent { limit } if limit == DEFAULT_RECENT_LIMIT));
    }

    #[test]
    fn typed_fields_are_strings() {
        let fields = into_record_fields(vec![("weight".to_string(), "12.5".to_string())]);
        assert_eq!(fields["weight"], Value::String("12.5".to_string()));
    }
}
