use std::fmt;
use std::sync::Arc;

use quiz_core::model::QuizId;
use services::{
    ApiConfig, AttemptLoopService, AttemptOutcome, AttemptProgress, Clock, HttpQuizApi,
};
use storage::repository::Storage;
use tokio::io::BufReader;
use tracing_subscriber::EnvFilter;

mod console;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidQuizId { raw: String },
    InvalidDbUrl { raw: String },
    InvalidApiUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidQuizId { raw } => write!(f, "invalid --quiz-id value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidApiUrl { raw } => write!(f, "invalid --api value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

/// Where quizzes come from and where results go.
#[derive(Debug, Clone)]
enum Backend {
    Sqlite { db_url: String },
    Remote(ApiConfig),
}

struct Args {
    backend: Backend,
    quiz_id: QuizId,
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- [--db <sqlite_url> | --api <base_url>] [--quiz-id <id>]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>   Local quiz database (default: sqlite://quiz.sqlite3)");
    eprintln!("  --api <base_url>    Quiz HTTP API; takes precedence over the database");
    eprintln!("  --token <token>     Bearer token for the API");
    eprintln!("  --quiz-id <id>      Quiz to attempt (default: 1)");
    eprintln!("  -h, --help          Show this help");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  QUIZ_DB_URL, QUIZ_API_BASE_URL, QUIZ_API_TOKEN, QUIZ_ID, RUST_LOG");
    eprintln!();
    eprintln!("Seed a local database first with:");
    eprintln!("  cargo run -p storage --bin seed -- --db sqlite:quiz.sqlite3?mode=rwc");
}

impl Args {
    /// `api` is the environment's API configuration; flags override it.
    fn parse(
        args: &mut impl Iterator<Item = String>,
        api: Option<ApiConfig>,
    ) -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("QUIZ_DB_URL")
            .ok()
            .map_or_else(|| "sqlite://quiz.sqlite3".into(), normalize_sqlite_url);
        let (mut api_base, mut token) = match api {
            Some(config) => (Some(config.base_url), config.access_token),
            None => (None, None),
        };
        let mut quiz_id = std::env::var("QUIZ_ID")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .map_or_else(|| QuizId::new(1), QuizId::new);
        let mut db_requested = false;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                    db_requested = true;
                }
                "--api" => {
                    let value = require_value(args, "--api")?;
                    if !value.starts_with("http://") && !value.starts_with("https://") {
                        return Err(ArgsError::InvalidApiUrl { raw: value });
                    }
                    api_base = Some(value);
                    db_requested = false;
                }
                "--token" => {
                    token = Some(require_value(args, "--token")?);
                }
                "--quiz-id" => {
                    let value = require_value(args, "--quiz-id")?;
                    quiz_id = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidQuizId { raw: value.clone() })?;
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        // An explicit --db on the command line wins over an API from the environment.
        let backend = match api_base {
            Some(base_url) if !db_requested => {
                let config = ApiConfig::new(base_url);
                Backend::Remote(match token {
                    Some(token) => config.with_access_token(token),
                    None => config,
                })
            }
            _ => Backend::Sqlite { db_url },
        };

        Ok(Self { backend, quiz_id })
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

async fn build_service(
    backend: &Backend,
    clock: Clock,
) -> Result<AttemptLoopService, Box<dyn std::error::Error>> {
    match backend {
        Backend::Sqlite { db_url } => {
            prepare_sqlite_file(db_url)?;
            let storage = Storage::sqlite(db_url).await?;
            if storage.quizzes.list_quizzes(1).await?.is_empty() {
                tracing::warn!(%db_url, "no quizzes stored yet; run the seed binary first");
            }
            tracing::info!(%db_url, "using local quiz database");
            Ok(AttemptLoopService::from_storage(clock, &storage))
        }
        Backend::Remote(config) => {
            let api = Arc::new(HttpQuizApi::new(config.clone())?);
            tracing::info!(base_url = %config.base_url, "using quiz API");
            Ok(AttemptLoopService::new(clock, api.clone(), api))
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv = std::env::args().skip(1);
    let args = Args::parse(&mut argv, ApiConfig::from_env()).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let service = build_service(&args.backend, Clock::default_clock()).await?;
    console::render(&AttemptProgress::loading(args.quiz_id));
    let handle = service.launch(args.quiz_id).await;

    let outcome = console::drive(handle, BufReader::new(tokio::io::stdin())).await?;
    console::print_outcome(&outcome);

    match outcome {
        AttemptOutcome::Failed { error, .. } => Err(error.into()),
        AttemptOutcome::Submitted { .. } | AttemptOutcome::Abandoned => Ok(()),
    }
}

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
