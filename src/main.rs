use anyhow::{Context as _, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use duplocloud_provider::config::{config_dir, Config};
use duplocloud_provider::diag::Diagnostics;
use duplocloud_provider::provider::{Action, Provider, Response};
use duplocloud_provider::wait::Context;
use duplocloud_provider::VERSION;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// DuploCloud provider host
#[derive(Parser, Debug)]
#[command(name = "terraform-provider-duplocloud", version = VERSION, about, long_about = None)]
struct Cli {
    /// Log level; falls back to TF_LOG
    #[arg(long, value_enum, global = true)]
    log_level: Option<LogLevel>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print provider, resource and data source schemas as JSON
    Schema,
    /// Validate a resource (or data source) configuration
    Validate(Target),
    /// Plan a change against the prior state
    Plan(Target),
    /// Create or update to match the configuration
    Apply(Target),
    /// Refresh the state from the remote object
    Read(Target),
    /// Delete the remote object
    Destroy(Target),
    /// Import an existing object by id
    Import {
        #[command(flatten)]
        target: Target,
        /// Import id, e.g. `<tenant_id>/<name>`
        #[arg(long)]
        id: String,
    },
    /// Read a data source
    Data(Target),
}

#[derive(Args, Debug)]
struct Target {
    /// Resource or data source type, e.g. `duplocloud_tenant`
    #[arg(long = "type", short = 't')]
    type_name: String,

    /// JSON or YAML input document; stdin when omitted
    #[arg(long, short)]
    input: Option<PathBuf>,

    /// Validate against the data source of that name
    #[arg(long)]
    data_source: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }

    fn from_env() -> Self {
        match std::env::var("TF_LOG").unwrap_or_default().to_lowercase().as_str() {
            "error" => LogLevel::Error,
            "warn" => LogLevel::Warn,
            "info" => LogLevel::Info,
            "debug" => LogLevel::Debug,
            "trace" | "json" => LogLevel::Trace,
            _ => LogLevel::Off,
        }
    }
}

/// Input document shared by every command
#[derive(Debug, Default, Deserialize)]
struct Input {
    #[serde(default)]
    provider: Map<String, Value>,
    #[serde(default)]
    config: Map<String, Value>,
    #[serde(default)]
    state: Option<Map<String, Value>>,
}

fn setup_logging(level: LogLevel) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let Some(tracing_level) = level.to_tracing_level() else {
        return Ok(None);
    };

    let log_path = get_log_path();
    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent).with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("failed to open log file {}", log_path.display()))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_max_level(tracing_level)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("terraform-provider-duplocloud {} started with log level: {:?}", VERSION, level);
    tracing::info!("Log file: {:?}", log_path);

    Ok(Some(guard))
}

fn get_log_path() -> PathBuf {
    if let Some(path) = std::env::var_os("TF_LOG_PATH").filter(|p| !p.is_empty()) {
        return PathBuf::from(path);
    }
    if let Some(dir) = config_dir() {
        return dir.join("provider.log");
    }
    PathBuf::from("provider.log")
}

fn read_input(path: Option<&PathBuf>) -> Result<Input> {
    let content = match path {
        Some(path) => std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf).context("failed to read stdin")?;
            buf
        }
    };
    if content.trim().is_empty() {
        return Ok(Input::default());
    }
    match serde_json::from_str(&content) {
        Ok(input) => Ok(input),
        Err(_) => serde_yaml::from_str(&content).context("input is neither JSON nor YAML"),
    }
}

fn configured_provider(input: &Input) -> Result<std::result::Result<Provider, Diagnostics>> {
    let file = Config::load()?;
    let mut provider = Provider::new();
    Ok(provider.configure(&input.provider, &file).map(|()| provider))
}

fn print<T: Serialize>(body: T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}

/// Print a response; `true` when it carries errors
fn report(response: &Response) -> Result<bool> {
    print(response)?;
    Ok(response.diagnostics.has_error())
}

/// Create, update or replace depending on the prior state
async fn apply(ctx: &Context, provider: &Provider, type_name: &str, input: &Input) -> Result<bool> {
    let Some(prior) = &input.state else {
        return report(&provider.create(ctx, type_name, &input.config).await);
    };
    let plan = match provider.plan(type_name, Some(prior), &input.config) {
        Ok(plan) => plan,
        Err(diags) => return report(&Response { state: None, diagnostics: diags }),
    };
    let response = match plan.action {
        Action::NoOp => Response {
            state: Some(prior.clone()),
            diagnostics: Diagnostics::new(),
        },
        Action::Create => provider.create(ctx, type_name, &input.config).await,
        Action::Update => provider.update(ctx, type_name, prior, &input.config).await,
        Action::Replace => {
            tracing::info!("apply({}): replacing, {:?} force a new resource", type_name, plan.requires_replace);
            let deleted = provider.delete(ctx, type_name, prior).await;
            if deleted.diagnostics.has_error() {
                deleted
            } else {
                provider.create(ctx, type_name, &input.config).await
            }
        }
    };
    report(&response)
}

async fn run(cli: Cli, ctx: &Context) -> Result<bool> {
    let (target, import_id) = match &cli.command {
        Command::Schema => {
            print(Provider::schemas_json())?;
            return Ok(false);
        }
        Command::Import { target, id } => (target, Some(id.as_str())),
        Command::Validate(t)
        | Command::Plan(t)
        | Command::Apply(t)
        | Command::Read(t)
        | Command::Destroy(t)
        | Command::Data(t) => (t, None),
    };
    let input = read_input(target.input.as_ref())?;
    let type_name = target.type_name.as_str();

    match &cli.command {
        Command::Validate(_) => {
            let provider = Provider::new();
            let diagnostics = if target.data_source {
                provider.validate_data_source_config(type_name, &input.config)
            } else {
                provider.validate_resource_config(type_name, &input.config)
            };
            print(json!({ "diagnostics": diagnostics }))?;
            return Ok(diagnostics.has_error());
        }
        Command::Plan(_) => {
            return match Provider::new().plan(type_name, input.state.as_ref(), &input.config) {
                Ok(plan) => print(plan).map(|()| false),
                Err(diags) => print(json!({ "diagnostics": diags })).map(|()| true),
            };
        }
        _ => {}
    }

    let provider = match configured_provider(&input)? {
        Ok(provider) => provider,
        Err(diags) => return report(&Response { state: None, diagnostics: diags }),
    };
    let state = input.state.clone().unwrap_or_default();

    match &cli.command {
        Command::Apply(_) => apply(ctx, &provider, type_name, &input).await,
        Command::Read(_) => report(&provider.read(ctx, type_name, &state).await),
        Command::Destroy(_) => report(&provider.delete(ctx, type_name, &state).await),
        Command::Data(_) => report(&provider.read_data_source(ctx, type_name, &input.config).await),
        Command::Import { .. } => report(&provider.import(ctx, type_name, import_id.unwrap_or_default()).await),
        Command::Schema | Command::Validate(_) | Command::Plan(_) => Ok(false),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = cli.log_level.unwrap_or_else(LogLevel::from_env);
    let _log_guard = match setup_logging(level) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("warning: logging disabled: {:#}", e);
            None
        }
    };

    let (ctx, cancel) = Context::with_cancel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, canceling");
            cancel.cancel();
        }
    });

    match run(cli, &ctx).await {
        Ok(false) => ExitCode::SUCCESS,
        Ok(true) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
