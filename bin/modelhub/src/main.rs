use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use modelhub_config::{load_default, load_from_path, HubConfig};
use modelhub_core::HubError;

mod commands;

/// modelhub - model endpoint registry
///
/// Every command loads the registry snapshot, applies one operation, and
/// saves the result back. Nothing is kept between invocations.
///
/// Configuration discovery rules:
/// 1. If `--config PATH` (or `-c PATH`) is provided, that path is used.
/// 2. Otherwise `modelhub_config::load_default()` probes
///    `/etc/modelhub/modelhub.toml` and `./modelhub.toml`, falling back to
///    built-in defaults when neither exists.
#[derive(Debug, Parser)]
#[command(
    name = "modelhub",
    version,
    about = "manage model endpoints and the default model",
    disable_help_subcommand = true
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long = "config", short = 'c', value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    /// Log level (overrides the config file and RUST_LOG).
    ///
    /// Accepts standard tracing levels (trace, debug, info, warn, error) or a
    /// full filter expression (e.g. "info,modelhub_registry=debug").
    #[arg(long = "log-level", short = 'L', value_name = "LEVEL", global = true)]
    log_level: Option<String>,

    /// Registry snapshot file, overriding `[registry].path`.
    #[arg(long = "registry", value_name = "FILE", global = true)]
    registry: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Validate configuration and every stored endpoint.
    Check,

    /// Show endpoints, models and the default selection.
    List {
        /// Print the raw snapshot as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Add or replace an endpoint from a JSON payload.
    AddEndpoint {
        /// JSON file holding one endpoint record.
        #[arg(long, value_name = "FILE")]
        file: PathBuf,
    },

    /// Enable or disable an endpoint.
    ToggleEndpoint { endpoint_id: String },

    /// Delete an endpoint.
    DeleteEndpoint {
        endpoint_id: String,

        /// Confirm the deletion in the same invocation.
        #[arg(long)]
        yes: bool,
    },

    /// Add or update a model on an endpoint.
    AddModel {
        endpoint_id: String,
        deployment_name: String,

        /// Update the model with this id instead of adding a new one.
        #[arg(long, value_name = "ID")]
        id: Option<String>,

        #[arg(long)]
        display_name: Option<String>,

        #[arg(long)]
        model_name: Option<String>,

        #[arg(long)]
        description: Option<String>,

        /// Store the model disabled.
        #[arg(long)]
        disabled: bool,
    },

    /// Enable or disable a model.
    ToggleModel { endpoint_id: String, model_id: String },

    /// Delete a model.
    DeleteModel {
        endpoint_id: String,
        model_id: String,

        /// Confirm the deletion in the same invocation.
        #[arg(long)]
        yes: bool,
    },

    /// Make a model the platform default.
    SetDefault { endpoint_id: String, model_id: String },

    /// Clear the platform default.
    ClearDefault,

    /// Fetch deployments from the provider and merge them in.
    Discover { endpoint_id: String },

    /// Send a one-token request to a deployment.
    Test {
        endpoint_id: String,
        deployment_name: String,
    },
}

fn main() {
    let cli = Cli::parse();

    // Config is read before telemetry so its log level can apply; failures
    // here go to stderr directly.
    let config = match load_config(cli.config.as_ref()) {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("modelhub: {}", err);
            process::exit(1);
        }
    };

    let level = cli.log_level.as_deref().or(config.log_level());
    if let Err(err) = modelhub_telemetry::init(level) {
        eprintln!("modelhub: failed to initialise telemetry: {}", err);
        process::exit(1);
    }

    if let Err(err) = config.validate() {
        tracing::error!("configuration validation failed: {}", err);
        process::exit(1);
    }

    let registry_path = cli
        .registry
        .clone()
        .unwrap_or_else(|| config.registry.path.clone());

    if let Err(err) = run_blocking(cli.command, config, registry_path) {
        tracing::error!("{:#}", err);
        process::exit(1);
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<HubConfig, HubError> {
    match path {
        Some(path) => load_from_path(path),
        None => match load_default() {
            Ok(cfg) => Ok(cfg),
            Err(HubError::ConfigNotFound(_)) => Ok(HubConfig::default()),
            Err(err) => Err(err),
        },
    }
}

/// Run one command on a Tokio runtime so `main` can stay synchronous.
fn run_blocking(command: Command, config: HubConfig, registry_path: PathBuf) -> anyhow::Result<()> {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    rt.block_on(async move {
        let mut session = commands::Session::open(config, registry_path)?;

        match command {
            Command::Check => commands::check(&session),
            Command::List { json } => commands::list(&session, json),
            Command::AddEndpoint { file } => commands::add_endpoint(&mut session, &file),
            Command::ToggleEndpoint { endpoint_id } => {
                commands::toggle_endpoint(&mut session, &endpoint_id)
            }
            Command::DeleteEndpoint { endpoint_id, yes } => {
                commands::delete_endpoint(&mut session, &endpoint_id, yes)
            }
            Command::AddModel {
                endpoint_id,
                deployment_name,
                id,
                display_name,
                model_name,
                description,
                disabled,
            } => {
                let args = commands::ModelArgs {
                    id,
                    deployment_name,
                    display_name,
                    model_name,
                    description,
                    enabled: !disabled,
                };
                commands::add_model(&mut session, &endpoint_id, args)
            }
            Command::ToggleModel {
                endpoint_id,
                model_id,
            } => commands::toggle_model(&mut session, &endpoint_id, &model_id),
            Command::DeleteModel {
                endpoint_id,
                model_id,
                yes,
            } => commands::delete_model(&mut session, &endpoint_id, &model_id, yes),
            Command::SetDefault {
                endpoint_id,
                model_id,
            } => commands::set_default(&mut session, &endpoint_id, &model_id),
            Command::ClearDefault => commands::clear_default(&mut session),
            Command::Discover { endpoint_id } => {
                commands::discover(&mut session, &endpoint_id).await
            }
            Command::Test {
                endpoint_id,
                deployment_name,
            } => commands::test(&session, &endpoint_id, &deployment_name).await,
        }
    })
}
