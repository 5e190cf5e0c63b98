//! ZeroTouch CLI - run and serve multi-agent workflows.
//!
//! Reuses the same core orchestrator (zerotouch-core) and server bootstrap
//! (zerotouch-server) that power the HTTP API.

use clap::{Parser, Subcommand};

use zerotouch_cli::commands::{self, ConfigOverrides};

/// ZeroTouch CLI - Multi-agent workflow orchestration
#[derive(Parser)]
#[command(name = "zerotouch", version, about = "ZeroTouch CLI - Multi-agent workflow orchestration")]
pub struct Cli {
    /// Path to a YAML config file (defaults to <config dir>/zerotouch/config.yaml)
    #[arg(long, env = "ZEROTOUCH_CONFIG", global = true)]
    config: Option<String>,

    /// Worker pool size per workflow
    #[arg(long, env = "ZEROTOUCH_MAX_CONCURRENCY", global = true)]
    max_concurrency: Option<usize>,

    /// Remote calls admitted per rate-limit window
    #[arg(long, env = "ZEROTOUCH_RATE_LIMIT_REQUESTS", global = true)]
    rate_limit_requests: Option<usize>,

    /// Rate-limit window length in milliseconds
    #[arg(long, env = "ZEROTOUCH_RATE_LIMIT_WINDOW_MS", global = true)]
    rate_limit_window_ms: Option<u64>,

    /// Default retry budget for tasks that don't set one
    #[arg(long, env = "ZEROTOUCH_MAX_RETRIES", global = true)]
    max_retries: Option<u32>,

    /// Largest accepted workflow batch
    #[arg(long, env = "ZEROTOUCH_MAX_BATCH_SIZE", global = true)]
    max_batch_size: Option<usize>,

    /// Base URL of the remote agent service
    #[arg(long, env = "ZEROTOUCH_BASE_URL", global = true)]
    base_url: Option<String>,

    /// Bearer token for the remote agent service
    #[arg(long, env = "ZEROTOUCH_API_KEY", global = true, hide_env_values = true)]
    api_key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the ZeroTouch HTTP server
    Server {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        /// Port to listen on
        #[arg(long, default_value_t = 3210)]
        port: u16,
        /// Path to static frontend directory
        #[arg(long)]
        static_dir: Option<String>,
    },

    /// Run YAML-defined agent workflows
    Workflow {
        #[command(subcommand)]
        action: WorkflowAction,
    },
}

#[derive(Subcommand)]
enum WorkflowAction {
    /// Run a workflow file and print the final snapshot as JSON
    Run {
        /// Path to the workflow YAML file
        file: String,
        /// Don't probe the remote service before submitting
        #[arg(long)]
        skip_health_check: bool,
    },
    /// Validate a workflow file without calling the remote service
    Validate {
        /// Path to the workflow YAML file
        file: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "zerotouch_core=info,zerotouch_server=info,zerotouch_cli=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let overrides = ConfigOverrides {
        max_concurrency: cli.max_concurrency,
        rate_limit_requests: cli.rate_limit_requests,
        rate_limit_window_ms: cli.rate_limit_window_ms,
        max_retries: cli.max_retries,
        max_batch_size: cli.max_batch_size,
        base_url: cli.base_url,
        api_key: cli.api_key,
    };

    let result = match commands::load_config(cli.config.as_deref(), overrides) {
        Err(e) => Err(e),
        Ok(app_config) => match cli.command {
            Commands::Server {
                host,
                port,
                static_dir,
            } => commands::server::run(host, port, static_dir, app_config).await,

            Commands::Workflow { action } => match commands::init_state(app_config) {
                Err(e) => Err(e),
                Ok(state) => match action {
                    WorkflowAction::Run {
                        file,
                        skip_health_check,
                    } => commands::workflow::run(&state, &file, skip_health_check).await,
                    WorkflowAction::Validate { file } => {
                        commands::workflow::validate(&state, &file).await
                    }
                },
            },
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
