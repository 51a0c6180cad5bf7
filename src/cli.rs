//! Command-line interface.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use gaia_core_types::Goal;
use goal_agent::{
    ExploratoryAgent, ExploratoryConfig, GoalRunner, HttpBrowserGateway, HttpVisionProvider,
    MockVisionProvider, VisionProvider,
};

use crate::config::AppConfig;
use crate::server;

#[derive(Debug, Parser)]
#[command(name = "gaia", version, about = "AI-driven browser test automation host")]
pub struct Cli {
    /// Optional configuration file (TOML/JSON/YAML per extension).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Write logs to this file in addition to stderr.
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the browser control host.
    Serve {
        /// Override the listen port.
        #[arg(long)]
        port: Option<u16>,
    },
    /// Drive a single goal against a running host.
    RunGoal {
        /// Path to a goal JSON file.
        goal_file: PathBuf,
        /// Host base URL.
        #[arg(long, default_value = "http://127.0.0.1:8000")]
        host_url: String,
        /// Session id to drive.
        #[arg(long, default_value = "goal_driven")]
        session: String,
    },
    /// Explore a site for issues without a destination.
    Explore {
        /// Start URL.
        start_url: String,
        /// Host base URL.
        #[arg(long, default_value = "http://127.0.0.1:8000")]
        host_url: String,
        /// Session id to drive.
        #[arg(long, default_value = "exploratory")]
        session: String,
        /// Step budget.
        #[arg(long, default_value_t = 30)]
        max_steps: u32,
    },
}

fn init_tracing(log_file: Option<&PathBuf>) -> anyhow::Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match log_file {
        Some(path) => {
            let parent = path.parent().unwrap_or_else(|| std::path::Path::new("."));
            let file_name = path
                .file_name()
                .context("log file path needs a file name")?
                .to_string_lossy()
                .to_string();
            let appender = tracing_appender::rolling::never(parent, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
            Ok(None)
        }
    }
}

fn vision_provider(config: &AppConfig) -> Box<dyn VisionProvider> {
    match (&config.vlm.endpoint, config.vlm_token()) {
        (Some(endpoint), Some(token)) => Box::new(HttpVisionProvider::new(
            endpoint.clone(),
            token,
            config
                .vlm
                .model
                .clone()
                .unwrap_or_else(|| "default".to_string()),
        )),
        _ => {
            info!("no vision endpoint configured; using the deterministic mock provider");
            Box::new(MockVisionProvider::new())
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let _log_guard = init_tracing(cli.log_file.as_ref())?;
    let mut config = AppConfig::load(cli.config.as_ref())?;

    match cli.command {
        Command::Serve { port } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            server::serve(config).await
        }
        Command::RunGoal {
            goal_file,
            host_url,
            session,
        } => {
            let raw = tokio::fs::read_to_string(&goal_file)
                .await
                .with_context(|| format!("reading goal file {}", goal_file.display()))?;
            let goal: Goal = serde_json::from_str(&raw)
                .with_context(|| format!("parsing goal file {}", goal_file.display()))?;

            let gateway = HttpBrowserGateway::new(host_url, session);
            let provider = vision_provider(&config);
            let runner = GoalRunner::new(gateway, provider);
            let outcome = runner.execute_goal(&goal).await;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            if outcome.success {
                Ok(())
            } else {
                anyhow::bail!("goal failed: {}", outcome.final_reason)
            }
        }
        Command::Explore {
            start_url,
            host_url,
            session,
            max_steps,
        } => {
            let gateway = HttpBrowserGateway::new(host_url, session);
            let provider = vision_provider(&config);
            let agent = ExploratoryAgent::new(gateway, provider).with_config(ExploratoryConfig {
                max_steps,
                ..ExploratoryConfig::default()
            });
            let report = agent.explore(&start_url).await;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
    }
}
