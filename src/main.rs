use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

use plantwise_agents::{CoordinatorOptions, WorkflowCoordinator};
use plantwise_core::config::AppConfig;
use plantwise_core::traits::ToolClient;
use plantwise_core::types::ScopeHint;
use plantwise_graph::HttpGraphStore;
use plantwise_llm::create_client;
use plantwise_mcp::McpToolClient;

#[derive(Parser)]
#[command(
    name = "plantwise",
    version,
    about = "Multi-agent query assistant for industrial plant data"
)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "plantwise.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single question through the workflow and print the answer
    Run {
        /// The question to answer
        #[arg(trailing_var_arg = true)]
        question: Vec<String>,
        /// Scope hint as JSON, e.g. '{"nodeType":"AssetArea","nodeName":"40-10"}'
        #[arg(long)]
        scope: Option<String>,
        /// Also print the execution trace as JSON
        #[arg(long)]
        trace: bool,
    },
    /// Show the resolved configuration
    Config,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = match AppConfig::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Failed to load config");
            std::process::exit(1);
        }
    };

    match cli.command {
        Commands::Run {
            question,
            scope,
            trace,
        } => {
            let question = question.join(" ");
            if question.trim().is_empty() {
                eprintln!("No question given");
                std::process::exit(2);
            }

            let scope = match scope
                .map(|raw| serde_json::from_str::<ScopeHint>(&raw))
                .transpose()
            {
                Ok(scope) => scope,
                Err(e) => {
                    eprintln!("Invalid scope JSON: {e}");
                    std::process::exit(2);
                }
            };

            let chat = create_client(&config.llm);
            let store = Arc::new(HttpGraphStore::from_config(&config.graph));
            let maintenance_tools: Option<Arc<dyn ToolClient>> = config
                .maintenance
                .mcp_url
                .as_deref()
                .map(|url| Arc::new(McpToolClient::new(url)) as Arc<dyn ToolClient>);
            let time_series_tools: Option<Arc<dyn ToolClient>> = config
                .time_series
                .mcp_url
                .as_deref()
                .map(|url| Arc::new(McpToolClient::new(url)) as Arc<dyn ToolClient>);

            let coordinator = match WorkflowCoordinator::new(
                chat,
                store,
                maintenance_tools,
                time_series_tools,
                CoordinatorOptions::from(&config),
            ) {
                Ok(coordinator) => coordinator,
                Err(e) => {
                    error!(error = %e, "Failed to build workflow");
                    std::process::exit(1);
                }
            };

            let reply = coordinator.run(&question, scope).await;

            println!("{}", reply.answer);
            if !reply.errors.is_empty() {
                eprintln!("\nerrors:");
                for err in &reply.errors {
                    eprintln!("  - {err}");
                }
            }
            if trace {
                match serde_json::to_string_pretty(&reply.trace) {
                    Ok(json) => println!("\n{json}"),
                    Err(e) => error!(error = %e, "Failed to serialize trace"),
                }
            }
        }
        Commands::Config => {
            // secrets stay out of the dump
            println!("llm.base_url         = {}", config.llm.base_url);
            println!("llm.model_id         = {}", config.llm.model_id);
            println!("graph.uri            = {}", config.graph.uri);
            println!("graph.database       = {}", config.graph.database);
            println!(
                "maintenance.mcp_url  = {}",
                config.maintenance.mcp_url.as_deref().unwrap_or("(disabled)")
            );
            println!("time_series.use_real = {}", config.time_series.use_real);
            println!("timeouts.workflow_ms = {}", config.timeouts.workflow_ms);
        }
    }
}
