//! Endpoint orchestration CLI
//!
//! Run with: cargo run -p ruvector-endpoints --features cli --bin ruvector-endpoints -- --help

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use ruvector_endpoints::{
    logging, EndpointLifecycleManager, EndpointName, EndpointRole, HttpControlPlane,
    InvocationClient, OrchestratorConfig,
};

#[derive(Parser)]
#[command(
    name = "ruvector-endpoints",
    version,
    about = "Provision and invoke managed inference endpoints"
)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, env = "RUVECTOR_ENDPOINTS_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List catalog models and their endpoint names
    Models,
    /// Show the remote state of a model's endpoint
    Status { model_id: String },
    /// Create the endpoint if needed and wait until it is in service
    Ensure { model_id: String },
    /// Ensure the endpoint, then send a JSON payload to it
    Invoke { model_id: String, payload: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => OrchestratorConfig::from_file(path)?,
        None => {
            tracing::info!("No configuration file given, using defaults");
            OrchestratorConfig::default()
        }
    };

    if let Command::Models = cli.command {
        let catalog = config.catalog()?;
        for role in [EndpointRole::Embedding, EndpointRole::Inferencing] {
            let mut models: Vec<_> = catalog.models_for(role).collect();
            models.sort_by(|a, b| a.model_id.cmp(&b.model_id));
            for model in models {
                println!(
                    "{:<12} {:<48} {:<16} {}",
                    role.as_str(),
                    model.model_id,
                    model.compute_class,
                    EndpointName::for_model(&model.model_id, role)
                );
            }
        }
        return Ok(());
    }

    let platform = Arc::new(HttpControlPlane::new(&config.control_plane)?);
    let manager = EndpointLifecycleManager::from_config(&config, platform.clone())?;

    match cli.command {
        Command::Models => {}
        Command::Status { model_id } => {
            let name = manager.endpoint_name(&model_id)?;
            let state = manager.observe(&name).await?;
            println!("{}", serde_json::to_string_pretty(&state)?);
        }
        Command::Ensure { model_id } => {
            let handle = manager.ensure_ready(&model_id).await?;
            println!("{}", handle.endpoint_name());
        }
        Command::Invoke { model_id, payload } => {
            let payload: serde_json::Value = serde_json::from_str(&payload)?;
            let handle = manager.ensure_ready(&model_id).await?;
            let client = InvocationClient::from_config(&config, platform)?;
            let invocation = client.invoke(&handle, &payload).await?;
            tracing::info!(
                "Invocation took {:?} ({} attempt(s))",
                invocation.metadata.latency,
                invocation.metadata.attempts
            );
            println!("{}", serde_json::to_string_pretty(&invocation.body)?);
        }
    }

    Ok(())
}
