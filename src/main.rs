use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use booty::logging::{self, LogConfig};
use booty::{adapters, config, context, core::Orchestrator, web};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;

#[derive(Parser)]
#[command(name = "booty")]
#[command(about = "Push and pull disk images over HTTP", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[arg(long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload the local disk image (SRC) to the server (DST), then reboot
    Push(TransferArgs),
    /// Download the image (SRC) onto the local disk (DST), then reboot
    Pull(TransferArgs),
    /// Accept uploads and serve stored images
    Serve(ServerArgs),
}

#[derive(Args)]
struct TransferArgs {
    /// Log the reboot instead of performing it
    #[arg(long)]
    no_reboot: bool,
}

#[derive(Args, Serialize)]
struct ServerArgs {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long)]
    bind_addr: Option<SocketAddr>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long)]
    images_directory: Option<PathBuf>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long)]
    upload_directory: Option<PathBuf>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long)]
    field_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long)]
    max_upload_bytes: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init(LogConfig {
        json: cli.json_logs,
        verbose: cli.verbose,
    });

    match &cli.command {
        Commands::Push(args) => orchestrator(args).push().await.context("Push failed")?,
        Commands::Pull(args) => orchestrator(args).pull().await.context("Pull failed")?,
        Commands::Serve(args) => run_server(args)
            .await
            .context("Failed to run image server")?,
    }

    Ok(())
}

fn orchestrator(args: &TransferArgs) -> Orchestrator {
    Orchestrator::new(
        Box::new(adapters::TerminalScreen),
        adapters::get_reboot(args.no_reboot),
    )
}

async fn run_server(args: &ServerArgs) -> Result<()> {
    let config = config::ServerConfig::new(Some(args))?;
    let ctx = context::AppContext::new(config);
    let server = Arc::new(web::ImageServer::new(ctx));

    let signal_server = server.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutting down");
            signal_server.shutdown();
        }
    });

    server.start().await
}
