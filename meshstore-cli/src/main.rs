//! meshstore client CLI.

mod client;
mod symbols;

use clap::{Parser, Subcommand};
use client::CoordinatorClient;
use meshstore_core::ids::FileId;
use std::path::PathBuf;
use tracing::Level;

#[derive(Parser)]
#[command(name = "meshstore-cli")]
#[command(about = "meshstore cluster client")]
#[command(version)]
struct Cli {
    #[arg(long, default_value = "127.0.0.1", env = "MESHSTORE_COORDINATOR_HOST")]
    coordinator_host: String,

    #[arg(long, default_value_t = 7000, env = "MESHSTORE_COORDINATOR_PORT")]
    coordinator_port: u16,

    #[arg(long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a file to the cluster.
    Upload {
        path: PathBuf,

        #[arg(short, long)]
        replication: Option<u32>,

        /// Display name to record in the manifest; defaults to the file name.
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Download a file by id.
    Download {
        file_id: String,

        #[arg(short, long, default_value = "./downloaded")]
        output: PathBuf,
    },

    /// List files known to the cluster.
    List,

    /// Delete a file by id.
    Delete {
        file_id: String,
    },

    /// Show cluster status.
    Status,

    /// Manually trigger a re-replication sweep.
    Rereplicate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::WARN })
        .with_target(false)
        .init();

    let addr = format!("{}:{}", cli.coordinator_host, cli.coordinator_port);
    let client = CoordinatorClient::new(addr);

    match cli.command {
        Commands::Upload { path, replication, name } => {
            let display_name = name.unwrap_or_else(|| {
                path.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "upload".to_string())
            });
            let file_id = client.upload(&path, display_name, replication.unwrap_or(3)).await?;
            println!("{} uploaded as {}", symbols::CHECK, file_id);
        }

        Commands::Download { file_id, output } => {
            let file_id = FileId::parse(file_id)?;
            let bytes = client.download(file_id, &output).await?;
            println!("{} downloaded {bytes} bytes to {}", symbols::CHECK, output.display());
        }

        Commands::List => {
            let files = client.list_files().await?;
            if files.is_empty() {
                println!("no files");
            }
            for f in files {
                println!(
                    "{}  {:>12}  r={}  chunks={}  {}",
                    f.file_id, f.total_size, f.replication_factor, f.chunk_count, f.display_name
                );
            }
        }

        Commands::Delete { file_id } => {
            let file_id = FileId::parse(file_id)?;
            client.delete_file(file_id).await?;
            println!("{} deleted", symbols::CHECK);
        }

        Commands::Status => {
            let status = client.status().await?;
            println!("nodes:            {}/{} healthy", status.healthy_nodes, status.total_nodes);
            println!("storage:          {}/{} bytes used", status.used_bytes, status.total_bytes);
            println!("files:            {}", status.file_count);
            println!("under-replicated: {}", status.under_replicated_count);
        }

        Commands::Rereplicate => {
            let triggered = client.trigger_rereplication().await?;
            println!("{} sweep triggered ({triggered} chunks currently under-replicated)", symbols::CHECK);
        }
    }

    Ok(())
}
