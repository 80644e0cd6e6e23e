mod config;
mod routes;
mod state;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use config::Settings;
use pdf_qa_core::uploads_from_folder;
use state::AppState;
use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*};

#[derive(Parser)]
#[command(name = "pdf-qa-server", version, about = "Question answering over uploaded PDFs")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    settings: Settings,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the HTTP API.
    Serve,
    /// Ingest every PDF under a folder as one batch.
    Ingest {
        /// Folder that contains PDFs recursively.
        #[arg(long)]
        folder: PathBuf,
    },
    /// Answer a question from the indexed documents.
    Ask {
        #[arg(long)]
        question: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(cli.settings.log_filter())
        .with(fmt::layer())
        .init();

    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "pdf-qa-server boot"
    );

    let state = AppState::from_settings(&cli.settings).await?;

    match cli.command {
        Command::Serve => serve(state, &cli.settings.bind_addr).await?,
        Command::Ingest { folder } => {
            let uploads = uploads_from_folder(&folder, state.ingestor.policy()).await?;
            if uploads.is_empty() {
                warn!(folder = %folder.display(), "no matching files found");
                println!("0 documents ingested");
                return Ok(());
            }

            info!(folder = %folder.display(), files = uploads.len(), "ingesting folder");
            let summary = state.ingestor.ingest_batch(uploads).await?;
            println!(
                "{}: {} documents, {} chunks at {}",
                summary.message,
                summary.documents_indexed,
                summary.total_chunks,
                Utc::now().to_rfc3339()
            );
        }
        Command::Ask { question } => {
            let payload = state.answerer.answer(&question).await?;
            println!("{}", payload.answer_text);
            for chunk in payload.supporting_chunks {
                println!(
                    "  [{} p.{}] {}",
                    chunk.metadata.file_name, chunk.metadata.page_number, chunk.text
                );
            }
        }
    }

    Ok(())
}

async fn serve(state: AppState, bind_addr: &str) -> anyhow::Result<()> {
    let addr: SocketAddr = bind_addr
        .parse()
        .with_context(|| format!("invalid bind address {bind_addr}"))?;
    let app = routes::build_router(Arc::new(state));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server shutdown")?;
    Ok(())
}

async fn shutdown_signal() {
    wait_for_shutdown(tokio::signal::ctrl_c()).await
}

/// Resolves when `signal` fires. If the listener cannot be installed the
/// future never resolves, so the server keeps running.
async fn wait_for_shutdown<F>(signal: F)
where
    F: Future<Output = std::io::Result<()>>,
{
    if let Err(error) = signal.await {
        warn!(%error, "failed to listen for shutdown signal; serving until killed");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::wait_for_shutdown;
    use std::time::Duration;

    #[tokio::test]
    async fn failed_signal_listener_keeps_serving() {
        let failed = async { Err(std::io::Error::other("no signal handler")) };
        let waited = tokio::time::timeout(Duration::from_millis(50), wait_for_shutdown(failed)).await;
        assert!(waited.is_err(), "shutdown must not resolve");
    }

    #[tokio::test]
    async fn delivered_signal_triggers_shutdown() {
        let delivered = async { Ok(()) };
        let waited = tokio::time::timeout(Duration::from_millis(50), wait_for_shutdown(delivered)).await;
        assert!(waited.is_ok());
    }
}
