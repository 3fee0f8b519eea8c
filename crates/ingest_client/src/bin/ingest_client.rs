use anyhow::Context;
use clap::Parser;
use ingest_client::{
    read_device_batches, resolve_input_path, Cli, GrpcBatchSubmitter, IngestionRun,
};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

async fn prompt_file_name() -> anyhow::Result<String> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(b"JSON file name: ").await?;
    stdout.flush().await?;

    let mut line = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await
        .context("failed to read file name from stdin")?;
    Ok(line)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .with_target(false)
        .init();

    let file_name = match &cli.file {
        Some(file) => file.clone(),
        None => prompt_file_name().await?,
    };

    let path = resolve_input_path(&cli.data_dir, &file_name)?;
    let batches = read_device_batches(&path).await?;
    info!(path = %path.display(), batches = batches.len(), "loaded device batches");

    let submitter =
        GrpcBatchSubmitter::connect(&cli.server_url, cli.connect_timeout(), cli.request_timeout())
            .await?;

    let summary = IngestionRun::new(submitter).run(batches).await?;
    info!(
        batches_sent = summary.batches_sent,
        operations_sent = summary.operations_sent,
        "all batches sent"
    );

    Ok(())
}
