use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use validate_xml_batch::{
    BatchOptions, BatchRunner, CancellationToken, Cli, ConfigManager, FileDiscovery, LogSink,
    Output, Schema, WriterSink,
};

/// Exit status for failures that stop the run before or outside the batch
const EXIT_FATAL: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    match run().await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(EXIT_FATAL)
        }
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run() -> anyhow::Result<u8> {
    let cli = Cli::parse_args();

    let config = ConfigManager::load_config(&cli)
        .await
        .context("failed to load configuration")?;

    let schema = Arc::new(Schema::load(&cli.schema)?);

    let discovery =
        FileDiscovery::new(config.files.pattern.clone()).with_recursive(config.files.recursive);
    let files = discovery.discover(&cli.inputs)?;
    info!(
        files = files.len(),
        pattern = discovery.pattern(),
        schema = %cli.schema.display(),
        "starting batch"
    );

    let options = BatchOptions {
        allow_large_documents: config.validation.allow_large_documents,
        validate_dtd: config.validation.validate_dtd,
        max_concurrency: ConfigManager::effective_jobs(&config),
    };
    let sink: Arc<dyn LogSink> = Arc::new(WriterSink::stderr());
    let runner = BatchRunner::new(schema, options, sink);

    let token = CancellationToken::new();
    {
        let token = token.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, stopping after files in flight");
                token.cancel();
            }
        });
    }

    let report = if options.max_concurrency > 1 {
        runner.run_concurrent(&files, &token).await
    } else {
        tokio::task::spawn_blocking(move || runner.run_with_cancel(&files, &token))
            .await
            .context("batch worker failed")?
    };

    if !config.output.quiet {
        let output = Output::new(config.output.format);
        println!("{}", output.format_report(&report)?);
    }

    Ok(report.exit_code() as u8)
}
