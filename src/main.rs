use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::runtime::Builder;
use tracing::debug;

use gwadm::cli;
use gwadm::commands::{self, Context};
use gwadm::config::Config;
use gwadm::fileutil::FsSource;
use gwadm::rest::{DirectoryService, RestClient};

fn main() -> Result<()> {
    // Workloads here are network-bound; a few threads above core count help,
    // but cap the runtime to avoid excessive context switching.
    let num_cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4);
    let worker_threads = std::cmp::min(num_cpus + 2, 16);

    debug!("Configuring Tokio runtime with {} worker threads", worker_threads);

    let runtime = Builder::new_multi_thread()
        .worker_threads(worker_threads)
        .enable_all()
        .build()
        .expect("Failed to create Tokio runtime");

    runtime.block_on(async_main())
}

async fn async_main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let matches = cli::build_cli().get_matches();
    let opts = cli::global_opts(&matches)?;
    let config = Config::from_env();

    let rest = Arc::new(RestClient::new(
        Duration::from_millis(opts.timeout_ms),
        config.access_token.clone(),
    )?);
    let threads = config.clamp_threads(opts.threads);

    let ctx = Context {
        lister: Arc::new(DirectoryService::new(Arc::clone(&rest))),
        rest,
        files: Arc::new(FsSource),
        output: opts.output,
        config,
        threads,
    };

    let (resource, sub) = matches
        .subcommand()
        .expect("subcommand required by the parser");
    commands::dispatch(&ctx, resource, sub).await?;

    Ok(())
}
