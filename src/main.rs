use clap::Parser;
use log::{debug, info};
use tokio_util::sync::CancellationToken;

use kubectl_cost::{Cli, KubernetesLoader, Result, Transport, init_logger, run_cost};

async fn run(cli: Cli, cancel: CancellationToken) -> Result<()> {
    let config = cli.config();
    config.validate()?;

    let dimension = cli.command.dimension();
    let options = cli.command.args().cost_options(&config.currency);
    // Fail on unsupported combinations before touching the cluster
    options.validate(dimension)?;

    debug!("Cost service: {}/{}:{}", config.kubecost_namespace, config.service_name, config.service_port);
    debug!("Transport: {:?}", config.transport);

    let loader = KubernetesLoader::new(config.clone()).await?;
    let transport = Transport::from_config(loader, &config)?;

    let mut stdout = std::io::stdout().lock();
    run_cost(dimension, &transport, &options, &mut stdout, &cancel).await
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_logger(cli.verbose, cli.quiet) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }

    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, cancelling query");
            interrupt.cancel();
        }
    });

    if let Err(e) = run(cli, cancel).await {
        debug!("Command failed: {:?}", e);
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
