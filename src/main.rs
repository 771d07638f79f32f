mod backends;
mod config;
mod err;
mod get_ip;
mod options;
mod resolve;
mod sync;

use crate::backends::{Backend, Route53};
use crate::config::Config;
use crate::err::*;
use crate::get_ip::HttpOracle;
use crate::options::Options;
use crate::resolve::SystemResolver;
use crate::sync::{Managed, Syncer};

use clap::Parser;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{debug, error, info, warn};
use tracing_subscriber::util::SubscriberInitExt;

type AppSyncer = Syncer<Backend, HttpOracle, SystemResolver>;

#[tokio::main]
async fn main() -> Result<()> {
    let opts = Options::parse();
    let config = Config::from_options(opts)?;

    let log_level = config.log_level;
    let mut tracing_builder = tracing_subscriber::fmt().with_max_level(log_level);

    if log_level >= tracing::Level::DEBUG {
        tracing_builder = tracing_builder.with_file(true).with_line_number(true);
    };

    tracing_builder.finish().init();

    info!("Using log level: {}", log_level);
    info!("The Configuration is: {:?}", config);

    let syncer = app_init(&config).await?;

    let result = if config.check_interval == 0 {
        syncer.run_once().await.map(|report| {
            info!("Single check done: {}", report);
        })
    } else {
        info!(
            "Checking DNS records in {} second intervals",
            config.check_interval
        );
        run_as_blocking(&config, &syncer).await
    };

    if let Err(ref e) = result {
        error!("Exiting: {}", e);
    }
    result
}

async fn app_init(config: &Config) -> Result<AppSyncer> {
    let mut accounts = Vec::with_capacity(config.accounts.len());

    for (i, account) in config.accounts.iter().enumerate() {
        let backend = Backend::Route53(Route53::from_account(account).await);
        debug!("Backend[{}]: {:?}", i, backend);

        accounts.push(Managed {
            account: account.clone(),
            backend,
        });
    }

    let oracle = HttpOracle::new(config.check_ip_url.as_str())?;

    Ok(Syncer::new(
        accounts,
        oracle,
        SystemResolver,
        config.on_failure,
        config.wait_timeout,
    ))
}

async fn run_as_blocking(config: &Config, syncer: &AppSyncer) -> Result<()> {
    let pause = tokio::time::Duration::from_secs(config.check_interval);

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    let shutdown = async move {
        tokio::select! {
            _ = sigterm.recv() => warn!("Receive SIGTERM, quit"),
            _ = sigint.recv() => warn!("Receive SIGINT, quit"),
        }
    };

    syncer.run_until(pause, shutdown).await
}
