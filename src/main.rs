//! ip-masq-agent - keeps the nat masquerade chain of a node in sync.

use anyhow::Result;
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use ip_masq_agent::cli::Cli;
use ip_masq_agent::cmd_abstraction::RealCommandExecutor;
use ip_masq_agent::daemon::MasqDaemon;
use ip_masq_agent::enforcer::{check_root, IptablesApplier};
use ip_masq_agent::fs_abstraction::RealFileSystem;
use ip_masq_agent::options::AgentOptions;
use ip_masq_agent::rules::AddressFamily;
use ip_masq_agent::signal;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    let log_level = if cli.verbose {
        Level::DEBUG
    } else if cli.quiet {
        Level::ERROR
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let options = AgentOptions::from(&cli);
    options.validate()?;
    check_root()?;

    info!("ip-masq-agent {} starting", env!("CARGO_PKG_VERSION"));

    let mut daemon = MasqDaemon::new(
        options,
        RealFileSystem,
        IptablesApplier::new(RealCommandExecutor, AddressFamily::V4),
        IptablesApplier::new(RealCommandExecutor, AddressFamily::V6),
    );
    daemon.run(signal::shutdown_signal()).await;

    Ok(())
}
