//! `procvisor` command line.
//!
//! ```text
//! procvisor --sentinel sync-wpt.py --sentinel sync-cert.py -- ./wpt serve
//! ```

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use procvisor::{CommandSpec, Config, LogWriter, Supervisor};

/// Keeps a leader process alive and restarts it whenever a sentinel succeeds.
#[derive(Parser, Debug)]
#[command(name = "procvisor", version)]
#[command(about = "Keeps a leader process alive and restarts it whenever a sentinel succeeds", long_about = None)]
struct Cli {
    /// A command that controls when the "leader" process is restarted. The leader
    /// will be restarted whenever this command exits with an exit status of 0.
    /// May be repeated.
    #[arg(long = "sentinel", value_name = "CMD")]
    sentinels: Vec<String>,

    /// Seconds to wait for processes to stop during shutdown
    #[arg(long, env = "PROCVISOR_GRACE", default_value_t = 5)]
    grace: u64,

    /// Seconds an interrupted leader may take to exit before it is killed (default: wait forever)
    #[arg(long, env = "PROCVISOR_INTERRUPT_GRACE")]
    interrupt_grace: Option<u64>,

    /// A command that should run indefinitely. It will be restarted according to the
    /// behavior of all provided sentinels. If it exits for any other reason, procvisor fails.
    #[arg(required = true, num_args = 1.., trailing_var_arg = true, value_name = "LEADER_CMD")]
    leader_cmd: Vec<String>,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_logging();

    let cfg = Config {
        grace: Duration::from_secs(cli.grace),
        interrupt_grace: cli.interrupt_grace.map(Duration::from_secs),
        ..Config::default()
    };

    let leader = CommandSpec::new(cli.leader_cmd).context("leader command")?;
    let sentinels = cli
        .sentinels
        .iter()
        .map(|line| CommandSpec::shell(&cfg.shell, line.as_str()))
        .collect();

    let sup = Supervisor::new(cfg, vec![Arc::new(LogWriter::new())]);
    match sup.run(leader, sentinels).await {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(fatal) => {
            eprintln!("procvisor: {fatal}");
            Ok(ExitCode::FAILURE)
        }
    }
}
