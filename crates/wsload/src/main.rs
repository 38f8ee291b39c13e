//! `wsload`: WebSocket JSON-RPC subscription load tester.
//!
//! Validates the configuration, prints a banner, then runs the connection
//! manager and the dashboard as two tasks until Ctrl-C. Logs go to a file
//! (default `<tmp>/wsload.log`) because stdout belongs to the dashboard.

mod cli;
mod config;
mod display;
mod error;
mod output;

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{CommandFactory, Parser};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use wsload_api::WsDialer;
use wsload_core::{ConnectionManager, StatsAggregator};

use crate::cli::{Cli, Command, OutputFormat, RunArgs};
use crate::display::Dashboard;
use crate::error::CliError;
use crate::output::Palette;

const DEFAULT_LOG_FILE: &str = "wsload.log";

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Some(Command::Completions(args)) => {
            let mut cmd = Cli::command();
            clap_complete::generate(args.shell, &mut cmd, "wsload", &mut io::stdout());
            Ok(())
        }
        None => {
            let log_file = cli
                .log_file
                .unwrap_or_else(|| std::env::temp_dir().join(DEFAULT_LOG_FILE));
            load_test(cli.run, cli.verbose, &log_file).await
        }
    }
}

/// File-based tracing; stdout is reserved for the dashboard. The guard
/// must live until exit so buffered lines are flushed.
fn setup_tracing(verbosity: u8, log_file: &Path) -> Result<WorkerGuard, CliError> {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("wsload={level},wsload_core={level},wsload_api={level}"))
    });

    let dir = log_file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
    let name = log_file
        .file_name()
        .map_or_else(|| DEFAULT_LOG_FILE.into(), |n| n.to_string_lossy().into_owned());

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(name)
        .build(&dir)
        .map_err(|e| CliError::LogFile {
            path: log_file.display().to_string(),
            reason: e.to_string(),
        })?;
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true),
        )
        .init();

    Ok(guard)
}

async fn load_test(args: RunArgs, verbosity: u8, log_file: &Path) -> Result<(), CliError> {
    let config = config::resolve(&args)?;
    let _guard = setup_tracing(verbosity, log_file)?;

    let palette = Palette::new(output::should_color(args.color));
    let dashboard = args.output == OutputFormat::Dashboard;
    if dashboard {
        display::print_banner(&mut io::stdout().lock(), &config, palette)?;
    }
    info!(
        url = %config.url,
        service = %config.service_id,
        subscriptions = %config.subscriptions,
        instances = config.instances,
        "starting load test"
    );

    let stats = Arc::new(StatsAggregator::new());
    let cancel = CancellationToken::new();
    let manager = Arc::new(ConnectionManager::new(
        Arc::new(config),
        Arc::clone(&stats),
        WsDialer::new(),
        cancel.clone(),
    ));

    let runner = Arc::clone(&manager);
    let manager_task = tokio::spawn(async move { runner.run().await });
    let display_task = dashboard.then(|| {
        tokio::spawn(display::drive(
            Arc::clone(&manager),
            Dashboard::new(io::stdout(), palette),
            cancel.clone(),
        ))
    });

    tokio::signal::ctrl_c().await?;
    info!("interrupt received, shutting down");
    if dashboard {
        println!("\n{}", palette.cyan("🛑 Received interrupt signal, shutting down..."));
    }
    cancel.cancel();

    if let Err(e) = manager_task.await {
        tracing::error!(error = %e, "connection task failed");
    }
    if let Some(task) = display_task {
        if let Err(e) = task.await {
            tracing::error!(error = %e, "display task failed");
        }
    }

    let report = stats.final_report(manager.total_subscriptions());
    let mut stdout = io::stdout().lock();
    match args.output {
        OutputFormat::Dashboard => display::print_final_summary(&mut stdout, &report, palette)?,
        OutputFormat::Json => writeln!(stdout, "{}", output::render_json_pretty(&report)?)?,
    }
    Ok(())
}
