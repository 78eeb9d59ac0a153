//! voxvote-booth: runs one spoken voting session and exits.
//!
//! Usage:
//!   voxvote-booth --session <id> --status-file <path> [--db <path>] [--script "first one|2|confirm"]
//!
//! Launched by the gateway, one process per session. Logs go to `<log_dir>/booth_<id>.log`.
//! Exit code 0 means a terminal event was written, whatever the outcome of the vote.

use anyhow::Context;
use std::path::Path;
use std::process::ExitCode;
use tracing_appender::non_blocking::WorkerGuard;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use voxvote_booth::{record_failure, run_booth, BoothArgs, USAGE};
use voxvote_core::{BallotStore, SessionId, SqliteBallotStore, StatusChannel, VoteConfig};

fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let args = match BoothArgs::parse(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{e}\n\n{USAGE}");
            return ExitCode::from(2);
        }
    };
    let channel = StatusChannel::at(&args.status_file);

    let config = match VoteConfig::load().context("loading configuration") {
        Ok(config) => config,
        Err(e) => {
            eprintln!("voxvote-booth: {e:#}");
            write_failure(&channel, &args.session, None, &format!("{e:#}"));
            return ExitCode::FAILURE;
        }
    };
    let _log_guard = init_logging(&config.log_dir(), &args.session);

    info!(
        session = %args.session,
        status_file = %args.status_file.display(),
        "booth starting"
    );
    match run_booth(&args, &config).context("writing session status") {
        Ok(event) => {
            info!(step = ?event.step, "booth exiting");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("booth failed: {:#}", e);
            let db_path = args.db.clone().unwrap_or_else(|| config.db_path());
            let store = SqliteBallotStore::open(db_path).ok();
            write_failure(
                &channel,
                &args.session,
                store.as_ref().map(|s| s as &dyn BallotStore),
                &format!("{e:#}"),
            );
            ExitCode::FAILURE
        }
    }
}

/// stderr plus `<log_dir>/booth_<session>.log`. The file layer is skipped if the
/// directory cannot be created.
fn init_logging(log_dir: &Path, session: &SessionId) -> Option<WorkerGuard> {
    let file = match std::fs::create_dir_all(log_dir) {
        Ok(()) => {
            let appender =
                tracing_appender::rolling::never(log_dir, format!("booth_{session}.log"));
            Some(tracing_appender::non_blocking(appender))
        }
        Err(e) => {
            eprintln!("voxvote-booth: no log file in {}: {e}", log_dir.display());
            None
        }
    };
    let (file_layer, guard) = match file {
        Some((writer, guard)) => (
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false),
            ),
            Some(guard),
        ),
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();
    guard
}

/// Best effort: a write that fails here has nowhere else to go but stderr.
fn write_failure(
    channel: &StatusChannel,
    session: &SessionId,
    store: Option<&dyn BallotStore>,
    reason: &str,
) {
    if let Err(e) = record_failure(channel, session, store, reason) {
        eprintln!("voxvote-booth: could not record failure: {e}");
    }
}
