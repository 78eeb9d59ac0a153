//! voxvote-gateway: HTTP front end for voice voting sessions.
//!
//! Each `POST /sessions` launches one `voxvote-booth` process; browsers poll
//! `GET /sessions/:id` for progress. `--verify` checks the host and exits.

mod app;
mod coordinator;
mod handlers;
mod launcher;
mod verify;

use anyhow::Context;
use app::{build_app, AppState};
use coordinator::{CoordinatorSettings, SessionCoordinator};
use launcher::ProcessLauncher;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::MissedTickBehavior;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use voxvote_core::{BallotStore, SqliteBallotStore, VoteConfig};
use voxvote_voice::{describe_speech, SpeechSettings};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args: Vec<String> = std::env::args().collect();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = VoteConfig::load().context("loading configuration")?;

    if args.iter().any(|a| a == "--verify") {
        return verify::run_verify(&config);
    }

    let db_path = config.db_path();
    let store: Arc<dyn BallotStore> = Arc::new(
        SqliteBallotStore::open(&db_path)
            .with_context(|| format!("opening ballot store {}", db_path.display()))?
            .with_one_vote_per_voter(config.one_vote_per_voter),
    );

    let launcher = ProcessLauncher::new(config.worker_bin(), config.log_dir())
        .with_args(["--db".to_string(), db_path.to_string_lossy().into_owned()]);
    if !launcher.program().is_file() {
        tracing::warn!(
            "worker executable {} not found; session starts will fail",
            launcher.program().display()
        );
    }

    let coordinator = Arc::new(
        SessionCoordinator::new(
            config.status_dir(),
            Arc::new(launcher),
            store.clone(),
            CoordinatorSettings::from_config(&config),
        )
        .context("preparing status directory")?,
    );
    tracing::info!("status files in {}", coordinator.status_dir().display());

    let speech = describe_speech(
        &SpeechSettings::from_env().with_speaker_lock(config.speaker_lock_path.clone()),
    );
    tracing::info!(
        offline = ?speech.offline,
        online = ?speech.online,
        synthesizer = %speech.synthesizer,
        "speech backends"
    );

    let reaper = {
        let coordinator = coordinator.clone();
        let every = config.reap_interval();
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(every);
            tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tick.tick().await;
                let pass = coordinator.clone();
                match tokio::task::spawn_blocking(move || pass.reap(Instant::now())).await {
                    Ok(report) if !report.is_empty() => tracing::info!(
                        abandoned = report.abandoned.len(),
                        expired = report.expired.len(),
                        live = coordinator.live_sessions(),
                        "reaper pass"
                    ),
                    Ok(_) => {}
                    Err(e) => tracing::warn!("reaper pass panicked: {}", e),
                }
            }
        })
    };

    let app = build_app(AppState {
        coordinator: coordinator.clone(),
        store,
        speech: Arc::new(speech),
    });

    let addr: SocketAddr = config
        .bind_addr
        .parse()
        .with_context(|| format!("invalid bind_addr {}", config.bind_addr))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!("VoxVote gateway listening on {}", addr);

    let server = axum::serve(listener, app);
    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!("Server error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown initiated (Ctrl+C received)");
        }
    }

    reaper.abort();
    let cancelled = tokio::task::spawn_blocking(move || coordinator.shutdown())
        .await
        .context("stopping sessions")?;
    tracing::info!("gateway stopped; {} live sessions cancelled", cancelled);
    Ok(())
}
