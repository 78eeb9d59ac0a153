//! `voxvote-gateway --verify`: check everything a session needs, print a report, exit.

use anyhow::{bail, Context};
use std::net::SocketAddr;
use voxvote_core::{BallotStore, SqliteBallotStore, VoteConfig};
use voxvote_voice::{describe_speech, SpeechSettings};

pub fn run_verify(config: &VoteConfig) -> anyhow::Result<()> {
    println!("VoxVote gateway verification\n");

    print!("Checking ballot store {}... ", config.db_path().display());
    let store = SqliteBallotStore::open(config.db_path()).context("ballot store unavailable")?;
    let candidates = store.list_candidates().context("cannot list candidates")?;
    if candidates.is_empty() {
        bail!("ballot store has no candidates");
    }
    println!("OK ({} candidates)", candidates.len());

    let status_dir = config.status_dir();
    print!("Checking status dir {}... ", status_dir.display());
    std::fs::create_dir_all(&status_dir)
        .with_context(|| format!("cannot create {}", status_dir.display()))?;
    let probe = status_dir.join(".verify-probe");
    std::fs::write(&probe, b"ok").context("status dir not writable")?;
    std::fs::remove_file(&probe)?;
    println!("OK");

    let worker = config.worker_bin();
    print!("Checking worker executable {}... ", worker.display());
    if !worker.is_file() {
        bail!("worker executable not found (set VOXVOTE__WORKER_BIN)");
    }
    println!("OK");

    print!("Probing speech backends... ");
    let report = describe_speech(
        &SpeechSettings::from_env().with_speaker_lock(config.speaker_lock_path.clone()),
    );
    println!("{}", serde_json::to_string(&report)?);
    if report.offline.is_none() && report.online.is_none() && !report.scripted {
        println!("  warning: no speech recognizer; sessions will fail until one is configured");
    }

    print!("Checking bind address {}... ", config.bind_addr);
    let addr: SocketAddr = config
        .bind_addr
        .parse()
        .with_context(|| format!("invalid bind_addr {}", config.bind_addr))?;
    match std::net::TcpListener::bind(addr) {
        Ok(listener) => {
            drop(listener);
            println!("OK (available)");
        }
        Err(e) => bail!("{} BLOCKED: {}", addr, e),
    }

    println!("\nAll checks passed. Ready to start the gateway.");
    Ok(())
}
