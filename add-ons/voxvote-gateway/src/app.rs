//! Router and shared state.

use crate::coordinator::SessionCoordinator;
use crate::handlers::{ballot, sessions};
use axum::http::{HeaderValue, Method};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use voxvote_core::BallotStore;
use voxvote_voice::ProbeReport;

#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<SessionCoordinator>,
    pub store: Arc<dyn BallotStore>,
    /// Speech backends as seen at start-up.
    pub speech: Arc<ProbeReport>,
}

/// Browser UIs are served from localhost on any port.
fn is_local_origin(origin: &HeaderValue) -> bool {
    let Ok(origin) = origin.to_str() else {
        return false;
    };
    let host = origin
        .strip_prefix("http://")
        .or_else(|| origin.strip_prefix("https://"))
        .unwrap_or("");
    let host = match host.strip_prefix('[') {
        Some(v6) => v6.split(']').next().unwrap_or(""),
        None => host.split(':').next().unwrap_or(""),
    };
    matches!(host, "localhost" | "127.0.0.1" | "::1")
}

pub fn build_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(|origin: &HeaderValue, _| {
            is_local_origin(origin)
        }))
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(tower_http::cors::Any);

    Router::new()
        .route("/health", get(health))
        .route("/candidates", get(ballot::list_candidates))
        .route("/results", get(ballot::results))
        .route("/sessions", post(sessions::create_session))
        .route(
            "/sessions/:id",
            get(sessions::poll_session).delete(sessions::cancel_session),
        )
        .route("/speech/probe", get(speech_probe))
        .layer(cors)
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

async fn speech_probe(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> Json<ProbeReport> {
    Json(state.speech.as_ref().clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::CoordinatorSettings;
    use crate::launcher::{WorkerExit, WorkerHandle, WorkerLauncher};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;
    use voxvote_core::{
        MemoryBallotStore, SessionId, StatusChannel, StatusEvent, VoteError, VoteReceipt,
        VoteResult,
    };

    /// Writes a completed vote straight away, like a booth that heard everything at once.
    struct InstantBooth {
        store: Arc<MemoryBallotStore>,
    }

    struct Exited;

    impl WorkerHandle for Exited {
        fn exit_status(&mut self) -> VoteResult<Option<WorkerExit>> {
            Ok(Some(WorkerExit { code: Some(0) }))
        }

        fn terminate(&mut self) -> VoteResult<()> {
            Ok(())
        }
    }

    impl WorkerLauncher for InstantBooth {
        fn launch(
            &self,
            session: &SessionId,
            channel: &StatusChannel,
        ) -> VoteResult<Box<dyn WorkerHandle>> {
            self.store.record_vote("FIRST1", 2, Some(session))?;
            channel.write(&StatusEvent::completed(
                VoteReceipt {
                    voter_id: "FIRST1".into(),
                    candidate_id: 2,
                    candidate_name: Some("CONGRESS".into()),
                },
                "Vote successfully recorded for CONGRESS!",
            ))?;
            Ok(Box::new(Exited))
        }
    }

    struct NoLaunch;

    impl WorkerLauncher for NoLaunch {
        fn launch(&self, _: &SessionId, _: &StatusChannel) -> VoteResult<Box<dyn WorkerHandle>> {
            Err(VoteError::ResourceExhausted("no worker executable".into()))
        }
    }

    fn test_app(
        launcher: Arc<dyn WorkerLauncher>,
        store: Arc<MemoryBallotStore>,
    ) -> (Router, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let coordinator = SessionCoordinator::new(
            dir.path(),
            launcher,
            store.clone(),
            CoordinatorSettings::default(),
        )
        .unwrap();
        let app = build_app(AppState {
            coordinator: Arc::new(coordinator),
            store,
            speech: Arc::new(ProbeReport {
                offline: None,
                online: None,
                synthesizer: "silent".into(),
                microphone: false,
                scripted: true,
            }),
        });
        (app, dir)
    }

    async fn send(app: &Router, method: &str, uri: &str) -> (StatusCode, Value) {
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn health_and_candidates() {
        let store = Arc::new(MemoryBallotStore::demo());
        let (app, _dir) = test_app(Arc::new(NoLaunch), store);

        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let res = app.clone().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"OK");

        let (status, json) = send(&app, "GET", "/candidates").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json[0]["id"], 1);
        assert_eq!(json[0]["name"], "BJP");
        assert_eq!(json.as_array().unwrap().len(), 9);
    }

    #[tokio::test]
    async fn session_round_trip_updates_results() {
        let store = Arc::new(MemoryBallotStore::demo());
        let (app, _dir) = test_app(
            Arc::new(InstantBooth {
                store: store.clone(),
            }),
            store,
        );

        let (status, json) = send(&app, "POST", "/sessions").await;
        assert_eq!(status, StatusCode::CREATED);
        let id = json["sessionId"].as_str().unwrap().to_string();

        let (status, json) = send(&app, "GET", &format!("/sessions/{id}")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["step"], "Completed");
        assert_eq!(json["result"]["voterId"], "FIRST1");
        assert_eq!(json["result"]["candidateId"], 2);

        let (status, json) = send(&app, "GET", "/results").await;
        assert_eq!(status, StatusCode::OK);
        let rows = json.as_array().unwrap();
        assert_eq!(rows.len(), 9);
        assert_eq!(rows[1]["candidateId"], 2);
        assert_eq!(rows[1]["count"], 1);
        assert_eq!(rows[0]["count"], 0);

        let (status, _) = send(&app, "DELETE", &format!("/sessions/{id}")).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, json) = send(&app, "GET", &format!("/sessions/{id}")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(json["error"].as_str().is_some());
    }

    #[tokio::test]
    async fn unknown_sessions_are_404() {
        let store = Arc::new(MemoryBallotStore::demo());
        let (app, _dir) = test_app(Arc::new(NoLaunch), store);
        let id = SessionId::generate();

        let (status, _) = send(&app, "GET", &format!("/sessions/{id}")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(&app, "DELETE", &format!("/sessions/{id}")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(&app, "GET", "/sessions/not..valid").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn launch_failure_is_503() {
        let store = Arc::new(MemoryBallotStore::demo());
        let (app, _dir) = test_app(Arc::new(NoLaunch), store);
        let (status, json) = send(&app, "POST", "/sessions").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(json["error"].as_str().unwrap().contains("no worker executable"));
    }

    #[tokio::test]
    async fn store_failure_is_500() {
        let store = Arc::new(MemoryBallotStore::demo());
        store.fail_reads(true);
        let (app, _dir) = test_app(Arc::new(NoLaunch), store);
        let (status, _) = send(&app, "GET", "/candidates").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn speech_probe_reports_startup_selection() {
        let store = Arc::new(MemoryBallotStore::demo());
        let (app, _dir) = test_app(Arc::new(NoLaunch), store);
        let (status, json) = send(&app, "GET", "/speech/probe").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["synthesizer"], "silent");
        assert_eq!(json["scripted"], true);
    }

    #[test]
    fn cors_accepts_only_localhost() {
        for ok in [
            "http://localhost:3000",
            "http://127.0.0.1:5173",
            "https://localhost",
            "http://[::1]:8080",
        ] {
            assert!(is_local_origin(&HeaderValue::from_static(ok)), "{ok}");
        }
        for bad in ["http://example.com", "http://localhost.evil.com:80", "null"] {
            assert!(!is_local_origin(&HeaderValue::from_static(bad)), "{bad}");
        }
    }
}
