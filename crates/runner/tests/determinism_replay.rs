//! Golden output stays stable when the server's clock and identifiers are
//! redirected to the determinism service

use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::process::Command;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::net::TcpListener;

use towel_determinism::sequence::{CLOCK_SEED, CLOCK_STEP};
use towel_determinism::{DeterminismServer, Providers};
use towel_runner::golden::staged_path;
use towel_runner::{server_url, Outcome, RunReport, RunnerConfig, TestRunner};

async fn create_artifact(
    State(providers): State<Providers>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    let (id, created) = match (providers.new_id().await, providers.now().await) {
        (Ok(id), Ok(created)) => (id, created),
        _ => return (StatusCode::BAD_GATEWAY, Json(json!({"error": "providers unavailable"}))),
    };
    (
        StatusCode::CREATED,
        Json(json!({"id": id, "created": created.timestamp(), "name": body["name"]})),
    )
}

async fn now(State(providers): State<Providers>) -> impl IntoResponse {
    match providers.now().await {
        Ok(now) => (StatusCode::OK, Json(json!({"now": now.timestamp()}))),
        Err(_) => (StatusCode::BAD_GATEWAY, Json(json!({"error": "clock unavailable"}))),
    }
}

async fn spawn_sut(providers: Providers) -> SocketAddr {
    let app = Router::new()
        .route("/v3/artifacts", post(create_artifact))
        .route("/now", get(now))
        .with_state(providers);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn any_port() -> SocketAddr {
    "127.0.0.1:0".parse().unwrap()
}

/// One run against a fresh determinism service, as `towel run` with the mock
/// server enabled does it
async fn replay(dir: &Path, providers: &Providers, sut: SocketAddr) -> RunReport {
    let service = DeterminismServer::new().spawn(any_port()).await.unwrap();
    let redirection = providers.redirect(&service.base_url()).unwrap();

    let config = RunnerConfig {
        base_url: server_url("http://127.0.0.1", sut.port()).unwrap(),
        ..RunnerConfig::default()
    };
    let report = TestRunner::new(config).unwrap().run(dir).await.unwrap();

    redirection.restore();
    service.shutdown().await.unwrap();
    report
}

const SUITE: &str = r#"<towel>
  <request method="post" url="/v3/artifacts" result="first.json"
           request-data="artifact.json" status="201" content-type="application/json"/>
  <request method="post" url="/v3/artifacts" result="second.json"
           request-data="artifact.json" status="201" content-type="application/json"/>
</towel>
"#;

#[tokio::test]
async fn reruns_produce_identical_output() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    fs::write(dir.join("towel.xml"), SUITE).unwrap();
    fs::write(dir.join("artifact.json"), r#"{"name": "towel"}"#).unwrap();

    let providers = Providers::system();
    let sut = spawn_sut(providers.clone()).await;

    let staged = |name: &str| fs::read_to_string(staged_path(&dir.join(name))).unwrap();

    let first = replay(dir, &providers, sut).await;
    assert_eq!(first.failed, 2);
    let recorded = (staged("first.json"), staged("second.json"));

    let second = replay(dir, &providers, sut).await;
    assert_eq!(second.failed, 2);
    assert_eq!((staged("first.json"), staged("second.json")), recorded);

    assert!(recorded.0.contains(&format!("\"created\": {}", CLOCK_SEED + CLOCK_STEP)));
    assert!(recorded.1.contains(&format!("\"created\": {}", CLOCK_SEED + 2 * CLOCK_STEP)));
    assert_ne!(recorded.0, recorded.1);

    fs::remove_file(staged_path(&dir.join("first.json"))).unwrap();
    fs::remove_file(staged_path(&dir.join("second.json"))).unwrap();
    fs::write(dir.join("first.json"), &recorded.0).unwrap();
    fs::write(dir.join("second.json"), &recorded.1).unwrap();

    let third = replay(dir, &providers, sut).await;
    assert_eq!((third.passed, third.failed), (2, 0));
}

#[tokio::test]
async fn without_redirection_output_drifts() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    fs::write(dir.join("towel.xml"), SUITE).unwrap();
    fs::write(dir.join("artifact.json"), r#"{"name": "towel"}"#).unwrap();

    let providers = Providers::system();
    let sut = spawn_sut(providers.clone()).await;
    let runner = TestRunner::new(RunnerConfig {
        base_url: server_url("http://127.0.0.1", sut.port()).unwrap(),
        ..RunnerConfig::default()
    })
    .unwrap();

    runner.run(dir).await.unwrap();
    let first = fs::read_to_string(staged_path(&dir.join("first.json"))).unwrap();
    runner.run(dir).await.unwrap();
    let again = fs::read_to_string(staged_path(&dir.join("first.json"))).unwrap();

    // Random identifiers differ between runs
    assert_ne!(first, again);
}

fn has_bash() -> bool {
    Command::new("bash").arg("-c").arg("true").status().is_ok()
}

/// Setup script that reads one clock value straight from the service
fn clock_query_script(service: SocketAddr) -> String {
    format!(
        "exec 3<>/dev/tcp/{}/{}\n\
         printf 'GET /clock/now HTTP/1.0\\r\\nHost: {}\\r\\n\\r\\n' >&3\n\
         cat <&3 > /dev/null\n",
        service.ip(),
        service.port(),
        service
    )
}

#[tokio::test]
async fn setup_queries_advance_the_sequence_in_order() {
    if !has_bash() {
        eprintln!("Skipping: bash not available in PATH");
        return;
    }

    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    fs::write(
        dir.join("towel.xml"),
        r#"<towel>
  <request method="setup" request-data="tick.sh"/>
  <request method="setup" request-data="tick.sh"/>
  <request method="get" url="/now" result="now.json" content-type="application/json"/>
</towel>"#,
    )
    .unwrap();

    let providers = Providers::system();
    let sut = spawn_sut(providers.clone()).await;
    let expected = format!("{{\"now\": {}}}", CLOCK_SEED + 3 * CLOCK_STEP);

    for _ in 0..2 {
        let service = DeterminismServer::new().spawn(any_port()).await.unwrap();
        fs::write(dir.join("tick.sh"), clock_query_script(service.addr())).unwrap();
        let _redirection = providers.redirect(&service.base_url()).unwrap();

        let config = RunnerConfig {
            base_url: server_url("http://127.0.0.1", sut.port()).unwrap(),
            ..RunnerConfig::default()
        };
        let report = TestRunner::new(config).unwrap().run(dir).await.unwrap();

        assert_eq!(
            report.cases.iter().map(|c| c.outcome).collect::<Vec<_>>(),
            vec![Outcome::Setup, Outcome::Setup, Outcome::Fail]
        );
        assert_eq!(
            fs::read_to_string(staged_path(&dir.join("now.json"))).unwrap(),
            expected
        );
    }
}
