//! Providers redirected to a live determinism service

use std::net::SocketAddr;

use towel_determinism::sequence::{CLOCK_SEED, CLOCK_STEP};
use towel_determinism::{DeterminismServer, Providers, SeededIds};

fn any_port() -> SocketAddr {
    "127.0.0.1:0".parse().unwrap()
}

#[tokio::test]
async fn redirected_providers_follow_service_sequences() {
    let service = DeterminismServer::new().spawn(any_port()).await.unwrap();
    let providers = Providers::system();
    let redirection = providers.redirect(&service.base_url()).unwrap();

    let first = providers.now().await.unwrap();
    let second = providers.now().await.unwrap();
    assert_eq!(first.timestamp() as u64, CLOCK_SEED + CLOCK_STEP);
    assert_eq!(second.timestamp() as u64, CLOCK_SEED + 2 * CLOCK_STEP);

    let mut expected = SeededIds::default();
    assert_eq!(providers.new_id().await.unwrap(), expected.advance());
    assert_eq!(providers.new_id().await.unwrap(), expected.advance());

    redirection.restore();
    let wall = providers.now().await.unwrap();
    assert!((wall.timestamp() as u64) < CLOCK_SEED);

    service.shutdown().await.unwrap();
}

#[tokio::test]
async fn fresh_services_hand_out_identical_values() {
    let mut runs = Vec::new();

    for _ in 0..2 {
        let service = DeterminismServer::new().spawn(any_port()).await.unwrap();
        let providers = Providers::system();
        let _redirection = providers.redirect(&service.base_url()).unwrap();

        let mut seen = Vec::new();
        for _ in 0..3 {
            seen.push(providers.now().await.unwrap().to_rfc3339());
            seen.push(providers.new_id().await.unwrap().to_string());
        }
        runs.push(seen);

        service.shutdown().await.unwrap();
    }

    assert_eq!(runs[0], runs[1]);
}

#[tokio::test]
async fn unreachable_service_surfaces_an_error() {
    let service = DeterminismServer::new().spawn(any_port()).await.unwrap();
    let base_url = service.base_url();
    service.shutdown().await.unwrap();

    let providers = Providers::system();
    let _redirection = providers.redirect(&base_url).unwrap();
    assert!(providers.now().await.is_err());
}
