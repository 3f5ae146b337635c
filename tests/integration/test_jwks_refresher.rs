// Copyright 2026 BadCompany
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Integration tests for the JWKS refresher against a mock identity provider

use mockito::{Mock, Server, ServerGuard};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use sentinel_identity::auth::{JwksRefresher, RefresherSettings, TrustStore};
use sentinel_identity::config::DEFAULT_WELL_KNOWN_PATH;
use sentinel_identity::core::context::RequestContext;
use sentinel_identity::core::errors::JwksError;

use crate::common::*;

fn settings(server: &ServerGuard) -> RefresherSettings {
    RefresherSettings {
        identity_domain: server.url(),
        well_known_path: DEFAULT_WELL_KNOWN_PATH.to_string(),
        interval: Duration::from_secs(1),
        fetch_timeout: Duration::from_secs(2),
        max_idle_connections: 1,
    }
}

async fn mock_discovery(server: &mut ServerGuard) -> Mock {
    let body = serde_json::json!({
        "issuer": server.url(),
        "jwks_uri": format!("{}/jwks.json", server.url()),
    })
    .to_string();
    server
        .mock("GET", DEFAULT_WELL_KNOWN_PATH)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body)
        .create_async()
        .await
}

async fn mock_jwks(server: &mut ServerGuard, status: usize, body: String) -> Mock {
    server
        .mock("GET", "/jwks.json")
        .with_status(status)
        .with_header("content-type", "application/json")
        .with_body(body)
        .create_async()
        .await
}

#[tokio::test]
async fn test_refresh_publishes_keys_used_by_verification() {
    let mut server = Server::new_async().await;
    let discovery = mock_discovery(&mut server).await;
    let jwks = mock_jwks(&mut server, 200, jwks_body("kid-1")).await;

    let h = Harness::new();
    let refresher = JwksRefresher::new(settings(&server), h.trust.clone()).unwrap();
    assert_eq!(refresher.refresh_once().await.unwrap(), 1);
    discovery.assert_async().await;
    jwks.assert_async().await;

    assert_eq!(h.trust.snapshot().kids(), vec!["kid-1"]);

    let token = sign_rs256(Some("kid-1"), &claims("user-42"));
    let resolved = h.resolver.verify(&RequestContext::new(), &token, None).await.unwrap();
    assert_eq!(resolved.user_id, "user-42");
    assert_eq!(resolved.roles, vec!["user".to_string()]);
}

#[tokio::test]
async fn test_failed_refresh_keeps_previous_snapshot() {
    let mut server = Server::new_async().await;
    let _discovery = mock_discovery(&mut server).await;
    let ok = mock_jwks(&mut server, 200, jwks_body("kid-1")).await;

    let trust = TrustStore::new();
    let refresher = JwksRefresher::new(settings(&server), trust.clone()).unwrap();
    refresher.refresh_once().await.unwrap();
    ok.remove_async().await;

    let _failing = mock_jwks(&mut server, 500, "{}".to_string()).await;
    assert!(matches!(refresher.refresh_once().await, Err(JwksError::Fetch(_))));
    assert_eq!(trust.snapshot().kids(), vec!["kid-1"]);
}

#[tokio::test]
async fn test_discovery_without_jwks_uri() {
    let mut server = Server::new_async().await;
    let _discovery = server
        .mock("GET", DEFAULT_WELL_KNOWN_PATH)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"issuer":"https://idp.example.com"}"#)
        .create_async()
        .await;

    let trust = TrustStore::new();
    let refresher = JwksRefresher::new(settings(&server), trust.clone()).unwrap();
    assert!(matches!(refresher.refresh_once().await, Err(JwksError::MissingJwksUri)));
    assert!(trust.snapshot().is_empty());
}

#[tokio::test]
async fn test_unusable_entries_are_skipped() {
    let mut server = Server::new_async().await;
    let _discovery = mock_discovery(&mut server).await;
    let body = serde_json::json!({
        "keys": [
            {"kid": "ec-1", "kty": "EC", "alg": "ES256", "crv": "P-256", "x": "AA", "y": "AA"},
            {"kid": "no-modulus", "kty": "RSA", "alg": "RS256", "e": "AQAB"},
            {"kid": "kid-1", "kty": "RSA", "alg": "RS256", "n": RSA_MODULUS.trim(), "e": "AQAB"},
        ]
    })
    .to_string();
    let _jwks = mock_jwks(&mut server, 200, body).await;

    let trust = TrustStore::new();
    let refresher = JwksRefresher::new(settings(&server), trust.clone()).unwrap();
    assert_eq!(refresher.refresh_once().await.unwrap(), 1);
    assert_eq!(trust.snapshot().kids(), vec!["kid-1"]);
}

#[tokio::test]
async fn test_spawned_loop_publishes_and_stops() {
    let mut server = Server::new_async().await;
    let _discovery = mock_discovery(&mut server).await;
    let _jwks = mock_jwks(&mut server, 200, jwks_body("kid-1")).await;

    let trust = TrustStore::new();
    let mut updates = trust.subscribe();
    let shutdown = CancellationToken::new();
    let handle = JwksRefresher::new(settings(&server), trust.clone())
        .unwrap()
        .spawn(&shutdown);

    tokio::time::timeout(Duration::from_secs(5), updates.changed())
        .await
        .expect("first refresh within timeout")
        .unwrap();
    assert_eq!(trust.snapshot().len(), 1);

    handle.shutdown().await;
}

#[tokio::test]
async fn test_parent_cancellation_stops_loop() {
    let mut server = Server::new_async().await;
    let _discovery = mock_discovery(&mut server).await;
    let _jwks = mock_jwks(&mut server, 200, jwks_body("kid-1")).await;

    let shutdown = CancellationToken::new();
    let handle = JwksRefresher::new(settings(&server), TrustStore::new())
        .unwrap()
        .spawn(&shutdown);
    shutdown.cancel();

    let stopped = async {
        while !handle.is_stopped() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    };
    tokio::time::timeout(Duration::from_secs(5), stopped)
        .await
        .expect("loop exits after parent cancellation");
}
