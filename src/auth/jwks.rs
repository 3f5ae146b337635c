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

//! Trust material refresher.
//!
//! A single background task fetches the identity provider's discovery
//! document, follows its `jwks_uri`, and publishes every usable RS256 key as
//! one immutable [`KeySet`]. Verification reads the current snapshot through
//! [`TrustStore::snapshot`] without locking; a publish replaces the whole set.
//!
//! Failures only cost the current iteration. The next tick retries.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use jsonwebtoken::DecodingKey;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::core::errors::JwksError;

/// base64url, padding optional
const JWK_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

const DEFAULT_EXPONENT: u64 = 65537;
const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Immutable `kid -> key` map
#[derive(Clone, Default)]
pub struct KeySet {
    keys: HashMap<String, DecodingKey>,
}

impl KeySet {
    pub fn new(keys: HashMap<String, DecodingKey>) -> Self {
        Self { keys }
    }

    pub fn get(&self, kid: &str) -> Option<&DecodingKey> {
        self.keys.get(kid)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn kids(&self) -> Vec<&str> {
        let mut kids: Vec<&str> = self.keys.keys().map(String::as_str).collect();
        kids.sort_unstable();
        kids
    }

    /// Keep RS256 entries carrying both components; skip anything malformed.
    /// An RSA entry without `alg` is taken as RS256.
    pub fn from_jwks(document: &JwksDocument) -> Self {
        let mut keys = HashMap::new();
        for jwk in &document.keys {
            if !jwk.is_rs256_signing_key() {
                continue;
            }
            let (Some(kid), Some(n), Some(e)) = (&jwk.kid, &jwk.n, &jwk.e) else {
                continue;
            };
            if n.is_empty() || e.is_empty() {
                continue;
            }
            match decode_rsa_key(n, e) {
                Ok(key) => {
                    keys.insert(kid.clone(), key);
                }
                Err(err) => {
                    tracing::warn!(kid = %kid, error = %err, "Skipping undecodable JWKS entry");
                }
            }
        }
        Self { keys }
    }
}

/// Publication point shared by the refresher and verification
#[derive(Clone)]
pub struct TrustStore {
    tx: Arc<watch::Sender<Arc<KeySet>>>,
}

impl Default for TrustStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TrustStore {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Arc::new(KeySet::default()));
        Self { tx: Arc::new(tx) }
    }

    /// Replace the current snapshot wholesale.
    pub fn publish(&self, keys: KeySet) {
        self.tx.send_replace(Arc::new(keys));
    }

    pub fn snapshot(&self) -> Arc<KeySet> {
        Arc::clone(&self.tx.borrow())
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<KeySet>> {
        self.tx.subscribe()
    }
}

#[derive(Debug, Deserialize)]
struct DiscoveryDocument {
    #[serde(default)]
    jwks_uri: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct JwksDocument {
    #[serde(default)]
    pub keys: Vec<Jwk>,
}

#[derive(Debug, Deserialize)]
pub struct Jwk {
    #[serde(default)]
    pub kid: Option<String>,
    #[serde(default)]
    pub kty: Option<String>,
    #[serde(default)]
    pub alg: Option<String>,
    #[serde(default)]
    pub n: Option<String>,
    #[serde(default)]
    pub e: Option<String>,
    #[serde(default, rename = "use")]
    pub key_use: Option<String>,
}

impl Jwk {
    fn is_rs256_signing_key(&self) -> bool {
        if matches!(self.key_use.as_deref(), Some(u) if u != "sig") {
            return false;
        }
        match self.alg.as_deref() {
            Some(alg) => alg == "RS256",
            None => self.kty.as_deref() == Some("RSA"),
        }
    }
}

/// Public exponent of a JWK. The two usual encodings of 65537 short-circuit;
/// anything else is read as up to 8 big-endian bytes.
pub fn decode_exponent(e: &str) -> Result<u64, JwksError> {
    let e = e.trim();
    if e == "AQAB" || e == "AAEAAQ" {
        return Ok(DEFAULT_EXPONENT);
    }
    let raw = JWK_BASE64
        .decode(e)
        .map_err(|err| JwksError::Decode(format!("exponent: {}", err)))?;
    if raw.is_empty() || raw.len() > 8 {
        return Err(JwksError::Decode(format!("exponent length {}", raw.len())));
    }
    let mut buf = [0u8; 8];
    buf[8 - raw.len()..].copy_from_slice(&raw);
    match u64::from_be_bytes(buf) {
        0 => Err(JwksError::Decode("zero exponent".to_string())),
        value => Ok(value),
    }
}

pub fn decode_rsa_key(n: &str, e: &str) -> Result<DecodingKey, JwksError> {
    let modulus = JWK_BASE64
        .decode(n.trim())
        .map_err(|err| JwksError::Decode(format!("modulus: {}", err)))?;
    if modulus.is_empty() {
        return Err(JwksError::Decode("empty modulus".to_string()));
    }

    let exponent = decode_exponent(e)?.to_be_bytes();
    let first = exponent.iter().position(|b| *b != 0).unwrap_or(exponent.len() - 1);
    Ok(DecodingKey::from_rsa_raw_components(&modulus, &exponent[first..]))
}

/// `https://` is assumed when the domain carries no scheme.
pub fn discovery_url(identity_domain: &str, well_known_path: &str) -> Result<Url, JwksError> {
    let domain = identity_domain.trim().trim_end_matches('/');
    if domain.is_empty() {
        return Err(JwksError::InvalidUrl("identity domain is empty".to_string()));
    }
    let base = if domain.contains("://") {
        domain.to_string()
    } else {
        format!("https://{}", domain)
    };
    let path = well_known_path.trim();
    let joined = if path.starts_with('/') {
        format!("{}{}", base, path)
    } else {
        format!("{}/{}", base, path)
    };
    Url::parse(&joined).map_err(|e| JwksError::InvalidUrl(format!("{}: {}", joined, e)))
}

#[derive(Debug, Clone)]
pub struct RefresherSettings {
    pub identity_domain: String,
    pub well_known_path: String,
    pub interval: Duration,
    /// Per-request bound on the HTTP client
    pub fetch_timeout: Duration,
    /// Idle pooled connections kept per host between refreshes. Zero
    /// disables reuse so every fetch opens a fresh connection.
    pub max_idle_connections: usize,
}

impl RefresherSettings {
    /// Both fetches of one iteration must fit.
    pub fn iteration_timeout(&self) -> Duration {
        self.fetch_timeout * 2
    }
}

pub struct JwksRefresher {
    client: reqwest::Client,
    discovery_url: Url,
    settings: RefresherSettings,
    trust: TrustStore,
}

impl JwksRefresher {
    pub fn new(settings: RefresherSettings, trust: TrustStore) -> Result<Self, JwksError> {
        let discovery_url = discovery_url(&settings.identity_domain, &settings.well_known_path)?;
        let client = reqwest::Client::builder()
            .timeout(settings.fetch_timeout)
            .pool_max_idle_per_host(settings.max_idle_connections)
            .build()?;

        Ok(Self {
            client,
            discovery_url,
            settings,
            trust,
        })
    }

    pub fn discovery_url(&self) -> &Url {
        &self.discovery_url
    }

    /// One discovery + JWKS round trip. Returns the number of published keys.
    pub async fn refresh_once(&self) -> Result<usize, JwksError> {
        let discovery: DiscoveryDocument = self
            .client
            .get(self.discovery_url.clone())
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let jwks_uri = discovery
            .jwks_uri
            .filter(|uri| !uri.trim().is_empty())
            .ok_or(JwksError::MissingJwksUri)?;
        let jwks_uri = Url::parse(jwks_uri.trim())
            .map_err(|e| JwksError::InvalidUrl(format!("jwks_uri: {}", e)))?;

        let document: JwksDocument = self
            .client
            .get(jwks_uri)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let keys = KeySet::from_jwks(&document);
        let count = keys.len();
        self.trust.publish(keys);
        Ok(count)
    }

    async fn iterate(&self) {
        let limit = self.settings.iteration_timeout();
        let outcome = match timeout(limit, self.refresh_once()).await {
            Ok(result) => result,
            Err(_) => Err(JwksError::Timeout(limit.as_secs())),
        };

        match outcome {
            Ok(count) => tracing::info!(
                url = %self.discovery_url,
                keys = count,
                "JWKS refreshed"
            ),
            Err(e) => tracing::warn!(
                url = %self.discovery_url,
                error = %e,
                "JWKS refresh failed, retrying next interval"
            ),
        }
    }

    /// Start the loop: one immediate run, then one per interval until
    /// `parent` (or the returned handle) is cancelled.
    pub fn spawn(self, parent: &CancellationToken) -> RefreshHandle {
        let token = parent.child_token();
        let loop_token = token.clone();
        let task = tokio::spawn(async move { self.run(loop_token).await });
        RefreshHandle { token, task }
    }

    async fn run(self, cancel: CancellationToken) {
        let period = self.settings.interval.max(MIN_INTERVAL);
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            url = %self.discovery_url,
            interval_secs = period.as_secs(),
            "JWKS refresher started"
        );

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        _ = self.iterate() => {}
                    }
                }
            }
        }

        tracing::info!("JWKS refresher stopped");
    }
}

/// Owner handle of a running refresher
pub struct RefreshHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl RefreshHandle {
    pub fn stop(&self) {
        self.token.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.task.is_finished()
    }

    /// Cancel and wait for the loop to exit.
    pub async fn shutdown(self) {
        self.token.cancel();
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "JWKS refresher task failed");
        }
    }
}
