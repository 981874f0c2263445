//! In-process server harness.
//!
//! Provides `TestMeetServer`, which wires the real router from
//! `meet_access::routes` to an in-memory room registry and drives it with
//! `tower::ServiceExt::oneshot`. No sockets or database are needed.

use crate::keys::{SessionKeypair, RSA_SIGNING_KEY_PEM, TEST_APP_ID, TEST_KEY_ID};
use axum::body::Body;
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use meet_access::auth::SessionVerifier;
use meet_access::config::Config;
use meet_access::models::Meeting;
use meet_access::observability::metrics::init_metrics_recorder;
use meet_access::repositories::{InMemoryMeetingRegistry, MeetingSeed};
use meet_access::routes::{self, AppState};
use meet_access::services::token_issuer::TokenIssuer;
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use tower::ServiceExt;

/// Global metrics handle; the Prometheus recorder can only be installed
/// once per process.
static TEST_METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub fn get_test_metrics_handle() -> PrometheusHandle {
    TEST_METRICS_HANDLE
        .get_or_init(|| {
            init_metrics_recorder().unwrap_or_else(|_| {
                metrics_exporter_prometheus::PrometheusBuilder::new()
                    .build_recorder()
                    .handle()
            })
        })
        .clone()
}

/// Environment for a fully configured test server.
pub fn test_config_vars(session_keys: &SessionKeypair) -> HashMap<String, String> {
    HashMap::from([
        (
            "DATABASE_URL".to_string(),
            "postgresql://test/test".to_string(),
        ),
        ("BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
        ("SESSION_PUBLIC_KEY".to_string(), session_keys.public_key_pem()),
        ("JITSI_PRIVATE_KEY".to_string(), RSA_SIGNING_KEY_PEM.to_string()),
        ("JITSI_API_KEY_ID".to_string(), TEST_KEY_ID.to_string()),
        ("JITSI_APP_ID".to_string(), TEST_APP_ID.to_string()),
        ("DRAIN_SECONDS".to_string(), "0".to_string()),
    ])
}

/// A decoded response from the router.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// Parsed JSON body, or `Null` when the body is empty or not JSON.
    pub body: serde_json::Value,
    pub text: String,
}

impl TestResponse {
    /// `error.code` of a structured error body.
    pub fn error_code(&self) -> Option<&str> {
        self.body["error"]["code"].as_str()
    }
}

/// Router plus the in-memory registry behind it.
///
/// # Example
/// ```rust,ignore
/// let server = TestMeetServer::new()?;
/// let meeting = server.seed(MeetingSeed::new("test-app/standup", 1))?;
/// let token = server.session_keys().user_token(1, "Ada", "ada@example.com");
///
/// let response = server
///     .get(&format!("/api/v1/meetings/{}", meeting.id), Some(&token))
///     .await?;
/// assert_eq!(response.status, 200);
/// ```
pub struct TestMeetServer {
    router: Router,
    registry: Arc<InMemoryMeetingRegistry>,
    session_keys: SessionKeypair,
    config: Config,
}

impl TestMeetServer {
    /// A server with signing fully configured.
    pub fn new() -> Result<Self, anyhow::Error> {
        Self::with_overrides(&[])
    }

    /// A server whose environment is the default test environment with
    /// `overrides` applied. An empty value unsets optional variables.
    pub fn with_overrides(overrides: &[(&str, &str)]) -> Result<Self, anyhow::Error> {
        let session_keys = SessionKeypair::new(42);

        let mut vars = test_config_vars(&session_keys);
        for (key, value) in overrides {
            vars.insert((*key).to_string(), (*value).to_string());
        }

        let config = Config::from_vars(&vars)
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;

        let issuer = TokenIssuer::new(config.signing.clone())
            .map_err(|e| anyhow::anyhow!("Failed to create token issuer: {}", e))?;
        let verifier =
            SessionVerifier::from_pem(&config.session_public_key_pem, config.jwt_clock_skew_seconds)
                .map_err(|e| anyhow::anyhow!("Failed to create session verifier: {}", e))?;

        let registry = Arc::new(InMemoryMeetingRegistry::new());
        let state = Arc::new(AppState {
            registry: registry.clone(),
            config: config.clone(),
            issuer: Arc::new(issuer),
        });

        let router = routes::build_routes(state, Arc::new(verifier), get_test_metrics_handle());

        Ok(Self {
            router,
            registry,
            session_keys,
            config,
        })
    }

    pub fn registry(&self) -> &InMemoryMeetingRegistry {
        &self.registry
    }

    pub fn session_keys(&self) -> &SessionKeypair {
        &self.session_keys
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Insert a meeting into the registry.
    pub fn seed(&self, seed: MeetingSeed) -> Result<Meeting, anyhow::Error> {
        self.registry
            .insert_meeting(seed)
            .map_err(|e| anyhow::anyhow!("Failed to seed meeting: {}", e))
    }

    /// Send a request through a fresh clone of the router.
    pub async fn send(&self, request: Request<Body>) -> Result<TestResponse, anyhow::Error> {
        let response = self.router.clone().oneshot(request).await?;

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await?.to_bytes();
        let text = String::from_utf8_lossy(&bytes).into_owned();
        let body = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);

        Ok(TestResponse {
            status,
            headers,
            body,
            text,
        })
    }

    pub async fn request(
        &self,
        method: Method,
        path: &str,
        bearer: Option<&str>,
        body: Option<serde_json::Value>,
    ) -> Result<TestResponse, anyhow::Error> {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(token) = bearer {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }

        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&json)?))?,
            None => builder.body(Body::empty())?,
        };

        self.send(request).await
    }

    pub async fn get(&self, path: &str, bearer: Option<&str>) -> Result<TestResponse, anyhow::Error> {
        self.request(Method::GET, path, bearer, None).await
    }

    pub async fn post_json(
        &self,
        path: &str,
        bearer: Option<&str>,
        body: serde_json::Value,
    ) -> Result<TestResponse, anyhow::Error> {
        self.request(Method::POST, path, bearer, Some(body)).await
    }

    pub async fn patch_json(
        &self,
        path: &str,
        bearer: Option<&str>,
        body: serde_json::Value,
    ) -> Result<TestResponse, anyhow::Error> {
        self.request(Method::PATCH, path, bearer, Some(body)).await
    }
}
