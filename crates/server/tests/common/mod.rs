//! Common test utilities for in-process server testing with mocks.
//!
//! This module provides a test fixture that builds the real router with a
//! mock CRM injected, so webhook handling can be tested end to end without
//! talking to HubSpot.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use ticketsync_core::{
    config::{AuthConfig, ServerConfig},
    create_authenticator,
    testing::MockCrmClient,
    AuthMethod, Authenticator, CompletionMode, Config, DispatchConfig, HubSpotConfig,
    TicketReconciliationWorkflow, WorkflowConfig, WorkflowDispatcher,
};
use ticketsync_server::state::AppState;

/// Re-export fixtures for test convenience
pub use ticketsync_core::testing::fixtures;

/// Secret used when the fixture is built with shared-secret auth.
pub const TEST_SECRET: &str = "test-webhook-secret";

/// Test fixture for webhook testing with a mock CRM.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_contact_event() {
///     let fixture = TestFixture::new().await;
///     fixture.crm.add_contact(fixtures::contact(10, Some(77))).await;
///
///     let response = fixture.post("/api/v1/events/contact", json!({
///         "object": { "objectId": 10 }
///     })).await;
///
///     assert_eq!(response.status, 200);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Mock CRM - configure contacts, tickets and engagements
    pub crm: Arc<MockCrmClient>,
    /// Shared state, for inspecting the run tracker
    pub state: Arc<AppState>,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
    pub text: String,
}

/// Configuration for test fixture.
#[derive(Debug, Clone, Default)]
pub struct TestConfig {
    pub completion: CompletionMode,
    /// Require the shared secret on protected routes
    pub require_secret: bool,
}

impl TestConfig {
    pub fn background() -> Self {
        Self {
            completion: CompletionMode::Background,
            ..Default::default()
        }
    }

    pub fn with_secret() -> Self {
        Self {
            require_secret: true,
            ..Default::default()
        }
    }
}

impl TestFixture {
    /// Create a new test fixture in await mode without auth.
    pub async fn new() -> Self {
        Self::with_config(TestConfig::default()).await
    }

    /// Create a test fixture with custom configuration.
    pub async fn with_config(test_config: TestConfig) -> Self {
        let crm = Arc::new(MockCrmClient::new());

        let auth = if test_config.require_secret {
            AuthConfig {
                method: AuthMethod::SharedSecret,
                secret: Some(TEST_SECRET.to_string()),
            }
        } else {
            AuthConfig {
                method: AuthMethod::None,
                secret: None,
            }
        };

        let config = Config {
            auth,
            server: ServerConfig {
                host: std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
                port: 0, // Not used for in-process testing
            },
            hubspot: HubSpotConfig {
                api_key: Some("pat-secret-token".to_string()),
                ..Default::default()
            },
            workflow: WorkflowConfig::default(),
            dispatch: DispatchConfig {
                completion: test_config.completion,
                ..Default::default()
            },
        };

        let authenticator: Arc<dyn Authenticator> = Arc::from(
            create_authenticator(&config.auth).expect("Failed to create authenticator"),
        );
        let workflow = TicketReconciliationWorkflow::new(
            Arc::clone(&crm) as Arc<dyn ticketsync_core::CrmClient>,
            config.workflow.clone(),
        );
        let dispatcher = WorkflowDispatcher::new(workflow, &config.dispatch);

        let state = Arc::new(AppState::new(config, authenticator, dispatcher));
        let router = ticketsync_server::api::create_router(Arc::clone(&state));

        Self { router, crm, state }
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None, &[]).await
    }

    /// Send a GET request with extra headers.
    pub async fn get_with_headers(&self, path: &str, headers: &[(&str, &str)]) -> TestResponse {
        self.request("GET", path, None, headers).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body.to_string()), &[]).await
    }

    /// Send a POST request with JSON body and extra headers.
    pub async fn post_with_headers(
        &self,
        path: &str,
        body: Value,
        headers: &[(&str, &str)],
    ) -> TestResponse {
        self.request("POST", path, Some(body.to_string()), headers)
            .await
    }

    /// Send a POST request with raw string body (for testing malformed JSON).
    pub async fn post_raw(&self, path: &str, body: &str) -> TestResponse {
        self.request("POST", path, Some(body.to_string()), &[]).await
    }

    /// Post a contact event for the given object id.
    pub async fn post_event(&self, object_id: u64) -> TestResponse {
        self.post(
            "/api/v1/events/contact",
            serde_json::json!({ "object": { "objectId": object_id } }),
        )
        .await
    }

    /// Send a request to the test server.
    async fn request(
        &self,
        method: &str,
        path: &str,
        body: Option<String>,
        headers: &[(&str, &str)],
    ) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);
        for (name, value) in headers {
            request_builder = request_builder.header(*name, *value);
        }

        let body = match body {
            Some(raw) => {
                request_builder = request_builder.header("Content-Type", "application/json");
                Body::from(raw)
            }
            None => Body::empty(),
        };

        let request = request_builder.body(body).unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let headers = response.headers().clone();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let text = String::from_utf8_lossy(&body_bytes).to_string();
        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse {
            status,
            headers,
            body,
            text,
        }
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status, $response.status, $response.text
        );
    };
}
