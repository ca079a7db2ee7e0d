use serde::{Deserialize, Serialize};
use std::net::IpAddr;

use crate::crm::{CredentialMode, HubSpotConfig};
use crate::dispatch::{CompletionMode, DispatchConfig};
use crate::workflow::WorkflowConfig;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub auth: AuthConfig,
    #[serde(default)]
    pub server: ServerConfig,
    pub hubspot: HubSpotConfig,
    #[serde(default)]
    pub workflow: WorkflowConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

/// Inbound webhook authentication
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    pub method: AuthMethod,
    /// Shared secret the automation platform sends with each call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    None,
    SharedSecret,
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub auth: SanitizedAuthConfig,
    pub server: ServerConfig,
    pub hubspot: SanitizedHubSpotConfig,
    pub workflow: WorkflowConfig,
    pub dispatch: DispatchConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedAuthConfig {
    pub method: String,
    pub secret_configured: bool,
}

/// HubSpot settings with the credential hidden.
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedHubSpotConfig {
    pub base_url: String,
    pub credential: CredentialMode,
    pub api_key_env: String,
    pub api_key_configured: bool,
    pub timeout_secs: u32,
    pub search_page_size: u32,
    pub max_search_pages: u32,
    pub engagement_count: u32,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        let hubspot = &config.hubspot;
        Self {
            auth: SanitizedAuthConfig {
                method: match config.auth.method {
                    AuthMethod::None => "none".to_string(),
                    AuthMethod::SharedSecret => "shared_secret".to_string(),
                },
                secret_configured: config
                    .auth
                    .secret
                    .as_ref()
                    .is_some_and(|s| !s.is_empty()),
            },
            server: config.server.clone(),
            hubspot: SanitizedHubSpotConfig {
                base_url: hubspot.base_url().to_string(),
                credential: hubspot.credential,
                api_key_env: hubspot.api_key_env.clone(),
                api_key_configured: hubspot.resolve_api_key().is_some(),
                timeout_secs: hubspot.timeout_secs,
                search_page_size: hubspot.search_page_size,
                max_search_pages: hubspot.max_search_pages,
                engagement_count: hubspot.engagement_count,
            },
            workflow: config.workflow.clone(),
            dispatch: config.dispatch.clone(),
        }
    }
}

impl Config {
    /// Whether the webhook handler answers before the workflow finishes.
    pub fn is_background(&self) -> bool {
        self.dispatch.completion == CompletionMode::Background
    }
}
