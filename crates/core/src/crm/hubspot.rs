//! HubSpot CRM API client.
//!
//! Uses the v3 object APIs for contacts and tickets and the v1 APIs for
//! engagements and associations, matching what the workflow platform's
//! native call integration writes.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use super::types::{Association, Contact, Engagement, NewTicket, ObjectId, TicketSummary};
use super::{CrmClient, CrmError};
use crate::metrics::{record_crm_request, CRM_REQUEST_DURATION};

const DEFAULT_BASE_URL: &str = "https://api.hubapi.com";

/// How the API credential is attached to requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialMode {
    /// `Authorization: Bearer <token>` (private app tokens).
    #[default]
    Bearer,
    /// Legacy `?hapikey=<key>` query parameter.
    QueryParam,
}

/// HubSpot API client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubSpotConfig {
    /// API credential. When unset, read from the `api_key_env` variable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Environment variable holding the credential (default: `hapikey`).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default)]
    pub credential: CredentialMode,
    /// Base URL (default: https://api.hubapi.com).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
    /// Page size for the ticket search (max 100).
    #[serde(default = "default_search_page_size")]
    pub search_page_size: u32,
    /// Upper bound on ticket search pages fetched per contact.
    #[serde(default = "default_max_search_pages")]
    pub max_search_pages: u32,
    /// Number of recent engagements to scan (max 100).
    #[serde(default = "default_engagement_count")]
    pub engagement_count: u32,
}

fn default_api_key_env() -> String {
    "hapikey".to_string()
}

fn default_timeout() -> u32 {
    30
}

fn default_search_page_size() -> u32 {
    100
}

fn default_max_search_pages() -> u32 {
    10
}

fn default_engagement_count() -> u32 {
    100
}

impl Default for HubSpotConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_env: default_api_key_env(),
            credential: CredentialMode::default(),
            base_url: None,
            timeout_secs: default_timeout(),
            search_page_size: default_search_page_size(),
            max_search_pages: default_max_search_pages(),
            engagement_count: default_engagement_count(),
        }
    }
}

impl HubSpotConfig {
    /// Base URL without trailing slash.
    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
    }

    /// The configured credential, falling back to the environment.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var(&self.api_key_env).ok())
            .filter(|k| !k.trim().is_empty())
    }
}

/// HubSpot API client.
pub struct HubSpotClient {
    client: Client,
    base_url: String,
    api_key: String,
    credential: CredentialMode,
    search_page_size: u32,
    max_search_pages: u32,
    engagement_count: u32,
}

impl HubSpotClient {
    /// Create a new HubSpot client.
    pub fn new(config: HubSpotConfig) -> Result<Self, CrmError> {
        let api_key = config.resolve_api_key().ok_or_else(|| {
            CrmError::NotConfigured(format!(
                "HubSpot API key is required (set hubspot.api_key or ${})",
                config.api_key_env
            ))
        })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url().to_string(),
            api_key,
            credential: config.credential,
            search_page_size: config.search_page_size,
            max_search_pages: config.max_search_pages,
            engagement_count: config.engagement_count,
        })
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.credential {
            CredentialMode::Bearer => request.bearer_auth(&self.api_key),
            CredentialMode::QueryParam => request.query(&[("hapikey", &self.api_key)]),
        }
    }

    /// Send a request, timing it and mapping error statuses.
    async fn execute(
        &self,
        operation: &'static str,
        request: RequestBuilder,
        subject: &str,
    ) -> Result<Response, CrmError> {
        let timer = CRM_REQUEST_DURATION
            .with_label_values(&[operation])
            .start_timer();
        let result = match self.authorize(request).send().await {
            Ok(response) => check_status(response, subject).await,
            Err(e) => Err(CrmError::from(e)),
        };
        timer.observe_duration();
        record_crm_request(operation, result.is_ok());

        if let Err(ref e) = result {
            warn!("HubSpot {} failed: {}", operation, e);
        }
        result
    }

    async fn fetch_ticket_page(
        &self,
        contact_id: ObjectId,
        after: Option<&str>,
    ) -> Result<SearchResponse, CrmError> {
        let url = format!("{}/crm/v3/objects/tickets/search", self.base_url);

        let mut body = json!({
            "properties": ["hs_pipeline_stage"],
            "filterGroups": [{
                "filters": [{
                    "propertyName": "associations.contact",
                    "operator": "EQ",
                    "value": contact_id.to_string(),
                }]
            }],
            "sorts": [{
                "propertyName": "createdate",
                "direction": "DESCENDING",
            }],
            "limit": self.search_page_size,
        });
        if let Some(cursor) = after {
            body["after"] = json!(cursor);
        }

        let response = self
            .execute(
                "search_tickets",
                self.client.post(&url).json(&body),
                &format!("tickets for contact {}", contact_id),
            )
            .await?;

        response.json().await.map_err(|e| {
            CrmError::ParseError(format!("Failed to parse ticket search response: {}", e))
        })
    }
}

#[async_trait]
impl CrmClient for HubSpotClient {
    async fn get_contact(
        &self,
        contact_id: ObjectId,
        properties: &[String],
    ) -> Result<Contact, CrmError> {
        let url = format!("{}/crm/v3/objects/contacts/{}", self.base_url, contact_id);

        debug!("HubSpot get contact: id={}, properties={:?}", contact_id, properties);

        let response = self
            .execute(
                "get_contact",
                self.client
                    .get(&url)
                    .query(&[("properties", properties.join(","))]),
                &format!("contact {}", contact_id),
            )
            .await?;

        let record: ObjectRecord = response.json().await.map_err(|e| {
            CrmError::ParseError(format!("Failed to parse contact response: {}", e))
        })?;

        Ok(Contact {
            id: record.id,
            properties: record.properties,
        })
    }

    async fn search_contact_tickets(
        &self,
        contact_id: ObjectId,
    ) -> Result<Vec<TicketSummary>, CrmError> {
        let mut tickets = Vec::new();
        let mut after: Option<String> = None;

        for page in 0..self.max_search_pages {
            let response = self.fetch_ticket_page(contact_id, after.as_deref()).await?;
            debug!(
                "HubSpot ticket search: contact={}, page={}, results={}",
                contact_id,
                page,
                response.results.len()
            );

            tickets.extend(response.results.into_iter().map(TicketSummary::from));

            after = response.paging.and_then(|p| p.next).map(|n| n.after);
            if after.is_none() {
                return Ok(tickets);
            }
        }

        warn!(
            "Ticket search for contact {} exceeded {} pages ({} tickets seen)",
            contact_id,
            self.max_search_pages,
            tickets.len()
        );
        Err(CrmError::IncompleteResult(format!(
            "ticket search for contact {} exceeded {} pages",
            contact_id, self.max_search_pages
        )))
    }

    async fn recent_engagements(&self) -> Result<Vec<Engagement>, CrmError> {
        let url = format!(
            "{}/engagements/v1/engagements/recent/modified",
            self.base_url
        );

        debug!("HubSpot recent engagements: count={}", self.engagement_count);

        let response = self
            .execute(
                "recent_engagements",
                self.client
                    .get(&url)
                    .query(&[("count", self.engagement_count)]),
                "recent engagements",
            )
            .await?;

        let page: EngagementPage = response.json().await.map_err(|e| {
            CrmError::ParseError(format!("Failed to parse engagements response: {}", e))
        })?;

        Ok(page.results.into_iter().map(Engagement::from).collect())
    }

    async fn create_ticket(&self, ticket: &NewTicket) -> Result<ObjectId, CrmError> {
        let url = format!("{}/crm/v3/objects/tickets", self.base_url);

        debug!("HubSpot create ticket: {:?}", ticket);

        let body = json!({ "properties": ticket.to_properties() });
        let response = self
            .execute(
                "create_ticket",
                self.client.post(&url).json(&body),
                "new ticket",
            )
            .await?;

        let record: ObjectRecord = response.json().await.map_err(|e| {
            CrmError::ParseError(format!("Failed to parse created ticket: {}", e))
        })?;

        Ok(record.id)
    }

    async fn create_association(&self, association: &Association) -> Result<(), CrmError> {
        let url = format!("{}/crm-associations/v1/associations", self.base_url);

        debug!(
            "HubSpot associate: {} -> {} (definition {})",
            association.from_object_id, association.to_object_id, association.definition_id
        );

        self.execute(
            "create_association",
            self.client.put(&url).json(association),
            "association",
        )
        .await?;

        Ok(())
    }

    async fn create_associations_batch(
        &self,
        associations: &[Association],
    ) -> Result<(), CrmError> {
        let url = format!(
            "{}/crm-associations/v1/associations/create-batch",
            self.base_url
        );

        debug!("HubSpot batch associate: {} entries", associations.len());

        self.execute(
            "create_associations_batch",
            self.client.put(&url).json(associations),
            "association batch",
        )
        .await?;

        Ok(())
    }
}

/// Map non-success statuses to typed errors.
async fn check_status(response: Response, subject: &str) -> Result<Response, CrmError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(match status.as_u16() {
        401 | 403 => CrmError::Unauthorized(body),
        404 => CrmError::NotFound(subject.to_string()),
        429 => CrmError::RateLimitExceeded,
        code => CrmError::ApiError {
            status: code,
            message: body,
        },
    })
}

// ============================================================================
// HubSpot API Response Types (private)
// ============================================================================

#[derive(Debug, Deserialize)]
struct ObjectRecord {
    id: ObjectId,
    #[serde(default)]
    properties: HashMap<String, Option<String>>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<ObjectRecord>,
    #[serde(default)]
    paging: Option<Paging>,
}

#[derive(Debug, Deserialize)]
struct Paging {
    next: Option<NextPage>,
}

#[derive(Debug, Deserialize)]
struct NextPage {
    after: String,
}

#[derive(Debug, Deserialize)]
struct EngagementPage {
    #[serde(default)]
    results: Vec<EngagementResult>,
}

#[derive(Debug, Deserialize)]
struct EngagementResult {
    engagement: EngagementHeader,
    #[serde(default)]
    associations: EngagementAssociations,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EngagementHeader {
    id: ObjectId,
    #[serde(rename = "type")]
    engagement_type: String,
    #[serde(default)]
    body_preview: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EngagementAssociations {
    #[serde(default)]
    contact_ids: Vec<ObjectId>,
}

// ============================================================================
// Conversions
// ============================================================================

impl From<ObjectRecord> for TicketSummary {
    fn from(mut r: ObjectRecord) -> Self {
        Self {
            id: r.id,
            pipeline_stage: r.properties.remove("hs_pipeline_stage").flatten(),
        }
    }
}

impl From<EngagementResult> for Engagement {
    fn from(r: EngagementResult) -> Self {
        Self {
            id: r.engagement.id,
            engagement_type: r.engagement.engagement_type,
            body_preview: r.engagement.body_preview,
            contact_ids: r.associations.contact_ids,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engagement_result_conversion() {
        let raw = r#"{
            "results": [{
                "engagement": {
                    "id": 9001,
                    "type": "CALL",
                    "bodyPreview": "Voicemail left by caller",
                    "lastUpdated": 1700000000000
                },
                "associations": { "contactIds": [101, 102], "ticketIds": [] },
                "metadata": { "durationMilliseconds": 12000 }
            }, {
                "engagement": { "id": 9002, "type": "NOTE" },
                "associations": {}
            }],
            "hasMore": true,
            "offset": 1700000000000
        }"#;
        let page: EngagementPage = serde_json::from_str(raw).unwrap();
        let engagements: Vec<Engagement> =
            page.results.into_iter().map(Engagement::from).collect();

        assert_eq!(engagements.len(), 2);
        assert_eq!(engagements[0].id, ObjectId(9001));
        assert!(engagements[0].is_call());
        assert_eq!(engagements[0].contact_ids, vec![ObjectId(101), ObjectId(102)]);
        assert_eq!(
            engagements[0].body_preview.as_deref(),
            Some("Voicemail left by caller")
        );
        assert!(engagements[1].body_preview.is_none());
        assert!(engagements[1].contact_ids.is_empty());
    }

    #[test]
    fn test_ticket_search_conversion() {
        let raw = r#"{
            "total": 2,
            "results": [
                { "id": "11", "properties": { "hs_pipeline_stage": "4", "hs_object_id": "11" } },
                { "id": "12", "properties": { "hs_pipeline_stage": null } }
            ],
            "paging": { "next": { "after": "2", "link": "?after=2" } }
        }"#;
        let response: SearchResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(
            response.paging.and_then(|p| p.next).map(|n| n.after),
            Some("2".to_string())
        );

        let tickets: Vec<TicketSummary> =
            response.results.into_iter().map(TicketSummary::from).collect();
        assert_eq!(tickets[0].id, ObjectId(11));
        assert_eq!(tickets[0].pipeline_stage.as_deref(), Some("4"));
        assert_eq!(tickets[1].pipeline_stage, None);
    }

    #[test]
    fn test_config_base_url_and_key_resolution() {
        let config = HubSpotConfig {
            api_key: Some("pat-abc".to_string()),
            base_url: Some("http://localhost:9999/".to_string()),
            ..Default::default()
        };
        assert_eq!(config.base_url(), "http://localhost:9999");
        assert_eq!(config.resolve_api_key().as_deref(), Some("pat-abc"));

        let default = HubSpotConfig::default();
        assert_eq!(default.base_url(), "https://api.hubapi.com");
    }

    #[test]
    fn test_client_requires_api_key() {
        let config = HubSpotConfig {
            api_key: None,
            api_key_env: "TICKETSYNC_TEST_UNSET_HUBSPOT_KEY".to_string(),
            ..Default::default()
        };
        let result = HubSpotClient::new(config);
        assert!(matches!(result, Err(CrmError::NotConfigured(_))));
    }
}
