//! CRM integration.
//!
//! The workflow talks to the CRM only through the [`CrmClient`] trait;
//! [`HubSpotClient`] is the production implementation.

mod hubspot;
mod types;

pub use hubspot::{CredentialMode, HubSpotClient, HubSpotConfig};
pub use types::*;

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur when talking to the CRM.
#[derive(Debug, Error)]
pub enum CrmError {
    /// Transport-level failure (connect, timeout, body read).
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// The vendor is throttling us.
    #[error("Rate limit exceeded, please wait before retrying")]
    RateLimitExceeded,

    /// Credential missing or rejected (401/403).
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Resource not found (404).
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// API returned an error.
    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    /// Failed to parse response.
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// A paged listing had more pages than the client may fetch.
    #[error("Incomplete result: {0}")]
    IncompleteResult(String),

    /// Client not configured (missing API key, etc.).
    #[error("Client not configured: {0}")]
    NotConfigured(String),
}

impl CrmError {
    /// Whether retrying the same request later could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            CrmError::HttpError(_) | CrmError::RateLimitExceeded => true,
            CrmError::ApiError { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Operations the reconciliation workflow needs from the CRM.
#[async_trait]
pub trait CrmClient: Send + Sync {
    /// Fetch a contact with the given properties.
    async fn get_contact(
        &self,
        contact_id: ObjectId,
        properties: &[String],
    ) -> Result<Contact, CrmError>;

    /// All tickets associated with a contact, newest first.
    async fn search_contact_tickets(
        &self,
        contact_id: ObjectId,
    ) -> Result<Vec<TicketSummary>, CrmError>;

    /// Recently modified engagements across the whole portal, in API order.
    async fn recent_engagements(&self) -> Result<Vec<Engagement>, CrmError>;

    /// Create a ticket and return its id.
    async fn create_ticket(&self, ticket: &NewTicket) -> Result<ObjectId, CrmError>;

    /// Create a single association.
    async fn create_association(&self, association: &Association) -> Result<(), CrmError>;

    /// Create many associations in one request.
    async fn create_associations_batch(
        &self,
        associations: &[Association],
    ) -> Result<(), CrmError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(CrmError::RateLimitExceeded.is_retryable());
        assert!(CrmError::ApiError {
            status: 502,
            message: "bad gateway".to_string()
        }
        .is_retryable());
        assert!(!CrmError::ApiError {
            status: 400,
            message: "bad request".to_string()
        }
        .is_retryable());
        assert!(!CrmError::NotFound("contact 1".to_string()).is_retryable());
        assert!(!CrmError::Unauthorized("expired".to_string()).is_retryable());
        assert!(!CrmError::IncompleteResult("too many pages".to_string()).is_retryable());
    }
}
