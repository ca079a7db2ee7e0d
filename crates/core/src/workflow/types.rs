//! Types for the ticket reconciliation workflow.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crm::{CrmError, ObjectId};

/// Payload posted by the automation platform when a contact event fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactEvent {
    pub object: EventObject,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventObject {
    pub object_id: ObjectId,
}

impl ContactEvent {
    pub fn for_contact(contact_id: u64) -> Self {
        Self {
            object: EventObject {
                object_id: ObjectId(contact_id),
            },
        }
    }

    pub fn contact_id(&self) -> ObjectId {
        self.object.object_id
    }
}

/// Completion payload returned to the automation platform.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowResponse {
    pub output_fields: serde_json::Map<String, serde_json::Value>,
}

/// Contact identifiers the workflow works with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedContact {
    pub contact_id: ObjectId,
    pub owner_id: Option<ObjectId>,
}

/// A contact's tickets split by open/closed stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketPartition {
    /// Open ticket ids, in search order (newest first).
    pub open_ids: Vec<ObjectId>,
    pub closed_count: usize,
}

impl TicketPartition {
    pub fn has_open_ticket(&self) -> bool {
        !self.open_ids.is_empty()
    }
}

/// The call engagement matched to the contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngagementMatch {
    pub engagement_id: ObjectId,
    pub voicemail_left: bool,
}

/// Why no ticket/engagement associations were sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// No recent call engagement involves the contact.
    NoCallEngagement,
    /// There were no open or created tickets to associate.
    NoTicketsToAssociate,
}

impl SkipReason {
    pub fn as_str(self) -> &'static str {
        match self {
            SkipReason::NoCallEngagement => "no_call_engagement",
            SkipReason::NoTicketsToAssociate => "no_tickets_to_associate",
        }
    }
}

/// Result of a completed workflow run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowOutcome {
    pub contact_id: ObjectId,
    /// Open tickets found before any ticket was created.
    pub open_ticket_ids: Vec<ObjectId>,
    pub closed_ticket_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engagement: Option<EngagementMatch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_ticket_id: Option<ObjectId>,
    /// Tickets associated with the engagement in the batch request.
    pub associated_ticket_ids: Vec<ObjectId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skipped: Option<SkipReason>,
}

/// Workflow stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStage {
    ContactLookup,
    TicketSearch,
    EngagementScan,
    TicketCreate,
    ContactAssociation,
    EngagementAssociation,
}

impl WorkflowStage {
    pub fn as_str(self) -> &'static str {
        match self {
            WorkflowStage::ContactLookup => "contact_lookup",
            WorkflowStage::TicketSearch => "ticket_search",
            WorkflowStage::EngagementScan => "engagement_scan",
            WorkflowStage::TicketCreate => "ticket_create",
            WorkflowStage::ContactAssociation => "contact_association",
            WorkflowStage::EngagementAssociation => "engagement_association",
        }
    }
}

/// Errors that can occur during a workflow run.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("contact lookup failed: {0}")]
    ContactLookup(#[source] CrmError),

    #[error("ticket search failed: {0}")]
    TicketSearch(#[source] CrmError),

    #[error("engagement scan failed: {0}")]
    EngagementScan(#[source] CrmError),

    #[error("ticket creation failed: {0}")]
    TicketCreate(#[source] CrmError),

    /// The ticket exists but is not linked to the contact.
    #[error("associating ticket {ticket_id} with contact failed: {source}")]
    ContactAssociation {
        ticket_id: ObjectId,
        #[source]
        source: CrmError,
    },

    #[error("batch engagement association failed: {0}")]
    EngagementAssociation(#[source] CrmError),
}

impl WorkflowError {
    pub fn stage(&self) -> WorkflowStage {
        match self {
            WorkflowError::ContactLookup(_) => WorkflowStage::ContactLookup,
            WorkflowError::TicketSearch(_) => WorkflowStage::TicketSearch,
            WorkflowError::EngagementScan(_) => WorkflowStage::EngagementScan,
            WorkflowError::TicketCreate(_) => WorkflowStage::TicketCreate,
            WorkflowError::ContactAssociation { .. } => WorkflowStage::ContactAssociation,
            WorkflowError::EngagementAssociation(_) => WorkflowStage::EngagementAssociation,
        }
    }

    /// Whether the host platform should retry the whole event.
    ///
    /// Contact lookup failures are always retried. A failed contact
    /// association is never retried: the ticket already exists unlinked and
    /// a rerun would create a duplicate.
    pub fn is_retryable(&self) -> bool {
        match self {
            WorkflowError::ContactLookup(_) => true,
            WorkflowError::ContactAssociation { .. } => false,
            WorkflowError::TicketSearch(e)
            | WorkflowError::EngagementScan(e)
            | WorkflowError::TicketCreate(e)
            | WorkflowError::EngagementAssociation(e) => e.is_retryable(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_contact_event_deserialization() {
        let event: ContactEvent = serde_json::from_value(json!({
            "callbackId": "ap-123",
            "origin": { "portalId": 1 },
            "object": { "objectId": 5101, "objectType": "CONTACT" },
            "inputFields": {}
        }))
        .unwrap();
        assert_eq!(event.contact_id(), ObjectId(5101));
    }

    #[test]
    fn test_contact_event_missing_object_fails() {
        let result: Result<ContactEvent, _> = serde_json::from_value(json!({ "objectId": 1 }));
        assert!(result.is_err());
    }

    #[test]
    fn test_workflow_response_shape() {
        let response = WorkflowResponse::default();
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({ "outputFields": {} })
        );
    }

    #[test]
    fn test_error_stage_and_retry_policy() {
        let lookup = WorkflowError::ContactLookup(CrmError::NotFound("contact 1".into()));
        assert_eq!(lookup.stage(), WorkflowStage::ContactLookup);
        assert!(lookup.is_retryable());

        let assoc = WorkflowError::ContactAssociation {
            ticket_id: ObjectId(9),
            source: CrmError::RateLimitExceeded,
        };
        assert_eq!(assoc.stage().as_str(), "contact_association");
        assert!(!assoc.is_retryable());
        assert!(assoc.to_string().contains("ticket 9"));

        let batch = WorkflowError::EngagementAssociation(CrmError::RateLimitExceeded);
        assert!(batch.is_retryable());

        let create = WorkflowError::TicketCreate(CrmError::ApiError {
            status: 400,
            message: "invalid owner".into(),
        });
        assert!(!create.is_retryable());
    }

    #[test]
    fn test_outcome_serialization_skips_empty_fields() {
        let outcome = WorkflowOutcome {
            contact_id: ObjectId(1),
            open_ticket_ids: vec![],
            closed_ticket_count: 0,
            engagement: None,
            created_ticket_id: None,
            associated_ticket_ids: vec![],
            skipped: Some(SkipReason::NoCallEngagement),
        };
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["skipped"], "no_call_engagement");
        assert!(value.get("engagement").is_none());
        assert!(value.get("created_ticket_id").is_none());
    }
}
