//! Testing utilities and mock implementations.
//!
//! # Example
//!
//! ```rust,ignore
//! use ticketsync_core::testing::{fixtures, MockCrmClient};
//!
//! let crm = MockCrmClient::new();
//! crm.add_contact(fixtures::contact(10, Some(77))).await;
//! crm.set_tickets(ObjectId(10), vec![fixtures::ticket(1, "4")]).await;
//! ```

mod mock_crm;

pub use mock_crm::{CrmOperation, MockCrmClient, RecordedCrmCall};

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::collections::HashMap;

    use crate::crm::{Contact, Engagement, NewTicket, ObjectId, TicketPriority, TicketSummary};
    use crate::workflow::WorkflowConfig;

    /// A contact exposing the default id and owner properties.
    pub fn contact(id: u64, owner_id: Option<u64>) -> Contact {
        let mut properties = HashMap::new();
        properties.insert("hs_object_id".to_string(), Some(id.to_string()));
        properties.insert(
            "hubspot_owner_id".to_string(),
            owner_id.map(|o| o.to_string()),
        );
        Contact {
            id: ObjectId(id),
            properties,
        }
    }

    /// A ticket search result in the given stage.
    pub fn ticket(id: u64, stage: &str) -> TicketSummary {
        TicketSummary {
            id: ObjectId(id),
            pipeline_stage: Some(stage.to_string()),
        }
    }

    /// A call engagement involving the given contacts.
    pub fn call_engagement(id: u64, body_preview: &str, contact_ids: &[u64]) -> Engagement {
        engagement(id, "CALL", body_preview, contact_ids)
    }

    pub fn engagement(
        id: u64,
        engagement_type: &str,
        body_preview: &str,
        contact_ids: &[u64],
    ) -> Engagement {
        Engagement {
            id: ObjectId(id),
            engagement_type: engagement_type.to_string(),
            body_preview: Some(body_preview.to_string()),
            contact_ids: contact_ids.iter().copied().map(ObjectId).collect(),
        }
    }

    /// The ticket the default workflow config creates.
    pub fn new_ticket(owner_id: Option<u64>) -> NewTicket {
        let config = WorkflowConfig::default();
        NewTicket {
            pipeline: config.support_pipeline,
            pipeline_stage: config.new_ticket_stage,
            priority: TicketPriority::Low,
            owner_id: owner_id.map(ObjectId),
            subject: config.new_ticket_subject,
        }
    }
}
