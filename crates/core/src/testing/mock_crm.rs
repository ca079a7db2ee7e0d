//! Mock CRM client for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::crm::{
    Association, AssociationType, Contact, CrmClient, CrmError, Engagement, NewTicket, ObjectId,
    TicketSummary,
};

/// CRM operations, used to target error injection and count calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrmOperation {
    GetContact,
    SearchTickets,
    RecentEngagements,
    CreateTicket,
    CreateAssociation,
    CreateAssociationsBatch,
}

/// A recorded CRM call for test assertions.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCrmCall {
    GetContact {
        contact_id: ObjectId,
        properties: Vec<String>,
    },
    SearchTickets {
        contact_id: ObjectId,
    },
    RecentEngagements,
    CreateTicket {
        ticket: NewTicket,
        assigned_id: ObjectId,
    },
    CreateAssociation {
        association: Association,
    },
    CreateAssociationsBatch {
        associations: Vec<Association>,
    },
}

impl RecordedCrmCall {
    pub fn operation(&self) -> CrmOperation {
        match self {
            RecordedCrmCall::GetContact { .. } => CrmOperation::GetContact,
            RecordedCrmCall::SearchTickets { .. } => CrmOperation::SearchTickets,
            RecordedCrmCall::RecentEngagements => CrmOperation::RecentEngagements,
            RecordedCrmCall::CreateTicket { .. } => CrmOperation::CreateTicket,
            RecordedCrmCall::CreateAssociation { .. } => CrmOperation::CreateAssociation,
            RecordedCrmCall::CreateAssociationsBatch { .. } => {
                CrmOperation::CreateAssociationsBatch
            }
        }
    }
}

/// Mock implementation of the CrmClient trait.
///
/// Provides controllable behavior for testing:
/// - Configurable contacts, per-contact tickets and recent engagements
/// - Created tickets get sequential ids starting at 9001
/// - Contact-to-ticket associations make the new ticket show up in later
///   ticket searches, like the real CRM
/// - Records every call for assertions
/// - One-shot error injection per operation
///
/// # Example
///
/// ```rust,ignore
/// use ticketsync_core::testing::{fixtures, MockCrmClient};
///
/// let crm = MockCrmClient::new();
/// crm.add_contact(fixtures::contact(10, Some(77))).await;
/// crm.set_engagements(vec![fixtures::call_engagement(500, "Voicemail", &[10])]).await;
/// ```
#[derive(Debug)]
pub struct MockCrmClient {
    contacts: Arc<RwLock<HashMap<ObjectId, Contact>>>,
    /// Tickets per contact, newest first.
    tickets: Arc<RwLock<HashMap<ObjectId, Vec<TicketSummary>>>>,
    engagements: Arc<RwLock<Vec<Engagement>>>,
    /// Tickets created through the mock, by id.
    created: Arc<RwLock<Vec<(ObjectId, NewTicket)>>>,
    next_ticket_id: Arc<RwLock<u64>>,
    calls: Arc<RwLock<Vec<RecordedCrmCall>>>,
    errors: Arc<RwLock<HashMap<CrmOperation, CrmError>>>,
    latency: Arc<RwLock<Duration>>,
}

impl Default for MockCrmClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockCrmClient {
    pub fn new() -> Self {
        Self {
            contacts: Arc::new(RwLock::new(HashMap::new())),
            tickets: Arc::new(RwLock::new(HashMap::new())),
            engagements: Arc::new(RwLock::new(Vec::new())),
            created: Arc::new(RwLock::new(Vec::new())),
            next_ticket_id: Arc::new(RwLock::new(9001)),
            calls: Arc::new(RwLock::new(Vec::new())),
            errors: Arc::new(RwLock::new(HashMap::new())),
            latency: Arc::new(RwLock::new(Duration::ZERO)),
        }
    }

    // =========================================================================
    // Data Configuration
    // =========================================================================

    pub async fn add_contact(&self, contact: Contact) {
        self.contacts.write().await.insert(contact.id, contact);
    }

    /// Set a contact's tickets (newest first).
    pub async fn set_tickets(&self, contact_id: ObjectId, tickets: Vec<TicketSummary>) {
        self.tickets.write().await.insert(contact_id, tickets);
    }

    /// Set the recent engagements, in the order the API returns them.
    pub async fn set_engagements(&self, engagements: Vec<Engagement>) {
        *self.engagements.write().await = engagements;
    }

    /// Delay every call, e.g. to observe a run while it is in flight.
    pub async fn set_latency(&self, latency: Duration) {
        *self.latency.write().await = latency;
    }

    // =========================================================================
    // Call Recording
    // =========================================================================

    pub async fn recorded_calls(&self) -> Vec<RecordedCrmCall> {
        self.calls.read().await.clone()
    }

    pub async fn call_count(&self, operation: CrmOperation) -> usize {
        self.calls
            .read()
            .await
            .iter()
            .filter(|c| c.operation() == operation)
            .count()
    }

    /// Tickets created so far, with their assigned ids.
    pub async fn created_tickets(&self) -> Vec<(ObjectId, NewTicket)> {
        self.created.read().await.clone()
    }

    /// Single association requests, in call order.
    pub async fn single_associations(&self) -> Vec<Association> {
        self.calls
            .read()
            .await
            .iter()
            .filter_map(|c| match c {
                RecordedCrmCall::CreateAssociation { association } => Some(association.clone()),
                _ => None,
            })
            .collect()
    }

    /// Batch association requests, in call order.
    pub async fn batch_requests(&self) -> Vec<Vec<Association>> {
        self.calls
            .read()
            .await
            .iter()
            .filter_map(|c| match c {
                RecordedCrmCall::CreateAssociationsBatch { associations } => {
                    Some(associations.clone())
                }
                _ => None,
            })
            .collect()
    }

    // =========================================================================
    // Error Injection
    // =========================================================================

    /// Make the next call of `operation` fail with `error`.
    pub async fn fail_next(&self, operation: CrmOperation, error: CrmError) {
        self.errors.write().await.insert(operation, error);
    }

    async fn enter(&self, operation: CrmOperation) -> Result<(), CrmError> {
        let latency = *self.latency.read().await;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        match self.errors.write().await.remove(&operation) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn record(&self, call: RecordedCrmCall) {
        self.calls.write().await.push(call);
    }
}

#[async_trait]
impl CrmClient for MockCrmClient {
    async fn get_contact(
        &self,
        contact_id: ObjectId,
        properties: &[String],
    ) -> Result<Contact, CrmError> {
        self.enter(CrmOperation::GetContact).await?;
        self.record(RecordedCrmCall::GetContact {
            contact_id,
            properties: properties.to_vec(),
        })
        .await;

        self.contacts
            .read()
            .await
            .get(&contact_id)
            .cloned()
            .ok_or_else(|| CrmError::NotFound(format!("contact {}", contact_id)))
    }

    async fn search_contact_tickets(
        &self,
        contact_id: ObjectId,
    ) -> Result<Vec<TicketSummary>, CrmError> {
        self.enter(CrmOperation::SearchTickets).await?;
        self.record(RecordedCrmCall::SearchTickets { contact_id }).await;

        Ok(self
            .tickets
            .read()
            .await
            .get(&contact_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn recent_engagements(&self) -> Result<Vec<Engagement>, CrmError> {
        self.enter(CrmOperation::RecentEngagements).await?;
        self.record(RecordedCrmCall::RecentEngagements).await;

        Ok(self.engagements.read().await.clone())
    }

    async fn create_ticket(&self, ticket: &NewTicket) -> Result<ObjectId, CrmError> {
        self.enter(CrmOperation::CreateTicket).await?;

        let assigned_id = {
            let mut next = self.next_ticket_id.write().await;
            let id = ObjectId(*next);
            *next += 1;
            id
        };
        self.record(RecordedCrmCall::CreateTicket {
            ticket: ticket.clone(),
            assigned_id,
        })
        .await;
        self.created
            .write()
            .await
            .push((assigned_id, ticket.clone()));

        Ok(assigned_id)
    }

    async fn create_association(&self, association: &Association) -> Result<(), CrmError> {
        self.enter(CrmOperation::CreateAssociation).await?;
        self.record(RecordedCrmCall::CreateAssociation {
            association: association.clone(),
        })
        .await;

        if association.kind() == Some(AssociationType::ContactToTicket) {
            let stage = self
                .created
                .read()
                .await
                .iter()
                .find(|(id, _)| *id == association.to_object_id)
                .map(|(_, t)| t.pipeline_stage.clone());
            self.tickets
                .write()
                .await
                .entry(association.from_object_id)
                .or_default()
                .insert(
                    0,
                    TicketSummary {
                        id: association.to_object_id,
                        pipeline_stage: stage,
                    },
                );
        }

        Ok(())
    }

    async fn create_associations_batch(
        &self,
        associations: &[Association],
    ) -> Result<(), CrmError> {
        self.enter(CrmOperation::CreateAssociationsBatch).await?;
        self.record(RecordedCrmCall::CreateAssociationsBatch {
            associations: associations.to_vec(),
        })
        .await;

        Ok(())
    }
}
