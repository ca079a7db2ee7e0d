//! Ticket reconciliation workflow.
//!
//! Runs once per contact event:
//! contact lookup -> ticket search -> engagement scan ->
//! (create ticket + link to contact) -> batch link tickets to engagement.
//!
//! Every stage is awaited in order and any CRM failure aborts the run with
//! a [`WorkflowError`] naming the stage.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::crm::{
    Association, AssociationType, Contact, CrmClient, Engagement, NewTicket, ObjectId,
    TicketSummary,
};
use crate::metrics::{
    ASSOCIATIONS_CREATED, ENGAGEMENTS_MATCHED, RUNS_SKIPPED, TICKETS_CREATED, WORKFLOW_DURATION,
    WORKFLOW_RUNS,
};

use super::config::WorkflowConfig;
use super::types::{
    ContactEvent, EngagementMatch, ResolvedContact, SkipReason, TicketPartition, WorkflowError,
    WorkflowOutcome,
};

/// Stateless decision procedure invoked per contact event.
pub struct TicketReconciliationWorkflow {
    crm: Arc<dyn CrmClient>,
    config: WorkflowConfig,
}

impl TicketReconciliationWorkflow {
    pub fn new(crm: Arc<dyn CrmClient>, config: WorkflowConfig) -> Self {
        Self { crm, config }
    }

    /// Run the workflow for one event, returning only after all writes resolve.
    pub async fn run(&self, event: &ContactEvent) -> Result<WorkflowOutcome, WorkflowError> {
        let start = Instant::now();
        let result = self.execute(event.contact_id()).await;

        let label = match &result {
            Ok(_) => "success",
            Err(e) => e.stage().as_str(),
        };
        WORKFLOW_RUNS.with_label_values(&[label]).inc();
        WORKFLOW_DURATION
            .with_label_values(&[label])
            .observe(start.elapsed().as_secs_f64());

        result
    }

    async fn execute(&self, object_id: ObjectId) -> Result<WorkflowOutcome, WorkflowError> {
        let contact = self.resolve_contact(object_id).await?;
        let contact_id = contact.contact_id;
        info!("Processing contact event for contact {}", contact_id);

        let tickets = self
            .crm
            .search_contact_tickets(contact_id)
            .await
            .map_err(WorkflowError::TicketSearch)?;
        let partition = partition_tickets(&tickets, &self.config.closed_stage);
        debug!(
            "Contact {} has {} open and {} closed tickets",
            contact_id,
            partition.open_ids.len(),
            partition.closed_count
        );

        let engagements = self
            .crm
            .recent_engagements()
            .await
            .map_err(WorkflowError::EngagementScan)?;
        let engagement =
            find_call_engagement(&engagements, contact_id, &self.config.voicemail_marker);
        match engagement {
            Some(m) => {
                debug!(
                    "Matched call engagement {} (voicemail: {})",
                    m.engagement_id, m.voicemail_left
                );
                ENGAGEMENTS_MATCHED
                    .with_label_values(&[if m.voicemail_left { "true" } else { "false" }])
                    .inc();
            }
            None => debug!(
                "No call engagement for contact {} among {} recent engagements",
                contact_id,
                engagements.len()
            ),
        }

        let voicemail_left = engagement.is_some_and(|m| m.voicemail_left);
        let mut ticket_ids = partition.open_ids.clone();
        let created_ticket_id =
            if should_create_ticket(voicemail_left, partition.has_open_ticket()) {
                let ticket_id = self.create_follow_up_ticket(&contact).await?;
                ticket_ids.push(ticket_id);
                Some(ticket_id)
            } else {
                None
            };

        let (associated_ticket_ids, skipped) = match engagement {
            None => (Vec::new(), Some(SkipReason::NoCallEngagement)),
            Some(_) if ticket_ids.is_empty() => {
                (Vec::new(), Some(SkipReason::NoTicketsToAssociate))
            }
            Some(m) => {
                self.associate_with_engagement(&ticket_ids, m.engagement_id)
                    .await?;
                (ticket_ids, None)
            }
        };

        if let Some(reason) = skipped {
            info!(
                "Skipping engagement associations for contact {}: {}",
                contact_id,
                reason.as_str()
            );
            RUNS_SKIPPED.with_label_values(&[reason.as_str()]).inc();
        }

        Ok(WorkflowOutcome {
            contact_id,
            open_ticket_ids: partition.open_ids,
            closed_ticket_count: partition.closed_count,
            engagement,
            created_ticket_id,
            associated_ticket_ids,
            skipped,
        })
    }

    async fn resolve_contact(&self, object_id: ObjectId) -> Result<ResolvedContact, WorkflowError> {
        let contact = self
            .crm
            .get_contact(object_id, &self.config.contact_properties())
            .await
            .map_err(WorkflowError::ContactLookup)?;

        Ok(resolve_contact_ids(&contact, &self.config))
    }

    async fn create_follow_up_ticket(
        &self,
        contact: &ResolvedContact,
    ) -> Result<ObjectId, WorkflowError> {
        let ticket = NewTicket {
            pipeline: self.config.support_pipeline.clone(),
            pipeline_stage: self.config.new_ticket_stage.clone(),
            priority: self.config.new_ticket_priority,
            owner_id: contact.owner_id,
            subject: self.config.new_ticket_subject.clone(),
        };

        info!(
            "Voicemail left and no open ticket; creating ticket for contact {}",
            contact.contact_id
        );
        let ticket_id = self
            .crm
            .create_ticket(&ticket)
            .await
            .map_err(WorkflowError::TicketCreate)?;
        TICKETS_CREATED.inc();

        let association = Association::new(
            AssociationType::ContactToTicket,
            contact.contact_id,
            ticket_id,
        );
        self.crm
            .create_association(&association)
            .await
            .map_err(|source| WorkflowError::ContactAssociation { ticket_id, source })?;
        ASSOCIATIONS_CREATED
            .with_label_values(&[AssociationType::ContactToTicket.as_str()])
            .inc();

        info!(
            "Created ticket {} and associated it with contact {}",
            ticket_id, contact.contact_id
        );
        Ok(ticket_id)
    }

    async fn associate_with_engagement(
        &self,
        ticket_ids: &[ObjectId],
        engagement_id: ObjectId,
    ) -> Result<(), WorkflowError> {
        let associations = build_engagement_associations(ticket_ids, engagement_id);
        debug!(
            "Associating tickets {:?} with engagement {}",
            ticket_ids, engagement_id
        );

        self.crm
            .create_associations_batch(&associations)
            .await
            .map_err(WorkflowError::EngagementAssociation)?;
        ASSOCIATIONS_CREATED
            .with_label_values(&[AssociationType::TicketToEngagement.as_str()])
            .inc_by(associations.len() as u64);

        info!(
            "Associated {} ticket(s) with engagement {}",
            associations.len(),
            engagement_id
        );
        Ok(())
    }
}

/// Read the contact and owner ids from a fetched contact.
///
/// The configured id property wins when it holds a valid id; otherwise the
/// record's own id is used. A missing or malformed owner yields `None`.
pub fn resolve_contact_ids(contact: &Contact, config: &WorkflowConfig) -> ResolvedContact {
    let contact_id = match contact.property(&config.contact_id_property) {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            warn!(
                "Contact {} has non-numeric {} {:?}; using record id",
                contact.id, config.contact_id_property, raw
            );
            contact.id
        }),
        None => contact.id,
    };

    let owner_id = contact
        .property(&config.owner_property)
        .and_then(|raw| raw.parse().ok());
    if owner_id.is_none() {
        warn!(
            "Contact {} has no usable {}; new tickets will be unowned",
            contact_id, config.owner_property
        );
    }

    ResolvedContact {
        contact_id,
        owner_id,
    }
}

/// Whether a ticket stage counts as closed.
///
/// Numeric stages compare by value so `"04"` matches `"4"`.
pub fn is_closed_stage(stage: &str, closed_stage: &str) -> bool {
    let stage = stage.trim();
    let closed_stage = closed_stage.trim();
    match (stage.parse::<i64>(), closed_stage.parse::<i64>()) {
        (Ok(a), Ok(b)) => a == b,
        _ => stage == closed_stage,
    }
}

/// Split tickets into open ids and a closed count.
///
/// A ticket without a stage is treated as open.
pub fn partition_tickets(tickets: &[TicketSummary], closed_stage: &str) -> TicketPartition {
    let mut partition = TicketPartition::default();
    for ticket in tickets {
        match ticket.pipeline_stage.as_deref() {
            Some(stage) if is_closed_stage(stage, closed_stage) => partition.closed_count += 1,
            _ => partition.open_ids.push(ticket.id),
        }
    }
    partition
}

/// First call engagement, in API order, that involves the contact.
pub fn find_call_engagement(
    engagements: &[Engagement],
    contact_id: ObjectId,
    voicemail_marker: &str,
) -> Option<EngagementMatch> {
    engagements
        .iter()
        .find(|e| e.is_call() && e.involves_contact(contact_id))
        .map(|e| EngagementMatch {
            engagement_id: e.id,
            voicemail_left: e
                .body_preview
                .as_deref()
                .is_some_and(|body| body.contains(voicemail_marker)),
        })
}

/// A ticket is created only for a voicemail when no open ticket exists.
pub fn should_create_ticket(voicemail_left: bool, has_open_ticket: bool) -> bool {
    voicemail_left && !has_open_ticket
}

/// One ticket-to-engagement association per ticket.
pub fn build_engagement_associations(
    ticket_ids: &[ObjectId],
    engagement_id: ObjectId,
) -> Vec<Association> {
    ticket_ids
        .iter()
        .map(|&ticket_id| {
            Association::new(AssociationType::TicketToEngagement, ticket_id, engagement_id)
        })
        .collect()
}
