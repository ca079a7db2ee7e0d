//! Voicemail follow-up ticket workflow.

mod config;
mod runner;
mod types;

pub use config::WorkflowConfig;
pub use runner::{
    build_engagement_associations, find_call_engagement, is_closed_stage, partition_tickets,
    resolve_contact_ids, should_create_ticket, TicketReconciliationWorkflow,
};
pub use types::*;
