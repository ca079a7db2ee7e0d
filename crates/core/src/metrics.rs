//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Workflow runs (outcome, duration, decisions)
//! - CRM writes (tickets created, associations created)
//! - CRM requests (latency and status per operation)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Workflow Metrics
// =============================================================================

/// Workflow runs total by result.
pub static WORKFLOW_RUNS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("ticketsync_workflow_runs_total", "Total workflow runs"),
        &["result"], // "success" or the failing stage name
    )
    .unwrap()
});

/// Workflow run duration in seconds.
pub static WORKFLOW_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "ticketsync_workflow_duration_seconds",
            "Duration of a complete workflow run",
        )
        .buckets(vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]),
        &["result"],
    )
    .unwrap()
});

/// Runs where a call engagement for the contact was found, by voicemail flag.
pub static ENGAGEMENTS_MATCHED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "ticketsync_engagements_matched_total",
            "Call engagements matched to the triggering contact",
        ),
        &["voicemail"], // "true", "false"
    )
    .unwrap()
});

/// Runs skipped before the batch association, by reason.
pub static RUNS_SKIPPED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "ticketsync_batch_skipped_total",
            "Runs that sent no engagement associations",
        ),
        &["reason"],
    )
    .unwrap()
});

// =============================================================================
// CRM Write Metrics
// =============================================================================

/// Tickets created by the workflow.
pub static TICKETS_CREATED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "ticketsync_tickets_created_total",
        "Total voicemail follow-up tickets created",
    )
    .unwrap()
});

/// Associations created by type.
pub static ASSOCIATIONS_CREATED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "ticketsync_associations_created_total",
            "Total associations created",
        ),
        &["type"], // "contact_to_ticket", "ticket_to_engagement"
    )
    .unwrap()
});

// =============================================================================
// CRM Request Metrics
// =============================================================================

/// CRM request duration.
pub static CRM_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "ticketsync_crm_request_duration_seconds",
            "Duration of CRM API calls",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["operation"],
    )
    .unwrap()
});

/// CRM requests total.
pub static CRM_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("ticketsync_crm_requests_total", "Total CRM API requests"),
        &["operation", "status"], // status: "success", "error"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Record the outcome of a CRM request.
pub fn record_crm_request(operation: &str, success: bool) {
    let status = if success { "success" } else { "error" };
    CRM_REQUESTS.with_label_values(&[operation, status]).inc();
}

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Workflow
        Box::new(WORKFLOW_RUNS.clone()),
        Box::new(WORKFLOW_DURATION.clone()),
        Box::new(ENGAGEMENTS_MATCHED.clone()),
        Box::new(RUNS_SKIPPED.clone()),
        // CRM writes
        Box::new(TICKETS_CREATED.clone()),
        Box::new(ASSOCIATIONS_CREATED.clone()),
        // CRM requests
        Box::new(CRM_REQUEST_DURATION.clone()),
        Box::new(CRM_REQUESTS.clone()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_metrics_registers_cleanly() {
        let registry = prometheus::Registry::new();
        for metric in all_metrics() {
            registry.register(metric).unwrap();
        }

        record_crm_request("get_contact", true);
        TICKETS_CREATED.inc();

        let names: Vec<String> = registry
            .gather()
            .iter()
            .map(|f| f.get_name().to_string())
            .collect();
        assert!(names.contains(&"ticketsync_crm_requests_total".to_string()));
        assert!(names.contains(&"ticketsync_tickets_created_total".to_string()));
    }
}
