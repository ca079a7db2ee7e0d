//! Workflow configuration.

use serde::{Deserialize, Serialize};

use crate::config::string_or_number;
use crate::crm::TicketPriority;

/// Settings for the ticket reconciliation workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Pipeline new tickets are created in.
    #[serde(
        default = "default_support_pipeline",
        deserialize_with = "string_or_number"
    )]
    pub support_pipeline: String,

    /// Stage that marks a ticket as closed. Every other stage counts as open.
    #[serde(default = "default_closed_stage", deserialize_with = "string_or_number")]
    pub closed_stage: String,

    /// Stage assigned to newly created tickets.
    #[serde(
        default = "default_new_ticket_stage",
        deserialize_with = "string_or_number"
    )]
    pub new_ticket_stage: String,

    /// Subject of newly created tickets.
    #[serde(default = "default_subject")]
    pub new_ticket_subject: String,

    #[serde(default = "default_priority")]
    pub new_ticket_priority: TicketPriority,

    /// Substring of a call's body preview that marks it as a voicemail.
    /// Matched case-sensitively.
    #[serde(default = "default_voicemail_marker")]
    pub voicemail_marker: String,

    /// Contact property holding the contact id.
    /// Falls back to the record id when the property is missing.
    #[serde(default = "default_contact_id_property")]
    pub contact_id_property: String,

    /// Contact property holding the owner id copied onto new tickets.
    #[serde(default = "default_owner_property")]
    pub owner_property: String,
}

fn default_support_pipeline() -> String {
    "0".to_string()
}

fn default_closed_stage() -> String {
    "4".to_string()
}

fn default_new_ticket_stage() -> String {
    "1".to_string()
}

fn default_subject() -> String {
    "New Deal CX Line".to_string()
}

fn default_priority() -> TicketPriority {
    TicketPriority::Low
}

fn default_voicemail_marker() -> String {
    "Voicemail".to_string()
}

fn default_contact_id_property() -> String {
    "hs_object_id".to_string()
}

fn default_owner_property() -> String {
    "hubspot_owner_id".to_string()
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            support_pipeline: default_support_pipeline(),
            closed_stage: default_closed_stage(),
            new_ticket_stage: default_new_ticket_stage(),
            new_ticket_subject: default_subject(),
            new_ticket_priority: default_priority(),
            voicemail_marker: default_voicemail_marker(),
            contact_id_property: default_contact_id_property(),
            owner_property: default_owner_property(),
        }
    }
}

impl WorkflowConfig {
    /// Contact properties the workflow reads.
    pub fn contact_properties(&self) -> Vec<String> {
        let mut props = vec![self.contact_id_property.clone()];
        if self.owner_property != self.contact_id_property {
            props.push(self.owner_property.clone());
        }
        props
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = WorkflowConfig::default();
        assert_eq!(config.support_pipeline, "0");
        assert_eq!(config.closed_stage, "4");
        assert_eq!(config.new_ticket_stage, "1");
        assert_eq!(config.new_ticket_priority, TicketPriority::Low);
        assert_eq!(config.voicemail_marker, "Voicemail");
    }

    #[test]
    fn test_contact_properties_requested() {
        let config = WorkflowConfig::default();
        assert_eq!(
            config.contact_properties(),
            vec!["hs_object_id".to_string(), "hubspot_owner_id".to_string()]
        );
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: WorkflowConfig = toml::from_str(
            r#"
closed_stage = 5
new_ticket_priority = "HIGH"
"#,
        )
        .unwrap();
        assert_eq!(config.closed_stage, "5");
        assert_eq!(config.new_ticket_stage, "1");
        assert_eq!(config.new_ticket_priority, TicketPriority::High);
    }
}
