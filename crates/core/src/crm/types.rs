//! CRM object types shared by the workflow and the HubSpot client.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Engagement type the workflow cares about.
pub const CALL_ENGAGEMENT_TYPE: &str = "CALL";

/// Association category for vendor-defined association types.
pub const HUBSPOT_DEFINED: &str = "HUBSPOT_DEFINED";

/// Numeric identifier of a CRM object.
///
/// The v3 object APIs return ids as strings while the v1 engagement and
/// association APIs use plain numbers, so both forms are accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ObjectId(pub u64);

impl ObjectId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ObjectId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Num(u64),
            Str(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Num(n) => Ok(Self(n)),
            Raw::Str(s) => s
                .parse()
                .map_err(|_| serde::de::Error::custom(format!("invalid object id: {:?}", s))),
        }
    }
}

/// Vendor-defined association kinds produced by the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssociationType {
    /// Contact to ticket (definition 15).
    ContactToTicket,
    /// Ticket to engagement (definition 17).
    TicketToEngagement,
}

impl AssociationType {
    /// The vendor's association definition id.
    pub fn definition_id(self) -> u32 {
        match self {
            AssociationType::ContactToTicket => 15,
            AssociationType::TicketToEngagement => 17,
        }
    }

    /// Map a definition id back to a known association type.
    pub fn from_definition_id(id: u32) -> Option<Self> {
        match id {
            15 => Some(AssociationType::ContactToTicket),
            17 => Some(AssociationType::TicketToEngagement),
            _ => None,
        }
    }

    /// Stable label for logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            AssociationType::ContactToTicket => "contact_to_ticket",
            AssociationType::TicketToEngagement => "ticket_to_engagement",
        }
    }
}

/// A directed association between two CRM objects, in the v1 wire shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Association {
    pub from_object_id: ObjectId,
    pub to_object_id: ObjectId,
    pub category: String,
    pub definition_id: u32,
}

impl Association {
    pub fn new(kind: AssociationType, from: ObjectId, to: ObjectId) -> Self {
        Self {
            from_object_id: from,
            to_object_id: to,
            category: HUBSPOT_DEFINED.to_string(),
            definition_id: kind.definition_id(),
        }
    }

    pub fn kind(&self) -> Option<AssociationType> {
        AssociationType::from_definition_id(self.definition_id)
    }
}

/// A contact record with the requested properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub id: ObjectId,
    #[serde(default)]
    pub properties: HashMap<String, Option<String>>,
}

impl Contact {
    /// Non-empty value of a property, if present.
    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties
            .get(name)
            .and_then(|v| v.as_deref())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }
}

/// Projection of a ticket returned by the contact ticket search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketSummary {
    pub id: ObjectId,
    /// `hs_pipeline_stage`; absent when the vendor returns null.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline_stage: Option<String>,
}

/// A recently modified engagement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Engagement {
    pub id: ObjectId,
    pub engagement_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_preview: Option<String>,
    #[serde(default)]
    pub contact_ids: Vec<ObjectId>,
}

impl Engagement {
    pub fn is_call(&self) -> bool {
        self.engagement_type == CALL_ENGAGEMENT_TYPE
    }

    pub fn involves_contact(&self, contact_id: ObjectId) -> bool {
        self.contact_ids.contains(&contact_id)
    }
}

/// Ticket priority as understood by the vendor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TicketPriority {
    Low,
    Medium,
    High,
}

impl TicketPriority {
    pub fn as_str(self) -> &'static str {
        match self {
            TicketPriority::Low => "LOW",
            TicketPriority::Medium => "MEDIUM",
            TicketPriority::High => "HIGH",
        }
    }
}

/// Properties of a ticket to be created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTicket {
    pub pipeline: String,
    pub pipeline_stage: String,
    pub priority: TicketPriority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<ObjectId>,
    pub subject: String,
}

impl NewTicket {
    /// Vendor property map for the create-ticket request body.
    pub fn to_properties(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut props = serde_json::Map::new();
        props.insert("hs_pipeline".into(), self.pipeline.clone().into());
        props.insert("hs_pipeline_stage".into(), self.pipeline_stage.clone().into());
        props.insert("hs_ticket_priority".into(), self.priority.as_str().into());
        if let Some(owner) = self.owner_id {
            props.insert("hubspot_owner_id".into(), owner.to_string().into());
        }
        props.insert("subject".into(), self.subject.clone().into());
        props
    }
}
