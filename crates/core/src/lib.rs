pub mod auth;
pub mod config;
pub mod crm;
pub mod dispatch;
pub mod metrics;
pub mod testing;
pub mod workflow;

pub use auth::{
    create_authenticator, AuthError, AuthRequest, Authenticator, Identity, NoneAuthenticator,
};
pub use config::{
    load_config, load_config_from_str, validate_config, AuthMethod, Config, ConfigError,
    SanitizedConfig,
};
pub use crm::{
    Association, AssociationType, Contact, CredentialMode, CrmClient, CrmError, Engagement,
    HubSpotClient, HubSpotConfig, NewTicket, ObjectId, TicketPriority, TicketSummary,
};
pub use dispatch::{
    CompletionMode, DispatchConfig, Dispatched, RunRecord, RunStatus, RunTracker,
    WorkflowDispatcher,
};
pub use workflow::{
    ContactEvent, SkipReason, TicketReconciliationWorkflow, WorkflowConfig, WorkflowError,
    WorkflowOutcome, WorkflowResponse, WorkflowStage,
};
