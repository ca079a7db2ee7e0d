use super::{
    types::{AuthMethod, Config},
    ConfigError,
};
use crate::workflow::is_closed_stage;

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Shared-secret auth has a secret
/// - Workflow pipeline/stage ids, subject and voicemail marker are set
/// - The new-ticket stage does not count as closed
/// - HubSpot timeouts and paging limits are positive
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(invalid("server.port cannot be 0"));
    }

    if config.auth.method == AuthMethod::SharedSecret
        && config.auth.secret.as_deref().map_or(true, str::is_empty)
    {
        return Err(invalid(
            "auth.secret must be set when using the shared_secret method",
        ));
    }

    let workflow = &config.workflow;
    for (name, value) in [
        ("workflow.support_pipeline", &workflow.support_pipeline),
        ("workflow.closed_stage", &workflow.closed_stage),
        ("workflow.new_ticket_stage", &workflow.new_ticket_stage),
        ("workflow.new_ticket_subject", &workflow.new_ticket_subject),
        ("workflow.voicemail_marker", &workflow.voicemail_marker),
        ("workflow.contact_id_property", &workflow.contact_id_property),
        ("workflow.owner_property", &workflow.owner_property),
    ] {
        if value.trim().is_empty() {
            return Err(invalid(&format!("{} cannot be empty", name)));
        }
    }

    if is_closed_stage(&workflow.new_ticket_stage, &workflow.closed_stage) {
        return Err(invalid(
            "workflow.new_ticket_stage must differ from workflow.closed_stage",
        ));
    }

    let hubspot = &config.hubspot;
    if hubspot.timeout_secs == 0 {
        return Err(invalid("hubspot.timeout_secs cannot be 0"));
    }
    if hubspot.search_page_size == 0 || hubspot.search_page_size > 100 {
        return Err(invalid("hubspot.search_page_size must be between 1 and 100"));
    }
    if hubspot.max_search_pages == 0 {
        return Err(invalid("hubspot.max_search_pages cannot be 0"));
    }
    if hubspot.engagement_count == 0 || hubspot.engagement_count > 100 {
        return Err(invalid("hubspot.engagement_count must be between 1 and 100"));
    }

    if config.dispatch.max_tracked_runs == 0 {
        return Err(invalid("dispatch.max_tracked_runs cannot be 0"));
    }
    if config.dispatch.shutdown_timeout_secs == 0 {
        return Err(invalid("dispatch.shutdown_timeout_secs cannot be 0"));
    }

    Ok(())
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::ValidationError(message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config_from_str;

    fn base_config() -> Config {
        load_config_from_str(
            r#"
[auth]
method = "none"

[hubspot]
api_key = "pat-test"
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(validate_config(&base_config()).is_ok());
    }

    #[test]
    fn test_validate_port_zero_fails() {
        let mut config = base_config();
        config.server.port = 0;
        let result = validate_config(&config);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_validate_shared_secret_requires_secret() {
        let mut config = base_config();
        config.auth.method = AuthMethod::SharedSecret;
        assert!(validate_config(&config).is_err());

        config.auth.secret = Some(String::new());
        assert!(validate_config(&config).is_err());

        config.auth.secret = Some("s3cret".to_string());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_new_stage_equal_to_closed_stage_fails() {
        let mut config = base_config();
        config.workflow.new_ticket_stage = config.workflow.closed_stage.clone();
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("new_ticket_stage"));
    }

    #[test]
    fn test_validate_new_stage_numerically_closed_fails() {
        let mut config = base_config();
        config.workflow.closed_stage = "4".to_string();
        config.workflow.new_ticket_stage = "04".to_string();
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("new_ticket_stage"));

        config.workflow.new_ticket_stage = " 4".to_string();
        assert!(validate_config(&config).is_err());

        config.workflow.new_ticket_stage = "1".to_string();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_empty_subject_fails() {
        let mut config = base_config();
        config.workflow.new_ticket_subject = "  ".to_string();
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("new_ticket_subject"));
    }

    #[test]
    fn test_validate_paging_limits() {
        let mut config = base_config();
        config.hubspot.search_page_size = 0;
        assert!(validate_config(&config).is_err());

        let mut config = base_config();
        config.hubspot.engagement_count = 250;
        assert!(validate_config(&config).is_err());

        let mut config = base_config();
        config.hubspot.max_search_pages = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_zero_tracked_runs_fails() {
        let mut config = base_config();
        config.dispatch.max_tracked_runs = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_zero_shutdown_timeout_fails() {
        let mut config = base_config();
        config.dispatch.shutdown_timeout_secs = 0;
        assert!(validate_config(&config).is_err());
    }
}
