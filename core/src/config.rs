//! Host-supplied client settings.
//!
//! Hosts keep endpoint settings as JSON next to their documents; every
//! field is optional and falls back to the same defaults as
//! [`Client::new`](crate::Client::new).

use serde::{Deserialize, Serialize};

use crate::client::DEFAULT_USER_AGENT;
use crate::error::{Result, WebError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub base_url: String,
    pub token: String,
    pub user_agent: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    pub follow_redirects: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_redirects: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json_root: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            token: String::new(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_ms: None,
            follow_redirects: true,
            max_redirects: None,
            json_root: None,
        }
    }
}

impl ClientConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| WebError::Deserialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Client;

    #[test]
    fn missing_fields_take_defaults() {
        let config = ClientConfig::from_json(r#"{"base_url":"http://localhost:3000"}"#).unwrap();
        assert_eq!(config.user_agent, "DynamoDS");
        assert!(config.follow_redirects);
        assert_eq!(config.timeout_ms, None);

        let client = Client::from_config(&config).unwrap();
        assert_eq!(client.max_redirects(), Some(1));
    }

    #[test]
    fn explicit_fields_are_read() {
        let config = ClientConfig::from_json(
            r#"{"base_url":"https://api.example.com","timeout_ms":2000,"follow_redirects":false,"json_root":"data"}"#,
        )
        .unwrap();
        assert_eq!(config.timeout_ms, Some(2000));
        assert!(!config.follow_redirects);
        assert_eq!(config.json_root.as_deref(), Some("data"));
    }

    #[test]
    fn malformed_json_is_a_deserialization_error() {
        let err = ClientConfig::from_json("{base_url:").unwrap_err();
        assert!(matches!(err, WebError::Deserialization(_)));
    }

    #[test]
    fn config_without_base_url_does_not_build_a_client() {
        let config = ClientConfig::default();
        assert!(matches!(Client::from_config(&config), Err(WebError::InvalidUrl { .. })));
    }
}
