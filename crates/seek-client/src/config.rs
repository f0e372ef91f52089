//! Gateway location and environment.

use crate::{ClientError, ClientResult};
use serde::{Deserialize, Serialize};

/// Placeholder substituted with the endpoint name in [`ApiConfig::url_template`].
pub const FUNCTION_NAME_PLACEHOLDER: &str = "{function_name}";

/// Environment in which endpoint names keep their case.
pub const LOCAL_DEV_ENV: &str = "local-dev";

pub const URL_TEMPLATE_VAR: &str = "SEEK_API_URL_TEMPLATE";
pub const APP_ENV_VAR: &str = "SEEK_APP_ENV";
pub const UPLOAD_URL_VAR: &str = "SEEK_UPLOAD_URL";

/// Where gateway functions and uploads live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiConfig {
    /// URL with a `{function_name}` placeholder, e.g.
    /// `https://us-central1-seek.cloudfunctions.net/{function_name}`.
    pub url_template: String,
    /// Deployment environment. Deployed functions are addressed by lowercase name.
    #[serde(default = "default_environment")]
    pub environment: String,
    /// Multipart upload endpoint, if uploads are available.
    #[serde(default)]
    pub upload_url: Option<String>,
}

fn default_environment() -> String {
    LOCAL_DEV_ENV.to_string()
}

impl ApiConfig {
    pub fn new(url_template: impl Into<String>, environment: impl Into<String>) -> Self {
        Self {
            url_template: url_template.into(),
            environment: environment.into(),
            upload_url: None,
        }
    }

    pub fn with_upload_url(mut self, upload_url: impl Into<String>) -> Self {
        self.upload_url = Some(upload_url.into());
        self
    }

    /// Read `SEEK_API_URL_TEMPLATE`, `SEEK_APP_ENV` and `SEEK_UPLOAD_URL`.
    pub fn from_env() -> ClientResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ClientResult<Self> {
        let url_template = lookup(URL_TEMPLATE_VAR)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ClientError::Config(format!("{URL_TEMPLATE_VAR} is not set")))?;
        let mut config = Self::new(
            url_template,
            lookup(APP_ENV_VAR).unwrap_or_else(default_environment),
        );
        config.upload_url = lookup(UPLOAD_URL_VAR).filter(|v| !v.trim().is_empty());
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ClientResult<()> {
        if !self.url_template.contains(FUNCTION_NAME_PLACEHOLDER) {
            return Err(ClientError::Config(format!(
                "URL template {} has no {FUNCTION_NAME_PLACEHOLDER} placeholder",
                self.url_template
            )));
        }
        Ok(())
    }

    pub fn is_local_dev(&self) -> bool {
        self.environment == LOCAL_DEV_ENV
    }

    /// URL of a gateway endpoint.
    pub fn endpoint_url(&self, endpoint: &str) -> String {
        let function_name = if self.is_local_dev() {
            endpoint.to_string()
        } else {
            endpoint.to_lowercase()
        };
        self.url_template.replace(FUNCTION_NAME_PLACEHOLDER, &function_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const TEMPLATE: &str = "https://gateway.example/{function_name}";

    #[test]
    fn test_endpoint_url_case() {
        let local = ApiConfig::new(TEMPLATE, LOCAL_DEV_ENV);
        assert_eq!(local.endpoint_url("putLessonPlan"), "https://gateway.example/putLessonPlan");

        let prod = ApiConfig::new(TEMPLATE, "production");
        assert_eq!(prod.endpoint_url("putLessonPlan"), "https://gateway.example/putlessonplan");
    }

    #[test]
    fn test_from_lookup() {
        let vars = HashMap::from([
            (URL_TEMPLATE_VAR, TEMPLATE),
            (APP_ENV_VAR, "staging"),
            (UPLOAD_URL_VAR, "https://gateway.example/upload"),
        ]);
        let config = ApiConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.environment, "staging");
        assert_eq!(config.upload_url.as_deref(), Some("https://gateway.example/upload"));
    }

    #[test]
    fn test_from_lookup_defaults_and_errors() {
        let only_template = ApiConfig::from_lookup(|k| (k == URL_TEMPLATE_VAR).then(|| TEMPLATE.to_string())).unwrap();
        assert!(only_template.is_local_dev());
        assert!(only_template.upload_url.is_none());

        assert!(matches!(ApiConfig::from_lookup(|_| None), Err(ClientError::Config(_))));
        let no_placeholder =
            ApiConfig::from_lookup(|k| (k == URL_TEMPLATE_VAR).then(|| "https://gateway.example/".to_string()));
        assert!(matches!(no_placeholder, Err(ClientError::Config(_))));
    }
}
