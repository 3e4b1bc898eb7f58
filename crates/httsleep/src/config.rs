//! Declarative poll configuration, loaded from YAML or JSON.
//!
//! ```yaml
//! url: https://api.example.com/jobs/42
//! headers:
//!   Accept: application/json
//! until:
//!   - jsonpath:
//!       - expression: status
//!         value: SUCCESS
//! alarms:
//!   - status_code: 500
//!   - jsonpath:
//!       - expression: status
//!         value: FAILED
//! polling_interval: 5
//! max_retries: 20
//! ignore_exceptions: [connect, timeout]
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::condition::{normalize, Role};
use crate::error::{BuildError, TransportErrorKind};
use crate::poller::{Poller, PollerBuilder, DEFAULT_MAX_RETRIES};
use crate::request::{Auth, RequestSpec};

/// Errors loading a [`PollConfig`].
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error(transparent)]
    Invalid(#[from] BuildError),
}

/// A poll session described as data.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PollConfig {
    /// URL to poll. May be left out when supplied elsewhere (e.g. on the command line).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// HTTP method, `GET` when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<Auth>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,

    /// Success conditions: a criterion object or a list of them.
    #[serde(default)]
    pub until: Value,

    /// Alarm conditions: a criterion object or a list of them.
    #[serde(default, alias = "error")]
    pub alarms: Value,

    /// Seconds between attempts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub polling_interval: Option<u64>,

    /// Retry budget; `null` retries forever.
    #[serde(default = "default_max_retries")]
    pub max_retries: Option<u32>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ignore_exceptions: Vec<TransportErrorKind>,

    /// `false` disables TLS certificate verification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verify: Option<bool>,

    /// Request timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

fn default_max_retries() -> Option<u32> {
    Some(DEFAULT_MAX_RETRIES)
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            url: None,
            method: None,
            headers: BTreeMap::new(),
            auth: None,
            body: None,
            until: Value::Null,
            alarms: Value::Null,
            polling_interval: None,
            max_retries: default_max_retries(),
            ignore_exceptions: Vec::new(),
            verify: None,
            timeout: None,
        }
    }
}

impl PollConfig {
    /// Load and validate a config file. JSON files parse as YAML.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: PollConfig = serde_yaml::from_str(&contents)?;
        config.validate_conditions()?;
        Ok(config)
    }

    /// Check the condition lists without building a session.
    pub fn validate_conditions(&self) -> Result<(), BuildError> {
        if !self.until.is_null() {
            normalize(&self.until, Role::Until)?;
        }
        normalize(&self.alarms, Role::Alarms)?;
        Ok(())
    }

    /// Validate everything and build the session.
    pub fn build(&self) -> Result<Poller, BuildError> {
        self.builder()?.build()
    }

    /// A builder carrying every option of this config.
    pub fn builder(&self) -> Result<PollerBuilder, BuildError> {
        let url = self.url.as_deref().ok_or_else(|| BuildError::InvalidUrl {
            url: String::new(),
            reason: "no URL configured".to_string(),
        })?;

        let method = match &self.method {
            Some(method) => Method::from_bytes(method.trim().to_ascii_uppercase().as_bytes())
                .map_err(|_| BuildError::InvalidMethod(method.clone()))?,
            None => Method::GET,
        };

        let mut request = RequestSpec::new(method, url)?;
        for (name, value) in &self.headers {
            request = request.with_header(name, value)?;
        }
        if let Some(auth) = &self.auth {
            request = request.with_auth(auth.clone());
        }
        if let Some(body) = &self.body {
            request = request.with_body(body.clone());
        }

        let mut builder = Poller::builder(request)
            .alarms(&self.alarms)
            .max_retries(self.max_retries)
            .ignore_exceptions(self.ignore_exceptions.iter().copied());
        if !self.until.is_null() {
            builder = builder.until(&self.until);
        }
        if let Some(seconds) = self.polling_interval {
            builder = builder.polling_interval(Duration::from_secs(seconds));
        }
        if let Some(verify) = self.verify {
            builder = builder.verify(verify);
        }
        if let Some(seconds) = self.timeout {
            builder = builder.timeout(Duration::from_secs(seconds));
        }
        Ok(builder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConditionError;
    use std::io::Write;

    const YAML: &str = r#"
url: https://api.example.com/jobs/42
method: post
headers:
  Accept: application/json
auth:
  type: basic
  username: ci
  password: secret
body: '{"kick": true}'
until:
  - status_code: "200"
    jsonpath:
      - expression: status
        value: SUCCESS
alarms:
  - status_code: 500
polling_interval: 5
max_retries: 20
ignore_exceptions: [connect, timeout]
verify: false
"#;

    #[test]
    fn test_parse_full_config() {
        let config: PollConfig = serde_yaml::from_str(YAML).unwrap();
        assert_eq!(config.url.as_deref(), Some("https://api.example.com/jobs/42"));
        assert_eq!(config.max_retries, Some(20));
        assert_eq!(
            config.ignore_exceptions,
            vec![TransportErrorKind::Connect, TransportErrorKind::Timeout]
        );

        let session = config.build().unwrap();
        assert_eq!(session.request().method, Method::POST);
        assert_eq!(
            session.request().headers.get("accept").unwrap(),
            "application/json"
        );
        assert_eq!(session.request().auth, Some(Auth::basic("ci", "secret")));
        assert_eq!(session.polling_interval(), Duration::from_secs(5));
        assert_eq!(session.conditions().until()[0].status_code(), Some(200));
        assert_eq!(session.conditions().alarms()[0].status_code(), Some(500));
        assert_eq!(session.send_options().verify, Some(false));
        assert!(session
            .ignore_exceptions()
            .contains(&TransportErrorKind::Timeout));
    }

    #[test]
    fn test_max_retries_default_and_null() {
        let config: PollConfig = serde_yaml::from_str("url: http://x.test/").unwrap();
        assert_eq!(config.max_retries, Some(DEFAULT_MAX_RETRIES));

        let config: PollConfig =
            serde_yaml::from_str("url: http://x.test/\nmax_retries: null").unwrap();
        assert_eq!(config.max_retries, None);
    }

    #[test]
    fn test_error_alias_for_alarms() {
        let config: PollConfig =
            serde_yaml::from_str("url: http://x.test/\nerror:\n  status_code: 500").unwrap();
        assert!(config.alarms.is_object());
    }

    #[test]
    fn test_unknown_top_level_key() {
        assert!(serde_yaml::from_str::<PollConfig>("url: http://x.test/\nretries: 3").is_err());
    }

    #[test]
    fn test_from_file_validates_conditions() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "url: http://x.test/\nuntil:\n  lol: invalid").unwrap();
        let err = PollConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid(BuildError::Condition(ConditionError::InvalidKey { .. }))
        ));
    }

    #[test]
    fn test_from_file_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{"url": "http://x.test/", "until": {{"status_code": 204}}, "max_retries": null}}"#
        )
        .unwrap();
        let config = PollConfig::from_file(file.path()).unwrap();
        let session = config.build().unwrap();
        assert_eq!(session.max_retries(), None);
        assert_eq!(session.conditions().until()[0].status_code(), Some(204));
    }

    #[test]
    fn test_missing_url() {
        let config: PollConfig = serde_yaml::from_str("until: {status_code: 200}").unwrap();
        assert!(matches!(config.build(), Err(BuildError::InvalidUrl { .. })));
    }

    #[test]
    fn test_missing_until() {
        let config: PollConfig = serde_yaml::from_str("url: http://x.test/").unwrap();
        assert!(matches!(config.build(), Err(BuildError::MissingUntil)));
    }

    #[test]
    fn test_invalid_method() {
        let config: PollConfig =
            serde_yaml::from_str("url: http://x.test/\nmethod: 'GE T'\nuntil: {status_code: 200}")
                .unwrap();
        assert!(matches!(config.build(), Err(BuildError::InvalidMethod(_))));
    }
}
