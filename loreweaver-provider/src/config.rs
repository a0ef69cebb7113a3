//! Adapter configuration and its validation report.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// Configuration for one provider adapter.
///
/// `api_key` lives here for exactly as long as the adapter that owns
/// the request needs it. It is excluded from Debug output and must
/// never be logged or persisted.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Vendor API key, if the vendor requires one.
    pub api_key: Option<String>,
    /// Override for the vendor base URL.
    pub base_url: Option<String>,
    /// Per-request timeout.
    #[serde(default, with = "opt_secs")]
    pub timeout: Option<Duration>,
    /// Retry budget hint for the scheduler.
    pub max_retries: Option<u32>,
    /// Extra headers sent with every request.
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Provider-specific passthrough fields.
    #[serde(default)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .field("headers", &self.headers.keys().collect::<Vec<_>>())
            .finish()
    }
}

mod opt_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(v: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match v {
            Some(d) => s.serialize_some(&d.as_secs()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_secs))
    }
}

/// Result of validating a [`ProviderConfig`] against an adapter's
/// requirements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Whether the configuration is usable.
    pub valid: bool,
    /// Human-readable problems, empty when valid.
    pub errors: Vec<String>,
}

impl ValidationReport {
    /// A passing report.
    pub fn ok() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
        }
    }

    /// A failing report with the given problems.
    pub fn failed(errors: Vec<String>) -> Self {
        Self {
            valid: false,
            errors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_never_prints_the_key() {
        let cfg = ProviderConfig {
            api_key: Some("sk-super-secret".into()),
            ..ProviderConfig::default()
        };
        let debug = format!("{cfg:?}");
        assert!(!debug.contains("sk-super-secret"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn timeout_serializes_as_seconds() {
        let cfg = ProviderConfig {
            timeout: Some(Duration::from_secs(30)),
            ..ProviderConfig::default()
        };
        let json = serde_json::to_value(&cfg).unwrap();
        assert_eq!(json["timeout"], 30);
        let back: ProviderConfig = serde_json::from_value(json).unwrap();
        assert_eq!(back.timeout, Some(Duration::from_secs(30)));
    }
}
