//! Service configuration: name, version, stage, invocation target.

use std::fmt;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Deployment stage. `local` is a developer machine and naming-normalizes
/// to `dev` wherever a host name is derived.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Local,
    #[default]
    Dev,
    Prod,
}

impl Stage {
    /// Parse a stage string the way deploy tooling writes it; anything
    /// unrecognized is treated as `dev`.
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "prod" => Stage::Prod,
            "local" => Stage::Local,
            _ => Stage::Dev,
        }
    }

    pub fn is_prod(self) -> bool {
        matches!(self, Stage::Prod)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Local => "local",
            Stage::Dev => "dev",
            Stage::Prod => "prod",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of the running service, as used for addressing and the
/// `source` field of outbound contexts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Deployed service name, e.g. `lemon-hello-api`.
    pub service: String,
    pub version: String,
    pub stage: Stage,
    /// Invocation-target function name; `lambda` when unset.
    pub function: Option<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            service: "cirrus-api".to_string(),
            version: "0.1.0".to_string(),
            stage: Stage::Dev,
            function: None,
        }
    }
}

impl ServiceConfig {
    pub fn from_toml_str(text: &str) -> anyhow::Result<Self> {
        let config: ServiceConfig = toml::from_str(text)?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Read `CIRRUS_SERVICE` / `CIRRUS_VERSION` / `CIRRUS_STAGE` /
    /// `CIRRUS_FUNCTION`, falling back to defaults field by field.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            service: std::env::var("CIRRUS_SERVICE").unwrap_or(defaults.service),
            version: std::env::var("CIRRUS_VERSION").unwrap_or(defaults.version),
            stage: std::env::var("CIRRUS_STAGE")
                .map(|s| Stage::parse_lenient(&s))
                .unwrap_or(defaults.stage),
            function: std::env::var("CIRRUS_FUNCTION").ok().filter(|s| !s.is_empty()),
        }
    }

    /// Invocation-target name used in web host postfixes.
    pub fn function_name(&self) -> &str {
        self.function.as_deref().unwrap_or("lambda")
    }
}

/// Source of the effective configuration. The protocol service calls
/// `load` at most once per instance and memoizes the result.
#[async_trait]
pub trait ConfigLoader: Send + Sync {
    async fn load(&self) -> anyhow::Result<ServiceConfig>;
}

/// Loader over a fixed, already-known configuration.
#[derive(Debug, Clone)]
pub struct StaticLoader(pub ServiceConfig);

#[async_trait]
impl ConfigLoader for StaticLoader {
    async fn load(&self) -> anyhow::Result<ServiceConfig> {
        Ok(self.0.clone())
    }
}

/// Loader that reads the process environment on first use.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvLoader;

#[async_trait]
impl ConfigLoader for EnvLoader {
    async fn load(&self) -> anyhow::Result<ServiceConfig> {
        Ok(ServiceConfig::from_env())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full() {
        let toml_str = r#"
service = "lemon-hello-api"
version = "1.2.3"
stage = "prod"
function = "hello"
"#;
        let config = ServiceConfig::from_toml_str(toml_str).unwrap();
        assert_eq!(config.service, "lemon-hello-api");
        assert_eq!(config.version, "1.2.3");
        assert_eq!(config.stage, Stage::Prod);
        assert_eq!(config.function_name(), "hello");
    }

    #[test]
    fn test_parse_minimal() {
        let config = ServiceConfig::from_toml_str(r#"service = "lemon-todo-api""#).unwrap();
        assert_eq!(config.service, "lemon-todo-api");
        assert_eq!(config.stage, Stage::Dev);
        assert_eq!(config.function_name(), "lambda");
    }

    #[test]
    fn test_stage_lenient() {
        assert_eq!(Stage::parse_lenient("prod"), Stage::Prod);
        assert_eq!(Stage::parse_lenient("PROD "), Stage::Prod);
        assert_eq!(Stage::parse_lenient("local"), Stage::Local);
        assert_eq!(Stage::parse_lenient("staging"), Stage::Dev);
        assert_eq!(Stage::parse_lenient(""), Stage::Dev);
    }

    #[test]
    fn test_round_trip_toml() {
        let config = ServiceConfig {
            service: "lemon-metrics-sns".to_string(),
            version: "0.3.0".to_string(),
            stage: Stage::Local,
            function: None,
        };
        let text = toml::to_string(&config).unwrap();
        let back = ServiceConfig::from_toml_str(&text).unwrap();
        assert_eq!(back, config);
    }
}
