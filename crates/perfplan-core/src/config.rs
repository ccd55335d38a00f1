//! Configuration management for perfplan
//!
//! Settings are layered, lowest priority first:
//! - Hardcoded defaults
//! - `./config/perfplan.{yaml,toml,json}`
//! - The file named by the `PERFPLAN_CONFIG` env var
//! - Environment variables (`PERFPLAN__TARGET__HOST=example.com`)
//!
//! Builder operations read these values when a node is attached, so a change
//! made after assembly never alters an already-built plan.

use config::{Config, ConfigError, Environment, File};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure for perfplan
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct PerfPlanConfig {
    #[serde(default)]
    pub target: TargetConfig,

    #[serde(default)]
    pub load: LoadConfig,

    #[serde(default)]
    pub assertions: AssertionConfig,

    #[serde(default)]
    pub headers: HeaderConfig,

    #[serde(default)]
    pub payloads: PayloadConfig,

    #[serde(default)]
    pub report: ReportConfig,

    #[serde(default)]
    pub engine: EngineConfig,
}

static GLOBAL: Lazy<PerfPlanConfig> = Lazy::new(|| match PerfPlanConfig::load() {
    Ok(config) => config,
    Err(err) => {
        tracing::warn!(error = %err, "falling back to default perfplan configuration");
        PerfPlanConfig::default()
    }
});

/// Process-wide configuration, loaded once on first access.
pub fn global() -> &'static PerfPlanConfig {
    &GLOBAL
}

impl PerfPlanConfig {
    /// Load configuration from all sources (see module docs for precedence).
    pub fn load() -> Result<Self, ConfigError> {
        let mut builder = Self::set_defaults(Config::builder())?;

        builder = builder.add_source(File::with_name("./config/perfplan").required(false));

        if let Ok(config_path) = std::env::var("PERFPLAN_CONFIG") {
            builder = builder.add_source(File::with_name(&config_path).required(false));
        }

        builder = builder.add_source(
            Environment::with_prefix("PERFPLAN")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("assertions.expected_status_codes")
                .try_parsing(true),
        );

        let config: PerfPlanConfig = builder.build()?.try_deserialize()?;
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a specific file path, on top of the defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config: PerfPlanConfig = Self::set_defaults(Config::builder())?
            .add_source(File::from(path.as_ref()))
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    fn set_defaults(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        builder
            // Target
            .set_default("target.protocol", "https")?
            .set_default("target.host", "httpbin.org")?
            .set_default("target.method", "GET")?
            // Load
            .set_default("load.threads", 1)?
            .set_default("load.iterations", 1)?
            .set_default("load.ramp_up_secs", 1)?
            // Assertions
            .set_default("assertions.expected_status_codes", vec!["200"])?
            .set_default("assertions.max_duration_ms", 3000)?
            // Headers
            .set_default("headers.content_type", "application/json")?
            .set_default("headers.accept", "application/json")?
            // Payloads
            .set_default("payloads.dir", "payloads")?
            // Report
            .set_default("report.path", "target/perfplan/report.md")?
            .set_default("report.format", "markdown")?
            .set_default("report.title", "Performance Test Report")?
            .set_default("report.name", "perfplan")?
            .set_default("report.theme", "standard")?
            .set_default("report.show_response_body", true)?
            .set_default("report.exclude_composites", true)?
            // Engine
            .set_default("engine.results_log", "logs/test_result.csv")?
            .set_default("engine.summariser_name", "summary")?
            .set_default("engine.response_logging", false)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target.protocol.trim().is_empty() {
            return Err(ConfigError::Message(
                "target.protocol must not be empty".to_string(),
            ));
        }

        if self.target.host.trim().is_empty() {
            return Err(ConfigError::Message("target.host must not be empty".to_string()));
        }

        if self.load.threads == 0 {
            return Err(ConfigError::Message("load.threads must be > 0".to_string()));
        }

        if self.load.iterations == 0 {
            return Err(ConfigError::Message("load.iterations must be > 0".to_string()));
        }

        if self.assertions.expected_status_codes.is_empty() {
            return Err(ConfigError::Message(
                "assertions.expected_status_codes must list at least one code".to_string(),
            ));
        }

        Ok(())
    }
}

/// Defaults for samplers that omit protocol, host or method
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TargetConfig {
    pub protocol: String,
    pub host: String,
    pub port: Option<u16>,
    pub method: String,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            protocol: "https".to_string(),
            host: "httpbin.org".to_string(),
            port: None,
            method: "GET".to_string(),
        }
    }
}

/// Default virtual-user settings for groups
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoadConfig {
    /// Virtual users per group
    pub threads: u32,

    /// Full walks of the group subtree per virtual user
    pub iterations: u32,

    /// Seconds over which a group's virtual users are started
    pub ramp_up_secs: u32,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            threads: 1,
            iterations: 1,
            ramp_up_secs: 1,
        }
    }
}

/// Defaults for config-driven assertions
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AssertionConfig {
    pub expected_status_codes: Vec<String>,
    pub max_duration_ms: u64,
}

impl Default for AssertionConfig {
    fn default() -> Self {
        Self {
            expected_status_codes: vec!["200".to_string()],
            max_duration_ms: 3000,
        }
    }
}

impl AssertionConfig {
    pub fn max_duration(&self) -> Duration {
        Duration::from_millis(self.max_duration_ms)
    }
}

/// Suite-wide headers attached to the plan root
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HeaderConfig {
    pub authorization: Option<String>,
    pub content_type: String,
    pub accept: String,
}

impl Default for HeaderConfig {
    fn default() -> Self {
        Self {
            authorization: None,
            content_type: "application/json".to_string(),
            accept: "application/json".to_string(),
        }
    }
}

impl HeaderConfig {
    /// Header pairs in the order they are attached to the root.
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::with_capacity(3);
        if let Some(token) = self.authorization.as_deref().filter(|t| !t.is_empty()) {
            pairs.push(("Authorization".to_string(), token.to_string()));
        }
        pairs.push(("Content-Type".to_string(), self.content_type.clone()));
        pairs.push(("Accept".to_string(), self.accept.clone()));
        pairs
    }
}

/// Location of request payload resources
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PayloadConfig {
    pub dir: PathBuf,
}

impl Default for PayloadConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("payloads"),
        }
    }
}

/// Persisted report format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Markdown,
    Json,
}

/// Visual theme recorded in the persisted report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Standard,
    Dark,
}

/// Report sink configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReportConfig {
    pub path: PathBuf,
    pub format: ReportFormat,
    pub title: String,
    pub name: String,
    pub theme: Theme,

    /// Include response bodies of successful requests in per-request rows
    pub show_response_body: bool,

    /// Replace composite events by their sub-events in the flattened report
    pub exclude_composites: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("target/perfplan/report.md"),
            format: ReportFormat::Markdown,
            title: "Performance Test Report".to_string(),
            name: "perfplan".to_string(),
            theme: Theme::Standard,
            show_response_body: true,
            exclude_composites: true,
        }
    }
}

/// Execution engine configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Engine home; a throwaway one is created when unset
    pub home: Option<PathBuf>,

    /// Raw per-request CSV log, recreated on every run
    pub results_log: PathBuf,

    /// Name used in the end-of-run summary line (empty disables it)
    pub summariser_name: String,

    /// Log every response at debug level
    pub response_logging: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            home: None,
            results_log: PathBuf::from("logs/test_result.csv"),
            summariser_name: "summary".to_string(),
            response_logging: false,
        }
    }
}
