//! Configuration loading and validation for the vault service.
//!
//! All values are read from environment variables at startup. The process will
//! exit with a clear error message if any variable is invalid. Key variables
//! are filtered out before the environment reaches the `config` builder; see
//! [`crate::keyring`] for how keys are loaded.

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::crypto::envelope::is_version_tag;
use crate::keyring::{CURRENT_KEY_VAR, PREVIOUS_KEY_PREFIX};

/// Where audit entries are delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditSinkKind {
    /// Bounded in-process buffer, queryable via `GET /audit`.
    Memory,
    /// Background writer emitting structured `tracing` events on target `audit`.
    Log,
}

/// Validated vault service configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Version tag assigned to `CURRENT_KEY`.
    #[serde(default = "default_current_key_version")]
    pub current_key_version: String,

    /// Port the HTTP server listens on.
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// OTLP/gRPC endpoint for span export. Spans are not exported when unset.
    #[serde(default)]
    pub otel_exporter_otlp_endpoint: Option<String>,

    /// `"memory"` or `"log"`.
    #[serde(default = "default_audit_sink")]
    pub audit_sink: String,

    /// Capacity of the in-memory audit buffer or the writer queue.
    #[serde(default = "default_audit_buffer_capacity")]
    pub audit_buffer_capacity: usize,

    /// Tracing log level (e.g. `"info"`, `"debug"`).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_current_key_version() -> String {
    "v1".into()
}
fn default_listen_port() -> u16 {
    8080
}
fn default_audit_sink() -> String {
    "memory".into()
}
fn default_audit_buffer_capacity() -> usize {
    10_000
}
fn default_log_level() -> String {
    "info".into()
}

impl Config {
    /// Load and validate configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if any variable cannot be parsed or fails validation.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(std::env::vars())
    }

    fn from_vars<I>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let env = config::Environment::default().source(Some(without_key_material(vars)));
        let cfg = config::Config::builder()
            .add_source(env)
            .build()
            .context("failed to build configuration from environment")?;

        let c: Config = cfg
            .try_deserialize()
            .context("failed to deserialise configuration")?;

        c.validate()?;
        Ok(c)
    }

    /// Parsed form of [`Config::audit_sink`].
    ///
    /// # Errors
    ///
    /// Returns an error for anything other than `memory` or `log`.
    pub fn audit_sink_kind(&self) -> Result<AuditSinkKind> {
        match self.audit_sink.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(AuditSinkKind::Memory),
            "log" => Ok(AuditSinkKind::Log),
            other => anyhow::bail!("AUDIT_SINK must be \"memory\" or \"log\", got {other:?}"),
        }
    }

    /// The OTLP endpoint, treating an empty value as unset.
    pub fn otlp_endpoint(&self) -> Option<&str> {
        self.otel_exporter_otlp_endpoint
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Validate all fields, returning a descriptive error on the first failure.
    fn validate(&self) -> Result<()> {
        if !is_version_tag(&self.current_key_version) {
            anyhow::bail!(
                "CURRENT_KEY_VERSION must look like v<digits>, got {:?}",
                self.current_key_version
            );
        }
        if self.audit_buffer_capacity == 0 {
            anyhow::bail!("AUDIT_BUFFER_CAPACITY must be > 0");
        }
        self.audit_sink_kind()?;
        Ok(())
    }
}

/// Environment variables minus `CURRENT_KEY` and `PREVIOUS_KEY_*`.
fn without_key_material<I>(vars: I) -> config::Map<String, String>
where
    I: IntoIterator<Item = (String, String)>,
{
    vars.into_iter()
        .filter(|(name, _)| name != CURRENT_KEY_VAR && !name.starts_with(PREVIOUS_KEY_PREFIX))
        .collect()
}
