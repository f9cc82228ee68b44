//! Run configuration
//!
//! Defaults, then an optional TOML file, then `LEXCHECK_*` environment
//! overrides, then command-line flags applied through the `with_*` builders.

use crate::error::ConfigError;
use lexcheck_record::{FieldPolicy, IdPolicy, RecordNormalizer};
use lexcheck_store::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Worker pool size override
pub const ENV_WORKERS: &str = "LEXCHECK_WORKERS";
/// Report path override
pub const ENV_REPORT: &str = "LEXCHECK_REPORT";
/// Output suffix override
pub const ENV_OUTPUT_SUFFIX: &str = "LEXCHECK_OUTPUT_SUFFIX";

/// lexcheck configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LexcheckConfig {
    /// Appended to the input stem for corrected datasets
    pub output_suffix: String,
    /// Directory for corrected datasets; next to the input when unset
    pub output_dir: Option<PathBuf>,
    /// Durable report destination
    pub report_path: PathBuf,
    /// Append-only log of index titles overwritten by title maintenance
    pub rollback_path: PathBuf,
    /// Concurrent verifications per dataset
    pub worker_pool_size: usize,
    /// Per-probe retry budget
    pub retry: RetryPolicy,
    /// Per-attempt probe timeout
    pub probe_timeout_ms: u64,
    /// Content store key prefix
    pub content_prefix: String,
    /// Identifier canonicalization policy
    pub id_policy: IdPolicy,
    /// What happens to a row with an invalid non-identifier field
    pub field_policy: FieldPolicy,
}

impl Default for LexcheckConfig {
    fn default() -> Self {
        Self {
            output_suffix: "_corrected".to_string(),
            output_dir: None,
            report_path: PathBuf::from("lexcheck-report.jsonl"),
            rollback_path: PathBuf::from("lexcheck-rollback.jsonl"),
            worker_pool_size: 8,
            retry: RetryPolicy::default(),
            probe_timeout_ms: 10_000,
            content_prefix: "txt".to_string(),
            id_policy: IdPolicy::Permissive,
            field_policy: FieldPolicy::Reject,
        }
    }
}

impl LexcheckConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a TOML file; missing keys keep their defaults
    ///
    /// # Errors
    /// Unreadable file or schema mismatch.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse from TOML text
    ///
    /// # Errors
    /// Schema mismatch.
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Overlay `LEXCHECK_*` variables from the process environment
    ///
    /// # Errors
    /// A variable that does not parse.
    pub fn apply_env(self) -> Result<Self, ConfigError> {
        self.apply_vars(|name| std::env::var(name).ok())
    }

    /// Overlay variables from `lookup`
    ///
    /// # Errors
    /// A variable that does not parse.
    pub fn apply_vars(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(workers) = lookup(ENV_WORKERS) {
            self.worker_pool_size = workers.trim().parse().map_err(|e| ConfigError::Env {
                name: ENV_WORKERS,
                message: format!("{workers:?}: {e}"),
            })?;
        }
        if let Some(report) = lookup(ENV_REPORT) {
            self.report_path = PathBuf::from(report);
        }
        if let Some(suffix) = lookup(ENV_OUTPUT_SUFFIX) {
            self.output_suffix = suffix;
        }
        Ok(self)
    }

    /// Reject settings the pipeline cannot run with
    ///
    /// # Errors
    /// First invalid setting found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_pool_size == 0 {
            return Err(invalid("worker_pool_size", "must be at least 1"));
        }
        if self.retry.max_attempts == 0 {
            return Err(invalid("retry.max_attempts", "must be at least 1"));
        }
        if self.output_suffix.is_empty() {
            return Err(invalid(
                "output_suffix",
                "must not be empty or outputs would replace their inputs",
            ));
        }
        if self.output_suffix.contains(|c: char| c == '/' || c == '\\') {
            return Err(invalid("output_suffix", "must not contain path separators"));
        }
        Ok(())
    }

    /// With output suffix
    #[inline]
    #[must_use]
    pub fn with_output_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.output_suffix = suffix.into();
        self
    }

    /// With output directory
    #[inline]
    #[must_use]
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    /// With report path
    #[inline]
    #[must_use]
    pub fn with_report_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.report_path = path.into();
        self
    }

    /// With rollback log path
    #[inline]
    #[must_use]
    pub fn with_rollback_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.rollback_path = path.into();
        self
    }

    /// With worker pool size
    #[inline]
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.worker_pool_size = workers;
        self
    }

    /// With retry policy
    #[inline]
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// With identifier policy
    #[inline]
    #[must_use]
    pub fn with_id_policy(mut self, policy: IdPolicy) -> Self {
        self.id_policy = policy;
        self
    }

    /// With field policy
    #[inline]
    #[must_use]
    pub fn with_field_policy(mut self, policy: FieldPolicy) -> Self {
        self.field_policy = policy;
        self
    }

    /// Probe timeout as a duration
    #[inline]
    #[must_use]
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    /// Normalizer for these policies
    #[inline]
    #[must_use]
    pub fn normalizer(&self) -> RecordNormalizer {
        RecordNormalizer::new(self.id_policy, self.field_policy)
    }
}

fn invalid(field: &'static str, message: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        message: message.to_string(),
    }
}
