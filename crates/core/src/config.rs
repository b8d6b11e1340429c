//! Operator configuration.
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! working configuration. Durations are written in humantime form
//! (`"30s"`, `"10m"`, `"8760h"`).

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Top-level operator configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OperatorConfig {
    /// Identity derivation and certificate defaults.
    #[serde(default)]
    pub identity: IdentityConfig,

    /// Requeue intervals.
    #[serde(default)]
    pub timing: TimingConfig,

    /// Controller runtime settings.
    #[serde(default)]
    pub controller: ControllerConfig,

    /// Logging settings.
    #[serde(default)]
    pub log: LogConfig,
}

impl OperatorConfig {
    /// Load configuration from an optional TOML file.
    ///
    /// A missing path yields the defaults. The result is validated.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid TOML, or
    /// fails validation.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .map_err(|e| Error::file_read_failed(path, e.to_string()))?;
                let config: Self = toml::from_str(&raw)
                    .map_err(|e| Error::toml_parse_failed(path, e.to_string()))?;
                tracing::debug!(path = %path.display(), "loaded configuration file");
                config
            }
            None => Self::default(),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns the first invalid field found.
    pub fn validate(&self) -> Result<()> {
        self.identity.validate()?;
        self.timing.validate()?;

        if self.controller.field_manager.trim().is_empty() {
            return Err(Error::invalid_config(
                "controller.field_manager",
                "must not be empty",
            ));
        }

        Ok(())
    }
}

/// Identity derivation and certificate defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IdentityConfig {
    /// Trust domain used in `spiffe://<trust-domain>/ns/<ns>/ic/<name>`.
    #[serde(default = "default_trust_domain")]
    pub trust_domain: String,

    /// Finalizer guarding claim deletion.
    #[serde(default = "default_finalizer")]
    pub finalizer: String,

    /// Suffix appended to the claim name to form the certificate name.
    #[serde(default = "default_certificate_suffix")]
    pub certificate_suffix: String,

    /// Certificate duration used when the claim does not set a TTL.
    #[serde(default = "default_ttl", with = "humantime_serde")]
    pub default_ttl: Duration,

    /// Lowest TTL admitted by the published CRD schema.
    #[serde(default = "default_min_ttl", with = "humantime_serde")]
    pub min_ttl: Duration,

    /// Highest TTL admitted by the published CRD schema.
    #[serde(default = "default_max_ttl", with = "humantime_serde")]
    pub max_ttl: Duration,

    /// Issuer used when the claim does not reference one.
    #[serde(default)]
    pub default_issuer: IssuerDefaults,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            trust_domain: default_trust_domain(),
            finalizer: default_finalizer(),
            certificate_suffix: default_certificate_suffix(),
            default_ttl: default_ttl(),
            min_ttl: default_min_ttl(),
            max_ttl: default_max_ttl(),
            default_issuer: IssuerDefaults::default(),
        }
    }
}

impl IdentityConfig {
    fn validate(&self) -> Result<()> {
        if self.trust_domain.trim().is_empty() {
            return Err(Error::invalid_config(
                "identity.trust_domain",
                "must not be empty",
            ));
        }
        if self.trust_domain.contains('/') || self.trust_domain.contains(':') {
            return Err(Error::invalid_config(
                "identity.trust_domain",
                "must be a bare host name without scheme or path",
            ));
        }
        if self.finalizer.trim().is_empty() {
            return Err(Error::invalid_config(
                "identity.finalizer",
                "must not be empty",
            ));
        }
        if self.min_ttl > self.max_ttl {
            return Err(Error::invalid_config(
                "identity.min_ttl",
                "must not exceed identity.max_ttl",
            ));
        }
        if self.default_ttl < self.min_ttl || self.default_ttl > self.max_ttl {
            return Err(Error::invalid_config(
                "identity.default_ttl",
                "must lie within [min_ttl, max_ttl]",
            ));
        }
        self.default_issuer.validate()
    }
}

/// Default issuer reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IssuerDefaults {
    #[serde(default = "default_issuer_name")]
    pub name: String,

    #[serde(default = "default_issuer_kind")]
    pub kind: String,

    #[serde(default = "default_issuer_group")]
    pub group: String,
}

impl Default for IssuerDefaults {
    fn default() -> Self {
        Self {
            name: default_issuer_name(),
            kind: default_issuer_kind(),
            group: default_issuer_group(),
        }
    }
}

impl IssuerDefaults {
    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::invalid_config(
                "identity.default_issuer.name",
                "must not be empty",
            ));
        }
        if self.kind.trim().is_empty() {
            return Err(Error::invalid_config(
                "identity.default_issuer.kind",
                "must not be empty",
            ));
        }
        Ok(())
    }
}

/// Requeue intervals handed back to the controller runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimingConfig {
    /// Delay before re-checking a claim whose selector matched nothing.
    #[serde(default = "default_no_pods_requeue", with = "humantime_serde")]
    pub no_pods_requeue: Duration,

    /// Delay between checks while the certificate is being issued.
    #[serde(default = "default_issuing_requeue", with = "humantime_serde")]
    pub issuing_requeue: Duration,

    /// How long before expiry a ready claim is re-checked.
    #[serde(default = "default_renew_before_expiry", with = "humantime_serde")]
    pub renew_before_expiry: Duration,

    /// Upper bound on the time between two checks of a ready claim.
    #[serde(default = "default_heartbeat", with = "humantime_serde")]
    pub heartbeat: Duration,

    /// Delay before retrying a failed pass.
    #[serde(default = "default_error_backoff", with = "humantime_serde")]
    pub error_backoff: Duration,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            no_pods_requeue: default_no_pods_requeue(),
            issuing_requeue: default_issuing_requeue(),
            renew_before_expiry: default_renew_before_expiry(),
            heartbeat: default_heartbeat(),
            error_backoff: default_error_backoff(),
        }
    }
}

impl TimingConfig {
    fn validate(&self) -> Result<()> {
        let intervals = [
            ("timing.no_pods_requeue", self.no_pods_requeue),
            ("timing.issuing_requeue", self.issuing_requeue),
            ("timing.heartbeat", self.heartbeat),
            ("timing.error_backoff", self.error_backoff),
        ];

        intervals
            .into_iter()
            .find(|(_, value)| value.is_zero())
            .map_or(Ok(()), |(field, _)| {
                Err(Error::invalid_config(field, "must be greater than zero"))
            })
    }
}

/// Controller runtime settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ControllerConfig {
    /// Field manager recorded on writes made by the operator.
    #[serde(default = "default_field_manager")]
    pub field_manager: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            field_manager: default_field_manager(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub filter: String,

    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            format: LogFormat::default(),
        }
    }
}

fn default_trust_domain() -> String {
    "cluster.local".to_string()
}

fn default_finalizer() -> String {
    "identity.cluster.local/finalizer".to_string()
}

fn default_certificate_suffix() -> String {
    "-identity".to_string()
}

const fn default_ttl() -> Duration {
    Duration::from_secs(60 * 60)
}

const fn default_min_ttl() -> Duration {
    Duration::from_secs(5 * 60)
}

const fn default_max_ttl() -> Duration {
    Duration::from_secs(8760 * 60 * 60)
}

fn default_issuer_name() -> String {
    "selfsigned-issuer".to_string()
}

fn default_issuer_kind() -> String {
    "ClusterIssuer".to_string()
}

fn default_issuer_group() -> String {
    "cert-manager.io".to_string()
}

const fn default_no_pods_requeue() -> Duration {
    Duration::from_secs(30)
}

const fn default_issuing_requeue() -> Duration {
    Duration::from_secs(5)
}

const fn default_renew_before_expiry() -> Duration {
    Duration::from_secs(10 * 60)
}

const fn default_heartbeat() -> Duration {
    Duration::from_secs(30 * 60)
}

const fn default_error_backoff() -> Duration {
    Duration::from_secs(30)
}

fn default_field_manager() -> String {
    "idclaim-controller".to_string()
}

fn default_log_filter() -> String {
    "info,kube=warn".to_string()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]

    use std::io::Write;

    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = OperatorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.identity.trust_domain, "cluster.local");
        assert_eq!(config.timing.no_pods_requeue, Duration::from_secs(30));
        assert_eq!(config.timing.issuing_requeue, Duration::from_secs(5));
        assert_eq!(config.timing.heartbeat, Duration::from_secs(1800));
        assert_eq!(config.identity.default_issuer.kind, "ClusterIssuer");
    }

    #[test]
    fn test_load_without_path_uses_defaults() {
        let config = OperatorConfig::load(None).unwrap();
        assert_eq!(config, OperatorConfig::default());
    }

    #[test]
    fn test_partial_toml_overrides() {
        let raw = r#"
            [identity]
            trust_domain = "prod.example.org"
            default_ttl = "2h"

            [identity.default_issuer]
            name = "vault-issuer"
            kind = "Issuer"

            [timing]
            heartbeat = "15m"

            [log]
            format = "json"
        "#;
        let config: OperatorConfig = toml::from_str(raw).unwrap();

        assert_eq!(config.identity.trust_domain, "prod.example.org");
        assert_eq!(config.identity.default_ttl, Duration::from_secs(7200));
        assert_eq!(config.identity.default_issuer.name, "vault-issuer");
        assert_eq!(config.identity.default_issuer.group, "cert-manager.io");
        assert_eq!(config.timing.heartbeat, Duration::from_secs(900));
        assert_eq!(config.timing.no_pods_requeue, Duration::from_secs(30));
        assert_eq!(config.log.format, LogFormat::Json);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[identity]\ntrust_domain = \"mesh.internal\"").unwrap();

        let config = OperatorConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.identity.trust_domain, "mesh.internal");
    }

    #[test]
    fn test_load_rejects_bad_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[identity\ntrust_domain = ").unwrap();

        let err = OperatorConfig::load(Some(file.path())).unwrap_err();
        assert!(matches!(err, Error::TomlParseFailed { .. }));
    }

    #[test]
    fn test_load_missing_file() {
        let err = OperatorConfig::load(Some(Path::new("/nonexistent/idclaim.toml"))).unwrap_err();
        assert!(matches!(err, Error::FileReadFailed { .. }));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let raw = "[identity]\ntrust_domian = \"typo\"\n";
        assert!(toml::from_str::<OperatorConfig>(raw).is_err());
    }

    #[test]
    fn test_empty_trust_domain_rejected() {
        let mut config = OperatorConfig::default();
        config.identity.trust_domain = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_trust_domain_with_scheme_rejected() {
        let mut config = OperatorConfig::default();
        config.identity.trust_domain = "spiffe://cluster.local".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_interval_rejected() {
        let mut config = OperatorConfig::default();
        config.timing.issuing_requeue = Duration::ZERO;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("timing.issuing_requeue"));
    }

    #[test]
    fn test_inverted_ttl_bounds_rejected() {
        let mut config = OperatorConfig::default();
        config.identity.min_ttl = Duration::from_secs(7200);
        config.identity.max_ttl = Duration::from_secs(3600);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_ttl_outside_bounds_rejected() {
        let mut config = OperatorConfig::default();
        config.identity.default_ttl = Duration::from_secs(60);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("identity.default_ttl"));
    }
}
