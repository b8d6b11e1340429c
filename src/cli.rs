//! CLI command definitions using clap.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use idclaim_core::OperatorConfig;

/// idclaim - IdentityClaim operator
#[derive(Parser, Debug)]
#[command(name = "idclaim")]
#[command(version)]
#[command(about = "Issues SPIFFE workload identities through cert-manager")]
#[command(
    long_about = "idclaim watches IdentityClaim resources, verifies that their selector matches running pods, and keeps a cert-manager Certificate carrying the claim's SPIFFE URI issued and renewed."
)]
pub struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true, env = "IDCLAIM_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log filter directives (overrides RUST_LOG and the config file)
    #[arg(long, global = true)]
    pub log_filter: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the controller against the current cluster
    Run {
        /// Trust domain of issued identities
        #[arg(long)]
        trust_domain: Option<String>,
    },

    /// Print the IdentityClaim CRD as YAML
    Crd,
}

impl Cli {
    /// Apply command-line overrides on top of the loaded configuration.
    pub fn apply_overrides(&self, config: &mut OperatorConfig) {
        if let Commands::Run {
            trust_domain: Some(trust_domain),
        } = &self.command
        {
            config.identity.trust_domain.clone_from(trust_domain);
        }
        if let Some(filter) = &self.log_filter {
            config.log.filter.clone_from(filter);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_with_overrides() {
        let cli = Cli::try_parse_from([
            "idclaim",
            "run",
            "--trust-domain",
            "prod.example",
            "--log-filter",
            "debug",
        ]);
        assert!(cli.is_ok());

        if let Ok(cli) = cli {
            let mut config = OperatorConfig::default();
            cli.apply_overrides(&mut config);
            assert_eq!(config.identity.trust_domain, "prod.example");
            assert_eq!(config.log.filter, "debug");
        }
    }

    #[test]
    fn test_parse_crd_with_config() {
        let cli = Cli::try_parse_from(["idclaim", "crd", "--config", "/etc/idclaim.toml"]);
        assert!(cli.is_ok());

        if let Ok(cli) = cli {
            assert!(matches!(cli.command, Commands::Crd));
            assert_eq!(cli.config, Some(PathBuf::from("/etc/idclaim.toml")));
        }
    }

    #[test]
    fn test_subcommand_required() {
        assert!(Cli::try_parse_from(["idclaim"]).is_err());
    }

    #[test]
    fn test_no_overrides_keeps_defaults() {
        let cli = Cli::try_parse_from(["idclaim", "run"]);
        assert!(cli.is_ok());

        if let Ok(cli) = cli {
            let mut config = OperatorConfig::default();
            cli.apply_overrides(&mut config);
            assert_eq!(config, OperatorConfig::default());
        }
    }
}
