//! Core types for the IdentityClaim operator.
//!
//! - [`config`]: operator configuration loaded from TOML with per-field defaults
//! - [`error`]: configuration errors

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![forbid(clippy::panic)]

pub mod config;
pub mod error;

pub use config::{
    ControllerConfig, IdentityConfig, IssuerDefaults, LogConfig, LogFormat, OperatorConfig,
    TimingConfig,
};
pub use error::{Error, Result};
