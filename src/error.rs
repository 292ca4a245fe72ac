//! Error types for ip-masq-agent.
//!
//! Every error here is local to a single reconciliation cycle: it is logged
//! and the daemon keeps the last configuration and rules that were applied.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Why a CIDR or a whole configuration was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("CIDR {cidr:?} could not be parsed, invalid CIDR address: {cidr}")]
    Parse { cidr: String },

    #[error("CIDR {cidr:?} is not aligned to a CIDR block, ip: {ip:?} network: {network:?}")]
    Alignment {
        cidr: String,
        ip: String,
        network: String,
    },

    #[error(
        "the daemon can only accept up to {max} CIDRs (excluding link-local), \
         but got {count} CIDRs (excluding link local)"
    )]
    TooManyRanges { count: usize, max: usize },

    #[error(
        "ipv6 is not enabled, but ipv6 cidr {cidr} provided. \
         Enable ipv6 using --enable-ipv6 agent flag"
    )]
    Ipv6Disabled { cidr: String },
}

/// Failure of one configuration load. No partial state survives it.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("failed to read config directory {path:?}, error: {error}")]
    DirectoryRead { path: PathBuf, error: io::Error },

    #[error("failed to read config file {name:?}, error: {error}")]
    FileRead { name: String, error: io::Error },

    #[error("failed to decode config file {name:?}, error: {reason}")]
    Decode { name: String, reason: String },

    #[error("config {name} is invalid: {error}")]
    InvalidFragment { name: String, error: ValidationError },

    #[error("config is invalid, error: {0}")]
    Validation(ValidationError),
}

impl LoadError {
    /// The validation failure behind this error, if any.
    pub fn validation_error(&self) -> Option<&ValidationError> {
        match self {
            LoadError::InvalidFragment { error, .. } => Some(error),
            LoadError::Validation(error) => Some(error),
            _ => None,
        }
    }
}

/// Failure reported by the rule applier.
#[derive(Error, Debug)]
pub enum ApplyError {
    #[error("failed to execute {program}: {reason}")]
    Exec { program: String, reason: String },

    #[error("failed to ensure that {table} chain {chain} exists: {stderr}")]
    EnsureChain {
        table: String,
        chain: String,
        stderr: String,
    },

    #[error("failed to ensure that {table} chain {from} jumps to {to}: {stderr}")]
    EnsureJump {
        table: String,
        from: String,
        to: String,
        stderr: String,
    },

    #[error("{program} failed: {stderr}")]
    Restore { program: String, stderr: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_message() {
        let err = ValidationError::Parse {
            cidr: "abcdefg".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "CIDR \"abcdefg\" could not be parsed, invalid CIDR address: abcdefg"
        );
    }

    #[test]
    fn test_alignment_error_message() {
        let err = ValidationError::Alignment {
            cidr: "10.0.0.1/8".to_string(),
            ip: "10.0.0.1".to_string(),
            network: "10.0.0.0/8".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "CIDR \"10.0.0.1/8\" is not aligned to a CIDR block, ip: \"10.0.0.1\" network: \"10.0.0.0/8\""
        );
    }

    #[test]
    fn test_load_error_exposes_validation_error() {
        let inner = ValidationError::Parse {
            cidr: String::new(),
        };
        let err = LoadError::InvalidFragment {
            name: "ip-masq-config-0".to_string(),
            error: inner.clone(),
        };
        assert_eq!(err.validation_error(), Some(&inner));
        assert!(err.to_string().starts_with("config ip-masq-config-0 is invalid: "));

        let err = LoadError::Decode {
            name: "ip-masq-config-0".to_string(),
            reason: "bad".to_string(),
        };
        assert!(err.validation_error().is_none());
    }

    #[test]
    fn test_directory_read_error_message() {
        let err = LoadError::DirectoryRead {
            path: PathBuf::from("/etc/config/"),
            error: io::Error::new(io::ErrorKind::NotFound, "missing"),
        };
        assert_eq!(
            err.to_string(),
            "failed to read config directory \"/etc/config/\", error: missing"
        );
    }
}
