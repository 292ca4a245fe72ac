//! Agent options: the already-parsed values the core is parameterised by.

use anyhow::{bail, Result};
use std::path::PathBuf;
use std::time::Duration;

use crate::cli::Cli;

/// Default name of the nat chain holding the masquerade rules
pub const DEFAULT_MASQ_CHAIN: &str = "IP-MASQ-AGENT";

/// Directory scanned for configuration fragments
pub const DEFAULT_CONFIG_DIR: &str = "/etc/config/";

/// Fragments must start with this prefix to be read
pub const DEFAULT_CONFIG_FILE_PREFIX: &str = "ip-masq";

/// Default resync interval in seconds
pub const DEFAULT_RESYNC_INTERVAL_SECS: u64 = 60;

/// iptables rejects chain names longer than this
const MAX_CHAIN_NAME_LEN: usize = 28;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentOptions {
    /// Name of the nat chain for the masquerade rules
    pub masq_chain: String,

    /// Seed the default configuration with every IANA-reserved IPv4 range,
    /// not just RFC 1918
    pub nomasq_all_reserved_ranges: bool,

    /// Manage ip6tables as well, and accept IPv6 CIDRs
    pub enable_ipv6: bool,

    /// Sleep between two reconciliation cycles
    pub resync_interval: Duration,

    pub config_dir: PathBuf,

    pub config_file_prefix: String,
}

impl Default for AgentOptions {
    fn default() -> Self {
        Self {
            masq_chain: DEFAULT_MASQ_CHAIN.to_string(),
            nomasq_all_reserved_ranges: false,
            enable_ipv6: false,
            resync_interval: Duration::from_secs(DEFAULT_RESYNC_INTERVAL_SECS),
            config_dir: PathBuf::from(DEFAULT_CONFIG_DIR),
            config_file_prefix: DEFAULT_CONFIG_FILE_PREFIX.to_string(),
        }
    }
}

impl AgentOptions {
    /// Reject options the agent cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.masq_chain.is_empty() {
            bail!("Chain name cannot be empty");
        }

        if self.masq_chain.len() > MAX_CHAIN_NAME_LEN {
            bail!(
                "Invalid chain name '{}': must be at most {} characters",
                self.masq_chain,
                MAX_CHAIN_NAME_LEN
            );
        }

        if !self.masq_chain.chars().all(|c| c.is_ascii_graphic()) {
            bail!(
                "Invalid chain name '{}': only printable ASCII without whitespace allowed",
                self.masq_chain
            );
        }

        if self.resync_interval.is_zero() {
            bail!("Resync interval must be greater than zero");
        }

        Ok(())
    }
}

impl From<&Cli> for AgentOptions {
    fn from(cli: &Cli) -> Self {
        Self {
            masq_chain: cli.masq_chain.clone(),
            nomasq_all_reserved_ranges: cli.nomasq_all_reserved_ranges,
            enable_ipv6: cli.enable_ipv6,
            resync_interval: Duration::from_secs(cli.resync_interval),
            config_dir: cli.config_dir.clone(),
            config_file_prefix: cli.config_file_prefix.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_default_options() {
        let options = AgentOptions::default();
        assert_eq!(options.masq_chain, "IP-MASQ-AGENT");
        assert!(!options.nomasq_all_reserved_ranges);
        assert!(!options.enable_ipv6);
        assert_eq!(options.resync_interval, Duration::from_secs(60));
        assert_eq!(options.config_dir, PathBuf::from("/etc/config/"));
        assert_eq!(options.config_file_prefix, "ip-masq");
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_from_cli_defaults_match_default() {
        let cli = Cli::parse_from(["ip-masq-agent"]);
        assert_eq!(AgentOptions::from(&cli), AgentOptions::default());
    }

    #[test]
    fn test_from_cli_flags() {
        let cli = Cli::parse_from([
            "ip-masq-agent",
            "--masq-chain",
            "MY-CHAIN",
            "--nomasq-all-reserved-ranges",
            "--enable-ipv6",
            "--resync-interval",
            "5",
            "--config-dir",
            "/tmp/masq",
            "--config-file-prefix",
            "masq-",
        ]);
        let options = AgentOptions::from(&cli);
        assert_eq!(options.masq_chain, "MY-CHAIN");
        assert!(options.nomasq_all_reserved_ranges);
        assert!(options.enable_ipv6);
        assert_eq!(options.resync_interval, Duration::from_secs(5));
        assert_eq!(options.config_dir, PathBuf::from("/tmp/masq"));
        assert_eq!(options.config_file_prefix, "masq-");
    }

    #[test]
    fn test_validate_rejects_bad_chain_names() {
        for chain in ["", "A-CHAIN-NAME-THAT-IS-FAR-TOO-LONG", "MY CHAIN", "TAB\tCHAIN"] {
            let options = AgentOptions {
                masq_chain: chain.to_string(),
                ..Default::default()
            };
            assert!(options.validate().is_err(), "accepted {:?}", chain);
        }
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let options = AgentOptions {
            resync_interval: Duration::ZERO,
            ..Default::default()
        };
        let err = options.validate().unwrap_err();
        assert!(err.to_string().contains("Resync interval"));
    }
}
