//! CLI argument parsing with clap.

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "ip-masq-agent")]
#[command(author, version, about = "Keeps the nat masquerade chain in sync with the node's config")]
pub struct Cli {
    /// Name of the nat chain holding the masquerade rules
    #[arg(long, default_value = "IP-MASQ-AGENT")]
    pub masq_chain: String,

    /// Default to not masquerading all IPv4 reserved ranges, not just RFC 1918
    #[arg(long)]
    pub nomasq_all_reserved_ranges: bool,

    /// Also manage ip6tables and accept IPv6 CIDRs
    #[arg(long)]
    pub enable_ipv6: bool,

    /// Seconds between two reconciliation cycles
    #[arg(long, default_value_t = 60)]
    pub resync_interval: u64,

    /// Directory holding the configuration fragments
    #[arg(long, default_value = "/etc/config/")]
    pub config_dir: PathBuf,

    /// Only files starting with this prefix are read
    #[arg(long, default_value = "ip-masq")]
    pub config_file_prefix: String,

    /// Quiet mode (errors only)
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Verbose mode (debug output, including rendered rules)
    #[arg(short, long)]
    pub verbose: bool,
}
