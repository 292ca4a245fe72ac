//! Renders a configuration into an `iptables-restore` script.

use ipnet::IpNet;
use std::fmt;

use crate::config::MasqConfig;

/// Table all masquerade rules live in
pub const NAT_TABLE: &str = "nat";

/// Built-in chain that must jump to the masquerade chain
pub const POSTROUTING_CHAIN: &str = "POSTROUTING";

/// IPv4 link-local range
pub const LINK_LOCAL_CIDR: &str = "169.254.0.0/16";

/// IPv6 link-local range (RFC 4291)
pub const LINK_LOCAL_CIDR_IPV6: &str = "fe80::/10";

const NON_MASQ_RULE_COMMENT: &str =
    r#"-m comment --comment "ip-masq-agent: local traffic is not subject to MASQUERADE""#;

const MASQ_RULE_COMMENT: &str =
    r#"-m comment --comment "ip-masq-agent: outbound traffic is subject to MASQUERADE (must be last in chain)""#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressFamily {
    V4,
    V6,
}

impl AddressFamily {
    /// Family of a CIDR string, or `None` if it does not parse.
    pub fn of_cidr(cidr: &str) -> Option<Self> {
        match cidr.parse::<IpNet>() {
            Ok(IpNet::V4(_)) => Some(AddressFamily::V4),
            Ok(IpNet::V6(_)) => Some(AddressFamily::V6),
            Err(_) => None,
        }
    }

    pub fn link_local_cidr(self) -> &'static str {
        match self {
            AddressFamily::V4 => LINK_LOCAL_CIDR,
            AddressFamily::V6 => LINK_LOCAL_CIDR_IPV6,
        }
    }

    /// Whether the configuration masquerades this family's link-local range.
    pub fn masq_link_local(self, config: &MasqConfig) -> bool {
        match self {
            AddressFamily::V4 => config.masq_link_local,
            AddressFamily::V6 => config.masq_link_local_ipv6,
        }
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressFamily::V4 => f.write_str("ipv4"),
            AddressFamily::V6 => f.write_str("ipv6"),
        }
    }
}

/// Ordered lines of a restore script for the nat table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleScript {
    lines: Vec<String>,
}

impl RuleScript {
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// The script as fed to the restore tool, every line newline-terminated.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }

    fn write_line(&mut self, words: &[&str]) {
        self.lines.push(words.join(" "));
    }

    fn write_rule(&mut self, chain: &str, args: &[&str]) {
        let mut words = vec!["-A", chain];
        words.extend_from_slice(args);
        self.write_line(&words);
    }

    fn write_non_masq_rule(&mut self, chain: &str, cidr: &str) {
        self.write_rule(chain, &[NON_MASQ_RULE_COMMENT, "-d", cidr, "-j", "RETURN"]);
    }

    fn write_masq_rule(&mut self, chain: &str) {
        self.write_rule(chain, &[MASQ_RULE_COMMENT, "-j", "MASQUERADE"]);
    }
}

impl fmt::Display for RuleScript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.lines {
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}

/// Render the masquerade chain for one address family.
///
/// The chain declaration line flushes the chain atomically with the restore.
/// RETURN rules for the link-local range (unless masqueraded) and for every
/// CIDR of `family` come first, in configuration order; the catch-all
/// MASQUERADE rule is always last.
pub fn render(config: &MasqConfig, family: AddressFamily, chain: &str) -> RuleScript {
    let mut script = RuleScript { lines: Vec::new() };

    script.write_line(&["*nat"]);
    script.write_line(&[&format!(":{}", chain), "-", "[0:0]"]);

    if !family.masq_link_local(config) {
        script.write_non_masq_rule(chain, family.link_local_cidr());
    }

    for cidr in &config.non_masquerade_cidrs {
        if AddressFamily::of_cidr(cidr) == Some(family) {
            script.write_non_masq_rule(chain, cidr);
        }
    }

    script.write_masq_rule(chain);
    script.write_line(&["COMMIT"]);

    script
}

/// Condition of the POSTROUTING rule sending all non-LOCAL traffic to `chain`.
pub fn postrouting_jump_condition(chain: &str) -> Vec<String> {
    let comment = format!(
        "ip-masq-agent: ensure nat POSTROUTING directs all non-LOCAL destination traffic to our custom {} chain",
        chain
    );
    vec![
        "-m".to_string(),
        "comment".to_string(),
        "--comment".to_string(),
        comment,
        "-m".to_string(),
        "addrtype".to_string(),
        "!".to_string(),
        "--dst-type".to_string(),
        "LOCAL".to_string(),
    ]
}
