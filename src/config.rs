//! Masquerade configuration: model, fragment decoding, merging and validation.

use ipnet::IpNet;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;

use crate::error::ValidationError;
use crate::validation::validate_cidr;

/// Upper bound on configured CIDRs, link-local excluded
pub const MAX_NON_MASQUERADE_CIDRS: usize = 64;

/// RFC 1918 private address space
const RFC1918_CIDRS: &[&str] = &["10.0.0.0/8", "172.16.0.0/12", "192.168.0.0/16"];

/// Remaining IPv4 ranges reserved by RFCs
const RESERVED_CIDRS: &[&str] = &[
    "100.64.0.0/10",   // RFC 6598
    "192.0.0.0/24",    // RFC 6890
    "192.0.2.0/24",    // RFC 5737
    "192.88.99.0/24",  // RFC 7526
    "198.18.0.0/15",   // RFC 6815
    "198.51.100.0/24", // RFC 5737
    "203.0.113.0/24",  // RFC 5737
    "240.0.0.0/4",     // RFC 5735, former class E
];

/// The authoritative masquerade configuration.
///
/// `non_masquerade_cidrs` is a set kept in insertion order: merging never
/// introduces duplicates, and rendering follows this order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MasqConfig {
    #[serde(rename = "nonMasqueradeCIDRs")]
    pub non_masquerade_cidrs: Vec<String>,

    /// Masquerade traffic to 169.254.0.0/16 instead of exempting it
    #[serde(rename = "masqLinkLocal")]
    pub masq_link_local: bool,

    /// Masquerade traffic to fe80::/10 instead of exempting it
    #[serde(rename = "masqLinkLocalIPv6")]
    pub masq_link_local_ipv6: bool,
}

impl MasqConfig {
    /// Configuration used when no fragment file is present.
    pub fn default_ranges(all_reserved_ranges: bool) -> Self {
        let mut cidrs: Vec<String> = RFC1918_CIDRS.iter().map(|s| s.to_string()).collect();
        if all_reserved_ranges {
            cidrs.extend(RESERVED_CIDRS.iter().map(|s| s.to_string()));
        }

        Self {
            non_masquerade_cidrs: cidrs,
            masq_link_local: false,
            masq_link_local_ipv6: false,
        }
    }

    /// Fold a fragment into this configuration.
    ///
    /// CIDRs are unioned, keeping the first occurrence of each. The link-local
    /// flags are OR'd, so once a fragment turns one on it stays on.
    pub fn merge(&mut self, fragment: &MasqConfigFragment) {
        if let Some(ref cidrs) = fragment.non_masquerade_cidrs {
            let mut seen: HashSet<String> = self.non_masquerade_cidrs.iter().cloned().collect();
            for cidr in cidrs {
                if seen.insert(cidr.clone()) {
                    self.non_masquerade_cidrs.push(cidr.clone());
                }
            }
        }

        self.masq_link_local |= fragment.masq_link_local.unwrap_or(false);
        self.masq_link_local_ipv6 |= fragment.masq_link_local_ipv6.unwrap_or(false);
    }

    /// Check the invariants required of an active configuration.
    pub fn validate(&self, enable_ipv6: bool) -> Result<(), ValidationError> {
        let count = self.non_masquerade_cidrs.len();
        if count > MAX_NON_MASQUERADE_CIDRS {
            return Err(ValidationError::TooManyRanges {
                count,
                max: MAX_NON_MASQUERADE_CIDRS,
            });
        }

        validate_cidrs(&self.non_masquerade_cidrs, enable_ipv6)
    }
}

/// Validate each CIDR and reject IPv6 ones when IPv6 is disabled.
pub(crate) fn validate_cidrs(cidrs: &[String], enable_ipv6: bool) -> Result<(), ValidationError> {
    for cidr in cidrs {
        let net = validate_cidr(cidr)?;
        if !enable_ipv6 && matches!(net, IpNet::V6(_)) {
            return Err(ValidationError::Ipv6Disabled { cidr: cidr.clone() });
        }
    }
    Ok(())
}

/// One configuration file as decoded. Absent keys stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MasqConfigFragment {
    #[serde(
        default,
        rename = "nonMasqueradeCIDRs",
        deserialize_with = "deserialize_cidr_list"
    )]
    pub non_masquerade_cidrs: Option<Vec<String>>,

    #[serde(default, rename = "masqLinkLocal")]
    pub masq_link_local: Option<bool>,

    #[serde(default, rename = "masqLinkLocalIPv6")]
    pub masq_link_local_ipv6: Option<bool>,
}

/// Null list entries become empty strings so that validation rejects them
/// instead of silently dropping them.
fn deserialize_cidr_list<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let cidrs: Option<Vec<Option<String>>> = Option::deserialize(deserializer)?;
    Ok(cidrs.map(|list| list.into_iter().map(Option::unwrap_or_default).collect()))
}

impl MasqConfigFragment {
    /// Decode a fragment from either a JSON document or YAML text.
    ///
    /// A document whose first non-blank character is `{` is tried as JSON
    /// first, so tab-indented JSON is accepted. Anything JSON rejects is then
    /// decoded as YAML, which also covers YAML flow mappings. The error is
    /// returned only when neither encoding accepts the document.
    pub fn decode(bytes: &[u8]) -> Result<Self, String> {
        let text = std::str::from_utf8(bytes).map_err(|e| format!("invalid UTF-8: {}", e))?;
        let trimmed = text.trim();

        if trimmed.is_empty() {
            return Ok(Self::default());
        }

        let json_error = if trimmed.starts_with('{') {
            match serde_json::from_str(trimmed) {
                Ok(fragment) => return Ok(fragment),
                Err(e) => Some(e),
            }
        } else {
            None
        };

        match serde_yaml::from_str::<Option<Self>>(text) {
            Ok(fragment) => Ok(fragment.unwrap_or_default()),
            Err(yaml_error) => Err(match json_error {
                Some(json_error) => format!("not valid JSON ({}) nor YAML ({})", json_error, yaml_error),
                None => yaml_error.to_string(),
            }),
        }
    }

    /// Validate only this fragment's CIDRs; the range limit applies to the
    /// merged result.
    pub fn validate(&self, enable_ipv6: bool) -> Result<(), ValidationError> {
        match self.non_masquerade_cidrs {
            Some(ref cidrs) => validate_cidrs(cidrs, enable_ipv6),
            None => Ok(()),
        }
    }
}
