//! CIDR validation for non-masquerade ranges.
//!
//! A range is accepted only if it parses as `address/prefix` and its address
//! is the network address of the block (no host bits set).

use ipnet::IpNet;

use crate::error::ValidationError;

/// Parse and validate one CIDR string, returning the parsed network.
///
/// # Examples
/// ```
/// use ip_masq_agent::validation::validate_cidr;
/// assert!(validate_cidr("10.0.0.0/8").is_ok());
/// assert!(validate_cidr("10.0.0.1/8").is_err());
/// assert!(validate_cidr("abcdefg").is_err());
/// ```
pub fn validate_cidr(cidr: &str) -> Result<IpNet, ValidationError> {
    let net: IpNet = cidr.parse().map_err(|_| ValidationError::Parse {
        cidr: cidr.to_string(),
    })?;

    if net.addr() != net.network() {
        return Err(ValidationError::Alignment {
            cidr: cidr.to_string(),
            ip: net.addr().to_string(),
            network: net.trunc().to_string(),
        });
    }

    Ok(net)
}
