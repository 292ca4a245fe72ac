//! Rule application backends.

mod iptables;

use anyhow::Result;

#[cfg(test)]
use mockall::automock;

pub use iptables::IptablesApplier;

use crate::error::ApplyError;

/// Applies rendered rules to one address family's packet filter.
///
/// `ensure_chain` and `ensure_jump_rule` must be idempotent: they run before
/// every restore.
#[cfg_attr(test, automock)]
pub trait RuleApplier: Send + Sync {
    /// Create `chain` in `table` unless it already exists.
    fn ensure_chain(&self, table: &str, chain: &str) -> Result<(), ApplyError>;

    /// Append `condition -j to_chain` to `from_chain` unless already present.
    fn ensure_jump_rule(
        &self,
        table: &str,
        from_chain: &str,
        to_chain: &str,
        condition: &[String],
    ) -> Result<(), ApplyError>;

    /// Feed a restore script to the packet filter without flushing the
    /// other chains of the table.
    fn apply_script(&self, table: &str, script: &[u8]) -> Result<(), ApplyError>;
}

/// Check if running as root (effective UID == 0)
///
/// Managing nat rules needs CAP_NET_ADMIN; the UID check covers the usual
/// case of running as root in a privileged container.
pub fn check_root() -> Result<()> {
    // SAFETY: geteuid() has no preconditions, never fails and does not
    // modify any state.
    let euid = unsafe { libc::geteuid() };

    if euid != 0 {
        anyhow::bail!(
            "This operation requires root privileges.\n\
             Alternatively, ensure the process has the CAP_NET_ADMIN capability."
        )
    }
    Ok(())
}
