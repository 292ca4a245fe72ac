//! iptables / ip6tables applier.

use tracing::debug;

use super::RuleApplier;
use crate::cmd_abstraction::{args_to_strings, CommandExecutor, CommandOutput};
use crate::error::ApplyError;
use crate::rules::AddressFamily;

/// Applies rules by running the iptables binaries of one address family.
pub struct IptablesApplier<E: CommandExecutor> {
    executor: E,
    family: AddressFamily,
}

impl<E: CommandExecutor> IptablesApplier<E> {
    pub fn new(executor: E, family: AddressFamily) -> Self {
        Self { executor, family }
    }

    fn iptables(&self) -> &'static str {
        match self.family {
            AddressFamily::V4 => "iptables",
            AddressFamily::V6 => "ip6tables",
        }
    }

    fn restore(&self) -> &'static str {
        match self.family {
            AddressFamily::V4 => "iptables-restore",
            AddressFamily::V6 => "ip6tables-restore",
        }
    }

    /// Run iptables with `-w` so we wait for the xtables lock instead of
    /// failing when another agent holds it.
    fn run(&self, args: &[String]) -> Result<CommandOutput, ApplyError> {
        let program = self.iptables();
        let mut full_args = args_to_strings(&["-w"]);
        full_args.extend_from_slice(args);

        debug!("Running {} {}", program, full_args.join(" "));
        self.executor
            .execute(program, &full_args)
            .map_err(|e| ApplyError::Exec {
                program: program.to_string(),
                reason: e.to_string(),
            })
    }
}

impl<E: CommandExecutor> RuleApplier for IptablesApplier<E> {
    fn ensure_chain(&self, table: &str, chain: &str) -> Result<(), ApplyError> {
        let created = self.run(&args_to_strings(&["-t", table, "-N", chain]))?;
        if created.success {
            debug!("Created {} chain {} ({})", table, chain, self.family);
            return Ok(());
        }

        // -N fails when the chain exists; anything else shows up in the listing
        let listed = self.run(&args_to_strings(&["-t", table, "-S", chain]))?;
        if listed.success {
            return Ok(());
        }

        Err(ApplyError::EnsureChain {
            table: table.to_string(),
            chain: chain.to_string(),
            stderr: created.stderr.trim().to_string(),
        })
    }

    fn ensure_jump_rule(
        &self,
        table: &str,
        from_chain: &str,
        to_chain: &str,
        condition: &[String],
    ) -> Result<(), ApplyError> {
        let rule_args = |op: &str| {
            let mut args = args_to_strings(&["-t", table, op, from_chain]);
            args.extend_from_slice(condition);
            args.extend(args_to_strings(&["-j", to_chain]));
            args
        };

        if self.run(&rule_args("-C"))?.success {
            return Ok(());
        }

        let appended = self.run(&rule_args("-A"))?;
        if !appended.success {
            return Err(ApplyError::EnsureJump {
                table: table.to_string(),
                from: from_chain.to_string(),
                to: to_chain.to_string(),
                stderr: appended.stderr.trim().to_string(),
            });
        }

        debug!("Added {} {} jump to {} ({})", table, from_chain, to_chain, self.family);
        Ok(())
    }

    fn apply_script(&self, table: &str, script: &[u8]) -> Result<(), ApplyError> {
        let program = self.restore();
        debug!(
            "Restoring {} table with {}:\n{}",
            table,
            program,
            String::from_utf8_lossy(script)
        );

        let output = self
            .executor
            .execute_with_stdin(program, &args_to_strings(&["--noflush"]), script)
            .map_err(|e| ApplyError::Exec {
                program: program.to_string(),
                reason: e.to_string(),
            })?;

        if !output.success {
            return Err(ApplyError::Restore {
                program: program.to_string(),
                stderr: output.stderr.trim().to_string(),
            });
        }
        Ok(())
    }
}
