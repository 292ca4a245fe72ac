//! The reconciliation loop.
//!
//! Each cycle loads the configuration, then renders and applies the
//! masquerade chain for IPv4 and, when enabled, IPv6. A failing step ends the
//! cycle early; the previously active configuration and rules stay in place
//! and the next cycle starts after the usual sleep.

use anyhow::{Context, Result};
use std::future::Future;
use tracing::{debug, error, info};

use crate::config::MasqConfig;
use crate::enforcer::RuleApplier;
use crate::error::{ApplyError, LoadError};
use crate::fs_abstraction::FileSystem;
use crate::loader;
use crate::options::AgentOptions;
use crate::rules::{postrouting_jump_condition, render, AddressFamily, NAT_TABLE, POSTROUTING_CHAIN};

pub struct MasqDaemon<F: FileSystem, A: RuleApplier> {
    config: MasqConfig,
    options: AgentOptions,
    fs: F,
    iptables: A,
    ip6tables: A,
}

impl<F: FileSystem, A: RuleApplier> MasqDaemon<F, A> {
    /// Create a daemon whose active configuration is the built-in default.
    pub fn new(options: AgentOptions, fs: F, iptables: A, ip6tables: A) -> Self {
        Self {
            config: MasqConfig::default_ranges(options.nomasq_all_reserved_ranges),
            options,
            fs,
            iptables,
            ip6tables,
        }
    }

    /// The active configuration.
    pub fn config(&self) -> &MasqConfig {
        &self.config
    }

    /// Reload the configuration. It replaces the active one only on success.
    pub fn sync_config(&mut self) -> Result<(), LoadError> {
        self.config = loader::load(&self.fs, &self.options)?;
        Ok(())
    }

    /// Make sure the chain exists and is reachable, then restore its rules.
    pub fn sync_masq_rules(&self, family: AddressFamily) -> Result<(), ApplyError> {
        let applier = match family {
            AddressFamily::V4 => &self.iptables,
            AddressFamily::V6 => &self.ip6tables,
        };
        let chain = self.options.masq_chain.as_str();

        applier.ensure_chain(NAT_TABLE, chain)?;
        applier.ensure_jump_rule(
            NAT_TABLE,
            POSTROUTING_CHAIN,
            chain,
            &postrouting_jump_condition(chain),
        )?;

        let script = render(&self.config, family, chain);
        applier.apply_script(NAT_TABLE, &script.to_bytes())?;

        debug!("Synced {} masquerade rules ({} lines)", family, script.lines().len());
        Ok(())
    }

    /// Run one reconciliation cycle, stopping at the first error.
    pub fn run_cycle(&mut self) -> Result<()> {
        self.sync_config().context("error syncing configuration")?;

        self.sync_masq_rules(AddressFamily::V4)
            .context("error syncing masquerade rules")?;

        if self.options.enable_ipv6 {
            self.sync_masq_rules(AddressFamily::V6)
                .context("error syncing masquerade rules for ipv6")?;
        }

        Ok(())
    }

    /// Reconcile forever, sleeping `resync_interval` after each cycle, until
    /// `shutdown` resolves. Cycle errors are logged, never returned.
    pub async fn run<S: Future<Output = ()>>(&mut self, shutdown: S) {
        tokio::pin!(shutdown);

        info!(
            "Starting reconciliation of chain {} every {:?}",
            self.options.masq_chain, self.options.resync_interval
        );

        loop {
            if let Err(e) = self.run_cycle() {
                error!("{:#}", e);
            }

            tokio::select! {
                _ = tokio::time::sleep(self.options.resync_interval) => {}
                _ = &mut shutdown => {
                    info!("Stopping reconciliation loop");
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enforcer::MockRuleApplier;
    use crate::fs_abstraction::MockFileSystem;
    use std::io;
    use std::sync::{Arc, Mutex};

    fn fs_with(files: Vec<(&'static str, &'static str)>) -> MockFileSystem {
        let mut fs = MockFileSystem::new();
        let names: Vec<String> = files.iter().map(|(n, _)| n.to_string()).collect();
        fs.expect_read_dir().returning(move |_| Ok(names.clone()));
        fs.expect_read().returning(move |p| {
            let name = p.file_name().and_then(|n| n.to_str()).unwrap_or_default();
            files
                .iter()
                .find(|(n, _)| *n == name)
                .map(|(_, c)| c.as_bytes().to_vec())
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "errno 2"))
        });
        fs
    }

    /// Applier accepting everything and recording restore scripts
    fn recording_applier(scripts: Arc<Mutex<Vec<String>>>) -> MockRuleApplier {
        let mut applier = MockRuleApplier::new();
        applier.expect_ensure_chain().returning(|_, _| Ok(()));
        applier.expect_ensure_jump_rule().returning(|_, _, _, _| Ok(()));
        applier.expect_apply_script().returning(move |_, script| {
            scripts.lock().unwrap().push(String::from_utf8_lossy(script).into_owned());
            Ok(())
        });
        applier
    }

    fn unused_applier() -> MockRuleApplier {
        let mut applier = MockRuleApplier::new();
        applier.expect_ensure_chain().never();
        applier.expect_ensure_jump_rule().never();
        applier.expect_apply_script().never();
        applier
    }

    #[test]
    fn test_new_starts_with_defaults() {
        let options = AgentOptions {
            nomasq_all_reserved_ranges: true,
            ..Default::default()
        };
        let daemon = MasqDaemon::new(options, MockFileSystem::new(), unused_applier(), unused_applier());
        assert_eq!(daemon.config(), &MasqConfig::default_ranges(true));
    }

    #[test]
    fn test_cycle_applies_v4_only_when_ipv6_disabled() {
        let v4 = Arc::new(Mutex::new(Vec::new()));
        let fs = fs_with(vec![("ip-masq-config", "nonMasqueradeCIDRs:\n  - 10.244.0.0/16\n")]);
        let mut daemon = MasqDaemon::new(
            AgentOptions::default(),
            fs,
            recording_applier(v4.clone()),
            unused_applier(),
        );

        daemon.run_cycle().unwrap();

        let scripts = v4.lock().unwrap();
        assert_eq!(scripts.len(), 1);
        assert!(scripts[0].contains("-d 169.254.0.0/16 -j RETURN"));
        assert!(scripts[0].contains("-d 10.244.0.0/16 -j RETURN"));
        assert!(!scripts[0].contains("10.0.0.0/8"));
    }

    #[test]
    fn test_cycle_applies_both_families_when_ipv6_enabled() {
        let v4 = Arc::new(Mutex::new(Vec::new()));
        let v6 = Arc::new(Mutex::new(Vec::new()));
        let fs = fs_with(vec![(
            "ip-masq-config",
            r#"{"nonMasqueradeCIDRs": ["10.244.0.0/16", "fc00::/7"]}"#,
        )]);
        let options = AgentOptions {
            enable_ipv6: true,
            ..Default::default()
        };
        let mut daemon = MasqDaemon::new(options, fs, recording_applier(v4.clone()), recording_applier(v6.clone()));

        daemon.run_cycle().unwrap();

        let v4 = v4.lock().unwrap();
        let v6 = v6.lock().unwrap();
        assert!(v4[0].contains("-d 10.244.0.0/16"));
        assert!(!v4[0].contains("fc00::/7"));
        assert!(v6[0].contains("-d fe80::/10"));
        assert!(v6[0].contains("-d fc00::/7"));
        assert!(!v6[0].contains("10.244.0.0/16"));
    }

    #[test]
    fn test_sync_masq_rules_ensures_chain_and_jump() {
        let mut applier = MockRuleApplier::new();
        let mut seq = mockall::Sequence::new();
        applier
            .expect_ensure_chain()
            .withf(|table, chain| table == "nat" && chain == "IP-MASQ-AGENT")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        applier
            .expect_ensure_jump_rule()
            .withf(|table, from, to, condition| {
                table == "nat"
                    && from == "POSTROUTING"
                    && to == "IP-MASQ-AGENT"
                    && condition.ends_with(&["LOCAL".to_string()])
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _, _| Ok(()));
        applier
            .expect_apply_script()
            .withf(|table, script| table == "nat" && script.starts_with(b"*nat\n:IP-MASQ-AGENT - [0:0]\n"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));

        let daemon = MasqDaemon::new(AgentOptions::default(), MockFileSystem::new(), applier, unused_applier());
        assert!(daemon.sync_masq_rules(AddressFamily::V4).is_ok());
    }

    #[test]
    fn test_failed_load_keeps_previous_config_and_skips_apply() {
        let fs = fs_with(vec![
            ("ip-masq-config-0", r#"{"nonMasqueradeCIDRs": ["111.254.0.0/15"]}"#),
            ("ip-masq-config-1", r#"{"nonMasqueradeCIDRs": [""]}"#),
        ]);
        let mut daemon = MasqDaemon::new(AgentOptions::default(), fs, unused_applier(), unused_applier());
        let before = daemon.config().clone();

        let err = daemon.run_cycle().unwrap_err();
        assert!(format!("{:#}", err).starts_with("error syncing configuration: config ip-masq-config-1 is invalid"));
        assert_eq!(daemon.config(), &before);
    }

    #[test]
    fn test_failed_apply_skips_ipv6() {
        let mut v4 = MockRuleApplier::new();
        v4.expect_ensure_chain().returning(|_, _| Ok(()));
        v4.expect_ensure_jump_rule().returning(|_, _, _, _| Ok(()));
        v4.expect_apply_script().returning(|_, _| {
            Err(ApplyError::Restore {
                program: "iptables-restore".to_string(),
                stderr: "line 3 failed".to_string(),
            })
        });

        let options = AgentOptions {
            enable_ipv6: true,
            ..Default::default()
        };
        let fs = fs_with(vec![("ip-masq-config", "masqLinkLocal: true\n")]);
        let mut daemon = MasqDaemon::new(options, fs, v4, unused_applier());

        let err = daemon.run_cycle().unwrap_err();
        assert_eq!(
            format!("{:#}", err),
            "error syncing masquerade rules: iptables-restore failed: line 3 failed"
        );
        // The load itself succeeded and was adopted
        assert!(daemon.config().masq_link_local);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_survives_errors_and_stops_on_shutdown() {
        let mut fs = MockFileSystem::new();
        fs.expect_read_dir()
            .times(3)
            .returning(|_| Err(io::Error::new(io::ErrorKind::NotFound, "errno 2")));

        let options = AgentOptions::default();
        let interval = options.resync_interval;
        let mut daemon = MasqDaemon::new(options, fs, unused_applier(), unused_applier());

        // Three failing cycles, then stop during the third sleep
        daemon.run(tokio::time::sleep(interval * 2 + interval / 2)).await;
        assert_eq!(daemon.config(), &MasqConfig::default_ranges(false));
    }
}
