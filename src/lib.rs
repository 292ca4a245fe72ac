//! # ip-masq-agent
//!
//! A node agent that keeps a dedicated nat chain in sync with a set of
//! non-masquerade destination ranges. Traffic to those ranges leaves the node
//! with its pod source address; everything else is masqueraded.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      ip-masq-agent                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  CLI (clap) ──> AgentOptions                                │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Loader (serde_yaml / serde_json, FileSystem trait)         │
//! │    └── prefix-matched fragments merged into MasqConfig      │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Validation (ipnet)                                         │
//! │    └── canonical CIDRs, range limit, IPv6 gate              │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Rules                                                      │
//! │    └── iptables-restore script per address family           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Enforcer (RuleApplier trait)                               │
//! │    └── IptablesApplier (iptables / ip6tables)               │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Daemon (tokio)                                             │
//! │    └── load, apply, sleep until shutdown                    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example Usage
//!
//! ```no_run
//! use ip_masq_agent::cmd_abstraction::RealCommandExecutor;
//! use ip_masq_agent::daemon::MasqDaemon;
//! use ip_masq_agent::enforcer::{check_root, IptablesApplier};
//! use ip_masq_agent::fs_abstraction::RealFileSystem;
//! use ip_masq_agent::options::AgentOptions;
//! use ip_masq_agent::rules::AddressFamily;
//! use ip_masq_agent::signal::shutdown_signal;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     check_root()?;
//!
//!     let options = AgentOptions::default();
//!     options.validate()?;
//!
//!     let mut daemon = MasqDaemon::new(
//!         options,
//!         RealFileSystem,
//!         IptablesApplier::new(RealCommandExecutor, AddressFamily::V4),
//!         IptablesApplier::new(RealCommandExecutor, AddressFamily::V6),
//!     );
//!     daemon.run(shutdown_signal()).await;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`cli`] - Command-line interface definitions
//! - [`cmd_abstraction`] - Command execution seam (mockable)
//! - [`config`] - Masquerade configuration, defaults and merging
//! - [`daemon`] - The reconciliation loop
//! - [`enforcer`] - Rule applier abstraction and the iptables backend
//! - [`error`] - Validation, load and apply errors
//! - [`fs_abstraction`] - Filesystem seam (mockable)
//! - [`loader`] - Reads and merges configuration fragments
//! - [`options`] - Agent options and their validation
//! - [`rules`] - Renders the chain's restore script
//! - [`signal`] - Graceful shutdown signal handling
//! - [`validation`] - CIDR validation

pub mod cli;
pub mod cmd_abstraction;
pub mod config;
pub mod daemon;
pub mod enforcer;
pub mod error;
pub mod fs_abstraction;
pub mod loader;
pub mod options;
pub mod rules;
pub mod signal;
pub mod validation;

pub use cli::Cli;
pub use config::MasqConfig;
pub use options::AgentOptions;
