//! Loads the configuration fragments from disk and folds them into one.

use std::path::Path;
use tracing::debug;

use crate::config::{MasqConfig, MasqConfigFragment};
use crate::error::LoadError;
use crate::fs_abstraction::FileSystem;
use crate::options::AgentOptions;

/// Load, merge and validate every fragment in the configured directory.
///
/// Fragments are those entries whose name starts with the configured prefix,
/// read in name order. If none exist the built-in default configuration is
/// used. Any failure aborts the whole load: the caller keeps whatever
/// configuration it had.
pub fn load<F: FileSystem + ?Sized>(fs: &F, options: &AgentOptions) -> Result<MasqConfig, LoadError> {
    let dir = options.config_dir.as_path();

    let mut names = fs.read_dir(dir).map_err(|error| LoadError::DirectoryRead {
        path: dir.to_path_buf(),
        error,
    })?;
    names.retain(|name| name.starts_with(&options.config_file_prefix));
    names.sort();

    let config = if names.is_empty() {
        debug!("no valid config files found at {:?}, using default values", dir);
        MasqConfig::default_ranges(options.nomasq_all_reserved_ranges)
    } else {
        let mut config = MasqConfig::default();
        for name in &names {
            debug!("found config file {} at {:?}", name, dir);
            let fragment = load_fragment(fs, dir, name, options.enable_ipv6)?;
            config.merge(&fragment);
        }
        config
    };

    config
        .validate(options.enable_ipv6)
        .map_err(LoadError::Validation)?;

    if let Ok(json) = serde_json::to_string(&config) {
        debug!("using config: {}", json);
    }

    Ok(config)
}

fn load_fragment<F: FileSystem + ?Sized>(
    fs: &F,
    dir: &Path,
    name: &str,
    enable_ipv6: bool,
) -> Result<MasqConfigFragment, LoadError> {
    let bytes = fs.read(&dir.join(name)).map_err(|error| LoadError::FileRead {
        name: name.to_string(),
        error,
    })?;

    let fragment = MasqConfigFragment::decode(&bytes).map_err(|reason| LoadError::Decode {
        name: name.to_string(),
        reason,
    })?;

    fragment
        .validate(enable_ipv6)
        .map_err(|error| LoadError::InvalidFragment {
            name: name.to_string(),
            error,
        })?;

    Ok(fragment)
}
