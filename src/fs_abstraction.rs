//! Filesystem abstraction layer for testability
//!
//! The loader only needs two primitives: listing the configuration directory
//! and reading one fragment. Both go through this trait so tests can script
//! missing directories and unreadable files without touching the real disk.

use std::io;
use std::path::Path;
use tracing::warn;

#[cfg(test)]
use mockall::automock;

/// Trait abstracting the filesystem operations used by the loader.
///
/// # Example (testing)
/// ```ignore
/// use ip_masq_agent::fs_abstraction::MockFileSystem;
///
/// let mut mock_fs = MockFileSystem::new();
/// mock_fs.expect_read_dir()
///     .returning(|_| Ok(vec!["ip-masq-config".to_string()]));
/// ```
#[cfg_attr(test, automock)]
pub trait FileSystem: Send + Sync {
    /// List the names of the entries in a directory.
    ///
    /// Errors with `ErrorKind::NotFound` when the directory itself is absent.
    fn read_dir(&self, path: &Path) -> io::Result<Vec<String>>;

    /// Read file contents as bytes.
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;
}

/// Real filesystem implementation using std::fs.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn read_dir(&self, path: &Path) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(path)? {
            match entry?.file_name().into_string() {
                Ok(name) => names.push(name),
                Err(name) => warn!("Skipping non-UTF-8 file name {:?} in {:?}", name, path),
            }
        }
        Ok(names)
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }
}
