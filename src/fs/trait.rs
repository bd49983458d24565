//! FileSystem trait definition

use std::io;
use std::path::Path;

/// Abstraction over the file operations the onboarding flow performs.
///
/// Errors stay as [`io::Error`] so callers can tell permission failures
/// apart from everything else.
pub trait FileSystem: Send + Sync {
    /// Read file contents as string
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Create a directory and any missing parents
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Write `contents` to `path`, replacing any existing file
    fn write(&self, path: &Path, contents: &str) -> io::Result<()>;
}
