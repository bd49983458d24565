use super::FileSystem;
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

#[derive(Debug, Clone)]
enum MockEntry {
    File(String),
    Directory,
}

/// In-memory file system for tests. Paths under a read-only prefix reject
/// writes and directory creation with `PermissionDenied`.
pub struct MockFileSystem {
    entries: RwLock<HashMap<PathBuf, MockEntry>>,
    read_only: RwLock<HashSet<PathBuf>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            read_only: RwLock::new(HashSet::new()),
        }
    }

    pub fn add_file(&self, path: impl AsRef<Path>, content: &str) {
        let path = path.as_ref();
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(parent) = path.parent() {
            ensure_parents(&mut entries, parent);
        }
        entries.insert(path.to_path_buf(), MockEntry::File(content.to_string()));
    }

    pub fn set_read_only(&self, path: impl AsRef<Path>) {
        self.read_only
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.as_ref().to_path_buf());
    }

    /// Contents of a file written through the mock, if any.
    pub fn contents(&self, path: impl AsRef<Path>) -> Option<String> {
        match self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path.as_ref())
        {
            Some(MockEntry::File(content)) => Some(content.clone()),
            _ => None,
        }
    }

    fn check_writable(&self, path: &Path) -> io::Result<()> {
        let read_only = self.read_only.read().unwrap_or_else(PoisonError::into_inner);
        if read_only.iter().any(|prefix| path.starts_with(prefix)) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("{} is read-only", path.display()),
            ));
        }
        Ok(())
    }
}

impl Default for MockFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

fn ensure_parents(entries: &mut HashMap<PathBuf, MockEntry>, path: &Path) {
    let mut current = PathBuf::new();
    for component in path.components() {
        current.push(component);
        entries
            .entry(current.clone())
            .or_insert(MockEntry::Directory);
    }
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("{}: no such file", path.display()),
    )
}

impl FileSystem for MockFileSystem {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        match self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
        {
            Some(MockEntry::File(content)) => Ok(content.clone()),
            Some(MockEntry::Directory) => Err(io::Error::new(
                io::ErrorKind::Other,
                format!("{} is a directory", path.display()),
            )),
            None => Err(not_found(path)),
        }
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if matches!(entries.get(path), Some(MockEntry::Directory)) {
            return Ok(());
        }
        self.check_writable(path)?;
        ensure_parents(&mut entries, path);
        Ok(())
    }

    fn write(&self, path: &Path, contents: &str) -> io::Result<()> {
        self.check_writable(path)?;
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        match path.parent() {
            Some(parent)
                if !parent.as_os_str().is_empty()
                    && !matches!(entries.get(parent), Some(MockEntry::Directory)) =>
            {
                return Err(not_found(parent));
            }
            _ => {}
        }
        entries.insert(path.to_path_buf(), MockEntry::File(contents.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_file() {
        let fs = MockFileSystem::new();
        fs.add_file("/in/params.py", "tenant_id = 'a'");
        assert!(fs.contents(Path::new("/in/params.py")).is_some());
        assert!(fs.create_dir_all(Path::new("/in")).is_ok());
        assert_eq!(
            fs.read_to_string(Path::new("/in/params.py")).unwrap(),
            "tenant_id = 'a'"
        );
    }

    #[test]
    fn test_write_requires_parent() {
        let fs = MockFileSystem::new();
        let path = Path::new("/etc/mdatp/out.json");
        assert_eq!(
            fs.write(path, "{}").unwrap_err().kind(),
            io::ErrorKind::NotFound
        );

        fs.create_dir_all(Path::new("/etc/mdatp")).unwrap();
        fs.write(path, "{}").unwrap();
        assert_eq!(fs.contents(path).as_deref(), Some("{}"));
    }

    #[test]
    fn test_read_only_prefix() {
        let fs = MockFileSystem::new();
        fs.set_read_only("/etc");
        let err = fs.create_dir_all(Path::new("/etc/mdatp")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
    }

    #[test]
    fn test_existing_read_only_directory_is_ok() {
        let fs = MockFileSystem::new();
        fs.add_file("/etc/mdatp/old.json", "{}");
        fs.set_read_only("/etc");
        fs.create_dir_all(Path::new("/etc/mdatp")).unwrap();
        let err = fs.write(Path::new("/etc/mdatp/new.json"), "{}").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
    }

    #[test]
    fn test_read_missing() {
        let fs = MockFileSystem::new();
        assert_eq!(
            fs.read_to_string(Path::new("/nope")).unwrap_err().kind(),
            io::ErrorKind::NotFound
        );
    }
}
