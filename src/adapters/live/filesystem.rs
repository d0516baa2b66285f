//! Disk-backed `FileSystem`.

use std::path::Path;

use crate::ports::{BoxError, FileSystem};

/// Real disk I/O through `std::fs`.
pub struct LiveFileSystem;

impl FileSystem for LiveFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String, BoxError> {
        Ok(std::fs::read_to_string(path)?)
    }

    fn write(&self, path: &Path, contents: &str) -> Result<(), BoxError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        Ok(std::fs::write(path, contents)?)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn list_dir(&self, path: &Path) -> Result<Vec<String>, BoxError> {
        let mut entries = Vec::new();
        for entry in std::fs::read_dir(path)? {
            if let Some(name) = entry?.file_name().to_str() {
                entries.push(name.to_string());
            }
        }
        entries.sort();
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_creates_parents_and_list_is_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let gen = dir.path().join(".taskgen/generated_tasks");
        LiveFileSystem.write(&gen.join("b.py"), "b").unwrap();
        LiveFileSystem.write(&gen.join("a.py"), "a").unwrap();

        assert!(LiveFileSystem.exists(&gen));
        assert_eq!(LiveFileSystem.list_dir(&gen).unwrap(), vec!["a.py", "b.py"]);
        assert_eq!(LiveFileSystem.read_to_string(&gen.join("a.py")).unwrap(), "a");
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(LiveFileSystem.read_to_string(&dir.path().join("nope.json")).is_err());
        assert!(!LiveFileSystem.exists(&dir.path().join("nope.json")));
    }
}
