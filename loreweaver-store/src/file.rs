//! Rooted file store.
//!
//! All paths resolve relative to a configured root; absolute paths
//! and upward traversal are rejected before any IO. Recursive deletes
//! run on the blocking pool so the main loop stays responsive.

use crate::error::StoreError;
use serde_json::Value;
use std::path::{Component, Path, PathBuf};

/// Metadata for one stored file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStat {
    /// Size in bytes.
    pub size: u64,
    /// Whether the path is a directory.
    pub is_dir: bool,
}

/// Filesystem access confined to a root directory.
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// A store rooted at `root`. The directory is created lazily on
    /// first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, raw: &str) -> Result<PathBuf, StoreError> {
        let path = Path::new(raw);
        if path.is_absolute() {
            return Err(StoreError::Validation(format!(
                "absolute paths are not allowed: {raw}"
            )));
        }
        for component in path.components() {
            match component {
                Component::ParentDir => {
                    return Err(StoreError::Validation(format!(
                        "path traversal is not allowed: {raw}"
                    )));
                }
                Component::Prefix(_) | Component::RootDir => {
                    return Err(StoreError::Validation(format!(
                        "absolute paths are not allowed: {raw}"
                    )));
                }
                Component::CurDir | Component::Normal(_) => {}
            }
        }
        Ok(self.root.join(path))
    }

    /// Read and parse a JSON file.
    pub async fn read_json(&self, path: &str) -> Result<Value, StoreError> {
        let resolved = self.resolve(path)?;
        let text = tokio::fs::read_to_string(&resolved)
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => StoreError::not_found("file", path),
                _ => StoreError::Io(e.to_string()),
            })?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Serialise a value to a JSON file, creating parent directories.
    pub async fn write_json(&self, path: &str, value: &Value) -> Result<(), StoreError> {
        let resolved = self.resolve(path)?;
        if let Some(parent) = resolved.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let text = serde_json::to_string_pretty(value)?;
        tokio::fs::write(&resolved, text).await?;
        Ok(())
    }

    /// List entries in a directory whose names match a glob-style
    /// pattern (`*` wildcard only).
    pub async fn list(&self, dir: &str, pattern: &str) -> Result<Vec<String>, StoreError> {
        let resolved = self.resolve(dir)?;
        let mut entries = match tokio::fs::read_dir(&resolved).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::Io(e.to_string())),
        };
        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::Io(e.to_string()))?
        {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name_matches(pattern, &name) {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    /// Whether a path exists.
    pub async fn exists(&self, path: &str) -> Result<bool, StoreError> {
        let resolved = self.resolve(path)?;
        Ok(tokio::fs::try_exists(&resolved).await.unwrap_or(false))
    }

    /// Copy a file within the root.
    pub async fn copy(&self, from: &str, to: &str) -> Result<(), StoreError> {
        let from = self.resolve(from)?;
        let to = self.resolve(to)?;
        if let Some(parent) = to.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(&from, &to).await?;
        Ok(())
    }

    /// Move a file within the root.
    pub async fn rename(&self, from: &str, to: &str) -> Result<(), StoreError> {
        let from = self.resolve(from)?;
        let to = self.resolve(to)?;
        if let Some(parent) = to.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::rename(&from, &to).await?;
        Ok(())
    }

    /// Delete a file, or a directory tree when `recursive`. Recursive
    /// deletion runs on the blocking pool.
    pub async fn delete(&self, path: &str, recursive: bool) -> Result<(), StoreError> {
        let resolved = self.resolve(path)?;
        if recursive {
            tokio::task::spawn_blocking(move || std::fs::remove_dir_all(&resolved))
                .await
                .map_err(|e| StoreError::Io(e.to_string()))??;
        } else {
            tokio::fs::remove_file(&resolved).await?;
        }
        Ok(())
    }

    /// Stat a path.
    pub async fn stat(&self, path: &str) -> Result<FileStat, StoreError> {
        let resolved = self.resolve(path)?;
        let meta = tokio::fs::metadata(&resolved)
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => StoreError::not_found("file", path),
                _ => StoreError::Io(e.to_string()),
            })?;
        Ok(FileStat {
            size: meta.len(),
            is_dir: meta.is_dir(),
        })
    }

    /// Total size of a directory tree, computed on the blocking pool.
    pub async fn dir_size(&self, path: &str) -> Result<u64, StoreError> {
        let resolved = self.resolve(path)?;
        tokio::task::spawn_blocking(move || walk_size(&resolved))
            .await
            .map_err(|e| StoreError::Io(e.to_string()))?
    }
}

fn walk_size(path: &Path) -> Result<u64, StoreError> {
    let mut total = 0;
    let entries = std::fs::read_dir(path).map_err(|e| StoreError::Io(e.to_string()))?;
    for entry in entries {
        let entry = entry.map_err(|e| StoreError::Io(e.to_string()))?;
        let meta = entry.metadata().map_err(|e| StoreError::Io(e.to_string()))?;
        if meta.is_dir() {
            total += walk_size(&entry.path())?;
        } else {
            total += meta.len();
        }
    }
    Ok(total)
}

fn name_matches(pattern: &str, name: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    let parts: Vec<&str> = pattern.split('*').collect();
    let mut rest = name;
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() {
            continue;
        }
        match rest.find(part) {
            Some(pos) => {
                if i == 0 && pos != 0 {
                    return false;
                }
                rest = &rest[pos + part.len()..];
            }
            None => return false,
        }
    }
    pattern.ends_with('*') || parts.last().is_none_or(|last| name.ends_with(last))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store() -> (tempfile::TempDir, FileStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        (dir, store)
    }

    #[tokio::test]
    async fn json_round_trip_and_stat() {
        let (_dir, store) = store();
        store
            .write_json("sessions/s1.json", &json!({"name": "The Sunken Keep"}))
            .await
            .unwrap();
        let value = store.read_json("sessions/s1.json").await.unwrap();
        assert_eq!(value["name"], "The Sunken Keep");

        let stat = store.stat("sessions/s1.json").await.unwrap();
        assert!(!stat.is_dir);
        assert!(stat.size > 0);
    }

    #[tokio::test]
    async fn list_honours_glob_patterns() {
        let (_dir, store) = store();
        for name in ["a.json", "b.json", "notes.txt"] {
            store
                .write_json(&format!("data/{name}"), &json!(1))
                .await
                .unwrap();
        }
        let jsons = store.list("data", "*.json").await.unwrap();
        assert_eq!(jsons, vec!["a.json", "b.json"]);
        let all = store.list("data", "*").await.unwrap();
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn traversal_is_rejected() {
        let (_dir, store) = store();
        for bad in ["../escape.json", "/etc/passwd", "a/../../b"] {
            let err = store.read_json(bad).await.unwrap_err();
            assert!(matches!(err, StoreError::Validation(_)), "path: {bad}");
        }
    }

    #[tokio::test]
    async fn copy_rename_delete() {
        let (_dir, store) = store();
        store.write_json("a.json", &json!(1)).await.unwrap();
        store.copy("a.json", "b.json").await.unwrap();
        store.rename("b.json", "c/d.json").await.unwrap();
        assert!(store.exists("c/d.json").await.unwrap());
        assert!(!store.exists("b.json").await.unwrap());

        store.delete("c", true).await.unwrap();
        assert!(!store.exists("c/d.json").await.unwrap());
    }

    #[tokio::test]
    async fn dir_size_sums_the_tree() {
        let (_dir, store) = store();
        store.write_json("tree/a.json", &json!([1, 2, 3])).await.unwrap();
        store.write_json("tree/sub/b.json", &json!("x")).await.unwrap();
        let size = store.dir_size("tree").await.unwrap();
        assert!(size > 0);
    }

    #[tokio::test]
    async fn missing_file_reads_as_not_found() {
        let (_dir, store) = store();
        let err = store.read_json("nope.json").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }
}
