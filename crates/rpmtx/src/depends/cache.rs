//! Persistent dependency result cache

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::error::{ResolutionError, Result};

/// Maps a dependency display string (`R foo >= 1.0`) to the verdict last
/// computed for it: 0 satisfied, 1 unsatisfied.
///
/// Any error returned here disables caching for the rest of the run.
pub trait ResultCache {
    fn get(&mut self, key: &str) -> Result<Option<i32>>;

    fn put(&mut self, key: &str, rc: i32) -> Result<()>;

    /// Forget every entry
    fn clear(&mut self) -> Result<()>;
}

/// Cache that lives only as long as the process
#[derive(Debug, Clone, Default)]
pub struct MemoryResultCache {
    entries: IndexMap<String, i32>,
}

impl MemoryResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }
}

impl ResultCache for MemoryResultCache {
    fn get(&mut self, key: &str) -> Result<Option<i32>> {
        Ok(self.entries.get(key).copied())
    }

    fn put(&mut self, key: &str, rc: i32) -> Result<()> {
        self.entries.insert(key.to_string(), rc);
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.entries.clear();
        Ok(())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheFile {
    #[serde(default)]
    entries: IndexMap<String, i32>,
}

/// File-backed cache stored as JSON
///
/// Every change rewrites the whole file through a temporary file in the
/// same directory, so readers never observe a partial write.
#[derive(Debug)]
pub struct JsonResultCache {
    path: PathBuf,
    entries: IndexMap<String, i32>,
    read_only: bool,
}

impl JsonResultCache {
    /// Open a cache file
    ///
    /// # Arguments
    /// * `path` - Location of the JSON file; it need not exist yet
    ///
    /// # Returns
    /// * `Ok(cache)` - Existing entries were loaded, or the file is missing
    /// * `Err(e)` - The file exists but could not be read or parsed
    pub fn open<P: Into<PathBuf>>(path: P) -> Result<Self> {
        let path = path.into();
        let entries = match fs::read(&path) {
            Ok(data) => serde_json::from_slice::<CacheFile>(&data)?.entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => IndexMap::new(),
            Err(e) => return Err(e.into()),
        };
        log::debug!("Loaded {} cached results from {}", entries.len(), path.display());
        Ok(Self {
            path,
            entries,
            read_only: false,
        })
    }

    /// Set the read-only mode; lookups still work but nothing is written
    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn save(&self) -> Result<()> {
        if self.read_only {
            return Ok(());
        }

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let file = CacheFile {
            entries: self.entries.clone(),
        };
        let mut tmp = NamedTempFile::new_in(&dir)?;
        serde_json::to_writer_pretty(&mut tmp, &file)?;
        tmp.flush()?;
        tmp.persist(&self.path)
            .map_err(|e| ResolutionError::Cache(format!("Failed to write {}: {}", self.path.display(), e.error)))?;
        Ok(())
    }
}

impl ResultCache for JsonResultCache {
    fn get(&mut self, key: &str) -> Result<Option<i32>> {
        Ok(self.entries.get(key).copied())
    }

    fn put(&mut self, key: &str, rc: i32) -> Result<()> {
        if self.entries.get(key) == Some(&rc) {
            return Ok(());
        }
        self.entries.insert(key.to_string(), rc);
        self.save()
    }

    fn clear(&mut self) -> Result<()> {
        self.entries.clear();
        self.save()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_memory_cache() {
        let mut cache = MemoryResultCache::new();
        assert_eq!(cache.get("R foo").unwrap(), None);
        cache.put("R foo", 1).unwrap();
        assert_eq!(cache.get("R foo").unwrap(), Some(1));
        cache.clear().unwrap();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_json_cache_persists() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("depends.json");

        let mut cache = JsonResultCache::open(&path).unwrap();
        assert!(cache.is_empty());
        cache.put("R bash >= 5", 0).unwrap();
        cache.put("R perl(Foo)", 1).unwrap();
        assert!(path.is_file());

        let mut reopened = JsonResultCache::open(&path).unwrap();
        assert_eq!(reopened.len(), 2);
        assert_eq!(reopened.get("R bash >= 5").unwrap(), Some(0));
        assert_eq!(reopened.get("R perl(Foo)").unwrap(), Some(1));
    }

    #[test]
    fn test_json_cache_read_only() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("depends.json");

        let mut cache = JsonResultCache::open(&path).unwrap();
        cache.set_read_only(true);
        cache.put("R foo", 0).unwrap();
        assert_eq!(cache.get("R foo").unwrap(), Some(0));
        assert!(!path.exists());
    }

    #[test]
    fn test_json_cache_rejects_garbage() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("depends.json");
        fs::write(&path, "not json").unwrap();
        assert!(JsonResultCache::open(&path).is_err());
    }
}
