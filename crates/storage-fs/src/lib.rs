//! Filesystem object store.
//!
//! Layout: `{root}/{key}`, where `/` in a key becomes a directory separator.
//! History entries therefore land at `{root}/{SYMBOL}/{epoch-seconds}.json`.
//!
//! - Create-only writes: the body goes to a hidden temp file in the target
//!   directory, then a hard link claims the final name. Linking fails if the
//!   name exists, so an existing object is never replaced.
//! - Listing walks the directory named by the prefix once and returns keys in
//!   lexicographic order. `list` pages that result with `start_after` +
//!   `max_keys`; `list_prefix` returns all of it.
//! - Keys that could escape the root (`..`, absolute paths, empty segments) are
//!   rejected.

use async_trait::async_trait;
use log::{debug, warn};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use quotefeed_core::errors::{Error, Result, ValidationError};
use quotefeed_core::storage::{ListPage, ObjectStore};

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

fn io_error(action: &str, path: &Path, err: std::io::Error) -> Error {
    Error::ObjectStore(format!("{} {}: {}", action, path.display(), err))
}

fn invalid_key(key: &str, reason: &str) -> Error {
    ValidationError::InvalidInput(format!("object key {:?} {}", key, reason)).into()
}

/// Splits a key into path segments, rejecting anything that is not a plain
/// relative path.
fn key_segments(key: &str) -> Result<Vec<&str>> {
    if key.is_empty() {
        return Err(invalid_key(key, "is empty"));
    }
    if key.starts_with('/') || key.contains('\\') {
        return Err(invalid_key(key, "must be a relative '/'-separated path"));
    }

    let segments: Vec<&str> = key.split('/').collect();
    for segment in &segments {
        if segment.is_empty() {
            return Err(invalid_key(key, "has an empty segment"));
        }
        if *segment == "." || *segment == ".." {
            return Err(invalid_key(key, "must not traverse directories"));
        }
        // hidden names are reserved for in-flight temp files
        if segment.starts_with('.') {
            return Err(invalid_key(key, "has a segment starting with '.'"));
        }
    }
    Ok(segments)
}

#[derive(Clone, Debug)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    /// Opens a store rooted at `root`, creating the directory if needed.
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|e| io_error("create", &root, e))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        Ok(key_segments(key)?
            .into_iter()
            .fold(self.root.clone(), |path, segment| path.join(segment)))
    }

    /// Directory to walk for `prefix` and the key prefix of that directory.
    fn listing_base(&self, prefix: &str) -> Result<(PathBuf, String)> {
        match prefix.rfind('/') {
            Some(idx) => {
                let dir_key = &prefix[..idx];
                Ok((self.path_for(dir_key)?, format!("{}/", dir_key)))
            }
            None => Ok((self.root.clone(), String::new())),
        }
    }

    /// Every object key under `dir`, unsorted.
    async fn walk(&self, dir: PathBuf, key_prefix: String) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut pending = vec![(dir, key_prefix)];

        while let Some((dir, key_prefix)) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(io_error("read", &dir, e)),
            };

            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| io_error("read", &dir, e))?
            {
                let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                    warn!("Skipping non UTF-8 entry in {}", dir.display());
                    continue;
                };
                if name.starts_with('.') {
                    continue;
                }

                let file_type = entry
                    .file_type()
                    .await
                    .map_err(|e| io_error("stat", &entry.path(), e))?;
                let key = format!("{}{}", key_prefix, name);
                if file_type.is_dir() {
                    pending.push((entry.path(), format!("{}/", key)));
                } else if file_type.is_file() {
                    keys.push(key);
                }
            }
        }

        Ok(keys)
    }

    /// Keys under `prefix`, sorted, from a single directory walk.
    async fn matching_keys(&self, prefix: &str) -> Result<Vec<String>> {
        let (dir, key_prefix) = self.listing_base(prefix)?;
        let mut keys: Vec<String> = self
            .walk(dir, key_prefix)
            .await?
            .into_iter()
            .filter(|k| k.starts_with(prefix))
            .collect();
        keys.sort();
        Ok(keys)
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn put_if_absent(&self, key: &str, body: Vec<u8>) -> Result<bool> {
        let path = self.path_for(key)?;
        let (Some(dir), Some(name)) = (path.parent(), path.file_name()) else {
            return Err(invalid_key(key, "has no file name"));
        };

        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| io_error("create", dir, e))?;

        let temp = dir.join(format!(
            ".{}.{}.{}.tmp",
            name.to_string_lossy(),
            std::process::id(),
            TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        tokio::fs::write(&temp, &body)
            .await
            .map_err(|e| io_error("write", &temp, e))?;

        let linked = tokio::fs::hard_link(&temp, &path).await;
        if let Err(e) = tokio::fs::remove_file(&temp).await {
            warn!("Failed to remove temp file {}: {}", temp.display(), e);
        }

        match linked {
            Ok(()) => {
                debug!("Created object {}", key);
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(io_error("link", &path, e)),
        }
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(body) => Ok(Some(body)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error("read", &path, e)),
        }
    }

    async fn list(
        &self,
        prefix: &str,
        start_after: Option<&str>,
        max_keys: usize,
    ) -> Result<ListPage> {
        let mut keys = self.matching_keys(prefix).await?;
        if let Some(after) = start_after {
            let skip = keys.partition_point(|k| k.as_str() <= after);
            keys.drain(..skip);
        }

        let is_truncated = keys.len() > max_keys;
        keys.truncate(max_keys);
        Ok(ListPage { keys, is_truncated })
    }

    async fn list_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        self.matching_keys(prefix).await
    }
}
