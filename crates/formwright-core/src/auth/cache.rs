//! Session token cache
//!
//! Keyed by identity. Readers must never see a half-written entry, and every
//! read is re-validated against `expires_at` by the caller.

use super::session::SessionArtifact;
use super::AuthError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// One cached session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedSession {
    /// Identity the session belongs to
    pub identity: String,
    /// Serialized session state
    pub artifact: SessionArtifact,
    /// When the session was obtained
    pub created_at: DateTime<Utc>,
    /// When the session stops being trusted
    pub expires_at: DateTime<Utc>,
}

impl CachedSession {
    /// Whether the entry is still within its lifetime at `now`
    #[must_use]
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// Durable identity → session store
#[async_trait::async_trait]
pub trait TokenCache: Send + Sync {
    /// Entry for `identity`
    async fn get(&self, identity: &str) -> Result<Option<CachedSession>, AuthError>;

    /// Store or replace the entry for `entry.identity`
    async fn put(&self, entry: CachedSession) -> Result<(), AuthError>;

    /// Remove the entry for `identity`
    async fn clear(&self, identity: &str) -> Result<(), AuthError>;

    /// Remove every entry
    async fn clear_all(&self) -> Result<(), AuthError>;
}

/// In-process cache, lost on exit
#[derive(Debug, Default)]
pub struct MemoryTokenCache {
    entries: RwLock<HashMap<String, CachedSession>>,
}

impl MemoryTokenCache {
    /// Empty cache
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl TokenCache for MemoryTokenCache {
    async fn get(&self, identity: &str) -> Result<Option<CachedSession>, AuthError> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        Ok(entries.get(identity).cloned())
    }

    async fn put(&self, entry: CachedSession) -> Result<(), AuthError> {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(entry.identity.clone(), entry);
        Ok(())
    }

    async fn clear(&self, identity: &str) -> Result<(), AuthError> {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.remove(identity);
        Ok(())
    }

    async fn clear_all(&self) -> Result<(), AuthError> {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
        Ok(())
    }
}

/// One JSON file per identity under a directory.
///
/// Writes go to a uniquely named temporary sibling then are renamed into
/// place, so a concurrent reader sees either the old entry or the new one.
/// Files are created with mode 0600 on Unix. An entry whose stored identity
/// differs from the one asked for is never returned.
#[derive(Debug, Clone)]
pub struct FileTokenCache {
    dir: PathBuf,
}

impl FileTokenCache {
    /// Cache rooted at `dir` (created on first write)
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The cache directory
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File holding `identity`'s entry
    #[must_use]
    pub fn path_for(&self, identity: &str) -> PathBuf {
        self.dir.join(format!("{}.json", file_stem(identity)))
    }
}

/// Identity → file stem (`alice@corp.com` → `alice%40corp.com`).
///
/// Lowercase ASCII letters, digits, `.`, `-` and `_` are kept; every other
/// byte, uppercase included, becomes `%XX`. Distinct identities therefore
/// never share a file, even on case-insensitive filesystems.
fn file_stem(identity: &str) -> String {
    let mut stem = String::with_capacity(identity.len());
    for byte in identity.bytes() {
        if byte.is_ascii_lowercase() || byte.is_ascii_digit() || matches!(byte, b'.' | b'-' | b'_') {
            stem.push(char::from(byte));
        } else {
            stem.push_str(&format!("%{byte:02X}"));
        }
    }
    stem
}

fn cache_err(action: &str, path: &Path, e: impl std::fmt::Display) -> AuthError {
    AuthError::Cache(format!("{action} {}: {e}", path.display()))
}

/// Write `bytes` to a uniquely named temp file in `dir`, then rename it
/// over `path`. Concurrent writers of one entry never share a temp file.
fn write_atomically(dir: &Path, path: &Path, bytes: &[u8]) -> Result<(), AuthError> {
    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| cache_err("create temp in", dir, e))?;
    tmp.write_all(bytes)
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|e| cache_err("write", tmp.path(), e))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tmp.as_file()
            .set_permissions(std::fs::Permissions::from_mode(0o600))
            .map_err(|e| cache_err("chmod", tmp.path(), e))?;
    }

    tmp.persist(path)
        .map_err(|e| cache_err("rename", path, e.error))?;
    Ok(())
}

#[async_trait::async_trait]
impl TokenCache for FileTokenCache {
    async fn get(&self, identity: &str) -> Result<Option<CachedSession>, AuthError> {
        let path = self.path_for(identity);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(cache_err("read", &path, e)),
        };
        let entry: CachedSession =
            serde_json::from_slice(&bytes).map_err(|e| cache_err("parse", &path, e))?;
        if entry.identity != identity {
            warn!(
                identity,
                stored = %entry.identity,
                path = %path.display(),
                "cached session belongs to another identity, ignoring"
            );
            return Ok(None);
        }
        Ok(Some(entry))
    }

    async fn put(&self, entry: CachedSession) -> Result<(), AuthError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| cache_err("create", &self.dir, e))?;

        let path = self.path_for(&entry.identity);
        let bytes =
            serde_json::to_vec_pretty(&entry).map_err(|e| cache_err("serialize", &path, e))?;

        let dir = self.dir.clone();
        let target = path.clone();
        tokio::task::spawn_blocking(move || write_atomically(&dir, &target, &bytes))
            .await
            .map_err(|e| cache_err("write", &path, e))??;
        debug!(identity = %entry.identity, path = %path.display(), "session cached");
        Ok(())
    }

    async fn clear(&self, identity: &str) -> Result<(), AuthError> {
        let path = self.path_for(identity);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(cache_err("remove", &path, e)),
        }
    }

    async fn clear_all(&self) -> Result<(), AuthError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(cache_err("list", &self.dir, e)),
        };
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| cache_err("list", &self.dir, e))?
        {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                tokio::fs::remove_file(&path)
                    .await
                    .map_err(|e| cache_err("remove", &path, e))?;
            }
        }
        Ok(())
    }
}
