use std::path::{Path, PathBuf};

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::intern::{deserialize_intern, serialize_intern};
use crate::types::TransformedModule;

/// Invalidation key for the on-disk transform cache, per spec.md §3
/// Lifecycles ("invalidation is keyed by `(path, mtime, contentHash)`")
/// and §4.3 Memoization (same, plus `platform, dev`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
  pub path: PathBuf,
  pub mtime_millis: u64,
  pub content_hash: u64,
  pub platform: &'static str,
  pub dev: bool,
}

impl CacheKey {
  /// `sha1(path+mtime+contentHash+platform+dev)`, per spec.md §6.
  fn digest(&self) -> String {
    let mut hasher = sha1_smol::Sha1::new();
    hasher.update(self.path.to_string_lossy().as_bytes());
    hasher.update(self.mtime_millis.to_le_bytes().as_slice());
    hasher.update(self.content_hash.to_le_bytes().as_slice());
    hasher.update(self.platform.as_bytes());
    hasher.update(&[self.dev as u8]);
    hasher.digest().to_string()
  }
}

/// On-disk, content-addressed cache at
/// `<cacheDir>/bungae-transform-cache/<digest>.bin`, plus an in-memory
/// session cache consulted first (spec.md §5 "the transform cache is the
/// only shared mutable state; append-only within a session, guarded by a
/// mutex on write, reader-lock on read" — `DashMap` gives us that
/// sharded read/write behavior directly).
pub struct TransformCache {
  dir: PathBuf,
  session: DashMap<String, TransformedModule>,
  write_lock: Mutex<()>,
}

/// Retries a file read up to twice (three attempts total) with a short
/// backoff before giving up, per spec.md §7: a transient `IoError` is
/// recoverable before it escalates to a fatal diagnostic. This lives here,
/// at the call sites that actually touch disk, rather than as a generic
/// retry wrapper threaded through every I/O path in the crate.
pub(crate) fn read_file_with_retry(path: &Path) -> std::io::Result<Vec<u8>> {
  let mut last_err = None;
  for attempt in 0..3u32 {
    match std::fs::read(path) {
      Ok(bytes) => return Ok(bytes),
      Err(err) => {
        last_err = Some(err);
        if attempt < 2 {
          std::thread::sleep(std::time::Duration::from_millis(10 << attempt));
        }
      }
    }
  }
  Err(last_err.unwrap())
}

impl TransformCache {
  pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
    TransformCache {
      dir: cache_dir.into().join("bungae-transform-cache"),
      session: DashMap::new(),
      write_lock: Mutex::new(()),
    }
  }

  pub fn get(&self, key: &CacheKey) -> Option<TransformedModule> {
    let digest = key.digest();
    if let Some(hit) = self.session.get(&digest) {
      return Some(hit.clone());
    }

    let path = self.entry_path(&digest);
    let bytes = read_file_with_retry(&path).ok()?;
    let module: TransformedModule = deserialize_intern(|| bincode::deserialize(&bytes).ok())?;
    self.session.insert(digest, module.clone());
    Some(module)
  }

  pub fn set(&self, key: &CacheKey, module: TransformedModule) -> std::io::Result<()> {
    let digest = key.digest();
    self.session.insert(digest.clone(), module.clone());

    let _guard = self.write_lock.lock();
    std::fs::create_dir_all(&self.dir)?;
    let bytes = serialize_intern(|| bincode::serialize(&module))
      .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
    std::fs::write(self.entry_path(&digest), bytes)
  }

  fn entry_path(&self, digest: &str) -> PathBuf {
    self.dir.join(format!("{digest}.bin"))
  }

  /// Best-effort LRU reap: deletes entries older than `max_age`. Never
  /// fatal — a reap failure just leaves stale entries on disk, which
  /// spec.md §6 calls harmless.
  pub fn reap_older_than(&self, max_age: std::time::Duration) {
    let Ok(entries) = std::fs::read_dir(&self.dir) else {
      return;
    };
    let now = std::time::SystemTime::now();
    for entry in entries.flatten() {
      let Ok(metadata) = entry.metadata() else { continue };
      let Ok(modified) = metadata.modified() else { continue };
      if now.duration_since(modified).unwrap_or_default() > max_age {
        let _ = std::fs::remove_file(entry.path());
      }
    }
  }
}

/// Reads a file's `(mtime_millis, content_hash)` for use in a [`CacheKey`].
pub fn stat_for_cache_key(path: &Path) -> std::io::Result<(u64, u64)> {
  let metadata = std::fs::metadata(path)?;
  let mtime_millis = metadata
    .modified()?
    .duration_since(std::time::UNIX_EPOCH)
    .unwrap_or_default()
    .as_millis() as u64;
  let bytes = read_file_with_retry(path)?;
  let mut hasher = sha1_smol::Sha1::new();
  hasher.update(&bytes);
  let digest = hasher.digest().bytes();
  let content_hash = u64::from_le_bytes(digest[0..8].try_into().unwrap());
  Ok((mtime_millis, content_hash))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::types::Dependency2;

  fn sample_module() -> TransformedModule {
    TransformedModule {
      code: b"module.exports = 1;".to_vec(),
      map: Vec::new(),
      dependencies: Vec::<Dependency2>::new(),
      exports: Vec::new(),
      imports: Vec::new(),
      has_side_effects: false,
      is_asset: false,
      asset_meta: None,
    }
  }

  #[test]
  fn set_then_get_round_trips_through_disk() {
    let dir = tempfile::tempdir().unwrap();
    let cache = TransformCache::new(dir.path());
    let key = CacheKey {
      path: "/a.js".into(),
      mtime_millis: 1,
      content_hash: 2,
      platform: "ios",
      dev: true,
    };
    cache.set(&key, sample_module()).unwrap();

    let fresh_cache = TransformCache::new(dir.path());
    let hit = fresh_cache.get(&key).expect("cache hit from disk");
    assert_eq!(hit.code, sample_module().code);
  }

  #[test]
  fn miss_returns_none() {
    let dir = tempfile::tempdir().unwrap();
    let cache = TransformCache::new(dir.path());
    let key = CacheKey {
      path: "/missing.js".into(),
      mtime_millis: 0,
      content_hash: 0,
      platform: "ios",
      dev: true,
    };
    assert!(cache.get(&key).is_none());
  }

  #[test]
  fn read_with_retry_succeeds_once_the_file_exists() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a.js");
    std::fs::write(&path, b"ok").unwrap();
    assert_eq!(read_file_with_retry(&path).unwrap(), b"ok");
  }

  #[test]
  fn read_with_retry_gives_up_after_three_attempts() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing.js");
    assert!(read_file_with_retry(&missing).is_err());
  }
}
