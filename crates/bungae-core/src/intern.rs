use std::{
  collections::{HashMap, HashSet},
  fmt::{Debug, Display},
  hash::{BuildHasherDefault, Hash, Hasher},
  ops::Deref,
  path::{Path, PathBuf},
  sync::OnceLock,
};

use dashmap::{DashMap, SharedValue};
use gxhash::{GxBuildHasher, GxHasher};
use scoped_tls::scoped_thread_local;
use serde::{Deserialize, Serialize};

/// An Interned value is a unique pointer to a value.
/// Interned values are very cheap to compare, clone, and hash,
/// but they are never freed until the program exits.
pub struct Interned<T: 'static + Sized>(&'static Entry<T>);

/// An Interner is what stores unique interned values.
pub struct Interner<T: 'static + Sized> {
  map: DashMap<&'static T, &'static Entry<T>, GxBuildHasher>,
}

struct Entry<T: Sized> {
  data: T,
  hash: u64,
}

impl<T: Hash + Eq> Interner<T> {
  pub fn new() -> Self {
    Self {
      map: DashMap::with_hasher(GxBuildHasher::default()),
    }
  }

  pub fn intern(&self, value: T) -> Interned<T> {
    // DashMap shards by hash; check under a read lock first to avoid
    // taking a write lock on the common (already-interned) path.
    let shard = self.map.determine_map(&value);
    {
      let map = self.map.shards()[shard].read();
      if let Some(entry) = map.get(&value) {
        return Interned(entry.get());
      }
    }

    let hash = hash_value(&value);
    let entry: &'static Entry<T> = Box::leak(Box::new(Entry { data: value, hash }));
    let mut map = self.map.shards()[shard].write();
    map.insert(&entry.data, SharedValue::new(entry));
    Interned(entry)
  }
}

fn hash_value<T: Hash>(value: &T) -> u64 {
  let mut hasher = GxHasher::default();
  value.hash(&mut hasher);
  hasher.finish()
}

impl<T> AsRef<T> for Interned<T> {
  fn as_ref(&self) -> &T {
    &self.0.data
  }
}

impl<T> Deref for Interned<T> {
  type Target = T;

  fn deref(&self) -> &Self::Target {
    &self.0.data
  }
}

impl<T: Debug> Debug for Interned<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    self.0.data.fmt(f)
  }
}

impl<T: Display> Display for Interned<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    self.0.data.fmt(f)
  }
}

impl<T: PartialEq> PartialEq for Interned<T> {
  fn eq(&self, other: &Self) -> bool {
    std::ptr::eq(self.0, other.0)
  }
}

impl<T: Eq> Eq for Interned<T> {}

impl<T: PartialOrd> PartialOrd for Interned<T> {
  fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
    if std::ptr::eq(self.0, other.0) {
      Some(std::cmp::Ordering::Equal)
    } else {
      self.0.data.partial_cmp(&other.0.data)
    }
  }
}

impl<T> Hash for Interned<T> {
  fn hash<H: Hasher>(&self, state: &mut H) {
    state.write_u64(self.0.hash);
  }
}

impl<T> Clone for Interned<T> {
  fn clone(&self) -> Self {
    Interned(self.0)
  }
}

impl<T> Copy for Interned<T> {}

// When serialized, interned values are deduplicated by storing a (type
// erased) pointer in a map, and returning a reference on repeat hits.
struct Erased;
scoped_thread_local!(static SER_MAP: DashMap<*const Erased, u32, BuildHasherDefault<IdentityHasher>>);
scoped_thread_local!(static DE_MAP: DashMap<usize, *const Erased, BuildHasherDefault<IdentityHasher>>);

pub fn serialize_intern<R, F: FnOnce() -> R>(f: F) -> R {
  SER_MAP.set(&DashMap::default(), f)
}

pub fn deserialize_intern<R, F: FnOnce() -> R>(f: F) -> R {
  DE_MAP.set(&DashMap::default(), f)
}

#[derive(Serialize, Deserialize)]
enum Serialized<T: 'static> {
  Value(T),
  Reference(u32),
}

impl<T: Serialize + Debug + Clone> Serialize for Interned<T> {
  fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
  where
    S: serde::Serializer,
  {
    if serializer.is_human_readable() {
      self.0.data.serialize(serializer)
    } else {
      let ptr = self.0 as *const Entry<T> as *const Erased;
      SER_MAP.with(|map| {
        if let Some(idx) = map.get(&ptr) {
          Serialized::<T>::Reference(*idx).serialize(serializer)
        } else {
          let v = Serialized::Value(&self.0.data);
          let res = v.serialize(serializer);
          map.insert(ptr, map.len() as u32);
          res
        }
      })
    }
  }
}

impl<'de, T: Debug + Deserialize<'de> + Into<Interned<T>>> Deserialize<'de> for Interned<T> {
  fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
  where
    D: serde::Deserializer<'de>,
  {
    if deserializer.is_human_readable() {
      let v: T = Deserialize::deserialize(deserializer)?;
      Ok(v.into())
    } else {
      let s: Serialized<T> = Serialized::deserialize(deserializer)?;
      DE_MAP.with(|map| match s {
        Serialized::Value(v) => {
          let interned = v.into();
          map.insert(map.len(), interned.0 as *const Entry<T> as *const Erased);
          Ok(interned)
        }
        Serialized::Reference(idx) => {
          let ptr = map.get(&(idx as usize)).unwrap();
          Ok(Interned(unsafe { &*(*ptr as *const Entry<T>) }))
        }
      })
    }
  }
}

/// A hasher that just passes through a value that is already a hash.
#[derive(Default)]
pub struct IdentityHasher {
  hash: u64,
}

impl Hasher for IdentityHasher {
  fn write(&mut self, bytes: &[u8]) {
    if bytes.len() == 8 {
      self.hash = u64::from_ne_bytes(bytes.try_into().unwrap());
    } else {
      unreachable!()
    }
  }

  fn finish(&self) -> u64 {
    self.hash
  }
}

pub type InternedSet<T> = HashSet<Interned<T>, BuildHasherDefault<IdentityHasher>>;
pub type InternedMap<K, V> = HashMap<Interned<K>, V, BuildHasherDefault<IdentityHasher>>;

fn path_interner() -> &'static Interner<PathBuf> {
  static INTERNER: OnceLock<Interner<PathBuf>> = OnceLock::new();
  INTERNER.get_or_init(Interner::new)
}

impl From<PathBuf> for Interned<PathBuf> {
  fn from(value: PathBuf) -> Self {
    path_interner().intern(value)
  }
}

impl From<&Path> for Interned<PathBuf> {
  fn from(value: &Path) -> Self {
    path_interner().intern(value.to_owned())
  }
}

impl From<&str> for Interned<PathBuf> {
  fn from(value: &str) -> Self {
    path_interner().intern(value.into())
  }
}

impl PartialEq<&Path> for Interned<PathBuf> {
  fn eq(&self, other: &&Path) -> bool {
    self.0.data == *other
  }
}

#[cfg(test)]
mod tests {
  use super::Interned;
  use crate::intern::{deserialize_intern, serialize_intern};
  use std::path::PathBuf;

  #[test]
  fn equal_paths_intern_to_the_same_pointer() {
    let a: Interned<PathBuf> = "/a/b.js".into();
    let b: Interned<PathBuf> = PathBuf::from("/a/b.js").into();
    assert_eq!(a, b);
  }

  #[derive(serde::Serialize, serde::Deserialize, Debug, PartialEq)]
  struct Pair {
    a: Interned<PathBuf>,
    b: Interned<PathBuf>,
  }

  #[test]
  fn bincode_round_trip_dedups_repeat_values() {
    let pair = Pair {
      a: "/x.js".into(),
      b: "/x.js".into(),
    };
    let mut bytes = Vec::new();
    serialize_intern(|| bincode::serialize_into(&mut bytes, &pair).unwrap());
    let decoded: Pair = deserialize_intern(|| bincode::deserialize(&bytes).unwrap());
    assert_eq!(decoded, pair);
  }
}
