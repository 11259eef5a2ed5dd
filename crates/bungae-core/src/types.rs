use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::intern::Interned;
use bungae_swc_core::{AssetMeta, DependencyDescriptor, ExportedSymbol, ImportedSymbol, RawMapping};

pub type ModulePath = Interned<PathBuf>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Platform {
  Ios,
  Android,
  Web,
}

impl Platform {
  pub fn as_str(self) -> &'static str {
    match self {
      Platform::Ios => "ios",
      Platform::Android => "android",
      Platform::Web => "web",
    }
  }
}

impl From<Platform> for bungae_resolver::Platform {
  fn from(value: Platform) -> Self {
    match value {
      Platform::Ios => bungae_resolver::Platform::Ios,
      Platform::Android => bungae_resolver::Platform::Android,
      Platform::Web => bungae_resolver::Platform::Web,
    }
  }
}

impl From<Platform> for bungae_swc_core::Platform {
  fn from(value: Platform) -> Self {
    match value {
      Platform::Ios => bungae_swc_core::Platform::Ios,
      Platform::Android => bungae_swc_core::Platform::Android,
      Platform::Web => bungae_swc_core::Platform::Web,
    }
  }
}

/// The build-time environment a module was transformed under, per
/// spec.md §3.1 (ambient): interned alongside paths since it is a cheap,
/// hot, frequently-compared key threaded through the cache and graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Environment {
  pub platform: Platform,
  pub dev: bool,
}

/// A dependency as recorded in the graph (spec.md §3 `Dependency`):
/// `resolvedPath` is `None` for a tolerated, unresolvable optional import.
#[derive(Debug, Clone)]
pub struct Dependency {
  pub specifier: String,
  pub resolved_path: Option<ModulePath>,
  pub kind: bungae_swc_core::DependencyKind,
  pub is_optional: bool,
}

/// `{ path, code, map, dependencies[], exports[], imports[], hasSideEffects,
/// isAsset, assetMeta? }`, per spec.md §3. The `ast` field named in the
/// spec is intentionally omitted — per spec.md §9 ("AST opacity") the
/// contract is `code + rawMap + deps + exports + imports`, and the AST
/// itself does not outlive a single `transform()` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformedModule {
  pub code: Vec<u8>,
  pub map: Vec<RawMapping>,
  pub dependencies: Vec<Dependency2>,
  pub exports: Vec<ExportedSymbol>,
  pub imports: Vec<ImportedSymbol>,
  pub has_side_effects: bool,
  pub is_asset: bool,
  pub asset_meta: Option<AssetMeta>,
}

/// Serializable twin of [`Dependency`] (interned paths can't serialize
/// without a session-scoped intern map, so the cache stores plain
/// strings and the graph re-interns on load).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dependency2 {
  pub specifier: String,
  pub resolved_path: Option<String>,
  pub kind: bungae_swc_core::DependencyKind,
  pub is_optional: bool,
}

impl From<DependencyDescriptor> for Dependency2 {
  fn from(d: DependencyDescriptor) -> Self {
    Dependency2 {
      specifier: d.specifier,
      resolved_path: None,
      kind: d.kind,
      is_optional: d.is_optional,
    }
  }
}

/// `{ path -> TransformedModule }`, plus entry path and DFS order, per
/// spec.md §3 `Graph`.
#[derive(Debug, Default, Clone)]
pub struct Graph {
  pub entry: Option<ModulePath>,
  pub modules: crate::intern::InternedMap<PathBuf, TransformedModule>,
  pub order: Vec<ModulePath>,
}

/// `{ filePath, httpServerLocation, name, type, width, height, scales[] }`,
/// per spec.md §3 `Asset record`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetRecord {
  pub file_path: String,
  pub http_server_location: String,
  pub name: String,
  #[serde(rename = "type")]
  pub asset_type: String,
  pub width: Option<u32>,
  pub height: Option<u32>,
  pub scales: Vec<f32>,
}

/// Assigns a stable, monotonically increasing non-negative integer to
/// each distinct path on first request — the entry path MUST be the
/// first one requested (spec.md §3, §4.4). Owned per-serialization, not
/// a process-wide singleton (spec.md §9 "Global counters → explicit
/// factory"), to keep bundling reentrant.
#[derive(Debug, Default)]
pub struct ModuleIdFactory {
  ids: crate::intern::InternedMap<PathBuf, u32>,
  next: u32,
}

impl ModuleIdFactory {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn id_for(&mut self, path: ModulePath) -> u32 {
    if let Some(&id) = self.ids.get(&path) {
      return id;
    }
    let id = self.next;
    self.next += 1;
    self.ids.insert(path, id);
    id
  }

  pub fn len(&self) -> usize {
    self.ids.len()
  }

  pub fn is_empty(&self) -> bool {
    self.ids.is_empty()
  }

  /// Looks up a path's id without assigning a fresh one — used by the
  /// dev orchestrator (spec.md §4.5) to recover the id of a module that
  /// was deleted between two builds.
  pub fn id_if_assigned(&self, path: ModulePath) -> Option<u32> {
    self.ids.get(&path).copied()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn entry_assigned_first_is_zero() {
    let mut factory = ModuleIdFactory::new();
    let entry: ModulePath = "/root/entry.js".into();
    let other: ModulePath = "/root/other.js".into();
    assert_eq!(factory.id_for(entry), 0);
    assert_eq!(factory.id_for(other), 1);
    assert_eq!(factory.id_for(entry), 0, "same path always returns the same id");
  }
}
