//! Platform-aware, Node.js-compatible module resolver for the bungae
//! bundler. Implements the contract and algorithm described in
//! `spec.md` §4.1.

mod error;
mod package_json;
mod specifier;

pub use error::ResolverError;
pub use package_json::{module_has_side_effects, PackageJson, SideEffects};
pub use specifier::{classify, split_package_specifier, SpecifierKind};

use std::path::{Path, PathBuf};

/// Source extension precedence, per spec.md §4.1.
pub const SOURCE_EXTENSIONS: &[&str] = &["tsx", "ts", "jsx", "js", "mjs", "cjs", "json"];

/// Asset extension list, per spec.md §4.1. An asset match terminates
/// resolution and the returned module is flagged `isAsset`.
pub const ASSET_EXTENSIONS: &[&str] = &[
  "bmp", "gif", "jpg", "jpeg", "png", "webp", "avif", "ico", "icns", "icxl",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
  Ios,
  Android,
  Web,
}

impl Platform {
  fn as_str(&self) -> &'static str {
    match self {
      Platform::Ios => "ios",
      Platform::Android => "android",
      Platform::Web => "web",
    }
  }
}

#[derive(Debug, Clone)]
pub struct ResolverConfig {
  pub platform: Platform,
  /// When true and platform != web, `<base>.native.<ext>` is tried
  /// before the bare `<base>.<ext>` candidate.
  pub prefer_native_platform: bool,
  /// Extra roots searched for `node_modules`, in addition to walking
  /// upward from the importer (monorepo support).
  pub node_modules_paths: Vec<PathBuf>,
}

impl Default for ResolverConfig {
  fn default() -> Self {
    ResolverConfig {
      platform: Platform::Ios,
      prefer_native_platform: true,
      node_modules_paths: Vec::new(),
    }
  }
}

/// The outcome of a successful resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
  pub path: PathBuf,
  pub is_asset: bool,
}

/// `resolve(importer, specifier, platform, config) -> resolvedPath | null`,
/// per spec.md §4.1. Returns `Ok(None)` for an unresolvable specifier that
/// the caller may tolerate (optional dependency); callers that need a hard
/// failure with tried-path diagnostics should use [`resolve_or_err`].
pub fn resolve(
  importer: &Path,
  specifier: &str,
  config: &ResolverConfig,
) -> Result<Option<Resolution>, ResolverError> {
  let mut tried = Vec::new();
  let found = match classify(specifier) {
    SpecifierKind::Relative => resolve_relative(importer, specifier, config, &mut tried)?,
    SpecifierKind::Package => resolve_package(importer, specifier, config, &mut tried)?,
  };
  Ok(found)
}

/// Like [`resolve`] but turns a miss into a `ResolverError::ModuleNotFound`
/// carrying every candidate path that was tried, per spec.md §4.1 Failure
/// semantics.
pub fn resolve_or_err(
  importer: &Path,
  specifier: &str,
  config: &ResolverConfig,
) -> Result<Resolution, ResolverError> {
  let mut tried = Vec::new();
  let found = match classify(specifier) {
    SpecifierKind::Relative => resolve_relative(importer, specifier, config, &mut tried)?,
    SpecifierKind::Package => resolve_package(importer, specifier, config, &mut tried)?,
  };

  found.ok_or_else(|| ResolverError::ModuleNotFound {
    importer: importer.to_path_buf(),
    specifier: specifier.to_string(),
    tried_paths: tried,
  })
}

fn resolve_relative(
  importer: &Path,
  specifier: &str,
  config: &ResolverConfig,
  tried: &mut Vec<PathBuf>,
) -> Result<Option<Resolution>, ResolverError> {
  let dir = importer.parent().unwrap_or_else(|| Path::new("."));
  let base = normalize(&dir.join(specifier));
  resolve_base(&base, config, tried)
}

/// Try the file-candidate rules of spec.md §4.1 (1)-(4) against `base`.
fn resolve_base(
  base: &Path,
  config: &ResolverConfig,
  tried: &mut Vec<PathBuf>,
) -> Result<Option<Resolution>, ResolverError> {
  if let Some(found) = try_file_candidates(base, config, tried) {
    return Ok(Some(found));
  }

  if base.is_dir() {
    let index = base.join("index");
    if let Some(found) = try_file_candidates(&index, config, tried) {
      return Ok(Some(found));
    }
  }

  Ok(None)
}

fn try_file_candidates(
  base: &Path,
  config: &ResolverConfig,
  tried: &mut Vec<PathBuf>,
) -> Option<Resolution> {
  let platform = config.platform.as_str();

  // (1) <base>.<platform>.<ext>
  for ext in SOURCE_EXTENSIONS.iter().chain(ASSET_EXTENSIONS.iter()) {
    let candidate = with_suffix(base, &format!(".{}.{}", platform, ext));
    tried.push(candidate.clone());
    if candidate.is_file() {
      return Some(Resolution {
        is_asset: is_asset_ext(ext),
        path: candidate,
      });
    }
  }

  // (2) <base>.native.<ext>, gated on preferNativePlatform && platform != web
  if config.prefer_native_platform && !matches!(config.platform, Platform::Web) {
    for ext in SOURCE_EXTENSIONS.iter().chain(ASSET_EXTENSIONS.iter()) {
      let candidate = with_suffix(base, &format!(".native.{}", ext));
      tried.push(candidate.clone());
      if candidate.is_file() {
        return Some(Resolution {
          is_asset: is_asset_ext(ext),
          path: candidate,
        });
      }
    }
  }

  // (3) <base>.<ext>
  for ext in SOURCE_EXTENSIONS.iter().chain(ASSET_EXTENSIONS.iter()) {
    let candidate = with_suffix(base, &format!(".{}", ext));
    tried.push(candidate.clone());
    if candidate.is_file() {
      return Some(Resolution {
        is_asset: is_asset_ext(ext),
        path: candidate,
      });
    }
  }

  // An exact match with no extension at all (e.g. a specifier that
  // already names an existing file) is accepted too.
  tried.push(base.to_path_buf());
  if base.is_file() {
    let ext = base.extension().and_then(|e| e.to_str()).unwrap_or("");
    return Some(Resolution {
      is_asset: is_asset_ext(ext),
      path: base.to_path_buf(),
    });
  }

  None
}

fn is_asset_ext(ext: &str) -> bool {
  ASSET_EXTENSIONS.contains(&ext)
}

fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
  let mut s = base.as_os_str().to_owned();
  s.push(suffix);
  PathBuf::from(s)
}

fn resolve_package(
  importer: &Path,
  specifier: &str,
  config: &ResolverConfig,
  tried: &mut Vec<PathBuf>,
) -> Result<Option<Resolution>, ResolverError> {
  let (head, subpath) = split_package_specifier(specifier);
  let start_dir = importer.parent().unwrap_or_else(|| Path::new("."));

  for dir in walk_up(start_dir).chain(config.node_modules_paths.iter().cloned()) {
    let package_dir = dir.join("node_modules").join(head);
    if !package_dir.is_dir() {
      continue;
    }

    if let Some(subpath) = subpath {
      let base = package_dir.join(subpath);
      if let Some(found) = resolve_base(&base, config, tried)? {
        return Ok(Some(found));
      }
      continue;
    }

    let package_json_path = package_dir.join("package.json");
    let entry = if package_json_path.is_file() {
      PackageJson::read(&package_json_path)?.entry_point()
    } else {
      "index.js".to_string()
    };

    let base = normalize(&package_dir.join(&entry));
    if let Some(found) = resolve_base(&base, config, tried)? {
      return Ok(Some(found));
    }
  }

  Ok(None)
}

/// Yields `start`, then each ancestor directory, for `node_modules` walking.
fn walk_up(start: &Path) -> impl Iterator<Item = PathBuf> + '_ {
  let mut current = Some(start.to_path_buf());
  std::iter::from_fn(move || {
    let next = current.clone()?;
    current = next.parent().map(|p| p.to_path_buf());
    Some(next)
  })
}

fn normalize(path: &Path) -> PathBuf {
  let mut result = PathBuf::new();
  for component in path.components() {
    match component {
      std::path::Component::ParentDir => {
        result.pop();
      }
      std::path::Component::CurDir => {}
      other => result.push(other.as_os_str()),
    }
  }
  result
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::fs;

  fn write(path: &Path, contents: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
  }

  /// Scenario 1 from spec.md §8: platform precedence.
  #[test]
  fn platform_precedence_picks_platform_specific_file() {
    let dir = assert_fs::TempDir::new().unwrap();
    let root = dir.path();
    write(&root.join("Button.ios.js"), "export default 1;");
    write(&root.join("Button.android.js"), "export default 2;");
    write(&root.join("Button.js"), "export default 3;");

    let importer = root.join("App.js");
    let config = ResolverConfig {
      platform: Platform::Ios,
      ..Default::default()
    };

    let resolution = resolve(&importer, "./Button", &config).unwrap().unwrap();
    assert_eq!(resolution.path, root.join("Button.ios.js"));
  }

  #[test]
  fn falls_back_to_native_then_bare_extension() {
    let dir = assert_fs::TempDir::new().unwrap();
    let root = dir.path();
    write(&root.join("Widget.native.js"), "export default 1;");
    write(&root.join("Widget.js"), "export default 2;");

    let importer = root.join("App.js");
    let config = ResolverConfig {
      platform: Platform::Android,
      prefer_native_platform: true,
      ..Default::default()
    };

    let resolution = resolve(&importer, "./Widget", &config).unwrap().unwrap();
    assert_eq!(resolution.path, root.join("Widget.native.js"));
  }

  #[test]
  fn web_platform_never_tries_native_suffix() {
    let dir = assert_fs::TempDir::new().unwrap();
    let root = dir.path();
    write(&root.join("Widget.native.js"), "export default 1;");
    write(&root.join("Widget.js"), "export default 2;");

    let importer = root.join("App.js");
    let config = ResolverConfig {
      platform: Platform::Web,
      prefer_native_platform: true,
      ..Default::default()
    };

    let resolution = resolve(&importer, "./Widget", &config).unwrap().unwrap();
    assert_eq!(resolution.path, root.join("Widget.js"));
  }

  #[test]
  fn resolves_directory_to_index() {
    let dir = assert_fs::TempDir::new().unwrap();
    let root = dir.path();
    write(&root.join("lib/index.js"), "export default 1;");

    let importer = root.join("App.js");
    let config = ResolverConfig::default();
    let resolution = resolve(&importer, "./lib", &config).unwrap().unwrap();
    assert_eq!(resolution.path, root.join("lib/index.js"));
  }

  #[test]
  fn asset_match_is_flagged() {
    let dir = assert_fs::TempDir::new().unwrap();
    let root = dir.path();
    write(&root.join("img.png"), "");

    let importer = root.join("App.js");
    let config = ResolverConfig::default();
    let resolution = resolve(&importer, "./img.png", &config).unwrap().unwrap();
    assert!(resolution.is_asset);
  }

  #[test]
  fn resolves_package_via_react_native_field() {
    let dir = assert_fs::TempDir::new().unwrap();
    let root = dir.path();
    write(
      &root.join("node_modules/some-pkg/package.json"),
      r#"{"main": "index.js", "react-native": "native.js"}"#,
    );
    write(&root.join("node_modules/some-pkg/native.js"), "export default 1;");
    write(&root.join("node_modules/some-pkg/index.js"), "export default 2;");

    let importer = root.join("App.js");
    let config = ResolverConfig::default();
    let resolution = resolve(&importer, "some-pkg", &config).unwrap().unwrap();
    assert_eq!(resolution.path, root.join("node_modules/some-pkg/native.js"));
  }

  #[test]
  fn walks_up_to_find_node_modules_in_monorepo() {
    let dir = assert_fs::TempDir::new().unwrap();
    let root = dir.path();
    write(
      &root.join("node_modules/shared/index.js"),
      "export default 1;",
    );

    let importer = root.join("packages/app/src/App.js");
    fs::create_dir_all(importer.parent().unwrap()).unwrap();
    let config = ResolverConfig::default();
    let resolution = resolve(&importer, "shared", &config).unwrap().unwrap();
    assert_eq!(resolution.path, root.join("node_modules/shared/index.js"));
  }

  #[test]
  fn unresolvable_specifier_returns_none() {
    let dir = assert_fs::TempDir::new().unwrap();
    let importer = dir.path().join("App.js");
    let config = ResolverConfig::default();
    assert!(resolve(&importer, "./missing", &config).unwrap().is_none());

    let err = resolve_or_err(&importer, "./missing", &config).unwrap_err();
    match err {
      ResolverError::ModuleNotFound { tried_paths, .. } => assert!(!tried_paths.is_empty()),
      other => panic!("expected ModuleNotFound, got {:?}", other),
    }
  }
}
