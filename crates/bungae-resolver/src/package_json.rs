use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ResolverError;

/// Retries a text file read up to twice (three attempts total) with a
/// short backoff before giving up, per spec.md §7: a transient `IoError`
/// is recoverable before it escalates. Lives at this call site rather
/// than as a generic retry wrapper, matching `bungae-core::cache`'s own
/// `read_file_with_retry`.
fn read_to_string_with_retry(path: &Path) -> std::io::Result<String> {
  let mut last_err = None;
  for attempt in 0..3u32 {
    match std::fs::read_to_string(path) {
      Ok(contents) => return Ok(contents),
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

/// The subset of `package.json` the resolver needs: entry-point fields,
/// per spec.md §4.1 Package resolution ("react-native" field when present,
/// else "browser", else "main", else "index.js").
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PackageJson {
  pub name: Option<String>,
  #[serde(default)]
  pub main: Option<String>,
  #[serde(default)]
  pub browser: Option<BrowserField>,
  #[serde(rename = "react-native", default)]
  pub react_native: Option<BrowserField>,
  #[serde(rename = "sideEffects", default)]
  pub side_effects: Option<SideEffects>,
}

/// `sideEffects` is either a blanket bool or a list of glob patterns
/// naming the files that DO have side effects, per spec.md §4.3.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SideEffects {
  Bool(bool),
  Globs(Vec<String>),
}

/// The `browser`/`react-native` fields may be a string (single main
/// replacement) or a map of path substitutions; we only need the string
/// form to pick an entry point, but we keep the map for callers that want
/// to apply substitutions.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum BrowserField {
  Main(String),
  Map(indexmap::IndexMap<String, serde_json::Value>),
}

impl PackageJson {
  pub fn read(path: &Path) -> Result<PackageJson, ResolverError> {
    let contents = read_to_string_with_retry(path)?;
    serde_json::from_str(&contents).map_err(|e| ResolverError::PackageJsonError {
      path: path.to_path_buf(),
      error: crate::error::JsonError::new(e.to_string()),
    })
  }

  /// Resolve the main entry point following the precedence in spec.md §4.1:
  /// `react-native` field, else `browser`, else `main`, else `index.js`.
  pub fn entry_point(&self) -> String {
    for field in [&self.react_native, &self.browser] {
      if let Some(BrowserField::Main(main)) = field {
        return main.clone();
      }
    }
    self.main.clone().unwrap_or_else(|| "index.js".to_string())
  }

  /// Whether `module_path` (somewhere under `package_dir`) has side
  /// effects per this package's `sideEffects` field, with glob matching
  /// against the path relative to `package_dir` — spec.md §4.3's
  /// "walking enclosing package.json `sideEffects` fields, with matching
  /// glob patterns". A package with no `sideEffects` field at all
  /// defaults to `true`, the same non-elidable default every bundler in
  /// this space falls back to.
  pub fn module_has_side_effects(&self, package_dir: &Path, module_path: &Path) -> bool {
    match &self.side_effects {
      None => true,
      Some(SideEffects::Bool(keep_everything)) => *keep_everything,
      Some(SideEffects::Globs(patterns)) => {
        let Ok(relative) = module_path.strip_prefix(package_dir) else {
          return true;
        };
        let relative = relative.to_string_lossy().replace('\\', "/");
        patterns.iter().any(|pattern| {
          let pattern = pattern.strip_prefix("./").unwrap_or(pattern);
          glob_match::glob_match(pattern, &relative)
        })
      }
    }
  }
}

/// Walk upward from `start` looking for the nearest `package.json`.
pub fn find_nearest_package_json(start: &Path) -> Option<PathBuf> {
  let mut dir = if start.is_dir() {
    Some(start.to_path_buf())
  } else {
    start.parent().map(|p| p.to_path_buf())
  };

  while let Some(current) = dir {
    let candidate = current.join("package.json");
    if candidate.is_file() {
      return Some(candidate);
    }
    dir = current.parent().map(|p| p.to_path_buf());
  }

  None
}

/// Walks upward from `module_path` and resolves whether that module has
/// side effects per the nearest enclosing `package.json`, per spec.md
/// §4.3. Defaults to `true` when no `package.json` is found or it fails
/// to parse — the same safe, non-elidable default an absent field gets.
pub fn module_has_side_effects(module_path: &Path) -> bool {
  let Some(package_json_path) = find_nearest_package_json(module_path) else {
    return true;
  };
  let Ok(package) = PackageJson::read(&package_json_path) else {
    return true;
  };
  let package_dir = package_json_path.parent().unwrap_or_else(|| Path::new(""));
  package.module_has_side_effects(package_dir, module_path)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn picks_react_native_field_over_browser_and_main() {
    let pkg: PackageJson = serde_json::from_str(
      r#"{"main": "index.js", "browser": "browser.js", "react-native": "native.js"}"#,
    )
    .unwrap();
    assert_eq!(pkg.entry_point(), "native.js");
  }

  #[test]
  fn falls_back_to_main_then_index() {
    let pkg: PackageJson = serde_json::from_str(r#"{"main": "lib/index.js"}"#).unwrap();
    assert_eq!(pkg.entry_point(), "lib/index.js");

    let pkg: PackageJson = serde_json::from_str(r#"{}"#).unwrap();
    assert_eq!(pkg.entry_point(), "index.js");
  }

  #[test]
  fn missing_side_effects_field_defaults_to_true() {
    let pkg: PackageJson = serde_json::from_str(r#"{"main": "index.js"}"#).unwrap();
    assert!(pkg.module_has_side_effects(Path::new("/pkg"), Path::new("/pkg/src/util.js")));
  }

  #[test]
  fn side_effects_false_elides_every_module() {
    let pkg: PackageJson = serde_json::from_str(r#"{"sideEffects": false}"#).unwrap();
    assert!(!pkg.module_has_side_effects(Path::new("/pkg"), Path::new("/pkg/src/util.js")));
  }

  #[test]
  fn side_effects_glob_list_only_matches_named_files() {
    let pkg: PackageJson = serde_json::from_str(r#"{"sideEffects": ["./src/*.css", "polyfill.js"]}"#).unwrap();
    assert!(pkg.module_has_side_effects(Path::new("/pkg"), Path::new("/pkg/src/app.css")));
    assert!(pkg.module_has_side_effects(Path::new("/pkg"), Path::new("/pkg/polyfill.js")));
    assert!(!pkg.module_has_side_effects(Path::new("/pkg"), Path::new("/pkg/src/util.js")));
  }
}
