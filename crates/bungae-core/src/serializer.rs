mod source_map;

pub use source_map::{RawMappingExt, SourceMapV3};

use std::path::{Path, PathBuf};

use crate::diagnostic::Diagnostic;
use crate::types::{AssetRecord, Graph, ModuleIdFactory, ModulePath};

pub const RUNTIME_PRELUDE: &str = include_str!("serializer/runtime.js");

#[derive(Debug, Clone)]
pub struct SerializeOptions {
  pub dev: bool,
  pub project_root: PathBuf,
  /// e.g. `("__BUNGAE_BUNDLER__", "true")`, appended to the preamble.
  pub extra_vars: Vec<(String, String)>,
  pub require_cycle_ignore_patterns: Vec<String>,
  /// `Some(name)` emits `//# sourceMappingURL=<name>`; `None` with
  /// `emit_map = true` inlines the map as a base64 `data:` URL.
  pub source_map_filename: Option<String>,
  pub emit_map: bool,
  pub asset_exts: Vec<&'static str>,
}

impl Default for SerializeOptions {
  fn default() -> Self {
    SerializeOptions {
      dev: true,
      project_root: PathBuf::from("."),
      extra_vars: vec![("__BUNGAE_BUNDLER__".into(), "true".into())],
      require_cycle_ignore_patterns: vec![r"(^|[/\\])node_modules($|[/\\])".into()],
      source_map_filename: None,
      emit_map: true,
      asset_exts: bungae_resolver::ASSET_EXTENSIONS.to_vec(),
    }
  }
}

pub struct SerializeResult {
  pub code: Vec<u8>,
  pub map: Option<SourceMapV3>,
  pub assets: Vec<AssetRecord>,
}

/// `serialize(entryPath, prependModules[], graphModules[], options) ->
/// { pre, modules: [id, code][], post }`, per spec.md §4.4.
///
/// `run_before_main` are additional graph roots (e.g. `InitializeCore`)
/// that get `__d`-wrapped like any module and `__r()`'d before the
/// entry; `polyfills` are raw top-level code blocks that run directly in
/// `pre` without a `__d` wrapper, per spec.md §4.4 Prelude item 3.
pub fn serialize(
  graph: &Graph,
  run_before_main: &[ModulePath],
  polyfills: &[Vec<u8>],
  options: &SerializeOptions,
) -> Result<SerializeResult, Diagnostic> {
  let entry = graph.entry.ok_or_else(|| Diagnostic::graph("graph has no entry path"))?;

  let mut ids = ModuleIdFactory::new();
  // The entry path MUST be the first path passed to the factory
  // (spec.md §3, §4.4), regardless of emission order below.
  let entry_id = ids.id_for(entry);
  let run_before_main_ids: Vec<u32> = run_before_main.iter().map(|&path| ids.id_for(path)).collect();

  let mut emission_order: Vec<ModulePath> = Vec::new();
  let mut seen = std::collections::HashSet::new();
  for &path in run_before_main.iter().chain(graph.order.iter()) {
    if seen.insert(path) {
      emission_order.push(path);
    }
  }

  let mut modules = Vec::with_capacity(emission_order.len());
  for &path in &emission_order {
    let id = ids.id_for(path);
    let module = graph
      .modules
      .get(&path)
      .ok_or_else(|| Diagnostic::graph(format!("module {} missing from graph at serialize time", path.display())))?;

    let dep_ids: Vec<String> = module
      .dependencies
      .iter()
      .map(|dep| match &dep.resolved_path {
        Some(resolved) => {
          let dep_path: ModulePath = resolved.as_str().into();
          ids.id_for(dep_path).to_string()
        }
        None => "null".to_string(),
      })
      .collect();

    modules.push((id, wrap_module(&module.code, id, &dep_ids)));
  }

  let pre = build_pre(options.dev, &options.extra_vars, &options.require_cycle_ignore_patterns, polyfills);
  let post = build_post(&run_before_main_ids, entry_id);

  let mut code = String::new();
  code.push_str(&pre);
  code.push('\n');
  for (_, module_code) in &modules {
    code.push_str(module_code);
    code.push('\n');
  }
  code.push_str(&post);

  let map = if options.emit_map {
    Some(source_map::compose(&pre, &emission_order, graph, options)?)
  } else {
    None
  };

  if let Some(map) = &map {
    if let Some(filename) = &options.source_map_filename {
      code.push_str(&format!("\n//# sourceMappingURL={filename}\n"));
    } else {
      let json = map.to_json();
      let encoded = base64::encode(json.as_bytes());
      code.push_str(&format!(
        "\n//# sourceMappingURL=data:application/json;charset=utf-8;base64,{encoded}\n"
      ));
    }
  }

  let assets = extract_assets(graph, &emission_order, &options.project_root, &options.asset_exts);

  Ok(SerializeResult {
    code: code.into_bytes(),
    map,
    assets,
  })
}

/// `__d(function(global, require, ..., dependencyMap) { <code> }, id, [depIds]);`
/// — the canonical module-registration wrapper, per spec.md §4.4. Shared
/// with the dev orchestrator (`dev.rs`) so a hot-reloaded module's source
/// is byte-identical in shape to one emitted by a full build.
pub(crate) fn wrap_module(code: &[u8], id: u32, dep_ids: &[String]) -> String {
  format!(
    "__d(function(global, require, _importDefaultUnused, _importAllUnused, module, exports, dependencyMap) {{\n{}\n}}, {}, [{}]);",
    String::from_utf8_lossy(code),
    id,
    dep_ids.join(", "),
  )
}

fn build_pre(dev: bool, extra_vars: &[(String, String)], ignore_patterns: &[String], polyfills: &[Vec<u8>]) -> String {
  let mut pre = String::new();
  pre.push_str(&format!(
    "var __DEV__ = {dev}, __BUNDLE_START_TIME__ = globalThis.nativePerformanceNow ? nativePerformanceNow() : Date.now();\n"
  ));
  for (name, value) in extra_vars {
    pre.push_str(&format!("{name} = {value};\n"));
  }
  pre.push_str(RUNTIME_PRELUDE);
  pre.push_str(&format!(
    "\n__bungaeRequireCycleIgnorePatterns = {};\n",
    serde_json::to_string(ignore_patterns).unwrap_or_else(|_| "[]".into())
  ));
  for polyfill in polyfills {
    pre.push_str(&String::from_utf8_lossy(polyfill));
    pre.push('\n');
  }
  pre
}

fn build_post(run_before_main_ids: &[u32], entry_id: u32) -> String {
  let mut post = String::new();
  for id in run_before_main_ids {
    post.push_str(&format!("__r({id});\n"));
  }
  post.push_str(&format!("__r({entry_id});\n"));
  post
}

fn extract_assets(
  graph: &Graph,
  emission_order: &[ModulePath],
  project_root: &Path,
  asset_exts: &[&str],
) -> Vec<AssetRecord> {
  let mut assets = Vec::new();
  for &path in emission_order {
    let Some(module) = graph.modules.get(&path) else { continue };
    if !module.is_asset {
      continue;
    }
    let Some(meta) = &module.asset_meta else { continue };
    let ext_ok = path
      .extension()
      .and_then(|e| e.to_str())
      .map(|e| asset_exts.contains(&e))
      .unwrap_or(false);
    if !ext_ok {
      continue;
    }

    let relative_dir = path
      .parent()
      .and_then(|p| p.strip_prefix(project_root).ok())
      .map(|p| p.to_string_lossy().replace('\\', "/"))
      .unwrap_or_default();
    let http_server_location = if relative_dir.is_empty() {
      "/assets".to_string()
    } else {
      format!("/assets/{relative_dir}")
    };

    assets.push(AssetRecord {
      file_path: path.display().to_string(),
      http_server_location,
      name: meta.name.clone(),
      asset_type: meta.asset_type.clone(),
      width: meta.width,
      height: meta.height,
      scales: meta.scales.clone(),
    });
  }
  assets
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::types::{Dependency2, TransformedModule};

  fn module(code: &str, deps: Vec<Dependency2>, has_side_effects: bool) -> TransformedModule {
    TransformedModule {
      code: code.as_bytes().to_vec(),
      map: Vec::new(),
      dependencies: deps,
      exports: Vec::new(),
      imports: Vec::new(),
      has_side_effects,
      is_asset: false,
      asset_meta: None,
    }
  }

  fn graph_with(entry: &str, modules: Vec<(&str, TransformedModule)>) -> Graph {
    let mut graph = Graph::default();
    let entry_path: ModulePath = entry.into();
    graph.entry = Some(entry_path);
    graph.order = modules.iter().map(|(p, _)| (*p).into()).collect();
    for (path, module) in modules {
      graph.modules.insert(path.into(), module);
    }
    graph
  }

  #[test]
  fn entry_gets_module_id_zero() {
    let graph = graph_with(
      "/root/A.js",
      vec![("/root/A.js", module("exports.x = 1;", vec![], false))],
    );
    let options = SerializeOptions {
      emit_map: false,
      ..Default::default()
    };
    let result = serialize(&graph, &[], &[], &options).unwrap();
    let code = String::from_utf8(result.code).unwrap();
    assert!(code.contains(", 0, []"));
    assert!(code.contains("__r(0);"));
  }

  #[test]
  fn dependency_map_uses_target_module_id() {
    let graph = graph_with(
      "/root/A.js",
      vec![
        (
          "/root/A.js",
          module(
            "require(dependencyMap[0]);",
            vec![Dependency2 {
              specifier: "./B".into(),
              resolved_path: Some("/root/B.js".into()),
              kind: bungae_swc_core::DependencyKind::Require,
              is_optional: false,
            }],
            false,
          ),
        ),
        ("/root/B.js", module("module.exports = 2;", vec![], false)),
      ],
    );
    let options = SerializeOptions {
      emit_map: false,
      ..Default::default()
    };
    let result = serialize(&graph, &[], &[], &options).unwrap();
    let code = String::from_utf8(result.code).unwrap();
    assert!(code.contains(", 0, [1]"));
  }
}
