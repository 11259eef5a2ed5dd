use std::path::{Path, PathBuf};

use bungae_core::dev::UpdateBody;
use bungae_core::graph::{direct_dependents, retransform_one};
use bungae_core::{BuildConfig, Graph, ModuleIdFactory, ModulePath, TransformCache};

use crate::bundler::{Bundler, BundlerOptions};

/// Long-lived dev-server state: the last full graph, a module-id factory
/// that persists across rebuilds, and the config a full build used — per
/// spec.md §4.5, "the dev server consumes the core's `build` and a
/// narrower `transformOne(path)`".
pub struct DevSession {
  project_root: PathBuf,
  entry: PathBuf,
  config: BuildConfig,
  cache: TransformCache,
  graph: Graph,
  ids: ModuleIdFactory,
}

impl DevSession {
  /// Runs an initial full build and seeds the id factory from it, so the
  /// ids handed out in later `UpdateBody`s line up with the ones any
  /// client that loaded the initial bundle already has registered.
  pub fn start(bundler: &Bundler, entry: &Path) -> anyhow::Result<(Self, bungae_core::serializer::SerializeResult)> {
    let options = &bundler.options;
    let cache = TransformCache::new(options.cache_dir.clone());
    let config = BuildConfig {
      platform: options.platform,
      dev: options.dev,
      resolver_config: options.resolver_config.clone(),
      run_before_main: options.run_before_main.clone(),
      concurrency: options.concurrency,
      asset_http_server_location: options.asset_http_server_location.clone(),
    };

    let graph = bungae_core::build(entry, &config, &cache, &bungae_core::LoggingProgressSink)
      .map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let mut ids = ModuleIdFactory::new();
    if let Some(entry_path) = graph.entry {
      ids.id_for(entry_path);
    }
    for &path in &graph.order {
      ids.id_for(path);
    }

    let run_before_main: Vec<ModulePath> = config.run_before_main.iter().map(|p| p.as_path().into()).collect();
    let serialize_options = bungae_core::SerializeOptions {
      dev: options.dev,
      project_root: bundler.project_root.clone(),
      emit_map: options.dev,
      ..Default::default()
    };
    let initial = bungae_core::serialize(&graph, &run_before_main, &[], &serialize_options)
      .map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let session = DevSession {
      project_root: bundler.project_root.clone(),
      entry: entry.to_path_buf(),
      config,
      cache,
      graph,
      ids,
    };
    Ok((session, initial))
  }

  /// Retransforms `changed` and its direct dependents, then diffs the
  /// result against the previous snapshot — spec.md §4.5's narrower
  /// per-change path, as opposed to `Bundler::build`'s full crawl.
  pub fn on_change(&mut self, changed: &Path) -> anyhow::Result<UpdateBody> {
    let previous = self.graph.clone();

    let changed_path: ModulePath = changed.into();
    let mut to_retransform = vec![changed_path];
    to_retransform.extend(direct_dependents(&self.graph, changed_path));

    for &path in &to_retransform {
      retransform_one(&mut self.graph, path.as_path(), &self.config, &self.cache)
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    }

    Ok(bungae_core::dev::diff(&previous, &self.graph, &mut self.ids, &self.project_root))
  }

  pub fn entry(&self) -> &Path {
    &self.entry
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::bundler::BundlerOptions;
  use std::fs;

  fn write(path: &Path, contents: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
  }

  #[test]
  fn editing_a_dependency_reports_it_modified_with_its_original_id() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(&root.join("index.js"), "require('./lib');");
    write(&root.join("lib.js"), "module.exports = 1;");

    let options = BundlerOptions {
      cache_dir: root.join(".cache"),
      ..Default::default()
    };
    let bundler = Bundler::new(root.to_path_buf(), options);
    let (mut session, _initial) = DevSession::start(&bundler, &root.join("index.js")).unwrap();

    write(&root.join("lib.js"), "module.exports = 2;");
    let update = session.on_change(&root.join("lib.js")).unwrap();

    assert_eq!(update.modified.len(), 1);
    assert!(update.modified[0].module.1.contains("module.exports = 2;"));
    assert_eq!(update.added.len(), 0);
    assert_eq!(update.deleted.len(), 0);
  }
}
