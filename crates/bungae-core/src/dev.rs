use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::serializer::wrap_module;
use crate::types::{Graph, ModuleIdFactory, ModulePath, TransformedModule};

/// Client → server frames, per spec.md §4.5/§6 "HMR WebSocket protocol".
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientFrame {
  #[serde(rename = "hmr:connected")]
  Connected {
    #[serde(rename = "bundleEntry")]
    bundle_entry: String,
    platform: String,
  },
  #[serde(rename = "hmr:log")]
  Log { level: String, data: serde_json::Value },
}

/// `{ module: [id, code], sourceURL }`, per spec.md §4.5.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleUpdate {
  pub module: (u32, String),
  #[serde(rename = "sourceURL")]
  pub source_url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateBody {
  pub added: Vec<ModuleUpdate>,
  pub modified: Vec<ModuleUpdate>,
  pub deleted: Vec<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
  pub message: String,
}

/// Server → client frames, per spec.md §6. The server MUST emit
/// `UpdateStart` before and `UpdateDone` after each `Update` batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerFrame {
  #[serde(rename = "update-start")]
  UpdateStart,
  #[serde(rename = "update")]
  Update { body: UpdateBody },
  #[serde(rename = "update-done")]
  UpdateDone,
  #[serde(rename = "error")]
  Error { body: ErrorBody },
}

/// Diffs two graph snapshots into an HMR [`UpdateBody`] (spec.md §4.5:
/// "on file change, retransform only the changed module and its direct
/// dependents"). `ids` is the dev server's long-lived module-id factory,
/// reused across rebuilds rather than recreated per-build — this is what
/// lets a `modified` entry's id match the one assigned during the last
/// full build, per spec.md §8 Scenario 6.
pub fn diff(previous: &Graph, current: &Graph, ids: &mut ModuleIdFactory, project_root: &Path) -> UpdateBody {
  let mut body = UpdateBody::default();

  for &path in &current.order {
    let Some(new_module) = current.modules.get(&path) else { continue };
    let id = ids.id_for(path);
    let source_url = source_url_for(path, project_root);

    match previous.modules.get(&path) {
      None => body.added.push(ModuleUpdate {
        module: (id, render(new_module, id, ids)),
        source_url,
      }),
      Some(old_module) if old_module.code != new_module.code => body.modified.push(ModuleUpdate {
        module: (id, render(new_module, id, ids)),
        source_url,
      }),
      Some(_) => {}
    }
  }

  for &path in &previous.order {
    if current.modules.get(&path).is_none() {
      if let Some(id) = ids.id_if_assigned(path) {
        body.deleted.push(id);
      }
    }
  }

  body
}

fn render(module: &TransformedModule, id: u32, ids: &mut ModuleIdFactory) -> String {
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
  wrap_module(&module.code, id, &dep_ids)
}

fn source_url_for(path: ModulePath, project_root: &Path) -> String {
  path
    .strip_prefix(project_root)
    .unwrap_or(path.as_path())
    .to_string_lossy()
    .replace('\\', "/")
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::types::Dependency2;

  fn module(code: &str) -> TransformedModule {
    TransformedModule {
      code: code.as_bytes().to_vec(),
      map: Vec::new(),
      dependencies: Vec::<Dependency2>::new(),
      exports: Vec::new(),
      imports: Vec::new(),
      has_side_effects: false,
      is_asset: false,
      asset_meta: None,
    }
  }

  fn graph_of(entry: &str, modules: Vec<(&str, TransformedModule)>) -> Graph {
    let mut graph = Graph::default();
    graph.entry = Some(entry.into());
    graph.order = modules.iter().map(|(p, _)| (*p).into()).collect();
    for (path, module) in modules {
      graph.modules.insert(path.into(), module);
    }
    graph
  }

  /// Scenario 6 from spec.md §8: HMR round trip.
  #[test]
  fn modifying_a_non_entry_module_yields_one_modified_entry_with_its_original_id() {
    let before = graph_of(
      "/root/A.js",
      vec![
        ("/root/A.js", module("require(dependencyMap[0]);")),
        ("/root/B.js", module("module.exports = 1;")),
      ],
    );
    let mut ids = ModuleIdFactory::new();
    let entry: ModulePath = "/root/A.js".into();
    let b: ModulePath = "/root/B.js".into();
    assert_eq!(ids.id_for(entry), 0);
    assert_eq!(ids.id_for(b), 1);

    let after = graph_of(
      "/root/A.js",
      vec![
        ("/root/A.js", module("require(dependencyMap[0]);")),
        ("/root/B.js", module("module.exports = 2;")),
      ],
    );

    let body = diff(&before, &after, &mut ids, Path::new("/root"));
    assert_eq!(body.added.len(), 0);
    assert_eq!(body.deleted.len(), 0);
    assert_eq!(body.modified.len(), 1);
    assert_eq!(body.modified[0].module.0, 1);
    assert!(body.modified[0].module.1.contains("module.exports = 2;"));
  }

  #[test]
  fn deleted_module_reports_its_previously_assigned_id() {
    let before = graph_of(
      "/root/A.js",
      vec![
        ("/root/A.js", module("require(dependencyMap[0]);")),
        ("/root/B.js", module("module.exports = 1;")),
      ],
    );
    let mut ids = ModuleIdFactory::new();
    let entry: ModulePath = "/root/A.js".into();
    let b: ModulePath = "/root/B.js".into();
    ids.id_for(entry);
    ids.id_for(b);

    let after = graph_of("/root/A.js", vec![("/root/A.js", module("noop();"))]);

    let body = diff(&before, &after, &mut ids, Path::new("/root"));
    assert_eq!(body.deleted, vec![1]);
  }

  #[test]
  fn new_module_is_reported_as_added() {
    let before = graph_of("/root/A.js", vec![("/root/A.js", module("noop();"))]);
    let mut ids = ModuleIdFactory::new();
    let entry: ModulePath = "/root/A.js".into();
    ids.id_for(entry);

    let after = graph_of(
      "/root/A.js",
      vec![
        ("/root/A.js", module("require(dependencyMap[0]);")),
        ("/root/B.js", module("module.exports = 1;")),
      ],
    );

    let body = diff(&before, &after, &mut ids, Path::new("/root"));
    assert_eq!(body.added.len(), 1);
    assert_eq!(body.added[0].module.0, 1);
  }

  #[test]
  fn server_frames_serialize_to_the_documented_wire_shape() {
    let frame = ServerFrame::UpdateStart;
    assert_eq!(serde_json::to_string(&frame).unwrap(), r#"{"type":"update-start"}"#);
  }
}
