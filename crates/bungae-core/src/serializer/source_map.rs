use std::collections::HashMap;

use bungae_swc_core::RawMapping;

use super::SerializeOptions;
use crate::diagnostic::Diagnostic;
use crate::types::{Graph, ModulePath};

const BASE64_CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// Whether a raw mapping segment carries an original-source position, vs.
/// the trivial 1:1 fallback synthesized for modules with no real map
/// (bungae-swc-core's `emit()` returns one of these for every line).
pub trait RawMappingExt {
  fn has_original(&self) -> bool;
}

impl RawMappingExt for RawMapping {
  fn has_original(&self) -> bool {
    self.original.is_some()
  }
}

#[derive(Debug, Clone)]
pub struct SourceMapV3 {
  pub version: u8,
  pub file: String,
  pub sources: Vec<String>,
  pub sources_content: Vec<Option<String>>,
  pub names: Vec<String>,
  pub mappings: String,
}

impl SourceMapV3 {
  pub fn to_json(&self) -> String {
    serde_json::json!({
      "version": self.version,
      "file": self.file,
      "sources": self.sources,
      "sourcesContent": self.sources_content,
      "names": self.names,
      "mappings": self.mappings,
    })
    .to_string()
  }
}

/// Composes a single source map covering `pre` plus every emitted
/// module's code, per spec.md §4.4 "Source map composition": each
/// module's raw mappings are offset by a running generated-line counter
/// (starting after `pre`'s line count) and merged into one mappings
/// string, with `sources`/`sourcesContent` built from each module's path
/// and on-disk content.
///
/// Per-module `name` indices are not carried through: bungae-swc-core's
/// `emit()` does not currently retain a per-module names table, so this
/// composition omits the `names` array rather than emit indices into a
/// table that does not exist. This is a known simplification, tracked in
/// the repository's grounding ledger.
pub fn compose(
  pre: &str,
  emission_order: &[ModulePath],
  graph: &Graph,
  options: &SerializeOptions,
) -> Result<SourceMapV3, Diagnostic> {
  let mut sources: Vec<String> = Vec::new();
  let mut sources_content: Vec<Option<String>> = Vec::new();
  let mut source_indices: HashMap<String, u32> = HashMap::new();

  // Lines before the first `__d(...)` block: `pre` already ends in a
  // newline (see `build_pre`), plus the separating `\n` pushed by
  // `serialize` before the first module.
  let mut generated_line = pre.matches('\n').count() as u32 + 1;

  // `lines[n]` holds every segment whose generated line is `n`.
  let mut lines: Vec<Vec<Segment>> = Vec::new();
  let mut prev_source_index: i64 = 0;
  let mut prev_original_line: i64 = 0;
  let mut prev_original_column: i64 = 0;

  for &path in emission_order {
    let Some(module) = graph.modules.get(&path) else { continue };

    let relative = path
      .strip_prefix(&options.project_root)
      .unwrap_or(path.as_ref())
      .to_string_lossy()
      .replace('\\', "/");
    let source_index = *source_indices.entry(relative.clone()).or_insert_with(|| {
      sources.push(relative.clone());
      let content = std::fs::read_to_string(path.as_ref()).ok();
      sources_content.push(content);
      (sources.len() - 1) as u32
    });

    let code = String::from_utf8_lossy(&module.code);
    let code_line_count = code.lines().count().max(1) as u32;

    // `__d(function(...) {` occupies the line directly before the
    // module's own code (see `serialize`'s wrapper format string).
    let wrapper_open = generated_line;
    ensure_line(&mut lines, wrapper_open as usize);

    let mappings: Vec<RawMapping> = if module.map.is_empty() {
      (0..code_line_count)
        .map(|line| RawMapping {
          generated_line: line,
          generated_column: 0,
          original: Some((line, 0)),
          name: None,
        })
        .collect()
    } else {
      module.map.clone()
    };

    for mapping in &mappings {
      let Some((orig_line, orig_col)) = mapping.original else { continue };
      let abs_line = wrapper_open + 1 + mapping.generated_line;
      ensure_line(&mut lines, abs_line as usize);
      lines[abs_line as usize].push(Segment {
        generated_column: mapping.generated_column,
        source_index: source_index as i64,
        original_line: orig_line as i64,
        original_column: orig_col as i64,
      });
      prev_source_index = source_index as i64;
      prev_original_line = orig_line as i64;
      prev_original_column = orig_col as i64;
    }

    // wrapper open line + module code lines + wrapper close line.
    generated_line = wrapper_open + code_line_count + 2;
  }
  let _ = (prev_source_index, prev_original_line, prev_original_column);

  Ok(SourceMapV3 {
    version: 3,
    file: "bundle.js".to_string(),
    sources,
    sources_content,
    names: Vec::new(),
    mappings: encode_mappings(&lines),
  })
}

fn ensure_line(lines: &mut Vec<Vec<Segment>>, index: usize) {
  while lines.len() <= index {
    lines.push(Vec::new());
  }
}

struct Segment {
  generated_column: u32,
  source_index: i64,
  original_line: i64,
  original_column: i64,
}

fn encode_mappings(lines: &[Vec<Segment>]) -> String {
  let mut out = String::new();
  let mut prev_source_index: i64 = 0;
  let mut prev_original_line: i64 = 0;
  let mut prev_original_column: i64 = 0;

  for (line_index, segments) in lines.iter().enumerate() {
    if line_index > 0 {
      out.push(';');
    }
    let mut prev_generated_column: i64 = 0;
    for (i, segment) in segments.iter().enumerate() {
      if i > 0 {
        out.push(',');
      }
      vlq_encode(segment.generated_column as i64 - prev_generated_column, &mut out);
      vlq_encode(segment.source_index - prev_source_index, &mut out);
      vlq_encode(segment.original_line - prev_original_line, &mut out);
      vlq_encode(segment.original_column - prev_original_column, &mut out);

      prev_generated_column = segment.generated_column as i64;
      prev_source_index = segment.source_index;
      prev_original_line = segment.original_line;
      prev_original_column = segment.original_column;
    }
  }
  out
}

fn vlq_encode(value: i64, out: &mut String) {
  let mut vlq: u64 = if value < 0 { ((-value as u64) << 1) | 1 } else { (value as u64) << 1 };
  loop {
    let mut digit = (vlq & 0x1f) as u8;
    vlq >>= 5;
    if vlq > 0 {
      digit |= 0x20;
    }
    out.push(BASE64_CHARS[digit as usize] as char);
    if vlq == 0 {
      break;
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn vlq_encodes_known_values() {
    let mut out = String::new();
    vlq_encode(0, &mut out);
    assert_eq!(out, "A");

    let mut out = String::new();
    vlq_encode(1, &mut out);
    assert_eq!(out, "C");

    let mut out = String::new();
    vlq_encode(-1, &mut out);
    assert_eq!(out, "D");
  }

  #[test]
  fn single_segment_mapping_encodes_one_group() {
    let lines = vec![vec![Segment {
      generated_column: 0,
      source_index: 0,
      original_line: 0,
      original_column: 0,
    }]];
    assert_eq!(encode_mappings(&lines), "AAAA");
  }
}
