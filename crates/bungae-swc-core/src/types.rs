use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
  pub start_line: usize,
  pub start_col: usize,
  pub end_line: usize,
  pub end_col: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceType {
  Module,
  Script,
  Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DependencyKind {
  /// `import ... from '...'` / `export ... from '...'`.
  Import,
  /// `require('...')`.
  Require,
  /// `import('...')`.
  DynamicImport,
}

impl DependencyKind {
  /// Whether the runtime will synchronously `__r()` this dependency,
  /// per spec.md §3 Dependency.
  pub fn is_static(&self) -> bool {
    matches!(self, DependencyKind::Import | DependencyKind::Require)
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyDescriptor {
  pub specifier: String,
  pub kind: DependencyKind,
  pub loc: SourceLocation,
  pub is_optional: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportedSymbol {
  pub exported: String,
  pub local: String,
  pub loc: SourceLocation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportedSymbol {
  pub source: String,
  /// `None` for a namespace import (`import * as x`), which marks the
  /// dependency's export usage as `allUsed` for tree-shaking purposes.
  pub imported: Option<String>,
  pub local: String,
  pub loc: SourceLocation,
}

/// A single raw source-map segment, per spec.md §3: generated
/// `(line, col)`, optionally paired with original `(line, col)` and a
/// name index. VLQ-encoding happens in the serializer during composition.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RawMapping {
  pub generated_line: u32,
  pub generated_column: u32,
  pub original: Option<(u32, u32)>,
  pub name: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetMeta {
  pub name: String,
  pub asset_type: String,
  pub width: Option<u32>,
  pub height: Option<u32>,
  pub scales: Vec<f32>,
}
