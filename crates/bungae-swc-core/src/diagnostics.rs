use serde::Serialize;

/// Which step of spec.md §4.2 produced the failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TransformPhase {
  Parse,
  StripTypes,
  InlineConstants,
  Jsx,
  ClassLowering,
  ModuleRewrite,
  Dce,
  Asset,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransformError {
  pub path: String,
  pub phase: TransformPhase,
  pub line: usize,
  pub column: usize,
  pub message: String,
}

impl std::fmt::Display for TransformError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(
      f,
      "{}:{}:{}: {:?}: {}",
      self.path, self.line, self.column, self.phase, self.message
    )
  }
}

impl std::error::Error for TransformError {}
