use std::fmt;

use bungae_resolver::ResolverError;
use bungae_swc_core::TransformError;

/// The five error kinds of the error-handling design, each with its own
/// propagation policy. `Diagnostic` is the single type threaded through
/// `anyhow::Error` at every subsystem boundary.
#[derive(Debug)]
pub enum Diagnostic {
  Resolution {
    importer: String,
    specifier: String,
    tried_paths: Vec<String>,
  },
  Transform(TransformError),
  /// Graph invariant violation — always a bug, never recovered from.
  Graph(String),
  Io {
    path: String,
    message: String,
  },
  /// HMR-only: malformed client frame. Logged and dropped by the caller;
  /// never escalated to a build failure.
  Protocol(String),
}

impl Diagnostic {
  pub fn resolution(importer: impl Into<String>, specifier: impl Into<String>, tried_paths: Vec<String>) -> Self {
    Diagnostic::Resolution {
      importer: importer.into(),
      specifier: specifier.into(),
      tried_paths,
    }
  }

  pub fn graph(message: impl Into<String>) -> Self {
    Diagnostic::Graph(message.into())
  }

  /// Whether the build must abort, vs. degrade to a warning + stub.
  pub fn is_fatal(&self, dev: bool) -> bool {
    match self {
      Diagnostic::Resolution { .. } => !dev,
      Diagnostic::Transform(_) => true,
      Diagnostic::Graph(_) => true,
      Diagnostic::Io { .. } => true,
      Diagnostic::Protocol(_) => false,
    }
  }
}

impl From<ResolverError> for Diagnostic {
  fn from(err: ResolverError) -> Self {
    match err {
      ResolverError::ModuleNotFound {
        importer,
        specifier,
        tried_paths,
      } => Diagnostic::Resolution {
        importer: importer.display().to_string(),
        specifier,
        tried_paths: tried_paths.iter().map(|p| p.display().to_string()).collect(),
      },
      other => Diagnostic::Io {
        path: String::new(),
        message: other.to_string(),
      },
    }
  }
}

impl From<TransformError> for Diagnostic {
  fn from(err: TransformError) -> Self {
    Diagnostic::Transform(err)
  }
}

impl From<std::io::Error> for Diagnostic {
  fn from(err: std::io::Error) -> Self {
    Diagnostic::Io {
      path: String::new(),
      message: err.to_string(),
    }
  }
}

/// Renders the single error block the CLI (external collaborator) is
/// expected to print: path, phase, caret span if available, cause.
impl fmt::Display for Diagnostic {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Diagnostic::Resolution {
        importer,
        specifier,
        tried_paths,
      } => write!(
        f,
        "ResolutionError: cannot resolve '{}' from '{}'\n  tried: {}",
        specifier,
        importer,
        tried_paths.join(", ")
      ),
      Diagnostic::Transform(err) => write!(f, "TransformError: {}", err),
      Diagnostic::Graph(message) => write!(f, "GraphError (bug): {}", message),
      Diagnostic::Io { path, message } => write!(f, "IoError: {} ({})", message, path),
      Diagnostic::Protocol(message) => write!(f, "ProtocolError: {}", message),
    }
  }
}

impl std::error::Error for Diagnostic {}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn resolution_error_is_tolerated_in_dev_and_fatal_in_prod() {
    let d = Diagnostic::resolution("a.js", "./missing", vec!["./missing.js".into()]);
    assert!(!d.is_fatal(true));
    assert!(d.is_fatal(false));
  }

  #[test]
  fn protocol_error_never_escalates() {
    let d = Diagnostic::Protocol("bad frame".into());
    assert!(!d.is_fatal(true));
    assert!(!d.is_fatal(false));
  }
}
