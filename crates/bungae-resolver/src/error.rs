use std::path::PathBuf;
use std::rc::Rc;

/// Recoverable resolution failure, carrying enough context for the graph
/// builder to decide whether to escalate (per spec.md §4.1 Failure semantics).
#[derive(Debug, Clone, serde::Serialize)]
#[serde(tag = "type")]
pub enum ResolverError {
  ModuleNotFound {
    importer: PathBuf,
    specifier: String,
    tried_paths: Vec<PathBuf>,
  },
  PackageJsonNotFound {
    from: PathBuf,
  },
  PackageJsonError {
    path: PathBuf,
    error: JsonError,
  },
  IoError(IOError),
}

#[derive(Debug, Clone)]
pub struct JsonError(Rc<String>);

impl JsonError {
  pub fn new(message: impl Into<String>) -> Self {
    JsonError(Rc::new(message.into()))
  }
}

impl std::fmt::Display for JsonError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

impl serde::Serialize for JsonError {
  fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
  where
    S: serde::Serializer,
  {
    self.0.serialize(serializer)
  }
}

#[derive(Debug, Clone)]
pub struct IOError(Rc<String>);

impl serde::Serialize for IOError {
  fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
  where
    S: serde::Serializer,
  {
    self.0.serialize(serializer)
  }
}

impl std::fmt::Display for ResolverError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      ResolverError::ModuleNotFound {
        importer,
        specifier,
        tried_paths,
      } => write!(
        f,
        "cannot resolve '{}' from {} (tried {} candidates)",
        specifier,
        importer.display(),
        tried_paths.len()
      ),
      ResolverError::PackageJsonNotFound { from } => {
        write!(f, "no package.json found above {}", from.display())
      }
      ResolverError::PackageJsonError { path, error } => {
        write!(f, "invalid package.json at {}: {}", path.display(), error)
      }
      ResolverError::IoError(err) => write!(f, "{}", err.0),
    }
  }
}

impl std::error::Error for ResolverError {}

impl From<std::io::Error> for ResolverError {
  fn from(e: std::io::Error) -> Self {
    ResolverError::IoError(IOError(Rc::new(e.to_string())))
  }
}

impl From<serde_json::Error> for ResolverError {
  fn from(e: serde_json::Error) -> Self {
    ResolverError::PackageJsonError {
      path: PathBuf::new(),
      error: JsonError::new(e.to_string()),
    }
  }
}
