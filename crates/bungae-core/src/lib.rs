pub mod cache;
pub mod dev;
pub mod diagnostic;
pub mod graph;
pub mod intern;
pub mod serializer;
pub mod types;

pub use cache::{stat_for_cache_key, CacheKey, TransformCache};
pub use diagnostic::Diagnostic;
pub use graph::{build, BuildConfig, LoggingProgressSink, ProgressSink};
pub use serializer::{serialize, SerializeOptions, SerializeResult};
pub use types::{
  AssetRecord, Dependency, Dependency2, Environment, Graph, ModuleIdFactory, ModulePath, Platform, TransformedModule,
};
