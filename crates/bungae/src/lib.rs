mod bundler;
mod dev_session;
mod logging;

pub use bundler::{BuildOutput, Bundler, BundlerOptions};
pub use dev_session::DevSession;
pub use logging::init_tracing;
