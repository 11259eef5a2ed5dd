use std::path::PathBuf;

use bungae_resolver::{resolve, Platform, ResolverConfig};
use criterion::{criterion_group, criterion_main, Criterion};

fn bench_relative_resolution(c: &mut Criterion) {
  let dir = assert_fs::TempDir::new().unwrap();
  let root = dir.path();
  std::fs::write(root.join("Button.ios.js"), "export default 1;").unwrap();

  let importer: PathBuf = root.join("App.js");
  let config = ResolverConfig {
    platform: Platform::Ios,
    ..Default::default()
  };

  c.bench_function("resolve relative with platform suffix", |b| {
    b.iter(|| resolve(&importer, "./Button", &config).unwrap())
  });
}

criterion_group!(benches, bench_relative_resolution);
criterion_main!(benches);
