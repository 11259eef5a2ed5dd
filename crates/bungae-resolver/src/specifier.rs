/// Classification of an import/require specifier as written in source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecifierKind {
  /// Starts with `./` or `../`.
  Relative,
  /// Anything else — a bare package specifier, possibly scoped (`@scope/name`).
  Package,
}

pub fn classify(specifier: &str) -> SpecifierKind {
  if specifier.starts_with("./") || specifier.starts_with("../") || specifier == "." || specifier == ".." {
    SpecifierKind::Relative
  } else {
    SpecifierKind::Package
  }
}

/// Splits a bare package specifier into its package head (`@scope/name` or
/// `name`) and the remaining subpath, if any (e.g. `lodash/merge` ->
/// `("lodash", Some("merge"))`).
pub fn split_package_specifier(specifier: &str) -> (&str, Option<&str>) {
  if let Some(rest) = specifier.strip_prefix('@') {
    if let Some(slash) = rest.find('/') {
      let after_scope = &rest[slash + 1..];
      return match after_scope.find('/') {
        Some(sub) => (
          &specifier[..slash + 2 + sub],
          Some(&specifier[slash + 2 + sub + 1..]),
        ),
        None => (specifier, None),
      };
    }
    return (specifier, None);
  }

  match specifier.find('/') {
    Some(slash) => (&specifier[..slash], Some(&specifier[slash + 1..])),
    None => (specifier, None),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn classifies_relative_vs_package() {
    assert_eq!(classify("./Button"), SpecifierKind::Relative);
    assert_eq!(classify("../utils/Button"), SpecifierKind::Relative);
    assert_eq!(classify("react"), SpecifierKind::Package);
    assert_eq!(classify("@scope/pkg"), SpecifierKind::Package);
  }

  #[test]
  fn splits_package_head() {
    assert_eq!(split_package_specifier("lodash"), ("lodash", None));
    assert_eq!(
      split_package_specifier("lodash/merge"),
      ("lodash", Some("merge"))
    );
    assert_eq!(
      split_package_specifier("@scope/pkg"),
      ("@scope/pkg", None)
    );
    assert_eq!(
      split_package_specifier("@scope/pkg/sub/path"),
      ("@scope/pkg", Some("sub/path"))
    );
  }
}
