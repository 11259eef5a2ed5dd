use swc_core::ecma::ast::Module;
use swc_core::ecma::transforms::optimization::simplify::{dead_branch_remover, expr_simplifier};
use swc_core::ecma::visit::FoldWith;

/// Production-only dead-code elimination, per spec.md §4.2 step 7: once
/// `__DEV__`/`Platform.OS`/`process.env.NODE_ENV` have been inlined to
/// literals, branches that statically reduce to `false` are removed
/// entirely (`if (__DEV__) {...}`, `__DEV__ && expr`, `__DEV__ ? a : b`).
/// No `require` inside an eliminated branch contributes a dependency,
/// because this pass runs before dependency collection.
pub fn eliminate_dead_branches(module: Module) -> Module {
  let module = module.fold_with(&mut expr_simplifier(Default::default()));
  module.fold_with(&mut dead_branch_remover(Default::default()))
}
