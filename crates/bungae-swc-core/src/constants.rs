use swc_core::common::{Mark, SyntaxContext};
use swc_core::ecma::ast::*;
use swc_core::ecma::visit::{VisitMut, VisitMutWith};

/// Substitutes `__DEV__`, `Platform.OS`, and `process.env.NODE_ENV` with
/// literals, per spec.md §4.2 step 3. Only free (unresolved) identifier
/// references are substituted, never shadowed locals or property names —
/// this runs after the `resolver` pass so `unresolved_mark` identifies
/// globals unambiguously.
pub struct InlineConstants {
  pub dev: bool,
  pub platform: &'static str,
  pub unresolved_mark: Mark,
}

impl InlineConstants {
  fn is_global(&self, ident: &Ident) -> bool {
    ident.span.ctxt == SyntaxContext::empty().apply_mark(self.unresolved_mark)
  }
}

impl VisitMut for InlineConstants {
  fn visit_mut_expr(&mut self, expr: &mut Expr) {
    expr.visit_mut_children_with(self);

    match expr {
      Expr::Ident(ident) if &*ident.sym == "__DEV__" && self.is_global(ident) => {
        *expr = bool_expr(self.dev);
      }
      Expr::Member(member) => {
        if let Some(replacement) = self.try_platform_os(member) {
          *expr = replacement;
        } else if let Some(replacement) = self.try_node_env(member) {
          *expr = replacement;
        }
      }
      _ => {}
    }
  }
}

impl InlineConstants {
  fn try_platform_os(&self, member: &MemberExpr) -> Option<Expr> {
    let obj = member.obj.as_ident()?;
    if &*obj.sym != "Platform" || !self.is_global(obj) {
      return None;
    }
    let prop = member.prop.as_ident()?;
    if &*prop.sym != "OS" {
      return None;
    }
    Some(str_expr(self.platform))
  }

  fn try_node_env(&self, member: &MemberExpr) -> Option<Expr> {
    let inner = member.obj.as_member()?;
    let process = inner.obj.as_ident()?;
    if &*process.sym != "process" || !self.is_global(process) {
      return None;
    }
    if inner.prop.as_ident()?.sym != *"env" {
      return None;
    }
    if member.prop.as_ident()?.sym != *"NODE_ENV" {
      return None;
    }
    Some(str_expr(if self.dev { "development" } else { "production" }))
  }
}

fn bool_expr(value: bool) -> Expr {
  Expr::Lit(Lit::Bool(Bool {
    span: Default::default(),
    value,
  }))
}

fn str_expr(value: &str) -> Expr {
  Expr::Lit(Lit::Str(Str {
    span: Default::default(),
    value: value.into(),
    raw: None,
  }))
}
