use indexmap::IndexMap;
use swc_core::common::{SourceMap, Span};
use swc_core::ecma::ast::*;
use swc_core::ecma::visit::{VisitMut, VisitMutWith};
use std::sync::Arc;

use crate::types::{DependencyDescriptor, DependencyKind, ExportedSymbol, ImportedSymbol, SourceLocation};

/// Converts every `import` declaration and every `require(<string-literal>)`
/// call into the canonical `require(dependencyMap[i])` form, and lowers
/// `export` declarations to `exports`/`module.exports` assignments, per
/// spec.md §4.2 step 6. Duplicate specifiers share one index, in the order
/// first requested.
///
/// Module interop is intentionally the simplest structural equivalent —
/// default bindings are read off a `.default` property rather than
/// through a Babel-style `_interopRequireDefault` helper — since spec.md's
/// Non-goals explicitly exclude byte-for-byte Metro compatibility.
pub struct ModuleRewriter {
  source_map: Arc<SourceMap>,
  dependencies: IndexMap<String, DepEntry>,
  pub exports: Vec<ExportedSymbol>,
  pub imports: Vec<ImportedSymbol>,
}

struct DepEntry {
  index: usize,
  kind: DependencyKind,
  loc: SourceLocation,
  is_optional: bool,
}

impl ModuleRewriter {
  pub fn new(source_map: Arc<SourceMap>) -> Self {
    ModuleRewriter {
      source_map,
      dependencies: IndexMap::new(),
      exports: Vec::new(),
      imports: Vec::new(),
    }
  }

  pub fn into_dependencies(self) -> Vec<DependencyDescriptor> {
    let mut out: Vec<(usize, DependencyDescriptor)> = self
      .dependencies
      .into_iter()
      .map(|(specifier, entry)| {
        (
          entry.index,
          DependencyDescriptor {
            specifier,
            kind: entry.kind,
            loc: entry.loc,
            is_optional: entry.is_optional,
          },
        )
      })
      .collect();
    out.sort_by_key(|(i, _)| *i);
    out.into_iter().map(|(_, d)| d).collect()
  }

  fn loc(&self, span: Span) -> SourceLocation {
    let lo = self.source_map.lookup_char_pos(span.lo);
    let hi = self.source_map.lookup_char_pos(span.hi);
    SourceLocation {
      start_line: lo.line,
      start_col: lo.col.0,
      end_line: hi.line,
      end_col: hi.col.0,
    }
  }

  /// Returns the dependency-map index for `specifier`, inserting a new
  /// entry in source order if this is the first time it's seen.
  fn index_for(&mut self, specifier: &str, kind: DependencyKind, span: Span, is_optional: bool) -> usize {
    let next_index = self.dependencies.len();
    let loc = self.loc(span);
    self
      .dependencies
      .entry(specifier.to_string())
      .or_insert_with(|| DepEntry {
        index: next_index,
        kind,
        loc,
        is_optional,
      })
      .index
  }

  fn require_call(&self, index: usize) -> Expr {
    Expr::Call(CallExpr {
      span: Default::default(),
      callee: Callee::Expr(Box::new(Expr::Ident(Ident::new("require".into(), Default::default())))),
      args: vec![ExprOrSpread {
        spread: None,
        expr: Box::new(Expr::Member(MemberExpr {
          span: Default::default(),
          obj: Box::new(Expr::Ident(Ident::new("dependencyMap".into(), Default::default()))),
          prop: MemberProp::Computed(ComputedPropName {
            span: Default::default(),
            expr: Box::new(num_expr(index as f64)),
          }),
        })),
      }],
      type_args: None,
      ctxt: Default::default(),
    })
  }

  fn exports_assign(&self, prop: &str, value: Expr) -> Stmt {
    assign_member_stmt("exports", prop, value)
  }

  fn lower_module_decl(&mut self, decl: ModuleDecl, out: &mut Vec<ModuleItem>) {
    match decl {
      ModuleDecl::Import(import) => self.lower_import(import, out),
      ModuleDecl::ExportDecl(export) => self.lower_export_decl(export, out),
      ModuleDecl::ExportDefaultDecl(export) => self.lower_export_default_decl(export, out),
      ModuleDecl::ExportDefaultExpr(export) => {
        self.exports.push(ExportedSymbol {
          exported: "default".into(),
          local: "default".into(),
          loc: self.loc(export.span),
        });
        out.push(ModuleItem::Stmt(self.exports_assign("default", *export.expr)));
      }
      ModuleDecl::ExportNamed(export) => self.lower_export_named(export, out),
      ModuleDecl::ExportAll(export) => self.lower_export_all(export, out),
      other => {
        // TS-only declarations (export = / import type, etc.) should have
        // already been erased during type stripping; drop defensively.
        let _ = other;
      }
    }
  }

  fn lower_import(&mut self, import: ImportDecl, out: &mut Vec<ModuleItem>) {
    let specifier = import.src.value.to_string();
    let is_optional = false;
    let index = self.index_for(&specifier, DependencyKind::Import, import.span, is_optional);
    let loc = self.loc(import.span);

    if import.specifiers.is_empty() {
      out.push(ModuleItem::Stmt(Stmt::Expr(ExprStmt {
        span: Default::default(),
        expr: Box::new(self.require_call(index)),
      })));
      return;
    }

    let required = Ident::new(format!("_dep{}", index).into(), Default::default());
    out.push(ModuleItem::Stmt(Stmt::Decl(Decl::Var(Box::new(VarDecl {
      span: Default::default(),
      ctxt: Default::default(),
      kind: VarDeclKind::Var,
      declare: false,
      decls: vec![VarDeclarator {
        span: Default::default(),
        name: Pat::Ident(BindingIdent {
          id: required.clone(),
          type_ann: None,
        }),
        init: Some(Box::new(self.require_call(index))),
        definite: false,
      }],
    })))));

    for spec in import.specifiers {
      match spec {
        ImportSpecifier::Default(default_spec) => {
          self.imports.push(ImportedSymbol {
            source: specifier.clone(),
            imported: Some("default".into()),
            local: default_spec.local.sym.to_string(),
            loc,
          });
          out.push(var_from_member(&default_spec.local, &required, "default"));
        }
        ImportSpecifier::Namespace(ns) => {
          self.imports.push(ImportedSymbol {
            source: specifier.clone(),
            imported: None,
            local: ns.local.sym.to_string(),
            loc,
          });
          out.push(ModuleItem::Stmt(Stmt::Decl(Decl::Var(Box::new(VarDecl {
            span: Default::default(),
            ctxt: Default::default(),
            kind: VarDeclKind::Var,
            declare: false,
            decls: vec![VarDeclarator {
              span: Default::default(),
              name: Pat::Ident(BindingIdent {
                id: ns.local,
                type_ann: None,
              }),
              init: Some(Box::new(Expr::Ident(required.clone()))),
              definite: false,
            }],
          })))));
        }
        ImportSpecifier::Named(named) => {
          let imported_name = named
            .imported
            .as_ref()
            .map(module_export_name_to_string)
            .unwrap_or_else(|| named.local.sym.to_string());
          self.imports.push(ImportedSymbol {
            source: specifier.clone(),
            imported: Some(imported_name.clone()),
            local: named.local.sym.to_string(),
            loc,
          });
          out.push(var_from_member(&named.local, &required, &imported_name));
        }
      }
    }
  }

  fn lower_export_decl(&mut self, export: ExportDecl, out: &mut Vec<ModuleItem>) {
    let names = decl_bound_names(&export.decl);
    let span = export.span;
    out.push(ModuleItem::Stmt(Stmt::Decl(export.decl)));
    for name in names {
      self.exports.push(ExportedSymbol {
        exported: name.clone(),
        local: name.clone(),
        loc: self.loc(span),
      });
      out.push(ModuleItem::Stmt(self.exports_assign(
        &name,
        Expr::Ident(Ident::new(name.clone().into(), Default::default())),
      )));
    }
  }

  fn lower_export_default_decl(&mut self, export: ExportDefaultDecl, out: &mut Vec<ModuleItem>) {
    let loc = self.loc(export.span);
    match export.decl {
      DefaultDecl::Fn(f) => {
        let name = f.ident.clone().map(|i| i.sym.to_string());
        if let Some(ident) = f.ident.clone() {
          out.push(ModuleItem::Stmt(Stmt::Decl(Decl::Fn(FnDecl {
            ident,
            declare: false,
            function: f.function,
          }))));
        } else {
          out.push(ModuleItem::Stmt(Stmt::Expr(ExprStmt {
            span: Default::default(),
            expr: Box::new(Expr::Fn(FnExpr {
              ident: None,
              function: f.function,
            })),
          })));
        }
        self.exports.push(ExportedSymbol {
          exported: "default".into(),
          local: name.clone().unwrap_or_else(|| "default".into()),
          loc,
        });
        let value = match name {
          Some(n) => Expr::Ident(Ident::new(n.into(), Default::default())),
          None => Expr::Ident(Ident::new("undefined".into(), Default::default())),
        };
        out.push(ModuleItem::Stmt(self.exports_assign("default", value)));
      }
      DefaultDecl::Class(c) => {
        let name = c.ident.clone().map(|i| i.sym.to_string());
        if let Some(ident) = c.ident.clone() {
          out.push(ModuleItem::Stmt(Stmt::Decl(Decl::Class(ClassDecl {
            ident,
            declare: false,
            class: c.class,
          }))));
        } else {
          out.push(ModuleItem::Stmt(Stmt::Expr(ExprStmt {
            span: Default::default(),
            expr: Box::new(Expr::Class(ClassExpr {
              ident: None,
              class: c.class,
            })),
          })));
        }
        self.exports.push(ExportedSymbol {
          exported: "default".into(),
          local: name.clone().unwrap_or_else(|| "default".into()),
          loc,
        });
        let value = match name {
          Some(n) => Expr::Ident(Ident::new(n.into(), Default::default())),
          None => Expr::Ident(Ident::new("undefined".into(), Default::default())),
        };
        out.push(ModuleItem::Stmt(self.exports_assign("default", value)));
      }
      DefaultDecl::TsInterfaceDecl(_) => {}
    }
  }

  fn lower_export_named(&mut self, export: NamedExport, out: &mut Vec<ModuleItem>) {
    let loc = self.loc(export.span);
    if let Some(src) = export.src {
      let specifier = src.value.to_string();
      let index = self.index_for(&specifier, DependencyKind::Import, export.span, false);
      let required = Ident::new(format!("_dep{}", index).into(), Default::default());
      out.push(ModuleItem::Stmt(Stmt::Decl(Decl::Var(Box::new(VarDecl {
        span: Default::default(),
        ctxt: Default::default(),
        kind: VarDeclKind::Var,
        declare: false,
        decls: vec![VarDeclarator {
          span: Default::default(),
          name: Pat::Ident(BindingIdent {
            id: required.clone(),
            type_ann: None,
          }),
          init: Some(Box::new(self.require_call(index))),
          definite: false,
        }],
      })))));

      for spec in export.specifiers {
        if let ExportSpecifier::Named(named) = spec {
          let imported_name = module_export_name_to_string(&named.orig);
          let exported_name = named
            .exported
            .as_ref()
            .map(module_export_name_to_string)
            .unwrap_or_else(|| imported_name.clone());
          self.exports.push(ExportedSymbol {
            exported: exported_name.clone(),
            local: imported_name.clone(),
            loc,
          });
          out.push(ModuleItem::Stmt(self.exports_assign(
            &exported_name,
            member_expr(&required, &imported_name),
          )));
        }
      }
    } else {
      for spec in export.specifiers {
        if let ExportSpecifier::Named(named) = spec {
          let local_name = module_export_name_to_string(&named.orig);
          let exported_name = named
            .exported
            .as_ref()
            .map(module_export_name_to_string)
            .unwrap_or_else(|| local_name.clone());
          self.exports.push(ExportedSymbol {
            exported: exported_name.clone(),
            local: local_name.clone(),
            loc,
          });
          out.push(ModuleItem::Stmt(self.exports_assign(
            &exported_name,
            Expr::Ident(Ident::new(local_name.into(), Default::default())),
          )));
        }
      }
    }
  }

  fn lower_export_all(&mut self, export: ExportAll, out: &mut Vec<ModuleItem>) {
    let specifier = export.src.value.to_string();
    let index = self.index_for(&specifier, DependencyKind::Import, export.span, false);
    self.imports.push(ImportedSymbol {
      source: specifier,
      imported: None,
      local: "*".into(),
      loc: self.loc(export.span),
    });
    out.push(ModuleItem::Stmt(Stmt::Expr(ExprStmt {
      span: Default::default(),
      expr: Box::new(Expr::Call(CallExpr {
        span: Default::default(),
        callee: Callee::Expr(Box::new(member_expr_ident("Object", "assign"))),
        args: vec![
          ExprOrSpread {
            spread: None,
            expr: Box::new(Expr::Ident(Ident::new("exports".into(), Default::default()))),
          },
          ExprOrSpread {
            spread: None,
            expr: Box::new(self.require_call(index)),
          },
        ],
        type_args: None,
        ctxt: Default::default(),
      })),
    })));
  }
}

impl VisitMut for ModuleRewriter {
  fn visit_mut_module_items(&mut self, items: &mut Vec<ModuleItem>) {
    items.visit_mut_children_with(self);

    let mut out = Vec::with_capacity(items.len());
    for item in items.drain(..) {
      match item {
        ModuleItem::ModuleDecl(decl) => self.lower_module_decl(decl, &mut out),
        ModuleItem::Stmt(stmt) => out.push(ModuleItem::Stmt(stmt)),
      }
    }
    *items = out;
  }

  fn visit_mut_call_expr(&mut self, call: &mut CallExpr) {
    call.visit_mut_children_with(self);

    let Callee::Expr(callee) = &call.callee else {
      return;
    };

    let is_require = matches!(&**callee, Expr::Ident(id) if &*id.sym == "require");
    let is_dynamic_import = matches!(&call.callee, Callee::Import(_));

    if !is_require && !is_dynamic_import {
      return;
    }

    let Some(arg) = call.args.first() else {
      return;
    };
    let Expr::Lit(Lit::Str(str_lit)) = &*arg.expr else {
      return;
    };
    let specifier = str_lit.value.to_string();
    let span = call.span;

    if is_require {
      let index = self.index_for(&specifier, DependencyKind::Require, span, false);
      self.imports.push(ImportedSymbol {
        source: specifier,
        imported: None,
        local: String::new(),
        loc: self.loc(span),
      });
      *call = CallExpr {
        span,
        callee: Callee::Expr(Box::new(Expr::Ident(Ident::new(
          "require".into(),
          Default::default(),
        )))),
        args: vec![ExprOrSpread {
          spread: None,
          expr: Box::new(Expr::Member(MemberExpr {
            span: Default::default(),
            obj: Box::new(Expr::Ident(Ident::new("dependencyMap".into(), Default::default()))),
            prop: MemberProp::Computed(ComputedPropName {
              span: Default::default(),
              expr: Box::new(num_expr(index as f64)),
            }),
          })),
        }],
        type_args: None,
        ctxt: call.ctxt,
      };
    } else {
      // Dynamic `import()`: per spec.md Design Notes, resolved synchronously
      // through `__r`/`require` rather than as a separate async chunk.
      let index = self.index_for(&specifier, DependencyKind::DynamicImport, span, false);
      self.imports.push(ImportedSymbol {
        source: specifier,
        imported: None,
        local: String::new(),
        loc: self.loc(span),
      });
      let require_call = self.require_call(index);
      *call = CallExpr {
        span,
        callee: Callee::Expr(Box::new(member_expr_ident("Promise", "resolve"))),
        args: vec![ExprOrSpread {
          spread: None,
          expr: Box::new(require_call),
        }],
        type_args: None,
        ctxt: call.ctxt,
      };
    }
  }
}

fn decl_bound_names(decl: &Decl) -> Vec<String> {
  match decl {
    Decl::Var(var) => var
      .decls
      .iter()
      .filter_map(|d| match &d.name {
        Pat::Ident(id) => Some(id.id.sym.to_string()),
        _ => None,
      })
      .collect(),
    Decl::Fn(f) => vec![f.ident.sym.to_string()],
    Decl::Class(c) => vec![c.ident.sym.to_string()],
    _ => Vec::new(),
  }
}

fn module_export_name_to_string(name: &ModuleExportName) -> String {
  match name {
    ModuleExportName::Ident(id) => id.sym.to_string(),
    ModuleExportName::Str(s) => s.value.to_string(),
  }
}

fn var_from_member(local: &Ident, object: &Ident, prop: &str) -> ModuleItem {
  ModuleItem::Stmt(Stmt::Decl(Decl::Var(Box::new(VarDecl {
    span: Default::default(),
    ctxt: Default::default(),
    kind: VarDeclKind::Var,
    declare: false,
    decls: vec![VarDeclarator {
      span: Default::default(),
      name: Pat::Ident(BindingIdent {
        id: local.clone(),
        type_ann: None,
      }),
      init: Some(Box::new(member_expr(object, prop))),
      definite: false,
    }],
  }))))
}

fn member_expr(object: &Ident, prop: &str) -> Expr {
  Expr::Member(MemberExpr {
    span: Default::default(),
    obj: Box::new(Expr::Ident(object.clone())),
    prop: MemberProp::Ident(IdentName::new(prop.into(), Default::default())),
  })
}

fn member_expr_ident(object: &str, prop: &str) -> Expr {
  Expr::Member(MemberExpr {
    span: Default::default(),
    obj: Box::new(Expr::Ident(Ident::new(object.into(), Default::default()))),
    prop: MemberProp::Ident(IdentName::new(prop.into(), Default::default())),
  })
}

fn assign_member_stmt(object: &str, prop: &str, value: Expr) -> Stmt {
  Stmt::Expr(ExprStmt {
    span: Default::default(),
    expr: Box::new(Expr::Assign(AssignExpr {
      span: Default::default(),
      op: AssignOp::Assign,
      left: AssignTarget::Simple(SimpleAssignTarget::Member(MemberExpr {
        span: Default::default(),
        obj: Box::new(Expr::Ident(Ident::new(object.into(), Default::default()))),
        prop: MemberProp::Ident(IdentName::new(prop.into(), Default::default())),
      })),
      right: Box::new(value),
    })),
  })
}

fn num_expr(value: f64) -> Expr {
  Expr::Lit(Lit::Num(Number {
    span: Default::default(),
    value,
    raw: None,
  }))
}
