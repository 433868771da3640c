//! Read-only traversal of expression trees.

use super::{Expr, ExprKind, ImageAccess, TextureAccess, Var};

// FIXME(eddyb) `Sized` bound shouldn't be needed but removing it requires
// writing `impl Visitor<'a> + ?Sized` in `fn inner_visit_with` signatures.
pub trait Visitor<'a>: Sized {
    // Leaves (noop default behavior).
    fn visit_identifier(&mut self, _var: &'a Var) {}

    // Non-leaves (defaulting to calling `.inner_visit_with(self)`).
    fn visit_expr(&mut self, expr: &'a Expr) {
        expr.inner_visit_with(self);
    }
    fn visit_image_access(&mut self, _access: ImageAccess, args: &'a [Expr]) {
        for arg in args {
            self.visit_expr(arg);
        }
    }
    fn visit_texture_access(&mut self, _access: TextureAccess, args: &'a [Expr]) {
        for arg in args {
            self.visit_expr(arg);
        }
    }
}

/// Trait implemented on "visitable" types, to further "explore" a type by
/// visiting its "interior" (i.e. variants and/or fields).
///
/// That is, an `impl InnerVisit for X` will call the relevant `Visitor` method
/// for each `X` field, effectively performing a single level of a deep visit.
pub trait InnerVisit {
    fn inner_visit_with<'a>(&'a self, visitor: &mut impl Visitor<'a>);
}

impl InnerVisit for Expr {
    fn inner_visit_with<'a>(&'a self, visitor: &mut impl Visitor<'a>) {
        match &self.kind {
            ExprKind::Literal(_) => {}
            ExprKind::Identifier(var) => visitor.visit_identifier(var),
            ExprKind::Init { var, value } => {
                visitor.visit_identifier(var);
                visitor.visit_expr(value);
            }
            ExprKind::Assign { op: _, lhs: a, rhs: b }
            | ExprKind::Binary { op: _, lhs: a, rhs: b }
            | ExprKind::Index { array: a, index: b } => {
                visitor.visit_expr(a);
                visitor.visit_expr(b);
            }
            ExprKind::Unary { operand: e, .. }
            | ExprKind::Step { operand: e, .. }
            | ExprKind::Cast(e)
            | ExprKind::Member { outer: e, .. }
            | ExprKind::Swizzle { outer: e, .. } => visitor.visit_expr(e),
            ExprKind::Construct(args)
            | ExprKind::Call { func: _, args }
            | ExprKind::Intrinsic { intrinsic: _, args } => {
                for arg in args {
                    visitor.visit_expr(arg);
                }
            }
            ExprKind::Image { access, args } => visitor.visit_image_access(*access, args),
            ExprKind::Texture { access, args } => visitor.visit_texture_access(*access, args),
            ExprKind::Select { cond, on_true, on_false } => {
                visitor.visit_expr(cond);
                visitor.visit_expr(on_true);
                visitor.visit_expr(on_false);
            }
        }
    }
}
