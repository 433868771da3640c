//! Typed shader AST, as handed over by a front-end (all types already resolved).

// NOTE(eddyb) all the modules are declared here, but they're documented "inside"
// (i.e. using inner doc comments).
mod expr;
mod swizzle;
mod types;
mod var;
pub mod visit;

pub use expr::{
    BinOp, Expr, ExprKind, ImageAccess, Intrinsic, Literal, StepOp, TextureAccess, UnOp,
};
pub use swizzle::Swizzle;
pub use types::{ArrayType, FunctionType, ImageConfig, Member, MemoryLayout, Scalar, StructType, Type};
pub use var::{Var, VarFlags, Variable};
