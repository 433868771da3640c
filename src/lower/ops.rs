//! Operators and conversions, picked from tables by operand type.

use super::ExprLowerer;
use crate::ast::{BinOp, Literal, Scalar, Type, UnOp};
use crate::error::{LowerError, Result};
use crate::spv::{Id, Op};
use lazy_static::lazy_static;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

/// Scalar types, grouped by which opcodes operate on them.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(super) enum Family {
    Float,
    SInt,
    UInt,
    Bool,
}

impl Family {
    pub(super) fn of(scalar: Scalar) -> Self {
        match scalar {
            Scalar::Float | Scalar::Double => Self::Float,
            Scalar::Int => Self::SInt,
            Scalar::UInt => Self::UInt,
            Scalar::Bool => Self::Bool,
        }
    }
}

/// One entry per [`Family`] (indexed by `Family as usize`).
pub(super) type ByFamily<T> = [Option<T>; 4];

macro_rules! by_family {
    ($($family:ident: $op:expr),* $(,)?) => {{
        let mut ops = [None; 4];
        $(ops[Family::$family as usize] = Some($op);)*
        ops
    }};
}
pub(super) use by_family;

static BINARY_OPS: &[(BinOp, ByFamily<Op>)] = &[
    (BinOp::Add, by_family!(Float: Op::FAdd, SInt: Op::IAdd, UInt: Op::IAdd)),
    (BinOp::Sub, by_family!(Float: Op::FSub, SInt: Op::ISub, UInt: Op::ISub)),
    (BinOp::Mul, by_family!(Float: Op::FMul, SInt: Op::IMul, UInt: Op::IMul)),
    (BinOp::Div, by_family!(Float: Op::FDiv, SInt: Op::SDiv, UInt: Op::UDiv)),
    (BinOp::Mod, by_family!(Float: Op::FMod, SInt: Op::SMod, UInt: Op::UMod)),
    (BinOp::Shl, by_family!(SInt: Op::ShiftLeftLogical, UInt: Op::ShiftLeftLogical)),
    (BinOp::Shr, by_family!(SInt: Op::ShiftRightArithmetic, UInt: Op::ShiftRightLogical)),
    (
        BinOp::BitAnd,
        by_family!(SInt: Op::BitwiseAnd, UInt: Op::BitwiseAnd, Bool: Op::LogicalAnd),
    ),
    (BinOp::BitOr, by_family!(SInt: Op::BitwiseOr, UInt: Op::BitwiseOr, Bool: Op::LogicalOr)),
    (
        BinOp::BitXor,
        by_family!(SInt: Op::BitwiseXor, UInt: Op::BitwiseXor, Bool: Op::LogicalNotEqual),
    ),
    // FIXME: these don't short-circuit, which would require control-flow.
    (BinOp::LogAnd, by_family!(Bool: Op::LogicalAnd)),
    (BinOp::LogOr, by_family!(Bool: Op::LogicalOr)),
    (
        BinOp::Eq,
        by_family!(
            Float: Op::FOrdEqual,
            SInt: Op::IEqual,
            UInt: Op::IEqual,
            Bool: Op::LogicalEqual,
        ),
    ),
    (
        BinOp::Ne,
        by_family!(
            Float: Op::FUnordNotEqual,
            SInt: Op::INotEqual,
            UInt: Op::INotEqual,
            Bool: Op::LogicalNotEqual,
        ),
    ),
    (
        BinOp::Lt,
        by_family!(Float: Op::FOrdLessThan, SInt: Op::SLessThan, UInt: Op::ULessThan),
    ),
    (
        BinOp::Le,
        by_family!(
            Float: Op::FOrdLessThanEqual,
            SInt: Op::SLessThanEqual,
            UInt: Op::ULessThanEqual,
        ),
    ),
    (
        BinOp::Gt,
        by_family!(Float: Op::FOrdGreaterThan, SInt: Op::SGreaterThan, UInt: Op::UGreaterThan),
    ),
    (
        BinOp::Ge,
        by_family!(
            Float: Op::FOrdGreaterThanEqual,
            SInt: Op::SGreaterThanEqual,
            UInt: Op::UGreaterThanEqual,
        ),
    ),
];

// NOTE: `UnOp::Plus` has no entry, as it's a noop.
static UNARY_OPS: &[(UnOp, ByFamily<Op>)] = &[
    (UnOp::Neg, by_family!(Float: Op::FNegate, SInt: Op::SNegate, UInt: Op::SNegate)),
    (UnOp::Not, by_family!(Bool: Op::LogicalNot)),
    (UnOp::BitNot, by_family!(SInt: Op::Not, UInt: Op::Not)),
];

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Conversion {
    Noop,
    Op(Op),
    /// `cond ? 1 : 0`.
    FromBool,
    /// `x != 0`.
    ToBool,
}

macro_rules! casts {
    ($($from:ident => [$($to:ident: $conversion:expr),* $(,)?],)*) => {
        &[$($(((Scalar::$from, Scalar::$to), $conversion),)*)*]
    };
}

static CASTS: &[((Scalar, Scalar), Conversion)] = casts! {
    Bool => [
        Bool: Conversion::Noop,
        Int: Conversion::FromBool,
        UInt: Conversion::FromBool,
        Float: Conversion::FromBool,
        Double: Conversion::FromBool,
    ],
    Int => [
        Bool: Conversion::ToBool,
        Int: Conversion::Noop,
        UInt: Conversion::Op(Op::Bitcast),
        Float: Conversion::Op(Op::ConvertSToF),
        Double: Conversion::Op(Op::ConvertSToF),
    ],
    UInt => [
        Bool: Conversion::ToBool,
        Int: Conversion::Op(Op::Bitcast),
        UInt: Conversion::Noop,
        Float: Conversion::Op(Op::ConvertUToF),
        Double: Conversion::Op(Op::ConvertUToF),
    ],
    Float => [
        Bool: Conversion::ToBool,
        Int: Conversion::Op(Op::ConvertFToS),
        UInt: Conversion::Op(Op::ConvertFToU),
        Float: Conversion::Noop,
        Double: Conversion::Op(Op::FConvert),
    ],
    Double => [
        Bool: Conversion::ToBool,
        Int: Conversion::Op(Op::ConvertFToS),
        UInt: Conversion::Op(Op::ConvertFToU),
        Float: Conversion::Op(Op::FConvert),
        Double: Conversion::Noop,
    ],
};

lazy_static! {
    static ref BINARY_OPS_BY_OP: FxHashMap<BinOp, ByFamily<Op>> = BINARY_OPS.iter().copied().collect();
    static ref UNARY_OPS_BY_OP: FxHashMap<UnOp, ByFamily<Op>> = UNARY_OPS.iter().copied().collect();
    static ref CASTS_BY_TYPES: FxHashMap<(Scalar, Scalar), Conversion> = CASTS.iter().copied().collect();
}

/// Converts a literal at compile-time, following the same rules as casts.
pub(super) fn convert_literal(value: Literal, to: Scalar) -> Literal {
    let (int, float) = match value {
        Literal::Bool(v) => (i64::from(v), f64::from(u8::from(v))),
        Literal::Int(v) => (i64::from(v), f64::from(v)),
        Literal::UInt(v) => (i64::from(v), f64::from(v)),
        Literal::Float(v) => (v as i64, f64::from(v)),
        Literal::Double(v) => (v as i64, v),
    };
    match to {
        Scalar::Bool => Literal::Bool(float != 0.0),
        Scalar::Int => Literal::Int(int as i32),
        Scalar::UInt => Literal::UInt(int as u32),
        Scalar::Float => Literal::Float(float as f32),
        Scalar::Double => Literal::Double(float),
    }
}

/// A lowered operand, along with its (AST) type.
#[derive(Copy, Clone)]
pub(super) struct Operand<'t> {
    pub(super) ty: &'t Type,
    pub(super) id: Id,

    /// Whether `id` is a constant (so that splatting it can also be one).
    pub(super) constant: bool,
}

impl ExprLowerer<'_> {
    pub(super) fn binary_op(
        &mut self,
        op: BinOp,
        lhs: Operand<'_>,
        rhs: Operand<'_>,
        result_ty: &Type,
        fold: bool,
    ) -> Result<Id> {
        let unsupported =
            || LowerError::UnsupportedOperator { op: format!("{op:?}"), ty: lhs.ty.clone() };
        let scalar = lhs.ty.scalar().ok_or_else(unsupported)?;
        let family = Family::of(scalar);

        if op == BinOp::Mul && family == Family::Float {
            let (l, r) = (lhs.id, rhs.id);
            let product = match (lhs.ty, rhs.ty) {
                (Type::Matrix { .. }, Type::Matrix { .. }) => Some((Op::MatrixTimesMatrix, l, r)),
                (Type::Matrix { .. }, Type::Vector(..)) => Some((Op::MatrixTimesVector, l, r)),
                (Type::Vector(..), Type::Matrix { .. }) => Some((Op::VectorTimesMatrix, l, r)),
                (Type::Matrix { .. }, Type::Scalar(_)) => Some((Op::MatrixTimesScalar, l, r)),
                (Type::Scalar(_), Type::Matrix { .. }) => Some((Op::MatrixTimesScalar, r, l)),
                (Type::Vector(..), Type::Scalar(_)) => Some((Op::VectorTimesScalar, l, r)),
                (Type::Scalar(_), Type::Vector(..)) => Some((Op::VectorTimesScalar, r, l)),
                _ => None,
            };
            if let Some((opcode, a, b)) = product {
                return Ok(self.emit(opcode, result_ty, [a, b]));
            }
        }

        if let (Type::Matrix { .. }, _) | (_, Type::Matrix { .. }) = (lhs.ty, rhs.ty) {
            return self.matrix_column_wise(result_ty, |this, column_ty, column| {
                let lhs = this.matrix_column(lhs, column_ty, column);
                let rhs = this.matrix_column(rhs, column_ty, column);
                this.binary_op(op, lhs, rhs, column_ty, false)
            });
        }

        // Scalars used with vectors are replicated into vectors first.
        let (lhs_id, rhs_id, size) = match (lhs.ty, rhs.ty) {
            (&Type::Vector(_, n), &Type::Scalar(s)) => {
                (lhs.id, self.splat(s, rhs.id, n, rhs.constant), n)
            }
            (&Type::Scalar(s), &Type::Vector(_, n)) => {
                (self.splat(s, lhs.id, n, lhs.constant), rhs.id, n)
            }
            _ => (lhs.id, rhs.id, lhs.ty.vector_size().unwrap_or(1)),
        };

        let opcode = BINARY_OPS_BY_OP
            .get(&op)
            .and_then(|ops| ops[family as usize])
            .ok_or_else(unsupported)?;

        // Equality of whole vectors (as opposed to `equal(a, b)`).
        if op.is_comparison() && size > 1 && matches!(result_ty, Type::Scalar(_)) {
            let per_component = self.emit(opcode, &Type::Vector(Scalar::Bool, size), [lhs_id, rhs_id]);
            let reduce = if op == BinOp::Ne { Op::Any } else { Op::All };
            return Ok(self.emit(reduce, result_ty, [per_component]));
        }

        Ok(self.emit_or_fold(fold, opcode, result_ty, [lhs_id, rhs_id]))
    }

    pub(super) fn unary_op(&mut self, op: UnOp, operand: Operand<'_>, fold: bool) -> Result<Id> {
        if op == UnOp::Plus {
            return Ok(operand.id);
        }

        let unsupported =
            || LowerError::UnsupportedOperator { op: format!("{op:?}"), ty: operand.ty.clone() };
        let scalar = operand.ty.scalar().ok_or_else(unsupported)?;

        if let Type::Matrix { .. } = operand.ty {
            return self.matrix_column_wise(operand.ty, |this, column_ty, column| {
                let operand = this.matrix_column(operand, column_ty, column);
                this.unary_op(op, operand, false)
            });
        }

        let opcode = UNARY_OPS_BY_OP
            .get(&op)
            .and_then(|ops| ops[Family::of(scalar) as usize])
            .ok_or_else(unsupported)?;
        Ok(self.emit_or_fold(fold, opcode, operand.ty, [operand.id]))
    }

    /// Builds a matrix of type `matrix_ty` out of columns computed separately.
    fn matrix_column_wise(
        &mut self,
        matrix_ty: &Type,
        mut per_column: impl FnMut(&mut Self, &Type, u32) -> Result<Id>,
    ) -> Result<Id> {
        let &Type::Matrix { columns, .. } = matrix_ty else {
            return Err(LowerError::type_mismatch("matrix", matrix_ty));
        };
        let column_ty = matrix_ty.column().unwrap_or(Type::Void);
        let column_ids = (0..columns)
            .map(|column| per_column(self, &column_ty, column))
            .collect::<Result<SmallVec<[Id; 4]>>>()?;
        Ok(self.emit(Op::CompositeConstruct, matrix_ty, column_ids))
    }

    /// Column `column` of a matrix operand (non-matrix operands are kept as-is).
    fn matrix_column<'t>(&mut self, operand: Operand<'t>, column_ty: &'t Type, column: u32) -> Operand<'t> {
        match operand.ty {
            Type::Matrix { .. } => Operand {
                ty: column_ty,
                id: self.emit(Op::CompositeExtract, column_ty, [operand.id, column]),
                constant: false,
            },
            _ => operand,
        }
    }

    /// Converts `operand` to `to` (both scalars, or vectors of the same size).
    pub(super) fn cast(&mut self, operand: Operand<'_>, to: &Type) -> Result<Id> {
        let from = operand.ty;
        if from == to {
            return Ok(operand.id);
        }

        let unsupported = || LowerError::UnsupportedCast { from: from.clone(), to: to.clone() };
        let (from_scalar, to_scalar, size) = match (from, to) {
            (&Type::Scalar(a), &Type::Scalar(b)) => (a, b, 1),
            (&Type::Vector(a, n), &Type::Vector(b, m)) if n == m => (a, b, n),
            _ => return Err(unsupported()),
        };

        let conversion =
            CASTS_BY_TYPES.get(&(from_scalar, to_scalar)).copied().ok_or_else(unsupported)?;
        match conversion {
            Conversion::Noop => Ok(operand.id),
            Conversion::Op(opcode) => Ok(self.emit(opcode, to, [operand.id])),
            Conversion::FromBool => {
                let one = Literal::one(to_scalar).ok_or_else(unsupported)?;
                let one = self.constant_of_size(one, size);
                let zero = self.constant_of_size(Literal::zero(to_scalar), size);
                Ok(self.emit(Op::Select, to, [operand.id, one, zero]))
            }
            Conversion::ToBool => {
                let zero = self.constant_of_size(Literal::zero(from_scalar), size);
                let opcode = if from_scalar.is_float() { Op::FUnordNotEqual } else { Op::INotEqual };
                Ok(self.emit(opcode, to, [operand.id, zero]))
            }
        }
    }

    /// `value` as a constant, replicated into a vector if `size > 1`.
    fn constant_of_size(&mut self, value: Literal, size: u32) -> Id {
        let id = self.module.register_literal(value);
        if size > 1 {
            self.splat(value.scalar(), id, size, true)
        } else {
            id
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_operator_has_one_entry() {
        for &op in BinOp::ALL {
            let count = BINARY_OPS.iter().filter(|&&(o, _)| o == op).count();
            assert_eq!(count, 1, "{op:?}");
        }
        for &op in UnOp::ALL {
            let count = UNARY_OPS.iter().filter(|&&(o, _)| o == op).count();
            assert_eq!(count, usize::from(op != UnOp::Plus), "{op:?}");
        }
    }

    #[test]
    fn comparisons_cover_all_numeric_families() {
        for &op in BinOp::ALL.iter().filter(|op| op.is_comparison()) {
            let ops = BINARY_OPS_BY_OP[&op];
            for family in [Family::Float, Family::SInt, Family::UInt] {
                assert!(ops[family as usize].is_some(), "{op:?} on {family:?}");
            }
        }
    }

    #[test]
    fn every_scalar_pair_converts() {
        let scalars = [Scalar::Bool, Scalar::Int, Scalar::UInt, Scalar::Float, Scalar::Double];
        for from in scalars {
            for to in scalars {
                let conversion = CASTS_BY_TYPES[&(from, to)];
                assert_eq!(conversion == Conversion::Noop, from == to, "{from:?} -> {to:?}");
            }
        }
        assert_eq!(CASTS.len(), scalars.len() * scalars.len());
    }

    #[test]
    fn literal_conversions() {
        assert_eq!(convert_literal(Literal::Int(-3), Scalar::Float), Literal::Float(-3.0));
        assert_eq!(convert_literal(Literal::Float(2.75), Scalar::Int), Literal::Int(2));
        assert_eq!(convert_literal(Literal::Bool(true), Scalar::Double), Literal::Double(1.0));
        assert_eq!(convert_literal(Literal::UInt(0), Scalar::Bool), Literal::Bool(false));
        assert_eq!(convert_literal(Literal::Int(-1), Scalar::UInt), Literal::UInt(u32::MAX));
    }
}
