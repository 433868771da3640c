//! Built-in functions, mostly one instruction each (either core SPIR-V, or
//! from the `GLSL.std.450` extended instruction set).

use super::ops::{by_family, ByFamily, Family};
use super::ExprLowerer;
use crate::ast::{Expr, Intrinsic, Scalar, Type};
use crate::error::{LowerError, Result};
use crate::spv::{Id, Op};
use lazy_static::lazy_static;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use spirv::{GLOp, MemorySemantics};

/// How an intrinsic is lowered, with opcodes picked by the [`Family`] of the
/// (scalar type of the) first argument.
#[derive(Copy, Clone, Debug)]
pub(super) enum Form {
    /// Core instruction, taking all arguments as values.
    Plain(ByFamily<Op>),

    /// `GLSL.std.450` instruction, taking all arguments as values.
    Ext(ByFamily<GLOp>),

    /// `GLSL.std.450` instruction with its last argument being an `out`
    /// parameter (e.g. `modf`), passed as a pointer.
    ExtWithOutput(GLOp),

    /// Atomic operation on the pointer given as the first argument, with
    /// scope and memory semantics operands injected after it.
    Atomic(ByFamily<Op>),

    /// Instruction returning a struct of two values, the first being the
    /// result and the second written to the last (`out`) argument.
    CarryBorrow(Op),

    /// Instruction returning a `(lsb, msb)` struct, written to the last two
    /// (`out msb, out lsb`) arguments.
    MulExtended(Op),
}

macro_rules! float {
    ($op:expr) => {
        by_family!(Float: $op)
    };
}

macro_rules! int {
    ($op:expr) => {
        by_family!(SInt: $op, UInt: $op)
    };
}

static INTRINSICS: &[(Intrinsic, Form)] = &[
    // Angle and trigonometry.
    (Intrinsic::Radians, Form::Ext(float!(GLOp::Radians))),
    (Intrinsic::Degrees, Form::Ext(float!(GLOp::Degrees))),
    (Intrinsic::Sin, Form::Ext(float!(GLOp::Sin))),
    (Intrinsic::Cos, Form::Ext(float!(GLOp::Cos))),
    (Intrinsic::Tan, Form::Ext(float!(GLOp::Tan))),
    (Intrinsic::Asin, Form::Ext(float!(GLOp::Asin))),
    (Intrinsic::Acos, Form::Ext(float!(GLOp::Acos))),
    (Intrinsic::Atan, Form::Ext(float!(GLOp::Atan))),
    (Intrinsic::Atan2, Form::Ext(float!(GLOp::Atan2))),
    (Intrinsic::Sinh, Form::Ext(float!(GLOp::Sinh))),
    (Intrinsic::Cosh, Form::Ext(float!(GLOp::Cosh))),
    (Intrinsic::Tanh, Form::Ext(float!(GLOp::Tanh))),
    (Intrinsic::Asinh, Form::Ext(float!(GLOp::Asinh))),
    (Intrinsic::Acosh, Form::Ext(float!(GLOp::Acosh))),
    (Intrinsic::Atanh, Form::Ext(float!(GLOp::Atanh))),
    // Exponential.
    (Intrinsic::Pow, Form::Ext(float!(GLOp::Pow))),
    (Intrinsic::Exp, Form::Ext(float!(GLOp::Exp))),
    (Intrinsic::Log, Form::Ext(float!(GLOp::Log))),
    (Intrinsic::Exp2, Form::Ext(float!(GLOp::Exp2))),
    (Intrinsic::Log2, Form::Ext(float!(GLOp::Log2))),
    (Intrinsic::Sqrt, Form::Ext(float!(GLOp::Sqrt))),
    (Intrinsic::InverseSqrt, Form::Ext(float!(GLOp::InverseSqrt))),
    // Common.
    (Intrinsic::Abs, Form::Ext(by_family!(Float: GLOp::FAbs, SInt: GLOp::SAbs))),
    (Intrinsic::Sign, Form::Ext(by_family!(Float: GLOp::FSign, SInt: GLOp::SSign))),
    (Intrinsic::Floor, Form::Ext(float!(GLOp::Floor))),
    (Intrinsic::Trunc, Form::Ext(float!(GLOp::Trunc))),
    (Intrinsic::Round, Form::Ext(float!(GLOp::Round))),
    (Intrinsic::RoundEven, Form::Ext(float!(GLOp::RoundEven))),
    (Intrinsic::Ceil, Form::Ext(float!(GLOp::Ceil))),
    (Intrinsic::Fract, Form::Ext(float!(GLOp::Fract))),
    (Intrinsic::Mod, Form::Plain(float!(Op::FMod))),
    (Intrinsic::Modf, Form::ExtWithOutput(GLOp::Modf)),
    (
        Intrinsic::Min,
        Form::Ext(by_family!(Float: GLOp::FMin, SInt: GLOp::SMin, UInt: GLOp::UMin)),
    ),
    (
        Intrinsic::Max,
        Form::Ext(by_family!(Float: GLOp::FMax, SInt: GLOp::SMax, UInt: GLOp::UMax)),
    ),
    (
        Intrinsic::Clamp,
        Form::Ext(by_family!(Float: GLOp::FClamp, SInt: GLOp::SClamp, UInt: GLOp::UClamp)),
    ),
    (Intrinsic::Mix, Form::Ext(float!(GLOp::FMix))),
    (Intrinsic::Step, Form::Ext(float!(GLOp::Step))),
    (Intrinsic::SmoothStep, Form::Ext(float!(GLOp::SmoothStep))),
    (Intrinsic::Fma, Form::Ext(float!(GLOp::Fma))),
    (Intrinsic::Frexp, Form::ExtWithOutput(GLOp::Frexp)),
    (Intrinsic::Ldexp, Form::Ext(float!(GLOp::Ldexp))),
    (Intrinsic::IsNan, Form::Plain(float!(Op::IsNan))),
    (Intrinsic::IsInf, Form::Plain(float!(Op::IsInf))),
    (Intrinsic::FloatBitsToInt, Form::Plain(float!(Op::Bitcast))),
    (Intrinsic::FloatBitsToUint, Form::Plain(float!(Op::Bitcast))),
    (Intrinsic::IntBitsToFloat, Form::Plain(by_family!(SInt: Op::Bitcast))),
    (Intrinsic::UintBitsToFloat, Form::Plain(by_family!(UInt: Op::Bitcast))),
    // Packing.
    (Intrinsic::PackSnorm4x8, Form::Ext(float!(GLOp::PackSnorm4x8))),
    (Intrinsic::PackUnorm4x8, Form::Ext(float!(GLOp::PackUnorm4x8))),
    (Intrinsic::PackSnorm2x16, Form::Ext(float!(GLOp::PackSnorm2x16))),
    (Intrinsic::PackUnorm2x16, Form::Ext(float!(GLOp::PackUnorm2x16))),
    (Intrinsic::PackHalf2x16, Form::Ext(float!(GLOp::PackHalf2x16))),
    (Intrinsic::PackDouble2x32, Form::Ext(by_family!(UInt: GLOp::PackDouble2x32))),
    (Intrinsic::UnpackSnorm4x8, Form::Ext(by_family!(UInt: GLOp::UnpackSnorm4x8))),
    (Intrinsic::UnpackUnorm4x8, Form::Ext(by_family!(UInt: GLOp::UnpackUnorm4x8))),
    (Intrinsic::UnpackSnorm2x16, Form::Ext(by_family!(UInt: GLOp::UnpackSnorm2x16))),
    (Intrinsic::UnpackUnorm2x16, Form::Ext(by_family!(UInt: GLOp::UnpackUnorm2x16))),
    (Intrinsic::UnpackHalf2x16, Form::Ext(by_family!(UInt: GLOp::UnpackHalf2x16))),
    (Intrinsic::UnpackDouble2x32, Form::Ext(float!(GLOp::UnpackDouble2x32))),
    // Geometric.
    (Intrinsic::Length, Form::Ext(float!(GLOp::Length))),
    (Intrinsic::Distance, Form::Ext(float!(GLOp::Distance))),
    (Intrinsic::Dot, Form::Plain(float!(Op::Dot))),
    (Intrinsic::Cross, Form::Ext(float!(GLOp::Cross))),
    (Intrinsic::Normalize, Form::Ext(float!(GLOp::Normalize))),
    (Intrinsic::FaceForward, Form::Ext(float!(GLOp::FaceForward))),
    (Intrinsic::Reflect, Form::Ext(float!(GLOp::Reflect))),
    (Intrinsic::Refract, Form::Ext(float!(GLOp::Refract))),
    // Matrix.
    (Intrinsic::OuterProduct, Form::Plain(float!(Op::OuterProduct))),
    (Intrinsic::Transpose, Form::Plain(float!(Op::Transpose))),
    (Intrinsic::Determinant, Form::Ext(float!(GLOp::Determinant))),
    (Intrinsic::Inverse, Form::Ext(float!(GLOp::MatrixInverse))),
    // Vector relational.
    (
        Intrinsic::LessThan,
        Form::Plain(by_family!(Float: Op::FOrdLessThan, SInt: Op::SLessThan, UInt: Op::ULessThan)),
    ),
    (
        Intrinsic::LessThanEqual,
        Form::Plain(by_family!(
            Float: Op::FOrdLessThanEqual,
            SInt: Op::SLessThanEqual,
            UInt: Op::ULessThanEqual,
        )),
    ),
    (
        Intrinsic::GreaterThan,
        Form::Plain(by_family!(
            Float: Op::FOrdGreaterThan,
            SInt: Op::SGreaterThan,
            UInt: Op::UGreaterThan,
        )),
    ),
    (
        Intrinsic::GreaterThanEqual,
        Form::Plain(by_family!(
            Float: Op::FOrdGreaterThanEqual,
            SInt: Op::SGreaterThanEqual,
            UInt: Op::UGreaterThanEqual,
        )),
    ),
    (
        Intrinsic::Equal,
        Form::Plain(by_family!(
            Float: Op::FOrdEqual,
            SInt: Op::IEqual,
            UInt: Op::IEqual,
            Bool: Op::LogicalEqual,
        )),
    ),
    (
        Intrinsic::NotEqual,
        Form::Plain(by_family!(
            Float: Op::FUnordNotEqual,
            SInt: Op::INotEqual,
            UInt: Op::INotEqual,
            Bool: Op::LogicalNotEqual,
        )),
    ),
    (Intrinsic::Any, Form::Plain(by_family!(Bool: Op::Any))),
    (Intrinsic::All, Form::Plain(by_family!(Bool: Op::All))),
    (Intrinsic::Not, Form::Plain(by_family!(Bool: Op::LogicalNot))),
    // Integer.
    (Intrinsic::UaddCarry, Form::CarryBorrow(Op::IAddCarry)),
    (Intrinsic::UsubBorrow, Form::CarryBorrow(Op::ISubBorrow)),
    (Intrinsic::UmulExtended, Form::MulExtended(Op::UMulExtended)),
    (Intrinsic::ImulExtended, Form::MulExtended(Op::SMulExtended)),
    (
        Intrinsic::BitfieldExtract,
        Form::Plain(by_family!(SInt: Op::BitFieldSExtract, UInt: Op::BitFieldUExtract)),
    ),
    (Intrinsic::BitfieldInsert, Form::Plain(int!(Op::BitFieldInsert))),
    (Intrinsic::BitfieldReverse, Form::Plain(int!(Op::BitReverse))),
    (Intrinsic::BitCount, Form::Plain(int!(Op::BitCount))),
    (Intrinsic::FindLsb, Form::Ext(int!(GLOp::FindILsb))),
    (Intrinsic::FindMsb, Form::Ext(by_family!(SInt: GLOp::FindSMsb, UInt: GLOp::FindUMsb))),
    // Atomics.
    (Intrinsic::AtomicAdd, Form::Atomic(int!(Op::AtomicIAdd))),
    (Intrinsic::AtomicMin, Form::Atomic(by_family!(SInt: Op::AtomicSMin, UInt: Op::AtomicUMin))),
    (Intrinsic::AtomicMax, Form::Atomic(by_family!(SInt: Op::AtomicSMax, UInt: Op::AtomicUMax))),
    (Intrinsic::AtomicAnd, Form::Atomic(int!(Op::AtomicAnd))),
    (Intrinsic::AtomicOr, Form::Atomic(int!(Op::AtomicOr))),
    (Intrinsic::AtomicXor, Form::Atomic(int!(Op::AtomicXor))),
    (
        Intrinsic::AtomicExchange,
        Form::Atomic(by_family!(
            Float: Op::AtomicExchange,
            SInt: Op::AtomicExchange,
            UInt: Op::AtomicExchange,
        )),
    ),
    (Intrinsic::AtomicCompSwap, Form::Atomic(int!(Op::AtomicCompareExchange))),
    // Derivatives.
    (Intrinsic::Dfdx, Form::Plain(float!(Op::DPdx))),
    (Intrinsic::Dfdy, Form::Plain(float!(Op::DPdy))),
    (Intrinsic::Fwidth, Form::Plain(float!(Op::Fwidth))),
    (Intrinsic::DfdxCoarse, Form::Plain(float!(Op::DPdxCoarse))),
    (Intrinsic::DfdyCoarse, Form::Plain(float!(Op::DPdyCoarse))),
    (Intrinsic::FwidthCoarse, Form::Plain(float!(Op::FwidthCoarse))),
    (Intrinsic::DfdxFine, Form::Plain(float!(Op::DPdxFine))),
    (Intrinsic::DfdyFine, Form::Plain(float!(Op::DPdyFine))),
    (Intrinsic::FwidthFine, Form::Plain(float!(Op::FwidthFine))),
];

lazy_static! {
    static ref INTRINSICS_BY_ID: FxHashMap<Intrinsic, Form> = INTRINSICS.iter().copied().collect();
}

pub(super) fn form_of(intrinsic: Intrinsic) -> Option<Form> {
    INTRINSICS_BY_ID.get(&intrinsic).copied()
}

pub(super) fn pick<T: Copy>(ops: ByFamily<T>, family: Option<Family>) -> Option<T> {
    family.and_then(|family| ops[family as usize])
}

/// Number of arguments (or `None` if the table entry doesn't constrain it).
fn arg_count(intrinsic: Intrinsic, form: Form) -> Option<usize> {
    match form {
        Form::ExtWithOutput(_) => Some(2),
        Form::CarryBorrow(_) => Some(3),
        Form::MulExtended(_) => Some(4),
        Form::Atomic(_) if intrinsic == Intrinsic::AtomicCompSwap => Some(3),
        Form::Atomic(_) => Some(2),
        Form::Plain(_) | Form::Ext(_) => None,
    }
}

/// Memory semantics of an atomic operation, with a separate `unequal` for
/// the failure case of compare-exchange.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(super) struct AtomicSemantics {
    pub(super) equal: MemorySemantics,
    pub(super) unequal: MemorySemantics,
}

impl AtomicSemantics {
    /// Atomics on buffer (and shared) memory.
    // NOTE: `unequal` can't include release semantics.
    pub(super) const BUFFER: Self =
        Self { equal: MemorySemantics::ACQUIRE_RELEASE, unequal: MemorySemantics::ACQUIRE };

    /// Atomics on image texels (through `OpImageTexelPointer`).
    pub(super) const IMAGE: Self =
        Self { equal: MemorySemantics::IMAGE_MEMORY, unequal: MemorySemantics::IMAGE_MEMORY };
}

impl ExprLowerer<'_> {
    pub(super) fn lower_intrinsic(
        &mut self,
        intrinsic: Intrinsic,
        args: &[Expr],
        ty: &Type,
    ) -> Result<Id> {
        let unsupported = || LowerError::UnsupportedIntrinsic(intrinsic);
        let form = form_of(intrinsic).ok_or_else(unsupported)?;

        if let Some(expected) = arg_count(intrinsic, form) {
            if args.len() != expected {
                return Err(LowerError::ArgCount {
                    what: format!("{intrinsic:?}"),
                    expected,
                    found: args.len(),
                });
            }
        }
        let first = args.first().ok_or(LowerError::ArgCount {
            what: format!("{intrinsic:?}"),
            expected: 1,
            found: 0,
        })?;
        let family = first.ty.scalar().map(Family::of);

        // `mix(x, y, bvec)` selects instead of interpolating.
        if intrinsic == Intrinsic::Mix {
            if let [x, y, a] = args {
                if a.ty.scalar() == Some(Scalar::Bool) {
                    let x = self.lower(x)?;
                    let y = self.lower(y)?;
                    let a = self.lower(a)?;
                    return Ok(self.emit(Op::Select, ty, [a, y, x]));
                }
            }
        }

        match form {
            Form::Plain(ops) => {
                let opcode = pick(ops, family).ok_or_else(unsupported)?;
                if matches!(
                    opcode,
                    Op::DPdxCoarse
                        | Op::DPdyCoarse
                        | Op::FwidthCoarse
                        | Op::DPdxFine
                        | Op::DPdyFine
                        | Op::FwidthFine
                ) {
                    self.module.register_capability(spirv::Capability::DerivativeControl);
                }
                let operands = self.lower_all(args)?;
                Ok(self.emit(opcode, ty, operands))
            }

            Form::Ext(ops) => {
                let ext_op = pick(ops, family).ok_or_else(unsupported)?;
                let operands = self.lower_all(args)?;
                Ok(self.emit_ext(ext_op, ty, operands))
            }

            Form::ExtWithOutput(ext_op) => {
                let x = self.lower(&args[0])?;
                let (pointer, writeback) = self.out_argument(&args[1], false)?;
                let id = self.emit_ext(ext_op, ty, [x, pointer]);
                self.write_back(writeback.into_iter().collect());
                Ok(id)
            }

            Form::Atomic(ops) => {
                let pointer = self.lower_no_load(first)?;
                let values = self.lower_all(&args[1..])?;
                self.atomic(
                    intrinsic,
                    ops,
                    AtomicSemantics::BUFFER,
                    first.ty.scalar(),
                    pointer,
                    &values,
                    ty,
                )
            }

            Form::CarryBorrow(opcode) => {
                let x = self.lower(&args[0])?;
                let y = self.lower(&args[1])?;
                let (result, carry) = self.two_results(opcode, ty, x, y);
                self.store_into(&args[2], carry)?;
                Ok(result)
            }

            Form::MulExtended(opcode) => {
                let x = self.lower(&args[0])?;
                let y = self.lower(&args[1])?;
                let (lsb, msb) = self.two_results(opcode, &args[0].ty, x, y);
                self.store_into(&args[2], msb)?;
                self.store_into(&args[3], lsb)?;
                Ok(super::NO_VALUE)
            }
        }
    }

    /// Emits `opcode` with scope/semantics operands, on `pointer` (pointing
    /// to a `scalar`), and `values` (for compare-exchange, `[compare, data]`).
    #[allow(clippy::too_many_arguments)]
    pub(super) fn atomic(
        &mut self,
        intrinsic: Intrinsic,
        ops: ByFamily<Op>,
        semantics: AtomicSemantics,
        scalar: Option<Scalar>,
        pointer: Id,
        values: &[Id],
        ty: &Type,
    ) -> Result<Id> {
        let opcode = pick(ops, scalar.map(Family::of))
            .ok_or(LowerError::UnsupportedIntrinsic(intrinsic))?;

        let scope = self.module.register_literal(spirv::Scope::Device as u32);
        let equal = self.module.register_literal(semantics.equal.bits());

        let mut operands: SmallVec<[Id; 6]> = SmallVec::new();
        operands.extend([pointer, scope, equal]);
        match (opcode, values) {
            (Op::AtomicCompareExchange, &[compare, data]) => {
                // Unequal semantics, then value and comparator.
                let unequal = self.module.register_literal(semantics.unequal.bits());
                operands.extend([unequal, data, compare]);
            }
            (Op::AtomicCompareExchange, _) => {
                return Err(LowerError::ArgCount {
                    what: format!("{intrinsic:?}"),
                    expected: 3,
                    found: values.len() + 1,
                });
            }
            _ => operands.extend(values.iter().copied()),
        }
        Ok(self.emit(opcode, ty, operands))
    }

    fn lower_all(&mut self, args: &[Expr]) -> Result<SmallVec<[Id; 4]>> {
        args.iter().map(|arg| self.lower(arg)).collect()
    }

    fn emit_ext(&mut self, ext_op: GLOp, ty: &Type, operands: impl IntoIterator<Item = Id>) -> Id {
        let set = self.module.glsl_std_450();
        self.emit(Op::ExtInst, ty, [set, ext_op as u32].into_iter().chain(operands))
    }

    /// Emits `opcode`, returning a struct of two `ty` values, and extracts
    /// them both.
    fn two_results(&mut self, opcode: Op, ty: &Type, x: Id, y: Id) -> (Id, Id) {
        let field_type = self.module.register_type(ty);
        let struct_type = self.module.register_tuple_type(&[field_type, field_type]);
        let pair = self.emit_typed(opcode, struct_type, [x, y]);
        let first = self.emit_typed(Op::CompositeExtract, field_type, [pair, 0]);
        let second = self.emit_typed(Op::CompositeExtract, field_type, [pair, 1]);
        (first, second)
    }

    /// Stores `value` into the `out` argument `arg`.
    fn store_into(&mut self, arg: &Expr, value: Id) -> Result<()> {
        let place = self.assignable_place(arg)?;
        self.store_place(&place, value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_intrinsic_has_one_entry() {
        for &intrinsic in Intrinsic::ALL {
            let count = INTRINSICS.iter().filter(|&&(i, _)| i == intrinsic).count();
            assert_eq!(count, 1, "{intrinsic:?}");
        }
        assert_eq!(INTRINSICS.len(), Intrinsic::ALL.len());
    }

    #[test]
    fn every_entry_has_an_opcode() {
        for &(intrinsic, form) in INTRINSICS {
            let any = match form {
                Form::Plain(ops) | Form::Atomic(ops) => ops.iter().any(Option::is_some),
                Form::Ext(ops) => ops.iter().any(Option::is_some),
                Form::ExtWithOutput(_) | Form::CarryBorrow(_) | Form::MulExtended(_) => true,
            };
            assert!(any, "{intrinsic:?} has no opcodes");
        }
    }

    #[test]
    fn type_generic_selection() {
        let Some(Form::Ext(ops)) = form_of(Intrinsic::Min) else { panic!() };
        assert_eq!(ops[Family::Float as usize], Some(GLOp::FMin));
        assert_eq!(ops[Family::SInt as usize], Some(GLOp::SMin));
        assert_eq!(ops[Family::UInt as usize], Some(GLOp::UMin));
        assert_eq!(ops[Family::Bool as usize], None);
    }

    #[test]
    fn atomics_take_a_pointer_and_their_values() {
        for &(intrinsic, form) in INTRINSICS {
            if let Form::Atomic(_) = form {
                let expected = if intrinsic == Intrinsic::AtomicCompSwap { 3 } else { 2 };
                assert_eq!(arg_count(intrinsic, form), Some(expected), "{intrinsic:?}");
            }
        }
    }
}
