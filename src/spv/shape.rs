//! Per-opcode instruction shapes (which optional [`Inst`](super::Inst) fields
//! an opcode carries), for all the opcodes this crate emits or accepts.

use crate::spv::Op;
use lazy_static::lazy_static;
use rustc_hash::FxHashMap;

/// What follows the result slots and the name, in an encoded instruction.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Tail {
    None,

    /// Flat list of words (IDs and literals alike).
    Operands,

    /// Alternating `(literal, label ID)` pairs (only `OpSwitch`).
    Labels,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct InstShape {
    pub has_result_type_id: bool,
    pub has_result_id: bool,
    pub has_name: bool,
    pub tail: Tail,
}

const fn shape(has_result_type_id: bool, has_result_id: bool, has_name: bool, tail: Tail) -> InstShape {
    InstShape { has_result_type_id, has_result_id, has_name, tail }
}

/// No fields at all (e.g. `OpReturn`).
const BARE: InstShape = shape(false, false, false, Tail::None);
/// Only operands (e.g. `OpStore`, `OpDecorate`).
const OPERANDS: InstShape = shape(false, false, false, Tail::Operands);
/// Only a name (e.g. `OpExtension`).
const NAME: InstShape = shape(false, false, true, Tail::None);
/// Result ID and a name (e.g. `OpExtInstImport`, and `OpName`'s target).
const RESULT_NAME: InstShape = shape(false, true, true, Tail::None);
/// Result ID and operands (types, labels).
const RESULT: InstShape = shape(false, true, false, Tail::Operands);
/// Result type, result ID and operands (all value-producing instructions).
const VALUE: InstShape = shape(true, true, false, Tail::Operands);
/// Two leading words, a name, and operands (`OpEntryPoint`).
const ENTRY_POINT: InstShape = shape(true, true, true, Tail::Operands);
/// Two leading words and a name (`OpMemberName`).
const MEMBER_NAME: InstShape = shape(true, true, true, Tail::None);
/// Selector, default label, then `(literal, label)` pairs (`OpSwitch`).
const SWITCH: InstShape = shape(true, true, false, Tail::Labels);

// NOTE: the non-result leading words reuse the result slots, i.e.:
// * `OpName`: `result_id` = target
// * `OpMemberName`: `result_type_id` = struct type, `result_id` = member index
// * `OpEntryPoint`: `result_type_id` = execution model, `result_id` = function
// * `OpSwitch`: `result_type_id` = selector, `result_id` = default label
pub static SHAPES: &[(Op, InstShape)] = &[
    // Module-level layout.
    (Op::Nop, BARE),
    (Op::Capability, OPERANDS),
    (Op::Extension, NAME),
    (Op::ExtInstImport, RESULT_NAME),
    (Op::MemoryModel, OPERANDS),
    (Op::EntryPoint, ENTRY_POINT),
    (Op::ExecutionMode, OPERANDS),
    (Op::ExecutionModeId, OPERANDS),
    // Debug info.
    (Op::Source, OPERANDS),
    (Op::SourceExtension, NAME),
    (Op::Name, RESULT_NAME),
    (Op::MemberName, MEMBER_NAME),
    (Op::String, RESULT_NAME),
    (Op::Line, OPERANDS),
    (Op::NoLine, BARE),
    (Op::ModuleProcessed, NAME),
    // Annotations.
    (Op::Decorate, OPERANDS),
    (Op::MemberDecorate, OPERANDS),
    (Op::DecorationGroup, RESULT),
    (Op::GroupDecorate, OPERANDS),
    // Types.
    (Op::TypeVoid, RESULT),
    (Op::TypeBool, RESULT),
    (Op::TypeInt, RESULT),
    (Op::TypeFloat, RESULT),
    (Op::TypeVector, RESULT),
    (Op::TypeMatrix, RESULT),
    (Op::TypeImage, RESULT),
    (Op::TypeSampler, RESULT),
    (Op::TypeSampledImage, RESULT),
    (Op::TypeArray, RESULT),
    (Op::TypeRuntimeArray, RESULT),
    (Op::TypeStruct, RESULT),
    (Op::TypePointer, RESULT),
    (Op::TypeFunction, RESULT),
    // Constants.
    (Op::ConstantTrue, VALUE),
    (Op::ConstantFalse, VALUE),
    (Op::Constant, VALUE),
    (Op::ConstantComposite, VALUE),
    (Op::ConstantNull, VALUE),
    (Op::SpecConstantTrue, VALUE),
    (Op::SpecConstantFalse, VALUE),
    (Op::SpecConstant, VALUE),
    (Op::SpecConstantComposite, VALUE),
    (Op::SpecConstantOp, VALUE),
    // Memory.
    (Op::Variable, VALUE),
    (Op::Load, VALUE),
    (Op::Store, OPERANDS),
    (Op::AccessChain, VALUE),
    (Op::InBoundsAccessChain, VALUE),
    (Op::ArrayLength, VALUE),
    (Op::ImageTexelPointer, VALUE),
    // Functions.
    (Op::Function, VALUE),
    (Op::FunctionParameter, VALUE),
    (Op::FunctionEnd, BARE),
    (Op::FunctionCall, VALUE),
    (Op::ExtInst, VALUE),
    (Op::Undef, VALUE),
    // Composites.
    (Op::VectorExtractDynamic, VALUE),
    (Op::VectorInsertDynamic, VALUE),
    (Op::VectorShuffle, VALUE),
    (Op::CompositeConstruct, VALUE),
    (Op::CompositeExtract, VALUE),
    (Op::CompositeInsert, VALUE),
    (Op::CopyObject, VALUE),
    (Op::Transpose, VALUE),
    // Images.
    (Op::SampledImage, VALUE),
    (Op::ImageSampleImplicitLod, VALUE),
    (Op::ImageSampleExplicitLod, VALUE),
    (Op::ImageSampleDrefImplicitLod, VALUE),
    (Op::ImageSampleDrefExplicitLod, VALUE),
    (Op::ImageSampleProjImplicitLod, VALUE),
    (Op::ImageSampleProjExplicitLod, VALUE),
    (Op::ImageSampleProjDrefImplicitLod, VALUE),
    (Op::ImageSampleProjDrefExplicitLod, VALUE),
    (Op::ImageFetch, VALUE),
    (Op::ImageGather, VALUE),
    (Op::ImageDrefGather, VALUE),
    (Op::ImageRead, VALUE),
    (Op::ImageWrite, OPERANDS),
    (Op::Image, VALUE),
    (Op::ImageQuerySizeLod, VALUE),
    (Op::ImageQuerySize, VALUE),
    (Op::ImageQueryLod, VALUE),
    (Op::ImageQueryLevels, VALUE),
    (Op::ImageQuerySamples, VALUE),
    // Conversions.
    (Op::ConvertFToU, VALUE),
    (Op::ConvertFToS, VALUE),
    (Op::ConvertSToF, VALUE),
    (Op::ConvertUToF, VALUE),
    (Op::UConvert, VALUE),
    (Op::SConvert, VALUE),
    (Op::FConvert, VALUE),
    (Op::QuantizeToF16, VALUE),
    (Op::Bitcast, VALUE),
    // Arithmetic.
    (Op::SNegate, VALUE),
    (Op::FNegate, VALUE),
    (Op::IAdd, VALUE),
    (Op::FAdd, VALUE),
    (Op::ISub, VALUE),
    (Op::FSub, VALUE),
    (Op::IMul, VALUE),
    (Op::FMul, VALUE),
    (Op::UDiv, VALUE),
    (Op::SDiv, VALUE),
    (Op::FDiv, VALUE),
    (Op::UMod, VALUE),
    (Op::SRem, VALUE),
    (Op::SMod, VALUE),
    (Op::FRem, VALUE),
    (Op::FMod, VALUE),
    (Op::VectorTimesScalar, VALUE),
    (Op::MatrixTimesScalar, VALUE),
    (Op::VectorTimesMatrix, VALUE),
    (Op::MatrixTimesVector, VALUE),
    (Op::MatrixTimesMatrix, VALUE),
    (Op::OuterProduct, VALUE),
    (Op::Dot, VALUE),
    (Op::IAddCarry, VALUE),
    (Op::ISubBorrow, VALUE),
    (Op::UMulExtended, VALUE),
    (Op::SMulExtended, VALUE),
    // Bits.
    (Op::ShiftRightLogical, VALUE),
    (Op::ShiftRightArithmetic, VALUE),
    (Op::ShiftLeftLogical, VALUE),
    (Op::BitwiseOr, VALUE),
    (Op::BitwiseXor, VALUE),
    (Op::BitwiseAnd, VALUE),
    (Op::Not, VALUE),
    (Op::BitFieldInsert, VALUE),
    (Op::BitFieldSExtract, VALUE),
    (Op::BitFieldUExtract, VALUE),
    (Op::BitReverse, VALUE),
    (Op::BitCount, VALUE),
    // Relational and logical.
    (Op::Any, VALUE),
    (Op::All, VALUE),
    (Op::IsNan, VALUE),
    (Op::IsInf, VALUE),
    (Op::LogicalEqual, VALUE),
    (Op::LogicalNotEqual, VALUE),
    (Op::LogicalOr, VALUE),
    (Op::LogicalAnd, VALUE),
    (Op::LogicalNot, VALUE),
    (Op::Select, VALUE),
    (Op::IEqual, VALUE),
    (Op::INotEqual, VALUE),
    (Op::UGreaterThan, VALUE),
    (Op::SGreaterThan, VALUE),
    (Op::UGreaterThanEqual, VALUE),
    (Op::SGreaterThanEqual, VALUE),
    (Op::ULessThan, VALUE),
    (Op::SLessThan, VALUE),
    (Op::ULessThanEqual, VALUE),
    (Op::SLessThanEqual, VALUE),
    (Op::FOrdEqual, VALUE),
    (Op::FOrdNotEqual, VALUE),
    (Op::FOrdLessThan, VALUE),
    (Op::FOrdGreaterThan, VALUE),
    (Op::FOrdLessThanEqual, VALUE),
    (Op::FOrdGreaterThanEqual, VALUE),
    (Op::FUnordNotEqual, VALUE),
    // Derivatives.
    (Op::DPdx, VALUE),
    (Op::DPdy, VALUE),
    (Op::Fwidth, VALUE),
    (Op::DPdxFine, VALUE),
    (Op::DPdyFine, VALUE),
    (Op::FwidthFine, VALUE),
    (Op::DPdxCoarse, VALUE),
    (Op::DPdyCoarse, VALUE),
    (Op::FwidthCoarse, VALUE),
    // Primitives and barriers.
    (Op::EmitVertex, BARE),
    (Op::EndPrimitive, BARE),
    (Op::ControlBarrier, OPERANDS),
    (Op::MemoryBarrier, OPERANDS),
    // Atomics.
    (Op::AtomicLoad, VALUE),
    (Op::AtomicStore, OPERANDS),
    (Op::AtomicExchange, VALUE),
    (Op::AtomicCompareExchange, VALUE),
    (Op::AtomicIIncrement, VALUE),
    (Op::AtomicIDecrement, VALUE),
    (Op::AtomicIAdd, VALUE),
    (Op::AtomicISub, VALUE),
    (Op::AtomicSMin, VALUE),
    (Op::AtomicUMin, VALUE),
    (Op::AtomicSMax, VALUE),
    (Op::AtomicUMax, VALUE),
    (Op::AtomicAnd, VALUE),
    (Op::AtomicOr, VALUE),
    (Op::AtomicXor, VALUE),
    // Control flow.
    (Op::Phi, VALUE),
    (Op::LoopMerge, OPERANDS),
    (Op::SelectionMerge, OPERANDS),
    (Op::Label, RESULT),
    (Op::Branch, OPERANDS),
    (Op::BranchConditional, OPERANDS),
    (Op::Switch, SWITCH),
    (Op::Kill, BARE),
    (Op::Return, BARE),
    (Op::ReturnValue, OPERANDS),
    (Op::Unreachable, BARE),
];

lazy_static! {
    static ref SHAPES_BY_OPCODE: FxHashMap<u32, InstShape> =
        SHAPES.iter().map(|&(op, shape)| (op as u32, shape)).collect();
}

/// Returns the shape of `opcode`, or `None` if it's not a supported opcode.
pub fn shape_of(opcode: Op) -> Option<InstShape> {
    SHAPES_BY_OPCODE.get(&(opcode as u32)).copied()
}

/// Decodes the low half of an instruction's first word into a supported opcode.
pub fn opcode_from_u16(opcode: u16) -> Option<(Op, InstShape)> {
    let op = Op::from_u32(opcode.into())?;
    Some((op, shape_of(op)?))
}

/// Block terminators, i.e. the instructions that must end every block.
pub fn is_block_terminator(opcode: Op) -> bool {
    matches!(
        opcode,
        Op::Branch | Op::BranchConditional | Op::Switch | Op::Return | Op::ReturnValue | Op::Kill
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustc_hash::FxHashSet;

    #[test]
    fn every_opcode_has_exactly_one_shape() {
        let mut seen = FxHashSet::default();
        for &(op, _) in SHAPES {
            assert!(seen.insert(op as u32), "{op:?} listed twice");
        }
        assert_eq!(SHAPES_BY_OPCODE.len(), SHAPES.len());
    }

    #[test]
    fn terminators_have_shapes() {
        for op in [Op::Branch, Op::BranchConditional, Op::Switch, Op::Return, Op::ReturnValue, Op::Kill]
        {
            assert!(is_block_terminator(op));
            assert!(shape_of(op).is_some());
        }
        assert!(!is_block_terminator(Op::Store));
    }

    #[test]
    fn odd_shapes() {
        assert_eq!(shape_of(Op::Name), Some(RESULT_NAME));
        assert_eq!(shape_of(Op::EntryPoint), Some(ENTRY_POINT));
        assert_eq!(shape_of(Op::Switch).unwrap().tail, Tail::Labels);
        assert!(opcode_from_u16(0xffff).is_none());
        assert_eq!(opcode_from_u16(Op::TypeVoid as u16).map(|(op, _)| op), Some(Op::TypeVoid));
    }
}
