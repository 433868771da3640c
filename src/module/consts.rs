//! Constant registration (literals, composites and specialization constants).

use super::vars::ScopeEntry;
use super::{Module, VariableInfo};
use crate::ast::{Literal, Type};
use crate::error::Result;
use crate::spv::{Id, Inst, Op};
use log::trace;
use smallvec::SmallVec;

/// Cache key for scalar constants, floats being compared by bit pattern
/// (so e.g. `0.0` and `-0.0` get distinct IDs, and `NaN`s are hashable).
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub(super) enum LiteralKey {
    Bool(bool),
    Int(i32),
    UInt(u32),
    Float(u32),
    Double(u64),
}

impl From<Literal> for LiteralKey {
    fn from(literal: Literal) -> Self {
        match literal {
            Literal::Bool(v) => Self::Bool(v),
            Literal::Int(v) => Self::Int(v),
            Literal::UInt(v) => Self::UInt(v),
            Literal::Float(v) => Self::Float(v.to_bits()),
            Literal::Double(v) => Self::Double(v.to_bits()),
        }
    }
}

/// The value words of a numeric `OpConstant`/`OpSpecConstant` (low word first).
fn literal_words(literal: Literal) -> SmallVec<[u32; 2]> {
    match literal {
        Literal::Bool(v) => [v as u32].into_iter().collect(),
        Literal::Int(v) => [v as u32].into_iter().collect(),
        Literal::UInt(v) => [v].into_iter().collect(),
        Literal::Float(v) => [v.to_bits()].into_iter().collect(),
        Literal::Double(v) => {
            let bits = v.to_bits();
            [bits as u32, (bits >> 32) as u32].into_iter().collect()
        }
    }
}

impl Module {
    /// Registers a scalar constant.
    pub fn register_literal(&mut self, value: impl Into<Literal>) -> Id {
        let value = value.into();
        let key = LiteralKey::from(value);
        if let Some(&id) = self.literals.get(&key) {
            return id;
        }

        let ty = self.register_type(&Type::Scalar(value.scalar()));
        let inst = match value {
            Literal::Bool(true) => Inst::from(Op::ConstantTrue),
            Literal::Bool(false) => Inst::from(Op::ConstantFalse),
            _ => Inst::from(Op::Constant).with_operands(literal_words(value)),
        };
        let id = self.next_id();
        self.declarations.push(inst.with_result_type(ty).with_result(id));
        trace!("constant %{id} = {value:?}");
        self.literals.insert(key, id);
        id
    }

    /// Registers a composite constant (of type `ty`) from constituent IDs.
    ///
    /// Constituents are compared exactly (and in order) for deduplication.
    pub fn register_composite(&mut self, constituents: &[Id], ty: &Type) -> Id {
        let type_id = self.register_type(ty);
        let key = (SmallVec::from_slice(constituents), type_id);
        if let Some(&id) = self.composites.get(&key) {
            return id;
        }
        let id = self.next_id();
        self.declarations.push(
            Inst::from(Op::ConstantComposite)
                .with_result_type(type_id)
                .with_result(id)
                .with_operands(constituents.iter().copied()),
        );
        trace!("constant %{id} = {ty:?} {constituents:?}");
        self.composites.insert(key, id);
        id
    }

    /// Index constant for member `index`, as used by access chains.
    pub fn register_member_variable_index(&mut self, index: u32) -> Id {
        self.register_literal(index)
    }

    /// Registers a specialization constant (with `SpecId` `spec_id`) under
    /// `name`, in module scope, and returns its ID.
    pub fn register_spec_constant(
        &mut self,
        name: &str,
        spec_id: u32,
        ty: &Type,
        default: Literal,
    ) -> Result<Id> {
        if let Some(entry) = self.globals.get(name) {
            return Ok(entry.info.id);
        }

        let type_id = self.register_type(ty);
        let inst = match default {
            Literal::Bool(true) => Inst::from(Op::SpecConstantTrue),
            Literal::Bool(false) => Inst::from(Op::SpecConstantFalse),
            _ => Inst::from(Op::SpecConstant).with_operands(literal_words(default)),
        };
        let id = self.next_id();
        self.debug.push(Inst::from(Op::Name).with_result(id).with_name(name));
        self.declarations.push(inst.with_result_type(type_id).with_result(id));
        self.decorate(id, spirv::Decoration::SpecId, [spec_id]);
        trace!("spec constant %{id} `{name}` = {default:?}");

        self.globals.insert(
            name,
            ScopeEntry {
                info: VariableInfo { id, is_lvalue: false, is_rvalue: true },
                storage: None,
                type_id,
            },
        );
        Ok(id)
    }

    /// Emits an `OpSpecConstantOp` (i.e. `opcode` folded at specialization
    /// time) into the declarations, and returns its ID.
    pub fn register_spec_constant_op(&mut self, result_type: Id, opcode: Op, operands: &[Id]) -> Id {
        let id = self.next_id();
        self.declarations.push(
            Inst::from(Op::SpecConstantOp)
                .with_result_type(result_type)
                .with_result(id)
                .with_operands([opcode as u32])
                .with_operands(operands.iter().copied()),
        );
        id
    }
}
