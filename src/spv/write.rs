//! Low-level emission of SPIR-V binary form.

use crate::spv::{self, shape};
use std::borrow::Cow;
use std::path::Path;
use std::{fs, io, iter};

enum InstEncodeError {
    /// The opcode has no known shape.
    UnsupportedOpcode,

    /// An optional field (e.g. "Result Type ID") is present but the shape
    /// says it shouldn't be, or vice versa.
    FieldMismatch(&'static str),

    /// Instruction doesn't fit in the 16-bit word count.
    TooLong(usize),
}

impl InstEncodeError {
    fn message(&self) -> Cow<'static, str> {
        match *self {
            Self::UnsupportedOpcode => "unsupported opcode".into(),
            Self::FieldMismatch(field) => format!("{field} mismatch").into(),
            Self::TooLong(count) => {
                format!("word count {count} doesn't fit in 16 bits").into()
            }
        }
    }
}

// FIXME(eddyb) stop abusing `io::Error` for error reporting.
fn invalid(reason: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, format!("malformed SPIR-V ({reason})"))
}

fn check_shape(inst: &spv::Inst) -> Result<(), InstEncodeError> {
    use InstEncodeError as Error;

    let shape = shape::shape_of(inst.opcode).ok_or(Error::UnsupportedOpcode)?;

    if inst.result_type_id.is_some() != shape.has_result_type_id {
        return Err(Error::FieldMismatch("result type ID"));
    }
    if inst.result_id.is_some() != shape.has_result_id {
        return Err(Error::FieldMismatch("result ID"));
    }
    if inst.name.is_some() != shape.has_name {
        return Err(Error::FieldMismatch("name"));
    }
    if inst.labels.is_some() != (shape.tail == shape::Tail::Labels) {
        return Err(Error::FieldMismatch("labels"));
    }
    if shape.tail != shape::Tail::Operands && !inst.operands.is_empty() {
        return Err(Error::FieldMismatch("operands"));
    }
    Ok(())
}

/// Appends the encoding of `inst` to `out`: the `(word count << 16) | opcode`
/// word, then result type, result, packed name, and operands (or label pairs).
pub fn encode_inst(inst: &spv::Inst, out: &mut Vec<u32>) -> io::Result<()> {
    let invalid = |e: InstEncodeError| invalid(&format!("in Op{:?}: {}", inst.opcode, e.message()));

    check_shape(inst).map_err(invalid)?;

    let total_word_count = inst.word_count();
    let word_count = u16::try_from(total_word_count)
        .ok()
        .ok_or_else(|| invalid(InstEncodeError::TooLong(total_word_count)))?;

    out.reserve(total_word_count);
    let expected_final_pos = out.len() + total_word_count;

    out.extend(
        iter::once((inst.opcode as u32) | (u32::from(word_count) << 16))
            .chain(inst.result_type_id)
            .chain(inst.result_id),
    );
    if let Some(name) = &inst.name {
        out.extend(spv::pack_name(name));
    }
    out.extend_from_slice(&inst.operands);
    if let Some(labels) = &inst.labels {
        for &(literal, label) in labels {
            out.extend([literal as u32, label]);
        }
    }

    debug_assert_eq!(out.len(), expected_final_pos);

    Ok(())
}

pub struct ModuleEmitter {
    /// Output SPIR-V words.
    // FIXME(eddyb) try to write bytes to an `impl io::Write` directly.
    pub words: Vec<u32>,
}

impl ModuleEmitter {
    pub fn with_header(header: [u32; spv::HEADER_LEN]) -> Self {
        Self { words: header.into() }
    }

    pub fn push_inst(&mut self, inst: &spv::Inst) -> io::Result<()> {
        encode_inst(inst, &mut self.words)
    }

    pub fn push_insts<'a>(&mut self, insts: impl IntoIterator<Item = &'a spv::Inst>) -> io::Result<()> {
        insts.into_iter().try_for_each(|inst| self.push_inst(inst))
    }

    pub fn write_to_spv_file(&self, path: impl AsRef<Path>) -> io::Result<()> {
        fs::write(path, bytemuck::cast_slice::<u32, u8>(&self.words))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spv::{Inst, Op};

    #[test]
    fn first_word_packs_count_and_opcode() {
        let mut out = vec![];
        encode_inst(&Inst::from(Op::TypeInt).with_result(3).with_operands([32, 1]), &mut out)
            .unwrap();
        assert_eq!(out, [(4 << 16) | Op::TypeInt as u32, 3, 32, 1]);
    }

    #[test]
    fn shape_mismatch_is_rejected() {
        let mut out = vec![];
        let err = encode_inst(&Inst::from(Op::Load).with_result(3), &mut out).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert!(out.is_empty());
    }

    #[test]
    fn overlong_instruction_is_rejected() {
        let inst = Inst::from(Op::CompositeConstruct)
            .with_result_type(1)
            .with_result(2)
            .with_operands(iter::repeat(7).take(usize::from(u16::MAX)));
        assert!(encode_inst(&inst, &mut vec![]).is_err());
    }
}
