//! Low-level parsing of SPIR-V binary form.

use crate::spv::{self, shape};
use smallvec::SmallVec;
use std::borrow::Cow;
use std::path::Path;
use std::{fs, io};

enum InstDecodeError {
    /// Ran out of words while parsing an instruction's fields.
    NotEnoughWords,

    /// Extra words were left over, after parsing an instruction's fields.
    TooManyWords,

    /// A word count of `0`, which would never advance.
    ZeroWordCount,

    /// `OpSwitch` label words that don't form whole `(literal, label)` pairs.
    OddLabelWords,

    BadName(spv::UnpackNameError),
}

impl InstDecodeError {
    // FIXME(eddyb) improve messages and add more contextual information.
    fn message(&self) -> Cow<'static, str> {
        match self {
            Self::NotEnoughWords => "truncated instruction".into(),
            Self::TooManyWords => "overlong instruction".into(),
            Self::ZeroWordCount => "word count of 0".into(),
            Self::OddLabelWords => "unpaired switch label".into(),
            Self::BadName(spv::UnpackNameError::MissingTerminator) => {
                "missing \\0 terminator in literal string".into()
            }
            Self::BadName(spv::UnpackNameError::InvalidUtf8(e)) => {
                format!("literal string is not UTF-8: {e}").into()
            }
        }
    }
}

// FIXME(eddyb) stop abusing `io::Error` for error reporting.
fn invalid(reason: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, format!("malformed SPIR-V ({reason})"))
}

fn decode_fields(
    opcode: spv::Op,
    shape: shape::InstShape,
    mut words: &[u32],
) -> Result<spv::Inst, InstDecodeError> {
    use InstDecodeError as Error;

    let mut inst = spv::Inst::from(opcode);

    let mut next = || -> Result<u32, InstDecodeError> {
        let (&first, rest) = words.split_first().ok_or(Error::NotEnoughWords)?;
        words = rest;
        Ok(first)
    };
    inst.result_type_id = shape.has_result_type_id.then(&mut next).transpose()?;
    inst.result_id = shape.has_result_id.then(&mut next).transpose()?;

    if shape.has_name {
        let (name, len) = spv::unpack_name(words).map_err(Error::BadName)?;
        inst.name = Some(name);
        words = &words[len..];
    }

    match shape.tail {
        shape::Tail::None => {
            if !words.is_empty() {
                return Err(Error::TooManyWords);
            }
        }
        shape::Tail::Operands => inst.operands = SmallVec::from_slice(words),
        shape::Tail::Labels => {
            if words.len() % 2 != 0 {
                return Err(Error::OddLabelWords);
            }
            inst.labels =
                Some(words.chunks_exact(2).map(|pair| (pair[0] as i32, pair[1])).collect());
        }
    }

    Ok(inst)
}

/// Decodes the instruction starting at `words[*cursor]`, advancing `cursor`
/// past it on success.
pub fn decode_inst(words: &[u32], cursor: &mut usize) -> io::Result<spv::Inst> {
    let &first = words.get(*cursor).ok_or_else(|| invalid("truncated instruction stream"))?;
    let (inst_len, opcode) = ((first >> 16) as usize, first as u16);

    let (opcode, shape) = shape::opcode_from_u16(opcode)
        .ok_or_else(|| invalid(&format!("unsupported opcode {opcode}")))?;

    let invalid = |e: InstDecodeError| invalid(&format!("in Op{opcode:?}: {}", e.message()));

    if inst_len == 0 {
        return Err(invalid(InstDecodeError::ZeroWordCount));
    }
    let inst_words = words
        .get(*cursor..*cursor + inst_len)
        .ok_or_else(|| invalid(InstDecodeError::NotEnoughWords))?;

    let inst = decode_fields(opcode, shape, &inst_words[1..]).map_err(invalid)?;
    *cursor += inst_len;
    Ok(inst)
}

pub struct ModuleParser {
    /// Copy of the header words (for convenience).
    // FIXME: add a `Header` struct with named fields.
    pub header: [u32; spv::HEADER_LEN],

    /// The entire module's words, in native endianness.
    words: Vec<u32>,

    /// Next (instructions') word position in the module.
    next_word: usize,
}

impl ModuleParser {
    pub fn read_from_spv_file(path: impl AsRef<Path>) -> io::Result<Self> {
        Self::read_from_spv_bytes(fs::read(path)?)
    }

    pub fn read_from_spv_bytes(spv_bytes: Vec<u8>) -> io::Result<Self> {
        if spv_bytes.len() % 4 != 0 {
            return Err(invalid("not a multiple of 4 bytes"));
        }
        // NOTE: `Vec<u8>` isn't guaranteed to be 4-byte-aligned, so the
        // words can't be cast in place, only copied out.
        let words = spv_bytes
            .chunks_exact(4)
            .map(|w| bytemuck::pod_read_unaligned::<u32>(w))
            .collect();
        Self::read_from_spv_words(words)
    }

    pub fn read_from_spv_words(mut words: Vec<u32>) -> io::Result<Self> {
        if words.len() < spv::HEADER_LEN {
            return Err(invalid("truncated header"));
        }

        // Check the magic, and swap endianness of all words if we have to.
        let magic = words[0];
        if magic == spirv::MAGIC_NUMBER {
            // Nothing to do, all words already match native endianness.
        } else if magic.swap_bytes() == spirv::MAGIC_NUMBER {
            for word in &mut words {
                *word = word.swap_bytes();
            }
        } else {
            return Err(invalid("incorrect magic number"));
        }

        let mut header = [0; spv::HEADER_LEN];
        header.copy_from_slice(&words[..spv::HEADER_LEN]);

        Ok(Self { header, words, next_word: spv::HEADER_LEN })
    }

    /// `(major, minor)` version from the header.
    pub fn version(&self) -> (u8, u8) {
        let v = self.header[1];
        ((v >> 16) as u8, (v >> 8) as u8)
    }

    pub fn generator(&self) -> u32 {
        self.header[2]
    }

    pub fn bound(&self) -> u32 {
        self.header[3]
    }
}

impl Iterator for ModuleParser {
    type Item = io::Result<spv::Inst>;
    fn next(&mut self) -> Option<Self::Item> {
        if self.next_word >= self.words.len() {
            return None;
        }
        let result = decode_inst(&self.words, &mut self.next_word);
        if result.is_err() {
            // Stop after the first error, there's no way to resynchronize.
            self.next_word = self.words.len();
        }
        Some(result)
    }
}
