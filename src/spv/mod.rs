//! SPIR-V binary form: instructions, their per-opcode shapes, and word-level
//! encoding/decoding ([`read`]/[`write`]).

// NOTE(eddyb) all the modules are declared here, but they're documented "inside"
// (i.e. using inner doc comments).
pub mod print;
pub mod read;
pub mod shape;
pub mod write;

use smallvec::SmallVec;
use std::iter;
use std::string::FromUtf8Error;

pub use spirv::Op;

/// SPIR-V ID.
///
/// Ids are plain words, as instructions mix them freely with literal operands.
pub type Id = spirv::Word;

/// Number of words in the SPIR-V module header.
pub const HEADER_LEN: usize = 5;

/// A SPIR-V instruction, in the "flattened" form used for both emission and
/// parsing: which of the optional fields are present is fully determined by
/// the [`shape::InstShape`] of `opcode`, not by the instruction itself.
///
/// For a few opcodes the "result" slots carry non-result leading words, e.g.
/// `OpName` keeps its target in `result_id`, and `OpEntryPoint` keeps the
/// execution model and function in `result_type_id`/`result_id` (see the shape
/// table for the full list).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Inst {
    pub opcode: Op,

    pub result_type_id: Option<Id>,
    pub result_id: Option<Id>,

    /// Packed `LiteralString`, always following the result slots.
    pub name: Option<String>,

    // FIXME(eddyb) change the inline size of this to fit most instructions.
    pub operands: SmallVec<[u32; 4]>,

    /// `(literal, label)` pairs of multi-way branches (i.e. `OpSwitch`).
    pub labels: Option<Vec<(i32, Id)>>,
}

impl From<Op> for Inst {
    fn from(opcode: Op) -> Self {
        Self {
            opcode,
            result_type_id: None,
            result_id: None,
            name: None,
            operands: SmallVec::new(),
            labels: None,
        }
    }
}

impl Inst {
    pub fn with_result_type(mut self, id: Id) -> Self {
        self.result_type_id = Some(id);
        self
    }

    pub fn with_result(mut self, id: Id) -> Self {
        self.result_id = Some(id);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_operands(mut self, operands: impl IntoIterator<Item = u32>) -> Self {
        self.operands.extend(operands);
        self
    }

    pub fn with_labels(mut self, labels: impl IntoIterator<Item = (i32, Id)>) -> Self {
        self.labels = Some(labels.into_iter().collect());
        self
    }

    /// Total number of words this instruction occupies once encoded.
    pub fn word_count(&self) -> usize {
        1 + (self.result_type_id.is_some() as usize)
            + (self.result_id.is_some() as usize)
            + self.name.as_deref().map_or(0, packed_name_len)
            + self.operands.len()
            + self.labels.as_ref().map_or(0, |labels| labels.len() * 2)
    }
}

/// Number of words `pack_name(s)` produces, i.e. `ceil((len + 1) / 4)`.
pub fn packed_name_len(s: &str) -> usize {
    s.len() / 4 + 1
}

// FIXME: this shouldn't just silently truncate when `s.contains('\0')`.
/// Packs `s` as a `LiteralString`: bytes in increasing-address order, 4 per
/// word, always followed by at least one NUL byte (an extra all-zero word is
/// added when `s.len()` is a multiple of 4).
pub fn pack_name(s: &str) -> impl Iterator<Item = u32> + '_ {
    let bytes = s.as_bytes();

    // FIXME(eddyb) replace with `array_chunks` once that is stabilized.
    let full_words = bytes.chunks_exact(4).map(|w| [w[0], w[1], w[2], w[3]]);

    let leftover_bytes = &bytes[full_words.len() * 4..];
    let mut last_word = [0; 4];
    last_word[..leftover_bytes.len()].copy_from_slice(leftover_bytes);

    full_words.chain(iter::once(last_word)).map(u32::from_le_bytes)
}

/// Error produced by [`unpack_name`].
#[derive(Debug)]
pub enum UnpackNameError {
    /// No NUL byte was found before running out of words.
    MissingTerminator,
    InvalidUtf8(FromUtf8Error),
}

/// Unpacks a `LiteralString` from the start of `words`, stopping at the first
/// NUL byte, and returns it along with the number of words it occupied.
pub fn unpack_name(words: &[u32]) -> Result<(String, usize), UnpackNameError> {
    let mut bytes = Vec::with_capacity(words.len() * 4);
    for (i, word) in words.iter().enumerate() {
        for byte in word.to_le_bytes() {
            if byte == 0 {
                let s = String::from_utf8(bytes).map_err(UnpackNameError::InvalidUtf8)?;
                return Ok((s, i + 1));
            }
            bytes.push(byte);
        }
    }
    Err(UnpackNameError::MissingTerminator)
}
