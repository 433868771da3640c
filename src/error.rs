use crate::ast::{ImageAccess, Intrinsic, TextureAccess, Type};
use crate::spv;
use thiserror::Error;

/// Failure while registering into, or lowering into, a [`Module`](crate::Module).
///
/// None of these are recoverable: the module being built should be discarded.
#[derive(Debug, Error)]
pub enum LowerError {
    // Contract violations (malformed input from the front-end, or API misuse).
    #[error("{0} cannot appear in an access chain")]
    NotChainable(&'static str),

    #[error("{0} is not assignable")]
    NotAssignable(&'static str),

    #[error("access chain needs at least 2 steps, found {0}")]
    ChainTooShort(usize),

    #[error("unknown variable `{0}`")]
    UnknownVariable(String),

    #[error("variable `{0}` needs Function storage, but there's no function being built")]
    NoFunctionScope(String),

    #[error("{what} expects {expected} argument(s), found {found}")]
    ArgCount { what: String, expected: usize, found: usize },

    #[error("type mismatch: expected {expected}, found `{found:?}`")]
    TypeMismatch { expected: &'static str, found: Type },

    #[error("block %{0} already has a terminator")]
    AlreadyTerminated(spv::Id),

    #[error("Op{0:?} is not a block terminator")]
    NotATerminator(spv::Op),

    #[error("block %{0} has no terminator")]
    Unterminated(spv::Id),

    #[error("function `{0}` has no blocks")]
    EmptyFunction(String),

    #[error("expression nesting exceeds the limit of {0}")]
    TooDeep(usize),

    // Unsupported features (gaps in the lowering tables).
    #[error("unsupported cast from `{from:?}` to `{to:?}`")]
    UnsupportedCast { from: Type, to: Type },

    #[error("unsupported operator `{op}` on `{ty:?}`")]
    UnsupportedOperator { op: String, ty: Type },

    #[error("unsupported intrinsic `{0:?}`")]
    UnsupportedIntrinsic(Intrinsic),

    #[error("unsupported image access `{0:?}`")]
    UnsupportedImageAccess(ImageAccess),

    #[error("unsupported texture access `{0:?}`")]
    UnsupportedTextureAccess(TextureAccess),
}

impl LowerError {
    /// Whether this error is the caller's fault (as opposed to a gap in what
    /// can be lowered at all).
    pub fn is_contract_violation(&self) -> bool {
        !matches!(
            self,
            Self::UnsupportedCast { .. }
                | Self::UnsupportedOperator { .. }
                | Self::UnsupportedIntrinsic(_)
                | Self::UnsupportedImageAccess(_)
                | Self::UnsupportedTextureAccess(_)
        )
    }

    pub(crate) fn type_mismatch(expected: &'static str, found: &Type) -> Self {
        Self::TypeMismatch { expected, found: found.clone() }
    }
}

pub type Result<T, E = LowerError> = std::result::Result<T, E>;
